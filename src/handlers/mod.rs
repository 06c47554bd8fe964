pub mod account;
pub mod auth;
pub mod capsules;
pub mod feed;
pub mod health;
