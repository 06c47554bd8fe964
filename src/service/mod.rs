pub mod account;
pub mod capsules;
pub mod feed;
pub mod media;
pub mod reveal;
pub mod validation;
