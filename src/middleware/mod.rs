pub mod auth;
pub mod capsule_form;
pub mod session;
