//! Client for the hosted database service: auth, tables and object storage.

mod auth;
mod client;
mod rest;
mod storage;

pub use client::{Credential, SupabaseClient};
pub use storage::{MAX_TEXT_BYTES, TEXT_PLACEHOLDER};
