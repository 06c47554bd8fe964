//! Row types and reference schema for the hosted Postgres.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring rows as PostgREST returns them
//! - `schema.rs`: SQL DDL and row-level-security policies for bootstrapping a project

pub mod models;
pub mod schema;

pub use models::{
    CapsuleItemRow, CapsuleMember, CapsuleRow, EmbeddedItem, FeedItemRow, FileKind, NewCapsule,
    NewCapsuleItem, NewCapsuleMember, NewItemTag, NewTag, Tag, UserCapsuleRow,
};
pub use schema::SUPABASE_INIT;
