//! Shared domain and wire types for `SmartTask`.

pub mod auth;
pub mod codec;
pub mod task;
pub mod validation;
