//! Public facade crate for `tagmill`.
//!
//! This crate intentionally contains no parsing logic. It re-exports the
//! shared types/traits from `tagmill-core`.

pub use tagmill_core::*;
