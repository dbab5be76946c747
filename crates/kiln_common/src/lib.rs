//! Shared foundational types for the kiln compilation cache.
//!
//! This crate provides the content-hash type used to fingerprint file bytes
//! throughout the cache. The manifest format, verification, and locking built
//! on top of it live in `kiln_manifest`.

#![warn(missing_docs)]

pub mod hash;

pub use hash::Digest;
