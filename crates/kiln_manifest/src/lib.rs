//! Dependency-fingerprint manifests for the kiln compilation cache.
//!
//! For each cached source file the cache keeps a manifest: a compact binary
//! index recording which include files a compilation read, the content
//! fingerprint each of them had at the time, and the identity of the cached
//! output that state produced. One manifest accumulates many such entries as
//! the same source is rebuilt under changing headers.
//!
//! [`ManifestStore::lookup`] answers whether any recorded include-file state
//! matches the filesystem right now and returns the matching output's
//! identity; [`ManifestStore::append`] records a fresh entry after a miss.
//!
//! Manifests are shared between cooperating processes. Readers take a shared
//! advisory lock only while the raw bytes are read; writers hold an exclusive
//! lock across the whole read-modify-write cycle and publish by atomically
//! renaming a fully written replacement over the backing path, so a reader
//! never observes a partially written manifest.

#![warn(missing_docs)]

pub mod dedup;
pub mod error;
pub mod format;
pub mod hasher;
pub mod manifest;
pub mod store;
pub mod verify;

mod lock;

pub use error::ManifestError;
pub use manifest::{FileInfo, Fingerprint, Manifest, ObjectEntry};
pub use store::ManifestStore;
