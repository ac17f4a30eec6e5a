//! Foundation utilities for the grit storage engine.
//!
//! Currently this is the lock-file protocol used for every atomic file
//! rewrite (the index and loose refs).

mod lockfile;

pub use lockfile::{LockError, LockFile};
