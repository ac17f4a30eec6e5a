//! Object identity and hashing for the grit storage engine.
//!
//! Every stored object is addressed by the SHA-1 of its framed form,
//! `"<kind> <size>\0<payload>"`. This crate provides the 20-byte
//! [`ObjectName`], the hex codec, and the streaming [`hasher::Hasher`]
//! (collision-detecting SHA-1) used everywhere an object or file is named.

pub mod hasher;
pub mod hex;
mod name;

pub use name::{ObjectName, NAME_LEN};

use std::path::PathBuf;

/// Errors produced by hashing and name decoding.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hex character {character:?} at position {position}")]
    InvalidHex { position: usize, character: char },

    #[error("invalid hex length: expected {expected}, got {actual}")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("invalid object name length: expected {expected} bytes, got {actual}")]
    InvalidNameLength { expected: usize, actual: usize },

    #[error("SHA-1 collision attack detected")]
    Collision,

    #[error("unable to hash {path}")]
    HashFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
