//! Hash computation and object identity.
//!
//! This crate provides the core `ObjectId` type, hash computation, hex
//! encoding/decoding, and specialized OID collections used by the object
//! store and the pack writer.

mod error;
pub mod hex;
mod algorithm;
mod oid;
pub mod hasher;
pub mod collections;

pub use algorithm::HashAlgorithm;
pub use error::HashError;
pub use oid::ObjectId;
