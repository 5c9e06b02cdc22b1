//! OID-keyed collections shared across the object store and pack writer.

mod oid_map;

pub use oid_map::OidMap;
