//! Domain types for the ingest pipeline.

pub mod credentials;
pub mod requisition;
pub mod transaction;
