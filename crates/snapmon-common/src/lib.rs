//! Types shared by the snapmon server, storage layer, collector and agent,
//! plus the declarative validator for inbound snapshot payloads.

pub mod types;
pub mod validation;
