//! # Ports Layer
//!
//! Defines the port traits for the provider.
//!
//! ## Hexagonal Architecture
//!
//! - `inbound.rs` - Driving ports (the exported provider operations)
//! - `outbound.rs` - Driven ports (primitive engine and keyset store)

pub mod inbound;
pub mod outbound;
