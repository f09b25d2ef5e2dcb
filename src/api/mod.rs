//! API facade layer.
//!
//! Holds the wire-shaped message types, the device backend trait that
//! forwarding operations are delegated to, and the server front end that
//! gates every mutating request behind primary arbitration.

pub mod messages;
pub mod provider;
pub mod server;
