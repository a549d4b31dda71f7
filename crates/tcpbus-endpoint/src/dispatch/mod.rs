//! Handler registry exports.
//!
//! Re-exports the registry, filter, and processor trait so endpoint roles and
//! applications can depend on this module directly.

pub mod registry;

pub use registry::{Filter, Processor, Registry};
