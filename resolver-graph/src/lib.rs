//! Reference `GraphStore` implementations for the entity resolution engine.
//!
//! Ships one backend today: [`memory::MemoryGraphStore`], a `dashmap`-backed
//! store with no persistence, suitable for tests and embedders who bring
//! their own graph. A persistent backend implements
//! `resolver_core::store::GraphStore` the same way and plugs into
//! `resolver-engine` without changes there.

pub mod memory;

pub use memory::MemoryGraphStore;
