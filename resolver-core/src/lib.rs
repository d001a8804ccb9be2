//! Domain types, store contract, and configuration shared by the entity
//! resolution engine. Holds no resolution logic itself — see
//! `resolver-engine` for the normalizer, scorer, decision engine, and merge
//! engine, and `resolver-graph` for a concrete `GraphStore` implementation.

pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod prelude;
pub mod reference;
pub mod store;
pub mod types;
