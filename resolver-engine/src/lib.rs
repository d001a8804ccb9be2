//! Entity resolution engine: normalization, blocking, scoring, the decision
//! and merge engines, synonym lifecycle, caching, locking, batch resolution,
//! and the human review queue, composed by [`resolver::Resolver`].

pub mod batch;
pub mod blocking;
pub mod cache;
pub mod decision;
pub mod error;
pub mod lock;
pub mod merge;
pub mod normalizer;
pub mod prelude;
pub mod resolver;
pub mod review;
pub mod similarity;
pub mod synonym;

pub use resolver::{ResolveOutcome, Resolver};
