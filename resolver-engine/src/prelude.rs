//! Convenience re-exports for downstream crates.

pub use crate::batch::{BatchContext, BatchEntryResult, BatchResult};
pub use crate::cache::{CachedResolution, ResolutionCache};
pub use crate::decision::Decision;
pub use crate::lock::{LocalLockProvider, LockProvider, StoreLockProvider};
pub use crate::merge::MergeOutcome;
pub use crate::normalizer::Normalizer;
pub use crate::resolver::{ResolveOutcome, Resolver};
pub use crate::review::{ReviewDecisionOutcome, ReviewQueue};
