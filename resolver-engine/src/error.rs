//! Error types for the resolution engine. Thin wrapper over
//! [`CoreError`] — the engine introduces no error kinds the core doesn't
//! already define in spec §7; it exists so engine modules can `?`-propagate
//! without importing `resolver_core::error` everywhere.

pub use resolver_core::error::{CoreError as EngineError, Result};
