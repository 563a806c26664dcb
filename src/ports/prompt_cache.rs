//! Prompt Cache Port - extension point for backend-side context caching.
//!
//! Some backends can cache a large, stable prefix (the system instruction and
//! schema) and hand back a handle. The dialogue client looks the handle up once
//! when it is built and forwards it untouched on every request.

use serde_json::Value;

/// Opaque handle to a cached context held by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CachedContextRef(String);

impl CachedContextRef {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Port for looking up a cached context.
pub trait PromptCache: Send + Sync {
    /// Returns a handle for this instruction and schema, or `None` to send them inline.
    fn lookup(&self, system_instruction: &str, schema: &Value) -> Option<CachedContextRef>;
}

/// Cache that never caches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPromptCache;

impl PromptCache for NoPromptCache {
    fn lookup(&self, _system_instruction: &str, _schema: &Value) -> Option<CachedContextRef> {
        None
    }
}
