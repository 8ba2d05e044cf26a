//! Serialized lowering results.
//!
//! A lowered module is independent of the source module once produced, so
//! it can be stored and reloaded without re-running the lowering. The
//! encoding is bincode over the serde derives enabled by the `cache`
//! feature.

use crate::pipeline::LiftedModule;

/// A bincode-encoded [`LiftedModule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedModule {
    pub data: Vec<u8>,
}

impl CachedModule {
    pub fn from_lifted(module: &LiftedModule) -> Result<Self, String> {
        let data = bincode::serialize(module)
            .map_err(|e| format!("failed to serialize lowered module: {e}"))?;
        Ok(Self { data })
    }

    pub fn to_lifted(&self) -> Result<LiftedModule, String> {
        bincode::deserialize(&self.data)
            .map_err(|e| format!("failed to deserialize lowered module: {e}"))
    }
}
