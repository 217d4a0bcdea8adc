//! Binary patch generation.
//!
//! Patches are `bsdiff` output compressed with zstd. Both steps are
//! deterministic, so the same pair of inputs always yields the same patch and
//! therefore the same blob id.

use crate::error::{CompilerError, Result};

/// Zstd level applied to raw bsdiff output.
pub const PATCH_ZSTD_LEVEL: i32 = 3;

/// Produces and applies binary diffs.
pub trait PatchGenerator: Send + Sync {
    fn diff(&self, old: &[u8], new: &[u8]) -> Result<Vec<u8>>;
    fn apply(&self, old: &[u8], patch: &[u8]) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy)]
pub struct BsdiffPatcher {
    level: i32,
}

impl Default for BsdiffPatcher {
    fn default() -> Self {
        Self {
            level: PATCH_ZSTD_LEVEL,
        }
    }
}

impl BsdiffPatcher {
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl PatchGenerator for BsdiffPatcher {
    fn diff(&self, old: &[u8], new: &[u8]) -> Result<Vec<u8>> {
        let mut raw = Vec::new();
        bsdiff::diff(old, new, &mut raw)
            .map_err(|e| CompilerError::Patch(format!("diff failed: {}", e)))?;
        zstd::encode_all(raw.as_slice(), self.level)
            .map_err(|e| CompilerError::Patch(format!("compression failed: {}", e)))
    }

    fn apply(&self, old: &[u8], patch: &[u8]) -> Result<Vec<u8>> {
        let raw = zstd::decode_all(patch)
            .map_err(|e| CompilerError::Patch(format!("decompression failed: {}", e)))?;
        let mut new = Vec::new();
        bsdiff::patch(old, &mut raw.as_slice(), &mut new)
            .map_err(|e| CompilerError::Patch(format!("apply failed: {}", e)))?;
        Ok(new)
    }
}
