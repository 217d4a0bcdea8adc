//! Perceptual matching for textures that were recompressed or resized.

use super::directive_for;
use crate::context::CompilerContext;
use crate::directive::{Directive, DirectiveKind};
use crate::error::Result;
use crate::source::RawSourceFile;
use crate::stack::CompilationStep;
use camino::Utf8Path;
use mlc_vfs::{is_texture_path, stem_of, FileId, ImageFingerprint, PerceptualHasher};
use std::sync::Arc;

/// Stem suffixes of maps that travel with a diffuse texture (`rock_n.dds`
/// next to `rock.dds`).
pub const PAIR_POSTFIXES: &[&str] = &["_n", "_d", "_s", "_g", "_m", "_p"];

/// Points a texture at the most similar same-named texture in the index.
///
/// When nothing is similar enough and the texture is a paired map, the
/// diffuse texture next to it is matched instead and the paired map is taken
/// from the same folder of the matched container.
pub struct MatchSimilarTextures {
    ctx: Arc<CompilerContext>,
}

impl MatchSimilarTextures {
    pub fn new(ctx: Arc<CompilerContext>) -> Self {
        Self { ctx }
    }

    /// Fingerprinted files with `stem`, most similar first.
    fn ranked(&self, stem: &str, fingerprint: &ImageFingerprint) -> Vec<(f32, FileId)> {
        let index = &self.ctx.index;
        let mut ranked: Vec<(f32, String, FileId)> = index
            .by_stem(stem)
            .iter()
            .filter_map(|id| {
                let candidate = index.file(*id).fingerprint?;
                Some((
                    fingerprint.similarity(&candidate),
                    index.hash_path(*id).to_string(),
                    *id,
                ))
            })
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        ranked.into_iter().map(|(s, _, id)| (s, id)).collect()
    }

    fn paired(
        &self,
        source: &RawSourceFile,
        hasher: &dyn PerceptualHasher,
        stem: &str,
        fingerprint: ImageFingerprint,
    ) -> Result<Option<Directive>> {
        let Some(base) = PAIR_POSTFIXES.iter().find_map(|p| stem.strip_suffix(p)) else {
            return Ok(None);
        };
        let Some(diffuse) = find_diffuse(&source.absolute, base)? else {
            return Ok(None);
        };
        let Some(diffuse_fingerprint) = hasher.fingerprint(&std::fs::read(diffuse.as_std_path())?)
        else {
            return Ok(None);
        };

        let threshold = self.ctx.settings.texture_similarity_threshold;
        let index = &self.ctx.index;
        for (similarity, id) in self.ranked(base, &diffuse_fingerprint) {
            if similarity < threshold {
                break;
            }
            let Some(sibling) = index.sibling(id, source.path.file_name()) else {
                continue;
            };
            let archive_hash_path = index.hash_path(sibling.id);
            tracing::debug!(
                "{} paired with {} via diffuse {} ({:.3})",
                source.path,
                archive_hash_path,
                diffuse,
                similarity
            );
            return Ok(Some(directive_for(
                source,
                DirectiveKind::TransformedTexture {
                    archive_hash_path,
                    similarity,
                    fingerprint,
                },
            )));
        }
        Ok(None)
    }
}

/// The diffuse texture `<base>.<ext>` in the same folder as `texture`.
fn find_diffuse(texture: &Utf8Path, base: &str) -> Result<Option<camino::Utf8PathBuf>> {
    let (Some(dir), Some(ext)) = (texture.parent(), texture.extension()) else {
        return Ok(None);
    };
    let wanted = format!("{}.{}", base, ext);
    for entry in std::fs::read_dir(dir.as_std_path())? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.eq_ignore_ascii_case(&wanted) && entry.file_type()?.is_file() {
            return Ok(Some(dir.join(name)));
        }
    }
    Ok(None)
}

impl CompilationStep for MatchSimilarTextures {
    fn name(&self) -> &'static str {
        "MatchSimilarTextures"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        let Some(hasher) = self.ctx.hasher.as_deref() else {
            return Ok(None);
        };
        if !is_texture_path(source.path.as_str()) {
            return Ok(None);
        }
        self.ctx.cancel.check()?;

        let Some(fingerprint) = hasher.fingerprint(&source.read()?) else {
            tracing::debug!("Cannot fingerprint {}", source.path);
            return Ok(None);
        };
        let stem = stem_of(source.path.file_name());

        if let Some((similarity, id)) = self.ranked(&stem, &fingerprint).first().copied() {
            if similarity >= self.ctx.settings.texture_similarity_threshold {
                let archive_hash_path = self.ctx.index.hash_path(id);
                tracing::debug!(
                    "{} resembles {} ({:.3})",
                    source.path,
                    archive_hash_path,
                    similarity
                );
                return Ok(Some(directive_for(
                    source,
                    DirectiveKind::TransformedTexture {
                        archive_hash_path,
                        similarity,
                        fingerprint,
                    },
                )));
            }
        }

        self.paired(source, hasher, &stem, fingerprint)
    }
}
