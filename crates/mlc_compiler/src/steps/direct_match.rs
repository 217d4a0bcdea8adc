//! Exact content matches against the index.

use super::directive_for;
use crate::context::CompilerContext;
use crate::directive::{Directive, DirectiveKind};
use crate::error::Result;
use crate::source::RawSourceFile;
use crate::stack::CompilationStep;
use mlc_vfs::{ContentIndex, FileId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// One criterion for choosing between files with identical content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TieBreakRule {
    /// Prefer files shipped with the game being compiled for.
    TargetGameFile,
    /// Prefer files shipped with any game.
    AnyGameFile,
    /// Prefer files whose name equals the source file's name.
    FilenameMatch,
    /// Prefer the lowest nesting factor.
    Shallowest,
}

pub fn default_tie_break() -> Vec<TieBreakRule> {
    vec![
        TieBreakRule::TargetGameFile,
        TieBreakRule::AnyGameFile,
        TieBreakRule::FilenameMatch,
        TieBreakRule::Shallowest,
    ]
}

/// Orders exact-match candidates. After the configured rules, candidates are
/// ordered by hash path text and finally by id, so the order is total.
pub(crate) struct TieBreaker<'a> {
    pub index: &'a ContentIndex,
    pub rules: &'a [TieBreakRule],
    pub game: &'a str,
}

impl TieBreaker<'_> {
    pub fn compare(&self, a: FileId, b: FileId, source_name: &str) -> Ordering {
        for rule in self.rules {
            let ordering = match rule {
                TieBreakRule::TargetGameFile => {
                    self.is_target_game(b).cmp(&self.is_target_game(a))
                }
                TieBreakRule::AnyGameFile => self
                    .index
                    .archive_of(b)
                    .is_game_file()
                    .cmp(&self.index.archive_of(a).is_game_file()),
                TieBreakRule::FilenameMatch => {
                    let matches = |id: FileId| {
                        self.index
                            .file(id)
                            .file_name()
                            .eq_ignore_ascii_case(source_name)
                    };
                    matches(b).cmp(&matches(a))
                }
                TieBreakRule::Shallowest => self
                    .index
                    .file(a)
                    .nesting_factor
                    .cmp(&self.index.file(b).nesting_factor),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        self.index
            .hash_path(a)
            .to_string()
            .cmp(&self.index.hash_path(b).to_string())
            .then(a.cmp(&b))
    }

    pub fn is_target_game(&self, id: FileId) -> bool {
        self.index
            .archive_of(id)
            .game()
            .is_some_and(|g| g.eq_ignore_ascii_case(self.game))
    }

    /// The best candidate under this policy.
    pub fn best(&self, candidates: &[FileId], source_name: &str) -> Option<FileId> {
        candidates
            .iter()
            .copied()
            .min_by(|a, b| self.compare(*a, *b, source_name))
    }
}

/// Points a file at an archive entry with identical content.
pub struct DirectMatch {
    ctx: Arc<CompilerContext>,
}

impl DirectMatch {
    pub fn new(ctx: Arc<CompilerContext>) -> Self {
        Self { ctx }
    }
}

impl CompilationStep for DirectMatch {
    fn name(&self) -> &'static str {
        "DirectMatch"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        let index = &self.ctx.index;
        let candidates = index.by_hash(&source.hash);
        let breaker = TieBreaker {
            index,
            rules: &self.ctx.settings.tie_break,
            game: &self.ctx.settings.game,
        };
        let Some(best) = breaker.best(candidates, source.path.file_name()) else {
            return Ok(None);
        };

        let archive_hash_path = index.hash_path(best);
        tracing::debug!(
            "{} matched {} of {} candidate(s)",
            source.path,
            archive_hash_path,
            candidates.len()
        );
        Ok(Some(directive_for(
            source,
            DirectiveKind::FromArchive { archive_hash_path },
        )))
    }
}
