//! The compilation step trait and the first-match-wins step stack.

use crate::context::CompilerContext;
use crate::directive::{Directive, DirectiveKind};
use crate::error::Result;
use crate::source::RawSourceFile;
use crate::steps::StepConfig;
use std::sync::Arc;

/// Reason attached to files that fall off the end of a stack.
pub const NO_MATCH_REASON: &str = "No Match in Stack";

/// One matching rule.
///
/// A step's decision depends only on how it was constructed and on the record
/// it is given. `Ok(None)` means the step has no opinion and the next step is
/// tried; `Err` is reserved for conditions that should abort this record.
pub trait CompilationStep: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>>;
}

/// Ordered steps. The first step with an opinion decides.
pub struct Stack {
    steps: Vec<Box<dyn CompilationStep>>,
}

impl Stack {
    pub fn new(steps: Vec<Box<dyn CompilationStep>>) -> Self {
        Self { steps }
    }

    /// Instantiate every config in order. Expensive lookups are built here,
    /// once, rather than per record.
    pub fn from_configs(configs: &[StepConfig], ctx: &Arc<CompilerContext>) -> Result<Self> {
        let steps = configs
            .iter()
            .map(|config| config.build(ctx))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!("Built stack with {} steps", steps.len());
        Ok(Self { steps })
    }

    /// Resolve a record to exactly one directive.
    pub fn resolve(&self, source: &RawSourceFile) -> Result<Directive> {
        for step in &self.steps {
            if let Some(directive) = step.run(source)? {
                tracing::trace!("{} -> {} ({})", source.path, directive.type_name(), step.name());
                return Ok(directive);
            }
        }
        Ok(Directive::new(
            source.path.clone(),
            source.hash,
            source.size,
            DirectiveKind::NoMatch {
                reason: NO_MATCH_REASON.to_string(),
            },
        ))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
