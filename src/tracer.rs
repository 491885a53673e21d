//! Compilation tracing infrastructure: an optional hook that writes
//! compilation stages to a diagnostic stream.
//!
//! Split into `NoopTracer` as a zero-cost production default and
//! `StderrTracer` for interactive debugging, scoped to the two phases this
//! crate has: analysis and codegen.

use crate::{error::Warning, intern::SymbolId};

/// One notable event during a single compilation.
#[derive(Debug, Clone)]
pub enum CompileStage {
    /// The analyzer entered a lambda body (root or nested).
    AnalyzeEnter { name: Option<SymbolId> },
    /// The analyzer finished a lambda body, about to flush its defer queue.
    AnalyzeDeferred { pending: usize },
    /// Codegen pushed a fresh context for a lambda body.
    CodegenEnter { name: Option<SymbolId> },
    /// Codegen finished a lambda body and materialized its `IRep`.
    CodegenDone { code_len: usize, child_ireps: usize },
    /// A non-fatal warning was raised (duplicated here for a single trace feed;
    /// the authoritative sink is still [`crate::error::WarningSink`]).
    Warning(Warning),
}

/// Receives [`CompileStage`] events as compilation proceeds.
///
/// All methods have a default no-op body so [`NoopTracer`] costs nothing;
/// implementations override only the hook they care about.
pub trait CompileTracer {
    fn on_stage(&mut self, _stage: CompileStage) {}
}

/// Zero-cost production default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl CompileTracer for NoopTracer {}

/// Prints each stage to stderr as it happens — useful for watching the
/// analyzer/codegen pipeline work through a form interactively.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CompileTracer for StderrTracer {
    fn on_stage(&mut self, stage: CompileStage) {
        match stage {
            CompileStage::AnalyzeEnter { name } => eprintln!("[analyze] entering lambda {name:?}"),
            CompileStage::AnalyzeDeferred { pending } => eprintln!("[analyze] flushing {pending} deferred lambda(s)"),
            CompileStage::CodegenEnter { name } => eprintln!("[codegen] entering lambda {name:?}"),
            CompileStage::CodegenDone { code_len, child_ireps } => {
                eprintln!("[codegen] irep done: {code_len} opcodes, {child_ireps} child irep(s)");
            }
            CompileStage::Warning(warning) => eprintln!("[warn] {warning:?}"),
        }
    }
}
