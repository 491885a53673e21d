//! The entry point chaining macroexpand → analyze → codegen into a single
//! `compile(host, expander, warnings, expr, lib) → procedure` call.

use crate::{
    analyzer, codegen,
    error::{CompileResult, WarningSink},
    host::Host,
    irep::IRep,
    tracer::{CompileTracer, NoopTracer},
    value::Value,
};

/// The macro expander is an external collaborator; this crate only needs
/// the ability to run it once, up front, over the whole expression. A host
/// with no macro layer at all can pass [`NoopExpander`].
pub trait MacroExpander {
    /// Expands `expr` against the `lib` environment, returning a form whose
    /// bound identifiers are already hygienically renamed.
    fn expand(&mut self, expr: &Value, lib: &Value) -> CompileResult<Value>;
}

/// An expander that performs no expansion — `expr` is assumed already
/// expanded (or the language/host has no macros). Lets tests and hosts
/// without a macro layer call [`compile`] directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExpander;

impl MacroExpander for NoopExpander {
    fn expand(&mut self, expr: &Value, _lib: &Value) -> CompileResult<Value> {
        Ok(expr.clone())
    }
}

/// A compiled top-level form, bound to its root [`IRep`]. The result is
/// wrapped in a callable procedure so top-level side effects execute only
/// when that procedure is invoked. This crate does not implement a VM, so
/// invocation itself is out of scope — `CompiledProcedure` only carries the
/// `IRep` an external VM would call.
#[derive(Debug, Clone)]
pub struct CompiledProcedure {
    pub irep: IRep,
}

/// Runs the full pipeline: macro expansion, then analysis, then codegen.
pub fn compile(
    host: &mut impl Host,
    expander: &mut impl MacroExpander,
    warnings: &mut impl WarningSink,
    expr: &Value,
    lib: &Value,
) -> CompileResult<CompiledProcedure> {
    compile_traced(host, expander, warnings, &mut NoopTracer, expr, lib)
}

/// Same as [`compile`] but reports [`crate::tracer::CompileStage`] events to
/// `tracer` across both phases.
pub fn compile_traced(
    host: &mut impl Host,
    expander: &mut impl MacroExpander,
    warnings: &mut impl WarningSink,
    tracer: &mut impl CompileTracer,
    expr: &Value,
    lib: &Value,
) -> CompileResult<CompiledProcedure> {
    let expanded = expander.expand(expr, lib)?;
    let ast = analyzer::analyze_traced(host, warnings, tracer, &expanded)?;
    let irep = codegen::codegen_traced(&ast, tracer)?;
    Ok(CompiledProcedure { irep })
}
