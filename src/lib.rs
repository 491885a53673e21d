//! The compiler core of a Scheme-family interpreter: the pipeline that turns
//! a fully macro-expanded Scheme form into a tree of [`irep::IRep`] bytecode
//! records ready for a separate virtual machine to execute.
//!
//! Two phases, strictly sequenced:
//! - [`analyzer`] resolves variable scoping and capture, detects tail calls,
//!   recognizes built-in primitives safely against shadowing, and produces
//!   an [`ast::AnalyzedProgram`].
//! - [`codegen`] walks that tree and emits opcodes into a nested [`irep::IRep`].
//!
//! [`compile::compile`] chains macro expansion (a host-provided
//! [`compile::MacroExpander`]) through both phases.

pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod compile;
pub mod error;
pub mod host;
pub mod intern;
pub mod irep;
pub mod opcode;
pub mod tracer;
pub mod value;

pub use crate::{
    analyzer::analyze,
    ast::AnalyzedProgram,
    codegen::codegen,
    compile::{compile, CompiledProcedure, MacroExpander, NoopExpander},
    error::{CompileError, CompileResult, Warning, WarningSink},
    host::Host,
    intern::{Interner, SymbolId},
    irep::IRep,
    opcode::Opcode,
    tracer::{CompileStage, CompileTracer, NoopTracer, StderrTracer},
    value::Value,
};
