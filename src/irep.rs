//! `IRep` — the immediate representation of one compiled procedure.
//!
//! Bundles a name, an argument-count/layout description, and a piece of
//! compiled code. `IRep` owns its four growable arrays directly and nests
//! its child closures inline (`irep[]`) rather than indexing into a flat
//! function table, because this crate produces the tree a separate VM will
//! later walk rather than executing it itself.

use crate::{intern::SymbolId, opcode::Opcode, value::Value};

/// The compiled form of one lambda (including the synthetic top-level one).
#[derive(Debug, Clone)]
pub struct IRep {
    /// `None` for `(anonymous lambda)`.
    pub name: Option<SymbolId>,
    /// Whether the last formal parameter collects a rest-argument list.
    pub varg: bool,
    /// One plus the positional parameter count — slot 0 is the closure/self
    /// register.
    pub argc: u32,
    /// Number of `define`d locals (not counting args or captures).
    pub localc: u32,
    /// Number of captured upvalues.
    pub capturec: u32,
    pub code: Vec<Opcode>,
    /// Boxed constants not encodable directly in an opcode operand.
    pub pool: Vec<Value>,
    /// Symbols referenced by `Gref`/`Gset` indices, in first-reference order.
    pub syms: Vec<SymbolId>,
    /// Child closures, indexed by the `index` operand of `Opcode::Lambda`,
    /// in order of first emission.
    pub irep: Vec<IRep>,
}

impl IRep {
    /// Builds an `IRep` from already-finalized buffers. Callers are
    /// expected to come from [`crate::codegen::context::CodegenContext::finish`],
    /// which is the only place that should ever construct one directly.
    #[must_use]
    pub fn new(
        name: Option<SymbolId>,
        varg: bool,
        argc: u32,
        localc: u32,
        capturec: u32,
        code: Vec<Opcode>,
        pool: Vec<Value>,
        syms: Vec<SymbolId>,
        irep: Vec<IRep>,
    ) -> Self {
        Self {
            name,
            varg,
            argc,
            localc,
            capturec,
            code,
            pool,
            syms,
            irep,
        }
    }

    #[must_use]
    pub fn code_len(&self) -> usize {
        self.code.len()
    }
}
