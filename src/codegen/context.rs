//! The codegen context stack.
//!
//! Mirrors [`crate::analyzer::scope::ScopeStack`] in shape — a growable
//! `Vec` of frames rather than parent-pointer-linked nodes — but each frame
//! here accumulates the four buffers an [`crate::irep::IRep`] is eventually
//! materialized from, built up incrementally and handed to `finish()` once
//! the body is fully compiled.

use crate::{intern::SymbolId, irep::IRep, opcode::Opcode, value::Value};

/// One frame of codegen state for a lambda body being compiled.
pub struct CodegenContext {
    name: Option<SymbolId>,
    args: Vec<SymbolId>,
    locals: Vec<SymbolId>,
    varg: bool,
    /// Pre-populated before the body is compiled: the set of outer-scope
    /// variables this lambda's nested closures capture.
    captures: Vec<SymbolId>,
    code: Vec<Opcode>,
    pool: Vec<Value>,
    syms: Vec<SymbolId>,
    irep: Vec<IRep>,
}

impl CodegenContext {
    /// Allocates a context and immediately emits the activation prelude.
    /// `captures` is pre-populated from the analyzer's
    /// `LambdaNode::captures` — nothing here recomputes it.
    #[must_use]
    pub fn new(name: Option<SymbolId>, args: Vec<SymbolId>, locals: Vec<SymbolId>, varg: bool, captures: Vec<SymbolId>) -> Self {
        let mut ctx = Self { name, args, locals, varg, captures, code: Vec::new(), pool: Vec::new(), syms: Vec::new(), irep: Vec::new() };
        ctx.emit_activation_prelude();
        ctx
    }

    /// For each captured symbol, copy its incoming argument
    /// slot into the capture area, or push a placeholder for a capture that
    /// isn't an argument (a `define`d local captured before it's assigned).
    fn emit_activation_prelude(&mut self) {
        for i in 0..self.captures.len() {
            let sym = self.captures[i];
            match self.index_local(sym) {
                Some(n) if self.is_argument_slot(n) => self.emit(Opcode::Lref(n)),
                _ => self.emit(Opcode::pushnone()),
            }
        }
    }

    /// True for `1 ≤ n ≤ |args|`, or the rest-arg slot `|args|+1` when `varg`.
    fn is_argument_slot(&self, n: u32) -> bool {
        let argc = self.args.len() as u32;
        (1..=argc).contains(&n) || (self.varg && n == argc + 1)
    }

    /// Searches `args` (offset 1), then `locals` (offset `|args|+1`).
    #[must_use]
    pub fn index_local(&self, sym: SymbolId) -> Option<u32> {
        if let Some(pos) = self.args.iter().position(|&a| a == sym) {
            return Some(u32::try_from(pos).expect("arg count exceeds u32::MAX") + 1);
        }
        if let Some(pos) = self.locals.iter().position(|&l| l == sym) {
            let base = u32::try_from(self.args.len()).expect("arg count exceeds u32::MAX") + 1;
            return Some(base + u32::try_from(pos).expect("local count exceeds u32::MAX"));
        }
        None
    }

    /// The physical slot of `sym` if it is captured by *this* frame (a
    /// self-capture): `|args|+|locals|+1+i`.
    #[must_use]
    pub fn self_capture_slot(&self, sym: SymbolId) -> Option<u32> {
        let i = self.captures.iter().position(|&c| c == sym)?;
        Some(self.capture_area_base() + u32::try_from(i).expect("capture count exceeds u32::MAX"))
    }

    fn capture_area_base(&self) -> u32 {
        u32::try_from(self.args.len() + self.locals.len()).expect("frame size exceeds u32::MAX") + 1
    }

    /// Linear-scans the `captures` list of the frame `depth` contexts
    /// outward (`0` is unused here — this is only ever called by the caller
    /// that already holds the outward frame).
    #[must_use]
    pub fn index_capture_in(&self, sym: SymbolId) -> u32 {
        let pos = self.captures.iter().position(|&c| c == sym).expect("CREF target must be in this frame's captures");
        u32::try_from(pos).expect("capture count exceeds u32::MAX")
    }

    /// Looks up or appends `sym` in `syms`.
    pub fn index_symbol(&mut self, sym: SymbolId) -> u32 {
        if let Some(pos) = self.syms.iter().position(|&s| s == sym) {
            return u32::try_from(pos).expect("symbol table exceeds u32::MAX entries");
        }
        self.syms.push(sym);
        u32::try_from(self.syms.len() - 1).expect("symbol table exceeds u32::MAX entries")
    }

    /// Interns a non-inlineable constant into `pool`, returning its index.
    /// Unlike `syms`, the pool is append-only — callers only reach it for
    /// `QUOTE` data, which is never deduplicated against earlier constants.
    pub fn push_const(&mut self, value: Value) -> u32 {
        self.pool.push(value);
        u32::try_from(self.pool.len() - 1).expect("constant pool exceeds u32::MAX entries")
    }

    /// Reserves the next child-`IRep` slot, to be filled by
    /// [`Self::push_child_irep`] once that lambda's body is compiled.
    #[must_use]
    pub fn next_irep_slot(&self) -> u32 {
        u32::try_from(self.irep.len()).expect("irep table exceeds u32::MAX entries")
    }

    pub fn push_child_irep(&mut self, child: IRep) {
        self.irep.push(child);
    }

    pub fn emit(&mut self, op: Opcode) {
        self.code.push(op);
    }

    #[must_use]
    pub fn pc(&self) -> usize {
        self.code.len()
    }

    /// Patches a previously-emitted `Jmp`/`Jmpif` at `at` to a relative
    /// offset computed from the current program counter.
    ///
    /// # Panics
    /// Panics if `at` is not a `Jmp`/`Jmpif` — a codegen bug, since only
    /// `Self::reserve_jump` hands out patchable indices.
    pub fn patch_jump(&mut self, at: usize) {
        let offset = i32::try_from(self.code.len() - at).expect("jump offset exceeds i32::MAX");
        match &mut self.code[at] {
            Opcode::Jmp(target) | Opcode::Jmpif(target) => *target = offset,
            other => panic!("patch_jump called on non-jump opcode {other:?}"),
        }
    }

    /// Emits a placeholder jump and returns its index for later
    /// [`Self::patch_jump`].
    pub fn reserve_jump(&mut self, op: Opcode) -> usize {
        let at = self.code.len();
        debug_assert!(matches!(op, Opcode::Jmp(_) | Opcode::Jmpif(_)));
        self.code.push(op);
        at
    }

    /// Materializes the accumulated buffers into a finished [`IRep`].
    #[must_use]
    pub fn finish(self) -> IRep {
        let argc = u32::try_from(self.args.len()).expect("arg count exceeds u32::MAX") + 1;
        let localc = u32::try_from(self.locals.len()).expect("local count exceeds u32::MAX");
        let capturec = u32::try_from(self.captures.len()).expect("capture count exceeds u32::MAX");
        IRep::new(self.name, self.varg, argc, localc, capturec, self.code, self.pool, self.syms, self.irep)
    }
}
