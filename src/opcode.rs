//! The opcode set emitted by codegen.
//!
//! Consumed by a separate VM this crate does not implement, so there is no
//! byte-packing requirement: `Opcode` carries its operands directly as enum
//! payload rather than a packed discriminant, a tagged instruction with one
//! of a handful of operand shapes — none, integer, character, or a
//! `(depth, index)` pair.

/// One instruction in an `IRep`'s `code[]` array.
///
/// `Call`/`Tailcall`'s argument count is `i32` rather than `u32` because
/// `-1` is a VM-level sentinel meaning "argument count comes from the
/// stack-top marker the producer left" (the `call-with-values` convention)
/// — not a literal negative arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Reference to a local-frame slot (arg, local, or self-capture slot).
    Lref(u32),
    /// Assignment to a local-frame slot.
    Lset(u32),
    /// Reference to a global, by index into the current `IRep`'s `syms[]`.
    Gref(u32),
    /// Assignment to a global, by index into the current `IRep`'s `syms[]`.
    Gset(u32),
    /// Reference to a captured variable `depth` frames outward, at `index`
    /// in that frame's `captures` list.
    Cref { depth: u32, index: u32 },
    /// Assignment to a captured variable, same addressing as `Cref`.
    Cset { depth: u32, index: u32 },
    Pushnil,
    Pushtrue,
    Pushfalse,
    Pushint(i64),
    Pushchar(char),
    /// Push a boxed constant from the current `IRep`'s `pool[]`.
    Pushconst(u32),
    /// Push a closure over child `IRep` number `index` in `irep[]`.
    Lambda(u32),
    /// Relative conditional jump: pop the top of stack, jump if truthy.
    /// The operand is a byte/instruction-agnostic offset counted in opcodes,
    /// patched once both branches are emitted.
    Jmpif(i32),
    /// Relative unconditional jump, same offset convention as `Jmpif`.
    Jmp(i32),
    Pop,
    Cons,
    Car,
    Cdr,
    Nilp,
    Symbolp,
    Pairp,
    Add,
    Sub,
    Mul,
    Div,
    /// Unary negation (the `(- x)` one-argument case).
    Minus,
    Eq,
    Lt,
    Le,
    Not,
    /// Applies the callee with `argc` arguments. `argc == -1` means
    /// "variadic, read the count off the stack marker the producer left"
    /// (the `call-with-values` consumer convention).
    Call(i32),
    /// Same as `Call` but in tail position — the VM reuses the current frame.
    Tailcall(i32),
    /// Returns `n` values from the current `IRep`.
    Ret(u32),
}

impl Opcode {
    /// `PUSHNONE` is an alias for `PUSHFALSE`: the unspecified
    /// value is represented as `#f` at the bytecode level. There is no
    /// separate `Opcode` variant for it, so the two can never diverge.
    #[must_use]
    pub fn pushnone() -> Self {
        Self::Pushfalse
    }
}

/// Placeholder used while a `Jmp`/`Jmpif` target is not yet known.
pub(crate) const PENDING_JUMP_OFFSET: i32 = 0;
