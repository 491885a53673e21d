//! The analyzed AST: a tagged tree produced by the analyzer and consumed by
//! codegen. Nothing here inspects bytecode and nothing in codegen re-derives
//! scope information — the tag is the entire contract between the two
//! phases.
//!
//! # Deferred lambdas and the arena
//!
//! Lambda bodies are compiled *after* the enclosing body, so a lambda form
//! is first represented by a reserved slot in [`LambdaArena`] and only
//! later filled in once deferred analysis of that body completes.
//! [`LambdaId`] is the index into that arena. Indirection through an
//! arena + index rather than an in-place mutable node is preferred because
//! it also solves the cycle problem uniformly: `Node::Lambda(LambdaId)`
//! never needs to be mutated after creation — only the arena slot it points
//! to is filled in later.

use crate::{intern::SymbolId, value::Value};

/// Index of one lambda's metadata inside a [`LambdaArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LambdaId(u32);

impl LambdaId {
    fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).expect("lambda arena exceeds u32::MAX entries"))
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owns every `LAMBDA` node's metadata for one compilation, keyed by
/// [`LambdaId`]. Slots are reserved (as `None`) the moment a lambda form is
/// first seen and filled in once deferred analysis finishes that body — by
/// the time analysis as a whole returns, every slot is `Some`.
#[derive(Debug, Default)]
pub struct LambdaArena {
    slots: Vec<Option<LambdaNode>>,
}

impl LambdaArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a new, not-yet-compiled slot and returns its id.
    pub fn reserve(&mut self) -> LambdaId {
        let id = LambdaId::from_index(self.slots.len());
        self.slots.push(None);
        id
    }

    /// Fills a reserved slot with its compiled body. Filling an
    /// already-filled slot is a bug in the analyzer (every id is reserved
    /// and filled exactly once).
    pub fn fill(&mut self, id: LambdaId, node: LambdaNode) {
        let slot = &mut self.slots[id.index()];
        assert!(slot.is_none(), "lambda arena slot filled twice");
        *slot = Some(node);
    }

    /// Looks up a lambda's metadata. Panics if called before `fill` — valid
    /// only once the whole analysis pass (including its deferred queue) has
    /// finished.
    #[must_use]
    pub fn get(&self, id: LambdaId) -> &LambdaNode {
        self.slots[id.index()]
            .as_ref()
            .expect("lambda arena slot read before deferred analysis filled it")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Body and closure metadata for one `LAMBDA` node.
#[derive(Debug, Clone)]
pub struct LambdaNode {
    /// `None` renders as `(anonymous lambda)` at the `IRep` level.
    pub name: Option<SymbolId>,
    pub args: Vec<SymbolId>,
    pub locals: Vec<SymbolId>,
    pub varg: bool,
    pub captures: Vec<SymbolId>,
    pub body: Box<Node>,
}

/// A reference target: the left-hand side of `SETBANG`, or a bare variable
/// reference. Kept distinct from `Node` because `SETBANG`'s var-node
/// position is restricted to exactly these three shapes; nothing else can
/// appear there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRef {
    Global(SymbolId),
    Local(SymbolId),
    Captured { depth: u32, sym: SymbolId },
}

/// One node of the analyzed AST.
#[derive(Debug, Clone)]
pub enum Node {
    Gref(SymbolId),
    Lref(SymbolId),
    Cref { depth: u32, sym: SymbolId },
    Setbang(VarRef, Box<Node>),
    Lambda(LambdaId),
    If(Box<Node>, Box<Node>, Box<Node>),
    Begin(Vec<Node>),
    Quote(Value),
    Call(Box<Node>, Vec<Node>),
    Tailcall(Box<Node>, Vec<Node>),
    CallWithValues(Box<Node>, Box<Node>),
    TailcallWithValues(Box<Node>, Box<Node>),
    Return(Vec<Node>),
    Cons(Box<Node>, Box<Node>),
    Car(Box<Node>),
    Cdr(Box<Node>),
    Nilp(Box<Node>),
    Symbolp(Box<Node>),
    Pairp(Box<Node>),
    Add(Box<Node>, Box<Node>),
    Sub(Box<Node>, Box<Node>),
    Mul(Box<Node>, Box<Node>),
    Div(Box<Node>, Box<Node>),
    /// Unary negation, the `(- x)` one-argument case.
    Minus(Box<Node>),
    Eq(Box<Node>, Box<Node>),
    Lt(Box<Node>, Box<Node>),
    Le(Box<Node>, Box<Node>),
    /// Kept distinct from `Lt` with swapped operands in the tree itself —
    /// codegen does the swap, the tree preserves source order for anything
    /// that might want to inspect it before codegen runs.
    Gt(Box<Node>, Box<Node>),
    Ge(Box<Node>, Box<Node>),
    Not(Box<Node>),
}

impl Node {
    /// True for tags that propagate tail status internally and therefore
    /// must never be wrapped in an extra `RETURN`.
    #[must_use]
    pub fn is_tail_propagating(&self) -> bool {
        matches!(
            self,
            Self::If(..) | Self::Begin(_) | Self::Tailcall(..) | Self::TailcallWithValues(..) | Self::Return(_)
        )
    }
}

/// The result of a complete [`crate::analyzer::analyze`] call: the tree plus
/// the arena every `Node::Lambda(id)` in it indexes into.
#[derive(Debug)]
pub struct AnalyzedProgram {
    pub root: Node,
    pub lambdas: LambdaArena,
}
