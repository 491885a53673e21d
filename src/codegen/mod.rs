//! The code generator: walks an [`AnalyzedProgram`] and emits a tree of
//! [`IRep`]s.
//!
//! The emit/patch-jump shape generalizes from a single flat byte buffer to a
//! stack of [`context::CodegenContext`] frames, one per lambda nesting
//! level, since this crate recurses into nested closures and hands back a
//! tree rather than one function's bytes.

pub mod context;

use crate::{
    ast::{AnalyzedProgram, LambdaArena, LambdaNode, Node, VarRef},
    error::{CompileError, CompileResult},
    intern::SymbolId,
    irep::IRep,
    opcode::{Opcode, PENDING_JUMP_OFFSET},
    tracer::{CompileStage, CompileTracer, NoopTracer},
    value::Value,
};
use context::CodegenContext;

/// The stack of active [`CodegenContext`] frames, one per lambda currently
/// being compiled (innermost last). Parallels
/// [`crate::analyzer::scope::ScopeStack`]; `depth`-addressed captures walk
/// this stack the same way `CREF` depths walk the analyzer's scope chain.
struct ContextStack {
    frames: Vec<CodegenContext>,
}

impl ContextStack {
    fn new() -> Self {
        Self { frames: Vec::new() }
    }

    fn push(&mut self, name: Option<SymbolId>, args: Vec<SymbolId>, locals: Vec<SymbolId>, varg: bool, captures: Vec<SymbolId>) {
        self.frames.push(CodegenContext::new(name, args, locals, varg, captures));
    }

    /// # Panics
    /// Panics if the stack is empty — a bug in the caller.
    fn pop(&mut self) -> IRep {
        self.frames.pop().expect("context stack popped while empty").finish()
    }

    fn current(&self) -> &CodegenContext {
        self.frames.last().expect("context stack read while empty")
    }

    fn current_mut(&mut self) -> &mut CodegenContext {
        self.frames.last_mut().expect("context stack read while empty")
    }

    /// Walks `depth` frames outward from the innermost, then resolves `sym`
    /// within that frame's `captures`.
    fn index_capture(&self, sym: SymbolId, depth: u32) -> u32 {
        let i = self.frames.len() - 1 - depth as usize;
        self.frames[i].index_capture_in(sym)
    }
}

/// Runs codegen over `ast`, returning the root [`IRep`]. The
/// macroexpand/analyze steps that precede this live in [`crate::compile`].
pub fn codegen(ast: &AnalyzedProgram) -> CompileResult<IRep> {
    codegen_traced(ast, &mut NoopTracer)
}

/// Same as [`codegen`] but reports [`CompileStage`] events to `tracer`.
pub fn codegen_traced(ast: &AnalyzedProgram, tracer: &mut impl CompileTracer) -> CompileResult<IRep> {
    let mut cg = Codegen { stack: ContextStack::new(), tracer };
    cg.tracer.on_stage(CompileStage::CodegenEnter { name: None });
    cg.stack.push(None, Vec::new(), Vec::new(), false, Vec::new());
    cg.compile_node(&ast.lambdas, &ast.root)?;
    let irep = cg.stack.pop();
    cg.tracer.on_stage(CompileStage::CodegenDone { code_len: irep.code_len(), child_ireps: irep.irep.len() });
    Ok(irep)
}

struct Codegen<'t, T: CompileTracer> {
    stack: ContextStack,
    tracer: &'t mut T,
}

impl<T: CompileTracer> Codegen<'_, T> {
    fn compile_lambda(&mut self, lambdas: &LambdaArena, node: &LambdaNode) -> CompileResult<IRep> {
        self.tracer.on_stage(CompileStage::CodegenEnter { name: node.name });
        self.stack.push(node.name, node.args.clone(), node.locals.clone(), node.varg, node.captures.clone());
        self.compile_node(lambdas, &node.body)?;
        let irep = self.stack.pop();
        self.tracer.on_stage(CompileStage::CodegenDone { code_len: irep.code_len(), child_ireps: irep.irep.len() });
        Ok(irep)
    }

    /// The dispatch-by-tag table.
    fn compile_node(&mut self, lambdas: &LambdaArena, node: &Node) -> CompileResult<()> {
        match node {
            Node::Gref(sym) => {
                let idx = self.stack.current_mut().index_symbol(*sym);
                self.stack.current_mut().emit(Opcode::Gref(idx));
            }
            Node::Lref(sym) => self.emit_lref(*sym)?,
            Node::Cref { depth, sym } => {
                let idx = self.stack.index_capture(*sym, *depth);
                self.stack.current_mut().emit(Opcode::Cref { depth: *depth, index: idx });
            }
            Node::Setbang(target, value) => {
                self.compile_node(lambdas, value)?;
                self.emit_set(target)?;
                self.stack.current_mut().emit(Opcode::pushnone());
            }
            Node::Lambda(id) => self.compile_nested_lambda(lambdas, *id)?,
            Node::If(c, t, e) => self.compile_if(lambdas, c, t, e)?,
            Node::Begin(es) => {
                for (i, e) in es.iter().enumerate() {
                    if i > 0 {
                        self.stack.current_mut().emit(Opcode::Pop);
                    }
                    self.compile_node(lambdas, e)?;
                }
            }
            Node::Quote(v) => self.compile_quote(v),
            Node::Cons(a, b) => self.compile_binary(lambdas, a, b, Opcode::Cons)?,
            Node::Car(a) => self.compile_unary(lambdas, a, Opcode::Car)?,
            Node::Cdr(a) => self.compile_unary(lambdas, a, Opcode::Cdr)?,
            Node::Nilp(a) => self.compile_unary(lambdas, a, Opcode::Nilp)?,
            Node::Symbolp(a) => self.compile_unary(lambdas, a, Opcode::Symbolp)?,
            Node::Pairp(a) => self.compile_unary(lambdas, a, Opcode::Pairp)?,
            Node::Not(a) => self.compile_unary(lambdas, a, Opcode::Not)?,
            Node::Minus(a) => self.compile_unary(lambdas, a, Opcode::Minus)?,
            Node::Add(a, b) => self.compile_binary(lambdas, a, b, Opcode::Add)?,
            Node::Sub(a, b) => self.compile_binary(lambdas, a, b, Opcode::Sub)?,
            Node::Mul(a, b) => self.compile_binary(lambdas, a, b, Opcode::Mul)?,
            Node::Div(a, b) => self.compile_binary(lambdas, a, b, Opcode::Div)?,
            Node::Eq(a, b) => self.compile_binary(lambdas, a, b, Opcode::Eq)?,
            Node::Lt(a, b) => self.compile_binary(lambdas, a, b, Opcode::Lt)?,
            Node::Le(a, b) => self.compile_binary(lambdas, a, b, Opcode::Le)?,
            // `>`/`>=` swap operand order and reuse LT/LE.
            Node::Gt(a, b) => self.compile_binary(lambdas, b, a, Opcode::Lt)?,
            Node::Ge(a, b) => self.compile_binary(lambdas, b, a, Opcode::Le)?,
            Node::Call(callee, args) => self.compile_call(lambdas, callee, args, Opcode::Call)?,
            Node::Tailcall(callee, args) => self.compile_call(lambdas, callee, args, Opcode::Tailcall)?,
            Node::CallWithValues(p, c) => self.compile_call_with_values(lambdas, p, c, Opcode::Call(-1))?,
            Node::TailcallWithValues(p, c) => self.compile_call_with_values(lambdas, p, c, Opcode::Tailcall(-1))?,
            Node::Return(es) => {
                for e in es {
                    self.compile_node(lambdas, e)?;
                }
                let n = u32::try_from(es.len()).expect("return arity exceeds u32::MAX");
                self.stack.current_mut().emit(Opcode::Ret(n));
            }
        }
        Ok(())
    }

    /// `LREF` self-capture rule: a reference to a variable
    /// this very frame captures (for its own nested lambdas) is read back
    /// through the capture area, not through its original arg/local slot.
    fn emit_lref(&mut self, sym: SymbolId) -> CompileResult<()> {
        let op = if let Some(slot) = self.stack.current().self_capture_slot(sym) {
            Opcode::Lref(slot)
        } else {
            let idx = self
                .stack
                .current()
                .index_local(sym)
                .ok_or_else(|| CompileError::internal("LREF target not found among this frame's args/locals"))?;
            Opcode::Lref(idx)
        };
        self.stack.current_mut().emit(op);
        Ok(())
    }

    fn emit_set(&mut self, target: &VarRef) -> CompileResult<()> {
        let op = match *target {
            VarRef::Global(sym) => {
                let idx = self.stack.current_mut().index_symbol(sym);
                Opcode::Gset(idx)
            }
            VarRef::Local(sym) => {
                if let Some(slot) = self.stack.current().self_capture_slot(sym) {
                    Opcode::Lset(slot)
                } else {
                    let idx = self
                        .stack
                        .current()
                        .index_local(sym)
                        .ok_or_else(|| CompileError::internal("LSET target not found among this frame's args/locals"))?;
                    Opcode::Lset(idx)
                }
            }
            VarRef::Captured { depth, sym } => {
                let idx = self.stack.index_capture(sym, depth);
                Opcode::Cset { depth, index: idx }
            }
        };
        self.stack.current_mut().emit(op);
        Ok(())
    }

    fn compile_nested_lambda(&mut self, lambdas: &LambdaArena, id: crate::ast::LambdaId) -> CompileResult<()> {
        let lambda_node = lambdas.get(id);
        let slot = self.stack.current().next_irep_slot();
        self.stack.current_mut().emit(Opcode::Lambda(slot));
        let child = self.compile_lambda(lambdas, lambda_node)?;
        self.stack.current_mut().push_child_irep(child);
        Ok(())
    }

    /// The else branch is emitted physically before the
    /// then branch so a single `JMPIF` can skip straight to it.
    fn compile_if(&mut self, lambdas: &LambdaArena, c: &Node, t: &Node, e: &Node) -> CompileResult<()> {
        self.compile_node(lambdas, c)?;
        let jmpif_at = self.stack.current_mut().reserve_jump(Opcode::Jmpif(PENDING_JUMP_OFFSET));
        self.compile_node(lambdas, e)?;
        let jmp_at = self.stack.current_mut().reserve_jump(Opcode::Jmp(PENDING_JUMP_OFFSET));
        self.stack.current_mut().patch_jump(jmpif_at);
        self.compile_node(lambdas, t)?;
        self.stack.current_mut().patch_jump(jmp_at);
        Ok(())
    }

    fn compile_quote(&mut self, v: &Value) {
        let op = match v {
            Value::Bool(true) => Opcode::Pushtrue,
            Value::Bool(false) => Opcode::Pushfalse,
            Value::Int(n) => Opcode::Pushint(*n),
            Value::Char(c) => Opcode::Pushchar(*c),
            Value::Nil => Opcode::Pushnil,
            other => {
                let idx = self.stack.current_mut().push_const(other.clone());
                Opcode::Pushconst(idx)
            }
        };
        self.stack.current_mut().emit(op);
    }

    fn compile_unary(&mut self, lambdas: &LambdaArena, a: &Node, op: Opcode) -> CompileResult<()> {
        self.compile_node(lambdas, a)?;
        self.stack.current_mut().emit(op);
        Ok(())
    }

    fn compile_binary(&mut self, lambdas: &LambdaArena, a: &Node, b: &Node, op: Opcode) -> CompileResult<()> {
        self.compile_node(lambdas, a)?;
        self.compile_node(lambdas, b)?;
        self.stack.current_mut().emit(op);
        Ok(())
    }

    fn compile_call(&mut self, lambdas: &LambdaArena, callee: &Node, args: &[Node], make_op: fn(i32) -> Opcode) -> CompileResult<()> {
        self.compile_node(lambdas, callee)?;
        for a in args {
            self.compile_node(lambdas, a)?;
        }
        let n = i32::try_from(args.len()).expect("argument count exceeds i32::MAX");
        self.stack.current_mut().emit(make_op(n));
        Ok(())
    }

    /// `producer`/`consumer`: consumer emitted first, then
    /// producer, then `CALL 1` to invoke the producer, then the
    /// caller-supplied variadic-from-stack call to invoke the consumer.
    fn compile_call_with_values(&mut self, lambdas: &LambdaArena, producer: &Node, consumer: &Node, consumer_op: Opcode) -> CompileResult<()> {
        self.compile_node(lambdas, consumer)?;
        self.compile_node(lambdas, producer)?;
        self.stack.current_mut().emit(Opcode::Call(1));
        self.stack.current_mut().emit(consumer_op);
        Ok(())
    }
}
