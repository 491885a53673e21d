//! The analyzer: turns an expanded [`Value`] tree into an
//! [`AnalyzedProgram`].
//!
//! Resolves variable scoping (local / global / captured) and builds the
//! analyzed tree around [`scope::ScopeStack`] and [`crate::ast::LambdaArena`]
//! as a standalone output type, rather than annotating the input expression
//! tree in place, because the analyzed tree is this crate's public output
//! rather than an internal pass over its own expression type.

pub mod scope;

use crate::{
    ast::{AnalyzedProgram, LambdaNode, Node, VarRef},
    error::{CompileError, CompileResult, Warning, WarningSink},
    host::Host,
    intern::SymbolId,
    tracer::{CompileStage, CompileTracer},
    value::Value,
};
use scope::{Binding, DeferredLambda, ScopeStack};

/// Renamed identities of the base-library bindings the analyzer special-cases.
/// Resolving these is the analyzer's first act; a missing one is a fatal
/// setup error, not something the input expression can trigger.
#[derive(Debug, Clone, Copy)]
struct Primitives {
    cons: SymbolId,
    car: SymbolId,
    cdr: SymbolId,
    nullp: SymbolId,
    symbolp: SymbolId,
    pairp: SymbolId,
    add: SymbolId,
    sub: SymbolId,
    mul: SymbolId,
    div: SymbolId,
    eq: SymbolId,
    lt: SymbolId,
    le: SymbolId,
    gt: SymbolId,
    ge: SymbolId,
    not: SymbolId,
    values: SymbolId,
    call_with_values: SymbolId,
}

impl Primitives {
    fn resolve(host: &impl Host) -> CompileResult<Self> {
        let find = |name: &'static str| -> CompileResult<SymbolId> {
            host.find_rename(name)
                .ok_or_else(|| CompileError::internal(format!("no rename found for base-library primitive `{name}`")))
        };
        Ok(Self {
            cons: find("cons")?,
            car: find("car")?,
            cdr: find("cdr")?,
            nullp: find("null?")?,
            symbolp: find("symbol?")?,
            pairp: find("pair?")?,
            add: find("+")?,
            sub: find("-")?,
            mul: find("*")?,
            div: find("/")?,
            eq: find("=")?,
            lt: find("<")?,
            le: find("<=")?,
            gt: find(">")?,
            ge: find(">=")?,
            not: find("not")?,
            values: find("values")?,
            call_with_values: find("call-with-values")?,
        })
    }
}

/// Renamed identities of the special-form keywords.
#[derive(Debug, Clone, Copy)]
struct SpecialForms {
    define: SymbolId,
    lambda: SymbolId,
    if_: SymbolId,
    begin: SymbolId,
    set_bang: SymbolId,
    quote: SymbolId,
}

impl SpecialForms {
    fn resolve(host: &impl Host) -> CompileResult<Self> {
        let find = |name: &'static str| -> CompileResult<SymbolId> {
            host.find_rename(name)
                .ok_or_else(|| CompileError::internal(format!("no rename found for special form `{name}`")))
        };
        Ok(Self {
            define: find("define")?,
            lambda: find("lambda")?,
            if_: find("if")?,
            begin: find("begin")?,
            set_bang: find("set!")?,
            quote: find("quote")?,
        })
    }
}

/// Parses a `lambda` formals list into positional parameters and an optional
/// rest parameter. Accepts a proper list (no rest), a dotted list (trailing
/// rest), or a bare symbol (all-rest).
fn parse_formals(formals: &Value) -> CompileResult<(Vec<SymbolId>, Option<SymbolId>)> {
    let mut positional = Vec::new();
    let mut cursor = formals;
    loop {
        match cursor {
            Value::Nil => return Ok((positional, None)),
            Value::Symbol(sym) => {
                if positional.contains(sym) {
                    return Err(CompileError::invalid_formals("rest parameter repeats an earlier formal"));
                }
                return Ok((positional, Some(*sym)));
            }
            Value::Pair(car, cdr) => {
                let sym = car
                    .as_symbol()
                    .ok_or_else(|| CompileError::invalid_formals("formal parameter is not a symbol"))?;
                if positional.contains(&sym) {
                    return Err(CompileError::invalid_formals("duplicate formal parameter"));
                }
                positional.push(sym);
                cursor = cdr.as_ref();
            }
            _ => return Err(CompileError::invalid_formals("formals must be a list of symbols")),
        }
    }
}

/// Runs the analyzer over `expr`, returning the analyzed AST plus its lambda
/// arena.
pub fn analyze(host: &mut impl Host, warnings: &mut impl WarningSink, expr: &Value) -> CompileResult<AnalyzedProgram> {
    analyze_traced(host, warnings, &mut crate::tracer::NoopTracer, expr)
}

/// Same as [`analyze`] but reports [`CompileStage`] events to `tracer`.
pub fn analyze_traced(
    host: &mut impl Host,
    warnings: &mut impl WarningSink,
    tracer: &mut impl CompileTracer,
    expr: &Value,
) -> CompileResult<AnalyzedProgram> {
    let primitives = Primitives::resolve(host)?;
    let special_forms = SpecialForms::resolve(host)?;
    let mut state = State {
        host,
        warnings,
        tracer,
        scopes: ScopeStack::new(),
        lambdas: crate::ast::LambdaArena::new(),
        primitives,
        special_forms,
    };

    state.scopes.push(Vec::new(), false);
    let mut globals = state.host.global_symbols();
    globals.sort_by_key(|sym| sym.index());
    for sym in globals {
        state.scopes.declare_local(sym);
    }

    let root = state.analyze_expr(expr, true)?;
    state.flush_deferred()?;
    state.scopes.pop();

    Ok(AnalyzedProgram { root, lambdas: state.lambdas })
}

struct State<'h, H: Host, W: WarningSink, T: CompileTracer> {
    host: &'h mut H,
    warnings: &'h mut W,
    tracer: &'h mut T,
    scopes: ScopeStack,
    lambdas: crate::ast::LambdaArena,
    primitives: Primitives,
    special_forms: SpecialForms,
}

impl<H: Host, W: WarningSink, T: CompileTracer> State<'_, H, W, T> {
    fn analyze_expr(&mut self, expr: &Value, tail: bool) -> CompileResult<Node> {
        let node = match expr {
            Value::Symbol(sym) => self.analyze_var_ref(*sym)?,
            Value::Pair(..) => self.analyze_compound(expr, tail)?,
            Value::Bool(_) | Value::Int(_) | Value::Char(_) | Value::Nil | Value::Other(_) => Node::Quote(expr.clone()),
        };
        Ok(Self::normalize_tail(node, tail))
    }

    /// Boxes the result in `RETURN` unless it already propagates
    /// tail status on its own.
    fn normalize_tail(node: Node, tail: bool) -> Node {
        if tail && !node.is_tail_propagating() { Node::Return(vec![node]) } else { node }
    }

    fn analyze_var_ref(&mut self, sym: SymbolId) -> CompileResult<Node> {
        match self.scopes.find_var(sym) {
            Some(Binding::Local) => Ok(Node::Lref(sym)),
            Some(Binding::Captured { depth }) => Ok(Node::Cref { depth, sym }),
            Some(Binding::Global) => Ok(Node::Gref(sym)),
            None => Err(CompileError::unbound_variable(format!("{}", self.host.resolve(sym)))),
        }
    }

    fn analyze_var_target(&mut self, sym: SymbolId) -> CompileResult<VarRef> {
        match self.scopes.find_var(sym) {
            Some(Binding::Local) => Ok(VarRef::Local(sym)),
            Some(Binding::Captured { depth }) => Ok(VarRef::Captured { depth, sym }),
            Some(Binding::Global) => Ok(VarRef::Global(sym)),
            None => Err(CompileError::unbound_variable(format!("{}", self.host.resolve(sym)))),
        }
    }

    fn analyze_compound(&mut self, expr: &Value, tail: bool) -> CompileResult<Node> {
        let len = expr.list_len().ok_or_else(|| CompileError::syntax("combination must be a proper list"))?;
        let items: Vec<&Value> = expr.iter_list().collect();
        debug_assert_eq!(items.len(), len);
        let head = items[0];
        let rest = &items[1..];

        if let Some(head_sym) = head.as_symbol() {
            let sf = self.special_forms;
            if head_sym == sf.define {
                return self.analyze_define(rest);
            }
            if head_sym == sf.lambda {
                return self.analyze_lambda_form(None, rest);
            }
            if head_sym == sf.if_ {
                return self.analyze_if(rest, tail);
            }
            if head_sym == sf.begin {
                return self.analyze_begin(rest, tail);
            }
            if head_sym == sf.set_bang {
                return self.analyze_set(rest);
            }
            if head_sym == sf.quote {
                return Self::analyze_quote(rest);
            }
            if let Some(node) = self.analyze_primitive(head_sym, rest, tail)? {
                return Ok(node);
            }
        }

        self.analyze_call(head, rest, tail)
    }

    fn analyze_define(&mut self, rest: &[&Value]) -> CompileResult<Node> {
        let [name_expr, value_expr] = rest else {
            return Err(CompileError::syntax("define requires exactly a name and a value"));
        };
        let name = name_expr
            .as_symbol()
            .ok_or_else(|| CompileError::syntax("define's first operand must be a symbol"))?;

        if self.scopes.declare_local(name) {
            self.warn(Warning::RedefiningVariable { name });
        }
        let target = self.analyze_var_target(name)?;

        let value_node = if self.is_lambda_form(value_expr) {
            let lambda_rest: Vec<&Value> = value_expr.iter_list().skip(1).collect();
            self.analyze_lambda_form(Some(name), &lambda_rest)?
        } else {
            self.analyze_expr(value_expr, false)?
        };

        Ok(Node::Setbang(target, Box::new(value_node)))
    }

    fn is_lambda_form(&self, expr: &Value) -> bool {
        expr.car().and_then(Value::as_symbol).is_some_and(|sym| sym == self.special_forms.lambda)
    }

    /// `name_hint` is `Some` only when called from `define`; a bare
    /// `(lambda ...)` form defers with an anonymous hint.
    fn analyze_lambda_form(&mut self, name_hint: Option<SymbolId>, rest: &[&Value]) -> CompileResult<Node> {
        let [formals, body_rest @ ..] = rest else {
            return Err(CompileError::syntax("lambda requires formals and at least one body expression"));
        };
        if body_rest.is_empty() {
            return Err(CompileError::syntax("lambda body must contain at least one expression"));
        }
        let (args, rest_arg) = parse_formals(formals)?;
        let varg = rest_arg.is_some();
        let body = Value::list(body_rest.iter().map(|v| (*v).clone()));

        let id = self.lambdas.reserve();
        self.scopes.defer(DeferredLambda { id, name: name_hint, args: args.clone(), varg, rest: rest_arg, body });
        Ok(Node::Lambda(id))
    }

    fn analyze_if(&mut self, rest: &[&Value], tail: bool) -> CompileResult<Node> {
        let (cond_expr, then_expr, else_expr) = match rest {
            [cond, then] => (*cond, *then, None),
            [cond, then, else_] => (*cond, *then, Some(*else_)),
            _ => return Err(CompileError::syntax("if requires a condition, a consequent, and an optional alternative")),
        };
        let cond = self.analyze_expr(cond_expr, false)?;
        let then = self.analyze_expr(then_expr, tail)?;
        let else_node = match else_expr {
            Some(e) => self.analyze_expr(e, tail)?,
            None => Self::normalize_tail(Node::Quote(Value::Bool(false)), tail),
        };
        Ok(Node::If(Box::new(cond), Box::new(then), Box::new(else_node)))
    }

    fn analyze_begin(&mut self, rest: &[&Value], tail: bool) -> CompileResult<Node> {
        if rest.is_empty() {
            return Ok(Self::normalize_tail(Node::Quote(Value::Bool(false)), tail));
        }
        if rest.len() == 1 {
            return self.analyze_expr(rest[0], tail);
        }
        let mut exprs = Vec::with_capacity(rest.len());
        let (last, init) = rest.split_last().expect("checked non-empty above");
        for e in init {
            exprs.push(self.analyze_expr(e, false)?);
        }
        exprs.push(self.analyze_expr(last, tail)?);
        Ok(Node::Begin(exprs))
    }

    fn analyze_set(&mut self, rest: &[&Value]) -> CompileResult<Node> {
        let [name_expr, value_expr] = rest else {
            return Err(CompileError::syntax("set! requires exactly a name and a value"));
        };
        let name = name_expr.as_symbol().ok_or_else(|| CompileError::syntax("set!'s first operand must be a symbol"))?;
        let target = self.analyze_var_target(name)?;
        let value = self.analyze_expr(value_expr, false)?;
        Ok(Node::Setbang(target, Box::new(value)))
    }

    fn analyze_quote(rest: &[&Value]) -> CompileResult<Node> {
        let [datum] = rest else {
            return Err(CompileError::syntax("quote requires exactly one datum"));
        };
        Ok(Node::Quote((*datum).clone()))
    }

    /// Returns `Ok(None)` when `head_sym` is not one of the recognized
    /// primitives, so the caller falls through to a generic call — the
    /// shadowing guarantee lives entirely in this identity check.
    fn analyze_primitive(&mut self, head_sym: SymbolId, rest: &[&Value], tail: bool) -> CompileResult<Option<Node>> {
        let p = self.primitives;

        if head_sym == p.add {
            return self.fold_arith(rest, tail, Node::Add, || Node::Quote(Value::Int(0))).map(Some);
        }
        if head_sym == p.mul {
            return self.fold_arith(rest, tail, Node::Mul, || Node::Quote(Value::Int(1))).map(Some);
        }
        if head_sym == p.sub {
            return self.analyze_sub(rest).map(Some);
        }
        if head_sym == p.div {
            return self.analyze_div(rest).map(Some);
        }
        if head_sym == p.eq {
            return self.analyze_comparison(head_sym, rest, tail, Node::Eq).map(Some);
        }
        if head_sym == p.lt {
            return self.analyze_comparison(head_sym, rest, tail, Node::Lt).map(Some);
        }
        if head_sym == p.le {
            return self.analyze_comparison(head_sym, rest, tail, Node::Le).map(Some);
        }
        if head_sym == p.gt {
            return self.analyze_comparison(head_sym, rest, tail, Node::Gt).map(Some);
        }
        if head_sym == p.ge {
            return self.analyze_comparison(head_sym, rest, tail, Node::Ge).map(Some);
        }
        if head_sym == p.not {
            return self.analyze_unary_predicate(rest, Node::Not).map(Some);
        }
        if head_sym == p.nullp {
            return self.analyze_unary_predicate(rest, Node::Nilp).map(Some);
        }
        if head_sym == p.symbolp {
            return self.analyze_unary_predicate(rest, Node::Symbolp).map(Some);
        }
        if head_sym == p.pairp {
            return self.analyze_unary_predicate(rest, Node::Pairp).map(Some);
        }
        if head_sym == p.car {
            return self.analyze_unary_predicate(rest, Node::Car).map(Some);
        }
        if head_sym == p.cdr {
            return self.analyze_unary_predicate(rest, Node::Cdr).map(Some);
        }
        if head_sym == p.cons {
            return self.analyze_binary_primitive(rest, Node::Cons).map(Some);
        }
        if head_sym == p.values {
            return self.analyze_values(rest, tail).map(Some);
        }
        if head_sym == p.call_with_values {
            return self.analyze_call_with_values(rest, tail).map(Some);
        }
        Ok(None)
    }

    /// `+`/`*`: left-to-right arithmetic fold over a variadic operand list.
    /// A single operand has nothing to fold against, so it's analyzed with
    /// the inherited `tail` status instead of always `false` — `(+ (f))` in
    /// tail position must still compile to a tail call, not a frame-growing
    /// one.
    fn fold_arith(
        &mut self,
        rest: &[&Value],
        tail: bool,
        combine: fn(Box<Node>, Box<Node>) -> Node,
        identity: fn() -> Node,
    ) -> CompileResult<Node> {
        if rest.is_empty() {
            return Ok(identity());
        }
        if let [only] = rest {
            return self.analyze_expr(only, tail);
        }
        let mut nodes = rest.iter().map(|e| self.analyze_expr(e, false)).collect::<CompileResult<Vec<_>>>()?;
        let mut acc = nodes.remove(0);
        for n in nodes {
            acc = combine(Box::new(acc), Box::new(n));
        }
        Ok(acc)
    }

    fn analyze_sub(&mut self, rest: &[&Value]) -> CompileResult<Node> {
        if rest.is_empty() {
            return Err(CompileError::wrong_number_of_arguments("- requires at least one argument"));
        }
        if rest.len() == 1 {
            let x = self.analyze_expr(rest[0], false)?;
            return Ok(Node::Minus(Box::new(x)));
        }
        let mut nodes = rest.iter().map(|e| self.analyze_expr(e, false)).collect::<CompileResult<Vec<_>>>()?;
        let mut acc = nodes.remove(0);
        for n in nodes {
            acc = Node::Sub(Box::new(acc), Box::new(n));
        }
        Ok(acc)
    }

    fn analyze_div(&mut self, rest: &[&Value]) -> CompileResult<Node> {
        if rest.is_empty() {
            return Err(CompileError::wrong_number_of_arguments("/ requires at least one argument"));
        }
        if rest.len() == 1 {
            let x = self.analyze_expr(rest[0], false)?;
            return Ok(Node::Div(Box::new(Node::Quote(Value::Int(1))), Box::new(x)));
        }
        let mut nodes = rest.iter().map(|e| self.analyze_expr(e, false)).collect::<CompileResult<Vec<_>>>()?;
        let mut acc = nodes.remove(0);
        for n in nodes {
            acc = Node::Div(Box::new(acc), Box::new(n));
        }
        Ok(acc)
    }

    /// `=`, `<`, `<=`, `>`, `>=`: 2-ary intrinsic, otherwise a generic call
    /// to the (real) primitive procedure.
    fn analyze_comparison(
        &mut self,
        head_sym: SymbolId,
        rest: &[&Value],
        tail: bool,
        build: fn(Box<Node>, Box<Node>) -> Node,
    ) -> CompileResult<Node> {
        if let [a, b] = rest {
            let a_node = self.analyze_expr(a, false)?;
            let b_node = self.analyze_expr(b, false)?;
            return Ok(build(Box::new(a_node), Box::new(b_node)));
        }
        self.analyze_generic_primitive_call(head_sym, rest, tail)
    }

    /// `not`, `null?`, `symbol?`, `pair?`, `car`, `cdr`: strictly 1-ary, no
    /// fallback.
    fn analyze_unary_predicate(&mut self, rest: &[&Value], build: fn(Box<Node>) -> Node) -> CompileResult<Node> {
        let [x] = rest else {
            return Err(CompileError::wrong_number_of_arguments("primitive requires exactly one argument"));
        };
        let node = self.analyze_expr(x, false)?;
        Ok(build(Box::new(node)))
    }

    fn analyze_binary_primitive(&mut self, rest: &[&Value], build: fn(Box<Node>, Box<Node>) -> Node) -> CompileResult<Node> {
        let [a, b] = rest else {
            return Err(CompileError::wrong_number_of_arguments("primitive requires exactly two arguments"));
        };
        let a_node = self.analyze_expr(a, false)?;
        let b_node = self.analyze_expr(b, false)?;
        Ok(build(Box::new(a_node), Box::new(b_node)))
    }

    fn analyze_generic_primitive_call(&mut self, head_sym: SymbolId, rest: &[&Value], tail: bool) -> CompileResult<Node> {
        let callee = self.analyze_var_ref(head_sym)?;
        let args = rest.iter().map(|e| self.analyze_expr(e, false)).collect::<CompileResult<Vec<_>>>()?;
        Ok(if tail { Node::Tailcall(Box::new(callee), args) } else { Node::Call(Box::new(callee), args) })
    }

    /// `values`: in tail position, a multi-value `RETURN`; otherwise a plain
    /// call to the `values` procedure.
    fn analyze_values(&mut self, rest: &[&Value], tail: bool) -> CompileResult<Node> {
        if tail {
            let exprs = rest.iter().map(|e| self.analyze_expr(e, false)).collect::<CompileResult<Vec<_>>>()?;
            return Ok(Node::Return(exprs));
        }
        self.analyze_generic_primitive_call(self.primitives.values, rest, false)
    }

    fn analyze_call_with_values(&mut self, rest: &[&Value], tail: bool) -> CompileResult<Node> {
        let [producer, consumer] = rest else {
            return Err(CompileError::syntax("call-with-values requires exactly a producer and a consumer"));
        };
        let producer_node = self.analyze_expr(producer, false)?;
        let consumer_node = self.analyze_expr(consumer, false)?;
        Ok(if tail {
            Node::TailcallWithValues(Box::new(producer_node), Box::new(consumer_node))
        } else {
            Node::CallWithValues(Box::new(producer_node), Box::new(consumer_node))
        })
    }

    fn analyze_call(&mut self, head: &Value, rest: &[&Value], tail: bool) -> CompileResult<Node> {
        let callee = self.analyze_expr(head, false)?;
        let args = rest.iter().map(|e| self.analyze_expr(e, false)).collect::<CompileResult<Vec<_>>>()?;
        Ok(if tail { Node::Tailcall(Box::new(callee), args) } else { Node::Call(Box::new(callee), args) })
    }

    fn flush_deferred(&mut self) -> CompileResult<()> {
        let queue = self.scopes.take_defer_queue();
        self.tracer.on_stage(CompileStage::AnalyzeDeferred { pending: queue.len() });
        for item in queue {
            self.compile_deferred(item)?;
        }
        Ok(())
    }

    fn compile_deferred(&mut self, item: DeferredLambda) -> CompileResult<()> {
        self.tracer.on_stage(CompileStage::AnalyzeEnter { name: item.name });
        self.scopes.push(item.args.clone(), item.varg);
        if let Some(rest_sym) = item.rest {
            // The rest-arg symbol occupies the first local slot: `index_local`
            // offsets locals by `|args|+1`, and the rest-arg slot is exactly
            // `|args|+1`.
            self.scopes.declare_local(rest_sym);
        }

        let body_forms: Vec<&Value> = item.body.iter_list().collect();
        let body_node = self.analyze_begin(&body_forms, true)?;
        self.flush_deferred()?;

        let scope = self.scopes.pop();
        let lambda_node = LambdaNode {
            name: item.name,
            args: item.args,
            locals: scope.locals,
            varg: item.varg,
            captures: scope.captures,
            body: Box::new(body_node),
        };
        self.lambdas.fill(item.id, lambda_node);
        Ok(())
    }

    fn warn(&mut self, warning: Warning) {
        self.tracer.on_stage(CompileStage::Warning(warning.clone()));
        self.warnings.warn(warning);
    }
}
