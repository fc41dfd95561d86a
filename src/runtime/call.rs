//! Method dispatch, argument binding and closure invocation.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::{
    ast::{Arg, BlockLiteral, Expr, ExprKind, ParamList, ParamTarget},
    context::{Context, ContextRef, MethodFrame, ScopeKind},
    diagnostics::{argument_error, arity_error, name_error, type_error, Diagnostic, DiagnosticKind},
    object::{
        ancestors, class_ancestors, resolve_method, ClassRef, MethodBody, ResolvedMethod,
        Visibility,
    },
    stack::ensure_sufficient_stack,
    value::{check_arity, HashKey, Proc, ProcBody, Value, ValueKind},
};

use super::{eval::to_ary, CallArgs, EvalResult, Interpreter, Interrupt, Signal};

/// Who is calling, for visibility checks.
#[derive(Clone)]
pub(crate) enum Caller {
    /// Receiverless or `self.` call: private methods are visible.
    SelfCall,
    /// Explicit receiver, from code whose `self` is the given value.
    Object(Value),
    /// `send`, internal calls: visibility is ignored.
    Any,
    /// `public_send`.
    Public,
}

impl Caller {
    pub(crate) fn for_receiver(receiver: &Expr, ctx: &ContextRef) -> Self {
        if matches!(receiver.kind, ExprKind::SelfRef) {
            Caller::SelfCall
        } else {
            Caller::Object(ctx.self_value.clone())
        }
    }
}

/// How strictly positional arguments are matched against parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    Method,
    Lambda,
    /// Missing arguments become `nil`, extras are dropped and a lone Array
    /// argument is spread over several parameters.
    Block,
}

impl Interpreter {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn eval_call(
        &mut self,
        receiver: Option<&Expr>,
        name: &str,
        args: &[Arg],
        block: Option<&Rc<BlockLiteral>>,
        safe_nav: bool,
        vcall: bool,
        ctx: &ContextRef,
    ) -> EvalResult {
        if receiver.is_none() {
            if vcall {
                if let Some(value) = ctx.get(name) {
                    return Ok(value);
                }
            }
            if let Some(value) = self.receiverless_special(name, args, block, ctx) {
                return Ok(value);
            }
        }
        let (target, caller) = match receiver {
            Some(expr) => {
                let value = self.eval(expr, ctx)?;
                if safe_nav && value.is_nil() {
                    return Ok(Value::nil());
                }
                (value, Caller::for_receiver(expr, ctx))
            }
            None => (ctx.self_value.clone(), Caller::SelfCall),
        };
        let mut call_args = self.eval_args(args, ctx)?;
        let vcall = vcall && receiver.is_none();
        match block {
            None => self.dispatch(&target, name, call_args, caller, vcall),
            Some(literal) => {
                let block = self.make_proc(literal, ctx, false);
                call_args.block = Some(block.clone());
                self.with_block_call_site(&block, |interp| {
                    interp.dispatch(&target, name, call_args, caller, vcall)
                })
            }
        }
    }

    /// Runs a call that received a block literal, consuming `break`s aimed
    /// at that block.
    pub(crate) fn with_block_call_site(
        &mut self,
        block: &Value,
        call: impl FnOnce(&mut Self) -> EvalResult,
    ) -> EvalResult {
        let id = block.as_proc().map_or(0, |proc| proc.id);
        self.active_blocks.push(id);
        let result = call(self);
        if let Some(position) = self.active_blocks.iter().rposition(|active| *active == id) {
            self.active_blocks.remove(position);
        }
        match result {
            Err(Interrupt::Signal(Signal::Break(value, Some(tag)))) if tag == id => Ok(value),
            other => other,
        }
    }

    /// Receiverless forms that need the caller's context.
    fn receiverless_special(
        &mut self,
        name: &str,
        args: &[Arg],
        block: Option<&Rc<BlockLiteral>>,
        ctx: &ContextRef,
    ) -> Option<Value> {
        match name {
            "block_given?" if args.is_empty() => Some(Value::bool(
                ctx.frame.as_ref().is_some_and(|frame| frame.block.is_some()),
            )),
            "__method__" if args.is_empty() => Some(
                ctx.frame
                    .as_ref()
                    .map_or_else(Value::nil, |frame| Value::symbol(&frame.name)),
            ),
            "local_variables" if args.is_empty() => Some(Value::array(
                ctx.local_names().iter().map(|n| Value::symbol(n)).collect(),
            )),
            "lambda" | "proc" if args.is_empty() => {
                block.map(|literal| self.make_proc(literal, ctx, name == "lambda"))
            }
            "private" | "public" | "protected" | "module_function"
                if args.is_empty() && block.is_none() =>
            {
                if ctx.kind == ScopeKind::Class {
                    match name {
                        "private" => ctx.visibility.set(Visibility::Private),
                        "protected" => ctx.visibility.set(Visibility::Protected),
                        "public" => ctx.visibility.set(Visibility::Public),
                        _ => ctx.module_function.set(true),
                    }
                    if name != "module_function" {
                        ctx.module_function.set(false);
                    }
                }
                Some(Value::nil())
            }
            _ => None,
        }
    }

    pub(crate) fn eval_args(&mut self, args: &[Arg], ctx: &ContextRef) -> EvalResult<CallArgs> {
        let mut out = CallArgs::default();
        let mut keywords: Option<Vec<(Value, Value)>> = None;
        for arg in args {
            match arg {
                Arg::Positional(expr) => out.positional.push(self.eval(expr, ctx)?),
                Arg::Splat(expr) => {
                    let value = self.eval(expr, ctx)?;
                    out.positional.extend(self.splat_items(&value)?);
                }
                Arg::Keyword(name, expr) => {
                    let value = self.eval(expr, ctx)?;
                    keywords
                        .get_or_insert_with(Vec::new)
                        .push((Value::symbol(name), value));
                }
                Arg::Pair(key, value) => {
                    let key = self.eval(key, ctx)?;
                    let value = self.eval(value, ctx)?;
                    keywords.get_or_insert_with(Vec::new).push((key, value));
                }
                Arg::DoubleSplat(expr) => {
                    let value = self.eval(expr, ctx)?;
                    if value.is_nil() {
                        continue;
                    }
                    let hash = value.as_hash().ok_or_else(|| {
                        argument_error(format!(
                            "no implicit conversion of {} into Hash",
                            self.class_name_of(&value)
                        ))
                    })?;
                    let entries = keywords.get_or_insert_with(Vec::new);
                    entries.extend(hash.pairs());
                }
                Arg::Block(expr) => {
                    let value = self.eval(expr, ctx)?;
                    out.block = self.to_block(value)?;
                }
            }
        }
        out.keywords = keywords
            .filter(|pairs| !pairs.is_empty())
            .map(Value::hash_from_pairs);
        Ok(out)
    }

    /// Converts a `&value` argument into a block.
    pub(crate) fn to_block(&mut self, value: Value) -> EvalResult<Option<Value>> {
        let block = match value.kind() {
            ValueKind::Nil => return Ok(None),
            ValueKind::Proc(_) => value,
            ValueKind::Symbol(symbol) => Value::proc(Proc {
                id: self.next_proc_id(),
                body: ProcBody::Symbol(symbol.clone()),
                is_lambda: true,
            }),
            ValueKind::Method(method) => Value::proc(Proc {
                id: self.next_proc_id(),
                body: ProcBody::Method(method.clone()),
                is_lambda: true,
            }),
            _ if self.responds_to(&value, "to_proc") => {
                let converted = self.send(&value, "to_proc", CallArgs::default())?;
                if converted.as_proc().is_none() {
                    return Err(self.wrong_block_type(&value).into());
                }
                converted
            }
            _ => return Err(self.wrong_block_type(&value).into()),
        };
        Ok(Some(block))
    }

    fn wrong_block_type(&self, value: &Value) -> Diagnostic {
        type_error(format!(
            "wrong argument type {} (expected Proc)",
            self.class_name_of(value)
        ))
    }

    // Dispatch.

    /// Calls `name` ignoring visibility, as `send` does.
    pub fn send(&mut self, receiver: &Value, name: &str, args: CallArgs) -> EvalResult {
        self.dispatch(receiver, name, args, Caller::Any, false)
    }

    /// Calls `name` as an explicit-receiver call would, so private and
    /// protected methods are refused.
    pub fn public_send(&mut self, receiver: &Value, name: &str, args: CallArgs) -> EvalResult {
        self.dispatch(receiver, name, args, Caller::Public, false)
    }

    pub(crate) fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: CallArgs,
        caller: Caller,
    ) -> EvalResult {
        self.dispatch(receiver, name, args, caller, false)
    }

    fn dispatch(
        &mut self,
        receiver: &Value,
        name: &str,
        args: CallArgs,
        caller: Caller,
        vcall: bool,
    ) -> EvalResult {
        trace!(method = name, "dispatch");
        let ancestors = self.receiver_ancestors(receiver);
        match resolve_method(&ancestors, name, &self.natives) {
            Some(found) => {
                self.check_visibility(&found, receiver, name, &caller)?;
                self.invoke(receiver, found, args)
            }
            None => self.method_missing(receiver, name, args, vcall, &ancestors),
        }
    }

    fn method_missing(
        &mut self,
        receiver: &Value,
        name: &str,
        args: CallArgs,
        vcall: bool,
        ancestors: &[ClassRef],
    ) -> EvalResult {
        let key = (receiver.object_id(), name.to_string());
        if !self.missing_stack.contains(&key) {
            if let Some(handler) = resolve_method(ancestors, "method_missing", &self.natives) {
                debug!(method = name, "method_missing fallback");
                let mut positional = vec![Value::symbol(name)];
                positional.extend(args.positional);
                let forwarded = CallArgs {
                    positional,
                    keywords: args.keywords,
                    block: args.block,
                    span: args.span,
                };
                self.missing_stack.push(key.clone());
                let result = self.invoke(receiver, handler, forwarded);
                if let Some(position) = self.missing_stack.iter().rposition(|entry| *entry == key) {
                    self.missing_stack.remove(position);
                }
                return result;
            }
        }
        Err(self.no_method_error(receiver, name, vcall).into())
    }

    pub(crate) fn no_method_error(&self, receiver: &Value, name: &str, vcall: bool) -> Diagnostic {
        let note = format!("for {}", self.describe_receiver(receiver));
        if vcall {
            name_error(format!("undefined local variable or method '{name}'")).with_note(note)
        } else {
            Diagnostic::new(DiagnosticKind::NoMethod, format!("undefined method '{name}'"))
                .with_note(note)
        }
    }

    fn describe_receiver(&self, receiver: &Value) -> String {
        match receiver.kind() {
            ValueKind::Nil => "nil".into(),
            ValueKind::Bool(value) => value.to_string(),
            ValueKind::Class(class) => {
                let class = class.borrow();
                let kind = if class.is_module { "module" } else { "class" };
                format!("{kind} {}", class.full_name())
            }
            _ if receiver.identical(&self.main()) => "main:Object".into(),
            _ => format!("an instance of {}", self.class_name_of(receiver)),
        }
    }

    fn check_visibility(
        &self,
        found: &ResolvedMethod,
        receiver: &Value,
        name: &str,
        caller: &Caller,
    ) -> Result<(), Diagnostic> {
        let allowed = match (found.entry.visibility, caller) {
            (Visibility::Public, _) | (_, Caller::Any) | (_, Caller::SelfCall) => true,
            (Visibility::Protected, Caller::Object(from)) => self.is_a(from, &found.owner),
            _ => false,
        };
        if allowed {
            return Ok(());
        }
        Err(Diagnostic::new(
            DiagnosticKind::NoMethod,
            format!(
                "{} method '{name}' called for {}",
                found.entry.visibility.as_str(),
                self.describe_receiver(receiver)
            ),
        ))
    }

    /// Method resolution order used to dispatch on `value`.
    pub(crate) fn receiver_ancestors(&self, value: &Value) -> Vec<ClassRef> {
        match value.kind() {
            ValueKind::Object(object) => ancestors(&object.dispatch_class()),
            ValueKind::Class(class) => {
                let base = if class.borrow().is_module {
                    &self.classes.module
                } else {
                    &self.classes.class
                };
                class_ancestors(class, base)
            }
            _ => ancestors(&self.class_of(value)),
        }
    }

    /// The class `value.class` reports; singleton classes are skipped.
    pub(crate) fn class_of(&self, value: &Value) -> ClassRef {
        let classes = &self.classes;
        let class = match value.kind() {
            ValueKind::Nil => &classes.nil,
            ValueKind::Bool(true) => &classes.true_class,
            ValueKind::Bool(false) => &classes.false_class,
            ValueKind::Int(_) | ValueKind::BigInt(_) => &classes.integer,
            ValueKind::Float(_) => &classes.float,
            ValueKind::String(_) => &classes.string,
            ValueKind::Symbol(_) => &classes.symbol,
            ValueKind::Array(_) => &classes.array,
            ValueKind::Hash(_) => &classes.hash,
            ValueKind::Range(_) => &classes.range,
            ValueKind::Regex(_) => &classes.regexp,
            ValueKind::MatchData(_) => &classes.match_data,
            ValueKind::Proc(_) => &classes.proc_class,
            ValueKind::Method(_) => &classes.method,
            ValueKind::Object(object) => return object.class.clone(),
            ValueKind::Class(class) if class.borrow().is_module => &classes.module,
            ValueKind::Class(_) => &classes.class,
            ValueKind::Host(native) => {
                return self
                    .host_types
                    .get(&native.type_name)
                    .cloned()
                    .unwrap_or_else(|| classes.object.clone())
            }
            ValueKind::HostNamespace(_) => &classes.module,
        };
        class.clone()
    }

    pub(crate) fn class_name_of(&self, value: &Value) -> String {
        self.class_of(value).borrow().full_name()
    }

    pub(crate) fn is_a(&self, value: &Value, class: &ClassRef) -> bool {
        self.receiver_ancestors(value)
            .iter()
            .any(|ancestor| Rc::ptr_eq(ancestor, class))
    }

    pub(crate) fn find_method(&self, value: &Value, name: &str) -> Option<ResolvedMethod> {
        resolve_method(&self.receiver_ancestors(value), name, &self.natives)
    }

    /// Whether a public call of `name` would find a method.
    pub(crate) fn responds_to(&self, value: &Value, name: &str) -> bool {
        self.find_method(value, name)
            .is_some_and(|found| found.entry.visibility == Visibility::Public)
    }

    pub(crate) fn responds_to_private(&self, value: &Value, name: &str) -> bool {
        self.find_method(value, name).is_some()
    }

    /// Runs a resolved method on `receiver`.
    pub(crate) fn invoke(
        &mut self,
        receiver: &Value,
        found: ResolvedMethod,
        args: CallArgs,
    ) -> EvalResult {
        self.enter_call()?;
        let result = ensure_sufficient_stack(|| self.invoke_body(receiver, found, args));
        self.exit_call();
        result
    }

    fn invoke_body(
        &mut self,
        receiver: &Value,
        found: ResolvedMethod,
        args: CallArgs,
    ) -> EvalResult {
        let ResolvedMethod { entry, owner } = found;
        match entry.body {
            MethodBody::User { def, cref } => {
                let frame = MethodFrame {
                    name: def.name.clone(),
                    owner: owner.clone(),
                    receiver: receiver.clone(),
                    args: args.positional.clone(),
                    keywords: args.keywords.clone(),
                    block: args.block.clone(),
                };
                let root = self.root.clone();
                let ctx = Context::method(&root, frame, owner, cref);
                self.bind_params(&def.params, &ctx, args, BindMode::Method)?;
                match self.eval(&def.body, &ctx) {
                    Err(Interrupt::Signal(Signal::Return(value))) => Ok(value),
                    other => other,
                }
            }
            MethodBody::Proc(body) => self.call_method_proc(&body, receiver, &entry.name, owner, args),
            MethodBody::Native(function) => function.call(self, receiver, args),
            MethodBody::AttrReader(ivar) => {
                check_arity(0, args.len())?;
                Ok(self.ivar_get(receiver, &ivar))
            }
            MethodBody::AttrWriter(ivar) => {
                check_arity(1, args.len())?;
                let value = args.arg(0);
                self.ivar_set(receiver, &ivar, value.clone())?;
                Ok(value)
            }
            MethodBody::Undefined => Err(self.no_method_error(receiver, &entry.name, false).into()),
        }
    }

    /// Runs the body of a `define_method` method.
    fn call_method_proc(
        &mut self,
        body: &Value,
        receiver: &Value,
        name: &str,
        owner: ClassRef,
        args: CallArgs,
    ) -> EvalResult {
        let Some(proc) = body.as_proc() else {
            return self.call_proc(body, args);
        };
        let ProcBody::Block { literal, context } = &proc.body else {
            return self.call_proc(body, args);
        };
        let frame = MethodFrame {
            name: name.to_string(),
            owner,
            receiver: receiver.clone(),
            args: args.positional.clone(),
            keywords: args.keywords.clone(),
            block: args.block.clone(),
        };
        let ctx = Context::method_block(context, frame, proc.id);
        self.bind_params(&literal.params, &ctx, args, BindMode::Lambda)?;
        self.run_block_body(&literal.body, &ctx, proc.id, true)
    }

    /// Invokes a Proc, or anything responding to `call`.
    pub fn call_proc(&mut self, callable: &Value, args: CallArgs) -> EvalResult {
        let Some(proc) = callable.as_proc() else {
            return self.send(callable, "call", args);
        };
        match &proc.body {
            ProcBody::Block { literal, context } => {
                self.enter_call()?;
                let ctx = Context::block(context, None, proc.is_lambda, Some(proc.id));
                let result = self.run_block(literal, &ctx, proc, args);
                self.exit_call();
                result
            }
            ProcBody::Native(function) => {
                let main = self.main();
                function.call(self, &main, args)
            }
            ProcBody::Symbol(symbol) => {
                let mut positional = args.positional;
                if positional.is_empty() {
                    return Err(argument_error("no receiver given").into());
                }
                let receiver = positional.remove(0);
                let forwarded = CallArgs {
                    positional,
                    keywords: args.keywords,
                    block: args.block,
                    span: args.span,
                };
                self.call_method(&receiver, symbol.name(), forwarded, Caller::Public)
            }
            ProcBody::Method(method) => {
                let found = ResolvedMethod {
                    entry: method.entry.clone(),
                    owner: method.owner.clone(),
                };
                self.invoke(&method.receiver, found, args)
            }
        }
    }

    /// Calls a block with a different `self`, for `instance_eval` and
    /// `class_eval`.
    pub(crate) fn call_proc_with_self(
        &mut self,
        callable: &Value,
        self_value: Value,
        definee: ClassRef,
        args: CallArgs,
    ) -> EvalResult {
        let Some(proc) = callable.as_proc() else {
            return self.call_proc(callable, args);
        };
        let ProcBody::Block { literal, context } = &proc.body else {
            return self.call_proc(callable, args);
        };
        self.enter_call()?;
        let ctx = Context::rebound_block(context, self_value, definee, Some(proc.id));
        let result = self.run_block(literal, &ctx, proc, args);
        self.exit_call();
        result
    }

    fn run_block(
        &mut self,
        literal: &BlockLiteral,
        ctx: &ContextRef,
        proc: &Proc,
        args: CallArgs,
    ) -> EvalResult {
        let mode = if proc.is_lambda {
            BindMode::Lambda
        } else {
            BindMode::Block
        };
        self.bind_params(&literal.params, ctx, args, mode)?;
        self.run_block_body(&literal.body, ctx, proc.id, proc.is_lambda)
    }

    fn run_block_body(
        &mut self,
        body: &Expr,
        ctx: &ContextRef,
        id: u64,
        is_lambda: bool,
    ) -> EvalResult {
        loop {
            match self.eval(body, ctx) {
                Ok(value) | Err(Interrupt::Signal(Signal::Next(value))) => return Ok(value),
                Err(Interrupt::Signal(Signal::Redo)) => continue,
                Err(Interrupt::Signal(Signal::Return(value))) if is_lambda => return Ok(value),
                Err(Interrupt::Signal(Signal::Break(value, Some(tag)))) if tag == id => {
                    if is_lambda {
                        return Ok(value);
                    }
                    if !self.active_blocks.contains(&id) {
                        return Err(Diagnostic::new(
                            DiagnosticKind::LocalJump,
                            "break from proc-closure",
                        )
                        .into());
                    }
                    return Err(Interrupt::Signal(Signal::Break(value, Some(tag))));
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Binds call arguments to parameters in a fresh method or block context.
    pub(crate) fn bind_params(
        &mut self,
        params: &ParamList,
        ctx: &ContextRef,
        args: CallArgs,
        mode: BindMode,
    ) -> EvalResult<()> {
        let CallArgs {
            mut positional,
            mut keywords,
            block,
            ..
        } = args;
        let takes_keywords = !params.keywords.is_empty() || params.kwrest.is_some();
        if !takes_keywords {
            if let Some(keywords) = keywords.take() {
                positional.push(keywords);
            }
        }

        let lead = params.required.len();
        let optional = params.optional.len();
        let post = params.post.len();
        let required = lead + post;
        if mode == BindMode::Block
            && positional.len() == 1
            && positional[0].as_array().is_some()
            && (lead + optional + post > 1 || (lead + optional + post >= 1 && params.rest.is_some()))
        {
            positional = to_ary(&positional[0]);
        }

        let given = positional.len();
        if mode != BindMode::Block
            && (given < required || (params.rest.is_none() && given > required + optional))
        {
            let expected = if params.rest.is_some() {
                format!("{required}+")
            } else if optional > 0 {
                format!("{required}..{}", required + optional)
            } else {
                required.to_string()
            };
            return Err(arity_error(given, expected).into());
        }

        let item = |index: usize| positional.get(index).cloned().unwrap_or_else(Value::nil);
        let filled_optional = optional.min(given.saturating_sub(required));
        let rest_count = given.saturating_sub(required + filled_optional);
        let mut cursor = 0;
        for target in &params.required {
            bind_target(ctx, target, item(cursor));
            cursor += 1;
        }
        for (index, (name, default)) in params.optional.iter().enumerate() {
            if index < filled_optional {
                ctx.declare(name, item(cursor));
                cursor += 1;
            } else {
                let value = self.eval(default, ctx)?;
                ctx.declare(name, value);
            }
        }
        if let Some(rest) = &params.rest {
            let start = cursor.min(given);
            let end = (cursor + rest_count).min(given);
            ctx.declare(rest, Value::array(positional[start..end].to_vec()));
            cursor += rest_count;
        }
        for target in &params.post {
            bind_target(ctx, target, item(cursor));
            cursor += 1;
        }

        if takes_keywords {
            self.bind_keywords(params, ctx, keywords)?;
        }
        if let Some(name) = &params.block {
            ctx.declare(name, block.unwrap_or_else(Value::nil));
        }
        Ok(())
    }

    fn bind_keywords(
        &mut self,
        params: &ParamList,
        ctx: &ContextRef,
        keywords: Option<Value>,
    ) -> EvalResult<()> {
        let mut remaining: IndexMap<HashKey, (Value, Value)> = keywords
            .as_ref()
            .and_then(Value::as_hash)
            .map(|hash| hash.entries.borrow().clone())
            .unwrap_or_default();
        let mut missing = Vec::new();
        for (name, default) in &params.keywords {
            match remaining.shift_remove(&HashKey::symbol(name)) {
                Some((_, value)) => ctx.declare(name, value),
                None => match default {
                    Some(expr) => {
                        let value = self.eval(expr, ctx)?;
                        ctx.declare(name, value);
                    }
                    None => missing.push(format!(":{name}")),
                },
            }
        }
        if !missing.is_empty() {
            let noun = if missing.len() == 1 { "keyword" } else { "keywords" };
            return Err(argument_error(format!("missing {noun}: {}", missing.join(", "))).into());
        }
        match &params.kwrest {
            Some(name) => ctx.declare(name, Value::hash(remaining)),
            None if !remaining.is_empty() => {
                let unknown: Vec<String> = remaining
                    .values()
                    .map(|(key, _)| key.basic_inspect())
                    .collect();
                let noun = if unknown.len() == 1 { "keyword" } else { "keywords" };
                return Err(argument_error(format!("unknown {noun}: {}", unknown.join(", "))).into());
            }
            None => {}
        }
        Ok(())
    }

    // super

    pub(crate) fn eval_super(
        &mut self,
        args: Option<&[Arg]>,
        block: Option<&Rc<BlockLiteral>>,
        ctx: &ContextRef,
    ) -> EvalResult {
        let Some(frame) = ctx.frame.clone() else {
            return Err(Diagnostic::new(
                DiagnosticKind::Runtime,
                "super called outside of method",
            )
            .into());
        };
        let mut call_args = match args {
            Some(args) => {
                let mut call_args = self.eval_args(args, ctx)?;
                if call_args.block.is_none() {
                    call_args.block = frame.block.clone();
                }
                call_args
            }
            None => CallArgs {
                positional: frame.args.clone(),
                keywords: frame.keywords.clone(),
                block: frame.block.clone(),
                span: Default::default(),
            },
        };
        let Some(found) = self.super_method(ctx) else {
            if frame.name == "method_missing" {
                if let Some(name) = call_args.positional.first().and_then(Value::as_symbol) {
                    return Err(self.no_method_error(&frame.receiver, name.name(), false).into());
                }
            }
            return Err(Diagnostic::new(
                DiagnosticKind::NoMethod,
                format!("super: no superclass method '{}'", frame.name),
            )
            .into());
        };
        match block {
            None => self.invoke(&frame.receiver, found, call_args),
            Some(literal) => {
                let block = self.make_proc(literal, ctx, false);
                call_args.block = Some(block.clone());
                self.with_block_call_site(&block, |interp| {
                    interp.invoke(&frame.receiver, found, call_args)
                })
            }
        }
    }

    /// The method `super` would call from `ctx`.
    pub(crate) fn super_method(&self, ctx: &ContextRef) -> Option<ResolvedMethod> {
        let frame = ctx.frame.as_ref()?;
        let ancestors = self.receiver_ancestors(&frame.receiver);
        let index = ancestors
            .iter()
            .position(|class| Rc::ptr_eq(class, &frame.owner))?;
        resolve_method(&ancestors[index + 1..], &frame.name, &self.natives)
    }
}

fn bind_target(ctx: &ContextRef, target: &ParamTarget, value: Value) {
    match target {
        ParamTarget::Name(name) => ctx.declare(name, value),
        ParamTarget::Nested(names) => {
            let items = to_ary(&value);
            for (index, name) in names.iter().enumerate() {
                ctx.declare(name, items.get(index).cloned().unwrap_or_else(Value::nil));
            }
        }
    }
}
