use crate::{
    ast::{
        AssignTarget, BinaryOp, BlockLiteral, ConstPath, Expr, ExprKind, HashEntry, Literal,
        LogicalOp, StringPart, WhenClause,
    },
    context::ContextRef,
    diagnostics::{name_error, type_error, Diagnostic, DiagnosticKind},
    object::{class_var_get, class_var_set, const_lookup, ClassRef},
    range,
    stack::ensure_sufficient_stack,
    stdlib::regexp,
    value::{HashValue, Proc, ProcBody, Value, ValueKind},
};

use super::{call::Caller, CallArgs, EvalResult, Interpreter, Interrupt, Signal};

/// A resolved assignment target. Receivers and index arguments are
/// evaluated once, so `a[i] += 1` evaluates `a` and `i` a single time.
enum Place {
    Local(String),
    Ivar(String),
    Cvar(String),
    Global(String),
    Const(ClassRef, String),
    Index {
        receiver: Value,
        args: Vec<Value>,
        caller: Caller,
    },
    Attr {
        receiver: Value,
        name: String,
        safe_nav: bool,
        caller: Caller,
    },
}

impl Place {
    fn skips_nil(&self) -> bool {
        matches!(self, Place::Attr { receiver, safe_nav: true, .. } if receiver.is_nil())
    }
}

impl Interpreter {
    pub(crate) fn eval(&mut self, expr: &Expr, ctx: &ContextRef) -> EvalResult {
        ensure_sufficient_stack(|| self.eval_inner(expr, ctx)).map_err(|err| err.or_span(expr.span))
    }

    fn eval_inner(&mut self, expr: &Expr, ctx: &ContextRef) -> EvalResult {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(literal_value(literal)),
            ExprKind::Interpolated(parts) => Ok(Value::string(self.interpolate(parts, ctx)?)),
            ExprKind::InterpolatedSymbol(parts) => {
                Ok(Value::symbol(&self.interpolate(parts, ctx)?))
            }
            ExprKind::Regex { parts, flags } => {
                let source = self.interpolate(parts, ctx)?;
                Ok(regexp::compile(&source, flags)?)
            }
            ExprKind::Array(items) => Ok(Value::array(self.eval_list(items, ctx)?)),
            ExprKind::Hash(entries) => self.eval_hash(entries, ctx),
            ExprKind::Range {
                from,
                to,
                exclusive,
            } => {
                let from = self.eval(from, ctx)?;
                let to = self.eval(to, ctx)?;
                Ok(Value::range(from, to, *exclusive))
            }
            ExprKind::SelfRef => Ok(ctx.self_value.clone()),
            ExprKind::LocalVar(name) => Ok(ctx.get(name).unwrap_or_else(Value::nil)),
            ExprKind::InstanceVar(name) => Ok(self.ivar_get(&ctx.self_value, name)),
            ExprKind::ClassVar(name) => {
                let base = self.cvar_base(ctx);
                class_var_get(&base, name).ok_or_else(|| {
                    name_error(format!(
                        "uninitialized class variable {name} in {}",
                        base.borrow().full_name()
                    ))
                    .into()
                })
            }
            ExprKind::GlobalVar(name) => Ok(self.global_get(name)),
            ExprKind::Const(path) => self.lookup_const(path, ctx),
            ExprKind::Call {
                receiver,
                name,
                args,
                block,
                safe_nav,
                vcall,
            } => self.eval_call(
                receiver.as_deref(),
                name,
                args,
                block.as_ref(),
                *safe_nav,
                *vcall,
                ctx,
            ),
            ExprKind::Super { args, block } => {
                self.eval_super(args.as_deref(), block.as_ref(), ctx)
            }
            ExprKind::Yield(args) => {
                let block = ctx
                    .frame
                    .as_ref()
                    .and_then(|frame| frame.block.clone())
                    .ok_or_else(|| name_error("no block given (yield)"))?;
                let args = self.eval_args(args, ctx)?;
                self.call_proc(&block, args)
            }
            ExprKind::Not(operand) => Ok(Value::bool(!self.eval(operand, ctx)?.is_truthy())),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, ctx)?;
                self.unary(*op, value)
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left, ctx)?;
                let right = self.eval(right, ctx)?;
                self.binary(*op, left, right)
            }
            ExprKind::Logical { op, left, right } => {
                let left = self.eval(left, ctx)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.eval(right, ctx),
                }
            }
            ExprKind::Defined(inner) => self.eval_defined(inner, ctx),
            ExprKind::Assign { target, value } => self.eval_assign(target, value, ctx),
            ExprKind::OpAssign { target, op, value } => {
                self.eval_op_assign(target, op, value, ctx)
            }
            ExprKind::MultiAssign { targets, value } => {
                let value = self.eval(value, ctx)?;
                let items = to_ary(&value);
                self.destructure(targets, items, ctx)?;
                Ok(value)
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition, ctx)?.is_truthy() {
                    self.eval(then_branch, ctx)
                } else if let Some(branch) = else_branch {
                    self.eval(branch, ctx)
                } else {
                    Ok(Value::nil())
                }
            }
            ExprKind::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition, ctx)?.is_truthy() {
                    self.eval(then_branch, ctx)
                } else {
                    self.eval(else_branch, ctx)
                }
            }
            ExprKind::While {
                condition,
                body,
                until,
                do_while,
            } => {
                ctx.enter_loop();
                let result = self.run_while(condition, body, *until, *do_while, ctx);
                ctx.exit_loop();
                result
            }
            ExprKind::For {
                targets,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, ctx)?;
                let items = self.iteration_items(&iterable)?;
                ctx.enter_loop();
                let result = self.run_for(targets, items, body, ctx);
                ctx.exit_loop();
                Ok(result?.unwrap_or(iterable))
            }
            ExprKind::Case {
                subject,
                whens,
                else_branch,
            } => self.eval_case(subject.as_deref(), whens, else_branch.as_deref(), ctx),
            ExprKind::Break(value) => {
                let value = self.eval_optional(value.as_deref(), ctx)?;
                let tag = if ctx.in_loop() {
                    None
                } else if let Some(tag) = ctx.break_tag {
                    Some(tag)
                } else {
                    return Err(Diagnostic::new(DiagnosticKind::LocalJump, "Invalid break").into());
                };
                Err(Interrupt::Signal(Signal::Break(value, tag)))
            }
            ExprKind::Next(value) => {
                let value = self.eval_optional(value.as_deref(), ctx)?;
                if !ctx.in_loop() && ctx.break_tag.is_none() {
                    return Err(Diagnostic::new(DiagnosticKind::LocalJump, "Invalid next").into());
                }
                Err(Interrupt::Signal(Signal::Next(value)))
            }
            ExprKind::Redo => Err(Interrupt::Signal(Signal::Redo)),
            ExprKind::Retry => Err(Interrupt::Signal(Signal::Retry)),
            ExprKind::Return(value) => {
                let value = self.eval_optional(value.as_deref(), ctx)?;
                if !ctx.returnable() {
                    return Err(Diagnostic::new(
                        DiagnosticKind::InvalidOperation,
                        "return can only be used inside methods",
                    )
                    .into());
                }
                Err(Interrupt::Signal(Signal::Return(value)))
            }
            ExprKind::Sequence(items) => {
                let mut last = Value::nil();
                for item in items {
                    last = self.eval(item, ctx)?;
                }
                Ok(last)
            }
            ExprKind::Begin(block) => self.eval_begin(block, ctx),
            ExprKind::Def(def) => self.eval_def(def, ctx),
            ExprKind::ClassDef {
                path,
                superclass,
                body,
            } => self.eval_class_def(path, superclass.as_deref(), body, ctx),
            ExprKind::ModuleDef { path, body } => self.eval_module_def(path, body, ctx),
            ExprKind::SingletonClass { target, body } => {
                self.eval_singleton_class(target, body, ctx)
            }
            ExprKind::Lambda(literal) => Ok(self.make_proc(literal, ctx, true)),
            ExprKind::Alias { new_name, old_name } => {
                if new_name.starts_with('$') {
                    let value = self.global_get(old_name);
                    self.globals.insert(new_name.clone(), value);
                } else {
                    self.alias_method(&ctx.definee, new_name, old_name)?;
                }
                Ok(Value::nil())
            }
            ExprKind::Splat(inner) => {
                let value = self.eval(inner, ctx)?;
                Ok(Value::array(self.splat_items(&value)?))
            }
        }
    }

    fn eval_optional(&mut self, expr: Option<&Expr>, ctx: &ContextRef) -> EvalResult {
        match expr {
            Some(expr) => self.eval(expr, ctx),
            None => Ok(Value::nil()),
        }
    }

    pub(crate) fn make_proc(
        &mut self,
        literal: &std::rc::Rc<BlockLiteral>,
        ctx: &ContextRef,
        is_lambda: bool,
    ) -> Value {
        Value::proc(Proc {
            id: self.next_proc_id(),
            body: ProcBody::Block {
                literal: literal.clone(),
                context: ctx.clone(),
            },
            is_lambda,
        })
    }

    fn interpolate(&mut self, parts: &[StringPart], ctx: &ContextRef) -> EvalResult<String> {
        let mut out = String::new();
        for part in parts {
            match part {
                StringPart::Text(text) => out.push_str(text),
                StringPart::Code(expr) => {
                    let value = self.eval(expr, ctx)?;
                    out.push_str(&self.to_s(&value)?);
                }
            }
        }
        Ok(out)
    }

    /// Evaluates list elements, expanding `*splat` items in place.
    pub(crate) fn eval_list(&mut self, items: &[Expr], ctx: &ContextRef) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match &item.kind {
                ExprKind::Splat(inner) => {
                    let value = self.eval(inner, ctx)?;
                    values.extend(self.splat_items(&value)?);
                }
                _ => values.push(self.eval(item, ctx)?),
            }
        }
        Ok(values)
    }

    fn eval_hash(&mut self, entries: &[HashEntry], ctx: &ContextRef) -> EvalResult {
        let hash = HashValue::new(Default::default());
        for entry in entries {
            match entry {
                HashEntry::Pair(key, value) => {
                    let key = self.eval(key, ctx)?;
                    let value = self.eval(value, ctx)?;
                    hash.insert(key, value);
                }
                HashEntry::DoubleSplat(expr) => {
                    let value = self.eval(expr, ctx)?;
                    if value.is_nil() {
                        continue;
                    }
                    let other = value.as_hash().ok_or_else(|| {
                        type_error(format!(
                            "no implicit conversion of {} into Hash",
                            self.class_name_of(&value)
                        ))
                    })?;
                    for (key, value) in other.pairs() {
                        hash.insert(key, value);
                    }
                }
            }
        }
        Ok(Value::new(ValueKind::Hash(hash)))
    }

    /// Items produced by `*value`.
    pub(crate) fn splat_items(&mut self, value: &Value) -> EvalResult<Vec<Value>> {
        match value.kind() {
            ValueKind::Array(array) => Ok(array.to_vec()),
            ValueKind::Nil => Ok(Vec::new()),
            ValueKind::Hash(hash) => Ok(hash
                .pairs()
                .into_iter()
                .map(|(k, v)| Value::array(vec![k, v]))
                .collect()),
            ValueKind::Range(r) => Ok(range::to_vec(&r.from, &r.to, r.exclusive)?),
            ValueKind::Object(_) if self.responds_to(value, "to_a") => {
                let array = self.send(value, "to_a", CallArgs::default())?;
                Ok(to_ary(&array))
            }
            _ => Ok(vec![value.clone()]),
        }
    }

    /// Items a `for` loop or an Enumerable method walks over.
    pub(crate) fn iteration_items(&mut self, value: &Value) -> EvalResult<Vec<Value>> {
        match value.kind() {
            ValueKind::Array(_) | ValueKind::Hash(_) | ValueKind::Range(_) => {
                self.splat_items(value)
            }
            _ => self.enumerate(value),
        }
    }

    fn run_while(
        &mut self,
        condition: &Expr,
        body: &Expr,
        until: bool,
        do_while: bool,
        ctx: &ContextRef,
    ) -> EvalResult {
        let mut skip_test = do_while;
        loop {
            if !skip_test && self.eval(condition, ctx)?.is_truthy() == until {
                return Ok(Value::nil());
            }
            skip_test = false;
            match self.eval(body, ctx) {
                Ok(_) | Err(Interrupt::Signal(Signal::Next(_))) => {}
                Err(Interrupt::Signal(Signal::Redo)) => skip_test = true,
                Err(Interrupt::Signal(Signal::Break(value, None))) => return Ok(value),
                Err(other) => return Err(other),
            }
        }
    }

    /// Runs a `for` loop, returning the `break` value if one occurred.
    fn run_for(
        &mut self,
        targets: &[AssignTarget],
        items: Vec<Value>,
        body: &Expr,
        ctx: &ContextRef,
    ) -> EvalResult<Option<Value>> {
        for item in items {
            match targets {
                [single] => self.assign(single, item, ctx)?,
                _ => self.destructure(targets, to_ary(&item), ctx)?,
            }
            loop {
                match self.eval(body, ctx) {
                    Ok(_) | Err(Interrupt::Signal(Signal::Next(_))) => break,
                    Err(Interrupt::Signal(Signal::Redo)) => continue,
                    Err(Interrupt::Signal(Signal::Break(value, None))) => return Ok(Some(value)),
                    Err(other) => return Err(other),
                }
            }
        }
        Ok(None)
    }

    fn eval_case(
        &mut self,
        subject: Option<&Expr>,
        whens: &[WhenClause],
        else_branch: Option<&Expr>,
        ctx: &ContextRef,
    ) -> EvalResult {
        let subject = match subject {
            Some(subject) => Some(self.eval(subject, ctx)?),
            None => None,
        };
        for clause in whens {
            for pattern in &clause.patterns {
                let candidates = match &pattern.kind {
                    ExprKind::Splat(inner) => {
                        let list = self.eval(inner, ctx)?;
                        self.splat_items(&list)?
                    }
                    _ => vec![self.eval(pattern, ctx)?],
                };
                for candidate in candidates {
                    let matched = match &subject {
                        Some(subject) => self.case_eq(&candidate, subject)?,
                        None => candidate.is_truthy(),
                    };
                    if matched {
                        return self.eval(&clause.body, ctx);
                    }
                }
            }
        }
        self.eval_optional(else_branch, ctx)
    }

    /// `pattern === value`.
    pub(crate) fn case_eq(&mut self, pattern: &Value, value: &Value) -> EvalResult<bool> {
        let result = self.send(pattern, "===", CallArgs::new(vec![value.clone()]))?;
        Ok(result.is_truthy())
    }

    fn eval_defined(&mut self, expr: &Expr, ctx: &ContextRef) -> EvalResult {
        let description = match self.describe_defined(expr, ctx) {
            Ok(description) => description,
            Err(Interrupt::Error(_)) => None,
            Err(signal) => return Err(signal),
        };
        Ok(description.map_or_else(Value::nil, Value::string))
    }

    fn describe_defined(&mut self, expr: &Expr, ctx: &ContextRef) -> EvalResult<Option<&'static str>> {
        let description = match &expr.kind {
            ExprKind::LocalVar(_) => Some("local-variable"),
            ExprKind::InstanceVar(name) => self
                .ivar_defined(&ctx.self_value, name)
                .then_some("instance-variable"),
            ExprKind::ClassVar(name) => class_var_get(&self.cvar_base(ctx), name)
                .map(|_| "class variable"),
            ExprKind::GlobalVar(name) => self
                .globals
                .contains_key(name.as_str())
                .then_some("global-variable"),
            ExprKind::Const(path) => self.lookup_const(path, ctx).ok().map(|_| "constant"),
            ExprKind::Call {
                receiver: None,
                name,
                vcall,
                ..
            } => {
                if *vcall && ctx.has_local(name) {
                    Some("local-variable")
                } else {
                    self.responds_to_private(&ctx.self_value, name).then_some("method")
                }
            }
            ExprKind::Call {
                receiver: Some(receiver),
                name,
                ..
            } => {
                if self.describe_defined(receiver, ctx)?.is_none() {
                    return Ok(None);
                }
                let receiver = self.eval(receiver, ctx)?;
                self.responds_to(&receiver, name).then_some("method")
            }
            ExprKind::SelfRef => Some("self"),
            ExprKind::Literal(Literal::Nil) => Some("expression"),
            ExprKind::Literal(Literal::Bool(true)) => Some("expression"),
            ExprKind::Yield(_) => ctx
                .frame
                .as_ref()
                .and_then(|frame| frame.block.as_ref())
                .map(|_| "yield"),
            ExprKind::Super { .. } => self.super_method(ctx).map(|_| "super"),
            ExprKind::Assign { .. } | ExprKind::OpAssign { .. } | ExprKind::MultiAssign { .. } => {
                Some("assignment")
            }
            _ => Some("expression"),
        };
        Ok(description)
    }

    // Assignment.

    fn eval_assign(&mut self, target: &AssignTarget, value: &Expr, ctx: &ContextRef) -> EvalResult {
        match target {
            AssignTarget::Nested(_) | AssignTarget::Splat(_) => {
                let value = self.eval(value, ctx)?;
                self.assign(target, value.clone(), ctx)?;
                Ok(value)
            }
            _ => {
                let place = self.place(target, ctx)?;
                if place.skips_nil() {
                    return Ok(Value::nil());
                }
                let value = self.eval(value, ctx)?;
                self.write_place(place, value.clone(), ctx)?;
                Ok(value)
            }
        }
    }

    fn eval_op_assign(
        &mut self,
        target: &AssignTarget,
        op: &str,
        value: &Expr,
        ctx: &ContextRef,
    ) -> EvalResult {
        let place = self.place(target, ctx)?;
        if place.skips_nil() {
            return Ok(Value::nil());
        }
        let result = match op {
            "||" | "&&" => {
                let current = self.read_place(&place, ctx, false)?;
                if current.is_truthy() == (op == "||") {
                    return Ok(current);
                }
                self.eval(value, ctx)?
            }
            _ => {
                let current = self.read_place(&place, ctx, true)?;
                let operand = self.eval(value, ctx)?;
                match BinaryOp::from_operator(op) {
                    Some(binary) => self.binary(binary, current, operand)?,
                    None => self.send(&current, op, CallArgs::new(vec![operand]))?,
                }
            }
        };
        self.write_place(place, result.clone(), ctx)?;
        Ok(result)
    }

    fn place(&mut self, target: &AssignTarget, ctx: &ContextRef) -> EvalResult<Place> {
        let place = match target {
            AssignTarget::Local(name) => Place::Local(name.clone()),
            AssignTarget::InstanceVar(name) => Place::Ivar(name.clone()),
            AssignTarget::ClassVar(name) => Place::Cvar(name.clone()),
            AssignTarget::GlobalVar(name) => Place::Global(name.clone()),
            AssignTarget::Const { scope, name } => {
                let class = match scope {
                    Some(scope) => {
                        let scope = self.eval(scope, ctx)?;
                        self.expect_module(&scope)?
                    }
                    None => self.lexical_module(ctx),
                };
                Place::Const(class, name.clone())
            }
            AssignTarget::Index { receiver, args } => {
                let caller = Caller::for_receiver(receiver, ctx);
                let receiver = self.eval(receiver, ctx)?;
                let args = self.eval_args(args, ctx)?.positional;
                Place::Index {
                    receiver,
                    args,
                    caller,
                }
            }
            AssignTarget::Attribute {
                receiver,
                name,
                safe_nav,
            } => {
                let caller = Caller::for_receiver(receiver, ctx);
                let receiver = self.eval(receiver, ctx)?;
                Place::Attr {
                    receiver,
                    name: name.clone(),
                    safe_nav: *safe_nav,
                    caller,
                }
            }
            AssignTarget::Splat(_) | AssignTarget::Nested(_) => {
                return Err(Diagnostic::new(DiagnosticKind::Syntax, "invalid assignment target").into())
            }
        };
        Ok(place)
    }

    fn read_place(&mut self, place: &Place, ctx: &ContextRef, strict: bool) -> EvalResult {
        match place {
            Place::Local(name) => Ok(ctx.get(name).unwrap_or_else(Value::nil)),
            Place::Ivar(name) => Ok(self.ivar_get(&ctx.self_value, name)),
            Place::Cvar(name) => {
                let base = self.cvar_base(ctx);
                match class_var_get(&base, name) {
                    Some(value) => Ok(value),
                    None if !strict => Ok(Value::nil()),
                    None => Err(name_error(format!(
                        "uninitialized class variable {name} in {}",
                        base.borrow().full_name()
                    ))
                    .into()),
                }
            }
            Place::Global(name) => Ok(self.global_get(name)),
            Place::Const(class, name) => match const_lookup(class, name) {
                Some(value) => Ok(value),
                None if !strict => Ok(Value::nil()),
                None => Err(name_error(format!("uninitialized constant {name}")).into()),
            },
            Place::Index {
                receiver,
                args,
                caller,
            } => self.call_method(receiver, "[]", CallArgs::new(args.clone()), caller.clone()),
            Place::Attr {
                receiver,
                name,
                caller,
                ..
            } => self.call_method(receiver, name, CallArgs::default(), caller.clone()),
        }
    }

    fn write_place(&mut self, place: Place, value: Value, ctx: &ContextRef) -> EvalResult<()> {
        match place {
            Place::Local(name) => ctx.set(&name, value),
            Place::Ivar(name) => self.ivar_set(&ctx.self_value, &name, value)?,
            Place::Cvar(name) => class_var_set(&self.cvar_base(ctx), &name, value),
            Place::Global(name) => self.global_set(&name, value),
            Place::Const(class, name) => self.const_set(&class, &name, value),
            Place::Index {
                receiver,
                mut args,
                caller,
            } => {
                args.push(value);
                self.call_method(&receiver, "[]=", CallArgs::new(args), caller)?;
            }
            Place::Attr {
                receiver,
                name,
                caller,
                ..
            } => {
                let setter = format!("{name}=");
                self.call_method(&receiver, &setter, CallArgs::new(vec![value]), caller)?;
            }
        }
        Ok(())
    }

    pub(crate) fn assign(&mut self, target: &AssignTarget, value: Value, ctx: &ContextRef) -> EvalResult<()> {
        match target {
            AssignTarget::Nested(inner) => self.destructure(inner, to_ary(&value), ctx),
            AssignTarget::Splat(Some(inner)) => {
                let items = self.splat_items(&value)?;
                self.assign(inner, Value::array(items), ctx)
            }
            AssignTarget::Splat(None) => Ok(()),
            _ => {
                let place = self.place(target, ctx)?;
                if place.skips_nil() {
                    return Ok(());
                }
                self.write_place(place, value, ctx)
            }
        }
    }

    /// Spreads `items` over a target list, with at most one `*rest`.
    pub(crate) fn destructure(
        &mut self,
        targets: &[AssignTarget],
        items: Vec<Value>,
        ctx: &ContextRef,
    ) -> EvalResult<()> {
        let item = |index: usize| items.get(index).cloned().unwrap_or_else(Value::nil);
        let Some(splat) = targets
            .iter()
            .position(|target| matches!(target, AssignTarget::Splat(_)))
        else {
            for (index, target) in targets.iter().enumerate() {
                self.assign(target, item(index), ctx)?;
            }
            return Ok(());
        };
        let after = targets.len() - splat - 1;
        for (index, target) in targets[..splat].iter().enumerate() {
            self.assign(target, item(index), ctx)?;
        }
        let rest_start = splat.min(items.len());
        let rest_end = items.len().saturating_sub(after).max(rest_start);
        if let AssignTarget::Splat(Some(inner)) = &targets[splat] {
            let rest = items[rest_start..rest_end].to_vec();
            self.assign(inner, Value::array(rest), ctx)?;
        }
        for (offset, target) in targets[splat + 1..].iter().enumerate() {
            self.assign(target, item(rest_end + offset), ctx)?;
        }
        Ok(())
    }

    // Variables.

    pub(crate) fn ivar_get(&self, target: &Value, name: &str) -> Value {
        let found = match target.kind() {
            ValueKind::Object(object) => object.ivars.borrow().get(name).cloned(),
            ValueKind::Class(class) => class.borrow().ivars.get(name).cloned(),
            _ => None,
        };
        found.unwrap_or_else(Value::nil)
    }

    pub(crate) fn ivar_defined(&self, target: &Value, name: &str) -> bool {
        match target.kind() {
            ValueKind::Object(object) => object.ivars.borrow().contains_key(name),
            ValueKind::Class(class) => class.borrow().ivars.contains_key(name),
            _ => false,
        }
    }

    pub(crate) fn ivar_set(&self, target: &Value, name: &str, value: Value) -> Result<(), Diagnostic> {
        match target.kind() {
            ValueKind::Object(object) => {
                target.check_frozen(&object.class.borrow().full_name())?;
                object.ivars.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            ValueKind::Class(class) => {
                class.borrow_mut().ivars.insert(name.to_string(), value);
                Ok(())
            }
            _ => Err(Diagnostic::new(
                DiagnosticKind::Frozen,
                format!(
                    "can't modify frozen {}: {}",
                    target.type_name(),
                    target.basic_inspect()
                ),
            )),
        }
    }

    pub(crate) fn ivar_names(&self, target: &Value) -> Vec<String> {
        match target.kind() {
            ValueKind::Object(object) => object.ivars.borrow().keys().cloned().collect(),
            ValueKind::Class(class) => class.borrow().ivars.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Class owning `@@vars` seen from `ctx`. Singleton class bodies are
    /// skipped, so `class << self` methods share their class's variables.
    pub(crate) fn cvar_base(&self, ctx: &ContextRef) -> ClassRef {
        ctx.cref
            .iter()
            .rev()
            .find(|class| !class.borrow().is_singleton)
            .cloned()
            .unwrap_or_else(|| self.classes.object.clone())
    }

    pub(crate) fn global_get(&self, name: &str) -> Value {
        if let Some(group) = name.strip_prefix('$').and_then(|n| n.parse::<usize>().ok()) {
            let Some(last_match) = self.globals.get("$~") else {
                return Value::nil();
            };
            return regexp::group(last_match, group);
        }
        self.globals.get(name).cloned().unwrap_or_else(Value::nil)
    }

    pub(crate) fn global_set(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    // Constants.

    /// Innermost module of the lexical nesting, or `Object`.
    pub(crate) fn lexical_module(&self, ctx: &ContextRef) -> ClassRef {
        ctx.cref
            .last()
            .cloned()
            .unwrap_or_else(|| self.classes.object.clone())
    }

    pub(crate) fn lookup_const(&mut self, path: &ConstPath, ctx: &ContextRef) -> EvalResult {
        let name = path.name.as_str();
        if let Some(scope) = &path.scope {
            let scope = self.eval(scope, ctx)?;
            return self.scoped_const(&scope, name);
        }
        if !path.top_level {
            for class in ctx.cref.iter().rev() {
                if let Some(value) = class.borrow().constants.get(name) {
                    return Ok(value.clone());
                }
            }
            if let Some(value) = ctx.cref.last().and_then(|inner| const_lookup(inner, name)) {
                return Ok(value);
            }
        }
        self.top_level_const(name)
    }

    pub(crate) fn top_level_const(&mut self, name: &str) -> EvalResult {
        if let Some(value) = const_lookup(&self.classes.object, name) {
            return Ok(value);
        }
        if self.is_host_namespace(name) {
            return Ok(Value::new(ValueKind::HostNamespace(name.to_string())));
        }
        if let Some(class) = self.host_types.get(name).cloned() {
            self.policy().check(name)?;
            return Ok(Value::class(class));
        }
        Err(name_error(format!("uninitialized constant {name}")).into())
    }

    pub(crate) fn scoped_const(&mut self, scope: &Value, name: &str) -> EvalResult {
        match scope.kind() {
            ValueKind::Class(class) => const_lookup(class, name).ok_or_else(|| {
                name_error(format!(
                    "uninitialized constant {}::{name}",
                    class.borrow().full_name()
                ))
                .into()
            }),
            ValueKind::HostNamespace(namespace) => self.host_member(namespace, name),
            _ => Err(type_error(format!("{} is not a class/module", scope.basic_inspect())).into()),
        }
    }

    /// Resolves `Namespace::Name` against the registered host types,
    /// consulting the security policy for every concrete type.
    fn host_member(&mut self, namespace: &str, name: &str) -> EvalResult {
        let full_name = format!("{namespace}.{name}");
        if self.is_host_namespace(&full_name) {
            return Ok(Value::new(ValueKind::HostNamespace(full_name)));
        }
        self.policy().check(&full_name)?;
        match self.host_types.get(&full_name) {
            Some(class) => Ok(Value::class(class.clone())),
            None => Err(name_error(format!(
                "uninitialized constant {}",
                full_name.replace('.', "::")
            ))
            .into()),
        }
    }

    fn is_host_namespace(&self, name: &str) -> bool {
        self.host_types.keys().any(|full| {
            full.strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    pub(crate) fn const_set(&mut self, class: &ClassRef, name: &str, value: Value) {
        if let Some(named) = value.as_class() {
            if named.borrow().name.is_empty() {
                let mut named = named.borrow_mut();
                named.name = name.to_string();
                if !std::rc::Rc::ptr_eq(class, &self.classes.object) {
                    named.lexical_parent = Some(class.clone());
                }
            }
        }
        class.borrow_mut().constants.insert(name.to_string(), value);
    }

    pub(crate) fn expect_module(&self, value: &Value) -> EvalResult<ClassRef> {
        value.as_class().cloned().ok_or_else(|| {
            type_error(format!("{} is not a class/module", value.basic_inspect())).into()
        })
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Nil => Value::nil(),
        Literal::Bool(value) => Value::bool(*value),
        Literal::Int(value) => Value::int(*value),
        Literal::BigInt(value) => Value::integer(*value),
        Literal::Float(value) => Value::float(*value),
        Literal::String(text) => Value::string(text.clone()),
        Literal::Symbol(name) => Value::symbol(name),
    }
}

/// Implicit array conversion used by multiple assignment and block
/// parameters: arrays spread, anything else is a single item.
pub(crate) fn to_ary(value: &Value) -> Vec<Value> {
    match value.as_array() {
        Some(array) => array.to_vec(),
        None => vec![value.clone()],
    }
}
