//! `Proc` and `Method`.

use crate::{
    ast::{ParamList, ParamTarget},
    diagnostics::{argument_error, type_error},
    object::MethodBody,
    runtime::{CallArgs, EvalResult, Interpreter},
    value::{NativeFunction, Proc, ProcBody, Value, ValueKind},
};

use super::{int_arg, StdlibRegistry};

fn proc_of(value: &Value) -> EvalResult<&Proc> {
    value.as_proc().ok_or_else(|| type_error("not a Proc").into())
}

fn native_proc(interp: &mut Interpreter, function: NativeFunction) -> Value {
    Value::proc(Proc {
        id: interp.next_proc_id(),
        body: ProcBody::Native(function),
        is_lambda: true,
    })
}

fn describe(params: &ParamList, is_lambda: bool) -> Value {
    let entry = |kind: &str, name: Option<&str>| {
        let mut entry = vec![Value::symbol(kind)];
        if let Some(name) = name {
            entry.push(Value::symbol(name));
        }
        Value::array(entry)
    };
    let required = if is_lambda { "req" } else { "opt" };
    let target = |target: &ParamTarget| match target {
        ParamTarget::Name(name) => entry(required, Some(name)),
        ParamTarget::Nested(_) => entry(required, None),
    };
    let mut out: Vec<Value> = params.required.iter().map(target).collect();
    out.extend(params.optional.iter().map(|(name, _)| entry("opt", Some(name))));
    if let Some(rest) = &params.rest {
        out.push(entry("rest", (rest != "*").then_some(rest.as_str())));
    }
    out.extend(params.post.iter().map(target));
    for (name, default) in &params.keywords {
        out.push(entry(if default.is_some() { "key" } else { "keyreq" }, Some(name)));
    }
    if let Some(kwrest) = &params.kwrest {
        out.push(entry("keyrest", Some(kwrest)));
    }
    if let Some(block) = &params.block {
        out.push(entry("block", Some(block)));
    }
    Value::array(out)
}

fn native_parameters(arity: i64) -> Value {
    if arity < 0 {
        let required = (-arity - 1) as usize;
        let mut out = vec![Value::array(vec![Value::symbol("req")]); required];
        out.push(Value::array(vec![Value::symbol("rest")]));
        return Value::array(out);
    }
    Value::array(vec![Value::array(vec![Value::symbol("req")]); arity as usize])
}

fn method_parameters(body: &MethodBody, arity: i64) -> Value {
    match body {
        MethodBody::User { def, .. } => describe(&def.params, true),
        MethodBody::Proc(value) => match value.as_proc().map(|proc| (&proc.body, proc.is_lambda)) {
            Some((ProcBody::Block { literal, .. }, is_lambda)) => describe(&literal.params, is_lambda),
            _ => native_parameters(arity),
        },
        MethodBody::AttrWriter(_) => Value::array(vec![Value::array(vec![Value::symbol("req")])]),
        _ => native_parameters(arity),
    }
}

fn parameters(value: &Value) -> Value {
    match value.kind() {
        ValueKind::Proc(proc) => match &proc.body {
            ProcBody::Block { literal, .. } => describe(&literal.params, proc.is_lambda),
            ProcBody::Method(method) => method_parameters(&method.entry.body, method.entry.arity()),
            ProcBody::Symbol(_) => Value::array(vec![
                Value::array(vec![Value::symbol("req")]),
                Value::array(vec![Value::symbol("rest")]),
            ]),
            ProcBody::Native(native) => native_parameters(native.arity as i64),
        },
        ValueKind::Method(method) => method_parameters(&method.entry.body, method.entry.arity()),
        _ => Value::array(Vec::new()),
    }
}

/// A lambda that gathers arguments until `arity` are present, then calls
/// `target` with all of them.
fn curried(interp: &mut Interpreter, target: Value, arity: usize, collected: Vec<Value>) -> Value {
    let function = NativeFunction::new("curry", -1, move |interp, _, args| {
        let mut gathered = collected.clone();
        gathered.extend(args.positional);
        if gathered.len() >= arity {
            return interp.call_proc(&target, CallArgs::new(gathered).with_block(args.block));
        }
        Ok(curried(interp, target.clone(), arity, gathered))
    });
    native_proc(interp, function)
}

/// `f >> g` calls `g(f(x))`; `f << g` calls `f(g(x))`.
fn compose(interp: &mut Interpreter, first: Value, second: Value) -> Value {
    let function = NativeFunction::new("composed", -1, move |interp, _, args| {
        let middle = interp.call_proc(&first, args)?;
        interp.call_proc(&second, CallArgs::new(vec![middle]))
    });
    native_proc(interp, function)
}

fn callable(interp: &Interpreter, value: &Value) -> EvalResult<Value> {
    if value.as_proc().is_some() || matches!(value.kind(), ValueKind::Method(_)) || interp.responds_to(value, "call") {
        return Ok(value.clone());
    }
    Err(type_error("callable object is expected").into())
}

fn method_as_proc(interp: &mut Interpreter, recv: &Value) -> EvalResult {
    match recv.kind() {
        ValueKind::Method(method) => Ok(Value::proc(Proc {
            id: interp.next_proc_id(),
            body: ProcBody::Method(method.clone()),
            is_lambda: true,
        })),
        _ => Err(type_error("not a Method").into()),
    }
}

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("Proc")
        .native("call", -1, |interp, recv, args| interp.call_proc(recv, args))
        .alias("()", "call")
        .alias("[]", "call")
        .alias("yield", "call")
        .alias("===", "call")
        .native("to_proc", 0, |_, recv, _| Ok(recv.clone()))
        .native("lambda?", 0, |_, recv, _| Ok(Value::bool(proc_of(recv)?.is_lambda)))
        .native("arity", 0, |_, recv, _| Ok(Value::int(proc_of(recv)?.arity())))
        .native("parameters", 0, |_, recv, _| Ok(parameters(recv)))
        .native("curry", -1, |interp, recv, args| {
            let proc = proc_of(recv)?;
            let arity = proc.arity();
            let wanted = match args.positional.first() {
                Some(n) => {
                    let n = int_arg(interp, n)?;
                    let required = if arity < 0 { -arity - 1 } else { arity };
                    if proc.is_lambda && (n < required || (arity >= 0 && n != arity)) {
                        return Err(argument_error(format!(
                            "wrong number of arguments (given {n}, expected {arity})"
                        ))
                        .into());
                    }
                    n
                }
                None if arity < 0 => -arity - 1,
                None => arity,
            };
            if wanted <= 0 {
                return Ok(recv.clone());
            }
            Ok(curried(interp, recv.clone(), wanted as usize, Vec::new()))
        })
        .native(">>", 1, |interp, recv, args| {
            let next = callable(interp, &args.arg(0))?;
            Ok(compose(interp, recv.clone(), next))
        })
        .native("<<", 1, |interp, recv, args| {
            let previous = callable(interp, &args.arg(0))?;
            Ok(compose(interp, previous, recv.clone()))
        })
        .native("inspect", 0, |_, recv, _| Ok(Value::string(recv.basic_inspect())))
        .alias("to_s", "inspect")
        .native("==", 1, |_, recv, args| Ok(Value::bool(recv.identical(&args.arg(0)))))
        .alias("eql?", "==")
        .native("hash", 0, |_, recv, _| Ok(Value::int(super::object::hash_of(recv))));

    registry
        .singleton_table("Proc")
        .native("new", 0, |_, _, args| {
            args.block
                .ok_or_else(|| argument_error("tried to create Proc object without a block").into())
        });

    registry
        .table("Method")
        .native("call", -1, |interp, recv, args| {
            let ValueKind::Method(method) = recv.kind() else {
                return Err(type_error("not a Method").into());
            };
            let found = crate::object::ResolvedMethod {
                entry: method.entry.clone(),
                owner: method.owner.clone(),
            };
            interp.invoke(&method.receiver, found, args)
        })
        .alias("()", "call")
        .alias("[]", "call")
        .alias("===", "call")
        .native("to_proc", 0, |interp, recv, _| method_as_proc(interp, recv))
        .native("arity", 0, |_, recv, _| match recv.kind() {
            ValueKind::Method(method) => Ok(Value::int(method.entry.arity())),
            _ => Err(type_error("not a Method").into()),
        })
        .native("parameters", 0, |_, recv, _| Ok(parameters(recv)))
        .native("name", 0, |_, recv, _| match recv.kind() {
            ValueKind::Method(method) => Ok(Value::symbol(&method.name)),
            _ => Ok(Value::nil()),
        })
        .native("owner", 0, |_, recv, _| match recv.kind() {
            ValueKind::Method(method) => Ok(Value::class(method.owner.clone())),
            _ => Ok(Value::nil()),
        })
        .native("receiver", 0, |_, recv, _| match recv.kind() {
            ValueKind::Method(method) => Ok(method.receiver.clone()),
            _ => Ok(Value::nil()),
        })
        .native("curry", -1, |interp, recv, args| {
            let proc = method_as_proc(interp, recv)?;
            interp.send(&proc, "curry", args)
        })
        .native(">>", 1, |interp, recv, args| {
            let next = callable(interp, &args.arg(0))?;
            Ok(compose(interp, recv.clone(), next))
        })
        .native("<<", 1, |interp, recv, args| {
            let previous = callable(interp, &args.arg(0))?;
            Ok(compose(interp, previous, recv.clone()))
        })
        .native("inspect", 0, |interp, recv, _| match recv.kind() {
            ValueKind::Method(method) => Ok(Value::string(format!(
                "#<Method: {}#{}>",
                interp.class_name_of(&method.receiver),
                method.name
            ))),
            _ => Ok(Value::string(recv.basic_inspect())),
        })
        .alias("to_s", "inspect");
}
