//! `BasicObject`, `Object`, `NilClass`, `TrueClass` and `FalseClass`.

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::{
    ast::BinaryOp,
    diagnostics::{name_error, type_error, Diagnostic},
    object::{include_module, method_names, DynamicObject, MethodBody, MethodEntry, Visibility},
    runtime::{CallArgs, EvalResult, Interpreter},
    value::{HashKey, MethodValue, Value, ValueKind},
};

use super::{block_of, name_arg, yield1, StdlibRegistry};

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("BasicObject")
        .native("initialize", 0, |_, _, _| Ok(Value::nil()))
        .native("==", 1, |_, recv, args| Ok(Value::bool(recv.identical(&args.arg(0)))))
        .alias("equal?", "==")
        .native("!", 0, |_, recv, _| Ok(Value::bool(!recv.is_truthy())))
        .native("!=", 1, not_equal)
        .native("__send__", -2, send)
        .native("__id__", 0, object_id)
        .native("instance_eval", -1, instance_eval)
        .native("instance_exec", -1, instance_exec);

    registry
        .table("Object")
        .native("class", 0, |interp, recv, _| Ok(Value::class(interp.class_of(recv))))
        .native("singleton_class", 0, |interp, recv, _| {
            Ok(Value::class(interp.singleton_class_of(recv)?))
        })
        .native("send", -2, send)
        .native("public_send", -2, public_send)
        .native("object_id", 0, object_id)
        .native("hash", 0, |_, recv, _| Ok(Value::int(hash_of(recv))))
        .native("eql?", 1, |_, recv, args| Ok(Value::bool(recv.identical(&args.arg(0)))))
        .native("===", 1, |interp, recv, args| {
            interp.binary(BinaryOp::Equal, recv.clone(), args.arg(0))
        })
        .native("=~", 1, |_, _, _| Ok(Value::nil()))
        .native("nil?", 0, |_, _, _| Ok(Value::bool(false)))
        .native("is_a?", 1, is_a)
        .alias("kind_of?", "is_a?")
        .native("instance_of?", 1, |interp, recv, args| {
            let class = interp.expect_module(&args.arg(0))?;
            Ok(Value::bool(std::rc::Rc::ptr_eq(&interp.class_of(recv), &class)))
        })
        .native("respond_to?", -2, respond_to)
        .native("frozen?", 0, |_, recv, _| Ok(Value::bool(recv.is_frozen())))
        .native("freeze", 0, |_, recv, _| {
            recv.freeze();
            Ok(recv.clone())
        })
        .native("to_s", 0, to_s)
        .native("inspect", 0, inspect)
        .native("dup", 0, |_, recv, _| Ok(copy(recv, false)))
        .native("clone", -1, |_, recv, _| Ok(copy(recv, true)))
        .native("itself", 0, |_, recv, _| Ok(recv.clone()))
        .native("tap", 0, |interp, recv, args| {
            yield1(interp, &block_of(&args)?, recv.clone())?;
            Ok(recv.clone())
        })
        .native("then", 0, |interp, recv, args| {
            yield1(interp, &block_of(&args)?, recv.clone())
        })
        .alias("yield_self", "then")
        .native("instance_variable_get", 1, |interp, recv, args| {
            let name = ivar_name(&args.arg(0))?;
            Ok(interp.ivar_get(recv, &name))
        })
        .native("instance_variable_set", 2, |interp, recv, args| {
            let name = ivar_name(&args.arg(0))?;
            let value = args.arg(1);
            interp.ivar_set(recv, &name, value.clone())?;
            Ok(value)
        })
        .native("instance_variable_defined?", 1, |interp, recv, args| {
            let name = ivar_name(&args.arg(0))?;
            Ok(Value::bool(interp.ivar_defined(recv, &name)))
        })
        .native("instance_variables", 0, |interp, recv, _| {
            let names = interp.ivar_names(recv);
            Ok(Value::array(names.iter().map(|n| Value::symbol(n)).collect()))
        })
        .native("remove_instance_variable", 1, remove_instance_variable)
        .native("methods", -1, |interp, recv, _| {
            let names = method_names(&interp.receiver_ancestors(recv), &interp.natives);
            Ok(symbols(names))
        })
        .alias("public_methods", "methods")
        .native("singleton_methods", 0, singleton_methods)
        .native("method", 1, method)
        .native("define_singleton_method", -2, define_singleton_method)
        .native("extend", -2, extend)
        .native("display", 0, |interp, recv, _| {
            let text = interp.to_s(recv)?;
            interp.output.print(&text);
            Ok(Value::nil())
        });

    registry
        .table("NilClass")
        .native("to_s", 0, |_, _, _| Ok(Value::string("")))
        .native("to_a", 0, |_, _, _| Ok(Value::array(Vec::new())))
        .native("to_h", 0, |_, _, _| Ok(Value::hash_from_pairs(Vec::new())))
        .native("to_i", 0, |_, _, _| Ok(Value::int(0)))
        .native("to_f", 0, |_, _, _| Ok(Value::float(0.0)))
        .native("inspect", 0, |_, _, _| Ok(Value::string("nil")))
        .native("nil?", 0, |_, _, _| Ok(Value::bool(true)))
        .native("&", 1, |_, _, _| Ok(Value::bool(false)))
        .native("|", 1, |_, _, args| Ok(Value::bool(args.arg(0).is_truthy())));

    registry
        .table("TrueClass")
        .native("to_s", 0, |_, _, _| Ok(Value::string("true")))
        .alias("inspect", "to_s")
        .native("&", 1, |_, _, args| Ok(Value::bool(args.arg(0).is_truthy())))
        .native("|", 1, |_, _, _| Ok(Value::bool(true)))
        .native("^", 1, |_, _, args| Ok(Value::bool(!args.arg(0).is_truthy())));

    registry
        .table("FalseClass")
        .native("to_s", 0, |_, _, _| Ok(Value::string("false")))
        .alias("inspect", "to_s")
        .native("&", 1, |_, _, _| Ok(Value::bool(false)))
        .native("|", 1, |_, _, args| Ok(Value::bool(args.arg(0).is_truthy())))
        .alias("^", "|");
}

pub(crate) fn hash_of(value: &Value) -> i64 {
    let mut hasher = DefaultHasher::new();
    HashKey::from_value(value).hash(&mut hasher);
    hasher.finish() as i64
}

fn symbols(names: Vec<String>) -> Value {
    Value::array(names.iter().map(|name| Value::symbol(name)).collect())
}

fn not_equal(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let equal = interp.values_equal(recv, &args.arg(0))?;
    Ok(Value::bool(!equal))
}

fn object_id(_: &mut Interpreter, recv: &Value, _: CallArgs) -> EvalResult {
    Ok(Value::int(recv.object_id() as i64))
}

/// Splits `send(name, *args)` into the method name and forwarded arguments.
fn forwarded(args: CallArgs) -> Result<(String, CallArgs), Diagnostic> {
    let mut positional = args.positional;
    let name = name_arg(&positional.remove(0))?;
    let forwarded = CallArgs {
        positional,
        keywords: args.keywords,
        block: args.block,
        span: args.span,
    };
    Ok((name, forwarded))
}

fn send(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let (name, args) = forwarded(args)?;
    interp.send(recv, &name, args)
}

fn public_send(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let (name, args) = forwarded(args)?;
    interp.public_send(recv, &name, args)
}

fn is_a(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let class = args
        .arg(0)
        .as_class()
        .cloned()
        .ok_or_else(|| type_error("class or module required"))?;
    Ok(Value::bool(interp.is_a(recv, &class)))
}

fn respond_to(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let name = name_arg(&args.arg(0))?;
    let include_all = args.arg(1).is_truthy();
    let found = if include_all {
        interp.responds_to_private(recv, &name)
    } else {
        interp.responds_to(recv, &name)
    };
    if found {
        return Ok(Value::bool(true));
    }
    if interp.responds_to_private(recv, "respond_to_missing?") {
        let answer = interp.send(
            recv,
            "respond_to_missing?",
            CallArgs::new(vec![Value::symbol(&name), Value::bool(include_all)]),
        )?;
        return Ok(Value::bool(answer.is_truthy()));
    }
    Ok(Value::bool(false))
}

fn to_s(interp: &mut Interpreter, recv: &Value, _: CallArgs) -> EvalResult {
    if recv.identical(&interp.main()) {
        return Ok(Value::string("main"));
    }
    Ok(Value::string(recv.to_string()))
}

fn inspect(interp: &mut Interpreter, recv: &Value, _: CallArgs) -> EvalResult {
    if recv.identical(&interp.main()) {
        return Ok(Value::string("main"));
    }
    Ok(Value::string(interp.default_inspect(recv)?))
}

/// `dup` and `clone` of a plain object; `clone` also keeps the frozen
/// state and singleton class.
fn copy(recv: &Value, keep_state: bool) -> Value {
    let ValueKind::Object(object) = recv.kind() else {
        return recv.clone();
    };
    let copy = DynamicObject::new(object.class.clone());
    *copy.ivars.borrow_mut() = object.ivars.borrow().clone();
    if keep_state {
        copy.frozen.set(object.frozen.get());
        *copy.singleton.borrow_mut() = object.singleton.borrow().clone();
    }
    Value::object(copy)
}

fn ivar_name(value: &Value) -> Result<String, Diagnostic> {
    let name = name_arg(value)?;
    if !name.starts_with('@') || name.starts_with("@@") || name.len() < 2 {
        return Err(name_error(format!(
            "'{name}' is not allowed as an instance variable name"
        )));
    }
    Ok(name)
}

fn remove_instance_variable(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let name = ivar_name(&args.arg(0))?;
    let removed = match recv.kind() {
        ValueKind::Object(object) => {
            recv.check_frozen(&interp.class_name_of(recv))?;
            object.ivars.borrow_mut().shift_remove(&name)
        }
        ValueKind::Class(class) => class.borrow_mut().ivars.shift_remove(&name),
        _ => None,
    };
    removed.ok_or_else(|| {
        name_error(format!(
            "instance variable {name} not defined for {}",
            recv.basic_inspect()
        ))
        .into()
    })
}

fn singleton_methods(_: &mut Interpreter, recv: &Value, _: CallArgs) -> EvalResult {
    let singleton = match recv.kind() {
        ValueKind::Object(object) => object.singleton.borrow().clone(),
        ValueKind::Class(class) => class.borrow().meta.clone(),
        _ => None,
    };
    let names = singleton
        .map(|class| class.borrow().methods.keys().cloned().collect())
        .unwrap_or_default();
    Ok(symbols(names))
}

fn method(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let name = name_arg(&args.arg(0))?;
    let found = interp.find_method(recv, &name).ok_or_else(|| {
        name_error(format!(
            "undefined method '{name}' for {}",
            interp.class_name_of(recv)
        ))
    })?;
    Ok(Value::new(ValueKind::Method(MethodValue {
        receiver: recv.clone(),
        name,
        owner: found.owner,
        entry: found.entry,
    })))
}

/// The callable a `define_method`-style native installs: a block, a Proc
/// argument or a Method object.
pub(crate) fn method_body(interp: &mut Interpreter, args: &CallArgs) -> EvalResult<MethodBody> {
    let body = match (args.positional.get(1), &args.block) {
        (Some(body), _) => body.clone(),
        (None, Some(block)) => block.clone(),
        (None, None) => {
            return Err(
                crate::diagnostics::argument_error("tried to create Proc object without a block")
                    .into(),
            )
        }
    };
    match body.kind() {
        ValueKind::Proc(_) => Ok(MethodBody::Proc(body)),
        ValueKind::Method(_) => {
            let block = interp.to_block(body)?.unwrap_or_else(Value::nil);
            Ok(MethodBody::Proc(block))
        }
        _ => Err(type_error(format!(
            "wrong argument type {} (expected Proc/Method)",
            interp.class_name_of(&body)
        ))
        .into()),
    }
}

fn define_singleton_method(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let name = name_arg(&args.arg(0))?;
    let body = method_body(interp, &args)?;
    let class = interp.singleton_class_of(recv)?;
    class
        .borrow_mut()
        .define_method(MethodEntry::new(name.clone(), body).with_visibility(Visibility::Public));
    Ok(Value::symbol(&name))
}

fn extend(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let singleton = interp.singleton_class_of(recv)?;
    for module in args.positional.iter().rev() {
        let module_class = interp.expect_module(module)?;
        include_module(&singleton, &module_class)?;
        interp.send(module, "extended", CallArgs::new(vec![recv.clone()]))?;
    }
    Ok(recv.clone())
}

fn instance_eval(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let block = block_of(&args)?;
    let definee = interp
        .singleton_class_of(recv)
        .unwrap_or_else(|_| interp.class_of(recv));
    interp.call_proc_with_self(&block, recv.clone(), definee, CallArgs::new(vec![recv.clone()]))
}

fn instance_exec(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let block = block_of(&args)?;
    let definee = interp
        .singleton_class_of(recv)
        .unwrap_or_else(|_| interp.class_of(recv));
    let forwarded = CallArgs {
        positional: args.positional,
        keywords: args.keywords,
        block: None,
        span: args.span,
    };
    interp.call_proc_with_self(&block, recv.clone(), definee, forwarded)
}
