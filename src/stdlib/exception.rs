//! `Exception`. The message lives in `@message`; subclasses share these
//! methods through the superclass chain.

use crate::{
    diagnostics::type_error,
    object::DynamicObject,
    runtime::{CallArgs, EvalResult, Interpreter},
    value::Value,
};

use super::StdlibRegistry;

/// `to_s` of an exception: its message, or the class name when it has none.
fn text(interp: &mut Interpreter, recv: &Value) -> EvalResult<String> {
    let message = interp.ivar_get(recv, "@message");
    if message.is_nil() {
        return Ok(interp.class_name_of(recv));
    }
    interp.to_s(&message)
}

fn message(interp: &mut Interpreter, recv: &Value) -> EvalResult<String> {
    let message = interp.send(recv, "message", CallArgs::default())?;
    interp.to_s(&message)
}

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("Exception")
        .native("initialize", -1, |interp, recv, args| {
            let args = args.folded();
            if args.len() > 1 {
                return Err(crate::diagnostics::arity_error(args.len(), "0..1").into());
            }
            interp.ivar_set(recv, "@message", args.arg(0))?;
            Ok(Value::nil())
        })
        .native("to_s", 0, |interp, recv, _| Ok(Value::string(text(interp, recv)?)))
        .native("message", 0, |interp, recv, _| {
            interp.send(recv, "to_s", CallArgs::default())
        })
        .native("detailed_message", -1, |interp, recv, _| {
            let message = message(interp, recv)?;
            Ok(Value::string(format!("{message} ({})", interp.class_name_of(recv))))
        })
        .native("full_message", -1, |interp, recv, _| {
            let message = message(interp, recv)?;
            Ok(Value::string(format!("{message} ({})", interp.class_name_of(recv))))
        })
        .native("inspect", 0, |interp, recv, _| {
            let class_name = interp.class_name_of(recv);
            let message = message(interp, recv)?;
            Ok(Value::string(if message.is_empty() || message == class_name {
                class_name
            } else {
                format!("#<{class_name}: {message}>")
            }))
        })
        .native("backtrace", 0, |interp, recv, _| Ok(interp.ivar_get(recv, "@backtrace")))
        .native("set_backtrace", 1, |interp, recv, args| {
            interp.ivar_set(recv, "@backtrace", args.arg(0))?;
            Ok(args.arg(0))
        })
        .native("cause", 0, |interp, recv, _| Ok(interp.ivar_get(recv, "@cause")))
        .native("exception", -1, |_, recv, args| {
            let Some(new_message) = args.positional.first() else {
                return Ok(recv.clone());
            };
            let Some(object) = recv.as_object() else {
                return Err(type_error("exception object expected").into());
            };
            let copy = DynamicObject::new(object.class.clone());
            *copy.ivars.borrow_mut() = object.ivars.borrow().clone();
            copy.ivars.borrow_mut().insert("@message".into(), new_message.clone());
            Ok(Value::object(copy))
        })
        .native("==", 1, |interp, recv, args| {
            let other = args.arg(0);
            if recv.identical(&other) {
                return Ok(Value::bool(true));
            }
            if other.as_object().is_none() || interp.class_name_of(recv) != interp.class_name_of(&other) {
                return Ok(Value::bool(false));
            }
            Ok(Value::bool(message(interp, recv)? == message(interp, &other)?))
        });

    registry
        .singleton_table("Exception")
        .native("exception", -1, |interp, recv, args| {
            let Some(class) = recv.as_class().cloned() else {
                return Err(type_error("class expected").into());
            };
            interp.instantiate(&class, args)
        })
        .native("to_tty?", 0, |_, _, _| Ok(Value::bool(false)));
}
