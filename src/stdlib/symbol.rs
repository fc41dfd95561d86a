use std::cmp::Ordering;

use crate::{
    runtime::{CallArgs, EvalResult, Interpreter},
    value::{Proc, ProcBody, Value},
};

use super::StdlibRegistry;

fn name_of(value: &Value) -> String {
    value
        .as_symbol()
        .map(|symbol| symbol.name().to_string())
        .unwrap_or_default()
}

/// Applies a String method to the symbol's name and converts a String
/// result back to a Symbol.
fn via_string(interp: &mut Interpreter, recv: &Value, method: &str, args: CallArgs) -> EvalResult {
    let result = interp.send(&Value::string(name_of(recv)), method, args)?;
    Ok(match result.as_string() {
        Some(text) => Value::symbol(&text),
        None => result,
    })
}

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("Symbol")
        .native("to_s", 0, |_, recv, _| Ok(Value::string(name_of(recv))))
        .alias("id2name", "to_s")
        .alias("name", "to_s")
        .native("to_sym", 0, |_, recv, _| Ok(recv.clone()))
        .native("inspect", 0, |_, recv, _| {
            Ok(Value::string(recv.as_symbol().map(|s| s.inspect()).unwrap_or_default()))
        })
        .native("to_proc", 0, |interp, recv, _| {
            let Some(symbol) = recv.as_symbol() else {
                return Ok(Value::nil());
            };
            Ok(Value::proc(Proc {
                id: interp.next_proc_id(),
                body: ProcBody::Symbol(symbol.clone()),
                is_lambda: true,
            }))
        })
        .native("length", 0, |_, recv, _| Ok(Value::int(name_of(recv).chars().count() as i64)))
        .alias("size", "length")
        .native("empty?", 0, |_, recv, _| Ok(Value::bool(name_of(recv).is_empty())))
        .native("upcase", 0, |interp, recv, _| via_string(interp, recv, "upcase", CallArgs::default()))
        .native("downcase", 0, |interp, recv, _| {
            via_string(interp, recv, "downcase", CallArgs::default())
        })
        .native("capitalize", 0, |interp, recv, _| {
            via_string(interp, recv, "capitalize", CallArgs::default())
        })
        .native("swapcase", 0, |interp, recv, _| {
            via_string(interp, recv, "swapcase", CallArgs::default())
        })
        .native("succ", 0, |interp, recv, _| via_string(interp, recv, "succ", CallArgs::default()))
        .native("[]", -2, |interp, recv, args| {
            interp.send(&Value::string(name_of(recv)), "[]", args)
        })
        .native("start_with?", -1, |interp, recv, args| {
            interp.send(&Value::string(name_of(recv)), "start_with?", args)
        })
        .native("end_with?", -1, |interp, recv, args| {
            interp.send(&Value::string(name_of(recv)), "end_with?", args)
        })
        .native("=~", 1, |interp, recv, args| {
            interp.send(&Value::string(name_of(recv)), "=~", args)
        })
        .native("==", 1, |_, recv, args| {
            Ok(Value::bool(
                args.arg(0).as_symbol().is_some_and(|other| Some(other) == recv.as_symbol()),
            ))
        })
        .alias("===", "==")
        .alias("eql?", "==")
        .native("<=>", 1, |_, recv, args| {
            let other = args.arg(0);
            if other.as_symbol().is_none() {
                return Ok(Value::nil());
            }
            let other = name_of(&other);
            Ok(Value::int(match name_of(recv).cmp(&other) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            }))
        })
        .native("hash", 0, |_, recv, _| Ok(Value::int(super::object::hash_of(recv))));
}
