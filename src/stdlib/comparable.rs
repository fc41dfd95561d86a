//! `Comparable`, built on the receiver's `<=>`.

use std::cmp::Ordering;

use crate::{
    diagnostics::argument_error,
    runtime::{CallArgs, EvalResult, Interpreter},
    value::Value,
};

use super::StdlibRegistry;

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("Comparable")
        .native("==", 1, |interp, recv, args| {
            let other = args.arg(0);
            if recv.identical(&other) {
                return Ok(Value::bool(true));
            }
            Ok(Value::bool(spaceship(interp, recv, &other)? == Some(Ordering::Equal)))
        })
        .native("<", 1, |interp, recv, args| {
            ordered(interp, recv, &args.arg(0), |o| o == Ordering::Less)
        })
        .native("<=", 1, |interp, recv, args| {
            ordered(interp, recv, &args.arg(0), |o| o != Ordering::Greater)
        })
        .native(">", 1, |interp, recv, args| {
            ordered(interp, recv, &args.arg(0), |o| o == Ordering::Greater)
        })
        .native(">=", 1, |interp, recv, args| {
            ordered(interp, recv, &args.arg(0), |o| o != Ordering::Less)
        })
        .native("between?", 2, |interp, recv, args| {
            let low = strict(interp, recv, &args.arg(0))?;
            let high = strict(interp, recv, &args.arg(1))?;
            Ok(Value::bool(low != Ordering::Less && high != Ordering::Greater))
        })
        .native("clamp", -2, |interp, recv, args| {
            let (low, high) = match args.arg(0).kind() {
                crate::value::ValueKind::Range(range) if args.len() == 1 => {
                    (range.from.clone(), range.to.clone())
                }
                _ => (args.arg(0), args.arg(1)),
            };
            if !low.is_nil() && !high.is_nil() && strict(interp, &low, &high)? == Ordering::Greater {
                return Err(argument_error("min argument must be less than or equal to max argument").into());
            }
            if !low.is_nil() && strict(interp, recv, &low)? == Ordering::Less {
                return Ok(low);
            }
            if !high.is_nil() && strict(interp, recv, &high)? == Ordering::Greater {
                return Ok(high);
            }
            Ok(recv.clone())
        });
}

/// Result of `left <=> right`, or `None` when the values are unordered.
fn spaceship(interp: &mut Interpreter, left: &Value, right: &Value) -> EvalResult<Option<Ordering>> {
    let result = interp.send(left, "<=>", CallArgs::new(vec![right.clone()]))?;
    Ok(result.as_int().map(|n| n.cmp(&0)))
}

fn strict(interp: &mut Interpreter, left: &Value, right: &Value) -> EvalResult<Ordering> {
    match spaceship(interp, left, right)? {
        Some(ordering) => Ok(ordering),
        None => Err(interp.comparison_failed(left, right).into()),
    }
}

fn ordered(
    interp: &mut Interpreter,
    left: &Value,
    right: &Value,
    test: fn(Ordering) -> bool,
) -> EvalResult {
    Ok(Value::bool(test(strict(interp, left, right)?)))
}
