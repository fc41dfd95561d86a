//! `Range`, numeric only. `each` walks the bounds lazily so `break` works
//! on endless ranges.

use crate::{
    ast::BinaryOp,
    diagnostics::{argument_error, type_error},
    range::{self as numeric_range, Bounds},
    runtime::{CallArgs, EvalResult, Interpreter},
    value::{RangeValue, Value, ValueKind},
};

use super::{block_of, enumerable::sorted, int_arg, yield1, StdlibRegistry};

fn range_of(value: &Value) -> EvalResult<&RangeValue> {
    match value.kind() {
        ValueKind::Range(range) => Ok(range),
        _ => Err(type_error("not a Range").into()),
    }
}

fn members(recv: &Value) -> EvalResult<Vec<Value>> {
    let range = range_of(recv)?;
    if range.to.is_nil() {
        return Err(argument_error("cannot convert endless range to an array").into());
    }
    Ok(numeric_range::to_vec(&range.from, &range.to, range.exclusive)?)
}

/// Yields members in order until the range is exhausted.
fn walk(interp: &mut Interpreter, recv: &Value, block: &Value) -> EvalResult<()> {
    let range = range_of(recv)?;
    if range.to.is_nil() {
        let mut current = range.from.clone();
        if !current.is_numeric() {
            return Err(type_error(format!("can't iterate from {}", interp.class_name_of(&current))).into());
        }
        loop {
            yield1(interp, block, current.clone())?;
            current = interp.binary(BinaryOp::Add, current, Value::int(1))?;
        }
    }
    match Bounds::coerce(&range.from, &range.to)? {
        Bounds::Int(a, b) => {
            let mut current = a as i128;
            let end = if range.exclusive { b as i128 } else { b as i128 + 1 };
            while current < end {
                yield1(interp, block, Value::integer(current))?;
                current += 1;
            }
        }
        Bounds::Wide(a, b) => {
            let mut current = a;
            let end = if range.exclusive { b } else { b.saturating_add(1) };
            while current < end {
                yield1(interp, block, Value::integer(current))?;
                current += 1;
            }
        }
        Bounds::Float(a, _) if !matches!(range.from.kind(), ValueKind::Float(_)) => {
            let mut current = a as i128;
            loop {
                let member = Value::integer(current);
                if !numeric_range::includes(&range.from, &range.to, range.exclusive, &member)? {
                    break;
                }
                yield1(interp, block, member)?;
                current += 1;
            }
        }
        Bounds::Float(a, b) => {
            let mut current = a;
            while !numeric_range::float_past_end(current, b, range.exclusive) {
                yield1(interp, block, Value::float(current))?;
                current += 1.0;
            }
        }
    }
    Ok(())
}

fn step_values(interp: &mut Interpreter, recv: &Value, step: &Value) -> EvalResult<Vec<Value>> {
    let range = range_of(recv)?;
    let Some(increment) = step.as_number().filter(|_| step.is_numeric()) else {
        return Err(type_error("step must be numeric").into());
    };
    if increment == 0.0 {
        return Err(argument_error("step can't be 0").into());
    }
    if increment < 0.0 {
        return Err(argument_error("step can't be negative").into());
    }
    let float = [&range.from, &range.to, step]
        .iter()
        .any(|value| matches!(value.kind(), ValueKind::Float(_)));
    let mut out = Vec::new();
    if float {
        let (Some(a), Some(b)) = (range.from.as_number(), range.to.as_number()) else {
            return Err(type_error("range must be numeric").into());
        };
        let count = ((b - a) / increment + 1e-9).floor() as i64;
        for i in 0..=count.max(-1) {
            let value = a + i as f64 * increment;
            if range.exclusive && value >= b {
                break;
            }
            out.push(Value::float(value));
        }
        return Ok(out);
    }
    let increment = int_arg(interp, step)?;
    let mut current = range.from.clone();
    while numeric_range::includes(&range.from, &range.to, range.exclusive, &current)? {
        out.push(current.clone());
        current = interp.binary(BinaryOp::Add, current, Value::int(increment))?;
    }
    Ok(out)
}

fn edge(interp: &Interpreter, recv: &Value, args: &CallArgs, last: bool) -> EvalResult {
    let range = range_of(recv)?;
    let Some(n) = args.positional.first() else {
        return Ok(if last { range.to.clone() } else { range.from.clone() });
    };
    let n = int_arg(interp, n)?;
    if n < 0 {
        return Err(argument_error("negative array size (or size too big)").into());
    }
    let n = n as usize;
    if !last && range.to.is_nil() {
        return Ok(Value::array(
            (0..n as i64).map(|i| range.from.as_int().map_or_else(Value::nil, |a| Value::int(a + i))).collect(),
        ));
    }
    let values = members(recv)?;
    let taken = if last {
        values[values.len().saturating_sub(n)..].to_vec()
    } else {
        values.into_iter().take(n).collect()
    };
    Ok(Value::array(taken))
}

fn bound_to_s(interp: &mut Interpreter, value: &Value, inspect: bool) -> EvalResult<String> {
    if value.is_nil() {
        return Ok(String::new());
    }
    if inspect {
        interp.inspect(value)
    } else {
        interp.to_s(value)
    }
}

fn render(interp: &mut Interpreter, recv: &Value, inspect: bool) -> EvalResult {
    let range = range_of(recv)?;
    let dots = if range.exclusive { "..." } else { ".." };
    let from = bound_to_s(interp, &range.from, inspect)?;
    let to = bound_to_s(interp, &range.to, inspect)?;
    Ok(Value::string(format!("{from}{dots}{to}")))
}

fn covers(recv: &Value, value: &Value) -> EvalResult<bool> {
    let range = range_of(recv)?;
    if range.to.is_nil() {
        let (Some(from), Some(x)) = (range.from.as_number(), value.as_number()) else {
            return Ok(false);
        };
        return Ok(value.is_numeric() && x >= from);
    }
    Ok(numeric_range::includes(&range.from, &range.to, range.exclusive, value)?)
}

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("Range")
        .native("each", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            walk(interp, recv, &block)?;
            Ok(recv.clone())
        })
        .native("first", -1, |interp, recv, args| edge(interp, recv, &args, false))
        .native("last", -1, |interp, recv, args| edge(interp, recv, &args, true))
        .native("begin", 0, |_, recv, _| Ok(range_of(recv)?.from.clone()))
        .native("end", 0, |_, recv, _| Ok(range_of(recv)?.to.clone()))
        .native("exclude_end?", 0, |_, recv, _| Ok(Value::bool(range_of(recv)?.exclusive)))
        .native("min", -1, |interp, recv, args| {
            if args.block.is_some() || !args.is_empty() {
                let values = sorted(interp, members(recv)?, args.block.as_ref())?;
                return Ok(match args.positional.first() {
                    Some(n) => Value::array(values.into_iter().take(int_arg(interp, n)?.max(0) as usize).collect()),
                    None => values.into_iter().next().unwrap_or_else(Value::nil),
                });
            }
            let range = range_of(recv)?;
            Ok(if numeric_range::len(&range.from, &range.to, range.exclusive)? == 0 {
                Value::nil()
            } else {
                range.from.clone()
            })
        })
        .native("max", -1, |interp, recv, args| {
            if args.block.is_some() || !args.is_empty() {
                let values = sorted(interp, members(recv)?, args.block.as_ref())?;
                return Ok(match args.positional.first() {
                    Some(n) => Value::array(
                        values.into_iter().rev().take(int_arg(interp, n)?.max(0) as usize).collect(),
                    ),
                    None => values.into_iter().last().unwrap_or_else(Value::nil),
                });
            }
            let range = range_of(recv)?;
            if range.exclusive && !matches!(range.to.kind(), ValueKind::Int(_) | ValueKind::BigInt(_)) {
                return Err(type_error("cannot exclude non Integer end value").into());
            }
            Ok(members(recv)?.pop().unwrap_or_else(Value::nil))
        })
        .native("size", 0, |_, recv, _| {
            let range = range_of(recv)?;
            if range.to.is_nil() {
                return Ok(Value::float(f64::INFINITY));
            }
            if !matches!(range.from.kind(), ValueKind::Int(_) | ValueKind::BigInt(_)) {
                return Err(type_error(format!("can't iterate from {}", range.from.type_name())).into());
            }
            Ok(Value::integer(numeric_range::count(&range.from, &range.to, range.exclusive)?))
        })
        .native("count", -1, |interp, recv, args| {
            if args.block.is_none() && args.is_empty() {
                return interp.send(recv, "size", CallArgs::default());
            }
            let mut count = 0;
            for value in members(recv)? {
                let hit = match (args.positional.first(), &args.block) {
                    (Some(target), _) => interp.values_equal(&value, target)?,
                    (None, Some(block)) => yield1(interp, block, value)?.is_truthy(),
                    (None, None) => true,
                };
                if hit {
                    count += 1;
                }
            }
            Ok(Value::int(count))
        })
        .native("to_a", 0, |_, recv, _| Ok(Value::array(members(recv)?)))
        .alias("entries", "to_a")
        .native("include?", 1, |_, recv, args| Ok(Value::bool(covers(recv, &args.arg(0))?)))
        .alias("member?", "include?")
        .alias("cover?", "include?")
        .native("===", 1, |_, recv, args| {
            let value = args.arg(0);
            Ok(Value::bool(value.is_numeric() && covers(recv, &value)?))
        })
        .native("step", 1, |interp, recv, args| {
            let values = step_values(interp, recv, &args.arg(0))?;
            match &args.block {
                Some(block) => {
                    for value in values {
                        yield1(interp, block, value)?;
                    }
                    Ok(recv.clone())
                }
                None => Ok(Value::array(values)),
            }
        })
        .alias("%", "step")
        .native("sum", -1, |interp, recv, args| {
            let range = range_of(recv)?;
            if args.block.is_none() {
                let total = numeric_range::sum(&range.from, &range.to, range.exclusive)?;
                return match args.positional.first() {
                    Some(init) => interp.binary(BinaryOp::Add, init.clone(), total),
                    None => Ok(total),
                };
            }
            let mut total = args.positional.first().cloned().unwrap_or_else(|| Value::int(0));
            for value in members(recv)? {
                let mapped = match &args.block {
                    Some(block) => yield1(interp, block, value)?,
                    None => value,
                };
                total = interp.binary(BinaryOp::Add, total, mapped)?;
            }
            Ok(total)
        })
        .native("to_s", 0, |interp, recv, _| render(interp, recv, false))
        .native("inspect", 0, |interp, recv, _| render(interp, recv, true))
        .native("==", 1, |interp, recv, args| Ok(Value::bool(interp.values_equal(recv, &args.arg(0))?)))
        .alias("eql?", "==")
        .native("hash", 0, |_, recv, _| Ok(Value::int(super::object::hash_of(recv))));
}
