//! `Array`. Blocks never run while the item vector is borrowed: methods
//! snapshot the items, run the block, then write the result back.

use std::collections::HashSet;

use rand::seq::SliceRandom;

use crate::{
    diagnostics::{argument_error, Diagnostic, DiagnosticKind},
    runtime::{to_ary, CallArgs, EvalResult, Interpreter},
    value::{HashKey, Value, ValueKind},
};

use super::{
    block_of,
    enumerable::{sorted, sorted_by},
    int_arg,
    normalize_index, slice_bounds, str_arg, yield1, StdlibRegistry,
};

fn items(value: &Value) -> Vec<Value> {
    value.as_array().map(|array| array.to_vec()).unwrap_or_default()
}

fn len(value: &Value) -> usize {
    value.as_array().map_or(0, |array| array.len())
}

/// Applies an in-place edit, refusing frozen arrays.
fn mutate<T>(recv: &Value, edit: impl FnOnce(&mut Vec<Value>) -> T) -> EvalResult<T> {
    recv.check_frozen("Array")?;
    match recv.as_array() {
        Some(array) => Ok(edit(&mut array.items.borrow_mut())),
        None => Err(argument_error("not an Array").into()),
    }
}

/// Replaces the items; returns `recv`, or nil when the length is unchanged
/// and `nil_if_same` is set.
fn replace_items(recv: &Value, updated: Vec<Value>, nil_if_same: bool) -> EvalResult {
    let changed = mutate(recv, |current| {
        let changed = current.len() != updated.len();
        *current = updated;
        changed
    })?;
    Ok(if nil_if_same && !changed { Value::nil() } else { recv.clone() })
}

fn array_arg(interp: &Interpreter, value: &Value) -> Result<Vec<Value>, Diagnostic> {
    match value.as_array() {
        Some(array) => Ok(array.to_vec()),
        None => Err(crate::diagnostics::type_error(format!(
            "no implicit conversion of {} into Array",
            interp.class_name_of(value)
        ))),
    }
}

fn count_arg(interp: &Interpreter, value: &Value) -> EvalResult<usize> {
    let n = int_arg(interp, value)?;
    if n < 0 {
        return Err(argument_error("negative array size").into());
    }
    Ok(n as usize)
}

fn unique(values: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(HashKey::from_value(value)))
        .collect()
}

fn unique_by(interp: &mut Interpreter, values: Vec<Value>, block: &Value) -> EvalResult<Vec<Value>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let key = yield1(interp, block, value.clone())?;
        if seen.insert(HashKey::from_value(&key)) {
            out.push(value);
        }
    }
    Ok(out)
}

fn key_set(values: &[Value]) -> HashSet<HashKey> {
    values.iter().map(HashKey::from_value).collect()
}

fn flatten_into(
    out: &mut Vec<Value>,
    values: Vec<Value>,
    depth: Option<usize>,
    open: &mut Vec<usize>,
) -> Result<bool, Diagnostic> {
    let mut flattened = false;
    for value in values {
        let nested = match value.as_array() {
            Some(array) if depth != Some(0) => array.to_vec(),
            _ => {
                out.push(value);
                continue;
            }
        };
        let id = value.object_id();
        if open.contains(&id) {
            return Err(argument_error("tried to flatten recursive array"));
        }
        open.push(id);
        flatten_into(out, nested, depth.map(|d| d - 1), open)?;
        open.pop();
        flattened = true;
    }
    Ok(flattened)
}

fn flatten(interp: &Interpreter, recv: &Value, args: &CallArgs) -> EvalResult<(Vec<Value>, bool)> {
    let depth = match args.positional.first() {
        Some(depth) if !depth.is_nil() => {
            let depth = int_arg(interp, depth)?;
            (depth >= 0).then_some(depth as usize)
        }
        _ => None,
    };
    let mut out = Vec::new();
    let mut open = vec![recv.object_id()];
    let flattened = flatten_into(&mut out, items(recv), depth, &mut open)?;
    Ok((out, flattened))
}

fn join(interp: &mut Interpreter, values: Vec<Value>, separator: &str, open: &mut Vec<usize>) -> EvalResult<String> {
    let mut parts = Vec::with_capacity(values.len());
    for value in values {
        match value.as_array() {
            Some(nested) => {
                let id = value.object_id();
                if open.contains(&id) {
                    return Err(argument_error("recursive array join").into());
                }
                open.push(id);
                parts.push(join(interp, nested.to_vec(), separator, open)?);
                open.pop();
            }
            None => parts.push(interp.to_s(&value)?),
        }
    }
    Ok(parts.join(separator))
}

fn index_error(index: i64, len: usize) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::Index,
        format!("index {index} outside of array bounds: {}...{len}", -(len as i64)),
    )
}

/// `ary[index]`, `ary[start, length]` and `ary[range]`.
fn element_ref(interp: &Interpreter, recv: &Value, args: &CallArgs) -> EvalResult {
    let values = items(recv);
    let first = args.arg(0);
    if args.len() == 1 && !matches!(first.kind(), ValueKind::Range(_)) {
        let index = int_arg(interp, &first)?;
        return Ok(normalize_index(index, values.len()).map_or_else(Value::nil, |i| values[i].clone()));
    }
    Ok(match slice_bounds(interp, args, values.len())? {
        Some((start, end)) => Value::array(values[start..end].to_vec()),
        None => Value::nil(),
    })
}

/// `ary[index] = v`, `ary[start, length] = v` and `ary[range] = v`.
fn element_set(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let mut positional = args.positional;
    let value = positional.pop().unwrap_or_else(Value::nil);
    let length = len(recv);
    let single = positional.len() == 1 && !matches!(positional[0].kind(), ValueKind::Range(_));
    if single {
        let index = int_arg(interp, &positional[0])?;
        let slot = if index < 0 { index + length as i64 } else { index };
        if slot < 0 {
            return Err(index_error(index, length).into());
        }
        let slot = slot as usize;
        mutate(recv, |items| {
            if slot >= items.len() {
                items.resize(slot + 1, Value::nil());
            }
            items[slot] = value.clone();
        })?;
        return Ok(value);
    }
    let bounds_args = CallArgs::new(positional.clone());
    let (start, end) = match slice_bounds(interp, &bounds_args, length)? {
        Some(bounds) => bounds,
        None => {
            let start = int_arg(interp, &positional[0]).unwrap_or(0);
            if start >= 0 {
                (start as usize, start as usize)
            } else {
                return Err(index_error(start, length).into());
            }
        }
    };
    let replacement = match value.as_array() {
        Some(array) => array.to_vec(),
        None => vec![value.clone()],
    };
    mutate(recv, |items| {
        if start > items.len() {
            items.resize(start, Value::nil());
        }
        let end = end.max(start).min(items.len());
        items.splice(start..end, replacement);
    })?;
    Ok(value)
}

fn pop_or_shift(interp: &Interpreter, recv: &Value, args: &CallArgs, front: bool) -> EvalResult {
    let count = match args.positional.first() {
        Some(n) => Some(count_arg(interp, n)?),
        None => None,
    };
    mutate(recv, |items| match count {
        None if front => (!items.is_empty()).then(|| items.remove(0)).unwrap_or_else(Value::nil),
        None => items.pop().unwrap_or_else(Value::nil),
        Some(n) => {
            let n = n.min(items.len());
            let taken = if front {
                items.drain(..n).collect()
            } else {
                items.split_off(items.len() - n)
            };
            Value::array(taken)
        }
    })
}

/// In-place filter shared by `select!`, `keep_if`, `reject!` and `delete_if`.
fn retain(interp: &mut Interpreter, recv: &Value, args: &CallArgs, keep: bool) -> EvalResult<bool> {
    recv.check_frozen("Array")?;
    let block = block_of(args)?;
    let mut kept = Vec::new();
    let values = items(recv);
    let before = values.len();
    for value in values {
        if yield1(interp, &block, value.clone())?.is_truthy() == keep {
            kept.push(value);
        }
    }
    let changed = kept.len() != before;
    mutate(recv, |items| *items = kept)?;
    Ok(changed)
}

fn shuffled(interp: &mut Interpreter, mut values: Vec<Value>) -> Vec<Value> {
    values.shuffle(&mut interp.rng);
    values
}

fn combinations(values: &[Value], k: usize) -> Vec<Vec<Value>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for (i, value) in values.iter().enumerate() {
        for mut rest in combinations(&values[i + 1..], k - 1) {
            rest.insert(0, value.clone());
            out.push(rest);
        }
    }
    out
}

fn permutations(values: &[Value], k: usize) -> Vec<Vec<Value>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for i in 0..values.len() {
        let mut rest = values.to_vec();
        let chosen = rest.remove(i);
        for mut tail in permutations(&rest, k - 1) {
            tail.insert(0, chosen.clone());
            out.push(tail);
        }
    }
    out
}

/// Yields each generated array to the block, or returns them all.
fn generated(interp: &mut Interpreter, recv: &Value, args: &CallArgs, sets: Vec<Vec<Value>>) -> EvalResult {
    let sets: Vec<Value> = sets.into_iter().map(Value::array).collect();
    match &args.block {
        Some(block) => {
            for set in sets {
                yield1(interp, block, set)?;
            }
            Ok(recv.clone())
        }
        None => Ok(Value::array(sets)),
    }
}

fn position(interp: &mut Interpreter, values: &[Value], args: &CallArgs, reverse: bool) -> EvalResult {
    let order: Vec<usize> = if reverse {
        (0..values.len()).rev().collect()
    } else {
        (0..values.len()).collect()
    };
    for i in order {
        let found = match (args.positional.first(), &args.block) {
            (Some(target), _) => interp.values_equal(&values[i], target)?,
            (None, Some(block)) => yield1(interp, block, values[i].clone())?.is_truthy(),
            (None, None) => false,
        };
        if found {
            return Ok(Value::int(i as i64));
        }
    }
    Ok(Value::nil())
}

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("Array")
        .native("each", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let mut index = 0;
            while let Some(item) = recv.as_array().and_then(|a| a.items.borrow().get(index).cloned()) {
                yield1(interp, &block, item)?;
                index += 1;
            }
            Ok(recv.clone())
        })
        .native("each_index", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let mut index = 0;
            while index < len(recv) {
                yield1(interp, &block, Value::int(index as i64))?;
                index += 1;
            }
            Ok(recv.clone())
        })
        .native("length", 0, |_, recv, _| Ok(Value::int(len(recv) as i64)))
        .alias("size", "length")
        .native("empty?", 0, |_, recv, _| Ok(Value::bool(len(recv) == 0)))
        .native("to_a", 0, |_, recv, _| Ok(recv.clone()))
        .alias("to_ary", "to_a")
        .alias("entries", "to_a")
        .native("inspect", 0, |interp, recv, _| Ok(Value::string(interp.inspect(recv)?)))
        .alias("to_s", "inspect")
        .native("hash", 0, |_, recv, _| Ok(Value::int(super::object::hash_of(recv))))
        .native("==", 1, |interp, recv, args| Ok(Value::bool(interp.values_equal(recv, &args.arg(0))?)))
        .native("eql?", 1, |_, recv, args| {
            Ok(Value::bool(HashKey::from_value(recv) == HashKey::from_value(&args.arg(0))))
        })
        .native("<=>", 1, |interp, recv, args| {
            let other = args.arg(0);
            if other.as_array().is_none() {
                return Ok(Value::nil());
            }
            Ok(interp
                .compare(recv, &other)?
                .map_or_else(Value::nil, |ordering| Value::int(ordering as i64)))
        })
        .native("[]", -2, |interp, recv, args| element_ref(interp, recv, &args))
        .alias("slice", "[]")
        .native("[]=", -3, element_set)
        .native("at", 1, |interp, recv, args| element_ref(interp, recv, &args))
        .native("dig", -2, |interp, recv, args| {
            let mut current = recv.clone();
            for key in args.positional {
                if current.is_nil() {
                    break;
                }
                current = interp.send(&current, "[]", CallArgs::new(vec![key]))?;
            }
            Ok(current)
        })
        .native("fetch", -2, |interp, recv, args| {
            let index = int_arg(interp, &args.arg(0))?;
            let values = items(recv);
            if let Some(i) = normalize_index(index, values.len()) {
                return Ok(values[i].clone());
            }
            if let Some(block) = &args.block {
                return yield1(interp, block, args.arg(0));
            }
            match args.positional.get(1) {
                Some(default) => Ok(default.clone()),
                None => Err(index_error(index, values.len()).into()),
            }
        })
        .native("values_at", -1, |interp, recv, args| {
            let values = items(recv);
            let mut out = Vec::new();
            for index in &args.positional {
                let index = int_arg(interp, index)?;
                out.push(normalize_index(index, values.len()).map_or_else(Value::nil, |i| values[i].clone()));
            }
            Ok(Value::array(out))
        })
        .native("first", -1, |interp, recv, args| {
            let values = items(recv);
            match args.positional.first() {
                Some(n) => {
                    let n = count_arg(interp, n)?.min(values.len());
                    Ok(Value::array(values[..n].to_vec()))
                }
                None => Ok(values.first().cloned().unwrap_or_else(Value::nil)),
            }
        })
        .native("last", -1, |interp, recv, args| {
            let values = items(recv);
            match args.positional.first() {
                Some(n) => {
                    let n = count_arg(interp, n)?.min(values.len());
                    Ok(Value::array(values[values.len() - n..].to_vec()))
                }
                None => Ok(values.last().cloned().unwrap_or_else(Value::nil)),
            }
        })
        .native("push", -1, |_, recv, args| {
            mutate(recv, |items| items.extend(args.positional))?;
            Ok(recv.clone())
        })
        .alias("append", "push")
        .native("<<", 1, |_, recv, args| {
            mutate(recv, |items| items.push(args.arg(0)))?;
            Ok(recv.clone())
        })
        .native("pop", -1, |interp, recv, args| pop_or_shift(interp, recv, &args, false))
        .native("shift", -1, |interp, recv, args| pop_or_shift(interp, recv, &args, true))
        .native("unshift", -1, |_, recv, args| {
            mutate(recv, |items| {
                items.splice(0..0, args.positional);
            })?;
            Ok(recv.clone())
        })
        .alias("prepend", "unshift")
        .native("insert", -2, |interp, recv, args| {
            let index = int_arg(interp, &args.arg(0))?;
            let length = len(recv) as i64;
            let at = if index < 0 { index + length + 1 } else { index };
            if at < 0 {
                return Err(index_error(index, length as usize).into());
            }
            let inserted: Vec<Value> = args.positional.into_iter().skip(1).collect();
            mutate(recv, |items| {
                let at = at as usize;
                if at > items.len() {
                    items.resize(at, Value::nil());
                }
                items.splice(at..at, inserted);
            })?;
            Ok(recv.clone())
        })
        .native("concat", -1, |interp, recv, args| {
            let mut added = Vec::new();
            for other in &args.positional {
                added.extend(array_arg(interp, other)?);
            }
            mutate(recv, |items| items.extend(added))?;
            Ok(recv.clone())
        })
        .native("delete", 1, |interp, recv, args| {
            let target = args.arg(0);
            let mut found = None;
            let mut kept = Vec::new();
            for value in items(recv) {
                if interp.values_equal(&value, &target)? {
                    found = Some(value);
                } else {
                    kept.push(value);
                }
            }
            if found.is_some() {
                mutate(recv, |items| *items = kept)?;
            }
            Ok(found.unwrap_or_else(Value::nil))
        })
        .native("delete_at", 1, |interp, recv, args| {
            let index = int_arg(interp, &args.arg(0))?;
            let Some(i) = normalize_index(index, len(recv)) else {
                return Ok(Value::nil());
            };
            mutate(recv, |items| items.remove(i))
        })
        .native("slice!", -2, |interp, recv, args| {
            let taken = element_ref(interp, recv, &args)?;
            if taken.is_nil() {
                return Ok(taken);
            }
            let first = args.arg(0);
            if args.len() == 1 && !matches!(first.kind(), ValueKind::Range(_)) {
                let index = int_arg(interp, &first)?;
                if let Some(i) = normalize_index(index, len(recv)) {
                    mutate(recv, |items| items.remove(i))?;
                }
            } else if let Some((start, end)) = slice_bounds(interp, &args, len(recv))? {
                mutate(recv, |items| {
                    items.drain(start..end);
                })?;
            }
            Ok(taken)
        })
        .native("clear", 0, |_, recv, _| {
            mutate(recv, Vec::clear)?;
            Ok(recv.clone())
        })
        .native("replace", 1, |interp, recv, args| {
            let other = array_arg(interp, &args.arg(0))?;
            replace_items(recv, other, false)
        })
        .native("fill", -1, |interp, recv, args| {
            let length = len(recv);
            match &args.block {
                Some(block) => {
                    for i in 0..length {
                        let value = yield1(interp, block, Value::int(i as i64))?;
                        mutate(recv, |items| items[i] = value)?;
                    }
                }
                None => {
                    let value = args.arg(0);
                    mutate(recv, |items| items.iter_mut().for_each(|slot| *slot = value.clone()))?;
                }
            }
            Ok(recv.clone())
        })
        .native("+", 1, |interp, recv, args| {
            let mut values = items(recv);
            values.extend(array_arg(interp, &args.arg(0))?);
            Ok(Value::array(values))
        })
        .native("-", 1, |interp, recv, args| {
            let removed = key_set(&array_arg(interp, &args.arg(0))?);
            Ok(Value::array(
                items(recv)
                    .into_iter()
                    .filter(|value| !removed.contains(&HashKey::from_value(value)))
                    .collect(),
            ))
        })
        .alias("difference", "-")
        .native("*", 1, |interp, recv, args| {
            let arg = args.arg(0);
            if let Some(separator) = arg.as_string() {
                return Ok(Value::string(join(interp, items(recv), &separator, &mut vec![recv.object_id()])?));
            }
            let times = int_arg(interp, &arg)?;
            if times < 0 {
                return Err(argument_error("negative argument").into());
            }
            let values = items(recv);
            Ok(Value::array(values.iter().cloned().cycle().take(values.len() * times as usize).collect()))
        })
        .native("&", 1, |interp, recv, args| {
            let other = key_set(&array_arg(interp, &args.arg(0))?);
            Ok(Value::array(unique(
                items(recv)
                    .into_iter()
                    .filter(|value| other.contains(&HashKey::from_value(value)))
                    .collect(),
            )))
        })
        .alias("intersection", "&")
        .native("intersect?", 1, |interp, recv, args| {
            let other = key_set(&array_arg(interp, &args.arg(0))?);
            Ok(Value::bool(items(recv).iter().any(|value| other.contains(&HashKey::from_value(value)))))
        })
        .native("|", 1, |interp, recv, args| {
            let mut values = items(recv);
            values.extend(array_arg(interp, &args.arg(0))?);
            Ok(Value::array(unique(values)))
        })
        .native("union", -1, |interp, recv, args| {
            let mut values = items(recv);
            for other in &args.positional {
                values.extend(array_arg(interp, other)?);
            }
            Ok(Value::array(unique(values)))
        })
        .native("include?", 1, |interp, recv, args| {
            let target = args.arg(0);
            for value in items(recv) {
                if interp.values_equal(&value, &target)? {
                    return Ok(Value::bool(true));
                }
            }
            Ok(Value::bool(false))
        })
        .alias("member?", "include?")
        .native("index", -1, |interp, recv, args| position(interp, &items(recv), &args, false))
        .alias("find_index", "index")
        .native("rindex", -1, |interp, recv, args| position(interp, &items(recv), &args, true))
        .native("join", -1, |interp, recv, args| {
            let separator = match args.positional.first() {
                Some(sep) if !sep.is_nil() => str_arg(interp, sep)?,
                _ => String::new(),
            };
            Ok(Value::string(join(interp, items(recv), &separator, &mut vec![recv.object_id()])?))
        })
        .native("reverse", 0, |_, recv, _| {
            let mut values = items(recv);
            values.reverse();
            Ok(Value::array(values))
        })
        .native("reverse!", 0, |_, recv, _| {
            mutate(recv, |items| items.reverse())?;
            Ok(recv.clone())
        })
        .native("rotate", -1, |interp, recv, args| {
            let mut values = items(recv);
            if values.is_empty() {
                return Ok(Value::array(values));
            }
            let count = match args.positional.first() {
                Some(n) => int_arg(interp, n)?,
                None => 1,
            };
            let shift = count.rem_euclid(values.len() as i64) as usize;
            values.rotate_left(shift);
            Ok(Value::array(values))
        })
        .native("sort!", 0, |interp, recv, args| {
            recv.check_frozen("Array")?;
            let updated = sorted(interp, items(recv), args.block.as_ref())?;
            replace_items(recv, updated, false)
        })
        .native("sort_by!", 0, |interp, recv, args| {
            recv.check_frozen("Array")?;
            let block = block_of(&args)?;
            let updated = sorted_by(interp, items(recv), &block)?;
            replace_items(recv, updated, false)
        })
        .native("map!", 0, |interp, recv, args| {
            recv.check_frozen("Array")?;
            let block = block_of(&args)?;
            let mut updated = Vec::new();
            for value in items(recv) {
                updated.push(yield1(interp, &block, value)?);
            }
            replace_items(recv, updated, false)
        })
        .alias("collect!", "map!")
        .native("select!", 0, |interp, recv, args| {
            let changed = retain(interp, recv, &args, true)?;
            Ok(if changed { recv.clone() } else { Value::nil() })
        })
        .alias("filter!", "select!")
        .native("keep_if", 0, |interp, recv, args| {
            retain(interp, recv, &args, true)?;
            Ok(recv.clone())
        })
        .native("reject!", 0, |interp, recv, args| {
            let changed = retain(interp, recv, &args, false)?;
            Ok(if changed { recv.clone() } else { Value::nil() })
        })
        .native("delete_if", 0, |interp, recv, args| {
            retain(interp, recv, &args, false)?;
            Ok(recv.clone())
        })
        .native("compact", 0, |_, recv, _| {
            Ok(Value::array(items(recv).into_iter().filter(|v| !v.is_nil()).collect()))
        })
        .native("compact!", 0, |_, recv, _| {
            let updated = items(recv).into_iter().filter(|v| !v.is_nil()).collect();
            replace_items(recv, updated, true)
        })
        .native("flatten", -1, |interp, recv, args| Ok(Value::array(flatten(interp, recv, &args)?.0)))
        .native("flatten!", -1, |interp, recv, args| {
            let (updated, flattened) = flatten(interp, recv, &args)?;
            replace_items(recv, updated, false)?;
            Ok(if flattened { recv.clone() } else { Value::nil() })
        })
        .native("uniq", 0, |interp, recv, args| {
            Ok(Value::array(match &args.block {
                Some(block) => unique_by(interp, items(recv), block)?,
                None => unique(items(recv)),
            }))
        })
        .native("uniq!", 0, |interp, recv, args| {
            let updated = match &args.block {
                Some(block) => unique_by(interp, items(recv), block)?,
                None => unique(items(recv)),
            };
            replace_items(recv, updated, true)
        })
        .native("transpose", 0, |interp, recv, _| {
            let rows: Vec<Vec<Value>> = items(recv)
                .iter()
                .map(|row| array_arg(interp, row))
                .collect::<Result<_, _>>()?;
            let width = rows.first().map_or(0, Vec::len);
            if let Some(row) = rows.iter().find(|row| row.len() != width) {
                return Err(Diagnostic::new(
                    DiagnosticKind::Index,
                    format!("element size differs ({} should be {width})", row.len()),
                )
                .into());
            }
            Ok(Value::array(
                (0..width)
                    .map(|column| Value::array(rows.iter().map(|row| row[column].clone()).collect()))
                    .collect(),
            ))
        })
        .native("product", -1, |interp, recv, args| {
            let mut results: Vec<Vec<Value>> = items(recv).into_iter().map(|v| vec![v]).collect();
            for other in &args.positional {
                let other = array_arg(interp, other)?;
                results = results
                    .into_iter()
                    .flat_map(|prefix| {
                        other.iter().map(move |value| {
                            let mut row = prefix.clone();
                            row.push(value.clone());
                            row
                        })
                    })
                    .collect();
            }
            Ok(Value::array(results.into_iter().map(Value::array).collect()))
        })
        .native("combination", 1, |interp, recv, args| {
            let k = count_arg(interp, &args.arg(0))?;
            let sets = combinations(&items(recv), k);
            generated(interp, recv, &args, sets)
        })
        .native("permutation", -1, |interp, recv, args| {
            let values = items(recv);
            let k = match args.positional.first() {
                Some(k) => count_arg(interp, k)?,
                None => values.len(),
            };
            let sets = if k > values.len() { Vec::new() } else { permutations(&values, k) };
            generated(interp, recv, &args, sets)
        })
        .native("assoc", 1, |interp, recv, args| {
            let key = args.arg(0);
            for value in items(recv) {
                if let Some(pair) = value.as_array().map(|a| a.to_vec()) {
                    if let Some(first) = pair.first() {
                        if interp.values_equal(first, &key)? {
                            return Ok(value);
                        }
                    }
                }
            }
            Ok(Value::nil())
        })
        .native("sample", 0, |interp, recv, _| {
            Ok(items(recv).choose(&mut interp.rng).cloned().unwrap_or_else(Value::nil))
        })
        .native("shuffle", 0, |interp, recv, _| Ok(Value::array(shuffled(interp, items(recv)))))
        .native("shuffle!", 0, |interp, recv, _| {
            let updated = shuffled(interp, items(recv));
            replace_items(recv, updated, false)
        })
        .native("cycle", -1, |interp, recv, args| {
            let block = block_of(&args)?;
            let rounds = match args.positional.first() {
                Some(n) if !n.is_nil() => Some(int_arg(interp, n)?.max(0) as usize),
                _ => None,
            };
            let mut round = 0;
            while rounds.map_or(true, |limit| round < limit) && len(recv) > 0 {
                for value in items(recv) {
                    yield1(interp, &block, value)?;
                }
                round += 1;
            }
            Ok(Value::nil())
        })
        .native("bsearch", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let values = items(recv);
            let (mut low, mut high) = (0, values.len());
            let mut find_any = false;
            while low < high {
                let mid = (low + high) / 2;
                let verdict = yield1(interp, &block, values[mid].clone())?;
                let go_left = match verdict.kind() {
                    ValueKind::Int(0) => return Ok(values[mid].clone()),
                    ValueKind::Int(n) => {
                        find_any = true;
                        *n < 0
                    }
                    _ => verdict.is_truthy(),
                };
                if go_left {
                    high = mid;
                } else {
                    low = mid + 1;
                }
            }
            if find_any {
                return Ok(Value::nil());
            }
            Ok(values.get(low).cloned().unwrap_or_else(Value::nil))
        });

    registry
        .singleton_table("Array")
        .native("new", -1, |interp, _, args| {
            let size = match args.positional.first() {
                None => return Ok(Value::array(Vec::new())),
                Some(first) if first.as_array().is_some() => return Ok(Value::array(to_ary(first))),
                Some(first) => count_arg(interp, first)?,
            };
            let mut values = Vec::with_capacity(size);
            for i in 0..size {
                values.push(match &args.block {
                    Some(block) => yield1(interp, block, Value::int(i as i64))?,
                    None => args.arg(1),
                });
            }
            Ok(Value::array(values))
        })
        .native("[]", -1, |_, _, args| Ok(Value::array(args.positional)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|&n| Value::int(n)).collect()
    }

    fn as_ints(values: &[Value]) -> Vec<i64> {
        values.iter().filter_map(Value::as_int).collect()
    }

    #[test]
    fn unique_keeps_first_occurrence() {
        let values = unique(ints(&[3, 1, 3, 2, 1]));
        assert_eq!(as_ints(&values), vec![3, 1, 2]);
    }

    #[test]
    fn combinations_preserve_order() {
        let sets = combinations(&ints(&[1, 2, 3]), 2);
        let flat: Vec<Vec<i64>> = sets.iter().map(|set| as_ints(set)).collect();
        assert_eq!(flat, vec![vec![1, 2], vec![1, 3], vec![2, 3]]);
    }

    #[test]
    fn permutations_count_factorially() {
        assert_eq!(permutations(&ints(&[1, 2, 3]), 3).len(), 6);
        assert_eq!(permutations(&ints(&[1, 2, 3]), 2).len(), 6);
    }

    #[test]
    fn flatten_respects_depth() {
        let nested = Value::array(vec![Value::int(1), Value::array(vec![Value::array(ints(&[2]))])]);
        let mut out = Vec::new();
        flatten_into(&mut out, items(&nested), Some(1), &mut Vec::new()).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[1].as_array().is_some());
    }
}
