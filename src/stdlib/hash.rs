//! `Hash`. Insertion ordered; keys compare structurally through [`HashKey`].

use indexmap::IndexMap;

use crate::{
    diagnostics::{type_error, Diagnostic, DiagnosticKind},
    runtime::{to_ary, CallArgs, EvalResult, Interpreter},
    value::{HashKey, HashValue, Value},
};

use super::{block_of, yield1, yield_many, StdlibRegistry};

fn pairs(value: &Value) -> Vec<(Value, Value)> {
    value.as_hash().map(HashValue::pairs).unwrap_or_default()
}

fn pair(key: Value, value: Value) -> Value {
    Value::array(vec![key, value])
}

fn hash_arg<'a>(interp: &Interpreter, value: &'a Value) -> Result<&'a HashValue, Diagnostic> {
    value.as_hash().ok_or_else(|| {
        type_error(format!("no implicit conversion of {} into Hash", interp.class_name_of(value)))
    })
}

fn target(recv: &Value) -> EvalResult<&HashValue> {
    recv.check_frozen("Hash")?;
    recv.as_hash().ok_or_else(|| type_error("not a Hash").into())
}

fn key_error(interp: &mut Interpreter, key: &Value) -> EvalResult {
    let shown = interp.inspect(key)?;
    Err(Diagnostic::new(DiagnosticKind::Key, format!("key not found: {shown}")).into())
}

/// Value for a missing key: the default proc's result, else the default.
pub(crate) fn default_value(interp: &mut Interpreter, hash: &Value, key: Value) -> EvalResult {
    let Some(table) = hash.as_hash() else {
        return Ok(Value::nil());
    };
    let default_proc = table.default_proc.borrow().clone();
    match default_proc {
        Some(block) => yield_many(interp, &block, vec![hash.clone(), key]),
        None => Ok(table.default.borrow().clone()),
    }
}

/// Pairs the block accepts; a block taking `|k, v|` sees both values.
fn chosen(interp: &mut Interpreter, recv: &Value, args: &CallArgs, keep: bool) -> EvalResult<Vec<(Value, Value)>> {
    let block = block_of(args)?;
    let mut out = Vec::new();
    for (key, value) in pairs(recv) {
        let verdict = yield_many(interp, &block, vec![key.clone(), value.clone()])?;
        if verdict.is_truthy() == keep {
            out.push((key, value));
        }
    }
    Ok(out)
}

fn replace_entries(recv: &Value, updated: Vec<(Value, Value)>) -> EvalResult<bool> {
    let hash = target(recv)?;
    let changed = hash.len() != updated.len();
    *hash.entries.borrow_mut() = updated
        .into_iter()
        .map(|(key, value)| (HashKey::from_value(&key), (key, value)))
        .collect();
    Ok(changed)
}

fn merged(
    interp: &mut Interpreter,
    mut base: Vec<(Value, Value)>,
    args: &CallArgs,
) -> EvalResult<Vec<(Value, Value)>> {
    let mut index: IndexMap<HashKey, usize> = base
        .iter()
        .enumerate()
        .map(|(i, (key, _))| (HashKey::from_value(key), i))
        .collect();
    for other in &args.positional {
        for (key, value) in hash_arg(interp, other)?.pairs() {
            let hash_key = HashKey::from_value(&key);
            match index.get(&hash_key) {
                Some(&slot) => {
                    let value = match &args.block {
                        Some(block) => {
                            let current = base[slot].1.clone();
                            yield_many(interp, block, vec![key.clone(), current, value])?
                        }
                        None => value,
                    };
                    base[slot].1 = value;
                }
                None => {
                    index.insert(hash_key, base.len());
                    base.push((key, value));
                }
            }
        }
    }
    Ok(base)
}

fn transform(interp: &mut Interpreter, recv: &Value, args: &CallArgs, keys: bool) -> EvalResult<Vec<(Value, Value)>> {
    let mapping = args.positional.first().and_then(Value::as_hash);
    let mut out = Vec::new();
    for (key, value) in pairs(recv) {
        let subject = if keys { key.clone() } else { value.clone() };
        let mapped = match (mapping.and_then(|m| m.get(&subject)), &args.block) {
            (Some(mapped), _) => mapped,
            (None, Some(block)) => yield1(interp, block, subject)?,
            (None, None) => subject,
        };
        out.push(if keys { (mapped, value) } else { (key, mapped) });
    }
    Ok(out)
}

fn from_pairs(pairs: Vec<(Value, Value)>) -> Value {
    Value::hash_from_pairs(pairs)
}

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("Hash")
        .native("[]", 1, |interp, recv, args| {
            let key = args.arg(0);
            match recv.as_hash().and_then(|hash| hash.get(&key)) {
                Some(value) => Ok(value),
                None => default_value(interp, recv, key),
            }
        })
        .native("[]=", 2, |_, recv, args| {
            let (key, value) = (args.arg(0), args.arg(1));
            let key = match key.as_string() {
                Some(text) if !key.is_frozen() => {
                    let copy = Value::string(text);
                    copy.freeze();
                    copy
                }
                _ => key,
            };
            target(recv)?.insert(key, value.clone());
            Ok(value)
        })
        .alias("store", "[]=")
        .native("fetch", -2, |interp, recv, args| {
            let key = args.arg(0);
            if let Some(value) = recv.as_hash().and_then(|hash| hash.get(&key)) {
                return Ok(value);
            }
            if let Some(block) = &args.block {
                return yield1(interp, block, key);
            }
            match args.positional.get(1) {
                Some(default) => Ok(default.clone()),
                None => key_error(interp, &key),
            }
        })
        .native("fetch_values", -1, |interp, recv, args| {
            let mut out = Vec::new();
            for key in args.positional {
                match recv.as_hash().and_then(|hash| hash.get(&key)) {
                    Some(value) => out.push(value),
                    None => return key_error(interp, &key),
                }
            }
            Ok(Value::array(out))
        })
        .native("values_at", -1, |interp, recv, args| {
            let mut out = Vec::new();
            for key in args.positional {
                match recv.as_hash().and_then(|hash| hash.get(&key)) {
                    Some(value) => out.push(value),
                    None => out.push(default_value(interp, recv, key)?),
                }
            }
            Ok(Value::array(out))
        })
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
        .native("key?", 1, |_, recv, args| {
            Ok(Value::bool(recv.as_hash().is_some_and(|hash| hash.get(&args.arg(0)).is_some())))
        })
        .alias("has_key?", "key?")
        .alias("include?", "key?")
        .alias("member?", "key?")
        .native("value?", 1, |interp, recv, args| {
            let target = args.arg(0);
            for (_, value) in pairs(recv) {
                if interp.values_equal(&value, &target)? {
                    return Ok(Value::bool(true));
                }
            }
            Ok(Value::bool(false))
        })
        .alias("has_value?", "value?")
        .native("key", 1, |interp, recv, args| {
            let target = args.arg(0);
            for (key, value) in pairs(recv) {
                if interp.values_equal(&value, &target)? {
                    return Ok(key);
                }
            }
            Ok(Value::nil())
        })
        .native("keys", 0, |_, recv, _| Ok(Value::array(pairs(recv).into_iter().map(|(k, _)| k).collect())))
        .native("values", 0, |_, recv, _| {
            Ok(Value::array(pairs(recv).into_iter().map(|(_, v)| v).collect()))
        })
        .native("length", 0, |_, recv, _| Ok(Value::int(pairs(recv).len() as i64)))
        .alias("size", "length")
        .native("empty?", 0, |_, recv, _| Ok(Value::bool(pairs(recv).is_empty())))
        .native("to_h", 0, |interp, recv, args| {
            let Some(block) = &args.block else {
                return Ok(recv.clone());
            };
            let mut out = Vec::new();
            for (key, value) in pairs(recv) {
                let mapped = to_ary(&yield_many(interp, block, vec![key, value])?);
                if mapped.len() != 2 {
                    return Err(type_error("wrong element type (expected array of 2 elements)").into());
                }
                out.push((mapped[0].clone(), mapped[1].clone()));
            }
            Ok(from_pairs(out))
        })
        .alias("to_hash", "to_h")
        .native("to_a", 0, |_, recv, _| {
            Ok(Value::array(pairs(recv).into_iter().map(|(k, v)| pair(k, v)).collect()))
        })
        .native("inspect", 0, |interp, recv, _| Ok(Value::string(interp.inspect(recv)?)))
        .alias("to_s", "inspect")
        .native("==", 1, |interp, recv, args| Ok(Value::bool(interp.values_equal(recv, &args.arg(0))?)))
        .native("hash", 0, |_, recv, _| Ok(Value::int(super::object::hash_of(recv))))
        .native("each", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            for (key, value) in pairs(recv) {
                yield1(interp, &block, pair(key, value))?;
            }
            Ok(recv.clone())
        })
        .alias("each_pair", "each")
        .native("each_key", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            for (key, _) in pairs(recv) {
                yield1(interp, &block, key)?;
            }
            Ok(recv.clone())
        })
        .native("each_value", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            for (_, value) in pairs(recv) {
                yield1(interp, &block, value)?;
            }
            Ok(recv.clone())
        })
        .native("select", 0, |interp, recv, args| Ok(from_pairs(chosen(interp, recv, &args, true)?)))
        .alias("filter", "select")
        .native("reject", 0, |interp, recv, args| Ok(from_pairs(chosen(interp, recv, &args, false)?)))
        .native("select!", 0, |interp, recv, args| {
            let kept = chosen(interp, recv, &args, true)?;
            Ok(if replace_entries(recv, kept)? { recv.clone() } else { Value::nil() })
        })
        .alias("filter!", "select!")
        .native("keep_if", 0, |interp, recv, args| {
            let kept = chosen(interp, recv, &args, true)?;
            replace_entries(recv, kept)?;
            Ok(recv.clone())
        })
        .native("reject!", 0, |interp, recv, args| {
            let kept = chosen(interp, recv, &args, false)?;
            Ok(if replace_entries(recv, kept)? { recv.clone() } else { Value::nil() })
        })
        .native("delete_if", 0, |interp, recv, args| {
            let kept = chosen(interp, recv, &args, false)?;
            replace_entries(recv, kept)?;
            Ok(recv.clone())
        })
        .native("delete", 1, |interp, recv, args| {
            let key = args.arg(0);
            match target(recv)?.remove(&key) {
                Some(value) => Ok(value),
                None => match &args.block {
                    Some(block) => yield1(interp, block, key),
                    None => Ok(Value::nil()),
                },
            }
        })
        .native("clear", 0, |_, recv, _| {
            target(recv)?.entries.borrow_mut().clear();
            Ok(recv.clone())
        })
        .native("replace", 1, |interp, recv, args| {
            let other = hash_arg(interp, &args.arg(0))?.pairs();
            replace_entries(recv, other)?;
            Ok(recv.clone())
        })
        .native("merge", -1, |interp, recv, args| Ok(from_pairs(merged(interp, pairs(recv), &args)?)))
        .native("merge!", -1, |interp, recv, args| {
            target(recv)?;
            let updated = merged(interp, pairs(recv), &args)?;
            replace_entries(recv, updated)?;
            Ok(recv.clone())
        })
        .alias("update", "merge!")
        .native("transform_values", -1, |interp, recv, args| {
            Ok(from_pairs(transform(interp, recv, &args, false)?))
        })
        .native("transform_keys", -1, |interp, recv, args| {
            Ok(from_pairs(transform(interp, recv, &args, true)?))
        })
        .native("transform_values!", -1, |interp, recv, args| {
            target(recv)?;
            let updated = transform(interp, recv, &args, false)?;
            replace_entries(recv, updated)?;
            Ok(recv.clone())
        })
        .native("transform_keys!", -1, |interp, recv, args| {
            target(recv)?;
            let updated = transform(interp, recv, &args, true)?;
            replace_entries(recv, updated)?;
            Ok(recv.clone())
        })
        .native("invert", 0, |_, recv, _| {
            Ok(from_pairs(pairs(recv).into_iter().map(|(k, v)| (v, k)).collect()))
        })
        .native("compact", 0, |_, recv, _| {
            Ok(from_pairs(pairs(recv).into_iter().filter(|(_, v)| !v.is_nil()).collect()))
        })
        .native("slice", -1, |_, recv, args| {
            let Some(hash) = recv.as_hash() else {
                return Ok(Value::nil());
            };
            let picked = args
                .positional
                .into_iter()
                .filter_map(|key| hash.get(&key).map(|value| (key, value)))
                .collect();
            Ok(from_pairs(picked))
        })
        .native("except", -1, |_, recv, args| {
            let excluded: Vec<HashKey> = args.positional.iter().map(HashKey::from_value).collect();
            Ok(from_pairs(
                pairs(recv)
                    .into_iter()
                    .filter(|(key, _)| !excluded.contains(&HashKey::from_value(key)))
                    .collect(),
            ))
        })
        .native("min_by", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let mut best: Option<(Value, Value)> = None;
            for (key, value) in pairs(recv) {
                let score = yield_many(interp, &block, vec![key.clone(), value.clone()])?;
                let better = match &best {
                    Some((current, _)) => interp.compare_strict(&score, current)?.is_lt(),
                    None => true,
                };
                if better {
                    best = Some((score, pair(key, value)));
                }
            }
            Ok(best.map_or_else(Value::nil, |(_, item)| item))
        })
        .native("max_by", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let mut best: Option<(Value, Value)> = None;
            for (key, value) in pairs(recv) {
                let score = yield_many(interp, &block, vec![key.clone(), value.clone()])?;
                let better = match &best {
                    Some((current, _)) => interp.compare_strict(&score, current)?.is_gt(),
                    None => true,
                };
                if better {
                    best = Some((score, pair(key, value)));
                }
            }
            Ok(best.map_or_else(Value::nil, |(_, item)| item))
        })
        .native("sum", -1, |interp, recv, args| {
            let mut total = args.positional.first().cloned().unwrap_or_else(|| Value::int(0));
            for (key, value) in pairs(recv) {
                let item = match &args.block {
                    Some(block) => yield_many(interp, block, vec![key, value])?,
                    None => pair(key, value),
                };
                total = interp.binary(crate::ast::BinaryOp::Add, total, item)?;
            }
            Ok(total)
        })
        .native("default", -1, |interp, recv, args| match args.positional.first() {
            Some(key) => default_value(interp, recv, key.clone()),
            None => Ok(recv.as_hash().map_or_else(Value::nil, |hash| hash.default.borrow().clone())),
        })
        .native("default=", 1, |_, recv, args| {
            let hash = target(recv)?;
            *hash.default.borrow_mut() = args.arg(0);
            *hash.default_proc.borrow_mut() = None;
            Ok(args.arg(0))
        })
        .native("default_proc", 0, |_, recv, _| {
            Ok(recv
                .as_hash()
                .and_then(|hash| hash.default_proc.borrow().clone())
                .unwrap_or_else(Value::nil))
        });

    registry
        .singleton_table("Hash")
        .native("new", -1, |_, _, args| {
            let hash = Value::hash(IndexMap::new());
            if let Some(table) = hash.as_hash() {
                if let Some(default) = args.positional.first() {
                    *table.default.borrow_mut() = default.clone();
                }
                *table.default_proc.borrow_mut() = args.block;
            }
            Ok(hash)
        })
        .native("[]", -1, |interp, _, args| {
            let args = args.folded();
            match args.positional.as_slice() {
                [single] if single.as_hash().is_some() => Ok(from_pairs(pairs(single))),
                [single] if single.as_array().is_some() => {
                    let mut out = Vec::new();
                    for item in to_ary(single) {
                        let entry = to_ary(&item);
                        if entry.is_empty() || entry.len() > 2 {
                            return Err(type_error(format!(
                                "wrong element type {} (expected array)",
                                interp.class_name_of(&item)
                            ))
                            .into());
                        }
                        out.push((entry[0].clone(), entry.get(1).cloned().unwrap_or_else(Value::nil)));
                    }
                    Ok(from_pairs(out))
                }
                items if items.len() % 2 == 0 => Ok(from_pairs(
                    items.chunks(2).map(|chunk| (chunk[0].clone(), chunk[1].clone())).collect(),
                )),
                _ => Err(Diagnostic::new(
                    DiagnosticKind::Argument,
                    "odd number of arguments for Hash",
                )
                .into()),
            }
        });
}
