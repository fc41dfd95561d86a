//! `Enumerable`, over anything [`Interpreter::iteration_items`] can walk.
//!
//! Methods are eager: the receiver's items are collected first, then the
//! block runs over them. Script classes take part by defining `each` and
//! including `Enumerable`.

use std::{cell::RefCell, cmp::Ordering, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::BinaryOp,
    diagnostics::{argument_error, type_error},
    runtime::{to_ary, CallArgs, EvalResult, Interpreter},
    value::{HashKey, NativeFunction, Proc, ProcBody, Value},
};

use super::{block_of, int_arg, yield1, yield_many, StdlibRegistry};

impl Interpreter {
    /// Collects the values `value.each` yields.
    pub(crate) fn enumerate(&mut self, value: &Value) -> EvalResult<Vec<Value>> {
        if !self.responds_to(value, "each") {
            return Err(type_error(format!("can't iterate {}", self.class_name_of(value))).into());
        }
        let sink: Rc<RefCell<Vec<Value>>> = Rc::default();
        let collector = {
            let sink = sink.clone();
            NativeFunction::new("each", -1, move |_, _, args| {
                let mut positional = args.folded().positional;
                let item = if positional.len() == 1 {
                    positional.remove(0)
                } else {
                    Value::array(positional)
                };
                sink.borrow_mut().push(item);
                Ok(Value::nil())
            })
        };
        let block = Value::proc(Proc {
            id: self.next_proc_id(),
            body: ProcBody::Native(collector),
            is_lambda: false,
        });
        self.send(value, "each", CallArgs::default().with_block(Some(block)))?;
        Ok(sink.take())
    }
}

/// Sorts with a fallible comparator; the first error aborts the sort.
pub(crate) fn sort_values(
    interp: &mut Interpreter,
    items: &mut [Value],
    mut compare: impl FnMut(&mut Interpreter, &Value, &Value) -> EvalResult<Ordering>,
) -> EvalResult<()> {
    let mut failure = None;
    items.sort_by(|a, b| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        compare(interp, a, b).unwrap_or_else(|err| {
            failure = Some(err);
            Ordering::Equal
        })
    });
    failure.map_or(Ok(()), Err)
}

/// Orders two values by the integer a sort block returned.
pub(crate) fn block_ordering(
    interp: &mut Interpreter,
    block: &Value,
    a: &Value,
    b: &Value,
) -> EvalResult<Ordering> {
    let result = yield_many(interp, block, vec![a.clone(), b.clone()])?;
    match result.as_int() {
        Some(n) => Ok(n.cmp(&0)),
        None => Err(interp.comparison_failed(a, b).into()),
    }
}

/// Items ordered by `<=>`, or by the block when one is given.
pub(crate) fn sorted(interp: &mut Interpreter, mut items: Vec<Value>, block: Option<&Value>) -> EvalResult<Vec<Value>> {
    match block {
        Some(block) => sort_values(interp, &mut items, |interp, a, b| {
            block_ordering(interp, block, a, b)
        })?,
        None => sort_values(interp, &mut items, |interp, a, b| interp.compare_strict(a, b))?,
    }
    Ok(items)
}

/// Items ordered by the key the block maps them to.
pub(crate) fn sorted_by(interp: &mut Interpreter, items: Vec<Value>, block: &Value) -> EvalResult<Vec<Value>> {
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let key = yield1(interp, block, item.clone())?;
        keyed.push(Value::array(vec![key, item]));
    }
    sort_values(interp, &mut keyed, |interp, a, b| {
        interp.compare_strict(&to_ary(a)[0], &to_ary(b)[0])
    })?;
    Ok(keyed.into_iter().map(|pair| to_ary(&pair)[1].clone()).collect())
}

/// Pattern test shared by `any?`, `all?`, `none?`, `one?` and `count`.
fn predicate(interp: &mut Interpreter, args: &CallArgs, item: &Value) -> EvalResult<bool> {
    if let Some(pattern) = args.positional.first() {
        return interp.case_eq(pattern, item);
    }
    match &args.block {
        Some(block) => Ok(yield1(interp, block, item.clone())?.is_truthy()),
        None => Ok(item.is_truthy()),
    }
}

fn items(interp: &mut Interpreter, recv: &Value) -> EvalResult<Vec<Value>> {
    interp.iteration_items(recv)
}

fn count_arg(interp: &Interpreter, value: &Value) -> EvalResult<usize> {
    let n = int_arg(interp, value)?;
    if n < 0 {
        return Err(argument_error("attempt to take negative size").into());
    }
    Ok(n as usize)
}

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("Enumerable")
        .native("to_a", -1, |interp, recv, _| Ok(Value::array(items(interp, recv)?)))
        .alias("entries", "to_a")
        .native("map", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let mut out = Vec::new();
            for item in items(interp, recv)? {
                out.push(yield1(interp, &block, item)?);
            }
            Ok(Value::array(out))
        })
        .alias("collect", "map")
        .native("flat_map", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let mut out = Vec::new();
            for item in items(interp, recv)? {
                let mapped = yield1(interp, &block, item)?;
                match mapped.as_array() {
                    Some(array) => out.extend(array.to_vec()),
                    None => out.push(mapped),
                }
            }
            Ok(Value::array(out))
        })
        .alias("collect_concat", "flat_map")
        .native("select", 0, |interp, recv, args| filter(interp, recv, args, true))
        .alias("filter", "select")
        .alias("find_all", "select")
        .native("reject", 0, |interp, recv, args| filter(interp, recv, args, false))
        .native("filter_map", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let mut out = Vec::new();
            for item in items(interp, recv)? {
                let mapped = yield1(interp, &block, item)?;
                if mapped.is_truthy() {
                    out.push(mapped);
                }
            }
            Ok(Value::array(out))
        })
        .native("find", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            for item in items(interp, recv)? {
                if yield1(interp, &block, item.clone())?.is_truthy() {
                    return Ok(item);
                }
            }
            Ok(Value::nil())
        })
        .alias("detect", "find")
        .native("find_index", -1, |interp, recv, args| {
            for (index, item) in items(interp, recv)?.into_iter().enumerate() {
                let found = match args.positional.first() {
                    Some(wanted) => interp.values_equal(&item, wanted)?,
                    None => yield1(interp, &block_of(&args)?, item)?.is_truthy(),
                };
                if found {
                    return Ok(Value::int(index as i64));
                }
            }
            Ok(Value::nil())
        })
        .native("each_with_index", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            for (index, item) in items(interp, recv)?.into_iter().enumerate() {
                yield_many(interp, &block, vec![item, Value::int(index as i64)])?;
            }
            Ok(recv.clone())
        })
        .native("each_with_object", 1, |interp, recv, args| {
            let block = block_of(&args)?;
            let memo = args.arg(0);
            for item in items(interp, recv)? {
                yield_many(interp, &block, vec![item, memo.clone()])?;
            }
            Ok(memo)
        })
        .native("inject", -1, inject)
        .alias("reduce", "inject")
        .native("sum", -1, |interp, recv, args| {
            let mut total = args.positional.first().cloned().unwrap_or_else(|| Value::int(0));
            for item in items(interp, recv)? {
                let item = match &args.block {
                    Some(block) => yield1(interp, block, item)?,
                    None => item,
                };
                total = interp.binary(BinaryOp::Add, total, item)?;
            }
            Ok(total)
        })
        .native("count", -1, |interp, recv, args| {
            let all = items(interp, recv)?;
            if args.is_empty() && args.block.is_none() {
                return Ok(Value::int(all.len() as i64));
            }
            let mut count = 0;
            for item in &all {
                let matched = match args.positional.first() {
                    Some(wanted) => interp.values_equal(item, wanted)?,
                    None => predicate(interp, &args, item)?,
                };
                if matched {
                    count += 1;
                }
            }
            Ok(Value::int(count))
        })
        .native("min", -1, |interp, recv, args| extreme(interp, recv, args, Ordering::Less))
        .native("max", -1, |interp, recv, args| extreme(interp, recv, args, Ordering::Greater))
        .native("min_by", 0, |interp, recv, args| extreme_by(interp, recv, args, Ordering::Less))
        .native("max_by", 0, |interp, recv, args| extreme_by(interp, recv, args, Ordering::Greater))
        .native("minmax", 0, |interp, recv, args| {
            let all = items(interp, recv)?;
            let all = sorted(interp, all, args.block.as_ref())?;
            let min = all.first().cloned().unwrap_or_else(Value::nil);
            let max = all.last().cloned().unwrap_or_else(Value::nil);
            Ok(Value::array(vec![min, max]))
        })
        .native("sort", 0, |interp, recv, args| {
            let all = items(interp, recv)?;
            Ok(Value::array(sorted(interp, all, args.block.as_ref())?))
        })
        .native("sort_by", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let all = items(interp, recv)?;
            Ok(Value::array(sorted_by(interp, all, &block)?))
        })
        .native("group_by", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let mut groups: IndexMap<HashKey, (Value, Vec<Value>)> = IndexMap::new();
            for item in items(interp, recv)? {
                let key = yield1(interp, &block, item.clone())?;
                groups
                    .entry(HashKey::from_value(&key))
                    .or_insert_with(|| (key, Vec::new()))
                    .1
                    .push(item);
            }
            Ok(Value::hash_from_pairs(
                groups
                    .into_values()
                    .map(|(key, members)| (key, Value::array(members)))
                    .collect(),
            ))
        })
        .native("partition", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let (mut yes, mut no) = (Vec::new(), Vec::new());
            for item in items(interp, recv)? {
                if yield1(interp, &block, item.clone())?.is_truthy() {
                    yes.push(item);
                } else {
                    no.push(item);
                }
            }
            Ok(Value::array(vec![Value::array(yes), Value::array(no)]))
        })
        .native("tally", 0, |interp, recv, _| {
            let mut counts: IndexMap<HashKey, (Value, i64)> = IndexMap::new();
            for item in items(interp, recv)? {
                counts
                    .entry(HashKey::from_value(&item))
                    .or_insert_with(|| (item, 0))
                    .1 += 1;
            }
            Ok(Value::hash_from_pairs(
                counts
                    .into_values()
                    .map(|(item, count)| (item, Value::int(count)))
                    .collect(),
            ))
        })
        .native("include?", 1, |interp, recv, args| {
            let wanted = args.arg(0);
            for item in items(interp, recv)? {
                if interp.values_equal(&item, &wanted)? {
                    return Ok(Value::bool(true));
                }
            }
            Ok(Value::bool(false))
        })
        .alias("member?", "include?")
        .native("first", -1, |interp, recv, args| {
            let all = items(interp, recv)?;
            match args.positional.first() {
                Some(n) => {
                    let n = count_arg(interp, n)?;
                    Ok(Value::array(all.into_iter().take(n).collect()))
                }
                None => Ok(all.into_iter().next().unwrap_or_else(Value::nil)),
            }
        })
        .native("take", 1, |interp, recv, args| {
            let n = count_arg(interp, &args.arg(0))?;
            Ok(Value::array(items(interp, recv)?.into_iter().take(n).collect()))
        })
        .native("drop", 1, |interp, recv, args| {
            let n = count_arg(interp, &args.arg(0))?;
            Ok(Value::array(items(interp, recv)?.into_iter().skip(n).collect()))
        })
        .native("take_while", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let mut out = Vec::new();
            for item in items(interp, recv)? {
                if !yield1(interp, &block, item.clone())?.is_truthy() {
                    break;
                }
                out.push(item);
            }
            Ok(Value::array(out))
        })
        .native("drop_while", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            let mut out = Vec::new();
            let mut dropping = true;
            for item in items(interp, recv)? {
                if dropping && yield1(interp, &block, item.clone())?.is_truthy() {
                    continue;
                }
                dropping = false;
                out.push(item);
            }
            Ok(Value::array(out))
        })
        .native("each_slice", 1, |interp, recv, args| {
            let size = window_size(interp, &args.arg(0))?;
            let groups: Vec<Value> = items(interp, recv)?
                .chunks(size)
                .map(|chunk| Value::array(chunk.to_vec()))
                .collect();
            each_group(interp, recv, &args, groups)
        })
        .native("each_cons", 1, |interp, recv, args| {
            let size = window_size(interp, &args.arg(0))?;
            let groups: Vec<Value> = items(interp, recv)?
                .windows(size)
                .map(|window| Value::array(window.to_vec()))
                .collect();
            each_group(interp, recv, &args, groups)
        })
        .native("zip", -1, |interp, recv, args| {
            let mut others = Vec::new();
            for other in &args.positional {
                others.push(interp.iteration_items(other)?);
            }
            let rows: Vec<Value> = items(interp, recv)?
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    let mut row = vec![item];
                    for other in &others {
                        row.push(other.get(index).cloned().unwrap_or_else(Value::nil));
                    }
                    Value::array(row)
                })
                .collect();
            Ok(Value::array(rows))
        })
        .native("uniq", 0, |interp, recv, args| {
            let mut seen: IndexMap<HashKey, Value> = IndexMap::new();
            for item in items(interp, recv)? {
                let key = match &args.block {
                    Some(block) => yield1(interp, block, item.clone())?,
                    None => item.clone(),
                };
                seen.entry(HashKey::from_value(&key)).or_insert(item);
            }
            Ok(Value::array(seen.into_values().collect()))
        })
        .native("any?", -1, |interp, recv, args| {
            for item in items(interp, recv)? {
                if predicate(interp, &args, &item)? {
                    return Ok(Value::bool(true));
                }
            }
            Ok(Value::bool(false))
        })
        .native("all?", -1, |interp, recv, args| {
            for item in items(interp, recv)? {
                if !predicate(interp, &args, &item)? {
                    return Ok(Value::bool(false));
                }
            }
            Ok(Value::bool(true))
        })
        .native("none?", -1, |interp, recv, args| {
            for item in items(interp, recv)? {
                if predicate(interp, &args, &item)? {
                    return Ok(Value::bool(false));
                }
            }
            Ok(Value::bool(true))
        })
        .native("one?", -1, |interp, recv, args| {
            let mut hits = 0;
            for item in items(interp, recv)? {
                if predicate(interp, &args, &item)? {
                    hits += 1;
                }
            }
            Ok(Value::bool(hits == 1))
        })
        .native("to_h", 0, |interp, recv, args| {
            let mut pairs = Vec::new();
            for item in items(interp, recv)? {
                let pair = match &args.block {
                    Some(block) => yield1(interp, block, item)?,
                    None => item,
                };
                let parts = pair.as_array().map(|array| array.to_vec()).unwrap_or_default();
                if parts.len() != 2 {
                    return Err(type_error(format!(
                        "wrong element type {} (expected array)",
                        interp.class_name_of(&pair)
                    ))
                    .into());
                }
                pairs.push((parts[0].clone(), parts[1].clone()));
            }
            Ok(Value::hash_from_pairs(pairs))
        })
        .native("reverse_each", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            for item in items(interp, recv)?.into_iter().rev() {
                yield1(interp, &block, item)?;
            }
            Ok(recv.clone())
        })
        .native("each_entry", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            for item in items(interp, recv)? {
                yield1(interp, &block, item)?;
            }
            Ok(recv.clone())
        });
}

fn filter(interp: &mut Interpreter, recv: &Value, args: CallArgs, keep: bool) -> EvalResult {
    let block = block_of(&args)?;
    let mut out = Vec::new();
    for item in items(interp, recv)? {
        if yield1(interp, &block, item.clone())?.is_truthy() == keep {
            out.push(item);
        }
    }
    Ok(Value::array(out))
}

/// `inject(init, :sym)`, `inject(:sym)`, `inject(init) { }` and `inject { }`.
fn inject(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let mut all = items(interp, recv)?.into_iter();
    let (initial, operator) = match (args.positional.as_slice(), &args.block) {
        ([init, op], _) => (Some(init.clone()), Some(op.clone())),
        ([op], None) => (None, Some(op.clone())),
        ([init], Some(_)) => (Some(init.clone()), None),
        ([], Some(_)) => (None, None),
        ([], None) => return Err(super::no_block().into()),
        _ => return Err(crate::diagnostics::arity_error(args.len(), "0..2").into()),
    };
    let mut acc = match initial {
        Some(init) => init,
        None => match all.next() {
            Some(first) => first,
            None => return Ok(Value::nil()),
        },
    };
    for item in all {
        acc = match &operator {
            Some(op) => {
                let name = super::name_arg(op)?;
                interp.send(&acc, &name, CallArgs::new(vec![item]))?
            }
            None => yield_many(interp, &block_of(&args)?, vec![acc, item])?,
        };
    }
    Ok(acc)
}

/// `min`/`max` with an optional count and comparison block.
fn extreme(interp: &mut Interpreter, recv: &Value, args: CallArgs, wanted: Ordering) -> EvalResult {
    let all = items(interp, recv)?;
    let mut all = sorted(interp, all, args.block.as_ref())?;
    if wanted == Ordering::Greater {
        all.reverse();
    }
    match args.positional.first() {
        Some(n) => {
            let n = count_arg(interp, n)?;
            Ok(Value::array(all.into_iter().take(n).collect()))
        }
        None => Ok(all.into_iter().next().unwrap_or_else(Value::nil)),
    }
}

fn extreme_by(interp: &mut Interpreter, recv: &Value, args: CallArgs, wanted: Ordering) -> EvalResult {
    let block = block_of(&args)?;
    let mut best: Option<(Value, Value)> = None;
    for item in items(interp, recv)? {
        let key = yield1(interp, &block, item.clone())?;
        let replace = match &best {
            Some((best_key, _)) => interp.compare_strict(&key, best_key)? == wanted,
            None => true,
        };
        if replace {
            best = Some((key, item));
        }
    }
    Ok(best.map_or_else(Value::nil, |(_, item)| item))
}

fn window_size(interp: &Interpreter, value: &Value) -> EvalResult<usize> {
    match int_arg(interp, value)? {
        n if n > 0 => Ok(n as usize),
        _ => Err(argument_error("invalid size").into()),
    }
}

/// Yields each group when a block is given, else returns them as an array.
fn each_group(interp: &mut Interpreter, recv: &Value, args: &CallArgs, groups: Vec<Value>) -> EvalResult {
    match &args.block {
        Some(block) => {
            for group in groups {
                yield1(interp, block, group)?;
            }
            Ok(recv.clone())
        }
        None => Ok(Value::array(groups)),
    }
}
