//! `String`. Indices and lengths count characters, not bytes.

use regex::Captures;

use crate::{
    ast::BinaryOp,
    diagnostics::{argument_error, type_error, Diagnostic, DiagnosticKind},
    runtime::{CallArgs, EvalResult, Interpreter},
    value::{inspect_str, StringValue, Value, ValueKind},
};

use super::{
    block_of, int_arg, kernel,
    regexp::{match_data, pattern_of, search, set_last_match},
    slice_bounds, str_arg, yield1, StdlibRegistry,
};

fn text_of(value: &Value) -> String {
    value.as_string().unwrap_or_default()
}

fn string_value(value: &Value) -> Option<&StringValue> {
    match value.kind() {
        ValueKind::String(text) => Some(text),
        _ => None,
    }
}

/// Applies an in-place edit, refusing frozen strings.
fn mutate<T>(recv: &Value, edit: impl FnOnce(&mut String) -> T) -> EvalResult<T> {
    recv.check_frozen("String")?;
    let target = string_value(recv).ok_or_else(|| type_error("not a String"))?;
    let mut text = target.text.borrow_mut();
    Ok(edit(&mut text))
}

/// Runs a bang method: replaces the text and returns `recv`, or nil when
/// nothing changed.
fn bang(recv: &Value, transform: impl FnOnce(&str) -> String) -> EvalResult {
    let changed = mutate(recv, |text| {
        let updated = transform(text);
        let changed = updated != *text;
        *text = updated;
        changed
    })?;
    Ok(if changed { recv.clone() } else { Value::nil() })
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn swapcase(text: &str) -> String {
    text.chars()
        .flat_map(|c| {
            if c.is_uppercase() {
                c.to_lowercase().collect::<Vec<_>>()
            } else {
                c.to_uppercase().collect::<Vec<_>>()
            }
        })
        .collect()
}

fn chomp(text: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => text.strip_suffix(suffix).unwrap_or(text).to_string(),
        None => text
            .strip_suffix("\r\n")
            .or_else(|| text.strip_suffix('\n'))
            .or_else(|| text.strip_suffix('\r'))
            .unwrap_or(text)
            .to_string(),
    }
}

/// Characters named by a `tr`/`delete`/`count` spec such as `a-z` or `^aeiou`.
struct CharSet {
    chars: Vec<char>,
    negated: bool,
}

impl CharSet {
    fn parse(spec: &str) -> Self {
        let (negated, body) = match spec.strip_prefix('^') {
            Some(rest) if !rest.is_empty() => (true, rest),
            _ => (false, spec),
        };
        let source: Vec<char> = body.chars().collect();
        let mut chars = Vec::new();
        let mut i = 0;
        while i < source.len() {
            if i + 2 < source.len() && source[i + 1] == '-' {
                let (from, to) = (source[i], source[i + 2]);
                if from <= to {
                    chars.extend(from..=to);
                }
                i += 3;
            } else {
                if source[i] == '\\' && i + 1 < source.len() {
                    i += 1;
                }
                chars.push(source[i]);
                i += 1;
            }
        }
        Self { chars, negated }
    }

    fn contains(&self, c: char) -> bool {
        self.chars.contains(&c) != self.negated
    }
}

fn translate(text: &str, from: &str, to: &str) -> String {
    let from = CharSet::parse(from);
    let to = CharSet::parse(to).chars;
    text.chars()
        .filter_map(|c| {
            if !from.contains(c) {
                return Some(c);
            }
            if from.negated {
                return to.last().copied();
            }
            let index = from.chars.iter().position(|&x| x == c).unwrap_or(0);
            to.get(index).or(to.last()).copied()
        })
        .collect()
}

fn squeeze(text: &str, set: Option<&CharSet>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;
    for c in text.chars() {
        if previous == Some(c) && set.map_or(true, |set| set.contains(c)) {
            continue;
        }
        out.push(c);
        previous = Some(c);
    }
    out
}

/// `"az".succ == "ba"`, `"zz".succ == "aaa"`, `"a9".succ == "b0"`.
fn successor(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    if !chars.iter().any(|c| c.is_ascii_alphanumeric()) {
        if let Some(last) = chars.last_mut() {
            *last = char::from_u32(*last as u32 + 1).unwrap_or(*last);
        }
        return chars.into_iter().collect();
    }
    let mut index = chars.len();
    while index > 0 {
        index -= 1;
        let c = chars[index];
        if !c.is_ascii_alphanumeric() {
            continue;
        }
        let (next, carry) = match c {
            'z' => ('a', Some('a')),
            'Z' => ('A', Some('A')),
            '9' => ('0', Some('1')),
            _ => (char::from_u32(c as u32 + 1).unwrap_or(c), None),
        };
        chars[index] = next;
        let Some(carry) = carry else {
            return chars.into_iter().collect();
        };
        let more = chars[..index].iter().any(|c| c.is_ascii_alphanumeric());
        if !more {
            chars.insert(index, carry);
            return chars.into_iter().collect();
        }
    }
    chars.into_iter().collect()
}

/// Leading integer of `text` in `radix`, as `String#to_i` reads it.
fn leading_integer(text: &str, radix: u32) -> i128 {
    let text = text.trim_start();
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let rest = match radix {
        16 => rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")).unwrap_or(rest),
        2 => rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")).unwrap_or(rest),
        8 => rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0")).unwrap_or(rest),
        _ => rest,
    };
    let mut value: i128 = 0;
    for c in rest.chars() {
        if c == '_' {
            continue;
        }
        let Some(digit) = c.to_digit(radix) else {
            break;
        };
        value = value.saturating_mul(radix as i128).saturating_add(digit as i128);
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Leading float of `text`, as `String#to_f` reads it.
fn leading_float(text: &str) -> f64 {
    let text = text.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = text.as_bytes();
    while end < bytes.len() {
        let b = bytes[end];
        let ok = match b {
            b'0'..=b'9' => {
                seen_digit = true;
                true
            }
            b'_' => seen_digit,
            b'+' | b'-' => end == 0 || matches!(bytes[end - 1], b'e' | b'E'),
            b'.' if !seen_dot && !seen_exp => {
                seen_dot = true;
                bytes.get(end + 1).is_some_and(u8::is_ascii_digit)
            }
            b'e' | b'E' if seen_digit && !seen_exp => {
                seen_exp = true;
                true
            }
            _ => false,
        };
        if !ok {
            break;
        }
        end += 1;
    }
    text[..end].replace('_', "").trim_end_matches(['e', 'E', '+', '-']).parse().unwrap_or(0.0)
}

/// Expands `\0`, `\1`..`\9` and `\k<name>` in a `sub`/`gsub` replacement.
fn expand_replacement(template: &str, captures: &Captures<'_>) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let index = d.to_digit(10).unwrap_or(0) as usize;
                out.push_str(captures.get(index).map_or("", |m| m.as_str()));
            }
            Some('&') => {
                chars.next();
                out.push_str(captures.get(0).map_or("", |m| m.as_str()));
            }
            Some('k') => {
                chars.next();
                if chars.next_if_eq(&'<').is_some() {
                    let name: String = chars.by_ref().take_while(|&c| c != '>').collect();
                    out.push_str(captures.name(&name).map_or("", |m| m.as_str()));
                } else {
                    out.push_str("\\k");
                }
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            _ => out.push('\\'),
        }
    }
    out
}

/// Shared body of `sub`, `gsub` and their bang forms.
fn substitute(interp: &mut Interpreter, recv: &Value, args: &CallArgs, global: bool) -> EvalResult<String> {
    let text = text_of(recv);
    let regex = pattern_of(interp, &args.arg(0))?;
    let replacement = args.positional.get(1).cloned();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut last_match = None;
    let matches: Vec<Captures<'_>> = if global {
        regex.captures_iter(&text).collect()
    } else {
        regex.captures(&text).into_iter().collect()
    };
    for captures in &matches {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        let data = match_data(&regex, captures, &text);
        let piece = match &replacement {
            Some(value) => match value.kind() {
                ValueKind::Hash(hash) => {
                    let found = hash.get(&Value::string(whole.as_str())).unwrap_or_else(Value::nil);
                    interp.to_s(&found)?
                }
                _ => expand_replacement(&str_arg(interp, value)?, captures),
            },
            None => {
                let block = block_of(args)?;
                set_last_match(interp, Some(data.clone()));
                let result = yield1(interp, &block, Value::string(whole.as_str()))?;
                interp.to_s(&result)?
            }
        };
        out.push_str(&piece);
        last = whole.end();
        last_match = Some(data);
    }
    out.push_str(&text[last..]);
    set_last_match(interp, last_match);
    Ok(out)
}

fn split(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let text = text_of(recv);
    let limit = match args.positional.get(1) {
        Some(limit) => int_arg(interp, limit)?,
        None => 0,
    };
    let pattern = args.arg(0);
    let awk = pattern.is_nil() || pattern.as_string().as_deref() == Some(" ");
    let mut parts: Vec<String> = if awk {
        let trimmed = text.trim_start();
        if limit > 0 {
            let mut parts = Vec::new();
            let mut rest = trimmed;
            while parts.len() + 1 < limit as usize {
                match rest.find(char::is_whitespace) {
                    Some(at) => {
                        parts.push(rest[..at].to_string());
                        rest = rest[at..].trim_start();
                    }
                    None => break,
                }
            }
            if !rest.is_empty() {
                parts.push(rest.to_string());
            }
            parts
        } else {
            trimmed.split_whitespace().map(str::to_string).collect()
        }
    } else if pattern.as_string().as_deref() == Some("") {
        text.chars().map(String::from).collect()
    } else {
        let regex = pattern_of(interp, &pattern)?;
        if limit > 0 {
            regex.splitn(&text, limit as usize).map(str::to_string).collect()
        } else {
            regex.split(&text).map(str::to_string).collect()
        }
    };
    if limit == 0 {
        while parts.last().is_some_and(String::is_empty) {
            parts.pop();
        }
    }
    Ok(Value::array(parts.into_iter().map(Value::string).collect()))
}

/// `str[index]`, `str[start, len]`, `str[range]`, `str[substring]` and
/// `str[regexp, group]`.
fn slice(interp: &mut Interpreter, recv: &Value, args: &CallArgs) -> EvalResult {
    let text = text_of(recv);
    let chars: Vec<char> = text.chars().collect();
    let first = args.arg(0);
    match first.kind() {
        ValueKind::String(needle) => {
            let needle = needle.text.borrow().clone();
            return Ok(if text.contains(&needle) { Value::string(needle) } else { Value::nil() });
        }
        ValueKind::Regex(regex) => {
            let regex = regex.regex.clone();
            let Some((_, data)) = search(interp, &regex, &text, 0) else {
                return Ok(Value::nil());
            };
            let group = match args.positional.get(1) {
                Some(group) => match group.kind() {
                    ValueKind::String(_) | ValueKind::Symbol(_) => {
                        return interp.send(&data, "[]", CallArgs::new(vec![group.clone()]))
                    }
                    _ => int_arg(interp, group)?.max(0) as usize,
                },
                None => 0,
            };
            return Ok(super::regexp::group(&data, group));
        }
        ValueKind::Range(_) => {}
        _ if args.len() == 1 => {
            let index = int_arg(interp, &first)?;
            return Ok(super::normalize_index(index, chars.len())
                .map_or_else(Value::nil, |i| Value::string(chars[i].to_string())));
        }
        _ => {}
    }
    Ok(match slice_bounds(interp, args, chars.len())? {
        Some((start, end)) => Value::string(chars[start..end].iter().collect::<String>()),
        None => Value::nil(),
    })
}

/// `str[index] = value` and `str[start, len] = value`.
fn set_slice(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let mut positional = args.positional;
    let replacement = positional.pop().unwrap_or_else(Value::nil);
    let insert = str_arg(interp, &replacement)?;
    let chars: Vec<char> = text_of(recv).chars().collect();
    let bounds = match positional.first().map(Value::kind) {
        Some(ValueKind::String(needle)) => {
            let needle: Vec<char> = needle.text.borrow().chars().collect();
            let found = chars.windows(needle.len().max(1)).position(|w| w == needle.as_slice());
            match found {
                Some(start) => Some((start, start + needle.len())),
                None => return Err(Diagnostic::new(DiagnosticKind::Index, "string not matched").into()),
            }
        }
        Some(ValueKind::Range(_)) => slice_bounds(interp, &CallArgs::new(positional.clone()), chars.len())?,
        _ if positional.len() == 1 => {
            let index = int_arg(interp, &positional[0])?;
            match super::normalize_index(index, chars.len()) {
                Some(i) => Some((i, i + 1)),
                None => {
                    return Err(Diagnostic::new(
                        DiagnosticKind::Index,
                        format!("index {index} out of string"),
                    )
                    .into())
                }
            }
        }
        _ => slice_bounds(interp, &CallArgs::new(positional.clone()), chars.len())?,
    };
    let Some((start, end)) = bounds else {
        return Err(Diagnostic::new(DiagnosticKind::Index, "index out of string").into());
    };
    mutate(recv, |text| {
        let mut updated: String = chars[..start].iter().collect();
        updated.push_str(&insert);
        updated.extend(&chars[end..]);
        *text = updated;
    })?;
    Ok(replacement)
}

fn pad(interp: &Interpreter, recv: &Value, args: &CallArgs, left: bool, right: bool) -> EvalResult {
    let text = text_of(recv);
    let width = int_arg(interp, &args.arg(0))?.max(0) as usize;
    let fill: Vec<char> = match args.positional.get(1) {
        Some(fill) => str_arg(interp, fill)?.chars().collect(),
        None => vec![' '],
    };
    if fill.is_empty() {
        return Err(argument_error("zero width padding").into());
    }
    let len = text.chars().count();
    if width <= len {
        return Ok(Value::string(text));
    }
    let total = width - len;
    let (before, after) = match (left, right) {
        (true, true) => (total / 2, total - total / 2),
        (true, false) => (total, 0),
        _ => (0, total),
    };
    let padding = |n: usize| fill.iter().cycle().take(n).collect::<String>();
    Ok(Value::string(format!("{}{text}{}", padding(before), padding(after))))
}

fn char_position(text: &str, byte: usize) -> Value {
    Value::int(text[..byte].chars().count() as i64)
}

fn byte_offset(text: &str, chars: i64) -> Option<usize> {
    let count = text.chars().count() as i64;
    let index = if chars < 0 { chars + count } else { chars };
    if index < 0 || index > count {
        return None;
    }
    Some(text.char_indices().nth(index as usize).map_or(text.len(), |(b, _)| b))
}

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("String")
        .native("length", 0, |_, recv, _| Ok(Value::int(text_of(recv).chars().count() as i64)))
        .alias("size", "length")
        .native("bytesize", 0, |_, recv, _| Ok(Value::int(text_of(recv).len() as i64)))
        .native("to_s", 0, |_, recv, _| Ok(recv.clone()))
        .alias("to_str", "to_s")
        .native("inspect", 0, |_, recv, _| Ok(Value::string(inspect_str(&text_of(recv)))))
        .native("dump", 0, |_, recv, _| Ok(Value::string(inspect_str(&text_of(recv)))))
        .native("to_sym", 0, |_, recv, _| Ok(Value::symbol(&text_of(recv))))
        .alias("intern", "to_sym")
        .native("to_i", -1, |interp, recv, args| {
            let radix = match args.positional.first() {
                Some(base) => int_arg(interp, base)?,
                None => 10,
            };
            if !(2..=36).contains(&radix) {
                return Err(argument_error(format!("invalid radix {radix}")).into());
            }
            Ok(Value::integer(leading_integer(&text_of(recv), radix as u32)))
        })
        .native("to_f", 0, |_, recv, _| Ok(Value::float(leading_float(&text_of(recv)))))
        .native("hex", 0, |_, recv, _| Ok(Value::integer(leading_integer(&text_of(recv), 16))))
        .native("oct", 0, |_, recv, _| Ok(Value::integer(leading_integer(&text_of(recv), 8))))
        .native("==", 1, |_, recv, args| {
            Ok(Value::bool(args.arg(0).as_string().is_some_and(|other| other == text_of(recv))))
        })
        .alias("eql?", "==")
        .alias("===", "==")
        .native("<=>", 1, |_, recv, args| {
            Ok(match args.arg(0).as_string() {
                Some(other) => Value::int(match text_of(recv).cmp(&other) {
                    std::cmp::Ordering::Less => -1,
                    std::cmp::Ordering::Equal => 0,
                    std::cmp::Ordering::Greater => 1,
                }),
                None => Value::nil(),
            })
        })
        .native("+", 1, |interp, recv, args| {
            let other = str_arg(interp, &args.arg(0))?;
            Ok(Value::string(text_of(recv) + &other))
        })
        .native("*", 1, |interp, recv, args| {
            let times = int_arg(interp, &args.arg(0))?;
            if times < 0 {
                return Err(argument_error("negative argument").into());
            }
            Ok(Value::string(text_of(recv).repeat(times as usize)))
        })
        .native("%", 1, |interp, recv, args| {
            let values = match args.arg(0).as_array() {
                Some(array) => array.to_vec(),
                None => vec![args.arg(0)],
            };
            Ok(Value::string(kernel::format(interp, &text_of(recv), &values)?))
        })
        .native("<<", 1, |interp, recv, args| {
            let other = args.arg(0);
            let addition = match other.kind() {
                ValueKind::Int(code) => char::from_u32(*code as u32)
                    .map(String::from)
                    .ok_or_else(|| argument_error(format!("invalid character {code}")))?,
                _ => str_arg(interp, &other)?,
            };
            mutate(recv, |text| text.push_str(&addition))?;
            Ok(recv.clone())
        })
        .native("concat", -1, |interp, recv, args| {
            let mut addition = String::new();
            for value in &args.positional {
                addition.push_str(&str_arg(interp, value)?);
            }
            mutate(recv, |text| text.push_str(&addition))?;
            Ok(recv.clone())
        })
        .native("prepend", -1, |interp, recv, args| {
            let mut addition = String::new();
            for value in &args.positional {
                addition.push_str(&str_arg(interp, value)?);
            }
            mutate(recv, |text| text.insert_str(0, &addition))?;
            Ok(recv.clone())
        })
        .native("insert", 2, |interp, recv, args| {
            let index = int_arg(interp, &args.arg(0))?;
            let addition = str_arg(interp, &args.arg(1))?;
            let text = text_of(recv);
            let at = if index < 0 {
                byte_offset(&text, index + 1)
            } else {
                byte_offset(&text, index)
            };
            let at = at.ok_or_else(|| {
                Diagnostic::new(DiagnosticKind::Index, format!("index {index} out of string"))
            })?;
            mutate(recv, |text| text.insert_str(at, &addition))?;
            Ok(recv.clone())
        })
        .native("replace", 1, |interp, recv, args| {
            let other = str_arg(interp, &args.arg(0))?;
            mutate(recv, |text| *text = other)?;
            Ok(recv.clone())
        })
        .native("clear", 0, |_, recv, _| {
            mutate(recv, String::clear)?;
            Ok(recv.clone())
        })
        .native("dup", 0, |_, recv, _| Ok(Value::string(text_of(recv))))
        .alias("+@", "dup")
        .native("-@", 0, |_, recv, _| {
            if recv.is_frozen() {
                return Ok(recv.clone());
            }
            let copy = Value::string(text_of(recv));
            copy.freeze();
            Ok(copy)
        })
        .native("upcase", 0, |_, recv, _| Ok(Value::string(text_of(recv).to_uppercase())))
        .native("downcase", 0, |_, recv, _| Ok(Value::string(text_of(recv).to_lowercase())))
        .native("capitalize", 0, |_, recv, _| Ok(Value::string(capitalize(&text_of(recv)))))
        .native("swapcase", 0, |_, recv, _| Ok(Value::string(swapcase(&text_of(recv)))))
        .native("upcase!", 0, |_, recv, _| bang(recv, str::to_uppercase))
        .native("downcase!", 0, |_, recv, _| bang(recv, str::to_lowercase))
        .native("capitalize!", 0, |_, recv, _| bang(recv, capitalize))
        .native("swapcase!", 0, |_, recv, _| bang(recv, swapcase))
        .native("reverse", 0, |_, recv, _| Ok(Value::string(text_of(recv).chars().rev().collect::<String>())))
        .native("reverse!", 0, |_, recv, _| {
            bang(recv, |text| text.chars().rev().collect())?;
            Ok(recv.clone())
        })
        .native("strip", 0, |_, recv, _| Ok(Value::string(text_of(recv).trim())))
        .native("lstrip", 0, |_, recv, _| Ok(Value::string(text_of(recv).trim_start())))
        .native("rstrip", 0, |_, recv, _| Ok(Value::string(text_of(recv).trim_end())))
        .native("strip!", 0, |_, recv, _| bang(recv, |text| text.trim().to_string()))
        .native("lstrip!", 0, |_, recv, _| bang(recv, |text| text.trim_start().to_string()))
        .native("rstrip!", 0, |_, recv, _| bang(recv, |text| text.trim_end().to_string()))
        .native("chomp", -1, |interp, recv, args| {
            let suffix = match args.positional.first() {
                Some(suffix) => Some(str_arg(interp, suffix)?),
                None => None,
            };
            Ok(Value::string(chomp(&text_of(recv), suffix.as_deref())))
        })
        .native("chomp!", 0, |_, recv, _| bang(recv, |text| chomp(text, None)))
        .native("chop", 0, |_, recv, _| {
            let mut text = text_of(recv);
            if text.ends_with("\r\n") {
                text.truncate(text.len() - 2);
            } else {
                text.pop();
            }
            Ok(Value::string(text))
        })
        .native("chr", 0, |_, recv, _| {
            Ok(Value::string(text_of(recv).chars().next().map(String::from).unwrap_or_default()))
        })
        .native("ord", 0, |_, recv, _| {
            text_of(recv)
                .chars()
                .next()
                .map(|c| Value::int(c as i64))
                .ok_or_else(|| argument_error("empty string").into())
        })
        .native("chars", 0, |_, recv, _| {
            Ok(Value::array(text_of(recv).chars().map(|c| Value::string(c.to_string())).collect()))
        })
        .native("bytes", 0, |_, recv, _| {
            Ok(Value::array(text_of(recv).bytes().map(|b| Value::int(b as i64)).collect()))
        })
        .native("lines", 0, |_, recv, _| {
            Ok(Value::array(
                text_of(recv).split_inclusive('\n').map(Value::string).collect(),
            ))
        })
        .native("each_char", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            for c in text_of(recv).chars() {
                yield1(interp, &block, Value::string(c.to_string()))?;
            }
            Ok(recv.clone())
        })
        .native("each_line", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            for line in text_of(recv).split_inclusive('\n') {
                yield1(interp, &block, Value::string(line))?;
            }
            Ok(recv.clone())
        })
        .native("each_byte", 0, |interp, recv, args| {
            let block = block_of(&args)?;
            for byte in text_of(recv).bytes() {
                yield1(interp, &block, Value::int(byte as i64))?;
            }
            Ok(recv.clone())
        })
        .native("split", -1, split)
        .native("empty?", 0, |_, recv, _| Ok(Value::bool(text_of(recv).is_empty())))
        .native("include?", 1, |interp, recv, args| {
            let needle = str_arg(interp, &args.arg(0))?;
            Ok(Value::bool(text_of(recv).contains(&needle)))
        })
        .native("start_with?", -1, |interp, recv, args| {
            let text = text_of(recv);
            for prefix in &args.positional {
                let found = match prefix.kind() {
                    ValueKind::Regex(regex) => regex.regex.find(&text).is_some_and(|m| m.start() == 0),
                    _ => text.starts_with(&str_arg(interp, prefix)?),
                };
                if found {
                    return Ok(Value::bool(true));
                }
            }
            Ok(Value::bool(false))
        })
        .native("end_with?", -1, |interp, recv, args| {
            let text = text_of(recv);
            for suffix in &args.positional {
                if text.ends_with(&str_arg(interp, suffix)?) {
                    return Ok(Value::bool(true));
                }
            }
            Ok(Value::bool(false))
        })
        .native("index", -2, |interp, recv, args| {
            let text = text_of(recv);
            let start = match args.positional.get(1) {
                Some(start) => match byte_offset(&text, int_arg(interp, start)?) {
                    Some(start) => start,
                    None => return Ok(Value::nil()),
                },
                None => 0,
            };
            let regex = pattern_of(interp, &args.arg(0))?;
            Ok(regex
                .find_at(&text, start)
                .map_or_else(Value::nil, |m| char_position(&text, m.start())))
        })
        .native("rindex", 1, |interp, recv, args| {
            let text = text_of(recv);
            let regex = pattern_of(interp, &args.arg(0))?;
            let last = (0..=text.len())
                .rev()
                .filter(|&at| text.is_char_boundary(at))
                .find(|&at| regex.find_at(&text, at).is_some_and(|m| m.start() == at));
            Ok(last.map_or_else(Value::nil, |at| char_position(&text, at)))
        })
        .native("[]", -2, |interp, recv, args| slice(interp, recv, &args))
        .alias("slice", "[]")
        .native("[]=", -3, set_slice)
        .native("=~", 1, |interp, recv, args| {
            let pattern = args.arg(0);
            if !matches!(pattern.kind(), ValueKind::Regex(_)) {
                return Err(type_error(format!(
                    "wrong argument type {} (expected Regexp)",
                    interp.class_name_of(&pattern)
                ))
                .into());
            }
            interp.send(&pattern, "=~", CallArgs::new(vec![recv.clone()]))
        })
        .native("match", -2, |interp, recv, args| {
            let pattern = args.arg(0);
            let regex = match pattern.kind() {
                ValueKind::Regex(_) => pattern,
                _ => super::regexp::compile(&regex::escape(&str_arg(interp, &pattern)?), "")?,
            };
            let mut forwarded = vec![recv.clone()];
            forwarded.extend(args.positional.into_iter().skip(1));
            interp.send(&regex, "match", CallArgs::new(forwarded))
        })
        .native("match?", 1, |interp, recv, args| {
            let regex = pattern_of(interp, &args.arg(0))?;
            Ok(Value::bool(regex.is_match(&text_of(recv))))
        })
        .native("scan", 1, |interp, recv, args| {
            let text = text_of(recv);
            let regex = pattern_of(interp, &args.arg(0))?;
            let mut results = Vec::new();
            for captures in regex.captures_iter(&text) {
                let item = if captures.len() > 1 {
                    Value::array(
                        captures
                            .iter()
                            .skip(1)
                            .map(|group| group.map_or_else(Value::nil, |m| Value::string(m.as_str())))
                            .collect(),
                    )
                } else {
                    Value::string(captures.get(0).map_or("", |m| m.as_str()))
                };
                if let Some(block) = &args.block {
                    set_last_match(interp, Some(match_data(&regex, &captures, &text)));
                    yield1(interp, block, item)?;
                } else {
                    results.push(item);
                }
            }
            Ok(if args.block.is_some() { recv.clone() } else { Value::array(results) })
        })
        .native("sub", -2, |interp, recv, args| Ok(Value::string(substitute(interp, recv, &args, false)?)))
        .native("gsub", -2, |interp, recv, args| Ok(Value::string(substitute(interp, recv, &args, true)?)))
        .native("sub!", -2, |interp, recv, args| {
            let updated = substitute(interp, recv, &args, false)?;
            bang(recv, |_| updated)
        })
        .native("gsub!", -2, |interp, recv, args| {
            let updated = substitute(interp, recv, &args, true)?;
            bang(recv, |_| updated)
        })
        .native("tr", 2, |interp, recv, args| {
            let from = str_arg(interp, &args.arg(0))?;
            let to = str_arg(interp, &args.arg(1))?;
            Ok(Value::string(translate(&text_of(recv), &from, &to)))
        })
        .native("delete", -2, |interp, recv, args| {
            let mut text = text_of(recv);
            for spec in &args.positional {
                let set = CharSet::parse(&str_arg(interp, spec)?);
                text.retain(|c| !set.contains(c));
            }
            Ok(Value::string(text))
        })
        .native("squeeze", -1, |interp, recv, args| {
            let set = match args.positional.first() {
                Some(spec) => Some(CharSet::parse(&str_arg(interp, spec)?)),
                None => None,
            };
            Ok(Value::string(squeeze(&text_of(recv), set.as_ref())))
        })
        .native("count", -2, |interp, recv, args| {
            let set = CharSet::parse(&str_arg(interp, &args.arg(0))?);
            Ok(Value::int(text_of(recv).chars().filter(|&c| set.contains(c)).count() as i64))
        })
        .native("center", -2, |interp, recv, args| pad(interp, recv, &args, true, true))
        .native("ljust", -2, |interp, recv, args| pad(interp, recv, &args, false, true))
        .native("rjust", -2, |interp, recv, args| pad(interp, recv, &args, true, false))
        .native("succ", 0, |_, recv, _| Ok(Value::string(successor(&text_of(recv)))))
        .alias("next", "succ")
        .native("casecmp", 1, |interp, recv, args| {
            let other = str_arg(interp, &args.arg(0))?.to_lowercase();
            let ordering = text_of(recv).to_lowercase().cmp(&other);
            Ok(Value::int(ordering as i64))
        })
        .native("casecmp?", 1, |interp, recv, args| {
            let other = str_arg(interp, &args.arg(0))?;
            Ok(Value::bool(text_of(recv).to_lowercase() == other.to_lowercase()))
        })
        .native("partition", 1, |interp, recv, args| {
            let text = text_of(recv);
            let regex = pattern_of(interp, &args.arg(0))?;
            let parts = match regex.find(&text) {
                Some(m) => [&text[..m.start()], m.as_str(), &text[m.end()..]],
                None => [text.as_str(), "", ""],
            };
            Ok(Value::array(parts.iter().map(|p| Value::string(*p)).collect()))
        })
        .native("rpartition", 1, |interp, recv, args| {
            let text = text_of(recv);
            let regex = pattern_of(interp, &args.arg(0))?;
            let parts = match regex.find_iter(&text).last() {
                Some(m) => [&text[..m.start()], m.as_str(), &text[m.end()..]],
                None => ["", "", text.as_str()],
            };
            Ok(Value::array(parts.iter().map(|p| Value::string(*p)).collect()))
        })
        .native("delete_prefix", 1, |interp, recv, args| {
            let prefix = str_arg(interp, &args.arg(0))?;
            let text = text_of(recv);
            Ok(Value::string(text.strip_prefix(prefix.as_str()).unwrap_or(&text)))
        })
        .native("delete_suffix", 1, |interp, recv, args| {
            let suffix = str_arg(interp, &args.arg(0))?;
            let text = text_of(recv);
            Ok(Value::string(text.strip_suffix(suffix.as_str()).unwrap_or(&text)))
        })
        .native("upto", 1, |interp, recv, args| {
            let last = str_arg(interp, &args.arg(0))?;
            let block = block_of(&args)?;
            let mut current = text_of(recv);
            while current.chars().count() <= last.chars().count() {
                yield1(interp, &block, Value::string(current.clone()))?;
                if current == last {
                    break;
                }
                current = successor(&current);
            }
            Ok(recv.clone())
        })
        .native("between?", 2, |interp, recv, args| {
            let low = interp.binary(BinaryOp::GreaterEqual, recv.clone(), args.arg(0))?;
            let high = interp.binary(BinaryOp::LessEqual, recv.clone(), args.arg(1))?;
            Ok(Value::bool(low.is_truthy() && high.is_truthy()))
        })
        .native("encoding", 0, |_, _, _| Ok(Value::string("UTF-8")))
        .native("force_encoding", 1, |_, recv, _| Ok(recv.clone()))
        .native("unicode_normalize", -1, |_, recv, _| Ok(recv.clone()))
        .native("hash", 0, |_, recv, _| Ok(Value::int(super::object::hash_of(recv))));

    registry
        .singleton_table("String")
        .native("new", -1, |interp, _, args| {
            Ok(Value::string(match args.positional.first() {
                Some(value) => str_arg(interp, value)?,
                None => String::new(),
            }))
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_carries_like_an_odometer() {
        assert_eq!(successor("az"), "ba");
        assert_eq!(successor("zz"), "aaa");
        assert_eq!(successor("a9"), "b0");
        assert_eq!(successor("Zz"), "AAa");
    }

    #[test]
    fn char_sets_expand_ranges_and_negation() {
        let set = CharSet::parse("a-c");
        assert!(set.contains('b'));
        assert!(!set.contains('d'));
        let negated = CharSet::parse("^a-c");
        assert!(negated.contains('d'));
    }

    #[test]
    fn translation_maps_positionally() {
        assert_eq!(translate("hello", "el", "ip"), "hippo");
        assert_eq!(translate("hello", "a-y", "b-z"), "ifmmp");
    }

    #[test]
    fn leading_numbers_stop_at_garbage() {
        assert_eq!(leading_integer("  42abc", 10), 42);
        assert_eq!(leading_integer("-0x1A", 16), -26);
        assert_eq!(leading_integer("abc", 10), 0);
        assert_eq!(leading_float("3.5kg"), 3.5);
        assert_eq!(leading_float("1e3"), 1000.0);
        assert_eq!(leading_float("x"), 0.0);
    }

    #[test]
    fn chomp_removes_one_line_ending() {
        assert_eq!(chomp("line\r\n", None), "line");
        assert_eq!(chomp("line\n\n", None), "line\n");
        assert_eq!(chomp("hello", Some("lo")), "hel");
    }
}
