//! `Regexp` and `MatchData` on top of the `regex` crate.
//!
//! Patterns are translated to the crate's syntax: `^`/`$` always match at
//! line boundaries, the `m` option makes `.` match newlines and a few
//! escapes without a direct counterpart are rewritten.

use regex::{Captures, Regex};

use crate::{
    diagnostics::{Diagnostic, DiagnosticKind},
    runtime::{CallArgs, EvalResult, Interpreter},
    value::{inspect_str, MatchDataValue, RegexValue, Value, ValueKind},
};

use super::{int_arg, name_arg, str_arg, StdlibRegistry};

fn regexp_error(message: impl Into<String>) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::Custom("RegexpError".into()), message)
}

/// Rewrites escapes the `regex` crate spells differently.
fn translate(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('h') => out.push_str("[0-9a-fA-F]"),
            Some('H') => out.push_str("[^0-9a-fA-F]"),
            Some('Z') => out.push_str(r"(?:\n?\z)"),
            Some('/') => out.push('/'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Compiles a regexp literal; `flags` is any combination of `i`, `m`, `x`.
pub fn compile(source: &str, flags: &str) -> Result<Value, Diagnostic> {
    let mut inline = String::from("m");
    if flags.contains('i') {
        inline.push('i');
    }
    if flags.contains('m') {
        inline.push('s');
    }
    if flags.contains('x') {
        inline.push('x');
    }
    let pattern = format!("(?{inline}){}", translate(source));
    let regex = Regex::new(&pattern).map_err(|err| regexp_error(err.to_string()))?;
    let mut kept: Vec<char> = flags.chars().filter(|c| "mix".contains(*c)).collect();
    kept.sort_unstable();
    kept.dedup();
    Ok(Value::new(ValueKind::Regex(RegexValue {
        source: source.to_string(),
        regex,
        flags: kept.into_iter().collect(),
    })))
}

/// Group `index` of a MatchData value, or nil.
pub fn group(match_data: &Value, index: usize) -> Value {
    match match_data.kind() {
        ValueKind::MatchData(data) => data
            .groups
            .get(index)
            .cloned()
            .flatten()
            .map_or_else(Value::nil, Value::string),
        _ => Value::nil(),
    }
}

pub(crate) fn match_data(regex: &Regex, captures: &Captures<'_>, text: &str) -> Value {
    let whole = captures.get(0);
    let groups = captures
        .iter()
        .map(|group| group.map(|m| m.as_str().to_string()))
        .collect();
    let names = regex.capture_names().map(|name| name.map(str::to_string)).collect();
    Value::new(ValueKind::MatchData(MatchDataValue {
        groups,
        names,
        pre_match: whole.map_or("", |m| &text[..m.start()]).to_string(),
        post_match: whole.map_or("", |m| &text[m.end()..]).to_string(),
    }))
}

/// The pattern for String methods that accept a Regexp or a literal String.
pub(crate) fn pattern_of(interp: &Interpreter, value: &Value) -> Result<Regex, Diagnostic> {
    match value.kind() {
        ValueKind::Regex(regex) => Ok(regex.regex.clone()),
        _ => {
            let text = str_arg(interp, value)?;
            Regex::new(&regex::escape(&text)).map_err(|err| regexp_error(err.to_string()))
        }
    }
}

/// Updates `$~`, which `$1`..`$9` read from.
pub(crate) fn set_last_match(interp: &mut Interpreter, value: Option<Value>) {
    match value {
        Some(value) => {
            interp.globals.insert("$~".into(), value);
        }
        None => {
            interp.globals.shift_remove("$~");
        }
    }
}

/// Matches `text` from byte offset `start`, recording `$~`.
pub(crate) fn search(interp: &mut Interpreter, regex: &Regex, text: &str, start: usize) -> Option<(usize, Value)> {
    let found = regex.captures_at(text, start.min(text.len())).map(|captures| {
        let offset = captures.get(0).map_or(0, |m| m.start());
        (offset, match_data(regex, &captures, text))
    });
    set_last_match(interp, found.as_ref().map(|(_, data)| data.clone()));
    found
}

fn char_index(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

fn regex_of(value: &Value) -> Option<&RegexValue> {
    match value.kind() {
        ValueKind::Regex(regex) => Some(regex),
        _ => None,
    }
}

fn match_of(value: &Value) -> Option<&MatchDataValue> {
    match value.kind() {
        ValueKind::MatchData(data) => Some(data),
        _ => None,
    }
}

fn regexp_match(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let Some(regex) = regex_of(recv) else {
        return Ok(Value::nil());
    };
    let subject = args.arg(0);
    if subject.is_nil() {
        set_last_match(interp, None);
        return Ok(Value::nil());
    }
    let text = match subject.kind() {
        ValueKind::Symbol(symbol) => symbol.name().to_string(),
        _ => str_arg(interp, &subject)?,
    };
    let start = match args.positional.get(1) {
        Some(pos) => {
            let pos = int_arg(interp, pos)?.max(0) as usize;
            text.char_indices().nth(pos).map_or(text.len(), |(byte, _)| byte)
        }
        None => 0,
    };
    let regex = regex.regex.clone();
    Ok(search(interp, &regex, &text, start).map_or_else(Value::nil, |(_, data)| data))
}

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("Regexp")
        .native("match", -2, regexp_match)
        .native("match?", 1, |interp, recv, args| {
            let subject = args.arg(0);
            if subject.is_nil() {
                return Ok(Value::bool(false));
            }
            let text = str_arg(interp, &subject)?;
            Ok(Value::bool(regex_of(recv).is_some_and(|r| r.regex.is_match(&text))))
        })
        .native("=~", 1, |interp, recv, args| {
            let subject = args.arg(0);
            let Some(regex) = regex_of(recv) else {
                return Ok(Value::nil());
            };
            if subject.is_nil() {
                set_last_match(interp, None);
                return Ok(Value::nil());
            }
            let text = str_arg(interp, &subject)?;
            let regex = regex.regex.clone();
            Ok(match search(interp, &regex, &text, 0) {
                Some((offset, _)) => Value::int(char_index(&text, offset) as i64),
                None => Value::nil(),
            })
        })
        .native("===", 1, |interp, recv, args| {
            let text = match args.arg(0).kind() {
                ValueKind::String(text) => text.text.borrow().clone(),
                ValueKind::Symbol(symbol) => symbol.name().to_string(),
                _ => return Ok(Value::bool(false)),
            };
            let Some(regex) = regex_of(recv) else {
                return Ok(Value::bool(false));
            };
            let regex = regex.regex.clone();
            Ok(Value::bool(search(interp, &regex, &text, 0).is_some()))
        })
        .native("source", 0, |_, recv, _| {
            Ok(regex_of(recv).map_or_else(Value::nil, |r| Value::string(r.source.clone())))
        })
        .native("to_s", 0, |_, recv, _| {
            let Some(regex) = regex_of(recv) else {
                return Ok(Value::nil());
            };
            let off: String = "mix".chars().filter(|c| !regex.flags.contains(*c)).collect();
            let off = if off.is_empty() { String::new() } else { format!("-{off}") };
            Ok(Value::string(format!("(?{}{off}:{})", regex.flags, regex.source)))
        })
        .native("inspect", 0, |_, recv, _| Ok(Value::string(recv.to_string())))
        .native("names", 0, |_, recv, _| {
            let names = regex_of(recv)
                .map(|r| {
                    r.regex
                        .capture_names()
                        .flatten()
                        .map(Value::string)
                        .collect()
                })
                .unwrap_or_default();
            Ok(Value::array(names))
        })
        .native("casefold?", 0, |_, recv, _| {
            Ok(Value::bool(regex_of(recv).is_some_and(|r| r.flags.contains('i'))))
        });

    registry
        .singleton_table("Regexp")
        .native("new", -2, |interp, _, args| {
            let source = match args.arg(0).kind() {
                ValueKind::Regex(regex) => return compile(&regex.source, &regex.flags).map_err(Into::into),
                _ => str_arg(interp, &args.arg(0))?,
            };
            let flags = match args.positional.get(1).map(Value::kind) {
                Some(ValueKind::String(text)) => text.text.borrow().clone(),
                Some(ValueKind::Bool(true)) => "i".to_string(),
                Some(ValueKind::Int(bits)) => {
                    let mut flags = String::new();
                    if bits & 1 != 0 {
                        flags.push('i');
                    }
                    if bits & 2 != 0 {
                        flags.push('x');
                    }
                    if bits & 4 != 0 {
                        flags.push('m');
                    }
                    flags
                }
                _ => String::new(),
            };
            Ok(compile(&source, &flags)?)
        })
        .native("escape", 1, |interp, _, args| {
            let text = str_arg(interp, &args.arg(0))?;
            Ok(Value::string(regex::escape(&text)))
        })
        .alias("quote", "escape")
        .native("last_match", -1, |interp, _, args| {
            let last = interp.global_get("$~");
            Ok(match args.positional.first() {
                Some(index) => group(&last, int_arg(interp, index)?.max(0) as usize),
                None => last,
            })
        });

    registry
        .table("MatchData")
        .native("[]", 1, |interp, recv, args| {
            let Some(data) = match_of(recv) else {
                return Ok(Value::nil());
            };
            let key = args.arg(0);
            let index = match key.kind() {
                ValueKind::String(_) | ValueKind::Symbol(_) => {
                    let name = name_arg(&key)?;
                    let position = data.names.iter().position(|n| n.as_deref() == Some(name.as_str()));
                    match position {
                        Some(position) => position,
                        None => {
                            return Err(Diagnostic::new(
                                DiagnosticKind::Index,
                                format!("undefined group name reference: {name}"),
                            )
                            .into())
                        }
                    }
                }
                _ => {
                    let index = int_arg(interp, &key)?;
                    match super::normalize_index(index, data.groups.len()) {
                        Some(index) => index,
                        None => return Ok(Value::nil()),
                    }
                }
            };
            Ok(group(recv, index))
        })
        .native("captures", 0, |_, recv, _| {
            let count = match_of(recv).map_or(0, |data| data.groups.len());
            Ok(Value::array((1..count).map(|i| group(recv, i)).collect()))
        })
        .native("to_a", 0, |_, recv, _| {
            let count = match_of(recv).map_or(0, |data| data.groups.len());
            Ok(Value::array((0..count).map(|i| group(recv, i)).collect()))
        })
        .native("named_captures", 0, |_, recv, _| {
            let Some(data) = match_of(recv) else {
                return Ok(Value::nil());
            };
            let pairs = data
                .names
                .iter()
                .enumerate()
                .filter_map(|(index, name)| {
                    name.as_ref()
                        .map(|name| (Value::string(name.clone()), group(recv, index)))
                })
                .collect();
            Ok(Value::hash_from_pairs(pairs))
        })
        .native("names", 0, |_, recv, _| {
            let names = match_of(recv)
                .map(|data| data.names.iter().flatten().map(|n| Value::string(n.clone())).collect())
                .unwrap_or_default();
            Ok(Value::array(names))
        })
        .native("pre_match", 0, |_, recv, _| {
            Ok(match_of(recv).map_or_else(Value::nil, |d| Value::string(d.pre_match.clone())))
        })
        .native("post_match", 0, |_, recv, _| {
            Ok(match_of(recv).map_or_else(Value::nil, |d| Value::string(d.post_match.clone())))
        })
        .native("to_s", 0, |_, recv, _| Ok(group(recv, 0)))
        .native("size", 0, |_, recv, _| {
            Ok(Value::int(match_of(recv).map_or(0, |d| d.groups.len()) as i64))
        })
        .alias("length", "size")
        .native("inspect", 0, |_, recv, _| {
            let Some(data) = match_of(recv) else {
                return Ok(Value::nil());
            };
            let mut parts = Vec::new();
            for (index, text) in data.groups.iter().enumerate() {
                let shown = text.as_deref().map_or_else(|| "nil".to_string(), inspect_str);
                if index == 0 {
                    parts.push(shown);
                    continue;
                }
                let label = data
                    .names
                    .get(index)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| index.to_string());
                parts.push(format!("{label}:{shown}"));
            }
            Ok(Value::string(format!("#<MatchData {}>", parts.join(" "))))
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_anchors_are_always_multiline() {
        let value = compile("^b$", "").unwrap();
        let ValueKind::Regex(regex) = value.kind() else { panic!("not a regexp") };
        assert!(regex.regex.is_match("a\nb\nc"));
    }

    #[test]
    fn dot_matches_newline_only_with_m() {
        let plain = compile("a.b", "").unwrap();
        let multiline = compile("a.b", "m").unwrap();
        let (ValueKind::Regex(plain), ValueKind::Regex(multiline)) = (plain.kind(), multiline.kind()) else {
            panic!("not regexps")
        };
        assert!(!plain.regex.is_match("a\nb"));
        assert!(multiline.regex.is_match("a\nb"));
    }

    #[test]
    fn hex_escapes_are_rewritten() {
        assert_eq!(translate(r"\h+"), "[0-9a-fA-F]+");
    }

    #[test]
    fn invalid_patterns_are_regexp_errors() {
        let err = compile("(", "").unwrap_err();
        assert_eq!(err.kind.class_name(), "RegexpError");
    }
}
