//! `Kernel`: output, `raise`, `loop`, conversions and `format`.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    diagnostics::{argument_error, type_error, Diagnostic, DiagnosticKind, GarnetError},
    runtime::{CallArgs, EvalResult, Interpreter, Interrupt},
    value::{format_float, Value, ValueKind},
};

use super::{block_of, float_arg, int_arg, str_arg, StdlibRegistry};

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("Kernel")
        .native("puts", -1, puts)
        .native("print", -1, |interp, _, args| {
            for value in args.folded().positional {
                let text = interp.to_s(&value)?;
                interp.output.print(&text);
            }
            Ok(Value::nil())
        })
        .native("p", -1, p)
        .alias("pp", "p")
        .native("raise", -1, |interp, _, args| interp.raise(args.folded()))
        .alias("fail", "raise")
        .native("loop", 0, kernel_loop)
        .native("lambda", 0, |_, _, args| Ok(block_of(&args)?))
        .native("proc", 0, |_, _, args| Ok(block_of(&args)?))
        .native("block_given?", 0, |_, _, _| Ok(Value::bool(false)))
        .native("format", -2, |interp, _, args| {
            let args = args.folded();
            let template = str_arg(interp, &args.arg(0))?;
            Ok(Value::string(format(interp, &template, &args.positional[1..])?))
        })
        .alias("sprintf", "format")
        .native("Integer", 1, |interp, _, args| Ok(Value::integer(to_integer(interp, &args.arg(0))?)))
        .native("Float", 1, |interp, _, args| Ok(Value::float(to_float(interp, &args.arg(0))?)))
        .native("String", 1, |interp, _, args| Ok(Value::string(interp.to_s(&args.arg(0))?)))
        .native("Array", 1, |_, _, args| {
            let value = args.arg(0);
            Ok(match value.kind() {
                ValueKind::Nil => Value::array(Vec::new()),
                ValueKind::Array(_) => value.clone(),
                ValueKind::Hash(hash) => Value::array(
                    hash.pairs()
                        .into_iter()
                        .map(|(k, v)| Value::array(vec![k, v]))
                        .collect(),
                ),
                _ => Value::array(vec![value.clone()]),
            })
        })
        .native("rand", -1, kernel_rand)
        .native("srand", -1, srand)
        .native("require", 1, |_, _, _| Ok(Value::bool(false)))
        .alias("require_relative", "require")
        .native("gets", 0, |_, _, _| Ok(Value::nil()))
        .native("caller", -1, |_, _, _| Ok(Value::array(Vec::new())))
        .native("frozen?", 0, |_, recv, _| Ok(Value::bool(recv.is_frozen())));
}

fn puts(interp: &mut Interpreter, _: &Value, args: CallArgs) -> EvalResult {
    let args = args.folded();
    if args.is_empty() {
        interp.output.println("");
    }
    for value in &args.positional {
        write_line(interp, value)?;
    }
    Ok(Value::nil())
}

/// `puts` flattens arrays and avoids doubling a trailing newline.
fn write_line(interp: &mut Interpreter, value: &Value) -> EvalResult<()> {
    if let Some(array) = value.as_array() {
        let items = array.to_vec();
        if items.is_empty() {
            interp.output.println("");
        }
        for item in &items {
            write_line(interp, item)?;
        }
        return Ok(());
    }
    let text = interp.to_s(value)?;
    if text.ends_with('\n') {
        interp.output.print(&text);
    } else {
        interp.output.println(&text);
    }
    Ok(())
}

fn p(interp: &mut Interpreter, _: &Value, args: CallArgs) -> EvalResult {
    let mut values = args.folded().positional;
    for value in &values {
        let text = interp.inspect(value)?;
        interp.output.println(&text);
    }
    Ok(match values.len() {
        0 => Value::nil(),
        1 => values.remove(0),
        _ => Value::array(values),
    })
}

fn kernel_loop(interp: &mut Interpreter, _: &Value, args: CallArgs) -> EvalResult {
    let block = block_of(&args)?;
    loop {
        match interp.call_proc(&block, CallArgs::default()) {
            Ok(_) => {}
            Err(Interrupt::Error(GarnetError::Diagnostic(diag)))
                if diag.kind == DiagnosticKind::Custom("StopIteration".into()) =>
            {
                return Ok(Value::nil());
            }
            Err(other) => return Err(other),
        }
    }
}

/// `Integer(value)`: strict parsing of strings, truncation of floats.
pub(crate) fn to_integer(interp: &Interpreter, value: &Value) -> Result<i128, Diagnostic> {
    match value.kind() {
        ValueKind::Int(_) | ValueKind::BigInt(_) => value
            .as_integer()
            .ok_or_else(|| type_error("can't convert into Integer")),
        ValueKind::Float(f) if f.is_finite() => Ok(f.trunc() as i128),
        ValueKind::Float(f) => Err(Diagnostic::new(
            DiagnosticKind::Custom("FloatDomainError".into()),
            format_float(*f),
        )),
        ValueKind::String(text) => {
            let text = text.text.borrow();
            parse_integer(text.trim()).ok_or_else(|| {
                argument_error(format!("invalid value for Integer(): {}", value.basic_inspect()))
            })
        }
        ValueKind::Nil => Err(type_error("can't convert nil into Integer")),
        _ => Err(type_error(format!(
            "can't convert {} into Integer",
            interp.class_name_of(value)
        ))),
    }
}

fn parse_integer(text: &str) -> Option<i128> {
    let cleaned = text.replace('_', "");
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let (radix, digits) = match digits.get(..2) {
        Some("0x") | Some("0X") => (16, &digits[2..]),
        Some("0b") | Some("0B") => (2, &digits[2..]),
        Some("0o") | Some("0O") => (8, &digits[2..]),
        _ => (10, digits),
    };
    if digits.is_empty() {
        return None;
    }
    let magnitude = i128::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// `Float(value)`.
pub(crate) fn to_float(interp: &Interpreter, value: &Value) -> Result<f64, Diagnostic> {
    match value.kind() {
        ValueKind::String(text) => {
            let text = text.text.borrow();
            text.trim().replace('_', "").parse::<f64>().map_err(|_| {
                argument_error(format!("invalid value for Float(): {}", value.basic_inspect()))
            })
        }
        ValueKind::Nil => Err(type_error("can't convert nil into Float")),
        _ => float_arg(interp, value),
    }
}

fn kernel_rand(interp: &mut Interpreter, _: &Value, args: CallArgs) -> EvalResult {
    let limit = args.arg(0);
    match limit.kind() {
        ValueKind::Nil => Ok(Value::float(interp.rng.gen())),
        ValueKind::Float(max) if *max == 0.0 => Ok(Value::float(interp.rng.gen())),
        ValueKind::Float(max) => Ok(Value::float(interp.rng.gen::<f64>() * max.abs())),
        ValueKind::Range(range) => {
            let low = int_arg(interp, &range.from)?;
            let high = int_arg(interp, &range.to)?;
            let picked = if range.exclusive {
                (low < high).then(|| interp.rng.gen_range(low..high))
            } else {
                (low <= high).then(|| interp.rng.gen_range(low..=high))
            };
            Ok(picked.map_or_else(Value::nil, Value::int))
        }
        _ => {
            let max = int_arg(interp, &limit)?.unsigned_abs();
            if max == 0 {
                return Ok(Value::float(interp.rng.gen()));
            }
            Ok(Value::int(interp.rng.gen_range(0..max) as i64))
        }
    }
}

/// `srand(seed = random)`: reseeds and returns the previous seed.
fn srand(interp: &mut Interpreter, _: &Value, args: CallArgs) -> EvalResult {
    let seed = match args.positional.first() {
        Some(value) => int_arg(interp, value)? as u64,
        None => interp.rng.gen(),
    };
    let previous = std::mem::replace(&mut interp.seed, seed);
    interp.rng = StdRng::seed_from_u64(seed);
    Ok(Value::integer(previous.into()))
}

/// One parsed `%` directive.
#[derive(Default)]
struct Directive {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Directive {
    fn pad(&self, body: String) -> String {
        let Some(width) = self.width else {
            return body;
        };
        let len = body.chars().count();
        if len >= width {
            return body;
        }
        let fill = width - len;
        if self.left {
            format!("{body}{}", " ".repeat(fill))
        } else if self.zero {
            let (sign, digits) = match body.strip_prefix(['-', '+']) {
                Some(rest) => (&body[..1], rest),
                None => ("", body.as_str()),
            };
            format!("{sign}{}{digits}", "0".repeat(fill))
        } else {
            format!("{}{body}", " ".repeat(fill))
        }
    }

    fn sign(&self, negative: bool, digits: String) -> String {
        if negative {
            format!("-{digits}")
        } else if self.plus {
            format!("+{digits}")
        } else if self.space {
            format!(" {digits}")
        } else {
            digits
        }
    }
}

/// `format`/`String#%`: `%d %i %u %f %e %g %s %p %x %X %o %b %c %%` with
/// flags `-+ 0`, width and precision.
pub(crate) fn format(interp: &mut Interpreter, template: &str, args: &[Value]) -> EvalResult<String> {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    let mut next = args.iter();
    let mut take = || -> Result<Value, Diagnostic> {
        next.next().cloned().ok_or_else(|| argument_error("too few arguments"))
    };
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut directive = Directive::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => directive.left = true,
                '+' => directive.plus = true,
                ' ' => directive.space = true,
                '0' => directive.zero = true,
                _ => break,
            }
            chars.next();
        }
        let mut width = String::new();
        while let Some(digit) = chars.next_if(char::is_ascii_digit) {
            width.push(digit);
        }
        directive.width = width.parse().ok();
        if chars.next_if_eq(&'.').is_some() {
            let mut precision = String::new();
            while let Some(digit) = chars.next_if(char::is_ascii_digit) {
                precision.push(digit);
            }
            directive.precision = Some(precision.parse().unwrap_or(0));
        }
        let Some(conversion) = chars.next() else {
            return Err(argument_error("incomplete format specifier; use %% (double %) instead").into());
        };
        let body = match conversion {
            '%' => {
                out.push('%');
                continue;
            }
            'd' | 'i' | 'u' => {
                let value = to_integer(interp, &take()?)?;
                directive.sign(value < 0, value.unsigned_abs().to_string())
            }
            'x' | 'X' | 'o' | 'b' | 'B' => {
                let value = to_integer(interp, &take()?)?;
                let magnitude = value.unsigned_abs();
                let digits = match conversion {
                    'x' => format!("{magnitude:x}"),
                    'X' => format!("{magnitude:X}"),
                    'o' => format!("{magnitude:o}"),
                    _ => format!("{magnitude:b}"),
                };
                directive.sign(value < 0, digits)
            }
            'f' => {
                let value = to_float(interp, &take()?)?;
                let digits = format!("{:.*}", directive.precision.unwrap_or(6), value.abs());
                directive.sign(value.is_sign_negative() && value != 0.0, digits)
            }
            'e' | 'E' => {
                let value = to_float(interp, &take()?)?;
                let digits = exponent(value.abs(), directive.precision.unwrap_or(6));
                let digits = if conversion == 'E' { digits.to_uppercase() } else { digits };
                directive.sign(value < 0.0, digits)
            }
            'g' | 'G' => {
                let value = to_float(interp, &take()?)?;
                directive.sign(value < 0.0, format_float(value.abs()))
            }
            's' => {
                let value = take()?;
                let mut text = interp.to_s(&value)?;
                if let Some(precision) = directive.precision {
                    text = text.chars().take(precision).collect();
                }
                text
            }
            'p' => {
                let value = take()?;
                interp.inspect(&value)?
            }
            'c' => {
                let value = take()?;
                match value.kind() {
                    ValueKind::String(_) => str_arg(interp, &value)?.chars().take(1).collect(),
                    _ => {
                        let code = int_arg(interp, &value)?;
                        char::from_u32(code as u32)
                            .map(String::from)
                            .ok_or_else(|| argument_error(format!("invalid character {code}")))?
                    }
                }
            }
            other => {
                return Err(argument_error(format!("malformed format string - %{other}")).into())
            }
        };
        out.push_str(&directive.pad(body));
    }
    Ok(out)
}

/// Ruby-style scientific notation: `1.500000e+02`.
fn exponent(value: f64, precision: usize) -> String {
    let text = format!("{value:.precision$e}");
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_parsing_accepts_prefixes_and_underscores() {
        assert_eq!(parse_integer("0x1f"), Some(31));
        assert_eq!(parse_integer("-1_000"), Some(-1000));
        assert_eq!(parse_integer("0b101"), Some(5));
        assert_eq!(parse_integer("12abc"), None);
        assert_eq!(parse_integer(""), None);
    }

    #[test]
    fn exponents_have_two_digits_and_a_sign() {
        assert_eq!(exponent(150.0, 2), "1.50e+02");
        assert_eq!(exponent(0.015, 1), "1.5e-02");
    }

    #[test]
    fn padding_keeps_the_sign_in_front() {
        let directive = Directive {
            zero: true,
            width: Some(5),
            ..Directive::default()
        };
        assert_eq!(directive.pad("-42".into()), "-0042");
    }
}
