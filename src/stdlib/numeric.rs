//! `Integer`, `Float` and `Math`.

use crate::{
    ast::BinaryOp,
    diagnostics::{argument_error, Diagnostic, DiagnosticKind},
    runtime::{CallArgs, EvalResult, Interpreter},
    value::{format_float, Value, ValueKind},
};

use super::{float_arg, int_arg, yield1, StdlibRegistry};

const OPERATORS: &[(&str, BinaryOp)] = &[
    ("+", BinaryOp::Add),
    ("-", BinaryOp::Sub),
    ("*", BinaryOp::Mul),
    ("/", BinaryOp::Div),
    ("%", BinaryOp::Mod),
    ("**", BinaryOp::Pow),
    ("==", BinaryOp::Equal),
    ("===", BinaryOp::CaseEqual),
    ("!=", BinaryOp::NotEqual),
    ("<", BinaryOp::Less),
    ("<=", BinaryOp::LessEqual),
    (">", BinaryOp::Greater),
    (">=", BinaryOp::GreaterEqual),
    ("<=>", BinaryOp::Compare),
];

const BIT_OPERATORS: &[(&str, BinaryOp)] = &[
    ("&", BinaryOp::BitAnd),
    ("|", BinaryOp::BitOr),
    ("^", BinaryOp::BitXor),
    ("<<", BinaryOp::ShiftLeft),
    (">>", BinaryOp::ShiftRight),
];

fn float_domain(value: f64) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::Custom("FloatDomainError".into()),
        format_float(value),
    )
}

fn integer_of(value: &Value) -> i128 {
    value.as_integer().unwrap_or_default()
}

fn number_of(value: &Value) -> f64 {
    value.as_number().unwrap_or_default()
}

/// Float to Integer, rejecting NaN and infinities.
fn to_integer_value(value: f64) -> EvalResult {
    if !value.is_finite() {
        return Err(float_domain(value).into());
    }
    Ok(Value::integer(value as i128))
}

/// `digits`-aware rounding shared by `round`, `floor` and `ceil`.
fn round_float(value: f64, digits: i64, op: fn(f64) -> f64) -> EvalResult {
    let exponent = i32::try_from(digits.unsigned_abs()).unwrap_or(i32::MAX);
    let factor = 10f64.powi(exponent);
    if digits > 0 {
        let scaled = value * factor;
        // From 2^53 up a float has no fractional digits left.
        if !scaled.is_finite() || scaled.abs() >= 9_007_199_254_740_992.0 {
            return Ok(Value::float(value));
        }
        return Ok(Value::float(op(scaled) / factor));
    }
    if value.is_finite() && !factor.is_finite() {
        return Ok(Value::int(0));
    }
    let rounded = op(value / factor) * factor;
    to_integer_value(rounded)
}

fn round_integer(value: i128, digits: i64, op: fn(f64) -> f64) -> Value {
    if digits >= 0 {
        return Value::integer(value);
    }
    let factor = 10i128.pow((-digits).min(38) as u32);
    let scaled = op(value as f64 / factor as f64) as i128;
    Value::integer(scaled * factor)
}

fn digits_arg(interp: &Interpreter, args: &CallArgs) -> Result<i64, Diagnostic> {
    match args.positional.first() {
        Some(value) => int_arg(interp, value),
        None => Ok(0),
    }
}

/// Base-`radix` text of an integer, as `Integer#to_s(base)` prints it.
pub(crate) fn radix_string(value: i128, radix: u32) -> String {
    if value == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    let mut magnitude = value.unsigned_abs();
    while magnitude > 0 {
        let digit = (magnitude % radix as u128) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('?'));
        magnitude /= radix as u128;
    }
    if value < 0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs()
}

/// Numbers from `from` towards `to` by `step`, for `step`, `upto` and
/// `downto`.
fn stepped(from: &Value, to: &Value, step: &Value) -> Result<Vec<Value>, Diagnostic> {
    if step.as_number() == Some(0.0) {
        return Err(argument_error("step can't be 0"));
    }
    let floats = [from, to, step]
        .iter()
        .any(|v| matches!(v.kind(), ValueKind::Float(_)));
    let mut out = Vec::new();
    if floats {
        let (a, b, s) = (number_of(from), number_of(to), number_of(step));
        let n = ((b - a) / s + 1e-9).floor();
        if n >= 0.0 {
            for i in 0..=(n as i64) {
                out.push(Value::float(a + i as f64 * s));
            }
        }
    } else {
        let (mut current, limit, s) = (integer_of(from), integer_of(to), integer_of(step));
        while (s > 0 && current <= limit) || (s < 0 && current >= limit) {
            out.push(Value::integer(current));
            current += s;
        }
    }
    Ok(out)
}

/// Yields each value when a block is given, else returns them as an array.
fn each_or_array(interp: &mut Interpreter, recv: &Value, args: &CallArgs, values: Vec<Value>) -> EvalResult {
    match &args.block {
        Some(block) => {
            for value in values {
                yield1(interp, block, value)?;
            }
            Ok(recv.clone())
        }
        None => Ok(Value::array(values)),
    }
}

pub(super) fn install(registry: &mut StdlibRegistry) {
    for type_name in ["Integer", "Float"] {
        let table = registry.table(type_name);
        for &(name, op) in OPERATORS {
            table.native(name, 1, move |interp, recv, args| {
                interp.arithmetic(op, recv, &args.arg(0))
            });
        }
        table
            .native("-@", 0, |interp, recv, _| interp.arithmetic(BinaryOp::Sub, &Value::int(0), recv))
            .native("+@", 0, |_, recv, _| Ok(recv.clone()))
            .native("coerce", 1, |interp, recv, args| {
                let other = args.arg(0);
                if !other.is_numeric() {
                    return Err(crate::diagnostics::type_error(format!(
                        "{} can't be coerced into {}",
                        interp.class_name_of(&other),
                        interp.class_name_of(recv)
                    ))
                    .into());
                }
                Ok(Value::array(vec![other, recv.clone()]))
            })
            .native("eql?", 1, |interp, recv, args| {
                let other = args.arg(0);
                let same_class = std::rc::Rc::ptr_eq(&interp.class_of(recv), &interp.class_of(&other));
                Ok(Value::bool(same_class && interp.values_equal(recv, &other)?))
            })
            .native("zero?", 0, |_, recv, _| Ok(Value::bool(number_of(recv) == 0.0)))
            .native("positive?", 0, |_, recv, _| Ok(Value::bool(number_of(recv) > 0.0)))
            .native("negative?", 0, |_, recv, _| Ok(Value::bool(number_of(recv) < 0.0)))
            .native("nonzero?", 0, |_, recv, _| {
                Ok(if number_of(recv) == 0.0 { Value::nil() } else { recv.clone() })
            })
            .native("to_f", 0, |_, recv, _| Ok(Value::float(number_of(recv))))
            .native("fdiv", 1, |interp, recv, args| {
                Ok(Value::float(number_of(recv) / float_arg(interp, &args.arg(0))?))
            })
            .native("div", 1, |interp, recv, args| {
                let quotient = interp.arithmetic(BinaryOp::Div, recv, &args.arg(0))?;
                match quotient.kind() {
                    ValueKind::Float(f) => to_integer_value(f.floor()),
                    _ => Ok(quotient),
                }
            })
            .native("modulo", 1, |interp, recv, args| interp.arithmetic(BinaryOp::Mod, recv, &args.arg(0)))
            .native("remainder", 1, |interp, recv, args| {
                let other = args.arg(0);
                let modulo = interp.arithmetic(BinaryOp::Mod, recv, &other)?;
                let m = number_of(&modulo);
                if m != 0.0 && (number_of(recv) < 0.0) != (number_of(&other) < 0.0) {
                    return interp.arithmetic(BinaryOp::Sub, &modulo, &other);
                }
                Ok(modulo)
            })
            .native("divmod", 1, |interp, recv, args| {
                let other = args.arg(0);
                let quotient = interp.arithmetic(BinaryOp::Div, recv, &other)?;
                let quotient = match quotient.kind() {
                    ValueKind::Float(f) => Value::float(f.floor()),
                    _ => quotient,
                };
                let modulo = interp.arithmetic(BinaryOp::Mod, recv, &other)?;
                Ok(Value::array(vec![quotient, modulo]))
            })
            .native("abs", 0, |interp, recv, _| {
                if number_of(recv) < 0.0 {
                    interp.arithmetic(BinaryOp::Sub, &Value::int(0), recv)
                } else {
                    Ok(recv.clone())
                }
            })
            .alias("magnitude", "abs")
            .native("step", -2, |interp, recv, args| {
                let step = args.positional.get(1).cloned().unwrap_or_else(|| Value::int(1));
                let values = stepped(recv, &args.arg(0), &step)?;
                each_or_array(interp, recv, &args, values)
            })
            .native("clamp", -2, |interp, recv, args| {
                let (low, high) = match args.arg(0).kind() {
                    ValueKind::Range(range) => (range.from.clone(), range.to.clone()),
                    _ => (args.arg(0), args.arg(1)),
                };
                if interp.compare_strict(recv, &low)?.is_lt() {
                    return Ok(low);
                }
                if interp.compare_strict(recv, &high)?.is_gt() {
                    return Ok(high);
                }
                Ok(recv.clone())
            })
            .native("between?", 2, |interp, recv, args| {
                let above = interp.compare_strict(recv, &args.arg(0))?.is_ge();
                let below = interp.compare_strict(recv, &args.arg(1))?.is_le();
                Ok(Value::bool(above && below))
            })
            .native("hash", 0, |_, recv, _| Ok(Value::int(super::object::hash_of(recv))));
    }

    let integer = registry.table("Integer");
    for &(name, op) in BIT_OPERATORS {
        integer.native(name, 1, move |interp, recv, args| {
            let other = args.arg(0);
            if matches!(other.kind(), ValueKind::Float(_)) {
                return Err(crate::diagnostics::type_error("Float can't be coerced into Integer").into());
            }
            interp.arithmetic(op, recv, &other)
        });
    }
    integer
        .native("~", 0, |_, recv, _| Ok(Value::integer(!integer_of(recv))))
        .native("to_s", -1, |interp, recv, args| {
            let radix = match args.positional.first() {
                Some(base) => int_arg(interp, base)?,
                None => 10,
            };
            if !(2..=36).contains(&radix) {
                return Err(argument_error(format!("invalid radix {radix}")).into());
            }
            Ok(Value::string(radix_string(integer_of(recv), radix as u32)))
        })
        .alias("inspect", "to_s")
        .native("to_i", 0, |_, recv, _| Ok(recv.clone()))
        .alias("to_int", "to_i")
        .native("integer?", 0, |_, _, _| Ok(Value::bool(true)))
        .native("finite?", 0, |_, _, _| Ok(Value::bool(true)))
        .native("infinite?", 0, |_, _, _| Ok(Value::nil()))
        .native("even?", 0, |_, recv, _| Ok(Value::bool(integer_of(recv) % 2 == 0)))
        .native("odd?", 0, |_, recv, _| Ok(Value::bool(integer_of(recv) % 2 != 0)))
        .native("succ", 0, |interp, recv, _| interp.arithmetic(BinaryOp::Add, recv, &Value::int(1)))
        .alias("next", "succ")
        .native("pred", 0, |interp, recv, _| interp.arithmetic(BinaryOp::Sub, recv, &Value::int(1)))
        .native("chr", 0, |_, recv, _| {
            let code = integer_of(recv);
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::string(c.to_string()))
                .ok_or_else(|| {
                    Diagnostic::new(DiagnosticKind::Custom("RangeError".into()), format!("{code} out of char range"))
                        .into()
                })
        })
        .native("ord", 0, |_, recv, _| Ok(recv.clone()))
        .native("times", 0, |interp, recv, args| {
            let count = integer_of(recv);
            match &args.block {
                Some(block) => {
                    let mut i = 0;
                    while i < count {
                        yield1(interp, block, Value::integer(i))?;
                        i += 1;
                    }
                    Ok(recv.clone())
                }
                None => Ok(Value::array((0..count.max(0)).map(Value::integer).collect())),
            }
        })
        .native("upto", 1, |interp, recv, args| {
            let values = stepped(recv, &args.arg(0), &Value::int(1))?;
            each_or_array(interp, recv, &args, values)
        })
        .native("downto", 1, |interp, recv, args| {
            let values = stepped(recv, &args.arg(0), &Value::int(-1))?;
            each_or_array(interp, recv, &args, values)
        })
        .native("floor", -1, |interp, recv, args| {
            Ok(round_integer(integer_of(recv), digits_arg(interp, &args)?, f64::floor))
        })
        .native("ceil", -1, |interp, recv, args| {
            Ok(round_integer(integer_of(recv), digits_arg(interp, &args)?, f64::ceil))
        })
        .native("round", -1, |interp, recv, args| {
            Ok(round_integer(integer_of(recv), digits_arg(interp, &args)?, f64::round))
        })
        .native("truncate", -1, |interp, recv, args| {
            Ok(round_integer(integer_of(recv), digits_arg(interp, &args)?, f64::trunc))
        })
        .native("pow", -2, |interp, recv, args| {
            let Some(modulus) = args.positional.get(1) else {
                return interp.arithmetic(BinaryOp::Pow, recv, &args.arg(0));
            };
            let (mut base, mut exp, modulus) = (
                integer_of(recv),
                int_arg(interp, &args.arg(0))? as i128,
                int_arg(interp, modulus)? as i128,
            );
            if modulus == 0 {
                return Err(Diagnostic::new(DiagnosticKind::ZeroDivision, "divided by 0").into());
            }
            let mut result = 1i128;
            base = base.rem_euclid(modulus);
            while exp > 0 {
                if exp & 1 == 1 {
                    result = result * base % modulus;
                }
                base = base * base % modulus;
                exp >>= 1;
            }
            Ok(Value::integer(result.rem_euclid(modulus)))
        })
        .native("gcd", 1, |interp, recv, args| {
            let other = int_arg(interp, &args.arg(0))? as i128;
            Ok(Value::integer(gcd(integer_of(recv), other)))
        })
        .native("lcm", 1, |interp, recv, args| {
            let (a, b) = (integer_of(recv), int_arg(interp, &args.arg(0))? as i128);
            if a == 0 || b == 0 {
                return Ok(Value::int(0));
            }
            Ok(Value::integer((a / gcd(a, b) * b).abs()))
        })
        .native("digits", -1, |interp, recv, args| {
            let base = match args.positional.first() {
                Some(base) => int_arg(interp, base)? as i128,
                None => 10,
            };
            let mut n = integer_of(recv);
            if n < 0 {
                return Err(Diagnostic::new(DiagnosticKind::Custom("Math::DomainError".into()), "out of domain").into());
            }
            if base < 2 {
                return Err(argument_error(format!("invalid radix {base}")).into());
            }
            let mut digits = vec![Value::integer(n % base)];
            n /= base;
            while n > 0 {
                digits.push(Value::integer(n % base));
                n /= base;
            }
            Ok(Value::array(digits))
        })
        .native("bit_length", 0, |_, recv, _| {
            let n = integer_of(recv);
            let bits = if n < 0 { 128 - (!n).leading_zeros() } else { 128 - n.leading_zeros() };
            Ok(Value::int(bits as i64))
        })
        .native("[]", 1, |interp, recv, args| {
            let bit = int_arg(interp, &args.arg(0))?;
            Ok(Value::int(((integer_of(recv) >> bit.clamp(0, 127)) & 1) as i64))
        });

    registry
        .singleton_table("Integer")
        .native("sqrt", 1, |interp, _, args| {
            let n = int_arg(interp, &args.arg(0))?;
            if n < 0 {
                return Err(Diagnostic::new(
                    DiagnosticKind::Custom("Math::DomainError".into()),
                    "Numerical argument is out of domain - \"isqrt\"",
                )
                .into());
            }
            Ok(Value::int((n as f64).sqrt().floor() as i64))
        });

    registry
        .table("Float")
        .native("to_s", 0, |_, recv, _| Ok(Value::string(format_float(number_of(recv)))))
        .alias("inspect", "to_s")
        .native("to_i", 0, |_, recv, _| to_integer_value(number_of(recv).trunc()))
        .alias("to_int", "to_i")
        .native("integer?", 0, |_, _, _| Ok(Value::bool(false)))
        .native("nan?", 0, |_, recv, _| Ok(Value::bool(number_of(recv).is_nan())))
        .native("finite?", 0, |_, recv, _| Ok(Value::bool(number_of(recv).is_finite())))
        .native("infinite?", 0, |_, recv, _| {
            let value = number_of(recv);
            Ok(if value.is_infinite() {
                Value::int(if value > 0.0 { 1 } else { -1 })
            } else {
                Value::nil()
            })
        })
        .native("floor", -1, |interp, recv, args| {
            round_float(number_of(recv), digits_arg(interp, &args)?, f64::floor)
        })
        .native("ceil", -1, |interp, recv, args| {
            round_float(number_of(recv), digits_arg(interp, &args)?, f64::ceil)
        })
        .native("round", -1, |interp, recv, args| {
            round_float(number_of(recv), digits_arg(interp, &args)?, f64::round)
        })
        .native("truncate", -1, |interp, recv, args| {
            round_float(number_of(recv), digits_arg(interp, &args)?, f64::trunc)
        });

    registry
        .singleton_table("Math")
        .native("sqrt", 1, |interp, _, args| {
            let value = float_arg(interp, &args.arg(0))?;
            if value < 0.0 {
                return Err(Diagnostic::new(
                    DiagnosticKind::Custom("Math::DomainError".into()),
                    "Numerical argument is out of domain - \"sqrt\"",
                )
                .into());
            }
            Ok(Value::float(value.sqrt()))
        })
        .native("cbrt", 1, |interp, _, args| unary_math(interp, &args, f64::cbrt))
        .native("sin", 1, |interp, _, args| unary_math(interp, &args, f64::sin))
        .native("cos", 1, |interp, _, args| unary_math(interp, &args, f64::cos))
        .native("tan", 1, |interp, _, args| unary_math(interp, &args, f64::tan))
        .native("asin", 1, |interp, _, args| unary_math(interp, &args, f64::asin))
        .native("acos", 1, |interp, _, args| unary_math(interp, &args, f64::acos))
        .native("atan", 1, |interp, _, args| unary_math(interp, &args, f64::atan))
        .native("exp", 1, |interp, _, args| unary_math(interp, &args, f64::exp))
        .native("log2", 1, |interp, _, args| unary_math(interp, &args, f64::log2))
        .native("log10", 1, |interp, _, args| unary_math(interp, &args, f64::log10))
        .native("log", -2, |interp, _, args| {
            let value = float_arg(interp, &args.arg(0))?;
            Ok(Value::float(match args.positional.get(1) {
                Some(base) => value.ln() / float_arg(interp, base)?.ln(),
                None => value.ln(),
            }))
        })
        .native("atan2", 2, |interp, _, args| {
            let (y, x) = (float_arg(interp, &args.arg(0))?, float_arg(interp, &args.arg(1))?);
            Ok(Value::float(y.atan2(x)))
        })
        .native("hypot", 2, |interp, _, args| {
            let (a, b) = (float_arg(interp, &args.arg(0))?, float_arg(interp, &args.arg(1))?);
            Ok(Value::float(a.hypot(b)))
        })
        .native("pow", 2, |interp, _, args| {
            let (a, b) = (float_arg(interp, &args.arg(0))?, float_arg(interp, &args.arg(1))?);
            Ok(Value::float(a.powf(b)))
        });
}

fn unary_math(interp: &mut Interpreter, args: &CallArgs, op: fn(f64) -> f64) -> EvalResult {
    Ok(Value::float(op(float_arg(interp, &args.arg(0))?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_strings_handle_sign_and_base() {
        assert_eq!(radix_string(255, 16), "ff");
        assert_eq!(radix_string(-5, 2), "-101");
        assert_eq!(radix_string(0, 8), "0");
    }

    #[test]
    fn steps_stop_at_the_limit() {
        let values = stepped(&Value::int(1), &Value::int(10), &Value::int(4)).unwrap();
        let ints: Vec<i64> = values.iter().filter_map(Value::as_int).collect();
        assert_eq!(ints, vec![1, 5, 9]);
    }

    #[test]
    fn zero_step_is_rejected() {
        assert!(stepped(&Value::int(1), &Value::int(2), &Value::int(0)).is_err());
    }

    #[test]
    fn gcd_ignores_signs() {
        assert_eq!(gcd(-12, 18), 6);
    }
}
