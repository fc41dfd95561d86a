//! Numeric ranges.
//!
//! Bounds are coerced by trying `i64`, then `i128`, then `f64`. Anything
//! else is a `TypeError`. Enumeration only ever ascends.

use crate::{
    diagnostics::{type_error, Diagnostic},
    value::{Value, ValueKind},
};

/// Tolerance at the upper bound of float ranges.
const FLOAT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bounds {
    Int(i64, i64),
    Wide(i128, i128),
    Float(f64, f64),
}

fn not_numeric() -> Diagnostic {
    type_error("range must be numeric")
}

impl Bounds {
    pub fn coerce(from: &Value, to: &Value) -> Result<Self, Diagnostic> {
        if let (ValueKind::Int(a), ValueKind::Int(b)) = (from.kind(), to.kind()) {
            return Ok(Bounds::Int(*a, *b));
        }
        if let (Some(a), Some(b)) = (from.as_integer(), to.as_integer()) {
            return Ok(Bounds::Wide(a, b));
        }
        if from.is_numeric() && to.is_numeric() {
            if let (Some(a), Some(b)) = (from.as_number(), to.as_number()) {
                return Ok(Bounds::Float(a, b));
            }
        }
        Err(not_numeric())
    }
}

/// Materialises the members of a range, in ascending order.
pub fn to_vec(from: &Value, to: &Value, exclusive: bool) -> Result<Vec<Value>, Diagnostic> {
    let bounds = Bounds::coerce(from, to)?;
    let values = match bounds {
        Bounds::Int(a, b) => {
            let end = if exclusive { b } else { b.saturating_add(1) };
            if a >= end {
                Vec::new()
            } else {
                (a..end).map(Value::int).collect()
            }
        }
        Bounds::Wide(a, b) => {
            let end = if exclusive { b } else { b.saturating_add(1) };
            let mut out = Vec::new();
            let mut current = a;
            while current < end {
                out.push(Value::integer(current));
                current += 1;
            }
            out
        }
        Bounds::Float(a, b) => {
            let mut out = Vec::new();
            let mut current = a;
            while !float_past_end(current, b, exclusive) {
                out.push(Value::float(current));
                current += 1.0;
            }
            out
        }
    };
    Ok(values)
}

/// Whether `current` has stepped beyond the upper bound `b` of a float range.
pub fn float_past_end(current: f64, b: f64, exclusive: bool) -> bool {
    let past = if exclusive {
        current >= b - FLOAT_EPSILON
    } else {
        current > b + FLOAT_EPSILON
    };
    past || !current.is_finite()
}

/// Number of members without materialising them, saturating at `i128::MAX`.
pub fn count(from: &Value, to: &Value, exclusive: bool) -> Result<i128, Diagnostic> {
    match Bounds::coerce(from, to)? {
        Bounds::Int(a, b) => Ok(span(a as i128, b as i128, exclusive)),
        Bounds::Wide(a, b) => Ok(span(a, b, exclusive)),
        Bounds::Float(a, b) => {
            let mut members = 0;
            let mut current = a;
            while !float_past_end(current, b, exclusive) {
                members += 1;
                current += 1.0;
            }
            Ok(members)
        }
    }
}

/// [`count`] as a `usize`, saturating.
pub fn len(from: &Value, to: &Value, exclusive: bool) -> Result<usize, Diagnostic> {
    Ok(usize::try_from(count(from, to, exclusive)?).unwrap_or(usize::MAX))
}

fn span(a: i128, b: i128, exclusive: bool) -> i128 {
    let end = if exclusive { b } else { b.saturating_add(1) };
    end.saturating_sub(a).max(0)
}

/// Membership by comparison with the bounds; `x` need not be a member of
/// the enumeration.
pub fn includes(from: &Value, to: &Value, exclusive: bool, x: &Value) -> Result<bool, Diagnostic> {
    Bounds::coerce(from, to)?;
    let (Some(a), Some(b)) = (from.as_number(), to.as_number()) else {
        return Err(not_numeric());
    };
    let Some(x) = x.as_number().filter(|_| x.is_numeric()) else {
        return Ok(false);
    };
    if let (Some(ai), Some(bi), Some(xi)) = (from.as_integer(), to.as_integer(), as_exact(x)) {
        return Ok(ai <= xi && if exclusive { xi < bi } else { xi <= bi });
    }
    Ok(a <= x && if exclusive { x < b } else { x <= b })
}

fn as_exact(x: f64) -> Option<i128> {
    (x.fract() == 0.0 && x.abs() < 1e30).then_some(x as i128)
}

/// Sum of an integer range in constant time.
pub fn sum(from: &Value, to: &Value, exclusive: bool) -> Result<Value, Diagnostic> {
    match Bounds::coerce(from, to)? {
        Bounds::Int(a, b) => Ok(integer_sum(a as i128, b as i128, exclusive)),
        Bounds::Wide(a, b) => Ok(integer_sum(a, b, exclusive)),
        Bounds::Float(..) => {
            let total = to_vec(from, to, exclusive)?
                .iter()
                .filter_map(Value::as_number)
                .sum();
            Ok(Value::float(total))
        }
    }
}

fn integer_sum(a: i128, b: i128, exclusive: bool) -> Value {
    let b = if exclusive {
        match b.checked_sub(1) {
            Some(b) => b,
            None => return Value::int(0),
        }
    } else {
        b
    };
    if b < a {
        return Value::int(0);
    }
    let count = b.checked_sub(a).and_then(|span| span.checked_add(1));
    match (a.checked_add(b), count) {
        (Some(ends), Some(count)) => match ends.checked_mul(count) {
            Some(doubled) => Value::integer(doubled / 2),
            None => Value::float(ends as f64 * count as f64 / 2.0),
        },
        _ => Value::float((a as f64 + b as f64) * (b as f64 - a as f64 + 1.0) / 2.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[Value]) -> Vec<i64> {
        values.iter().filter_map(Value::as_int).collect()
    }

    #[test]
    fn descending_ranges_are_empty() {
        let values = to_vec(&Value::int(5), &Value::int(4), false).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn inclusive_and_exclusive_ends() {
        let inclusive = to_vec(&Value::int(1), &Value::int(5), false).unwrap();
        assert_eq!(ints(&inclusive), [1, 2, 3, 4, 5]);
        let exclusive = to_vec(&Value::int(1), &Value::int(5), true).unwrap();
        assert_eq!(ints(&exclusive), [1, 2, 3, 4]);
    }

    #[test]
    fn float_ranges_absorb_rounding() {
        let values = to_vec(&Value::float(0.1), &Value::float(2.1000000000001), false).unwrap();
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn non_numeric_bounds_are_rejected() {
        let err = to_vec(&Value::string("a"), &Value::string("c"), false).unwrap_err();
        assert_eq!(err.message, "range must be numeric");
    }

    #[test]
    fn membership_uses_bounds() {
        let (a, b) = (Value::int(1), Value::int(10));
        assert!(includes(&a, &b, false, &Value::int(1)).unwrap());
        assert!(includes(&a, &b, false, &Value::int(10)).unwrap());
        assert!(!includes(&a, &b, false, &Value::int(15)).unwrap());
        assert!(includes(&a, &b, false, &Value::float(2.5)).unwrap());
        assert!(!includes(&a, &b, true, &Value::int(10)).unwrap());
    }

    #[test]
    fn sums_in_constant_time() {
        let total = sum(&Value::int(1), &Value::int(100), false).unwrap();
        assert_eq!(total.as_int(), Some(5050));
    }

    #[test]
    fn wide_sums_fall_back_to_floats() {
        let a = 1i128 << 126;
        let total = sum(&Value::integer(a), &Value::integer(a + 10), false).unwrap();
        assert!(matches!(total.kind(), ValueKind::Float(_)));
        let top = sum(&Value::integer(i128::MAX - 1), &Value::integer(i128::MAX), true).unwrap();
        assert_eq!(top.as_number(), Some((i128::MAX - 1) as f64));
    }

    #[test]
    fn wide_lengths_saturate() {
        let n = count(&Value::int(0), &Value::integer(i128::MAX), false).unwrap();
        assert_eq!(n, i128::MAX);
        let m = len(&Value::integer(i128::MIN), &Value::integer(i128::MAX), true).unwrap();
        assert_eq!(m, usize::MAX);
        assert_eq!(count(&Value::float(0.5), &Value::float(2.5), true).unwrap(), 2);
    }
}
