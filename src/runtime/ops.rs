//! Operators, equality, ordering and string conversion.
//!
//! Integer arithmetic is checked on `i64`, promoted to `i128` on overflow
//! and to `f64` past that. Non-numeric operands dispatch to the method the
//! operator names.

use std::cmp::Ordering;

use crate::{
    ast::{BinaryOp, UnaryOp},
    diagnostics::{argument_error, type_error, Diagnostic, DiagnosticKind},
    stack::ensure_sufficient_stack,
    value::{format_float, inspect_pair, inspect_str, Value, ValueKind},
};

use super::{CallArgs, EvalResult, Interpreter};

fn zero_division() -> Diagnostic {
    Diagnostic::new(DiagnosticKind::ZeroDivision, "divided by 0")
}

fn is_container(value: &Value) -> bool {
    matches!(value.kind(), ValueKind::Array(_) | ValueKind::Hash(_))
}

fn is_float(value: &Value) -> bool {
    matches!(value.kind(), ValueKind::Float(_))
}

fn from_ordering(ordering: Ordering) -> Value {
    Value::int(match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

/// Evaluates `op` when both operands are numbers; `None` otherwise.
pub(crate) fn numeric_binary(
    op: BinaryOp,
    left: &Value,
    right: &Value,
) -> Result<Option<Value>, Diagnostic> {
    if !left.is_numeric() || !right.is_numeric() {
        return Ok(None);
    }
    if !is_float(left) && !is_float(right) {
        if let (Some(a), Some(b)) = (left.as_integer(), right.as_integer()) {
            return integer_binary(op, a, b);
        }
    }
    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Ok(None);
    };
    Ok(float_binary(op, a, b))
}

fn integer_binary(op: BinaryOp, a: i128, b: i128) -> Result<Option<Value>, Diagnostic> {
    let overflow = |result: Option<i128>, fallback: fn(f64, f64) -> f64| {
        result.map_or_else(
            || Value::float(fallback(a as f64, b as f64)),
            Value::integer,
        )
    };
    let value = match op {
        BinaryOp::Add => overflow(a.checked_add(b), |x, y| x + y),
        BinaryOp::Sub => overflow(a.checked_sub(b), |x, y| x - y),
        BinaryOp::Mul => overflow(a.checked_mul(b), |x, y| x * y),
        BinaryOp::Div => {
            if b == 0 {
                return Err(zero_division());
            }
            let mut quotient = a / b;
            if a % b != 0 && (a < 0) != (b < 0) {
                quotient -= 1;
            }
            Value::integer(quotient)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(zero_division());
            }
            let mut remainder = a % b;
            if remainder != 0 && (remainder < 0) != (b < 0) {
                remainder += b;
            }
            Value::integer(remainder)
        }
        BinaryOp::Pow => {
            if b < 0 {
                Value::float((a as f64).powf(b as f64))
            } else {
                let exact = u32::try_from(b).ok().and_then(|exp| a.checked_pow(exp));
                overflow(exact, f64::powf)
            }
        }
        BinaryOp::Equal | BinaryOp::CaseEqual => Value::bool(a == b),
        BinaryOp::NotEqual => Value::bool(a != b),
        BinaryOp::Less => Value::bool(a < b),
        BinaryOp::LessEqual => Value::bool(a <= b),
        BinaryOp::Greater => Value::bool(a > b),
        BinaryOp::GreaterEqual => Value::bool(a >= b),
        BinaryOp::Compare => from_ordering(a.cmp(&b)),
        BinaryOp::BitAnd => Value::integer(a & b),
        BinaryOp::BitOr => Value::integer(a | b),
        BinaryOp::BitXor => Value::integer(a ^ b),
        BinaryOp::ShiftLeft => shift(a, b),
        BinaryOp::ShiftRight => shift(a, -b),
        BinaryOp::Match | BinaryOp::NotMatch => return Ok(None),
    };
    Ok(Some(value))
}

fn shift(a: i128, by: i128) -> Value {
    if by < 0 {
        return Value::integer(a >> (-by).min(127));
    }
    let widened = u32::try_from(by)
        .ok()
        .and_then(|by| 2i128.checked_pow(by))
        .and_then(|factor| a.checked_mul(factor));
    match widened {
        Some(value) => Value::integer(value),
        None => Value::float(a as f64 * 2f64.powf(by as f64)),
    }
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Option<Value> {
    let value = match op {
        BinaryOp::Add => Value::float(a + b),
        BinaryOp::Sub => Value::float(a - b),
        BinaryOp::Mul => Value::float(a * b),
        BinaryOp::Div => Value::float(a / b),
        BinaryOp::Mod => Value::float(a - b * (a / b).floor()),
        BinaryOp::Pow => Value::float(a.powf(b)),
        BinaryOp::Equal | BinaryOp::CaseEqual => Value::bool(a == b),
        BinaryOp::NotEqual => Value::bool(a != b),
        BinaryOp::Less => Value::bool(a < b),
        BinaryOp::LessEqual => Value::bool(a <= b),
        BinaryOp::Greater => Value::bool(a > b),
        BinaryOp::GreaterEqual => Value::bool(a >= b),
        BinaryOp::Compare => a.partial_cmp(&b).map_or_else(Value::nil, from_ordering),
        _ => return None,
    };
    Some(value)
}

impl Interpreter {
    pub(crate) fn unary(&mut self, op: UnaryOp, value: Value) -> EvalResult {
        let result = match (op, value.kind()) {
            (UnaryOp::Negate, ValueKind::Int(n)) => match n.checked_neg() {
                Some(negated) => Value::int(negated),
                None => Value::integer(-(*n as i128)),
            },
            (UnaryOp::Negate, ValueKind::BigInt(n)) => Value::integer(-n),
            (UnaryOp::Negate, ValueKind::Float(n)) => Value::float(-n),
            (UnaryOp::Plus, _) if value.is_numeric() => value,
            (UnaryOp::BitNot, ValueKind::Int(n)) => Value::int(!n),
            (UnaryOp::BitNot, ValueKind::BigInt(n)) => Value::integer(!n),
            _ => return self.send(&value, op.method_name(), CallArgs::default()),
        };
        Ok(result)
    }

    pub(crate) fn binary(&mut self, op: BinaryOp, left: Value, right: Value) -> EvalResult {
        if let Some(result) = numeric_binary(op, &left, &right)? {
            return Ok(result);
        }
        match op {
            BinaryOp::Equal => Ok(Value::bool(self.values_equal(&left, &right)?)),
            BinaryOp::NotEqual => Ok(Value::bool(!self.values_equal(&left, &right)?)),
            BinaryOp::NotMatch => {
                let matched = self.send(&left, "=~", CallArgs::new(vec![right]))?;
                Ok(Value::bool(!matched.is_truthy()))
            }
            _ => self.send(&left, op.method_name(), CallArgs::new(vec![right])),
        }
    }

    /// Numeric operator for a numeric receiver, as the Integer and Float
    /// methods use it.
    pub(crate) fn arithmetic(&self, op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
        if let Some(result) = numeric_binary(op, left, right)? {
            return Ok(result);
        }
        let message = match op {
            BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => {
                return Err(self.comparison_failed(left, right).into());
            }
            BinaryOp::Equal | BinaryOp::CaseEqual => return Ok(Value::bool(false)),
            BinaryOp::NotEqual => return Ok(Value::bool(true)),
            BinaryOp::Compare => return Ok(Value::nil()),
            _ if right.is_nil() => format!("nil can't be coerced into {}", self.class_name_of(left)),
            _ => format!(
                "{} can't be coerced into {}",
                self.class_name_of(right),
                self.class_name_of(left)
            ),
        };
        Err(type_error(message).into())
    }

    pub(crate) fn comparison_failed(&self, left: &Value, right: &Value) -> Diagnostic {
        let right_name = match right.kind() {
            ValueKind::Nil => "nil".to_string(),
            ValueKind::Int(_) | ValueKind::BigInt(_) | ValueKind::Float(_) => right.basic_inspect(),
            _ => self.class_name_of(right),
        };
        argument_error(format!(
            "comparison of {} with {right_name} failed",
            self.class_name_of(left)
        ))
    }

    /// `==`, structural for built-in containers and dispatched for objects.
    /// A pair of containers met again while it is being compared counts as
    /// equal.
    pub(crate) fn values_equal(&mut self, left: &Value, right: &Value) -> EvalResult<bool> {
        if left.is_numeric() && right.is_numeric() {
            let equal = numeric_binary(BinaryOp::Equal, left, right)?;
            return Ok(equal.is_some_and(|value| value.is_truthy()));
        }
        if !is_container(left) || !is_container(right) {
            return self.values_equal_once(left, right);
        }
        let pair = (left.object_id(), right.object_id());
        if left.identical(right) || self.comparing.contains(&pair) {
            return Ok(true);
        }
        self.comparing.push(pair);
        let equal = ensure_sufficient_stack(|| self.values_equal_once(left, right));
        self.comparing.pop();
        equal
    }

    fn values_equal_once(&mut self, left: &Value, right: &Value) -> EvalResult<bool> {
        let equal = match (left.kind(), right.kind()) {
            (ValueKind::String(a), ValueKind::String(b)) => *a.text.borrow() == *b.text.borrow(),
            (ValueKind::Array(a), ValueKind::Array(b)) => {
                let (a, b) = (a.to_vec(), b.to_vec());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(&b) {
                    if !self.values_equal(x, y)? {
                        return Ok(false);
                    }
                }
                true
            }
            (ValueKind::Hash(a), ValueKind::Hash(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (key, value) in a.pairs() {
                    let Some(other) = b.get(&key) else {
                        return Ok(false);
                    };
                    if !self.values_equal(&value, &other)? {
                        return Ok(false);
                    }
                }
                true
            }
            (ValueKind::Range(a), ValueKind::Range(b)) => {
                a.exclusive == b.exclusive
                    && self.values_equal(&a.from, &b.from)?
                    && self.values_equal(&a.to, &b.to)?
            }
            (ValueKind::Regex(a), ValueKind::Regex(b)) => a.source == b.source && a.flags == b.flags,
            (ValueKind::MatchData(a), ValueKind::MatchData(b)) => a.groups == b.groups,
            (ValueKind::Object(_) | ValueKind::Host(_), _) => {
                let result = self.send(left, "==", CallArgs::new(vec![right.clone()]))?;
                result.is_truthy()
            }
            _ => left.identical(right),
        };
        Ok(equal)
    }

    /// `<=>`; `None` when the values are not comparable.
    pub(crate) fn compare(&mut self, left: &Value, right: &Value) -> EvalResult<Option<Ordering>> {
        if let Some(ordering) = numeric_binary(BinaryOp::Compare, left, right)? {
            return Ok(ordering.as_int().map(|n| n.cmp(&0)));
        }
        match (left.kind(), right.kind()) {
            (ValueKind::String(a), ValueKind::String(b)) => {
                return Ok(Some(a.text.borrow().as_str().cmp(b.text.borrow().as_str())))
            }
            (ValueKind::Symbol(a), ValueKind::Symbol(b)) => return Ok(Some(a.name().cmp(b.name()))),
            (ValueKind::Array(a), ValueKind::Array(b)) => {
                let pair = (left.object_id(), right.object_id());
                if left.identical(right) || self.comparing.contains(&pair) {
                    return Ok(Some(Ordering::Equal));
                }
                let (a, b) = (a.to_vec(), b.to_vec());
                self.comparing.push(pair);
                let ordering = ensure_sufficient_stack(|| self.compare_items(&a, &b));
                self.comparing.pop();
                return ordering;
            }
            (ValueKind::Nil, ValueKind::Nil) => return Ok(Some(Ordering::Equal)),
            _ => {}
        }
        if !self.responds_to(left, "<=>") {
            return Ok(None);
        }
        let result = self.send(left, "<=>", CallArgs::new(vec![right.clone()]))?;
        Ok(result.as_int().map(|n| n.cmp(&0)))
    }

    fn compare_items(&mut self, a: &[Value], b: &[Value]) -> EvalResult<Option<Ordering>> {
        for (x, y) in a.iter().zip(b) {
            match self.compare(x, y)? {
                Some(Ordering::Equal) => {}
                other => return Ok(other),
            }
        }
        Ok(Some(a.len().cmp(&b.len())))
    }

    /// `<=>` that fails with `ArgumentError` for incomparable values, as
    /// sorting does.
    pub(crate) fn compare_strict(&mut self, left: &Value, right: &Value) -> EvalResult<Ordering> {
        match self.compare(left, right)? {
            Some(ordering) => Ok(ordering),
            None => Err(self.comparison_failed(left, right).into()),
        }
    }

    /// `to_s` as string interpolation and `puts` use it.
    pub(crate) fn to_s(&mut self, value: &Value) -> EvalResult<String> {
        match value.kind() {
            ValueKind::Nil
            | ValueKind::Bool(_)
            | ValueKind::Int(_)
            | ValueKind::BigInt(_)
            | ValueKind::Float(_)
            | ValueKind::String(_)
            | ValueKind::Symbol(_) => Ok(value.to_string()),
            ValueKind::Array(_) | ValueKind::Hash(_) | ValueKind::Range(_) => self.inspect(value),
            _ => {
                let text = self.send(value, "to_s", CallArgs::default())?;
                Ok(text.as_string().unwrap_or_else(|| value.to_string()))
            }
        }
    }

    /// `inspect`, dispatching to script-defined `inspect` for objects.
    /// Containers already being rendered print as `[...]` or `{...}`.
    pub(crate) fn inspect(&mut self, value: &Value) -> EvalResult<String> {
        if !is_container(value) {
            return self.inspect_once(value);
        }
        let id = value.object_id();
        if self.rendering.contains(&id) {
            return Ok(if value.as_array().is_some() { "[...]" } else { "{...}" }.into());
        }
        self.rendering.push(id);
        let text = ensure_sufficient_stack(|| self.inspect_once(value));
        self.rendering.pop();
        text
    }

    fn inspect_once(&mut self, value: &Value) -> EvalResult<String> {
        match value.kind() {
            ValueKind::String(text) => Ok(inspect_str(&text.text.borrow())),
            ValueKind::Float(n) => Ok(format_float(*n)),
            ValueKind::Array(array) => {
                let mut items = Vec::with_capacity(array.len());
                for item in array.to_vec() {
                    items.push(self.inspect(&item)?);
                }
                Ok(format!("[{}]", items.join(", ")))
            }
            ValueKind::Hash(hash) => {
                if hash.is_empty() {
                    return Ok("{}".into());
                }
                let mut entries = Vec::with_capacity(hash.len());
                for (key, item) in hash.pairs() {
                    let item = self.inspect(&item)?;
                    let entry = match key.as_symbol() {
                        Some(_) => inspect_pair(&key, &item),
                        None => format!("{} => {item}", self.inspect(&key)?),
                    };
                    entries.push(entry);
                }
                Ok(format!("{{{}}}", entries.join(", ")))
            }
            ValueKind::Range(range) => {
                let dots = if range.exclusive { "..." } else { ".." };
                Ok(format!(
                    "{}{dots}{}",
                    self.inspect(&range.from)?,
                    self.inspect(&range.to)?
                ))
            }
            ValueKind::Object(_) | ValueKind::Host(_) | ValueKind::MatchData(_) => {
                let text = self.send(value, "inspect", CallArgs::default())?;
                Ok(text.as_string().unwrap_or_else(|| value.basic_inspect()))
            }
            ValueKind::Nil => Ok("nil".into()),
            _ => Ok(value.basic_inspect()),
        }
    }

    /// `#<Point @x=1, @y=2>`
    pub(crate) fn default_inspect(&mut self, value: &Value) -> EvalResult<String> {
        let class_name = self.class_name_of(value);
        let ivars = match value.as_object() {
            Some(object) => object.ivars.borrow().clone(),
            None => return Ok(format!("#<{class_name}>")),
        };
        if ivars.is_empty() {
            return Ok(format!("#<{class_name}>"));
        }
        let id = value.object_id();
        if self.rendering.contains(&id) {
            return Ok(format!("#<{class_name} ...>"));
        }
        self.rendering.push(id);
        let mut fields = Vec::with_capacity(ivars.len());
        for (name, item) in &ivars {
            match self.inspect(item) {
                Ok(text) => fields.push(format!("{name}={text}")),
                Err(err) => {
                    self.rendering.pop();
                    return Err(err);
                }
            }
        }
        self.rendering.pop();
        Ok(format!("#<{class_name} {}>", fields.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: Option<Value>) -> Option<i128> {
        value.and_then(|v| v.as_integer())
    }

    #[test]
    fn integer_division_floors() {
        let result = numeric_binary(BinaryOp::Div, &Value::int(-7), &Value::int(2)).unwrap();
        assert_eq!(int(result), Some(-4));
        let result = numeric_binary(BinaryOp::Mod, &Value::int(-7), &Value::int(2)).unwrap();
        assert_eq!(int(result), Some(1));
    }

    #[test]
    fn overflow_promotes_to_wide_integers() {
        let result = numeric_binary(BinaryOp::Add, &Value::int(i64::MAX), &Value::int(1)).unwrap();
        assert_eq!(int(result), Some(i64::MAX as i128 + 1));
    }

    #[test]
    fn wide_overflow_falls_back_to_float() {
        let big = Value::integer(i128::MAX);
        let result = numeric_binary(BinaryOp::Mul, &big, &Value::int(4)).unwrap().unwrap();
        assert!(matches!(result.kind(), ValueKind::Float(_)));
    }

    #[test]
    fn division_by_zero_fails() {
        let err = numeric_binary(BinaryOp::Div, &Value::int(1), &Value::int(0)).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::ZeroDivision);
    }

    #[test]
    fn negative_powers_are_floats() {
        let result = numeric_binary(BinaryOp::Pow, &Value::int(2), &Value::int(-1))
            .unwrap()
            .unwrap();
        assert_eq!(result.as_number(), Some(0.5));
    }

    #[test]
    fn non_numbers_are_left_to_dispatch() {
        let result = numeric_binary(BinaryOp::Add, &Value::string("a"), &Value::int(1)).unwrap();
        assert!(result.is_none());
    }
}
