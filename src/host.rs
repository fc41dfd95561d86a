//! Host interop: functions injected by the embedding application and
//! host-defined types such as `System.DateTime`.
//!
//! Host types are classes whose methods live in the native registry under
//! the type's full dotted name; their instances are [`Value::host`] payloads.
//! Scripts reach them through scoped constants (`System::DateTime`), which
//! consult the [`SecurityPolicy`](crate::security::SecurityPolicy) first.

use std::rc::Rc;

use chrono::{
    DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Timelike, Utc,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    diagnostics::{argument_error, type_error, Diagnostic, Result},
    object::{ensure_meta, ClassRef, DynamicClass},
    runtime::{CallArgs, EvalResult, Interpreter},
    stdlib::{float_arg, int_arg, singleton_key, str_arg},
    value::{NativeFunction, Value},
};

type HostCallback = Rc<dyn Fn(&[Value]) -> Result<Value>>;

/// A host callable registered under one or more method names on `Object`.
///
/// Injecting it whitelists `declaring_type`, since the host opted it in.
#[derive(Clone)]
pub struct HostFunction {
    declaring_type: String,
    names: Vec<String>,
    arity: i32,
    callback: HostCallback,
}

impl HostFunction {
    pub fn new(
        declaring_type: impl Into<String>,
        arity: i32,
        callback: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            names: Vec::new(),
            arity,
            callback: Rc::new(callback),
        }
    }

    /// Adds a registration name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Definition of a host type: instance methods, class-level methods and
/// constants, registered under a dotted full name.
pub struct HostType {
    full_name: String,
    methods: Vec<NativeFunction>,
    statics: Vec<NativeFunction>,
    constants: Vec<(String, Value)>,
}

impl HostType {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            methods: Vec::new(),
            statics: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn method(
        mut self,
        name: &str,
        arity: i32,
        callback: impl Fn(&mut Interpreter, &Value, CallArgs) -> EvalResult + 'static,
    ) -> Self {
        self.methods.push(NativeFunction::new(name, arity, callback));
        self
    }

    pub fn static_method(
        mut self,
        name: &str,
        arity: i32,
        callback: impl Fn(&mut Interpreter, &Value, CallArgs) -> EvalResult + 'static,
    ) -> Self {
        self.statics.push(NativeFunction::new(name, arity, callback));
        self
    }

    pub fn constant(mut self, name: &str, value: Value) -> Self {
        self.constants.push((name.to_string(), value));
        self
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

impl Interpreter {
    /// Registers every name of a host function and whitelists its
    /// declaring type.
    pub fn inject(&mut self, function: HostFunction) -> Result<()> {
        if function.names.is_empty() {
            return Err(argument_error(format!(
                "host function of {} declares no registration names",
                function.declaring_type
            ))
            .into());
        }
        self.policy().allow_type(function.declaring_type.clone());
        debug!(declaring_type = %function.declaring_type, names = ?function.names, "host function injected");
        for name in &function.names {
            let callback = function.callback.clone();
            self.register_function(name, function.arity, move |args| callback(args));
        }
        Ok(())
    }

    /// Makes a host type resolvable from scripts (subject to the policy).
    pub fn register_host_type(&mut self, host: HostType) -> ClassRef {
        let HostType {
            full_name,
            methods,
            statics,
            constants,
        } = host;
        let class = DynamicClass::new_class(&full_name.replace('.', "::"), Some(self.classes.object.clone()));
        class.borrow_mut().native_name = Some(full_name.clone());
        ensure_meta(&class);
        for (name, value) in constants {
            class.borrow_mut().constants.insert(name, value);
        }
        let table = self.natives.table(&full_name);
        for function in methods {
            table.insert(function);
        }
        let table = self.natives.table(&singleton_key(&full_name));
        for function in statics {
            table.insert(function);
        }
        debug!(%full_name, "host type registered");
        self.host_types.insert(full_name, class.clone());
        class
    }
}

// System types shipped with every interpreter.

const DATE_TIME: &str = "System.DateTime";
const GUID: &str = "System.Guid";

fn out_of_range() -> Diagnostic {
    argument_error("argument out of range")
}

fn date_from_parts(parts: [i64; 6]) -> std::result::Result<DateTime<Utc>, Diagnostic> {
    let [year, month, day, hour, minute, second] = parts;
    let year = i32::try_from(year).map_err(|_| out_of_range())?;
    let [month, day, hour, minute, second] = [month, day, hour, minute, second]
        .map(|part| u32::try_from(part).unwrap_or(u32::MAX));
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .ok_or_else(|| argument_error("invalid date"))
}

/// Accepts RFC 3339, `YYYY-MM-DD[ T]HH:MM[:SS]` (UTC) and a bare date.
fn parse_date_time(text: &str) -> std::result::Result<DateTime<Utc>, Diagnostic> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text.trim_end_matches('Z'), format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| argument_error(format!("invalid date: {text:?}")))?;
    Ok(Utc.from_utc_datetime(&naive))
}

fn iso8601(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn shifted(base: DateTime<Utc>, delta: Option<TimeDelta>) -> EvalResult {
    delta
        .and_then(|delta| base.checked_add_signed(delta))
        .map(date_time)
        .ok_or_else(|| out_of_range().into())
}

fn date_time_of(interp: &Interpreter, value: &Value) -> std::result::Result<DateTime<Utc>, Diagnostic> {
    value.as_host::<DateTime<Utc>>().copied().ok_or_else(|| {
        type_error(format!("expected System::DateTime, got {}", interp.class_name_of(value)))
    })
}

fn date_time(value: DateTime<Utc>) -> Value {
    Value::host(DATE_TIME, value)
}

fn guid(value: Uuid) -> Value {
    Value::host(GUID, value)
}

fn guid_text(value: &Value) -> String {
    value.as_host::<Uuid>().map(Uuid::to_string).unwrap_or_default()
}

fn number(interp: &Interpreter, args: &CallArgs, index: usize) -> EvalResult<f64> {
    Ok(float_arg(interp, &args.arg(index))?)
}

fn optional_int(interp: &Interpreter, args: &CallArgs, index: usize) -> EvalResult<i64> {
    match args.positional.get(index) {
        Some(value) => Ok(int_arg(interp, value)?),
        None => Ok(0),
    }
}

fn date_time_type() -> HostType {
    HostType::new(DATE_TIME)
        .static_method("now", 0, |_, _, _| Ok(date_time(Utc::now().with_nanosecond(0).unwrap_or_else(Utc::now))))
        .static_method("new", -4, |interp, _, args| {
            let part = |index| int_arg(interp, &args.arg(index));
            let value = date_from_parts([
                part(0)?,
                part(1)?,
                part(2)?,
                optional_int(interp, &args, 3)?,
                optional_int(interp, &args, 4)?,
                optional_int(interp, &args, 5)?,
            ])?;
            Ok(date_time(value))
        })
        .static_method("parse", 1, |interp, _, args| {
            let text = str_arg(interp, &args.arg(0))?;
            Ok(date_time(parse_date_time(&text)?))
        })
        .static_method("at", 1, |interp, _, args| {
            let seconds = int_arg(interp, &args.arg(0))?;
            let value = Utc.timestamp_opt(seconds, 0).single().ok_or_else(out_of_range)?;
            Ok(date_time(value))
        })
        .method("year", 0, |interp, recv, _| Ok(Value::int(date_time_of(interp, recv)?.year().into())))
        .method("month", 0, |interp, recv, _| Ok(Value::int(date_time_of(interp, recv)?.month().into())))
        .method("day", 0, |interp, recv, _| Ok(Value::int(date_time_of(interp, recv)?.day().into())))
        .method("hour", 0, |interp, recv, _| Ok(Value::int(date_time_of(interp, recv)?.hour().into())))
        .method("minute", 0, |interp, recv, _| Ok(Value::int(date_time_of(interp, recv)?.minute().into())))
        .method("second", 0, |interp, recv, _| Ok(Value::int(date_time_of(interp, recv)?.second().into())))
        .method("day_of_week", 0, |interp, recv, _| {
            Ok(Value::int(date_time_of(interp, recv)?.weekday().num_days_from_sunday().into()))
        })
        .method("to_i", 0, |interp, recv, _| Ok(Value::int(date_time_of(interp, recv)?.timestamp())))
        .method("to_s", 0, |interp, recv, _| Ok(Value::string(iso8601(&date_time_of(interp, recv)?))))
        .method("inspect", 0, |interp, recv, _| {
            Ok(Value::string(format!("#<System::DateTime {}>", iso8601(&date_time_of(interp, recv)?))))
        })
        .method("add_seconds", 1, |interp, recv, args| {
            let base = date_time_of(interp, recv)?;
            shifted(base, TimeDelta::try_seconds(int_arg(interp, &args.arg(0))?))
        })
        .method("add_days", 1, |interp, recv, args| {
            let base = date_time_of(interp, recv)?;
            shifted(base, TimeDelta::try_days(int_arg(interp, &args.arg(0))?))
        })
        .method("+", 1, |interp, recv, args| {
            let base = date_time_of(interp, recv)?;
            shifted(base, TimeDelta::try_seconds(int_arg(interp, &args.arg(0))?))
        })
        .method("-", 1, |interp, recv, args| {
            let base = date_time_of(interp, recv)?;
            let other = args.arg(0);
            if let Some(other) = other.as_host::<DateTime<Utc>>() {
                return Ok(Value::int((base - *other).num_seconds()));
            }
            let seconds = int_arg(interp, &other)?;
            shifted(base, seconds.checked_neg().and_then(TimeDelta::try_seconds))
        })
        .method("<=>", 1, |interp, recv, args| {
            let base = date_time_of(interp, recv)?;
            Ok(args
                .arg(0)
                .as_host::<DateTime<Utc>>()
                .map_or_else(Value::nil, |other| Value::int(base.cmp(other) as i64)))
        })
        .method("==", 1, |interp, recv, args| {
            let base = date_time_of(interp, recv)?;
            Ok(Value::bool(args.arg(0).as_host::<DateTime<Utc>>() == Some(&base)))
        })
}

fn guid_type() -> HostType {
    HostType::new(GUID)
        .static_method("new_guid", 0, |_, _, _| Ok(guid(Uuid::new_v4())))
        .static_method("empty", 0, |_, _, _| Ok(guid(Uuid::nil())))
        .static_method("parse", 1, |interp, _, args| {
            let text = str_arg(interp, &args.arg(0))?;
            let parsed = Uuid::parse_str(text.trim())
                .map_err(|err| argument_error(format!("invalid GUID {text:?}: {err}")))?;
            Ok(guid(parsed))
        })
        .method("to_s", 0, |_, recv, _| Ok(Value::string(guid_text(recv))))
        .method("inspect", 0, |_, recv, _| {
            Ok(Value::string(format!("#<System::Guid {}>", guid_text(recv))))
        })
        .method("==", 1, |_, recv, args| {
            Ok(Value::bool(
                recv.as_host::<Uuid>().is_some() && recv.as_host::<Uuid>() == args.arg(0).as_host::<Uuid>(),
            ))
        })
}

fn math_type() -> HostType {
    let unary = |name: &str, f: fn(f64) -> f64| {
        NativeFunction::new(name, 1, move |interp, _, args| Ok(Value::float(f(number(interp, &args, 0)?))))
    };
    let mut host = HostType::new("System.Math")
        .constant("PI", Value::float(std::f64::consts::PI))
        .constant("E", Value::float(std::f64::consts::E))
        .static_method("pow", 2, |interp, _, args| {
            Ok(Value::float(number(interp, &args, 0)?.powf(number(interp, &args, 1)?)))
        })
        .static_method("max", 2, |interp, _, args| {
            let (a, b) = (args.arg(0), args.arg(1));
            let ordering = interp.compare_strict(&a, &b)?;
            Ok(if ordering.is_lt() { b } else { a })
        })
        .static_method("min", 2, |interp, _, args| {
            let (a, b) = (args.arg(0), args.arg(1));
            let ordering = interp.compare_strict(&a, &b)?;
            Ok(if ordering.is_gt() { b } else { a })
        })
        .static_method("abs", 1, |interp, _, args| {
            let value = args.arg(0);
            if !value.is_numeric() {
                return Err(type_error(format!("expected a number, got {}", interp.class_name_of(&value))).into());
            }
            interp.send(&value, "abs", CallArgs::default())
        })
        .static_method("round", -2, |interp, _, args| {
            let value = number(interp, &args, 0)?;
            let digits = optional_int(interp, &args, 1)?;
            let scale = 10f64.powi(digits as i32);
            Ok(Value::float((value * scale).round() / scale))
        });
    host.statics.extend([
        unary("sqrt", f64::sqrt),
        unary("floor", f64::floor),
        unary("ceiling", f64::ceil),
        unary("truncate", f64::trunc),
        unary("sin", f64::sin),
        unary("cos", f64::cos),
        unary("tan", f64::tan),
        unary("exp", f64::exp),
        unary("log", f64::ln),
        unary("log10", f64::log10),
    ]);
    host
}

/// Registers `System.DateTime`, `System.Guid` and `System.Math`.
pub(crate) fn install_system_types(interp: &mut Interpreter) {
    for host in [date_time_type(), guid_type(), math_type()] {
        interp.register_host_type(host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_parts_reject_impossible_dates() {
        assert!(date_from_parts([2023, 2, 29, 0, 0, 0]).is_err());
        assert!(date_from_parts([2024, 13, 1, 0, 0, 0]).is_err());
        assert!(date_from_parts([2024, 1, 1, -1, 0, 0]).is_err());
        assert_eq!(date_from_parts([1970, 1, 1, 0, 0, 0]).unwrap().timestamp(), 0);
    }

    #[test]
    fn date_times_parse_iso_strings() {
        let parsed = parse_date_time("2024-03-15T10:20:30Z").unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2024, 3, 15));
        assert_eq!((parsed.hour(), parsed.minute(), parsed.second()), (10, 20, 30));
        assert_eq!(iso8601(&parsed), "2024-03-15T10:20:30Z");
        assert_eq!(parsed.weekday().num_days_from_sunday(), 5);
    }

    #[test]
    fn date_times_parse_looser_forms() {
        assert_eq!(iso8601(&parse_date_time("2024-03-15").unwrap()), "2024-03-15T00:00:00Z");
        assert_eq!(iso8601(&parse_date_time("2024-03-15 08:05").unwrap()), "2024-03-15T08:05:00Z");
        assert_eq!(iso8601(&parse_date_time("2024-03-15T10:00:00+02:00").unwrap()), "2024-03-15T08:00:00Z");
        assert!(parse_date_time("yesterday").is_err());
    }
}
