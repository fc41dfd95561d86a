use std::sync::Arc;

use garnet::{
    host::HostType, DiagnosticKind, Interpreter, InterpreterConfig, PolicyMode, SecurityPolicy,
    Value,
};
use pretty_assertions::assert_eq;

fn sandboxed() -> InterpreterConfig {
    InterpreterConfig::default()
        .with_captured_output()
        .with_policy_mode(PolicyMode::WhitelistOnly)
}

#[test]
fn unrestricted_interpreters_reach_every_host_type() {
    let mut interpreter = Interpreter::new();
    let value = interpreter
        .eval_source("System::DateTime.new(2024, 1, 15).year")
        .expect("host types are open by default");
    assert_eq!(value.as_int(), Some(2024));
}

#[test]
fn whitelist_mode_denies_unlisted_types() {
    let mut interpreter = Interpreter::with_config(sandboxed());
    let err = interpreter
        .eval_source("System::DateTime.now")
        .expect_err("type is not whitelisted");
    assert_eq!(err.kind(), DiagnosticKind::TypeAccess);
    assert!(err.message().contains("System.DateTime"));
}

#[test]
fn namespaces_are_not_types() {
    let mut interpreter = Interpreter::with_config(sandboxed());
    let value = interpreter
        .eval_source("System.class.name")
        .expect("reaching a namespace is not a type access");
    assert_eq!(value.as_string().as_deref(), Some("Module"));
}

#[test]
fn allowed_types_are_reachable() {
    let mut interpreter =
        Interpreter::with_config(sandboxed().allow_type("System.Guid"));
    let value = interpreter
        .eval_source("System::Guid.empty.to_s")
        .expect("Guid is whitelisted");
    assert_eq!(
        value.as_string().as_deref(),
        Some("00000000-0000-0000-0000-000000000000")
    );
    let err = interpreter
        .eval_source("System::Math::PI")
        .expect_err("Math is not whitelisted");
    assert_eq!(err.kind(), DiagnosticKind::TypeAccess);
}

#[test]
fn allowed_namespaces_cover_their_types() {
    let mut interpreter =
        Interpreter::with_config(sandboxed().allow_namespace("System.*"));
    let value = interpreter
        .eval_source("[System::Math.sqrt(16), System::DateTime.new(2020, 2, 29).day]")
        .expect("System namespace is whitelisted");
    assert_eq!(format!("{value:?}"), "[4.0, 29]");
}

#[test]
fn denials_are_rescuable_name_errors() {
    let mut interpreter = Interpreter::with_config(sandboxed());
    let value = interpreter
        .eval_source(
            r#"
            begin
              System::Guid.new_guid
            rescue NameError => e
              e.class.name
            end
            "#,
        )
        .expect("denial is rescued");
    assert_eq!(value.as_string().as_deref(), Some("TypeAccessError"));
}

#[test]
fn shared_policies_apply_to_every_interpreter() {
    let policy = Arc::new(SecurityPolicy::new(PolicyMode::WhitelistOnly));
    let mut first = Interpreter::with_policy(InterpreterConfig::default(), policy.clone());
    let mut second = Interpreter::with_policy(InterpreterConfig::default(), policy.clone());
    assert!(first.eval_source("System::Math::E").is_err());

    policy.allow_type("System.Math");
    assert!(first.eval_source("System::Math::E").is_ok());
    assert!(second.eval_source("System::Math.floor(2.5)").is_ok());

    policy.clear();
    let err = second
        .eval_source("System::Math::PI")
        .expect_err("whitelist was cleared");
    assert_eq!(err.kind(), DiagnosticKind::TypeAccess);
}

#[test]
fn switching_back_to_unrestricted_opens_everything() {
    let mut interpreter = Interpreter::with_config(sandboxed());
    assert!(interpreter.eval_source("System::Guid.empty").is_err());
    interpreter.policy().set_mode(PolicyMode::Unrestricted);
    assert!(interpreter.eval_source("System::Guid.empty").is_ok());
}

#[test]
fn custom_host_types_are_gated_too() {
    let mut interpreter = Interpreter::with_config(sandboxed());
    interpreter.register_host_type(
        HostType::new("Acme.Meter")
            .constant("UNIT", Value::string("kWh"))
            .static_method("reading", 0, |_, _, _| Ok(Value::int(42))),
    );
    let err = interpreter
        .eval_source("Acme::Meter.reading")
        .expect_err("Acme.Meter is not whitelisted");
    assert_eq!(err.kind(), DiagnosticKind::TypeAccess);

    interpreter.policy().allow_namespace("Acme");
    let value = interpreter
        .eval_source("[Acme::Meter.reading, Acme::Meter::UNIT, Acme::Meter.name]")
        .expect("namespace is now whitelisted");
    assert_eq!(format!("{value:?}"), "[42, \"kWh\", \"Acme::Meter\"]");
}

#[test]
fn lookup_class_resolves_host_types_by_dotted_name() {
    let interpreter = Interpreter::new();
    assert!(interpreter.lookup_class("System.DateTime").is_some());
    assert!(interpreter.lookup_class("System.Nope").is_none());
}

#[test]
fn date_time_arithmetic() {
    let mut interpreter = Interpreter::new();
    let value = interpreter
        .eval_source(
            r#"
            start = System::DateTime.parse("2024-03-15T10:20:30Z")
            later = start.add_days(20)
            [later.month, later.day, later - start, start.to_s, (start <=> later)]
            "#,
        )
        .expect("date arithmetic succeeds");
    assert_eq!(
        format!("{value:?}"),
        "[4, 4, 1728000, \"2024-03-15T10:20:30Z\", -1]"
    );
}

#[test]
fn invalid_dates_raise_argument_errors() {
    let mut interpreter = Interpreter::new();
    let err = interpreter
        .eval_source("System::DateTime.new(2023, 2, 29)")
        .expect_err("2023 is not a leap year");
    assert_eq!(err.kind(), DiagnosticKind::Argument);
}

#[test]
fn guids_round_trip_through_strings() {
    let mut interpreter = Interpreter::new();
    let value = interpreter
        .eval_source(
            r#"
            id = System::Guid.new_guid
            [id.to_s.length, System::Guid.parse(id.to_s) == id, id == System::Guid.empty]
            "#,
        )
        .expect("guid operations succeed");
    assert_eq!(format!("{value:?}"), "[36, true, false]");
}

#[test]
fn host_values_parse_and_shift() {
    let mut interpreter = Interpreter::new();
    let value = interpreter
        .eval_source(
            r#"
            epoch = System::DateTime.at(0)
            leap = System::DateTime.parse("2024-02-28").add_days(1)
            braced = System::Guid.parse("{00000000-0000-0000-0000-000000000000}")
            [epoch.to_s, epoch.day_of_week, leap.day, (epoch + 90).minute, braced == System::Guid.empty]
            "#,
        )
        .expect("host values behave");
    assert_eq!(format!("{value:?}"), "[\"1970-01-01T00:00:00Z\", 4, 29, 1, true]");

    let err = interpreter
        .eval_source("System::Guid.parse(\"not-a-guid\")")
        .expect_err("malformed guid");
    assert_eq!(err.kind(), DiagnosticKind::Argument);
}
