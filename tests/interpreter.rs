use garnet::{
    DiagnosticKind, GarnetError, HostFunction, Interpreter, InterpreterConfig, Value, ValueKind,
};
use pretty_assertions::assert_eq;

fn interpreter() -> Interpreter {
    Interpreter::with_config(InterpreterConfig::default().with_captured_output())
}

fn eval(source: &str) -> Value {
    let mut interpreter = interpreter();
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed")
}

fn eval_error(source: &str) -> GarnetError {
    let mut interpreter = interpreter();
    match interpreter.eval_source(source) {
        Ok(value) => panic!("expected error, received value {value:?}"),
        Err(err) => err,
    }
}

fn output(source: &str) -> String {
    let mut interpreter = interpreter();
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed");
    interpreter.take_output()
}

fn expect_int(value: &Value) -> i64 {
    value
        .as_int()
        .unwrap_or_else(|| panic!("expected Integer, found {}", value.type_name()))
}

fn expect_str(value: &Value) -> String {
    value
        .as_string()
        .unwrap_or_else(|| panic!("expected String, found {}", value.type_name()))
}

#[test]
fn evaluates_basic_arithmetic() {
    assert_eq!(expect_int(&eval("2 + 3 * 4")), 14);
    assert_eq!(expect_int(&eval("(2 + 3) * 4")), 20);
    assert_eq!(expect_int(&eval("2 ** 10")), 1024);
}

#[test]
fn integer_division_floors_toward_negative_infinity() {
    assert_eq!(expect_int(&eval("-7 / 2")), -4);
    assert_eq!(expect_int(&eval("-7 % 3")), 2);
}

#[test]
fn integers_widen_before_becoming_floats() {
    let wide = eval("9223372036854775807 + 1");
    assert!(matches!(wide.kind(), ValueKind::BigInt(_)));
    assert_eq!(wide.as_integer(), Some(9_223_372_036_854_775_808));

    let huge = eval("(2 ** 100) * (2 ** 100)");
    assert!(matches!(huge.kind(), ValueKind::Float(_)));
}

#[test]
fn negative_exponents_produce_floats() {
    assert_eq!(eval("2 ** -1").as_number(), Some(0.5));
}

#[test]
fn division_by_zero_is_an_error() {
    let err = eval_error("1 / 0");
    assert_eq!(err.kind(), DiagnosticKind::ZeroDivision);
}

#[test]
fn interpolates_strings() {
    let value = eval(
        r#"
        name = "garnet"
        "hello #{name.upcase}, #{1 + 2}"
        "#,
    );
    assert_eq!(expect_str(&value), "hello GARNET, 3");
}

#[test]
fn puts_writes_each_array_item_on_its_own_line() {
    assert_eq!(output("puts [1, [2, 3]]\nputs nil"), "1\n2\n3\n\n");
}

#[test]
fn p_writes_inspected_values() {
    assert_eq!(output("p \"a\", :b\np({c: 1})"), "\"a\"\n:b\n{c: 1}\n");
}

#[test]
fn if_elsif_else_chains() {
    let value = eval(
        r#"
        def grade(score)
          if score >= 90
            "A"
          elsif score >= 80
            "B"
          else
            "C"
          end
        end
        [grade(95), grade(85), grade(10)].join
        "#,
    );
    assert_eq!(expect_str(&value), "ABC");
}

#[test]
fn modifiers_and_unless() {
    let value = eval(
        r#"
        result = []
        result << 1 if true
        result << 2 unless false
        result << 3 if false
        result
        "#,
    );
    assert_eq!(format!("{value:?}"), "[1, 2]");
}

#[test]
fn while_and_until_loops() {
    let value = eval(
        r#"
        i = 0
        total = 0
        while i < 5
          i += 1
          total += i
        end
        until i == 0
          i -= 1
        end
        [i, total]
        "#,
    );
    assert_eq!(format!("{value:?}"), "[0, 15]");
}

#[test]
fn for_loops_bind_in_the_enclosing_scope() {
    let value = eval(
        r#"
        sum = 0
        for n in 1..4
          sum += n
        end
        [sum, n]
        "#,
    );
    assert_eq!(format!("{value:?}"), "[10, 4]");
}

#[test]
fn case_when_matches_with_case_equality() {
    let value = eval(
        r#"
        def describe(value)
          case value
          when 0 then "zero"
          when 1..9 then "small"
          when String, Symbol then "text"
          when Array then "list"
          else "other"
          end
        end
        [describe(0), describe(5), describe("x"), describe(:y), describe([]), describe(50)].join(",")
        "#,
    );
    assert_eq!(expect_str(&value), "zero,small,text,text,list,other");
}

#[test]
fn case_without_subject_tests_truthiness() {
    let value = eval(
        r#"
        x = 7
        case
        when x < 5 then :low
        when x < 10 then :mid
        else :high
        end
        "#,
    );
    assert_eq!(value.as_symbol().map(|s| s.name().to_string()), Some("mid".into()));
}

#[test]
fn multiple_assignment_with_splat() {
    let value = eval(
        r#"
        a, b = 1, 2
        a, b = b, a
        first, *rest = [1, 2, 3, 4]
        *init, last = [1, 2, 3]
        [a, b, first, rest, init, last]
        "#,
    );
    assert_eq!(format!("{value:?}"), "[2, 1, 1, [2, 3, 4], [1, 2], 3]");
}

#[test]
fn nested_multiple_assignment() {
    let value = eval("a, (b, c), d = 1, [2, 3], 4\n[a, b, c, d]");
    assert_eq!(format!("{value:?}"), "[1, 2, 3, 4]");
}

#[test]
fn operator_assignment_forms() {
    let value = eval(
        r#"
        counts = {}
        counts[:a] ||= 0
        counts[:a] += 5
        name = nil
        name ||= "default"
        flag = true
        flag &&= "kept"
        [counts[:a], name, flag]
        "#,
    );
    assert_eq!(format!("{value:?}"), "[5, \"default\", \"kept\"]");
}

#[test]
fn safe_navigation_short_circuits_on_nil() {
    let value = eval(
        r#"
        missing = nil
        [missing&.length, "abc"&.length]
        "#,
    );
    assert_eq!(format!("{value:?}"), "[nil, 3]");
}

#[test]
fn percent_literals_build_word_and_symbol_arrays() {
    let value = eval("[%w[a b c], %i[x y]]");
    assert_eq!(format!("{value:?}"), "[[\"a\", \"b\", \"c\"], [:x, :y]]");
}

#[test]
fn globals_are_shared_across_methods() {
    let value = eval(
        r#"
        $counter = 0
        def bump
          $counter += 1
        end
        bump
        bump
        $counter
        "#,
    );
    assert_eq!(expect_int(&value), 2);
}

#[test]
fn regex_matches_set_numbered_globals() {
    let value = eval(
        r#"
        if "order 42 shipped" =~ /(\d+) (\w+)/
          [$1, $2, $~[0]]
        end
        "#,
    );
    assert_eq!(format!("{value:?}"), "[\"42\", \"shipped\", \"42 shipped\"]");
}

#[test]
fn defined_reports_what_a_name_is() {
    let value = eval(
        r#"
        x = 1
        [defined?(x), defined?(puts), defined?(String), defined?(@nope), defined?(zzz)]
        "#,
    );
    assert_eq!(
        format!("{value:?}"),
        "[\"local-variable\", \"method\", \"constant\", nil, nil]"
    );
}

#[test]
fn undefined_names_raise_name_error() {
    let err = eval_error("undefined_thing");
    assert_eq!(err.kind(), DiagnosticKind::Name);
    assert!(err.message().contains("undefined_thing"));
}

#[test]
fn undefined_methods_raise_no_method_error() {
    let err = eval_error("5.frobnicate");
    assert_eq!(err.kind(), DiagnosticKind::NoMethod);
    assert!(err.message().contains("frobnicate"));
}

#[test]
fn deep_recursion_raises_system_stack_error() {
    let mut interpreter =
        Interpreter::with_config(InterpreterConfig::default().with_max_call_depth(200));
    let err = interpreter
        .eval_source("def down(n)\n  down(n + 1)\nend\ndown(0)")
        .expect_err("recursion should be cut off");
    assert_eq!(err.kind(), DiagnosticKind::SystemStack);
}

#[test]
fn recursion_within_the_limit_succeeds() {
    let value = eval(
        r#"
        def fib(n)
          n < 2 ? n : fib(n - 1) + fib(n - 2)
        end
        fib(15)
        "#,
    );
    assert_eq!(expect_int(&value), 610);
}

#[test]
fn state_persists_between_evaluations() {
    let mut interpreter = interpreter();
    interpreter
        .eval_source("def twice(x)\n  x * 2\nend\n$seen = 21")
        .expect("definitions evaluate");
    let value = interpreter
        .eval_source("twice($seen)")
        .expect("second evaluation succeeds");
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn registered_functions_are_callable_from_scripts() {
    let mut interpreter = interpreter();
    interpreter.register_function("add", 2, |args| {
        let a = args[0].as_int().unwrap_or_default();
        let b = args[1].as_int().unwrap_or_default();
        Ok(Value::int(a + b))
    });
    let value = interpreter
        .eval_source("add(40, 2)")
        .expect("host function call succeeds");
    assert_eq!(expect_int(&value), 42);

    let err = interpreter
        .eval_source("add(1)")
        .expect_err("arity is checked");
    assert_eq!(err.kind(), DiagnosticKind::Argument);
}

#[test]
fn injected_functions_register_every_name() {
    let mut interpreter = interpreter();
    let greet = HostFunction::new("Host.Greeter", 1, |args| {
        Ok(Value::string(format!("hi {}", args[0])))
    })
    .named("greet")
    .named("hello");
    interpreter.inject(greet).expect("injection succeeds");
    let value = interpreter
        .eval_source(r#"[greet("a"), hello("b")]"#)
        .expect("both names resolve");
    assert_eq!(format!("{value:?}"), "[\"hi a\", \"hi b\"]");
    assert!(interpreter.policy().is_allowed("Host.Greeter"));
}

#[test]
fn injecting_without_names_fails() {
    let mut interpreter = interpreter();
    let nameless = HostFunction::new("Host.Nothing", 0, |_| Ok(Value::nil()));
    let err = interpreter.inject(nameless).expect_err("no names");
    assert_eq!(err.kind(), DiagnosticKind::Argument);
}

#[test]
fn call_function_invokes_script_methods() {
    let mut interpreter = interpreter();
    interpreter
        .eval_source("def square(x)\n  x * x\nend")
        .expect("definition evaluates");
    let value = interpreter
        .call_function("square", vec![Value::int(9)])
        .expect("call succeeds");
    assert_eq!(expect_int(&value), 81);
}

#[test]
fn host_globals_are_visible_to_scripts() {
    let mut interpreter = interpreter();
    interpreter.set_global("limit", Value::int(3));
    let value = interpreter
        .eval_source("$limit * 2")
        .expect("global read succeeds");
    assert_eq!(expect_int(&value), 6);
}

#[test]
fn reflection_lists_classes_and_methods() {
    let mut interpreter = interpreter();
    interpreter
        .eval_source("class Widget\n  def spin\n  end\nend")
        .expect("class definition evaluates");
    assert!(interpreter.class_names().contains(&"Widget".to_string()));
    assert!(interpreter.class_names().contains(&"System.DateTime".to_string()));
    let methods = interpreter
        .registered_methods("Widget")
        .expect("Widget is known");
    assert_eq!(methods, vec!["spin".to_string()]);
    let string_methods = interpreter
        .registered_methods("String")
        .expect("String is known");
    assert!(string_methods.contains(&"upcase".to_string()));
    assert!(interpreter.registered_methods("Nope").is_none());
}

#[test]
fn syntax_errors_carry_a_span() {
    let err = eval_error("x = (1 + ");
    assert_eq!(err.kind(), DiagnosticKind::Syntax);
    assert!(err.span().is_some());
}
