use garnet::{DiagnosticKind, GarnetError, Interpreter, InterpreterConfig, Value};
use pretty_assertions::assert_eq;

fn eval(source: &str) -> Value {
    let mut interpreter = Interpreter::with_config(InterpreterConfig::default().with_captured_output());
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed")
}

fn eval_with_output(source: &str) -> (Value, String) {
    let mut interpreter = Interpreter::with_config(InterpreterConfig::default().with_captured_output());
    let value = interpreter
        .eval_source(source)
        .expect("evaluation should succeed");
    (value, interpreter.take_output())
}

fn eval_error(source: &str) -> GarnetError {
    let mut interpreter = Interpreter::with_config(InterpreterConfig::default().with_captured_output());
    match interpreter.eval_source(source) {
        Ok(value) => panic!("expected error, received value {value:?}"),
        Err(err) => err,
    }
}

fn render(value: &Value) -> String {
    format!("{value:?}")
}

#[test]
fn break_leaves_a_while_loop() {
    let value = eval(
        r#"
        i = 0
        while true
          i += 1
          break if i == 5
        end
        i
        "#,
    );
    assert_eq!(value.as_int(), Some(5));
}

#[test]
fn next_skips_to_the_following_iteration() {
    let value = eval(
        r#"
        odds = []
        i = 0
        while i < 6
          i += 1
          next if i.even?
          odds << i
        end
        odds
        "#,
    );
    assert_eq!(render(&value), "[1, 3, 5]");
}

#[test]
fn break_in_a_block_ends_the_call_with_its_value() {
    let value = eval(
        r#"
        found = [1, 2, 3, 4].each do |n|
          break n * 10 if n == 3
        end
        found
        "#,
    );
    assert_eq!(value.as_int(), Some(30));
}

#[test]
fn break_only_ends_the_innermost_block_call() {
    let value = eval(
        r#"
        pairs = []
        [1, 2].each do |a|
          [10, 20, 30].each do |b|
            break if b == 20
            pairs << a + b
          end
        end
        pairs
        "#,
    );
    assert_eq!(render(&value), "[11, 12]");
}

#[test]
fn next_in_a_block_supplies_its_result() {
    let value = eval("[1, 2, 3].map { |x| next 0 if x == 2; x }");
    assert_eq!(render(&value), "[1, 0, 3]");
}

#[test]
fn redo_reruns_the_block_body() {
    let value = eval(
        r#"
        attempts = 0
        [1].each do |x|
          attempts += 1
          redo if attempts < 3
        end
        attempts
        "#,
    );
    assert_eq!(value.as_int(), Some(3));
}

#[test]
fn loop_runs_until_break() {
    let value = eval(
        r#"
        n = 0
        loop do
          n += 1
          break if n == 4
        end
        n
        "#,
    );
    assert_eq!(value.as_int(), Some(4));
}

#[test]
fn break_inside_a_called_proc_is_a_local_jump_error() {
    let err = eval_error("escape = proc { break }\nescape.call");
    assert_eq!(err.kind(), DiagnosticKind::LocalJump);
}

#[test]
fn break_inside_a_lambda_returns_from_it() {
    let value = eval("stop = lambda { break 7 }\n[stop.call, :after]");
    assert_eq!(render(&value), "[7, :after]");
}

#[test]
fn return_inside_a_lambda_returns_from_the_lambda() {
    let value = eval(
        r#"
        def run
          check = lambda { |x| return x * 2 }
          check.call(4) + 1
        end
        run
        "#,
    );
    assert_eq!(value.as_int(), Some(9));
}

#[test]
fn return_exits_a_method_early() {
    let value = eval(
        r#"
        def classify(n)
          return :negative if n < 0
          return :zero if n == 0
          :positive
        end
        [classify(-1), classify(0), classify(1)]
        "#,
    );
    assert_eq!(render(&value), "[:negative, :zero, :positive]");
}

#[test]
fn return_inside_a_block_is_rejected() {
    let err = eval_error(
        r#"
        def first_even(items)
          items.each { |n| return n if n.even? }
          nil
        end
        first_even([1, 2])
        "#,
    );
    assert_eq!(err.kind(), DiagnosticKind::InvalidOperation);
}

#[test]
fn return_at_top_level_is_rejected() {
    let err = eval_error("return 1");
    assert_eq!(err.kind(), DiagnosticKind::InvalidOperation);
}

#[test]
fn break_outside_any_loop_is_a_syntax_error() {
    let err = eval_error("break");
    assert_eq!(err.kind(), DiagnosticKind::Syntax);
    assert!(err.message().contains("Invalid break"));

    let err = eval_error("def f\n  next\nend");
    assert_eq!(err.kind(), DiagnosticKind::Syntax);
}

#[test]
fn rescue_else_and_ensure_run_in_order() {
    let (_, output) = eval_with_output(
        r#"
        def attempt(failing)
          begin
            puts "body"
            raise "boom" if failing
          rescue => e
            puts "rescue #{e.message}"
          else
            puts "else"
          ensure
            puts "ensure"
          end
        end
        attempt(true)
        attempt(false)
        "#,
    );
    assert_eq!(output, "body\nrescue boom\nensure\nbody\nelse\nensure\n");
}

#[test]
fn rescue_matches_by_class() {
    let value = eval(
        r#"
        def risky(kind)
          case kind
          when :arg then raise ArgumentError, "bad arg"
          when :zero then 1 / 0
          when :name then undefined_call_here
          end
        rescue ArgumentError => e
          "arg: #{e.message}"
        rescue ZeroDivisionError, NameError => e
          e.class.name
        end
        [risky(:arg), risky(:zero), risky(:name)]
        "#,
    );
    assert_eq!(
        render(&value),
        "[\"arg: bad arg\", \"ZeroDivisionError\", \"NameError\"]"
    );
}

#[test]
fn custom_exception_hierarchies() {
    let value = eval(
        r##"
        class AppError < StandardError
        end

        class NotFound < AppError
          def initialize(what)
            super("#{what} not found")
          end
        end

        begin
          raise NotFound.new("page")
        rescue AppError => e
          [e.class.name, e.message, e.is_a?(StandardError)]
        end
        "##,
    );
    assert_eq!(render(&value), "[\"NotFound\", \"page not found\", true]");
}

#[test]
fn uncaught_custom_exceptions_keep_their_class() {
    let err = eval_error("class Oops < StandardError\nend\nraise Oops, \"bad\"");
    assert_eq!(err.kind(), DiagnosticKind::Custom("Oops".into()));
    assert_eq!(err.message(), "bad");
}

#[test]
fn retry_reruns_the_begin_block() {
    let value = eval(
        r#"
        tries = 0
        begin
          tries += 1
          raise "flaky" if tries < 3
          "ok after #{tries}"
        rescue
          retry
        end
        "#,
    );
    assert_eq!(value.as_string().as_deref(), Some("ok after 3"));
}

#[test]
fn ensure_runs_when_errors_propagate() {
    let mut interpreter = Interpreter::with_config(InterpreterConfig::default().with_captured_output());
    let err = interpreter
        .eval_source(
            r#"
            begin
              raise ArgumentError, "nope"
            ensure
              puts "cleanup"
            end
            "#,
        )
        .expect_err("error propagates");
    assert_eq!(err.kind(), DiagnosticKind::Argument);
    assert_eq!(interpreter.take_output(), "cleanup\n");
}

#[test]
fn raise_without_arguments_reraises_the_current_error() {
    let value = eval(
        r#"
        begin
          begin
            raise IndexError, "inner"
          rescue IndexError
            raise
          end
        rescue => outer
          [outer.class.name, outer.message]
        end
        "#,
    );
    assert_eq!(render(&value), "[\"IndexError\", \"inner\"]");
}

#[test]
fn runtime_errors_are_rescuable() {
    let value = eval(
        r#"
        results = []
        table = {a: 1}
        [-> { nil.upcase }, -> { [1].fetch(5) }, -> { table.fetch(:b) }, -> { Integer("x") }].each do |job|
          begin
            job.call
          rescue => e
            results << e.class.name
          end
        end
        results
        "#,
    );
    assert_eq!(
        render(&value),
        "[\"NoMethodError\", \"IndexError\", \"KeyError\", \"ArgumentError\"]"
    );
}

#[test]
fn rescue_modifier_supplies_a_fallback() {
    let value = eval("Integer(\"zz\") rescue -1");
    assert_eq!(value.as_int(), Some(-1));
}

#[test]
fn logical_operators_short_circuit() {
    let value = eval(
        r#"
        a = (false and raise("fail"))
        b = (1 or raise("fail"))
        [false && raise("fail"), true || raise("fail"), nil && raise("fail"), a, b]
        "#,
    );
    assert_eq!(render(&value), "[false, true, nil, false, 1]");
}

#[test]
fn yield_without_a_block_is_a_name_error() {
    let err = eval_error(
        r#"
        def each_twice
          yield 1
        end
        each_twice
        "#,
    );
    assert_eq!(err.kind(), DiagnosticKind::Name);
    assert!(err.message().contains("no block given"));
}

#[test]
fn every_yield_invokes_the_block() {
    let value = eval(
        r#"
        def twice
          yield :first
          yield :second
        end
        calls = []
        twice { |tag| calls << tag }
        calls
        "#,
    );
    assert_eq!(render(&value), "[:first, :second]");
}

#[test]
fn double_splat_requires_a_hash() {
    let err = eval_error(
        r#"
        def configure(**options)
          options
        end
        configure(**5)
        "#,
    );
    assert_eq!(err.kind(), DiagnosticKind::Argument);
}
