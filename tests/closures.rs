use garnet::{DiagnosticKind, GarnetError, Interpreter, InterpreterConfig, Value};
use pretty_assertions::assert_eq;

fn eval(source: &str) -> Value {
    let mut interpreter = Interpreter::with_config(InterpreterConfig::default().with_captured_output());
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed")
}

fn eval_error(source: &str) -> GarnetError {
    let mut interpreter = Interpreter::new();
    match interpreter.eval_source(source) {
        Ok(value) => panic!("expected error, received value {value:?}"),
        Err(err) => err,
    }
}

fn render(value: &Value) -> String {
    format!("{value:?}")
}

#[test]
fn blocks_write_through_to_enclosing_locals() {
    let value = eval(
        r#"
        total = 0
        [1, 2, 3].each { |n| total += n }
        total
        "#,
    );
    assert_eq!(value.as_int(), Some(6));
}

#[test]
fn block_locals_do_not_leak() {
    let value = eval(
        r#"
        [1].each { |n| inner = n }
        defined?(inner)
        "#,
    );
    assert!(value.is_nil());
}

#[test]
fn block_parameters_shadow_outer_names() {
    let value = eval(
        r#"
        n = 100
        [1, 2].each { |n| n * 2 }
        n
        "#,
    );
    assert_eq!(value.as_int(), Some(100));
}

#[test]
fn methods_do_not_see_caller_locals() {
    let err = eval_error(
        r#"
        secret = 1
        def peek
          secret
        end
        peek
        "#,
    );
    assert_eq!(err.kind(), DiagnosticKind::Name);
}

#[test]
fn lambdas_capture_their_defining_scope() {
    let value = eval(
        r#"
        def make_counter
          count = 0
          -> { count += 1 }
        end

        counter = make_counter
        other = make_counter
        counter.call
        counter.call
        [counter.call, other.call]
        "#,
    );
    assert_eq!(render(&value), "[3, 1]");
}

#[test]
fn closures_share_one_captured_binding() {
    let value = eval(
        r#"
        x = 1
        read = lambda { x }
        write = lambda { |v| x = v }
        write.call(10)
        [read.call, x]
        "#,
    );
    assert_eq!(render(&value), "[10, 10]");
}

#[test]
fn lambdas_check_arity_strictly() {
    let err = eval_error("add = ->(a, b) { a + b }\nadd.call(1)");
    assert_eq!(err.kind(), DiagnosticKind::Argument);
    assert!(err.message().contains("given 1, expected 2"));
}

#[test]
fn procs_are_lenient_with_arguments() {
    let value = eval(
        r#"
        pair = proc { |a, b| [a, b] }
        [pair.call(1), pair.call(1, 2, 3), pair.call([4, 5])]
        "#,
    );
    assert_eq!(render(&value), "[[1, nil], [1, 2], [4, 5]]");
}

#[test]
fn lambdas_do_not_spread_a_lone_array() {
    let value = eval("first = ->(a) { a }\nfirst.call([1, 2])");
    assert_eq!(render(&value), "[1, 2]");
}

#[test]
fn block_parameters_destructure_pairs() {
    let value = eval(
        r##"
        {a: 1, b: 2}.map { |key, value| "#{key}=#{value}" }
        "##,
    );
    assert_eq!(render(&value), "[\"a=1\", \"b=2\"]");
}

#[test]
fn nested_block_parameters() {
    let value = eval("[[1, [2, 3]]].map { |a, (b, c)| a + b + c }");
    assert_eq!(render(&value), "[6]");
}

#[test]
fn optional_splat_and_keyword_parameters() {
    let value = eval(
        r#"
        def build(name, size = 1, *tags, color: "red", **rest, &block)
          extra = block ? block.call(name) : nil
          [name, size, tags, color, rest, extra]
        end

        [
          build("a"),
          build("b", 2, :x, :y, color: "blue", shape: :round) { |n| n.upcase }
        ]
        "#,
    );
    assert_eq!(
        render(&value),
        "[[\"a\", 1, [], \"red\", {}, nil], [\"b\", 2, [:x, :y], \"blue\", {shape: :round}, \"B\"]]"
    );
}

#[test]
fn missing_required_keywords_are_reported() {
    let err = eval_error("def connect(host:, port: 80)\n  host\nend\nconnect(port: 1)");
    assert_eq!(err.kind(), DiagnosticKind::Argument);
    assert!(err.message().contains("missing keyword: :host"));
}

#[test]
fn unknown_keywords_are_reported() {
    let err = eval_error("def connect(host: nil)\n  host\nend\nconnect(hots: 1)");
    assert_eq!(err.kind(), DiagnosticKind::Argument);
    assert!(err.message().contains("unknown keyword: :hots"));
}

#[test]
fn yield_and_block_given() {
    let value = eval(
        r#"
        def twice
          return :no_block unless block_given?
          [yield(1), yield(2)]
        end

        [twice { |n| n * 10 }, twice]
        "#,
    );
    assert_eq!(render(&value), "[[10, 20], :no_block]");
}

#[test]
fn explicit_block_parameters_can_be_stored() {
    let value = eval(
        r#"
        class Button
          def on_click(&handler)
            @handler = handler
          end

          def click
            @handler.call(:clicked)
          end
        end

        button = Button.new
        log = []
        button.on_click { |event| log << event }
        button.click
        button.click
        log
        "#,
    );
    assert_eq!(render(&value), "[:clicked, :clicked]");
}

#[test]
fn symbols_and_methods_convert_to_blocks() {
    let value = eval(
        r#"
        def shout(word)
          word.upcase + "!"
        end

        [%w[a b].map(&:upcase), %w[c d].map(&method(:shout))]
        "#,
    );
    assert_eq!(render(&value), "[[\"A\", \"B\"], [\"C!\", \"D!\"]]");
}

#[test]
fn procs_compose_and_curry() {
    let value = eval(
        r#"
        inc = ->(x) { x + 1 }
        dbl = ->(x) { x * 2 }
        add = ->(a, b, c) { a + b + c }
        [(inc >> dbl).call(3), (inc << dbl).call(3), add.curry[1][2][3], add.arity, inc.lambda?]
        "#,
    );
    assert_eq!(render(&value), "[8, 7, 6, 3, true]");
}

#[test]
fn proc_parameters_are_reflected() {
    let value = eval("->(a, b = 1, *c) {}.parameters");
    assert_eq!(render(&value), "[[:req, :a], [:opt, :b], [:rest, :c]]");
}

#[test]
fn blocks_see_self_of_their_definition() {
    let value = eval(
        r#"
        class Collector
          def initialize
            @seen = []
          end

          def collect(items)
            items.each { |item| @seen << item }
            @seen
          end
        end

        Collector.new.collect([1, 2])
        "#,
    );
    assert_eq!(render(&value), "[1, 2]");
}
