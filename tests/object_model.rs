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
fn classes_hold_state_in_instance_variables() {
    let value = eval(
        r##"
        class Point
          attr_reader :x, :y
          attr_accessor :label

          def initialize(x, y)
            @x = x
            @y = y
          end

          def +(other)
            Point.new(x + other.x, y + other.y)
          end

          def to_s
            "(#{x}, #{y})"
          end
        end
        sum = Point.new(1, 2) + Point.new(3, 4)
        sum.label = "total"
        "#{sum.label} #{sum}"
        "##,
    );
    assert_eq!(value.as_string().as_deref(), Some("total (4, 6)"));
}

#[test]
fn inheritance_and_super() {
    let value = eval(
        r##"
        class Animal
          def initialize(name)
            @name = name
          end

          def speak
            "#{@name} makes a sound"
          end
        end

        class Dog < Animal
          def initialize(name, breed)
            super(name)
            @breed = breed
          end

          def speak
            super + " (woof)"
          end
        end

        class Puppy < Dog
          def speak
            super
          end
        end

        [Dog.new("Rex", "lab").speak, Puppy.new("Bit", "pug").speak, Puppy.superclass.name]
        "##,
    );
    assert_eq!(
        render(&value),
        "[\"Rex makes a sound (woof)\", \"Bit makes a sound (woof)\", \"Dog\"]"
    );
}

#[test]
fn modules_are_mixed_into_the_ancestor_chain() {
    let value = eval(
        r#"
        module Greeter
          def greet
            "hi from #{name}"
          end
        end

        class Base
        end

        class Person < Base
          include Greeter

          def name
            "person"
          end
        end

        [Person.new.greet, Person.ancestors.first(3), Person.include?(Greeter), Person.new.is_a?(Greeter)]
        "#,
    );
    assert_eq!(
        render(&value),
        "[\"hi from person\", [Person, Greeter, Base], true, true]"
    );
}

#[test]
fn class_methods_override_mixins_and_super_reaches_them() {
    let value = eval(
        r#"
        module Loud
          def talk
            "loud"
          end
        end

        class Speaker
          include Loud

          def talk
            super.upcase + "!"
          end
        end

        Speaker.new.talk
        "#,
    );
    assert_eq!(value.as_string().as_deref(), Some("LOUD!"));
}

#[test]
fn comparable_derives_operators_from_spaceship() {
    let value = eval(
        r#"
        class Version
          include Comparable
          attr_reader :major

          def initialize(major)
            @major = major
          end

          def <=>(other)
            major <=> other.major
          end
        end

        a = Version.new(1)
        b = Version.new(2)
        c = Version.new(3)
        [a < b, c > b, b.between?(a, c), [c, a, b].sort.map(&:major), [a, c].max.major]
        "#,
    );
    assert_eq!(render(&value), "[true, true, true, [1, 2, 3], 3]");
}

#[test]
fn enumerable_builds_on_each() {
    let value = eval(
        r#"
        class Countdown
          include Enumerable

          def initialize(from)
            @from = from
          end

          def each
            n = @from
            while n > 0
              yield n
              n -= 1
            end
          end
        end

        c = Countdown.new(4)
        [c.to_a, c.map { |n| n * 10 }, c.select(&:even?), c.include?(2), c.sort, c.reduce(:+)]
        "#,
    );
    assert_eq!(
        render(&value),
        "[[4, 3, 2, 1], [40, 30, 20, 10], [4, 2], true, [1, 2, 3, 4], 10]"
    );
}

#[test]
fn singleton_methods_belong_to_one_object() {
    let value = eval(
        r#"
        a = Object.new
        b = Object.new
        def a.shout
          "A!"
        end
        b.define_singleton_method(:shout) { "B!" }
        [a.shout, b.shout, a.singleton_methods, Object.new.respond_to?(:shout)]
        "#,
    );
    assert_eq!(render(&value), "[\"A!\", \"B!\", [:shout], false]");
}

#[test]
fn class_level_singletons() {
    let value = eval(
        r#"
        class Registry
          @@count = 0

          class << self
            def register
              @@count += 1
            end
          end

          def self.count
            @@count
          end
        end

        Registry.register
        Registry.register
        Registry.count
        "#,
    );
    assert_eq!(value.as_int(), Some(2));
}

#[test]
fn class_instance_variables_are_separate_from_instances() {
    let value = eval(
        r#"
        class Config
          @settings = {mode: "fast"}

          def self.settings
            @settings
          end

          def settings
            @settings
          end
        end

        [Config.settings[:mode], Config.new.settings]
        "#,
    );
    assert_eq!(render(&value), "[\"fast\", nil]");
}

#[test]
fn extend_adds_module_methods_to_one_object() {
    let value = eval(
        r#"
        module Tagged
          def tag
            "tagged"
          end
        end

        item = Object.new
        item.extend(Tagged)
        [item.tag, item.is_a?(Tagged), Object.new.respond_to?(:tag)]
        "#,
    );
    assert_eq!(render(&value), "[\"tagged\", true, false]");
}

#[test]
fn define_method_creates_methods_from_blocks() {
    let value = eval(
        r##"
        class Flags
          [:red, :green].each do |color|
            define_method("#{color}?") { @color == color }
          end

          def initialize(color)
            @color = color
          end
        end

        flag = Flags.new(:green)
        [flag.red?, flag.green?]
        "##,
    );
    assert_eq!(render(&value), "[false, true]");
}

#[test]
fn method_missing_catches_unknown_calls() {
    let value = eval(
        r#"
        class Ghost
          def method_missing(name, *args)
            if name.to_s.start_with?("get_")
              name.to_s.sub("get_", "") + args.length.to_s
            else
              super
            end
          end

          def respond_to_missing?(name, include_private = false)
            name.to_s.start_with?("get_")
          end
        end

        g = Ghost.new
        [g.get_name(1, 2), g.respond_to?(:get_x), g.respond_to?(:other)]
        "#,
    );
    assert_eq!(render(&value), "[\"name2\", true, false]");
}

#[test]
fn method_missing_super_raises_no_method_error() {
    let err = eval_error(
        r#"
        class Ghost
          def method_missing(name, *args)
            super
          end
        end
        Ghost.new.vanish
        "#,
    );
    assert_eq!(err.kind(), DiagnosticKind::NoMethod);
    assert!(err.message().contains("vanish"));
}

#[test]
fn private_methods_refuse_explicit_receivers() {
    let source = r#"
        class Vault
          def open
            secret
          end

          private

          def secret
            "gold"
          end
        end
    "#;
    let value = eval(&format!("{source}\n[Vault.new.open, Vault.new.send(:secret)]"));
    assert_eq!(render(&value), "[\"gold\", \"gold\"]");

    let err = eval_error(&format!("{source}\nVault.new.secret"));
    assert_eq!(err.kind(), DiagnosticKind::NoMethod);
    assert!(err.message().contains("private method 'secret'"));

    let err = eval_error(&format!("{source}\nVault.new.public_send(:secret)"));
    assert_eq!(err.kind(), DiagnosticKind::NoMethod);
}

#[test]
fn protected_methods_are_callable_from_the_same_family() {
    let source = r#"
        class Account
          def initialize(balance)
            @balance = balance
          end

          def richer_than?(other)
            balance > other.balance
          end

          protected

          def balance
            @balance
          end
        end
    "#;
    let value = eval(&format!("{source}\nAccount.new(5).richer_than?(Account.new(3))"));
    assert_eq!(render(&value), "true");

    let err = eval_error(&format!("{source}\nAccount.new(5).balance"));
    assert!(err.message().contains("protected method 'balance'"));
}

#[test]
fn classes_can_be_reopened() {
    let value = eval(
        r#"
        class Box
          def a
            1
          end
        end

        class Box
          def b
            2
          end
        end

        class Integer
          def double
            self * 2
          end
        end

        [Box.new.a + Box.new.b, 21.double]
        "#,
    );
    assert_eq!(render(&value), "[3, 42]");
}

#[test]
fn nested_constants_resolve_lexically() {
    let value = eval(
        r#"
        module Outer
          LIMIT = 10

          class Inner
            def limit
              LIMIT
            end
          end
        end

        [Outer::Inner.new.limit, Outer::LIMIT, Outer::Inner.name]
        "#,
    );
    assert_eq!(render(&value), "[10, 10, \"Outer::Inner\"]");
}

#[test]
fn reflection_on_objects() {
    let value = eval(
        r#"
        class Pair
          def initialize
            @left = 1
            @right = 2
          end
        end

        pair = Pair.new
        pair.instance_variable_set("@left", 5)
        [
          pair.instance_variables.map(&:to_s),
          pair.instance_variable_get("@left"),
          pair.class.name,
          pair.instance_of?(Pair),
          pair.is_a?(Object),
          pair.respond_to?(:initialize)
        ]
        "#,
    );
    assert_eq!(
        render(&value),
        "[[\"@left\", \"@right\"], 5, \"Pair\", true, true, false]"
    );
}

#[test]
fn frozen_objects_reject_mutation() {
    let err = eval_error(
        r#"
        class Cell
          attr_accessor :value
        end
        cell = Cell.new
        cell.freeze
        cell.value = 1
        "#,
    );
    assert_eq!(err.kind(), DiagnosticKind::Frozen);
}

#[test]
fn initialize_arity_is_enforced() {
    let err = eval_error(
        r#"
        class Pair
          def initialize(a, b)
          end
        end
        Pair.new(1)
        "#,
    );
    assert_eq!(err.kind(), DiagnosticKind::Argument);
    assert!(err.message().contains("given 1, expected 2"));
}

#[test]
fn instance_eval_and_class_eval_rebind_self() {
    let value = eval(
        r#"
        class Secret
          def initialize
            @code = 42
          end
        end

        Secret.class_eval do
          def reveal
            @code
          end
        end

        s = Secret.new
        [s.instance_eval { @code }, s.reveal]
        "#,
    );
    assert_eq!(render(&value), "[42, 42]");
}

#[test]
fn method_missing_resending_the_same_name_is_a_no_method_error() {
    let err = eval_error(
        r#"
        class Echo
          def method_missing(name, *args)
            send(name)
          end
        end
        Echo.new.anything
        "#,
    );
    assert_eq!(err.kind(), DiagnosticKind::NoMethod);
    assert!(err.message().contains("anything"));
}

#[test]
fn reincluding_a_module_moves_it_to_the_front() {
    let value = eval(
        r#"
        module Loud
          def voice
            "LOUD"
          end
        end
        module Quiet
          def voice
            "quiet"
          end
        end
        class Speaker
          include Loud
          include Quiet
        end
        before = Speaker.new.voice
        Speaker.include(Loud)
        [before, Speaker.new.voice]
        "#,
    );
    assert_eq!(render(&value), "[\"quiet\", \"LOUD\"]");
}

#[test]
fn const_set_requires_a_constant_name() {
    let err = eval_error("class Crate\nend\nCrate.const_set(:lower, 1)");
    assert_eq!(err.kind(), DiagnosticKind::Name);
    let value = eval("class Crate\nend\nCrate.const_set(:LIMIT, 3)\nCrate::LIMIT");
    assert_eq!(value.as_int(), Some(3));
}

#[test]
fn class_variable_reflection_validates_its_arguments() {
    let setup = "class Counter\n  @@count = 2\nend\n";
    let value = eval(&format!("{setup}Counter.class_variable_get(:@@count)"));
    assert_eq!(value.as_int(), Some(2));

    let err = eval_error(&format!("{setup}Counter.class_variable_get(:count)"));
    assert_eq!(err.kind(), DiagnosticKind::Name);
    let err = eval_error(&format!("{setup}Counter.class_variable_get(42)"));
    assert_eq!(err.kind(), DiagnosticKind::Type);
    let err = eval_error(&format!("{setup}Counter.class_variable_get"));
    assert_eq!(err.kind(), DiagnosticKind::Argument);
    let err = eval_error(&format!("{setup}Counter.class_variable_set(:@@count)"));
    assert_eq!(err.kind(), DiagnosticKind::Argument);
}

#[test]
fn alias_method_requires_an_existing_method() {
    let err = eval_error(
        r#"
        class Greeter
          alias_method :hi, :hello
        end
        "#,
    );
    assert_eq!(err.kind(), DiagnosticKind::Name);
}

#[test]
fn define_method_requires_a_body() {
    let err = eval_error(
        r#"
        class Greeter
          define_method(:hello)
        end
        "#,
    );
    assert_eq!(err.kind(), DiagnosticKind::Argument);
}
