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

fn inspect(source: &str) -> String {
    format!("{:?}", eval(source))
}

#[test]
fn string_case_and_whitespace() {
    assert_eq!(
        inspect(r#"["hello world".capitalize, "MiXeD".swapcase, "  pad  ".strip, "line\n".chomp, "abc".reverse]"#),
        r#"["Hello world", "mIxEd", "pad", "line", "cba"]"#
    );
}

#[test]
fn string_searching() {
    assert_eq!(
        inspect(r#"s = "hello"
[s.include?("ell"), s.start_with?("he"), s.end_with?("lo"), s.index("l"), s.rindex("l"), s[1, 3], s[-1]]"#),
        r#"[true, true, true, 2, 3, "ell", "o"]"#
    );
}

#[test]
fn string_splitting_and_joining() {
    assert_eq!(
        inspect(r#"["a,b,c".split(","), "one  two".split, "a1b22c".split(/\d+/), %w[x y].join("-")]"#),
        r#"[["a", "b", "c"], ["one", "two"], ["a", "b", "c"], "x-y"]"#
    );
}

#[test]
fn string_substitution() {
    assert_eq!(
        inspect(r#"[
  "cat hat".sub("at", "og"),
  "cat hat".gsub("at", "og"),
  "a1b2".gsub(/\d/) { |d| (d.to_i * 2).to_s },
  "john smith".gsub(/(\w+) (\w+)/, '\2 \1'),
  "hello".tr("el", "ip")
]"#),
        r#"["cog hat", "cog hog", "a2b4", "smith john", "hippo"]"#
    );
}

#[test]
fn string_scan_and_match() {
    assert_eq!(
        inspect(r#"[
  "a1 b2 c3".scan(/\d/),
  "k1=v1;k2=v2".scan(/(\w+)=(\w+)/),
  "abc" =~ /c/,
  "abc".match?(/z/)
]"#),
        r#"[["1", "2", "3"], [["k1", "v1"], ["k2", "v2"]], 2, false]"#
    );
}

#[test]
fn string_formatting() {
    assert_eq!(
        inspect(r#"[format("%05.1f", 3.14159), "%s-%d" % ["id", 7], "%x" % 255, "ab".center(6, "*"), "7".rjust(3, "0")]"#),
        r#"["003.1", "id-7", "ff", "**ab**", "007"]"#
    );
}

#[test]
fn string_conversions() {
    assert_eq!(
        inspect(r#"["42".to_i, "3.5".to_f, "12abc".to_i, "name".to_sym, 65.chr, "A".ord, "az".succ]"#),
        r#"[42, 3.5, 12, :name, "A", 65, "ba"]"#
    );
}

#[test]
fn strings_are_mutable_until_frozen() {
    assert_eq!(inspect("s = \"ab\"\ns << \"c\"\ns.upcase!\ns"), "\"ABC\"");
    let err = eval_error("s = \"ab\".freeze\ns << \"c\"");
    assert_eq!(err.kind(), DiagnosticKind::Frozen);
}

#[test]
fn string_multiplication_and_comparison() {
    assert_eq!(
        inspect(r#"["ab" * 3, "a" < "b", "b" <=> "a", "x" == "x"]"#),
        r#"["ababab", true, 1, true]"#
    );
}

#[test]
fn array_access_and_mutation() {
    assert_eq!(
        inspect(
            r#"
            a = [1, 2, 3, 4, 5]
            a.push(6)
            a.unshift(0)
            popped = a.pop
            shifted = a.shift
            [a, popped, shifted, a.first(2), a.last, a[1..2], a[-2], a.values_at(0, 2)]
            "#
        ),
        "[[1, 2, 3, 4, 5], 6, 0, [1, 2], 5, [2, 3], 4, [1, 3]]"
    );
}

#[test]
fn array_transformations() {
    assert_eq!(
        inspect(
            r#"
            nums = [3, 1, 4, 1, 5, 9, 2, 6]
            [
              nums.sort,
              nums.uniq.size,
              nums.select(&:even?),
              nums.reject(&:even?),
              nums.sort_by { |n| -n }.first(2),
              nums.each_slice(3).to_a.length,
              [[1, [2]], [3]].flatten,
              [1, nil, 2, nil].compact
            ]
            "#
        ),
        "[[1, 1, 2, 3, 4, 5, 6, 9], 7, [4, 2, 6], [3, 1, 1, 5, 9], [9, 6], 3, [1, 2, 3], [1, 2]]"
    );
}

#[test]
fn array_set_operations() {
    assert_eq!(
        inspect("[[1, 2, 3] & [2, 3, 4], [1, 2] | [2, 3], [1, 2, 3] - [2], [1, 2] + [3]]"),
        "[[2, 3], [1, 2, 3], [1, 3], [1, 2, 3]]"
    );
}

#[test]
fn array_combinatorics() {
    assert_eq!(
        inspect("[[1, 2].product([3, 4]), [1, 2, 3].combination(2).to_a, [[1, 2], [3, 4]].transpose]"),
        "[[[1, 3], [1, 4], [2, 3], [2, 4]], [[1, 2], [1, 3], [2, 3]], [[1, 3], [2, 4]]]"
    );
}

#[test]
fn array_fetch_errors() {
    let err = eval_error("[1, 2].fetch(10)");
    assert_eq!(err.kind(), DiagnosticKind::Index);
    assert_eq!(eval("[1, 2].fetch(10, :none)").as_symbol().map(|s| s.name().to_string()), Some("none".into()));
}

#[test]
fn enumerable_reductions() {
    assert_eq!(
        inspect(
            r#"
            words = %w[apple banana cherry avocado]
            [
              words.group_by { |w| w[0] },
              words.partition { |w| w.length > 5 },
              words.map(&:length).sum,
              words.inject { |a, b| a.length >= b.length ? a : b },
              words.each_with_object([]) { |w, acc| acc << w.upcase if w.start_with?("a") },
              words.tally.size,
              words.min_by(&:length),
              words.any? { |w| w.include?("y") },
              words.all? { |w| w.length > 4 },
              words.find { |w| w.start_with?("c") }
            ]
            "#
        ),
        concat!(
            r#"[{"a" => ["apple", "avocado"], "b" => ["banana"], "c" => ["cherry"]}, "#,
            r#"[["banana", "cherry", "avocado"], ["apple"]], 24, "avocado", ["APPLE", "AVOCADO"], "#,
            r#"4, "apple", true, true, "cherry"]"#
        )
    );
}

#[test]
fn enumerable_windows_and_zip() {
    assert_eq!(
        inspect("[[1, 2, 3].each_cons(2).to_a, [1, 2].zip([3, 4], [5]), (1..6).each_slice(2).map(&:sum)]"),
        "[[[1, 2], [2, 3]], [[1, 3, 5], [2, 4, nil]], [3, 7, 11]]"
    );
}

#[test]
fn hash_basics() {
    assert_eq!(
        inspect(
            r#"
            h = {b: 2, a: 1}
            h[:c] = 3
            [h.keys, h.values, h.key?(:a), h.fetch(:z, 0), h.dig(:b), h.length, h.delete(:c), h]
            "#
        ),
        "[[:b, :a, :c], [2, 1, 3], true, 0, 2, 3, 3, {b: 2, a: 1}]"
    );
}

#[test]
fn hash_iteration_yields_key_and_value() {
    assert_eq!(
        inspect(
            r#"
            h = {b: 2, a: 1}
            [
              h.select { |k, v| v > 1 },
              h.reject { |k, v| v > 1 },
              h.map { |k, v| [k, v * 2] }.to_h,
              h.transform_values { |v| v * 10 },
              h.sort_by { |k, v| v },
              h.min_by { |k, v| v },
              h.to_a,
              h.invert
            ]
            "#
        ),
        "[{b: 2}, {a: 1}, {b: 4, a: 2}, {b: 20, a: 10}, [[:a, 1], [:b, 2]], [:a, 1], [[:b, 2], [:a, 1]], {2 => :b, 1 => :a}]"
    );
}

#[test]
fn hash_defaults_and_merging() {
    assert_eq!(
        inspect(
            r#"
            counts = Hash.new(0)
            "hello".each_char { |c| counts[c] += 1 }
            merged = {a: 1, b: 2}.merge({b: 3, c: 4}) { |key, old, new| old + new }
            [counts["l"], counts["z"], merged]
            "#
        ),
        "[2, 0, {a: 1, b: 5, c: 4}]"
    );
}

#[test]
fn hash_fetch_raises_key_error() {
    let err = eval_error("{a: 1}.fetch(:b)");
    assert_eq!(err.kind(), DiagnosticKind::Key);
}

#[test]
fn string_keys_inspect_with_arrows() {
    assert_eq!(inspect("table = {\"x\" => 1, 2 => [3]}\ntable"), r#"{"x" => 1, 2 => [3]}"#);
}

#[test]
fn ranges() {
    assert_eq!(
        inspect(
            r#"
            [
              (1..5).to_a,
              (1...5).to_a,
              (1..10).step(3).to_a,
              (1..4).sum,
              (1..4).map { |n| n * n },
              (1..10).include?(5),
              (1...10).size,
              (1..3).reduce(:*)
            ]
            "#
        ),
        "[[1, 2, 3, 4, 5], [1, 2, 3, 4], [1, 4, 7, 10], 10, [1, 4, 9, 16], true, 9, 6]"
    );
}

#[test]
fn endless_ranges_iterate_lazily() {
    assert_eq!(
        inspect(
            r#"
            found = nil
            (1..).each do |n|
              if n * n > 50
                found = n
                break
              end
            end
            found
            "#
        ),
        "8"
    );
}

#[test]
fn integer_methods() {
    assert_eq!(
        inspect("[10.gcd(4), 10.lcm(4), 1234.digits, (-5).abs, 7.divmod(2), 3.times.to_a, 1.upto(3).to_a, 5.clamp(1, 3), 10.pow(3, 7)]"),
        "[2, 20, [4, 3, 2, 1], 5, [3, 1], [0, 1, 2], [1, 2, 3], 3, 6]"
    );
}

#[test]
fn float_methods() {
    assert_eq!(
        inspect("[3.14159.round(2), 2.5.floor, 2.1.ceil, (-3.7).truncate, 10.0 / 4, 7.fdiv(2), 0.1 + 0.2 == 0.3]"),
        "[3.14, 2, 3, -3, 2.5, 3.5, false]"
    );
}

#[test]
fn numeric_coercions() {
    assert_eq!(
        inspect(r#"[Integer("42"), Float("1.5"), 3.to_f, 3.9.to_i, 1 + 2.0, 2 ** 0.5 > 1.41]"#),
        "[42, 1.5, 3.0, 3, 3.0, true]"
    );
    let err = eval_error("1 + \"2\"");
    assert_eq!(err.kind(), DiagnosticKind::Type);
}

#[test]
fn symbols() {
    assert_eq!(
        inspect(r#"[:abc.to_s, :abc.length, :a <=> :b, :upcase.to_proc.call("x"), :"with space"]"#),
        r#"["abc", 3, -1, "X", :"with space"]"#
    );
}

#[test]
fn symbol_to_proc_sends_the_method() {
    assert_eq!(inspect("%w[a b].map(&:upcase)"), r#"["A", "B"]"#);
}

#[test]
fn regexp_captures() {
    assert_eq!(
        inspect(
            r#"
            m = /(?<year>\d{4})-(?<month>\d{2})/.match("due 2024-05-01")
            [m[:year], m["month"], m[0], m.pre_match, m.captures, /ab/i.match?("xAB"), Regexp.escape("a.b")]
            "#
        ),
        r#"["2024", "05", "2024-05", "due ", ["2024", "05"], true, "a\\.b"]"#
    );
}

#[test]
fn regexp_match_failure_returns_nil() {
    assert!(eval(r#"/z/.match("abc")"#).is_nil());
}

#[test]
fn procs_and_methods_as_values() {
    assert_eq!(
        inspect(
            r#"
            def double(x)
              x * 2
            end
            m = method(:double)
            sq = proc { |x| x * x }
            [m.call(4), m.arity, sq.(3), sq[5], [1, 2].map(&sq)]
            "#
        ),
        "[8, 1, 9, 25, [1, 4]]"
    );
}

#[test]
fn exception_objects() {
    assert_eq!(
        inspect(
            r#"
            e = ArgumentError.new("bad input")
            caught = begin
              raise e
            rescue StandardError => err
              err
            end
            [e.message, caught.equal?(e), ArgumentError.ancestors.include?(StandardError), ZeroDivisionError.superclass.name]
            "#
        ),
        r#"["bad input", true, true, "StandardError"]"#
    );
}

#[test]
fn kernel_conversions_and_loop_helpers() {
    assert_eq!(
        inspect(r#"[String(12), Array(nil), Array([1]), [1, 2].frozen?, :a.frozen?]"#),
        r#"["12", [], [1], false, true]"#
    );
}

#[test]
fn object_identity_and_equality() {
    assert_eq!(
        inspect(
            r#"
            a = "x"
            b = "x"
            [a == b, a.equal?(b), a.equal?(a), 1.eql?(1.0), 1 == 1.0, nil.to_a, nil.to_s]
            "#
        ),
        r#"[true, false, true, false, true, [], ""]"#
    );
}

#[test]
fn freezing_twice_is_harmless_and_mutation_still_fails() {
    assert_eq!(
        inspect("a = [1, 2].freeze\na.freeze\nh = {k: 1}.freeze\nh.freeze\n[a.frozen?, h.frozen?, a, h]"),
        "[true, true, [1, 2], {k: 1}]"
    );
    let err = eval_error("a = [1, 2].freeze\na.freeze\na << 3");
    assert_eq!(err.kind(), DiagnosticKind::Frozen);
    let err = eval_error("h = {k: 1}.freeze\nh.freeze\nh[:j] = 2");
    assert_eq!(err.kind(), DiagnosticKind::Frozen);
}

#[test]
fn symbols_inspect_with_a_leading_colon() {
    assert_eq!(inspect(r#"[:foo.inspect, "foo".to_sym.to_s, :foo.to_s]"#), r#"[":foo", "foo", "foo"]"#);
}

#[test]
fn self_referential_containers() {
    assert_eq!(
        inspect(
            r##"
            x = [1]
            x << x
            h = {}
            h[:me] = h
            [x.inspect, h.to_s, "#{x}", x == x.dup, h == h.dup, (x <=> x.dup), x.hash == x.hash]
            "##
        ),
        r#"["[1, [...]]", "{me: {...}}", "[1, [...]]", true, true, 0, true]"#
    );
}

#[test]
fn float_ranges_step_by_one_everywhere() {
    assert_eq!(
        inspect(
            r#"
            seen = []
            (0.5..2.5).each { |v| seen << v }
            looped = []
            for v in 0.5..2.5
              looped << v
            end
            [seen, looped, (0.5..2.5).to_a, (0.5...2.5).map { |v| v * 2 }]
            "#
        ),
        "[[0.5, 1.5, 2.5], [0.5, 1.5, 2.5], [0.5, 1.5, 2.5], [1.0, 3.0]]"
    );
}

#[test]
fn wide_integer_ranges_do_not_overflow() {
    assert_eq!(
        inspect(
            r#"
            a = 2**126
            m = (2**126 - 1) + 2**126
            [(a..a + 10).sum.class, (0..m).size > 0, (0...m).size == m, (a..a + 2).to_a.length]
            "#
        ),
        "[Float, true, true, 3]"
    );
}

#[test]
fn integer_literals_past_i64() {
    assert_eq!(
        inspect(
            "[9223372036854775808, 9223372036854775808 - 1, 0x10000000000000000, \
             340282366920938463463374607431768211456.class, -9223372036854775809]"
        ),
        "[9223372036854775808, 9223372036854775807, 18446744073709551616, Float, -9223372036854775809]"
    );
}

#[test]
fn float_rounding_with_extreme_digit_counts() {
    assert_eq!(
        inspect("[10.0.floor(400), 1.25.floor(1), 10.0.round(400), 1234.5.floor(-400), 3.7.ceil(20)]"),
        "[10.0, 1.2, 10.0, 0, 3.7]"
    );
}

#[test]
fn srand_makes_random_sequences_repeatable() {
    assert_eq!(
        inspect(
            r#"
            srand(42)
            first = [rand(100), rand, [1, 2, 3, 4, 5].shuffle, (1..6).include?(rand(1..6))]
            previous = srand(42)
            second = [rand(100), rand, [1, 2, 3, 4, 5].shuffle, (1..6).include?(rand(1..6))]
            [first == second, previous, [7].sample, [].sample, rand(1...1)]
            "#
        ),
        "[true, 42, 7, nil, nil]"
    );
}
