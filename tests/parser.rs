use garnet::{
    ast::{BinaryOp, ExprKind, Literal},
    lexer::{tokenize, TokenKind},
    parser::{self, ParseEventKind, RecordingObserver},
    DiagnosticKind,
};
use pretty_assertions::assert_eq;

fn commands(source: &str) -> Vec<ExprKind> {
    match parser::parse(source).expect("source should parse").kind {
        ExprKind::Sequence(items) => items.into_iter().map(|item| item.kind).collect(),
        other => panic!("expected a sequence, found {other:?}"),
    }
}

#[test]
fn programs_parse_into_a_sequence_of_commands() {
    let parsed = commands("1\n2; 3");
    assert_eq!(parsed.len(), 3);
    assert!(matches!(parsed[0], ExprKind::Literal(Literal::Int(1))));
}

#[test]
fn binary_operators_respect_precedence() {
    let parsed = commands("1 + 2 * 3");
    let ExprKind::Binary { op, right, .. } = &parsed[0] else {
        panic!("expected a binary expression, found {:?}", parsed[0]);
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
}

#[test]
fn exponentiation_is_right_associative() {
    let parsed = commands("2 ** 3 ** 2");
    let ExprKind::Binary { op, right, .. } = &parsed[0] else {
        panic!("expected a binary expression");
    };
    assert_eq!(*op, BinaryOp::Pow);
    assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Pow, .. }));
}

#[test]
fn assigned_names_become_local_variables() {
    let parsed = commands("x = 1\nx\ny");
    assert!(matches!(parsed[1], ExprKind::LocalVar(ref name) if name == "x"));
    assert!(matches!(parsed[2], ExprKind::Call { vcall: true, .. }));
}

#[test]
fn spans_cover_the_source_text() {
    let source = "foo(1, 2)";
    let program = parser::parse(source).expect("source should parse");
    assert_eq!(program.span.start, 0);
    assert_eq!(program.span.end, source.len());
}

#[test]
fn lexer_produces_expected_tokens() {
    let kinds: Vec<TokenKind> = tokenize("x += @y&.z")
        .expect("source should lex")
        .into_iter()
        .map(|token| token.kind)
        .filter(|kind| *kind != TokenKind::Eof)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Identifier,
            TokenKind::OpAssign,
            TokenKind::InstanceVar,
            TokenKind::SafeNav,
            TokenKind::Identifier,
        ]
    );
}

#[test]
fn unterminated_strings_are_lexing_errors() {
    let err = parser::parse("\"open").expect_err("string never closes");
    assert_eq!(err.kind, DiagnosticKind::Syntax);
}

#[test]
fn incomplete_input_reports_end_of_input() {
    for source in ["def foo", "if x", "[1, 2", "foo do |x|"] {
        let err = parser::parse(source).expect_err("input is incomplete");
        assert_eq!(err.kind, DiagnosticKind::Syntax, "{source}");
        assert!(
            err.message.contains("unexpected end of input") || err.message.contains("expected"),
            "{source}: {}",
            err.message
        );
    }
}

#[test]
fn jumps_are_only_legal_inside_loops_and_blocks() {
    assert!(parser::parse("while true\n  break\nend").is_ok());
    assert!(parser::parse("[1].each { next }").is_ok());
    assert!(parser::parse("loop do\n  redo\nend").is_ok());
    let err = parser::parse("next").expect_err("next outside a loop");
    assert_eq!(err.message, "Invalid next");
    let err = parser::parse("while true\n  def f\n    break\n  end\nend").expect_err("def resets the loop");
    assert_eq!(err.message, "Invalid break");
}

#[test]
fn try_parse_commands_keeps_everything_before_the_failure() {
    let (parsed, error) = parser::try_parse_commands("a = 1\nb = 2\nc = (\n");
    assert_eq!(parsed.len(), 2);
    let error = error.expect("the third command fails");
    assert_eq!(error.kind, DiagnosticKind::Syntax);
}

#[test]
fn try_parse_commands_without_errors() {
    let (parsed, error) = parser::try_parse_commands("puts 1\nputs 2");
    assert_eq!(parsed.len(), 2);
    assert!(error.is_none());
}

#[test]
fn observers_see_command_boundaries_and_tokens() {
    let mut observer = RecordingObserver::default();
    parser::parse_with_observer("x = 1\ny = 2", &mut observer).expect("source should parse");
    let entered = observer
        .events
        .iter()
        .filter(|event| event.kind == ParseEventKind::CommandEntered)
        .count();
    let exited: Vec<usize> = observer
        .events
        .iter()
        .filter(|event| event.kind == ParseEventKind::CommandExited)
        .map(|event| event.command_index)
        .collect();
    assert_eq!(entered, 2);
    assert_eq!(exited, vec![0, 1]);
    assert!(observer
        .events
        .iter()
        .any(|event| event.kind == ParseEventKind::TokenRead(TokenKind::Integer)));
}

#[test]
fn observers_are_told_about_errors() {
    let mut errors = Vec::new();
    let mut observer = |event: &garnet::parser::ParseEvent| {
        if let ParseEventKind::Error(message) = &event.kind {
            errors.push((event.command_index, message.clone()));
        }
    };
    let (parsed, error) =
        parser::try_parse_commands_with_observer("ok = 1\nbreak", &mut observer);
    assert_eq!(parsed.len(), 1);
    assert!(error.is_some());
    assert_eq!(errors, vec![(1, "Invalid break".to_string())]);
}

#[test]
fn string_interpolation_parses_embedded_code() {
    let parsed = commands("name = 1\n\"a #{name + 1} b\"");
    assert!(matches!(parsed[1], ExprKind::Interpolated(ref parts) if parts.len() == 3));
}

#[test]
fn blocks_attach_to_the_nearest_call() {
    let parsed = commands("list.map { |x| x }");
    let ExprKind::Call { name, block, .. } = &parsed[0] else {
        panic!("expected a call");
    };
    assert_eq!(name, "map");
    assert!(block.is_some());
}
