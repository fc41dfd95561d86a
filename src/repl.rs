//! Interactive front end.
//!
//! Lines accumulate until they parse. A one-liner that opens a block and
//! already has a body, such as `3.times do |i| puts i`, is closed with an
//! implicit `end`; an empty line does the same for a multi-line entry.

use rustyline::{error::ReadlineError, DefaultEditor};
use tracing::debug;

use crate::{
    diagnostics::{Diagnostic, GarnetError, Result},
    parser,
    runtime::{Interpreter, Interrupt},
};

const PROMPT: &str = "garnet> ";
const CONTINUATION: &str = "   ...> ";
const MAX_IMPLICIT_ENDS: usize = 4;

/// What the accumulated input amounts to.
#[derive(Debug)]
pub enum Entry {
    Ready(String),
    Incomplete,
    Invalid(Diagnostic),
}

fn is_incomplete(diag: &Diagnostic) -> bool {
    diag.message.contains("unexpected end of input") || diag.message.contains("expected '}'")
}

pub fn classify(source: &str) -> Entry {
    match parser::parse(source) {
        Ok(_) => Entry::Ready(source.to_string()),
        Err(diag) if is_incomplete(&diag) => Entry::Incomplete,
        Err(diag) => Entry::Invalid(diag),
    }
}

/// `source` closed with as many `end`s as it needs, if that makes it parse.
pub fn with_implicit_end(source: &str) -> Option<String> {
    let mut candidate = source.trim_end().to_string();
    for _ in 0..MAX_IMPLICIT_ENDS {
        candidate.push_str("; end");
        if parser::parse(&candidate).is_ok() {
            return Some(candidate);
        }
    }
    None
}

/// Whether a single line already carries a body after its block opener.
fn has_body(line: &str) -> bool {
    let line = line.trim_end();
    if line.contains(';') || line.contains(" then ") {
        return true;
    }
    match line.rfind(" do") {
        Some(at) => {
            let rest = line[at + 3..].trim();
            let rest = match rest.strip_prefix('|') {
                Some(params) => params.split_once('|').map_or("", |(_, body)| body.trim()),
                None => rest,
            };
            !rest.is_empty()
        }
        None => false,
    }
}

/// Decides what to run after `line` was appended to `buffer`.
pub fn submit(buffer: &str, line: &str) -> Entry {
    match classify(buffer) {
        Entry::Incomplete if buffer.lines().count() == 1 && has_body(line) => {
            with_implicit_end(buffer).map_or(Entry::Incomplete, Entry::Ready)
        }
        other => other,
    }
}

pub struct Repl {
    interpreter: Interpreter,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }

    pub fn with_interpreter(interpreter: Interpreter) -> Self {
        Self { interpreter }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        let mut buffer = String::new();
        loop {
            let prompt = if buffer.is_empty() { PROMPT } else { CONTINUATION };
            let line = match editor.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    buffer.clear();
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(readline_error(err)),
            };
            let trimmed = line.trim();
            if buffer.is_empty() && matches!(trimmed, ":quit" | ":exit" | "exit") {
                break;
            }
            if trimmed.is_empty() {
                if buffer.is_empty() {
                    continue;
                }
                match with_implicit_end(&buffer) {
                    Some(source) => self.execute(&source),
                    None => eprintln!("SyntaxError: incomplete input"),
                }
                buffer.clear();
                continue;
            }
            let _ = editor.add_history_entry(trimmed);
            if !buffer.is_empty() {
                buffer.push('\n');
            }
            buffer.push_str(&line);
            match submit(&buffer, &line) {
                Entry::Ready(source) => {
                    self.execute(&source);
                    buffer.clear();
                }
                Entry::Incomplete => debug!("awaiting more input"),
                Entry::Invalid(diag) => {
                    eprintln!("{}: {}", diag.kind.class_name(), diag.message);
                    buffer.clear();
                }
            }
        }
        Ok(())
    }

    fn execute(&mut self, source: &str) {
        match self.interpreter.eval_source(source) {
            Ok(value) => match self.interpreter.inspect(&value) {
                Ok(text) => println!("=> {text}"),
                Err(Interrupt::Error(err)) => report(&err),
                Err(Interrupt::Signal(_)) => println!("=> {value}"),
            },
            Err(err) => report(&err),
        }
    }
}

fn report(err: &GarnetError) {
    match err {
        GarnetError::Diagnostic(diag) => eprintln!("{}: {}", diag.kind.class_name(), diag.message),
        GarnetError::Io(io) => eprintln!("IOError: {io}"),
    }
}

fn readline_error(err: ReadlineError) -> GarnetError {
    GarnetError::from(std::io::Error::other(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_liner_blocks_get_an_implicit_end() {
        let line = "3.times do |i| puts i";
        match submit(line, line) {
            Entry::Ready(source) => assert!(source.ends_with("; end")),
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[test]
    fn bare_openers_wait_for_more_lines() {
        let line = "def greet(name)";
        assert!(matches!(submit(line, line), Entry::Incomplete));
    }

    #[test]
    fn complete_input_runs_as_is() {
        match submit("1 + 2", "1 + 2") {
            Entry::Ready(source) => assert_eq!(source, "1 + 2"),
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[test]
    fn body_detection_ignores_bare_block_parameters() {
        assert!(!has_body("items.each do |item|"));
        assert!(has_body("items.each do |item| p item"));
        assert!(has_body("def hi; 1"));
    }
}
