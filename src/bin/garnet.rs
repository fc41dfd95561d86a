use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Args, Parser, Subcommand};

use garnet::{init_tracing, GarnetError, Interpreter, InterpreterConfig, PolicyMode, Repl};

#[derive(Parser)]
#[command(author, version, about = "Garnet language interpreter")]
struct Cli {
    #[command(flatten)]
    sandbox: Sandbox,
    #[command(subcommand)]
    command: Option<Command>,
}

/// Host type access. Any allowance switches the policy to whitelist mode.
#[derive(Args)]
struct Sandbox {
    /// Allow one host type, e.g. `System.DateTime`
    #[arg(long = "allow-type", value_name = "TYPE", global = true)]
    allow_types: Vec<String>,
    /// Allow every host type under a namespace, e.g. `System`
    #[arg(long = "allow-namespace", value_name = "NAMESPACE", global = true)]
    allow_namespaces: Vec<String>,
    /// Maximum nesting of method and block calls
    #[arg(long, value_name = "DEPTH", global = true)]
    max_call_depth: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Garnet script file
    Run { script: PathBuf },
    /// Start an interactive REPL session
    Repl,
    /// Evaluate a snippet of Garnet code
    Eval {
        source: String,
        /// Print the inspected value of the last expression
        #[arg(short, long)]
        print: bool,
    },
}

impl Sandbox {
    fn config(&self) -> InterpreterConfig {
        let mut config = InterpreterConfig::default();
        if let Some(depth) = self.max_call_depth {
            config = config.with_max_call_depth(depth);
        }
        if !self.allow_types.is_empty() || !self.allow_namespaces.is_empty() {
            config = config.with_policy_mode(PolicyMode::WhitelistOnly);
        }
        for name in &self.allow_types {
            config = config.allow_type(name);
        }
        for namespace in &self.allow_namespaces {
            config = config.allow_namespace(namespace);
        }
        config
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let mut interpreter = Interpreter::with_config(cli.sandbox.config());
    let outcome = match cli.command.unwrap_or(Command::Repl) {
        Command::Run { script } => run_script(&mut interpreter, &script),
        Command::Repl => Repl::with_interpreter(interpreter).run().map_err(|err| render(&err, None)),
        Command::Eval { source, print } => eval(&mut interpreter, &source, print),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run_script(interpreter: &mut Interpreter, path: &Path) -> Result<(), String> {
    let name = path.display().to_string();
    let source = fs::read_to_string(path).map_err(|err| format!("{name}: {err}"))?;
    interpreter
        .eval_source(&source)
        .map(drop)
        .map_err(|err| render(&err, Some((&name, &source))))
}

fn eval(interpreter: &mut Interpreter, source: &str, print: bool) -> Result<(), String> {
    let value = interpreter
        .eval_source(source)
        .map_err(|err| render(&err, Some(("-e", source))))?;
    if print {
        interpreter
            .call_function("p", vec![value])
            .map_err(|err| render(&err, None))?;
    }
    Ok(())
}

/// `file:line:column: Class: message` when the error has a location.
fn render(err: &GarnetError, origin: Option<(&str, &str)>) -> String {
    let GarnetError::Diagnostic(diag) = err else {
        return format!("error: {err}");
    };
    let mut out = match (origin, diag.span) {
        (Some((name, source)), Some(span)) => {
            let before = source.get(..span.start).unwrap_or(source);
            let line = before.matches('\n').count() + 1;
            let column = before.rfind('\n').map_or(before.len(), |at| before.len() - at - 1) + 1;
            format!("{name}:{line}:{column}: {}: {}", diag.kind, diag.message)
        }
        _ => format!("{}: {}", diag.kind, diag.message),
    };
    for note in &diag.notes {
        out.push_str("\n  note: ");
        out.push_str(note);
    }
    out
}
