//! Garnet: an embeddable, sandboxable interpreter for a Ruby-inspired
//! scripting language.
//!
//! Source text is lexed and parsed into an [`ast::Expr`] tree, which the
//! [`Interpreter`] walks directly. Hosts extend the language with
//! [`Interpreter::register_function`], [`Interpreter::inject`] and
//! [`Interpreter::register_host_type`]; scripts reach host types only when
//! the [`SecurityPolicy`] allows it.
//!
//! ```no_run
//! use garnet::Interpreter;
//!
//! let mut interp = Interpreter::new();
//! let value = interp.eval_source("[1, 2, 3].map { |x| x * 2 }.sum").unwrap();
//! assert_eq!(value.as_int(), Some(12));
//! ```

use std::sync::Once;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod ast;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod host;
pub mod lexer;
pub mod object;
pub mod output;
pub mod parser;
pub mod range;
pub mod repl;
pub mod runtime;
pub mod security;
pub mod stack;
pub mod stdlib;
pub mod value;

pub use config::InterpreterConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, GarnetError, Result, SourceSpan};
pub use host::{HostFunction, HostType};
pub use output::OutputHandler;
pub use repl::Repl;
pub use runtime::{CallArgs, EvalResult, Interpreter, Interrupt, Signal};
pub use security::{PolicyMode, SecurityPolicy};
pub use value::{Value, ValueKind};

static TRACING: Once = Once::new();

/// Installs a `tracing` subscriber filtered by `RUST_LOG` (default `warn`).
/// Later calls do nothing.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();
    });
}
