//! The tree-walking evaluator.
//!
//! Evaluation returns [`EvalResult`]: either a value, a control-flow
//! [`Signal`] travelling to the loop, block call site or method frame that
//! owns it, or a script-visible error. Only errors are seen by `rescue`.

mod call;
mod definitions;
mod eval;
mod exceptions;
mod ops;

use std::sync::Arc;

use indexmap::IndexMap;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, instrument};

use crate::{
    ast::Expr,
    config::InterpreterConfig,
    context::{Context, ContextRef},
    diagnostics::{Diagnostic, DiagnosticKind, GarnetError, Result, SourceSpan},
    object::{ClassRef, ClassRegistry, DynamicObject, MethodBody, MethodEntry},
    output::OutputHandler,
    parser,
    security::SecurityPolicy,
    stdlib::StdlibRegistry,
    value::{NativeFunction, Value},
};

pub use call::BindMode;
pub(crate) use eval::to_ary;

/// Non-local exits. `Break` carries the id of the closure whose call site
/// it terminates, or `None` for a `while`/`until`/`for` loop.
#[derive(Debug, Clone)]
pub enum Signal {
    Break(Value, Option<u64>),
    Next(Value),
    Redo,
    Retry,
    Return(Value),
}

#[derive(Debug)]
pub enum Interrupt {
    Signal(Signal),
    Error(GarnetError),
}

impl Interrupt {
    /// Records `span` on errors that do not carry one yet.
    pub fn or_span(self, span: SourceSpan) -> Self {
        match self {
            Interrupt::Error(GarnetError::Diagnostic(diag)) => {
                Interrupt::Error(GarnetError::Diagnostic(diag.or_span(span)))
            }
            other => other,
        }
    }
}

impl From<Diagnostic> for Interrupt {
    fn from(diag: Diagnostic) -> Self {
        Interrupt::Error(GarnetError::Diagnostic(diag))
    }
}

impl From<GarnetError> for Interrupt {
    fn from(err: GarnetError) -> Self {
        Interrupt::Error(err)
    }
}

pub type EvalResult<T = Value> = std::result::Result<T, Interrupt>;

/// Evaluated arguments of one call.
#[derive(Clone, Default)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    /// Trailing `key: value` arguments, as a Hash.
    pub keywords: Option<Value>,
    pub block: Option<Value>,
    pub span: SourceSpan,
}

impl CallArgs {
    pub fn new(positional: Vec<Value>) -> Self {
        Self {
            positional,
            ..Self::default()
        }
    }

    pub fn with_block(mut self, block: Option<Value>) -> Self {
        self.block = block;
        self
    }

    /// Moves keyword arguments into a trailing positional Hash.
    pub fn folded(mut self) -> Self {
        if let Some(keywords) = self.keywords.take() {
            self.positional.push(keywords);
        }
        self
    }

    /// Positional argument `index`, or `nil`.
    pub fn arg(&self, index: usize) -> Value {
        self.positional.get(index).cloned().unwrap_or_else(Value::nil)
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }
}

pub struct Interpreter {
    pub(crate) classes: ClassRegistry,
    pub(crate) natives: StdlibRegistry,
    pub(crate) root: ContextRef,
    policy: Arc<SecurityPolicy>,
    /// Host types by full name, e.g. `System.DateTime`.
    pub(crate) host_types: IndexMap<String, ClassRef>,
    pub(crate) globals: IndexMap<String, Value>,
    config: InterpreterConfig,
    pub(crate) output: OutputHandler,
    depth: usize,
    /// `(receiver id, name)` pairs currently inside `method_missing`.
    missing_stack: Vec<(usize, String)>,
    /// Ids of block literals whose call sites are still running.
    active_blocks: Vec<u64>,
    /// Containers currently being inspected.
    pub(crate) rendering: Vec<usize>,
    /// Container pairs currently being compared by `==` or `<=>`.
    pub(crate) comparing: Vec<(usize, usize)>,
    next_proc_id: u64,
    main: Value,
    /// Source for `rand`, `shuffle` and `sample`; reseeded by `srand`.
    pub(crate) rng: StdRng,
    pub(crate) seed: u64,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        let policy = Arc::new(SecurityPolicy::new(config.policy_mode));
        for name in &config.allowed_types {
            policy.allow_type(name.clone());
        }
        for namespace in &config.allowed_namespaces {
            policy.allow_namespace(namespace.clone());
        }
        Self::with_policy(config, policy)
    }

    /// Builds an interpreter that consults a policy shared with the host.
    pub fn with_policy(config: InterpreterConfig, policy: Arc<SecurityPolicy>) -> Self {
        let classes = ClassRegistry::bootstrap();
        let main = Value::object(DynamicObject::new(classes.object.clone()));
        let root = Context::root(main.clone(), classes.object.clone());
        let output = if config.capture_output {
            OutputHandler::buffer()
        } else {
            OutputHandler::Stdout
        };
        let seed = rand::thread_rng().gen();
        let mut interpreter = Self {
            classes,
            natives: StdlibRegistry::new(),
            root,
            policy,
            host_types: IndexMap::new(),
            globals: IndexMap::new(),
            config,
            output,
            depth: 0,
            missing_stack: Vec::new(),
            active_blocks: Vec::new(),
            rendering: Vec::new(),
            comparing: Vec::new(),
            next_proc_id: 1,
            main,
            rng: StdRng::seed_from_u64(seed),
            seed,
        };
        crate::host::install_system_types(&mut interpreter);
        debug!(
            mode = ?interpreter.policy.mode(),
            max_call_depth = interpreter.config.max_call_depth,
            "interpreter ready"
        );
        interpreter
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn policy(&self) -> &Arc<SecurityPolicy> {
        &self.policy
    }

    pub fn set_output(&mut self, output: OutputHandler) {
        self.output = output;
    }

    /// Drains output captured with `capture_output`.
    pub fn take_output(&self) -> String {
        self.output.take()
    }

    /// Parses and runs a program, returning the value of its last command.
    #[instrument(level = "debug", skip_all, fields(len = source.len()))]
    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        let program = parser::parse(source)?;
        self.eval_program(&program)
    }

    /// Runs an already-parsed program in the root context.
    pub fn eval_program(&mut self, program: &Expr) -> Result<Value> {
        let root = self.root.clone();
        let result = self.eval(program, &root);
        self.depth = 0;
        self.missing_stack.clear();
        self.active_blocks.clear();
        self.rendering.clear();
        self.comparing.clear();
        self.finish(result)
    }

    /// Converts an evaluation outcome into a host-facing result.
    fn finish(&mut self, result: EvalResult) -> Result<Value> {
        match result {
            Ok(value) => Ok(value),
            Err(Interrupt::Error(err)) => Err(err),
            Err(Interrupt::Signal(signal)) => Err(GarnetError::from(signal_error(&signal))),
        }
    }

    /// Calls a top-level method such as one registered with
    /// [`register_function`](Self::register_function).
    pub fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let main = self.main.clone();
        let result = self.send(&main, name, CallArgs::new(args));
        self.finish(result)
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        let name = if name.starts_with('$') {
            name.to_string()
        } else {
            format!("${name}")
        };
        self.globals.insert(name, value);
    }

    /// Installs a host callable as a method on `Object`, so scripts can call
    /// it from anywhere.
    pub fn register_function(
        &mut self,
        name: &str,
        arity: i32,
        callback: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) {
        debug!(%name, arity, "host function registered");
        let function = NativeFunction::new(name, arity, move |_, _, args| {
            callback(&args.folded().positional).map_err(Interrupt::from)
        });
        self.classes
            .object
            .borrow_mut()
            .define_method(MethodEntry::new(name, MethodBody::Native(function)));
    }

    /// Looks up a class or module by constant path such as `Outer::Inner`.
    pub fn lookup_class(&self, path: &str) -> Option<ClassRef> {
        if let Some(class) = self.host_types.get(path) {
            return Some(class.clone());
        }
        let mut current = self.classes.object.clone();
        for segment in path.split("::") {
            let next = current
                .borrow()
                .constants
                .get(segment)
                .and_then(Value::as_class)
                .cloned()?;
            current = next;
        }
        Some(current)
    }

    /// Names of the methods defined directly on a class, including natives,
    /// for documentation scanners.
    pub fn registered_methods(&self, class_name: &str) -> Option<Vec<String>> {
        let class = self.lookup_class(class_name)?;
        let class = class.borrow();
        let mut names: Vec<String> = class.methods.keys().cloned().collect();
        if let Some(native) = class.native_name.as_deref() {
            for name in self.natives.methods_of(native) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Some(names)
    }

    /// Every class and module reachable from `Object`'s constants, plus the
    /// registered host types.
    pub fn class_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut pending = vec![self.classes.object.clone()];
        let mut seen: Vec<ClassRef> = Vec::new();
        while let Some(class) = pending.pop() {
            if seen.iter().any(|c| std::rc::Rc::ptr_eq(c, &class)) {
                continue;
            }
            seen.push(class.clone());
            for value in class.borrow().constants.values() {
                if let Some(inner) = value.as_class() {
                    names.push(inner.borrow().full_name());
                    pending.push(inner.clone());
                }
            }
        }
        names.extend(self.host_types.keys().cloned());
        names.sort();
        names.dedup();
        names
    }

    pub(crate) fn main(&self) -> Value {
        self.main.clone()
    }

    pub(crate) fn next_proc_id(&mut self) -> u64 {
        let id = self.next_proc_id;
        self.next_proc_id += 1;
        id
    }

    pub(crate) fn enter_call(&mut self) -> EvalResult<()> {
        if self.depth >= self.config.max_call_depth {
            return Err(Diagnostic::new(DiagnosticKind::SystemStack, "stack level too deep").into());
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn exit_call(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// The error a signal becomes when nothing owns it.
pub(crate) fn signal_error(signal: &Signal) -> Diagnostic {
    let message = match signal {
        Signal::Break(..) => "break from proc-closure",
        Signal::Next(_) => "unexpected next",
        Signal::Redo => "unexpected redo",
        Signal::Retry => "retry outside of rescue clause",
        Signal::Return(_) => "unexpected return",
    };
    Diagnostic::new(DiagnosticKind::LocalJump, message)
}
