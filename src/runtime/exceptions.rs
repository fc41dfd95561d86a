//! `begin`/`rescue`/`else`/`ensure`, `retry` and `raise`.
//!
//! Errors travel as [`Diagnostic`]s. The exception object a script sees is
//! created lazily when a `rescue` clause inspects the error, unless the error
//! was raised from script code with an object already attached.

use tracing::debug;

use crate::{
    ast::BeginBlock,
    context::ContextRef,
    diagnostics::{type_error, Diagnostic, DiagnosticKind, GarnetError},
    object::{ancestors, ClassRef, DynamicObject},
    value::{Value, ValueKind},
};

use super::{CallArgs, EvalResult, Interpreter, Interrupt, Signal};

impl Interpreter {
    pub(crate) fn eval_begin(&mut self, block: &BeginBlock, ctx: &ContextRef) -> EvalResult {
        loop {
            let outcome = match self.eval(&block.body, ctx) {
                Ok(value) => match &block.else_branch {
                    Some(branch) => self.eval(branch, ctx),
                    None => Ok(value),
                },
                Err(Interrupt::Error(err)) if !block.rescues.is_empty() => {
                    match self.rescue(block, err, ctx) {
                        Err(Interrupt::Signal(Signal::Retry)) => {
                            debug!("retrying begin block");
                            continue;
                        }
                        other => other,
                    }
                }
                Err(other) => Err(other),
            };
            if let Some(ensure) = &block.ensure {
                self.eval(ensure, ctx)?;
            }
            return outcome;
        }
    }

    /// Runs the first matching `rescue` clause, or re-raises `err`.
    fn rescue(&mut self, block: &BeginBlock, err: GarnetError, ctx: &ContextRef) -> EvalResult {
        let diag = match err {
            GarnetError::Diagnostic(diag) => diag,
            GarnetError::Io(io) => Diagnostic::new(DiagnosticKind::Io, io.to_string()),
        };
        let exception = self.exception_object(&diag);
        for clause in &block.rescues {
            let classes = if clause.classes.is_empty() {
                vec![self.classes.standard_error.clone()]
            } else {
                let mut classes = Vec::new();
                for expr in &clause.classes {
                    let value = self.eval(expr, ctx)?;
                    for item in self.splat_items(&value)? {
                        classes.push(self.expect_module(&item)?);
                    }
                }
                classes
            };
            if !classes.iter().any(|class| self.is_a(&exception, class)) {
                continue;
            }
            debug!(class = %self.class_name_of(&exception), "rescued");
            if let Some(target) = &clause.binding {
                self.assign(target, exception.clone(), ctx)?;
            }
            let previous = self.globals.insert("$!".into(), exception);
            let result = self.eval(&clause.body, ctx);
            match previous {
                Some(previous) => self.globals.insert("$!".into(), previous),
                None => self.globals.shift_remove("$!"),
            };
            return result;
        }
        Err(diag.with_exception(exception).into())
    }

    /// The script-visible object for an error.
    pub(crate) fn exception_object(&mut self, diag: &Diagnostic) -> Value {
        if let Some(exception) = &diag.exception {
            return exception.clone();
        }
        let class = self.exception_class(&diag.kind);
        let object = DynamicObject::new(class);
        object
            .ivars
            .borrow_mut()
            .insert("@message".into(), Value::string(diag.message.clone()));
        Value::object(object)
    }

    fn exception_class(&self, kind: &DiagnosticKind) -> ClassRef {
        self.lookup_class(kind.class_name())
            .filter(|class| self.is_exception_class(class))
            .unwrap_or_else(|| self.classes.standard_error.clone())
    }

    pub(crate) fn is_exception_class(&self, class: &ClassRef) -> bool {
        ancestors(class)
            .iter()
            .any(|ancestor| std::rc::Rc::ptr_eq(ancestor, &self.classes.exception))
    }

    /// `raise`, `raise "message"`, `raise Class`, `raise Class, "message"`
    /// or `raise exception`. Always returns an error.
    pub(crate) fn raise(&mut self, args: CallArgs) -> EvalResult {
        let mut positional = args.positional;
        if positional.is_empty() {
            return match self.globals.get("$!").cloned() {
                Some(current) => Err(self.error_for(current)?),
                None => Err(Diagnostic::new(DiagnosticKind::Runtime, "unhandled exception").into()),
            };
        }
        let first = positional.remove(0);
        let message: Vec<Value> = positional.into_iter().take(1).collect();
        let exception = match first.kind() {
            ValueKind::String(_) => {
                let class = self.exception_class(&DiagnosticKind::Runtime);
                self.instantiate(&class, CallArgs::new(vec![first.clone()]))?
            }
            ValueKind::Class(class) if self.is_exception_class(class) => {
                self.instantiate(class, CallArgs::new(message))?
            }
            ValueKind::Object(object) if self.is_exception_class(&object.class) => {
                if let Some(text) = message.into_iter().next() {
                    object.ivars.borrow_mut().insert("@message".into(), text);
                }
                first.clone()
            }
            _ => return Err(type_error("exception class/object expected").into()),
        };
        Err(self.error_for(exception)?)
    }

    /// Wraps an exception object so it propagates as an error.
    pub(crate) fn error_for(&mut self, exception: Value) -> EvalResult<Interrupt> {
        let kind = DiagnosticKind::from_class_name(&self.class_name_of(&exception));
        let message = self.send(&exception, "message", CallArgs::default())?;
        let message = self.to_s(&message)?;
        Ok(Diagnostic::new(kind, message).with_exception(exception).into())
    }
}
