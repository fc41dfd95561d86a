//! Native methods of the built-in classes, keyed by `(type_name, method_name)`.
//!
//! Built-in classes carry a `native_name`; method resolution consults the
//! table for that name after the class' own method table. Singleton methods
//! such as `Array.new` live under [`singleton_key`].

mod array;
mod comparable;
mod enumerable;
mod exception;
mod hash;
pub(crate) mod kernel;
mod module;
mod numeric;
mod object;
mod proc;
mod range;
pub mod regexp;
mod string;
mod symbol;

use indexmap::IndexMap;

use crate::{
    diagnostics::{type_error, Diagnostic, DiagnosticKind},
    runtime::{CallArgs, EvalResult, Interpreter},
    value::{NativeFunction, Value, ValueKind},
};

/// Table key for the singleton methods of a built-in class.
pub fn singleton_key(type_name: &str) -> String {
    format!("#<Class:{type_name}>")
}

/// Native methods of one type.
#[derive(Default)]
pub struct NativeTable {
    methods: IndexMap<String, NativeFunction>,
}

impl NativeTable {
    pub fn native(
        &mut self,
        name: &str,
        arity: i32,
        callback: impl Fn(&mut Interpreter, &Value, CallArgs) -> EvalResult + 'static,
    ) -> &mut Self {
        self.methods
            .insert(name.to_string(), NativeFunction::new(name, arity, callback));
        self
    }

    pub fn insert(&mut self, function: NativeFunction) -> &mut Self {
        self.methods.insert(function.name.to_string(), function);
        self
    }

    pub fn alias(&mut self, new_name: &str, old_name: &str) -> &mut Self {
        if let Some(function) = self.methods.get(old_name).cloned() {
            self.methods.insert(new_name.to_string(), function);
        }
        self
    }
}

#[derive(Default)]
pub struct StdlibRegistry {
    types: IndexMap<String, NativeTable>,
}

impl StdlibRegistry {
    /// The registry with every built-in class installed.
    pub fn new() -> Self {
        let mut registry = Self::default();
        object::install(&mut registry);
        kernel::install(&mut registry);
        module::install(&mut registry);
        comparable::install(&mut registry);
        enumerable::install(&mut registry);
        numeric::install(&mut registry);
        string::install(&mut registry);
        symbol::install(&mut registry);
        array::install(&mut registry);
        hash::install(&mut registry);
        range::install(&mut registry);
        proc::install(&mut registry);
        exception::install(&mut registry);
        regexp::install(&mut registry);
        registry
    }

    pub fn table(&mut self, type_name: &str) -> &mut NativeTable {
        self.types.entry(type_name.to_string()).or_default()
    }

    pub fn singleton_table(&mut self, type_name: &str) -> &mut NativeTable {
        self.table(&singleton_key(type_name))
    }

    pub fn lookup(&self, type_name: &str, method: &str) -> Option<&NativeFunction> {
        self.types.get(type_name)?.methods.get(method)
    }

    pub fn methods_of(&self, type_name: &str) -> Vec<String> {
        self.types
            .get(type_name)
            .map(|table| table.methods.keys().cloned().collect())
            .unwrap_or_default()
    }
}

// Argument helpers shared by the native tables.

pub(crate) fn no_block() -> Diagnostic {
    Diagnostic::new(DiagnosticKind::LocalJump, "no block given (yield)")
}

/// The block passed to a native method, which must have one.
pub(crate) fn block_of(args: &CallArgs) -> Result<Value, Diagnostic> {
    args.block.clone().ok_or_else(no_block)
}

fn conversion_error(interp: &Interpreter, value: &Value, target: &str) -> Diagnostic {
    let name = match value.kind() {
        ValueKind::Nil => "nil".to_string(),
        _ => interp.class_name_of(value),
    };
    type_error(format!("no implicit conversion of {name} into {target}"))
}

pub(crate) fn int_arg(interp: &Interpreter, value: &Value) -> Result<i64, Diagnostic> {
    match value.kind() {
        ValueKind::Int(n) => Ok(*n),
        ValueKind::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
        _ => Err(conversion_error(interp, value, "Integer")),
    }
}

pub(crate) fn str_arg(interp: &Interpreter, value: &Value) -> Result<String, Diagnostic> {
    value
        .as_string()
        .ok_or_else(|| conversion_error(interp, value, "String"))
}

pub(crate) fn float_arg(interp: &Interpreter, value: &Value) -> Result<f64, Diagnostic> {
    match value.kind() {
        ValueKind::Int(_) | ValueKind::BigInt(_) | ValueKind::Float(_) => {
            value.as_number().ok_or_else(|| conversion_error(interp, value, "Float"))
        }
        _ => Err(type_error(format!(
            "can't convert {} into Float",
            interp.class_name_of(value)
        ))),
    }
}

/// A method or variable name given as a Symbol or a String.
pub(crate) fn name_arg(value: &Value) -> Result<String, Diagnostic> {
    match value.kind() {
        ValueKind::Symbol(symbol) => Ok(symbol.name().to_string()),
        ValueKind::String(text) => Ok(text.text.borrow().clone()),
        _ => Err(type_error(format!(
            "{} is not a symbol nor a string",
            value.basic_inspect()
        ))),
    }
}

/// Calls a block with one value.
pub(crate) fn yield1(interp: &mut Interpreter, block: &Value, value: Value) -> EvalResult {
    interp.call_proc(block, CallArgs::new(vec![value]))
}

/// Calls a block with several values, as `|a, b|` parameters see them.
pub(crate) fn yield_many(interp: &mut Interpreter, block: &Value, values: Vec<Value>) -> EvalResult {
    interp.call_proc(block, CallArgs::new(values))
}

/// Normalises a possibly negative index against `len`.
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

/// Resolves `[start, length]` or `[range]` slice arguments to a span of a
/// sequence of `len` items.
pub(crate) fn slice_bounds(
    interp: &Interpreter,
    args: &CallArgs,
    len: usize,
) -> Result<Option<(usize, usize)>, Diagnostic> {
    let first = args.arg(0);
    let (start, count) = if let ValueKind::Range(range) = first.kind() {
        let start = int_arg(interp, &range.from)?;
        let end = if range.to.is_nil() {
            -1
        } else {
            int_arg(interp, &range.to)?
        };
        let start = if start < 0 { start + len as i64 } else { start };
        let mut end = if end < 0 { end + len as i64 } else { end };
        if !range.exclusive || range.to.is_nil() {
            end += 1;
        }
        (start, (end - start).max(0))
    } else {
        let start = int_arg(interp, &first)?;
        let count = int_arg(interp, &args.arg(1))?;
        let start = if start < 0 { start + len as i64 } else { start };
        if count < 0 {
            return Ok(None);
        }
        (start, count)
    };
    if start < 0 || start > len as i64 {
        return Ok(None);
    }
    let start = start as usize;
    let end = (start + count as usize).min(len);
    Ok(Some((start, end)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_methods_live_under_their_own_key() {
        let registry = StdlibRegistry::new();
        assert!(registry.lookup(&singleton_key("Array"), "new").is_some());
        assert!(registry.lookup("Array", "new").is_none());
    }

    #[test]
    fn aliases_share_the_implementation() {
        let registry = StdlibRegistry::new();
        let length = registry.lookup("String", "length").unwrap();
        let size = registry.lookup("String", "size").unwrap();
        assert_eq!(length.arity, size.arity);
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
    }
}
