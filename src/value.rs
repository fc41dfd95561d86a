use std::{
    any::Any,
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{
    ast::BlockLiteral,
    context::ContextRef,
    diagnostics::{arity_error, Diagnostic, DiagnosticKind},
    object::{ClassRef, DynamicObject, MethodEntry},
    runtime::{CallArgs, EvalResult, Interpreter},
};

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

pub enum ValueKind {
    Nil,
    Bool(bool),
    Int(i64),
    /// Integers that overflowed `i64`; normalised back to `Int` when they fit.
    BigInt(i128),
    Float(f64),
    String(StringValue),
    Symbol(Symbol),
    Array(ArrayValue),
    Hash(HashValue),
    Range(RangeValue),
    Regex(RegexValue),
    MatchData(MatchDataValue),
    Proc(Proc),
    Method(MethodValue),
    Object(DynamicObject),
    Class(ClassRef),
    Host(NativeObject),
    /// A dotted prefix of registered host types, such as `System`.
    HostNamespace(String),
}

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn nil() -> Self {
        Self::new(ValueKind::Nil)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Int(value))
    }

    /// Builds an integer, keeping the narrow representation when it fits.
    pub fn integer(value: i128) -> Self {
        match i64::try_from(value) {
            Ok(narrow) => Self::int(narrow),
            Err(_) => Self::new(ValueKind::BigInt(value)),
        }
    }

    pub fn float(value: f64) -> Self {
        Self::new(ValueKind::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(StringValue::new(value.into())))
    }

    pub fn symbol(name: &str) -> Self {
        Self::new(ValueKind::Symbol(Symbol::new(name)))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(ArrayValue::new(values)))
    }

    pub fn hash(entries: IndexMap<HashKey, (Value, Value)>) -> Self {
        Self::new(ValueKind::Hash(HashValue::new(entries)))
    }

    pub fn hash_from_pairs(pairs: Vec<(Value, Value)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(key, value)| (HashKey::from_value(&key), (key, value)))
            .collect();
        Self::hash(entries)
    }

    pub fn range(from: Value, to: Value, exclusive: bool) -> Self {
        Self::new(ValueKind::Range(RangeValue {
            from,
            to,
            exclusive,
        }))
    }

    pub fn class(class: ClassRef) -> Self {
        Self::new(ValueKind::Class(class))
    }

    pub fn object(object: DynamicObject) -> Self {
        Self::new(ValueKind::Object(object))
    }

    pub fn proc(proc: Proc) -> Self {
        Self::new(ValueKind::Proc(proc))
    }

    pub fn host(type_name: impl Into<String>, payload: impl Any) -> Self {
        Self::new(ValueKind::Host(NativeObject {
            type_name: type_name.into(),
            payload: Rc::new(payload),
        }))
    }

    pub fn kind(&self) -> &ValueKind {
        &self.0
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(&*self.0, ValueKind::Nil | ValueKind::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(&*self.0, ValueKind::Nil)
    }

    pub fn as_int(&self) -> Option<i64> {
        match &*self.0 {
            ValueKind::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i128> {
        match &*self.0 {
            ValueKind::Int(n) => Some(*n as i128),
            ValueKind::BigInt(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer or float as `f64`.
    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Int(n) => Some(*n as f64),
            ValueKind::BigInt(n) => Some(*n as f64),
            ValueKind::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            &*self.0,
            ValueKind::Int(_) | ValueKind::BigInt(_) | ValueKind::Float(_)
        )
    }

    /// Copy of the text of a string value.
    pub fn as_string(&self) -> Option<String> {
        match &*self.0 {
            ValueKind::String(s) => Some(s.text.borrow().clone()),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match &*self.0 {
            ValueKind::Symbol(sym) => Some(sym),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match &*self.0 {
            ValueKind::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&HashValue> {
        match &*self.0 {
            ValueKind::Hash(hash) => Some(hash),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassRef> {
        match &*self.0 {
            ValueKind::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_proc(&self) -> Option<&Proc> {
        match &*self.0 {
            ValueKind::Proc(proc) => Some(proc),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&DynamicObject> {
        match &*self.0 {
            ValueKind::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_host<T: 'static>(&self) -> Option<&T> {
        match &*self.0 {
            ValueKind::Host(native) => native.payload.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// `equal?`: immediates compare by value, everything else by identity.
    pub fn identical(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Nil, ValueKind::Nil) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Int(a), ValueKind::Int(b)) => a == b,
            (ValueKind::Float(a), ValueKind::Float(b)) => a.to_bits() == b.to_bits(),
            (ValueKind::Symbol(a), ValueKind::Symbol(b)) => a == b,
            (ValueKind::Class(a), ValueKind::Class(b)) => Rc::ptr_eq(a, b),
            _ => Rc::ptr_eq(&self.0, &other.0),
        }
    }

    pub fn object_id(&self) -> usize {
        match &*self.0 {
            ValueKind::Nil => 8,
            ValueKind::Bool(true) => 20,
            ValueKind::Bool(false) => 0,
            ValueKind::Int(n) => (*n as usize).wrapping_mul(2).wrapping_add(1),
            ValueKind::Symbol(sym) => {
                let hash = sym.name().bytes().fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
                    (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3)
                });
                (hash as usize) & !0b111
            }
            ValueKind::Class(class) => Rc::as_ptr(class) as usize,
            _ => Rc::as_ptr(&self.0) as usize,
        }
    }

    pub fn is_frozen(&self) -> bool {
        match &*self.0 {
            ValueKind::String(s) => s.frozen.get(),
            ValueKind::Array(a) => a.frozen.get(),
            ValueKind::Hash(h) => h.frozen.get(),
            ValueKind::Object(o) => o.frozen.get(),
            ValueKind::Class(_) | ValueKind::Proc(_) | ValueKind::Host(_) => false,
            _ => true,
        }
    }

    /// Freezing is idempotent; immediates are always frozen.
    pub fn freeze(&self) {
        match &*self.0 {
            ValueKind::String(s) => s.frozen.set(true),
            ValueKind::Array(a) => a.frozen.set(true),
            ValueKind::Hash(h) => h.frozen.set(true),
            ValueKind::Object(o) => o.frozen.set(true),
            _ => {}
        }
    }

    /// Fails with `FrozenError` when the value may not be mutated.
    pub fn check_frozen(&self, class_name: &str) -> Result<(), Diagnostic> {
        if self.is_frozen() {
            return Err(Diagnostic::new(
                DiagnosticKind::Frozen,
                format!("can't modify frozen {class_name}: {}", self.basic_inspect()),
            ));
        }
        Ok(())
    }

    /// Name of the built-in type, used in messages that cannot dispatch.
    pub fn type_name(&self) -> String {
        match &*self.0 {
            ValueKind::Nil => "NilClass".into(),
            ValueKind::Bool(true) => "TrueClass".into(),
            ValueKind::Bool(false) => "FalseClass".into(),
            ValueKind::Int(_) | ValueKind::BigInt(_) => "Integer".into(),
            ValueKind::Float(_) => "Float".into(),
            ValueKind::String(_) => "String".into(),
            ValueKind::Symbol(_) => "Symbol".into(),
            ValueKind::Array(_) => "Array".into(),
            ValueKind::Hash(_) => "Hash".into(),
            ValueKind::Range(_) => "Range".into(),
            ValueKind::Regex(_) => "Regexp".into(),
            ValueKind::MatchData(_) => "MatchData".into(),
            ValueKind::Proc(_) => "Proc".into(),
            ValueKind::Method(_) => "Method".into(),
            ValueKind::Object(object) => object.class.borrow().full_name(),
            ValueKind::Class(class) => {
                if class.borrow().is_module {
                    "Module".into()
                } else {
                    "Class".into()
                }
            }
            ValueKind::Host(native) => native.type_name.clone(),
            ValueKind::HostNamespace(_) => "Module".into(),
        }
    }

    /// `inspect` without dispatching to script-defined methods.
    pub fn basic_inspect(&self) -> String {
        self.basic_inspect_within(&mut Vec::new())
    }

    /// `open` holds the ids of containers already being rendered; meeting
    /// one again prints `[...]` or `{...}`.
    fn basic_inspect_within(&self, open: &mut Vec<usize>) -> String {
        let id = self.object_id();
        match &*self.0 {
            ValueKind::Array(_) if open.contains(&id) => "[...]".into(),
            ValueKind::Hash(_) if open.contains(&id) => "{...}".into(),
            ValueKind::Array(array) => {
                let items = array.items.borrow().clone();
                open.push(id);
                let items: Vec<String> = items.iter().map(|item| item.basic_inspect_within(open)).collect();
                open.pop();
                format!("[{}]", items.join(", "))
            }
            ValueKind::Hash(hash) => {
                let pairs: Vec<(Value, Value)> = hash.entries.borrow().values().cloned().collect();
                if pairs.is_empty() {
                    return "{}".into();
                }
                open.push(id);
                let entries: Vec<String> = pairs
                    .iter()
                    .map(|(key, value)| {
                        let value = value.basic_inspect_within(open);
                        match key.as_symbol() {
                            Some(sym) if sym.is_simple() => format!("{}: {value}", sym.name()),
                            _ => format!("{} => {value}", key.basic_inspect_within(open)),
                        }
                    })
                    .collect();
                open.pop();
                format!("{{{}}}", entries.join(", "))
            }
            ValueKind::Nil => "nil".into(),
            ValueKind::String(s) => inspect_str(&s.text.borrow()),
            ValueKind::Symbol(sym) => sym.inspect(),
            ValueKind::Range(range) => format!(
                "{}{}{}",
                range.from.basic_inspect_within(open),
                if range.exclusive { "..." } else { ".." },
                range.to.basic_inspect_within(open)
            ),
            ValueKind::Object(object) => format!("#<{}>", object.class.borrow().full_name()),
            _ => self.to_string(),
        }
    }
}

/// Formats one hash entry, using `key: value` for plain symbol keys.
pub fn inspect_pair(key: &Value, value: &str) -> String {
    match key.as_symbol() {
        Some(sym) if sym.is_simple() => format!("{}: {value}", sym.name()),
        _ => format!("{} => {value}", key.basic_inspect()),
    }
}

pub fn inspect_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{1b}' => out.push_str("\\e"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if value == value.trunc() && value.abs() < 1e16 {
        return format!("{value:.1}");
    }
    let text = format!("{value}");
    if value.abs() >= 1e16 || (value != 0.0 && value.abs() < 1e-4) {
        let exp = format!("{value:e}");
        if let Some((mantissa, exponent)) = exp.split_once('e') {
            let mantissa = if mantissa.contains('.') {
                mantissa.to_string()
            } else {
                format!("{mantissa}.0")
            };
            let sign = if exponent.starts_with('-') { "-" } else { "+" };
            let digits = exponent.trim_start_matches('-');
            let digits = if digits.len() < 2 {
                format!("0{digits}")
            } else {
                digits.to_string()
            };
            return format!("{mantissa}e{sign}{digits}");
        }
    }
    text
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ValueKind::Nil => Ok(()),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::BigInt(n) => write!(f, "{n}"),
            ValueKind::Float(n) => f.write_str(&format_float(*n)),
            ValueKind::String(s) => f.write_str(&s.text.borrow()),
            ValueKind::Symbol(sym) => f.write_str(sym.name()),
            ValueKind::Array(_) | ValueKind::Hash(_) | ValueKind::Range(_) => {
                f.write_str(&self.basic_inspect())
            }
            ValueKind::Regex(regex) => write!(f, "/{}/{}", regex.source, regex.flags),
            ValueKind::MatchData(data) => {
                f.write_str(data.groups.first().and_then(|g| g.as_deref()).unwrap_or(""))
            }
            ValueKind::Proc(proc) => {
                if proc.is_lambda {
                    write!(f, "#<Proc:{:#x} (lambda)>", proc.id)
                } else {
                    write!(f, "#<Proc:{:#x}>", proc.id)
                }
            }
            ValueKind::Method(method) => write!(f, "#<Method: {}>", method.name),
            ValueKind::Object(object) => write!(f, "#<{}>", object.class.borrow().full_name()),
            ValueKind::Class(class) => f.write_str(&class.borrow().full_name()),
            ValueKind::Host(native) => write!(f, "#<{}>", native.type_name),
            ValueKind::HostNamespace(name) => f.write_str(&name.replace('.', "::")),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.basic_inspect())
    }
}

/// Interned-by-value identifier; equality and hashing use the name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Self(Rc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether the name can be written as a bare `:name` literal.
    pub fn is_simple(&self) -> bool {
        let name = self.name();
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        if first.is_alphabetic() || first == '_' {
            let body = name.trim_end_matches(['?', '!', '=']);
            let suffix_len = name.len() - body.len();
            return suffix_len <= 1 && body.chars().all(|c| c.is_alphanumeric() || c == '_');
        }
        if let Some(rest) = name.strip_prefix("@@").or_else(|| name.strip_prefix('@')) {
            return !rest.is_empty() && rest.chars().all(|c| c.is_alphanumeric() || c == '_');
        }
        matches!(
            name,
            "+" | "-" | "*" | "/" | "%" | "**" | "==" | "!=" | "<" | ">" | "<=" | ">=" | "<=>"
                | "===" | "=~" | "[]" | "[]=" | "<<" | ">>" | "!" | "&" | "|" | "^" | "~"
                | "+@" | "-@"
        )
    }

    pub fn inspect(&self) -> String {
        if self.is_simple() {
            format!(":{}", self.name())
        } else {
            format!(":{}", inspect_str(self.name()))
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

pub struct StringValue {
    pub text: RefCell<String>,
    pub frozen: Cell<bool>,
}

impl StringValue {
    pub fn new(text: String) -> Self {
        Self {
            text: RefCell::new(text),
            frozen: Cell::new(false),
        }
    }
}

pub struct ArrayValue {
    pub items: RefCell<Vec<Value>>,
    pub frozen: Cell<bool>,
}

impl ArrayValue {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: RefCell::new(items),
            frozen: Cell::new(false),
        }
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

pub struct HashValue {
    pub entries: RefCell<IndexMap<HashKey, (Value, Value)>>,
    pub default: RefCell<Value>,
    pub default_proc: RefCell<Option<Value>>,
    pub frozen: Cell<bool>,
}

impl HashValue {
    pub fn new(entries: IndexMap<HashKey, (Value, Value)>) -> Self {
        Self {
            entries: RefCell::new(entries),
            default: RefCell::new(Value::nil()),
            default_proc: RefCell::new(None),
            frozen: Cell::new(false),
        }
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries
            .borrow()
            .get(&HashKey::from_value(key))
            .map(|(_, value)| value.clone())
    }

    pub fn insert(&self, key: Value, value: Value) {
        let hash_key = HashKey::from_value(&key);
        let mut entries = self.entries.borrow_mut();
        match entries.get_mut(&hash_key) {
            Some(slot) => slot.1 = value,
            None => {
                entries.insert(hash_key, (key, value));
            }
        }
    }

    pub fn remove(&self, key: &Value) -> Option<Value> {
        self.entries
            .borrow_mut()
            .shift_remove(&HashKey::from_value(key))
            .map(|(_, value)| value)
    }

    pub fn pairs(&self) -> Vec<(Value, Value)> {
        self.entries.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Structural hash key. Strings hash by content; objects by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Nil,
    Bool(bool),
    Int(i128),
    Float(u64),
    Str(String),
    Symbol(Symbol),
    Array(Vec<HashKey>),
    Range(Box<HashKey>, Box<HashKey>, bool),
    Identity(usize),
}

impl HashKey {
    pub fn from_value(value: &Value) -> Self {
        Self::from_value_within(value, &mut Vec::new())
    }

    /// An array that contains itself keys its inner occurrence by identity.
    fn from_value_within(value: &Value, open: &mut Vec<usize>) -> Self {
        match &*value.0 {
            ValueKind::Nil => HashKey::Nil,
            ValueKind::Bool(b) => HashKey::Bool(*b),
            ValueKind::Int(n) => HashKey::Int(*n as i128),
            ValueKind::BigInt(n) => HashKey::Int(*n),
            ValueKind::Float(f) => {
                let normalised = if *f == 0.0 { 0.0 } else { *f };
                HashKey::Float(normalised.to_bits())
            }
            ValueKind::String(s) => HashKey::Str(s.text.borrow().clone()),
            ValueKind::Symbol(sym) => HashKey::Symbol(sym.clone()),
            ValueKind::Array(array) => {
                let id = value.object_id();
                if open.contains(&id) {
                    return HashKey::Identity(id);
                }
                let items = array.items.borrow().clone();
                open.push(id);
                let keys = items.iter().map(|item| Self::from_value_within(item, open)).collect();
                open.pop();
                HashKey::Array(keys)
            }
            ValueKind::Range(range) => HashKey::Range(
                Box::new(Self::from_value_within(&range.from, open)),
                Box::new(Self::from_value_within(&range.to, open)),
                range.exclusive,
            ),
            _ => HashKey::Identity(value.object_id()),
        }
    }

    pub fn symbol(name: &str) -> Self {
        HashKey::Symbol(Symbol::new(name))
    }
}

pub struct RangeValue {
    pub from: Value,
    pub to: Value,
    pub exclusive: bool,
}

pub struct RegexValue {
    pub source: String,
    pub regex: regex::Regex,
    pub flags: String,
}

pub struct MatchDataValue {
    /// Group 0 is the whole match; unmatched optional groups are `None`.
    pub groups: Vec<Option<String>>,
    pub names: Vec<Option<String>>,
    pub pre_match: String,
    pub post_match: String,
}

pub type NativeCallback = Rc<dyn Fn(&mut Interpreter, &Value, CallArgs) -> EvalResult>;

/// A method implemented in Rust. `arity` follows `Method#arity`: a negative
/// value `-(n + 1)` means at least `n` arguments.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: Rc<str>,
    pub arity: i32,
    pub callback: NativeCallback,
}

impl NativeFunction {
    pub fn new(
        name: &str,
        arity: i32,
        callback: impl Fn(&mut Interpreter, &Value, CallArgs) -> EvalResult + 'static,
    ) -> Self {
        Self {
            name: Rc::from(name),
            arity,
            callback: Rc::new(callback),
        }
    }

    /// Fixed-arity natives see keyword arguments as a trailing Hash;
    /// variadic ones receive them separately so they can forward them.
    pub fn call(&self, interp: &mut Interpreter, receiver: &Value, args: CallArgs) -> EvalResult {
        let args = if self.arity >= 0 { args.folded() } else { args };
        let given = args.positional.len() + usize::from(args.keywords.is_some());
        check_arity(self.arity, given)?;
        (self.callback)(interp, receiver, args)
    }
}

pub fn check_arity(arity: i32, given: usize) -> Result<(), Diagnostic> {
    if arity >= 0 {
        if given != arity as usize {
            return Err(arity_error(given, arity));
        }
    } else {
        let min = (-arity - 1) as usize;
        if given < min {
            return Err(arity_error(given, format!("{min}+")));
        }
    }
    Ok(())
}

pub struct Proc {
    /// Unique per closure creation; tags `break` so the right call site
    /// consumes it.
    pub id: u64,
    pub body: ProcBody,
    pub is_lambda: bool,
}

pub enum ProcBody {
    Block {
        literal: Rc<BlockLiteral>,
        context: ContextRef,
    },
    Native(NativeFunction),
    /// `Symbol#to_proc`: calls the named method on the first argument.
    Symbol(Symbol),
    Method(MethodValue),
}

impl Proc {
    pub fn arity(&self) -> i64 {
        match &self.body {
            ProcBody::Block { literal, .. } => {
                let params = &literal.params;
                if !self.is_lambda && !params.optional.is_empty() && params.rest.is_none() {
                    -(params.positional_count() as i64) - 1
                } else {
                    params.arity()
                }
            }
            ProcBody::Native(native) => native.arity as i64,
            ProcBody::Symbol(_) => -2,
            ProcBody::Method(method) => method.entry.arity(),
        }
    }
}

/// A method pulled off its receiver with `obj.method(:name)`.
#[derive(Clone)]
pub struct MethodValue {
    pub receiver: Value,
    pub name: String,
    pub owner: ClassRef,
    pub entry: MethodEntry,
}

/// A host value bridged into script code, identified by its host type name.
pub struct NativeObject {
    pub type_name: String,
    pub payload: Rc<dyn Any>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_narrow_when_they_fit() {
        assert!(matches!(Value::integer(5).kind(), ValueKind::Int(5)));
        let wide = i64::MAX as i128 + 1;
        assert!(matches!(Value::integer(wide).kind(), ValueKind::BigInt(_)));
    }

    #[test]
    fn floats_print_like_script_literals() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(1e20), "1.0e+20");
        assert_eq!(format_float(f64::INFINITY), "Infinity");
    }

    #[test]
    fn symbols_inspect_with_colon() {
        assert_eq!(Symbol::new("foo").inspect(), ":foo");
        assert_eq!(Symbol::new("empty?").inspect(), ":empty?");
        assert_eq!(Symbol::new("foo bar").inspect(), ":\"foo bar\"");
    }

    #[test]
    fn self_containing_arrays_render_and_hash() {
        let array = Value::array(vec![Value::int(1)]);
        array.as_array().unwrap().items.borrow_mut().push(array.clone());
        assert_eq!(array.basic_inspect(), "[1, [...]]");
        assert_eq!(
            HashKey::from_value(&array),
            HashKey::Array(vec![HashKey::Int(1), HashKey::Identity(array.object_id())])
        );
        array.as_array().unwrap().items.borrow_mut().clear();
    }

    #[test]
    fn hash_keys_distinguish_int_and_float() {
        assert_ne!(
            HashKey::from_value(&Value::int(1)),
            HashKey::from_value(&Value::float(1.0))
        );
        assert_eq!(
            HashKey::from_value(&Value::string("a")),
            HashKey::from_value(&Value::string("a"))
        );
    }

    #[test]
    fn freezing_is_idempotent() {
        let array = Value::array(vec![Value::int(1)]);
        array.freeze();
        array.freeze();
        assert!(array.is_frozen());
        assert!(array.check_frozen("Array").is_err());
    }
}
