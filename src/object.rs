//! Classes, modules and instances created by script code.
//!
//! Method resolution is a pure function over the ancestor list of a class:
//! own methods, then included modules from the most recently included to the
//! oldest, then the superclass, recursively. Built-in classes carry a
//! `native_name` so lookups fall through to the standard-library registry
//! after their own method table.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    ast::MethodDef,
    diagnostics::{argument_error, name_error, Diagnostic},
    stdlib::{singleton_key, StdlibRegistry},
    value::{NativeFunction, Value},
};

pub type ClassRef = Rc<RefCell<DynamicClass>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
        }
    }
}

#[derive(Clone)]
pub enum MethodBody {
    User {
        def: Rc<MethodDef>,
        /// Lexical module nesting at the point of definition.
        cref: Rc<Vec<ClassRef>>,
    },
    /// `define_method` with a block or proc.
    Proc(Value),
    Native(NativeFunction),
    AttrReader(String),
    AttrWriter(String),
    /// `undef_method` marker that stops the ancestor walk.
    Undefined,
}

#[derive(Clone)]
pub struct MethodEntry {
    pub name: String,
    pub body: MethodBody,
    pub visibility: Visibility,
}

impl MethodEntry {
    pub fn new(name: impl Into<String>, body: MethodBody) -> Self {
        Self {
            name: name.into(),
            body,
            visibility: Visibility::Public,
        }
    }

    pub fn native(function: NativeFunction) -> Self {
        Self::new(function.name.to_string(), MethodBody::Native(function))
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn arity(&self) -> i64 {
        match &self.body {
            MethodBody::User { def, .. } => def.params.arity(),
            MethodBody::Proc(value) => value.as_proc().map_or(-1, |proc| proc.arity()),
            MethodBody::Native(native) => native.arity as i64,
            MethodBody::AttrReader(_) => 0,
            MethodBody::AttrWriter(_) => 1,
            MethodBody::Undefined => 0,
        }
    }
}

pub struct DynamicClass {
    /// Short name; empty for anonymous classes.
    pub name: String,
    pub superclass: Option<ClassRef>,
    /// Included modules in inclusion order.
    pub mixins: Vec<ClassRef>,
    pub methods: IndexMap<String, MethodEntry>,
    pub constants: IndexMap<String, Value>,
    pub class_vars: IndexMap<String, Value>,
    /// Instance variables of the class object itself.
    pub ivars: IndexMap<String, Value>,
    /// Enclosing namespace, used for the full name.
    pub lexical_parent: Option<ClassRef>,
    pub is_module: bool,
    pub is_singleton: bool,
    /// Singleton class holding class-level methods and `extend`ed modules.
    pub meta: Option<ClassRef>,
    /// Key into the standard-library registry.
    pub native_name: Option<String>,
}

impl DynamicClass {
    fn blank(name: &str, superclass: Option<ClassRef>, is_module: bool) -> Self {
        Self {
            name: name.to_string(),
            superclass,
            mixins: Vec::new(),
            methods: IndexMap::new(),
            constants: IndexMap::new(),
            class_vars: IndexMap::new(),
            ivars: IndexMap::new(),
            lexical_parent: None,
            is_module,
            is_singleton: false,
            meta: None,
            native_name: None,
        }
    }

    pub fn new_class(name: &str, superclass: Option<ClassRef>) -> ClassRef {
        debug!(%name, "class created");
        Rc::new(RefCell::new(Self::blank(name, superclass, false)))
    }

    pub fn new_module(name: &str) -> ClassRef {
        debug!(%name, "module created");
        Rc::new(RefCell::new(Self::blank(name, None, true)))
    }

    /// Singleton class of an instance; its superclass is the instance's class.
    pub fn new_singleton(label: &str, superclass: Option<ClassRef>) -> ClassRef {
        let mut class = Self::blank(label, superclass, false);
        class.is_singleton = true;
        Rc::new(RefCell::new(class))
    }

    /// Name qualified by the enclosing namespaces, e.g. `Outer::Inner`.
    pub fn full_name(&self) -> String {
        if self.name.is_empty() {
            let kind = if self.is_module { "Module" } else { "Class" };
            return format!("#<{kind}:{:#x}>", self as *const Self as usize);
        }
        let mut parts = vec![self.name.clone()];
        let mut parent = self.lexical_parent.clone();
        while let Some(class) = parent {
            let class = class.borrow();
            parts.push(class.name.clone());
            parent = class.lexical_parent.clone();
        }
        parts.reverse();
        parts.join("::")
    }

    pub fn define_method(&mut self, entry: MethodEntry) {
        debug!(class = %self.name, method = %entry.name, "method defined");
        self.methods.insert(entry.name.clone(), entry);
    }
}

/// Returns the class' singleton class, creating it on first use.
pub fn ensure_meta(class: &ClassRef) -> ClassRef {
    if let Some(meta) = class.borrow().meta.clone() {
        return meta;
    }
    let full_name = class.borrow().full_name();
    let meta = DynamicClass::new_singleton(&format!("#<Class:{full_name}>"), None);
    let native = class
        .borrow()
        .native_name
        .as_deref()
        .map(singleton_key);
    meta.borrow_mut().native_name = native;
    class.borrow_mut().meta = Some(meta.clone());
    meta
}

/// Mixes `module` into `class`. Re-including moves the module to the
/// highest-priority position.
pub fn include_module(class: &ClassRef, module: &ClassRef) -> Result<(), Diagnostic> {
    if Rc::ptr_eq(class, module) || ancestors(module).iter().any(|a| Rc::ptr_eq(a, class)) {
        return Err(argument_error("cyclic include detected"));
    }
    if !module.borrow().is_module {
        return Err(crate::diagnostics::type_error(format!(
            "wrong argument type Class (expected Module): {}",
            module.borrow().full_name()
        )));
    }
    let mut target = class.borrow_mut();
    target.mixins.retain(|existing| !Rc::ptr_eq(existing, module));
    target.mixins.push(module.clone());
    debug!(class = %target.name, module = %module.borrow().name, "module included");
    Ok(())
}

/// Method resolution order of `class`.
pub fn ancestors(class: &ClassRef) -> Vec<ClassRef> {
    let mut out: Vec<ClassRef> = Vec::new();
    let mut current = Some(class.clone());
    while let Some(klass) = current {
        push_unique(&mut out, &klass);
        push_mixins(&mut out, &klass);
        current = klass.borrow().superclass.clone();
    }
    out
}

fn push_mixins(out: &mut Vec<ClassRef>, class: &ClassRef) {
    let mixins = class.borrow().mixins.clone();
    for module in mixins.iter().rev() {
        if push_unique(out, module) {
            push_mixins(out, module);
        }
    }
}

fn push_unique(out: &mut Vec<ClassRef>, class: &ClassRef) -> bool {
    if out.iter().any(|existing| Rc::ptr_eq(existing, class)) {
        return false;
    }
    out.push(class.clone());
    true
}

/// Lookup path for methods called on the class object itself: singleton
/// classes along the superclass chain, then the instance methods of
/// `Class` or `Module`.
pub fn class_ancestors(class: &ClassRef, base: &ClassRef) -> Vec<ClassRef> {
    let mut out = Vec::new();
    let mut current = Some(class.clone());
    while let Some(klass) = current {
        if let Some(meta) = klass.borrow().meta.clone() {
            push_unique(&mut out, &meta);
            push_mixins(&mut out, &meta);
        }
        current = klass.borrow().superclass.clone();
    }
    for ancestor in ancestors(base) {
        push_unique(&mut out, &ancestor);
    }
    out
}

pub fn is_ancestor(ancestors: &[ClassRef], class: &ClassRef) -> bool {
    ancestors.iter().any(|a| Rc::ptr_eq(a, class))
}

#[derive(Clone)]
pub struct ResolvedMethod {
    pub entry: MethodEntry,
    /// Ancestor the method was found on; `super` continues after it.
    pub owner: ClassRef,
}

/// First definition of `name` along `ancestors`, consulting each built-in
/// class' native table after its own methods.
pub fn resolve_method(
    ancestors: &[ClassRef],
    name: &str,
    natives: &StdlibRegistry,
) -> Option<ResolvedMethod> {
    for class in ancestors {
        let klass = class.borrow();
        if let Some(entry) = klass.methods.get(name) {
            if matches!(entry.body, MethodBody::Undefined) {
                return None;
            }
            return Some(ResolvedMethod {
                entry: entry.clone(),
                owner: class.clone(),
            });
        }
        if let Some(native) = klass
            .native_name
            .as_deref()
            .and_then(|type_name| natives.lookup(type_name, name))
        {
            return Some(ResolvedMethod {
                entry: MethodEntry::native(native.clone()),
                owner: class.clone(),
            });
        }
    }
    None
}

/// Method names visible along `ancestors`, nearest first, without duplicates.
pub fn method_names(ancestors: &[ClassRef], natives: &StdlibRegistry) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for class in ancestors {
        let klass = class.borrow();
        for (name, entry) in &klass.methods {
            if entry.visibility != Visibility::Private
                && !matches!(entry.body, MethodBody::Undefined)
                && !names.contains(name)
            {
                names.push(name.clone());
            }
        }
        if let Some(native) = klass.native_name.as_deref() {
            for name in natives.methods_of(native) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
    }
    names
}

/// Reads a class variable from `class` or the nearest ancestor defining it.
pub fn class_var_get(class: &ClassRef, name: &str) -> Option<Value> {
    ancestors(class)
        .iter()
        .find_map(|klass| klass.borrow().class_vars.get(name).cloned())
}

/// Writes to the ancestor that already owns the variable, else to `class`.
pub fn class_var_set(class: &ClassRef, name: &str, value: Value) {
    for klass in ancestors(class) {
        if klass.borrow().class_vars.contains_key(name) {
            klass.borrow_mut().class_vars.insert(name.to_string(), value);
            return;
        }
    }
    class.borrow_mut().class_vars.insert(name.to_string(), value);
}

pub fn class_var_names(class: &ClassRef) -> Vec<String> {
    let mut names = Vec::new();
    for klass in ancestors(class) {
        for name in klass.borrow().class_vars.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// Constant defined on `class` or one of its ancestors.
pub fn const_lookup(class: &ClassRef, name: &str) -> Option<Value> {
    ancestors(class)
        .iter()
        .find_map(|klass| klass.borrow().constants.get(name).cloned())
}

/// Validates a constant-shaped name such as `Foo`.
pub fn check_const_name(name: &str) -> Result<(), Diagnostic> {
    let valid = name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(name_error(format!("wrong constant name {name}")))
    }
}

/// An instance of a script-defined class.
pub struct DynamicObject {
    pub class: ClassRef,
    pub singleton: RefCell<Option<ClassRef>>,
    pub ivars: RefCell<IndexMap<String, Value>>,
    pub frozen: Cell<bool>,
}

impl DynamicObject {
    pub fn new(class: ClassRef) -> Self {
        Self {
            class,
            singleton: RefCell::new(None),
            ivars: RefCell::new(IndexMap::new()),
            frozen: Cell::new(false),
        }
    }

    /// Class used for dispatch: the singleton class when one exists.
    pub fn dispatch_class(&self) -> ClassRef {
        self.singleton
            .borrow()
            .clone()
            .unwrap_or_else(|| self.class.clone())
    }

    pub fn singleton_class(&self) -> ClassRef {
        if let Some(existing) = self.singleton.borrow().clone() {
            return existing;
        }
        let label = format!("#<Class:#<{}>>", self.class.borrow().full_name());
        let singleton = DynamicClass::new_singleton(&label, Some(self.class.clone()));
        *self.singleton.borrow_mut() = Some(singleton.clone());
        singleton
    }
}

/// Built-in classes the evaluator refers to directly.
pub struct ClassRegistry {
    pub basic_object: ClassRef,
    pub object: ClassRef,
    pub module: ClassRef,
    pub class: ClassRef,
    pub kernel: ClassRef,
    pub comparable: ClassRef,
    pub enumerable: ClassRef,
    pub numeric: ClassRef,
    pub integer: ClassRef,
    pub float: ClassRef,
    pub string: ClassRef,
    pub symbol: ClassRef,
    pub array: ClassRef,
    pub hash: ClassRef,
    pub range: ClassRef,
    pub regexp: ClassRef,
    pub match_data: ClassRef,
    pub proc_class: ClassRef,
    pub method: ClassRef,
    pub nil: ClassRef,
    pub true_class: ClassRef,
    pub false_class: ClassRef,
    pub exception: ClassRef,
    pub standard_error: ClassRef,
    pub math: ClassRef,
}

/// Exception hierarchy as `(name, parent)`, parents listed first.
const EXCEPTIONS: &[(&str, &str)] = &[
    ("ScriptError", "Exception"),
    ("SyntaxError", "ScriptError"),
    ("SystemStackError", "Exception"),
    ("StandardError", "Exception"),
    ("ArgumentError", "StandardError"),
    ("NameError", "StandardError"),
    ("NoMethodError", "NameError"),
    ("TypeAccessError", "NameError"),
    ("TypeError", "StandardError"),
    ("RuntimeError", "StandardError"),
    ("FrozenError", "RuntimeError"),
    ("InvalidOperationError", "StandardError"),
    ("ZeroDivisionError", "StandardError"),
    ("IndexError", "StandardError"),
    ("KeyError", "IndexError"),
    ("StopIteration", "IndexError"),
    ("RangeError", "StandardError"),
    ("LocalJumpError", "StandardError"),
    ("IOError", "StandardError"),
    ("NotImplementedError", "ScriptError"),
    ("RegexpError", "StandardError"),
];

impl ClassRegistry {
    /// Creates the built-in hierarchy and registers every class as a
    /// constant on `Object`.
    pub fn bootstrap() -> Self {
        let basic_object = native_class("BasicObject", None);
        let object = native_class("Object", Some(basic_object.clone()));
        let kernel = native_module("Kernel");
        object.borrow_mut().mixins.push(kernel.clone());
        let module = native_class("Module", Some(object.clone()));
        let class = native_class("Class", Some(module.clone()));
        let comparable = native_module("Comparable");
        let enumerable = native_module("Enumerable");
        let numeric = native_class("Numeric", Some(object.clone()));
        numeric.borrow_mut().mixins.push(comparable.clone());
        let integer = native_class("Integer", Some(numeric.clone()));
        let float = native_class("Float", Some(numeric.clone()));
        let string = native_class("String", Some(object.clone()));
        string.borrow_mut().mixins.push(comparable.clone());
        let symbol = native_class("Symbol", Some(object.clone()));
        let array = native_class("Array", Some(object.clone()));
        array.borrow_mut().mixins.push(enumerable.clone());
        let hash = native_class("Hash", Some(object.clone()));
        hash.borrow_mut().mixins.push(enumerable.clone());
        let range = native_class("Range", Some(object.clone()));
        range.borrow_mut().mixins.push(enumerable.clone());
        let regexp = native_class("Regexp", Some(object.clone()));
        let match_data = native_class("MatchData", Some(object.clone()));
        let proc_class = native_class("Proc", Some(object.clone()));
        let method = native_class("Method", Some(object.clone()));
        let nil = native_class("NilClass", Some(object.clone()));
        let true_class = native_class("TrueClass", Some(object.clone()));
        let false_class = native_class("FalseClass", Some(object.clone()));
        let exception = native_class("Exception", Some(object.clone()));
        let math = native_module("Math");

        let mut constants: IndexMap<String, Value> = IndexMap::new();
        for class in [
            &basic_object,
            &object,
            &module,
            &class,
            &kernel,
            &comparable,
            &enumerable,
            &numeric,
            &integer,
            &float,
            &string,
            &symbol,
            &array,
            &hash,
            &range,
            &regexp,
            &match_data,
            &proc_class,
            &method,
            &nil,
            &true_class,
            &false_class,
            &exception,
            &math,
        ] {
            let name = class.borrow().name.clone();
            constants.insert(name, Value::class(class.clone()));
        }

        let mut standard_error = exception.clone();
        for (name, parent) in EXCEPTIONS {
            let parent = match constants.get(*parent).and_then(Value::as_class) {
                Some(parent) => parent.clone(),
                None => exception.clone(),
            };
            let error_class = DynamicClass::new_class(name, Some(parent));
            if *name == "StandardError" {
                standard_error = error_class.clone();
            }
            constants.insert(name.to_string(), Value::class(error_class));
        }

        math.borrow_mut()
            .constants
            .insert("PI".into(), Value::float(std::f64::consts::PI));
        math.borrow_mut()
            .constants
            .insert("E".into(), Value::float(std::f64::consts::E));
        float
            .borrow_mut()
            .constants
            .insert("INFINITY".into(), Value::float(f64::INFINITY));
        float
            .borrow_mut()
            .constants
            .insert("NAN".into(), Value::float(f64::NAN));
        float
            .borrow_mut()
            .constants
            .insert("EPSILON".into(), Value::float(f64::EPSILON));
        integer
            .borrow_mut()
            .constants
            .insert("MAX".into(), Value::int(i64::MAX));

        object.borrow_mut().constants = constants;

        Self {
            basic_object,
            object,
            module,
            class,
            kernel,
            comparable,
            enumerable,
            numeric,
            integer,
            float,
            string,
            symbol,
            array,
            hash,
            range,
            regexp,
            match_data,
            proc_class,
            method,
            nil,
            true_class,
            false_class,
            exception,
            standard_error,
            math,
        }
    }

    /// Top-level constant lookup, e.g. an exception class by name.
    pub fn lookup(&self, name: &str) -> Option<ClassRef> {
        self.object
            .borrow()
            .constants
            .get(name)
            .and_then(Value::as_class)
            .cloned()
    }
}

fn native_class(name: &str, superclass: Option<ClassRef>) -> ClassRef {
    let class = DynamicClass::new_class(name, superclass);
    class.borrow_mut().native_name = Some(name.to_string());
    ensure_meta(&class);
    class
}

fn native_module(name: &str) -> ClassRef {
    let module = DynamicClass::new_module(name);
    module.borrow_mut().native_name = Some(name.to_string());
    ensure_meta(&module);
    module
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(classes: &[ClassRef]) -> Vec<String> {
        classes.iter().map(|c| c.borrow().name.clone()).collect()
    }

    #[test]
    fn later_mixins_come_first() {
        let base = DynamicClass::new_class("Base", None);
        let first = DynamicClass::new_module("First");
        let second = DynamicClass::new_module("Second");
        let class = DynamicClass::new_class("Child", Some(base));
        include_module(&class, &first).unwrap();
        include_module(&class, &second).unwrap();
        assert_eq!(names(&ancestors(&class)), ["Child", "Second", "First", "Base"]);

        include_module(&class, &first).unwrap();
        assert_eq!(names(&ancestors(&class)), ["Child", "First", "Second", "Base"]);
    }

    #[test]
    fn self_inclusion_is_rejected() {
        let module = DynamicClass::new_module("Loop");
        assert!(include_module(&module, &module).is_err());
    }

    #[test]
    fn full_name_walks_lexical_parents() {
        let outer = DynamicClass::new_module("Outer");
        let inner = DynamicClass::new_class("Inner", None);
        inner.borrow_mut().lexical_parent = Some(outer);
        assert_eq!(inner.borrow().full_name(), "Outer::Inner");
    }

    #[test]
    fn resolution_prefers_own_methods() {
        let natives = StdlibRegistry::default();
        let module = DynamicClass::new_module("Greeting");
        let class = DynamicClass::new_class("Greeter", None);
        let entry = |name: &str| MethodEntry::new(name, MethodBody::AttrReader("@x".into()));
        module.borrow_mut().define_method(entry("hello"));
        class.borrow_mut().define_method(entry("hello"));
        include_module(&class, &module).unwrap();
        let found = resolve_method(&ancestors(&class), "hello", &natives).unwrap();
        assert!(Rc::ptr_eq(&found.owner, &class));
    }
}
