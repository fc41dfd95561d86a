//! Lexical scopes.
//!
//! Every method call, class body, block invocation and program gets its own
//! [`Context`]. Block and lambda contexts see and write through to the
//! locals of their enclosing contexts; method, class and root contexts are
//! gates that stop the walk. Contexts are shared through [`ContextRef`] so a
//! closure and its defining scope observe each other's writes.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{
    object::{ClassRef, Visibility},
    value::Value,
};

pub type ContextRef = Rc<Context>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Root,
    Class,
    Method,
    Block,
    Lambda,
}

impl ScopeKind {
    fn is_gate(self) -> bool {
        matches!(self, ScopeKind::Root | ScopeKind::Class | ScopeKind::Method)
    }
}

/// The method invocation a context belongs to, used by `super`, `yield`,
/// `__method__` and `block_given?`.
pub struct MethodFrame {
    pub name: String,
    /// Class or module the running method was found on.
    pub owner: ClassRef,
    pub receiver: Value,
    pub args: Vec<Value>,
    pub keywords: Option<Value>,
    pub block: Option<Value>,
}

pub struct Context {
    pub kind: ScopeKind,
    locals: RefCell<IndexMap<String, Value>>,
    pub self_value: Value,
    pub parent: Option<ContextRef>,
    /// Class receiving `def` definitions made in this scope.
    pub definee: ClassRef,
    /// Lexical module nesting, outermost first, used for constant lookup.
    pub cref: Rc<Vec<ClassRef>>,
    pub frame: Option<Rc<MethodFrame>>,
    /// Proc id that a `break` in this block body targets.
    pub break_tag: Option<u64>,
    /// Number of `while`/`until`/`for` loops currently running in this
    /// context's own body.
    loop_depth: Cell<usize>,
    /// Default visibility for `def` in a class body.
    pub visibility: Cell<Visibility>,
    pub module_function: Cell<bool>,
}

impl Context {
    pub fn root(self_value: Value, object_class: ClassRef) -> ContextRef {
        Rc::new(Self::blank(
            ScopeKind::Root,
            self_value,
            None,
            object_class,
            Rc::new(Vec::new()),
            None,
        ))
    }

    /// Body of `class`/`module`; `self` is the class itself.
    pub fn class_body(parent: &ContextRef, class: ClassRef, cref: Rc<Vec<ClassRef>>) -> ContextRef {
        let self_value = Value::class(class.clone());
        Rc::new(Self::blank(
            ScopeKind::Class,
            self_value,
            Some(parent.clone()),
            class,
            cref,
            None,
        ))
    }

    /// A method invocation. Its parent is the root so the root context stays
    /// reachable, but the method body does not see root locals.
    pub fn method(
        root: &ContextRef,
        frame: MethodFrame,
        definee: ClassRef,
        cref: Rc<Vec<ClassRef>>,
    ) -> ContextRef {
        let self_value = frame.receiver.clone();
        Rc::new(Self::blank(
            ScopeKind::Method,
            self_value,
            Some(root.clone()),
            definee,
            cref,
            Some(Rc::new(frame)),
        ))
    }

    /// One invocation of a block or lambda body inside its captured scope.
    pub fn block(
        captured: &ContextRef,
        self_value: Option<Value>,
        is_lambda: bool,
        break_tag: Option<u64>,
    ) -> ContextRef {
        let mut context = Self::blank(
            if is_lambda {
                ScopeKind::Lambda
            } else {
                ScopeKind::Block
            },
            self_value.unwrap_or_else(|| captured.self_value.clone()),
            Some(captured.clone()),
            captured.definee.clone(),
            captured.cref.clone(),
            captured.frame.clone(),
        );
        context.break_tag = break_tag;
        Rc::new(context)
    }

    /// Body of a method created with `define_method`: a lambda over the
    /// captured scope that runs with the receiver as `self`.
    pub fn method_block(captured: &ContextRef, frame: MethodFrame, break_tag: u64) -> ContextRef {
        let mut context = Self::blank(
            ScopeKind::Lambda,
            frame.receiver.clone(),
            Some(captured.clone()),
            captured.definee.clone(),
            captured.cref.clone(),
            Some(Rc::new(frame)),
        );
        context.break_tag = Some(break_tag);
        Rc::new(context)
    }

    /// A block run with a different `self` and definee, as in
    /// `instance_eval` or `class_eval`.
    pub fn rebound_block(
        captured: &ContextRef,
        self_value: Value,
        definee: ClassRef,
        break_tag: Option<u64>,
    ) -> ContextRef {
        let mut context = Self::blank(
            ScopeKind::Block,
            self_value,
            Some(captured.clone()),
            definee,
            captured.cref.clone(),
            captured.frame.clone(),
        );
        context.break_tag = break_tag;
        Rc::new(context)
    }

    fn blank(
        kind: ScopeKind,
        self_value: Value,
        parent: Option<ContextRef>,
        definee: ClassRef,
        cref: Rc<Vec<ClassRef>>,
        frame: Option<Rc<MethodFrame>>,
    ) -> Self {
        Self {
            kind,
            locals: RefCell::new(IndexMap::new()),
            self_value,
            parent,
            definee,
            cref,
            frame,
            break_tag: None,
            loop_depth: Cell::new(0),
            visibility: Cell::new(Visibility::Public),
            module_function: Cell::new(false),
        }
    }

    /// Contexts whose locals are visible from here, innermost first.
    fn visible(self: &Rc<Self>) -> impl Iterator<Item = ContextRef> {
        let mut next = Some(self.clone());
        std::iter::from_fn(move || {
            let current = next.take()?;
            if !current.kind.is_gate() {
                next = current.parent.clone();
            }
            Some(current)
        })
    }

    pub fn get(self: &Rc<Self>, name: &str) -> Option<Value> {
        self.visible()
            .find_map(|context| context.locals.borrow().get(name).cloned())
    }

    pub fn has_local(self: &Rc<Self>, name: &str) -> bool {
        self.visible()
            .any(|context| context.locals.borrow().contains_key(name))
    }

    /// Assigns to the nearest visible context that already binds `name`,
    /// otherwise creates the binding here.
    pub fn set(self: &Rc<Self>, name: &str, value: Value) {
        for context in self.visible() {
            let mut locals = context.locals.borrow_mut();
            if let Some(slot) = locals.get_mut(name) {
                *slot = value;
                return;
            }
        }
        self.declare(name, value);
    }

    /// Binds `name` in this context only, shadowing outer bindings.
    pub fn declare(&self, name: &str, value: Value) {
        self.locals.borrow_mut().insert(name.to_string(), value);
    }

    /// Visible local names, innermost scope first.
    pub fn local_names(self: &Rc<Self>) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for context in self.visible() {
            for name in context.locals.borrow().keys() {
                if !names.contains(name) && !name.starts_with(['*', '&']) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Whether a `break` here belongs to a running loop rather than a block.
    pub fn in_loop(&self) -> bool {
        self.loop_depth.get() > 0
    }

    pub fn enter_loop(&self) {
        self.loop_depth.set(self.loop_depth.get() + 1);
    }

    pub fn exit_loop(&self) {
        self.loop_depth.set(self.loop_depth.get().saturating_sub(1));
    }

    /// Whether `return` is legal here.
    pub fn returnable(&self) -> bool {
        matches!(self.kind, ScopeKind::Method | ScopeKind::Lambda)
    }

    pub fn root_of(self: &Rc<Self>) -> ContextRef {
        let mut current = self.clone();
        while let Some(parent) = current.parent.clone() {
            current = parent;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::DynamicClass;

    fn root() -> ContextRef {
        Context::root(Value::nil(), DynamicClass::new_class("Object", None))
    }

    #[test]
    fn block_writes_through_to_owner() {
        let root = root();
        root.declare("x", Value::int(1));
        let block = Context::block(&root, None, false, None);
        block.set("x", Value::int(2));
        assert_eq!(root.get("x").and_then(|v| v.as_int()), Some(2));
    }

    #[test]
    fn new_block_locals_stay_inner() {
        let root = root();
        let block = Context::block(&root, None, false, None);
        block.set("y", Value::int(3));
        assert!(root.get("y").is_none());
        assert!(block.get("y").is_some());
    }

    #[test]
    fn method_contexts_do_not_see_root_locals() {
        let root = root();
        root.declare("x", Value::int(1));
        let object = DynamicClass::new_class("Object", None);
        let frame = MethodFrame {
            name: "m".into(),
            owner: object.clone(),
            receiver: Value::nil(),
            args: Vec::new(),
            keywords: None,
            block: None,
        };
        let method = Context::method(&root, frame, object, Rc::new(Vec::new()));
        assert!(method.get("x").is_none());
        assert!(Rc::ptr_eq(&method.root_of(), &root));
    }
}
