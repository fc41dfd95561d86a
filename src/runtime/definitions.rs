//! `def`, `class`, `module`, `class << obj`, `alias` and object creation.

use std::rc::Rc;

use tracing::debug;

use crate::{
    ast::{ConstPath, Expr, MethodDef},
    context::{Context, ContextRef, ScopeKind},
    diagnostics::{name_error, type_error, Diagnostic, DiagnosticKind},
    object::{
        ancestors, ensure_meta, resolve_method, ClassRef, DynamicClass, DynamicObject,
        MethodBody, MethodEntry, Visibility,
    },
    value::{Value, ValueKind},
};

use super::{CallArgs, EvalResult, Interpreter};

/// Methods that are private no matter where they are defined.
const ALWAYS_PRIVATE: &[&str] = &["initialize", "initialize_copy", "respond_to_missing?"];

impl Interpreter {
    pub(crate) fn eval_def(&mut self, def: &Rc<MethodDef>, ctx: &ContextRef) -> EvalResult {
        let body = MethodBody::User {
            def: def.clone(),
            cref: ctx.cref.clone(),
        };
        if let Some(target) = &def.singleton {
            let target = self.eval(target, ctx)?;
            let class = self.singleton_class_of(&target)?;
            class
                .borrow_mut()
                .define_method(MethodEntry::new(def.name.clone(), body));
            return Ok(Value::symbol(&def.name));
        }

        let class = ctx.definee.clone();
        let mut visibility = if ctx.kind == ScopeKind::Class {
            ctx.visibility.get()
        } else {
            Visibility::Public
        };
        if ALWAYS_PRIVATE.contains(&def.name.as_str()) {
            visibility = Visibility::Private;
        }
        if ctx.kind == ScopeKind::Class && ctx.module_function.get() {
            let meta = ensure_meta(&class);
            meta.borrow_mut()
                .define_method(MethodEntry::new(def.name.clone(), body.clone()));
            visibility = Visibility::Private;
        }
        class
            .borrow_mut()
            .define_method(MethodEntry::new(def.name.clone(), body).with_visibility(visibility));
        Ok(Value::symbol(&def.name))
    }

    /// Class that receives singleton methods of `value`.
    pub(crate) fn singleton_class_of(&self, value: &Value) -> EvalResult<ClassRef> {
        match value.kind() {
            ValueKind::Object(object) => Ok(object.singleton_class()),
            ValueKind::Class(class) => Ok(ensure_meta(class)),
            _ => Err(type_error(format!(
                "can't define singleton for {}",
                value.basic_inspect()
            ))
            .into()),
        }
    }

    pub(crate) fn eval_class_def(
        &mut self,
        path: &ConstPath,
        superclass: Option<&Expr>,
        body: &Expr,
        ctx: &ContextRef,
    ) -> EvalResult {
        let (container, name) = self.definition_target(path, ctx)?;
        let superclass = match superclass {
            Some(expr) => {
                let value = self.eval(expr, ctx)?;
                let class = self.expect_module(&value)?;
                if class.borrow().is_module {
                    return Err(type_error("superclass must be a Class").into());
                }
                Some(class)
            }
            None => None,
        };
        let existing = container.borrow().constants.get(&name).cloned();
        let class = match existing {
            Some(value) => {
                let class = value
                    .as_class()
                    .filter(|class| !class.borrow().is_module)
                    .cloned()
                    .ok_or_else(|| type_error(format!("{name} is not a class")))?;
                if let Some(expected) = &superclass {
                    let current = class.borrow().superclass.clone();
                    if !current.is_some_and(|current| Rc::ptr_eq(&current, expected)) {
                        return Err(
                            type_error(format!("superclass mismatch for class {name}")).into()
                        );
                    }
                }
                class
            }
            None => {
                let parent = superclass.unwrap_or_else(|| self.classes.object.clone());
                let class = DynamicClass::new_class(&name, Some(parent.clone()));
                self.register_constant(&container, &name, &class);
                self.send(
                    &Value::class(parent),
                    "inherited",
                    CallArgs::new(vec![Value::class(class.clone())]),
                )?;
                class
            }
        };
        self.eval_body(class, body, ctx)
    }

    pub(crate) fn eval_module_def(
        &mut self,
        path: &ConstPath,
        body: &Expr,
        ctx: &ContextRef,
    ) -> EvalResult {
        let (container, name) = self.definition_target(path, ctx)?;
        let existing = container.borrow().constants.get(&name).cloned();
        let module = match existing {
            Some(value) => value
                .as_class()
                .filter(|class| class.borrow().is_module)
                .cloned()
                .ok_or_else(|| type_error(format!("{name} is not a module")))?,
            None => {
                let module = DynamicClass::new_module(&name);
                self.register_constant(&container, &name, &module);
                module
            }
        };
        self.eval_body(module, body, ctx)
    }

    pub(crate) fn eval_singleton_class(
        &mut self,
        target: &Expr,
        body: &Expr,
        ctx: &ContextRef,
    ) -> EvalResult {
        let target = self.eval(target, ctx)?;
        let class = self.singleton_class_of(&target)?;
        self.eval_body(class, body, ctx)
    }

    fn eval_body(&mut self, class: ClassRef, body: &Expr, ctx: &ContextRef) -> EvalResult {
        let mut cref = (*ctx.cref).clone();
        cref.push(class.clone());
        let body_ctx = Context::class_body(ctx, class, Rc::new(cref));
        self.eval(body, &body_ctx)
    }

    fn definition_target(
        &mut self,
        path: &ConstPath,
        ctx: &ContextRef,
    ) -> EvalResult<(ClassRef, String)> {
        let container = match &path.scope {
            Some(scope) => {
                let scope = self.eval(scope, ctx)?;
                self.expect_module(&scope)?
            }
            None if path.top_level => self.classes.object.clone(),
            None => self.lexical_module(ctx),
        };
        Ok((container, path.name.clone()))
    }

    fn register_constant(&mut self, container: &ClassRef, name: &str, class: &ClassRef) {
        if !Rc::ptr_eq(container, &self.classes.object) {
            class.borrow_mut().lexical_parent = Some(container.clone());
        }
        container
            .borrow_mut()
            .constants
            .insert(name.to_string(), Value::class(class.clone()));
    }

    /// `alias new old` / `alias_method :new, :old`.
    pub(crate) fn alias_method(
        &mut self,
        class: &ClassRef,
        new_name: &str,
        old_name: &str,
    ) -> EvalResult<()> {
        let found = self.find_in_class(class, old_name)?;
        let entry = MethodEntry::new(new_name, found.body).with_visibility(found.visibility);
        class.borrow_mut().define_method(entry);
        Ok(())
    }

    /// Changes the visibility of methods named in a class body.
    pub(crate) fn set_visibility(
        &mut self,
        class: &ClassRef,
        names: &[String],
        visibility: Visibility,
    ) -> EvalResult<()> {
        for name in names {
            let entry = self.find_in_class(class, name)?;
            class
                .borrow_mut()
                .define_method(entry.with_visibility(visibility));
        }
        Ok(())
    }

    /// `module_function :name`: copies the method onto the module's
    /// singleton class and makes the instance method private.
    pub(crate) fn module_function(&mut self, module: &ClassRef, names: &[String]) -> EvalResult<()> {
        let meta = ensure_meta(module);
        for name in names {
            let entry = self.find_in_class(module, name)?;
            meta.borrow_mut()
                .define_method(entry.clone().with_visibility(Visibility::Public));
            module
                .borrow_mut()
                .define_method(entry.with_visibility(Visibility::Private));
        }
        Ok(())
    }

    /// `attr_reader`, `attr_writer` and `attr_accessor`.
    pub(crate) fn define_attributes(
        &mut self,
        class: &ClassRef,
        names: &[String],
        reader: bool,
        writer: bool,
    ) {
        let mut class = class.borrow_mut();
        for name in names {
            let ivar = format!("@{name}");
            if reader {
                class.define_method(MethodEntry::new(
                    name.clone(),
                    MethodBody::AttrReader(ivar.clone()),
                ));
            }
            if writer {
                class.define_method(MethodEntry::new(
                    format!("{name}="),
                    MethodBody::AttrWriter(ivar),
                ));
            }
        }
    }

    fn find_in_class(&self, class: &ClassRef, name: &str) -> EvalResult<MethodEntry> {
        let found = resolve_method(&ancestors(class), name, &self.natives)
            .or_else(|| resolve_method(&ancestors(&self.classes.object), name, &self.natives));
        found.map(|found| found.entry).ok_or_else(|| {
            let class = class.borrow();
            let kind = if class.is_module { "module" } else { "class" };
            name_error(format!(
                "undefined method '{name}' for {kind} '{}'",
                class.full_name()
            ))
            .into()
        })
    }

    /// `Class#new`: allocates an object and runs `initialize`.
    pub(crate) fn instantiate(&mut self, class: &ClassRef, args: CallArgs) -> EvalResult {
        {
            let class = class.borrow();
            if class.is_module {
                return Err(Diagnostic::new(
                    DiagnosticKind::NoMethod,
                    format!("undefined method 'new' for module {}", class.full_name()),
                )
                .into());
            }
            if class.is_singleton {
                return Err(type_error("can't create instance of singleton class").into());
            }
        }
        let object = Value::object(DynamicObject::new(class.clone()));
        if let Some(init) = resolve_method(&ancestors(class), "initialize", &self.natives) {
            self.invoke(&object, init, args)?;
        }
        debug!(class = %class.borrow().full_name(), "instance created");
        Ok(object)
    }
}
