//! `Module` and `Class`: reflection, mixins, visibility and metaprogramming.

use std::rc::Rc;

use crate::{
    diagnostics::{name_error, type_error, Diagnostic},
    object::{
        ancestors, check_const_name, class_var_get, class_var_names, class_var_set,
        const_lookup, include_module, method_names, resolve_method, ClassRef, DynamicClass,
        DynamicObject, MethodBody, MethodEntry, Visibility,
    },
    runtime::{CallArgs, EvalResult, Interpreter},
    value::Value,
};

use super::{block_of, name_arg, object::method_body, StdlibRegistry};

pub(super) fn install(registry: &mut StdlibRegistry) {
    registry
        .table("Module")
        .native("name", 0, |interp, recv, _| {
            let class = interp.expect_module(recv)?;
            let class = class.borrow();
            Ok(if class.name.is_empty() {
                Value::nil()
            } else {
                Value::string(class.full_name())
            })
        })
        .native("to_s", 0, |interp, recv, _| {
            Ok(Value::string(interp.expect_module(recv)?.borrow().full_name()))
        })
        .alias("inspect", "to_s")
        .native("===", 1, |interp, recv, args| {
            let class = interp.expect_module(recv)?;
            Ok(Value::bool(interp.is_a(&args.arg(0), &class)))
        })
        .native("==", 1, |_, recv, args| Ok(Value::bool(recv.identical(&args.arg(0)))))
        .native("<", 1, |interp, recv, args| compare_modules(interp, recv, &args.arg(0), true))
        .native("<=", 1, |interp, recv, args| compare_modules(interp, recv, &args.arg(0), false))
        .native(">", 1, |interp, recv, args| compare_modules(interp, &args.arg(0), recv, true))
        .native(">=", 1, |interp, recv, args| compare_modules(interp, &args.arg(0), recv, false))
        .native("ancestors", 0, |interp, recv, _| {
            let class = interp.expect_module(recv)?;
            Ok(classes(ancestors(&class)))
        })
        .native("include", -2, include)
        .native("include?", 1, |interp, recv, args| {
            let class = interp.expect_module(recv)?;
            let module = interp.expect_module(&args.arg(0))?;
            let found = !Rc::ptr_eq(&class, &module)
                && module.borrow().is_module
                && ancestors(&class).iter().any(|a| Rc::ptr_eq(a, &module));
            Ok(Value::bool(found))
        })
        .native("included_modules", 0, |interp, recv, _| {
            let class = interp.expect_module(recv)?;
            let modules = ancestors(&class)
                .into_iter()
                .filter(|a| a.borrow().is_module && !Rc::ptr_eq(a, &class))
                .collect();
            Ok(classes(modules))
        })
        .native("instance_methods", -1, |interp, recv, args| {
            instance_methods(interp, recv, &args, |v| v != Visibility::Private)
        })
        .alias("public_instance_methods", "instance_methods")
        .native("private_instance_methods", -1, |interp, recv, args| {
            instance_methods(interp, recv, &args, |v| v == Visibility::Private)
        })
        .native("method_defined?", -2, |interp, recv, args| {
            method_defined(interp, recv, &args, |v| v != Visibility::Private)
        })
        .native("public_method_defined?", -2, |interp, recv, args| {
            method_defined(interp, recv, &args, |v| v == Visibility::Public)
        })
        .native("private_method_defined?", -2, |interp, recv, args| {
            method_defined(interp, recv, &args, |v| v == Visibility::Private)
        })
        .native("protected_method_defined?", -2, |interp, recv, args| {
            method_defined(interp, recv, &args, |v| v == Visibility::Protected)
        })
        .native("attr_reader", -1, |interp, recv, args| attributes(interp, recv, args, true, false))
        .native("attr_writer", -1, |interp, recv, args| attributes(interp, recv, args, false, true))
        .native("attr_accessor", -1, |interp, recv, args| attributes(interp, recv, args, true, true))
        .alias("attr", "attr_reader")
        .native("private", -1, |interp, recv, args| visibility(interp, recv, args, Visibility::Private))
        .native("public", -1, |interp, recv, args| visibility(interp, recv, args, Visibility::Public))
        .native("protected", -1, |interp, recv, args| {
            visibility(interp, recv, args, Visibility::Protected)
        })
        .native("module_function", -1, |interp, recv, args| {
            let module = interp.expect_module(recv)?;
            let names = names_of(&args.positional)?;
            interp.module_function(&module, &names)?;
            Ok(Value::nil())
        })
        .native("private_class_method", -1, |interp, recv, args| {
            class_method_visibility(interp, recv, args, Visibility::Private)
        })
        .native("public_class_method", -1, |interp, recv, args| {
            class_method_visibility(interp, recv, args, Visibility::Public)
        })
        .native("private_constant", -1, |_, _, _| Ok(Value::nil()))
        .native("alias_method", 2, |interp, recv, args| {
            let class = interp.expect_module(recv)?;
            let new_name = name_arg(&args.arg(0))?;
            let old_name = name_arg(&args.arg(1))?;
            interp.alias_method(&class, &new_name, &old_name)?;
            Ok(Value::symbol(&new_name))
        })
        .native("define_method", -2, |interp, recv, args| {
            let class = interp.expect_module(recv)?;
            let name = name_arg(&args.arg(0))?;
            let body = method_body(interp, &args)?;
            class
                .borrow_mut()
                .define_method(MethodEntry::new(name.clone(), body));
            Ok(Value::symbol(&name))
        })
        .native("remove_method", -1, |interp, recv, args| {
            let class = interp.expect_module(recv)?;
            for name in names_of(&args.positional)? {
                let removed = class.borrow_mut().methods.shift_remove(&name);
                if removed.is_none() {
                    return Err(name_error(format!(
                        "method '{name}' not defined in {}",
                        class.borrow().full_name()
                    ))
                    .into());
                }
            }
            Ok(recv.clone())
        })
        .native("undef_method", -1, |interp, recv, args| {
            let class = interp.expect_module(recv)?;
            for name in names_of(&args.positional)? {
                class
                    .borrow_mut()
                    .define_method(MethodEntry::new(name, MethodBody::Undefined));
            }
            Ok(recv.clone())
        })
        .native("const_get", -2, const_get)
        .native("const_set", 2, |interp, recv, args| {
            let class = interp.expect_module(recv)?;
            let name = name_arg(&args.arg(0))?;
            check_const_name(&name)?;
            let value = args.arg(1);
            interp.const_set(&class, &name, value.clone());
            Ok(value)
        })
        .native("const_defined?", -2, |interp, recv, args| {
            let class = interp.expect_module(recv)?;
            let name = name_arg(&args.arg(0))?;
            check_const_name(&name)?;
            Ok(Value::bool(const_lookup(&class, &name).is_some()))
        })
        .native("constants", -1, |interp, recv, _| {
            let class = interp.expect_module(recv)?;
            let names = class
                .borrow()
                .constants
                .keys()
                .map(|name| Value::symbol(name))
                .collect();
            Ok(Value::array(names))
        })
        .native("class_variable_get", 1, |interp, recv, args| {
            let class = interp.expect_module(recv)?;
            let name = cvar_name(&args.arg(0))?;
            class_var_get(&class, &name).ok_or_else(|| {
                name_error(format!(
                    "uninitialized class variable {name} in {}",
                    class.borrow().full_name()
                ))
                .into()
            })
        })
        .native("class_variable_set", 2, |interp, recv, args| {
            let class = interp.expect_module(recv)?;
            let name = cvar_name(&args.arg(0))?;
            let value = args.arg(1);
            class_var_set(&class, &name, value.clone());
            Ok(value)
        })
        .native("class_variable_defined?", 1, |interp, recv, args| {
            let class = interp.expect_module(recv)?;
            let name = cvar_name(&args.arg(0))?;
            Ok(Value::bool(class_var_get(&class, &name).is_some()))
        })
        .native("class_variables", -1, |interp, recv, _| {
            let class = interp.expect_module(recv)?;
            let names = class_var_names(&class);
            Ok(Value::array(names.iter().map(|n| Value::symbol(n)).collect()))
        })
        .native("class_eval", -1, class_eval)
        .alias("module_eval", "class_eval")
        .alias("class_exec", "class_eval")
        .alias("module_exec", "class_eval")
        .native("included", 1, |_, _, _| Ok(Value::nil()))
        .native("extended", 1, |_, _, _| Ok(Value::nil()))
        .native("method_added", 1, |_, _, _| Ok(Value::nil()))
        .native("hash", 0, |_, recv, _| Ok(Value::int(recv.object_id() as i64)));

    registry
        .table("Class")
        .native("new", -1, |interp, recv, args| {
            let class = interp.expect_module(recv)?;
            interp.instantiate(&class, args)
        })
        .native("allocate", 0, |interp, recv, _| {
            let class = interp.expect_module(recv)?;
            Ok(Value::object(DynamicObject::new(class)))
        })
        .native("superclass", 0, |interp, recv, _| {
            let class = interp.expect_module(recv)?;
            let superclass = class.borrow().superclass.clone();
            Ok(superclass.map_or_else(Value::nil, Value::class))
        })
        .native("inherited", 1, |_, _, _| Ok(Value::nil()));

    registry
        .singleton_table("Class")
        .native("new", -1, |interp, _, args| {
            let superclass = match args.positional.first() {
                Some(value) => {
                    let class = interp.expect_module(value)?;
                    if class.borrow().is_module {
                        return Err(type_error("superclass must be a Class").into());
                    }
                    class
                }
                None => interp.classes.object.clone(),
            };
            let class = DynamicClass::new_class("", Some(superclass.clone()));
            interp.send(
                &Value::class(superclass),
                "inherited",
                CallArgs::new(vec![Value::class(class.clone())]),
            )?;
            anonymous_body(interp, class, args.block)
        });

    registry
        .singleton_table("Module")
        .native("new", 0, |interp, _, args| {
            anonymous_body(interp, DynamicClass::new_module(""), args.block)
        });
}

fn classes(list: Vec<ClassRef>) -> Value {
    Value::array(list.into_iter().map(Value::class).collect())
}

/// Method names from Symbol/String arguments, flattening arrays such as
/// the result of `attr_accessor`.
fn names_of(values: &[Value]) -> Result<Vec<String>, Diagnostic> {
    let mut names = Vec::new();
    for value in values {
        match value.as_array() {
            Some(array) => names.extend(names_of(&array.to_vec())?),
            None => names.push(name_arg(value)?),
        }
    }
    Ok(names)
}

fn cvar_name(value: &Value) -> Result<String, Diagnostic> {
    let name = name_arg(value)?;
    if !name.starts_with("@@") || name.len() < 3 {
        return Err(name_error(format!(
            "'{name}' is not allowed as a class variable name"
        )));
    }
    Ok(name)
}

/// `A < B`: true when B is a proper ancestor, nil when unrelated.
fn compare_modules(interp: &mut Interpreter, lower: &Value, upper: &Value, strict: bool) -> EvalResult {
    let lower = interp.expect_module(lower)?;
    let upper = interp.expect_module(upper)
        .map_err(|_| type_error("compared with non class/module"))?;
    if Rc::ptr_eq(&lower, &upper) {
        return Ok(Value::bool(!strict));
    }
    if ancestors(&lower).iter().any(|a| Rc::ptr_eq(a, &upper)) {
        return Ok(Value::bool(true));
    }
    if ancestors(&upper).iter().any(|a| Rc::ptr_eq(a, &lower)) {
        return Ok(Value::bool(false));
    }
    Ok(Value::nil())
}

fn include(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let class = interp.expect_module(recv)?;
    for module in args.positional.iter().rev() {
        let module_class = interp.expect_module(module)?;
        include_module(&class, &module_class)?;
        interp.send(module, "included", CallArgs::new(vec![recv.clone()]))?;
    }
    Ok(recv.clone())
}

fn instance_methods(
    interp: &mut Interpreter,
    recv: &Value,
    args: &CallArgs,
    wanted: fn(Visibility) -> bool,
) -> EvalResult {
    let class = interp.expect_module(recv)?;
    let inherited = args.positional.first().map_or(true, Value::is_truthy);
    let names: Vec<String> = if inherited {
        let all = ancestors(&class);
        let mut names = Vec::new();
        for name in method_names(&all, &interp.natives) {
            if resolve_method(&all, &name, &interp.natives)
                .is_some_and(|found| wanted(found.entry.visibility))
            {
                names.push(name);
            }
        }
        if wanted(Visibility::Private) {
            for klass in &all {
                for (name, entry) in &klass.borrow().methods {
                    if entry.visibility == Visibility::Private && !names.contains(name) {
                        names.push(name.clone());
                    }
                }
            }
        }
        names
    } else {
        class
            .borrow()
            .methods
            .iter()
            .filter(|(_, entry)| {
                !matches!(entry.body, MethodBody::Undefined) && wanted(entry.visibility)
            })
            .map(|(name, _)| name.clone())
            .collect()
    };
    Ok(Value::array(names.iter().map(|n| Value::symbol(n)).collect()))
}

fn method_defined(
    interp: &mut Interpreter,
    recv: &Value,
    args: &CallArgs,
    wanted: fn(Visibility) -> bool,
) -> EvalResult {
    let class = interp.expect_module(recv)?;
    let name = name_arg(&args.arg(0))?;
    let found = resolve_method(&ancestors(&class), &name, &interp.natives);
    Ok(Value::bool(found.is_some_and(|found| wanted(found.entry.visibility))))
}

fn attributes(
    interp: &mut Interpreter,
    recv: &Value,
    args: CallArgs,
    reader: bool,
    writer: bool,
) -> EvalResult {
    let class = interp.expect_module(recv)?;
    let names = names_of(&args.positional)?;
    for name in &names {
        if !name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return Err(name_error(format!("invalid attribute name '{name}'")).into());
        }
    }
    interp.define_attributes(&class, &names, reader, writer);
    let mut defined = Vec::new();
    for name in &names {
        if reader {
            defined.push(Value::symbol(name));
        }
        if writer {
            defined.push(Value::symbol(&format!("{name}=")));
        }
    }
    Ok(Value::array(defined))
}

/// `private :a, :b` and `private def a; end`. The argument-less form is
/// handled where the class body is evaluated.
fn visibility(
    interp: &mut Interpreter,
    recv: &Value,
    args: CallArgs,
    visibility: Visibility,
) -> EvalResult {
    let class = interp.expect_module(recv)?;
    let names = names_of(&args.positional)?;
    interp.set_visibility(&class, &names, visibility)?;
    Ok(match args.positional.len() {
        0 => Value::nil(),
        1 => args.arg(0),
        _ => Value::array(args.positional),
    })
}

fn class_method_visibility(
    interp: &mut Interpreter,
    recv: &Value,
    args: CallArgs,
    visibility: Visibility,
) -> EvalResult {
    let meta = interp.singleton_class_of(recv)?;
    let names = names_of(&args.positional)?;
    interp.set_visibility(&meta, &names, visibility)?;
    Ok(Value::nil())
}

/// `const_get(:Name)` and `const_get("Outer::Inner")`.
fn const_get(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let class = interp.expect_module(recv)?;
    let path = name_arg(&args.arg(0))?;
    let mut current = Value::class(class.clone());
    for (index, segment) in path.split("::").enumerate() {
        if segment.is_empty() && index == 0 {
            current = Value::class(interp.classes.object.clone());
            continue;
        }
        check_const_name(segment)?;
        let scope = interp.expect_module(&current)?;
        current = match const_lookup(&scope, segment) {
            Some(value) => value,
            None if index == 0 => interp.top_level_const(segment)?,
            None => interp.scoped_const(&current, segment)?,
        };
    }
    Ok(current)
}

fn class_eval(interp: &mut Interpreter, recv: &Value, args: CallArgs) -> EvalResult {
    let class = interp.expect_module(recv)?;
    let block = block_of(&args)?;
    let positional = if args.is_empty() {
        vec![recv.clone()]
    } else {
        args.positional
    };
    interp.call_proc_with_self(&block, recv.clone(), class, CallArgs::new(positional))
}

/// Runs the block of `Class.new { ... }` / `Module.new { ... }` as a body.
fn anonymous_body(interp: &mut Interpreter, class: ClassRef, block: Option<Value>) -> EvalResult {
    let value = Value::class(class.clone());
    if let Some(block) = block {
        interp.call_proc_with_self(&block, value.clone(), class, CallArgs::new(vec![value.clone()]))?;
    }
    Ok(value)
}
