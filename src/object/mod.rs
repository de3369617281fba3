use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use thiserror::Error;

pub use crate::object::class::{Class, ClassInstance, Method};

pub mod class;

pub(crate) const ADD_METHOD: &str = "__add__";
pub(crate) const INIT_METHOD: &str = "__init__";
const EQ_METHOD: &str = "__eq__";
const LT_METHOD: &str = "__lt__";
const STR_METHOD: &str = "__str__";

/// A name→value map. Each method invocation gets a fresh closure; top-level
/// code runs in a single global one.
pub type Closure = HashMap<String, ObjectHolder>;

#[derive(Debug)]
pub enum Object {
    Number(i64),
    String(String),
    Bool(bool),
    Class(Rc<Class>),
    Instance(ClassInstance),
}

impl Object {
    pub fn type_name(&self) -> &str {
        match self {
            Object::Number(_) => "NUMBER",
            Object::String(_) => "STRING",
            Object::Bool(_) => "BOOL",
            Object::Class(_) => "CLASS",
            Object::Instance(_) => "INSTANCE",
        }
    }
}

/// A shared, possibly empty reference to a runtime value. The empty holder
/// is the Language's `None`. Cloning shares the underlying value, which is
/// how `self` and instance fields alias the same object.
#[derive(Clone, Debug, Default)]
pub struct ObjectHolder(Option<Rc<Object>>);

impl ObjectHolder {
    pub fn own(object: Object) -> ObjectHolder {
        ObjectHolder(Some(Rc::new(object)))
    }

    pub fn none() -> ObjectHolder {
        ObjectHolder(None)
    }

    pub fn get(&self) -> Option<&Object> {
        self.0.as_deref()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_instance(&self) -> Option<&ClassInstance> {
        match self.get() {
            Some(Object::Instance(instance)) => Some(instance),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self.get() {
            Some(object) => object.type_name(),
            None => "NONE",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self.get() {
            Some(Object::Number(n)) => *n != 0,
            Some(Object::String(s)) => !s.is_empty(),
            Some(Object::Bool(b)) => *b,
            _ => false,
        }
    }

    /// Renders the held value into `out`. An instance whose class defines a
    /// zero-argument `__str__` is rendered through it; other instances get
    /// an address token usable only for identity debugging.
    pub fn print(&self, out: &mut String, ctx: &mut Context) -> Result<(), EvalError> {
        match self.get() {
            None => out.push_str("None"),
            Some(Object::Number(n)) => out.push_str(&n.to_string()),
            Some(Object::String(s)) => out.push_str(s),
            Some(Object::Bool(b)) => out.push_str(if *b { "True" } else { "False" }),
            Some(Object::Class(class)) => {
                out.push_str("Class ");
                out.push_str(class.name());
            }
            Some(Object::Instance(instance)) => {
                if instance.has_method(STR_METHOD, 0) {
                    self.call(STR_METHOD, vec![], ctx)?.print(out, ctx)?;
                } else {
                    let address = self.0.as_ref().map(Rc::as_ptr).unwrap_or(std::ptr::null());
                    out.push_str(&format!(
                        "<{} object at {:p}>",
                        instance.class().name(),
                        address
                    ));
                }
            }
        }
        Ok(())
    }

    /// Calls `method` on the instance held by `self`. A fresh closure binds
    /// the receiver under `self` plus one entry per formal parameter.
    pub fn call(
        &self,
        method: &str,
        actual_args: Vec<ObjectHolder>,
        ctx: &mut Context,
    ) -> EvalResult {
        let instance = self
            .as_instance()
            .ok_or_else(|| EvalError::NotAnInstance(self.type_name().to_owned()))?;
        let met = instance
            .class()
            .get_method(method)
            .filter(|m| m.formal_params.len() == actual_args.len())
            .ok_or_else(|| EvalError::MethodNotFound {
                class: instance.class().name().to_owned(),
                method: method.to_owned(),
                args: actual_args.len(),
            })?;

        let mut closure = Closure::new();
        closure.insert("self".to_owned(), self.clone());
        for (param, arg) in met.formal_params.iter().zip(actual_args) {
            closure.insert(param.clone(), arg);
        }
        met.body.execute(&mut closure, ctx)
    }
}

/// Execution context handed to every node: access to the interpreter's
/// output stream.
pub struct Context<'a> {
    output: &'a mut dyn io::Write,
}

impl<'a> Context<'a> {
    pub fn new(output: &'a mut dyn io::Write) -> Context<'a> {
        Context { output }
    }

    pub fn write(&mut self, text: &str) -> Result<(), EvalError> {
        self.output.write_all(text.as_bytes())?;
        Ok(())
    }
}

/// The seam between the runtime and the evaluator: method bodies are stored
/// behind this trait so dunder dispatch can run them without the runtime
/// depending on the AST.
pub trait Execute {
    fn execute(&self, closure: &mut Closure, ctx: &mut Context) -> EvalResult;
}

pub type EvalResult = std::result::Result<ObjectHolder, EvalError>;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("name {0:?} is not defined")]
    NameNotFound(String),
    #[error("field {0:?} is not defined")]
    FieldNotFound(String),
    #[error("class {class:?} has no method {method:?} taking {args} argument(s)")]
    MethodNotFound {
        class: String,
        method: String,
        args: usize,
    },
    #[error("{0} is not an instance")]
    NotAnInstance(String),
    #[error("cannot compare {0} and {1}")]
    NotComparable(String, String),
    #[error("unsupported operands for {op}: {lhs} and {rhs}")]
    UnsupportedOperands {
        op: &'static str,
        lhs: String,
        rhs: String,
    },
    #[error("division by zero")]
    DivisionByZero,
    /// The non-local return signal. It unwinds through the error channel
    /// until the innermost method body catches it; the message below is
    /// only ever seen when a `return` executes outside any method.
    #[error("return outside of a method")]
    Return(ObjectHolder),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub fn equal(lhs: &ObjectHolder, rhs: &ObjectHolder, ctx: &mut Context) -> Result<bool, EvalError> {
    match (lhs.get(), rhs.get()) {
        (None, None) => Ok(true),
        (Some(Object::Instance(instance)), _) if instance.has_method(EQ_METHOD, 1) => {
            Ok(lhs.call(EQ_METHOD, vec![rhs.clone()], ctx)?.is_truthy())
        }
        (Some(Object::Number(l)), Some(Object::Number(r))) => Ok(l == r),
        (Some(Object::String(l)), Some(Object::String(r))) => Ok(l == r),
        (Some(Object::Bool(l)), Some(Object::Bool(r))) => Ok(l == r),
        _ => Err(EvalError::NotComparable(
            lhs.type_name().to_owned(),
            rhs.type_name().to_owned(),
        )),
    }
}

pub fn less(lhs: &ObjectHolder, rhs: &ObjectHolder, ctx: &mut Context) -> Result<bool, EvalError> {
    match (lhs.get(), rhs.get()) {
        (Some(Object::Instance(instance)), _) if instance.has_method(LT_METHOD, 1) => {
            Ok(lhs.call(LT_METHOD, vec![rhs.clone()], ctx)?.is_truthy())
        }
        (Some(Object::Number(l)), Some(Object::Number(r))) => Ok(l < r),
        (Some(Object::String(l)), Some(Object::String(r))) => Ok(l < r),
        (Some(Object::Bool(l)), Some(Object::Bool(r))) => Ok(l < r),
        _ => Err(EvalError::NotComparable(
            lhs.type_name().to_owned(),
            rhs.type_name().to_owned(),
        )),
    }
}

pub fn not_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    ctx: &mut Context,
) -> Result<bool, EvalError> {
    Ok(!equal(lhs, rhs, ctx)?)
}

pub fn greater(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    ctx: &mut Context,
) -> Result<bool, EvalError> {
    Ok(!less(lhs, rhs, ctx)? && !equal(lhs, rhs, ctx)?)
}

pub fn less_or_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    ctx: &mut Context,
) -> Result<bool, EvalError> {
    Ok(less(lhs, rhs, ctx)? || equal(lhs, rhs, ctx)?)
}

/// Defined as the negation of [`less`] alone; it never consults `__eq__`.
pub fn greater_or_equal(
    lhs: &ObjectHolder,
    rhs: &ObjectHolder,
    ctx: &mut Context,
) -> Result<bool, EvalError> {
    Ok(!less(lhs, rhs, ctx)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_and<R>(f: impl FnOnce(&mut Context) -> R) -> R {
        let mut sink = Vec::new();
        let mut ctx = Context::new(&mut sink);
        f(&mut ctx)
    }

    #[test]
    fn truthiness() {
        assert!(ObjectHolder::own(Object::Number(1)).is_truthy());
        assert!(ObjectHolder::own(Object::Number(-2)).is_truthy());
        assert!(!ObjectHolder::own(Object::Number(0)).is_truthy());
        assert!(ObjectHolder::own(Object::String("x".to_owned())).is_truthy());
        assert!(!ObjectHolder::own(Object::String(String::new())).is_truthy());
        assert!(ObjectHolder::own(Object::Bool(true)).is_truthy());
        assert!(!ObjectHolder::own(Object::Bool(false)).is_truthy());
        assert!(!ObjectHolder::none().is_truthy());
    }

    #[test]
    fn equality_on_primitives() {
        ctx_and(|ctx| {
            let one = ObjectHolder::own(Object::Number(1));
            let hello = ObjectHolder::own(Object::String("hello".to_owned()));
            let yes = ObjectHolder::own(Object::Bool(true));

            assert!(equal(&one, &ObjectHolder::own(Object::Number(1)), ctx).unwrap());
            assert!(!equal(&one, &ObjectHolder::own(Object::Number(2)), ctx).unwrap());
            assert!(equal(&hello, &hello.clone(), ctx).unwrap());
            assert!(equal(&yes, &yes.clone(), ctx).unwrap());
            assert!(equal(&ObjectHolder::none(), &ObjectHolder::none(), ctx).unwrap());

            assert!(equal(&one, &hello, ctx).is_err());
            assert!(equal(&ObjectHolder::none(), &one, ctx).is_err());
            assert!(equal(&one, &ObjectHolder::none(), ctx).is_err());
        });
    }

    #[test]
    fn ordering_on_primitives() {
        ctx_and(|ctx| {
            let one = ObjectHolder::own(Object::Number(1));
            let two = ObjectHolder::own(Object::Number(2));

            assert!(less(&one, &two, ctx).unwrap());
            assert!(!less(&two, &one, ctx).unwrap());
            assert!(!less(&one, &one.clone(), ctx).unwrap());

            let a = ObjectHolder::own(Object::String("a".to_owned()));
            let b = ObjectHolder::own(Object::String("b".to_owned()));
            assert!(less(&a, &b, ctx).unwrap());

            let no = ObjectHolder::own(Object::Bool(false));
            let yes = ObjectHolder::own(Object::Bool(true));
            assert!(less(&no, &yes, ctx).unwrap());
            assert!(!less(&yes, &no, ctx).unwrap());

            assert!(less(&one, &a, ctx).is_err());
            assert!(less(&ObjectHolder::none(), &one, ctx).is_err());
        });
    }

    #[test]
    fn exactly_one_of_less_equal_greater_holds() {
        ctx_and(|ctx| {
            let pairs = [(1, 2), (2, 1), (4, 4)];
            for (l, r) in pairs {
                let lhs = ObjectHolder::own(Object::Number(l));
                let rhs = ObjectHolder::own(Object::Number(r));
                let outcomes = [
                    less(&lhs, &rhs, ctx).unwrap(),
                    equal(&lhs, &rhs, ctx).unwrap(),
                    less(&rhs, &lhs, ctx).unwrap(),
                ];
                assert_eq!(1, outcomes.iter().filter(|o| **o).count());
            }
        });
    }

    #[test]
    fn derived_comparisons() {
        ctx_and(|ctx| {
            let one = ObjectHolder::own(Object::Number(1));
            let two = ObjectHolder::own(Object::Number(2));

            assert!(not_equal(&one, &two, ctx).unwrap());
            assert!(greater(&two, &one, ctx).unwrap());
            assert!(!greater(&one, &one.clone(), ctx).unwrap());
            assert!(less_or_equal(&one, &two, ctx).unwrap());
            assert!(less_or_equal(&one, &one.clone(), ctx).unwrap());
            assert!(greater_or_equal(&two, &one, ctx).unwrap());
            assert!(greater_or_equal(&one, &one.clone(), ctx).unwrap());
            assert!(!greater_or_equal(&one, &two, ctx).unwrap());
        });
    }

    #[test]
    fn printing_primitives() {
        ctx_and(|ctx| {
            let mut out = String::new();
            ObjectHolder::own(Object::Number(42)).print(&mut out, ctx).unwrap();
            out.push(' ');
            ObjectHolder::own(Object::Bool(true)).print(&mut out, ctx).unwrap();
            out.push(' ');
            ObjectHolder::own(Object::Bool(false)).print(&mut out, ctx).unwrap();
            out.push(' ');
            ObjectHolder::own(Object::String("raw".to_owned()))
                .print(&mut out, ctx)
                .unwrap();
            out.push(' ');
            ObjectHolder::none().print(&mut out, ctx).unwrap();

            assert_eq!("42 True False raw None", out);
        });
    }

    #[test]
    fn type_names() {
        assert_eq!("NUMBER", ObjectHolder::own(Object::Number(0)).type_name());
        assert_eq!("NONE", ObjectHolder::none().type_name());
        assert_eq!(
            "STRING",
            ObjectHolder::own(Object::String(String::new())).type_name()
        );
    }
}
