use std::rc::Rc;

use crate::ast::{Program, Statement};
use crate::object::{
    self, Class, ClassInstance, Closure, Context, EvalError, EvalResult, Execute, Object,
    ObjectHolder,
};

/// Runs a whole program, usually against the global closure.
pub fn eval(program: &Program, closure: &mut Closure, ctx: &mut Context) -> EvalResult {
    for statement in &program.statements {
        eval_statement(statement, closure, ctx)?;
    }
    Ok(ObjectHolder::none())
}

pub fn eval_statement(
    statement: &Statement,
    closure: &mut Closure,
    ctx: &mut Context,
) -> EvalResult {
    match statement {
        Statement::Constant(value) => Ok(value.clone()),
        Statement::Assignment { var, rv } => {
            let value = eval_statement(rv, closure, ctx)?;
            closure.insert(var.clone(), value.clone());
            Ok(value)
        }
        Statement::VariableValue { dotted_ids } => eval_variable(dotted_ids, closure),
        Statement::FieldAssignment {
            object,
            field_name,
            rv,
        } => {
            let target = eval_statement(object, closure, ctx)?;
            let value = eval_statement(rv, closure, ctx)?;
            let instance = target
                .as_instance()
                .ok_or_else(|| EvalError::NotAnInstance(target.type_name().to_owned()))?;
            instance.fields_mut().insert(field_name.clone(), value.clone());
            Ok(value)
        }
        Statement::Print { args } => eval_print(args, closure, ctx),
        Statement::MethodCall {
            object,
            method,
            args,
        } => {
            let receiver = eval_statement(object, closure, ctx)?;
            let mut actual_args = Vec::with_capacity(args.len());
            for arg in args {
                actual_args.push(eval_statement(arg, closure, ctx)?);
            }
            receiver.call(method, actual_args, ctx)
        }
        Statement::NewInstance { class, args } => eval_new_instance(class, args, closure, ctx),
        Statement::Stringify(arg) => {
            let value = eval_statement(arg, closure, ctx)?;
            let mut text = String::new();
            value.print(&mut text, ctx)?;
            Ok(ObjectHolder::own(Object::String(text)))
        }
        Statement::Add(lhs, rhs) => eval_add(lhs, rhs, closure, ctx),
        Statement::Sub(lhs, rhs) => eval_numeric("-", lhs, rhs, closure, ctx, |l, r| Ok(l - r)),
        Statement::Mult(lhs, rhs) => eval_numeric("*", lhs, rhs, closure, ctx, |l, r| Ok(l * r)),
        Statement::Div(lhs, rhs) => eval_numeric("/", lhs, rhs, closure, ctx, |l, r| {
            if r == 0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(l / r)
            }
        }),
        Statement::Compound(statements) => {
            for statement in statements {
                eval_statement(statement, closure, ctx)?;
            }
            Ok(ObjectHolder::none())
        }
        Statement::Return(rv) => Err(EvalError::Return(eval_statement(rv, closure, ctx)?)),
        Statement::ClassDefinition(class) => {
            closure.insert(
                class.name().to_owned(),
                ObjectHolder::own(Object::Class(Rc::clone(class))),
            );
            Ok(ObjectHolder::none())
        }
        Statement::IfElse {
            condition,
            if_body,
            else_body,
        } => {
            if eval_statement(condition, closure, ctx)?.is_truthy() {
                eval_statement(if_body, closure, ctx)
            } else if let Some(else_body) = else_body {
                eval_statement(else_body, closure, ctx)
            } else {
                Ok(ObjectHolder::none())
            }
        }
        Statement::Or(lhs, rhs) => {
            if eval_statement(lhs, closure, ctx)?.is_truthy() {
                Ok(ObjectHolder::own(Object::Bool(true)))
            } else {
                let rhs = eval_statement(rhs, closure, ctx)?;
                Ok(ObjectHolder::own(Object::Bool(rhs.is_truthy())))
            }
        }
        Statement::And(lhs, rhs) => {
            if !eval_statement(lhs, closure, ctx)?.is_truthy() {
                Ok(ObjectHolder::own(Object::Bool(false)))
            } else {
                let rhs = eval_statement(rhs, closure, ctx)?;
                Ok(ObjectHolder::own(Object::Bool(rhs.is_truthy())))
            }
        }
        Statement::Not(arg) => Ok(ObjectHolder::own(Object::Bool(
            !eval_statement(arg, closure, ctx)?.is_truthy(),
        ))),
        Statement::Comparison { op, lhs, rhs } => {
            let lhs = eval_statement(lhs, closure, ctx)?;
            let rhs = eval_statement(rhs, closure, ctx)?;
            Ok(ObjectHolder::own(Object::Bool(op.apply(&lhs, &rhs, ctx)?)))
        }
        Statement::MethodBody(body) => match eval_statement(body, closure, ctx) {
            Err(EvalError::Return(value)) => Ok(value),
            Ok(_) => Ok(ObjectHolder::none()),
            Err(err) => Err(err),
        },
    }
}

impl Execute for Statement {
    fn execute(&self, closure: &mut Closure, ctx: &mut Context) -> EvalResult {
        eval_statement(self, closure, ctx)
    }
}

fn eval_variable(dotted_ids: &[String], closure: &Closure) -> EvalResult {
    let mut result = closure
        .get(&dotted_ids[0])
        .cloned()
        .ok_or_else(|| EvalError::NameNotFound(dotted_ids[0].clone()))?;

    for id in &dotted_ids[1..] {
        let instance = result
            .as_instance()
            .ok_or_else(|| EvalError::NotAnInstance(result.type_name().to_owned()))?;
        let field = instance
            .fields()
            .get(id)
            .cloned()
            .ok_or_else(|| EvalError::FieldNotFound(id.clone()))?;
        result = field;
    }
    Ok(result)
}

fn eval_print(args: &[Statement], closure: &mut Closure, ctx: &mut Context) -> EvalResult {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            ctx.write(" ")?;
        }
        let value = eval_statement(arg, closure, ctx)?;
        let mut text = String::new();
        value.print(&mut text, ctx)?;
        ctx.write(&text)?;
    }
    ctx.write("\n")?;
    Ok(ObjectHolder::none())
}

fn eval_add(
    lhs: &Statement,
    rhs: &Statement,
    closure: &mut Closure,
    ctx: &mut Context,
) -> EvalResult {
    let lhs = eval_statement(lhs, closure, ctx)?;
    let rhs = eval_statement(rhs, closure, ctx)?;

    if let Some(instance) = lhs.as_instance() {
        if instance.has_method(object::ADD_METHOD, 1) {
            return lhs.call(object::ADD_METHOD, vec![rhs], ctx);
        }
    }
    match (lhs.get(), rhs.get()) {
        (Some(Object::Number(l)), Some(Object::Number(r))) => {
            Ok(ObjectHolder::own(Object::Number(l + r)))
        }
        (Some(Object::String(l)), Some(Object::String(r))) => {
            Ok(ObjectHolder::own(Object::String(format!("{}{}", l, r))))
        }
        // `+` on Bools is integer addition followed by a truthiness check
        (Some(Object::Bool(l)), Some(Object::Bool(r))) => Ok(ObjectHolder::own(Object::Bool(
            *l as i64 + *r as i64 != 0,
        ))),
        _ => Err(EvalError::UnsupportedOperands {
            op: "+",
            lhs: lhs.type_name().to_owned(),
            rhs: rhs.type_name().to_owned(),
        }),
    }
}

fn eval_numeric(
    op: &'static str,
    lhs: &Statement,
    rhs: &Statement,
    closure: &mut Closure,
    ctx: &mut Context,
    apply: fn(i64, i64) -> Result<i64, EvalError>,
) -> EvalResult {
    let lhs = eval_statement(lhs, closure, ctx)?;
    let rhs = eval_statement(rhs, closure, ctx)?;

    match (lhs.get(), rhs.get()) {
        (Some(Object::Number(l)), Some(Object::Number(r))) => {
            Ok(ObjectHolder::own(Object::Number(apply(*l, *r)?)))
        }
        _ => Err(EvalError::UnsupportedOperands {
            op,
            lhs: lhs.type_name().to_owned(),
            rhs: rhs.type_name().to_owned(),
        }),
    }
}

fn eval_new_instance(
    class: &Rc<Class>,
    args: &[Statement],
    closure: &mut Closure,
    ctx: &mut Context,
) -> EvalResult {
    let has_init = class
        .get_method(object::INIT_METHOD)
        .map_or(false, |m| m.formal_params.len() == args.len());

    let instance = ObjectHolder::own(Object::Instance(ClassInstance::new(Rc::clone(class))));
    if has_init {
        let mut actual_args = Vec::with_capacity(args.len());
        for arg in args {
            actual_args.push(eval_statement(arg, closure, ctx)?);
        }
        instance.call(object::INIT_METHOD, actual_args, ctx)?;
    }
    Ok(instance)
}
