use std::rc::Rc;

use crate::object::{self, Class, Context, EvalError, ObjectHolder};

/// A complete parsed program: the top-level statement sequence, executed
/// against the global closure.
pub struct Program {
    pub statements: Vec<Statement>,
}

/// One AST node. Every node evaluates to an [`ObjectHolder`]; statements
/// without a useful value produce the empty holder.
#[derive(Debug)]
pub enum Statement {
    /// A value fixed at parse time: a literal, `True`, `False` or `None`.
    Constant(ObjectHolder),
    /// `var = rv`, binding into the enclosing closure.
    Assignment { var: String, rv: Box<Statement> },
    /// `a.b.c`: the head resolves in the closure, every further id is a
    /// field lookup on an instance.
    VariableValue { dotted_ids: Vec<String> },
    /// `obj.field = rv`
    FieldAssignment {
        object: Box<Statement>,
        field_name: String,
        rv: Box<Statement>,
    },
    Print { args: Vec<Statement> },
    MethodCall {
        object: Box<Statement>,
        method: String,
        args: Vec<Statement>,
    },
    /// `Name(args)`: builds a fresh instance, running a matching `__init__`.
    NewInstance {
        class: Rc<Class>,
        args: Vec<Statement>,
    },
    /// `str(expr)`
    Stringify(Box<Statement>),
    Add(Box<Statement>, Box<Statement>),
    Sub(Box<Statement>, Box<Statement>),
    Mult(Box<Statement>, Box<Statement>),
    Div(Box<Statement>, Box<Statement>),
    Compound(Vec<Statement>),
    Return(Box<Statement>),
    /// Binds the class under its own name in the enclosing closure.
    ClassDefinition(Rc<Class>),
    IfElse {
        condition: Box<Statement>,
        if_body: Box<Statement>,
        else_body: Option<Box<Statement>>,
    },
    Or(Box<Statement>, Box<Statement>),
    And(Box<Statement>, Box<Statement>),
    Not(Box<Statement>),
    Comparison {
        op: CompareOp,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
    /// The boundary a `return` unwinds to; wraps every method body.
    MethodBody(Box<Statement>),
}

/// The six relational operations of the Language.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Less,
    Greater,
    LessOrEq,
    GreaterOrEq,
}

impl CompareOp {
    pub fn apply(
        self,
        lhs: &ObjectHolder,
        rhs: &ObjectHolder,
        ctx: &mut Context,
    ) -> Result<bool, EvalError> {
        match self {
            CompareOp::Eq => object::equal(lhs, rhs, ctx),
            CompareOp::NotEq => object::not_equal(lhs, rhs, ctx),
            CompareOp::Less => object::less(lhs, rhs, ctx),
            CompareOp::Greater => object::greater(lhs, rhs, ctx),
            CompareOp::LessOrEq => object::less_or_equal(lhs, rhs, ctx),
            CompareOp::GreaterOrEq => object::greater_or_equal(lhs, rhs, ctx),
        }
    }
}
