use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use crate::ast::{CompareOp, Program, Statement};
use crate::lexer::{LexError, Lexer};
use crate::object::{Class, Method, Object, ObjectHolder};
use crate::token::Token;

type Result<T> = std::result::Result<T, ParserError>;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("expected {expected}, found {found:?}")]
    Unexpected {
        expected: &'static str,
        found: Token,
    },
    #[error("unknown class {0:?}")]
    UnknownClass(String),
    #[error("unknown base class {0:?}")]
    UnknownBaseClass(String),
    #[error("method definitions are only allowed inside a class body")]
    DefOutsideClass,
    #[error("cannot access a field of a method call result")]
    FieldOfCallResult,
    #[error("the assignment target must be a variable or a field")]
    BadAssignmentTarget,
}

/// Recursive-descent parser over the token stream. Stops at the first
/// error.
///
/// Class definitions are resolved while parsing: each `class` statement
/// registers its [`Class`] so later `Name(args)` expressions can be turned
/// into instantiations and base classes can be looked up.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    classes: HashMap<String, Rc<Class>>,
}

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer<'a>) -> Parser<'a> {
        Parser {
            lexer,
            classes: HashMap::new(),
        }
    }

    pub fn parse_program(&mut self) -> Result<Program> {
        let mut statements = vec![];

        while self.current() != &Token::Eof {
            // blank leading lines reach the parser as bare newlines
            if self.current() == &Token::Newline {
                self.advance()?;
                continue;
            }
            statements.push(self.parse_statement()?);
        }

        Ok(Program { statements })
    }

    fn current(&self) -> &Token {
        self.lexer.current_token()
    }

    fn advance(&mut self) -> Result<()> {
        self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, expected: &Token, what: &'static str) -> Result<()> {
        if self.current() == expected {
            self.advance()
        } else {
            Err(ParserError::Unexpected {
                expected: what,
                found: self.current().clone(),
            })
        }
    }

    fn expect_char(&mut self, c: char, what: &'static str) -> Result<()> {
        self.expect(&Token::Char(c), what)
    }

    fn expect_id(&mut self, what: &'static str) -> Result<String> {
        match self.current() {
            Token::Id(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            other => Err(ParserError::Unexpected {
                expected: what,
                found: other.clone(),
            }),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.current() {
            Token::Class => self.parse_class_definition(),
            Token::If => self.parse_if_else(),
            Token::Print => self.parse_print(),
            Token::Return => self.parse_return(),
            Token::Def => Err(ParserError::DefOutsideClass),
            _ => self.parse_simple_statement(),
        }
    }

    fn parse_class_definition(&mut self) -> Result<Statement> {
        self.advance()?;
        let name = self.expect_id("a class name")?;

        let parent = if self.current() == &Token::Char('(') {
            self.advance()?;
            let base = self.expect_id("a base class name")?;
            self.expect_char(')', "a `)` after the base class")?;
            match self.classes.get(&base) {
                Some(class) => Some(Rc::clone(class)),
                None => return Err(ParserError::UnknownBaseClass(base)),
            }
        } else {
            None
        };

        self.expect_char(':', "a `:` after the class header")?;
        self.expect(&Token::Newline, "a newline before the class body")?;
        self.expect(&Token::Indent, "an indented class body")?;

        let mut methods = vec![];
        while self.current() != &Token::Dedent {
            methods.push(self.parse_method()?);
        }
        self.advance()?;

        let class = Rc::new(Class::new(name.clone(), methods, parent));
        self.classes.insert(name, Rc::clone(&class));
        Ok(Statement::ClassDefinition(class))
    }

    fn parse_method(&mut self) -> Result<Method> {
        self.expect(&Token::Def, "a method definition")?;
        let name = self.expect_id("a method name")?;
        self.expect_char('(', "a `(` after the method name")?;

        let mut formal_params = vec![];
        if self.current() != &Token::Char(')') {
            let mut first = true;
            loop {
                let param = self.expect_id("a parameter name")?;
                // a leading `self` names the receiver, which is bound
                // implicitly at call time
                if !(first && param == "self") {
                    formal_params.push(param);
                }
                first = false;
                if self.current() == &Token::Char(',') {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect_char(')', "a `)` after the parameter list")?;

        let body = self.parse_suite()?;
        Ok(Method {
            name,
            formal_params,
            body: Box::new(Statement::MethodBody(Box::new(body))),
        })
    }

    fn parse_if_else(&mut self) -> Result<Statement> {
        self.advance()?;
        let condition = self.parse_expression()?;
        let if_body = self.parse_suite()?;

        let else_body = if self.current() == &Token::Else {
            self.advance()?;
            Some(Box::new(self.parse_suite()?))
        } else {
            None
        };

        Ok(Statement::IfElse {
            condition: Box::new(condition),
            if_body: Box::new(if_body),
            else_body,
        })
    }

    fn parse_suite(&mut self) -> Result<Statement> {
        self.expect_char(':', "a `:` introducing a block")?;
        self.expect(&Token::Newline, "a newline before an indented block")?;
        self.expect(&Token::Indent, "an indented block")?;

        let mut statements = vec![];
        while self.current() != &Token::Dedent {
            statements.push(self.parse_statement()?);
        }
        self.advance()?;

        Ok(Statement::Compound(statements))
    }

    fn parse_print(&mut self) -> Result<Statement> {
        self.advance()?;

        let mut args = vec![];
        if self.current() != &Token::Newline {
            args.push(self.parse_expression()?);
            while self.current() == &Token::Char(',') {
                self.advance()?;
                args.push(self.parse_expression()?);
            }
        }
        self.expect(&Token::Newline, "a newline after print")?;

        Ok(Statement::Print { args })
    }

    fn parse_return(&mut self) -> Result<Statement> {
        self.advance()?;
        let value = self.parse_expression()?;
        self.expect(&Token::Newline, "a newline after return")?;
        Ok(Statement::Return(Box::new(value)))
    }

    /// An assignment, a field assignment, or a bare expression such as a
    /// method call.
    fn parse_simple_statement(&mut self) -> Result<Statement> {
        let expr = self.parse_expression()?;

        let statement = if self.current() == &Token::Char('=') {
            self.advance()?;
            let rv = self.parse_expression()?;
            match expr {
                Statement::VariableValue { mut dotted_ids } => {
                    if dotted_ids.len() == 1 {
                        let var = dotted_ids.pop().expect("a variable chain is never empty");
                        Statement::Assignment {
                            var,
                            rv: Box::new(rv),
                        }
                    } else {
                        let field_name =
                            dotted_ids.pop().expect("a variable chain is never empty");
                        Statement::FieldAssignment {
                            object: Box::new(Statement::VariableValue { dotted_ids }),
                            field_name,
                            rv: Box::new(rv),
                        }
                    }
                }
                _ => return Err(ParserError::BadAssignmentTarget),
            }
        } else {
            expr
        };

        self.expect(&Token::Newline, "a newline after the statement")?;
        Ok(statement)
    }

    fn parse_expression(&mut self) -> Result<Statement> {
        let mut lhs = self.parse_and_expression()?;
        while self.current() == &Token::Or {
            self.advance()?;
            let rhs = self.parse_and_expression()?;
            lhs = Statement::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and_expression(&mut self) -> Result<Statement> {
        let mut lhs = self.parse_not_expression()?;
        while self.current() == &Token::And {
            self.advance()?;
            let rhs = self.parse_not_expression()?;
            lhs = Statement::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not_expression(&mut self) -> Result<Statement> {
        if self.current() == &Token::Not {
            self.advance()?;
            Ok(Statement::Not(Box::new(self.parse_not_expression()?)))
        } else {
            self.parse_comparison()
        }
    }

    /// A single, non-chaining comparison.
    fn parse_comparison(&mut self) -> Result<Statement> {
        let lhs = self.parse_sum()?;

        let op = match self.current() {
            Token::Eq => CompareOp::Eq,
            Token::NotEq => CompareOp::NotEq,
            Token::LessOrEq => CompareOp::LessOrEq,
            Token::GreaterOrEq => CompareOp::GreaterOrEq,
            Token::Char('<') => CompareOp::Less,
            Token::Char('>') => CompareOp::Greater,
            _ => return Ok(lhs),
        };
        self.advance()?;

        let rhs = self.parse_sum()?;
        Ok(Statement::Comparison {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_sum(&mut self) -> Result<Statement> {
        let mut lhs = self.parse_term()?;
        loop {
            let add = match self.current() {
                Token::Char('+') => true,
                Token::Char('-') => false,
                _ => return Ok(lhs),
            };
            self.advance()?;
            let rhs = self.parse_term()?;
            lhs = if add {
                Statement::Add(Box::new(lhs), Box::new(rhs))
            } else {
                Statement::Sub(Box::new(lhs), Box::new(rhs))
            };
        }
    }

    fn parse_term(&mut self) -> Result<Statement> {
        let mut lhs = self.parse_atom()?;
        loop {
            let mult = match self.current() {
                Token::Char('*') => true,
                Token::Char('/') => false,
                _ => return Ok(lhs),
            };
            self.advance()?;
            let rhs = self.parse_atom()?;
            lhs = if mult {
                Statement::Mult(Box::new(lhs), Box::new(rhs))
            } else {
                Statement::Div(Box::new(lhs), Box::new(rhs))
            };
        }
    }

    fn parse_atom(&mut self) -> Result<Statement> {
        match self.current().clone() {
            Token::Number(value) => {
                self.advance()?;
                Ok(Statement::Constant(ObjectHolder::own(Object::Number(value))))
            }
            Token::String(value) => {
                self.advance()?;
                Ok(Statement::Constant(ObjectHolder::own(Object::String(value))))
            }
            Token::True => {
                self.advance()?;
                Ok(Statement::Constant(ObjectHolder::own(Object::Bool(true))))
            }
            Token::False => {
                self.advance()?;
                Ok(Statement::Constant(ObjectHolder::own(Object::Bool(false))))
            }
            Token::None => {
                self.advance()?;
                Ok(Statement::Constant(ObjectHolder::none()))
            }
            Token::Char('(') => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect_char(')', "a closing `)`")?;
                Ok(expr)
            }
            Token::Id(name) => {
                self.advance()?;
                self.parse_name(name)
            }
            other => Err(ParserError::Unexpected {
                expected: "an expression",
                found: other,
            }),
        }
    }

    /// Everything an identifier can open: a variable, a dotted field chain,
    /// a method call chain, the `str(...)` builtin, or a class
    /// instantiation.
    fn parse_name(&mut self, first: String) -> Result<Statement> {
        if self.current() == &Token::Char('(') {
            if first == "str" {
                self.advance()?;
                let arg = self.parse_expression()?;
                self.expect_char(')', "a closing `)` after str(...)")?;
                return Ok(Statement::Stringify(Box::new(arg)));
            }
            let class = match self.classes.get(&first) {
                Some(class) => Rc::clone(class),
                None => return Err(ParserError::UnknownClass(first)),
            };
            let args = self.parse_call_args()?;
            return Ok(Statement::NewInstance { class, args });
        }

        let mut dotted_ids = vec![first];
        let mut call: Option<Statement> = None;

        while self.current() == &Token::Char('.') {
            self.advance()?;
            let id = self.expect_id("a field or method name")?;

            if self.current() == &Token::Char('(') {
                let object = match call.take() {
                    Some(object) => object,
                    None => Statement::VariableValue {
                        dotted_ids: std::mem::take(&mut dotted_ids),
                    },
                };
                let args = self.parse_call_args()?;
                call = Some(Statement::MethodCall {
                    object: Box::new(object),
                    method: id,
                    args,
                });
            } else if call.is_none() {
                dotted_ids.push(id);
            } else {
                return Err(ParserError::FieldOfCallResult);
            }
        }

        Ok(match call {
            Some(call) => call,
            None => Statement::VariableValue { dotted_ids },
        })
    }

    fn parse_call_args(&mut self) -> Result<Vec<Statement>> {
        self.advance()?;

        let mut args = vec![];
        if self.current() != &Token::Char(')') {
            args.push(self.parse_expression()?);
            while self.current() == &Token::Char(',') {
                self.advance()?;
                args.push(self.parse_expression()?);
            }
        }
        self.expect_char(')', "a closing `)` after the arguments")?;

        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Program> {
        let lexer = Lexer::new(input).expect("lexing should succeed");
        Parser::new(lexer).parse_program()
    }

    fn parse_error(input: &str) -> ParserError {
        match parse(input) {
            Ok(_) => panic!("expected {:?} to fail to parse", input),
            Err(err) => err,
        }
    }

    #[test]
    fn parses_assignments_and_expressions() {
        let program = parse("x = 1\nx.y = 2\nprint x, 2 + 3\n").unwrap();

        assert_eq!(3, program.statements.len());
        assert!(matches!(
            program.statements[0],
            Statement::Assignment { ref var, .. } if var == "x"
        ));
        assert!(matches!(
            program.statements[1],
            Statement::FieldAssignment { ref field_name, .. } if field_name == "y"
        ));
        assert!(matches!(
            program.statements[2],
            Statement::Print { ref args } if args.len() == 2
        ));
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let program = parse("x = 2 + 3 * 4\n").unwrap();

        let rv = match &program.statements[0] {
            Statement::Assignment { rv, .. } => rv,
            other => panic!("expected an assignment, got {:?}", other),
        };
        match rv.as_ref() {
            Statement::Add(_, rhs) => assert!(matches!(rhs.as_ref(), Statement::Mult(_, _))),
            other => panic!("expected an addition, got {:?}", other),
        }
    }

    #[test]
    fn class_definitions_register_the_class() {
        let program = parse(
            "
class A:
  def m(self, x):
    return x
a = A()
",
        )
        .unwrap();

        assert_eq!(2, program.statements.len());
        let class = match &program.statements[0] {
            Statement::ClassDefinition(class) => class,
            other => panic!("expected a class definition, got {:?}", other),
        };
        assert_eq!("A", class.name());

        let method = class.get_method("m").expect("method was declared");
        // the leading `self` is the receiver, not a formal parameter
        assert_eq!(vec!["x".to_owned()], method.formal_params);

        assert!(matches!(
            program.statements[1],
            Statement::NewInstance { .. }
        ));
    }

    #[test]
    fn method_call_chains() {
        let program = parse("x.a.b.m(1).n()\n").unwrap();

        let outer = match &program.statements[0] {
            Statement::MethodCall { object, method, args } => {
                assert_eq!("n", method);
                assert!(args.is_empty());
                object
            }
            other => panic!("expected a method call, got {:?}", other),
        };
        match outer.as_ref() {
            Statement::MethodCall { object, method, args } => {
                assert_eq!("m", method);
                assert_eq!(1, args.len());
                assert!(matches!(
                    object.as_ref(),
                    Statement::VariableValue { dotted_ids } if dotted_ids == &["x", "a", "b"]
                ));
            }
            other => panic!("expected a chained method call, got {:?}", other),
        }
    }

    #[test]
    fn str_builtin_parses_to_stringify() {
        let program = parse("x = str(1 + 2)\n").unwrap();

        let rv = match &program.statements[0] {
            Statement::Assignment { rv, .. } => rv,
            other => panic!("expected an assignment, got {:?}", other),
        };
        assert!(matches!(rv.as_ref(), Statement::Stringify(_)));
    }

    #[test]
    fn rejects_malformed_programs() {
        assert!(matches!(
            parse_error("1 = 2\n"),
            ParserError::BadAssignmentTarget
        ));
        assert!(matches!(
            parse_error("def m():\n  return 1\n"),
            ParserError::DefOutsideClass
        ));
        assert!(matches!(
            parse_error("x = Missing()\n"),
            ParserError::UnknownClass(name) if name == "Missing"
        ));
        assert!(matches!(
            parse_error("class B(Missing):\n  def m(self):\n    return 1\n"),
            ParserError::UnknownBaseClass(name) if name == "Missing"
        ));
        assert!(matches!(
            parse_error("x.m().f\n"),
            ParserError::FieldOfCallResult
        ));
        assert!(matches!(
            parse_error("print (1\n"),
            ParserError::Unexpected { .. }
        ));
        assert!(matches!(
            parse_error("if 1:\nprint 2\n"),
            ParserError::Unexpected { .. }
        ));
    }
}
