//! Typed abstract syntax tree.
//!
//! Produced by the type checker from raw statements. Every expression carries
//! its inferred [`Type`]; the executor and the compiler both consume this
//! form and never look at raw nodes.

use std::fmt;
use std::rc::Rc;

use crate::builtins::BuiltinKind;
use crate::types::{StructType, Type};

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    Char(char),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Constant(Literal),
    Variable(String),
    /// A built-in function with its overload already chosen.
    Builtin(BuiltinKind),
    Field {
        base: Box<Expr>,
        field: String,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    FunctionLiteral(Rc<FunctionDef>),
    StructConstructor(StructType),
    BinaryOp {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Tuple(Vec<Expr>),
    Array(Vec<Expr>),
    /// `f : x` binds one argument.
    Apply {
        callee: Box<Expr>,
        arg: Box<Expr>,
    },
    /// `f :: t` binds the elements of a tuple as leading arguments.
    TupleApply {
        callee: Box<Expr>,
        args: Box<Expr>,
    },
    /// `f ;` runs a function whose arguments are all bound.
    Call(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<BinaryOp> {
        let op = match symbol {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "//" => BinaryOp::IntDiv,
            "%" => BinaryOp::Rem,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "//",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Verb used in operator type errors.
    pub fn verb(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "subtract",
            BinaryOp::Mul => "multiply",
            BinaryOp::Div => "divide",
            BinaryOp::IntDiv => "integer-divide",
            BinaryOp::Rem => "take the remainder",
            BinaryOp::Eq | BinaryOp::Ne => "compare for equality",
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => "compare",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub params: Vec<(String, Type)>,
    pub body: FunctionBody,
    pub result: Type,
    /// Names read from enclosing scopes, in sorted order.
    pub captures: Vec<String>,
    /// Set when the body refers to the binding being defined.
    pub self_name: Option<String>,
}

impl FunctionDef {
    pub fn ty(&self) -> Type {
        Type::function(
            self.params.iter().map(|(_, ty)| ty.clone()).collect(),
            self.result.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Expr(Expr),
    Block(Vec<Statement>),
}

/// Assignment target.
#[derive(Debug, Clone, PartialEq)]
pub enum Receiver {
    Variable(String),
    /// `oP.iX`, or deeper paths such as `oA.oB.iX`.
    Field { base: String, path: Vec<String> },
    Conditional {
        condition: Expr,
        then: Box<Receiver>,
        otherwise: Box<Receiver>,
    },
}

impl fmt::Display for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Receiver::Variable(name) => f.write_str(name),
            Receiver::Field { base, path } => {
                f.write_str(base)?;
                for field in path {
                    write!(f, ".{field}")?;
                }
                Ok(())
            }
            Receiver::Conditional { then, otherwise, .. } => {
                write!(f, "(if .. then {then} else {otherwise})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment {
        target: Receiver,
        value: Expr,
        /// True when the assignment introduces a new binding.
        declares: bool,
    },
    Return(Expr),
    Break,
    Continue,
    Expression(Expr),
    If {
        branches: Vec<(Expr, Vec<Statement>)>,
        otherwise: Option<Vec<Statement>>,
    },
    While {
        condition: Expr,
        body: Vec<Statement>,
    },
    DoWhile {
        body: Vec<Statement>,
        condition: Expr,
    },
    /// Inclusive integer range.
    For {
        var: String,
        from: Expr,
        to: Expr,
        body: Vec<Statement>,
    },
    ForIn {
        var: String,
        iterable: Expr,
        body: Vec<Statement>,
    },
    Do(Vec<Statement>),
}
