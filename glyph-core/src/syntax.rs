//! Raw syntax tree produced by the parser after grammar cleanup.
//!
//! [`NodeKind`] is the one list of branch kinds. The grammar engine validates
//! kind names against it, cleanup builds branches with it, and the type
//! checker matches on it exhaustively.

use std::fmt;
use std::str::FromStr;

use crate::lexer::{Position, Token};

macro_rules! node_kinds {
    ($($kind:ident),* $(,)?) => {
        /// Kind of a branch in the cleaned-up parse tree.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NodeKind {
            $($kind),*
        }

        impl NodeKind {
            pub const ALL: &'static [NodeKind] = &[$(NodeKind::$kind),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(NodeKind::$kind => stringify!($kind)),*
                }
            }
        }

        impl FromStr for NodeKind {
            type Err = ();

            fn from_str(name: &str) -> Result<Self, Self::Err> {
                match name {
                    $(stringify!($kind) => Ok(NodeKind::$kind),)*
                    _ => Err(()),
                }
            }
        }
    };
}

node_kinds! {
    // Statements
    Assignment,
    Return,
    Break,
    Continue,
    ExpressionStatement,
    If,
    ElseIf,
    Else,
    While,
    DoWhile,
    For,
    ForIn,
    Do,
    Block,

    // Receivers
    Annotated,
    FieldReceiver,
    ConditionalReceiver,

    // Expressions
    Conditional,
    FunctionLiteral,
    StructConstructor,
    Params,
    BinaryOp,
    Apply,
    TupleApply,
    Call,
    Field,
    Index,
    Negative,
    Tuple,
    Array,

    // Type annotations
    TupleType,
    ArrayType,
    FunctionType,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A cleaned-up parse tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawNode {
    Leaf(Token),
    Branch(NodeKind, Vec<RawNode>),
}

impl RawNode {
    pub fn kind(&self) -> Option<NodeKind> {
        match self {
            RawNode::Branch(kind, _) => Some(*kind),
            RawNode::Leaf(_) => None,
        }
    }

    pub fn children(&self) -> &[RawNode] {
        match self {
            RawNode::Branch(_, children) => children,
            RawNode::Leaf(_) => &[],
        }
    }

    pub fn token(&self) -> Option<&Token> {
        match self {
            RawNode::Leaf(token) => Some(token),
            RawNode::Branch(..) => None,
        }
    }

    /// Position of the leftmost token under this node.
    pub fn position(&self) -> Option<Position> {
        match self {
            RawNode::Leaf(token) => Some(token.position),
            RawNode::Branch(_, children) => children.iter().find_map(RawNode::position),
        }
    }

    /// Canonical S-expression form. Two trees are equal exactly when their
    /// canonical forms are.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            RawNode::Leaf(token) => out.push_str(&format!("{:?}", token.text)),
            RawNode::Branch(kind, children) => {
                out.push('(');
                out.push_str(kind.name());
                for child in children {
                    out.push(' ');
                    child.write_canonical(out);
                }
                out.push(')');
            }
        }
    }
}

impl fmt::Display for RawNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Category;

    fn leaf(text: &str, column: usize) -> RawNode {
        RawNode::Leaf(Token {
            category: Category::Identifier,
            text: text.to_string(),
            position: Position { line: 1, column },
        })
    }

    #[test]
    fn kind_names_round_trip_through_from_str() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.name().parse::<NodeKind>(), Ok(*kind));
        }
        assert!("Nope".parse::<NodeKind>().is_err());
    }

    #[test]
    fn canonical_form_nests_children() {
        let node = RawNode::Branch(
            NodeKind::BinaryOp,
            vec![leaf("iA", 1), leaf("+", 4), leaf("iB", 6)],
        );
        assert_eq!(node.canonical(), r#"(BinaryOp "iA" "+" "iB")"#);
        assert_eq!(node.position(), Some(Position { line: 1, column: 1 }));
    }
}
