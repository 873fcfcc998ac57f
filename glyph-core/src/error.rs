use thiserror::Error;

use crate::host::HostDiagnostic;
use crate::lexer::Position;
use crate::types::Type;

/// Problems found while compiling grammar text into parser tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("grammar syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("grammar defines no rules")]
    Empty,
    #[error("rule `{rule}` is defined more than once")]
    DuplicateRule { rule: String },
    #[error("rule `{rule}` references undefined rule `{reference}`")]
    UndefinedRule { rule: String, reference: String },
    #[error("rule `{rule}` has an empty alternative")]
    EmptyAlternative { rule: String },
    #[error("rule `{rule}` uses unknown token category `{category}`")]
    UnknownCategory { rule: String, category: String },
    #[error("rule `{rule}` names unknown node kind `{kind}`")]
    UnknownNodeKind { rule: String, kind: String },
    #[error("rule `{rule}`: {message}")]
    InvalidInstruction { rule: String, message: String },
}

/// Failures while turning tokens into raw statements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unrecognized input `{text}` at {position}")]
    Unrecognized { text: String, position: Position },
    #[error("unexpected {found} at {position}, expected one of: {}", .expected.join(", "))]
    UnexpectedToken {
        found: String,
        position: Position,
        expected: Vec<String>,
    },
    #[error("no derivation for input: {unconsumed}")]
    NoDerivation { unconsumed: String },
    #[error("ambiguous grammar: {report}")]
    Ambiguous { report: String },
    #[error("cleanup of rule `{rule}` failed: {message}")]
    Cleanup { rule: String, message: String },
}

/// Static errors raised by the type checker. A statement that raises one is
/// rejected as a whole.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    #[error("{rhs} cannot {verb} with type {lhs}")]
    Operator { verb: String, lhs: Type, rhs: Type },
    #[error("expected {expected} but found {found} in {construct}")]
    Mismatch {
        expected: Type,
        found: Type,
        construct: String,
    },
    #[error("identifier {name} cannot hold a value of type {found}")]
    Sigil { name: String, found: Type },
    #[error("{name} is not defined")]
    Unbound { name: String },
    #[error("{construct} is not a function but {found}")]
    NotAFunction { construct: String, found: Type },
    #[error("cannot apply {construct}: function of type {ty} takes no more arguments")]
    Saturated { construct: String, ty: Type },
    #[error("cannot call {construct}: {remaining} argument(s) still missing for {ty}")]
    MissingArguments {
        construct: String,
        remaining: usize,
        ty: Type,
    },
    #[error("no overload of {name} accepts {found}")]
    NoOverload { name: String, found: Type },
    #[error("overloaded function {name} must be applied before it is used as a value")]
    Overloaded { name: String },
    #[error("{found} is not a struct, so it has no field {field}")]
    NotAStruct { found: Type, field: String },
    #[error("struct {structure} has no field {field}")]
    UnknownField { structure: String, field: String },
    #[error("struct {name} is already defined with different fields")]
    StructRedefined { name: String },
    #[error("{name} refers to itself but has no declared function type")]
    UndeclaredRecursion { name: String },
    #[error("{name} is captured from outside the function and cannot be assigned")]
    CapturedAssignment { name: String },
    #[error("{construct}: {message}")]
    Invalid { construct: String, message: String },
}

impl TypeError {
    pub fn invalid(construct: impl Into<String>, message: impl Into<String>) -> Self {
        TypeError::Invalid {
            construct: construct.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while executing typed statements. Fatal to the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("{name} is not bound")]
    Unbound { name: String },
    #[error("function called with {applied} of {expected} arguments")]
    Arity { expected: usize, applied: usize },
    #[error("value has no field {field}")]
    UnknownField { field: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in {operation}")]
    Overflow { operation: String },
    #[error("index {index} is out of range for an array of length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("function ended without returning a value")]
    MissingReturn,
    #[error("recursion deeper than {limit} calls")]
    RecursionLimit { limit: usize },
    #[error("{construct} outside of a loop")]
    StrayControl { construct: String },
    #[error("expected {expected} at runtime but found {found}")]
    Mismatch { expected: String, found: String },
}

/// The host compiler rejected the generated program, or could not be driven.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostCompileError {
    #[error("host compiler rejected the generated program ({} diagnostic(s))", .diagnostics.len())]
    Rejected { diagnostics: Vec<HostDiagnostic> },
    #[error("failed to invoke host toolchain: {0}")]
    Toolchain(String),
    #[error("compiled program failed with {status}: {stderr}")]
    Crashed {
        status: String,
        stderr: String,
        /// Lines the program printed before it failed.
        output: Vec<String>,
    },
}

/// Aggregate error for the whole pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Host(#[from] HostCompileError),
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("no source stored under `{0}`")]
    MissingSource(String),
}

impl CoreError {
    /// Category word used in progress diagnostics.
    pub fn category(&self) -> &'static str {
        match self {
            CoreError::Grammar(_) | CoreError::Parse(_) => "Parse",
            CoreError::Type(_) => "Type",
            CoreError::Runtime(_) | CoreError::Host(HostCompileError::Crashed { .. }) => "Runtime",
            CoreError::Host(_) => "Compile",
            CoreError::SourceIo(_) | CoreError::MissingSource(_) => "Source",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_error_names_both_types() {
        let err = TypeError::Operator {
            verb: "add".into(),
            lhs: Type::Int,
            rhs: Type::Str,
        };
        assert_eq!(err.to_string(), "string cannot add with type integer");
    }

    #[test]
    fn categories_follow_the_failing_stage() {
        let parse: CoreError = ParseError::NoDerivation {
            unconsumed: "if".into(),
        }
        .into();
        assert_eq!(parse.category(), "Parse");
        let runtime: CoreError = RuntimeError::DivisionByZero.into();
        assert_eq!(runtime.category(), "Runtime");
        let crashed: CoreError = HostCompileError::Crashed {
            status: "exit status: 101".into(),
            stderr: "division by zero".into(),
            output: Vec::new(),
        }
        .into();
        assert_eq!(crashed.category(), "Runtime");
        let rejected: CoreError = HostCompileError::Rejected {
            diagnostics: Vec::new(),
        }
        .into();
        assert_eq!(rejected.category(), "Compile");
    }
}
