//! Core of the Glyph language toolchain.
//!
//! Sources are processed one line at a time:
//!
//!   source line
//!     -> lexer      (tokens)
//!     -> parser     (incremental Earley over the compiled grammar)
//!     -> typecheck  (typed statements)
//!     -> interpreter | compiler + host (Rust source built by rustc)
//!
//! [`Pipeline`] strings these together into a lazy stream of progress lines.
//! Higher-level tools (the CLI, editors) should depend on this crate rather
//! than reimplementing the passes.

// ---------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------

pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing, grammar and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod syntax;
pub mod grammar;
pub mod parser;

// ---------------------------------------------------------------------
// Semantic layers: types, scopes, type checking
// ---------------------------------------------------------------------

pub mod types;
pub mod ast;
pub mod scope;
pub mod typecheck;

// ---------------------------------------------------------------------
// Builtins and execution
// ---------------------------------------------------------------------

pub mod builtins;
pub mod value;
pub mod interpreter;

// ---------------------------------------------------------------------
// Back-end: Rust generation and the host toolchain
// ---------------------------------------------------------------------

pub mod compiler;
pub mod host;

// ---------------------------------------------------------------------
// Orchestration and storage
// ---------------------------------------------------------------------

pub mod pipeline;
pub mod store;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{Compiler, LineMap, RustProgram};
pub use error::{CoreError, GrammarError, HostCompileError, ParseError, RuntimeError, TypeError};
pub use host::{HostBuild, HostDiagnostic, HostToolchain, RUSTC_ENV, Rustc, Severity};
pub use interpreter::{Executor, MAX_CALL_DEPTH, STACK_SIZE};
pub use parser::{ParseSession, parse_source};
pub use pipeline::{Mode, Pipeline, emit_rust};
pub use store::{MemoryStore, SourceDiff, SourceStore, test_source_id};
pub use typecheck::TypeChecker;
pub use types::Type;
pub use value::Value;
