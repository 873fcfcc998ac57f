//! Check, run and compile passes as lazy streams of progress lines.
//!
//! A [`Pipeline`] is an iterator: it does one source line of work per step
//! and yields whatever that work printed. Dropping it aborts the pass.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::compiler::{Compiler, RustProgram};
use crate::error::{CoreError, HostCompileError};
use crate::host::{HostToolchain, Rustc, Severity};
use crate::interpreter::Executor;
use crate::parser::ParseSession;
use crate::syntax::RawNode;
use crate::typecheck::TypeChecker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Parse and type-check only.
    Check,
    /// Execute each statement as soon as it is checked.
    Run,
    /// Lower everything to Rust, build it, then run the binary.
    Compile,
}

impl Mode {
    fn banner(self) -> &'static str {
        match self {
            Mode::Check => "Checking",
            Mode::Run => "Running",
            Mode::Compile => "Compiling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    Lines,
    Done,
}

pub struct Pipeline {
    mode: Mode,
    id: String,
    lines: Vec<String>,
    next_line: usize,
    stage: Stage,
    failed: bool,
    pending: VecDeque<String>,
    session: Option<ParseSession<'static>>,
    checker: TypeChecker,
    executor: Executor,
    compiler: Compiler,
    toolchain: Box<dyn HostToolchain>,
}

impl Pipeline {
    pub fn new(mode: Mode, id: impl Into<String>, source: &str) -> Self {
        Pipeline {
            mode,
            id: id.into(),
            lines: source.lines().map(str::to_string).collect(),
            next_line: 0,
            stage: Stage::Start,
            failed: false,
            pending: VecDeque::new(),
            session: None,
            checker: TypeChecker::new(),
            executor: Executor::new(),
            compiler: Compiler::new(),
            toolchain: Box::new(Rustc::from_env()),
        }
    }

    /// Use another host toolchain for [`Mode::Compile`].
    pub fn with_toolchain(mut self, toolchain: impl HostToolchain + 'static) -> Self {
        self.toolchain = Box::new(toolchain);
        self
    }

    /// True once the pass has finished without an error.
    pub fn succeeded(&self) -> bool {
        self.stage == Stage::Done && !self.failed
    }

    /// Text of a 1-based source line.
    fn line_text(&self, line: usize) -> String {
        line.checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .map(|text| text.trim().to_string())
            .unwrap_or_default()
    }

    fn fail(&mut self, error: CoreError, verb: &str, subject: String) {
        debug!(id = %self.id, %error, "pass failed");
        self.pending.push_back(format!(
            "{} error <- encountered while {verb} {subject}\n{}",
            error.category(),
            describe(&error)
        ));
        self.failed = true;
        self.stage = Stage::Done;
    }

    fn start(&mut self) {
        self.pending
            .push_back(format!("{} {}...", self.mode.banner(), self.id));
        match ParseSession::standard() {
            Ok(session) => {
                self.session = Some(session);
                self.stage = Stage::Lines;
            }
            Err(error) => self.fail(error.into(), "parsing", "the grammar".to_string()),
        }
    }

    /// Feed the next line, or finish the pass when none are left.
    fn step(&mut self) {
        let Some(session) = self.session.as_mut() else {
            self.stage = Stage::Done;
            return;
        };

        if self.next_line < self.lines.len() {
            let text = self.lines[self.next_line].clone();
            self.next_line += 1;
            match session.feed_line(&text) {
                Ok(statements) => self.process(statements),
                Err(error) => self.fail(error.into(), "parsing", text.trim().to_string()),
            }
            return;
        }

        match session.finish() {
            Ok(statements) => self.process(statements),
            Err(error) => {
                let subject = self.line_text(self.lines.len());
                self.fail(error.into(), "parsing", subject);
            }
        }
        if self.failed {
            return;
        }
        if self.mode == Mode::Compile {
            self.build_and_run();
        }
        if !self.failed {
            self.pending.push_back("Done.".to_string());
            self.stage = Stage::Done;
            info!(id = %self.id, mode = ?self.mode, "pass finished");
        }
    }

    fn process(&mut self, statements: Vec<RawNode>) {
        for raw in statements {
            if self.failed {
                return;
            }
            let line = raw.position().map_or(0, |position| position.line);
            let subject = self.line_text(line);
            let statement = match self.checker.convert(&raw) {
                Ok(statement) => statement,
                Err(error) => {
                    self.fail(error.into(), "checking", subject);
                    return;
                }
            };
            match self.mode {
                Mode::Check => {}
                Mode::Run => match self.executor.run(&statement) {
                    Ok(output) => self.pending.extend(output),
                    Err(error) => {
                        self.pending.extend(self.executor.take_output());
                        self.fail(error.into(), "running", subject);
                    }
                },
                Mode::Compile => self.compiler.compile(&statement, line),
            }
        }
    }

    fn build_and_run(&mut self) {
        let program = std::mem::take(&mut self.compiler).finish();
        let build = match self.toolchain.build(&program) {
            Ok(build) => build,
            Err(error) => {
                let subject = match &error {
                    HostCompileError::Rejected { diagnostics } => diagnostics
                        .iter()
                        .find_map(|diagnostic| diagnostic.source_line)
                        .map(|line| self.line_text(line))
                        .unwrap_or_else(|| self.id.clone()),
                    _ => self.id.clone(),
                };
                self.fail(error.into(), "compiling", subject);
                return;
            }
        };
        match build.run() {
            Ok(output) => self.pending.extend(output),
            Err(error) => {
                if let HostCompileError::Crashed { output, .. } = &error {
                    self.pending.extend(output.iter().cloned());
                }
                let subject = self.id.clone();
                self.fail(error.into(), "running", subject);
            }
        }
    }
}

impl Iterator for Pipeline {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Some(line);
            }
            match self.stage {
                Stage::Start => self.start(),
                Stage::Lines => self.step(),
                Stage::Done => return None,
            }
        }
    }
}

/// Check `source` and lower it to Rust without building it.
pub fn emit_rust(source: &str) -> Result<RustProgram, CoreError> {
    let mut session = ParseSession::standard()?;
    let mut checker = TypeChecker::new();
    let mut compiler = Compiler::new();
    let mut raw = Vec::new();
    for line in source.lines() {
        raw.extend(session.feed_line(line)?);
    }
    raw.extend(session.finish()?);
    for node in &raw {
        let line = node.position().map_or(0, |position| position.line);
        compiler.compile(&checker.convert(node)?, line);
    }
    Ok(compiler.finish())
}

/// The message line under a diagnostic header.
fn describe(error: &CoreError) -> String {
    match error {
        CoreError::Host(HostCompileError::Rejected { diagnostics }) if !diagnostics.is_empty() => {
            diagnostics
                .iter()
                .filter(|diagnostic| diagnostic.severity == Severity::Error)
                .map(|diagnostic| match diagnostic.source_line {
                    Some(line) => format!("line {line}: {}", diagnostic.message),
                    None => diagnostic.message.clone(),
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        CoreError::Host(HostCompileError::Crashed { stderr, .. }) => stderr.clone(),
        other => other.to_string(),
    }
}
