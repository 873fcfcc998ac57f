//! Bridge to the host Rust toolchain.
//!
//! A [`HostToolchain`] turns a generated [`RustProgram`] into an executable.
//! The standard implementation drives `rustc` on a temporary directory and
//! maps its short-format diagnostics back to Glyph source lines.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;
use tracing::{info, warn};

use crate::compiler::{LineMap, RustProgram};
use crate::error::HostCompileError;

/// Environment variable naming the `rustc` binary to use.
pub const RUSTC_ENV: &str = "GLYPH_RUSTC";

const SOURCE_FILE: &str = "main.rs";
const BINARY_FILE: &str = "glyph_program";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    /// `help:` and `note:` lines.
    Suggestion,
}

/// One diagnostic reported by the host compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDiagnostic {
    pub severity: Severity,
    pub message: String,
    /// Glyph line the offending generated line came from, if known.
    pub source_line: Option<usize>,
}

pub trait HostToolchain {
    fn build(&self, program: &RustProgram) -> Result<HostBuild, HostCompileError>;
}

/// A successfully built program. The binary lives as long as this value.
#[derive(Debug)]
pub struct HostBuild {
    _dir: TempDir,
    binary: PathBuf,
    /// Warnings and suggestions the build produced.
    pub diagnostics: Vec<HostDiagnostic>,
}

impl HostBuild {
    /// Run the binary and collect the lines it printed.
    pub fn run(&self) -> Result<Vec<String>, HostCompileError> {
        let output = Command::new(&self.binary)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| HostCompileError::Toolchain(format!("cannot run compiled program: {err}")))?;

        let lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect();
        if output.status.success() {
            return Ok(lines);
        }
        Err(HostCompileError::Crashed {
            status: output.status.to_string(),
            stderr: panic_message(&String::from_utf8_lossy(&output.stderr)),
            output: lines,
        })
    }
}

/// `rustc` invoked directly, without cargo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rustc {
    pub path: PathBuf,
}

impl Default for Rustc {
    fn default() -> Self {
        Rustc::from_env()
    }
}

impl Rustc {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Rustc { path: path.into() }
    }

    /// `$GLYPH_RUSTC`, or `rustc` from the search path.
    pub fn from_env() -> Self {
        let path = std::env::var_os(RUSTC_ENV).unwrap_or_else(|| "rustc".into());
        Rustc::new(path)
    }

    /// Whether the binary answers `--version`.
    pub fn is_available(&self) -> bool {
        Command::new(&self.path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    fn invoke(&self, dir: &Path) -> Result<std::process::Output, HostCompileError> {
        Command::new(&self.path)
            .current_dir(dir)
            .args(["--edition", "2021", "--error-format=short", "-o", BINARY_FILE, SOURCE_FILE])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                HostCompileError::Toolchain(format!("cannot start {}: {err}", self.path.display()))
            })
    }
}

impl HostToolchain for Rustc {
    fn build(&self, program: &RustProgram) -> Result<HostBuild, HostCompileError> {
        let dir = tempfile::tempdir()
            .map_err(|err| HostCompileError::Toolchain(format!("cannot create build directory: {err}")))?;
        fs::write(dir.path().join(SOURCE_FILE), &program.source)
            .map_err(|err| HostCompileError::Toolchain(format!("cannot write program: {err}")))?;

        info!(rustc = %self.path.display(), lines = program.line_map.len(), "building generated program");
        let output = self.invoke(dir.path())?;
        let diagnostics = parse_diagnostics(&String::from_utf8_lossy(&output.stderr), &program.line_map);

        let errors: Vec<HostDiagnostic> = diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity == Severity::Error)
            .cloned()
            .collect();
        if !errors.is_empty() || !output.status.success() {
            return Err(HostCompileError::Rejected {
                diagnostics: if errors.is_empty() { diagnostics } else { errors },
            });
        }
        for diagnostic in &diagnostics {
            warn!(line = ?diagnostic.source_line, "{}", diagnostic.message);
        }

        let binary = dir.path().join(BINARY_FILE);
        Ok(HostBuild {
            _dir: dir,
            binary,
            diagnostics,
        })
    }
}

/// Parse `rustc --error-format=short` output.
///
/// Lines look like `main.rs:12:5: error[E0308]: mismatched types`. Summary
/// lines without a location are dropped.
pub fn parse_diagnostics(stderr: &str, line_map: &LineMap) -> Vec<HostDiagnostic> {
    stderr
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix(SOURCE_FILE)?.strip_prefix(':')?;
            let (line_number, rest) = rest.split_once(':')?;
            let (_column, rest) = rest.split_once(':')?;
            let (label, message) = rest.trim_start().split_once(": ")?;
            let severity = if label.starts_with("error") {
                Severity::Error
            } else if label.starts_with("warning") {
                Severity::Warning
            } else if label.starts_with("help") || label.starts_with("note") {
                Severity::Suggestion
            } else {
                return None;
            };
            Some(HostDiagnostic {
                severity,
                message: message.to_string(),
                source_line: line_number
                    .parse()
                    .ok()
                    .and_then(|generated| line_map.source_line(generated)),
            })
        })
        .collect()
}

/// The panic payload out of the default panic hook's output.
fn panic_message(stderr: &str) -> String {
    let mut lines = stderr.lines();
    while let Some(line) = lines.next() {
        let Some((_, at)) = line.split_once("panicked at ") else {
            continue;
        };
        // Older toolchains quote the payload on the same line.
        if let Some((message, _)) = at.strip_prefix('\'').and_then(|quoted| quoted.rsplit_once("', ")) {
            return message.to_string();
        }
        return lines
            .next()
            .map_or_else(|| at.to_string(), |message| message.trim().to_string());
    }
    stderr.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_diagnostics_map_to_glyph_lines() {
        let line_map = LineMap::from_lines(vec![None, None, Some(1), Some(2)]);
        let stderr = "\
main.rs:4:9: error[E0308]: mismatched types
main.rs:3:1: warning: unused variable: `iX`
main.rs:1:1: help: consider removing this
error: aborting due to 1 previous error
";
        let diagnostics = parse_diagnostics(stderr, &line_map);
        assert_eq!(
            diagnostics,
            vec![
                HostDiagnostic {
                    severity: Severity::Error,
                    message: "mismatched types".into(),
                    source_line: Some(2),
                },
                HostDiagnostic {
                    severity: Severity::Warning,
                    message: "unused variable: `iX`".into(),
                    source_line: Some(1),
                },
                HostDiagnostic {
                    severity: Severity::Suggestion,
                    message: "consider removing this".into(),
                    source_line: None,
                },
            ]
        );
    }

    #[test]
    fn panic_messages_are_extracted() {
        let stderr = "thread 'main' panicked at main.rs:81:9:\ndivision by zero\nnote: run with `RUST_BACKTRACE=1`";
        assert_eq!(panic_message(stderr), "division by zero");
        assert_eq!(panic_message("killed"), "killed");
    }

    #[test]
    fn missing_toolchain_is_reported() {
        let rustc = Rustc::new("/nonexistent/glyph-rustc");
        assert!(!rustc.is_available());
        let program = RustProgram {
            source: "fn main() {}\n".into(),
            line_map: LineMap::from_lines(vec![None]),
        };
        assert!(matches!(
            rustc.build(&program),
            Err(HostCompileError::Toolchain(_))
        ));
    }
}
