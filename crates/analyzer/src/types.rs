//! Ranges and diagnostics in the compiler's coordinate space: 1-based
//! lines, 0-based columns. Conversion to LSP coordinates happens at the
//! server boundary, nowhere else.

use std::path::PathBuf;

/// A span in one source file, compiler convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceRange {
	pub start_line: u32,
	pub start_col: u32,
	pub end_line: u32,
	pub end_col: u32,
}

impl SourceRange {
	pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
		Self {
			start_line,
			start_col,
			end_line,
			end_col,
		}
	}

	/// Zero-width span at the very top of a file.
	pub fn top_of_file() -> Self {
		Self::new(1, 0, 1, 0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
	Error,
	Warning,
	Info,
	Hint,
}

/// One compiler diagnostic, parse- or check-produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerDiagnostic {
	pub file: PathBuf,
	pub severity: DiagnosticSeverity,
	pub range: SourceRange,
	pub message: String,
	pub code: Option<String>,
}

impl AnalyzerDiagnostic {
	/// An error pinned to the top of `file`, for failures that have no
	/// better location (project resolution, missing source).
	pub fn error_at_top(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
		Self {
			file: file.into(),
			severity: DiagnosticSeverity::Error,
			range: SourceRange::top_of_file(),
			message: message.into(),
			code: None,
		}
	}
}
