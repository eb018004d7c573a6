//! The [`Analyzer`] trait: everything the server asks of the compiler
//! front-end. Implementations own every piece of compiler state, including
//! the per-(file, options) check cache the server reads through
//! [`Analyzer::try_cached`]. All entry points must tolerate concurrent
//! callers; serializing same-file checks internally is fine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::options::{ParsingOptions, ProjectOptions};
use crate::symbols::{
	DeclarationList, MethodGroup, NavigationTree, PartialLongName, Symbol, SymbolUse, ToolTip,
};
use crate::types::AnalyzerDiagnostic;

/// Syntactic analysis of one file.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
	pub file: PathBuf,
	pub diagnostics: Vec<AnalyzerDiagnostic>,
	pub navigation: NavigationTree,
}

/// Semantic analysis of one file at one version.
#[derive(Debug, Clone, Default)]
pub struct CheckResult {
	pub file: PathBuf,
	pub version: i32,
	pub diagnostics: Vec<AnalyzerDiagnostic>,
}

/// A check either completes or is abandoned mid-way by the compiler;
/// an abort still leaves the parse result usable.
#[derive(Debug, Clone)]
pub enum CheckOutcome {
	Checked(CheckResult),
	Aborted,
}

/// Out-of-band signals from the compiler. Subscribers run on the reporting
/// task and must not block.
#[derive(Debug, Clone)]
pub enum AnalyzerEvent {
	/// The compiler is about to check the named file in the background,
	/// typically a dependency pulled in by a foreground check.
	BeforeBackgroundCheck(PathBuf),
	/// The compiler hit its memory ceiling and dropped caches.
	MaxMemory,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
	#[error("compiler exception: {0}")]
	Exception(String),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;

#[async_trait]
pub trait Analyzer: Send + Sync {
	async fn parse(&self, file: &Path, text: &str, options: &ParsingOptions)
	-> Result<ParseResult>;

	/// Parse and type-check `file` at `version`.
	async fn check(
		&self,
		file: &Path,
		version: i32,
		text: &str,
		options: &ProjectOptions,
	) -> Result<(ParseResult, CheckOutcome)>;

	/// Most recent completed check for `(file, options)`, if the compiler
	/// still holds one, with the version it was checked at.
	fn try_cached(
		&self,
		file: &Path,
		options: &ProjectOptions,
	) -> Option<(ParseResult, CheckResult, i32)>;

	/// Compilation context for a standalone script, plus any diagnostics
	/// produced while resolving its `#load`/`#r` directives.
	async fn script_options(
		&self,
		file: &Path,
		text: &str,
		mtime: SystemTime,
	) -> Result<(Arc<ProjectOptions>, Vec<AnalyzerDiagnostic>)>;

	fn parsing_options(&self, options: &ProjectOptions) -> ParsingOptions;

	/// Every use of `symbol` in the checked file.
	fn uses_in_file(&self, check: &CheckResult, symbol: &Symbol) -> Result<Vec<SymbolUse>>;

	/// The symbol whose identifier ends at `end_col` on `line` (1-based).
	fn symbol_at(
		&self,
		check: &CheckResult,
		line: u32,
		end_col: u32,
		line_text: &str,
		names: &[String],
	) -> Option<SymbolUse>;

	fn declarations(
		&self,
		parse: &ParseResult,
		line: u32,
		line_text: &str,
		partial: &PartialLongName,
	) -> DeclarationList;

	fn methods(
		&self,
		check: &CheckResult,
		line: u32,
		end_col: u32,
		line_text: &str,
		names: &[String],
	) -> Option<MethodGroup>;

	fn tooltip(
		&self,
		check: &CheckResult,
		line: u32,
		col: u32,
		line_text: &str,
		names: &[String],
	) -> Option<ToolTip>;

	/// Quick-parse of the qualifiers and partial identifier left of the
	/// cursor; used to scope completion.
	fn partial_long_name(&self, line_text: &str, character: u32) -> PartialLongName {
		quick_partial_long_name(line_text, character)
	}

	fn subscribe(&self) -> broadcast::Receiver<AnalyzerEvent>;
}

/// Default quick-parse: a dotted chain of identifiers immediately left of
/// the cursor, the last (possibly empty) one being the partial identifier.
pub fn quick_partial_long_name(line: &str, character: u32) -> PartialLongName {
	fn ident_start(s: &str) -> usize {
		let mut start = s.len();
		for (i, c) in s.char_indices().rev() {
			if c.is_alphanumeric() || c == '_' {
				start = i;
			} else {
				break;
			}
		}
		start
	}

	let Some(cursor) = fjord_text::utf16_to_byte(line, character) else {
		return PartialLongName::default();
	};
	let prefix = &line[..cursor];

	let partial_start = ident_start(prefix);
	let partial_ident = prefix[partial_start..].to_string();
	let mut rest = &prefix[..partial_start];

	let mut qualifying_idents = Vec::new();
	while let Some(before_dot) = rest.strip_suffix('.') {
		let start = ident_start(before_dot);
		if start == before_dot.len() {
			break;
		}
		qualifying_idents.push(before_dot[start..].to_string());
		rest = &before_dot[..start];
	}
	qualifying_idents.reverse();

	PartialLongName {
		qualifying_idents,
		partial_ident,
	}
}
