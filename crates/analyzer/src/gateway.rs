//! Thin adapter in front of the [`Analyzer`]. The gateway is where
//! compiler exceptions stop propagating: symbol queries degrade to empty
//! results with a log line, so features fail soft instead of surfacing
//! compiler errors to the client. Long-running calls are traced.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::frontend::{
	Analyzer, AnalyzerEvent, CheckOutcome, CheckResult, ParseResult, Result,
};
use crate::options::{ParsingOptions, ProjectOptions};
use crate::symbols::{
	DeclarationList, MethodGroup, PartialLongName, Symbol, SymbolUse, ToolTip,
};
use crate::types::AnalyzerDiagnostic;

#[derive(Clone)]
pub struct AnalyzerGateway {
	inner: Arc<dyn Analyzer>,
}

impl AnalyzerGateway {
	pub fn new(inner: Arc<dyn Analyzer>) -> Self {
		Self { inner }
	}

	pub async fn parse(
		&self,
		file: &Path,
		text: &str,
		options: &ParsingOptions,
	) -> Result<ParseResult> {
		debug!(file = ?file, "parse");
		self.inner.parse(file, text, options).await
	}

	pub async fn check(
		&self,
		file: &Path,
		version: i32,
		text: &str,
		options: &ProjectOptions,
	) -> Result<(ParseResult, CheckOutcome)> {
		debug!(file = ?file, version, "check");
		self.inner.check(file, version, text, options).await
	}

	pub fn try_cached(
		&self,
		file: &Path,
		options: &ProjectOptions,
	) -> Option<(ParseResult, CheckResult, i32)> {
		self.inner.try_cached(file, options)
	}

	pub async fn script_options(
		&self,
		file: &Path,
		text: &str,
		mtime: SystemTime,
	) -> Result<(Arc<ProjectOptions>, Vec<AnalyzerDiagnostic>)> {
		debug!(file = ?file, "script options");
		self.inner.script_options(file, text, mtime).await
	}

	pub fn parsing_options(&self, options: &ProjectOptions) -> ParsingOptions {
		self.inner.parsing_options(options)
	}

	/// Uses of `symbol` in a checked file; a compiler exception yields an
	/// empty list.
	pub fn uses_in_file(&self, check: &CheckResult, symbol: &Symbol) -> Vec<SymbolUse> {
		match self.inner.uses_in_file(check, symbol) {
			Ok(uses) => uses,
			Err(e) => {
				warn!(file = ?check.file, error = %e, "symbol-use query failed");
				Vec::new()
			}
		}
	}

	pub fn symbol_at(
		&self,
		check: &CheckResult,
		line: u32,
		end_col: u32,
		line_text: &str,
		names: &[String],
	) -> Option<SymbolUse> {
		self.inner.symbol_at(check, line, end_col, line_text, names)
	}

	pub fn declarations(
		&self,
		parse: &ParseResult,
		line: u32,
		line_text: &str,
		partial: &PartialLongName,
	) -> DeclarationList {
		self.inner.declarations(parse, line, line_text, partial)
	}

	pub fn methods(
		&self,
		check: &CheckResult,
		line: u32,
		end_col: u32,
		line_text: &str,
		names: &[String],
	) -> Option<MethodGroup> {
		self.inner.methods(check, line, end_col, line_text, names)
	}

	pub fn tooltip(
		&self,
		check: &CheckResult,
		line: u32,
		col: u32,
		line_text: &str,
		names: &[String],
	) -> Option<ToolTip> {
		self.inner.tooltip(check, line, col, line_text, names)
	}

	pub fn partial_long_name(&self, line_text: &str, character: u32) -> PartialLongName {
		self.inner.partial_long_name(line_text, character)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<AnalyzerEvent> {
		self.inner.subscribe()
	}
}
