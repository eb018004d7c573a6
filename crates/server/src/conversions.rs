//! Conversions from the compiler's data model (1-based lines, 0-based
//! columns) to LSP types, plus the two kind-mapping tables. This is the
//! only place the coordinate change happens.

use std::path::{Path, PathBuf};

use tower_lsp::lsp_types::{
	CompletionItemKind, Diagnostic, DiagnosticSeverity, Location, MarkedString, NumberOrString,
	Position, Range, SymbolKind, Url,
};

use fjord_analyzer::{
	AnalyzerDiagnostic, CompletionKind, NavigationKind, SourceRange, SymbolLocation, ToolTip,
};

pub fn path_to_uri(path: &Path) -> Option<Url> {
	Url::from_file_path(path).ok()
}

pub fn uri_to_path(uri: &Url) -> Option<PathBuf> {
	uri.to_file_path().ok()
}

pub fn lsp_range(range: SourceRange) -> Range {
	Range {
		start: Position {
			line: range.start_line.saturating_sub(1),
			character: range.start_col,
		},
		end: Position {
			line: range.end_line.saturating_sub(1),
			character: range.end_col,
		},
	}
}

pub fn lsp_location(location: &SymbolLocation) -> Option<Location> {
	Some(Location {
		uri: path_to_uri(&location.file)?,
		range: lsp_range(location.range),
	})
}

pub fn lsp_diagnostic(diagnostic: &AnalyzerDiagnostic) -> Diagnostic {
	Diagnostic {
		range: lsp_range(diagnostic.range),
		severity: Some(match diagnostic.severity {
			fjord_analyzer::DiagnosticSeverity::Error => DiagnosticSeverity::ERROR,
			fjord_analyzer::DiagnosticSeverity::Warning => DiagnosticSeverity::WARNING,
			fjord_analyzer::DiagnosticSeverity::Info => DiagnosticSeverity::INFORMATION,
			fjord_analyzer::DiagnosticSeverity::Hint => DiagnosticSeverity::HINT,
		}),
		code: diagnostic.code.clone().map(NumberOrString::String),
		source: Some("F# Compiler".to_string()),
		message: diagnostic.message.clone(),
		..Diagnostic::default()
	}
}

/// Compiler completion kinds to LSP; `Event` and `Other` carry no useful
/// kind and stay unset.
pub fn completion_kind(kind: CompletionKind) -> Option<CompletionItemKind> {
	match kind {
		CompletionKind::Field => Some(CompletionItemKind::FIELD),
		CompletionKind::Property => Some(CompletionItemKind::PROPERTY),
		CompletionKind::Method { .. } => Some(CompletionItemKind::METHOD),
		CompletionKind::Argument => Some(CompletionItemKind::VARIABLE),
		CompletionKind::Event | CompletionKind::Other => None,
	}
}

pub fn symbol_kind(kind: NavigationKind) -> SymbolKind {
	match kind {
		NavigationKind::Namespace => SymbolKind::NAMESPACE,
		NavigationKind::Module | NavigationKind::ModuleFile => SymbolKind::MODULE,
		NavigationKind::Type => SymbolKind::INTERFACE,
		NavigationKind::Exception => SymbolKind::CLASS,
		NavigationKind::Method => SymbolKind::METHOD,
		NavigationKind::Property => SymbolKind::PROPERTY,
		NavigationKind::Field => SymbolKind::FIELD,
		NavigationKind::Other => SymbolKind::VARIABLE,
	}
}

/// Tooltip groups flatten to alternating highlighted signatures and plain
/// documentation strings.
pub fn hover_contents(tooltip: &ToolTip) -> Vec<MarkedString> {
	let mut contents = Vec::new();
	for group in &tooltip.groups {
		for item in group {
			contents.push(MarkedString::from_language_code(
				"fsharp".to_string(),
				item.signature.clone(),
			));
			if let Some(doc) = &item.documentation {
				if !doc.is_empty() {
					contents.push(MarkedString::from_markdown(doc.clone()));
				}
			}
		}
	}
	contents
}
