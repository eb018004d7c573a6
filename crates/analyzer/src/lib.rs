//! Contract between the language server core and the compiler front-end.
//!
//! The compiler itself (parsing, type checking, tooltip rendering) lives
//! behind the [`Analyzer`] trait; this crate owns the data model those
//! calls exchange and the [`AnalyzerGateway`] adapter the rest of the
//! server goes through. Compiler-owned state (check caches, background
//! workers) belongs to the trait implementation, never to the core.

pub mod frontend;
pub mod gateway;
pub mod options;
pub mod symbols;
pub mod types;

pub use frontend::{
	Analyzer, AnalyzerError, AnalyzerEvent, CheckOutcome, CheckResult, ParseResult, Result,
};
pub use gateway::AnalyzerGateway;
pub use options::{ParsingOptions, ProjectOptions};
pub use symbols::{
	Accessibility, CompletionKind, Declaration, DeclarationList, MethodGroup, MethodOverload,
	NavigationItem, NavigationKind, NavigationTopLevel, NavigationTree, Parameter, PartialLongName,
	Symbol, SymbolLocation, SymbolUse, ToolTip, ToolTipItem,
};
pub use types::{AnalyzerDiagnostic, DiagnosticSeverity, SourceRange};
