//! Symbols, declarations, tooltips and navigation items as the compiler
//! reports them. These are shared immutable handles: a [`SymbolUse`]
//! crosses task boundaries behind an `Arc` and is never mutated.

use std::path::PathBuf;
use std::sync::Arc;

use crate::types::SourceRange;

/// Declared accessibility of a symbol.
///
/// `Private` confines a symbol to its declaring file, `Internal` to its
/// declaring project. The compiler does not report implicit privates;
/// reference search accepts that and casts the wider net.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessibility {
	Public,
	Internal,
	Private,
}

impl Accessibility {
	pub fn is_private(self) -> bool {
		matches!(self, Accessibility::Private)
	}

	/// Private counts as internal too.
	pub fn is_internal(self) -> bool {
		matches!(self, Accessibility::Internal | Accessibility::Private)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolLocation {
	pub file: PathBuf,
	pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
	pub display_name: String,
	pub full_name: String,
	pub accessibility: Accessibility,
	/// Declaration site, when it is inside the workspace.
	pub declaration: Option<SymbolLocation>,
}

/// One occurrence of a symbol in a checked file.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolUse {
	pub symbol: Arc<Symbol>,
	pub file: PathBuf,
	pub range: SourceRange,
	pub is_definition: bool,
}

/// Completion-item kinds as the compiler classifies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
	Field,
	Property,
	Method { extension: bool },
	Argument,
	Event,
	Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
	pub name: String,
	pub full_name: String,
	pub kind: CompletionKind,
	/// Rendered documentation, served on resolve.
	pub description: String,
}

/// Result of a completion query; retained whole so follow-up resolve
/// requests can enrich single items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclarationList {
	pub items: Vec<Declaration>,
}

/// Qualifiers and partial identifier to the left of the cursor, the
/// compiler's quick-parse of `System.Cons|`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialLongName {
	pub qualifying_idents: Vec<String>,
	pub partial_ident: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
	pub name: String,
	/// Display text, e.g. `path: string`.
	pub display: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodOverload {
	pub parameters: Vec<Parameter>,
	pub description: ToolTip,
}

/// All overloads of the method at a call site.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodGroup {
	pub name: String,
	pub overloads: Vec<MethodOverload>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolTipItem {
	/// Signature text the editor renders highlighted.
	pub signature: String,
	pub documentation: Option<String>,
}

/// Tooltip text: groups of items, one group per overload set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolTip {
	pub groups: Vec<Vec<ToolTipItem>>,
}

impl ToolTip {
	pub fn single(signature: impl Into<String>, documentation: Option<String>) -> Self {
		Self {
			groups: vec![vec![ToolTipItem {
				signature: signature.into(),
				documentation,
			}]],
		}
	}

	/// The documentation to attach to a signature, only when the tooltip
	/// is unambiguous: exactly one group with exactly one item.
	pub fn sole_documentation(&self) -> Option<&str> {
		match self.groups.as_slice() {
			[group] => match group.as_slice() {
				[item] => item.documentation.as_deref(),
				_ => None,
			},
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
	Namespace,
	ModuleFile,
	Module,
	Type,
	Exception,
	Method,
	Property,
	Field,
	Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationItem {
	pub name: String,
	pub kind: NavigationKind,
	pub range: SourceRange,
}

/// A top-level declaration and the declarations nested under it.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationTopLevel {
	pub declaration: NavigationItem,
	pub nested: Vec<NavigationItem>,
}

/// Parse-derived outline of one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationTree {
	pub declarations: Vec<NavigationTopLevel>,
}
