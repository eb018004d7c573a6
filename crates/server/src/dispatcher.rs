//! Turns cursor positions and analysis results into LSP feature answers.
//!
//! Every feature fails soft: a missing document, an unresolved project or
//! a compiler hiccup comes back as `None` or an empty list, never as a
//! protocol error. Diagnostics are the channel for compile errors, not
//! feature responses.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use ropey::Rope;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::json;
use tower_lsp::lsp_types::{
	CompletionItem, CompletionList, CompletionResponse, Documentation, DocumentChanges,
	GotoDefinitionResponse, Hover, HoverContents, Location, OneOf,
	OptionalVersionedTextDocumentIdentifier, ParameterInformation, ParameterLabel, Position,
	SignatureHelp, SignatureInformation, SymbolInformation, TextDocumentEdit, TextEdit,
	WorkspaceEdit,
};
use tracing::debug;

use fjord_analyzer::{
	AnalyzerGateway, DeclarationList, NavigationItem, SourceRange, Symbol, SymbolUse,
};
use fjord_store::{DocumentStore, ProjectGraph};
use fjord_text::{
	byte_to_utf16, count_commas, find_end_of_identifier_under_cursor,
	find_method_call_before_cursor, find_names_under_cursor, identifiers, line_of,
	matches_title_case, utf16_len, utf16_to_byte,
};

use crate::client::ClientHandle;
use crate::conversions::{completion_kind, lsp_range, path_to_uri, symbol_kind};
use crate::orchestrator::CheckOrchestrator;
use crate::progress::Progress;

/// Workspace-symbol queries stop once this many matches accumulate.
const WORKSPACE_SYMBOL_LIMIT: usize = 50;

pub struct FeatureDispatcher {
	store: Arc<DocumentStore>,
	graph: Arc<ProjectGraph>,
	analyzer: AnalyzerGateway,
	orchestrator: Arc<CheckOrchestrator>,
	client: Arc<dyn ClientHandle>,
	/// Most recent completion result, kept whole so resolve requests can
	/// attach documentation. Single slot, last writer wins.
	last_completion: ArcSwapOption<DeclarationList>,
}

impl FeatureDispatcher {
	pub fn new(
		store: Arc<DocumentStore>,
		graph: Arc<ProjectGraph>,
		analyzer: AnalyzerGateway,
		orchestrator: Arc<CheckOrchestrator>,
		client: Arc<dyn ClientHandle>,
	) -> Self {
		Self {
			store,
			graph,
			analyzer,
			orchestrator,
			client,
			last_completion: ArcSwapOption::empty(),
		}
	}

	fn line_at(&self, file: &Path, line: u32) -> Option<String> {
		let rope = match self.store.text(file) {
			Some(rope) => rope,
			None => Rope::from_str(&self.store.text_or_read(file).ok()?),
		};
		Some(line_of(&rope, line))
	}

	pub async fn hover(&self, file: &Path, position: Position) -> Option<Hover> {
		let _pause = self.orchestrator.pause_debounce();
		let (_, check) = self.orchestrator.check(file).await.ok()?;
		let line = self.line_at(file, position.line)?;
		let names = find_names_under_cursor(&line, position.character);
		let tooltip = self.analyzer.tooltip(
			&check,
			position.line + 1,
			position.character + 1,
			&line,
			&names,
		)?;
		let contents = crate::conversions::hover_contents(&tooltip);
		if contents.is_empty() {
			return None;
		}
		Some(Hover {
			contents: HoverContents::Array(contents),
			range: None,
		})
	}

	pub async fn completion(&self, file: &Path, position: Position) -> Option<CompletionResponse> {
		let _pause = self.orchestrator.pause_debounce();
		// Responsiveness wins over freshness while the user is typing.
		let (parse, _) = self.orchestrator.quick(file).await.ok()?;
		let line = self.line_at(file, position.line)?;
		let partial = self.analyzer.partial_long_name(&line, position.character);
		let declarations =
			self.analyzer.declarations(&parse, position.line + 1, &line, &partial);
		debug!(file = ?file, items = declarations.items.len(), "completion");

		let items = declarations
			.items
			.iter()
			.map(|declaration| CompletionItem {
				label: declaration.name.clone(),
				kind: completion_kind(declaration.kind),
				detail: Some(declaration.full_name.clone()),
				data: Some(json!({ "FullName": declaration.full_name })),
				..CompletionItem::default()
			})
			.collect();
		self.last_completion.store(Some(Arc::new(declarations)));

		Some(CompletionResponse::List(CompletionList {
			is_incomplete: false,
			items,
		}))
	}

	/// Attaches documentation to a completion item by matching its full
	/// name against the retained last completion. Best effort: a newer
	/// completion may have replaced the list, in which case the item goes
	/// back unchanged.
	pub fn resolve_completion(&self, mut item: CompletionItem) -> CompletionItem {
		let full_name = item
			.data
			.as_ref()
			.and_then(|data| data.get("FullName"))
			.and_then(|name| name.as_str())
			.map(str::to_string);
		let (Some(full_name), Some(list)) = (full_name, self.last_completion.load_full()) else {
			return item;
		};
		if let Some(declaration) = list.items.iter().find(|d| d.full_name == full_name) {
			if !declaration.description.is_empty() {
				item.documentation = Some(Documentation::String(declaration.description.clone()));
			}
		}
		item
	}

	pub async fn signature_help(&self, file: &Path, position: Position) -> Option<SignatureHelp> {
		let _pause = self.orchestrator.pause_debounce();
		let (_, check) = self.orchestrator.quick(file).await.ok()?;
		let line = self.line_at(file, position.line)?;
		let end_of_name = find_method_call_before_cursor(&line, position.character)?;
		let names = find_names_under_cursor(&line, end_of_name.saturating_sub(1));
		let group = self
			.analyzer
			.methods(&check, position.line + 1, end_of_name, &line, &names)?;

		let signatures: Vec<SignatureInformation> = group
			.overloads
			.iter()
			.map(|overload| {
				let parameters: Vec<String> = overload
					.parameters
					.iter()
					.map(|parameter| parameter.display.clone())
					.collect();
				SignatureInformation {
					label: format!("{}({})", group.name, parameters.join(", ")),
					documentation: overload
						.description
						.sole_documentation()
						.map(|doc| Documentation::String(doc.to_string())),
					parameters: Some(
						parameters
							.into_iter()
							.map(|display| ParameterInformation {
								label: ParameterLabel::Simple(display),
								documentation: None,
							})
							.collect(),
					),
					active_parameter: None,
				}
			})
			.collect();

		let active_parameter = count_commas(&line, end_of_name, position.character);
		let active_signature = find_compatible_overload(
			active_parameter,
			&group
				.overloads
				.iter()
				.map(|overload| overload.parameters.len())
				.collect::<Vec<_>>(),
		);
		Some(SignatureHelp {
			signatures,
			active_signature,
			active_parameter: Some(active_parameter),
		})
	}

	pub async fn goto_definition(
		&self,
		file: &Path,
		position: Position,
	) -> Option<GotoDefinitionResponse> {
		let symbol_use = self.symbol_at(file, position).await?;
		let declaration = symbol_use.symbol.declaration.as_ref()?;
		let location = crate::conversions::lsp_location(declaration)?;
		Some(GotoDefinitionResponse::Scalar(location))
	}

	pub async fn references(&self, file: &Path, position: Position) -> Vec<Location> {
		let Some(symbol_use) = self.symbol_at(file, position).await else {
			return Vec::new();
		};
		self.find_all_symbol_uses(&symbol_use.symbol)
			.await
			.iter()
			.filter_map(|symbol_use| {
				Some(Location {
					uri: path_to_uri(&symbol_use.file)?,
					range: lsp_range(symbol_use.range),
				})
			})
			.collect()
	}

	#[allow(deprecated)]
	pub async fn document_symbols(&self, file: &Path) -> Vec<SymbolInformation> {
		let _pause = self.orchestrator.pause_debounce();
		let Some(parse) = self.parse_file(file).await else {
			return Vec::new();
		};
		let Some(uri) = path_to_uri(file) else {
			return Vec::new();
		};
		flatten_navigation(&parse.navigation)
			.into_iter()
			.map(|(item, container)| SymbolInformation {
				name: item.name.clone(),
				kind: symbol_kind(item.kind),
				tags: None,
				deprecated: None,
				location: Location {
					uri: uri.clone(),
					range: lsp_range(item.range),
				},
				container_name: container,
			})
			.collect()
	}

	/// Scans every source file of every open project, parsing only files
	/// whose raw tokens suggest a match, until the cap is reached.
	#[allow(deprecated)]
	pub async fn workspace_symbols(&self, query: &str) -> Vec<SymbolInformation> {
		let _pause = self.orchestrator.pause_debounce();
		let mut results = Vec::new();
		let mut seen = FxHashSet::default();

		'projects: for project in self.graph.projects() {
			for file in &project.source_files {
				if !seen.insert(file.clone()) {
					continue;
				}
				let Ok(content) = self.store.text_or_read(file) else {
					continue;
				};
				if !identifiers(&content).any(|token| matches_title_case(query, token)) {
					continue;
				}
				let parsing = self.analyzer.parsing_options(&project);
				let Ok(parse) = self.analyzer.parse(file, &content, &parsing).await else {
					continue;
				};
				let Some(uri) = path_to_uri(file) else {
					continue;
				};
				for (item, container) in flatten_navigation(&parse.navigation) {
					if !matches_title_case(query, &item.name) {
						continue;
					}
					results.push(SymbolInformation {
						name: item.name.clone(),
						kind: symbol_kind(item.kind),
						tags: None,
						deprecated: None,
						location: Location {
							uri: uri.clone(),
							range: lsp_range(item.range),
						},
						container_name: container,
					});
				}
				if results.len() >= WORKSPACE_SYMBOL_LIMIT {
					break 'projects;
				}
			}
		}
		results
	}

	pub async fn rename(
		&self,
		file: &Path,
		position: Position,
		new_name: &str,
	) -> Option<WorkspaceEdit> {
		let symbol_use = self.symbol_at(file, position).await?;
		let uses = self.find_all_symbol_uses(&symbol_use.symbol).await;
		if uses.is_empty() {
			return None;
		}

		let mut by_file: FxHashMap<PathBuf, Vec<SourceRange>> = FxHashMap::default();
		for symbol_use in &uses {
			by_file
				.entry(symbol_use.file.clone())
				.or_default()
				.push(symbol_use.range);
		}

		let mut document_edits = Vec::new();
		for (edit_file, ranges) in by_file {
			let uri = path_to_uri(&edit_file)?;
			let version = self.store.version(&edit_file).unwrap_or(0);
			let edits = ranges
				.into_iter()
				.map(|range| {
					let line = self
						.line_at(&edit_file, range.end_line.saturating_sub(1))
						.unwrap_or_default();
					let refined =
						refine_rename_range(&line, range, &symbol_use.symbol.display_name);
					OneOf::Left(TextEdit {
						range: lsp_range(refined),
						new_text: new_name.to_string(),
					})
				})
				.collect();
			document_edits.push(TextDocumentEdit {
				text_document: OptionalVersionedTextDocumentIdentifier {
					uri,
					version: Some(version),
				},
				edits,
			});
		}

		Some(WorkspaceEdit {
			changes: None,
			document_changes: Some(DocumentChanges::Edits(document_edits)),
			change_annotations: None,
		})
	}

	/// The symbol under the cursor, resolved against a version-fresh
	/// check.
	pub async fn symbol_at(&self, file: &Path, position: Position) -> Option<SymbolUse> {
		let _pause = self.orchestrator.pause_debounce();
		let (_, check) = self.orchestrator.check(file).await.ok()?;
		let line = self.line_at(file, position.line)?;
		let end_col = find_end_of_identifier_under_cursor(&line, position.character)?;
		let names = find_names_under_cursor(&line, end_col.saturating_sub(1));
		self.analyzer
			.symbol_at(&check, position.line + 1, end_col, &line, &names)
	}

	/// Every use of `symbol` across the files it can be visible in.
	///
	/// Accessibility narrows the candidate set: private symbols stay in
	/// their declaring file, internal ones in their declaring project,
	/// everything else anywhere downstream of the declaration. Candidate
	/// files are pre-filtered by a plain substring scan before paying for
	/// a check.
	pub async fn find_all_symbol_uses(&self, symbol: &Symbol) -> Vec<SymbolUse> {
		let declaration = symbol.declaration.as_ref();
		let decl_file = declaration.map(|location| location.file.clone());
		let decl_project = decl_file
			.as_deref()
			.and_then(|file| self.graph.find(file).ok());

		let mut survivors = Vec::new();
		let mut seen = FxHashSet::default();
		for project in self.graph.projects() {
			for file in &project.source_files {
				if !seen.insert(file.clone()) {
					continue;
				}
				let candidate = if symbol.accessibility.is_private() {
					decl_file.as_deref() == Some(file.as_path())
				} else if symbol.accessibility.is_internal() {
					match (&decl_project, &decl_file) {
						(Some(decl_project), Some(decl_file)) => {
							decl_project.project_file == project.project_file
								&& self.graph.visible(decl_file, file)
						}
						_ => false,
					}
				} else {
					match &decl_file {
						Some(decl_file) => self.graph.visible(decl_file, file),
						None => true,
					}
				};
				if !candidate {
					continue;
				}
				let Ok(content) = self.store.text_or_read(file) else {
					continue;
				};
				if content.contains(&symbol.display_name) {
					survivors.push(file.clone());
				}
			}
		}

		let progress =
			Progress::begin(self.client.clone(), "Find symbol references", survivors.len()).await;
		let mut uses = Vec::new();
		for file in &survivors {
			progress.increment(file).await;
			if let Ok((_, check)) = self.orchestrator.check(file).await {
				uses.extend(self.analyzer.uses_in_file(&check, symbol));
			}
		}
		progress.end().await;
		uses
	}

	async fn parse_file(&self, file: &Path) -> Option<fjord_analyzer::ParseResult> {
		let options = self.orchestrator.options_for(file).await.ok()?;
		let parsing = self.analyzer.parsing_options(&options);
		let text = self.store.text_or_read(file).ok()?;
		self.analyzer.parse(file, &text, &parsing).await.ok()
	}
}

/// First overload a call with `active_parameter` arguments so far could
/// still be: index of the first overload with room, or nothing.
fn find_compatible_overload(active_parameter: u32, parameter_counts: &[usize]) -> Option<u32> {
	parameter_counts
		.iter()
		.position(|&count| active_parameter == 0 || (active_parameter as usize) < count)
		.map(|index| index as u32)
}

/// Top-level declarations paired with `None`, nested ones with their
/// parent's name.
fn flatten_navigation(
	navigation: &fjord_analyzer::NavigationTree,
) -> Vec<(NavigationItem, Option<String>)> {
	let mut flat = Vec::new();
	for top in &navigation.declarations {
		flat.push((top.declaration.clone(), None));
		for nested in &top.nested {
			flat.push((nested.clone(), Some(top.declaration.name.clone())));
		}
	}
	flat
}

/// Narrows a compiler-reported range to the identifier being renamed.
///
/// Compiler ranges for a use can cover more than the name (`M.x` for a
/// qualified use, `let x` for a binding). Within the range's last line,
/// the last occurrence of the display name wins; when the name cannot be
/// found the original range is kept.
fn refine_rename_range(last_line: &str, range: SourceRange, name: &str) -> SourceRange {
	let window_start = if range.start_line == range.end_line {
		range.start_col
	} else {
		0
	};
	let line_len = utf16_len(last_line);
	let window_end = range.end_col.min(line_len);
	let (Some(start), Some(end)) = (
		utf16_to_byte(last_line, window_start.min(line_len)),
		utf16_to_byte(last_line, window_end),
	) else {
		return range;
	};
	match last_line[start..end].rfind(name) {
		Some(offset) => {
			let found = byte_to_utf16(last_line, start + offset);
			SourceRange {
				start_line: range.end_line,
				start_col: found,
				end_line: range.end_line,
				end_col: found + utf16_len(name),
			}
		}
		None => range,
	}
}
