//! Feature dispatch against the canned compiler: hover, completion and
//! resolve, signature help, navigation, references, rename.

use pretty_assertions::assert_eq;
use ropey::Rope;
use tower_lsp::lsp_types::{
	CompletionResponse, Documentation, DocumentChanges, GotoDefinitionResponse, HoverContents,
	MarkedString, OneOf, Position, SymbolKind, TextEdit,
};

use fjord_analyzer::{
	Accessibility, CompletionKind, Declaration, MethodGroup, MethodOverload, NavigationItem,
	NavigationKind, NavigationTopLevel, NavigationTree, Parameter, SourceRange, Symbol,
	SymbolLocation, SymbolUse, ToolTip,
};

use super::*;

fn x_symbol(file: &Path, accessibility: Accessibility) -> Arc<Symbol> {
	Arc::new(Symbol {
		display_name: "x".into(),
		full_name: "Test.x".into(),
		accessibility,
		declaration: Some(SymbolLocation {
			file: file.to_path_buf(),
			range: SourceRange::new(1, 4, 1, 5),
		}),
	})
}

fn symbol_use(symbol: &Arc<Symbol>, file: &Path, range: SourceRange, def: bool) -> SymbolUse {
	SymbolUse {
		symbol: symbol.clone(),
		file: file.to_path_buf(),
		range,
		is_definition: def,
	}
}

fn apply_edits(text: &str, edits: &[TextEdit]) -> String {
	let mut rope = Rope::from_str(text);
	let mut sorted = edits.to_vec();
	sorted.sort_by_key(|e| (e.range.start.line, e.range.start.character));
	for edit in sorted.iter().rev() {
		let start = fjord_text::lsp_position_to_char(&rope, edit.range.start).unwrap();
		let end = fjord_text::lsp_position_to_char(&rope, edit.range.end).unwrap();
		rope.remove(start..end);
		rope.insert(start, &edit.new_text);
	}
	rope.to_string()
}

#[tokio::test(start_paused = true)]
async fn hover_shows_the_symbol_signature() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/a.fs"])]).await;
	let a = Path::new("/ws/a.fs");
	f.store.open(a, "let x = 1\n", 1);
	f.analyzer
		.set_tooltip("x", ToolTip::single("val x : int", None));

	let hover = f.dispatcher.hover(a, Position::new(0, 4)).await.unwrap();
	let HoverContents::Array(contents) = hover.contents else {
		panic!("expected array contents");
	};
	assert_eq!(
		contents[0],
		MarkedString::from_language_code("fsharp".into(), "val x : int".into())
	);
}

#[tokio::test(start_paused = true)]
async fn hover_without_tooltip_is_none() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/a.fs"])]).await;
	let a = Path::new("/ws/a.fs");
	f.store.open(a, "let x = 1\n", 1);

	assert!(f.dispatcher.hover(a, Position::new(0, 4)).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn completion_scopes_by_qualifier_and_resolve_adds_docs() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/a.fs"])]).await;
	let a = Path::new("/ws/a.fs");
	f.store.open(a, "do System.Cons\n", 1);
	f.analyzer.set_declarations(vec![
		Declaration {
			name: "Console".into(),
			full_name: "System.Console".into(),
			kind: CompletionKind::Property,
			description: "Represents the standard streams.".into(),
		},
		Declaration {
			name: "Convert".into(),
			full_name: "System.Convert".into(),
			kind: CompletionKind::Property,
			description: String::new(),
		},
		Declaration {
			name: "Constants".into(),
			full_name: "Microsoft.Constants".into(),
			kind: CompletionKind::Other,
			description: String::new(),
		},
	]);

	let Some(CompletionResponse::List(list)) =
		f.dispatcher.completion(a, Position::new(0, 14)).await
	else {
		panic!("expected completion list");
	};
	assert!(!list.is_incomplete);
	assert_eq!(list.items.len(), 1);
	let item = &list.items[0];
	assert_eq!(item.label, "Console");
	assert_eq!(item.detail.as_deref(), Some("System.Console"));

	let resolved = f.dispatcher.resolve_completion(item.clone());
	assert_eq!(
		resolved.documentation,
		Some(Documentation::String(
			"Represents the standard streams.".into()
		))
	);
}

#[tokio::test(start_paused = true)]
async fn completion_after_a_dot_stays_inside_the_qualifier() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/a.fs"])]).await;
	let a = Path::new("/ws/a.fs");
	f.store.open(a, "do System.\n", 1);
	f.analyzer.set_declarations(vec![
		Declaration {
			name: "Console".into(),
			full_name: "System.Console".into(),
			kind: CompletionKind::Property,
			description: String::new(),
		},
		Declaration {
			name: "Convert".into(),
			full_name: "System.Convert".into(),
			kind: CompletionKind::Property,
			description: String::new(),
		},
		Declaration {
			name: "List".into(),
			full_name: "Microsoft.FSharp.Collections.List".into(),
			kind: CompletionKind::Other,
			description: String::new(),
		},
	]);

	let Some(CompletionResponse::List(list)) =
		f.dispatcher.completion(a, Position::new(0, 10)).await
	else {
		panic!("expected completion list");
	};
	assert_eq!(list.items.len(), 2);
	assert!(
		list.items
			.iter()
			.all(|i| i.detail.as_deref().unwrap().starts_with("System."))
	);
}

#[tokio::test(start_paused = true)]
async fn resolve_without_matching_entry_returns_item_unchanged() {
	let f = fixture(Vec::new()).await;
	let item = tower_lsp::lsp_types::CompletionItem {
		label: "orphan".into(),
		..Default::default()
	};
	let resolved = f.dispatcher.resolve_completion(item.clone());
	assert_eq!(resolved, item);
}

#[tokio::test(start_paused = true)]
async fn signature_help_picks_the_compatible_overload() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/a.fs"])]).await;
	let a = Path::new("/ws/a.fs");
	f.store.open(a, "f(x, \n", 1);
	f.analyzer.set_method(
		"f",
		MethodGroup {
			name: "f".into(),
			overloads: vec![
				MethodOverload {
					parameters: vec![
						Parameter {
							name: "x".into(),
							display: "x: int".into(),
						},
						Parameter {
							name: "y".into(),
							display: "y: int".into(),
						},
					],
					description: ToolTip::single("f: int -> int -> int", Some("Adds.".into())),
				},
				MethodOverload {
					parameters: vec![Parameter {
						name: "x".into(),
						display: "x: int".into(),
					}],
					description: ToolTip::default(),
				},
			],
		},
	);

	let help = f
		.dispatcher
		.signature_help(a, Position::new(0, 5))
		.await
		.unwrap();
	assert_eq!(help.signatures.len(), 2);
	assert_eq!(help.signatures[0].label, "f(x: int, y: int)");
	assert_eq!(
		help.signatures[0].documentation,
		Some(Documentation::String("Adds.".into()))
	);
	assert_eq!(help.active_parameter, Some(1));
	assert_eq!(help.active_signature, Some(0));
}

#[tokio::test(start_paused = true)]
async fn signature_help_suppressed_on_declarations() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/a.fs"])]).await;
	let a = Path::new("/ws/a.fs");
	f.store.open(a, "let g(x\n", 1);

	assert!(
		f.dispatcher
			.signature_help(a, Position::new(0, 7))
			.await
			.is_none()
	);
}

#[tokio::test(start_paused = true)]
async fn goto_definition_returns_the_declaration_site() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/a.fs"])]).await;
	let a = Path::new("/ws/a.fs");
	f.store.open(a, "let x = 1\nlet y = x + 1\n", 1);
	let symbol = x_symbol(a, Accessibility::Public);
	f.analyzer.set_uses(vec![
		symbol_use(&symbol, a, SourceRange::new(1, 4, 1, 5), true),
		symbol_use(&symbol, a, SourceRange::new(2, 8, 2, 9), false),
	]);

	let Some(GotoDefinitionResponse::Scalar(location)) = f
		.dispatcher
		.goto_definition(a, Position::new(1, 8))
		.await
	else {
		panic!("expected a definition");
	};
	assert_eq!(location.uri.path(), "/ws/a.fs");
	assert_eq!(location.range.start, Position::new(0, 4));
	assert_eq!(location.range.end, Position::new(0, 5));
}

#[tokio::test(start_paused = true)]
async fn references_cover_every_use_in_visible_files() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/a.fs", "/ws/b.fs"])]).await;
	let a = Path::new("/ws/a.fs");
	let b = Path::new("/ws/b.fs");
	f.store.open(a, "let x = 1\nlet y = x + 1\n", 1);
	f.store.open(b, "module B\n", 1);
	let symbol = x_symbol(a, Accessibility::Public);
	f.analyzer.set_uses(vec![
		symbol_use(&symbol, a, SourceRange::new(1, 4, 1, 5), true),
		symbol_use(&symbol, a, SourceRange::new(2, 8, 2, 9), false),
	]);

	let locations = f.dispatcher.references(a, Position::new(0, 4)).await;
	assert_eq!(locations.len(), 2);
	assert!(locations.iter().all(|l| l.uri.path() == "/ws/a.fs"));
}

#[tokio::test(start_paused = true)]
async fn private_symbols_stay_in_their_declaring_file() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/s.fs", "/ws/c.fs"])]).await;
	let s = Path::new("/ws/s.fs");
	let c = Path::new("/ws/c.fs");
	f.store.open(s, "let private secret = 1\nlet a = secret\n", 1);
	// The name occurs here too, but a private symbol is confined to its
	// declaring file.
	f.store.open(c, "let b = secret\n", 1);
	let symbol = Arc::new(Symbol {
		display_name: "secret".into(),
		full_name: "S.secret".into(),
		accessibility: Accessibility::Private,
		declaration: Some(SymbolLocation {
			file: s.to_path_buf(),
			range: SourceRange::new(1, 12, 1, 18),
		}),
	});
	f.analyzer.set_uses(vec![
		symbol_use(&symbol, s, SourceRange::new(1, 12, 1, 18), true),
		symbol_use(&symbol, c, SourceRange::new(1, 8, 1, 14), false),
	]);

	let uses = f.dispatcher.find_all_symbol_uses(&symbol).await;
	assert_eq!(uses.len(), 1);
	assert_eq!(uses[0].file, s);
}

#[tokio::test(start_paused = true)]
async fn internal_symbols_stay_in_their_declaring_project() {
	let f = fixture(vec![
		project("/ws/shared/Shared.fsproj", &["/ws/shared/s.fs"]),
		project("/ws/app/App.fsproj", &["/ws/app/o.fs"]),
	])
	.await;
	let s = Path::new("/ws/shared/s.fs");
	let o = Path::new("/ws/app/o.fs");
	f.store.open(s, "let internal helper = 1\n", 1);
	f.store.open(o, "let u = helper\n", 1);
	let symbol = Arc::new(Symbol {
		display_name: "helper".into(),
		full_name: "S.helper".into(),
		accessibility: Accessibility::Internal,
		declaration: Some(SymbolLocation {
			file: s.to_path_buf(),
			range: SourceRange::new(1, 13, 1, 19),
		}),
	});
	f.analyzer.set_uses(vec![
		symbol_use(&symbol, s, SourceRange::new(1, 13, 1, 19), true),
		symbol_use(&symbol, o, SourceRange::new(1, 8, 1, 14), false),
	]);

	let uses = f.dispatcher.find_all_symbol_uses(&symbol).await;
	assert_eq!(uses.len(), 1);
	assert_eq!(uses[0].file, s);
}

#[tokio::test(start_paused = true)]
async fn rename_edits_every_occurrence() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/a.fs"])]).await;
	let a = Path::new("/ws/a.fs");
	let original = "let x = 1\nlet y = x + 1\n";
	f.store.open(a, original, 1);
	let symbol = x_symbol(a, Accessibility::Public);
	f.analyzer.set_uses(vec![
		symbol_use(&symbol, a, SourceRange::new(1, 4, 1, 5), true),
		symbol_use(&symbol, a, SourceRange::new(2, 8, 2, 9), false),
	]);

	let edit = f
		.dispatcher
		.rename(a, Position::new(0, 4), "z")
		.await
		.unwrap();
	let Some(DocumentChanges::Edits(document_edits)) = edit.document_changes else {
		panic!("expected document edits");
	};
	assert_eq!(document_edits.len(), 1);
	assert_eq!(document_edits[0].text_document.version, Some(1));

	let text_edits: Vec<TextEdit> = document_edits[0]
		.edits
		.iter()
		.map(|e| match e {
			OneOf::Left(edit) => edit.clone(),
			OneOf::Right(_) => panic!("unexpected annotated edit"),
		})
		.collect();
	assert_eq!(text_edits.len(), 2);
	assert_eq!(
		apply_edits(original, &text_edits),
		"let z = 1\nlet y = z + 1\n"
	);
}

#[tokio::test(start_paused = true)]
async fn rename_refines_ranges_that_cover_qualified_names() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/a.fs"])]).await;
	let a = Path::new("/ws/a.fs");
	let original = "let x = 1\nlet y = M.x + 1\n";
	f.store.open(a, original, 1);
	let symbol = x_symbol(a, Accessibility::Public);
	f.analyzer.set_uses(vec![
		symbol_use(&symbol, a, SourceRange::new(1, 4, 1, 5), true),
		// The compiler reports the whole qualified use.
		symbol_use(&symbol, a, SourceRange::new(2, 8, 2, 11), false),
	]);

	let edit = f
		.dispatcher
		.rename(a, Position::new(0, 4), "z")
		.await
		.unwrap();
	let Some(DocumentChanges::Edits(document_edits)) = edit.document_changes else {
		panic!("expected document edits");
	};
	let text_edits: Vec<TextEdit> = document_edits[0]
		.edits
		.iter()
		.map(|e| match e {
			OneOf::Left(edit) => edit.clone(),
			OneOf::Right(_) => panic!("unexpected annotated edit"),
		})
		.collect();
	assert_eq!(
		apply_edits(original, &text_edits),
		"let z = 1\nlet y = M.z + 1\n"
	);
}

#[tokio::test(start_paused = true)]
async fn document_symbols_flatten_the_navigation_tree() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/a.fs"])]).await;
	let a = Path::new("/ws/a.fs");
	f.store.open(a, "module A\nlet x = 1\n", 1);
	f.analyzer.set_navigation(
		a,
		NavigationTree {
			declarations: vec![NavigationTopLevel {
				declaration: NavigationItem {
					name: "A".into(),
					kind: NavigationKind::Module,
					range: SourceRange::new(1, 0, 2, 9),
				},
				nested: vec![NavigationItem {
					name: "x".into(),
					kind: NavigationKind::Other,
					range: SourceRange::new(2, 4, 2, 5),
				}],
			}],
		},
	);

	let symbols = f.dispatcher.document_symbols(a).await;
	assert_eq!(symbols.len(), 2);
	assert_eq!(symbols[0].name, "A");
	assert_eq!(symbols[0].kind, SymbolKind::MODULE);
	assert_eq!(symbols[0].container_name, None);
	assert_eq!(symbols[1].name, "x");
	assert_eq!(symbols[1].kind, SymbolKind::VARIABLE);
	assert_eq!(symbols[1].container_name.as_deref(), Some("A"));
}

#[tokio::test(start_paused = true)]
async fn document_symbols_reappear_in_workspace_queries() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/a.fs"])]).await;
	let a = Path::new("/ws/a.fs");
	f.store.open(a, "module Alpha\nlet x = 1\n", 1);
	f.analyzer.set_navigation(
		a,
		NavigationTree {
			declarations: vec![NavigationTopLevel {
				declaration: NavigationItem {
					name: "Alpha".into(),
					kind: NavigationKind::Module,
					range: SourceRange::new(1, 7, 1, 12),
				},
				nested: Vec::new(),
			}],
		},
	);

	let document = f.dispatcher.document_symbols(a).await;
	assert!(!document.is_empty());
	for symbol in &document {
		for prefix_len in 1..=symbol.name.len() {
			let workspace = f.dispatcher.workspace_symbols(&symbol.name[..prefix_len]).await;
			assert!(
				workspace.iter().any(|w| w.name == symbol.name),
				"missing {} for prefix {}",
				symbol.name,
				&symbol.name[..prefix_len]
			);
		}
	}
}

#[tokio::test(start_paused = true)]
async fn workspace_symbols_match_title_case_initials() {
	let f = fixture(vec![project("/ws/App.fsproj", &["/ws/m.fs", "/ws/n.fs"])]).await;
	let m = Path::new("/ws/m.fs");
	let n = Path::new("/ws/n.fs");
	f.store.open(m, "module FooBar\nlet fbHelper = 1\n", 1);
	f.store.open(n, "module Unrelated\n", 1);
	f.analyzer.set_navigation(
		m,
		NavigationTree {
			declarations: vec![
				NavigationTopLevel {
					declaration: NavigationItem {
						name: "FooBar".into(),
						kind: NavigationKind::Module,
						range: SourceRange::new(1, 7, 1, 13),
					},
					nested: vec![NavigationItem {
						name: "fbHelper".into(),
						kind: NavigationKind::Other,
						range: SourceRange::new(2, 4, 2, 12),
					}],
				},
			],
		},
	);

	let symbols = f.dispatcher.workspace_symbols("FB").await;
	assert_eq!(symbols.len(), 1);
	assert_eq!(symbols[0].name, "FooBar");
	assert_eq!(symbols[0].location.uri.path(), "/ws/m.fs");
}
