//! The LSP loop: routes editor requests and notifications to the
//! dispatcher and orchestrator.
//!
//! Document mutations are applied to the store inside the notification
//! handler so same-document writes keep protocol order; the checking they
//! trigger runs on spawned tasks. Features the server does not implement
//! (formatting, code actions, code lenses, highlights, semantic tokens,
//! will-save) are left to the framework's default handlers, which answer
//! with a method-not-found error.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tower_lsp::jsonrpc::Result as RpcResult;
use tower_lsp::lsp_types::{
	CompletionItem, CompletionOptions, CompletionParams, CompletionResponse,
	DidChangeConfigurationParams, DidChangeTextDocumentParams, DidChangeWatchedFilesParams,
	DidChangeWorkspaceFoldersParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
	DidSaveTextDocumentParams, DocumentSymbolParams, DocumentSymbolResponse, GotoDefinitionParams,
	GotoDefinitionResponse, Hover, HoverParams, HoverProviderCapability, InitializeParams,
	InitializeResult, InitializedParams, Location, OneOf, ReferenceParams, RenameParams,
	SaveOptions, ServerCapabilities, ServerInfo, SignatureHelp, SignatureHelpOptions,
	SignatureHelpParams, SymbolInformation, TextDocumentSyncCapability, TextDocumentSyncKind,
	TextDocumentSyncOptions, TextDocumentSyncSaveOptions, WorkspaceEdit, WorkspaceSymbolParams,
};
use tower_lsp::{LanguageServer, LspService, Server};
use tracing::{debug, info, warn};

use fjord_analyzer::{Analyzer, AnalyzerGateway};
use fjord_store::{DocumentStore, ProjectGraph, ProjectLoader};

use crate::client::ClientHandle;
use crate::conversions::uri_to_path;
use crate::dispatcher::FeatureDispatcher;
use crate::orchestrator::CheckOrchestrator;

pub struct Backend {
	store: Arc<DocumentStore>,
	graph: Arc<ProjectGraph>,
	orchestrator: Arc<CheckOrchestrator>,
	dispatcher: Arc<FeatureDispatcher>,
	/// Workspace roots captured at initialize, scanned once initialized.
	roots: Mutex<Vec<PathBuf>>,
}

impl Backend {
	pub fn new(
		client: Arc<dyn ClientHandle>,
		analyzer: Arc<dyn Analyzer>,
		loader: Arc<dyn ProjectLoader>,
	) -> Self {
		let store = Arc::new(DocumentStore::new());
		let graph = Arc::new(ProjectGraph::new(loader));
		let gateway = AnalyzerGateway::new(analyzer);
		let orchestrator = CheckOrchestrator::new(
			store.clone(),
			graph.clone(),
			gateway.clone(),
			client.clone(),
		);
		let dispatcher = Arc::new(FeatureDispatcher::new(
			store.clone(),
			graph.clone(),
			gateway,
			orchestrator.clone(),
			client,
		));
		Self {
			store,
			graph,
			orchestrator,
			dispatcher,
			roots: Mutex::new(Vec::new()),
		}
	}
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
	async fn initialize(&self, params: InitializeParams) -> RpcResult<InitializeResult> {
		let mut roots = Vec::new();
		if let Some(folders) = &params.workspace_folders {
			roots.extend(folders.iter().filter_map(|f| uri_to_path(&f.uri)));
		}
		#[allow(deprecated)]
		if let Some(root) = params.root_uri.as_ref().and_then(uri_to_path) {
			if !roots.contains(&root) {
				roots.push(root);
			}
		}
		*self.roots.lock() = roots;

		Ok(InitializeResult {
			capabilities: ServerCapabilities {
				text_document_sync: Some(TextDocumentSyncCapability::Options(
					TextDocumentSyncOptions {
						open_close: Some(true),
						change: Some(TextDocumentSyncKind::INCREMENTAL),
						save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
							include_text: Some(false),
						})),
						..TextDocumentSyncOptions::default()
					},
				)),
				hover_provider: Some(HoverProviderCapability::Simple(true)),
				completion_provider: Some(CompletionOptions {
					resolve_provider: Some(true),
					trigger_characters: Some(vec![".".to_string()]),
					..CompletionOptions::default()
				}),
				signature_help_provider: Some(SignatureHelpOptions {
					trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
					retrigger_characters: None,
					work_done_progress_options: Default::default(),
				}),
				definition_provider: Some(OneOf::Left(true)),
				references_provider: Some(OneOf::Left(true)),
				document_symbol_provider: Some(OneOf::Left(true)),
				workspace_symbol_provider: Some(OneOf::Left(true)),
				rename_provider: Some(OneOf::Left(true)),
				..ServerCapabilities::default()
			},
			server_info: Some(ServerInfo {
				name: env!("CARGO_PKG_NAME").to_string(),
				version: Some(env!("CARGO_PKG_VERSION").to_string()),
			}),
		})
	}

	async fn initialized(&self, _params: InitializedParams) {
		let roots = std::mem::take(&mut *self.roots.lock());
		let graph = self.graph.clone();
		tokio::spawn(async move {
			for root in roots {
				graph.add_workspace_root(&root).await;
			}
		});
		info!("server initialized");
	}

	async fn shutdown(&self) -> RpcResult<()> {
		Ok(())
	}

	async fn did_open(&self, params: DidOpenTextDocumentParams) {
		let Some(path) = uri_to_path(&params.text_document.uri) else {
			return;
		};
		self.store.open(
			&path,
			&params.text_document.text,
			params.text_document.version,
		);
		let orchestrator = self.orchestrator.clone();
		tokio::spawn(async move {
			orchestrator.on_open(&path).await;
		});
	}

	async fn did_change(&self, params: DidChangeTextDocumentParams) {
		let Some(path) = uri_to_path(&params.text_document.uri) else {
			return;
		};
		if let Err(e) = self.store.change(
			&path,
			params.text_document.version,
			&params.content_changes,
		) {
			warn!(error = %e, "change dropped");
			return;
		}
		self.orchestrator.invalidate(&path);
	}

	async fn did_save(&self, params: DidSaveTextDocumentParams) {
		let Some(path) = uri_to_path(&params.text_document.uri) else {
			return;
		};
		let orchestrator = self.orchestrator.clone();
		tokio::spawn(async move {
			orchestrator.on_save(&path).await;
		});
	}

	async fn did_close(&self, params: DidCloseTextDocumentParams) {
		let Some(path) = uri_to_path(&params.text_document.uri) else {
			return;
		};
		self.store.close(&path);
		self.orchestrator.forget(&path);
		self.orchestrator.publish_empty(&path).await;
	}

	async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
		for event in params.changes {
			let Some(path) = uri_to_path(&event.uri) else {
				continue;
			};
			self.orchestrator
				.workspace_file_changed(event.typ, &path)
				.await;
		}
	}

	async fn did_change_configuration(&self, _params: DidChangeConfigurationParams) {
		debug!("configuration change ignored");
	}

	async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
		let added: Vec<PathBuf> = params
			.event
			.added
			.iter()
			.filter_map(|f| uri_to_path(&f.uri))
			.collect();
		let graph = self.graph.clone();
		tokio::spawn(async move {
			for root in added {
				graph.add_workspace_root(&root).await;
			}
		});
	}

	async fn hover(&self, params: HoverParams) -> RpcResult<Option<Hover>> {
		let position = params.text_document_position_params;
		let Some(path) = uri_to_path(&position.text_document.uri) else {
			return Ok(None);
		};
		Ok(self.dispatcher.hover(&path, position.position).await)
	}

	async fn completion(&self, params: CompletionParams) -> RpcResult<Option<CompletionResponse>> {
		let position = params.text_document_position;
		let Some(path) = uri_to_path(&position.text_document.uri) else {
			return Ok(None);
		};
		Ok(self.dispatcher.completion(&path, position.position).await)
	}

	async fn completion_resolve(&self, item: CompletionItem) -> RpcResult<CompletionItem> {
		Ok(self.dispatcher.resolve_completion(item))
	}

	async fn signature_help(&self, params: SignatureHelpParams) -> RpcResult<Option<SignatureHelp>> {
		let position = params.text_document_position_params;
		let Some(path) = uri_to_path(&position.text_document.uri) else {
			return Ok(None);
		};
		Ok(self.dispatcher.signature_help(&path, position.position).await)
	}

	async fn goto_definition(
		&self,
		params: GotoDefinitionParams,
	) -> RpcResult<Option<GotoDefinitionResponse>> {
		let position = params.text_document_position_params;
		let Some(path) = uri_to_path(&position.text_document.uri) else {
			return Ok(None);
		};
		Ok(self.dispatcher.goto_definition(&path, position.position).await)
	}

	async fn references(&self, params: ReferenceParams) -> RpcResult<Option<Vec<Location>>> {
		let position = params.text_document_position;
		let Some(path) = uri_to_path(&position.text_document.uri) else {
			return Ok(None);
		};
		Ok(Some(
			self.dispatcher.references(&path, position.position).await,
		))
	}

	async fn document_symbol(
		&self,
		params: DocumentSymbolParams,
	) -> RpcResult<Option<DocumentSymbolResponse>> {
		let Some(path) = uri_to_path(&params.text_document.uri) else {
			return Ok(None);
		};
		Ok(Some(DocumentSymbolResponse::Flat(
			self.dispatcher.document_symbols(&path).await,
		)))
	}

	async fn symbol(
		&self,
		params: WorkspaceSymbolParams,
	) -> RpcResult<Option<Vec<SymbolInformation>>> {
		Ok(Some(self.dispatcher.workspace_symbols(&params.query).await))
	}

	async fn rename(&self, params: RenameParams) -> RpcResult<Option<WorkspaceEdit>> {
		let position = params.text_document_position;
		let Some(path) = uri_to_path(&position.text_document.uri) else {
			return Ok(None);
		};
		Ok(self
			.dispatcher
			.rename(&path, position.position, &params.new_name)
			.await)
	}
}

/// Runs the server over stdio until the client disconnects. The embedding
/// binary supplies the compiler front-end and project loader, and owns
/// process exit codes: zero after a clean return, non-zero when this
/// returns an error.
pub async fn serve_stdio(
	analyzer: Arc<dyn Analyzer>,
	loader: Arc<dyn ProjectLoader>,
) -> anyhow::Result<()> {
	let stdin = tokio::io::stdin();
	let stdout = tokio::io::stdout();
	let (service, socket) =
		LspService::new(move |client| Backend::new(Arc::new(client), analyzer, loader));
	Server::new(stdin, stdout, socket).serve(service).await;
	Ok(())
}
