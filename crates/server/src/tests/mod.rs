use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::broadcast;
use tower_lsp::lsp_types::{Diagnostic, MessageType, Url};

use fjord_analyzer::{
	Analyzer, AnalyzerDiagnostic, AnalyzerError, AnalyzerEvent, AnalyzerGateway, CheckOutcome,
	CheckResult, Declaration, DeclarationList, MethodGroup, NavigationTree, ParseResult,
	ParsingOptions, PartialLongName, ProjectOptions, Result as AnalyzerResult, Symbol, SymbolUse,
	ToolTip,
};
use fjord_store::{DocumentStore, ProjectError, ProjectGraph, ProjectLoader};

use crate::client::ClientHandle;
use crate::dispatcher::FeatureDispatcher;
use crate::orchestrator::CheckOrchestrator;

mod features;

/// Canned compiler front-end. Tests prime it with per-file diagnostics,
/// symbols, tooltips and navigation; it logs every check so scheduling
/// properties can be asserted.
pub struct StubAnalyzer {
	pub events: broadcast::Sender<AnalyzerEvent>,
	state: std::sync::Mutex<StubState>,
}

#[derive(Default)]
struct StubState {
	parse_diagnostics: FxHashMap<PathBuf, Vec<AnalyzerDiagnostic>>,
	check_diagnostics: FxHashMap<PathBuf, Vec<AnalyzerDiagnostic>>,
	navigation: FxHashMap<PathBuf, NavigationTree>,
	declarations: Vec<Declaration>,
	methods: FxHashMap<String, MethodGroup>,
	tooltips: FxHashMap<String, ToolTip>,
	uses: Vec<SymbolUse>,
	scripts: FxHashMap<PathBuf, Arc<ProjectOptions>>,
	/// Files the compiler "re-checks in the background" while checking
	/// the key file; each fires a BeforeBackgroundCheck event.
	background_files: FxHashMap<PathBuf, Vec<PathBuf>>,
	abort: FxHashSet<PathBuf>,
	cache: FxHashMap<PathBuf, (ParseResult, CheckResult, i32)>,
	check_log: Vec<(PathBuf, i32)>,
}

impl StubAnalyzer {
	pub fn new() -> Self {
		let (events, _) = broadcast::channel(64);
		Self {
			events,
			state: std::sync::Mutex::new(StubState::default()),
		}
	}

	fn with<T>(&self, f: impl FnOnce(&mut StubState) -> T) -> T {
		f(&mut self.state.lock().unwrap())
	}

	pub fn set_check_diagnostics(&self, file: &Path, diagnostics: Vec<AnalyzerDiagnostic>) {
		self.with(|s| s.check_diagnostics.insert(file.to_path_buf(), diagnostics));
	}

	pub fn set_parse_diagnostics(&self, file: &Path, diagnostics: Vec<AnalyzerDiagnostic>) {
		self.with(|s| s.parse_diagnostics.insert(file.to_path_buf(), diagnostics));
	}

	pub fn set_navigation(&self, file: &Path, navigation: NavigationTree) {
		self.with(|s| s.navigation.insert(file.to_path_buf(), navigation));
	}

	pub fn set_declarations(&self, declarations: Vec<Declaration>) {
		self.with(|s| s.declarations = declarations);
	}

	pub fn set_method(&self, dotted_name: &str, group: MethodGroup) {
		self.with(|s| s.methods.insert(dotted_name.to_string(), group));
	}

	pub fn set_tooltip(&self, dotted_name: &str, tooltip: ToolTip) {
		self.with(|s| s.tooltips.insert(dotted_name.to_string(), tooltip));
	}

	pub fn set_uses(&self, uses: Vec<SymbolUse>) {
		self.with(|s| s.uses = uses);
	}

	pub fn set_script(&self, file: &Path, options: ProjectOptions) {
		self.with(|s| s.scripts.insert(file.to_path_buf(), Arc::new(options)));
	}

	pub fn set_background_files(&self, file: &Path, background: Vec<PathBuf>) {
		self.with(|s| s.background_files.insert(file.to_path_buf(), background));
	}

	pub fn set_abort(&self, file: &Path) {
		self.with(|s| s.abort.insert(file.to_path_buf()));
	}

	pub fn checks_of(&self, file: &Path) -> usize {
		self.with(|s| s.check_log.iter().filter(|(f, _)| f == file).count())
	}

	pub fn checked_versions(&self, file: &Path) -> Vec<i32> {
		self.with(|s| {
			s.check_log
				.iter()
				.filter(|(f, _)| f == file)
				.map(|(_, v)| *v)
				.collect()
		})
	}

	fn parse_result(&self, file: &Path) -> ParseResult {
		self.with(|s| ParseResult {
			file: file.to_path_buf(),
			diagnostics: s.parse_diagnostics.get(file).cloned().unwrap_or_default(),
			navigation: s.navigation.get(file).cloned().unwrap_or_default(),
		})
	}
}

#[async_trait]
impl Analyzer for StubAnalyzer {
	async fn parse(
		&self,
		file: &Path,
		_text: &str,
		_options: &ParsingOptions,
	) -> AnalyzerResult<ParseResult> {
		Ok(self.parse_result(file))
	}

	async fn check(
		&self,
		file: &Path,
		version: i32,
		_text: &str,
		_options: &ProjectOptions,
	) -> AnalyzerResult<(ParseResult, CheckOutcome)> {
		let background = self.with(|s| {
			s.check_log.push((file.to_path_buf(), version));
			s.background_files.get(file).cloned().unwrap_or_default()
		});
		for dependency in background {
			let _ = self
				.events
				.send(AnalyzerEvent::BeforeBackgroundCheck(dependency));
		}
		let parse = self.parse_result(file);
		if self.with(|s| s.abort.contains(file)) {
			return Ok((parse, CheckOutcome::Aborted));
		}
		let check = self.with(|s| CheckResult {
			file: file.to_path_buf(),
			version,
			diagnostics: s.check_diagnostics.get(file).cloned().unwrap_or_default(),
		});
		self.with(|s| {
			s.cache
				.insert(file.to_path_buf(), (parse.clone(), check.clone(), version))
		});
		Ok((parse, CheckOutcome::Checked(check)))
	}

	fn try_cached(
		&self,
		file: &Path,
		_options: &ProjectOptions,
	) -> Option<(ParseResult, CheckResult, i32)> {
		self.with(|s| s.cache.get(file).cloned())
	}

	async fn script_options(
		&self,
		file: &Path,
		_text: &str,
		_mtime: SystemTime,
	) -> AnalyzerResult<(Arc<ProjectOptions>, Vec<AnalyzerDiagnostic>)> {
		self.with(|s| s.scripts.get(file).cloned())
			.map(|options| (options, Vec::new()))
			.ok_or_else(|| AnalyzerError::Exception("no script options".into()))
	}

	fn parsing_options(&self, options: &ProjectOptions) -> ParsingOptions {
		ParsingOptions {
			source_files: options.source_files.clone(),
			compiler_flags: options.compiler_flags.clone(),
		}
	}

	fn uses_in_file(&self, check: &CheckResult, symbol: &Symbol) -> AnalyzerResult<Vec<SymbolUse>> {
		Ok(self.with(|s| {
			s.uses
				.iter()
				.filter(|u| u.file == check.file && u.symbol.full_name == symbol.full_name)
				.cloned()
				.collect()
		}))
	}

	fn symbol_at(
		&self,
		check: &CheckResult,
		line: u32,
		_end_col: u32,
		_line_text: &str,
		names: &[String],
	) -> Option<SymbolUse> {
		let wanted = names.last()?.clone();
		self.with(|s| {
			s.uses
				.iter()
				.find(|u| {
					u.file == check.file
						&& u.range.start_line <= line
						&& line <= u.range.end_line
						&& u.symbol.display_name == wanted
				})
				.cloned()
		})
	}

	fn declarations(
		&self,
		_parse: &ParseResult,
		_line: u32,
		_line_text: &str,
		partial: &PartialLongName,
	) -> DeclarationList {
		let qualifier = partial.qualifying_idents.join(".");
		let items = self.with(|s| {
			s.declarations
				.iter()
				.filter(|d| {
					let qualified = qualifier.is_empty()
						|| d.full_name.starts_with(&format!("{qualifier}."));
					qualified && d.name.starts_with(&partial.partial_ident)
				})
				.cloned()
				.collect()
		});
		DeclarationList { items }
	}

	fn methods(
		&self,
		_check: &CheckResult,
		_line: u32,
		_end_col: u32,
		_line_text: &str,
		names: &[String],
	) -> Option<MethodGroup> {
		self.with(|s| s.methods.get(&names.join(".")).cloned())
	}

	fn tooltip(
		&self,
		_check: &CheckResult,
		_line: u32,
		_col: u32,
		_line_text: &str,
		names: &[String],
	) -> Option<ToolTip> {
		self.with(|s| s.tooltips.get(&names.join(".")).cloned())
	}

	fn subscribe(&self) -> broadcast::Receiver<AnalyzerEvent> {
		self.events.subscribe()
	}
}

/// Outbound traffic recorded in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
	Diagnostics {
		uri: Url,
		diagnostics: Vec<Diagnostic>,
		version: Option<i32>,
	},
	Message(MessageType, String),
	StartProgress { title: String, n_files: u32 },
	IncrementProgress(String),
	EndProgress,
}

#[derive(Default)]
pub struct RecordingClient {
	sent: std::sync::Mutex<Vec<Outbound>>,
}

impl RecordingClient {
	pub fn outbound(&self) -> Vec<Outbound> {
		self.sent.lock().unwrap().clone()
	}

	pub fn clear(&self) {
		self.sent.lock().unwrap().clear();
	}

	/// Diagnostic publications for `path`, oldest first.
	pub fn diagnostics_for(&self, path: &Path) -> Vec<Vec<Diagnostic>> {
		let uri = Url::from_file_path(path).unwrap();
		self.outbound()
			.into_iter()
			.filter_map(|o| match o {
				Outbound::Diagnostics {
					uri: u,
					diagnostics,
					..
				} if u == uri => Some(diagnostics),
				_ => None,
			})
			.collect()
	}

	pub fn progress(&self) -> Vec<Outbound> {
		self.outbound()
			.into_iter()
			.filter(|o| {
				matches!(
					o,
					Outbound::StartProgress { .. }
						| Outbound::IncrementProgress(_)
						| Outbound::EndProgress
				)
			})
			.collect()
	}

	fn push(&self, outbound: Outbound) {
		self.sent.lock().unwrap().push(outbound);
	}
}

#[async_trait]
impl ClientHandle for RecordingClient {
	async fn publish_diagnostics(
		&self,
		uri: Url,
		diagnostics: Vec<Diagnostic>,
		version: Option<i32>,
	) {
		self.push(Outbound::Diagnostics {
			uri,
			diagnostics,
			version,
		});
	}

	async fn show_message(&self, typ: MessageType, message: String) {
		self.push(Outbound::Message(typ, message));
	}

	async fn start_progress(&self, title: String, n_files: u32) {
		self.push(Outbound::StartProgress { title, n_files });
	}

	async fn increment_progress(&self, file_name: String) {
		self.push(Outbound::IncrementProgress(file_name));
	}

	async fn end_progress(&self) {
		self.push(Outbound::EndProgress);
	}
}

pub struct StubLoader {
	projects: FxHashMap<PathBuf, ProjectOptions>,
}

#[async_trait]
impl ProjectLoader for StubLoader {
	async fn load(&self, project_file: &Path) -> Result<ProjectOptions, ProjectError> {
		self.projects
			.get(project_file)
			.cloned()
			.ok_or_else(|| ProjectError::Loader {
				project_file: project_file.to_path_buf(),
				reason: "unknown project".into(),
			})
	}
}

pub struct Fixture {
	pub store: Arc<DocumentStore>,
	pub graph: Arc<ProjectGraph>,
	pub analyzer: Arc<StubAnalyzer>,
	pub client: Arc<RecordingClient>,
	pub orchestrator: Arc<CheckOrchestrator>,
	pub dispatcher: FeatureDispatcher,
}

/// Builds the whole stack over stubs and loads `projects` into the graph.
pub async fn fixture(projects: Vec<ProjectOptions>) -> Fixture {
	let loader = StubLoader {
		projects: projects
			.iter()
			.map(|p| (p.project_file.clone(), p.clone()))
			.collect(),
	};
	let store = Arc::new(DocumentStore::new());
	let graph = Arc::new(ProjectGraph::new(Arc::new(loader)));
	for project in &projects {
		graph.put_project_file(&project.project_file).await.unwrap();
	}
	let analyzer = Arc::new(StubAnalyzer::new());
	let client = Arc::new(RecordingClient::default());
	let gateway = AnalyzerGateway::new(analyzer.clone());
	let orchestrator = CheckOrchestrator::new(
		store.clone(),
		graph.clone(),
		gateway.clone(),
		client.clone(),
	);
	let dispatcher = FeatureDispatcher::new(
		store.clone(),
		graph.clone(),
		gateway,
		orchestrator.clone(),
		client.clone(),
	);
	Fixture {
		store,
		graph,
		analyzer,
		client,
		orchestrator,
		dispatcher,
	}
}

pub fn project(file: &str, sources: &[&str]) -> ProjectOptions {
	ProjectOptions {
		project_file: file.into(),
		source_files: sources.iter().map(PathBuf::from).collect(),
		compiler_flags: Vec::new(),
		references: Vec::new(),
	}
}

pub fn error_diag(file: &Path, message: &str) -> AnalyzerDiagnostic {
	AnalyzerDiagnostic::error_at_top(file, message)
}

/// Lets spawned tasks (the analyzer event loop, cancelled timers) run to
/// their next await point.
pub async fn settle() {
	for _ in 0..32 {
		tokio::task::yield_now().await;
	}
}
