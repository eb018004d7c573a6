//! Decides when the compiler runs.
//!
//! Foreground requests go through one of three tiers: [`force`] always
//! re-checks at the current version, [`check`] reuses the compiler's cache
//! only when the cached version matches, and [`quick`] takes any cached
//! result it can get. Edits don't check immediately; they invalidate the
//! file and arm a single one-second debounce timer, so a typing burst
//! costs one background re-check per file. Foreground work cancels the
//! pending wait and re-arms it afterwards; an in-flight compiler call is
//! never aborted, only the wait is.
//!
//! [`force`]: CheckOrchestrator::force
//! [`check`]: CheckOrchestrator::check
//! [`quick`]: CheckOrchestrator::quick

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{FileChangeType, MessageType};
use tracing::{debug, warn};

use fjord_analyzer::{
	AnalyzerDiagnostic, AnalyzerEvent, AnalyzerGateway, CheckOutcome, CheckResult, ParseResult,
	ProjectOptions,
};
use fjord_store::{DocumentStore, ProjectGraph};

use crate::client::ClientHandle;
use crate::conversions::{lsp_diagnostic, path_to_uri};
use crate::progress::Progress;

/// Quiescence window between the last invalidation and the background
/// re-check.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(1000);

/// Either both analysis results, or the diagnostics explaining why there
/// are none. An empty error list means "nothing to say".
pub type CheckAnswer = Result<(ParseResult, CheckResult), Vec<AnalyzerDiagnostic>>;

pub struct CheckOrchestrator {
	store: Arc<DocumentStore>,
	graph: Arc<ProjectGraph>,
	analyzer: AnalyzerGateway,
	client: Arc<dyn ClientHandle>,
	/// Files invalidated by edits, each with the epoch of its latest
	/// invalidation so a re-edit during a background check keeps the file
	/// queued.
	pending: Mutex<FxHashMap<PathBuf, u64>>,
	epoch: AtomicU64,
	/// Token of the currently armed debounce wait.
	debounce: Mutex<Option<CancellationToken>>,
	/// Files with a background check running right now.
	in_flight: Mutex<FxHashSet<PathBuf>>,
	/// Last-modified time each file had when the compiler last checked it;
	/// only consulted to size the on-open progress bar.
	checked_on_disk: Mutex<FxHashMap<PathBuf, SystemTime>>,
	/// Progress bar of the on-open batch in flight, incremented from
	/// compiler background-check events.
	batch: Mutex<Option<Arc<Progress>>>,
}

impl CheckOrchestrator {
	pub fn new(
		store: Arc<DocumentStore>,
		graph: Arc<ProjectGraph>,
		analyzer: AnalyzerGateway,
		client: Arc<dyn ClientHandle>,
	) -> Arc<Self> {
		let orchestrator = Arc::new(Self {
			store,
			graph,
			analyzer,
			client,
			pending: Mutex::new(FxHashMap::default()),
			epoch: AtomicU64::new(0),
			debounce: Mutex::new(None),
			in_flight: Mutex::new(FxHashSet::default()),
			checked_on_disk: Mutex::new(FxHashMap::default()),
			batch: Mutex::new(None),
		});
		orchestrator.spawn_event_loop();
		orchestrator
	}

	/// Routes compiler events: background-check announcements record the
	/// file's mtime and drive the active batch progress bar; the memory
	/// ceiling becomes a client warning.
	fn spawn_event_loop(self: &Arc<Self>) {
		let orchestrator = self.clone();
		let mut events = self.analyzer.subscribe();
		tokio::spawn(async move {
			loop {
				match events.recv().await {
					Ok(AnalyzerEvent::BeforeBackgroundCheck(file)) => {
						if let Some(mtime) = modified_time(&file) {
							orchestrator.checked_on_disk.lock().insert(file.clone(), mtime);
						}
						let batch = orchestrator.batch.lock().clone();
						if let Some(progress) = batch {
							progress.increment(&file).await;
						}
					}
					Ok(AnalyzerEvent::MaxMemory) => {
						orchestrator
							.client
							.show_message(
								MessageType::WARNING,
								"The compiler reached its memory limit and dropped cached \
								 results; expect slower answers until caches rebuild."
									.to_string(),
							)
							.await;
					}
					Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
						warn!(missed, "analyzer events lagged");
					}
					Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
				}
			}
		});
	}

	// ---- check tiers ----

	/// Re-check unconditionally at the file's current version.
	pub async fn force(&self, file: &Path) -> CheckAnswer {
		let Some((text, version)) = self.current_text(file) else {
			return Err(Vec::new());
		};
		let options = match self.options_for(file).await {
			Ok(options) => options,
			Err(diagnostics) => {
				self.publish(file, &diagnostics).await;
				return Err(diagnostics);
			}
		};
		match self.analyzer.check(file, version, &text, &options).await {
			Ok((parse, CheckOutcome::Checked(check))) => {
				let mut combined = parse.diagnostics.clone();
				combined.extend(check.diagnostics.iter().cloned());
				self.publish(file, &combined).await;
				Ok((parse, check))
			}
			Ok((parse, CheckOutcome::Aborted)) => {
				debug!(file = ?file, "check aborted, keeping parse diagnostics");
				self.publish(file, &parse.diagnostics).await;
				Err(parse.diagnostics)
			}
			Err(e) => {
				warn!(file = ?file, error = %e, "check failed");
				Err(Vec::new())
			}
		}
	}

	/// Reuse the compiler's cache only when it matches the current
	/// version; otherwise [`force`](Self::force).
	pub async fn check(&self, file: &Path) -> CheckAnswer {
		let version = self.store.version(file).unwrap_or(0);
		if let Ok(options) = self.graph.find(file) {
			if let Some((parse, check, checked_version)) = self.analyzer.try_cached(file, &options)
			{
				if checked_version == version {
					return Ok((parse, check));
				}
			}
		}
		self.force(file).await
	}

	/// Any cached check will do, stale included; responsiveness beats
	/// freshness here.
	pub async fn quick(&self, file: &Path) -> CheckAnswer {
		if let Ok(options) = self.graph.find(file) {
			if let Some((parse, check, _)) = self.analyzer.try_cached(file, &options) {
				return Ok((parse, check));
			}
		}
		if self.current_text(file).is_none() {
			return Err(vec![AnalyzerDiagnostic::error_at_top(
				file,
				format!("No source file {}", file.display()),
			)]);
		}
		self.force(file).await
	}

	/// Compilation context for `file`: the owning project, or for a
	/// standalone script the analyzer-derived options, cached in the
	/// graph after first resolution.
	pub(crate) async fn options_for(
		&self,
		file: &Path,
	) -> Result<Arc<ProjectOptions>, Vec<AnalyzerDiagnostic>> {
		match self.graph.find(file) {
			Ok(options) => Ok(options),
			Err(_) if is_script(file) => {
				let Some((text, _)) = self.current_text(file) else {
					return Err(Vec::new());
				};
				let mtime = modified_time(file).unwrap_or(SystemTime::UNIX_EPOCH);
				match self.analyzer.script_options(file, &text, mtime).await {
					Ok((options, diagnostics)) => {
						if !diagnostics.is_empty() {
							debug!(
								file = ?file,
								count = diagnostics.len(),
								"script options resolved with diagnostics"
							);
						}
						self.graph.put_script(file, options.clone()).await;
						Ok(options)
					}
					Err(e) => {
						warn!(file = ?file, error = %e, "script options failed");
						Err(vec![AnalyzerDiagnostic::error_at_top(
							file,
							format!("Failed to create options for script: {e}"),
						)])
					}
				}
			}
			Err(e) => Err(vec![AnalyzerDiagnostic::error_at_top(file, e.to_string())]),
		}
	}

	fn current_text(&self, file: &Path) -> Option<(String, i32)> {
		if let Some((rope, version)) = self.store.text_and_version(file) {
			return Some((rope.to_string(), version));
		}
		std::fs::read_to_string(file).ok().map(|text| (text, 0))
	}

	// ---- diagnostics ----

	/// Publishes for open files only; a file closed since its check
	/// started gets nothing (close already cleared it).
	async fn publish(&self, file: &Path, diagnostics: &[AnalyzerDiagnostic]) {
		if !self.store.is_open(file) {
			return;
		}
		let Some(uri) = path_to_uri(file) else { return };
		let version = self.store.version(file);
		let diagnostics = diagnostics.iter().map(lsp_diagnostic).collect();
		self.client.publish_diagnostics(uri, diagnostics, version).await;
	}

	/// One empty publication, sent when a document closes.
	pub async fn publish_empty(&self, file: &Path) {
		let Some(uri) = path_to_uri(file) else { return };
		self.client.publish_diagnostics(uri, Vec::new(), None).await;
	}

	// ---- debounced background checking ----

	/// Marks `file` as needing a background re-check and restarts the
	/// quiescence wait.
	pub fn invalidate(self: &Arc<Self>, file: &Path) {
		let stamp = self.epoch.fetch_add(1, Ordering::Relaxed);
		self.pending.lock().insert(file.to_path_buf(), stamp);
		self.arm_debounce();
	}

	/// Drops a closed file from the background queue, keyed by path the
	/// same way it was inserted.
	pub fn forget(&self, file: &Path) {
		self.pending.lock().remove(file);
	}

	/// Cancels the pending wait (never an in-flight compiler call) and
	/// re-arms it on drop if anything is still queued. Every foreground
	/// operation holds one of these.
	pub fn pause_debounce(self: &Arc<Self>) -> DebouncePause {
		self.cancel_debounce();
		DebouncePause {
			orchestrator: self.clone(),
		}
	}

	fn cancel_debounce(&self) {
		if let Some(token) = self.debounce.lock().take() {
			token.cancel();
		}
	}

	fn rearm_if_pending(self: &Arc<Self>) {
		if !self.pending.lock().is_empty() {
			self.arm_debounce();
		}
	}

	fn arm_debounce(self: &Arc<Self>) {
		let token = CancellationToken::new();
		if let Some(previous) = self.debounce.lock().replace(token.clone()) {
			previous.cancel();
		}
		let orchestrator = self.clone();
		tokio::spawn(async move {
			tokio::select! {
				_ = token.cancelled() => {}
				_ = tokio::time::sleep(DEBOUNCE_DELAY) => {
					orchestrator.drain_pending().await;
				}
			}
		});
	}

	async fn drain_pending(self: Arc<Self>) {
		let snapshot: Vec<(PathBuf, u64)> = self
			.pending
			.lock()
			.iter()
			.map(|(file, stamp)| (file.clone(), *stamp))
			.collect();
		if snapshot.is_empty() {
			return;
		}
		debug!(files = snapshot.len(), "background re-check");
		for (file, stamp) in snapshot {
			if !self.store.is_open(&file) {
				self.pending.lock().remove(&file);
				continue;
			}
			// Never two overlapping background checks of the same file;
			// a later debounce picks it up again.
			if !self.in_flight.lock().insert(file.clone()) {
				continue;
			}
			let _ = self.check(&file).await;
			self.in_flight.lock().remove(&file);
			let mut pending = self.pending.lock();
			// A re-edit during the check bumped the stamp; keep it queued.
			if pending.get(&file) == Some(&stamp) {
				pending.remove(&file);
			}
		}
		self.rearm_if_pending();
	}

	// ---- lifecycle-driven batches ----

	/// Foreground check of a freshly opened file, with a progress bar
	/// sized to the dependency-ordered files the compiler will have to
	/// revisit on the way: files never checked in this process, files
	/// whose mtime moved since their last check, and everything ordered
	/// after one of those, up to and including the opened file.
	pub async fn on_open(self: &Arc<Self>, file: &Path) {
		let _pause = self.pause_debounce();
		let batch = match self.options_for(file).await {
			Ok(options) => self.files_needing_recheck(&options, file),
			Err(_) => Vec::new(),
		};
		debug!(file = ?file, batch = batch.len(), "open");
		let progress = Arc::new(
			Progress::begin(self.client.clone(), "Check project files", batch.len()).await,
		);
		*self.batch.lock() = Some(progress.clone());
		let _ = self.force(file).await;
		// Let background-check events already reported by the compiler
		// reach the bar before it closes.
		tokio::task::yield_now().await;
		self.batch.lock().take();
		progress.end().await;
	}

	fn files_needing_recheck(&self, options: &ProjectOptions, opened: &Path) -> Vec<PathBuf> {
		let ordered = self.graph.ordered_sources(options);
		let checked = self.checked_on_disk.lock();
		let mut batch = Vec::new();
		let mut stale = false;
		for file in ordered {
			let needs = match checked.get(&file) {
				None => true,
				Some(at_last_check) => {
					modified_time(&file).is_some_and(|mtime| mtime > *at_last_check)
				}
			};
			stale = stale || needs;
			if stale {
				batch.push(file.clone());
			}
			if file == opened {
				break;
			}
		}
		batch
	}

	/// A save of `file` re-checks every open file that can see it, its
	/// own buffer included.
	pub async fn on_save(self: &Arc<Self>, file: &Path) {
		let _pause = self.pause_debounce();
		let affected: Vec<PathBuf> = self
			.store
			.open_files()
			.into_iter()
			.filter(|open| self.graph.visible(file, open))
			.collect();
		debug!(file = ?file, affected = affected.len(), "save");
		let progress =
			Progress::begin(self.client.clone(), "Check affected files", affected.len()).await;
		for target in &affected {
			progress.increment(target).await;
			let _ = self.force(target).await;
		}
		progress.end().await;
	}

	/// Watched-file churn: project files reload, deleted ones drop out,
	/// script options and NuGet assets re-resolve. Every open file is
	/// then invalidated, which also arms the debounce.
	pub async fn workspace_file_changed(self: &Arc<Self>, change: FileChangeType, path: &Path) {
		let extension = path
			.extension()
			.and_then(|e| e.to_str())
			.map(str::to_ascii_lowercase);
		let file_name = path.file_name().and_then(|n| n.to_str());

		if change == FileChangeType::DELETED {
			match extension.as_deref() {
				Some("fsproj") => self.graph.delete_project_file(path).await,
				Some("fsx") => self.graph.remove_script(path).await,
				_ => {}
			}
		} else {
			match extension.as_deref() {
				Some("fsproj") => {
					if let Err(e) = self.graph.put_project_file(path).await {
						warn!(error = %e, "project reload failed");
					}
				}
				// Options are re-derived from the analyzer on next use.
				Some("fsx") => self.graph.remove_script(path).await,
				_ if file_name == Some("project.assets.json") => {
					self.graph.update_assets_json(path).await;
				}
				_ => {}
			}
		}

		for open in self.store.open_files() {
			self.invalidate(&open);
		}
	}
}

/// Re-arms the debounce when a foreground operation finishes.
pub struct DebouncePause {
	orchestrator: Arc<CheckOrchestrator>,
}

impl Drop for DebouncePause {
	fn drop(&mut self) {
		self.orchestrator.rearm_if_pending();
	}
}

fn is_script(file: &Path) -> bool {
	file.extension()
		.is_some_and(|ext| ext.eq_ignore_ascii_case("fsx"))
}

fn modified_time(file: &Path) -> Option<SystemTime> {
	std::fs::metadata(file).and_then(|m| m.modified()).ok()
}
