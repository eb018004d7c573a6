//! The project graph: which project owns which source file, and the
//! dependency order between projects.
//!
//! Queries read a copy-on-write snapshot (an `arc-swap` load, no lock);
//! mutators serialize on an async lock, rebuild the derived maps, and
//! publish a fresh snapshot. Scripts are single-file projects whose
//! options come from the analyzer; the orchestrator resolves them lazily
//! and caches them here through [`ProjectGraph::put_script`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use ignore::WalkBuilder;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use fjord_analyzer::ProjectOptions;

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
	#[error("no project references {}", .0.display())]
	NotInWorkspace(PathBuf),
	#[error("failed to load {}: {reason}", .project_file.display())]
	Loader {
		project_file: PathBuf,
		reason: String,
	},
}

/// Cracks a project file into compiler options. MSBuild resolution and
/// NuGet asset parsing live behind this seam.
#[async_trait]
pub trait ProjectLoader: Send + Sync {
	async fn load(&self, project_file: &Path) -> Result<ProjectOptions, ProjectError>;
}

#[derive(Debug, Default, Clone)]
struct GraphSnapshot {
	/// Loaded projects by project-file path.
	projects: FxHashMap<PathBuf, Arc<ProjectOptions>>,
	/// Script options cached from the analyzer, by script path.
	scripts: FxHashMap<PathBuf, Arc<ProjectOptions>>,
	/// Source file to owning project file.
	owners: FxHashMap<PathBuf, PathBuf>,
}

impl GraphSnapshot {
	fn rebuild_owners(&mut self) {
		self.owners.clear();
		for (project_file, options) in &self.projects {
			for source in &options.source_files {
				self.owners.insert(source.clone(), project_file.clone());
			}
		}
		for script in self.scripts.keys() {
			self.owners.insert(script.clone(), script.clone());
		}
	}
}

pub struct ProjectGraph {
	loader: Arc<dyn ProjectLoader>,
	snapshot: ArcSwap<GraphSnapshot>,
	/// Serializes mutators; queries never take it.
	write: tokio::sync::Mutex<()>,
}

impl ProjectGraph {
	pub fn new(loader: Arc<dyn ProjectLoader>) -> Self {
		Self {
			loader,
			snapshot: ArcSwap::from_pointee(GraphSnapshot::default()),
			write: tokio::sync::Mutex::new(()),
		}
	}

	/// The project owning `file`, or the cached script options for a
	/// standalone script.
	pub fn find(&self, file: &Path) -> Result<Arc<ProjectOptions>, ProjectError> {
		let snapshot = self.snapshot.load();
		if let Some(owner) = snapshot.owners.get(file) {
			if let Some(options) = snapshot.projects.get(owner) {
				return Ok(options.clone());
			}
			if let Some(options) = snapshot.scripts.get(owner) {
				return Ok(options.clone());
			}
		}
		Err(ProjectError::NotInWorkspace(file.to_path_buf()))
	}

	/// All loaded projects and cached scripts.
	pub fn projects(&self) -> Vec<Arc<ProjectOptions>> {
		let snapshot = self.snapshot.load();
		snapshot
			.projects
			.values()
			.chain(snapshot.scripts.values())
			.cloned()
			.collect()
	}

	/// Transitive project dependencies of `options`, topologically
	/// ordered with dependencies before dependents. Excludes `options`
	/// itself.
	pub fn transitive_deps(&self, options: &ProjectOptions) -> Vec<Arc<ProjectOptions>> {
		let mut seen = FxHashSet::default();
		seen.insert(options.project_file.clone());
		let mut ordered = Vec::new();
		for reference in &options.references {
			visit(reference, &mut seen, &mut ordered);
		}
		ordered
	}

	/// The combined dependency-ordered source list of `from`'s project:
	/// every transitive dependency's sources, then the project's own.
	pub fn ordered_sources(&self, from: &ProjectOptions) -> Vec<PathBuf> {
		let mut files = Vec::new();
		for dep in self.transitive_deps(from) {
			files.extend(dep.source_files.iter().cloned());
		}
		files.extend(from.source_files.iter().cloned());
		files
	}

	/// Whether `decl_file` precedes `from_file` in the dependency-ordered
	/// source list (or is the same file), i.e. whether a declaration in
	/// `decl_file` can be seen from `from_file`.
	pub fn visible(&self, decl_file: &Path, from_file: &Path) -> bool {
		if decl_file == from_file {
			return true;
		}
		let Ok(project) = self.find(from_file) else {
			return false;
		};
		let files = self.ordered_sources(&project);
		let decl = files.iter().position(|f| f == decl_file);
		let from = files.iter().position(|f| f == from_file);
		match (decl, from) {
			(Some(decl), Some(from)) => decl < from,
			_ => false,
		}
	}

	/// Scans `dir` for project files and loads each one. Idempotent:
	/// loading the same tree twice converges to the same graph.
	pub async fn add_workspace_root(&self, dir: &Path) {
		let found = scan_for_projects(dir);
		info!(dir = ?dir, projects = found.len(), "workspace root scanned");
		for project_file in found {
			if let Err(e) = self.put_project_file(&project_file).await {
				warn!(error = %e, "project load failed");
			}
		}
	}

	/// (Re)loads one project and every loaded project that transitively
	/// references it.
	pub async fn put_project_file(&self, project_file: &Path) -> Result<(), ProjectError> {
		let guard = self.write.lock().await;
		let options = Arc::new(self.loader.load(project_file).await?);
		debug!(project = ?project_file, sources = options.source_files.len(), "project loaded");

		let mut next = (**self.snapshot.load()).clone();
		next.projects
			.insert(project_file.to_path_buf(), options);

		// Dependents hold stale references to the old options; re-crack them.
		let dependents: Vec<PathBuf> = next
			.projects
			.iter()
			.filter(|(file, options)| {
				file.as_path() != project_file
					&& references_transitively(options.as_ref(), project_file)
			})
			.map(|(file, _)| file.clone())
			.collect();
		for dependent in dependents {
			match self.loader.load(&dependent).await {
				Ok(options) => {
					next.projects.insert(dependent, Arc::new(options));
				}
				Err(e) => warn!(error = %e, "dependent reload failed"),
			}
		}

		next.rebuild_owners();
		self.snapshot.store(Arc::new(next));
		drop(guard);
		Ok(())
	}

	/// Removes a deleted project; files it uniquely contributed are no
	/// longer in the workspace.
	pub async fn delete_project_file(&self, project_file: &Path) {
		let guard = self.write.lock().await;
		let mut next = (**self.snapshot.load()).clone();
		next.projects.remove(project_file);
		next.rebuild_owners();
		self.snapshot.store(Arc::new(next));
		drop(guard);
	}

	/// Restored NuGet assets changed: re-crack the containing project.
	pub async fn update_assets_json(&self, assets_file: &Path) {
		let owner = {
			let snapshot = self.snapshot.load();
			snapshot
				.projects
				.keys()
				.find(|project_file| {
					project_file
						.parent()
						.is_some_and(|dir| assets_file.starts_with(dir))
				})
				.cloned()
		};
		match owner {
			Some(project_file) => {
				if let Err(e) = self.put_project_file(&project_file).await {
					warn!(error = %e, "assets reload failed");
				}
			}
			None => debug!(assets = ?assets_file, "assets change for unloaded project"),
		}
	}

	/// Caches analyzer-produced options for a standalone script.
	pub async fn put_script(&self, script: &Path, options: Arc<ProjectOptions>) {
		let guard = self.write.lock().await;
		let mut next = (**self.snapshot.load()).clone();
		next.scripts.insert(script.to_path_buf(), options);
		next.rebuild_owners();
		self.snapshot.store(Arc::new(next));
		drop(guard);
	}

	/// Drops cached script options, forcing re-resolution on next use.
	pub async fn remove_script(&self, script: &Path) {
		let guard = self.write.lock().await;
		let mut next = (**self.snapshot.load()).clone();
		next.scripts.remove(script);
		next.rebuild_owners();
		self.snapshot.store(Arc::new(next));
		drop(guard);
	}
}

fn visit(
	options: &Arc<ProjectOptions>,
	seen: &mut FxHashSet<PathBuf>,
	ordered: &mut Vec<Arc<ProjectOptions>>,
) {
	if !seen.insert(options.project_file.clone()) {
		return;
	}
	for reference in &options.references {
		visit(reference, seen, ordered);
	}
	ordered.push(options.clone());
}

fn references_transitively(options: &ProjectOptions, project_file: &Path) -> bool {
	options.references.iter().any(|reference| {
		reference.project_file == project_file
			|| references_transitively(reference, project_file)
	})
}

/// Project files under `dir`, skipping build output and package caches.
fn scan_for_projects(dir: &Path) -> Vec<PathBuf> {
	let mut found = Vec::new();
	let walker = WalkBuilder::new(dir)
		.filter_entry(|entry| {
			!matches!(
				entry.file_name().to_str(),
				Some("bin" | "obj" | "node_modules" | "paket-files" | ".git")
			)
		})
		.build();
	for entry in walker {
		let Ok(entry) = entry else { continue };
		if !entry.file_type().is_some_and(|t| t.is_file()) {
			continue;
		}
		let path = entry.path();
		if path
			.extension()
			.is_some_and(|ext| ext.eq_ignore_ascii_case("fsproj"))
		{
			found.push(path.to_path_buf());
		}
	}
	found.sort();
	found
}
