//! Compilation contexts. A [`ProjectOptions`] is the opaque record a
//! project loader (or the analyzer itself, for scripts) produces for one
//! project; the analyzer needs it for every check. Within one project the
//! source order defines intra-project visibility: earlier files are
//! visible to later files.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ProjectOptions {
	/// Project file path; for scripts, the script itself.
	pub project_file: PathBuf,
	/// Compilation order, which is also visibility order.
	pub source_files: Vec<PathBuf>,
	pub compiler_flags: Vec<String>,
	/// Directly referenced projects.
	pub references: Vec<Arc<ProjectOptions>>,
}

impl ProjectOptions {
	pub fn is_script(&self) -> bool {
		self.project_file
			.extension()
			.is_some_and(|ext| ext.eq_ignore_ascii_case("fsx"))
	}

	pub fn contains_source(&self, file: &Path) -> bool {
		self.source_files.iter().any(|f| f == file)
	}
}

// Identity is the project file; flags and file lists change on reload but
// still describe the same project.
impl PartialEq for ProjectOptions {
	fn eq(&self, other: &Self) -> bool {
		self.project_file == other.project_file
	}
}

impl Eq for ProjectOptions {}

impl Hash for ProjectOptions {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.project_file.hash(state);
	}
}

/// The subset of a project's options that parsing needs.
#[derive(Debug, Clone, Default)]
pub struct ParsingOptions {
	pub source_files: Vec<PathBuf>,
	pub compiler_flags: Vec<String>,
}
