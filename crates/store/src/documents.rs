//! Versioned text buffers for open documents.
//!
//! Writes for one path arrive strictly in protocol order (open, changes,
//! close) and are applied under the store lock; readers take rope
//! snapshots, which are cheap clones sharing the underlying chunks, so a
//! snapshot stays consistent while later edits land. Addressing is UTF-16
//! (line, character) per LSP. A closed document's buffer is dropped, but
//! the file can still be read from disk on demand.

use std::io;
use std::path::{Path, PathBuf};

use lsp_types::TextDocumentContentChangeEvent;
use parking_lot::RwLock;
use ropey::Rope;
use rustc_hash::FxHashMap;

use fjord_text::lsp_position_to_char;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("unknown document: {}", .0.display())]
	UnknownDocument(PathBuf),
}

#[derive(Debug)]
struct Document {
	rope: Rope,
	version: i32,
}

/// All open documents, keyed by absolute file path.
#[derive(Debug, Default)]
pub struct DocumentStore {
	docs: RwLock<FxHashMap<PathBuf, Document>>,
}

impl DocumentStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn open(&self, path: impl Into<PathBuf>, text: &str, version: i32) {
		self.docs.write().insert(
			path.into(),
			Document {
				rope: Rope::from_str(text),
				version,
			},
		);
	}

	/// Applies incremental changes in order and records the new version.
	pub fn change(
		&self,
		path: &Path,
		version: i32,
		changes: &[TextDocumentContentChangeEvent],
	) -> Result<(), StoreError> {
		let mut docs = self.docs.write();
		let doc = docs
			.get_mut(path)
			.ok_or_else(|| StoreError::UnknownDocument(path.to_path_buf()))?;
		for change in changes {
			apply_change(&mut doc.rope, change);
		}
		doc.version = version;
		Ok(())
	}

	/// Drops the buffer. Returns whether the document was open.
	pub fn close(&self, path: &Path) -> bool {
		self.docs.write().remove(path).is_some()
	}

	/// Snapshot of the current text.
	pub fn text(&self, path: &Path) -> Option<Rope> {
		self.docs.read().get(path).map(|d| d.rope.clone())
	}

	pub fn version(&self, path: &Path) -> Option<i32> {
		self.docs.read().get(path).map(|d| d.version)
	}

	pub fn is_open(&self, path: &Path) -> bool {
		self.docs.read().contains_key(path)
	}

	pub fn open_files(&self) -> Vec<PathBuf> {
		self.docs.read().keys().cloned().collect()
	}

	/// Snapshot of text and version together.
	pub fn text_and_version(&self, path: &Path) -> Option<(Rope, i32)> {
		self.docs
			.read()
			.get(path)
			.map(|d| (d.rope.clone(), d.version))
	}

	/// The open buffer's text, or the file's content from disk.
	pub fn text_or_read(&self, path: &Path) -> io::Result<String> {
		if let Some(rope) = self.text(path) {
			return Ok(rope.to_string());
		}
		std::fs::read_to_string(path)
	}
}

fn apply_change(rope: &mut Rope, change: &TextDocumentContentChangeEvent) {
	match change.range {
		None => *rope = Rope::from_str(&change.text),
		Some(range) => {
			let len = rope.len_chars();
			let start = lsp_position_to_char(rope, range.start).unwrap_or(len);
			let end = lsp_position_to_char(rope, range.end).unwrap_or(len);
			let (start, end) = (start.min(end), end.max(start).min(len));
			rope.remove(start..end);
			if !change.text.is_empty() {
				rope.insert(start, &change.text);
			}
		}
	}
}
