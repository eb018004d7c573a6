//! Progress reporting for multi-file batches. A bar covering one file or
//! none is noise, so it is suppressed; a started bar is always ended, on
//! error paths included.

use std::path::Path;
use std::sync::Arc;

use crate::client::ClientHandle;

pub struct Progress {
	client: Arc<dyn ClientHandle>,
	active: bool,
}

impl Progress {
	/// Starts a bar over `n_files` files; batches of one or zero stay
	/// silent.
	pub async fn begin(client: Arc<dyn ClientHandle>, title: &str, n_files: usize) -> Self {
		let active = n_files > 1;
		if active {
			client
				.start_progress(title.to_string(), n_files as u32)
				.await;
		}
		Self { client, active }
	}

	pub async fn increment(&self, file: &Path) {
		if self.active {
			let name = file
				.file_name()
				.map(|n| n.to_string_lossy().into_owned())
				.unwrap_or_else(|| file.display().to_string());
			self.client.increment_progress(name).await;
		}
	}

	/// Ends the bar. Callers pair this with [`Progress::begin`] on every
	/// path, error paths included.
	pub async fn end(&self) {
		if self.active {
			self.client.end_progress().await;
		}
	}
}
