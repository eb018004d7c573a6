//! Outbound messages to the editor, behind a trait so the orchestrator and
//! dispatcher can be exercised against a recording stub. The progress
//! notifications are the custom `fsharp/*` family rather than LSP
//! work-done progress; clients pair every start with exactly one end.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::{Diagnostic, MessageType, Url};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartProgressParams {
	pub title: String,
	pub n_files: u32,
}

pub enum StartProgress {}

impl Notification for StartProgress {
	type Params = StartProgressParams;
	const METHOD: &'static str = "fsharp/startProgress";
}

pub enum IncrementProgress {}

impl Notification for IncrementProgress {
	type Params = String;
	const METHOD: &'static str = "fsharp/incrementProgress";
}

pub enum EndProgress {}

impl Notification for EndProgress {
	// Serializes as `null` on the wire.
	type Params = ();
	const METHOD: &'static str = "fsharp/endProgress";
}

/// Everything the core sends to the editor on its own initiative.
#[async_trait]
pub trait ClientHandle: Send + Sync {
	async fn publish_diagnostics(
		&self,
		uri: Url,
		diagnostics: Vec<Diagnostic>,
		version: Option<i32>,
	);
	async fn show_message(&self, typ: MessageType, message: String);
	async fn start_progress(&self, title: String, n_files: u32);
	async fn increment_progress(&self, file_name: String);
	async fn end_progress(&self);
}

#[async_trait]
impl ClientHandle for tower_lsp::Client {
	async fn publish_diagnostics(
		&self,
		uri: Url,
		diagnostics: Vec<Diagnostic>,
		version: Option<i32>,
	) {
		tower_lsp::Client::publish_diagnostics(self, uri, diagnostics, version).await;
	}

	async fn show_message(&self, typ: MessageType, message: String) {
		tower_lsp::Client::show_message(self, typ, message).await;
	}

	async fn start_progress(&self, title: String, n_files: u32) {
		self.send_notification::<StartProgress>(StartProgressParams { title, n_files })
			.await;
	}

	async fn increment_progress(&self, file_name: String) {
		self.send_notification::<IncrementProgress>(file_name).await;
	}

	async fn end_progress(&self) {
		self.send_notification::<EndProgress>(()).await;
	}
}
