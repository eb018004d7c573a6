//! In-memory state the server owns outright: open document buffers and the
//! project graph. Both are internally synchronized; readers get cheap
//! snapshots and never block writers for long.

pub mod documents;
pub mod projects;

pub use documents::{DocumentStore, StoreError};
pub use projects::{ProjectError, ProjectGraph, ProjectLoader};
