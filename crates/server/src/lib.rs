//! Language server core for F#: request routing, document/project state,
//! check orchestration and feature dispatch. The compiler front-end and
//! the project-file loader are supplied by the embedding binary through
//! the traits in `fjord-analyzer` and `fjord-store`.

pub mod client;
pub mod conversions;
pub mod dispatcher;
pub mod orchestrator;
pub mod progress;
pub mod server;

#[cfg(test)]
mod tests;

pub use client::ClientHandle;
pub use dispatcher::FeatureDispatcher;
pub use orchestrator::{CheckOrchestrator, DEBOUNCE_DELAY};
pub use server::{Backend, serve_stdio};
