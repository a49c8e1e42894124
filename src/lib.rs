//! Knowledge Harvest - screen recordings for a shared knowledge library.
//!
//! Records the screen through a capture source, finalizes the capture into a
//! WebM artifact, and uploads it with metadata to the recordings service.

pub mod capture;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod recorder;
pub mod upload;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "knowledge_harvest=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
