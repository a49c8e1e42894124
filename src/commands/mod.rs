//! Command handlers
//!
//! One handler per CLI subcommand. Each works on the `Workspace` owned by
//! `main` and reports through `AppError`.

pub mod library;
pub mod recording;

pub use library::ListFilter;
pub use recording::MetadataArgs;
