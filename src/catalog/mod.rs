//! Recordings catalog
//!
//! Record schema shared with the recordings service and the client-side list
//! used for browsing and filtering.

pub mod schema;
pub mod store;

pub use schema::{RecordingId, RecordingQuery, RecordingRecord};
pub use store::Catalog;
