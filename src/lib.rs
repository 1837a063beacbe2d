//! Shared visualization state and derived-view engine for the AI-education
//! policy similarity dashboard.
//!
//! The crate owns the canonical similarity data, the selection/filter
//! coordinator every chart reads from, the lazy render scheduler, the chart
//! adapters that turn the model into drawable views, and the text comparison
//! panel.

pub mod charts;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod fetch;
pub mod models;
pub mod orchestrator;
pub mod scheduler;
pub mod similarity;
pub mod state;
pub mod text;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::AtlasConfig;
pub use dashboard::Dashboard;
pub use error::AtlasError;
pub use models::{ChunkPairs, Dataset, Policy};
pub use similarity::SimilarityModel;
pub use state::{Coordinator, Facet, FilterUpdate, Snapshot, StateChange};
