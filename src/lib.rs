//! Relationship questions over a property-graph knowledge base: resolve two
//! terms to entities, find canonical chains between them, and rank the chains
//! by evidentiary strength.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod evidence;
pub mod graph;
pub mod pipeline;
pub mod question;
pub mod resolve;
pub mod scoring;
pub mod search;

pub use config::Config;
pub use error::{KgpathError, Result};
pub use pipeline::{QueryResponse, QueryStatus, RelationshipQa};
