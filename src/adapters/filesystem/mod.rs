//! Filesystem persistence: YAML catalog files and JSON-lines logs.

mod json_lines_writer;
mod yaml_catalog;

pub use json_lines_writer::{JsonLinesAnalyticsWriter, ANALYTICS_FILE, FEEDBACK_FILE};
pub use yaml_catalog::{YamlCatalog, EXPERIMENTS_FILE, PROFILES_FILE, RULES_FILE};
