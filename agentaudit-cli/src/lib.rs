//! agentaudit - self-analysis for agent-based codebases
//!
//! Scans a project laid out as a set of agent modules, parses each one
//! structurally, runs eight dimension auditors and folds the results into a
//! composite health score with drift tracking between runs.
//!
//! ```no_run
//! use agentaudit::config::load_project_config;
//! use agentaudit::Orchestrator;
//!
//! let root = std::path::Path::new(".");
//! let report = Orchestrator::new(root, load_project_config(root)).run();
//! println!("{:.2} ({})", report.composite_score, report.status);
//! ```

pub mod analyzer;
pub mod auditors;
pub mod config;
pub mod models;
pub mod orchestrator;
pub mod parsers;
pub mod reporters;
pub mod scanner;
pub mod scoring;
pub mod tracker;

pub use models::HealthReport;
pub use orchestrator::{NameValidation, Orchestrator, Stage};
