//! Configuration module for agentaudit
//!
//! This module handles:
//! - Project-level configuration (agentaudit.toml)
//! - Directory layout conventions
//! - Auditor markers and conventions
//! - Scoring weights and thresholds

mod project_config;

pub use project_config::{
    load_project_config, AuditConfig, ContractConfig, DependencyConfig, ErrorHandlingConfig,
    InstrumentationConfig, InstrumentationMarkers, IntegrationConfig, Language, LayoutConfig,
    LoggingConfig, ScoringConfig, ScoringThresholds, ScoringWeights, SnapshotConfig,
    EXAMPLE_CONFIG,
};
