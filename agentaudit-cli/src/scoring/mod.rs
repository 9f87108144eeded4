//! Composite health scoring
//!
//! Folds the eight dimension results and the module analyses into one
//! Health Report.
//!
//! # Scoring Formula
//!
//! ```text
//! Composite = test_coverage × 0.20
//!           + error_intelligence × 0.20
//!           + error_handling × 0.15
//!           + integration × 0.15
//!           + contract × 0.15
//!           + dependency × 0.10
//!           + code_quality × 0.05
//!
//! code_quality = mean over parsed entities of (type_hint + docstring) / 2
//! ```
//!
//! Weights are configurable and normalized when they do not sum to 1.0.
//! A dimension without a result counts as 0 and carries an "unavailable"
//! issue. Architecture and retry instrumentation are reported but do not
//! enter the composite.
//!
//! # Status
//!
//! - ≥ 80: Excellent
//! - ≥ 70: Good
//! - ≥ 60: Fair
//! - ≥ 50: Poor
//! - otherwise: Critical

mod health_scorer;
mod roadmap;

pub use health_scorer::{code_quality, composite_score, CompositeInputs, HealthScorer, ReportInput};
pub use roadmap::{build_recommendations, build_roadmap, dimension_threshold, ALL_HEALTHY};
