//! Validation layer
//!
//! 1. **quality_scorer** - quality label to numeric score
//! 2. **uniqueness_verifier** - post-naming instance name uniqueness

pub mod quality_scorer;
pub mod uniqueness_verifier;

pub use quality_scorer::{QualityScorer, UNRECOGNIZED_QUALITY};
pub use uniqueness_verifier::{duplicate_names, verify_unique_names};
