//! Error module orchestrator; the enum itself lives in the private
//! `types` module.

mod types;

pub use types::{Result, ScrimError};
