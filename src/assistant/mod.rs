//! Query orchestration: the tool-calling generator and the `RagSystem` facade.

pub mod generator;
pub mod system;

pub use generator::{AiGenerator, GeneratedAnswer};
pub use system::{CourseAnalytics, IngestReport, QueryOutcome, RagSystem};
