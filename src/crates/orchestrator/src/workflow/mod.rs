//! Workflow definitions

pub mod plan_review;
pub mod state;
pub mod templates;

pub use plan_review::PlanReviewWorkflow;
pub use state::{step_kind, Message, PlanReviewState, ReviewFeedback};
