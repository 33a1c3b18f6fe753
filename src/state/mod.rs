//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskState`: the lifecycle of a single crawl task (queued, dispatched,
//!   retry pending, succeeded, permanently failed, cancelled)
//! - `TaskTracker`: a task's current state with checked transitions

mod task_state;
mod tracker;

// Re-export main types
pub use task_state::TaskState;
pub use tracker::TaskTracker;
