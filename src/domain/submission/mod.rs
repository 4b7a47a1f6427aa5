//! Submission aggregate - run data and state transitions.
//!
//! This module contains the core domain logic for one pipeline run:
//! - Submission types and states (typestate pattern)
//! - State transition methods
//! - Value objects (SubmissionRequest, FetchResult, PublishResult)

pub mod state;
pub mod transitions;

pub use state::*;
pub use transitions::Step;
