//! Core domain types for the intake pipeline.
//!
//! This module contains pure domain types with no collaborator dependencies:
//! - The classified result of a run (`outcome`)
//! - The submission typestate machine (`submission`)

pub mod outcome;
pub mod submission;
