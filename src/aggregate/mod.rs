//! Subject-level statistics over normalized grade records.
//!
//! Averages are plain arithmetic means; coefficients are carried on the
//! records but not applied here.

pub mod calculator;
pub mod utility;

pub use calculator::{is_counted, summarize_subject, summarize_subjects};
