//! Built-in lake-ingestion steps.
//!
//! All steps are mocked: they produce realistic result shapes without
//! touching a real database or scheduler, so workflows can be executed
//! and validated end to end.

pub mod analyze;
pub mod artifact;
pub mod integration;
pub mod page_submit;
pub mod sql;
pub mod table_check;
pub mod wait_signal;
