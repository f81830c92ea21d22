//! Domain models
//!
//! This module contains the grading models shared by the sandbox and the HTTP layer.

pub mod check_logic;
pub mod grade;
pub mod language;

pub use check_logic::*;
pub use grade::*;
pub use language::*;
