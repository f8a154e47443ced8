//! Cultural personalization engine
//!
//! Fuses uncertain signals about a visitor into a cultural and emotional
//! context, derives UI adaptation directives from it, and runs
//! session-stable experiments on those directives.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
