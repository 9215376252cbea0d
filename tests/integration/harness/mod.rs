//! Test harness for registry scenarios.

#![allow(dead_code)]

pub mod project;

pub use project::TestProject;
