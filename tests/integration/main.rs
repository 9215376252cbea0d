//! Integration scenarios for the shared registry.

mod harness;
mod scenarios;
