//! Shared helpers for integration tests
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod database;
pub mod fixtures;

pub use database::*;
pub use fixtures::*;
