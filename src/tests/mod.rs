// src/tests/mod.rs

//! tests for _evlrlib_

pub mod common;
mod filelog_tests;
