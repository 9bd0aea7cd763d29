// src/lib.rs

pub mod common;
pub mod data;
pub mod readers;
#[cfg(test)]
pub mod tests;
