#![cfg(test)]

pub mod common;
pub mod pipeline_tests;
