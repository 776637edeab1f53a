pub mod common;
pub mod loader_tests;
