#![cfg(test)]

mod client_tests;
