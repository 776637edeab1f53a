pub mod interface_tests;
