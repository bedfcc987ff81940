mod common;
mod server_tests;
