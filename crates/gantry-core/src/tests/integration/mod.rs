#![cfg(test)]

pub mod common;
pub mod kernel_tests;
pub mod remote_tests;
