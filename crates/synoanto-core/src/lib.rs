#![doc = include_str!("../README.md")]

mod common;
pub use common::*;

pub mod coordinator;
pub mod store;
pub mod upstream;
