#![allow(dead_code, unused_macros)]

#[macro_use]
pub mod test_utils;
