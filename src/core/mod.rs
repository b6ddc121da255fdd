// FILE: src/core/mod.rs

pub mod constants;
pub mod util;

pub use constants::*;
