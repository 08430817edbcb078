#![allow(clippy::single_match)]
#![allow(clippy::verbose_bit_mask)]
#![allow(clippy::cognitive_complexity)]

#[cfg(test)]
extern crate pretty_assertions;

pub mod cpu;
pub mod error;
pub mod hex;
pub mod machine;
pub mod memory;
