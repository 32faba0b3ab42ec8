#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod cli;
pub mod frontier;
pub mod head;
pub mod mock;
pub mod network;
pub mod node;
pub mod settings;
pub mod traversal;
pub mod utils;
