pub mod runner;
#[cfg(test)]
pub mod testing;

pub use runner::{Invocation, ProcessOutput, ProcessRunner, SystemRunner};
