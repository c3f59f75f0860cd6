//! Direct wordlist probing: one GET per candidate word, no external tools.

pub mod fuzzer;

pub use fuzzer::{ProbeOutcome, ProbeResult, WordProber};
