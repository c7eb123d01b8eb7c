mod tracker;

#[cfg(test)]
mod tracker_tests;

pub use tracker::{Outcome, RunTracker};
