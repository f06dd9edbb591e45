pub mod confluence;

pub use confluence::{ConfluenceScorer, ScoreBreakdown, SignalContribution, Verdict};
