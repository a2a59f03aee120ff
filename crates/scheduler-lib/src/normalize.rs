//! Batch normalization of per-node scores
//!
//! Runs once per scheduling cycle after every node has been scored, and
//! rescales the batch onto `[0, max]` relative to the highest raw score.

use serde::{Deserialize, Serialize};

/// Ceiling of the scheduling framework's node score range
pub const MAX_NODE_SCORE: i64 = 100;

/// Ceiling of the scheduler extender priority range
pub const MAX_EXTENDER_PRIORITY: i64 = 10;

/// Score assigned to one node in a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeScore {
    pub name: String,
    pub score: i64,
}

impl NodeScore {
    pub fn new(name: impl Into<String>, score: i64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// Rescale every score in place to `round(score * max / highest)`
///
/// When no node scored above zero the batch carries no ranking signal and
/// every node is set to 0. Negative raw scores clamp to 0.
pub fn normalize_scores(scores: &mut [NodeScore], max: i64) {
    let highest = scores.iter().map(|node| node.score).max().unwrap_or(0);

    if highest <= 0 {
        for node in scores.iter_mut() {
            node.score = 0;
        }
        return;
    }

    for node in scores.iter_mut() {
        let scaled = (node.score as f64 * max as f64 / highest as f64).round() as i64;
        node.score = scaled.clamp(0, max);
    }
}
