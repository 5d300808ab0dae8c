//! Byte-exact voting on replica outputs

use crate::config::VotePolicy;
use tmr_primitives::{Lane, LanePair, LANE_COUNT};

/// Outcome of comparing the three outputs of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// All lanes agree
    Agreed,
    /// Two lanes agree and outvote the third (majority policy only)
    Outvoted {
        /// Minority lane
        suspect: Lane,
        /// First byte where the suspect differs
        first_difference: usize,
    },
    /// The outputs cannot be accepted
    Mismatch {
        /// Disagreeing pairs in (0,1), (1,2), (0,2) order
        pairs: Vec<LanePair>,
        /// First byte where any pair differs
        first_difference: usize,
    },
}

impl Verdict {
    /// Lane whose buffer holds the accepted output
    pub fn winner(&self) -> Option<Lane> {
        match self {
            Verdict::Agreed => Some(Lane::Lane0),
            Verdict::Outvoted { suspect, .. } => {
                Lane::ALL.into_iter().find(|lane| lane != suspect)
            }
            Verdict::Mismatch { .. } => None,
        }
    }
}

/// Compare lane outputs under a policy
pub fn vote(policy: VotePolicy, outputs: [&[u8]; LANE_COUNT]) -> Verdict {
    let mut pairs = Vec::new();
    let mut first_difference = usize::MAX;
    for pair in LanePair::ALL {
        let (a, b) = (outputs[pair.0.index()], outputs[pair.1.index()]);
        if let Some(offset) = first_difference_of(a, b) {
            pairs.push(pair);
            first_difference = first_difference.min(offset);
        }
    }

    if pairs.is_empty() {
        return Verdict::Agreed;
    }

    if policy == VotePolicy::Majority && pairs.len() == 2 {
        if let Some(suspect) = Lane::ALL
            .into_iter()
            .find(|&lane| pairs.iter().all(|p| p.contains(lane)))
        {
            return Verdict::Outvoted {
                suspect,
                first_difference,
            };
        }
    }

    Verdict::Mismatch {
        pairs,
        first_difference,
    }
}

/// Offset of the first differing byte; a length difference counts at the shorter end
fn first_difference_of(a: &[u8], b: &[u8]) -> Option<usize> {
    match a.iter().zip(b).position(|(x, y)| x != y) {
        Some(offset) => Some(offset),
        None if a.len() != b.len() => Some(a.len().min(b.len())),
        None => None,
    }
}
