//! Correctness policy applied to a similarity score.

use serde::{Deserialize, Serialize};

use crate::constants::{CORRECT_THRESHOLD, REWARD_HINT_TOKENS};

/// Outcome of evaluating one similarity score.
///
/// `tokens_earned` is a display hint for the client. The amount actually
/// minted is read from the reward program at dispatch time and may differ.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_correct: bool,
    pub tokens_earned: u64,
}

pub fn evaluate(score: f64) -> Verdict {
    let is_correct = score >= CORRECT_THRESHOLD;
    Verdict {
        is_correct,
        tokens_earned: if is_correct { REWARD_HINT_TOKENS } else { 0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        assert!(!evaluate(69.99).is_correct);
        assert!(evaluate(70.0).is_correct);
    }

    #[test]
    fn test_tokens_follow_correctness() {
        assert_eq!(
            evaluate(100.0),
            Verdict {
                is_correct: true,
                tokens_earned: 100
            }
        );
        assert_eq!(
            evaluate(0.0),
            Verdict {
                is_correct: false,
                tokens_earned: 0
            }
        );
    }

    #[test]
    fn test_containment_score_is_correct() {
        let verdict = evaluate(crate::constants::CONTAINMENT_SCORE);
        assert!(verdict.is_correct);
        assert_eq!(verdict.tokens_earned, REWARD_HINT_TOKENS);
    }
}
