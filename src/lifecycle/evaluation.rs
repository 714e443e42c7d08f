//! Panel evaluation statuses.

status_tags! {
    /// Status of an individual or consensus evaluation
    EvaluationStatus {
        Draft => "DRAFT",
        Submitted => "SUBMITTED",
    }
}

/// Individual evaluations are locked once submitted.
pub fn is_valid_evaluation_status_change(from: EvaluationStatus, to: EvaluationStatus) -> bool {
    matches!((from, to), (EvaluationStatus::Draft, EvaluationStatus::Submitted))
}

/// Consensus evaluations are locked once submitted.
pub fn is_valid_consensus_status_change(from: EvaluationStatus, to: EvaluationStatus) -> bool {
    matches!((from, to), (EvaluationStatus::Draft, EvaluationStatus::Submitted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_draft_to_submitted() {
        for from in EvaluationStatus::ALL {
            for to in EvaluationStatus::ALL {
                let expected = *from == EvaluationStatus::Draft && *to == EvaluationStatus::Submitted;
                assert_eq!(is_valid_evaluation_status_change(*from, *to), expected);
                assert_eq!(is_valid_consensus_status_change(*from, *to), expected);
            }
        }
    }
}
