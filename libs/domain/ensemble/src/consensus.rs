// [libs/domain/ensemble/src/consensus.rs]
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct StructuredCandidate {
    pub pool_id: String,
    pub value: Value,
}

/// Consensus ensemble variant: returns the most-agreed
/// structured value across branches. Ties break on first occurrence
/// order among `candidates`, matching `best_of_n`'s determinism.
pub fn consensus(candidates: Vec<StructuredCandidate>) -> Option<Value> {
    let mut tally: Vec<(Value, usize)> = Vec::new();
    for candidate in &candidates {
        match tally.iter_mut().find(|(value, _)| value == &candidate.value) {
            Some((_, count)) => *count += 1,
            None => tally.push((candidate.value.clone(), 1)),
        }
    }
    let mut winner: Option<(Value, usize)> = None;
    for (value, count) in tally {
        match &winner {
            Some((_, best_count)) if count <= *best_count => {}
            _ => winner = Some((value, count)),
        }
    }
    winner.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(pool_id: &str, value: Value) -> StructuredCandidate {
        StructuredCandidate { pool_id: pool_id.to_string(), value }
    }

    #[test]
    fn returns_the_most_agreed_value() {
        let candidates = vec![
            candidate("a", json!({"answer": "yes"})),
            candidate("b", json!({"answer": "no"})),
            candidate("c", json!({"answer": "yes"})),
        ];
        assert_eq!(consensus(candidates), Some(json!({"answer": "yes"})));
    }

    #[test]
    fn ties_prefer_the_first_occurring_value() {
        let candidates = vec![candidate("a", json!("x")), candidate("b", json!("y"))];
        assert_eq!(consensus(candidates), Some(json!("x")));
    }

    #[test]
    fn empty_input_yields_none() {
        assert_eq!(consensus(vec![]), None);
    }
}
