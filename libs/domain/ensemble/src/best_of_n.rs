// [libs/domain/ensemble/src/best_of_n.rs]
use futures::future::BoxFuture;

/// A completed, non-streaming branch result awaiting scoring.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub pool_id: String,
    pub output: String,
}

/// Non-streaming ensemble variant: await all branches, then
/// pick the highest-scoring one. Ties break on source order — the
/// earliest branch in `candidates` wins — so the result is deterministic
/// across runs given the same branch ordering.
pub async fn best_of_n<'a, F>(candidates: Vec<ScoredCandidate>, scorer: F) -> Option<ScoredCandidate>
where
F: Fn(&ScoredCandidate) -> BoxFuture<'a, f64>,
{
    let mut best: Option<(f64, ScoredCandidate)> = None;
    for candidate in candidates {
        let score = scorer(&candidate).await;
        match &best {
            Some((best_score, _)) if score <= *best_score => {}
            _ => best = Some((score, candidate)),
        }
    }
    best.map(|(_, candidate)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(pool_id: &str, output: &str) -> ScoredCandidate {
        ScoredCandidate { pool_id: pool_id.to_string(), output: output.to_string() }
    }

    #[tokio::test]
    async fn picks_the_highest_scoring_candidate() {
        let candidates = vec![candidate("a", "short"), candidate("b", "much longer output")];
        let winner = best_of_n(candidates, |c| Box::pin(async move { c.output.len() as f64 })).await.unwrap();
        assert_eq!(winner.pool_id, "b");
    }

    #[tokio::test]
    async fn ties_break_on_source_order() {
        let candidates = vec![candidate("first", "xxxx"), candidate("second", "yyyy")];
        let winner = best_of_n(candidates, |_| Box::pin(async move { 1.0 })).await.unwrap();
        assert_eq!(winner.pool_id, "first");
    }

    #[tokio::test]
    async fn empty_candidates_yields_none() {
        let candidates: Vec<ScoredCandidate> = vec![];
        assert!(best_of_n(candidates, |_| Box::pin(async move { 0.0 })).await.is_none());
    }
}
