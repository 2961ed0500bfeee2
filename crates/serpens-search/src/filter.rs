use serpens_core::ScoredDocument;
use tracing::debug;

/// Drops hits that do not clear the relevance threshold.
#[derive(Debug, Clone, Copy)]
pub struct ResultFilter {
    threshold: f32,
}

impl ResultFilter {
    /// Filter keeping hits scoring strictly above `threshold`.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Configured threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Keep hits with `score > threshold`, in backend order.
    pub fn apply(&self, hits: Vec<ScoredDocument>) -> Vec<ScoredDocument> {
        let total = hits.len();
        let kept: Vec<ScoredDocument> = hits
            .into_iter()
            .filter(|hit| hit.score > self.threshold)
            .collect();
        debug!(total, kept = kept.len(), threshold = self.threshold, "filtered hits");
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(name: &str, score: f32) -> ScoredDocument {
        ScoredDocument {
            scientific_name: name.to_owned(),
            score,
            ..ScoredDocument::default()
        }
    }

    fn names(hits: &[ScoredDocument]) -> Vec<&str> {
        hits.iter().map(|hit| hit.scientific_name.as_str()).collect()
    }

    #[test]
    fn test_threshold_is_exclusive_and_order_kept() {
        let hits = vec![hit("low", 1.05), hit("b", 1.3), hit("edge", 1.1), hit("a", 1.8)];
        let kept = ResultFilter::new(1.1).apply(hits);
        assert_eq!(names(&kept), vec!["b", "a"], "Backend order must not be re-sorted");
    }

    #[test]
    fn test_raising_threshold_never_adds_hits() {
        let hits = vec![hit("a", 1.9), hit("b", 1.4), hit("c", 1.2), hit("d", 1.0)];
        let mut previous = usize::MAX;
        for threshold in [0.5, 1.1, 1.3, 1.5, 2.0] {
            let kept = ResultFilter::new(threshold).apply(hits.clone()).len();
            assert!(kept <= previous, "threshold {threshold} kept more than a lower one");
            previous = kept;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_empty_when_nothing_qualifies() {
        assert!(ResultFilter::new(1.1).apply(vec![hit("a", 0.9)]).is_empty());
        assert!(ResultFilter::new(1.1).apply(Vec::new()).is_empty());
    }
}
