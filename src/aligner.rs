//! Position search over the reference index.
//!
//! Three modes share one scoring function: a global scan while searching, a
//! short forward window while locked, and a restricted scan past the current
//! external segment.

use crate::config::{MatchingConfig, SyncConfig};
use crate::index::ReferenceIndex;
use tracing::trace;

/// A scored alignment of spoken words onto one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignMatch {
    pub element: usize,
    pub progress: f32,
    pub confidence: f32,
}

/// Best candidate of a scan regardless of threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub element: usize,
    pub score: f32,
}

pub struct Aligner<'a> {
    index: &'a ReferenceIndex,
    config: &'a MatchingConfig,
    /// Progress past which an element counts as nearly read.
    near_end_progress: f32,
}

impl<'a> Aligner<'a> {
    pub fn new(index: &'a ReferenceIndex, config: &'a SyncConfig) -> Self {
        Self {
            index,
            config: &config.matching,
            near_end_progress: config.tracking.near_end_progress,
        }
    }

    /// Scan every element; the first strictly-best score wins.
    pub fn global_search(&self, spoken: &[String]) -> Option<AlignMatch> {
        let best = self.best_in_range(spoken, 0, self.index.len())?;
        self.accept(best, spoken, self.config.search_threshold, 0)
    }

    /// Scan `[current, current + lookahead]` inclusive.
    ///
    /// The window widens near the end of an element or after repeated
    /// near-end misses so the next paragraph is reachable even when the
    /// current one was skipped quickly.
    pub fn local_search(
        &self,
        spoken: &[String],
        current: usize,
        progress: f32,
        near_end_misses: u32,
        word_pointer: usize,
    ) -> Option<AlignMatch> {
        if current >= self.index.len() {
            return None;
        }
        let lookahead = self.lookahead(progress, near_end_misses);
        let end = (current + lookahead + 1).min(self.index.len());
        let best = self.best_in_range(spoken, current, end)?;
        let floor_pointer = if best.element == current { word_pointer } else { 0 };
        self.accept(best, spoken, self.config.locked_threshold, floor_pointer)
    }

    /// Scan `[start, len)` with the external re-acquisition threshold.
    pub fn restricted_search(&self, spoken: &[String], start: usize) -> Option<AlignMatch> {
        let best = self.best_in_range(spoken, start, self.index.len())?;
        self.accept(best, spoken, self.config.external_threshold, 0)
    }

    /// Best candidate in `[start, len)` at or above the global search
    /// threshold, without accepting it as a position.
    pub fn weak_candidate(&self, spoken: &[String], start: usize) -> Option<Candidate> {
        self.best_in_range(spoken, start, self.index.len())
            .filter(|candidate| candidate.score >= self.config.search_threshold)
    }

    pub fn lookahead(&self, progress: f32, near_end_misses: u32) -> usize {
        if progress > self.near_end_progress
            || near_end_misses >= self.config.expand_after_misses
        {
            self.config.expanded_lookahead
        } else {
            self.config.lookahead
        }
    }

    /// Fraction of `element` covered by the last few spoken words, never
    /// below the committed word pointer.
    pub fn alignment_progress(&self, element: usize, spoken: &[String], word_pointer: usize) -> f32 {
        let Some(target) = self.index.element(element) else {
            return 0.0;
        };
        let total = target.word_count();
        if total == 0 {
            return 0.0;
        }
        let tail_start = spoken.len().saturating_sub(self.config.progress_words);
        let max_position = spoken[tail_start..]
            .iter()
            .filter_map(|word| self.index.highest_position(element, word))
            .max();
        let computed = max_position.map_or(0.0, |position| (position + 1) as f32 / total as f32);
        let floor = word_pointer.min(total) as f32 / total as f32;
        computed.max(floor).clamp(0.0, 1.0)
    }

    fn best_in_range(&self, spoken: &[String], start: usize, end: usize) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for element in start..end.min(self.index.len()) {
            let score = self.index.coverage(element, spoken);
            if score > best.map_or(0.0, |b| b.score) {
                best = Some(Candidate { element, score });
            }
        }
        trace!(start, end, ?best, "Scored candidate range");
        best
    }

    fn accept(
        &self,
        best: Candidate,
        spoken: &[String],
        threshold: f32,
        word_pointer: usize,
    ) -> Option<AlignMatch> {
        if best.score < threshold {
            return None;
        }
        Some(AlignMatch {
            element: best.element,
            progress: self.alignment_progress(best.element, spoken, word_pointer),
            confidence: best.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use crate::script::DocumentNode;
    use crate::speaker::MarkerTable;
    use crate::tags::TagClassifier;

    fn index(texts: &[&str]) -> ReferenceIndex {
        let nodes: Vec<DocumentNode> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| DocumentNode::new(*text, i as f32 * 100.0, 80.0))
            .collect();
        ReferenceIndex::build(
            &nodes,
            &mut TagClassifier::default(),
            &mut MarkerTable::default(),
            1,
        )
    }

    fn broadcast() -> ReferenceIndex {
        index(&[
            "Welcome to the show",
            "(CAM 2)",
            "Today we discuss climate",
        ])
    }

    #[test]
    fn global_search_finds_first_element() {
        let index = broadcast();
        let config = SyncConfig::default();
        let aligner = Aligner::new(&index, &config);
        let found = aligner
            .global_search(&normalize("welcome to the"))
            .expect("match");
        assert_eq!(found.element, 0);
        assert!(found.confidence >= 0.2);
        assert!((found.progress - 0.75).abs() < 1e-6);
    }

    #[test]
    fn local_search_advances_past_skipped_tag() {
        let index = broadcast();
        let config = SyncConfig::default();
        let aligner = Aligner::new(&index, &config);
        let found = aligner
            .local_search(&normalize("today we discuss"), 0, 0.75, 0, 3)
            .expect("match");
        assert_eq!(found.element, 1);
        assert!(found.confidence >= 0.16);
    }

    #[test]
    fn local_search_never_returns_an_earlier_element() {
        let index = index(&[
            "the quick brown fox",
            "jumps over the lazy dog",
            "and runs into the forest",
        ]);
        let config = SyncConfig::default();
        let aligner = Aligner::new(&index, &config);
        assert_eq!(
            aligner.local_search(&normalize("quick brown fox"), 1, 0.0, 0, 0),
            None
        );
    }

    #[test]
    fn local_search_window_is_inclusive() {
        let index = orchard();
        let config = SyncConfig::default();
        let aligner = Aligner::new(&index, &config);

        let at_edge = aligner
            .local_search(&normalize("guitar string"), 0, 0.0, 0, 0)
            .expect("element at current + lookahead is a candidate");
        assert_eq!(at_edge.element, 6);
        assert_eq!(
            aligner.local_search(&normalize("harbor light"), 0, 0.0, 0, 0),
            None
        );
        let widened = aligner
            .local_search(&normalize("harbor light"), 0, 0.95, 0, 0)
            .expect("expanded window");
        assert_eq!(widened.element, 7);
    }

    fn orchard() -> ReferenceIndex {
        index(&[
            "apple orchard",
            "banana split",
            "cherry blossom",
            "dragon fruit",
            "eagle feather",
            "falcon nest",
            "guitar string",
            "harbor light",
            "island breeze",
        ])
    }

    #[test]
    fn repeated_near_end_misses_widen_the_window() {
        let index = orchard();
        let config = SyncConfig::default();
        let aligner = Aligner::new(&index, &config);

        assert_eq!(
            aligner.local_search(&normalize("harbor light"), 0, 0.0, 1, 0),
            None
        );
        let found = aligner
            .local_search(&normalize("harbor light"), 0, 0.0, 2, 0)
            .expect("expanded after two near-end misses");
        assert_eq!(found.element, 7);
    }

    #[test]
    fn widening_follows_configured_thresholds() {
        let index = orchard();
        let mut config = SyncConfig::default();
        config.tracking.near_end_progress = 0.97;
        config.matching.expand_after_misses = 3;
        let aligner = Aligner::new(&index, &config);

        assert_eq!(aligner.lookahead(0.95, 2), config.matching.lookahead);
        assert_eq!(aligner.lookahead(0.98, 0), config.matching.expanded_lookahead);
        assert_eq!(aligner.lookahead(0.0, 3), config.matching.expanded_lookahead);
    }

    #[test]
    fn ties_keep_the_earliest_candidate() {
        let index = index(&["climate report part", "climate report part"]);
        let config = SyncConfig::default();
        let aligner = Aligner::new(&index, &config);
        let found = aligner
            .local_search(&normalize("climate report"), 0, 0.0, 0, 0)
            .expect("match");
        assert_eq!(found.element, 0);
    }

    #[test]
    fn progress_respects_word_pointer_floor() {
        let index = index(&["one two three four five six seven eight nine ten"]);
        let config = SyncConfig::default();
        let aligner = Aligner::new(&index, &config);
        let spoken = normalize("three four");
        assert!((aligner.alignment_progress(0, &spoken, 0) - 0.4).abs() < 1e-6);
        assert!((aligner.alignment_progress(0, &spoken, 8) - 0.8).abs() < 1e-6);
        assert_eq!(aligner.alignment_progress(0, &normalize("zebra"), 0), 0.0);
    }

    #[test]
    fn progress_only_uses_trailing_words() {
        let index = index(&["one two three four five six seven eight nine ten"]);
        let config = SyncConfig::default();
        let aligner = Aligner::new(&index, &config);
        let spoken = normalize("ten xx11 xx12 xx13 xx14 xx15");
        assert_eq!(aligner.alignment_progress(0, &spoken, 0), 0.0);
    }

    #[test]
    fn restricted_search_ignores_earlier_elements() {
        let index = index(&[
            "the reporter describes the crowd",
            "back in the studio we continue",
            "the crowd outside the studio",
        ]);
        let config = SyncConfig::default();
        let aligner = Aligner::new(&index, &config);
        let found = aligner
            .restricted_search(&normalize("crowd outside studio"), 1)
            .expect("match");
        assert_eq!(found.element, 2);
        assert_eq!(
            aligner.restricted_search(&normalize("reporter describes"), 1),
            None
        );
    }
}
