//! Reference index over the script.
//!
//! Elements are the matchable units of the script in document order. The
//! index is rebuilt from scratch whenever the content hash changes; every
//! rebuild carries a new epoch so stale element indices can be recognised.

use crate::normalizer::{coverage_against_set, fuzzy_word_match, normalize};
use crate::script::{DocumentNode, content_hash};
use crate::speaker::{MarkerTable, SpeakerMarker};
use crate::tags::TagClassifier;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// One orderable, matchable unit of the script.
#[derive(Debug, Clone)]
pub struct ScriptElement {
    /// Document order among indexed elements.
    pub index: usize,
    /// Position of the source node in the raw node list.
    pub node_position: usize,
    pub text: String,
    pub words: Vec<String>,
    pub is_technical_tag: bool,
    pub top: f32,
    pub height: f32,
}

impl ScriptElement {
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Document offset at `progress` through the element.
    pub fn offset_at(&self, progress: f32) -> f32 {
        self.top + progress.clamp(0.0, 1.0) * self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordOccurrence {
    pub element: usize,
    pub position: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    epoch: u64,
    content_hash: String,
    elements: Vec<ScriptElement>,
    word_sets: Vec<HashSet<String>>,
    word_index: HashMap<String, Vec<WordOccurrence>>,
    markers: Vec<SpeakerMarker>,
    skipped_nodes: usize,
}

impl ReferenceIndex {
    pub fn build(
        nodes: &[DocumentNode],
        tags: &mut TagClassifier,
        markers: &mut MarkerTable,
        epoch: u64,
    ) -> Self {
        let mut elements = Vec::new();
        let mut word_sets = Vec::new();
        let mut word_index: HashMap<String, Vec<WordOccurrence>> = HashMap::new();
        let mut found_markers = Vec::new();
        let mut skipped_nodes = 0usize;

        for (node_position, node) in nodes.iter().enumerate() {
            if node.synthetic {
                continue;
            }
            let is_tag = tags.is_technical_tag(&node.text);
            let words = if is_tag { Vec::new() } else { normalize(&node.text) };

            if !is_tag && !words.is_empty() {
                let index = elements.len();
                for (position, word) in words.iter().enumerate() {
                    word_index
                        .entry(word.clone())
                        .or_default()
                        .push(WordOccurrence {
                            element: index,
                            position,
                        });
                }
                word_sets.push(words.iter().cloned().collect());
                elements.push(ScriptElement {
                    index,
                    node_position,
                    text: node.text.clone(),
                    words,
                    is_technical_tag: false,
                    top: node.top,
                    height: node.height,
                });
            } else {
                skipped_nodes += 1;
            }

            if !node.text.trim().is_empty() {
                if let Some(effect) = markers.classify(&node.text) {
                    found_markers.push(SpeakerMarker {
                        effect,
                        node_position,
                        next_element: elements.len(),
                    });
                }
            }
        }

        let hash = content_hash(nodes);
        info!(
            epoch,
            elements = elements.len(),
            skipped = skipped_nodes,
            distinct_words = word_index.len(),
            markers = found_markers.len(),
            "Built reference index"
        );

        Self {
            epoch,
            content_hash: hash,
            elements,
            word_sets,
            word_index,
            markers: found_markers,
            skipped_nodes,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn elements(&self) -> &[ScriptElement] {
        &self.elements
    }

    pub fn element(&self, index: usize) -> Option<&ScriptElement> {
        self.elements.get(index)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn markers(&self) -> &[SpeakerMarker] {
        &self.markers
    }

    pub fn skipped_nodes(&self) -> usize {
        self.skipped_nodes
    }

    pub fn occurrences(&self, word: &str) -> &[WordOccurrence] {
        self.word_index.get(word).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether a held `(epoch, element)` handle still refers to this index.
    pub fn is_valid_handle(&self, epoch: u64, element: usize) -> bool {
        self.epoch == epoch && element < self.elements.len()
    }

    pub fn coverage(&self, element: usize, spoken: &[String]) -> f32 {
        self.word_sets
            .get(element)
            .map(|set| coverage_against_set(spoken, set))
            .unwrap_or(0.0)
    }

    /// Highest position of `word` inside `element`: exact hits through the
    /// inverted index first, then a fuzzy scan of the element's words.
    pub fn highest_position(&self, element: usize, word: &str) -> Option<usize> {
        let exact = self
            .occurrences(word)
            .iter()
            .filter(|occurrence| occurrence.element == element)
            .map(|occurrence| occurrence.position)
            .max();
        if exact.is_some() {
            return exact;
        }
        self.elements.get(element)?.words.iter().rposition(|candidate| {
            fuzzy_word_match(word, candidate)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speaker::MarkerEffect;

    pub(crate) fn nodes(texts: &[&str]) -> Vec<DocumentNode> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| DocumentNode::new(*text, i as f32 * 100.0, 80.0))
            .collect()
    }

    fn build(texts: &[&str]) -> ReferenceIndex {
        ReferenceIndex::build(
            &nodes(texts),
            &mut TagClassifier::default(),
            &mut MarkerTable::default(),
            1,
        )
    }

    #[test]
    fn excludes_tags_and_empty_nodes() {
        let index = build(&[
            "Welcome to the show",
            "(CAM 2)",
            "",
            "Today we discuss climate",
        ]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.skipped_nodes(), 2);
        assert_eq!(index.element(1).map(|e| e.node_position), Some(3));
        assert!(index.elements().iter().all(|e| !e.is_technical_tag));
    }

    #[test]
    fn word_index_records_positions_in_order() {
        let index = build(&["the cat saw the dog", "the end"]);
        assert_eq!(
            index.occurrences("the"),
            &[
                WordOccurrence { element: 0, position: 0 },
                WordOccurrence { element: 0, position: 3 },
                WordOccurrence { element: 1, position: 0 },
            ]
        );
        assert_eq!(index.highest_position(0, "the"), Some(3));
        assert_eq!(index.highest_position(1, "dog"), None);
    }

    #[test]
    fn highest_position_falls_back_to_fuzzy() {
        let index = build(&["today we discuss climate policy"]);
        assert_eq!(index.highest_position(0, "climete"), Some(3));
    }

    #[test]
    fn records_markers_with_next_element() {
        let index = build(&[
            "Now to our reporter in the field",
            "(ABRE LINK)",
            "Thanks, the crowd here is enormous",
            "(REPÓRTER DEVOLVE)",
            "Thank you for that report",
        ]);
        assert_eq!(index.len(), 3);
        let markers = index.markers();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].effect, MarkerEffect::EnterExternal);
        assert_eq!(markers[0].next_element, 1);
        assert_eq!(markers[1].effect, MarkerEffect::ReturnToAnchor);
        assert_eq!(markers[1].next_element, 2);
    }

    #[test]
    fn handles_are_tied_to_epoch() {
        let index = build(&["one two three"]);
        assert!(index.is_valid_handle(1, 0));
        assert!(!index.is_valid_handle(2, 0));
        assert!(!index.is_valid_handle(1, 1));
    }
}
