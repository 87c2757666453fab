//! Speaker-mode gating for scripted hand-offs to an external speaker.
//!
//! Marker detection is a declarative table of `(pattern, effect)` rules,
//! evaluated in priority order with exit rules first. Patterns run against
//! folded text (lowercase, no diacritics, no punctuation).

use crate::error::ConfigError;
use crate::normalizer::fold;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};
use ts_rs::TS;

const DEFAULT_EXIT_MARKERS: &[&str] = &[
    r"\bdevolve\b",
    r"\bretorna\b",
    r"\bhands?\s+back\b",
    r"\breturns?\s+to\s+(?:the\s+)?(?:anchor|studio)\b",
    r"^(?:return|retorno|volta)$",
];

const DEFAULT_ENTRY_MARKERS: &[&str] = &[
    r"\babre\s+(?:o\s+)?link\b",
    r"\bopens?\s+(?:(?:the|an)\s+)?(?:external\s+)?link\b",
    r"^link(?:\s+(?:ao\s+vivo|live))?$",
];

/// Who is currently expected to be speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SpeakerMode {
    #[default]
    Anchor,
    External,
}

impl fmt::Display for SpeakerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SpeakerMode::Anchor => "anchor",
            SpeakerMode::External => "external",
        };
        write!(f, "{label}")
    }
}

impl FromStr for SpeakerMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anchor" => Ok(SpeakerMode::Anchor),
            "external" => Ok(SpeakerMode::External),
            _ => Err(ConfigError::InvalidSpeakerMode(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerEffect {
    EnterExternal,
    ReturnToAnchor,
}

impl MarkerEffect {
    fn kind(self) -> &'static str {
        match self {
            MarkerEffect::EnterExternal => "entry",
            MarkerEffect::ReturnToAnchor => "exit",
        }
    }
}

#[derive(Debug, Clone)]
struct MarkerRule {
    pattern: Regex,
    effect: MarkerEffect,
}

/// Ordered marker rules with a per-text classification cache.
#[derive(Debug, Clone)]
pub struct MarkerTable {
    rules: Vec<MarkerRule>,
    cache: HashMap<String, Option<MarkerEffect>>,
}

impl MarkerTable {
    /// Default rules plus user-supplied ones; exit rules always come first.
    pub fn new(extra_entry: &[String], extra_exit: &[String]) -> Result<Self, ConfigError> {
        let mut rules = Vec::new();
        let exits = DEFAULT_EXIT_MARKERS
            .iter()
            .map(|p| p.to_string())
            .chain(extra_exit.iter().cloned());
        for pattern in exits {
            rules.push(compile_rule(&pattern, MarkerEffect::ReturnToAnchor)?);
        }
        let entries = DEFAULT_ENTRY_MARKERS
            .iter()
            .map(|p| p.to_string())
            .chain(extra_entry.iter().cloned());
        for pattern in entries {
            rules.push(compile_rule(&pattern, MarkerEffect::EnterExternal)?);
        }
        Ok(Self {
            rules,
            cache: HashMap::new(),
        })
    }

    pub fn classify(&mut self, text: &str) -> Option<MarkerEffect> {
        if let Some(cached) = self.cache.get(text) {
            return *cached;
        }
        let folded = fold(text);
        let effect = self
            .rules
            .iter()
            .find(|rule| rule.pattern.is_match(&folded))
            .map(|rule| rule.effect);
        self.cache.insert(text.to_string(), effect);
        effect
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
    }
}

impl Default for MarkerTable {
    fn default() -> Self {
        let rules = DEFAULT_EXIT_MARKERS
            .iter()
            .map(|p| (p, MarkerEffect::ReturnToAnchor))
            .chain(
                DEFAULT_ENTRY_MARKERS
                    .iter()
                    .map(|p| (p, MarkerEffect::EnterExternal)),
            )
            .filter_map(|(pattern, effect)| compile_rule(pattern, effect).ok())
            .collect();
        Self {
            rules,
            cache: HashMap::new(),
        }
    }
}

fn compile_rule(pattern: &str, effect: MarkerEffect) -> Result<MarkerRule, ConfigError> {
    Regex::new(pattern)
        .map(|pattern| MarkerRule { pattern, effect })
        .map_err(|err| ConfigError::InvalidMarkerPattern {
            kind: effect.kind(),
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })
}

/// First exit marker after `entry` in document order.
fn exit_after<'m>(markers: &'m [SpeakerMarker], entry: &SpeakerMarker) -> Option<&'m SpeakerMarker> {
    markers.iter().find(|marker| {
        marker.effect == MarkerEffect::ReturnToAnchor && marker.node_position > entry.node_position
    })
}

/// A marker found while building the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeakerMarker {
    pub effect: MarkerEffect,
    /// Position of the marker node in the raw document node list.
    pub node_position: usize,
    /// First indexed element after the marker.
    pub next_element: usize,
}

/// Outcome of feeding a weak External-mode candidate to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Hold,
    ForceReturn,
}

/// Tracks the External segment currently in progress.
#[derive(Debug, Clone)]
pub struct SpeakerGate {
    mode: SpeakerMode,
    entry: Option<SpeakerMarker>,
    search_start: usize,
    furthest_seen: Option<usize>,
    max_external_elements: usize,
}

impl SpeakerGate {
    pub fn new(max_external_elements: usize) -> Self {
        Self {
            mode: SpeakerMode::Anchor,
            entry: None,
            search_start: 0,
            furthest_seen: None,
            max_external_elements,
        }
    }

    pub fn mode(&self) -> SpeakerMode {
        self.mode
    }

    pub fn is_external(&self) -> bool {
        self.mode == SpeakerMode::External
    }

    /// First element eligible for re-acquisition while External.
    pub fn search_start(&self) -> usize {
        self.search_start
    }

    /// First element after the entry marker of the current segment.
    pub fn segment_start(&self) -> Option<usize> {
        self.entry.map(|entry| entry.next_element)
    }

    /// Entry marker that directly follows `current_element`, if the anchor has
    /// read far enough into it to hand off.
    pub fn pending_entry(
        markers: &[SpeakerMarker],
        current_element: usize,
        progress: f32,
        near_end_progress: f32,
    ) -> Option<SpeakerMarker> {
        if progress < near_end_progress {
            return None;
        }
        markers
            .iter()
            .find(|marker| {
                marker.effect == MarkerEffect::EnterExternal
                    && marker.next_element == current_element + 1
            })
            .copied()
    }

    /// Entry marker that a move to `element` would pass into.
    ///
    /// From a held position the marker must lie between `from` and
    /// `element`; an unbounded segment (no exit marker) counts as crossed.
    /// Without a held position only segments closed by an exit marker are
    /// considered, since everything after an unclosed entry would match.
    pub fn entry_crossed(
        markers: &[SpeakerMarker],
        from: Option<usize>,
        element: usize,
    ) -> Option<SpeakerMarker> {
        markers
            .iter()
            .filter(|entry| {
                entry.effect == MarkerEffect::EnterExternal && entry.next_element <= element
            })
            .filter(|entry| from.is_none_or(|from| from < entry.next_element))
            .filter(|entry| match exit_after(markers, entry) {
                Some(exit) => element < exit.next_element,
                None => from.is_some(),
            })
            .last()
            .copied()
    }

    /// Entry marker that precedes every element, so the script opens with
    /// the external speaker.
    pub fn leading_entry(markers: &[SpeakerMarker]) -> Option<SpeakerMarker> {
        markers
            .iter()
            .take_while(|marker| marker.next_element == 0)
            .filter(|marker| marker.effect == MarkerEffect::EnterExternal)
            .last()
            .copied()
            .filter(|entry| {
                exit_after(markers, entry).is_none_or(|exit| exit.next_element > 0)
            })
    }

    /// Switch to External at `entry`.
    pub fn enter(&mut self, entry: SpeakerMarker, markers: &[SpeakerMarker]) {
        let exit = exit_after(markers, &entry);
        self.search_start = exit
            .map(|marker| marker.next_element)
            .unwrap_or(entry.next_element);
        self.mode = SpeakerMode::External;
        self.entry = Some(entry);
        self.furthest_seen = None;
        info!(
            next_element = entry.next_element,
            search_start = self.search_start,
            has_exit_marker = exit.is_some(),
            "Handing off to external speaker"
        );
    }

    /// Record a below-threshold candidate seen during External.
    pub fn observe_candidate(&mut self, element: usize) -> GateVerdict {
        let Some(entry) = self.entry else {
            return GateVerdict::Hold;
        };
        let furthest = self.furthest_seen.map_or(element, |seen| seen.max(element));
        self.furthest_seen = Some(furthest);
        let traversed = furthest.saturating_sub(entry.next_element);
        if traversed > self.max_external_elements {
            warn!(
                traversed,
                limit = self.max_external_elements,
                "No exit marker detected in external segment; forcing return to anchor"
            );
            return GateVerdict::ForceReturn;
        }
        GateVerdict::Hold
    }

    pub fn return_to_anchor(&mut self) {
        if self.mode == SpeakerMode::External {
            info!("Returning to anchor speaker");
        }
        self.mode = SpeakerMode::Anchor;
        self.entry = None;
        self.search_start = 0;
        self.furthest_seen = None;
    }

    /// Force a mode from the configuration surface.
    pub fn force_mode(&mut self, mode: SpeakerMode, search_start: usize) {
        match mode {
            SpeakerMode::Anchor => self.return_to_anchor(),
            SpeakerMode::External => {
                self.mode = SpeakerMode::External;
                self.entry = Some(SpeakerMarker {
                    effect: MarkerEffect::EnterExternal,
                    node_position: 0,
                    next_element: search_start,
                });
                self.search_start = search_start;
                self.furthest_seen = None;
            }
        }
    }
}
