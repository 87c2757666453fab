//! Stage-direction and camera-cue detection.
//!
//! Technical tags are never spoken aloud; leaving them in the index would
//! dilute coverage scores, so they are filtered out when the index is built.

use crate::error::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

// Whole-text parenthetical, up to three nesting levels.
static RE_PARENTHESIZED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\((?:[^()]|\((?:[^()]|\([^()]*\))*\))*\)\s*$").unwrap()
});
static RE_BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[[^\[\]]*\]\s*$").unwrap());
static RE_HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*#[A-Z0-9][A-Z0-9_]*\b").unwrap());
static RE_CAMERA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:CAM|CAMERA|CÂMERA|CAMARA|CÁMARA)\s*-?\s*\d+\b").unwrap());

/// Built-in pattern families that can be toggled individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinTagPattern {
    Parenthesized,
    Bracketed,
    Hashtag,
    Camera,
}

impl BuiltinTagPattern {
    pub const ALL: [BuiltinTagPattern; 4] = [
        BuiltinTagPattern::Parenthesized,
        BuiltinTagPattern::Bracketed,
        BuiltinTagPattern::Hashtag,
        BuiltinTagPattern::Camera,
    ];

    fn regex(self) -> &'static Regex {
        match self {
            BuiltinTagPattern::Parenthesized => &RE_PARENTHESIZED,
            BuiltinTagPattern::Bracketed => &RE_BRACKETED,
            BuiltinTagPattern::Hashtag => &RE_HASHTAG,
            BuiltinTagPattern::Camera => &RE_CAMERA,
        }
    }
}

/// Persistable tag-pattern configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagPatternConfig {
    pub parenthesized: bool,
    pub bracketed: bool,
    pub hashtag: bool,
    pub camera: bool,
    pub custom_prefixes: Vec<String>,
    pub custom_patterns: Vec<String>,
}

impl Default for TagPatternConfig {
    fn default() -> Self {
        Self {
            parenthesized: true,
            bracketed: true,
            hashtag: true,
            camera: true,
            custom_prefixes: Vec::new(),
            custom_patterns: Vec::new(),
        }
    }
}

impl TagPatternConfig {
    pub fn is_enabled(&self, pattern: BuiltinTagPattern) -> bool {
        match pattern {
            BuiltinTagPattern::Parenthesized => self.parenthesized,
            BuiltinTagPattern::Bracketed => self.bracketed,
            BuiltinTagPattern::Hashtag => self.hashtag,
            BuiltinTagPattern::Camera => self.camera,
        }
    }

    fn set_enabled(&mut self, pattern: BuiltinTagPattern, enabled: bool) {
        match pattern {
            BuiltinTagPattern::Parenthesized => self.parenthesized = enabled,
            BuiltinTagPattern::Bracketed => self.bracketed = enabled,
            BuiltinTagPattern::Hashtag => self.hashtag = enabled,
            BuiltinTagPattern::Camera => self.camera = enabled,
        }
    }
}

/// Classifier with a per-text result cache.
#[derive(Debug, Clone)]
pub struct TagClassifier {
    config: TagPatternConfig,
    custom_regexes: Vec<Regex>,
    cache: HashMap<String, bool>,
}

impl TagClassifier {
    /// Build a classifier, validating any custom regex patterns.
    pub fn new(config: TagPatternConfig) -> Result<Self, ConfigError> {
        let custom_regexes = compile_custom_patterns(&config.custom_patterns)?;
        if config
            .custom_prefixes
            .iter()
            .any(|prefix| prefix.trim().is_empty())
        {
            return Err(ConfigError::EmptyTagPrefix);
        }
        Ok(Self {
            config,
            custom_regexes,
            cache: HashMap::new(),
        })
    }

    pub fn config(&self) -> &TagPatternConfig {
        &self.config
    }

    pub fn is_technical_tag(&mut self, text: &str) -> bool {
        if let Some(cached) = self.cache.get(text) {
            return *cached;
        }
        let result = self.classify(text);
        self.cache.insert(text.to_string(), result);
        result
    }

    fn classify(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return true;
        }
        if BuiltinTagPattern::ALL
            .iter()
            .any(|pattern| self.config.is_enabled(*pattern) && pattern.regex().is_match(trimmed))
        {
            return true;
        }
        if self.custom_regexes.iter().any(|re| re.is_match(trimmed)) {
            return true;
        }
        let lowered = trimmed.to_lowercase();
        self.config
            .custom_prefixes
            .iter()
            .any(|prefix| lowered.starts_with(&prefix.trim().to_lowercase()))
    }

    /// Drop cached results; called whenever the script changes.
    pub fn invalidate(&mut self) {
        if !self.cache.is_empty() {
            debug!(entries = self.cache.len(), "Clearing tag classification cache");
        }
        self.cache.clear();
    }

    pub fn set_pattern_enabled(&mut self, pattern: BuiltinTagPattern, enabled: bool) {
        if self.config.is_enabled(pattern) == enabled {
            return;
        }
        self.config.set_enabled(pattern, enabled);
        self.invalidate();
    }

    pub fn add_custom_prefix(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let trimmed = prefix.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyTagPrefix);
        }
        if self
            .config
            .custom_prefixes
            .iter()
            .any(|existing| existing.trim().eq_ignore_ascii_case(trimmed))
        {
            return Ok(());
        }
        self.config.custom_prefixes.push(trimmed.to_string());
        self.invalidate();
        Ok(())
    }

    /// Returns whether a prefix was removed.
    pub fn remove_custom_prefix(&mut self, prefix: &str) -> bool {
        let trimmed = prefix.trim();
        let before = self.config.custom_prefixes.len();
        self.config
            .custom_prefixes
            .retain(|existing| !existing.trim().eq_ignore_ascii_case(trimmed));
        let removed = self.config.custom_prefixes.len() != before;
        if removed {
            self.invalidate();
        }
        removed
    }

    pub fn add_custom_pattern(&mut self, pattern: &str) -> Result<(), ConfigError> {
        let regex = compile_pattern(pattern)?;
        if self.config.custom_patterns.iter().any(|p| p == pattern) {
            return Ok(());
        }
        self.config.custom_patterns.push(pattern.to_string());
        self.custom_regexes.push(regex);
        self.invalidate();
        Ok(())
    }

    pub fn remove_custom_pattern(&mut self, pattern: &str) -> bool {
        let Some(position) = self.config.custom_patterns.iter().position(|p| p == pattern) else {
            return false;
        };
        self.config.custom_patterns.remove(position);
        self.custom_regexes.remove(position);
        self.invalidate();
        true
    }

    #[cfg(test)]
    fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

impl Default for TagClassifier {
    fn default() -> Self {
        Self {
            config: TagPatternConfig::default(),
            custom_regexes: Vec::new(),
            cache: HashMap::new(),
        }
    }
}

fn compile_custom_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns.iter().map(|p| compile_pattern(p)).collect()
}

fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    if pattern.trim().is_empty() {
        return Err(ConfigError::InvalidTagPattern {
            pattern: pattern.to_string(),
            reason: "pattern is empty".to_string(),
        });
    }
    Regex::new(pattern).map_err(|err| ConfigError::InvalidTagPattern {
        pattern: pattern.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_builtin_directions() {
        let mut tags = TagClassifier::default();
        for text in [
            "",
            "   ",
            "(ABRE LINK)",
            "(SOBE SOM (BG (LOOP)))",
            "[pause for applause]",
            "#VT",
            "#CAM2 close",
            "CAM 1",
            "CÂMERA 3 - plano aberto",
        ] {
            assert!(tags.is_technical_tag(text), "{text:?} should be a tag");
        }
    }

    #[test]
    fn leaves_spoken_text_alone() {
        let mut tags = TagClassifier::default();
        for text in [
            "Welcome to the show",
            "We spoke (briefly) with the minister.",
            "#hashtags are lowercase here",
            "Camera crews arrived at dawn",
        ] {
            assert!(!tags.is_technical_tag(text), "{text:?} should not be a tag");
        }
    }

    #[test]
    fn nesting_deeper_than_three_levels_is_not_matched() {
        let mut tags = TagClassifier::default();
        assert!(!tags.is_technical_tag("(a (b (c (d))))"));
    }

    #[test]
    fn disabling_a_pattern_invalidates_cache() {
        let mut tags = TagClassifier::default();
        assert!(tags.is_technical_tag("[note]"));
        assert_eq!(tags.cached_entries(), 1);

        tags.set_pattern_enabled(BuiltinTagPattern::Bracketed, false);
        assert_eq!(tags.cached_entries(), 0);
        assert!(!tags.is_technical_tag("[note]"));
    }

    #[test]
    fn custom_prefixes_are_case_insensitive() {
        let mut tags = TagClassifier::default();
        assert!(!tags.is_technical_tag("VO: roll the package"));
        tags.add_custom_prefix("vo:").expect("valid prefix");
        assert!(tags.is_technical_tag("VO: roll the package"));
        assert!(tags.remove_custom_prefix("VO:"));
        assert!(!tags.is_technical_tag("VO: roll the package"));
    }

    #[test]
    fn invalid_input_leaves_config_untouched() {
        let mut tags = TagClassifier::default();
        let before = tags.config().clone();
        assert_eq!(tags.add_custom_prefix("  "), Err(ConfigError::EmptyTagPrefix));
        assert!(matches!(
            tags.add_custom_pattern("(unclosed"),
            Err(ConfigError::InvalidTagPattern { .. })
        ));
        assert_eq!(tags.config(), &before);
    }

    #[test]
    fn custom_regex_patterns_apply() {
        let mut tags = TagClassifier::default();
        tags.add_custom_pattern(r"^>>").expect("valid regex");
        assert!(tags.is_technical_tag(">> insert graphic"));
        assert!(tags.remove_custom_pattern(r"^>>"));
        assert!(!tags.is_technical_tag(">> insert graphic"));
    }

    #[test]
    fn constructor_rejects_bad_patterns() {
        let config = TagPatternConfig {
            custom_patterns: vec!["[".to_string()],
            ..TagPatternConfig::default()
        };
        assert!(TagClassifier::new(config).is_err());
    }
}
