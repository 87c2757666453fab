//! Transcript event model and the rolling word buffer fed to the aligner.

use crate::error::TranscriptError;
use serde::Deserialize;
use std::time::Duration;

/// Confirmed words kept for context once they have been matched.
const CONFIRMED_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hypothesis {
    pub text: String,
    pub is_final: bool,
}

impl Hypothesis {
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    Result(Vec<Hypothesis>),
    EndOfStream,
    Error(TranscriptError),
}

/// Continuous speech-to-text stream that can be restarted after it ends.
pub trait TranscriptSource {
    fn restart(&mut self) -> Result<(), TranscriptError>;

    fn stop(&mut self) {}
}

/// Split one result into its final text and trailing interim text.
pub fn split_result(hypotheses: &[Hypothesis]) -> (String, String) {
    let join = |is_final: bool| {
        hypotheses
            .iter()
            .filter(|h| h.is_final == is_final)
            .map(|h| h.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    };
    (join(true), join(false))
}

/// Words heard so far in the current element.
///
/// Final words wait in `pending` until a match confirms them; interim words
/// are never stored here.
#[derive(Debug, Clone, Default)]
pub struct TranscriptBuffer {
    pending: Vec<String>,
    confirmed: Vec<String>,
}

impl TranscriptBuffer {
    pub fn stage_final(&mut self, words: &[String]) {
        self.pending.extend_from_slice(words);
    }

    pub fn commit(&mut self) {
        self.confirmed.append(&mut self.pending);
        if self.confirmed.len() > CONFIRMED_CAPACITY {
            let excess = self.confirmed.len() - CONFIRMED_CAPACITY;
            self.confirmed.drain(..excess);
        }
    }

    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    /// Forget confirmed context; called when the position moves to another
    /// element.
    pub fn reset_confirmed(&mut self) {
        self.confirmed.clear();
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn confirmed(&self) -> &[String] {
        &self.confirmed
    }

    /// The last `limit` unconfirmed words: pending finals followed by
    /// `utterance`.
    pub fn utterance_window(&self, utterance: &[String], limit: usize) -> Vec<String> {
        let total = self.pending.len() + utterance.len();
        let skip = total.saturating_sub(limit);
        self.pending
            .iter()
            .chain(utterance.iter())
            .skip(skip)
            .cloned()
            .collect()
    }

    /// The last `limit` words of confirmed, pending and `utterance`, in order.
    pub fn window(&self, utterance: &[String], limit: usize) -> Vec<String> {
        let total = self.confirmed.len() + self.pending.len() + utterance.len();
        let skip = total.saturating_sub(limit);
        self.confirmed
            .iter()
            .chain(self.pending.iter())
            .chain(utterance.iter())
            .skip(skip)
            .cloned()
            .collect()
    }
}

/// One line of a recorded transcript in JSON-lines form.
#[derive(Debug, Clone, Deserialize)]
struct RecordLine {
    at_ms: u64,
    #[serde(default)]
    text: String,
    #[serde(default, rename = "final")]
    is_final: bool,
    #[serde(default)]
    end: bool,
    #[serde(default)]
    error: Option<String>,
}

/// A transcript event stamped with its offset from the start of a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub at: Duration,
    pub event: TranscriptEvent,
}

/// Parse a recorded transcript; blank lines and `//` comments are skipped.
pub fn parse_recording(contents: &str) -> Result<Vec<TimedEvent>, serde_json::Error> {
    let mut events = Vec::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        let record: RecordLine = serde_json::from_str(trimmed)?;
        let event = if record.end {
            TranscriptEvent::EndOfStream
        } else if let Some(code) = record.error {
            TranscriptEvent::Error(error_from_code(&code))
        } else {
            TranscriptEvent::Result(vec![Hypothesis {
                text: record.text,
                is_final: record.is_final,
            }])
        };
        events.push(TimedEvent {
            at: Duration::from_millis(record.at_ms),
            event,
        });
    }
    events.sort_by_key(|event| event.at);
    Ok(events)
}

/// Map the error codes browsers and cloud recognizers report.
pub fn error_from_code(code: &str) -> TranscriptError {
    match code.trim().to_ascii_lowercase().as_str() {
        "no-speech" | "no_speech" => TranscriptError::NoSpeech,
        "aborted" => TranscriptError::Aborted,
        "network" => TranscriptError::Network(code.to_string()),
        "not-allowed" | "service-not-allowed" => TranscriptError::NotAllowed,
        "audio-capture" => TranscriptError::Unavailable(code.to_string()),
        _ => TranscriptError::Other(code.to_string()),
    }
}

/// Replays a recording; restarts are counted so callers can observe them.
#[derive(Debug, Default)]
pub struct RecordedTranscript {
    restarts: usize,
    stopped: bool,
}

impl RecordedTranscript {
    pub fn restarts(&self) -> usize {
        self.restarts
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl TranscriptSource for RecordedTranscript {
    fn restart(&mut self) -> Result<(), TranscriptError> {
        self.restarts += 1;
        self.stopped = false;
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
