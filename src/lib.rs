//! Voice-synchronized teleprompter scrolling.
//!
//! A live speech transcript is aligned against a script document and turned
//! into a continuous scroll velocity. [`sync::VoiceSync`] holds the state
//! machine; [`runtime::SyncRuntime`] wires it to a document, a scroller and a
//! transcript source.

pub mod aligner;
pub mod config;
pub mod error;
pub mod index;
pub mod normalizer;
pub mod runtime;
pub mod script;
pub mod speaker;
pub mod sync;
pub mod tags;
pub mod transcript;
pub mod velocity;
