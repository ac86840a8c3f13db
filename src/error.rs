//! Error types for the vesper pipeline

use thiserror::Error;

/// Result type alias for vesper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the vesper pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (unknown backend name, missing required section)
    #[error("configuration error: {0}")]
    Config(String),

    /// Backend prerequisite missing (file, binary, environment variable)
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Registered placeholder backend invoked before its engine was wired in
    #[error("not implemented: {0}")]
    Unimplemented(String),

    /// Audio capture/playback error
    #[error("audio error: {0}")]
    Audio(String),

    /// Wake word detection error
    #[error("wake word error: {0}")]
    Wake(String),

    /// Speech-to-text error
    #[error("ASR error: {0}")]
    Asr(String),

    /// Language model error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether the turn sequencer may abandon the current turn and keep
    /// running after this error.
    ///
    /// Runtime failures in capture, transcription, inference, or synthesis
    /// abandon the turn and return to `AwaitingWake`. Configuration errors,
    /// missing prerequisites, unimplemented backends, and wake device
    /// failures terminate the run loop instead.
    #[must_use]
    pub const fn is_turn_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Audio(_) | Self::Asr(_) | Self::Llm(_) | Self::Tts(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_failures_are_turn_recoverable() {
        assert!(Error::Asr("decode failed".into()).is_turn_recoverable());
        assert!(Error::Tts("synthesis failed".into()).is_turn_recoverable());
        assert!(Error::Audio("stream closed".into()).is_turn_recoverable());
    }

    #[test]
    fn deployment_errors_are_fatal() {
        assert!(!Error::Config("unknown backend".into()).is_turn_recoverable());
        assert!(!Error::Unavailable("piper not on PATH".into()).is_turn_recoverable());
        assert!(!Error::Unimplemented("porcupine".into()).is_turn_recoverable());
        assert!(!Error::Wake("recorder died".into()).is_turn_recoverable());
    }
}
