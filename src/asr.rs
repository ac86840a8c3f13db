//! Speech-to-text backends
//!
//! One registered backend: `faster_whisper`, in-process whisper.cpp via
//! whisper-rs. The model loads at construction so a bad path fails before
//! the first turn.

use std::path::Path;

use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::config::AsrConfig;
use crate::registry;
use crate::{Error, Result};

/// Sample rate whisper models expect
const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// ASR stage capability: audio buffer in, text out
pub trait Transcriber {
    /// Transcribe mono f32 samples to text
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    fn transcribe(&mut self, samples: &[f32], sample_rate: u32) -> Result<String>;
}

impl std::fmt::Debug for dyn Transcriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Transcriber")
    }
}

/// whisper.cpp transcription
pub struct WhisperAsr {
    ctx: WhisperContext,
    language: String,
}

impl WhisperAsr {
    /// Load a GGML whisper model file
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the model file is missing or fails to load
    pub fn new(model_path: &Path, language: String) -> Result<Self> {
        if !model_path.exists() {
            return Err(Error::Unavailable(format!(
                "whisper model not found: {} (download a GGML model, e.g. ggml-base.en.bin)",
                model_path.display()
            )));
        }

        tracing::info!(model = %model_path.display(), "loading whisper model");
        let ctx = WhisperContext::new_with_params(
            &model_path.to_string_lossy(),
            WhisperContextParameters::default(),
        )
        .map_err(|e| Error::Unavailable(format!("failed to load whisper model: {e:?}")))?;

        Ok(Self { ctx, language })
    }
}

impl Transcriber for WhisperAsr {
    fn transcribe(&mut self, samples: &[f32], sample_rate: u32) -> Result<String> {
        if sample_rate != WHISPER_SAMPLE_RATE {
            return Err(Error::Asr(format!(
                "whisper requires {WHISPER_SAMPLE_RATE} Hz input, got {sample_rate} Hz"
            )));
        }

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| Error::Asr(format!("failed to create whisper state: {e:?}")))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(&self.language));
        params.set_no_timestamps(true);

        state
            .full(params, samples)
            .map_err(|e| Error::Asr(format!("transcription failed: {e:?}")))?;

        let mut text = String::new();
        let n_segments = state.full_n_segments();
        for i in 0..n_segments {
            if let Some(segment) = state.get_segment(i) {
                text.push_str(&segment.to_string());
            }
        }

        let text = text.trim().to_string();
        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}

type AsrCtor = fn(&AsrConfig) -> Result<Box<dyn Transcriber>>;

const ASR_BACKENDS: &[(&str, AsrCtor)] = &[("faster_whisper", make_whisper)];

/// Construct the configured ASR backend
///
/// # Errors
///
/// Returns `Config` for an unknown backend name, or whatever the
/// backend constructor reports for missing prerequisites
pub fn make_asr(config: &AsrConfig) -> Result<Box<dyn Transcriber>> {
    let ctor = registry::lookup("asr", ASR_BACKENDS, &config.backend)?;
    ctor(config)
}

fn make_whisper(config: &AsrConfig) -> Result<Box<dyn Transcriber>> {
    let settings = config.faster_whisper.as_ref().ok_or_else(|| {
        Error::Config("missing 'asr.faster_whisper' section in configuration".to_string())
    })?;
    Ok(Box::new(WhisperAsr::new(
        &settings.model_path,
        settings.language.clone(),
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_backend_fails_before_model_loading() {
        let config = AsrConfig {
            backend: "sherpa".to_string(),
            faster_whisper: None,
        };
        let err = make_asr(&config).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("sherpa"));
        assert!(err.to_string().contains("faster_whisper"));
    }

    #[test]
    fn whisper_requires_section() {
        let config = AsrConfig {
            backend: "faster_whisper".to_string(),
            faster_whisper: None,
        };
        let err = make_asr(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_model_is_unavailable() {
        let config = AsrConfig {
            backend: "faster_whisper".to_string(),
            faster_whisper: Some(crate::config::WhisperAsrConfig {
                model_path: "/nonexistent/ggml-base.en.bin".into(),
                language: "en".to_string(),
            }),
        };
        let err = make_asr(&config).unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }
}
