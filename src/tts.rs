//! Text-to-speech backends
//!
//! One registered backend: `piper`, driving the Piper binary as a
//! subprocess. Text goes in on stdin (no shell quoting), the synthesized
//! WAV lands in a tempfile, and playback runs through the audio layer on
//! the resolved output device. Synthesis plus playback is one atomic
//! operation from the sequencer's viewpoint.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::audio::{AudioIo, CpalAudio, load_wav};
use crate::config::TtsConfig;
use crate::registry;
use crate::{Error, Result};

/// TTS stage capability: synthesize and play one utterance
pub trait SpeechSynthesizer {
    /// Synthesize `text` and play it back, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    fn speak(&mut self, text: &str) -> Result<()>;
}

impl std::fmt::Debug for dyn SpeechSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn SpeechSynthesizer")
    }
}

/// Piper subprocess synthesis with local playback
pub struct PiperTts {
    binary: PathBuf,
    voice: PathBuf,
    output_device: Option<usize>,
    audio: CpalAudio,
}

impl PiperTts {
    /// Locate the piper binary and validate the voice model
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the binary is not on PATH or the voice
    /// model file is missing
    pub fn new(voice_path: &Path, output_device: Option<usize>) -> Result<Self> {
        let binary = which::which("piper").map_err(|_| {
            Error::Unavailable(
                "'piper' binary not found on PATH (install Piper)".to_string(),
            )
        })?;

        if !voice_path.exists() {
            return Err(Error::Unavailable(format!(
                "piper voice not found: {}",
                voice_path.display()
            )));
        }

        tracing::debug!(
            binary = %binary.display(),
            voice = %voice_path.display(),
            "piper TTS initialized"
        );

        Ok(Self {
            binary,
            voice: voice_path.to_path_buf(),
            output_device,
            audio: CpalAudio,
        })
    }
}

impl SpeechSynthesizer for PiperTts {
    fn speak(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        let out_wav = tempfile::Builder::new()
            .prefix("vesper-tts-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| Error::Tts(format!("failed to create output file: {e}")))?;

        tracing::info!(chars = text.len(), "synthesizing with piper");
        let mut child = Command::new(&self.binary)
            .arg("-m")
            .arg(&self.voice)
            .arg("-f")
            .arg(out_wav.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Tts(format!("failed to spawn piper: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| Error::Tts(format!("failed to write to piper stdin: {e}")))?;
            // dropping stdin closes the pipe so piper sees EOF
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Tts(format!("piper did not exit cleanly: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Tts(format!("piper failed: {}", stderr.trim())));
        }

        let (samples, sample_rate) = load_wav(out_wav.path())?;
        self.audio
            .play(&samples, sample_rate, self.output_device)
            .map_err(|e| Error::Tts(e.to_string()))
    }
}

type TtsCtor = fn(&TtsConfig, Option<usize>) -> Result<Box<dyn SpeechSynthesizer>>;

const TTS_BACKENDS: &[(&str, TtsCtor)] = &[("piper", make_piper)];

/// Construct the configured TTS backend
///
/// # Errors
///
/// Returns `Config` for an unknown backend name, or whatever the
/// backend constructor reports for missing prerequisites
pub fn make_tts(
    config: &TtsConfig,
    output_device: Option<usize>,
) -> Result<Box<dyn SpeechSynthesizer>> {
    let ctor = registry::lookup("tts", TTS_BACKENDS, &config.backend)?;
    ctor(config, output_device)
}

fn make_piper(
    config: &TtsConfig,
    output_device: Option<usize>,
) -> Result<Box<dyn SpeechSynthesizer>> {
    let settings = config.piper.as_ref().ok_or_else(|| {
        Error::Config("missing 'tts.piper' section in configuration".to_string())
    })?;
    Ok(Box::new(PiperTts::new(&settings.voice_path, output_device)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_backend_is_config_error() {
        let config = TtsConfig {
            backend: "espeak".to_string(),
            piper: None,
        };
        let err = make_tts(&config, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn piper_requires_section() {
        let config = TtsConfig {
            backend: "piper".to_string(),
            piper: None,
        };
        let err = make_tts(&config, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn empty_text_is_a_noop() {
        let mut tts = PiperTts {
            binary: PathBuf::from("/nonexistent/piper"),
            voice: PathBuf::from("/nonexistent/voice.onnx"),
            output_device: None,
            audio: CpalAudio,
        };
        // No subprocess is spawned for empty text
        assert!(tts.speak("").is_ok());
    }

    #[test]
    fn missing_binary_fails_at_speak_time() {
        let mut tts = PiperTts {
            binary: PathBuf::from("/nonexistent/piper"),
            voice: PathBuf::from("/nonexistent/voice.onnx"),
            output_device: None,
            audio: CpalAudio,
        };
        let err = tts.speak("hello").unwrap_err();
        assert!(matches!(err, Error::Tts(_)));
    }
}
