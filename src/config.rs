//! Configuration for the vesper pipeline
//!
//! One YAML document, loaded once at startup and passed by reference into
//! every backend factory. Each stage section names a `backend` plus a
//! backend-specific sub-section; validation of backend prerequisites
//! happens in the backend constructors, not here.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::audio::DeviceSelector;
use crate::{Error, Result};

/// Top-level pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Audio capture/playback settings
    pub audio: AudioConfig,

    /// Wake word stage
    pub wake: WakeConfig,

    /// Speech-to-text stage
    pub asr: AsrConfig,

    /// Language model stage
    pub llm: LlmConfig,

    /// Text-to-speech stage
    pub tts: TtsConfig,
}

/// Audio capture/playback settings
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Capture sample rate in Hz (16000 for speech models)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Fixed capture window per turn, in seconds
    #[serde(default = "default_record_seconds")]
    pub record_seconds: f32,

    /// Input device selector; omit for the system default
    #[serde(default)]
    pub input_device: Option<DeviceSelector>,

    /// Output device selector; omit for the system default
    #[serde(default)]
    pub output_device: Option<DeviceSelector>,
}

/// Wake word stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WakeConfig {
    /// Backend name: "keyboard", "rustpotter", or "porcupine"
    pub backend: String,

    /// Keyboard backend settings
    #[serde(default)]
    pub keyboard: Option<KeyboardWakeConfig>,

    /// Rustpotter backend settings
    #[serde(default)]
    pub rustpotter: Option<RustpotterWakeConfig>,

    /// Porcupine backend settings
    #[serde(default)]
    pub porcupine: Option<PorcupineWakeConfig>,
}

/// Keyboard-simulated wake settings
#[derive(Debug, Clone, Deserialize)]
pub struct KeyboardWakeConfig {
    /// Keyword reported in the wake result
    #[serde(default = "default_keyword")]
    pub keyword: String,
}

/// Rustpotter wake word settings
#[derive(Debug, Clone, Deserialize)]
pub struct RustpotterWakeConfig {
    /// Path to the trained wakeword model (.rpw)
    pub model_path: PathBuf,

    /// Detection score threshold
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

/// Porcupine wake word settings
#[derive(Debug, Clone, Deserialize)]
pub struct PorcupineWakeConfig {
    /// Built-in keyword name (e.g. "jarvis")
    pub keyword: String,

    /// Environment variable holding the Picovoice access key
    #[serde(default = "default_access_key_env")]
    pub access_key_env: String,
}

/// Speech-to-text stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AsrConfig {
    /// Backend name: "faster_whisper"
    pub backend: String,

    /// Whisper backend settings
    #[serde(default)]
    pub faster_whisper: Option<WhisperAsrConfig>,
}

/// Whisper settings
#[derive(Debug, Clone, Deserialize)]
pub struct WhisperAsrConfig {
    /// Path to a GGML whisper model file
    pub model_path: PathBuf,

    /// Transcription language hint
    #[serde(default = "default_language")]
    pub language: String,
}

/// Language model stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Backend name: "llama_cpp"
    #[serde(default = "default_llm_backend")]
    pub backend: String,

    /// llama.cpp backend settings
    #[serde(default)]
    pub llama_cpp: Option<LlamaCppConfig>,
}

/// llama.cpp settings
#[derive(Debug, Clone, Deserialize)]
pub struct LlamaCppConfig {
    /// Path to a GGUF model file
    pub model_path: PathBuf,

    /// Context window size in tokens
    #[serde(default = "default_n_ctx")]
    pub n_ctx: u32,

    /// Number of layers to offload to the GPU (0 = CPU only)
    #[serde(default)]
    pub n_gpu_layers: u32,

    /// Reply length cap in tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Text-to-speech stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// Backend name: "piper"
    pub backend: String,

    /// Piper backend settings
    #[serde(default)]
    pub piper: Option<PiperTtsConfig>,
}

/// Piper settings
#[derive(Debug, Clone, Deserialize)]
pub struct PiperTtsConfig {
    /// Path to the Piper voice model (.onnx)
    pub voice_path: PathBuf,
}

const fn default_sample_rate() -> u32 {
    16_000
}

const fn default_record_seconds() -> f32 {
    5.0
}

fn default_keyword() -> String {
    "wake".to_string()
}

const fn default_threshold() -> f32 {
    0.5
}

fn default_access_key_env() -> String {
    "PORCUPINE_ACCESS_KEY".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_llm_backend() -> String {
    "llama_cpp".to_string()
}

const fn default_n_ctx() -> u32 {
    2048
}

const fn default_max_tokens() -> u32 {
    256
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let config = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid configuration {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Locate the configuration file
    ///
    /// Priority: explicit path, `./config.yaml`, then the XDG config
    /// directory (`~/.config/vesper/config.yaml` on Linux).
    ///
    /// # Errors
    ///
    /// Returns error if no configuration file exists at any location
    pub fn find(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(Error::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let local = PathBuf::from("config.yaml");
        if local.exists() {
            return Ok(local);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "vesper") {
            let xdg = dirs.config_dir().join("config.yaml");
            if xdg.exists() {
                return Ok(xdg);
            }
        }

        Err(Error::Config(
            "no configuration file found; pass --config or create ./config.yaml".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
audio:
  sample_rate: 16000
  record_seconds: 4.0
  input_device: usb
  output_device: 3
wake:
  backend: keyboard
  keyboard:
    keyword: jarvis
asr:
  backend: faster_whisper
  faster_whisper:
    model_path: /models/ggml-base.en.bin
llm:
  backend: llama_cpp
  llama_cpp:
    model_path: /models/llama.gguf
    n_ctx: 4096
    n_gpu_layers: 99
tts:
  backend: piper
  piper:
    voice_path: /voices/en_US-amy-medium.onnx
";

    #[test]
    fn parses_full_document() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();

        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.wake.backend, "keyboard");
        assert_eq!(config.wake.keyboard.unwrap().keyword, "jarvis");
        assert_eq!(config.asr.backend, "faster_whisper");
        assert_eq!(config.llm.llama_cpp.unwrap().n_ctx, 4096);
        assert_eq!(config.tts.backend, "piper");
    }

    #[test]
    fn device_selectors_accept_index_and_name() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();

        assert_eq!(
            config.audio.input_device,
            Some(DeviceSelector::Name("usb".to_string()))
        );
        assert_eq!(config.audio.output_device, Some(DeviceSelector::Index(3)));
    }

    #[test]
    fn absent_devices_default_to_none() {
        let yaml = r"
audio:
  sample_rate: 16000
wake:
  backend: keyboard
asr:
  backend: faster_whisper
llm:
  backend: llama_cpp
tts:
  backend: piper
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert!(config.audio.input_device.is_none());
        assert!(config.audio.output_device.is_none());
        assert!((config.audio.record_seconds - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_required_section_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        // No wake section
        std::fs::write(
            &path,
            "audio: {}\nasr:\n  backend: faster_whisper\nllm: {}\ntts:\n  backend: piper\n",
        )
        .unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("wake"));
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let yaml = r"
audio: {}
wake:
  backend: porcupine
  porcupine:
    keyword: jarvis
asr:
  backend: faster_whisper
llm: {}
tts:
  backend: piper
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.llm.backend, "llama_cpp");
        assert_eq!(
            config.wake.porcupine.unwrap().access_key_env,
            "PORCUPINE_ACCESS_KEY"
        );
    }
}
