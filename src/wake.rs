//! Wake word detection backends
//!
//! Three registered backends: `keyboard` simulates detection from stdin,
//! `rustpotter` runs a blocking input-stream loop feeding fixed-size
//! frames to a rustpotter model with threshold comparison, and
//! `porcupine` is a placeholder whose construction validates the access
//! key but whose `listen` is not wired in yet.

use std::io::{BufRead, Write};
use std::time::Duration;

use rustpotter::{Rustpotter, RustpotterConfig, SampleFormat};

use crate::audio::CaptureStream;
use crate::config::WakeConfig;
use crate::registry;
use crate::{Error, Result};

/// Name of the keyword/model that triggered detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeResult {
    /// Keyword that fired
    pub keyword: String,
}

/// Wake stage capability: block until the wake word is heard
pub trait WakeDetector {
    /// Block until detection, returning the triggering keyword
    ///
    /// # Errors
    ///
    /// Returns error on device failure or if the backend is a placeholder
    fn listen(&mut self) -> Result<WakeResult>;
}

impl std::fmt::Debug for dyn WakeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn WakeDetector")
    }
}

/// Simulated wake detection: press Enter on stdin
pub struct KeyboardWake {
    keyword: String,
}

impl KeyboardWake {
    #[must_use]
    pub fn new(keyword: String) -> Self {
        Self { keyword }
    }

    /// Block until a line arrives on `reader`
    ///
    /// A zero-byte read means the input is closed (stdin redirected from
    /// `/dev/null`, running under a service manager); that is fatal, not a
    /// detection, otherwise the run loop would spin turns with nobody there.
    fn wait_for_line(reader: &mut impl BufRead) -> Result<()> {
        let mut line = String::new();
        let bytes = reader
            .read_line(&mut line)
            .map_err(|e| Error::Wake(e.to_string()))?;
        if bytes == 0 {
            return Err(Error::Wake("stdin closed".to_string()));
        }
        Ok(())
    }
}

impl WakeDetector for KeyboardWake {
    fn listen(&mut self) -> Result<WakeResult> {
        print!("Press Enter to simulate the wake word ('{}')... ", self.keyword);
        std::io::stdout()
            .flush()
            .map_err(|e| Error::Wake(e.to_string()))?;

        Self::wait_for_line(&mut std::io::stdin().lock())?;

        Ok(WakeResult {
            keyword: self.keyword.clone(),
        })
    }
}

/// Rustpotter wake detection over a blocking input stream
pub struct RustpotterWake {
    detector: Rustpotter,
    sample_rate: u32,
    input_device: Option<usize>,
}

impl RustpotterWake {
    /// Load the wakeword model and prepare the detector
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the model file is missing or cannot be loaded
    #[allow(clippy::field_reassign_with_default, clippy::cast_possible_truncation)]
    pub fn new(
        model_path: &std::path::Path,
        threshold: f32,
        sample_rate: u32,
        input_device: Option<usize>,
    ) -> Result<Self> {
        if !model_path.exists() {
            return Err(Error::Unavailable(format!(
                "rustpotter model not found: {} (train or download a .rpw file)",
                model_path.display()
            )));
        }

        let mut config = RustpotterConfig::default();
        config.fmt.sample_rate = sample_rate as usize;
        config.fmt.channels = 1;
        config.fmt.sample_format = SampleFormat::F32;
        config.detector.threshold = threshold;

        let mut detector = Rustpotter::new(&config)
            .map_err(|e| Error::Unavailable(format!("rustpotter init failed: {e}")))?;
        detector
            .add_wakeword_from_file("wakeword", &model_path.to_string_lossy())
            .map_err(|e| Error::Unavailable(format!("failed to load wakeword model: {e}")))?;

        tracing::debug!(
            model = %model_path.display(),
            threshold,
            "rustpotter detector initialized"
        );

        Ok(Self {
            detector,
            sample_rate,
            input_device,
        })
    }
}

impl WakeDetector for RustpotterWake {
    fn listen(&mut self) -> Result<WakeResult> {
        let capture = CaptureStream::open(self.sample_rate, self.input_device)
            .map_err(|e| Error::Wake(e.to_string()))?;

        let frame_size = self.detector.get_samples_per_frame();
        let mut pending: Vec<f32> = Vec::new();
        tracing::info!(frame_size, "listening for wake word");

        loop {
            pending.extend(capture.drain());

            while pending.len() >= frame_size {
                let frame: Vec<f32> = pending.drain(..frame_size).collect();
                if let Some(detection) = self.detector.process_samples(frame) {
                    tracing::info!(
                        keyword = %detection.name,
                        score = detection.score,
                        "wake word detected"
                    );
                    return Ok(WakeResult {
                        keyword: detection.name.clone(),
                    });
                }
            }

            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

/// Porcupine placeholder: constructs, but the engine binding is not wired in
pub struct PorcupineWake {
    keyword: String,
}

impl PorcupineWake {
    /// Validate the access key prerequisite and construct a shell object
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the access key environment variable is unset
    pub fn new(keyword: String, access_key_env: &str) -> Result<Self> {
        if std::env::var(access_key_env).is_err() {
            return Err(Error::Unavailable(format!(
                "set {access_key_env} with your Picovoice access key"
            )));
        }
        Ok(Self { keyword })
    }
}

impl WakeDetector for PorcupineWake {
    fn listen(&mut self) -> Result<WakeResult> {
        Err(Error::Unimplemented(format!(
            "porcupine engine binding for keyword '{}' is not wired in",
            self.keyword
        )))
    }
}

type WakeCtor = fn(&WakeConfig, u32, Option<usize>) -> Result<Box<dyn WakeDetector>>;

const WAKE_BACKENDS: &[(&str, WakeCtor)] = &[
    ("keyboard", make_keyboard),
    ("rustpotter", make_rustpotter),
    ("porcupine", make_porcupine),
];

/// Construct the configured wake backend
///
/// # Errors
///
/// Returns `Config` for an unknown backend name, or whatever the
/// backend constructor reports for missing prerequisites
pub fn make_wake(
    config: &WakeConfig,
    sample_rate: u32,
    input_device: Option<usize>,
) -> Result<Box<dyn WakeDetector>> {
    let ctor = registry::lookup("wake", WAKE_BACKENDS, &config.backend)?;
    ctor(config, sample_rate, input_device)
}

fn make_keyboard(
    config: &WakeConfig,
    _sample_rate: u32,
    _input_device: Option<usize>,
) -> Result<Box<dyn WakeDetector>> {
    let keyword = config
        .keyboard
        .as_ref()
        .map_or_else(|| "wake".to_string(), |c| c.keyword.clone());
    Ok(Box::new(KeyboardWake::new(keyword)))
}

fn make_rustpotter(
    config: &WakeConfig,
    sample_rate: u32,
    input_device: Option<usize>,
) -> Result<Box<dyn WakeDetector>> {
    let settings = config.rustpotter.as_ref().ok_or_else(|| {
        Error::Config("missing 'wake.rustpotter' section in configuration".to_string())
    })?;
    Ok(Box::new(RustpotterWake::new(
        &settings.model_path,
        settings.threshold,
        sample_rate,
        input_device,
    )?))
}

fn make_porcupine(
    config: &WakeConfig,
    _sample_rate: u32,
    _input_device: Option<usize>,
) -> Result<Box<dyn WakeDetector>> {
    let settings = config.porcupine.as_ref().ok_or_else(|| {
        Error::Config("missing 'wake.porcupine' section in configuration".to_string())
    })?;
    Ok(Box::new(PorcupineWake::new(
        settings.keyword.clone(),
        &settings.access_key_env,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeyboardWakeConfig, PorcupineWakeConfig, RustpotterWakeConfig};

    fn base_config(backend: &str) -> WakeConfig {
        WakeConfig {
            backend: backend.to_string(),
            keyboard: None,
            rustpotter: None,
            porcupine: None,
        }
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let err = make_wake(&base_config("snowboy"), 16_000, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("snowboy"));
    }

    #[test]
    fn keyboard_constructs_without_section() {
        assert!(make_wake(&base_config("keyboard"), 16_000, None).is_ok());
    }

    #[test]
    fn keyboard_uses_configured_keyword() {
        let mut config = base_config("keyboard");
        config.keyboard = Some(KeyboardWakeConfig {
            keyword: "jarvis".to_string(),
        });
        assert!(make_wake(&config, 16_000, None).is_ok());
    }

    #[test]
    fn rustpotter_requires_section() {
        let err = make_wake(&base_config("rustpotter"), 16_000, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rustpotter_missing_model_is_unavailable() {
        let mut config = base_config("rustpotter");
        config.rustpotter = Some(RustpotterWakeConfig {
            model_path: "/nonexistent/model.rpw".into(),
            threshold: 0.5,
        });
        let err = make_wake(&config, 16_000, None).unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[test]
    fn porcupine_without_access_key_is_unavailable() {
        let mut config = base_config("porcupine");
        config.porcupine = Some(PorcupineWakeConfig {
            keyword: "jarvis".to_string(),
            access_key_env: "VESPER_TEST_MISSING_ACCESS_KEY".to_string(),
        });
        let err = make_wake(&config, 16_000, None).unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[test]
    fn keyboard_enter_counts_as_detection() {
        let mut input: &[u8] = b"\n";
        assert!(KeyboardWake::wait_for_line(&mut input).is_ok());
    }

    #[test]
    fn keyboard_closed_input_is_wake_error() {
        // EOF on stdin must not report a detection, or the run loop would
        // spin unattended turns forever.
        let mut input: &[u8] = b"";
        let err = KeyboardWake::wait_for_line(&mut input).unwrap_err();
        assert!(matches!(err, Error::Wake(_)));
    }

    #[test]
    fn porcupine_placeholder_fails_on_first_listen() {
        // Two-phase failure: construction succeeds once prerequisites are
        // present, the capability call reports the missing engine binding.
        let mut detector = PorcupineWake {
            keyword: "jarvis".to_string(),
        };
        let err = detector.listen().unwrap_err();
        assert!(matches!(err, Error::Unimplemented(_)));
    }
}
