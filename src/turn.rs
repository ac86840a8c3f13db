//! Turn sequencing
//!
//! One turn is the fixed control sequence wake → record → transcribe →
//! infer → speak. The sequencer owns one backend handle per stage, runs
//! exactly one blocking call at a time, and never overlaps turns.

use crate::asr::{Transcriber, make_asr};
use crate::audio::{AudioIo, CpalAudio, resolve};
use crate::config::Config;
use crate::llm::{ChatModel, make_llm};
use crate::tts::{SpeechSynthesizer, make_tts};
use crate::wake::{WakeDetector, make_wake};
use crate::Result;

/// Sequencer state for one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Blocked on the wake backend
    AwaitingWake,
    /// Capturing the utterance
    Recording,
    /// Transcribing, then generating a reply
    Thinking,
    /// Synthesizing and playing the reply
    Speaking,
}

/// Capture settings the sequencer passes to the audio collaborator
#[derive(Debug, Clone, Copy)]
pub struct TurnSettings {
    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Fixed capture window per turn, in seconds
    pub record_seconds: f32,

    /// Resolved input device index, or `None` for the default
    pub input_device: Option<usize>,
}

/// What one completed turn produced
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// Keyword that triggered the turn
    pub keyword: String,

    /// Transcript of the captured utterance
    pub transcript: String,

    /// Reply that was spoken
    pub reply: String,
}

/// Runs the fixed wake → record → transcribe → infer → speak sequence
pub struct TurnSequencer {
    wake: Box<dyn WakeDetector>,
    asr: Box<dyn Transcriber>,
    llm: Box<dyn ChatModel>,
    tts: Box<dyn SpeechSynthesizer>,
    audio: Box<dyn AudioIo>,
    settings: TurnSettings,
    state: TurnState,
    visited: Vec<TurnState>,
}

impl TurnSequencer {
    /// Assemble a sequencer from constructed backend handles
    #[must_use]
    pub fn new(
        wake: Box<dyn WakeDetector>,
        asr: Box<dyn Transcriber>,
        llm: Box<dyn ChatModel>,
        tts: Box<dyn SpeechSynthesizer>,
        audio: Box<dyn AudioIo>,
        settings: TurnSettings,
    ) -> Self {
        Self {
            wake,
            asr,
            llm,
            tts,
            audio,
            settings,
            state: TurnState::AwaitingWake,
            visited: Vec::new(),
        }
    }

    /// Current sequencer state
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// States visited during the most recent turn, in order
    #[must_use]
    pub fn visited(&self) -> &[TurnState] {
        &self.visited
    }

    /// Run one full turn
    ///
    /// On any error the sequencer is back in `AwaitingWake` when this
    /// returns; whether the caller may keep looping is decided by
    /// [`Error::is_turn_recoverable`].
    ///
    /// # Errors
    ///
    /// Propagates the first stage failure
    pub fn run_turn(&mut self) -> Result<TurnReport> {
        self.visited.clear();
        self.enter(TurnState::AwaitingWake);

        let outcome = self.execute();

        self.enter(TurnState::AwaitingWake);
        outcome
    }

    /// Run turns until a non-recoverable error
    ///
    /// A runtime failure during a turn abandons that turn with a warning
    /// and waits for the next wake. Wake backend failures, configuration
    /// problems, and unimplemented backends terminate the loop.
    ///
    /// # Errors
    ///
    /// Returns the first non-recoverable error
    pub fn run_loop(&mut self) -> Result<()> {
        loop {
            match self.run_turn() {
                Ok(report) => {
                    tracing::info!(
                        keyword = %report.keyword,
                        transcript = %report.transcript,
                        "turn complete"
                    );
                }
                Err(e) if e.is_turn_recoverable() => {
                    tracing::warn!(error = %e, "turn abandoned");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn execute(&mut self) -> Result<TurnReport> {
        let wake = self.wake.listen()?;
        tracing::info!(keyword = %wake.keyword, "wake detected");

        self.enter(TurnState::Recording);
        let samples = self.audio.record_seconds(
            self.settings.record_seconds,
            self.settings.sample_rate,
            self.settings.input_device,
        )?;

        self.enter(TurnState::Thinking);
        let transcript = self.asr.transcribe(&samples, self.settings.sample_rate)?;
        let reply = self.llm.chat(&transcript)?;

        self.enter(TurnState::Speaking);
        self.tts.speak(&reply)?;

        Ok(TurnReport {
            keyword: wake.keyword,
            transcript,
            reply,
        })
    }

    fn enter(&mut self, state: TurnState) {
        self.state = state;
        self.visited.push(state);
        tracing::debug!(state = ?state, "turn state");
    }
}

/// Resolve devices and construct every stage backend from configuration
///
/// # Errors
///
/// Returns `Config` for unknown backend names, `Unavailable` for missing
/// backend prerequisites, `Audio` if devices cannot be enumerated
pub fn build_sequencer(config: &Config) -> Result<TurnSequencer> {
    let audio = CpalAudio;
    let devices = audio.list_devices()?;

    let input_device = resolve(config.audio.input_device.as_ref(), &devices);
    let output_device = resolve(config.audio.output_device.as_ref(), &devices);

    let wake = make_wake(&config.wake, config.audio.sample_rate, input_device)?;
    let asr = make_asr(&config.asr)?;
    let llm = make_llm(&config.llm)?;
    let tts = make_tts(&config.tts, output_device)?;

    Ok(TurnSequencer::new(
        wake,
        asr,
        llm,
        tts,
        Box::new(audio),
        TurnSettings {
            sample_rate: config.audio.sample_rate,
            record_seconds: config.audio.record_seconds,
            input_device,
        },
    ))
}
