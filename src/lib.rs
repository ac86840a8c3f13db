//! Vesper - Configuration-driven voice assistant pipeline
//!
//! This library provides the core functionality of the vesper pipeline:
//! - Audio device resolution and capture/playback
//! - Factory-selected stage backends (wake word, ASR, LLM, TTS)
//! - The turn sequencer wiring the stages into one assistant turn
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Configuration                       │
//! │   audio  │  wake  │  asr  │  llm  │  tts            │
//! └────────────────────┬────────────────────────────────┘
//!                      │ (one factory per stage)
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Turn Sequencer                       │
//! │   AwaitingWake → Recording → Thinking → Speaking    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │             External engines                         │
//! │   rustpotter │ whisper.cpp │ llama.cpp │ piper      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Every non-trivial computation is delegated to an external engine; this
//! crate contributes the selection and sequencing logic around them.

pub mod asr;
pub mod audio;
pub mod config;
pub mod error;
pub mod llm;
mod registry;
pub mod tts;
pub mod turn;
pub mod wake;

pub use asr::{Transcriber, WhisperAsr, make_asr};
pub use audio::{AudioIo, CpalAudio, DeviceInfo, DeviceSelector, resolve};
pub use config::Config;
pub use error::{Error, Result};
pub use llm::{ChatModel, LlamaChat, make_llm};
pub use tts::{PiperTts, SpeechSynthesizer, make_tts};
pub use turn::{TurnReport, TurnSequencer, TurnSettings, TurnState, build_sequencer};
pub use wake::{KeyboardWake, PorcupineWake, RustpotterWake, WakeDetector, WakeResult, make_wake};
