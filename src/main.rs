use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vesper::audio::{AudioIo, CpalAudio, resolve};
use vesper::{Config, build_sequencer, make_asr, make_llm, make_tts, make_wake};

/// Vesper - configuration-driven voice assistant pipeline
#[derive(Parser)]
#[command(name = "vesper", version, about)]
struct Cli {
    /// Path to the configuration file (default: ./config.yaml)
    #[arg(short, long, env = "VESPER_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the continuous turn loop (default)
    Run,
    /// List audio devices
    Devices,
    /// Record a few seconds and play them back
    CheckAudio {
        /// Capture duration in seconds
        #[arg(short, long, default_value = "3.0")]
        seconds: f32,
        /// Also write the capture to a WAV file
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Wait for one wake detection
    CheckWake,
    /// Record an utterance and transcribe it
    CheckAsr {
        /// Capture duration in seconds
        #[arg(short, long, default_value = "4.0")]
        seconds: f32,
    },
    /// Send a canned prompt to the LLM
    CheckLlm,
    /// Synthesize and play a line of text
    CheckTts {
        /// Text to speak
        #[arg(default_value = "Hello from the vesper pipeline.")]
        text: String,
    },
    /// Run a single turn end to end
    CheckLoop,
    /// Play a sine tone through the output device
    PlayTone {
        /// Tone frequency in Hz
        #[arg(short, long, default_value = "880.0")]
        frequency: f32,
        /// Duration in seconds
        #[arg(short, long, default_value = "1.0")]
        seconds: f32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "info,vesper=debug",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Command::Run);

    if let Command::Devices = command {
        return list_devices();
    }

    let config_path = Config::find(cli.config.as_deref())?;
    let config = Config::load(&config_path)?;
    tracing::info!(config = %config_path.display(), "configuration loaded");

    match command {
        Command::Run => {
            let mut sequencer = build_sequencer(&config)?;
            sequencer.run_loop()?;
            Ok(())
        }
        Command::Devices => unreachable!("handled above"),
        Command::CheckAudio { seconds, save } => check_audio(&config, seconds, save.as_deref()),
        Command::CheckWake => check_wake(&config),
        Command::CheckAsr { seconds } => check_asr(&config, seconds),
        Command::CheckLlm => check_llm(&config),
        Command::CheckTts { text } => check_tts(&config, &text),
        Command::CheckLoop => check_loop(&config),
        Command::PlayTone { frequency, seconds } => play_tone(&config, frequency, seconds),
    }
}

fn list_devices() -> anyhow::Result<()> {
    let audio = CpalAudio;
    println!("Audio devices:");
    for device in audio.list_devices()? {
        println!(
            "[{:2}] {}  (in:{} out:{})",
            device.index, device.name, device.max_input_channels, device.max_output_channels
        );
    }
    Ok(())
}

fn check_audio(config: &Config, seconds: f32, save: Option<&std::path::Path>) -> anyhow::Result<()> {
    list_devices()?;

    let audio = CpalAudio;
    let devices = audio.list_devices()?;
    let input = resolve(config.audio.input_device.as_ref(), &devices);
    let output = resolve(config.audio.output_device.as_ref(), &devices);

    let samples = audio.record_seconds(seconds, config.audio.sample_rate, input)?;
    if let Some(path) = save {
        vesper::audio::save_wav(path, &samples, config.audio.sample_rate)?;
        println!("Saved capture to {}", path.display());
    }
    audio.play(&samples, config.audio.sample_rate, output)?;
    println!("Audio record/playback OK");
    Ok(())
}

fn check_wake(config: &Config) -> anyhow::Result<()> {
    let audio = CpalAudio;
    let devices = audio.list_devices()?;
    let input = resolve(config.audio.input_device.as_ref(), &devices);

    let mut wake = make_wake(&config.wake, config.audio.sample_rate, input)?;
    let result = wake.listen()?;
    println!("Wake detected: {}", result.keyword);
    Ok(())
}

fn check_asr(config: &Config, seconds: f32) -> anyhow::Result<()> {
    let audio = CpalAudio;
    let devices = audio.list_devices()?;
    let input = resolve(config.audio.input_device.as_ref(), &devices);

    let mut asr = make_asr(&config.asr)?;

    print!("Speak a short sentence after pressing Enter... ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    let samples = audio.record_seconds(seconds, config.audio.sample_rate, input)?;
    let text = asr.transcribe(&samples, config.audio.sample_rate)?;
    println!("ASR text: {text}");
    Ok(())
}

fn check_llm(config: &Config) -> anyhow::Result<()> {
    let mut llm = make_llm(&config.llm)?;
    let reply = llm.chat("Say 'hello from the vesper pipeline' in five words or fewer.")?;
    println!("LLM reply: {reply}");
    Ok(())
}

fn check_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    let audio = CpalAudio;
    let devices = audio.list_devices()?;
    let output = resolve(config.audio.output_device.as_ref(), &devices);

    let mut tts = make_tts(&config.tts, output)?;
    tts.speak(text)?;
    Ok(())
}

fn check_loop(config: &Config) -> anyhow::Result<()> {
    let mut sequencer = build_sequencer(config)?;
    let report = sequencer.run_turn()?;
    println!("Transcript: {}", report.transcript);
    println!("Reply: {}", report.reply);
    Ok(())
}

#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn play_tone(config: &Config, frequency: f32, seconds: f32) -> anyhow::Result<()> {
    let audio = CpalAudio;
    let devices = audio.list_devices()?;
    let output = resolve(config.audio.output_device.as_ref(), &devices);

    let sample_rate = config.audio.sample_rate;
    let samples: Vec<f32> = (0..(seconds * sample_rate as f32) as usize)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.5
        })
        .collect();

    audio.play(&samples, sample_rate, output)?;
    Ok(())
}
