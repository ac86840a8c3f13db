//! Audio capture and playback via cpal
//!
//! The [`AudioIo`] trait is the capability surface the rest of the pipeline
//! sees; [`CpalAudio`] is the hardware-backed implementation. Tests
//! substitute fakes so no audio hardware is required.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream};

use super::device::DeviceInfo;
use crate::{Error, Result};

/// Capture sample rate for speech models
pub const SAMPLE_RATE: u32 = 16_000;

/// Audio I/O collaborator: device enumeration, capture, playback
pub trait AudioIo {
    /// Enumerate audio devices in host order
    ///
    /// # Errors
    ///
    /// Returns error if the host cannot enumerate devices
    fn list_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Record a fixed-duration mono buffer
    ///
    /// `device` is a resolved device index, or `None` for the system default.
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened or the stream fails
    fn record_seconds(
        &self,
        seconds: f32,
        sample_rate: u32,
        device: Option<usize>,
    ) -> Result<Vec<f32>>;

    /// Play a mono sample buffer, blocking until playback completes
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened or the stream fails
    fn play(&self, samples: &[f32], sample_rate: u32, device: Option<usize>) -> Result<()>;
}

/// Hardware audio I/O backed by the default cpal host
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalAudio;

impl AudioIo for CpalAudio {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let host = cpal::default_host();
        let devices = host.devices().map_err(|e| Error::Audio(e.to_string()))?;

        let mut out = Vec::new();
        for (index, device) in devices.enumerate() {
            let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
            let max_input_channels = max_channels(device.supported_input_configs().ok());
            let max_output_channels = max_channels(device.supported_output_configs().ok());
            out.push(DeviceInfo {
                index,
                name,
                max_input_channels,
                max_output_channels,
            });
        }
        Ok(out)
    }

    fn record_seconds(
        &self,
        seconds: f32,
        sample_rate: u32,
        device: Option<usize>,
    ) -> Result<Vec<f32>> {
        tracing::info!(seconds, sample_rate, "recording");
        let capture = CaptureStream::open(sample_rate, device)?;

        let deadline = Instant::now() + Duration::from_secs_f32(seconds);
        while Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }

        let samples = capture.drain();
        tracing::debug!(samples = samples.len(), "recording complete");
        Ok(samples)
    }

    #[allow(clippy::cast_precision_loss)]
    fn play(&self, samples: &[f32], sample_rate: u32, device: Option<usize>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        tracing::info!(
            duration_secs = samples.len() as f32 / sample_rate as f32,
            sample_rate,
            "playing audio"
        );

        let device = output_device(device)?;
        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.sample_format() == cpal::SampleFormat::F32
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .or_else(|| {
                // Fallback: stereo, samples duplicated across channels
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.sample_format() == cpal::SampleFormat::F32
                        && c.min_sample_rate() <= SampleRate(sample_rate)
                        && c.max_sample_rate() >= SampleRate(sample_rate)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
        let channels = config.channels as usize;

        let source = Arc::new(samples.to_vec());
        let position = Arc::new(Mutex::new(0usize));
        let finished = Arc::new(Mutex::new(false));

        let cb_source = Arc::clone(&source);
        let cb_position = Arc::clone(&position);
        let cb_finished = Arc::clone(&finished);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut pos) = cb_position.lock() else {
                        return;
                    };
                    for frame in data.chunks_mut(channels) {
                        let sample = if *pos < cb_source.len() {
                            let s = cb_source[*pos];
                            *pos += 1;
                            s
                        } else {
                            if let Ok(mut done) = cb_finished.lock() {
                                *done = true;
                            }
                            0.0
                        };
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (samples.len() as u64 * 1000) / u64::from(sample_rate);
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();
        while !finished.lock().map(|done| *done).unwrap_or(true) {
            if start.elapsed() > timeout {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        // Let the device ring out before tearing the stream down
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = samples.len(), "playback complete");
        Ok(())
    }
}

/// An open input stream accumulating mono f32 samples
///
/// The stream stops when the handle is dropped, on every exit path.
pub(crate) struct CaptureStream {
    _stream: Stream,
    buffer: Arc<Mutex<Vec<f32>>>,
}

impl CaptureStream {
    /// Open an input stream on the given device (or the default)
    pub(crate) fn open(sample_rate: u32, device: Option<usize>) -> Result<Self> {
        let device = input_device(device)?;
        let supported = find_input_config(&device, sample_rate)?;
        let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
        let channels = config.channels as usize;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels,
            "input stream opened"
        );

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let cb_buffer = Arc::clone(&buffer);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = cb_buffer.lock() {
                        if channels == 1 {
                            buf.extend_from_slice(data);
                        } else {
                            // Downmix by taking the first channel of each frame
                            buf.extend(data.chunks(channels).map(|frame| frame[0]));
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            buffer,
        })
    }

    /// Take all samples captured since the last drain
    pub(crate) fn drain(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }
}

fn input_device(index: Option<usize>) -> Result<Device> {
    let host = cpal::default_host();
    match index {
        None => host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string())),
        Some(index) => device_at(index),
    }
}

fn output_device(index: Option<usize>) -> Result<Device> {
    let host = cpal::default_host();
    match index {
        None => host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string())),
        Some(index) => device_at(index),
    }
}

fn device_at(index: usize) -> Result<Device> {
    let host = cpal::default_host();
    host.devices()
        .map_err(|e| Error::Audio(e.to_string()))?
        .nth(index)
        .ok_or_else(|| Error::Audio(format!("audio device index {index} out of range")))
}

fn find_input_config(
    device: &Device,
    sample_rate: u32,
) -> Result<cpal::SupportedStreamConfigRange> {
    let configs = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?;

    let mut fallback = None;
    for config in configs {
        if config.sample_format() == cpal::SampleFormat::F32
            && config.min_sample_rate() <= SampleRate(sample_rate)
            && config.max_sample_rate() >= SampleRate(sample_rate)
        {
            if config.channels() == 1 {
                return Ok(config);
            }
            fallback = Some(config);
        }
    }

    fallback.ok_or_else(|| Error::Audio("no suitable input config found".to_string()))
}

fn max_channels(
    configs: Option<impl Iterator<Item = cpal::SupportedStreamConfigRange>>,
) -> u16 {
    configs.map_or(0, |iter| iter.map(|c| c.channels()).max().unwrap_or(0))
}

/// Encode f32 samples as 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;
        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }
        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Write f32 samples to a 16-bit mono WAV file
///
/// # Errors
///
/// Returns error if the file cannot be written
pub fn save_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let bytes = samples_to_wav(samples, sample_rate)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Read a WAV file into mono f32 samples plus its sample rate
///
/// Multi-channel files are downmixed by taking the first channel.
///
/// # Errors
///
/// Returns error if the file cannot be read or decoded
pub fn load_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| f32::from(v) / 32768.0))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame[0])
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_encoding_produces_riff_header() {
        let samples: Vec<f32> = (0..160).map(|i| (i as f32 / 160.0).sin() * 0.5).collect();
        let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert!(wav.len() > 44);
    }

    #[test]
    fn wav_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = vec![0.0, 0.5, -0.5, 0.25, -0.25];

        save_wav(&path, &samples, SAMPLE_RATE).unwrap();
        let (loaded, sample_rate) = load_wav(&path).unwrap();

        assert_eq!(sample_rate, SAMPLE_RATE);
        assert_eq!(loaded.len(), samples.len());
        for (a, b) in loaded.iter().zip(&samples) {
            assert!((a - b).abs() < 0.001);
        }
    }
}
