//! Audio subsystem
//!
//! Device enumeration, selector resolution, and the capture/playback
//! collaborator the pipeline stages talk to.

mod device;
mod io;

pub use device::{DeviceInfo, DeviceSelector, resolve};
pub use io::{AudioIo, CpalAudio, SAMPLE_RATE, load_wav, samples_to_wav, save_wav};

pub(crate) use io::CaptureStream;
