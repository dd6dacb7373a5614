//! Audio: clip storage, container format, and peripheral drivers

pub mod buffer;
pub mod io;
pub mod wav;

pub use buffer::{AudioClip, CaptureBuffer, ClipBacking};
pub use io::{CaptureSource, CpalCapture, CpalPlayback, PlaybackSink};
pub use wav::WavSpec;
