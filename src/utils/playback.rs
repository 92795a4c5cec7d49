//! Narration playback.
//!
//! An [`AudioBackend`] hands out one [`AudioSink`] per play request. The sink
//! lives inside a [`PlaybackSession`], which stops it when dropped, so the
//! output is released on stop, on natural completion, on errors and when the
//! owning view goes away.

use crate::core::config::AudioFormat;
use crate::utils::audio::{decode_payload, DecodedAudioBuffer};
use anyhow::Result;
use log::{debug, info};

pub trait AudioSink {
    /// True once every queued sample has been played.
    fn is_finished(&self) -> bool;
    fn stop(&mut self);
}

pub trait AudioBackend {
    /// Acquires an output context and starts playing `buffer` on it.
    fn open(&self, buffer: DecodedAudioBuffer) -> Result<Box<dyn AudioSink>>;
}

pub struct PlaybackSession {
    sink: Box<dyn AudioSink>,
    stopped: bool,
}

impl PlaybackSession {
    pub fn start(backend: &dyn AudioBackend, buffer: DecodedAudioBuffer) -> Result<Self> {
        info!(
            "Starting playback: {} frames at {}Hz ({:.1}s)",
            buffer.frame_count(),
            buffer.sample_rate,
            buffer.duration().as_secs_f32()
        );
        let sink = backend.open(buffer)?;
        Ok(Self {
            sink,
            stopped: false,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.stopped || self.sink.is_finished()
    }

    pub fn stop(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.stopped {
            self.sink.stop();
            self.stopped = true;
            debug!("Playback session released");
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Playing,
    Stopped,
}

/// Play/pause toggle for one story's narration.
pub struct NarrationPlayer {
    backend: Box<dyn AudioBackend>,
    format: AudioFormat,
    session: Option<PlaybackSession>,
}

impl NarrationPlayer {
    pub fn new(backend: Box<dyn AudioBackend>, format: AudioFormat) -> Self {
        Self {
            backend,
            format,
            session: None,
        }
    }

    /// Drops the session if it ran to the end.
    pub fn is_playing(&mut self) -> bool {
        if self.session.as_ref().is_some_and(PlaybackSession::is_finished) {
            self.session = None;
        }
        self.session.is_some()
    }

    /// Pauses when playing; otherwise decodes `payload` afresh and starts it.
    pub fn toggle(&mut self, payload: &str) -> Result<PlayerStatus> {
        if self.is_playing() {
            self.stop();
            return Ok(PlayerStatus::Stopped);
        }

        let buffer = decode_payload(payload, self.format)?;
        self.session = Some(PlaybackSession::start(self.backend.as_ref(), buffer)?);
        Ok(PlayerStatus::Playing)
    }

    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
    }
}

#[cfg(feature = "playback")]
pub use self::rodio_backend::RodioBackend;

/// Output used by the terminal front end, if this build can play audio.
pub fn default_backend() -> Option<Box<dyn AudioBackend>> {
    #[cfg(feature = "playback")]
    {
        Some(Box::new(RodioBackend))
    }
    #[cfg(not(feature = "playback"))]
    {
        None
    }
}

#[cfg(feature = "playback")]
mod rodio_backend {
    use super::{AudioBackend, AudioSink};
    use crate::utils::audio::DecodedAudioBuffer;
    use anyhow::{anyhow, Result};
    use rodio::buffer::SamplesBuffer;
    use rodio::{OutputStream, OutputStreamBuilder, Sink};

    /// Default system output device.
    #[derive(Debug, Default)]
    pub struct RodioBackend;

    struct RodioSink {
        sink: Sink,
        // Dropping the stream closes the device, so it lives as long as the sink.
        _stream: OutputStream,
    }

    impl AudioBackend for RodioBackend {
        fn open(&self, buffer: DecodedAudioBuffer) -> Result<Box<dyn AudioSink>> {
            let mut stream = OutputStreamBuilder::open_default_stream()
                .map_err(|e| anyhow!("Failed to open audio output: {}", e))?;
            // Otherwise the stream prints to stderr on drop, over the menu.
            stream.log_on_drop(false);
            let sink = Sink::connect_new(stream.mixer());
            sink.append(SamplesBuffer::new(
                buffer.channel_count(),
                buffer.sample_rate,
                buffer.interleaved(),
            ));
            Ok(Box::new(RodioSink {
                sink,
                _stream: stream,
            }))
        }
    }

    impl AudioSink for RodioSink {
        fn is_finished(&self) -> bool {
            self.sink.empty()
        }

        fn stop(&mut self) {
            self.sink.stop();
        }
    }
}
