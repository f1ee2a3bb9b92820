use async_trait::async_trait;
use std::fmt;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{FlowError, Result};

pub const DEFAULT_MIME_TYPE: &str = "audio/webm";

/// Opaque handle to a finished recording
#[derive(Clone)]
pub struct AudioArtifact {
    pub id: Uuid,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub duration: Duration,
}

impl AudioArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for AudioArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioArtifact")
            .field("id", &self.id)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .field("duration", &self.duration)
            .finish()
    }
}

/// Platform audio input consumed by a recording session.
///
/// Implementations report any failure to obtain or keep the input as
/// [`FlowError::CaptureUnavailable`].
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Obtain the input stream (microphone permission and device)
    async fn acquire(&mut self) -> Result<()>;

    async fn start(&mut self) -> Result<()>;

    async fn pause(&mut self) -> Result<()>;

    async fn resume(&mut self) -> Result<()>;

    /// Finish recording and hand over what was captured
    async fn stop(&mut self) -> Result<AudioArtifact>;

    /// Give the input back; safe to call more than once
    async fn release(&mut self);
}

/// Capture fed with chunks pushed by the caller.
///
/// This is the served setup: the browser's recorder produces the audio and the
/// client uploads it, so "recording" is collecting the uploaded chunks.
#[derive(Debug, Default)]
pub struct BufferedCapture {
    mime_type: Option<String>,
    chunks: Vec<Vec<u8>>,
    acquired: bool,
    started_at: Option<Instant>,
    recorded: Duration,
}

impl BufferedCapture {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            ..Self::default()
        }
    }

    /// A capture whose whole recording was uploaded up front
    pub fn preloaded(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let mut capture = Self::new(mime_type);
        capture.chunks.push(bytes);
        capture
    }

    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    fn bank_elapsed(&mut self) {
        if let Some(started) = self.started_at.take() {
            self.recorded += started.elapsed();
        }
    }
}

#[async_trait]
impl AudioCapture for BufferedCapture {
    async fn acquire(&mut self) -> Result<()> {
        self.acquired = true;
        Ok(())
    }

    async fn start(&mut self) -> Result<()> {
        if !self.acquired {
            return Err(FlowError::CaptureUnavailable(
                "audio input was not acquired".to_string(),
            ));
        }
        self.recorded = Duration::ZERO;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.bank_elapsed();
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        self.started_at = Some(Instant::now());
        Ok(())
    }

    async fn stop(&mut self) -> Result<AudioArtifact> {
        self.bank_elapsed();
        let bytes = std::mem::take(&mut self.chunks).concat();
        if bytes.is_empty() {
            warn!("Recording stopped without any audio");
            return Err(FlowError::CaptureUnavailable(
                "no audio was captured".to_string(),
            ));
        }

        let artifact = AudioArtifact {
            id: Uuid::new_v4(),
            mime_type: self
                .mime_type
                .clone()
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            bytes,
            duration: self.recorded,
        };
        debug!(artifact = ?artifact, "Recording stopped");
        Ok(artifact)
    }

    async fn release(&mut self) {
        self.acquired = false;
        self.started_at = None;
    }
}
