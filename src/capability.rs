/// Speech capability abstraction
///
/// Defines the contract the engine requires from a platform's continuous
/// speech-recognition service, plus the result-batch data model delivered by
/// it. A deterministic scripted implementation is included for driving the
/// pipeline without a microphone.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Failed to start recognition: {0}")]
    StartFailed(String),

    #[error("Failed to stop recognition: {0}")]
    StopFailed(String),
}

/// One recognized alternative within a result batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedSegment {
    /// Recognized text for this alternative
    pub text: String,

    /// Whether the platform considers this text stable (won't be revised)
    pub is_final: bool,
}

impl RecognizedSegment {
    /// Create a finalized segment
    pub fn final_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_final: true,
        }
    }

    /// Create an interim (revisable) segment
    pub fn interim(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_final: false,
        }
    }
}

/// An ordered batch of recognition results
///
/// Platforms may re-deliver previously interim entries once finalized;
/// `start_index` marks which entries are new relative to prior deliveries,
/// so consumers never reprocess earlier positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBatch {
    /// Recognized alternatives in recognition order
    pub segments: Vec<RecognizedSegment>,

    /// First entry in `segments` that is new in this delivery
    pub start_index: usize,
}

impl ResultBatch {
    pub fn new(segments: Vec<RecognizedSegment>, start_index: usize) -> Self {
        Self {
            segments,
            start_index,
        }
    }

    /// Convenience constructor: a batch holding one finalized segment
    pub fn of_final(text: &str) -> Self {
        Self::new(vec![RecognizedSegment::final_text(text)], 0)
    }

    /// Concatenate the text of all finalized segments at or after
    /// `start_index`, in arrival order. Returns an empty string when the
    /// batch finalized nothing new.
    pub fn final_fragment(&self) -> String {
        self.segments
            .iter()
            .skip(self.start_index)
            .filter(|segment| segment.is_final)
            .map(|segment| segment.text.as_str())
            .collect()
    }
}

/// Event raised asynchronously by a speech capability
///
/// Events arrive in platform emission order. Every session terminates with
/// exactly one `End`, whether it was stopped explicitly, failed with an
/// error, or timed out on silence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityEvent {
    /// A chunk of audio was processed into a result batch
    Result(ResultBatch),

    /// The platform reported a recognition error code (e.g. "no-speech")
    Error { code: String },

    /// The recognition session terminated
    End,
}

/// Per-start platform options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Keep recognizing across pauses instead of stopping after one utterance
    pub continuous: bool,

    /// Deliver interim (revisable) results in addition to finalized ones
    pub interim_results: bool,
}

/// Contract required from a platform's continuous speech-recognition service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechCapability: Send + Sync {
    /// Begin continuous recognition
    async fn start(&self, opts: CaptureOptions) -> Result<(), CapabilityError>;

    /// End the current recognition session
    async fn stop(&self) -> Result<(), CapabilityError>;

    /// Whether the host provides this capability at all
    fn is_supported(&self) -> bool;
}

/// Stand-in for a host with no speech-recognition capability
///
/// All operations are no-ops; consumers observe the absence only through
/// `is_supported()`.
pub struct UnsupportedCapability;

#[async_trait]
impl SpeechCapability for UnsupportedCapability {
    async fn start(&self, _opts: CaptureOptions) -> Result<(), CapabilityError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), CapabilityError> {
        Ok(())
    }

    fn is_supported(&self) -> bool {
        false
    }
}

/// Deterministic capability that replays queued sessions of events
///
/// Each `start()` pops the next scripted session, delivers its events into
/// the channel and appends the mandatory `End`. Once the script is
/// exhausted the channel is closed so a driving loop can finish. `stop()`
/// acknowledges with an `End`, matching platform behavior.
pub struct ScriptedCapability {
    sessions: Mutex<VecDeque<Vec<CapabilityEvent>>>,
    tx: Mutex<Option<mpsc::UnboundedSender<CapabilityEvent>>>,
}

impl ScriptedCapability {
    /// Create a scripted capability and the receiver its events arrive on
    pub fn new(
        sessions: Vec<Vec<CapabilityEvent>>,
    ) -> (Self, mpsc::UnboundedReceiver<CapabilityEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let capability = Self {
            sessions: Mutex::new(sessions.into()),
            tx: Mutex::new(Some(tx)),
        };

        (capability, rx)
    }

    async fn send(&self, event: CapabilityEvent) {
        let tx = self.tx.lock().await;
        if let Some(tx) = tx.as_ref() {
            if tx.send(event).is_err() {
                warn!("Scripted event receiver dropped");
            }
        }
    }

    async fn close_channel(&self) {
        self.tx.lock().await.take();
        debug!("Session script exhausted, closing event channel");
    }
}

#[async_trait]
impl SpeechCapability for ScriptedCapability {
    async fn start(&self, _opts: CaptureOptions) -> Result<(), CapabilityError> {
        let next = self.sessions.lock().await.pop_front();

        match next {
            Some(events) => {
                debug!("Replaying scripted session: {} events", events.len());

                for event in events {
                    self.send(event).await;
                }
                self.send(CapabilityEvent::End).await;

                if self.sessions.lock().await.is_empty() {
                    self.close_channel().await;
                }
                Ok(())
            }
            None => {
                self.close_channel().await;
                Ok(())
            }
        }
    }

    async fn stop(&self) -> Result<(), CapabilityError> {
        self.send(CapabilityEvent::End).await;
        Ok(())
    }

    fn is_supported(&self) -> bool {
        true
    }
}
