/// Recognition controller module
///
/// Owns the listening session lifecycle: wires capability events through the
/// wake-word gate and transcript accumulator, applies the synthetic stop on
/// platform errors, and restarts the capability on unexpected termination.

use crate::capability::{
    CapabilityError, CapabilityEvent, CaptureOptions, ResultBatch, SpeechCapability,
};
use crate::gate::{GateDecision, WakeWordGate};
use crate::transcript::TranscriptAccumulator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, trace, warn};

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),
}

/// Immutable per-session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Phrase that must be heard before the transcript forwards; absent or
    /// blank means everything forwards from the start
    pub wake_word: Option<String>,

    /// Keep recognizing across pauses instead of stopping after one utterance
    pub continuous: bool,

    /// Ask the platform for interim (revisable) results as well
    pub interim_results: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            wake_word: None,
            continuous: true,
            interim_results: true,
        }
    }
}

impl ControllerConfig {
    fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            continuous: self.continuous,
            interim_results: self.interim_results,
        }
    }
}

/// Update surfaced to the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Full cumulative transcript after an append, or "" on the arm reset
    Transcript(String),

    /// Listening state changed
    Listening(bool),
}

/// Per-session mutable state, owned exclusively by the controller
struct SessionState {
    is_listening: bool,
    gate: WakeWordGate,
    accumulator: TranscriptAccumulator,
    batches_processed: u64,
    restarts: u64,
}

impl SessionState {
    fn new(wake_word: Option<&str>) -> Self {
        Self {
            is_listening: false,
            gate: WakeWordGate::new(wake_word),
            accumulator: TranscriptAccumulator::new(),
            batches_processed: 0,
            restarts: 0,
        }
    }
}

/// Recognition controller
///
/// One capability instance per controller; the controller is the sole
/// mutator of session state.
pub struct RecognitionController {
    config: ControllerConfig,
    capability: Arc<dyn SpeechCapability>,
    state: Arc<RwLock<SessionState>>,
    event_tx: mpsc::UnboundedSender<ControllerEvent>,
    event_rx: Arc<RwLock<mpsc::UnboundedReceiver<ControllerEvent>>>,
}

impl RecognitionController {
    /// Create a controller around an injected speech capability
    pub fn new(config: ControllerConfig, capability: Arc<dyn SpeechCapability>) -> Self {
        info!("Initializing recognition controller");
        match &config.wake_word {
            Some(word) => info!("Wake word: {:?}", word),
            None => info!("No wake word configured, transcript forwards immediately"),
        }
        if !capability.is_supported() {
            warn!("Speech capability unavailable on this host, all operations are no-ops");
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = SessionState::new(config.wake_word.as_deref());

        Self {
            config,
            capability,
            state: Arc::new(RwLock::new(state)),
            event_tx,
            event_rx: Arc::new(RwLock::new(event_rx)),
        }
    }

    /// Begin a new listening session
    ///
    /// No-op when the capability is unsupported or a session is already
    /// live. Safe to call immediately after `stop_listening`.
    pub async fn start_listening(&self) -> Result<(), ControllerError> {
        if !self.capability.is_supported() {
            debug!("Ignoring start: capability unsupported");
            return Ok(());
        }

        let mut state = self.state.write().await;

        if state.is_listening {
            warn!("Controller already listening");
            return Ok(());
        }

        // Fresh session: re-arm the gate per configuration, drop any
        // transcript left over from the previous session
        state.gate = WakeWordGate::new(self.config.wake_word.as_deref());
        state.accumulator.clear();
        state.batches_processed = 0;
        state.restarts = 0;

        self.capability.start(self.config.capture_options()).await?;

        state.is_listening = true;
        self.emit(ControllerEvent::Listening(true));
        info!("Listening started");

        Ok(())
    }

    /// End the current listening session
    ///
    /// No-op when not listening. The listening flag is cleared strictly
    /// before the capability stop so the trailing `End` event observes a
    /// non-listening controller and never triggers a restart.
    pub async fn stop_listening(&self) -> Result<(), ControllerError> {
        {
            let mut state = self.state.write().await;

            if !state.is_listening {
                debug!("Controller not listening");
                return Ok(());
            }

            state.is_listening = false;
        }

        self.emit(ControllerEvent::Listening(false));
        self.capability.stop().await?;
        info!("Listening stopped");

        Ok(())
    }

    /// Dispatch one capability event
    ///
    /// Events must be fed in platform emission order.
    pub async fn process_event(&self, event: CapabilityEvent) {
        match event {
            CapabilityEvent::Result(batch) => self.handle_result(batch).await,
            CapabilityEvent::Error { code } => self.handle_error(&code).await,
            CapabilityEvent::End => self.handle_end().await,
        }
    }

    /// Drain a capability event stream until it closes
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<CapabilityEvent>) {
        while let Some(event) = events.recv().await {
            self.process_event(event).await;
        }
        debug!("Capability event channel closed");
    }

    async fn handle_result(&self, batch: ResultBatch) {
        let mut state = self.state.write().await;

        if !state.is_listening {
            debug!("Dropping result batch: not listening");
            return;
        }

        state.batches_processed += 1;

        let fragment = batch.final_fragment();
        if fragment.is_empty() {
            trace!("Batch finalized nothing new");
            return;
        }

        match state.gate.admit(&fragment) {
            GateDecision::Discard => {
                debug!("Discarding fragment while waiting for wake word");
            }
            GateDecision::Arm => {
                // The wake phrase itself never reaches the consumer: the
                // transcript resets and exactly one empty update goes out
                state.accumulator.clear();
                self.emit(ControllerEvent::Transcript(String::new()));
                info!("Wake word heard, transcript armed");
            }
            GateDecision::Forward => {
                let full = state.accumulator.append(&fragment).to_string();
                self.emit(ControllerEvent::Transcript(full));
            }
        }
    }

    async fn handle_error(&self, code: &str) {
        error!("Recognition error from platform: {}", code);

        let mut state = self.state.write().await;

        // Synthetic stop: the platform is already tearing the session down,
        // clearing the flag here suppresses the restart on the trailing End
        if state.is_listening {
            state.is_listening = false;
            self.emit(ControllerEvent::Listening(false));
        }
    }

    async fn handle_end(&self) {
        let mut state = self.state.write().await;

        if !state.is_listening {
            debug!("Recognition session ended");
            return;
        }

        // Unexpected termination (e.g. platform silence timeout): restart
        // immediately and continue the same logical session. No retry cap,
        // no backoff.
        info!("Recognition ended unexpectedly, restarting");

        match self.capability.start(self.config.capture_options()).await {
            Ok(()) => {
                state.restarts += 1;
            }
            Err(e) => {
                error!("Failed to restart recognition: {}", e);
                state.is_listening = false;
                self.emit(ControllerEvent::Listening(false));
            }
        }
    }

    fn emit(&self, event: ControllerEvent) {
        if self.event_tx.send(event).is_err() {
            warn!("Controller event receiver dropped");
        }
    }

    /// Get the next consumer update (non-blocking)
    pub async fn try_recv_event(&self) -> Option<ControllerEvent> {
        let mut rx = self.event_rx.write().await;
        rx.try_recv().ok()
    }

    /// Get the next consumer update (blocking)
    pub async fn recv_event(&self) -> Option<ControllerEvent> {
        let mut rx = self.event_rx.write().await;
        rx.recv().await
    }

    /// Whether a session is currently live
    pub async fn is_listening(&self) -> bool {
        self.state.read().await.is_listening
    }

    /// Current cumulative transcript
    pub async fn transcript(&self) -> String {
        self.state.read().await.accumulator.transcript().to_string()
    }

    /// Whether the host provides a speech capability at all
    pub fn is_supported(&self) -> bool {
        self.capability.is_supported()
    }

    /// Snapshot of session statistics
    pub async fn stats(&self) -> ControllerStats {
        let state = self.state.read().await;

        ControllerStats {
            is_listening: state.is_listening,
            is_armed: state.gate.is_armed(),
            transcript_len: state.accumulator.transcript().len(),
            batches_processed: state.batches_processed,
            restarts: state.restarts,
        }
    }
}

/// Session statistics
#[derive(Debug, Clone)]
pub struct ControllerStats {
    pub is_listening: bool,
    pub is_armed: bool,
    pub transcript_len: usize,
    pub batches_processed: u64,
    pub restarts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::MockSpeechCapability;

    fn supported_mock() -> MockSpeechCapability {
        let mut mock = MockSpeechCapability::new();
        mock.expect_is_supported().return_const(true);
        mock
    }

    async fn drain(controller: &RecognitionController) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        while let Some(event) = controller.try_recv_event().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let mut mock = supported_mock();
        mock.expect_start().times(1).returning(|_| Ok(()));

        let controller =
            RecognitionController::new(ControllerConfig::default(), Arc::new(mock));

        controller.start_listening().await.unwrap();
        controller.start_listening().await.unwrap();

        assert!(controller.is_listening().await);
        assert_eq!(
            drain(&controller).await,
            vec![ControllerEvent::Listening(true)]
        );
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut mock = supported_mock();
        mock.expect_start().times(1).returning(|_| Ok(()));
        mock.expect_stop().times(1).returning(|| Ok(()));

        let controller =
            RecognitionController::new(ControllerConfig::default(), Arc::new(mock));

        controller.start_listening().await.unwrap();
        controller.stop_listening().await.unwrap();
        controller.stop_listening().await.unwrap();

        assert!(!controller.is_listening().await);
        assert_eq!(
            drain(&controller).await,
            vec![
                ControllerEvent::Listening(true),
                ControllerEvent::Listening(false),
            ]
        );
    }

    #[tokio::test]
    async fn test_unsupported_operations_are_noops() {
        let mut mock = MockSpeechCapability::new();
        mock.expect_is_supported().return_const(false);
        // start()/stop() must never reach the capability

        let controller =
            RecognitionController::new(ControllerConfig::default(), Arc::new(mock));

        assert!(!controller.is_supported());

        controller.start_listening().await.unwrap();
        assert!(!controller.is_listening().await);

        controller.stop_listening().await.unwrap();
        assert!(drain(&controller).await.is_empty());
    }

    #[tokio::test]
    async fn test_passes_capture_options_from_config() {
        let mut mock = supported_mock();
        mock.expect_start()
            .withf(|opts| opts.continuous && !opts.interim_results)
            .times(1)
            .returning(|_| Ok(()));

        let config = ControllerConfig {
            interim_results: false,
            ..Default::default()
        };
        let controller = RecognitionController::new(config, Arc::new(mock));

        controller.start_listening().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_on_unexpected_end() {
        let mut mock = supported_mock();
        mock.expect_start().times(2).returning(|_| Ok(()));

        let controller =
            RecognitionController::new(ControllerConfig::default(), Arc::new(mock));

        controller.start_listening().await.unwrap();
        controller.process_event(CapabilityEvent::End).await;

        assert!(controller.is_listening().await);
        assert_eq!(controller.stats().await.restarts, 1);
        // No extra Listening event: the logical session never ended
        assert_eq!(
            drain(&controller).await,
            vec![ControllerEvent::Listening(true)]
        );
    }

    #[tokio::test]
    async fn test_no_restart_after_explicit_stop() {
        let mut mock = supported_mock();
        mock.expect_start().times(1).returning(|_| Ok(()));
        mock.expect_stop().times(1).returning(|| Ok(()));

        let controller =
            RecognitionController::new(ControllerConfig::default(), Arc::new(mock));

        controller.start_listening().await.unwrap();
        controller.stop_listening().await.unwrap();
        controller.process_event(CapabilityEvent::End).await;

        assert!(!controller.is_listening().await);
        assert_eq!(controller.stats().await.restarts, 0);
    }

    #[tokio::test]
    async fn test_error_suppresses_restart() {
        let mut mock = supported_mock();
        mock.expect_start().times(1).returning(|_| Ok(()));

        let controller =
            RecognitionController::new(ControllerConfig::default(), Arc::new(mock));

        controller.start_listening().await.unwrap();
        controller
            .process_event(CapabilityEvent::Error {
                code: "no-speech".to_string(),
            })
            .await;
        controller.process_event(CapabilityEvent::End).await;

        assert!(!controller.is_listening().await);
        assert_eq!(
            drain(&controller).await,
            vec![
                ControllerEvent::Listening(true),
                ControllerEvent::Listening(false),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_restart_stops_listening() {
        let mut mock = supported_mock();
        let mut starts = 0;
        mock.expect_start().times(2).returning(move |_| {
            starts += 1;
            if starts == 1 {
                Ok(())
            } else {
                Err(CapabilityError::StartFailed("microphone gone".to_string()))
            }
        });

        let controller =
            RecognitionController::new(ControllerConfig::default(), Arc::new(mock));

        controller.start_listening().await.unwrap();
        controller.process_event(CapabilityEvent::End).await;

        assert!(!controller.is_listening().await);
        assert_eq!(controller.stats().await.restarts, 0);
        assert_eq!(
            drain(&controller).await,
            vec![
                ControllerEvent::Listening(true),
                ControllerEvent::Listening(false),
            ]
        );
    }

    #[tokio::test]
    async fn test_batches_ignored_when_not_listening() {
        let mock = supported_mock();

        let controller =
            RecognitionController::new(ControllerConfig::default(), Arc::new(mock));

        controller
            .process_event(CapabilityEvent::Result(ResultBatch::of_final("stray")))
            .await;

        assert_eq!(controller.transcript().await, "");
        assert!(drain(&controller).await.is_empty());
    }

    #[tokio::test]
    async fn test_interim_only_batches_emit_nothing() {
        let mut mock = supported_mock();
        mock.expect_start().times(1).returning(|_| Ok(()));

        let controller =
            RecognitionController::new(ControllerConfig::default(), Arc::new(mock));

        controller.start_listening().await.unwrap();
        controller
            .process_event(CapabilityEvent::Result(ResultBatch::new(
                vec![crate::capability::RecognizedSegment::interim("still talk")],
                0,
            )))
            .await;

        assert_eq!(
            drain(&controller).await,
            vec![ControllerEvent::Listening(true)]
        );
    }

    #[tokio::test]
    async fn test_new_session_after_stop_resets_transcript() {
        let mut mock = supported_mock();
        mock.expect_start().times(2).returning(|_| Ok(()));
        mock.expect_stop().times(1).returning(|| Ok(()));

        let controller =
            RecognitionController::new(ControllerConfig::default(), Arc::new(mock));

        controller.start_listening().await.unwrap();
        controller
            .process_event(CapabilityEvent::Result(ResultBatch::of_final("old words")))
            .await;
        controller.stop_listening().await.unwrap();
        controller.process_event(CapabilityEvent::End).await;

        controller.start_listening().await.unwrap();
        assert_eq!(controller.transcript().await, "");
        assert!(controller.is_listening().await);
    }
}
