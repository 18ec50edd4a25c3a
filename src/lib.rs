/// Wake-word gated continuous transcription engine
///
/// Gates a live speech transcript behind an optional wake word and keeps the
/// recognition session alive across platform-level interruptions.
/// Speech-to-text itself is delegated to an injected platform capability.

pub mod capability;
pub mod controller;
pub mod gate;
pub mod transcript;

// Re-export main types
pub use capability::{
    CapabilityError, CapabilityEvent, CaptureOptions, RecognizedSegment, ResultBatch,
    ScriptedCapability, SpeechCapability, UnsupportedCapability,
};
pub use controller::{
    ControllerConfig, ControllerError, ControllerEvent, ControllerStats, RecognitionController,
};
pub use gate::{GateDecision, GateState, WakeWordGate};
pub use transcript::TranscriptAccumulator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
