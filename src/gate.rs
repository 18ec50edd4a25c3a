/// Wake-word gate module
///
/// Two-state machine deciding whether recognized text may reach the
/// consumer. Arms one-shot when the configured wake word is heard; with no
/// wake word configured the gate starts armed and everything forwards.

use tracing::debug;

/// Gate state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Waiting for the wake word; fragments are discarded
    NotArmed,

    /// Wake word heard (or none configured); fragments forward
    Armed,
}

/// What the controller should do with an admitted fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Drop the fragment, no consumer activity
    Discard,

    /// Wake word detected: clear the transcript and emit one empty update
    Arm,

    /// Append the fragment to the transcript
    Forward,
}

/// Wake-word gate
///
/// Built fresh for every session; there is no re-arming mid-session.
pub struct WakeWordGate {
    wake_word: Option<String>,
    state: GateState,
}

impl WakeWordGate {
    /// Create a gate for one session
    ///
    /// The wake word is trimmed and lowercased; a blank wake word counts as
    /// absent and leaves the gate armed from the start.
    pub fn new(wake_word: Option<&str>) -> Self {
        let wake_word = wake_word
            .map(|word| word.trim().to_lowercase())
            .filter(|word| !word.is_empty());

        let state = if wake_word.is_none() {
            GateState::Armed
        } else {
            GateState::NotArmed
        };

        Self { wake_word, state }
    }

    /// Admit one finalized-text fragment and decide its fate
    pub fn admit(&mut self, fragment: &str) -> GateDecision {
        match self.state {
            GateState::Armed => GateDecision::Forward,

            GateState::NotArmed => {
                let heard = fragment.trim().to_lowercase();

                if let Some(word) = &self.wake_word {
                    if heard.contains(word.as_str()) {
                        self.state = GateState::Armed;
                        debug!("Gate: NotArmed -> Armed (wake word heard)");
                        return GateDecision::Arm;
                    }
                }

                GateDecision::Discard
            }
        }
    }

    /// Current gate state
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Whether fragments currently forward to the consumer
    pub fn is_armed(&self) -> bool {
        self.state == GateState::Armed
    }
}
