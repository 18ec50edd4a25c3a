/// Transcript accumulator module
///
/// Holds the running transcript for one session. The transcript only grows;
/// the sole reset is the clear performed when the wake-word gate arms.

use tracing::{debug, trace};

/// Running transcript for one listening session
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    transcript: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalized fragment and return the full cumulative transcript
    ///
    /// Fragments are concatenated as delivered; the capability owns spacing.
    pub fn append(&mut self, fragment: &str) -> &str {
        self.transcript.push_str(fragment);
        trace!(
            "Appended {} chars, transcript now {} chars",
            fragment.len(),
            self.transcript.len()
        );
        &self.transcript
    }

    /// Reset the transcript to the empty string
    pub fn clear(&mut self) {
        self.transcript.clear();
        debug!("Transcript cleared");
    }

    /// Current cumulative transcript
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }
}
