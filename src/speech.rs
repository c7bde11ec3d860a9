use thiserror::Error;

/// Failure modes of a speech capture session.
///
/// Transient errors end the current utterance but leave the session usable;
/// fatal ones require the caller to tear the session down.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("no speech detected")]
    NoMatch,

    #[error("microphone timed out waiting for speech")]
    SpeechTimeout,

    #[error("audio device unavailable")]
    AudioUnavailable,

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("recognition backend not available")]
    RecognizerUnavailable,

    #[error("recognition failed: {0}")]
    Recognition(String),
}

impl SpeechError {
    /// Whether the session must be torn down rather than re-listened.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AudioUnavailable | Self::PermissionDenied | Self::RecognizerUnavailable
        )
    }
}

/// Push-style observer of an in-progress recognition session.
pub trait TranscriptListener: Send {
    /// An updated partial hypothesis for the current utterance.
    fn on_partial(&mut self, text: &str);

    /// The final transcript for the utterance. Ends the utterance.
    fn on_final(&mut self, text: &str);

    fn on_error(&mut self, error: SpeechError);
}

/// A source of voice transcripts. Implementations wrap whatever recognition
/// engine the platform provides; the rest of the application only sees
/// transcripts through the listener.
pub trait SpeechCapture {
    /// Begin listening and deliver events to `listener` until stopped or a
    /// fatal error occurs.
    fn start(&mut self, listener: Box<dyn TranscriptListener>) -> Result<(), SpeechError>;

    /// Stop listening. The listener receives a final transcript for any
    /// utterance in progress.
    fn stop(&mut self);
}
