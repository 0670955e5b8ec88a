//! The recording session state machine.
//!
//! There is exactly one session, owned by the event loop. It moves
//! Idle -> Recording(mode) -> Processing(mode) -> Idle and nothing else. The
//! machine decides transitions; all side effects (stream start/stop, cues,
//! icons, pipeline handoff) belong to the caller so they stay on the event
//! context and happen in a fixed order.
//!
//! Push-to-talk: releasing any single member of the chord that started the
//! session stops recording. Releasing keys of other chords, or unrelated
//! keys, never does.

use tracing::{debug, warn};

use crate::chord::{normalize, Chord, KeyTracker};

/// Which pipeline a session runs. Closed set; `Augmented` carries the text
/// snapshot taken at activation as a per-variant field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Transcribe,
    Augmented,
}

/// A running session's mode plus the data captured when it activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveMode {
    Transcribe,
    Augmented { context: String },
}

impl ActiveMode {
    pub fn mode(&self) -> Mode {
        match self {
            ActiveMode::Transcribe => Mode::Transcribe,
            ActiveMode::Augmented { .. } => Mode::Augmented,
        }
    }
}

/// Source of the ambient text captured at augmented-mode activation
/// (the system clipboard in production). Must not block indefinitely;
/// failure degrades to an empty string inside the implementation.
pub trait ContextSource {
    fn capture(&mut self) -> String;
}

impl ContextSource for arboard::Clipboard {
    fn capture(&mut self) -> String {
        match self.get_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read clipboard context: {}", e);
                String::new()
            }
        }
    }
}

/// The configured chords. A mode whose credentials were missing at startup
/// has no chord here and can never activate.
#[derive(Debug, Clone, Default)]
pub struct Hotkeys {
    pub transcribe: Option<Chord>,
    pub augmented: Option<Chord>,
}

impl Hotkeys {
    fn chord_for(&self, mode: Mode) -> Option<&Chord> {
        match mode {
            Mode::Transcribe => self.transcribe.as_ref(),
            Mode::Augmented => self.augmented.as_ref(),
        }
    }

    /// Display lines for the tray menu, one per enabled mode.
    pub fn legend(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(chord) = &self.transcribe {
            lines.push(format!("{}: Transcribe", chord));
        }
        if let Some(chord) = &self.augmented {
            lines.push(format!("{}: Ask assistant", chord));
        }
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording(ActiveMode),
    Processing(Mode),
}

/// The single recording/processing session and the pressed-key set feeding
/// it. Only the event context calls into this.
pub struct Session {
    tracker: KeyTracker,
    hotkeys: Hotkeys,
    state: SessionState,
}

impl Session {
    pub fn new(hotkeys: Hotkeys) -> Self {
        Self {
            tracker: KeyTracker::new(),
            hotkeys,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    /// Handle a key press. Returns the newly activated mode when this press
    /// completed a configured chord while idle; the caller then starts the
    /// stream, cue, indicator and notification, in that order.
    ///
    /// Modes are evaluated in fixed priority order (transcribe first) so
    /// overlapping chords activate at most one. While a session is active,
    /// chord matches are ignored entirely.
    pub fn on_press(
        &mut self,
        key: rdev::Key,
        context: &mut dyn ContextSource,
    ) -> Option<&ActiveMode> {
        self.tracker.press(key);

        if self.state != SessionState::Idle {
            return None;
        }

        let active = if self
            .hotkeys
            .transcribe
            .as_ref()
            .is_some_and(|c| self.tracker.is_satisfied(c))
        {
            ActiveMode::Transcribe
        } else if self
            .hotkeys
            .augmented
            .as_ref()
            .is_some_and(|c| self.tracker.is_satisfied(c))
        {
            // Snapshot the context now, before the stream starts. An empty
            // capture is fine; the pipeline just omits the context block.
            ActiveMode::Augmented {
                context: context.capture(),
            }
        } else {
            return None;
        };

        debug!(mode = ?active.mode(), "Chord recognized, starting session");
        self.state = SessionState::Recording(active);
        match &self.state {
            SessionState::Recording(active) => Some(active),
            _ => unreachable!(),
        }
    }

    /// Handle a key release. Returns the active mode (with its captured
    /// context) when this release stops the recording; ownership moves to
    /// the caller for the pipeline handoff and the session sits in
    /// Processing until [`Session::finish`].
    pub fn on_release(&mut self, key: rdev::Key) -> Option<ActiveMode> {
        let stops = match (&self.state, normalize(key)) {
            (SessionState::Recording(active), Some(released)) => self
                .hotkeys
                .chord_for(active.mode())
                .is_some_and(|chord| chord.contains(released)),
            _ => false,
        };

        self.tracker.release(key);

        if !stops {
            return None;
        }

        let mode = match &self.state {
            SessionState::Recording(active) => active.mode(),
            _ => unreachable!(),
        };
        match std::mem::replace(&mut self.state, SessionState::Processing(mode)) {
            SessionState::Recording(active) => {
                debug!(mode = ?mode, "Chord member released, stopping recording");
                Some(active)
            }
            _ => unreachable!(),
        }
    }

    /// Roll back a Recording session whose capture stream failed to start.
    pub fn cancel_recording(&mut self) {
        if matches!(self.state, SessionState::Recording(_)) {
            self.state = SessionState::Idle;
        }
    }

    /// Processing -> Idle, unconditionally. Also used for the zero-frame
    /// short circuit where no pipeline job was ever submitted.
    pub fn finish(&mut self) {
        self.state = SessionState::Idle;
    }
}
