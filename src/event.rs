//! Application events for the tao event loop.

use crate::pipeline::Outcome;

/// A forwarded global key event.
#[derive(Debug, Clone, Copy)]
pub enum KeyInput {
    Press(rdev::Key),
    Release(rdev::Key),
}

/// Events for the tao event loop. Key events arrive from the listener
/// thread; outcomes arrive from the pipeline worker. Everything is handled
/// on the one event context that owns the session.
#[derive(Debug, Clone)]
pub enum SottoEvent {
    /// A global key press or release
    Key(KeyInput),
    /// The pipeline finished the in-flight session
    PipelineDone(Outcome),
}
