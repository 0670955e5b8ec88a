//! Final text delivery: clipboard write followed by a synthetic paste
//! keystroke into whatever has focus. Both must succeed; a failure is a
//! delivery error handled by the caller's notification path, never retried.

use std::thread::sleep;
use std::time::Duration;

use arboard::Clipboard;
use enigo::Enigo;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to set clipboard: {0}")]
    Clipboard(#[from] arboard::Error),

    #[error("failed to send paste keystroke: {0}")]
    Keystroke(#[from] enigo::InputError),
}

/// Place `text` verbatim on the clipboard, then paste it.
pub fn deliver(
    clipboard: &mut Clipboard,
    enigo: &mut Enigo,
    text: &str,
) -> Result<(), DeliveryError> {
    clipboard.set_text(text)?;
    paste(enigo)?;
    info!(chars = text.chars().count(), "Delivered text");
    Ok(())
}

fn paste(enigo: &mut Enigo) -> Result<(), enigo::InputError> {
    use enigo::Direction::{Click, Press, Release};
    use enigo::{Key, Keyboard};

    #[cfg(target_os = "macos")]
    let paste_modifier = Key::Meta;
    #[cfg(not(target_os = "macos"))]
    let paste_modifier = Key::Control;

    const SLEEP_TIME: Duration = Duration::from_millis(10);
    enigo.key(paste_modifier, Press)?;
    sleep(SLEEP_TIME);
    enigo.key(Key::Unicode('v'), Click)?;
    sleep(SLEEP_TIME);
    enigo.key(paste_modifier, Release)?;

    Ok(())
}
