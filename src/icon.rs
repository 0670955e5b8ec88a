//! Tray status indicator: one icon per session state, recolored from the
//! base asset at startup.

use std::path::Path;
use std::sync::LazyLock;

use crate::session::Mode;

const COLOR_RECORDING: (u8, u8, u8) = (220, 40, 40);
const COLOR_RECORDING_AUGMENTED: (u8, u8, u8) = (160, 60, 220);
const COLOR_PROCESSING: (u8, u8, u8) = (255, 190, 0);
pub const ICON_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/icon.png");

static ICON: LazyLock<tray_icon::Icon> = LazyLock::new(|| load_icon(ICON_PATH, None));
static ICON_RECORDING: LazyLock<tray_icon::Icon> =
    LazyLock::new(|| load_icon(ICON_PATH, Some(COLOR_RECORDING)));
static ICON_RECORDING_AUGMENTED: LazyLock<tray_icon::Icon> =
    LazyLock::new(|| load_icon(ICON_PATH, Some(COLOR_RECORDING_AUGMENTED)));
static ICON_PROCESSING: LazyLock<tray_icon::Icon> =
    LazyLock::new(|| load_icon(ICON_PATH, Some(COLOR_PROCESSING)));

/// What the tray reflects. Mirrors the session state one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Idle,
    Recording(Mode),
    Processing(Mode),
}

impl Indicator {
    pub fn icon(&self) -> tray_icon::Icon {
        match self {
            Indicator::Idle => ICON.clone(),
            Indicator::Recording(Mode::Transcribe) => ICON_RECORDING.clone(),
            Indicator::Recording(Mode::Augmented) => ICON_RECORDING_AUGMENTED.clone(),
            Indicator::Processing(_) => ICON_PROCESSING.clone(),
        }
    }

    /// Status line for the tray menu.
    pub fn status(&self) -> &'static str {
        match self {
            Indicator::Idle => "Status: Ready",
            Indicator::Recording(Mode::Transcribe) => "Status: Recording...",
            Indicator::Recording(Mode::Augmented) => "Status: Recording (Assistant)...",
            Indicator::Processing(Mode::Transcribe) => "Status: Transcribing...",
            Indicator::Processing(Mode::Augmented) => "Status: Asking assistant...",
        }
    }
}

fn load_icon(path: impl AsRef<Path>, recolor: Option<(u8, u8, u8)>) -> tray_icon::Icon {
    let (icon_rgba, icon_width, icon_height) = {
        let mut image = image::open(path)
            .expect("Failed to open icon path")
            .into_rgba8();

        if let Some((r, g, b)) = recolor {
            for pixel in image.pixels_mut() {
                pixel[0] = r;
                pixel[1] = g;
                pixel[2] = b;
            }
        }

        let (width, height) = image.dimensions();
        let rgba = image.into_raw();
        (rgba, width, height)
    };
    tray_icon::Icon::from_rgba(icon_rgba, icon_width, icon_height).expect("Failed to open icon")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines_distinguish_modes() {
        assert_ne!(
            Indicator::Recording(Mode::Transcribe).status(),
            Indicator::Recording(Mode::Augmented).status()
        );
        assert_ne!(
            Indicator::Processing(Mode::Transcribe).status(),
            Indicator::Processing(Mode::Augmented).status()
        );
        assert_eq!(Indicator::Idle.status(), "Status: Ready");
    }
}
