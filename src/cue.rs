//! Audible start/stop cues.
//!
//! Fire-and-forget system sound playback on a throwaway thread. A missing
//! player or sound never aborts anything.

/// The two cues a session emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    RecordingStarted,
    RecordingStopped,
}

#[cfg(target_os = "macos")]
pub fn play(cue: Cue) {
    let sound = match cue {
        Cue::RecordingStarted => "/System/Library/Sounds/Tink.aiff",
        Cue::RecordingStopped => "/System/Library/Sounds/Pop.aiff",
    };
    std::thread::spawn(move || {
        let _ = std::process::Command::new("afplay").arg(sound).spawn();
    });
}

#[cfg(target_os = "windows")]
pub fn play(cue: Cue) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x08000000;

    let beep = match cue {
        Cue::RecordingStarted => "[console]::beep(800, 100)",
        Cue::RecordingStopped => "[console]::beep(600, 100)",
    };
    std::thread::spawn(move || {
        let _ = std::process::Command::new("powershell")
            .args(["-c", beep])
            .creation_flags(CREATE_NO_WINDOW)
            .spawn();
    });
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub fn play(_cue: Cue) {
    // No portable system sound; the tray icon still signals state.
}
