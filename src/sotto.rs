use anyhow::{Context, Result};
use arboard::Clipboard;
use enigo::Enigo;
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tray_icon::menu::{AboutMetadataBuilder, Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tray_icon::{TrayIcon, TrayIconBuilder, TrayIconEvent};

use sotto::complete::CompleteClient;
use sotto::config::ConfigManager;
use sotto::cue::{self, Cue};
use sotto::event::{KeyInput, SottoEvent};
use sotto::icon::Indicator;
use sotto::notify::{notify, preview, CONTEXT_PREVIEW_CHARS, TEXT_PREVIEW_CHARS};
use sotto::paste;
use sotto::pipeline::{Job, Outcome, Pipeline};
use sotto::record::{Recorder, RecordingHandle};
use sotto::session::{ActiveMode, Mode, Session};
use sotto::transcribe::TranscribeClient;
use sotto::{DEFAULT_LOG_LEVEL, VERSION};

fn main() -> Result<()> {
    // Initialize the logger
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SOTTO_LOG")
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .finish()
        .with(sotto::notify::NotificationLayer::new())
        .init();

    // Load config
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load()?;
    // save back the config to create the file if it doesn't exist
    config_manager.save(&config)?;

    // Resolve chords; a mode without credentials stays disabled (the
    // warnings surface as notifications).
    let hotkeys = config.hotkeys();
    let hotkey_legend = hotkeys.legend();
    let mut session = Session::new(hotkeys);

    // Set up recorder
    let recorder = Recorder::new();
    let mut active_recording: Option<RecordingHandle> = None;

    // Set up keyboard and clipboard interaction
    let mut enigo =
        Enigo::new(&enigo::Settings::default()).context("Failed to create keystroke injector")?;
    let mut clipboard = Clipboard::new()?;

    // Create the tray menu
    let tray_menu = Menu::new();
    let status_item = MenuItem::new(Indicator::Idle.status(), false, None);
    let icon_quit = MenuItem::new("Quit", true, None);
    let icon_copy_config = MenuItem::new("Copy config path", true, None);
    tray_menu.append_items(&[&MenuItem::new("Sotto", false, None), &status_item])?;
    tray_menu.append(&PredefinedMenuItem::separator())?;
    for line in &hotkey_legend {
        tray_menu.append(&MenuItem::new(line, false, None))?;
    }
    tray_menu.append_items(&[
        &PredefinedMenuItem::separator(),
        &PredefinedMenuItem::about(
            None,
            Some(
                AboutMetadataBuilder::new()
                    .version(Some(VERSION.to_owned()))
                    .build(),
            ),
        ),
        &icon_copy_config,
        &PredefinedMenuItem::separator(),
        &icon_quit,
    ])?;

    // Set up the event loop
    let mut icon_tray = None;

    let menu_channel = MenuEvent::receiver();
    let tray_channel = TrayIconEvent::receiver();

    let event_loop: EventLoop<SottoEvent> = EventLoopBuilder::with_user_event().build();

    // Global key listener: forwards every press/release into the loop so
    // all session transitions happen on this one context.
    spawn_key_listener(event_loop.create_proxy());

    // Network pipeline; absent along with the hotkeys when no key is set.
    let pipeline = match config.transcribe_config() {
        Some(transcribe) => Some(Pipeline::new(
            TranscribeClient::new(transcribe),
            config.complete_config().map(CompleteClient::new),
            event_loop.create_proxy(),
        )?),
        None => None,
    };

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        if let Event::NewEvents(StartCause::Init) = event {
            // We create the icon once the event loop is actually running
            // to prevent issues like https://github.com/tauri-apps/tray-icon/issues/90

            icon_tray.replace(
                TrayIconBuilder::new()
                    .with_menu(Box::new(tray_menu.clone()))
                    .with_tooltip("sotto - push-to-talk dictation")
                    .with_icon(Indicator::Idle.icon())
                    .build()
                    .unwrap(),
            );

            // We have to request a redraw here to have the icon actually show up.
            // Tao only exposes a redraw method on the Window so we use core-foundation directly.
            #[cfg(target_os = "macos")]
            unsafe {
                use core_foundation::runloop::{CFRunLoopGetMain, CFRunLoopWakeUp};

                let rl = CFRunLoopGetMain();
                CFRunLoopWakeUp(rl);
            }

            info!("Sotto ready");
        }

        if let Ok(event) = menu_channel.try_recv() {
            if event.id == icon_quit.id() {
                icon_tray.take();
                *control_flow = ControlFlow::Exit;
            } else if event.id == icon_copy_config.id() {
                if let Err(e) =
                    clipboard.set_text(config_manager.config_path().to_string_lossy().into_owned())
                {
                    error!("Failed to copy config path to clipboard: {}", e);
                }
            }
        }

        #[expect(clippy::redundant_pattern_matching)]
        if let Ok(_) = tray_channel.try_recv() {
            // Handle tray icon events
        }

        let Event::UserEvent(event) = event else {
            return;
        };

        match event {
            SottoEvent::Key(KeyInput::Press(key)) => {
                let Some(active) = session.on_press(key, &mut clipboard) else {
                    return;
                };
                let mode = active.mode();
                let (subtitle, body) = match active {
                    ActiveMode::Transcribe => (
                        "Recording",
                        "Speak now... Release the hotkey when done.".to_string(),
                    ),
                    ActiveMode::Augmented { context } => {
                        let shown = if context.is_empty() {
                            "(empty)".to_string()
                        } else {
                            preview(context, CONTEXT_PREVIEW_CHARS)
                        };
                        ("Recording (Assistant)", format!("Context: {}", shown))
                    }
                };

                match recorder.start() {
                    Ok(handle) => {
                        active_recording = Some(handle);
                        cue::play(Cue::RecordingStarted);
                        apply_indicator(&icon_tray, &status_item, Indicator::Recording(mode));
                        notify(subtitle, &body);
                    }
                    Err(e) => {
                        // CaptureError: abandon this session, keep running.
                        error!("Failed to start recording: {}", e);
                        session.cancel_recording();
                    }
                }
            }
            SottoEvent::Key(KeyInput::Release(key)) => {
                let Some(active) = session.on_release(key) else {
                    return;
                };
                let mode = active.mode();
                cue::play(Cue::RecordingStopped);
                apply_indicator(&icon_tray, &status_item, Indicator::Processing(mode));

                let finished = active_recording.take().map(|mut handle| handle.finish());
                let submitted = match finished {
                    Some(Ok(Some(recording))) => {
                        info!(
                            samples = recording.samples(),
                            length_seconds = recording.duration().as_secs_f64(),
                            "recording finished"
                        );
                        let job = Job {
                            mode: active,
                            wav: recording.into_wav(),
                        };
                        match pipeline.as_ref() {
                            Some(pipeline) => match pipeline.submit(job) {
                                Ok(()) => true,
                                Err(e) => {
                                    error!("Failed to submit audio to pipeline: {:?}", e);
                                    false
                                }
                            },
                            // Unreachable while hotkeys and pipeline are
                            // configured together, but never panic on it.
                            None => {
                                error!("No pipeline configured; dropping recording");
                                false
                            }
                        }
                    }
                    Some(Ok(None)) => {
                        notify("No Speech", "No speech detected");
                        false
                    }
                    Some(Err(e)) => {
                        error!("Failed to finish recording: {}", e);
                        false
                    }
                    None => {
                        warn!("Recording stopped but no capture stream was active");
                        false
                    }
                };

                if !submitted {
                    session.finish();
                    apply_indicator(&icon_tray, &status_item, Indicator::Idle);
                }
            }
            SottoEvent::PipelineDone(outcome) => {
                match outcome {
                    Outcome::Text { mode, text } => {
                        match paste::deliver(&mut clipboard, &mut enigo, &text) {
                            Ok(()) => {
                                let subtitle = match mode {
                                    Mode::Transcribe => "Typed",
                                    Mode::Augmented => "Assistant response",
                                };
                                notify(subtitle, &preview(&text, TEXT_PREVIEW_CHARS));
                            }
                            Err(e) => {
                                error!("Failed to deliver text: {}", e);
                            }
                        }
                    }
                    Outcome::NoSpeech => {
                        notify("No Speech", "No speech detected");
                    }
                    Outcome::Failed(message) => {
                        // Already bounded; the notification layer surfaces it.
                        error!("Session failed: {}", message);
                    }
                }
                session.finish();
                apply_indicator(&icon_tray, &status_item, Indicator::Idle);
            }
        }
    });
}

/// Update the tray icon and the status menu line together.
fn apply_indicator(tray: &Option<TrayIcon>, status_item: &MenuItem, indicator: Indicator) {
    if let Some(tray) = tray {
        if let Err(e) = tray.set_icon(Some(indicator.icon())) {
            warn!("Failed to update tray icon: {}", e);
        }
    }
    status_item.set_text(indicator.status());
}

/// Forward global key events into the event loop. The listener runs on its
/// own thread for the lifetime of the process.
fn spawn_key_listener(proxy: EventLoopProxy<SottoEvent>) {
    std::thread::spawn(move || {
        let result = rdev::listen(move |event| {
            let input = match event.event_type {
                rdev::EventType::KeyPress(key) => KeyInput::Press(key),
                rdev::EventType::KeyRelease(key) => KeyInput::Release(key),
                _ => return,
            };
            proxy.send_event(SottoEvent::Key(input)).ok();
        });
        if let Err(e) = result {
            error!(
                "Global key listener failed: {:?}. On macOS, grant accessibility \
                 permissions and restart.",
                e
            );
        }
    });
}
