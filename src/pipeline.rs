//! Transcription/completion pipeline.
//!
//! Runs on its own tokio runtime so the event context never waits on the
//! network. A job owns the session's audio and captured context exclusively
//! from handoff until the outcome is posted back to the event loop; the
//! single-session invariant means at most one job is ever in flight.

use tao::event_loop::EventLoopProxy;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::complete::{CompleteClient, Completer};
use crate::event::SottoEvent;
use crate::notify::{preview, ERROR_PREVIEW_CHARS};
use crate::session::{ActiveMode, Mode};
use crate::transcribe::{TranscribeClient, Transcriber};

/// Everything a worker needs, moved out of the session at handoff.
#[derive(Debug)]
pub struct Job {
    pub mode: ActiveMode,
    pub wav: Vec<u8>,
}

/// Terminal result of a session's pipeline run. Exactly one of these is
/// posted per submitted job, and the session resets on every variant.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Final text ready for delivery.
    Text { mode: Mode, text: String },
    /// The transcript was empty after trimming.
    NoSpeech,
    /// Something failed; the message is already bounded for display.
    Failed(String),
}

type JobTask = tokio::task::JoinHandle<Outcome>;

/// Owns the runtime and the clients. Submission is non-blocking.
pub struct Pipeline {
    runtime: Runtime,
    transcriber: TranscribeClient,
    completer: Option<CompleteClient>,
    jobs: mpsc::UnboundedSender<JobTask>,
}

impl Pipeline {
    pub fn new(
        transcriber: TranscribeClient,
        completer: Option<CompleteClient>,
        event_sender: EventLoopProxy<SottoEvent>,
    ) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let jobs = start_outcome_collector(&runtime, event_sender);

        Ok(Self {
            runtime,
            transcriber,
            completer,
            jobs,
        })
    }

    /// Submit a finished recording. Returns immediately; the outcome comes
    /// back to the event loop as [`SottoEvent::PipelineDone`].
    pub fn submit(&self, job: Job) -> anyhow::Result<()> {
        info!(
            mode = ?job.mode.mode(),
            bytes = job.wav.len(),
            "audio submitted"
        );

        let transcriber = self.transcriber.clone();
        let completer = self.completer.clone();
        let handle = self.runtime.spawn(run_job(transcriber, completer, job));
        self.jobs.send(handle)?;
        Ok(())
    }
}

async fn run_job<T, C>(transcriber: T, completer: Option<C>, job: Job) -> Outcome
where
    T: Transcriber,
    C: Completer,
{
    let mode = job.mode.mode();

    let transcript = match transcriber.transcribe(job.wav).await {
        Ok(text) => text.trim().to_string(),
        Err(e) => return Outcome::Failed(preview(&e.to_string(), ERROR_PREVIEW_CHARS)),
    };

    if transcript.is_empty() {
        return Outcome::NoSpeech;
    }
    info!(chars = transcript.len(), "transcription completed");

    match job.mode {
        ActiveMode::Transcribe => Outcome::Text {
            mode,
            text: transcript,
        },
        ActiveMode::Augmented { context } => {
            // The mode cannot activate without completion credentials, so
            // this is only reachable with a client present.
            let Some(completer) = completer else {
                return Outcome::Failed("assistant mode is not configured".to_string());
            };
            match completer.complete(&context, &transcript).await {
                Ok(text) => Outcome::Text { mode, text },
                Err(e) => Outcome::Failed(preview(&e.to_string(), ERROR_PREVIEW_CHARS)),
            }
        }
    }
}

fn start_outcome_collector(
    runtime: &Runtime,
    event_sender: EventLoopProxy<SottoEvent>,
) -> mpsc::UnboundedSender<JobTask> {
    let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<JobTask>();

    runtime.spawn(async move {
        while let Some(task) = task_receiver.recv().await {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Error joining pipeline worker: {:?}", e);
                    Outcome::Failed("internal pipeline error".to_string())
                }
            };
            event_sender
                .send_event(SottoEvent::PipelineDone(outcome))
                .ok();
        }

        error!("Outcome collector task ended unexpectedly");
    });

    task_sender
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::complete::{self, CompleteError};
    use crate::transcribe::{self, TranscribeError};

    struct FakeTranscriber {
        reply: Mutex<Option<transcribe::Result<String>>>,
    }

    impl FakeTranscriber {
        fn ok(text: &str) -> Self {
            Self {
                reply: Mutex::new(Some(Ok(text.to_string()))),
            }
        }

        fn err(error: TranscribeError) -> Self {
            Self {
                reply: Mutex::new(Some(Err(error))),
            }
        }
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, _audio: Vec<u8>) -> transcribe::Result<String> {
            self.reply.lock().take().expect("transcribed more than once")
        }
    }

    struct FakeCompleter {
        reply: Mutex<Option<complete::Result<String>>>,
        seen: Arc<Mutex<Option<(String, String)>>>,
    }

    impl FakeCompleter {
        fn ok(text: &str) -> Self {
            Self {
                reply: Mutex::new(Some(Ok(text.to_string()))),
                seen: Arc::default(),
            }
        }

        fn err(error: CompleteError) -> Self {
            Self {
                reply: Mutex::new(Some(Err(error))),
                seen: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl Completer for FakeCompleter {
        async fn complete(&self, context: &str, instruction: &str) -> complete::Result<String> {
            *self.seen.lock() = Some((context.to_string(), instruction.to_string()));
            self.reply.lock().take().expect("completed more than once")
        }
    }

    fn transcribe_job() -> Job {
        Job {
            mode: ActiveMode::Transcribe,
            wav: vec![0u8; 44],
        }
    }

    fn augmented_job(context: &str) -> Job {
        Job {
            mode: ActiveMode::Augmented {
                context: context.to_string(),
            },
            wav: vec![0u8; 44],
        }
    }

    #[tokio::test]
    async fn test_whitespace_only_transcript_is_no_speech() {
        let transcriber = FakeTranscriber::ok("  \n\t ");
        let outcome = run_job(transcriber, None::<FakeCompleter>, transcribe_job()).await;
        assert!(matches!(outcome, Outcome::NoSpeech));
    }

    #[tokio::test]
    async fn test_transcript_is_trimmed_before_delivery() {
        let transcriber = FakeTranscriber::ok("  hello world \n");
        let outcome = run_job(transcriber, None::<FakeCompleter>, transcribe_job()).await;
        match outcome {
            Outcome::Text { mode, text } => {
                assert_eq!(mode, Mode::Transcribe);
                assert_eq!(text, "hello world");
            }
            other => panic!("expected text outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transcription_error_is_bounded_failure() {
        let transcriber = FakeTranscriber::err(TranscribeError::ApiError("x".repeat(300)));
        let outcome = run_job(transcriber, None::<FakeCompleter>, transcribe_job()).await;
        match outcome {
            Outcome::Failed(message) => {
                assert!(message.chars().count() <= ERROR_PREVIEW_CHARS + 3);
                assert!(message.ends_with("..."));
            }
            other => panic!("expected failure outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_augmented_dispatches_context_and_transcript() {
        let transcriber = FakeTranscriber::ok(" make it shorter ");
        let completer = FakeCompleter::ok("done");
        let seen = completer.seen.clone();
        let outcome = run_job(transcriber, Some(completer), augmented_job("fn main() {}")).await;
        match outcome {
            Outcome::Text { mode, text } => {
                assert_eq!(mode, Mode::Augmented);
                assert_eq!(text, "done");
            }
            other => panic!("expected text outcome, got {:?}", other),
        }
        let seen = seen.lock().take().unwrap();
        assert_eq!(seen.0, "fn main() {}");
        // The instruction is the trimmed transcript.
        assert_eq!(seen.1, "make it shorter");
    }

    #[tokio::test]
    async fn test_completion_error_is_bounded_failure() {
        let transcriber = FakeTranscriber::ok("summarize this");
        let completer = FakeCompleter::err(CompleteError::ApiError("y".repeat(300)));
        let outcome = run_job(transcriber, Some(completer), augmented_job("context")).await;
        match outcome {
            Outcome::Failed(message) => {
                assert!(message.chars().count() <= ERROR_PREVIEW_CHARS + 3);
            }
            other => panic!("expected failure outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_augmented_without_completer_fails() {
        let transcriber = FakeTranscriber::ok("summarize this");
        let outcome = run_job(transcriber, None::<FakeCompleter>, augmented_job("ctx")).await;
        assert!(matches!(outcome, Outcome::Failed(_)));
    }
}
