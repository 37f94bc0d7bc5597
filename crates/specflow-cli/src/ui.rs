use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use specflow::engine::gate::DecisionRequest;
use specflow::engine::progress::{OutputCallback, OutputLine, Progress, ProgressCallback};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task;
use tracing::{debug, warn};

/// Capacity of the UI event queue. Engine output can arrive in bursts of thousands of lines.
const EVENT_BUFFER: usize = 8192;

#[derive(Debug)]
pub enum UiEvent {
    Progress(Progress),
    Output(OutputLine),
    Log(String),
    Confirm(DecisionRequest),
}

pub struct UiManager {
    mp: Arc<MultiProgress>,
    state: BarState,
    event_receiver: mpsc::Receiver<UiEvent>,
    shutdown_receiver: watch::Receiver<bool>,
    _sentinel_bar: ProgressBar,
}

#[derive(Default)]
struct BarState {
    active_bar: Option<ProgressBar>,
    base_message: String,
}

impl UiManager {
    pub fn new() -> (Self, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (event_sender, event_receiver) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let mp = Arc::new(MultiProgress::new());
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        let _sentinel_bar = mp.add(ProgressBar::hidden());
        let manager = Self {
            mp,
            state: BarState::default(),
            event_receiver,
            shutdown_receiver,
            _sentinel_bar,
        };

        (manager, event_sender, shutdown_sender)
    }

    /// Serves events until shutdown is signalled, then drains what is already queued.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.event_receiver.recv() => {
                    self.handle_event(event);
                }
                result = self.shutdown_receiver.changed() => {
                    if result.is_err() || *self.shutdown_receiver.borrow() {
                        break;
                    }
                }
            }
        }
        while let Ok(event) = self.event_receiver.try_recv() {
            self.handle_event(event);
        }
        if let Some(bar) = self.state.active_bar.take() {
            bar.finish_and_clear();
        }
        self._sentinel_bar.finish_and_clear();
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(msg) => {
                self.mp.println(msg).ok();
            }
            UiEvent::Output(line) => {
                self.mp.println(format!("    {}", line)).ok();
            }
            UiEvent::Progress(progress) => self.handle_progress(progress),
            UiEvent::Confirm(request) => self.confirm(request),
        }
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::StageStart { stage } => {
                if let Some(bar) = self.state.active_bar.take() {
                    bar.finish_and_clear();
                }

                let pb = self.mp.add(ProgressBar::new_spinner());
                pb.enable_steady_tick(Duration::from_millis(80));
                pb.set_style(Self::spinner_style());
                pb.set_message(stage.to_string());

                self.state.active_bar = Some(pb);
                self.state.base_message = stage.to_string();
            }
            Progress::StageFinish { stage } => {
                if let Some(bar) = self.state.active_bar.take() {
                    bar.finish_and_clear();
                }

                self.mp.println(format!("✓ {}", stage)).ok();
                self.state.base_message.clear();
            }
            Progress::TaskStart { total_steps } => {
                if let Some(bar) = self.state.active_bar.as_ref() {
                    bar.set_style(Self::bar_style());
                    bar.set_length(total_steps);
                    bar.set_position(0);
                    bar.disable_steady_tick();
                }
            }
            Progress::TaskIncrement => {
                if let Some(bar) = self.state.active_bar.as_ref() {
                    bar.inc(1);
                }
            }
            Progress::TaskFinish => {
                if let Some(bar) = self.state.active_bar.as_ref() {
                    if let Some(len) = bar.length() {
                        bar.set_position(len);
                    }
                    bar.set_style(Self::spinner_style());
                    bar.enable_steady_tick(Duration::from_millis(80));
                }
            }
            Progress::StatusUpdate { text } => {
                if let Some(bar) = self.state.active_bar.as_ref() {
                    bar.set_message(format!("{} ({})", self.state.base_message, text));
                }
            }
            Progress::Message(msg) => {
                self.mp.println(format!("  {}", msg)).ok();
            }
        }
    }

    /// Asks on the terminal with the bars hidden. Unreadable input counts as "no".
    fn confirm(&self, request: DecisionRequest) {
        let mp = Arc::clone(&self.mp);
        let message = request.message.clone();
        let answer = task::block_in_place(move || {
            mp.suspend(|| {
                let stdin = io::stdin();
                prompt_with(&mut stdin.lock(), &mut io::stderr(), &message)
            })
        });
        let approved = answer.unwrap_or_else(|e| {
            warn!("Could not read an answer from the terminal: {}", e);
            false
        });
        request.respond(approved);
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .expect("Invalid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<24} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("Invalid template")
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    write!(w, "{:.1}s", state.eta().as_secs_f64()).unwrap();
                },
            )
            .progress_chars("━╸ ")
    }
}

/// Reads a yes/no answer, asking again until one is given. End of input means "no".
pub fn prompt_with<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    message: &str,
) -> io::Result<bool> {
    loop {
        write!(writer, "{} [y/N] ", message)?;
        writer.flush()?;

        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            writeln!(writer)?;
            return Ok(false);
        }
        match parse_answer(&line) {
            Some(answer) => return Ok(answer),
            None => writeln!(writer, "Please answer 'y' or 'n'.")?,
        }
    }
}

fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "" | "n" | "no" => Some(false),
        _ => None,
    }
}

/// Turns library callbacks into [`UiEvent`]s.
#[derive(Clone)]
pub struct CliProgressHandler {
    sender: mpsc::Sender<UiEvent>,
    dropped_lines: Arc<AtomicUsize>,
}

impl CliProgressHandler {
    pub fn new(sender: mpsc::Sender<UiEvent>) -> Self {
        Self {
            sender,
            dropped_lines: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn progress_callback(&self) -> ProgressCallback {
        let sender = self.sender.clone();
        Arc::new(move |progress: Progress| {
            if let Err(e) = sender.try_send(UiEvent::Progress(progress)) {
                warn!("Failed to send progress update to UI channel: {}", e);
            }
        })
    }

    /// Engine output never blocks the engine. A line that finds the queue full is dropped
    /// and counted.
    pub fn output_callback(&self) -> OutputCallback {
        let sender = self.sender.clone();
        let dropped_lines = Arc::clone(&self.dropped_lines);
        Arc::new(move |line: OutputLine| match sender.try_send(UiEvent::Output(line)) {
            Ok(()) => {}
            Err(TrySendError::Full(UiEvent::Output(line))) => {
                let total = dropped_lines.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(dropped = total, "UI queue is full; dropped engine output: {}", line);
            }
            Err(e) => debug!("UI is not receiving engine output: {}", e),
        })
    }

    /// Engine output lines dropped so far because the UI queue was full.
    pub fn dropped_lines(&self) -> usize {
        self.dropped_lines.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specflow::engine::progress::OutputStream;
    use specflow::engine::state::Stage;
    use std::io::Cursor;

    fn setup_manager() -> (UiManager, mpsc::Sender<UiEvent>) {
        let (manager, sender, _) = UiManager::new();
        manager.mp.set_draw_target(ProgressDrawTarget::hidden());
        (manager, sender)
    }

    fn start(manager: &mut UiManager, stage: Stage) {
        manager.handle_event(UiEvent::Progress(Progress::StageStart { stage }));
    }

    #[test]
    fn stage_start_creates_a_spinner_named_after_the_stage() {
        let (mut manager, _) = setup_manager();
        assert!(manager.state.active_bar.is_none());

        start(&mut manager, Stage::BatchOptimize);

        let bar = manager.state.active_bar.as_ref().unwrap();
        assert_eq!(bar.message(), "batch-optimize");
        assert_eq!(manager.state.base_message, "batch-optimize");
    }

    #[test]
    fn next_stage_replaces_the_bar() {
        let (mut manager, _) = setup_manager();
        start(&mut manager, Stage::GroundState);
        start(&mut manager, Stage::ExcitedState);

        assert_eq!(
            manager.state.active_bar.as_ref().unwrap().message(),
            "excited-state"
        );
    }

    #[test]
    fn stage_finish_clears_the_bar() {
        let (mut manager, _) = setup_manager();
        start(&mut manager, Stage::EnergyRank);

        manager.handle_event(UiEvent::Progress(Progress::StageFinish {
            stage: Stage::EnergyRank,
        }));

        assert!(manager.state.active_bar.is_none());
        assert!(manager.state.base_message.is_empty());
    }

    #[test]
    fn task_events_drive_the_bar_position() {
        let (mut manager, _) = setup_manager();
        start(&mut manager, Stage::BatchOptimize);

        manager.handle_event(UiEvent::Progress(Progress::TaskStart { total_steps: 4 }));
        manager.handle_event(UiEvent::Progress(Progress::TaskIncrement));
        manager.handle_event(UiEvent::Progress(Progress::TaskIncrement));
        {
            let bar = manager.state.active_bar.as_ref().unwrap();
            assert_eq!(bar.length(), Some(4));
            assert_eq!(bar.position(), 2);
        }

        manager.handle_event(UiEvent::Progress(Progress::TaskFinish));
        assert_eq!(manager.state.active_bar.as_ref().unwrap().position(), 4);
    }

    #[test]
    fn status_update_decorates_the_stage_name() {
        let (mut manager, _) = setup_manager();
        start(&mut manager, Stage::GroundState);

        manager.handle_event(UiEvent::Progress(Progress::StatusUpdate {
            text: "running orca".into(),
        }));

        let bar = manager.state.active_bar.as_ref().unwrap();
        assert_eq!(bar.message(), "ground-state (running orca)");
    }

    #[test]
    fn messages_and_output_without_a_bar_are_printed() {
        let (mut manager, _) = setup_manager();
        manager.handle_event(UiEvent::Log("log line".into()));
        manager.handle_event(UiEvent::Progress(Progress::Message("hello".into())));
        manager.handle_event(UiEvent::Output(OutputLine {
            stream: OutputStream::Stderr,
            text: "warning".into(),
        }));
        assert!(manager.state.active_bar.is_none());
    }

    #[test]
    fn answers_are_parsed_case_insensitively() {
        assert_eq!(parse_answer("Y\n"), Some(true));
        assert_eq!(parse_answer(" yes "), Some(true));
        assert_eq!(parse_answer("NO"), Some(false));
        assert_eq!(parse_answer("\n"), Some(false));
        assert_eq!(parse_answer("maybe"), None);
    }

    #[test]
    fn prompt_asks_again_after_an_unclear_answer() {
        let mut input = Cursor::new("maybe\ny\n");
        let mut output = Vec::new();

        let answer = prompt_with(&mut input, &mut output, "Continue processing?").unwrap();

        assert!(answer);
        let shown = String::from_utf8(output).unwrap();
        assert_eq!(
            shown,
            "Continue processing? [y/N] Please answer 'y' or 'n'.\nContinue processing? [y/N] "
        );
    }

    #[test]
    fn end_of_input_rejects() {
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        assert!(!prompt_with(&mut input, &mut output, "Continue?").unwrap());
    }

    #[tokio::test]
    async fn handler_callbacks_forward_events() {
        let (sender, mut receiver) = mpsc::channel(4);
        let handler = CliProgressHandler::new(sender);

        (handler.progress_callback())(Progress::StageStart {
            stage: Stage::ConformerSearch,
        });
        (handler.output_callback())(OutputLine {
            stream: OutputStream::Stdout,
            text: "SCF converged".into(),
        });

        match receiver.recv().await.unwrap() {
            UiEvent::Progress(Progress::StageStart { stage }) => {
                assert_eq!(stage, Stage::ConformerSearch)
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match receiver.recv().await.unwrap() {
            UiEvent::Output(line) => assert_eq!(line.text, "SCF converged"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn output_beyond_a_full_queue_is_counted() {
        let (sender, mut receiver) = mpsc::channel(1);
        let handler = CliProgressHandler::new(sender);
        let output = handler.output_callback();

        for text in ["first", "second", "third"] {
            output(OutputLine {
                stream: OutputStream::Stdout,
                text: text.into(),
            });
        }

        assert_eq!(handler.dropped_lines(), 2);
        match receiver.recv().await.unwrap() {
            UiEvent::Output(line) => assert_eq!(line.text, "first"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn run_drains_queued_events_after_shutdown() {
        let (manager, sender, shutdown) = UiManager::new();
        manager.mp.set_draw_target(ProgressDrawTarget::hidden());
        sender
            .send(UiEvent::Progress(Progress::Message("late".into())))
            .await
            .unwrap();
        shutdown.send(true).unwrap();

        manager.run().await;
    }
}
