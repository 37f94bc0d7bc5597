use crate::engine::state::Stage;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Progress {
    StageStart { stage: Stage },
    StageFinish { stage: Stage },

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    StatusUpdate { text: String },
    Message(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of an external program's output, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stream {
            OutputStream::Stdout => f.write_str(&self.text),
            OutputStream::Stderr => write!(f, "Error: {}", self.text),
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;
pub type OutputCallback = Arc<dyn Fn(OutputLine) + Send + Sync>;

/// Fans progress events and raw process output out to whoever is listening.
///
/// Cloning is cheap; batch jobs carry their own clone onto worker tasks.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    output: Option<OutputCallback>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            output: None,
        }
    }

    pub fn with_output(mut self, output: OutputCallback) -> Self {
        self.output = Some(output);
        self
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    #[inline]
    pub fn message(&self, text: impl Into<String>) {
        self.report(Progress::Message(text.into()));
    }

    #[inline]
    pub fn status(&self, text: impl Into<String>) {
        self.report(Progress::StatusUpdate { text: text.into() });
    }

    #[inline]
    pub fn output(&self, line: OutputLine) {
        if let Some(cb) = &self.output {
            cb(line);
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("callback", &self.callback.is_some())
            .field("output", &self.output.is_some())
            .finish()
    }
}
