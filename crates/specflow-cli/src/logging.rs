use crate::error::{CliError, Result};
use crate::ui::UiEvent;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, MakeWriter, writer::BoxMakeWriter},
    prelude::*,
};

/// Installs the global subscriber.
///
/// Console records go through the UI task when `ui` is given, so they are printed above the
/// progress bars instead of through them.
pub fn setup_logging(
    verbosity: u8,
    quiet: bool,
    log_file: Option<PathBuf>,
    ui: Option<mpsc::Sender<UiEvent>>,
) -> Result<()> {
    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbosity {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let console_writer = match ui {
        Some(sender) => BoxMakeWriter::new(UiLogSink { sender }),
        None => BoxMakeWriter::new(io::stderr),
    };
    let console_layer = fmt::layer()
        .with_writer(console_writer)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(level_filter)
        .with(console_layer);

    if let Some(path) = log_file {
        let file = File::create(&path).map_err(CliError::Io)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_target(true);

        subscriber.with(file_layer).init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Hands each formatted record to the UI task as one [`UiEvent::Log`].
#[derive(Clone)]
struct UiLogSink {
    sender: mpsc::Sender<UiEvent>,
}

impl<'a> MakeWriter<'a> for UiLogSink {
    type Writer = UiLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        UiLogWriter {
            sender: self.sender.clone(),
            buffer: Vec::new(),
        }
    }
}

struct UiLogWriter {
    sender: mpsc::Sender<UiEvent>,
    buffer: Vec<u8>,
}

impl Write for UiLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for UiLogWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buffer);
        let text = text.trim_end();
        if text.is_empty() {
            return;
        }
        // A full or closed channel means the UI is gone or flooded; stderr still works.
        if self.sender.try_send(UiEvent::Log(text.to_string())).is_err() {
            eprintln!("{}", text);
        }
    }
}
