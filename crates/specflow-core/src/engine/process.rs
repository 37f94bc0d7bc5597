use crate::engine::progress::{OutputLine, OutputStream};
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to start '{program}': {source}")]
    Launch { program: String, source: io::Error },
    #[error("Failed to wait for '{program}': {source}")]
    Wait { program: String, source: io::Error },
}

/// A program, its arguments and the directory to run it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// How a finished program exited. `code` is `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Whether the exit code is one of `accepted`. Signal terminations never are.
    pub fn is_accepted(&self, accepted: &[i32]) -> bool {
        self.code.is_some_and(|code| accepted.contains(&code))
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "termination by signal"),
        }
    }
}

/// Runs `invocation` to completion, handing every output line to `on_line`.
///
/// Stdout and stderr are drained concurrently by two reader tasks feeding one channel, so
/// `on_line` sees lines in arrival order and a chatty stream cannot block the child. A
/// non-zero exit is not an error here; callers decide what codes they accept.
pub async fn run<F>(invocation: &Invocation, mut on_line: F) -> Result<ExitOutcome, ProcessError>
where
    F: FnMut(OutputLine),
{
    let program = invocation.program_name();
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &invocation.working_dir {
        command.current_dir(dir);
    }

    debug!(command = %invocation, "Launching external program");
    let mut child = command.spawn().map_err(|source| ProcessError::Launch {
        program: program.clone(),
        source,
    })?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, OutputStream::Stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, OutputStream::Stderr, tx.clone()));
    }
    drop(tx);

    while let Some(line) = rx.recv().await {
        on_line(line);
    }

    let status = child
        .wait()
        .await
        .map_err(|source| ProcessError::Wait { program, source })?;
    let outcome = ExitOutcome {
        code: status.code(),
    };
    debug!(command = %invocation, %outcome, "External program finished");
    Ok(outcome)
}

async fn forward_lines<R>(reader: R, stream: OutputStream, tx: mpsc::UnboundedSender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buffer)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if tx.send(OutputLine { stream, text }).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn both_streams_are_delivered_and_exit_code_returned() {
        let mut lines = Vec::new();
        let outcome = run(&sh("echo out; echo err 1>&2; exit 3"), |l| lines.push(l))
            .await
            .unwrap();

        assert_eq!(outcome.code, Some(3));
        assert!(!outcome.success());
        assert!(lines.contains(&OutputLine {
            stream: OutputStream::Stdout,
            text: "out".into()
        }));
        assert!(lines.contains(&OutputLine {
            stream: OutputStream::Stderr,
            text: "err".into()
        }));
    }

    #[tokio::test]
    async fn lines_of_one_stream_keep_their_order() {
        let mut lines = Vec::new();
        run(&sh("for i in 1 2 3 4 5; do echo $i; done"), |l| lines.push(l.text))
            .await
            .unwrap();
        assert_eq!(lines, ["1", "2", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn large_stderr_output_does_not_deadlock() {
        let mut count = 0usize;
        let outcome = run(
            &sh("i=0; while [ $i -lt 20000 ]; do echo line $i 1>&2; i=$((i+1)); done; echo done"),
            |_| count += 1,
        )
        .await
        .unwrap();
        assert!(outcome.success());
        assert_eq!(count, 20001);
    }

    #[tokio::test]
    async fn working_directory_is_honoured() {
        let dir = tempdir().unwrap();
        let mut lines = Vec::new();
        run(&sh("pwd").current_dir(dir.path()), |l| lines.push(l.text))
            .await
            .unwrap();
        let reported = std::fs::canonicalize(&lines[0]).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let result = run(&Invocation::new("definitely-not-a-real-engine-xyz"), |_| {}).await;
        assert!(matches!(result, Err(ProcessError::Launch { .. })));
    }

    #[test]
    fn exit_policy_checks_listed_codes() {
        let outcome = ExitOutcome { code: Some(1) };
        assert!(outcome.is_accepted(&[0, 1]));
        assert!(!outcome.is_accepted(&[0]));
        assert!(!ExitOutcome { code: None }.is_accepted(&[0]));
    }
}
