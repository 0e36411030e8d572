use crate::error::{Result, ShroudError};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Receives the recovered payload
pub trait Executor {
    fn execute(&mut self, payload: &[u8]) -> Result<()>;
}

/// Keeps the payload in memory
#[derive(Debug, Default)]
pub struct CaptureExecutor {
    pub captured: Option<Vec<u8>>,
    pub calls: usize,
}

impl CaptureExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Executor for CaptureExecutor {
    fn execute(&mut self, payload: &[u8]) -> Result<()> {
        self.calls += 1;
        self.captured = Some(payload.to_vec());
        Ok(())
    }
}

/// Writes the payload to any sink
pub struct WriterExecutor<W: Write> {
    writer: W,
}

impl<W: Write> WriterExecutor<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Executor for WriterExecutor<W> {
    fn execute(&mut self, payload: &[u8]) -> Result<()> {
        self.writer.write_all(payload)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Pipes the payload into an interpreter's stdin and waits for it to exit
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
}

impl CommandExecutor {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Executor for CommandExecutor {
    fn execute(&mut self, payload: &[u8]) -> Result<()> {
        debug!(program = %self.program, bytes = payload.len(), "spawning interpreter");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| ShroudError::Execution(format!("{}: {}", self.program, e)))?;

        // An interpreter may exit without draining stdin; only its exit status counts
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(payload) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!(program = %self.program, "interpreter closed stdin early");
                }
                Err(e) => warn!(program = %self.program, "writing payload: {}", e),
            }
        }

        let status = child
            .wait()
            .map_err(|e| ShroudError::Execution(format!("{}: {}", self.program, e)))?;
        if !status.success() {
            return Err(ShroudError::Execution(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }
}
