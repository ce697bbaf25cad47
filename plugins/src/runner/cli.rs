use async_trait::async_trait;
use gendispatch_core::error::InvocationError;
use gendispatch_core::executor::traits::ExternalProgram;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Prompts longer than this go through stdin instead of argv.
pub const DEFAULT_STDIN_THRESHOLD: usize = 8000;

/// Runs the text generator as a child process, one process per attempt.
///
/// The prompt is appended to `args` as the last argument, or written to
/// stdin when it is longer than `stdin_threshold` chars. The child is killed
/// if the attempt future is dropped (adapter timeout).
pub struct CliProgram {
    program: String,
    args: Vec<String>,
    stdin_threshold: usize,
}

impl CliProgram {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stdin_threshold: DEFAULT_STDIN_THRESHOLD,
        }
    }

    pub fn with_stdin_threshold(mut self, threshold: usize) -> Self {
        self.stdin_threshold = threshold;
        self
    }

    fn use_stdin(&self, prompt: &str) -> bool {
        prompt.chars().count() > self.stdin_threshold
    }
}

#[async_trait]
impl ExternalProgram for CliProgram {
    fn name(&self) -> &str {
        &self.program
    }

    async fn run(&self, prompt: &str) -> Result<String, InvocationError> {
        let use_stdin = self.use_stdin(prompt);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if use_stdin {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.arg(prompt).stdin(Stdio::null());
        }

        tracing::debug!(
            program = %self.program,
            prompt_len = prompt.len(),
            use_stdin,
            "spawning external program"
        );

        let mut child = cmd
            .spawn()
            .map_err(|e| InvocationError::Spawn(format!("{}: {}", self.program, e)))?;

        // Feed stdin while draining stdout/stderr so a chatty child cannot
        // fill its output pipe and block on us.
        let stdin = if use_stdin { child.stdin.take() } else { None };
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(prompt.as_bytes()).await?;
                // Closing stdin signals end of prompt.
                drop(stdin);
            }
            Ok::<(), std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output = output.map_err(|e| InvocationError::InvocationFailed {
            code: None,
            stderr: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(InvocationError::InvocationFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        fed.map_err(|e| InvocationError::Spawn(format!("writing prompt to stdin: {}", e)))?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
