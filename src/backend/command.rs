use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use super::GenerationBackend;
use crate::error::{ServiceError, ServiceResult};

/// Runs a local generation CLI in print mode (`<bin> [args..] -p <prompt>`)
/// and takes its stdout as the generated text.
pub struct CommandBackend {
    bin: PathBuf,
    extra_args: Vec<String>,
    model: Option<String>,
}

impl CommandBackend {
    pub fn new(bin: PathBuf, extra_args: Vec<String>, model: Option<String>) -> Self {
        Self {
            bin,
            extra_args,
            model,
        }
    }

    fn build_command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(&self.extra_args);
        if let Some(model) = self.model.as_deref() {
            cmd.arg("--model").arg(model);
        }
        cmd.arg("-p")
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl GenerationBackend for CommandBackend {
    fn name(&self) -> &str {
        "command"
    }

    fn generate(&self, prompt: &str) -> ServiceResult<String> {
        debug!(
            bin = %self.bin.display(),
            prompt_chars = prompt.chars().count(),
            "spawning generation command"
        );

        let output = self.build_command(prompt).output().map_err(|err| {
            ServiceError::UpstreamUnavailable(format!(
                "failed to spawn generation command ({}): {err}",
                self.bin.display()
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::UpstreamUnavailable(format!(
                "generation command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(ServiceError::UpstreamUnavailable(
                "generation command produced no output".to_string(),
            ));
        }

        trace!(response = %text, "generation command output received");
        Ok(text)
    }
}
