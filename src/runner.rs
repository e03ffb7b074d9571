//! Interactive confirm/retry/execute loop.
//!
//! Shows the proposed commands, asks `[y/n/r]`, and runs the accepted
//! commands one after another through `bash -c`.

use crate::llm::{clean_response, CompletionClient};
use crate::prompt::COMMAND_SEPARATOR;
use anyhow::{Context, Result};
use crossterm::style::{style, Stylize};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Command execution aborted. '{0}'")]
    Aborted(String),
    #[error("`{command}` failed ({}): {stderr}", exit_label(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// The user's answer to the confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply,
    Retry,
    Abort,
}

impl Decision {
    pub fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => Decision::Apply,
            "r" | "retry" => Decision::Retry,
            _ => Decision::Abort,
        }
    }
}

/// Split a response into the individual commands to run.
pub fn split_commands(response: &str) -> Vec<String> {
    response
        .split(COMMAND_SEPARATOR)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drives the interactive session against a completion client.
pub struct InteractiveRunner<'a> {
    client: &'a dyn CompletionClient,
    workdir: PathBuf,
}

impl<'a> InteractiveRunner<'a> {
    pub fn new(client: &'a dyn CompletionClient, workdir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            workdir: workdir.into(),
        }
    }

    /// Ask for commands until the user accepts or aborts, then run them.
    ///
    /// Returns the captured stdout of the last command.
    pub async fn run<R, W>(&self, prompt: &str, input: &mut R, output: &mut W) -> Result<String>
    where
        R: BufRead,
        W: Write,
    {
        let mut attempt = 1;
        loop {
            info!("Requesting commands from {} (attempt {})", self.client.model(), attempt);
            let response = clean_response(&self.client.complete(prompt).await?);
            let commands = split_commands(&response);

            write!(
                output,
                "Here are the commands to execute: \n\n{}\n\nDo you want to apply it? [y/n/r]: ",
                style(commands.join("\n")).green()
            )?;
            output.flush()?;

            let answer = read_answer(input)?;
            writeln!(output)?;

            match Decision::parse(&answer) {
                Decision::Apply => return execute(&commands, &self.workdir, output).await,
                Decision::Retry => {
                    debug!("User asked for another suggestion");
                    attempt += 1;
                }
                Decision::Abort => return Err(RunError::Aborted(answer).into()),
            }
        }
    }
}

/// Read one answer; end of input counts as an empty answer.
fn read_answer<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("Failed to read confirmation")?;
    Ok(line.trim().to_string())
}

/// Run `commands` in order, stopping at the first failure.
pub async fn execute<W: Write>(commands: &[String], workdir: &Path, output: &mut W) -> Result<String> {
    let mut last_stdout = String::new();

    for command in commands {
        writeln!(output, "{}", command)?;
        debug!("Executing: {}", command);

        let result = Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(workdir)
            .output()
            .await
            .with_context(|| format!("Failed to spawn bash for `{}`", command))?;

        if !result.status.success() {
            return Err(RunError::CommandFailed {
                command: command.clone(),
                code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            }
            .into());
        }

        last_stdout = String::from_utf8_lossy(&result.stdout).into_owned();
    }

    Ok(last_stdout)
}
