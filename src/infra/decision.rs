use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use tracing::{debug, warn};

use crate::app::ports::DecisionPort;
use crate::error::{ReconcileError, Result};

/// Asks a person on a terminal (or any reader/writer pair) and waits for y/n
pub struct PromptDecisionPort<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptDecisionPort<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

pub type StdinDecisionPort = PromptDecisionPort<io::StdinLock<'static>, io::Stderr>;

impl StdinDecisionPort {
    /// Prompts go to stderr so stdout stays free for the run summary
    pub fn stdin() -> Self {
        PromptDecisionPort::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> DecisionPort for PromptDecisionPort<R, W> {
    fn decide(&mut self, prompt: &str) -> Result<bool> {
        loop {
            write!(self.output, "{} [y/n] ", prompt)?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(ReconcileError::DecisionUnavailable(format!(
                    "input closed before answering: {}",
                    prompt
                )));
            }
            match line.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                other => {
                    debug!("Ignoring answer '{}'", other);
                    writeln!(self.output, "Please answer y or n.")?;
                }
            }
        }
    }
}

/// Pre-recorded answers, consumed in order.
///
/// Once the script runs out every further question gets `default`, which is "keep the
/// catalog side" (`true`) unless configured otherwise. All prompts are kept for
/// inspection.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    answers: VecDeque<bool>,
    default: bool,
    prompts: Vec<String>,
}

impl ScriptedDecisions {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: answers.into(),
            default: true,
            prompts: Vec::new(),
        }
    }

    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    /// Parse an answers file: one `y`/`n` (or `yes`/`no`) per line, `#` starts a comment
    pub fn parse(content: &str) -> Result<Self> {
        let mut answers = Vec::new();
        for (n, raw) in content.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim().to_lowercase();
            match line.as_str() {
                "" => continue,
                "y" | "yes" => answers.push(true),
                "n" | "no" => answers.push(false),
                other => {
                    return Err(ReconcileError::Config(format!(
                        "answers line {}: expected y or n, got '{}'",
                        n + 1,
                        other
                    )))
                }
            }
        }
        Ok(Self::new(answers))
    }

    pub fn calls(&self) -> usize {
        self.prompts.len()
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl DecisionPort for ScriptedDecisions {
    fn decide(&mut self, prompt: &str) -> Result<bool> {
        self.prompts.push(prompt.to_string());
        Ok(match self.answers.pop_front() {
            Some(answer) => answer,
            None => {
                warn!("No scripted answer left, using default {}: {}", self.default, prompt);
                self.default
            }
        })
    }
}

/// For unattended runs: any question is an error, so the run fails instead of guessing
#[derive(Debug, Default, Clone, Copy)]
pub struct RefusingDecisionPort;

impl DecisionPort for RefusingDecisionPort {
    fn decide(&mut self, prompt: &str) -> Result<bool> {
        Err(ReconcileError::DecisionUnavailable(format!(
            "running unattended: {}",
            prompt
        )))
    }
}
