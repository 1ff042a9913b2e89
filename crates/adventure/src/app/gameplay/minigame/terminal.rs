use regex::Regex;
use tracing::{debug, info};

pub(crate) const DEFAULT_COMMIT_PATTERN: &str =
    r#"^git\s+commit\s+-m\s+(?:"([^"]+)"|'([^']+)')\s*$"#;

const ACCEPTED_ADD_COMMANDS: [&str; 4] = [
    "git add .",
    "git add -A",
    "git add --all",
    "git add style.css",
];

const MAX_ECHO_LINES: usize = 8;
const PROMPT: &str = "$ ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TerminalStage {
    Add,
    Commit,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TerminalOutcome {
    Staged,
    Committed { message: String },
    Rejected { error: String },
    Empty,
    Closed,
}

#[derive(Debug, Clone)]
pub(crate) struct TerminalState {
    stage: TerminalStage,
    buffer: String,
    echo: Vec<String>,
    error: Option<String>,
    commit_pattern: Regex,
}

impl TerminalState {
    pub(crate) fn new(commit_pattern: Regex) -> Self {
        Self {
            stage: TerminalStage::Add,
            buffer: String::new(),
            echo: Vec::new(),
            error: None,
            commit_pattern,
        }
    }

    pub(crate) fn stage(&self) -> TerminalStage {
        self.stage
    }

    pub(crate) fn buffer(&self) -> &str {
        &self.buffer
    }

    pub(crate) fn echo(&self) -> &[String] {
        &self.echo
    }

    pub(crate) fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn type_text(&mut self, text: &str) {
        if self.stage == TerminalStage::Finished {
            return;
        }
        self.buffer
            .extend(text.chars().filter(|character| !character.is_control()));
    }

    pub(crate) fn backspace(&mut self) {
        self.buffer.pop();
    }

    /// Runs the buffered command. Rejected input leaves the stage unchanged and
    /// may be retried any number of times.
    pub(crate) fn submit(&mut self) -> TerminalOutcome {
        if self.stage == TerminalStage::Finished {
            return TerminalOutcome::Closed;
        }
        let command = std::mem::take(&mut self.buffer);
        let command = command.trim();
        if command.is_empty() {
            return TerminalOutcome::Empty;
        }
        self.push_echo(format!("{PROMPT}{command}"));

        let outcome = match self.stage {
            TerminalStage::Add => {
                if ACCEPTED_ADD_COMMANDS.contains(&command) {
                    self.stage = TerminalStage::Commit;
                    TerminalOutcome::Staged
                } else {
                    TerminalOutcome::Rejected {
                        error: format!(
                            "unrecognised command: {command} (stage your changes first)"
                        ),
                    }
                }
            }
            TerminalStage::Commit => match self.commit_message(command) {
                Some(message) => {
                    self.stage = TerminalStage::Finished;
                    self.push_echo(format!("[main] {message}"));
                    TerminalOutcome::Committed { message }
                }
                None => TerminalOutcome::Rejected {
                    error: "usage: git commit -m \"<message>\"".to_string(),
                },
            },
            TerminalStage::Finished => TerminalOutcome::Closed,
        };

        match &outcome {
            TerminalOutcome::Rejected { error } => {
                debug!(command, "terminal_command_rejected");
                self.push_echo(error.clone());
                self.error = Some(error.clone());
            }
            _ => {
                info!(command, stage = ?self.stage, "terminal_command_accepted");
                self.error = None;
            }
        }
        outcome
    }

    fn commit_message(&self, command: &str) -> Option<String> {
        let captures = self.commit_pattern.captures(command)?;
        captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|message| message.as_str().to_string())
    }

    fn push_echo(&mut self, line: String) {
        self.echo.push(line);
        if self.echo.len() > MAX_ECHO_LINES {
            let overflow = self.echo.len() - MAX_ECHO_LINES;
            self.echo.drain(..overflow);
        }
    }

    pub(crate) fn render(&self) -> String {
        let mut lines = self.echo.clone();
        if self.stage != TerminalStage::Finished {
            lines.push(format!("{PROMPT}{}", self.buffer));
        }
        lines.join("\n")
    }
}
