//! Prompts answered on the terminal

use async_trait::async_trait;
use gopherlink_tools::{PromptChoice, PromptRequest, Prompter, UserMessage};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::output::OutputStyle;

/// Asks on stderr and reads the answer from stdin
pub struct TerminalPrompter {
    assume_yes: bool,
    style: OutputStyle,
}

impl TerminalPrompter {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            style: OutputStyle::default(),
        }
    }
}

/// Interpret a typed answer; None when it answers nothing
pub fn parse_answer(line: &str, accept_label: &str) -> Option<PromptChoice> {
    let answer = line.trim().to_lowercase();
    if answer.is_empty() {
        return None;
    }
    if answer == "y" || answer == "yes" || answer == accept_label.to_lowercase() {
        Some(PromptChoice::Accept)
    } else if answer == "n" || answer == "no" {
        Some(PromptChoice::Decline)
    } else {
        None
    }
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn confirm(&self, request: PromptRequest) -> Option<PromptChoice> {
        let question = format!("{} [{}/no]", request.message(), request.accept_label());
        if self.assume_yes {
            eprintln!("{} yes", self.style.info(&question));
            return Some(PromptChoice::Accept);
        }

        eprint!("{} ", self.style.info(&question));
        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(0) | Err(_) => None,
            Ok(_) => parse_answer(&line, request.accept_label()),
        }
    }

    async fn show(&self, message: UserMessage) {
        eprintln!("{}", self.style.message(&message));
    }
}
