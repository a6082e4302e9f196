//! Terminal-backed [`ReviewConsole`].
//!
//! Ctrl-C is not handled here; `review` races the whole session against it.

use std::io::Write;

use async_trait::async_trait;
use services::{ReviewAction, ReviewConsole, ReviewEvent};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

use crate::output::render_review_event;

pub struct TerminalConsole {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// `None` on end of input or a read error.
    async fn read_line(&mut self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();

        match self.lines.next_line().await {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "failed to read from stdin");
                None
            }
        }
    }
}

#[async_trait]
impl ReviewConsole for TerminalConsole {
    async fn next_action(&mut self) -> Option<ReviewAction> {
        loop {
            let line = self.read_line("\nAction [c]: ").await?;
            match line.parse() {
                Ok(action) => return Some(action),
                Err(message) => println!("{message}"),
            }
        }
    }

    async fn confirm(&mut self, question: &str) -> Option<bool> {
        let prompt = format!("{question} [y/N]: ");
        loop {
            let line = self.read_line(&prompt).await?;
            match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Some(true),
                "" | "n" | "no" => return Some(false),
                _ => println!("Please answer y or n."),
            }
        }
    }

    fn show(&mut self, event: ReviewEvent<'_>) {
        println!("{}", render_review_event(&event));
    }
}
