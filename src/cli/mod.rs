pub mod args;
pub mod display;

use crate::apply::Confirmer;
use async_trait::async_trait;
use colored::*;
use std::io::Write;

/// Terminal y/N prompt. Reads stdin on a blocking task so in-flight model
/// calls keep streaming while the question is up.
pub struct TerminalConfirmer;

#[async_trait]
impl Confirmer for TerminalConfirmer {
    async fn confirm(&self, message: &str) -> bool {
        let prompt = format!("{} {} ", message.bright_cyan(), "[y/N]".bright_white());
        let answer = tokio::task::spawn_blocking(move || {
            print!("{}", prompt);
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            match std::io::stdin().read_line(&mut line) {
                Ok(_) => line,
                Err(_) => String::new(),
            }
        })
        .await
        .unwrap_or_default();

        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}
