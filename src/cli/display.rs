use crate::apply::ProgressCallback;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use similar::TextDiff;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Manages CLI display and output formatting.
pub struct CliDisplayManager {
    spinner: Option<ProgressBar>,
    bar: Arc<Mutex<Option<ProgressBar>>>,
}

impl CliDisplayManager {
    /// Creates a new `CliDisplayManager`.
    pub fn new() -> Self {
        CliDisplayManager {
            spinner: None,
            bar: Arc::new(Mutex::new(None)),
        }
    }

    /// Prints the application header.
    pub fn print_header(&self) {
        println!("\n{}", "╭──────────────────────╮".bright_magenta());
        println!("{}", "│  📋 Pasteup v0.1.0   │".bright_magenta().bold());
        println!("{}\n", "╰──────────────────────╯".bright_magenta());
    }

    /// Prints the start of response parsing.
    pub fn print_parse_start(&self, source: &str) {
        self.print_section(
            "📥",
            "[1/3] Parsing Response",
            &format!("Reading from {}", source),
        );
    }

    /// Prints what the parser recognized.
    pub fn print_parse_result(&self, description: &str) {
        self.print_info(description);
    }

    /// Prints the start of change application.
    pub fn print_apply_start(&self, mode: &str) {
        self.print_section("🛠", "[2/3] Applying Changes", &format!("Mode: {}", mode));
    }

    /// Prints a warning for every file skipped by the path safety gate.
    pub fn print_skipped_paths(&self, skipped: &[String]) {
        for path in skipped {
            println!(
                "   {} {}",
                "⚠".bright_yellow(),
                format!("Skipped unsafe path: {}", path).bright_yellow()
            );
        }
    }

    /// Prints a one-line diff summary for an applied file.
    pub fn print_file_summary(&self, file_path: &str, old: &str, new: &str) {
        let diff = TextDiff::from_lines(old, new);
        let mut added = 0usize;
        let mut removed = 0usize;
        for change in diff.iter_all_changes() {
            match change.tag() {
                similar::ChangeTag::Insert => added += 1,
                similar::ChangeTag::Delete => removed += 1,
                similar::ChangeTag::Equal => {}
            }
        }
        println!(
            "   {} {} {} {}",
            "→".bright_white(),
            file_path.bright_white(),
            format!("+{}", added).bright_green(),
            format!("-{}", removed).bright_red()
        );
    }

    /// Prints the start of ledger persistence.
    pub fn print_ledger_start(&self) {
        self.print_section("💾", "[3/3] Saving Revert Ledger", "");
    }

    /// Prints the revert hint shown after a successful apply.
    pub fn print_revert_hint(&self) {
        self.print_info("Run 'pasteup revert' to undo these changes");
    }

    /// Prints the application footer.
    pub fn print_footer(&self, created: usize, modified: usize, duration: Duration) {
        println!();
        println!(
            "{}",
            format!("⚡ Created {} file(s)", created)
                .bright_white()
                .dimmed(),
        );
        println!(
            "{}",
            format!("⚡ Modified {} file(s)", modified)
                .bright_white()
                .dimmed(),
        );
        println!(
            "{}",
            format!("⚡ Completed in {:.2?}", duration)
                .bright_white()
                .dimmed(),
        );
        println!();
    }

    /// Prints a cancellation notice. Cancellation is not an error.
    pub fn print_cancelled(&self) {
        println!("{}", "Cancelled.".bright_white().dimmed());
    }

    /// Starts a spinner while model calls are in flight.
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template(&format!(
                "   {} {{spinner}} {}",
                "→".bright_white(),
                message.italic().bright_white()
            ))
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Stops the spinner.
    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
        self.spinner = None;
    }

    /// Returns a callback that drives the percentage bar for the largest
    /// file's received bytes. The bar is created on the first chunk, once
    /// the expected total is known; the total is an approximation, so the
    /// position saturates rather than overflow.
    pub fn progress_callback(&self) -> ProgressCallback {
        let slot = Arc::clone(&self.bar);
        Arc::new(move |received: u64, expected: u64| {
            if let Ok(mut guard) = slot.lock() {
                let bar = guard.get_or_insert_with(|| {
                    let bar = ProgressBar::new(expected.max(1));
                    bar.set_style(
                        ProgressStyle::with_template(&format!(
                            "   {} {{bar:30}} {{percent}}% {}",
                            "→".bright_white(),
                            "receiving model output".italic().bright_white()
                        ))
                        .unwrap(),
                    );
                    bar
                });
                bar.set_position(received.min(expected.max(1)));
            }
        })
    }

    /// Finishes and clears the percentage bar if it got created.
    pub fn finish_progress_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
    }

    /// Helper function to print a section header.
    fn print_section(&self, icon: &str, title: &str, description: &str) {
        println!("{} {}", icon.bright_yellow(), title.bright_cyan().bold());
        if !description.is_empty() {
            println!(
                "   {} {}",
                "→".bright_white(),
                description.italic().bright_white()
            );
        }
    }

    /// Helper function to print an informational message.
    fn print_info(&self, message: &str) {
        println!(
            "   {} {}",
            "→".bright_white(),
            message.italic().bright_white()
        );
    }
}
