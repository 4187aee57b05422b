use crate::cost::CostRecord;
use crate::ui::icons::{CHECK, CROSS, FILE_NEW, MONEY};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Terminal progress for one stage: a bar over the stage's work list with the
/// current file as its message.
///
/// Hidden bars swallow everything, which is what tests and non-interactive
/// runs use.
pub struct StageProgress {
    bar: ProgressBar,
    verbose: bool,
}

impl StageProgress {
    /// Create a bar sized to `total` files, labeled with the stage name.
    pub fn new(stage: &str, total: u64, verbose: bool) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {spinner} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");

        let bar = ProgressBar::new(total);
        bar.set_style(style);
        bar.set_prefix(stage.to_uppercase());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar, verbose }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            verbose: false,
        }
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        if self.bar.is_hidden() {
            return;
        }
        self.bar.println(msg.as_ref());
    }

    /// Show the file about to be sent.
    pub fn start_file(&self, label: &str) {
        self.bar.set_message(format!("{}", style(label).yellow()));
    }

    /// Advance past a finished file. Verbose mode also prints where it went.
    pub fn file_done(&self, label: &str, written: &str, cost: &CostRecord) {
        if self.verbose {
            self.print_line(format!(
                "    {} {} {} {}",
                FILE_NEW,
                label,
                style(format!("-> {written}")).dim(),
                style(format!("(${:.4})", cost.monetary_cost)).dim()
            ));
        }
        self.bar.inc(1);
    }

    pub fn skip_file(&self, label: &str) {
        if self.verbose {
            self.print_line(format!("    {}", style(format!("{label} (already done)")).dim()));
        }
        self.bar.inc(1);
    }

    pub fn finish(&self, files: usize, total: &CostRecord) {
        self.bar.finish_and_clear();
        self.print_summary(format!(
            "{} {} file(s) {} {}",
            CHECK,
            files,
            MONEY,
            style(format!("total ${:.4}", total.monetary_cost)).cyan()
        ));
    }

    pub fn fail(&self, label: &str, error: &str) {
        self.bar.abandon_with_message(format!(
            "{} {} {}",
            CROSS,
            label,
            style(error).red()
        ));
    }

    fn print_summary(&self, msg: String) {
        if !self.bar.is_hidden() {
            eprintln!("{msg}");
        }
    }
}
