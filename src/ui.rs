//! Terminal output for transforma: spinners and coloured step reports.
//!
//! [`JobProgress`] follows one job with an `indicatif` spinner until it
//! settles; [`StepPrinter`] prints the outcome of individual lifecycle calls
//! styled with `console`.

use std::fmt::Display;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use transforma::api::JobView;
use transforma::error::JobError;
use transforma::state_machine::{JobId, JobState};

fn state_style(state: JobState) -> Style {
    match state {
        JobState::Completed => Style::new().green().bold(),
        JobState::Failed => Style::new().red().bold(),
        JobState::Stopped => Style::new().yellow().bold(),
        JobState::Created | JobState::Running => Style::new().cyan(),
    }
}

/// Spinner shown while a job is running.
pub struct JobProgress {
    pb: ProgressBar,
    id: JobId,
}

impl JobProgress {
    pub fn start(id: JobId) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("{}: {id}", JobState::Created));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb, id }
    }

    pub fn update_state(&self, state: JobState) {
        self.pb.set_message(format!("{state}: {}", self.id));
    }

    /// Clear the spinner and print the settled state and the job view.
    pub fn complete(&self, view: &JobView) {
        self.pb.finish_and_clear();
        let style = state_style(view.state);
        let mark = match view.state {
            JobState::Completed => "✓",
            JobState::Failed => "✗",
            _ => "■",
        };
        println!(
            "  {} Job {} {}",
            style.apply_to(mark),
            view.id,
            style.apply_to(view.state)
        );
        println!("{}", serde_json::to_string_pretty(view).unwrap_or_default());
    }
}

/// Prints one line per lifecycle call, as the demo walks through them.
pub struct StepPrinter {
    green: Style,
    red: Style,
    dim: Style,
}

impl Default for StepPrinter {
    fn default() -> Self {
        Self {
            green: Style::new().green(),
            red: Style::new().red(),
            dim: Style::new().dim(),
        }
    }
}

impl StepPrinter {
    pub fn section(&self, title: &str) {
        println!();
        println!("{}", self.dim.apply_to(format!("─── {title} ───")));
    }

    pub fn ok(&self, action: &str, detail: impl Display) {
        println!("  {} {action}: {detail}", self.green.apply_to("✓"));
    }

    /// A call the engine refused, with the HTTP status it maps to.
    pub fn rejected(&self, action: &str, err: &JobError) {
        println!(
            "  {} {action}: {} {err}",
            self.red.apply_to("✗"),
            self.red.apply_to(err.status_code())
        );
    }

    pub fn state(&self, id: JobId, state: JobState) {
        println!(
            "  {} {id} is {}",
            self.dim.apply_to("·"),
            state_style(state).apply_to(state)
        );
    }
}
