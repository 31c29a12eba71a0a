use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use massbal::engine::progress::{Progress, ProgressReporter, SolverStep, Stage};
use std::time::Duration;

const SPINNER_TICK_MS: u64 = 80;

/// Draws engine progress on one stderr line.
///
/// Flowsheet execution gets a bar counting unit operations; every other stage
/// is a spinner, which the reconciliation stage labels with the solver state.
#[derive(Clone)]
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    pub fn stderr() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            bar: ProgressBar::with_draw_target(Some(0), target),
        }
    }

    /// A reporter that renders into this display; it may be moved to other
    /// threads.
    pub fn reporter(&self) -> ProgressReporter<'static> {
        let bar = self.bar.clone();
        ProgressReporter::with_sink(Box::new(move |event| render(&bar, event)))
    }
}

fn render(bar: &ProgressBar, event: &Progress) {
    match event {
        Progress::StageStarted(Stage::Execution) => {
            bar.reset();
            bar.set_style(unit_op_style());
            bar.set_prefix(Stage::Execution.label());
            bar.set_length(0);
            bar.set_message("");
        }
        Progress::StageStarted(stage) => {
            bar.reset();
            bar.set_style(spinner_style());
            bar.set_message(stage.label());
            bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
        }
        Progress::UnitOpExecuted { name, index, total } => {
            bar.set_length(*total as u64);
            bar.set_position(*index as u64);
            bar.set_message(name.clone());
        }
        Progress::SolverStep(step) => bar.set_message(solver_message(step)),
        Progress::StageFinished(stage) => {
            bar.disable_steady_tick();
            bar.finish_with_message(format!("✓ {stage}"));
        }
        Progress::Note(text) => bar.println(format!("  {text}")),
    }
}

fn solver_message(step: &SolverStep) -> String {
    format!(
        "{}: iteration {}, objective {:.3e}, gradient {:.1e}",
        Stage::Reconciliation,
        step.iteration,
        step.objective,
        step.gradient_norm
    )
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn unit_op_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}
