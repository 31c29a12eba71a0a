use std::fmt;

/// The stages of a flowsheet run and of a mass-balance closure, in the order
/// `closemb` passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Execution,
    BoundaryConstruction,
    Reconciliation,
    Application,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Execution => "Flowsheet execution",
            Stage::BoundaryConstruction => "Boundary construction",
            Stage::Reconciliation => "Reconciliation",
            Stage::Application => "Applying corrections",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One accepted step of the reconciliation minimiser.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverStep {
    /// Counts from 1.
    pub iteration: usize,
    pub objective: f64,
    /// Infinity norm of the gradient after the step.
    pub gradient_norm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    StageStarted(Stage),
    StageFinished(Stage),
    /// A unit operation finished computing its outlets; `index` counts from 1.
    UnitOpExecuted {
        name: String,
        index: usize,
        total: usize,
    },
    SolverStep(SolverStep),
    /// Free-form summary line, e.g. the outcome of a workflow.
    Note(String),
}

pub type ProgressSink<'a> = Box<dyn Fn(&Progress) + Send + Sync + 'a>;

/// Delivers [`Progress`] events to an optional sink.
///
/// Engine entry points take a reporter by reference; a silent reporter costs
/// one branch per event.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    sink: Option<ProgressSink<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: ProgressSink<'a>) -> Self {
        Self { sink: Some(sink) }
    }

    #[inline]
    pub fn emit(&self, event: Progress) {
        if let Some(sink) = &self.sink {
            sink(&event);
        }
    }

    /// Runs `f` as `stage`. `StageFinished` is only emitted when `f` succeeds,
    /// so a sink sees an unfinished stage for every failure.
    pub fn stage<T, E>(&self, stage: Stage, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        self.emit(Progress::StageStarted(stage));
        let value = f()?;
        self.emit(Progress::StageFinished(stage));
        Ok(value)
    }
}
