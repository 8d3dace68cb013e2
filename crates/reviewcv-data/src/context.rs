use tracing::Span;

/// Logging context of one experiment run.
///
/// Every component that logs receives the context and records its events
/// inside the run's span, so that log lines of concurrent or successive runs
/// can be told apart.
#[derive(Debug, Clone)]
pub struct ExperimentContext {
    name: String,
    span: Span,
}

impl ExperimentContext {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let span = tracing::info_span!("experiment", run = %name);
        Self { name, span }
    }

    /// Context that records nothing, for tests and library callers without a
    /// subscriber.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            name: String::new(),
            span: Span::none(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Span for one stage of the run, nested in the run's span.
    #[must_use]
    pub fn stage(&self, stage: &'static str) -> Span {
        tracing::info_span!(parent: &self.span, "stage", stage)
    }
}
