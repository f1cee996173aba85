use std::future::Future;
use std::time::{Duration, Instant};

use tracing::Span;

use super::TraceId;

/// Root span for one process run.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "root",
        name = %name,
        trace_id = %trace_id
    )
}

/// Child of `parent`; inherits its trace id through the span tree.
pub fn child_span(parent: &Span, name: &'static str) -> Span {
    tracing::info_span!(
        parent: parent,
        "child",
        name = %name
    )
}

/// Await `fut` and warn when it took longer than `max`.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();

    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label,
            elapsed_ms = elapsed.as_millis() as u64,
            max_ms = max.as_millis() as u64,
            "slow operation"
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn child_events_carry_the_root_trace_id() {
        let trace_id = TraceId::new();
        let root = root_span("vwap", &trace_id);
        let child = child_span(&root, "dispatch");

        child.in_scope(|| {
            tracing::info!("inside child");
        });

        assert!(logs_contain("inside child"));
        assert!(logs_contain(&trace_id.to_string()));
    }

    #[tokio::test]
    async fn warn_if_slow_returns_the_output() {
        let out = warn_if_slow("noop", Duration::from_secs(5), async { 42 }).await;
        assert_eq!(out, 42);
    }
}
