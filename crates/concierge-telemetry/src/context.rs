//! Per-invocation command span.
//!
//! Every event emitted while a command runs carries the command name, the
//! request trace id and the build SHA; the exit code is filled in at the end.
//! The span is attached with `Instrument` rather than entered, so the command
//! future stays `Send`.

use tracing::Span;
use tracing::field::Empty;

use crate::init::build_sha;

/// Span for one invocation of `command`, tagged with `trace_id`.
#[must_use]
pub fn command_span(command: &str, trace_id: &str) -> Span {
    tracing::info_span!(
        "command",
        command,
        trace_id,
        build_sha = build_sha(),
        exit_code = Empty,
    )
}

/// Record the process exit code on a span built by [`command_span`].
pub fn record_exit_code(span: &Span, code: i32) {
    span.record("exit_code", code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_span_accepts_exit_code() {
        let span = command_span("users.ls", "trace-1");
        record_exit_code(&span, 2);
        let _entered = span.enter();
        tracing::info!("inside command span");
    }
}
