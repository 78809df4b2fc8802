use test_log::tracing_subscriber::{EnvFilter, FmtSubscriber, fmt::format::FmtSpan};

/// Install a subscriber for harness driven tests.
///
/// Events are filtered by `RUST_LOG`. Span events are selected with
/// `RUST_LOG_SPAN_EVENTS`, a comma separated list of `new`, `enter`, `exit`,
/// `close`, `active` and `full`.
pub fn init_test_tracing() {
    let _ = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_span_events(span_events(std::env::var("RUST_LOG_SPAN_EVENTS").ok().as_deref()))
        .with_test_writer()
        .try_init();
}

fn span_events(value: Option<&str>) -> FmtSpan {
    let Some(value) = value else {
        return FmtSpan::NONE;
    };

    value
        .split(',')
        .map(|filter| match filter.trim().to_ascii_lowercase().as_str() {
            "new" => FmtSpan::NEW,
            "enter" => FmtSpan::ENTER,
            "exit" => FmtSpan::EXIT,
            "close" => FmtSpan::CLOSE,
            "active" => FmtSpan::ACTIVE,
            "full" => FmtSpan::FULL,
            other => panic!(
                "RUST_LOG_SPAN_EVENTS must contain filters separated by `,`, \
                 one of new, enter, exit, close, active, full. Got: {other}"
            ),
        })
        .fold(FmtSpan::NONE, |acc, filter| filter | acc)
}
