use keel_core::PanicReport;
use sentry::protocol::{Event, Exception, Frame, Level, Mechanism, Stacktrace};
use sentry::types::Uuid;

/// Builds a fatal event describing the given panic: a single `panic`
/// exception carrying the panic message and a stack trace.
///
/// When called from inside the panic hook (as the
/// [`CrashMonitor`](keel_core::CrashMonitor) does), the stack trace is
/// reconstructed from the current thread's stack. Otherwise it falls back to
/// a single frame at the panic location, if known.
pub fn panic_event(report: &PanicReport) -> Event<'static> {
    let stacktrace =
        sentry::integrations::backtrace::current_stacktrace().or_else(|| location_stacktrace(report));

    let mut event = Event {
        level: Level::Fatal,
        message: Some(report.message().to_string()),
        exception: vec![Exception {
            ty: "panic".to_string(),
            value: Some(report.message().to_string()),
            stacktrace,
            mechanism: Some(Mechanism {
                ty: "panic".to_string(),
                handled: Some(false),
                ..Mechanism::default()
            }),
            ..Exception::default()
        }]
        .into(),
        ..Event::default()
    };

    if let Some(thread) = report.thread() {
        event.tags.insert("thread".to_string(), thread.to_string());
    }

    event
}

/// Sends a [`panic_event`] for the given report through the current hub and
/// flushes the client, so that the event survives an imminent process exit.
pub fn report_panic(report: &PanicReport) -> Uuid {
    let id = sentry::capture_event(panic_event(report));

    if let Some(client) = sentry::Hub::current().client() {
        client.flush(None);
    }

    id
}

fn location_stacktrace(report: &PanicReport) -> Option<Stacktrace> {
    let location = report.location()?;

    Some(Stacktrace {
        frames: vec![Frame {
            filename: Some(location.file.clone()),
            lineno: Some(u64::from(location.line)),
            colno: Some(u64::from(location.column)),
            ..Frame::default()
        }],
        ..Stacktrace::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::PanicLocation;
    use pretty_assertions::assert_eq;

    #[test]
    fn fatal_panic_exception() {
        // Given
        let report = PanicReport::new(
            "index out of bounds",
            Some(PanicLocation {
                file: "src/worker.rs".to_string(),
                line: 12,
                column: 5,
            }),
        );

        // When
        let event = panic_event(&report);

        // Then
        assert_eq!(event.level, Level::Fatal);
        assert_eq!(event.message.as_deref(), Some("index out of bounds"));
        assert_eq!(event.exception.values.len(), 1);

        let exception = &event.exception.values[0];
        assert_eq!(exception.ty, "panic");
        assert_eq!(exception.value.as_deref(), Some("index out of bounds"));
        assert!(exception.stacktrace.is_some());
        assert_eq!(
            exception.mechanism.as_ref().and_then(|mechanism| mechanism.handled),
            Some(false),
        );
    }

    #[test]
    fn captured_through_hub() {
        // Given
        let report = PanicReport::new("boom", None);

        // When
        let events = sentry::test::with_captured_events(|| {
            report_panic(&report);
        });

        // Then
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Level::Fatal);
        assert_eq!(events[0].exception.values[0].ty, "panic");
    }
}
