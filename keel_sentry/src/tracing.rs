use keel_core::{ALERT_FIELD_NAME, PANIC_FIELD_NAME};
use sentry_tracing::{EventMapping, SentryLayer};
use std::error::Error;
use std::fmt::Debug;
use tracing::field::Field;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::field::Visit;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// Creates a [`SentryLayer`] with a custom event mapper that decides, for
/// every `tracing` event, what (if anything) to send to Sentry.
///
/// This layer should be included in the global default [`Subscriber`]. When
/// no Sentry client is bound, it does nothing.
///
/// The decision goes as follows:
///
/// - events carrying the field [`PANIC_FIELD_NAME`] are ignored: they
///   describe panics the crash monitor already reported;
/// - events carrying the field [`ALERT_FIELD_NAME`] generate a Sentry event,
///   or a breadcrumb when the field's value is `"breadcrumb"` (or
///   `"crumb"`), regardless of their level;
/// - otherwise, `ERROR` and `WARN` events generate Sentry events, `INFO`
///   events become breadcrumbs, and everything else is ignored.
///
/// ## Examples
///
/// ```
/// // Warnings and errors are reported
/// tracing::warn!(retries = 3, "Upstream is flaky");
///
/// // Force a report for a lower level
/// tracing::info!(alert = true, "Cache rebuilt from scratch");
///
/// // Downgrade to a breadcrumb
/// tracing::error!(alert = "breadcrumb", "Expected failure while probing");
/// ```
pub fn make_layer<S>() -> SentryLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    sentry_tracing::layer().event_mapper(field_walker)
}

/// Takes a tracing event and visits its fields to make a decision about whether to send the event
/// to Sentry. Returns the appropriate [`EventMapping`].
fn field_walker<S>(event: &Event, ctx: Context<'_, S>) -> EventMapping
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let mut visitor = SentryBehaviorVisitor::default();
    event.record(&mut visitor);

    match visitor.decide(*event.metadata().level()) {
        None => EventMapping::Ignore,
        Some(SentryEventKind::Event) => {
            EventMapping::Event(sentry_tracing::event_from_event(event, &ctx))
        }
        Some(SentryEventKind::Breadcrumb) => {
            EventMapping::Breadcrumb(sentry_tracing::breadcrumb_from_event(event, &ctx))
        }
    }
}

/// Helper structure for visiting every field on a tracing event. Stores the
/// result of the visit.
#[derive(Default)]
struct SentryBehaviorVisitor {
    alert: Option<SentryEventKind>,
    panic: bool,
}

impl SentryBehaviorVisitor {
    fn decide(&self, level: Level) -> Option<SentryEventKind> {
        if self.panic {
            return None;
        }

        if let Some(kind) = self.alert {
            return Some(kind);
        }

        match level {
            Level::ERROR | Level::WARN => Some(SentryEventKind::Event),
            Level::INFO => Some(SentryEventKind::Breadcrumb),
            _ => None,
        }
    }

    #[inline(always)]
    fn match_field(&mut self, field: &Field) {
        match field.name() {
            ALERT_FIELD_NAME => self.alert = Some(SentryEventKind::Event),
            PANIC_FIELD_NAME => self.panic = true,
            _ => {}
        }
    }
}

impl Visit for SentryBehaviorVisitor {
    fn record_f64(&mut self, field: &Field, _value: f64) {
        self.match_field(field);
    }

    fn record_i64(&mut self, field: &Field, _value: i64) {
        self.match_field(field);
    }

    fn record_u64(&mut self, field: &Field, _value: u64) {
        self.match_field(field);
    }

    fn record_i128(&mut self, field: &Field, _value: i128) {
        self.match_field(field);
    }

    fn record_u128(&mut self, field: &Field, _value: u128) {
        self.match_field(field);
    }

    fn record_bool(&mut self, field: &Field, _value: bool) {
        self.match_field(field);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == ALERT_FIELD_NAME {
            self.alert = Some(SentryEventKind::from_alert(value));
        } else {
            self.match_field(field);
        }
    }

    fn record_bytes(&mut self, field: &Field, _value: &[u8]) {
        self.match_field(field);
    }

    fn record_error(&mut self, field: &Field, _value: &(dyn Error + 'static)) {
        self.match_field(field);
    }

    fn record_debug(&mut self, field: &Field, _value: &dyn Debug) {
        self.match_field(field);
    }
}

/// Represents the supported kinds of Sentry events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SentryEventKind {
    Event,
    Breadcrumb,
}

impl SentryEventKind {
    /// Parses the recognized string literals assigned to the
    /// [`ALERT_FIELD_NAME`] field.
    fn from_alert(value: &str) -> Self {
        match value {
            "breadcrumb" | "crumb" => Self::Breadcrumb,
            _ => Self::Event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sentry::protocol::Level as SentryLevel;
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn decisions() {
        // Given
        let plain = SentryBehaviorVisitor::default();
        let alert = SentryBehaviorVisitor {
            alert: Some(SentryEventKind::Event),
            panic: false,
        };
        let crumb = SentryBehaviorVisitor {
            alert: Some(SentryEventKind::Breadcrumb),
            panic: false,
        };
        let panic = SentryBehaviorVisitor {
            alert: Some(SentryEventKind::Event),
            panic: true,
        };

        // Then
        assert_eq!(plain.decide(Level::ERROR), Some(SentryEventKind::Event));
        assert_eq!(plain.decide(Level::WARN), Some(SentryEventKind::Event));
        assert_eq!(plain.decide(Level::INFO), Some(SentryEventKind::Breadcrumb));
        assert_eq!(plain.decide(Level::DEBUG), None);
        assert_eq!(alert.decide(Level::TRACE), Some(SentryEventKind::Event));
        assert_eq!(crumb.decide(Level::ERROR), Some(SentryEventKind::Breadcrumb));
        assert_eq!(panic.decide(Level::ERROR), None);
    }

    #[test]
    fn events_reach_the_hub() {
        // Given
        let subscriber = Registry::default().with(make_layer());

        // When
        let events = sentry::test::with_captured_events(|| {
            tracing::subscriber::with_default(subscriber, || {
                tracing::error!("first");
                tracing::warn!("second");
                tracing::info!(alert = true, "third");
                tracing::error!(panic = "already reported", "ignored");
                tracing::error!(alert = "breadcrumb", "crumb");
                tracing::debug!("ignored too");
            });
        });

        // Then
        let levels = events.iter().map(|event| event.level).collect::<Vec<_>>();
        assert_eq!(
            levels,
            vec![SentryLevel::Error, SentryLevel::Warning, SentryLevel::Info],
        );
    }
}
