use keel_core::TimePolicy;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Renders log timestamps in UTC or local time, as the process-wide
/// [`TimePolicy`] says at the moment of each event.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyTime;

impl FormatTime for PolicyTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        match TimePolicy::current() {
            TimePolicy::Utc => write!(w, "{}Z", chrono::Utc::now().format(FORMAT)),
            TimePolicy::Local => write!(w, "{}", chrono::Local::now().format(FORMAT)),
        }
    }
}
