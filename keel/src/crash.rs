use keel_core::{AppContext, CrashMonitor, CrashMonitorConfig, CrashMonitorError};
use tracing::error;

/// Starts the process-wide [`CrashMonitor`] with the default reaction to a
/// panic: report it to Sentry (when a client is bound), log it, and shut the
/// application down. The reaction may be adjusted by `customize` before the
/// monitor starts.
pub(crate) fn start_crash_monitor(
    ctx: &AppContext,
    sentry: bool,
    customize: impl FnOnce(&mut CrashMonitorConfig, &AppContext),
) -> Result<(), CrashMonitorError> {
    let mut config = CrashMonitorConfig::new();

    if sentry {
        config.on_panic(|report| {
            keel_sentry::report_panic(report);
        });
    }

    config.on_panic(|report| {
        let thread = report.thread().unwrap_or("<unnamed>");
        error!(panic = %report, thread, "Panic observed");
    });

    let shutdown_ctx = ctx.clone();
    config.on_panic(move |_| {
        shutdown_ctx.shutdown();
    });

    customize(&mut config, ctx);

    CrashMonitor::start(config)
}
