use crate::app::{AppError, AppOutcome, Setup, StartupError};
use crate::crash::start_crash_monitor;
use crate::logging::LoggingGuard;
use crate::pipeline::Pipeline;
use keel_config::{ConfigLocator, Document};
use keel_core::{AppContext, TimePolicy};
use keel_sync::Latch;
use std::future::Future;
use tokio::runtime::{Builder, Runtime};
use tracing::{error, info};

/// How the application's entry point relates to the application's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// The entry point is the application: its return shuts everything down.
    Run,
    /// The entry point registers workers and returns; the application lives
    /// on until a shutdown is requested.
    Start,
}

/// Drives one application from its [`Setup`] to its end.
///
/// The start-up goes through these stages, in order:
///
/// 1. **Runtime:** the multi-threaded Tokio runtime and the [`AppContext`],
///    which starts listening for termination signals.
/// 2. **Configuration:** the configuration document is located and parsed,
///    and the core settings are decoded from it.
/// 3. **Logging:** the time policy is installed, the global logger is built,
///    and a Sentry client is bound when a DSN is configured.
/// 4. **Crash monitor:** started only when the settings ask for it.
/// 5. **Extensions:** every extension is initialized, then every extension
///    is started, both in registration order.
///
/// Any failure aborts the start-up before the entry point runs. Failures
/// after stage 3 are logged before the logger is flushed.
///
/// Once running, a repeated termination signal makes the launchpad stop
/// waiting for the workers: the runtime is shut down without them, and the
/// logger is still flushed before the failure is reported.
pub(crate) struct Launchpad {
    setup: Setup,
}

impl Launchpad {
    pub(crate) fn new(setup: Setup) -> Self {
        Self { setup }
    }

    /// Runs the application to its end and reports how it ended.
    pub(crate) fn launch<F, Fut>(self, mode: Mode, entry: F) -> Result<AppOutcome, AppError>
    where
        F: FnOnce(AppContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = Self::make_runtime()?;
        let ctx = AppContext::new();

        let mut logging = None;
        let outcome = runtime.block_on(self.boot(&ctx, &mut logging, mode, entry));
        let stranded = ctx.workers();

        // Let every detached task go before the logger is flushed. Abandoned
        // workers may never return, so they are not waited for.
        if ctx.is_abandoned() {
            runtime.shutdown_background();
        } else {
            drop(runtime);
        }

        let outcome = outcome.map_err(|error| {
            if logging.is_some() {
                error.log();
            }
            AppError::Startup(error)
        })?;

        if ctx.is_abandoned() {
            error!(workers = stranded, "Gave up waiting for workers");
            return Err(AppError::Abandoned { workers: stranded });
        }

        if ctx.faults() > 0 {
            error!(faults = ctx.faults(), "Some workers panicked");
            return Err(AppError::WorkerFault {
                faults: ctx.faults(),
            });
        }

        Ok(outcome)
    }

    fn make_runtime() -> Result<Runtime, StartupError> {
        Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(StartupError::Runtime)
    }

    async fn boot<F, Fut>(
        self,
        ctx: &AppContext,
        logging: &mut Option<LoggingGuard>,
        mode: Mode,
        entry: F,
    ) -> Result<AppOutcome, StartupError>
    where
        F: FnOnce(AppContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Setup {
            config_file,
            env_overrides,
            signals,
            mut extensions,
            tracing_override,
            sentry_override,
            crash_monitor_override,
            log_output,
        } = self.setup;

        // Runtime
        ctx.listening(&signals).map_err(StartupError::Signals)?;

        // Configuration
        let locator = match config_file {
            Some(path) => ConfigLocator::new(path),
            None => ConfigLocator::from_env()?,
        };
        let document = Document::load(&locator.locate()?, env_overrides.as_ref())?;
        let pipeline = Pipeline::new(&document, &extensions);
        let settings = pipeline.core_settings().map_err(StartupError::Settings)?;

        // Logging
        TimePolicy::from_local_flag(settings.local_time()).install();

        let mut tracing_config = settings.logger().clone();
        if let Some(customize) = tracing_override {
            customize(&mut tracing_config);
        }
        let guard = logging.insert(LoggingGuard::install(&tracing_config, log_output)?);

        guard.attach_sentry(settings.sentry(), |options| {
            if let Some(customize) = sentry_override {
                customize(options);
            }
        })?;

        // Crash monitor
        if settings.panicwatch() {
            start_crash_monitor(ctx, guard.has_sentry(), |config, ctx| {
                if let Some(customize) = crash_monitor_override {
                    customize(config, ctx);
                }
            })?;
        }

        // Extensions
        pipeline.initialize(&mut extensions)?;
        for record in extensions.iter_mut() {
            record.extension().start(ctx);
        }

        Ok(match mode {
            Mode::Run => Self::run(ctx, entry).await,
            Mode::Start => Self::start(ctx, entry).await,
        })
    }

    /// Runs the entry point as a worker and shuts down once it returns.
    ///
    /// Reports [`AppOutcome::Completed`] when the entry point returned before
    /// a shutdown was observed, and [`AppOutcome::Terminated`] otherwise.
    async fn run<F, Fut>(ctx: &AppContext, entry: F) -> AppOutcome
    where
        F: FnOnce(AppContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let finished = Latch::new();
        let finished_gate = finished.gate();
        let main = entry(ctx.clone());

        let main_ctx = ctx.clone();
        ctx.start_worker(async move {
            info!("Running the application");
            main.await;
            if !main_ctx.is_shutting_down() {
                finished.release();
            }
            main_ctx.shutdown();
        });

        // The completion marker is only released by an entry point that
        // returned ahead of any shutdown, and before it requests its own
        let announcer_ctx = ctx.clone();
        let announcer = tokio::spawn(async move {
            announcer_ctx.terminated().await;

            if finished_gate.is_open() {
                info!("Application finished");
                AppOutcome::Completed
            } else {
                info!("Received termination signal, application should finish soon");
                AppOutcome::Terminated
            }
        });

        let finished = Self::wait_for_workers(ctx).await;
        let outcome = announcer.await.unwrap_or(AppOutcome::Terminated);

        if finished {
            info!("All workers finished, exiting now");
        }

        outcome
    }

    /// Runs the entry point as a worker and waits for a shutdown, then for
    /// every worker.
    async fn start<F, Fut>(ctx: &AppContext, entry: F) -> AppOutcome
    where
        F: FnOnce(AppContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let main = entry(ctx.clone());

        ctx.start_worker(async move {
            info!("Starting the application");
            main.await;
            info!("Application started");
        });

        let watcher_ctx = ctx.clone();
        ctx.start_worker(async move {
            watcher_ctx.terminated().await;
            info!("Application is shutting down");
        });

        if Self::wait_for_workers(ctx).await {
            info!("All workers finished, exiting now");
        }

        AppOutcome::Terminated
    }

    /// Waits for every worker, unless they are abandoned first. Reports
    /// whether they all finished.
    async fn wait_for_workers(ctx: &AppContext) -> bool {
        tokio::select! {
            biased;
            _ = ctx.workers_finished() => true,
            _ = ctx.abandoned() => false,
        }
    }
}
