mod common;

#[cfg(all(test, unix))]
mod tests {
    use crate::common::{ConfigFixture, LogCapture};
    use keel::{App, AppError};
    use std::future::pending;

    #[test]
    fn second_sigterm_gives_up_on_workers() {
        // Given
        let fixture = ConfigFixture::new("app:\n  panicwatch: false\n");
        let logs = LogCapture::default();

        let app = App::new();
        app.with_config_file(fixture.path())
            .with_log_output(logs.clone())
            .with_tracing_config(|config| {
                config.set_colors(false);
            });

        // When
        let outcome = app.try_run(|ctx| async move {
            ctx.start_worker(pending::<()>());

            unsafe {
                libc::raise(libc::SIGTERM);
            }
            ctx.terminated().await;

            unsafe {
                libc::raise(libc::SIGTERM);
            }
        });

        // Then
        let workers = match outcome {
            Err(AppError::Abandoned { workers }) => workers,
            other => panic!("unexpected outcome: {other:?}"),
        };
        assert!(workers >= 1);

        let output = logs.contents();
        assert!(output.contains("Repeated termination signal intercepted"), "{output}");
        assert!(output.contains("Gave up waiting for workers"), "{output}");
        assert!(!output.contains("All workers finished"), "{output}");
    }
}
