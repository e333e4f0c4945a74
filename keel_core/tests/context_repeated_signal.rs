#[cfg(all(test, unix))]
mod tests {
    use keel_core::AppContext;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn second_sigterm_abandons_stuck_workers() {
        // Given
        let ctx = AppContext::new();
        ctx.listening(&[]).unwrap();
        ctx.start_worker(std::future::pending::<()>());

        // When
        unsafe {
            libc::raise(libc::SIGTERM);
        }
        tokio::time::timeout(Duration::from_secs(5), ctx.terminated())
            .await
            .unwrap();

        // Then
        assert!(!ctx.is_abandoned());

        // When
        unsafe {
            libc::raise(libc::SIGTERM);
        }
        tokio::time::timeout(Duration::from_secs(5), ctx.abandoned())
            .await
            .unwrap();

        // Then
        assert!(ctx.is_abandoned());
        assert_eq!(ctx.workers(), 1);
    }
}
