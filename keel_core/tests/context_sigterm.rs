mod common;

#[cfg(all(test, unix))]
mod tests {
    use crate::common::vehicle::ContextTestVehicle;
    use keel_core::TerminationSignal;
    use std::time::Duration;

    #[tokio::test]
    async fn sigterm() {
        // Given
        let mut vehicle = ContextTestVehicle::new();
        vehicle.ctx().listening(&[]).unwrap();

        // When
        vehicle.start_waiting_worker().await;
        vehicle.start_waiting_worker().await;

        // Then
        vehicle.assert_workers_not_finished();

        // When
        unsafe {
            libc::raise(libc::SIGTERM);
        }
        tokio::time::timeout(Duration::from_secs(5), vehicle.ctx().workers_finished())
            .await
            .unwrap();

        // Then
        vehicle.assert_workers_finished();
        assert!(vehicle.ctx().is_shutting_down());

        // When listening is requested again
        let again = vehicle.ctx().listening(&[TerminationSignal::User1]);

        // Then
        assert!(again.is_ok());
    }
}
