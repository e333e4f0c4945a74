mod common;

#[cfg(all(test, unix))]
mod tests {
    use crate::common::vehicle::ContextTestVehicle;
    use keel_core::TerminationSignal;
    use std::time::Duration;

    #[tokio::test]
    async fn custom_signal() {
        // Given
        let mut vehicle = ContextTestVehicle::new();
        vehicle
            .ctx()
            .listening(&[TerminationSignal::User2])
            .unwrap();
        vehicle.start_waiting_worker().await;

        // When
        unsafe {
            libc::raise(libc::SIGUSR2);
        }
        tokio::time::timeout(Duration::from_secs(5), vehicle.ctx().terminated())
            .await
            .unwrap();
        vehicle.ctx().workers_finished().await;

        // Then
        vehicle.assert_workers_finished();
    }
}
