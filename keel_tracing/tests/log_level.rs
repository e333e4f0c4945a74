use keel_tracing::{
    LogLevel, LogLevelError, Registry, SubscriberExt, SubscriberInitExt, TracingConfig, Verbosity,
    make_layer,
};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::MakeWriter;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Capture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn process_wide_level() {
    // Uninitialized
    assert!(!LogLevel::is_initialized());
    assert!(matches!(LogLevel::get(), Err(LogLevelError::Uninitialized)));
    assert!(matches!(LogLevel::set(Verbosity::Debug), Err(LogLevelError::Uninitialized)));

    // Given
    let capture = Capture::default();
    let config = TracingConfig::default().with_target("muted", Verbosity::Off);
    Registry::default()
        .with(LogLevel::layer(config.verbosity()))
        .with(make_layer(&config, capture.clone()))
        .try_init()
        .unwrap();

    // Then
    assert!(LogLevel::is_initialized());
    assert_eq!(LogLevel::get().unwrap(), Verbosity::Info);

    // When
    tracing::info!("first info");
    tracing::debug!("hidden debug");
    tracing::error!(target: "muted", "muted error");

    // Then
    let output = capture.contents();
    assert!(output.contains("first info"), "{output}");
    assert!(!output.contains("hidden debug"), "{output}");
    assert!(!output.contains("muted error"), "{output}");

    // When
    LogLevel::set(Verbosity::Debug).unwrap();
    tracing::debug!("visible debug");

    // Then
    assert_eq!(LogLevel::get().unwrap(), Verbosity::Debug);
    assert!(capture.contents().contains("visible debug"));

    // When
    std::thread::spawn(|| LogLevel::set(Verbosity::Warn))
        .join()
        .unwrap()
        .unwrap();
    tracing::info!("suppressed info");
    tracing::warn!("loud warning");

    // Then
    let output = capture.contents();
    assert_eq!(LogLevel::get().unwrap(), Verbosity::Warn);
    assert!(!output.contains("suppressed info"), "{output}");
    assert!(output.contains("loud warning"), "{output}");
}
