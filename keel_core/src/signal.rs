use std::fmt::{Display, Formatter};
use std::io;

/// An OS signal that requests the application to shut down.
///
/// On non-Unix platforms every variant is served by the `ctrl_c` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationSignal {
    /// `SIGHUP`
    Hangup,
    /// `SIGINT`
    Interrupt,
    /// `SIGTERM`
    Terminate,
    /// `SIGQUIT`
    Quit,
    /// `SIGUSR1`
    User1,
    /// `SIGUSR2`
    User2,
}

impl TerminationSignal {
    /// The signals observed when none are given explicitly: hangup, interrupt
    /// and terminate.
    pub const DEFAULTS: &'static [Self] = &[Self::Hangup, Self::Interrupt, Self::Terminate];

    /// The conventional name of this signal.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hangup => "SIGHUP",
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Quit => "SIGQUIT",
            Self::User1 => "SIGUSR1",
            Self::User2 => "SIGUSR2",
        }
    }

    #[cfg(unix)]
    fn kind(&self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            Self::Hangup => SignalKind::hangup(),
            Self::Interrupt => SignalKind::interrupt(),
            Self::Terminate => SignalKind::terminate(),
            Self::Quit => SignalKind::quit(),
            Self::User1 => SignalKind::user_defined1(),
            Self::User2 => SignalKind::user_defined2(),
        }
    }
}

impl Display for TerminationSignal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Owns the OS-level subscriptions for a set of [`TerminationSignal`]s.
/// Dropping the listener releases them.
pub(crate) struct SignalListener {
    #[cfg(unix)]
    streams: Vec<(TerminationSignal, tokio::signal::unix::Signal)>,
    #[cfg(not(unix))]
    signals: Vec<TerminationSignal>,
}

impl SignalListener {
    /// Subscribes to the given signals. An empty slice selects
    /// [`TerminationSignal::DEFAULTS`].
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn subscribe(signals: &[TerminationSignal]) -> io::Result<Self> {
        let signals = if signals.is_empty() {
            TerminationSignal::DEFAULTS
        } else {
            signals
        };

        let mut unique: Vec<TerminationSignal> = Vec::with_capacity(signals.len());
        for signal in signals {
            if !unique.contains(signal) {
                unique.push(*signal);
            }
        }

        #[cfg(unix)]
        {
            let streams = unique
                .into_iter()
                .map(|signal| Ok((signal, tokio::signal::unix::signal(signal.kind())?)))
                .collect::<io::Result<Vec<_>>>()?;

            Ok(Self { streams })
        }

        #[cfg(not(unix))]
        {
            Ok(Self { signals: unique })
        }
    }

    /// Waits for the next delivery of any subscribed signal.
    #[cfg(unix)]
    pub(crate) async fn recv(&mut self) -> TerminationSignal {
        use futures::FutureExt;

        let deliveries = self.streams.iter_mut().map(|(signal, stream)| {
            let signal = *signal;
            async move {
                match stream.recv().await {
                    Some(()) => signal,
                    None => std::future::pending().await,
                }
            }
            .boxed()
        });

        let (signal, _, _) = futures::future::select_all(deliveries).await;

        signal
    }

    /// Waits for the next `ctrl_c` action.
    #[cfg(not(unix))]
    pub(crate) async fn recv(&mut self) -> TerminationSignal {
        match tokio::signal::ctrl_c().await {
            Ok(()) => self
                .signals
                .first()
                .copied()
                .unwrap_or(TerminationSignal::Interrupt),
            Err(_) => std::future::pending().await,
        }
    }
}
