use std::sync::atomic::{AtomicBool, Ordering};

static LOCAL: AtomicBool = AtomicBool::new(false);

/// The process-wide choice of clock for rendered timestamps.
///
/// The policy is [installed](TimePolicy::install) once during start-up and
/// read by anything that renders wall-clock time (e.g., log lines). Until
/// then, [`TimePolicy::Utc`] is in effect.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TimePolicy {
    /// Render timestamps in UTC.
    #[default]
    Utc,
    /// Render timestamps in the local timezone of the host.
    Local,
}

impl TimePolicy {
    /// Picks the policy matching a "use local time" flag.
    pub fn from_local_flag(local: bool) -> Self {
        if local { Self::Local } else { Self::Utc }
    }

    /// Makes this policy the process-wide one.
    pub fn install(self) {
        LOCAL.store(self == Self::Local, Ordering::Release);
    }

    /// The policy currently in effect for the process.
    pub fn current() -> Self {
        Self::from_local_flag(LOCAL.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn install_and_read_back() {
        // Given
        assert_eq!(TimePolicy::from_local_flag(true), TimePolicy::Local);
        assert_eq!(TimePolicy::from_local_flag(false), TimePolicy::Utc);

        // When
        TimePolicy::Local.install();

        // Then
        assert_eq!(TimePolicy::current(), TimePolicy::Local);

        // When
        TimePolicy::Utc.install();

        // Then
        assert_eq!(TimePolicy::current(), TimePolicy::Utc);
    }
}
