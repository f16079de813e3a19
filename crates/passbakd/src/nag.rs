//! Nag loop - repeats a reminder until a condition holds.
//!
//! Used to ask the user to plug in the backup medium. One session owns
//! one notification bubble: the first display is tracked with `-p`, every
//! later display replaces it with `-r`, so the user sees a single
//! persistent reminder instead of a stack of copies. Once the condition
//! holds the bubble is left to expire on its own.

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::debug;

use passbak_common::config::NagSettings;
use passbak_common::{ArgsError, Notifier, WatchdogError};

/// Timing for a reminder session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NagPolicy {
    /// Pause between re-displays.
    pub redisplay_interval: Duration,
    /// Expiry handed to the notification server per display.
    pub expiry: Duration,
    /// Give up and fail after this long, if set.
    pub give_up_after: Option<Duration>,
}

impl NagPolicy {
    /// The re-display interval must stay below the expiry, otherwise the
    /// bubble dies between displays and flickers back instead of
    /// persisting.
    pub fn new(redisplay_interval: Duration, expiry: Duration) -> Result<Self, ArgsError> {
        if redisplay_interval >= expiry {
            return Err(ArgsError::BadNagPolicy {
                interval_ms: redisplay_interval.as_millis() as u64,
                expiry_ms: expiry.as_millis() as u64,
            });
        }
        Ok(Self {
            redisplay_interval,
            expiry,
            give_up_after: None,
        })
    }

    pub fn from_settings(settings: &NagSettings) -> Result<Self, ArgsError> {
        let policy = Self::new(
            Duration::from_millis(settings.redisplay_interval_ms),
            Duration::from_millis(settings.expiry_ms),
        )?;
        Ok(match settings.give_up_after_secs {
            Some(secs) => policy.with_give_up(Duration::from_secs(secs)),
            None => policy,
        })
    }

    /// Caps how long a session may nag before failing.
    pub fn with_give_up(mut self, deadline: Duration) -> Self {
        self.give_up_after = Some(deadline);
        self
    }
}

/// One reminder session against one notification bubble.
///
/// Running consumes the session; the next change cycle builds a fresh
/// one and gets a fresh bubble.
pub struct NagSession<'a, N: Notifier> {
    notifier: &'a N,
    policy: NagPolicy,
}

impl<'a, N: Notifier> NagSession<'a, N> {
    pub fn new(notifier: &'a N, policy: NagPolicy) -> Self {
        Self { notifier, policy }
    }

    /// Nags until `condition` reports true.
    ///
    /// The condition is checked before anything is displayed, so a
    /// condition that already holds produces no notification at all.
    /// Errors from the condition or the transport end the session.
    pub async fn run<F>(
        self,
        summary: &str,
        body: &str,
        mut condition: F,
    ) -> Result<(), WatchdogError>
    where
        F: FnMut() -> Result<bool, WatchdogError>,
    {
        if condition()? {
            return Ok(());
        }

        let started = Instant::now();
        let handle = self
            .notifier
            .send_tracked(summary, body, self.policy.expiry)?;
        debug!(id = handle.id(), "reminder displayed");

        while !condition()? {
            if let Some(give_up) = self.policy.give_up_after {
                let waited = started.elapsed();
                if waited >= give_up {
                    return Err(WatchdogError::NagTimeout { waited });
                }
            }
            self.notifier
                .replace(handle, summary, body, self.policy.expiry)?;
            sleep(self.policy.redisplay_interval).await;
        }

        debug!(id = handle.id(), "reminder satisfied");
        Ok(())
    }
}
