// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Delivery of notification batches to the dispatcher.
//!
//! Two delivery modes exist:
//!
//! - [`NotificationMode::LongPolling`]: a background task repeatedly pulls
//!   `/notification/pull` and hands every non-empty batch to the
//!   [`Dispatcher`]. The task is controlled by a [`LongPoller`].
//! - [`NotificationMode::Webhook`]: the service pushes batches to a callback
//!   URL; the embedding HTTP server passes each request body to
//!   [`Client::handle_batch`](crate::Client::handle_batch).
//!
//! # Stopping
//!
//! Stopping is cooperative. The cancellation flag is checked at the top of
//! each iteration; a pull already in flight is not interrupted, and a batch it
//! returns is still dispatched.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::operation::{Operation, StatusClass};
use crate::transport::{ApiRequest, Transport};

/// How notification batches reach the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NotificationMode {
    /// The client pulls batches itself.
    #[default]
    LongPolling,
    /// Batches are pushed to a callback URL served by the embedder.
    Webhook,
}

/// Parameters of the long-poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    timeout: Duration,
    retry_delay: Duration,
    no_wait: bool,
}

impl PollSettings {
    /// Default timeout of one pull.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
    /// Default pause after a failed or empty immediate pull.
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

    /// Creates the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            retry_delay: Self::DEFAULT_RETRY_DELAY,
            no_wait: false,
        }
    }

    /// Sets the timeout of one pull.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the pause after a failed pull.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Asks the service to answer pulls immediately instead of holding them.
    #[must_use]
    pub fn with_no_wait(mut self, no_wait: bool) -> Self {
        self.no_wait = no_wait;
        self
    }

    /// Returns the timeout of one pull.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the pause after a failed pull.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Returns whether pulls are answered immediately.
    #[must_use]
    pub fn no_wait(&self) -> bool {
        self.no_wait
    }

    /// Builds the pull request.
    #[must_use]
    pub fn pull_request(&self) -> ApiRequest {
        let request = ApiRequest::get("/notification/pull")
            .unversioned()
            .with_timeout(self.timeout);
        if self.no_wait {
            request.with_query("noWait", "true")
        } else {
            request
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::new()
    }
}

struct PollTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owner of the long-poll task.
///
/// At most one task runs per poller. Starting while a task is alive, even one
/// that was asked to stop and has not exited yet, does nothing.
pub struct LongPoller<T: Transport> {
    transport: Arc<T>,
    dispatcher: Arc<Dispatcher>,
    settings: PollSettings,
    task: Mutex<Option<PollTask>>,
}

impl<T: Transport> LongPoller<T> {
    /// Creates a stopped poller.
    #[must_use]
    pub fn new(transport: Arc<T>, dispatcher: Arc<Dispatcher>, settings: PollSettings) -> Self {
        Self {
            transport,
            dispatcher,
            settings,
            task: Mutex::new(None),
        }
    }

    /// Returns the loop parameters.
    #[must_use]
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Spawns the polling task on the current tokio runtime.
    ///
    /// Returns `Ok(false)` and logs a warning if a task is already alive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuntimeUnavailable`] when called outside a tokio
    /// runtime.
    pub fn start(&self) -> Result<bool> {
        let runtime = Handle::try_current().map_err(|_| Error::RuntimeUnavailable)?;

        let mut task = self.task.lock();
        if let Some(existing) = task.as_ref()
            && !existing.handle.is_finished()
        {
            if existing.token.is_cancelled() {
                tracing::warn!("Long polling is still stopping, not starting a second loop");
            } else {
                tracing::warn!("Long polling already running");
            }
            return Ok(false);
        }

        let token = CancellationToken::new();
        let handle = runtime.spawn(run_long_poll(
            Arc::clone(&self.transport),
            Arc::clone(&self.dispatcher),
            self.settings,
            token.clone(),
        ));
        *task = Some(PollTask { token, handle });
        Ok(true)
    }

    /// Asks the polling task to stop after its current iteration.
    ///
    /// Returns `false` if no task was running.
    pub fn stop(&self) -> bool {
        match self.task.lock().as_ref() {
            Some(task) if !task.handle.is_finished() && !task.token.is_cancelled() => {
                tracing::info!("Stopping long polling");
                task.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Stops the polling task and waits until it has exited.
    pub async fn stop_and_wait(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.token.cancel();
            if let Err(e) = task.handle.await {
                tracing::error!(error = %e, "Long polling task failed");
            }
        }
    }

    /// Returns whether a polling task is alive and not asked to stop.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished() && !task.token.is_cancelled())
    }
}

impl<T: Transport> std::fmt::Debug for LongPoller<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongPoller")
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Drop for LongPoller<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.token.cancel();
        }
    }
}

/// Pulls batches until `token` is cancelled.
async fn run_long_poll<T: Transport>(
    transport: Arc<T>,
    dispatcher: Arc<Dispatcher>,
    settings: PollSettings,
    token: CancellationToken,
) {
    let request = settings.pull_request();
    let policy = Operation::LongPoll.default_policy();
    tracing::info!(no_wait = settings.no_wait, "Long polling started");

    while !token.is_cancelled() {
        let pause = match transport.execute(&request).await {
            Ok(response) => match policy.classify(response.status()) {
                StatusClass::Success if !response.body().iter().all(u8::is_ascii_whitespace) => {
                    let report = dispatcher.handle_batch(response.body());
                    tracing::trace!(?report, "Pulled notification batch");
                    false
                }
                StatusClass::Success => {
                    tracing::trace!(status = response.status(), "No notifications pending");
                    settings.no_wait
                }
                StatusClass::Accepted | StatusClass::Failure => {
                    tracing::warn!(
                        status = response.status(),
                        "Unexpected status from notification pull"
                    );
                    true
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Notification pull failed");
                true
            }
        };

        if pause {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(settings.retry_delay) => {}
            }
        }
    }

    tracing::info!("Long polling stopped");
}
