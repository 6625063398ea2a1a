//! Periodic, non-overlapping task runner
//!
//! A [`Scheduler`] runs a [`PeriodicTask`] once immediately on
//! [`start()`](Scheduler::start), then again `interval` after each run
//! *completes*. The next run is only armed once the previous one has
//! returned, so at most one run is ever in flight.
//!
//! ## State machine
//!
//! ```text
//!            start()              stop()
//! Stopped ─────────────▶ Started ─────────▶ Stopped
//!    │                      │
//!    └─ stop(): error       └─ start(): error
//! ```
//!
//! Stopping cancels the pending re-arm. A run that is in flight when
//! `stop()` is called is allowed to finish; use
//! [`stop_and_wait()`](Scheduler::stop_and_wait) to wait for it. Runs
//! hold a per-scheduler guard, so a `start()` issued while a stopped
//! loop is still finishing its run waits for that run before its own.
//!
//! A failed run is logged and does not stop the schedule.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// A unit of work run by a [`Scheduler`]
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    /// Display name used in logs and errors
    fn name(&self) -> &str;

    /// Delay between the end of one run and the start of the next
    fn interval(&self) -> Duration;

    /// One run of the task
    async fn run(&self) -> Result<()>;
}

enum State {
    Stopped,
    Started {
        shutdown: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    },
}

/// Runs a task periodically without overlap
pub struct Scheduler<T: PeriodicTask> {
    task: Arc<T>,
    state: Mutex<State>,
    /// Held for the duration of every run, across restarts
    in_flight: Arc<tokio::sync::Mutex<()>>,
}

impl<T: PeriodicTask> Scheduler<T> {
    pub fn new(task: T) -> Self {
        Self::from_arc(Arc::new(task))
    }

    /// Create a scheduler for a task that is shared with other owners
    pub fn from_arc(task: Arc<T>) -> Self {
        Self {
            task,
            state: Mutex::new(State::Stopped),
            in_flight: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn task(&self) -> &Arc<T> {
        &self.task
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lock(), State::Started { .. })
    }

    /// Run the task now and keep re-arming it after each run.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::SchedulerAlreadyStarted`] if the scheduler is running.
    pub fn start(&self) -> Result<()> {
        let mut state = self.lock();
        if matches!(*state, State::Started { .. }) {
            return Err(Error::SchedulerAlreadyStarted(self.task.name().to_string()));
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.task),
            Arc::clone(&self.in_flight),
            shutdown_rx,
        ));
        *state = State::Started { shutdown, handle };

        info!(
            "{}: started, running every {}s",
            self.task.name(),
            self.task.interval().as_secs()
        );
        Ok(())
    }

    /// Cancel the pending re-arm.
    ///
    /// # Errors
    ///
    /// [`Error::SchedulerAlreadyStopped`] if the scheduler is not running.
    pub fn stop(&self) -> Result<()> {
        self.take_handle().map(|_| ())
    }

    /// Like [`stop()`](Self::stop), then wait for an in-flight run to finish
    pub async fn stop_and_wait(&self) -> Result<()> {
        let handle = self.take_handle()?;
        if let Err(e) = handle.await {
            error!("{}: task ended abnormally: {}", self.task.name(), e);
        }
        Ok(())
    }

    fn take_handle(&self) -> Result<JoinHandle<()>> {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, State::Stopped) {
            State::Stopped => Err(Error::SchedulerAlreadyStopped(self.task.name().to_string())),
            State::Started { shutdown, handle } => {
                // The loop may already be gone if the task panicked
                let _ = shutdown.send(());
                info!("{}: stopped", self.task.name());
                Ok(handle)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_loop<T: PeriodicTask>(
    task: Arc<T>,
    in_flight: Arc<tokio::sync::Mutex<()>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        // A previous loop of this scheduler may still be finishing its run
        let guard = match in_flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("{}: waiting for the previous run to finish", task.name());
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    guard = in_flight.lock() => guard,
                }
            }
        };

        debug!("{}: running", task.name());
        if let Err(e) = task.run().await {
            error!("{}: run failed: {}", task.name(), e);
        }
        drop(guard);

        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(task.interval()) => {}
        }
    }
    debug!("{}: loop exited", task.name());
}
