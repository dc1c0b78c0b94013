//! Runtime: drives a [`Desk`] from the feed and the wall clock
//!
//! The `run()` loop uses `tokio::select!` to:
//!   - Process feed messages strictly in arrival order
//!   - Process control commands (reset, status)
//!   - Stop on the shutdown signal or when the feed closes
//!
//! The scheduler poll runs as a separate task that checks a running flag at
//! the top of every cycle. Both paths lock the desk only for the duration of
//! one step; intents are executed after the lock is released.

use chrono::{Local, NaiveDateTime};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::command::{DeskCommand, Intent};
use super::desk::Desk;
use super::state::DeskStatus;
use crate::adapters::Outbound;
use crate::config::AppConfig;
use crate::error::{Result, TableauError};
use crate::ledger::ResetScope;
use crate::persistence::ScheduleStore;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// A raw message from the feed collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMessage {
    pub channel: i64,
    pub text: String,
}

/// Clonable handle for feeding the runtime
#[derive(Clone)]
pub struct DeskHandle {
    event_tx: mpsc::Sender<FeedMessage>,
    control_tx: mpsc::Sender<DeskCommand>,
}

impl DeskHandle {
    pub async fn submit(&self, channel: i64, text: impl Into<String>) -> Result<()> {
        let message = FeedMessage {
            channel,
            text: text.into(),
        };
        self.event_tx
            .send(message)
            .await
            .map_err(|_| TableauError::Internal("desk event channel closed".into()))
    }

    pub async fn reset(&self, scope: ResetScope) -> Result<()> {
        self.control_tx
            .send(DeskCommand::Reset(scope))
            .await
            .map_err(|_| TableauError::Internal("desk control channel closed".into()))
    }

    pub async fn status(&self) -> Result<DeskStatus> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.control_tx
            .send(DeskCommand::Status(tx))
            .await
            .map_err(|_| TableauError::Internal("desk control channel closed".into()))?;
        rx.await
            .map_err(|_| TableauError::Internal("desk dropped status request".into()))
    }
}

/// Receiving ends consumed by [`Runtime::run`]
pub struct DeskInbox {
    pub events: mpsc::Receiver<FeedMessage>,
    pub control: mpsc::Receiver<DeskCommand>,
}

/// Create a connected handle/inbox pair
pub fn desk_channel(capacity: usize) -> (DeskHandle, DeskInbox) {
    let (event_tx, events) = mpsc::channel(capacity);
    let (control_tx, control) = mpsc::channel(16);
    (
        DeskHandle {
            event_tx,
            control_tx,
        },
        DeskInbox { events, control },
    )
}

/// Executes intents against the collaborators
#[derive(Clone)]
pub struct Dispatcher {
    desk: Arc<Mutex<Desk>>,
    outbound: Arc<dyn Outbound>,
    store: Arc<dyn ScheduleStore>,
    display_channel: Option<i64>,
}

impl Dispatcher {
    pub fn new(
        desk: Arc<Mutex<Desk>>,
        outbound: Arc<dyn Outbound>,
        store: Arc<dyn ScheduleStore>,
        display_channel: Option<i64>,
    ) -> Self {
        Self {
            desk,
            outbound,
            store,
            display_channel,
        }
    }

    /// Run every intent in order; returns how many failed.
    ///
    /// Failures are logged and never roll back desk state.
    pub async fn execute(&self, intents: Vec<Intent>) -> usize {
        let mut failures = 0;
        for intent in intents {
            let kind = intent.kind();
            if let Err(e) = self.execute_one(intent).await {
                error!(intent = kind, error = %e, "intent failed");
                failures += 1;
            }
        }
        failures
    }

    async fn execute_one(&self, intent: Intent) -> Result<()> {
        match intent {
            Intent::Emit { bind_to, text } => {
                let channel = self.display_channel.ok_or(TableauError::NoDisplayChannel)?;
                let message = self.outbound.emit(channel, &text).await?;
                let Some(target) = bind_to else {
                    return Ok(());
                };
                let bound = self.desk.lock().await.bind_message(target, message);
                match bound {
                    Ok(Some(Intent::Edit { message, text })) => {
                        self.outbound.edit(message, &text).await
                    }
                    Ok(_) => Ok(()),
                    Err(e) => {
                        warn!(target, error = %e, "could not bind sent message");
                        Ok(())
                    }
                }
            }
            Intent::Edit { message, text } => self.outbound.edit(message, &text).await,
            Intent::PersistSchedule(snapshot) => {
                self.store.save(&snapshot).await.map_err(|e| {
                    warn!(error = %e, "timetable not persisted, in-memory copy stays authoritative");
                    e
                })
            }
        }
    }
}

pub struct Runtime {
    desk: Arc<Mutex<Desk>>,
    dispatcher: Dispatcher,
    store: Arc<dyn ScheduleStore>,
    poll_interval: Duration,
    error_backoff: Duration,
}

impl Runtime {
    pub fn new(
        desk: Desk,
        outbound: Arc<dyn Outbound>,
        store: Arc<dyn ScheduleStore>,
        config: &AppConfig,
    ) -> Self {
        if config.channels.display_channel.is_none() {
            warn!("no display channel configured, emits will be dropped");
        }
        let desk = Arc::new(Mutex::new(desk));
        let dispatcher = Dispatcher::new(
            Arc::clone(&desk),
            outbound,
            Arc::clone(&store),
            config.channels.display_channel,
        );

        Self {
            desk,
            dispatcher,
            store,
            poll_interval: Duration::from_secs(config.scheduler.poll_interval_secs),
            error_backoff: Duration::from_secs(config.scheduler.error_backoff_secs),
        }
    }

    pub fn desk(&self) -> Arc<Mutex<Desk>> {
        Arc::clone(&self.desk)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Resume today's stored timetable, or start from the fresh one.
    /// Either way the resulting timetable is stored again; a failing store
    /// leaves the in-memory timetable in charge.
    pub async fn restore(&self) -> bool {
        let now = local_now();
        let restored = match self.store.load(now.date()).await {
            Ok(Some(snapshot)) => self.desk.lock().await.restore_schedule(snapshot, now),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "could not load stored timetable");
                false
            }
        };

        let snapshot = self.desk.lock().await.schedule_snapshot();
        if let Some(snapshot) = snapshot {
            self.dispatcher
                .execute(vec![Intent::PersistSchedule(snapshot)])
                .await;
        }
        restored
    }

    /// Start the scheduler poll task, if the scheduler is enabled
    pub async fn spawn_scheduler(&self) -> Option<JoinHandle<()>> {
        let running = {
            let desk = self.desk.lock().await;
            let scheduler = desk.scheduler()?;
            scheduler.start();
            scheduler.running_flag()
        };

        let desk = Arc::clone(&self.desk);
        let dispatcher = self.dispatcher.clone();
        let poll_interval = self.poll_interval;
        let error_backoff = self.error_backoff;

        Some(tokio::spawn(async move {
            info!(poll_secs = poll_interval.as_secs(), "scheduler loop started");
            while running.load(Ordering::SeqCst) {
                let intents = desk.lock().await.tick(local_now());
                let failures = dispatcher.execute(intents).await;

                let pause = if failures > 0 {
                    warn!(failures, "scheduler cycle had failures, backing off");
                    error_backoff
                } else {
                    poll_interval
                };
                tokio::time::sleep(pause).await;
            }
            info!("scheduler loop stopped");
        }))
    }

    /// Main loop; returns when the feed closes or shutdown is signalled
    pub async fn run(self, mut inbox: DeskInbox, mut shutdown_rx: broadcast::Receiver<()>) {
        let scheduler_task = self.spawn_scheduler().await;
        info!(scheduler = scheduler_task.is_some(), "runtime starting main loop");

        loop {
            tokio::select! {
                // Feed first, so a status request sees every event submitted before it
                biased;

                // --- Feed messages, one at a time ---
                message = inbox.events.recv() => {
                    match message {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            info!("feed closed");
                            break;
                        }
                    }
                }

                // --- Control commands ---
                Some(command) = inbox.control.recv() => {
                    self.handle_command(command).await;
                }

                // --- Shutdown signal ---
                _ = shutdown_rx.recv() => {
                    info!("runtime: shutdown signal received");
                    break;
                }
            }
        }

        self.stop_scheduler(scheduler_task).await;
        info!("runtime: main loop exited");
    }

    async fn handle_message(&self, message: FeedMessage) {
        let intents = self
            .desk
            .lock()
            .await
            .on_message(message.channel, &message.text, local_now());
        if !intents.is_empty() {
            debug!(intents = intents.len(), "executing event intents");
        }
        self.dispatcher.execute(intents).await;
    }

    async fn handle_command(&self, command: DeskCommand) {
        match command {
            DeskCommand::Reset(scope) => {
                let intents = self.desk.lock().await.reset(scope, local_now());
                self.dispatcher.execute(intents).await;
            }
            DeskCommand::Status(reply) => {
                let status = self.desk.lock().await.status(local_now());
                let _ = reply.send(status);
            }
        }
    }

    async fn stop_scheduler(&self, task: Option<JoinHandle<()>>) {
        let Some(task) = task else {
            return;
        };
        if let Some(scheduler) = self.desk.lock().await.scheduler() {
            scheduler.stop();
        }
        info!("waiting for the scheduler to finish its current sleep");
        if let Err(e) = task.await {
            error!(error = %e, "scheduler task ended abnormally");
        }
    }
}
