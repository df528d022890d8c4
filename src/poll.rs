//! Periodic panel refresh.
//!
//! Two independent loops per panel: queue + pending articles, and recent
//! activity. They are not coordinated with each other or with actions; the
//! panel's ticketing keeps the newest result. Stopping the poller stops the
//! timers but does not abort a fetch already in flight.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::PollSettings;
use crate::panel::Panel;

pub struct Poller;

impl Poller {
    /// Start both loops. Each fires immediately, then every interval.
    pub fn start(panel: Panel, settings: &PollSettings) -> PollHandle {
        let (shutdown, stop) = watch::channel(false);

        let queue_panel = panel.clone();
        let queue_task = spawn_loop(
            "queue",
            settings.queue_interval(),
            stop.clone(),
            move || {
                let panel = queue_panel.clone();
                async move { panel.refresh_views().await }
            },
        );

        let activity_task = spawn_loop(
            "activity",
            settings.activity_interval(),
            stop,
            move || {
                let panel = panel.clone();
                async move {
                    panel.refresh_activity().await;
                }
            },
        );

        info!(
            queue_secs = settings.queue_interval().as_secs(),
            activity_secs = settings.activity_interval().as_secs(),
            "polling started"
        );

        PollHandle {
            shutdown,
            tasks: vec![queue_task, activity_task],
        }
    }
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    mut stop: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            if *stop.borrow() {
                debug!(poller = name, "poll loop stopping");
                return;
            }
            tokio::select! {
                _ = stop.changed() => {
                    debug!(poller = name, "poll loop stopping");
                    return;
                }
                _ = interval.tick() => {
                    debug!(poller = name, "poll tick");
                    tick().await;
                }
            }
        }
    })
}

/// Owns the polling tasks. Dropping it aborts them.
pub struct PollHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl PollHandle {
    /// Stop both loops and wait for them to exit. A tick in progress is
    /// allowed to finish first.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("polling stopped");
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
