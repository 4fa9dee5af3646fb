//! Dashboard broadcaster: periodically samples scheduler/cache/stream
//! stats and fans them out to subscribers over bounded channels.
//!
//! Grounded in `dashboard_ws.py`'s broadcast loop (`asyncio.sleep(5)` then
//! push to every connected websocket); subscribers here are plain
//! `crossbeam_channel` receivers rather than sockets, and a subscriber
//! that can't keep up is dropped instead of blocking the sampler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::BroadcasterConfig;
use crate::model_cache::{ModelCache, ModelCacheStats};
use crate::scheduler::Scheduler;
use crate::stream::{StreamManager, StreamStatsSnapshot};
use crate::types::SchedulerStats;

/// One sampled snapshot of system-wide stats, broadcast on every tick and
/// returned synchronously by [`Broadcaster::request_snapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub scheduler: SchedulerStats,
    pub model_cache: ModelCacheStats,
    pub streams: HashMap<String, StreamStatsSnapshot>,
    pub sampled_at: DateTime<Utc>,
}

/// Messages a subscriber may receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DashboardMessage {
    Snapshot(DashboardSnapshot),
    Ping,
    Pong,
}

/// A request a subscriber may send back to the broadcaster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DashboardCommand {
    /// Answered with `DashboardMessage::Pong` the next time commands are
    /// serviced.
    Ping,
    /// Answered with an immediately-built `DashboardMessage::Snapshot`.
    RequestSnapshot,
}

/// The pair of channels handed back by [`Broadcaster::subscribe`]:
/// `messages` receives broadcast snapshots and command replies, `commands`
/// sends requests back to the broadcaster.
pub struct DashboardSubscription {
    pub messages: Receiver<DashboardMessage>,
    pub commands: Sender<DashboardCommand>,
}

struct Subscriber {
    messages: Sender<DashboardMessage>,
    commands: Receiver<DashboardCommand>,
}

/// Samples scheduler, model cache and stream stats on a fixed interval and
/// fans the result out to every live subscriber.
pub struct Broadcaster {
    config: BroadcasterConfig,
    scheduler: Arc<Scheduler>,
    model_cache: Arc<ModelCache>,
    streams: Arc<StreamManager>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Broadcaster {
    pub fn new(
        config: BroadcasterConfig,
        scheduler: Arc<Scheduler>,
        model_cache: Arc<ModelCache>,
        streams: Arc<StreamManager>,
    ) -> Self {
        Self {
            config,
            scheduler,
            model_cache,
            streams,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Registers a new subscriber and returns its message/command channel
    /// pair: `messages` carries broadcast snapshots and command replies,
    /// `commands` lets the subscriber ask for a pong or an immediate
    /// snapshot.
    pub fn subscribe(&self) -> DashboardSubscription {
        let (msg_tx, msg_rx) = bounded(self.config.subscriber_channel_depth);
        let (cmd_tx, cmd_rx) = bounded(self.config.subscriber_channel_depth);
        self.subscribers.lock().push(Subscriber {
            messages: msg_tx,
            commands: cmd_rx,
        });
        DashboardSubscription {
            messages: msg_rx,
            commands: cmd_tx,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Builds a snapshot immediately, independent of the sampling interval
    /// (the on-demand snapshot request path for callers holding the
    /// broadcaster directly, rather than subscribed over a channel).
    pub fn request_snapshot(&self) -> DashboardSnapshot {
        build_snapshot(&self.scheduler, &self.model_cache, &self.streams)
    }

    /// Sends a `Ping` to every subscriber; slow/disconnected ones are
    /// dropped the same way a sampling tick would drop them.
    pub fn ping_all(&self) {
        broadcast(&self.subscribers, DashboardMessage::Ping);
    }

    /// Services any pending `DashboardCommand`s from subscribers, replying
    /// on each subscriber's own message channel. Called once per sampling
    /// tick by `start`, and callable directly for tests or a broadcaster
    /// run without the background thread.
    pub fn poll_commands(&self) {
        service_commands(&self.subscribers, &self.scheduler, &self.model_cache, &self.streams);
    }

    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let scheduler = self.scheduler.clone();
        let model_cache = self.model_cache.clone();
        let streams = self.streams.clone();
        let subscribers = self.subscribers.clone();
        let running = self.running.clone();
        let interval = Duration::from_secs(self.config.interval_seconds);

        let handle = std::thread::Builder::new()
            .name("dashboard-broadcaster".to_string())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    let snapshot = build_snapshot(&scheduler, &model_cache, &streams);
                    broadcast(&subscribers, DashboardMessage::Snapshot(snapshot));
                    service_commands(&subscribers, &scheduler, &model_cache, &streams);
                    std::thread::sleep(interval);
                }
            })
            .expect("failed to spawn broadcaster thread");
        *self.handle.lock() = Some(handle);
    }

    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_snapshot(scheduler: &Scheduler, model_cache: &ModelCache, streams: &StreamManager) -> DashboardSnapshot {
    DashboardSnapshot {
        scheduler: scheduler.stats(),
        model_cache: model_cache.stats(),
        streams: streams.all_stats(),
        sampled_at: Utc::now(),
    }
}

/// Sends `message` to every subscriber, dropping any whose channel is full
/// or disconnected rather than blocking the sampler on a stuck consumer.
fn broadcast(subscribers: &Mutex<Vec<Subscriber>>, message: DashboardMessage) {
    let mut subscribers = subscribers.lock();
    subscribers.retain(|sub| match sub.messages.try_send(message.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("dropping slow dashboard subscriber");
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            debug!("dropping disconnected dashboard subscriber");
            false
        }
    });
}

/// Drains every subscriber's pending commands and replies on its own
/// message channel; a subscriber whose reply can't be delivered is dropped
/// the same way a broadcast would drop it.
fn service_commands(
    subscribers: &Mutex<Vec<Subscriber>>,
    scheduler: &Scheduler,
    model_cache: &ModelCache,
    streams: &StreamManager,
) {
    let mut subscribers = subscribers.lock();
    subscribers.retain(|sub| {
        while let Ok(command) = sub.commands.try_recv() {
            let reply = match command {
                DashboardCommand::Ping => DashboardMessage::Pong,
                DashboardCommand::RequestSnapshot => {
                    DashboardMessage::Snapshot(build_snapshot(scheduler, model_cache, streams))
                }
            };
            match sub.messages.try_send(reply) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("dropping slow dashboard subscriber");
                    return false;
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("dropping disconnected dashboard subscriber");
                    return false;
                }
            }
        }
        true
    });
}

#[cfg(test)]
mod tests {
    include!("broadcaster_test.rs");
}
