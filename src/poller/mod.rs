//! Recurring status polls for in-flight generation tasks
//!
//! Push callbacks are the primary delivery path; these loops are the
//! redundant one. Each watched task is polled on a fixed cadence and the
//! result fed through the reconciler, so a poll answer that arrives after
//! a callback already finished the track is a no-op. Every loop stops on
//! terminal status, on `shutdown`, or when the poller is dropped.

use crate::config::PollerConfig;
use crate::domain::{SignalKind, StringUuid, TaskSignal, Track};
use crate::error::AppError;
use crate::repository::TrackRepository;
use crate::service::reconcile::Reconciler;
use crate::suno::SunoClient;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub struct TrackPoller<R: TrackRepository> {
    suno: Arc<SunoClient>,
    track_repo: Arc<R>,
    reconciler: Reconciler<R>,
    config: PollerConfig,
    shutdown: watch::Sender<bool>,
    active_polls: Arc<Mutex<HashSet<String>>>,
    list_feeds: Arc<Mutex<HashMap<StringUuid, watch::Receiver<Vec<Track>>>>>,
}

enum PollStep {
    Continue,
    Done,
}

impl<R: TrackRepository + 'static> TrackPoller<R> {
    pub fn new(suno: Arc<SunoClient>, track_repo: Arc<R>, config: PollerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            reconciler: Reconciler::new(Arc::clone(&track_repo)),
            suno,
            track_repo,
            config,
            shutdown,
            active_polls: Arc::new(Mutex::new(HashSet::new())),
            list_feeds: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a recurring status poll for one remote task. Watching a task
    /// that is already polled is a no-op. The loop exits when the record
    /// reaches a terminal status or the poller shuts down; gateway errors
    /// are logged and retried on the next tick.
    pub fn watch(&self, remote_task_id: &str) {
        if !self.config.enabled {
            return;
        }

        {
            let mut active = self.active_polls.lock().unwrap();
            if !active.insert(remote_task_id.to_string()) {
                return;
            }
        }

        let remote_task_id = remote_task_id.to_string();
        let suno = Arc::clone(&self.suno);
        let reconciler = self.reconciler.clone();
        let active_polls = Arc::clone(&self.active_polls);
        let mut shutdown_rx = self.shutdown.subscribe();
        let cadence = self.config.status_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the zeroth tick fires immediately; the task was just created,
            // so wait one cadence before the first poll
            interval.tick().await;

            loop {
                tokio::select! {
                    // drop the non-Send watch::Ref inside the branch future so
                    // the select output stays Send across the poll await
                    _ = async { let _ = shutdown_rx.wait_for(|stop| *stop).await; } => break,
                    _ = interval.tick() => {
                        match poll_once(&suno, &reconciler, &remote_task_id).await {
                            PollStep::Continue => {}
                            PollStep::Done => break,
                        }
                    }
                }
            }

            active_polls.lock().unwrap().remove(&remote_task_id);
            tracing::debug!("Stopped polling remote task {}", remote_task_id);
        });
    }

    /// Subscribe to recurring snapshots of one owner's track list. The
    /// refresh loop starts on the first subscription and is shared by later
    /// ones; it reads immediately, then on every cadence, and never writes.
    pub fn subscribe_list(&self, owner_id: StringUuid) -> watch::Receiver<Vec<Track>> {
        let mut feeds = self.list_feeds.lock().unwrap();
        if let Some(receiver) = feeds.get(&owner_id) {
            return receiver.clone();
        }

        let (sender, receiver) = watch::channel(Vec::new());
        feeds.insert(owner_id, receiver.clone());

        let track_repo = Arc::clone(&self.track_repo);
        let list_feeds = Arc::clone(&self.list_feeds);
        let mut shutdown_rx = self.shutdown.subscribe();
        let cadence = self.config.list_refresh_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    // drop the non-Send watch::Ref inside the branch future so
                    // the select output stays Send across the query await
                    _ = async { let _ = shutdown_rx.wait_for(|stop| *stop).await; } => break,
                    _ = interval.tick() => {
                        match track_repo.list_by_owner(owner_id).await {
                            Ok(tracks) => {
                                let _ = sender.send(tracks);
                            }
                            Err(err) => {
                                tracing::warn!(
                                    "Track list refresh for {} failed: {}",
                                    owner_id,
                                    err
                                );
                            }
                        }
                    }
                }
            }

            list_feeds.lock().unwrap().remove(&owner_id);
            tracing::debug!("Stopped refreshing track list for {}", owner_id);
        });

        receiver
    }

    /// Cancel every live poll and list-refresh loop
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Number of live status-poll loops
    pub fn active_poll_count(&self) -> usize {
        self.active_polls.lock().unwrap().len()
    }
}

impl<R: TrackRepository> Drop for TrackPoller<R> {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// One poll of one task: query, normalize, reconcile. An authoritative
/// remote failure becomes an `Error` signal; transport problems and unknown
/// tasks just wait for the next tick.
async fn poll_once<R: TrackRepository>(
    suno: &SunoClient,
    reconciler: &Reconciler<R>,
    remote_task_id: &str,
) -> PollStep {
    let signal = match suno.query_task(remote_task_id).await {
        Ok(snapshot) => snapshot.into_signal(),
        Err(AppError::RemoteService(msg)) => {
            tracing::warn!("Remote reported task {} as failed: {}", remote_task_id, msg);
            TaskSignal::new(remote_task_id, SignalKind::Error)
        }
        Err(err) => {
            tracing::warn!("Status poll for task {} failed: {}", remote_task_id, err);
            return PollStep::Continue;
        }
    };

    match reconciler.apply(&signal).await {
        Ok(outcome) => match outcome.status() {
            Some(status) if status.is_terminal() => PollStep::Done,
            _ => PollStep::Continue,
        },
        Err(err) => {
            tracing::error!(
                "Failed to reconcile poll result for task {}: {}",
                remote_task_id,
                err
            );
            PollStep::Continue
        }
    }
}
