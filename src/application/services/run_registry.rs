use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::domain::{ChatId, GenerationRun, MessageId, RunId, RunStatus};

/// In-process bookkeeping for generation runs: status, cancellation and the
/// active run of each chat.
pub struct RunRegistry {
    inner: Mutex<RegistryState>,
    capacity: usize,
}

struct RegistryState {
    runs: HashMap<RunId, TrackedRun>,
    order: VecDeque<RunId>,
    active: HashMap<ChatId, RunId>,
}

struct TrackedRun {
    run: GenerationRun,
    cancellation: CancellationToken,
    status_tx: watch::Sender<RunStatus>,
}

impl RunRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryState {
                runs: HashMap::new(),
                order: VecDeque::new(),
                active: HashMap::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Tracks `run` and makes it the active run of its chat. The run it
    /// replaces is cancelled. A run registered with an older epoch than the
    /// current active one comes back already cancelled.
    pub fn register(&self, run: GenerationRun) -> CancellationToken {
        let mut state = self.state();
        let cancellation = CancellationToken::new();
        let run_id = run.id;
        let chat_id = run.chat_id;
        let epoch = run.epoch;

        let previous = state
            .active
            .get(&chat_id)
            .and_then(|id| state.runs.get(id))
            .map(|t| (t.run.id, t.run.epoch, t.cancellation.clone()));

        match previous {
            Some((_, previous_epoch, _)) if previous_epoch > epoch => {
                tracing::debug!(
                    run_id = %run_id,
                    chat_id = %chat_id,
                    epoch,
                    previous_epoch,
                    "Registered run is already stale"
                );
                cancellation.cancel();
            }
            Some((previous_id, _, previous_token)) => {
                tracing::debug!(
                    run_id = %run_id,
                    previous_run_id = %previous_id,
                    chat_id = %chat_id,
                    "Cancelling superseded run"
                );
                previous_token.cancel();
                state.active.insert(chat_id, run_id);
            }
            None => {
                state.active.insert(chat_id, run_id);
            }
        }

        let (status_tx, _) = watch::channel(run.status);
        state.runs.insert(
            run_id,
            TrackedRun {
                run,
                cancellation: cancellation.clone(),
                status_tx,
            },
        );
        state.order.push_back(run_id);
        state.evict_finished(self.capacity);

        cancellation
    }

    pub fn get(&self, id: RunId) -> Option<GenerationRun> {
        self.state().runs.get(&id).map(|t| t.run.clone())
    }

    pub fn active_run(&self, chat_id: ChatId) -> Option<RunId> {
        self.state().active.get(&chat_id).copied()
    }

    /// Number of chats with a run that has not reached a terminal status.
    pub fn in_flight(&self) -> usize {
        self.state().active.len()
    }

    /// Cancels the active run of a chat, if any.
    pub fn cancel_chat(&self, chat_id: ChatId) -> Option<RunId> {
        let state = self.state();
        let run_id = state.active.get(&chat_id).copied()?;
        if let Some(tracked) = state.runs.get(&run_id) {
            tracked.cancellation.cancel();
        }
        Some(run_id)
    }

    /// Cancels the active run of a chat only if it was started under an
    /// epoch older than `epoch`. A newer run keeps going.
    pub fn cancel_older_than(&self, chat_id: ChatId, epoch: u64) -> Option<RunId> {
        let state = self.state();
        let run_id = state.active.get(&chat_id).copied()?;
        let tracked = state.runs.get(&run_id)?;
        if tracked.run.epoch >= epoch {
            return None;
        }
        tracked.cancellation.cancel();
        Some(run_id)
    }

    pub fn set_status(&self, id: RunId, status: RunStatus, error_message: Option<String>) {
        let mut state = self.state();
        let Some(tracked) = state.runs.get_mut(&id) else {
            return;
        };
        tracked.run.status = status;
        tracked.run.updated_at = Utc::now();
        if error_message.is_some() {
            tracked.run.error_message = error_message;
        }
        tracked.status_tx.send_replace(status);

        let chat_id = tracked.run.chat_id;
        if status.is_terminal() && state.active.get(&chat_id) == Some(&id) {
            state.active.remove(&chat_id);
        }
    }

    pub fn record_commit(&self, id: RunId, message_id: MessageId) {
        if let Some(tracked) = self.state().runs.get_mut(&id) {
            tracked.run.assistant_message_id = Some(message_id);
            tracked.run.fragments_committed += 1;
            tracked.run.updated_at = Utc::now();
        }
    }

    /// Resolves once the run reaches a terminal status. `None` for unknown runs.
    pub async fn wait_for(&self, id: RunId) -> Option<RunStatus> {
        let mut rx = self.state().runs.get(&id)?.status_tx.subscribe();
        let result = rx.wait_for(|s| s.is_terminal()).await.map(|s| *s);
        Some(result.unwrap_or_else(|_| *rx.borrow()))
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RegistryState {
    fn evict_finished(&mut self, capacity: usize) {
        while self.runs.len() > capacity {
            let Some(pos) = self.order.iter().position(|id| {
                self.runs
                    .get(id)
                    .is_some_and(|t| t.run.status.is_terminal())
            }) else {
                break;
            };
            if let Some(id) = self.order.remove(pos) {
                self.runs.remove(&id);
            }
        }
    }
}
