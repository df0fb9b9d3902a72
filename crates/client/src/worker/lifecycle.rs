//! Install, activate and message handling.

use std::sync::PoisonError;
use std::sync::atomic::Ordering;

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::oneshot;

use super::ServiceWorker;
use crate::fetch::FetchError;
use crate::message::Request;
use swrouter_core::{Error, StoredResponse};

/// Lifecycle position of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting for activation.
    Installed,
    Activating,
    Activated,
    /// Install failed; requests keep going to the previous version's buckets.
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages a controlled page may post to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    SkipWaiting,
}

/// Snapshot of the worker and its buckets.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub clients_claimed: bool,
    pub precache_bucket: String,
    pub runtime_bucket: String,
    /// Every bucket in the store with its entry count, in creation order.
    pub buckets: Vec<BucketStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BucketStatus {
    pub name: String,
    pub entries: u64,
    /// True when the bucket belongs to the running version.
    pub current: bool,
}

impl ServiceWorker {
    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(from = %*state, to = %next, "worker state change");
        *state = next;
    }

    /// Move to `next` if the current state is one of `from`.
    fn transition(&self, from: &[WorkerState], next: WorkerState) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !from.contains(&*state) {
            return Err(Error::InvalidState(format!("cannot move from {} to {next}", *state)));
        }
        tracing::info!(from = %*state, to = %next, "worker state change");
        *state = next;
        Ok(())
    }

    /// Fetch every manifest URL and store them in the precache bucket.
    ///
    /// All-or-nothing: if any fetch fails or returns a non-2xx status, nothing
    /// is written and the worker becomes redundant. When skip-waiting was
    /// requested (by config or message) activation follows immediately.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` outside `Parsed`/`Redundant`, and
    /// `Error::InstallFailed` when the precache could not be populated.
    pub async fn install(&self) -> Result<WorkerState, Error> {
        self.transition(&[WorkerState::Parsed, WorkerState::Redundant], WorkerState::Installing)?;

        match self.populate_precache().await {
            Ok(stored) => {
                tracing::info!(bucket = %self.config.precache_bucket, entries = stored, "precache populated");
                self.set_state(WorkerState::Installed);
            }
            Err(err) => {
                tracing::error!(bucket = %self.config.precache_bucket, error = %err, "install failed");
                self.set_state(WorkerState::Redundant);
                return Err(Error::InstallFailed(err.to_string()));
            }
        }

        if self.config.skip_waiting_on_install || self.skip_waiting.load(Ordering::SeqCst) {
            self.activate().await?;
        }
        Ok(self.state())
    }

    async fn populate_precache(&self) -> Result<usize, Error> {
        let fetches = self.config.manifest.iter().map(|entry| async move {
            let request = Request::get(entry.url.clone());
            let response = self.fetcher.fetch(&request).await?;
            if !response.ok() {
                return Err(FetchError::Status { url: entry.url.to_string(), status: response.status });
            }
            Ok::<_, FetchError>(response.to_stored(&request).with_revision(entry.revision.clone()))
        });

        let entries: Vec<StoredResponse> = try_join_all(fetches).await?;
        let stored = entries.len();
        self.cache.put_all(&self.config.precache_bucket, entries).await?;
        Ok(stored)
    }

    /// Delete every bucket not named for the running version, then take
    /// control of open clients.
    ///
    /// Returns the names of the deleted buckets.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless the worker is `Installed`; a store
    /// failure leaves it `Installed` so activation can be retried.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.transition(&[WorkerState::Installed], WorkerState::Activating)?;

        match self.purge_stale_buckets().await {
            Ok(deleted) => {
                self.clients_claimed.store(true, Ordering::SeqCst);
                self.set_state(WorkerState::Activated);
                tracing::info!(deleted = deleted.len(), "activated and claimed clients");
                Ok(deleted)
            }
            Err(err) => {
                self.set_state(WorkerState::Installed);
                Err(err)
            }
        }
    }

    async fn purge_stale_buckets(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.cache.keys().await? {
            if self.is_current_bucket(&name) {
                continue;
            }
            if self.cache.delete_bucket(&name).await? {
                tracing::info!(bucket = %name, "deleted stale bucket");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    pub(super) fn is_current_bucket(&self, name: &str) -> bool {
        name == self.config.precache_bucket || name == self.config.runtime_bucket
    }

    /// Activate as soon as installation allows.
    ///
    /// A waiting worker activates now; one still parsing or installing
    /// activates when install completes.
    ///
    /// # Errors
    ///
    /// Propagates activation failures.
    pub async fn skip_waiting(&self) -> Result<WorkerState, Error> {
        self.skip_waiting.store(true, Ordering::SeqCst);
        if self.state() == WorkerState::Installed {
            self.activate().await?;
        }
        Ok(self.state())
    }

    /// Handle a message posted by a page.
    ///
    /// Unrecognized messages are ignored. `SKIP_WAITING` is acknowledged on
    /// `reply` when the sender supplied one.
    ///
    /// # Errors
    ///
    /// Propagates activation failures triggered by `SKIP_WAITING`.
    pub async fn on_message(&self, data: &Value, reply: Option<oneshot::Sender<Value>>) -> Result<(), Error> {
        let message = match serde_json::from_value::<WorkerMessage>(data.clone()) {
            Ok(message) => message,
            Err(_) => {
                tracing::debug!(message = %data, "ignoring unrecognized message");
                return Ok(());
            }
        };

        match message {
            WorkerMessage::SkipWaiting => {
                let state = self.skip_waiting().await?;
                if let Some(reply) = reply {
                    let ack = json!({ "type": "SKIP_WAITING", "ok": true, "state": state });
                    if reply.send(ack).is_err() {
                        tracing::debug!("message sender dropped its reply port");
                    }
                }
            }
        }
        Ok(())
    }

    /// Worker state plus every bucket with its entry count.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket store cannot be read.
    pub async fn status(&self) -> Result<WorkerStatus, Error> {
        let buckets = self
            .cache
            .bucket_stats()
            .await?
            .into_iter()
            .map(|(name, entries)| BucketStatus { current: self.is_current_bucket(&name), name, entries })
            .collect();

        Ok(WorkerStatus {
            state: self.state(),
            clients_claimed: self.clients_claimed(),
            precache_bucket: self.config.precache_bucket.clone(),
            runtime_bucket: self.config.runtime_bucket.clone(),
            buckets,
        })
    }

    /// Drop every bucket, current ones included. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket store fails.
    pub async fn clear_caches(&self) -> Result<u64, Error> {
        let removed = self.cache.clear().await?;
        tracing::info!(removed, "cleared all buckets");
        Ok(removed)
    }
}
