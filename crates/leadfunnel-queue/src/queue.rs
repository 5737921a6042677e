//! Non-blocking lead submission with retry, coalescing and parking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use leadfunnel_core::{merge_fields, Clock, LeadFields, LeadId};
use leadfunnel_db::LeadStore;
use tokio::sync::oneshot;

use crate::envelope::{storage_key, SubmissionEnvelope, PENDING_PREFIX};
use crate::error::QueueError;
use crate::policy::RetryPolicy;
use crate::state::PersistedState;

/// How a submitted envelope was finally handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Written to the store after `attempts` sends.
    Delivered { attempts: u32 },
    /// Attempts ran out (or the store rejected the lead outright) and the
    /// envelope was written to persisted state.
    Persisted { attempts: u32 },
    /// Merged into a retry loop already running for the same key.
    Coalesced,
    /// A previously parked envelope the store rejected again; discarded.
    Rejected { attempts: u32 },
    /// Neither delivered nor persisted; the payload is lost.
    Dropped { attempts: u32 },
}

/// Completion channel for one [`SubmissionQueue::submit`] call.
///
/// Dropping the handle does not cancel the submission.
#[derive(Debug)]
pub struct SubmissionHandle {
    rx: oneshot::Receiver<SubmissionOutcome>,
}

impl SubmissionHandle {
    fn resolved(outcome: SubmissionOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }

    pub async fn outcome(self) -> SubmissionOutcome {
        self.rx
            .await
            .unwrap_or(SubmissionOutcome::Dropped { attempts: 0 })
    }
}

/// Totals from one [`SubmissionQueue::flush_pending`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Envelopes this process removed from persisted state.
    pub claimed: usize,
    /// Envelopes another process removed first.
    pub skipped: usize,
    /// Claimed entries that did not decode as an envelope.
    pub invalid: usize,
    pub delivered: usize,
    pub persisted: usize,
    pub coalesced: usize,
    /// Envelopes for leads the store still does not know; discarded.
    pub rejected: usize,
    pub dropped: usize,
}

impl FlushReport {
    fn record(&mut self, outcome: SubmissionOutcome) {
        match outcome {
            SubmissionOutcome::Delivered { .. } => self.delivered += 1,
            SubmissionOutcome::Persisted { .. } => self.persisted += 1,
            SubmissionOutcome::Coalesced => self.coalesced += 1,
            SubmissionOutcome::Rejected { .. } => self.rejected += 1,
            SubmissionOutcome::Dropped { .. } => self.dropped += 1,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    payload: LeadFields,
    dirty: bool,
}

struct Inner {
    store: Arc<dyn LeadStore>,
    state: Arc<dyn PersistedState>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

/// Cloneable handle to a background submission queue.
#[derive(Clone)]
pub struct SubmissionQueue {
    inner: Arc<Inner>,
}

impl SubmissionQueue {
    #[must_use]
    pub fn new(
        store: Arc<dyn LeadStore>,
        state: Arc<dyn PersistedState>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                state,
                policy,
                clock,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    /// Number of keys with a retry loop currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight().len()
    }

    /// Queues `envelope` and returns without waiting for the store.
    ///
    /// If a loop is already running for `envelope.key`, the payload is merged
    /// into it and the handle resolves to [`SubmissionOutcome::Coalesced`].
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, envelope: SubmissionEnvelope) -> SubmissionHandle {
        let SubmissionEnvelope {
            key,
            payload,
            lead_id,
            attempt_count,
            ..
        } = envelope;

        {
            let mut in_flight = self.inner.in_flight();
            if let Some(running) = in_flight.get_mut(&key) {
                merge_fields(&mut running.payload, payload);
                running.dirty = true;
                tracing::debug!(key = %key, "submission coalesced into running loop");
                return SubmissionHandle::resolved(SubmissionOutcome::Coalesced);
            }
            in_flight.insert(
                key.clone(),
                InFlight {
                    payload,
                    dirty: false,
                },
            );
        }

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = inner.run(&key, lead_id, attempt_count).await;
            let _ = tx.send(outcome);
        });
        SubmissionHandle { rx }
    }

    /// Claims every parked envelope and pushes it back through the queue,
    /// waiting for each to settle.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::State`] if persisted state cannot be listed or
    /// read. Envelopes already claimed before the failure keep running.
    pub async fn flush_pending(&self) -> Result<FlushReport, QueueError> {
        let mut report = FlushReport::default();
        let mut handles = Vec::new();

        for key in self.inner.state.keys().await? {
            if !key.starts_with(PENDING_PREFIX) {
                continue;
            }
            let Some(raw) = self.inner.state.remove(&key).await? else {
                report.skipped += 1;
                continue;
            };
            report.claimed += 1;

            match serde_json::from_str::<SubmissionEnvelope>(&raw) {
                Ok(envelope) => handles.push(self.submit(envelope)),
                Err(e) => {
                    report.invalid += 1;
                    tracing::error!(key = %key, error = %e, raw = %raw, "discarding undecodable pending envelope");
                }
            }
        }

        for handle in handles {
            report.record(handle.outcome().await);
        }

        tracing::info!(
            claimed = report.claimed,
            delivered = report.delivered,
            persisted = report.persisted,
            rejected = report.rejected,
            invalid = report.invalid,
            skipped = report.skipped,
            "pending submissions flushed"
        );
        Ok(report)
    }
}

impl Inner {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the payload to send next, clearing the dirty flag.
    fn next_payload(&self, key: &str) -> LeadFields {
        let mut in_flight = self.in_flight();
        match in_flight.get_mut(key) {
            Some(running) => {
                running.dirty = false;
                running.payload.clone()
            }
            None => LeadFields::new(),
        }
    }

    /// Ends the loop for `key` unless new fields arrived during the last
    /// send. Returns `true` when the loop is finished.
    fn finish_unless_dirty(&self, key: &str) -> bool {
        let mut in_flight = self.in_flight();
        if in_flight.get(key).is_some_and(|running| running.dirty) {
            return false;
        }
        in_flight.remove(key);
        true
    }

    fn finish(&self, key: &str) {
        self.in_flight().remove(key);
    }

    async fn run(&self, key: &str, lead_id: LeadId, prior_attempts: u32) -> SubmissionOutcome {
        let prior_attempts = prior_attempts.max(self.absorb_parked(key).await);
        let mut sends = 0u32;
        let mut failures = 0u32;

        loop {
            let payload = self.next_payload(key);
            sends += 1;

            match self.store.update(lead_id, payload).await {
                Ok(_) => {
                    if !self.finish_unless_dirty(key) {
                        tracing::debug!(key = %key, "new fields arrived during send; re-sending");
                        continue;
                    }
                    tracing::debug!(key = %key, attempts = sends, "submission delivered");
                    return SubmissionOutcome::Delivered { attempts: sends };
                }
                Err(e) if !e.is_retriable() => {
                    let attempts = prior_attempts.saturating_add(sends);
                    if prior_attempts > 0 {
                        tracing::error!(key = %key, lead_id = %lead_id, attempts, error = %e, "parked submission rejected again; discarding envelope");
                        self.finish(key);
                        return SubmissionOutcome::Rejected { attempts };
                    }
                    tracing::warn!(key = %key, lead_id = %lead_id, error = %e, "submission rejected; parking envelope");
                    return self.park_and_finish(key, lead_id, attempts).await;
                }
                Err(e) => {
                    failures += 1;
                    if failures >= self.policy.max_attempts {
                        tracing::warn!(
                            key = %key,
                            attempts = sends,
                            error = %e,
                            "submission attempts exhausted; parking envelope"
                        );
                        return self
                            .park_and_finish(key, lead_id, prior_attempts.saturating_add(sends))
                            .await;
                    }
                    let delay = self.policy.delay_after(failures);
                    tracing::debug!(
                        key = %key,
                        attempt = failures,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "submission failed; retrying after back-off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Parks the running payload while the loop still owns `key`, so a
    /// concurrent submit coalesces instead of racing the write. Fields that
    /// arrive during the write are parked on the next pass.
    async fn park_and_finish(
        &self,
        key: &str,
        lead_id: LeadId,
        attempt_count: u32,
    ) -> SubmissionOutcome {
        loop {
            let payload = self.next_payload(key);
            let outcome = self.park(key, lead_id, payload, attempt_count).await;
            if self.finish_unless_dirty(key) {
                return outcome;
            }
        }
    }

    async fn park(
        &self,
        key: &str,
        lead_id: LeadId,
        payload: LeadFields,
        attempt_count: u32,
    ) -> SubmissionOutcome {
        let envelope = SubmissionEnvelope {
            key: key.to_string(),
            payload,
            lead_id,
            attempt_count,
            timestamp: self.clock.now(),
        };

        let encoded = match serde_json::to_string(&envelope) {
            Ok(encoded) => encoded,
            Err(source) => {
                let err = QueueError::Encode {
                    key: key.to_string(),
                    source,
                };
                tracing::error!(error = %err, "submission dropped");
                return SubmissionOutcome::Dropped {
                    attempts: attempt_count,
                };
            }
        };

        match self.state.set(&envelope.storage_key(), encoded).await {
            Ok(()) => SubmissionOutcome::Persisted {
                attempts: attempt_count,
            },
            Err(e) => {
                tracing::error!(key = %key, error = %e, "failed to persist envelope; submission dropped");
                SubmissionOutcome::Dropped {
                    attempts: attempt_count,
                }
            }
        }
    }

    /// Claims an envelope parked by an earlier run for `key` and folds its
    /// payload underneath the running one, so older fields are re-sent but
    /// newer values win. Returns the parked attempt count.
    async fn absorb_parked(&self, key: &str) -> u32 {
        let raw = match self.state.remove(&storage_key(key)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return 0,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to read parked envelope");
                return 0;
            }
        };
        let parked = match serde_json::from_str::<SubmissionEnvelope>(&raw) {
            Ok(parked) => parked,
            Err(e) => {
                tracing::error!(key = %key, error = %e, raw = %raw, "discarding undecodable parked envelope");
                return 0;
            }
        };

        let mut in_flight = self.in_flight();
        if let Some(running) = in_flight.get_mut(key) {
            let newer = std::mem::replace(&mut running.payload, parked.payload);
            merge_fields(&mut running.payload, newer);
        }
        parked.attempt_count
    }
}
