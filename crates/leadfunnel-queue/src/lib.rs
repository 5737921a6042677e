//! Background submission of partial lead updates.
//!
//! [`SubmissionQueue::submit`] returns immediately; a spawned loop retries
//! the store write with exponential back-off and, once attempts run out,
//! parks the envelope in [`PersistedState`] for a later
//! [`SubmissionQueue::flush_pending`].

pub mod envelope;
pub mod error;
pub mod policy;
pub mod queue;
pub mod state;

pub use envelope::{SubmissionEnvelope, PENDING_PREFIX};
pub use error::{QueueError, StateError};
pub use policy::RetryPolicy;
pub use queue::{FlushReport, SubmissionHandle, SubmissionOutcome, SubmissionQueue};
pub use state::{FileState, MemoryState, PersistedState};
