//! Receive engine: polling workers, backoff and failure escalation
//!
//! ```text
//! Receiver (supervisor)
//!   ├─ worker 0 ─┐
//!   ├─ worker 1 ─┼─ scan queue dir → claim → decode → process → complete → delete
//!   └─ worker N ─┘        │ empty
//!                         └─ Backoff::wait (50ms → … → max)
//!
//! availability errors ──► CircuitBreaker (shared) ──► critical escalation
//! ```

pub mod backoff;
pub mod breaker;
pub mod poller;
pub mod supervisor;

pub use backoff::Backoff;
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CriticalError, CriticalErrorHandler};
pub use poller::{Dispatch, PollOutcome, ReceiveSettings};
pub use supervisor::{Receiver, ReceiverBuilder};
