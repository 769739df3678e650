//! File primitives for queue directories
//!
//! - **Atomic create**: messages are written under a temporary name and
//!   renamed into place, so readers never observe partial files
//! - **Claiming**: advisory exclusive locks with a bounded fixed-delay retry
//! - **Identity re-check**: a claim on a file another poller already deleted
//!   fails instead of re-delivering it

pub mod atomic;
pub mod claim;
pub mod error;

pub use atomic::write_atomic;
pub use claim::{ClaimAttempt, ClaimedFile, claim_with_retry, try_claim};
pub use error::TransportError;
