//! # Orderflow Checkpoint
//!
//! Persistence for workflow runs.
//!
//! ## Features
//!
//! - Run snapshot after every step (crash-resume)
//! - Archive of superseded runs when an id is reused
//! - Lease-based claims so one worker drives a run at a time
//! - Recovery listing of runs a worker may pick up

pub mod claim;
pub mod error;
pub mod recovery;
pub mod store;

pub use claim::Claim;
pub use error::StoreError;
pub use recovery::{RecoveryCandidate, RecoveryManager};
pub use store::{open_store, FileRunStore, MemoryRunStore, RunStore};
