//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (derive client key, ask the controller)
//!     → admission.rs (prune window, admit or reject)
//!     → Pass to handlers, or short-circuit with 429
//!
//! Background:
//!     sweeper.rs → admission.rs (evict idle keys)
//! ```
//!
//! # Design Decisions
//! - Exact sliding log per key, not a fixed-window counter
//! - Registry sharded by key; no lock held across downstream I/O
//! - Time is injected through `Clock` so decisions are deterministic in tests

pub mod admission;
pub mod clock;
pub mod rate_limit;
pub mod sweeper;

pub use admission::{AdmissionController, Decision, Policy, PolicyError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limit::{rate_limit_middleware, with_rate_limit, RateLimitState};
pub use sweeper::IdleSweeper;
