//! Liquid Health - Waiting for services to converge
//!
//! A deployment step is only considered done when every health check the
//! started jobs declare has been passing for a number of consecutive polls.
//!
//! ## Key Components
//!
//! - [`Poller`]: Poll-until-ready primitive with a deadline and an early-exit
//!   guard, shared by every waiting loop in Liquid
//! - [`ConvergenceWaiter`]: Waits on a set of health checks in the registry
//! - [`WaitConfig`]: Poll interval, maximum wait and required green streak

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod poll;
pub mod waiter;

// Re-exports
pub use error::{FailedCheck, HealthError, HealthResult};
pub use poll::{PollOutcome, PollTarget, PollTick, Poller};
pub use waiter::{Convergence, ConvergenceWaiter, WaitConfig};
