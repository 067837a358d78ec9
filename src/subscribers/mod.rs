//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] fan-out used by
//! the [`Orchestrator`](crate::Orchestrator) to deliver [`Event`](crate::Event)s from
//! its [`Bus`](crate::Bus) to user code (logging, shell monitors, persistence of crash notes).
//!
//! ## Architecture
//! ```text
//! Orchestrator / DeferredQueue ── publish(Event) ──► Bus
//!                                                     │
//!                                      subscriber_listener (one task)
//!                                                     │
//!                                              SubscriberSet::emit
//!                                          ┌──────────┼──────────┐
//!                                          ▼          ▼          ▼
//!                                      LogWriter   Custom ...   ...
//! ```

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
