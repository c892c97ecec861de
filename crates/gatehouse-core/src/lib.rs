//! Control plane of a gatehouse master node.
//!
//! The master node authorizes remote devices to switch on or off based on the
//! credentials (keys) presented to them, keeps a bounded durable activity log
//! and ships that log to a remote collector every night.
//!
//! # Components
//!
//! - [`access`]: key and device tables with the authorization rule
//! - [`logbook`]: bounded activity log fed through a queue
//! - [`sync`]: batched, delete-on-acceptance upload of the log
//! - [`schedule`]: the nightly sync-and-purge cycle
//! - [`radio`]: interrupt-driven transceiver protocol and message handling
//! - [`dispatch`]: commands coming from the operator front-ends
//!
//! Everything that touches the outside world goes through a trait:
//! [`gatehouse_store::LineStore`] for persistence, [`env::Environment`] for
//! time and memory, [`sync::Collector`] for the remote collector and
//! [`radio::Transceiver`] for the radio chip.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod access;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod logbook;
pub mod radio;
pub mod schedule;
pub mod sync;

pub use error::ErrorKind;
