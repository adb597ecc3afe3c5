//! # Game Events
//!
//! The event model crate - contains the attack/dash event definitions and the
//! statistics derived from them. This crate is the single source of truth for
//! what an event looks like on the wire and does not perform any I/O.

pub mod event;
pub mod stats;

pub use event::*;
pub use stats::*;
