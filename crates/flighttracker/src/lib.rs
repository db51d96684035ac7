//! `flighttracker` - Watch a geographic area for low-flying aircraft
//!
//! The library polls a flight-tracking feed for a bounding box, decodes its
//! positional JSON into [`FlightRecord`]s, flags the ones breaking the
//! low-altitude [`ViolationRule`] and hands every batch to a pluggable
//! [`Sink`](sink::Sink). A [`Scheduler`](scheduler::Scheduler) drives the
//! cycle; the [`api`] module exposes it over HTTP.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod bbox;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod decoder;
pub mod error;
pub mod feed;
pub mod flight;
pub mod logging;
pub mod scheduler;
pub mod sink;
pub mod store;

pub use bbox::BoundingBox;
pub use classifier::ViolationRule;
pub use config::Config;
pub use error::{Error, Result};
pub use flight::FlightRecord;
pub use logging::init_logging;
