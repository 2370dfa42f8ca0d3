//! StarMine Accrual Engine
//!
//! Converts elapsed wall-clock time into currency for owned mining devices.
//!
//! # Design
//!
//! Devices carry no timers. Each stores the instant its accrual window
//! started plus a cursor of ticks already paid; every pass (the recurring
//! tick or the boot-time catch-up) derives what is owed from those two
//! fields and pays it through the ledger's atomic primitive. Lifetime credit
//! per activation window is bounded by `cap_ticks * rate` no matter how
//! often a pass runs.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod catalog;
pub mod error;
pub mod scheduler;
pub mod shop;

// Re-exports
pub use catalog::{AccrualConfig, DeviceCatalog, DeviceKindSpec};
pub use error::{Error, Result};
pub use scheduler::AccrualScheduler;
pub use shop::DeviceShop;
