//! # sensorhub-types
//!
//! Core types shared by every part of the sensorhub: the [`SensorSnapshot`]
//! value produced by the device reader, the fixed-layout record the kernel
//! driver hands to userspace, and the alert vocabulary evaluated against
//! each snapshot.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable `serde` and/or `minicbor` features as needed
//! - **Value semantics**: Snapshots are `Copy` and never mutated after construction
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON/etc. serialization via serde
//! - `minicbor`: Compact binary serialization via CBOR
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use sensorhub_types::{AlertThresholds, SensorSnapshot};
//!
//! let snapshot = SensorSnapshot::new(30.1, 42.0, false, false, 1_000);
//! let alerts = AlertThresholds::default().evaluate(&snapshot);
//!
//! assert_eq!(alerts.len(), 1);
//! assert_eq!(alerts[0].kind(), "high_temperature");
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod alert;
mod record;
mod snapshot;

pub use alert::*;
pub use record::*;
pub use snapshot::*;
