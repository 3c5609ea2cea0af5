//! Core types and utilities for netintent.
//!
//! This crate provides the foundational types used throughout the netintent platform:
//!
//! - **Identifiers**: Strongly-typed ids for intents, intent keys, and applications
//! - **Intent model**: The immutable [`Intent`] policy object and its shapes
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use netintent_core::{ApplicationId, ConnectPoint, Intent, IntentKind, Key};
//!
//! let app = ApplicationId::new(1, "org.example.fwd");
//! let intent = Intent::new(
//!     app.clone(),
//!     Key::of("h1-to-h2", &app),
//!     IntentKind::PointToPoint {
//!         ingress: ConnectPoint::new("of:0000000000000001", 1),
//!         egress: ConnectPoint::new("of:0000000000000002", 1),
//!     },
//! );
//!
//! assert!(!intent.is_installable());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod intent;

pub use error::{CoreError, Result};
pub use ids::{ApplicationId, IdError, IntentId, Key};
pub use intent::{
    ConnectPoint, Criterion, DeviceId, FlowRule, HostId, Instruction, Intent, IntentKind, Link,
    NetworkResource, TrafficSelector, TrafficTreatment,
};
