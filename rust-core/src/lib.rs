//! Context Sensing Engine Library
//!
//! Turns a stream of raw accelerometer readings into a small set of discrete
//! device-state properties and publishes each one only when it changes:
//!
//! | Property           | Meaning                                   |
//! |--------------------|-------------------------------------------|
//! | `Screen.TopEdge`   | which screen edge points up               |
//! | `Position.IsFlat`  | device lying roughly horizontal           |
//! | `Screen.IsCovered` | display facing down                       |
//! | `Position.Stable`  | no significant motion for the timeout     |
//! | `Position.Shaky`   | sustained high-variance motion            |
//!
//! # Design Philosophy
//!
//! - **Publish on change**: subscribers never see the same value twice in a row.
//! - **Hysteresis everywhere**: every boolean has a band where it holds its
//!   previous value, so noise near a threshold does not chatter.
//! - **Single writer**: samples and the stability deadline are processed one
//!   at a time by one owner, either a [`ContextPipeline`] directly or the
//!   async [`ContextService`] task.
//!
//! # Example
//!
//! ```
//! use context_sensing::{AccelSample, ContextPipeline};
//!
//! let mut pipeline = ContextPipeline::default();
//! let changes = pipeline.process_sample(&AccelSample::new(0, 60, 960, 18));
//!
//! assert_eq!(changes[0].to_string(), "Screen.TopEdge = QString:\"top\"");
//! ```

pub mod config;
pub mod coverage;
pub mod error;
pub mod orientation;
pub mod pipeline;
pub mod publisher;
pub mod service;
pub mod signal;
pub mod source;
pub mod stability;
pub mod types;
pub mod wire;


// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{ConfigError, ServiceError, SourceError, WireError};
pub use pipeline::ContextPipeline;
pub use publisher::{PropertyPublisher, Subscription};
pub use service::{ContextHandle, ContextService};
pub use types::{
    AccelSample, ContextProperty, ContextSnapshot, PropertyChange, PropertyValue, Stability,
    TopEdge,
};
