//! # voxa-dispatch
//!
//! The typed event dispatch layer: turns an untyped stream of
//! `{"type": ..., ...}` JSON frames into strongly-typed session events
//! delivered to subscribers.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `registry` | Discriminator → decoder table, lazy builtin population |
//! | `handlers` | Per-discriminator ordered multicast subscriber slots |
//! | `normalizer` | RawFrame → `SessionUpdate`, 1:1 and order preserving |
//!
//! ## Data Flow
//!
//! Transport text → `RawFrame` → `registry` decode → `handlers` fan-out,
//! and in parallel `normalizer` produces the application-facing
//! `SessionUpdate` for the same frame.

#![deny(unsafe_code)]

pub mod handlers;
pub mod normalizer;
pub mod registry;

pub use handlers::{DispatchOutcome, HandlerTable, SubscriptionId};
pub use normalizer::Normalizer;
pub use registry::Registry;
