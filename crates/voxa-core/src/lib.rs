//! # voxa-core
//!
//! Foundation types for the Voxa realtime session runtime.
//!
//! This crate provides the shared vocabulary the other Voxa crates depend on:
//!
//! - **Wire frames**: [`frame::RawFrame`], one parsed-but-untyped inbound
//!   message with its `type` discriminator and optional `event_id`
//! - **Typed events**: [`events::ServerEvent`] and its per-discriminator
//!   payload structs, the output of the decoder registry
//! - **Session updates**: [`update::SessionUpdate`], the normalized tagged
//!   union handed to application code, including the `Unknown` fallback
//! - **Client commands**: [`command::ClientCommand`] for the outbound send
//!   path, including the avatar connect offer
//! - **Errors**: [`errors::DecodeError`] and friends via `thiserror`
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `voxa-dispatch`, `voxa-avatar`, and
//! `voxa-client`.

#![deny(unsafe_code)]

pub mod command;
pub mod errors;
pub mod events;
pub mod frame;
pub mod update;
