//! # Dialog Service Integration
//!
//! Client for the cloud dialog-understanding runtime: it interprets a user
//! utterance (raw audio) or typed text against a configured bot and returns
//! intents, messages, and updated session state.
//!
//! Structured session data crosses this boundary in two shapes:
//! - On the audio path, request and response metadata travel in HTTP
//!   headers the service types as strings, so every structured value is
//!   wrapped in a compressed envelope (see [`crate::envelope`]). This
//!   module moves the envelope strings verbatim; encoding and decoding
//!   stay with the request orchestration.
//! - On the text path, the service speaks plain JSON bodies.

pub mod client;

pub use client::{DialogClient, TextReply, UtteranceReply};
