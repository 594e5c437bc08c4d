//! Sales Dialogue - scripted chat sales funnel.
//!
//! Drives each customer chat through a versioned sales script, hands the
//! chat to a human operator when the script cannot continue, and splits new
//! chats between script versions to compare their conversion.
//!
//! Layout follows ports and adapters:
//! - `domain` - scripts, prices, conversation state, alerts, variant stats
//! - `ports` - traits for storage, transport, reply generation and events
//! - `application` - the dialogue engine, per-chat workers, background flush
//! - `adapters` - files, HTTP, WebSocket, OpenAI and gateway implementations
//! - `config` - environment-driven configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
