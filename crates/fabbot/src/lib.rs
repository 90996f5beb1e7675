//! Fabrika: Telegram wiring for the multi-tenant bot platform.
//!
//! The conversation engine lives in `fabcore`; this crate supplies the
//! transports (admin long polling, worker webhooks), the Postgres-backed
//! boundary implementations and the MTProto auth client.

pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod logging;
pub mod telegram;
pub mod worker;
