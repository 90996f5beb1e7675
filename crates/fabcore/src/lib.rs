//! Fabrika core: conversation engine for the multi-tenant bot platform.
//!
//! Every dynamically created bot shares this engine: a durable session
//! store keyed by (bot, user), a pure conversation state machine, and a
//! dispatch router that glues them together per inbound event. No Telegram
//! types live here; the transport layer in the `fabrika` binary maps
//! updates in and instructions out.
//!
//! # Module Structure
//!
//! - `store`: durable keyed TTL storage (Redis + in-memory)
//! - `fsm`: pure transition function and input validation
//! - `router`: per-event dispatch, auth round trips
//! - `guard`: blocked-bot/user and expiry enforcement
//! - `refcode`: referral code generation

pub mod config;
pub mod error;
pub mod fsm;
pub mod guard;
pub mod provisioning;
pub mod refcode;
pub mod router;
pub mod session;
pub mod state;
pub mod store;

// Re-export commonly used types for convenience
pub use error::{AppError, AppResult};
pub use fsm::{transition, Callback, Command, Directive, Event, Keyboard, Reply};
pub use guard::{BotDirectory, Guard};
pub use router::{AuthClient, Outbound, Router};
pub use session::AuthSession;
pub use state::{ConversationState, FlowData, Step};
pub use store::{memory::MemorySessionStore, redis::RedisSessionStore, SessionStore};
