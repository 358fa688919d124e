//! Roman Broadcast Bridge Library
//!
//! Receives conversation events from Roman, lets channel admins broadcast
//! messages to every subscriber and ring their phones, and reports stats of
//! the last broadcast.
//!
//! # Architecture
//!
//! ```text
//! Roman ──POST /roman──▶ Bridge (this) ──reply──▶ Roman
//!                          │
//!                          ├── Auth Resolver (token → admins, app key)
//!                          ├── Dispatcher (event type → handler)
//!                          └── Broadcaster (background) ──POST /broadcast──▶ Roman
//! ```
//!
//! # Usage
//!
//! ```bash
//! export AUTH_CONFIGURATION_PATH=/etc/roman/auth.json
//! export ROMAN_URL=https://roman.integrations.zinfra.io/  # optional
//! export RELEASE_FILE_PATH=/app/release.txt                # optional
//!
//! roman-broadcast
//! ```
//!
//! ## Admin commands
//!
//! ```text
//! /help                 list the commands
//! /broadcast <message>  broadcast the message and ring the phones
//! /stats                metrics of the last broadcast
//! /version              running version (any user)
//! ```

pub mod auth;
pub mod broadcast;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod logging;
pub mod roman;
pub mod server;
pub mod store;
pub mod version;
pub mod wire;

pub use auth::{AuthResolver, TenantAuth};
pub use broadcast::Broadcaster;
pub use config::BridgeConfig;
pub use dispatcher::Dispatcher;
pub use roman::RomanClient;
pub use store::{BroadcastStore, InMemoryBroadcastStore};
pub use wire::WireMessage;

/// Prelude for common imports
pub mod prelude {
    pub use crate::auth::{AuthResolver, TenantAuth};
    pub use crate::config::BridgeConfig;
    pub use crate::dispatcher::{Dispatcher, HandlerContext};
    pub use crate::events::{EventKind, InboundEvent};
    pub use crate::roman::RomanClient;
    pub use crate::store::{BroadcastStore, InMemoryBroadcastStore};
    pub use crate::wire::WireMessage;
}
