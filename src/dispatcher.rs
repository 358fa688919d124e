//! Event dispatch and command handling
//!
//! Every event type resolves to exactly one handler; unknown types are
//! acknowledged without a reply. Admin commands in text messages:
//!
//! - `/help` - list the commands
//! - `/broadcast <message>` - broadcast the message and ring the phones
//! - `/stats` - metrics of the sender's last broadcast
//!
//! `/version` is available to everyone.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::broadcast::{BroadcastJob, Broadcaster};
use crate::events::{AssetPayload, CallEvent, EventKind, InboundEvent};
use crate::roman::{RomanClient, RomanError};
use crate::store::BroadcastStore;
use crate::version::read_version;
use crate::wire::WireMessage;

// =============================================================================
// Replies
// =============================================================================

pub const HELP_MESSAGE: &str = "`/broadcast message` to broadcast the message to users and ring their phones\n\
                                `/stats` metrics of the last broadcast\n\
                                `/version` to print current application version.";

pub const SUBSCRIPTION_CONFIRMED: &str = "Subscription confirmed.";

pub const BROADCAST_QUEUED: &str =
    "Broadcast queued for execution. Use /stats to see the broadcast metrics.";

pub const AUDIO_BROADCAST_QUEUED: &str =
    "Audio broadcast queued for execution. Use /stats to see the metrics.";

// =============================================================================
// Handler Types
// =============================================================================

/// Per-request facts derived from the tenant
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub is_user_admin: bool,
    pub app_key: String,
}

/// Failure that has to reach the webhook caller
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to fetch broadcast stats: {0}")]
    Stats(#[from] RomanError),

    #[error("malformed asset payload: {0}")]
    Asset(#[source] serde_json::Error),
}

/// Admin command at the start of a text message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdminCommand<'a> {
    Help,
    Broadcast(&'a str),
    Stats,
}

impl<'a> AdminCommand<'a> {
    /// Prefix match, first match wins
    fn parse(text: &'a str) -> Option<Self> {
        if text.starts_with("/help") {
            Some(Self::Help)
        } else if let Some(rest) = text.strip_prefix("/broadcast")
            && let Some(separator) = rest.chars().next()
            && separator.is_whitespace()
        {
            Some(Self::Broadcast(&rest[separator.len_utf8()..]))
        } else if text.starts_with("/stats") {
            Some(Self::Stats)
        } else {
            None
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Routes webhook events to their handlers
#[derive(Clone)]
pub struct Dispatcher {
    roman: RomanClient,
    store: Arc<dyn BroadcastStore>,
    broadcaster: Broadcaster,
    release_file_path: Option<PathBuf>,
}

impl Dispatcher {
    pub fn new(
        roman: RomanClient,
        store: Arc<dyn BroadcastStore>,
        release_file_path: Option<PathBuf>,
    ) -> Self {
        let broadcaster = Broadcaster::new(roman.clone(), store.clone());
        Self {
            roman,
            store,
            broadcaster,
            release_file_path,
        }
    }

    /// Handle one event and produce the optional reply
    pub async fn dispatch(
        &self,
        event: InboundEvent,
        ctx: &HandlerContext,
    ) -> Result<Option<WireMessage>, DispatchError> {
        let InboundEvent {
            event_type,
            user_id,
            message_id,
            kind,
        } = event;
        info!(user_id = %user_id, message_id = %message_id, "Handling message type {}.", event_type);

        let reply = match kind {
            EventKind::Init => Some(WireMessage::text(if ctx.is_user_admin {
                HELP_MESSAGE
            } else {
                SUBSCRIPTION_CONFIRMED
            })),
            EventKind::NewText(text) => {
                self.handle_new_text(&text.text, &user_id, &message_id, ctx)
                    .await?
            }
            EventKind::Call(call) => handle_call(&call, &user_id, &message_id),
            EventKind::Asset(asset) => self.handle_asset(asset, user_id, message_id, ctx)?,
            EventKind::Unknown => None,
        };

        Ok(reply)
    }

    async fn handle_new_text(
        &self,
        text: &str,
        user_id: &str,
        message_id: &str,
        ctx: &HandlerContext,
    ) -> Result<Option<WireMessage>, DispatchError> {
        let mut reply = None;

        if ctx.is_user_admin {
            match AdminCommand::parse(text) {
                Some(AdminCommand::Help) => reply = Some(HELP_MESSAGE.to_string()),
                Some(AdminCommand::Broadcast(message)) => {
                    self.broadcaster.spawn(BroadcastJob {
                        message: WireMessage::text(message),
                        app_key: ctx.app_key.clone(),
                        user_id: user_id.to_string(),
                        message_id: message_id.to_string(),
                    });
                    reply = Some(BROADCAST_QUEUED.to_string());
                }
                Some(AdminCommand::Stats) => {
                    let last = self.store.last_broadcast(user_id);
                    let report = self.roman.stats(&ctx.app_key, last.as_deref()).await?;
                    reply = Some(report.render());
                }
                None => {}
            }
        }

        // Available to everyone and replaces any reply computed above
        if text.starts_with("/version") {
            reply = Some(read_version(self.release_file_path.as_deref()).await);
        }

        match &reply {
            Some(message) => debug!(user_id, message_id, "Responding with: \"{}\"", message),
            None => debug!(user_id, message_id, "Responding with: no message."),
        }
        Ok(reply.map(WireMessage::text))
    }

    fn handle_asset(
        &self,
        payload: AssetPayload,
        user_id: String,
        message_id: String,
        ctx: &HandlerContext,
    ) -> Result<Option<WireMessage>, DispatchError> {
        if !ctx.is_user_admin {
            return Ok(None);
        }

        let asset = payload.parse().map_err(DispatchError::Asset)?;

        debug!(user_id = %user_id, message_id = %message_id, "Broadcasting the attachment");
        self.broadcaster.spawn(BroadcastJob {
            message: WireMessage::attachment(asset.into_attachment()),
            app_key: ctx.app_key.clone(),
            user_id,
            message_id,
        });

        Ok(Some(WireMessage::text(AUDIO_BROADCAST_QUEUED)))
    }
}

/// Drop the call once somebody answered it
fn handle_call(call: &CallEvent, user_id: &str, message_id: &str) -> Option<WireMessage> {
    let reply = call.is_answered().then(WireMessage::call_drop);
    debug!(
        user_id,
        message_id,
        "Handling a call: {}.",
        if reply.is_some() { "dropping" } else { "ignoring" }
    );
    reply
}
