//! Request filtering applied to every browsing context
//!
//! Images, stylesheets, fonts, media and uncategorised requests are aborted
//! before they leave the browser. Pages render faster and the manifest
//! request is easier to spot among what is left.

use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::defaults::DEFAULT_BLOCKED_RESOURCE_TYPES;
use crate::errors::BrowserResult;

/// Which resource types get aborted
#[derive(Debug, Clone)]
pub struct BlockPolicy {
    blocked: Vec<ResourceType>,
}

impl BlockPolicy {
    pub fn new(blocked: Vec<ResourceType>) -> Self {
        Self { blocked }
    }

    /// Build from configuration names; unknown names are skipped with a warning
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let blocked = names
            .iter()
            .filter_map(|name| {
                let parsed = parse_resource_type(name.as_ref());
                if parsed.is_none() {
                    warn!("Ignoring unknown resource type '{}' in block list", name.as_ref());
                }
                parsed
            })
            .collect();
        Self { blocked }
    }

    pub fn should_block(&self, resource_type: &ResourceType) -> bool {
        self.blocked.contains(resource_type)
    }
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self::from_names(DEFAULT_BLOCKED_RESOURCE_TYPES)
    }
}

/// Map a case-insensitive CDP resource type name
pub fn parse_resource_type(name: &str) -> Option<ResourceType> {
    let resource_type = match name.trim().to_ascii_lowercase().as_str() {
        "document" => ResourceType::Document,
        "stylesheet" => ResourceType::Stylesheet,
        "image" => ResourceType::Image,
        "media" => ResourceType::Media,
        "font" => ResourceType::Font,
        "script" => ResourceType::Script,
        "texttrack" => ResourceType::TextTrack,
        "xhr" => ResourceType::Xhr,
        "fetch" => ResourceType::Fetch,
        "eventsource" => ResourceType::EventSource,
        "websocket" => ResourceType::WebSocket,
        "manifest" => ResourceType::Manifest,
        "signedexchange" => ResourceType::SignedExchange,
        "ping" => ResourceType::Ping,
        "cspviolationreport" => ResourceType::CspViolationReport,
        "other" => ResourceType::Other,
        _ => return None,
    };
    Some(resource_type)
}

/// Turn on request interception for `page` and answer every paused request
/// according to `policy`.
///
/// The listener is subscribed before interception is enabled so no request
/// can stall waiting for an answer. The returned task must be aborted when
/// the page goes away.
pub async fn install(page: &Page, policy: Arc<BlockPolicy>) -> BrowserResult<JoinHandle<()>> {
    let mut paused = page.event_listener::<EventRequestPaused>().await?;
    let responder = page.clone();

    let task = tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let request_id = event.request_id.clone();
            let outcome = if policy.should_block(&event.resource_type) {
                trace!("Blocking {:?} request to {}", event.resource_type, event.request.url);
                responder
                    .execute(FailRequestParams::new(request_id, ErrorReason::BlockedByClient))
                    .await
                    .map(|_| ())
            } else {
                responder
                    .execute(ContinueRequestParams::new(request_id))
                    .await
                    .map(|_| ())
            };

            // The page may already be closing; nothing else to do.
            if let Err(e) = outcome {
                debug!("Could not answer paused request {}: {}", event.request.url, e);
            }
        }
    });

    let enable = EnableParams::builder()
        .pattern(
            RequestPattern::builder()
                .url_pattern("*")
                .request_stage(RequestStage::Request)
                .build(),
        )
        .build();

    if let Err(e) = page.execute(enable).await {
        task.abort();
        return Err(e.into());
    }

    Ok(task)
}
