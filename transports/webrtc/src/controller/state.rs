//! Controller state types

use serde::Serialize;
use std::fmt;

use crate::media::RendererEvent;
use crate::session::AttemptId;

/// Coarse controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    /// No address configured, or not started yet
    #[default]
    Idle,
    /// A negotiation attempt is in flight (or its failure is being shown)
    Negotiating,
    /// Remote description applied
    Connected,
    /// The link was lost; a restart is pending or was given up
    Degraded,
    /// Torn down; no further events
    Closed,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::Idle => "idle",
            ControllerState::Negotiating => "negotiating",
            ControllerState::Connected => "connected",
            ControllerState::Degraded => "degraded",
            ControllerState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Loading indicator derived from session and renderer events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingState {
    /// Offer/answer in progress
    Negotiating,
    /// Negotiated, media not flowing yet (or stalled)
    Loading,
    /// Media flowing
    Ready,
}

impl LoadingState {
    /// Loading state after a renderer notification, once connected
    pub fn after(self, event: RendererEvent) -> Self {
        match event {
            RendererEvent::Playing => LoadingState::Ready,
            RendererEvent::Waiting | RendererEvent::Stalled => LoadingState::Loading,
            RendererEvent::Loaded => self,
        }
    }
}

/// Snapshot published by the controller on every transition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ViewerState {
    /// Controller phase
    pub phase: ControllerState,

    /// Loading indicator (`None` while idle or closed)
    pub loading: Option<LoadingState>,

    /// Attempt owning the current session
    #[serde(skip)]
    pub attempt: Option<AttemptId>,

    /// Reconnection attempts since the last successful negotiation
    pub attempts_made: u32,
}
