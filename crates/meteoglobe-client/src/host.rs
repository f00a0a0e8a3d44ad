//! Host-facing interface of the globe view.
//!
//! The surrounding application drives the globe through [`GlobeTarget`] and
//! observes it through [`LoadEvent`] messages and the per-frame
//! [`MarkerScreenPosition`] resource. Nothing else crosses the boundary.

use bevy::ecs::message::Message;
use bevy::prelude::*;

use crate::coords::GeoCoordinate;

/// Plugin registering the host-facing resources and messages.
pub struct HostPlugin;

impl Plugin for HostPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GlobeTarget>()
            .init_resource::<GlobeClient>()
            .init_resource::<ViewState>()
            .init_resource::<MarkerScreenPosition>()
            .add_message::<LoadEvent>();
    }
}

/// What the host wants the globe to show.
///
/// Setting `coordinate` flies the camera there and places a marker; clearing
/// it hands control back to the user. `country_code` independently drives
/// the border overlay.
#[derive(Resource, Debug, Default)]
pub struct GlobeTarget {
    pub coordinate: Option<GeoCoordinate>,
    /// ISO country code; compared case-insensitively.
    pub country_code: Option<String>,
}

/// Shared HTTP client for every service the globe talks to.
#[derive(Resource, Default)]
pub struct GlobeClient(pub meteoglobe::Client);

/// Interaction state of the view.
///
/// While targeting, free orbit input is disabled and a marker is shown.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Default)]
pub enum ViewState {
    #[default]
    Idle,
    Targeting(GeoCoordinate),
}

/// The two sequential loading stages of the asset pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStage {
    /// The fixed batch of base planet textures.
    BaseTextures,
    /// The streamed satellite cloud composite.
    CloudImagery,
}

/// Progress reporting towards the host.
///
/// `Completed` is an explicit event, fired exactly once per stage run even
/// when no percent ever reached 100 (e.g. unknown content length).
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub enum LoadEvent {
    Progress { stage: LoadStage, percent: f32 },
    Completed { stage: LoadStage },
}

/// Pixel position of the marker in the primary window, updated every frame.
///
/// `None` when no marker exists or the marker is off-screen; the host uses
/// this to anchor (or hide) the weather card.
#[derive(Resource, Debug, Default)]
pub struct MarkerScreenPosition(pub Option<Vec2>);
