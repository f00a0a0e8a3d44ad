//! Interactive 3D weather globe using Bevy.
//!
//! Renders a textured Earth with day/night shading and a live cloud layer,
//! flies the camera to host-supplied coordinates, and overlays a location
//! marker plus country borders. A small egui panel stands in for the
//! embedding application.

mod anchor;
mod async_runtime;
mod camera;
mod clouds;
mod coords;
mod host;
mod loader;
mod materials;
mod overlay;
mod scene;
mod ui;

use bevy::ecs::message::MessageReader;
use bevy::prelude::*;

use anchor::ScreenAnchorPlugin;
use async_runtime::AsyncRuntimePlugin;
use camera::CameraControllerPlugin;
use clouds::{CloudRefreshPlugin, CloudRefreshState};
use host::{HostPlugin, LoadEvent, LoadStage};
use loader::TextureLoaderPlugin;
use materials::GlobeMaterialsPlugin;
use overlay::OverlayPlugin;
use scene::ScenePlugin;
use ui::HudPlugin;

/// Plugin for the main application.
pub struct AppPlugin;

impl Plugin for AppPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            AsyncRuntimePlugin,
            HostPlugin,
            GlobeMaterialsPlugin,
            ScenePlugin,
            TextureLoaderPlugin,
            CloudRefreshPlugin,
            CameraControllerPlugin,
            OverlayPlugin,
            ScreenAnchorPlugin,
            HudPlugin,
        ))
        .add_systems(Update, gate_cloud_refresh);
    }
}

/// Hold the cloud refresh cycle until the base textures are in.
fn gate_cloud_refresh(
    mut events: MessageReader<LoadEvent>,
    mut refresh: ResMut<CloudRefreshState>,
) {
    for event in events.read() {
        if matches!(
            event,
            LoadEvent::Completed {
                stage: LoadStage::BaseTextures
            }
        ) && !refresh.enabled
        {
            tracing::info!("Base textures loaded, starting cloud refresh cycle");
            refresh.enabled = true;
        }
    }
}

fn main() {
    // Initialize tracing for native platforms.
    #[cfg(not(target_family = "wasm"))]
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Initialize tracing for WASM (logs to browser console).
    #[cfg(target_family = "wasm")]
    {
        console_error_panic_hook::set_once();
        tracing_wasm::set_as_global_default();
    }

    let mut app = App::new();

    #[allow(unused_mut)]
    let mut window = Window {
        title: "meteoglobe".to_string(),
        resolution: (1280, 720).into(),
        ..Default::default()
    };

    // WASM: Fit canvas to parent element and prevent browser event handling.
    #[cfg(target_family = "wasm")]
    {
        window.fit_canvas_to_parent = true;
        window.prevent_default_event_handling = true;
    }

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(window),
        ..Default::default()
    }));

    app.add_plugins(AppPlugin).run();
}
