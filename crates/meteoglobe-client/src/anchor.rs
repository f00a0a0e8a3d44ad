//! Projects the marker into window coordinates for the host.
//!
//! Runs after transform propagation so the published position matches what
//! the frame actually renders.

use bevy::prelude::*;
use bevy::transform::TransformSystems;

use crate::host::MarkerScreenPosition;
use crate::overlay::Marker;

pub struct ScreenAnchorPlugin;

impl Plugin for ScreenAnchorPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            PostUpdate,
            project_marker_to_screen.after(TransformSystems::Propagate),
        );
    }
}

/// Publish the marker's viewport position, or `None` when there is no
/// marker or it projects outside the view frustum.
#[allow(clippy::needless_pass_by_value)]
fn project_marker_to_screen(
    mut screen_position: ResMut<MarkerScreenPosition>,
    cameras: Query<(&Camera, &GlobalTransform)>,
    markers: Query<&GlobalTransform, With<Marker>>,
) {
    let (Ok((camera, camera_transform)), Ok(marker_transform)) =
        (cameras.single(), markers.single())
    else {
        screen_position.0 = None;
        return;
    };

    screen_position.0 = camera
        .world_to_viewport(camera_transform, marker_transform.translation())
        .ok();
}
