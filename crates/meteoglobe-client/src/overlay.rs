//! Marker and country-border overlays.
//!
//! The marker is a spinning octahedron floating just above the planet at the
//! targeted coordinates. Borders are polyline rings fetched per country
//! code, drawn without depth testing so they stay visible over terrain, and
//! cached so revisiting a country never refetches.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::asset::RenderAssetUsages;
use bevy::mesh::PrimitiveTopology;
use bevy::prelude::*;

use meteoglobe::BoundaryGeometry;

use crate::async_runtime::TaskSpawner;
use crate::coords::GeoCoordinate;
use crate::host::{GlobeClient, GlobeTarget, ViewState};
use crate::materials::BorderLineMaterial;

/// Marker orbit altitude, above the cloud layer.
const MARKER_RADIUS: f64 = 5.15;
/// Octahedron circumradius.
const MARKER_SIZE: f32 = 0.07;
/// Marker spin rate in radians per second.
const MARKER_SPIN: f32 = 0.6;
/// Border polyline altitude, just above the surface.
const BORDER_RADIUS: f64 = 5.06;
/// Relative scale of the glow pass behind each border line.
const GLOW_SCALE: f32 = 1.005;

const BORDER_COLOR: Srgba = Srgba::new(1.0, 0.84, 0.25, 0.9);
const GLOW_COLOR: Srgba = Srgba::new(1.0, 0.84, 0.25, 0.25);

/// Plugin for the marker and border overlays.
pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<BorderCache>()
            .init_resource::<BorderState>()
            .add_systems(
                Update,
                // The border pair must run in this order: a code change has
                // to bump the generation before arriving results are judged
                // against it.
                (sync_marker, spin_marker, (sync_border, poll_border).chain()),
            );
    }
}

/// The location marker entity, holding its assets for cleanup.
#[derive(Component)]
pub struct Marker {
    mesh: Handle<Mesh>,
    material: Handle<StandardMaterial>,
}

/// Root entity of the current border overlay; rings are children.
#[derive(Component, Default)]
pub struct BorderOverlay {
    meshes: Vec<Handle<Mesh>>,
    materials: Vec<Handle<BorderLineMaterial>>,
}

/// Fetched boundary geometry by uppercase country code.
///
/// Entries are kept for the lifetime of the app; simplified ADM0 outlines
/// are small and countries are revisited often.
#[derive(Resource, Default)]
pub struct BorderCache(HashMap<String, Arc<BoundaryGeometry>>);

/// Tracks the in-flight border fetch and its result channel.
///
/// `generation` increments on every code change; results arriving tagged
/// with an older generation are discarded, so a slow response for a
/// previous country can never overwrite the current one.
#[derive(Resource)]
pub struct BorderState {
    generation: u64,
    last_code: Option<String>,
    result_rx: async_channel::Receiver<BorderFetchResult>,
    result_tx: async_channel::Sender<BorderFetchResult>,
}

struct BorderFetchResult {
    generation: u64,
    code: String,
    outcome: Result<BoundaryGeometry, meteoglobe::Error>,
}

impl Default for BorderState {
    fn default() -> Self {
        let (result_tx, result_rx) = async_channel::unbounded();
        Self {
            generation: 0,
            last_code: None,
            result_rx,
            result_tx,
        }
    }
}

impl BorderState {
    /// Start a new fetch, invalidating any still in flight.
    fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}

/// What `sync_border` should do for a target code.
#[derive(Debug)]
enum BorderAction {
    Clear,
    UseCached(Arc<BoundaryGeometry>),
    Fetch(String),
}

fn plan_border_update(code: Option<&str>, cache: &BorderCache) -> BorderAction {
    match code {
        None => BorderAction::Clear,
        Some(code) => {
            let code = code.to_ascii_uppercase();
            match cache.0.get(&code) {
                Some(geometry) => BorderAction::UseCached(Arc::clone(geometry)),
                None => BorderAction::Fetch(code),
            }
        }
    }
}

/// Keep exactly one marker in sync with the view state.
#[allow(clippy::needless_pass_by_value)]
fn sync_marker(
    mut commands: Commands,
    view_state: Res<ViewState>,
    existing: Query<(Entity, &Marker)>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if !view_state.is_changed() {
        return;
    }

    for (entity, marker) in &existing {
        meshes.remove(&marker.mesh);
        materials.remove(&marker.material);
        commands.entity(entity).despawn();
    }

    let ViewState::Targeting(coordinate) = *view_state else {
        return;
    };

    let mesh = meshes.add(octahedron_mesh(MARKER_SIZE));
    let material = materials.add(StandardMaterial {
        base_color: Color::srgb(1.0, 0.8, 0.2),
        emissive: LinearRgba::rgb(2.5, 1.7, 0.3),
        ..default()
    });
    commands.spawn((
        Marker {
            mesh: mesh.clone(),
            material: material.clone(),
        },
        Mesh3d(mesh),
        MeshMaterial3d(material),
        Transform::from_translation(coordinate.to_cartesian(MARKER_RADIUS)),
    ));
}

#[allow(clippy::needless_pass_by_value)]
fn spin_marker(time: Res<Time>, mut markers: Query<&mut Transform, With<Marker>>) {
    for mut transform in &mut markers {
        transform.rotate_local_y(MARKER_SPIN * time.delta_secs());
    }
}

/// React to country code changes: clear, reuse cache, or kick off a fetch.
#[allow(clippy::needless_pass_by_value, clippy::too_many_arguments)]
fn sync_border(
    mut commands: Commands,
    target: Res<GlobeTarget>,
    cache: Res<BorderCache>,
    mut state: ResMut<BorderState>,
    client: Res<GlobeClient>,
    spawner: TaskSpawner,
    existing: Query<(Entity, &BorderOverlay)>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<BorderLineMaterial>>,
) {
    if !target.is_changed() {
        return;
    }

    // Coordinate-only changes to the target must not touch the border.
    let normalized = target
        .country_code
        .as_deref()
        .map(str::to_ascii_uppercase);
    if normalized == state.last_code {
        return;
    }
    state.last_code.clone_from(&normalized);

    despawn_border(&mut commands, &existing, &mut meshes, &mut materials);

    match plan_border_update(normalized.as_deref(), &cache) {
        BorderAction::Clear => {
            // Invalidate so a late response for the old code is dropped.
            state.begin();
        }
        BorderAction::UseCached(geometry) => {
            state.begin();
            spawn_border_group(&mut commands, &mut meshes, &mut materials, &geometry);
        }
        BorderAction::Fetch(code) => {
            let generation = state.begin();
            let client = client.0.clone();
            let result_tx = state.result_tx.clone();
            tracing::info!("Fetching border geometry for {code}");
            spawner.spawn(async move {
                let outcome = client.fetch_boundary(&code).await;
                let _ = result_tx
                    .send(BorderFetchResult {
                        generation,
                        code,
                        outcome,
                    })
                    .await;
            });
        }
    }
}

/// Drain completed border fetches and build the overlay for current ones.
#[allow(clippy::needless_pass_by_value)]
fn poll_border(
    mut commands: Commands,
    mut state: ResMut<BorderState>,
    mut cache: ResMut<BorderCache>,
    existing: Query<(Entity, &BorderOverlay)>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<BorderLineMaterial>>,
) {
    while let Ok(result) = state.result_rx.try_recv() {
        if !state.is_current(result.generation) {
            tracing::debug!(
                "Discarding stale border response for {} (generation {})",
                result.code,
                result.generation
            );
            continue;
        }

        match result.outcome {
            Ok(geometry) => {
                let geometry = Arc::new(geometry);
                cache.0.insert(result.code, Arc::clone(&geometry));
                despawn_border(&mut commands, &existing, &mut meshes, &mut materials);
                spawn_border_group(&mut commands, &mut meshes, &mut materials, &geometry);
            }
            Err(error) => {
                tracing::error!("Border fetch for {} failed: {error}", result.code);
                despawn_border(&mut commands, &existing, &mut meshes, &mut materials);
                // Forget the failed code so selecting it again retries.
                state.last_code = None;
            }
        }
    }
}

fn despawn_border(
    commands: &mut Commands,
    existing: &Query<(Entity, &BorderOverlay)>,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<BorderLineMaterial>,
) {
    for (entity, overlay) in existing {
        for mesh in &overlay.meshes {
            meshes.remove(mesh);
        }
        for material in &overlay.materials {
            materials.remove(material);
        }
        commands.entity(entity).despawn();
    }
}

/// Spawn one root entity with a core line and a glow line per ring.
fn spawn_border_group(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<BorderLineMaterial>,
    geometry: &BoundaryGeometry,
) {
    let mut overlay = BorderOverlay::default();
    let mut rings = Vec::new();
    for ring in &geometry.rings {
        let mesh = meshes.add(ring_line_mesh(ring, BORDER_RADIUS));
        let core = materials.add(BorderLineMaterial::new(BORDER_COLOR));
        let glow = materials.add(BorderLineMaterial::new(GLOW_COLOR));
        overlay.meshes.push(mesh.clone());
        overlay.materials.push(core.clone());
        overlay.materials.push(glow.clone());
        rings.push((mesh, core, glow));
    }

    commands
        .spawn((overlay, Transform::default(), Visibility::default()))
        .with_children(|parent| {
            for (mesh, core, glow) in rings {
                parent.spawn((
                    Mesh3d(mesh.clone()),
                    MeshMaterial3d(core),
                    Transform::default(),
                ));
                // A slightly enlarged copy reads as a soft glow.
                parent.spawn((
                    Mesh3d(mesh),
                    MeshMaterial3d(glow),
                    Transform::from_scale(Vec3::splat(GLOW_SCALE)),
                ));
            }
        });
}

/// Closed line-strip through the ring's points at the given altitude.
fn ring_line_mesh(ring: &[meteoglobe::GeoPoint], radius: f64) -> Mesh {
    let mut positions: Vec<[f32; 3]> = ring
        .iter()
        .map(|point| GeoCoordinate::from(*point).to_cartesian(radius).to_array())
        .collect();
    if let Some(first) = positions.first().copied() {
        positions.push(first);
    }

    let mut mesh = Mesh::new(
        PrimitiveTopology::LineStrip,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh
}

/// Non-indexed octahedron with flat-shaded faces.
fn octahedron_mesh(size: f32) -> Mesh {
    let top = [0.0, size, 0.0];
    let bottom = [0.0, -size, 0.0];
    let px = [size, 0.0, 0.0];
    let nx = [-size, 0.0, 0.0];
    let pz = [0.0, 0.0, size];
    let nz = [0.0, 0.0, -size];

    // Counter-clockwise winding viewed from outside.
    let positions: Vec<[f32; 3]> = [
        [top, pz, px],
        [top, px, nz],
        [top, nz, nx],
        [top, nx, pz],
        [bottom, px, pz],
        [bottom, nz, px],
        [bottom, nx, nz],
        [bottom, pz, nx],
    ]
    .into_iter()
    .flatten()
    .collect();
    let uvs = vec![[0.0, 0.0]; positions.len()];

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.compute_flat_normals();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::mesh::VertexAttributeValues;
    use meteoglobe::GeoPoint;

    fn test_ring() -> Vec<GeoPoint> {
        vec![
            GeoPoint { lat: 0.0, lon: 0.0 },
            GeoPoint { lat: 0.0, lon: 1.0 },
            GeoPoint { lat: 1.0, lon: 1.0 },
            GeoPoint { lat: 1.0, lon: 0.0 },
        ]
    }

    fn positions(mesh: &Mesh) -> &Vec<[f32; 3]> {
        match mesh.attribute(Mesh::ATTRIBUTE_POSITION).unwrap() {
            VertexAttributeValues::Float32x3(values) => values,
            other => panic!("unexpected position format: {other:?}"),
        }
    }

    #[test]
    fn test_ring_mesh_closes_loop_at_altitude() {
        let mesh = ring_line_mesh(&test_ring(), BORDER_RADIUS);
        let positions = positions(&mesh);
        assert_eq!(positions.len(), 5);
        assert_eq!(positions.first(), positions.last());
        for position in positions {
            let length = Vec3::from_array(*position).length();
            assert!((f64::from(length) - BORDER_RADIUS).abs() < 1e-3);
        }
    }

    #[test]
    fn test_octahedron_has_eight_flat_faces() {
        let mesh = octahedron_mesh(MARKER_SIZE);
        let positions = positions(&mesh);
        assert_eq!(positions.len(), 24);
        for position in positions {
            let length = Vec3::from_array(*position).length();
            assert!((length - MARKER_SIZE).abs() < 1e-6);
        }
        assert!(mesh.attribute(Mesh::ATTRIBUTE_NORMAL).is_some());
    }

    #[test]
    fn test_plan_prefers_cache_over_fetch() {
        let mut cache = BorderCache::default();
        assert!(matches!(
            plan_border_update(Some("fr"), &cache),
            BorderAction::Fetch(code) if code == "FR"
        ));
        cache
            .0
            .insert("FR".to_owned(), Arc::new(BoundaryGeometry::default()));
        assert!(matches!(
            plan_border_update(Some("fr"), &cache),
            BorderAction::UseCached(_)
        ));
        assert!(matches!(plan_border_update(None, &cache), BorderAction::Clear));
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let mut state = BorderState::default();
        let first = state.begin();
        let second = state.begin();
        assert!(!state.is_current(first));
        assert!(state.is_current(second));
    }

    #[test]
    fn test_code_change_invalidates_result_arriving_same_frame() {
        let mut app = App::new();
        app.add_plugins(bevy_tokio_tasks::TokioTasksPlugin::default())
            .init_resource::<Assets<Mesh>>()
            .init_resource::<Assets<BorderLineMaterial>>()
            .init_resource::<BorderState>()
            .init_resource::<GlobeTarget>()
            .init_resource::<GlobeClient>()
            .add_systems(Update, (sync_border, poll_border).chain());

        let mut cache = BorderCache::default();
        cache.0.insert(
            "BB".to_owned(),
            Arc::new(BoundaryGeometry {
                rings: vec![test_ring()],
            }),
        );
        app.insert_resource(cache);

        // A fetch for the previous code resolves in the same frame the host
        // switches to a cached code; the code change must win.
        {
            let mut state = app.world_mut().resource_mut::<BorderState>();
            state.last_code = Some("AA".to_owned());
            let generation = state.generation;
            let _ = state.result_tx.try_send(BorderFetchResult {
                generation,
                code: "AA".to_owned(),
                outcome: Ok(BoundaryGeometry {
                    rings: vec![test_ring()],
                }),
            });
        }
        app.world_mut().resource_mut::<GlobeTarget>().country_code = Some("BB".to_owned());
        app.update();

        let mut overlays = app.world_mut().query::<&BorderOverlay>();
        assert_eq!(
            overlays.iter(app.world()).count(),
            1,
            "exactly one border group may be alive"
        );
        // The superseded response never reached the asset store or cache.
        assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 1);
        assert!(!app.world().resource::<BorderCache>().0.contains_key("AA"));
    }

    #[test]
    fn test_failed_fetch_allows_retry_of_same_code() {
        let mut app = App::new();
        app.init_resource::<Assets<Mesh>>()
            .init_resource::<Assets<BorderLineMaterial>>()
            .init_resource::<BorderState>()
            .init_resource::<BorderCache>()
            .add_systems(Update, poll_border);

        {
            let mut state = app.world_mut().resource_mut::<BorderState>();
            state.last_code = Some("AA".to_owned());
            let generation = state.generation;
            let _ = state.result_tx.try_send(BorderFetchResult {
                generation,
                code: "AA".to_owned(),
                outcome: Err(meteoglobe::Error::HttpStatus {
                    url: "boundary".to_string(),
                    status: 502,
                }),
            });
        }
        app.update();

        // Re-selecting the same code must not be short-circuited.
        assert_eq!(app.world().resource::<BorderState>().last_code, None);
    }

    #[test]
    fn test_sync_marker_keeps_single_marker_and_releases_assets() {
        let mut app = App::new();
        app.init_resource::<Assets<Mesh>>()
            .init_resource::<Assets<StandardMaterial>>()
            .init_resource::<ViewState>()
            .add_systems(Update, sync_marker);

        *app.world_mut().resource_mut::<ViewState>() =
            ViewState::Targeting(GeoCoordinate::new(10.0, 20.0));
        app.update();
        *app.world_mut().resource_mut::<ViewState>() =
            ViewState::Targeting(GeoCoordinate::new(-33.0, 151.0));
        app.update();

        let mut markers = app.world_mut().query::<&Marker>();
        assert_eq!(markers.iter(app.world()).count(), 1);
        assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 1);
        assert_eq!(app.world().resource::<Assets<StandardMaterial>>().len(), 1);

        *app.world_mut().resource_mut::<ViewState>() = ViewState::Idle;
        app.update();
        assert_eq!(markers.iter(app.world()).count(), 0);
        assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 0);
    }
}
