//! Persistent scene graph: lights, planet, and cloud shell.
//!
//! The meshes and materials spawned here live for the whole session; the
//! loader only swaps texture handles into them as downloads finish, so the
//! globe renders immediately with placeholder colors.

use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};

use crate::camera::OrbitCamera;
use crate::materials::{CloudMaterial, CloudUniform, EarthMaterial, SunUniform};

/// Planet sphere radius in scene units.
pub const PLANET_RADIUS: f32 = 5.0;
/// Cloud shell sits just above the surface.
pub const CLOUD_RADIUS: f32 = 5.07;
/// Fallback cloud layer opacity; live imagery raises it to 1.0.
pub const CLOUD_MASK_OPACITY: f32 = 0.8;

/// Plugin owning the persistent 3D scene.
pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GlobeTextures>()
            .add_systems(Startup, setup_scene)
            .add_systems(Update, update_sun_direction);
    }
}

/// Marker component for the planet mesh.
#[derive(Component)]
pub struct Earth;

/// Marker component for the cloud shell.
#[derive(Component)]
pub struct Clouds;

/// Marker component for the sun directional light.
#[derive(Component)]
pub struct SunLight;

/// Current texture handles for the globe, starting as 1x1 placeholders.
///
/// The loader replaces these as downloads arrive; holding them here lets it
/// release the superseded images explicitly.
#[derive(Resource)]
pub struct GlobeTextures {
    pub day: Handle<Image>,
    pub night: Handle<Image>,
    pub bump: Handle<Image>,
    pub specular: Handle<Image>,
    pub cloud: Handle<Image>,
}

impl FromWorld for GlobeTextures {
    fn from_world(world: &mut World) -> Self {
        let mut images = world.resource_mut::<Assets<Image>>();
        Self {
            // Ocean blue until the day map arrives.
            day: images.add(placeholder_image([12, 36, 84, 255], true)),
            night: images.add(placeholder_image([0, 0, 0, 255], true)),
            bump: images.add(placeholder_image([128, 128, 128, 255], false)),
            specular: images.add(placeholder_image([0, 0, 0, 255], false)),
            // Fully transparent so no cloud shows before imagery loads.
            cloud: images.add(placeholder_image([0, 0, 0, 0], true)),
        }
    }
}

/// Material handles for the planet and cloud shell.
#[derive(Resource)]
pub struct GlobeMaterials {
    pub earth: Handle<EarthMaterial>,
    pub clouds: Handle<CloudMaterial>,
}

fn placeholder_image(rgba: [u8; 4], srgb: bool) -> Image {
    let format = if srgb {
        TextureFormat::Rgba8UnormSrgb
    } else {
        TextureFormat::Rgba8Unorm
    };
    Image::new_fill(
        Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        &rgba,
        format,
        RenderAssetUsages::default(),
    )
}

/// Spawn lights, planet, cloud shell, and the orbit camera.
#[allow(clippy::needless_pass_by_value)]
fn setup_scene(
    mut commands: Commands,
    textures: Res<GlobeTextures>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut earth_materials: ResMut<Assets<EarthMaterial>>,
    mut cloud_materials: ResMut<Assets<CloudMaterial>>,
) {
    let sun_position = Vec3::new(5.0, 3.0, 5.0);
    commands.spawn((
        DirectionalLight {
            illuminance: 12_000.0,
            ..default()
        },
        Transform::from_translation(sun_position).looking_at(Vec3::ZERO, Vec3::Y),
        SunLight,
    ));

    let sun_direction = sun_position.normalize();

    let earth_material = earth_materials.add(EarthMaterial {
        day_texture: textures.day.clone(),
        night_texture: textures.night.clone(),
        specular_texture: textures.specular.clone(),
        bump_texture: textures.bump.clone(),
        sun: SunUniform::towards(sun_direction),
    });
    commands.spawn((
        Mesh3d(meshes.add(Sphere::new(PLANET_RADIUS).mesh().uv(64, 64))),
        MeshMaterial3d(earth_material.clone()),
        Transform::default(),
        Name::new("Earth"),
        Earth,
    ));

    let cloud_material = cloud_materials.add(CloudMaterial {
        cloud_texture: textures.cloud.clone(),
        settings: CloudUniform::with_opacity(CLOUD_MASK_OPACITY),
    });
    commands.spawn((
        Mesh3d(meshes.add(Sphere::new(CLOUD_RADIUS).mesh().uv(64, 64))),
        MeshMaterial3d(cloud_material.clone()),
        Transform::default(),
        Name::new("Clouds"),
        Clouds,
    ));

    commands.insert_resource(GlobeMaterials {
        earth: earth_material,
        clouds: cloud_material,
    });

    commands.spawn((
        Camera3d::default(),
        Camera {
            clear_color: bevy::camera::ClearColorConfig::Custom(Color::BLACK),
            ..default()
        },
        // Per-camera ambient fill so the night side is not pitch black.
        AmbientLight {
            color: Color::srgb_u8(0xbb, 0xbb, 0xbb),
            brightness: 300.0,
            ..default()
        },
        Transform::from_xyz(0.0, 0.0, OrbitCamera::DEFAULT_DISTANCE)
            .looking_at(Vec3::ZERO, Vec3::Y),
        OrbitCamera::default(),
    ));

    tracing::info!("Scene setup complete - drag to orbit, scroll to zoom");
}

/// Keep the material sun uniform in sync when the directional light moves.
#[allow(clippy::needless_pass_by_value)]
fn update_sun_direction(
    sun_query: Query<&Transform, (With<SunLight>, Changed<Transform>)>,
    globe_materials: Option<Res<GlobeMaterials>>,
    mut earth_materials: ResMut<Assets<EarthMaterial>>,
) {
    let (Ok(sun_transform), Some(globe_materials)) = (sun_query.single(), globe_materials) else {
        return;
    };

    // The light looks at the origin, so towards-the-sun is its reverse forward.
    let sun_direction = -*sun_transform.forward();
    if let Some(material) = earth_materials.get_mut(&globe_materials.earth) {
        material.sun = SunUniform::towards(sun_direction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_spawns_camera_with_ambient_fill() {
        let mut app = App::new();
        app.init_resource::<Assets<Image>>()
            .init_resource::<Assets<Mesh>>()
            .init_resource::<Assets<EarthMaterial>>()
            .init_resource::<Assets<CloudMaterial>>()
            .init_resource::<GlobeTextures>()
            .add_systems(Startup, setup_scene);
        app.update();

        // Ambient fill rides on the camera entity alongside the orbit state.
        let mut cameras = app.world_mut().query::<(&AmbientLight, &OrbitCamera)>();
        assert_eq!(cameras.iter(app.world()).count(), 1);
        assert!(app.world().contains_resource::<GlobeMaterials>());

        let mut suns = app.world_mut().query::<&SunLight>();
        assert_eq!(suns.iter(app.world()).count(), 1);
    }
}
