//! Custom materials for the planet surface, cloud layer, and border lines.
//!
//! All three shaders are embedded as internal assets so the binary needs no
//! asset directory. The planet material blends day and night textures across
//! the terminator; the border material disables depth testing so outlines
//! stay visible through terrain.

use std::marker::PhantomData;

use bevy::asset::uuid::Uuid;
use bevy::mesh::MeshVertexBufferLayoutRef;
use bevy::pbr::{Material, MaterialPipeline, MaterialPipelineKey, MaterialPlugin};
use bevy::prelude::*;
use bevy::render::render_resource::{
    AsBindGroup, CompareFunction, RenderPipelineDescriptor, ShaderType,
    SpecializedMeshPipelineError,
};
use bevy::shader::ShaderRef;

/// UUIDs for the embedded shader assets.
const EARTH_SHADER_UUID: Uuid = Uuid::from_u128(0x6d65_7465_6f67_6c6f_6265_0000_0000_0001);
const CLOUD_SHADER_UUID: Uuid = Uuid::from_u128(0x6d65_7465_6f67_6c6f_6265_0000_0000_0002);
const BORDER_SHADER_UUID: Uuid = Uuid::from_u128(0x6d65_7465_6f67_6c6f_6265_0000_0000_0003);

fn shader_handle(uuid: Uuid) -> Handle<Shader> {
    Handle::Uuid(uuid, PhantomData::<fn() -> Shader>)
}

/// Plugin that registers the globe materials and their shaders.
pub struct GlobeMaterialsPlugin;

impl Plugin for GlobeMaterialsPlugin {
    fn build(&self, app: &mut App) {
        bevy::asset::load_internal_asset!(
            app,
            shader_handle(EARTH_SHADER_UUID),
            "earth_material.wgsl",
            Shader::from_wgsl
        );
        bevy::asset::load_internal_asset!(
            app,
            shader_handle(CLOUD_SHADER_UUID),
            "cloud_material.wgsl",
            Shader::from_wgsl
        );
        bevy::asset::load_internal_asset!(
            app,
            shader_handle(BORDER_SHADER_UUID),
            "border_line_material.wgsl",
            Shader::from_wgsl
        );
        app.add_plugins((
            MaterialPlugin::<EarthMaterial>::default(),
            MaterialPlugin::<CloudMaterial>::default(),
            MaterialPlugin::<BorderLineMaterial>::default(),
        ));
    }
}

/// Sun direction for the terminator computation.
///
/// Points from the planet towards the sun. Padded to 16 bytes for WebGL
/// uniform layout rules.
#[derive(ShaderType, Clone, Copy, Debug)]
#[repr(C)]
pub struct SunUniform {
    pub direction: Vec3,
    pub _padding: f32,
}

impl SunUniform {
    pub fn towards(direction: Vec3) -> Self {
        Self {
            direction,
            _padding: 0.0,
        }
    }
}

/// Planet surface: lit day map, emissive night lights past the terminator,
/// water glint from the specular mask, elevation shading from the bump map.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
pub struct EarthMaterial {
    #[texture(0)]
    #[sampler(1)]
    pub day_texture: Handle<Image>,
    #[texture(2)]
    #[sampler(3)]
    pub night_texture: Handle<Image>,
    #[texture(4)]
    #[sampler(5)]
    pub specular_texture: Handle<Image>,
    #[texture(6)]
    #[sampler(7)]
    pub bump_texture: Handle<Image>,
    #[uniform(8)]
    pub sun: SunUniform,
}

impl Material for EarthMaterial {
    fn fragment_shader() -> ShaderRef {
        ShaderRef::Handle(shader_handle(EARTH_SHADER_UUID))
    }

    fn alpha_mode(&self) -> AlphaMode {
        AlphaMode::Opaque
    }
}

/// Cloud uniform block; opacity padded out to 16 bytes.
#[derive(ShaderType, Clone, Copy, Debug)]
#[repr(C)]
pub struct CloudUniform {
    pub opacity: f32,
    pub _padding: Vec3,
}

impl CloudUniform {
    pub fn with_opacity(opacity: f32) -> Self {
        Self {
            opacity,
            _padding: Vec3::ZERO,
        }
    }
}

/// Semi-transparent cloud shell.
///
/// Alpha comes from the texture's own alpha multiplied by its brightness, so
/// both the alpha-masked fallback layer and the opaque satellite JPEG render
/// as clouds over a visible planet.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
pub struct CloudMaterial {
    #[texture(0)]
    #[sampler(1)]
    pub cloud_texture: Handle<Image>,
    #[uniform(2)]
    pub settings: CloudUniform,
}

impl Material for CloudMaterial {
    fn fragment_shader() -> ShaderRef {
        ShaderRef::Handle(shader_handle(CLOUD_SHADER_UUID))
    }

    fn alpha_mode(&self) -> AlphaMode {
        AlphaMode::Blend
    }
}

/// Flat-color line material for border outlines.
///
/// Depth testing is disabled so the lines stay visible through the planet's
/// silhouette edge and any marker geometry in front of them.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
pub struct BorderLineMaterial {
    #[uniform(0)]
    pub color: Vec4,
}

impl BorderLineMaterial {
    pub fn new(color: Srgba) -> Self {
        Self {
            color: LinearRgba::from(color).to_vec4(),
        }
    }
}

impl Material for BorderLineMaterial {
    fn vertex_shader() -> ShaderRef {
        ShaderRef::Handle(shader_handle(BORDER_SHADER_UUID))
    }

    fn fragment_shader() -> ShaderRef {
        ShaderRef::Handle(shader_handle(BORDER_SHADER_UUID))
    }

    fn alpha_mode(&self) -> AlphaMode {
        AlphaMode::Blend
    }

    fn enable_shadows() -> bool {
        false
    }

    fn enable_prepass() -> bool {
        false
    }

    fn specialize(
        _pipeline: &MaterialPipeline,
        descriptor: &mut RenderPipelineDescriptor,
        _layout: &MeshVertexBufferLayoutRef,
        _key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        // Always pass the depth test; border lines draw over terrain.
        if let Some(depth_stencil) = descriptor.depth_stencil.as_mut() {
            depth_stencil.depth_compare = CompareFunction::Always;
            depth_stencil.depth_write_enabled = false;
        }
        Ok(())
    }
}
