//! Sphere material: standard PBR plus a subsurface glow term.
//!
//! The glow is added through Bevy's `MaterialExtension` hook: the extension
//! shader runs the regular PBR lighting and adds one extra term computed
//! from the view, light and normal vectors. That gives the spheres a soft
//! glassy look instead of a hard metallic highlight.
//!
//! One material is shared by every sphere of a scene so they draw as a single
//! instanced batch. Per-sphere tints live in a storage buffer indexed by the
//! instance's `MeshTag`.

use bevy::pbr::{ExtendedMaterial, MaterialExtension};
use bevy::prelude::*;
use bevy::render::render_resource::{AsBindGroup, ShaderType};
use bevy::render::storage::ShaderStorageBuffer;
use bevy::shader::ShaderRef;

use crate::config::{MaterialSettings, SubsurfaceSettings};

const SUBSURFACE_SHADER_PATH: &str = "shaders/ballpit_subsurface.wgsl";

/// Material used by every sphere instance.
pub type BallMaterial = ExtendedMaterial<StandardMaterial, SubsurfaceExtension>;

/// Registers [`BallMaterial`].
pub struct BallMaterialPlugin;

impl Plugin for BallMaterialPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(MaterialPlugin::<BallMaterial>::default());
    }
}

/// Uniforms of the subsurface term.
#[derive(Clone, Copy, Debug, Default, PartialEq, Reflect, ShaderType)]
pub struct SubsurfaceUniforms {
    /// World-space position of the scene's point light (w unused)
    pub light_position: Vec4,
    /// Linear light color (a unused)
    pub light_color: Vec4,
    pub distortion: f32,
    pub ambient: f32,
    pub attenuation: f32,
    pub power: f32,
    pub scale: f32,
}

impl SubsurfaceUniforms {
    pub fn new(settings: &SubsurfaceSettings, light_color: Color) -> Self {
        Self {
            light_position: Vec4::ZERO,
            light_color: linear_vec4(light_color),
            distortion: settings.distortion,
            ambient: settings.ambient,
            attenuation: settings.attenuation,
            power: settings.power,
            scale: settings.scale,
        }
    }
}

#[derive(Asset, AsBindGroup, Reflect, Debug, Clone)]
pub struct SubsurfaceExtension {
    // Slots 0-99 belong to StandardMaterial.
    #[uniform(100)]
    pub uniforms: SubsurfaceUniforms,
    /// Linear RGBA per instance, indexed by `MeshTag`
    #[storage(101, read_only)]
    pub instance_colors: Handle<ShaderStorageBuffer>,
}

impl MaterialExtension for SubsurfaceExtension {
    fn fragment_shader() -> ShaderRef {
        SUBSURFACE_SHADER_PATH.into()
    }
}

/// Linear RGBA as the shader reads it.
pub fn linear_vec4(color: Color) -> Vec4 {
    let l = color.to_linear();
    Vec4::new(l.red, l.green, l.blue, l.alpha)
}

/// Pack instance colors for the storage buffer.
pub fn instance_color_data(colors: &[Color]) -> Vec<Vec4> {
    colors.iter().copied().map(linear_vec4).collect()
}

/// Build the material shared by every sphere of a scene. The base color is
/// white; the shader multiplies in the instance tint from `instance_colors`.
pub fn ball_material(
    instance_colors: Handle<ShaderStorageBuffer>,
    light_color: Color,
    settings: &MaterialSettings,
    subsurface: &SubsurfaceSettings,
) -> BallMaterial {
    ExtendedMaterial {
        base: StandardMaterial {
            base_color: Color::WHITE,
            metallic: settings.metalness,
            perceptual_roughness: settings.roughness,
            clearcoat: settings.clearcoat,
            clearcoat_perceptual_roughness: settings.clearcoat_roughness,
            ..default()
        },
        extension: SubsurfaceExtension {
            uniforms: SubsurfaceUniforms::new(subsurface, light_color),
            instance_colors,
        },
    }
}
