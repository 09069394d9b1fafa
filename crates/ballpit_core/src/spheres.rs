//! Sphere instances of one scene.
//!
//! Every body is an entity sharing a single unit-sphere mesh and a single
//! material, so Bevy batches the whole scene into one instanced draw. Per-body
//! state is the transform plus a `MeshTag` indexing the tint buffer read by
//! the shader. Body 0 also carries the scene's point light, which follows it
//! and shares its color.

use ballpit_physics::PhysicsEngine;
use bevy::ecs::system::SystemParam;
use bevy::mesh::MeshTag;
use bevy::prelude::*;
use bevy::render::storage::ShaderStorageBuffer;

use crate::config::BallpitConfig;
use crate::material::{ball_material, instance_color_data, linear_vec4, BallMaterial};
use crate::palette::sample_palette;

/// Index of the body an instance renders.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallInstance {
    pub index: usize,
}

/// Marks the point light that follows body 0.
#[derive(Component, Debug, Clone, Copy)]
pub struct BallLight;

/// Asset stores touched when building or tearing down instances.
#[derive(SystemParam)]
pub struct SphereAssets<'w> {
    pub meshes: ResMut<'w, Assets<Mesh>>,
    pub materials: ResMut<'w, Assets<BallMaterial>>,
    pub buffers: ResMut<'w, Assets<ShaderStorageBuffer>>,
}

/// Transform for body `index`. Body 0 collapses to zero scale when it does not
/// follow the cursor.
pub fn instance_transform(index: usize, position: Vec3, size: f32, follow_cursor: bool) -> Transform {
    let scale = if index == 0 && !follow_cursor { 0.0 } else { size };
    Transform::from_translation(position).with_scale(Vec3::splat(scale))
}

/// Entities and assets backing one scene's spheres.
#[derive(Debug)]
pub struct SphereInstances {
    mesh: Handle<Mesh>,
    material: Handle<BallMaterial>,
    instance_colors: Handle<ShaderStorageBuffer>,
    entities: Vec<Entity>,
    light: Entity,
    colors: Vec<Color>,
    /// Last light position written into the material
    light_position: Option<Vec3>,
}

impl SphereInstances {
    /// Spawn one instance per body plus the point light, all parented to `root`.
    pub fn spawn(
        commands: &mut Commands,
        root: Entity,
        engine: &PhysicsEngine,
        config: &BallpitConfig,
        palette: &[Color],
        assets: &mut SphereAssets,
    ) -> Self {
        let count = engine.count();
        let follow = engine.config().follow_cursor;
        let colors = sample_palette(palette, count);
        let lead = colors.first().copied().unwrap_or(Color::WHITE);

        let mesh = assets.meshes.add(Sphere::new(1.0).mesh().uv(32, 18));
        let instance_colors = assets
            .buffers
            .add(ShaderStorageBuffer::from(instance_color_data(&colors)));
        let material = assets.materials.add(ball_material(
            instance_colors.clone(),
            lead,
            &config.material,
            &config.subsurface,
        ));

        let mut entities = Vec::with_capacity(count);
        for index in 0..count {
            let entity = commands
                .spawn((
                    BallInstance { index },
                    MeshTag(index as u32),
                    Mesh3d(mesh.clone()),
                    MeshMaterial3d(material.clone()),
                    instance_transform(
                        index,
                        engine.positions()[index],
                        engine.sizes()[index],
                        follow,
                    ),
                    ChildOf(root),
                ))
                .id();
            entities.push(entity);
        }

        let light = commands
            .spawn((
                BallLight,
                PointLight {
                    color: lead,
                    intensity: config.light_intensity,
                    range: config.light_range,
                    shadows_enabled: false,
                    ..default()
                },
                Transform::from_translation(engine.positions().first().copied().unwrap_or_default()),
                ChildOf(root),
            ))
            .id();

        debug!("Spawned {} sphere instances under {:?}", count, root);

        Self {
            mesh,
            material,
            instance_colors,
            entities,
            light,
            colors,
            light_position: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn light(&self) -> Entity {
        self.light
    }

    /// Material shared by every instance.
    pub fn material(&self) -> &Handle<BallMaterial> {
        &self.material
    }

    /// Current per-instance colors.
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Retint every instance from `palette`. Returns the color of instance 0,
    /// which the caller applies to the point light.
    pub fn set_colors(&mut self, palette: &[Color], assets: &mut SphereAssets) -> Color {
        self.colors = sample_palette(palette, self.entities.len());
        let lead = self.colors.first().copied().unwrap_or(Color::WHITE);

        if let Some(buffer) = assets.buffers.get_mut(&self.instance_colors) {
            buffer.set_data(instance_color_data(&self.colors));
        }
        if let Some(material) = assets.materials.get_mut(&self.material) {
            material.extension.uniforms.light_color = linear_vec4(lead);
        }
        lead
    }

    /// Copy simulation state into instance transforms and move the light
    /// onto body 0. Unchanged transforms are left untouched.
    pub fn write_transforms(
        &self,
        engine: &PhysicsEngine,
        transforms: &mut Query<&mut Transform, With<BallInstance>>,
    ) -> Vec3 {
        let follow = engine.config().follow_cursor;
        let positions = engine.positions();
        let sizes = engine.sizes();

        for (index, &entity) in self.entities.iter().enumerate() {
            if let Ok(mut transform) = transforms.get_mut(entity) {
                transform.set_if_neq(instance_transform(index, positions[index], sizes[index], follow));
            }
        }
        positions.first().copied().unwrap_or_default()
    }

    /// Feed the light position into the glow term. Returns false when the
    /// position did not move and the material was left alone.
    pub fn set_light_position(
        &mut self,
        world_position: Vec3,
        materials: &mut Assets<BallMaterial>,
    ) -> bool {
        if self.light_position == Some(world_position) {
            return false;
        }
        let Some(material) = materials.get_mut(&self.material) else {
            return false;
        };
        material.extension.uniforms.light_position = world_position.extend(1.0);
        self.light_position = Some(world_position);
        true
    }

    /// Drop the mesh, material and color buffer.
    pub fn release_assets(&self, assets: &mut SphereAssets) {
        assets.meshes.remove(&self.mesh);
        assets.materials.remove(&self.material);
        assets.buffers.remove(&self.instance_colors);
    }

    /// Despawn every instance and the light, then release the assets.
    pub fn despawn(self, commands: &mut Commands, assets: &mut SphereAssets) {
        for &entity in &self.entities {
            commands.entity(entity).despawn();
        }
        commands.entity(self.light).despawn();
        self.release_assets(assets);
    }
}
