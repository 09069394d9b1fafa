//! Debug panel for live ball-pit scenes.
//!
//! An imgui window lists every live [`BallpitScene`] and writes
//! [`SceneCommand`]s for count, pause and dispose. Once every scene is gone it
//! offers to respawn one from the startup config. `Space` and `+`/`-` act on
//! all scenes at once.

use ballpit_core::{
    BallpitConfig, BallpitScene, RenderSurface, SceneAction, SceneCommand, SpawnBallpit,
};
use bevy::prelude::*;
use bevy_mod_imgui::prelude::*;
use std::collections::HashMap;

/// Upper bound of the count slider.
pub const MAX_COUNT: usize = 1000;

/// Count change per `+`/`-` key press.
pub const COUNT_STEP: i64 = 10;

/// Debug window for live scenes plus keyboard shortcuts.
///
/// `config` is what the Respawn button spawns once every scene is gone.
pub struct BallpitPanelPlugin {
    pub config: BallpitConfig,
}

impl Plugin for BallpitPanelPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(bevy_mod_imgui::ImguiPlugin::default())
            .insert_resource(RespawnConfig(self.config.clone()))
            .add_systems(Update, (keyboard_shortcuts, imgui_ui));
    }
}

#[derive(Resource, Debug, Clone)]
struct RespawnConfig(BallpitConfig);

/// `current + delta`, kept within `[1, MAX_COUNT]`.
pub fn step_count(current: usize, delta: i64) -> usize {
    let next = current as i64 + delta;
    next.clamp(1, MAX_COUNT as i64) as usize
}

fn keyboard_shortcuts(
    keys: Res<ButtonInput<KeyCode>>,
    scenes: Query<(Entity, &BallpitScene)>,
    mut commands: MessageWriter<SceneCommand>,
) {
    let delta = if keys.any_just_pressed([KeyCode::Equal, KeyCode::NumpadAdd]) {
        COUNT_STEP
    } else if keys.any_just_pressed([KeyCode::Minus, KeyCode::NumpadSubtract]) {
        -COUNT_STEP
    } else {
        0
    };
    let pause = keys.just_pressed(KeyCode::Space);
    if delta == 0 && !pause {
        return;
    }

    for (entity, scene) in scenes.iter().filter(|(_, s)| !s.is_disposed()) {
        if pause {
            commands.write(SceneCommand {
                scene: entity,
                action: SceneAction::TogglePause,
            });
        }
        if delta != 0 {
            let current = scene.engine().count();
            let count = step_count(current, delta);
            if count != current {
                commands.write(SceneCommand {
                    scene: entity,
                    action: SceneAction::SetCount(count),
                });
            }
        }
    }
}

fn imgui_ui(
    mut context: NonSendMut<ImguiContext>,
    scenes: Query<(Entity, &BallpitScene)>,
    surfaces: Query<Entity, With<RenderSurface>>,
    respawn: Res<RespawnConfig>,
    mut pending: Local<HashMap<Entity, u32>>,
    mut commands: MessageWriter<SceneCommand>,
    mut spawns: MessageWriter<SpawnBallpit>,
) {
    let ui = context.ui();

    pending.retain(|entity, _| scenes.contains(*entity));

    ui.window("Ball pit")
        .size([320.0, 220.0], Condition::FirstUseEver)
        .build(|| {
            let mut live = 0;
            for (entity, scene) in scenes.iter().filter(|(_, s)| !s.is_disposed()) {
                live += 1;
                let count = scene.engine().count();
                ui.text(format!(
                    "{:?}: {} bodies{}",
                    entity,
                    count,
                    if scene.is_paused() { " (paused)" } else { "" }
                ));

                let value = pending.entry(entity).or_insert(count as u32);
                ui.slider(format!("Count##{:?}", entity), 1, MAX_COUNT as u32, value);
                let wanted = *value as usize;

                if ui.button(format!("Apply##{:?}", entity)) && wanted != count {
                    commands.write(SceneCommand {
                        scene: entity,
                        action: SceneAction::SetCount(wanted),
                    });
                }
                ui.same_line();
                let label = if scene.is_paused() { "Resume" } else { "Pause" };
                if ui.button(format!("{}##{:?}", label, entity)) {
                    commands.write(SceneCommand {
                        scene: entity,
                        action: SceneAction::TogglePause,
                    });
                }
                ui.same_line();
                if ui.button(format!("Dispose##{:?}", entity)) {
                    commands.write(SceneCommand {
                        scene: entity,
                        action: SceneAction::Dispose,
                    });
                }
                ui.separator();
            }

            if live == 0 {
                ui.text("No live scenes");
                if ui.button("Respawn") {
                    if let Some(surface) = surfaces.iter().next() {
                        spawns.write(SpawnBallpit {
                            surface,
                            config: respawn.0.clone(),
                        });
                    }
                }
            }

            ui.text("Space: pause  +/-: count");
        });
}
