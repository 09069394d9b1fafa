//! Pointer tracking for interactive scenes.
//!
//! Scenes register a rectangular element (in window logical pixels) with the
//! [`PointerRegistry`] and receive [`PointerEvent`] messages for it. Raw
//! cursor, click and touch input is only read while at least one scene is
//! registered; the registry keeps an explicit listener count for that.

use bevy::input::touch::{TouchInput, TouchPhase};
use bevy::prelude::*;
use bevy::window::{CursorLeft, CursorMoved};
use std::collections::HashMap;

/// Interaction state of one registered element.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerState {
    pub window: Entity,
    /// Element rectangle in window logical pixels (y down)
    pub bounds: Rect,
    /// Last pointer position relative to the element's top-left corner
    pub position: Vec2,
    /// Last pointer position in [-1, 1], y up
    pub ndc: Vec2,
    pub hover: bool,
    pub touching: bool,
}

impl PointerState {
    fn new(window: Entity, bounds: Rect) -> Self {
        Self {
            window,
            bounds,
            position: Vec2::ZERO,
            ndc: Vec2::ZERO,
            hover: false,
            touching: false,
        }
    }

    fn contains(&self, point: Vec2) -> bool {
        point.x >= self.bounds.min.x
            && point.x <= self.bounds.max.x
            && point.y >= self.bounds.min.y
            && point.y <= self.bounds.max.y
    }

    fn locate(&mut self, point: Vec2) {
        let size = self.bounds.size().max(Vec2::splat(f32::EPSILON));
        self.position = point - self.bounds.min;
        self.ndc = Vec2::new(
            self.position.x / size.x * 2.0 - 1.0,
            -self.position.y / size.y * 2.0 + 1.0,
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventKind {
    Enter,
    Move,
    Click,
    Leave,
}

/// Interaction delivered to the scene that owns the element.
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub owner: Entity,
    pub kind: PointerEventKind,
    pub position: Vec2,
    pub ndc: Vec2,
}

/// Registered elements and the listener count.
#[derive(Resource, Debug, Default)]
pub struct PointerRegistry {
    entries: HashMap<Entity, PointerState>,
    listeners: usize,
}

impl PointerRegistry {
    /// Register `owner`'s element. A second registration of the same owner is
    /// ignored and returns false.
    pub fn register(&mut self, owner: Entity, window: Entity, bounds: Rect) -> bool {
        if self.entries.contains_key(&owner) {
            return false;
        }
        self.entries.insert(owner, PointerState::new(window, bounds));
        self.listeners += 1;
        if self.listeners == 1 {
            debug!("Pointer listeners attached");
        }
        true
    }

    /// Remove `owner`. Unknown owners are ignored, so the count never drops
    /// below zero.
    pub fn unregister(&mut self, owner: Entity) -> bool {
        if self.entries.remove(&owner).is_none() {
            return false;
        }
        self.listeners = self.listeners.saturating_sub(1);
        if self.listeners == 0 {
            debug!("Pointer listeners detached");
        }
        true
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
    }

    pub fn is_listening(&self) -> bool {
        self.listeners > 0
    }

    pub fn get(&self, owner: Entity) -> Option<&PointerState> {
        self.entries.get(&owner)
    }

    /// Update an element rectangle, e.g. after its window resized.
    pub fn set_bounds(&mut self, owner: Entity, bounds: Rect) {
        if let Some(state) = self.entries.get_mut(&owner) {
            state.bounds = bounds;
        }
    }

    pub fn pointer_moved(&mut self, window: Entity, point: Vec2, out: &mut Vec<PointerEvent>) {
        for (&owner, state) in self.entries.iter_mut().filter(|(_, s)| s.window == window) {
            if state.contains(point) {
                state.locate(point);
                if !state.hover {
                    state.hover = true;
                    out.push(event(owner, state, PointerEventKind::Enter));
                }
                out.push(event(owner, state, PointerEventKind::Move));
            } else if state.hover && !state.touching {
                state.hover = false;
                out.push(event(owner, state, PointerEventKind::Leave));
            }
        }
    }

    pub fn clicked(&mut self, window: Entity, point: Vec2, out: &mut Vec<PointerEvent>) {
        for (&owner, state) in self.entries.iter_mut().filter(|(_, s)| s.window == window) {
            if state.contains(point) {
                state.locate(point);
                out.push(event(owner, state, PointerEventKind::Click));
            }
        }
    }

    /// The pointer left the window entirely.
    pub fn pointer_left(&mut self, window: Entity, out: &mut Vec<PointerEvent>) {
        for (&owner, state) in self.entries.iter_mut().filter(|(_, s)| s.window == window) {
            if state.hover {
                state.hover = false;
                out.push(event(owner, state, PointerEventKind::Leave));
            }
        }
    }

    pub fn touch_moved(&mut self, window: Entity, point: Vec2, out: &mut Vec<PointerEvent>) {
        for (&owner, state) in self.entries.iter_mut().filter(|(_, s)| s.window == window) {
            if !state.contains(point) {
                continue;
            }
            state.touching = true;
            state.locate(point);
            if !state.hover {
                state.hover = true;
                out.push(event(owner, state, PointerEventKind::Enter));
            }
            out.push(event(owner, state, PointerEventKind::Move));
        }
    }

    pub fn touch_ended(&mut self, window: Entity, out: &mut Vec<PointerEvent>) {
        for (&owner, state) in self.entries.iter_mut().filter(|(_, s)| s.window == window) {
            if !state.touching {
                continue;
            }
            state.touching = false;
            if state.hover {
                state.hover = false;
                out.push(event(owner, state, PointerEventKind::Leave));
            }
        }
    }
}

fn event(owner: Entity, state: &PointerState, kind: PointerEventKind) -> PointerEvent {
    PointerEvent {
        owner,
        kind,
        position: state.position,
        ndc: state.ndc,
    }
}

/// Ordering anchor for pointer input, runs before the surface sets.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointerSet;

pub struct PointerPlugin;

impl Plugin for PointerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PointerRegistry>()
            .add_message::<PointerEvent>()
            .add_systems(
                Update,
                track_pointer
                    .in_set(PointerSet)
                    .run_if(|registry: Res<PointerRegistry>| registry.is_listening()),
            );
    }
}

fn track_pointer(
    mut registry: ResMut<PointerRegistry>,
    mut moved: MessageReader<CursorMoved>,
    mut left: MessageReader<CursorLeft>,
    mut touches: MessageReader<TouchInput>,
    buttons: Option<Res<ButtonInput<MouseButton>>>,
    windows: Query<(Entity, &Window)>,
    mut writer: MessageWriter<PointerEvent>,
) {
    let mut out = Vec::new();

    for event in moved.read() {
        registry.pointer_moved(event.window, event.position, &mut out);
    }

    if buttons.is_some_and(|b| b.just_pressed(MouseButton::Left)) {
        for (window, w) in windows.iter() {
            if let Some(cursor) = w.cursor_position() {
                registry.clicked(window, cursor, &mut out);
            }
        }
    }

    for event in left.read() {
        registry.pointer_left(event.window, &mut out);
    }

    for touch in touches.read() {
        match touch.phase {
            TouchPhase::Started | TouchPhase::Moved => {
                registry.touch_moved(touch.window, touch.position, &mut out)
            }
            TouchPhase::Ended | TouchPhase::Canceled => registry.touch_ended(touch.window, &mut out),
        }
    }

    writer.write_batch(out);
}
