//! Interaction State Machine
//!
//! [`CanvasView`] turns raw pointer and keyboard events into graph mutations,
//! selection changes, zoom and pan, and the transient feedback drawn on top of
//! the canvas (candidate wire, free-floating line, selection rectangle,
//! fade-out wire).
//!
//! Two coordinate spaces are involved. Absolute coordinates are viewport
//! pixels and are what the event handlers receive. Plane coordinates are
//! where modules live:
//!
//! ```text
//! plane = (absolute - viewport / 2) / zoom + view_position
//! ```
//!
//! All hit testing happens on the plane; panning and zooming only change
//! `view_position` and the zoom step.
//!
//! A left press never starts a drag by itself. The drag is promoted on a
//! later motion once the pointer left the press point by more than the
//! configured threshold (slider presses promote on any motion), and its
//! [`DragMode`] is decided by what was pressed.

use crate::alert::AlertSurface;
use crate::draw::{DrawContext, Theme};
use crate::error::Failure;
use crate::geometry::{Point, Projection, Rect, Size};
use crate::graph::Canvas;
use crate::gui::{GuiBuilder, GuiId, HitRegion, ModuleGui, WidgetAction};
use crate::host::Host;
use crate::late::Late;
use crate::module::ModuleId;
use crate::port::{DataMode, PortKind, PortRef, WireMode, WireType};
use crate::render::{self, FreeLine, Scene};
use crate::signal::Signal;
use crate::stack::CanvasStack;
use slotmap::SlotMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Most zoomed-out step: 2^(-6/2) = 0.125
pub const MIN_ZOOM_STEP: i32 = -6;
/// Most zoomed-in step: 2^(2/2) = 2.0
pub const MAX_ZOOM_STEP: i32 = 2;

/// Zoom factor of a step, `2^(step / 2)`
pub fn zoom_for_step(step: i32) -> f32 {
    libm::powf(2.0, step as f32 / 2.0)
}

/// Step whose zoom is nearest to `level`, clamped to the allowed range
pub fn quantize_zoom(level: f32) -> i32 {
    if level.is_nan() || level <= 0.0 {
        return MIN_ZOOM_STEP;
    }
    let exact = 2.0 * libm::log2f(level);
    if exact <= MIN_ZOOM_STEP as f32 {
        return MIN_ZOOM_STEP;
    }
    if exact >= MAX_ZOOM_STEP as f32 {
        return MAX_ZOOM_STEP;
    }
    let low = libm::floorf(exact) as i32;
    let high = low + 1;
    if (zoom_for_step(high) - level).abs() < (level - zoom_for_step(low)).abs() {
        high
    } else {
        low
    }
}

/// Largest step whose zoom does not exceed `fit`
fn floor_zoom_step(fit: f32) -> i32 {
    if fit.is_nan() || fit <= 0.0 {
        return MIN_ZOOM_STEP;
    }
    let mut step = libm::floorf(2.0 * libm::log2f(fit)) as i32;
    if zoom_for_step(step + 1) <= fit {
        step += 1;
    }
    if zoom_for_step(step) > fit {
        step -= 1;
    }
    step.clamp(MIN_ZOOM_STEP, MAX_ZOOM_STEP)
}

// =============================================================================
// Input
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Delete,
    Escape,
    Shift,
    Ctrl,
    Alt,
    Char(char),
}

// =============================================================================
// Drag and wire state
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioDrag {
    FromInlet,
    FromOutlet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDrag {
    FromInput,
    FromOutput(DataMode),
}

/// What an active drag does on every motion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragMode {
    Move,
    ConnectAudio(AudioDrag),
    ConnectData(DataDrag),
    Slider,
    /// `start` is the plane point the rectangle was opened at
    BoundingBox { start: Point },
}

/// One end of a drawn wire, by binding handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEnd {
    pub gui: GuiId,
    pub kind: PortKind,
    pub port: String,
}

/// The connection a connect drag would create or remove if released now.
///
/// `from` is always the source side (outlet or parameter output).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotentialWire {
    pub mode: WireMode,
    pub wire_type: WireType,
    pub from: WireEnd,
    pub to: WireEnd,
}

/// Highlight of the last committed wire, fading out
#[derive(Debug, Clone, PartialEq)]
pub struct FadeWire {
    pub from: WireEnd,
    pub to: WireEnd,
    pub wire_type: WireType,
    pub mode: WireMode,
    pub opacity: f32,
    /// Seconds from full opacity to gone
    pub duration: f32,
}

/// Payload of a right click on a module
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleContext {
    pub module: ModuleId,
    pub gui: GuiId,
    /// Absolute pointer position
    pub at: Point,
}

#[derive(Debug, Clone)]
enum PressTarget {
    Port(WireEnd),
    Slider { gui: GuiId, param: String },
    Widget,
    Body,
    Empty,
}

#[derive(Debug, Clone)]
struct Press {
    at: Point,
    target: PressTarget,
}

fn free_wire_type(kind: PortKind) -> WireType {
    match kind {
        PortKind::Inlet | PortKind::Outlet => WireType::Audio,
        PortKind::ParamInput | PortKind::ParamOutputRelative => WireType::DataRelative,
        PortKind::ParamOutputAbsolute => WireType::DataAbsolute,
    }
}

// =============================================================================
// CanvasView
// =============================================================================

/// Interactive editor of the canvas at the top of a [`CanvasStack`]
pub struct CanvasView {
    host: Rc<Host>,
    stack: CanvasStack,
    builder: Box<dyn GuiBuilder>,
    alerts: Rc<dyn AlertSurface>,
    theme: Theme,

    guis: SlotMap<GuiId, ModuleGui>,
    // bottom to top
    z_order: Vec<GuiId>,
    by_module: HashMap<ModuleId, GuiId>,
    // binding -> pointer offset captured when a move starts
    selection: HashMap<GuiId, Point>,

    zoom_step: i32,
    view_position: Point,
    viewport: Size,
    pointer: Point,
    modifiers: Modifiers,

    press: Option<Press>,
    drag: Option<DragMode>,
    pan: Option<Point>,
    candidate: Option<PotentialWire>,
    free_line: Option<FreeLine>,
    bounding_box: Option<Rect>,
    fade: Option<FadeWire>,
    needs_redraw: bool,

    /// Fired with the new path whenever the displayed canvas changes
    pub on_path_changed: Signal<Vec<String>>,
    /// Fired when a module is right-clicked
    pub on_module_context: Signal<ModuleContext>,
}

impl CanvasView {
    /// Show `root` under `name`, binding its modules immediately
    pub fn new(
        host: Rc<Host>,
        root: Rc<RefCell<Canvas>>,
        name: impl Into<String>,
        builder: Box<dyn GuiBuilder>,
        alerts: Rc<dyn AlertSurface>,
        viewport: Size,
    ) -> Self {
        let mut view = Self {
            host,
            stack: CanvasStack::new(root, name),
            builder,
            alerts,
            theme: Theme::default(),
            guis: SlotMap::with_key(),
            z_order: Vec::new(),
            by_module: HashMap::new(),
            selection: HashMap::new(),
            zoom_step: 0,
            view_position: Point::ZERO,
            viewport,
            pointer: viewport.center(),
            modifiers: Modifiers::default(),
            press: None,
            drag: None,
            pan: None,
            candidate: None,
            free_line: None,
            bounding_box: None,
            fade: None,
            needs_redraw: true,
            on_path_changed: Signal::new(),
            on_module_context: Signal::new(),
        };
        view.create_module_guis();
        view
    }

    /// Replace the default dark theme
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// Process-wide context the view edits with
    pub fn host(&self) -> &Rc<Host> {
        &self.host
    }

    /// The canvas currently displayed (top of the stack)
    pub fn current_canvas(&self) -> Rc<RefCell<Canvas>> {
        Rc::clone(self.stack.current())
    }

    // =========================================================================
    // Coordinates, zoom and pan
    // =========================================================================

    /// Current zoom factor
    pub fn zoom(&self) -> f32 {
        zoom_for_step(self.zoom_step)
    }

    /// Current zoom step, see [`zoom_for_step`]
    pub fn zoom_step(&self) -> i32 {
        self.zoom_step
    }

    /// Plane point shown at the viewport center
    pub fn view_position(&self) -> Point {
        self.view_position
    }

    /// Pan so that `position` sits at the viewport center
    pub fn set_view_position(&mut self, position: Point) {
        self.view_position = position;
        self.request_redraw();
    }

    /// Size of the widget in absolute pixels
    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// Resize the widget; the plane point at the center stays put
    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.request_redraw();
    }

    /// Snapshot of the current plane/absolute mapping
    pub fn projection(&self) -> Projection {
        Projection {
            zoom: self.zoom(),
            center: self.view_position,
            viewport: self.viewport,
        }
    }

    /// Absolute pixel position to plane coordinates
    pub fn to_plane(&self, absolute: Point) -> Point {
        self.projection().to_plane(absolute)
    }

    /// Plane coordinates to absolute pixel position
    pub fn to_absolute(&self, plane: Point) -> Point {
        self.projection().to_absolute(plane)
    }

    /// Zoom to the allowed level nearest `level`, keeping the plane point
    /// under `anchor` (absolute) in place
    pub fn set_zoom(&mut self, level: f32, anchor: Point) {
        self.apply_zoom_step(quantize_zoom(level), anchor);
    }

    fn apply_zoom_step(&mut self, step: i32, anchor: Point) {
        let step = step.clamp(MIN_ZOOM_STEP, MAX_ZOOM_STEP);
        if step == self.zoom_step {
            return;
        }
        let before = self.to_plane(anchor);
        self.zoom_step = step;
        let after = self.to_plane(anchor);
        self.view_position += before - after;
        tracing::debug!("zoom: {} at {:?}", self.zoom(), anchor);
        self.request_redraw();
    }

    /// Pan to the middle of all modules, zooming out if they do not fit
    pub fn center_view(&mut self) {
        let bounds = self
            .z_order
            .iter()
            .filter_map(|id| self.guis.get(*id))
            .map(ModuleGui::rect)
            .reduce(|a, b| a.union(&b));

        match bounds {
            None => self.view_position = Point::ZERO,
            Some(bounds) => {
                self.view_position = bounds.center();
                let zoom = self.zoom();
                let too_wide = bounds.size.width * zoom > self.viewport.width;
                let too_tall = bounds.size.height * zoom > self.viewport.height;
                if too_wide || too_tall {
                    let fit = (self.viewport.width / bounds.size.width)
                        .min(self.viewport.height / bounds.size.height);
                    self.zoom_step = floor_zoom_step(fit).min(self.zoom_step);
                }
            }
        }
        self.request_redraw();
    }

    // =========================================================================
    // Bindings
    // =========================================================================

    /// Topmost binding containing a plane point
    pub fn in_which(&self, plane: Point) -> Option<GuiId> {
        self.z_order
            .iter()
            .rev()
            .find(|id| self.guis.get(**id).is_some_and(|g| g.rect().contains(plane)))
            .copied()
    }

    /// Binding by handle
    pub fn gui(&self, id: GuiId) -> Option<&ModuleGui> {
        self.guis.get(id)
    }

    /// Binding of a module of the displayed canvas
    pub fn gui_for_module(&self, module: ModuleId) -> Option<GuiId> {
        self.by_module.get(&module).copied()
    }

    /// Bindings bottom to top
    pub fn guis(&self) -> impl Iterator<Item = (GuiId, &ModuleGui)> {
        self.z_order
            .iter()
            .filter_map(|&id| self.guis.get(id).map(|g| (id, g)))
    }

    /// Number of live bindings
    pub fn gui_count(&self) -> usize {
        self.guis.len()
    }

    /// Reconcile bindings with the modules of the current canvas.
    ///
    /// Bindings of removed modules are dropped; modules without a binding get
    /// one on top. A module whose binding cannot be built is removed from the
    /// canvas and the failure is reported.
    pub fn create_module_guis(&mut self) {
        let canvas = self.current_canvas();

        let stale: Vec<GuiId> = {
            let canvas = canvas.borrow();
            self.z_order
                .iter()
                .copied()
                .filter(|id| self.guis.get(*id).map_or(true, |g| !canvas.contains(g.module())))
                .collect()
        };
        for id in stale {
            self.remove_gui(id);
        }

        let mut failures = Vec::new();
        {
            let canvas = canvas.borrow();
            for (module_id, module) in canvas.modules() {
                if self.by_module.contains_key(&module_id) {
                    continue;
                }
                match self.builder.build_gui(module_id, module) {
                    Ok(mut gui) => {
                        gui.fit_to_requested();
                        gui.set_position(module.position());
                        let id = self.guis.insert(gui);
                        self.z_order.push(id);
                        self.by_module.insert(module_id, id);
                        tracing::debug!("gui_build: {:?} for module {:?}", id, module_id);
                    }
                    Err(err) => failures.push((module_id, err)),
                }
            }
        }

        for (module_id, err) in failures {
            canvas.borrow_mut().remove_module(module_id);
            self.alert(&err.to_string());
        }
        self.request_redraw();
    }

    fn remove_gui(&mut self, id: GuiId) {
        if let Some(gui) = self.guis.remove(id) {
            self.builder.drop_gui(&gui);
            self.z_order.retain(|g| *g != id);
            self.by_module.remove(&gui.module());
            self.selection.remove(&id);
            tracing::debug!("gui_drop: {:?}", id);
        }
    }

    fn rebuild_guis(&mut self) {
        for id in self.z_order.clone() {
            self.remove_gui(id);
        }
        self.create_module_guis();
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Selected bindings in z-order
    pub fn selection(&self) -> Vec<GuiId> {
        self.z_order
            .iter()
            .copied()
            .filter(|id| self.selection.contains_key(id))
            .collect()
    }

    /// Whether a binding is part of the selection
    pub fn is_selected(&self, id: GuiId) -> bool {
        self.selection.contains_key(&id)
    }

    /// Replace the selection; unknown handles are ignored
    pub fn set_selection(&mut self, ids: impl IntoIterator<Item = GuiId>) {
        self.selection = ids
            .into_iter()
            .filter(|id| self.guis.contains_key(*id))
            .map(|id| (id, Point::ZERO))
            .collect();
        self.request_redraw();
    }

    fn select_on_click(&mut self, id: GuiId) {
        if self.modifiers.shift {
            self.selection.insert(id, Point::ZERO);
        } else if !self.selection.contains_key(&id) {
            self.selection.clear();
            self.selection.insert(id, Point::ZERO);
        }
        self.request_redraw();
    }

    /// Remove the selected modules from the canvas
    pub fn delete_selection(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        let canvas = self.current_canvas();
        let selected: Vec<GuiId> = self.selection.drain().map(|(id, _)| id).collect();
        for id in selected {
            if let Some(module) = self.guis.get(id).map(ModuleGui::module) {
                canvas.borrow_mut().remove_module(module);
            }
            self.remove_gui(id);
        }
        self.request_redraw();
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Replace the navigation path with a single root canvas
    pub fn switch_top_level_canvas(&mut self, canvas: Rc<RefCell<Canvas>>, name: impl Into<String>) {
        self.stack.switch_top_level(canvas, name);
        self.canvas_changed();
    }

    /// Push a nested canvas and display it
    pub fn enter_canvas(&mut self, canvas: Rc<RefCell<Canvas>>, name: impl Into<String>) {
        self.stack.push(canvas, name);
        self.canvas_changed();
    }

    /// Go back to the parent canvas; false at the root
    pub fn exit_canvas(&mut self) -> bool {
        if !self.stack.pop() {
            return false;
        }
        self.canvas_changed();
        true
    }

    /// Names from the root canvas down to the displayed one
    pub fn canvas_stack_path(&self) -> Vec<String> {
        self.stack.path()
    }

    fn canvas_changed(&mut self) {
        self.reset_interaction();
        self.rebuild_guis();
        self.center_view();
        self.request_redraw();
        let path = self.stack.path();
        tracing::debug!("canvas_path: {}", path.join(" / "));
        self.on_path_changed.happen(&path);
    }

    fn reset_interaction(&mut self) {
        self.press = None;
        self.drag = None;
        self.pan = None;
        self.candidate = None;
        self.free_line = None;
        self.bounding_box = None;
        self.fade = None;
        self.selection.clear();
    }

    /// Create a fresh root canvas and show it once the engine has made it
    pub fn attach_new_canvas(this: &Rc<RefCell<Self>>, name: impl Into<String>) -> Late<()> {
        let (host, alerts) = {
            let view = this.borrow();
            (Rc::clone(&view.host), Rc::clone(&view.alerts))
        };
        let label = host.config().editor.dismiss_label.clone();
        let weak = Rc::downgrade(this);
        let name = name.into();
        Canvas::create_empty(&host, None)
            .inspect_err(move |failure| alerts.show_error_alert(&failure.to_string(), &label))
            .map(move |canvas| {
                if let Some(view) = weak.upgrade() {
                    view.borrow_mut().switch_top_level_canvas(canvas, name);
                }
            })
    }

    /// Instantiate a template in the current canvas and let the user place it.
    ///
    /// Once created, the module is bound under the pointer, selected, and
    /// follows the pointer until the next left release.
    pub fn add_module(this: &Rc<RefCell<Self>>, template_id: &str) -> Late<ModuleId> {
        let canvas = this.borrow().current_canvas();
        let weak = Rc::downgrade(this);
        let template_id = template_id.to_string();
        let (late, relay) = Late::pending();

        let pending = Canvas::create_module(&canvas, &template_id);
        pending.on_complete(move |created| {
            let Some(view) = weak.upgrade() else {
                return relay.complete(created);
            };
            // continuations of `late` may borrow the view again
            let outcome = {
                let mut view = view.borrow_mut();
                match created {
                    Ok(module) => view
                        .place_new_module(&canvas, module, &template_id)
                        .map(|()| module),
                    Err(failure) => {
                        view.alert(&failure.to_string());
                        Err(failure)
                    }
                }
            };
            relay.complete(outcome);
        });
        late
    }

    fn place_new_module(
        &mut self,
        canvas: &Rc<RefCell<Canvas>>,
        module: ModuleId,
        template_id: &str,
    ) -> Result<(), Failure> {
        // bound when its canvas is shown again
        if !Rc::ptr_eq(canvas, self.stack.current()) {
            return Ok(());
        }
        self.create_module_guis();
        let Some(id) = self.gui_for_module(module) else {
            return Err(Failure::creation(template_id, "its interface could not be built"));
        };

        let pointer = self.to_plane(self.pointer);
        if let Some(gui) = self.guis.get_mut(id) {
            gui.set_position(pointer - gui.size().center());
            canvas.borrow_mut().set_module_position(module, gui.position());
        }
        self.selection.clear();
        self.selection.insert(id, Point::ZERO);

        if self.drag.is_none() {
            self.press = None;
            self.drag = Some(DragMode::Move);
            self.begin_move(pointer);
        }
        self.request_redraw();
        Ok(())
    }

    // =========================================================================
    // Event handlers
    // =========================================================================

    /// Modifier keys as last reported
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Overwrite the modifier state, for shells tracking keys themselves
    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    /// Feed a mouse button transition at an absolute position
    pub fn on_mouse_button(&mut self, button: MouseButton, state: ButtonState, at: Point) {
        self.pointer = at;
        match (button, state) {
            (MouseButton::Left, ButtonState::Pressed) => self.left_press(at),
            (MouseButton::Left, ButtonState::Released) => self.left_release(at),
            (MouseButton::Middle, ButtonState::Pressed) => self.pan = Some(at),
            (MouseButton::Middle, ButtonState::Released) => self.pan = None,
            (MouseButton::Right, ButtonState::Pressed) => self.context_press(at),
            (MouseButton::Right, ButtonState::Released) => {}
        }
    }

    /// Feed a pointer move to an absolute position
    pub fn on_motion(&mut self, at: Point) {
        let previous = self.pointer;
        self.pointer = at;

        if let Some(last) = self.pan {
            let delta = (at - last) / self.zoom();
            self.view_position -= delta;
            self.pan = Some(at);
            self.request_redraw();
            return;
        }

        if self.drag.is_none() {
            self.try_promote(at);
        }
        let Some(mode) = self.drag else {
            return;
        };

        let plane = self.to_plane(at);
        match mode {
            DragMode::Move => self.move_selection(plane),
            DragMode::ConnectAudio(_) | DragMode::ConnectData(_) => self.update_candidate(plane),
            DragMode::Slider => self.drag_slider(at.x - previous.x),
            DragMode::BoundingBox { start } => {
                self.bounding_box = Some(Rect::from_corners(start, plane));
            }
        }
        self.request_redraw();
    }

    /// Zoom one step in (positive delta) or out around the pointer
    pub fn on_wheel(&mut self, delta: f32) {
        if delta > 0.0 {
            self.apply_zoom_step(self.zoom_step + 1, self.pointer);
        } else if delta < 0.0 {
            self.apply_zoom_step(self.zoom_step - 1, self.pointer);
        }
    }

    /// Feed a key transition
    pub fn on_key(&mut self, key: Key, state: ButtonState) {
        let pressed = state == ButtonState::Pressed;
        match key {
            Key::Shift => self.modifiers.shift = pressed,
            Key::Ctrl => self.modifiers.ctrl = pressed,
            Key::Alt => self.modifiers.alt = pressed,
            _ if !pressed => {}
            Key::Delete => self.delete_selection(),
            Key::Escape => {
                self.exit_canvas();
            }
            Key::Char('-') if self.modifiers.ctrl => {
                self.apply_zoom_step(self.zoom_step - 1, self.viewport.center());
            }
            Key::Char('+' | '=') if self.modifiers.ctrl => {
                self.apply_zoom_step(self.zoom_step + 1, self.viewport.center());
            }
            Key::Char('c') if !self.modifiers.ctrl => self.center_view(),
            Key::Char(_) => {}
        }
    }

    fn left_press(&mut self, at: Point) {
        // ends a placement drag on release instead
        if self.drag.is_some() {
            return;
        }
        let plane = self.to_plane(at);
        let hit = self
            .in_which(plane)
            .and_then(|id| self.guis.get(id)?.hit_region(plane).map(|r| (id, r)));

        let target = match hit {
            None => {
                if !self.selection.is_empty() {
                    self.selection.clear();
                    self.request_redraw();
                }
                PressTarget::Empty
            }
            Some((gui, HitRegion::Port(kind, port))) => PressTarget::Port(WireEnd { gui, kind, port }),
            Some((gui, HitRegion::Slider(param))) => PressTarget::Slider { gui, param },
            Some((gui, HitRegion::Widget(action))) => {
                self.press = Some(Press {
                    at,
                    target: PressTarget::Widget,
                });
                self.activate_widget(gui, action);
                return;
            }
            Some((gui, HitRegion::Body)) => {
                self.select_on_click(gui);
                PressTarget::Body
            }
        };
        self.press = Some(Press { at, target });
    }

    fn activate_widget(&mut self, gui: GuiId, action: WidgetAction) {
        let Some(module) = self.guis.get(gui).map(ModuleGui::module) else {
            return;
        };
        match action {
            WidgetAction::EnterCanvas => {
                let target = {
                    let canvas = self.stack.current().borrow();
                    canvas
                        .interior(module)
                        .zip(canvas.module(module).map(|m| m.name().to_string()))
                };
                if let Some((interior, name)) = target {
                    self.enter_canvas(interior, name);
                }
            }
        }
    }

    fn context_press(&mut self, at: Point) {
        let Some(gui) = self.in_which(self.to_plane(at)) else {
            return;
        };
        if let Some(module) = self.guis.get(gui).map(ModuleGui::module) {
            self.on_module_context.happen(&ModuleContext { module, gui, at });
        }
    }

    fn try_promote(&mut self, at: Point) {
        let Some(press) = &self.press else {
            return;
        };
        let moved = at.distance(press.at);
        let threshold = self.host.config().editor.drag_threshold;

        let mode = match &press.target {
            PressTarget::Widget => return,
            PressTarget::Slider { .. } if moved > 0.0 => DragMode::Slider,
            PressTarget::Slider { .. } => return,
            _ if moved <= threshold => return,
            PressTarget::Body => DragMode::Move,
            PressTarget::Empty => DragMode::BoundingBox {
                start: self.to_plane(press.at),
            },
            PressTarget::Port(end) => match end.kind {
                PortKind::Inlet => DragMode::ConnectAudio(AudioDrag::FromInlet),
                PortKind::Outlet => DragMode::ConnectAudio(AudioDrag::FromOutlet),
                PortKind::ParamInput => DragMode::ConnectData(DataDrag::FromInput),
                PortKind::ParamOutputRelative => {
                    DragMode::ConnectData(DataDrag::FromOutput(DataMode::Relative))
                }
                PortKind::ParamOutputAbsolute => {
                    DragMode::ConnectData(DataDrag::FromOutput(DataMode::Absolute))
                }
            },
        };
        let pressed_at = self.to_plane(press.at);

        tracing::debug!("drag_start: {:?}", mode);
        self.drag = Some(mode);
        if mode == DragMode::Move {
            self.begin_move(pressed_at);
        }
    }

    fn begin_move(&mut self, plane: Point) {
        for (id, anchor) in self.selection.iter_mut() {
            if let Some(gui) = self.guis.get(*id) {
                *anchor = plane - gui.position();
            }
        }
    }

    fn move_selection(&mut self, plane: Point) {
        for (id, anchor) in &self.selection {
            if let Some(gui) = self.guis.get_mut(*id) {
                gui.set_position(plane - *anchor);
            }
        }
    }

    fn store_positions(&mut self) {
        let canvas = self.current_canvas();
        let mut canvas = canvas.borrow_mut();
        for id in self.selection.keys() {
            if let Some(gui) = self.guis.get(*id) {
                canvas.set_module_position(gui.module(), gui.position());
            }
        }
    }

    fn port_ref(&self, end: &WireEnd) -> Option<PortRef> {
        self.guis
            .get(end.gui)
            .map(|gui| PortRef::new(gui.module(), end.port.clone()))
    }

    /// Wire a connect drag would commit if released at `plane`
    fn candidate_at(&self, plane: Point) -> Option<PotentialWire> {
        let Some(Press {
            target: PressTarget::Port(origin),
            ..
        }) = &self.press
        else {
            return None;
        };
        let target = self.in_which(plane)?;
        if target == origin.gui {
            return None;
        }
        let Some(HitRegion::Port(kind, port)) = self.guis.get(target)?.hit_region(plane) else {
            return None;
        };
        let hovered = WireEnd {
            gui: target,
            kind,
            port,
        };

        let (from, to, wire_type) = match (origin.kind, hovered.kind) {
            (PortKind::Inlet, PortKind::Outlet) => (hovered, origin.clone(), WireType::Audio),
            (PortKind::Outlet, PortKind::Inlet) => (origin.clone(), hovered, WireType::Audio),
            (PortKind::ParamInput, output @ (PortKind::ParamOutputRelative | PortKind::ParamOutputAbsolute)) => {
                let mode = output.data_mode()?;
                (hovered, origin.clone(), WireType::data(mode))
            }
            (output @ (PortKind::ParamOutputRelative | PortKind::ParamOutputAbsolute), PortKind::ParamInput) => {
                let mode = output.data_mode()?;
                (origin.clone(), hovered, WireType::data(mode))
            }
            _ => return None,
        };

        let (source, destination) = (self.port_ref(&from)?, self.port_ref(&to)?);
        let canvas = self.stack.current().borrow();
        if wire_type.is_audio() {
            let exists = canvas.audio_connection_exists(&source, &destination);
            return Some(PotentialWire {
                mode: if exists { WireMode::Remove } else { WireMode::New },
                wire_type,
                from,
                to,
            });
        }

        // a parameter pair holds one edge whatever the mode; offer to remove
        // the existing one, drawn from the output it actually leaves
        Some(match canvas.data_connection_exists(&source, &destination) {
            Some(existing) => PotentialWire {
                mode: WireMode::Remove,
                wire_type: WireType::data(existing),
                from: WireEnd {
                    kind: PortKind::param_output(existing),
                    ..from
                },
                to,
            },
            None => PotentialWire {
                mode: WireMode::New,
                wire_type,
                from,
                to,
            },
        })
    }

    fn update_candidate(&mut self, plane: Point) {
        self.candidate = self.candidate_at(plane);
        self.free_line = match (&self.candidate, &self.press) {
            (
                None,
                Some(Press {
                    target: PressTarget::Port(origin),
                    ..
                }),
            ) => self
                .guis
                .get(origin.gui)
                .and_then(|gui| gui.port_center(origin.kind, &origin.port))
                .map(|from| FreeLine {
                    from,
                    to: plane,
                    wire_type: free_wire_type(origin.kind),
                }),
            _ => None,
        };
    }

    fn drag_slider(&mut self, dx: f32) {
        let Some(Press {
            target: PressTarget::Slider { gui, param },
            ..
        }) = &self.press
        else {
            return;
        };
        let Some(binding) = self.guis.get(*gui) else {
            return;
        };
        let divisor = if self.modifiers.shift {
            self.host.config().editor.fine_slider_divisor
        } else {
            1.0
        };
        let delta = binding.slider_delta(param, dx / self.zoom(), divisor);
        let module = binding.module();

        let canvas = self.current_canvas();
        let mut canvas = canvas.borrow_mut();
        let current = canvas
            .module(module)
            .and_then(|m| m.param(param))
            .map(|p| p.get_relative());
        if let Some(current) = current {
            if let Err(err) = canvas.set_param_relative(module, param, (current + delta).clamp(0.0, 1.0)) {
                tracing::warn!("slider: {err}");
            }
        }
    }

    fn left_release(&mut self, at: Point) {
        let plane = self.to_plane(at);
        let committed = match self.drag {
            Some(DragMode::ConnectAudio(_) | DragMode::ConnectData(_)) => self.candidate_at(plane),
            _ => None,
        };
        self.press = None;

        match self.drag.take() {
            Some(DragMode::Move) => self.store_positions(),
            Some(DragMode::BoundingBox { start }) => {
                let area = Rect::from_corners(start, plane);
                let inside: Vec<GuiId> = self
                    .guis
                    .iter()
                    .filter(|(_, gui)| area.contains_rect(&gui.rect()))
                    .map(|(id, _)| id)
                    .collect();
                for id in inside {
                    self.selection.insert(id, Point::ZERO);
                }
            }
            Some(DragMode::ConnectAudio(_) | DragMode::ConnectData(_)) => {
                if let Some(wire) = committed {
                    self.commit_wire(wire);
                }
            }
            Some(DragMode::Slider) | None => {}
        }

        self.candidate = None;
        self.free_line = None;
        self.bounding_box = None;
        self.request_redraw();
    }

    fn commit_wire(&mut self, wire: PotentialWire) {
        let (Some(from), Some(to)) = (self.port_ref(&wire.from), self.port_ref(&wire.to)) else {
            return;
        };
        let canvas = self.current_canvas();
        let result = {
            let mut canvas = canvas.borrow_mut();
            match (wire.mode, wire.wire_type.data_mode()) {
                (WireMode::Remove, None) => {
                    canvas.disconnect(&from, &to);
                    Ok(())
                }
                (WireMode::Remove, Some(_)) => {
                    canvas.disconnect_data(&from, &to);
                    Ok(())
                }
                (_, None) => canvas.connect(from, to),
                (_, Some(mode)) => canvas.connect_data(from, to, mode),
            }
        };
        match result {
            Ok(()) => self.start_fade(wire),
            Err(err) => self.alert(&err.to_string()),
        }
    }

    fn start_fade(&mut self, wire: PotentialWire) {
        let editor = &self.host.config().editor;
        let duration = match wire.mode {
            WireMode::Remove => editor.fade_removed_secs,
            WireMode::New | WireMode::None => editor.fade_new_secs,
        };
        self.fade = Some(FadeWire {
            from: wire.from,
            to: wire.to,
            wire_type: wire.wire_type,
            mode: wire.mode,
            opacity: 1.0,
            duration,
        });
    }

    fn alert(&self, message: &str) {
        self.alerts
            .show_error_alert(message, &self.host.config().editor.dismiss_label);
    }

    // =========================================================================
    // Frames and drawing
    // =========================================================================

    /// Whether [`on_frame`](Self::on_frame) has anything to animate
    pub fn wants_frame_ticks(&self) -> bool {
        self.fade.is_some()
    }

    /// Advance animations by `dt` seconds
    pub fn on_frame(&mut self, dt: f32) {
        let Some(fade) = &mut self.fade else {
            return;
        };
        fade.opacity -= if fade.duration > 0.0 {
            dt / fade.duration
        } else {
            1.0
        };
        if fade.opacity <= 0.0 {
            self.fade = None;
        }
        self.request_redraw();
    }

    /// Ask the shell for a new frame
    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    /// Consume the pending redraw request
    pub fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    /// The active drag, if a press has been promoted
    pub fn drag_mode(&self) -> Option<DragMode> {
        self.drag
    }

    /// Whether a drag is in progress
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Wire a connect drag would commit if released now
    pub fn candidate(&self) -> Option<&PotentialWire> {
        self.candidate.as_ref()
    }

    /// Mode of the candidate wire, `None` without one
    pub fn candidate_mode(&self) -> WireMode {
        self.candidate.as_ref().map_or(WireMode::None, |c| c.mode)
    }

    /// Wire end following the pointer while no port is hovered
    pub fn free_line(&self) -> Option<FreeLine> {
        self.free_line
    }

    /// Plane rectangle of an active bounding-box drag
    pub fn bounding_box(&self) -> Option<Rect> {
        self.bounding_box
    }

    /// Highlight of the last committed wire, while it fades
    pub fn fade_wire(&self) -> Option<&FadeWire> {
        self.fade.as_ref()
    }

    /// Draw the current canvas with everything the interaction shows on top
    pub fn draw(&self, ctx: &mut dyn DrawContext) {
        let canvas = self.stack.current().borrow();
        let scene = Scene {
            canvas: &canvas,
            guis: &self.guis,
            z_order: &self.z_order,
            by_module: &self.by_module,
            selection: &self.selection,
            candidate: self.candidate.as_ref(),
            free_line: self.free_line,
            bounding_box: self.bounding_box,
            fade: self.fade.as_ref(),
            projection: self.projection(),
        };
        render::draw_scene(ctx, &scene, &self.theme);
    }
}

impl std::fmt::Debug for CanvasView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasView")
            .field("stack", &self.stack)
            .field("guis", &self.guis.len())
            .field("selection", &self.selection.len())
            .field("zoom", &self.zoom())
            .field("view_position", &self.view_position)
            .field("drag", &self.drag)
            .finish_non_exhaustive()
    }
}
