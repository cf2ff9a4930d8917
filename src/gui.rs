//! Module Presentation Binding
//!
//! A [`ModuleGui`] is the interactive face of one module on the canvas plane:
//! where it sits, how big it is and where each of its connectors, sliders and
//! buttons can be grabbed. Regions are stored relative to the binding's
//! top-left corner, so moving a binding only changes its position.
//!
//! Bindings are produced by a [`GuiBuilder`]. [`StandardGuiBuilder`] lays a
//! module out as a column: inlets along the top edge, one row per parameter,
//! an "enter" button for container modules and outlets along the bottom edge.

use crate::error::GuiBuildError;
use crate::geometry::{Point, Rect, Size};
use crate::module::{Module, ModuleId};
use crate::port::PortKind;

slotmap::new_key_type! {
    /// Identifier of a presentation binding owned by a view
    pub struct GuiId;
}

/// Side of a square connector
pub const PORT_SIZE: f32 = 10.0;
/// Height of the title band
pub const TITLE_HEIGHT: f32 = 20.0;
/// Height of one parameter row
pub const ROW_HEIGHT: f32 = 18.0;
/// Height of a button row
pub const BUTTON_HEIGHT: f32 = 16.0;
/// Minimum width of a module
pub const MIN_WIDTH: f32 = 120.0;
/// Horizontal distance between neighbouring audio connectors
pub const PORT_SPACING: f32 = 24.0;

/// What a child widget does when clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetAction {
    /// Open the interior canvas of a container module
    EnterCanvas,
}

/// Grabbable part of a binding under a point
#[derive(Debug, Clone, PartialEq)]
pub enum HitRegion {
    /// A connector; the name is the inlet/outlet or parameter id
    Port(PortKind, String),
    /// The value slider of a parameter
    Slider(String),
    Widget(WidgetAction),
    Body,
}

/// Regions of one parameter row
#[derive(Debug, Clone, PartialEq)]
pub struct ParamRow {
    pub param: String,
    pub label: String,
    pub input: Rect,
    pub slider: Rect,
    pub output_relative: Rect,
    pub output_absolute: Rect,
}

/// Visual and interactive state of one module
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleGui {
    module: ModuleId,
    title: String,
    position: Point,
    requested_size: Size,
    size: Size,
    inlets: Vec<(String, Rect)>,
    outlets: Vec<(String, Rect)>,
    params: Vec<ParamRow>,
    widgets: Vec<(WidgetAction, Rect)>,
}

impl ModuleGui {
    /// An empty binding for `module`; it has no size until it is fitted
    pub fn new(module: ModuleId, title: impl Into<String>, requested_size: Size) -> Self {
        Self {
            module,
            title: title.into(),
            position: Point::ZERO,
            requested_size,
            size: Size::default(),
            inlets: Vec::new(),
            outlets: Vec::new(),
            params: Vec::new(),
            widgets: Vec::new(),
        }
    }

    pub fn with_inlet(mut self, name: impl Into<String>, region: Rect) -> Self {
        self.inlets.push((name.into(), region));
        self
    }

    pub fn with_outlet(mut self, name: impl Into<String>, region: Rect) -> Self {
        self.outlets.push((name.into(), region));
        self
    }

    pub fn with_param_row(mut self, row: ParamRow) -> Self {
        self.params.push(row);
        self
    }

    pub fn with_widget(mut self, action: WidgetAction, region: Rect) -> Self {
        self.widgets.push((action, region));
        self
    }

    /// Module this binding presents
    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Top-left corner on the plane
    pub fn position(&self) -> Point {
        self.position
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    /// Size the layout asked for
    pub fn requested_size(&self) -> Size {
        self.requested_size
    }

    /// Size currently used for drawing and hit testing
    pub fn size(&self) -> Size {
        self.size
    }

    /// Adopt the size the builder asked for
    pub fn fit_to_requested(&mut self) {
        self.size = self.requested_size;
    }

    /// Bounds on the canvas plane
    pub fn rect(&self) -> Rect {
        Rect::new(self.position, self.size)
    }

    pub fn inlets(&self) -> &[(String, Rect)] {
        &self.inlets
    }

    pub fn outlets(&self) -> &[(String, Rect)] {
        &self.outlets
    }

    pub fn param_rows(&self) -> &[ParamRow] {
        &self.params
    }

    pub fn widgets(&self) -> &[(WidgetAction, Rect)] {
        &self.widgets
    }

    /// Classify a plane point, most specific region first.
    ///
    /// Precedence: inlet, outlet, slider body, parameter input, relative
    /// output, absolute output, widget, body.
    pub fn hit_region(&self, point: Point) -> Option<HitRegion> {
        if !self.rect().contains(point) {
            return None;
        }
        let local = point - self.position;

        if let Some((name, _)) = self.inlets.iter().find(|(_, r)| r.contains(local)) {
            return Some(HitRegion::Port(PortKind::Inlet, name.clone()));
        }
        if let Some((name, _)) = self.outlets.iter().find(|(_, r)| r.contains(local)) {
            return Some(HitRegion::Port(PortKind::Outlet, name.clone()));
        }
        if let Some(row) = self.params.iter().find(|row| row.slider.contains(local)) {
            return Some(HitRegion::Slider(row.param.clone()));
        }
        if let Some(row) = self.params.iter().find(|row| row.input.contains(local)) {
            return Some(HitRegion::Port(PortKind::ParamInput, row.param.clone()));
        }
        if let Some(row) = self.params.iter().find(|row| row.output_relative.contains(local)) {
            return Some(HitRegion::Port(PortKind::ParamOutputRelative, row.param.clone()));
        }
        if let Some(row) = self.params.iter().find(|row| row.output_absolute.contains(local)) {
            return Some(HitRegion::Port(PortKind::ParamOutputAbsolute, row.param.clone()));
        }
        if let Some((action, _)) = self.widgets.iter().find(|(_, r)| r.contains(local)) {
            return Some(HitRegion::Widget(*action));
        }
        Some(HitRegion::Body)
    }

    /// Region of a connector, relative to the binding
    pub fn port_region(&self, kind: PortKind, name: &str) -> Option<Rect> {
        let find_io = |ports: &[(String, Rect)]| {
            ports.iter().find(|(n, _)| n == name).map(|(_, r)| *r)
        };
        match kind {
            PortKind::Inlet => find_io(&self.inlets),
            PortKind::Outlet => find_io(&self.outlets),
            PortKind::ParamInput => self.row(name).map(|row| row.input),
            PortKind::ParamOutputRelative => self.row(name).map(|row| row.output_relative),
            PortKind::ParamOutputAbsolute => self.row(name).map(|row| row.output_absolute),
        }
    }

    /// Plane position wires attach to
    pub fn port_center(&self, kind: PortKind, name: &str) -> Option<Point> {
        self.port_region(kind, name)
            .map(|region| self.position + region.center())
    }

    /// Layout row of a parameter
    pub fn row(&self, param: &str) -> Option<&ParamRow> {
        self.params.iter().find(|row| row.param == param)
    }

    /// Range fraction a horizontal slider drag of `dx` plane units stands for
    pub fn slider_delta(&self, param: &str, dx: f32, divisor: f32) -> f32 {
        match self.row(param) {
            Some(row) if row.slider.size.width > 0.0 => dx / row.slider.size.width / divisor.max(1.0),
            _ => 0.0,
        }
    }
}

/// Produces presentation bindings for modules
pub trait GuiBuilder {
    fn build_gui(&self, id: ModuleId, module: &Module) -> Result<ModuleGui, GuiBuildError>;

    /// Called when a binding is discarded
    fn drop_gui(&self, _gui: &ModuleGui) {}
}

/// Column layout shared by every built-in module
#[derive(Debug, Clone, Default)]
pub struct StandardGuiBuilder;

impl StandardGuiBuilder {
    pub const KIND: &'static str = "standard";

    pub fn new() -> Self {
        Self
    }
}

impl GuiBuilder for StandardGuiBuilder {
    fn build_gui(&self, id: ModuleId, module: &Module) -> Result<ModuleGui, GuiBuildError> {
        let template = module.template();
        if let Some(kind) = template.gui.as_deref().filter(|k| *k != Self::KIND) {
            return Err(GuiBuildError {
                template: template.full_id(),
                reason: format!("unknown interface kind '{kind}'"),
            });
        }

        let columns = template.inlets.len().max(template.outlets.len()) as f32;
        let width = MIN_WIDTH.max(PORT_SPACING * (columns + 1.0));
        let rows_top = PORT_SIZE + TITLE_HEIGHT;
        let rows_bottom = rows_top + ROW_HEIGHT * template.params.len() as f32;
        let buttons_bottom = if template.subpatch {
            rows_bottom + BUTTON_HEIGHT + 4.0
        } else {
            rows_bottom
        };
        let height = buttons_bottom + PORT_SIZE + 4.0;

        let port = |x: f32, y: f32| Rect::new(Point::new(x, y), Size::new(PORT_SIZE, PORT_SIZE));
        let column_x = |i: usize| PORT_SPACING * (i + 1) as f32 - PORT_SIZE / 2.0;

        let mut gui = ModuleGui::new(id, module.name(), Size::new(width, height));
        for (i, inlet) in template.inlets.iter().enumerate() {
            gui = gui.with_inlet(inlet.clone(), port(column_x(i), 0.0));
        }
        for (i, outlet) in template.outlets.iter().enumerate() {
            gui = gui.with_outlet(outlet.clone(), port(column_x(i), height - PORT_SIZE));
        }

        let slider_x = PORT_SIZE + 4.0;
        let slider_width = width - 3.0 * PORT_SIZE - 12.0;
        for (i, param) in template.params.iter().enumerate() {
            let y = rows_top + ROW_HEIGHT * i as f32;
            let port_y = y + (ROW_HEIGHT - PORT_SIZE) / 2.0;
            gui = gui.with_param_row(ParamRow {
                param: param.id.clone(),
                label: param.display_name().to_string(),
                input: port(0.0, port_y),
                slider: Rect::new(
                    Point::new(slider_x, y + 2.0),
                    Size::new(slider_width, ROW_HEIGHT - 4.0),
                ),
                output_relative: port(width - 2.0 * PORT_SIZE - 2.0, port_y),
                output_absolute: port(width - PORT_SIZE, port_y),
            });
        }

        if template.subpatch {
            gui = gui.with_widget(
                WidgetAction::EnterCanvas,
                Rect::new(
                    Point::new(4.0, rows_bottom + 2.0),
                    Size::new(width - 8.0, BUTTON_HEIGHT),
                ),
            );
        }
        Ok(gui)
    }
}
