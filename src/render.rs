//! Rendering Adapter
//!
//! Turns the state of a view into [`DrawContext`] calls: committed wires
//! first, then module bindings bottom to top, then the transient overlays
//! (fade-out wire, candidate wire, free-floating line, selection rectangle).
//!
//! Wires are cubic beziers. Audio wires leave outlets downwards and enter
//! inlets from above, so their control points are pushed vertically; data
//! wires run between side connectors and are pushed horizontally.

use crate::draw::{Color, DrawContext, Theme};
use crate::geometry::{Point, Projection, Rect};
use crate::graph::Canvas;
use crate::gui::{GuiId, ModuleGui};
use crate::module::ModuleId;
use crate::port::{PortKind, WireMode, WireType};
use crate::view::{FadeWire, PotentialWire, WireEnd};
use slotmap::SlotMap;
use std::collections::HashMap;

/// Largest distance of a control point from its endpoint, in pixels
pub const MAX_CURVE_OFFSET: f32 = 150.0;

/// Control-point offset of an audio wire; vertical distance dominates
pub fn audio_curve_strength(from: Point, to: Point) -> f32 {
    let d = to - from;
    (0.6 * d.y.abs() + 0.2 * d.x.abs()).min(MAX_CURVE_OFFSET)
}

/// Control-point offset of a data wire; horizontal distance dominates
pub fn data_curve_strength(from: Point, to: Point) -> f32 {
    let d = to - from;
    (0.6 * d.x.abs() + 0.2 * d.y.abs()).min(MAX_CURVE_OFFSET)
}

/// Bezier points of a wire between two absolute positions
pub fn wire_curve(wire_type: WireType, from: Point, to: Point) -> [Point; 4] {
    if wire_type.is_audio() {
        let s = audio_curve_strength(from, to);
        [from, from + Point::new(0.0, s), to - Point::new(0.0, s), to]
    } else {
        let s = data_curve_strength(from, to);
        [from, from + Point::new(s, 0.0), to - Point::new(s, 0.0), to]
    }
}

/// A wire end following the pointer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreeLine {
    pub from: Point,
    pub to: Point,
    pub wire_type: WireType,
}

/// Everything a frame shows, borrowed from the view
pub struct Scene<'a> {
    pub canvas: &'a Canvas,
    pub guis: &'a SlotMap<GuiId, ModuleGui>,
    pub z_order: &'a [GuiId],
    pub by_module: &'a HashMap<ModuleId, GuiId>,
    pub selection: &'a HashMap<GuiId, Point>,
    pub candidate: Option<&'a PotentialWire>,
    pub free_line: Option<FreeLine>,
    pub bounding_box: Option<Rect>,
    pub fade: Option<&'a FadeWire>,
    pub projection: Projection,
}

impl Scene<'_> {
    fn end_point(&self, end: &WireEnd) -> Option<Point> {
        self.guis.get(end.gui)?.port_center(end.kind, &end.port)
    }

    fn module_port(&self, module: ModuleId, kind: PortKind, port: &str) -> Option<Point> {
        let gui = self.by_module.get(&module)?;
        self.guis.get(*gui)?.port_center(kind, port)
    }
}

fn wire_color(theme: &Theme, wire_type: WireType) -> Color {
    match wire_type {
        WireType::Audio => theme.audio_wire,
        WireType::DataRelative => theme.data_relative_wire,
        WireType::DataAbsolute => theme.data_absolute_wire,
    }
}

fn mode_color(theme: &Theme, mode: WireMode) -> Option<Color> {
    match mode {
        WireMode::New => Some(theme.candidate_new),
        WireMode::Remove => Some(theme.candidate_remove),
        WireMode::None => None,
    }
}

fn draw_wire(
    ctx: &mut dyn DrawContext,
    projection: &Projection,
    wire_type: WireType,
    from: Point,
    to: Point,
    width: f32,
) {
    let [p0, p1, p2, p3] = wire_curve(
        wire_type,
        projection.to_absolute(from),
        projection.to_absolute(to),
    );
    ctx.draw_bezier(p0, p1, p2, p3, width);
}

/// Draw one frame
pub fn draw_scene(ctx: &mut dyn DrawContext, scene: &Scene<'_>, theme: &Theme) {
    draw_connections(ctx, scene, theme);

    for id in scene.z_order {
        if let Some(gui) = scene.guis.get(*id) {
            draw_module(ctx, scene, theme, gui, scene.selection.contains_key(id));
        }
    }

    if let Some(fade) = scene.fade {
        draw_fade(ctx, scene, theme, fade);
    }

    if let Some(candidate) = scene.candidate {
        let ends = scene.end_point(&candidate.from).zip(scene.end_point(&candidate.to));
        if let (Some((from, to)), Some(color)) = (ends, mode_color(theme, candidate.mode)) {
            ctx.set_color(color);
            draw_wire(ctx, &scene.projection, candidate.wire_type, from, to, theme.wire_width);
        }
    }

    if let Some(line) = scene.free_line {
        ctx.set_color(theme.free_line);
        draw_wire(ctx, &scene.projection, line.wire_type, line.from, line.to, theme.wire_width);
    }

    if let Some(rect) = scene.bounding_box {
        ctx.set_color(theme.bounding_box);
        ctx.draw_rect_border(scene.projection.rect_to_absolute(rect), theme.border_width);
    }
}

fn draw_connections(ctx: &mut dyn DrawContext, scene: &Scene<'_>, theme: &Theme) {
    ctx.set_color(theme.audio_wire);
    for (from, to) in scene.canvas.audio_connections() {
        let ends = scene
            .module_port(from.module, PortKind::Outlet, &from.port)
            .zip(scene.module_port(to.module, PortKind::Inlet, &to.port));
        if let Some((a, b)) = ends {
            draw_wire(ctx, &scene.projection, WireType::Audio, a, b, theme.wire_width);
        }
    }

    for (from, to, mode) in scene.canvas.data_connections() {
        let ends = scene
            .module_port(from.module, PortKind::param_output(mode), &from.port)
            .zip(scene.module_port(to.module, PortKind::ParamInput, &to.port));
        if let Some((a, b)) = ends {
            let wire_type = WireType::data(mode);
            ctx.set_color(wire_color(theme, wire_type));
            draw_wire(ctx, &scene.projection, wire_type, a, b, theme.wire_width);
        }
    }
}

fn draw_module(
    ctx: &mut dyn DrawContext,
    scene: &Scene<'_>,
    theme: &Theme,
    gui: &ModuleGui,
    selected: bool,
) {
    let zoom = scene.projection.zoom;
    let bounds = scene.projection.rect_to_absolute(gui.rect());
    ctx.push_region(bounds);

    let local = Rect::new(Point::ZERO, bounds.size);
    ctx.set_color(theme.module_fill);
    ctx.draw_rect(local);
    ctx.set_color(if selected {
        theme.selection_border
    } else {
        theme.module_border
    });
    ctx.draw_rect_border(local, theme.border_width);

    ctx.set_color(theme.audio_port);
    for (_, region) in gui.inlets().iter().chain(gui.outlets()) {
        ctx.draw_rect(region.scale(zoom));
    }

    let module = scene.canvas.module(gui.module());
    for row in gui.param_rows() {
        ctx.set_color(theme.param_port);
        ctx.draw_rect(row.input.scale(zoom));
        ctx.draw_rect(row.output_relative.scale(zoom));
        ctx.draw_rect(row.output_absolute.scale(zoom));

        let slider = row.slider.scale(zoom);
        ctx.set_color(theme.slider_track);
        ctx.draw_rect(slider);
        let fraction = module
            .and_then(|m| m.param(&row.param))
            .map_or(0.0, |p| p.get_relative().clamp(0.0, 1.0));
        let mut fill = slider;
        fill.size.width *= fraction;
        ctx.set_color(theme.slider_fill);
        ctx.draw_rect(fill);
    }

    ctx.set_color(theme.widget);
    for (_, region) in gui.widgets() {
        ctx.draw_rect(region.scale(zoom));
    }

    ctx.pop_region();
}

fn draw_fade(ctx: &mut dyn DrawContext, scene: &Scene<'_>, theme: &Theme, fade: &FadeWire) {
    // either binding may be gone by now
    let Some((from, to)) = scene.end_point(&fade.from).zip(scene.end_point(&fade.to)) else {
        return;
    };
    let Some(color) = mode_color(theme, fade.mode) else {
        return;
    };
    ctx.set_color(color.with_alpha(fade.opacity));
    draw_wire(ctx, &scene.projection, fade.wire_type, from, to, theme.wire_width);
}
