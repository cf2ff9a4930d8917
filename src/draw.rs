//! Drawing Capability
//!
//! The editor never assumes a graphics backend. It draws through the small
//! [`DrawContext`] trait, in absolute (screen) coordinates, optionally inside
//! a pushed sub-region whose origin becomes the new (0, 0).
//!
//! [`DisplayList`] is a backend that only records the calls, which is what
//! headless sessions and tests draw into.

use crate::geometry::{Point, Rect};
use serde::{Deserialize, Serialize};

/// RGBA color, components in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Build from a `0xRRGGBB` value
    pub fn hex(rgb: u32) -> Self {
        let channel = |shift: u32| ((rgb >> shift) & 0xff) as f32 / 255.0;
        Self::rgb(channel(16), channel(8), channel(0))
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }
}

/// Primitive drawing operations
pub trait DrawContext {
    fn set_color(&mut self, color: Color);
    fn draw_line(&mut self, from: Point, to: Point, width: f32);
    fn draw_rect(&mut self, rect: Rect);
    fn draw_rect_border(&mut self, rect: Rect, width: f32);
    /// Cubic bezier from `p0` to `p3` with control points `p1` and `p2`
    fn draw_bezier(&mut self, p0: Point, p1: Point, p2: Point, p3: Point, width: f32);
    /// Enter a sub-region; coordinates become relative to its origin
    fn push_region(&mut self, region: Rect);
    fn pop_region(&mut self);
}

/// Colors and stroke widths of the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub module_fill: Color,
    pub module_border: Color,
    pub selection_border: Color,
    pub audio_port: Color,
    pub param_port: Color,
    pub slider_track: Color,
    pub slider_fill: Color,
    pub widget: Color,
    pub audio_wire: Color,
    pub data_relative_wire: Color,
    pub data_absolute_wire: Color,
    pub candidate_new: Color,
    pub candidate_remove: Color,
    pub free_line: Color,
    pub bounding_box: Color,
    pub wire_width: f32,
    pub border_width: f32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            module_fill: Color::hex(0x16213e),
            module_border: Color::hex(0x0f3460),
            selection_border: Color::hex(0xe94560),
            audio_port: Color::hex(0xf5a623),
            param_port: Color::hex(0x50e3c2),
            slider_track: Color::hex(0x1a1a2e),
            slider_fill: Color::hex(0x4a90e2),
            widget: Color::hex(0x533483),
            audio_wire: Color::hex(0xf5a623),
            data_relative_wire: Color::hex(0x50e3c2),
            data_absolute_wire: Color::hex(0xb8e986),
            candidate_new: Color::hex(0x7ed321),
            candidate_remove: Color::hex(0xd0021b),
            free_line: Color::hex(0x9b9b9b),
            bounding_box: Color::hex(0xffffff).with_alpha(0.6),
            wire_width: 2.0,
            border_width: 1.0,
        }
    }
}

impl Theme {
    /// Dark wires on light modules
    pub fn light() -> Self {
        Self {
            module_fill: Color::hex(0xf0f0f0),
            module_border: Color::hex(0x333333),
            slider_track: Color::hex(0xdddddd),
            bounding_box: Color::hex(0x333333).with_alpha(0.6),
            ..Default::default()
        }
    }

    pub fn with_wire_width(mut self, width: f32) -> Self {
        self.wire_width = width;
        self
    }
}

/// One recorded drawing call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    SetColor(Color),
    Line { from: Point, to: Point, width: f32 },
    Rect(Rect),
    RectBorder { rect: Rect, width: f32 },
    Bezier { points: [Point; 4], width: f32 },
    PushRegion(Rect),
    PopRegion,
}

/// A [`DrawContext`] that records every call
#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    commands: Vec<DrawCommand>,
    depth: usize,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.depth = 0;
    }

    /// Recorded curves, with the color each was drawn in
    pub fn beziers(&self) -> Vec<(Color, [Point; 4])> {
        let mut color = Color::rgb(0.0, 0.0, 0.0);
        let mut out = Vec::new();
        for command in &self.commands {
            match command {
                DrawCommand::SetColor(c) => color = *c,
                DrawCommand::Bezier { points, .. } => out.push((color, *points)),
                _ => {}
            }
        }
        out
    }

    /// Number of regions pushed and not popped yet
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl DrawContext for DisplayList {
    fn set_color(&mut self, color: Color) {
        self.commands.push(DrawCommand::SetColor(color));
    }

    fn draw_line(&mut self, from: Point, to: Point, width: f32) {
        self.commands.push(DrawCommand::Line { from, to, width });
    }

    fn draw_rect(&mut self, rect: Rect) {
        self.commands.push(DrawCommand::Rect(rect));
    }

    fn draw_rect_border(&mut self, rect: Rect, width: f32) {
        self.commands.push(DrawCommand::RectBorder { rect, width });
    }

    fn draw_bezier(&mut self, p0: Point, p1: Point, p2: Point, p3: Point, width: f32) {
        self.commands.push(DrawCommand::Bezier {
            points: [p0, p1, p2, p3],
            width,
        });
    }

    fn push_region(&mut self, region: Rect) {
        self.depth += 1;
        self.commands.push(DrawCommand::PushRegion(region));
    }

    fn pop_region(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.commands.push(DrawCommand::PopRegion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_color_hex() {
        let c = Color::hex(0xff8000);
        assert_relative_eq!(c.r, 1.0);
        assert_relative_eq!(c.g, 128.0 / 255.0);
        assert_relative_eq!(c.b, 0.0);
        assert_relative_eq!(c.with_alpha(2.0).a, 1.0);
    }

    #[test]
    fn test_display_list_tracks_regions() {
        let mut list = DisplayList::new();
        list.push_region(Rect::default());
        list.set_color(Color::rgb(1.0, 0.0, 0.0));
        list.draw_bezier(Point::ZERO, Point::ZERO, Point::ZERO, Point::new(1.0, 1.0), 2.0);
        assert_eq!(list.depth(), 1);
        list.pop_region();
        assert_eq!(list.depth(), 0);

        let curves = list.beziers();
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].0, Color::rgb(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_light_theme_keeps_wire_colors() {
        let light = Theme::light();
        assert_eq!(light.audio_wire, Theme::default().audio_wire);
        assert_ne!(light.module_fill, Theme::default().module_fill);
    }
}
