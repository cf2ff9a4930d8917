//! # Patchcanvas: Interactive Patching Canvas
//!
//! `patchcanvas` is the editing core of a visual node-graph editor for audio
//! synthesis. Module instances live on an infinite 2D plane, their audio and
//! control ports are wired together, and any container module carries an
//! interior canvas that can be entered like a folder.
//!
//! ## Architecture
//!
//! The library is organized in three layers:
//!
//! - **Layer 1: Deferred values** - [`Late`](late::Late) results completed on a
//!   cooperative [`EventLoop`](event_loop::EventLoop), used for every round trip
//!   to the synthesis engine
//! - **Layer 2: Patch graph** - [`Canvas`](graph::Canvas) owns modules, audio
//!   wires and data wires and refuses any mutation that breaks its invariants
//! - **Layer 3: Interaction** - [`CanvasView`](view::CanvasView) turns pointer
//!   and keyboard input into graph edits, selection, zoom and pan, and renders
//!   through a backend-agnostic [`DrawContext`](draw::DrawContext)
//!
//! Everything runs on one thread. The embedding shell forwards input to the
//! view, drains the event loop and asks the view to draw when
//! [`take_redraw_request`](view::CanvasView::take_redraw_request) says so.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use patchcanvas::prelude::*;
//! use std::rc::Rc;
//!
//! let events = EventLoop::new();
//! let engine = Rc::new(LocalEngine::new(events.clone()));
//! let mut registry = TemplateRegistry::new();
//! registry.install_file("modules/core.json").unwrap();
//! let host = Host::new(Config::default(), registry, engine, events.clone());
//!
//! // The root canvas needs an engine group first
//! let slot = Rc::new(std::cell::RefCell::new(None));
//! let sink = Rc::clone(&slot);
//! Canvas::create_empty(&host, None).on_complete(move |c| *sink.borrow_mut() = c.ok());
//! events.run_until_idle();
//! let root = slot.borrow_mut().take().unwrap();
//!
//! let view = Rc::new(std::cell::RefCell::new(CanvasView::new(
//!     Rc::clone(&host),
//!     root,
//!     "main",
//!     Box::new(StandardGuiBuilder::new()),
//!     Rc::new(AlertLog::new()),
//!     Size::new(1280.0, 800.0),
//! )));
//!
//! CanvasView::add_module(&view, "core/sine").detach();
//! events.run_until_idle();
//!
//! let mut frame = DisplayList::new();
//! view.borrow().draw(&mut frame);
//! ```

pub mod alert;
pub mod collection;
pub mod config;
pub mod draw;
pub mod engine;
pub mod error;
pub mod event_loop;
pub mod geometry;
pub mod graph;
pub mod gui;
pub mod host;
pub mod late;
pub mod module;
pub mod param;
pub mod port;
pub mod render;
pub mod signal;
pub mod stack;
pub mod template;
pub mod view;

#[cfg(test)]
mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    // Layer 1: Deferred values
    pub use crate::error::{Failure, FailureKind};
    pub use crate::event_loop::EventLoop;
    pub use crate::late::{join_all, Late, Relay};

    // Layer 2: Patch graph
    pub use crate::error::GraphError;
    pub use crate::graph::Canvas;
    pub use crate::module::{Module, ModuleId};
    pub use crate::param::ParamController;
    pub use crate::port::{DataMode, PortKind, PortRef, WireMode, WireType};
    pub use crate::stack::CanvasStack;

    // Templates and the engine
    pub use crate::collection::{ModuleCollection, TemplateRegistry};
    pub use crate::config::{Config, EditorConfig};
    pub use crate::engine::{GroupId, InstanceId, LocalEngine, SynthEngine};
    pub use crate::host::Host;
    pub use crate::template::{ModuleTemplate, ParamTemplate};

    // Layer 3: Interaction
    pub use crate::alert::{AlertLog, AlertSurface};
    pub use crate::draw::{Color, DisplayList, DrawContext, Theme};
    pub use crate::geometry::{Point, Rect, Size};
    pub use crate::gui::{GuiBuilder, GuiId, ModuleGui, StandardGuiBuilder};
    pub use crate::signal::Signal;
    pub use crate::view::{ButtonState, CanvasView, DragMode, Key, Modifiers, MouseButton};
}

// Re-export key types at crate root for convenience
pub use prelude::*;
