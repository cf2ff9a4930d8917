//! Headless Session Example
//!
//! Drives a canvas view the way a windowing shell would, without a window:
//! pointer events go in, the event loop is drained, and each frame lands in
//! a display list that we summarize on stdout.
//!
//! Run with: cargo run --example headless_session [config.json]
//!
//! `RUST_LOG` overrides the log filter chosen by the config's `debug` flag.

use patchcanvas::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

fn settle<T: 'static>(events: &EventLoop, late: Late<T>) -> Result<T, Failure> {
    let slot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    late.on_complete(move |r| *sink.borrow_mut() = Some(r));
    events.run_until_idle();
    let result = slot.borrow_mut().take();
    result.unwrap_or(Err(Failure::Abandoned))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // optional config file as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let events = EventLoop::new();
    let engine = Rc::new(LocalEngine::new(events.clone()).requiring_install());
    let mut registry = TemplateRegistry::new();
    registry.install_file(concat!(env!("CARGO_MANIFEST_DIR"), "/modules/core.json"))?;
    println!("{}", registry.list_installed_templates());

    let host = Host::new(config, registry, engine.clone(), events.clone());
    settle(&events, host.install_templates())?;

    let root = settle(&events, Canvas::create_empty(&host, None))?;
    let alerts = Rc::new(AlertLog::new());
    let view = Rc::new(RefCell::new(CanvasView::new(
        Rc::clone(&host),
        root,
        "main",
        Box::new(StandardGuiBuilder::new()),
        alerts.clone(),
        Size::new(1280.0, 800.0),
    )));

    view.borrow_mut()
        .on_path_changed
        .subscribe(|path| println!("now editing {}", path.join(" / ")));

    // Place three modules; each placement follows the pointer until release
    let mut placed = Vec::new();
    for (template, at) in [
        ("core/sine", Point::new(300.0, 150.0)),
        ("core/filter", Point::new(640.0, 400.0)),
        ("core/out", Point::new(960.0, 650.0)),
    ] {
        view.borrow_mut().on_motion(at);
        let module = settle(&events, CanvasView::add_module(&view, template))?;
        view.borrow_mut()
            .on_mouse_button(MouseButton::Left, ButtonState::Released, at);
        placed.push(module);
    }

    // Wire the chain by dragging from each outlet onto the next inlet
    let ports = {
        let v = view.borrow();
        let port = |module: ModuleId, kind: PortKind, name: &str| {
            v.gui_for_module(module)
                .and_then(|id| v.gui(id))
                .and_then(|gui| gui.port_center(kind, name))
                .map(|p| v.to_absolute(p))
        };
        vec![
            (port(placed[0], PortKind::Outlet, "out"), port(placed[1], PortKind::Inlet, "in")),
            (port(placed[1], PortKind::Outlet, "out"), port(placed[2], PortKind::Inlet, "in")),
            // closes nothing, but the output already has a source
            (port(placed[0], PortKind::Outlet, "out"), port(placed[2], PortKind::Inlet, "in")),
        ]
    };
    for (from, to) in ports.into_iter().filter_map(|(a, b)| a.zip(b)) {
        let mut v = view.borrow_mut();
        v.on_mouse_button(MouseButton::Left, ButtonState::Pressed, from);
        v.on_motion(to);
        v.on_mouse_button(MouseButton::Left, ButtonState::Released, to);
    }

    for alert in alerts.take() {
        println!("alert: {} [{}]", alert.message, alert.dismiss_label);
    }

    // Let the fade of the last accepted wire run out
    {
        let mut v = view.borrow_mut();
        while v.wants_frame_ticks() {
            v.on_frame(1.0 / 60.0);
        }
        v.center_view();
    }

    let mut frame = DisplayList::new();
    let mut v = view.borrow_mut();
    if v.take_redraw_request() {
        v.draw(&mut frame);
    }
    let canvas = v.current_canvas();
    let canvas = canvas.borrow();
    println!(
        "{} modules, {} audio wires, {} draw commands ({} wires), zoom {:.2}",
        canvas.module_count(),
        canvas.audio_connection_count(),
        frame.commands().len(),
        frame.beziers().len(),
        v.zoom(),
    );
    println!("live engine instances: {}", engine.live_instances());
    Ok(())
}
