//! Shared fixtures for unit tests.

use crate::collection::{ModuleCollection, TemplateRegistry};
use crate::config::Config;
use crate::engine::LocalEngine;
use crate::error::Failure;
use crate::event_loop::EventLoop;
use crate::host::Host;
use crate::late::Late;
use std::cell::RefCell;
use std::rc::Rc;

pub const TEST_COLLECTION: &str = r#"{
    "version": 1,
    "id": "test",
    "name": "Test modules",
    "modules": [
        { "id": "osc", "name": "Oscillator", "inlets": ["fm"], "outlets": ["out"],
          "params": [
            { "id": "freq", "min": 20.0, "max": 2000.0, "default": 440.0 },
            { "id": "amp", "min": 0.0, "max": 1.0, "default": 0.5 }
          ] },
        { "id": "filter", "name": "Filter", "inlets": ["in"], "outlets": ["out"],
          "params": [
            { "id": "cutoff", "min": 0.0, "max": 10000.0, "default": 1000.0 },
            { "id": "q", "min": 0.0, "max": 1.0 }
          ] },
        { "id": "out", "name": "Output", "inlets": ["in"] },
        { "id": "group", "name": "Group", "inlets": ["in"], "outlets": ["out"], "subpatch": true },
        { "id": "fancy", "name": "Fancy", "outlets": ["out"], "gui": "hologram" }
    ]
}"#;

pub fn host() -> (Rc<Host>, Rc<LocalEngine>) {
    let events = EventLoop::new();
    let engine = Rc::new(LocalEngine::new(events.clone()));
    let mut registry = TemplateRegistry::new();
    registry
        .install(ModuleCollection::from_json(TEST_COLLECTION).unwrap())
        .unwrap();
    let host = Host::new(Config::default(), registry, engine.clone(), events);
    (host, engine)
}

/// Drive the event loop until the value completes
pub fn wait<T: 'static>(host: &Host, late: Late<T>) -> Result<T, Failure> {
    let slot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    late.on_complete(move |r| *sink.borrow_mut() = Some(r));
    host.events().run_until_idle();
    let result = slot.borrow_mut().take();
    result.unwrap_or(Err(Failure::Abandoned))
}
