//! Host
//!
//! The process-scoped owner of the configuration, the template registry, the
//! synthesis engine and the event loop. It is built once, in that order, and
//! shared by reference with every canvas and view.

use crate::collection::TemplateRegistry;
use crate::config::Config;
use crate::engine::SynthEngine;
use crate::event_loop::EventLoop;
use crate::late::Late;
use std::rc::Rc;

pub struct Host {
    config: Config,
    registry: TemplateRegistry,
    engine: Rc<dyn SynthEngine>,
    events: EventLoop,
}

impl Host {
    pub fn new(
        config: Config,
        registry: TemplateRegistry,
        engine: Rc<dyn SynthEngine>,
        events: EventLoop,
    ) -> Rc<Self> {
        Rc::new(Self {
            config,
            registry,
            engine,
            events,
        })
    }

    /// Settings shared by every canvas and view
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Installed template collections
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Synthesis engine running the instances
    pub fn engine(&self) -> &Rc<dyn SynthEngine> {
        &self.engine
    }

    /// Event loop completing deferred values
    pub fn events(&self) -> &EventLoop {
        &self.events
    }

    /// Install every registered template into the engine
    pub fn install_templates(&self) -> Late<()> {
        self.registry.install_all_into(self.engine.as_ref())
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
