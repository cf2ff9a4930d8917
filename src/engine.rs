//! Synthesis Engine Seam
//!
//! The canvas never talks to the audio server directly. Everything it needs
//! (groups for canvases, instances for modules, parameter updates) goes
//! through the [`SynthEngine`] trait, whose answers arrive as deferred
//! values. [`LocalEngine`] is an in-process implementation that answers on
//! the next turn of an [`EventLoop`], used by tests, benches and headless
//! sessions.

use crate::error::Failure;
use crate::event_loop::EventLoop;
use crate::late::Late;
use crate::template::ModuleTemplate;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Handle of a running module instance on the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u32);

/// Handle of an engine-side group holding the instances of one canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Asynchronous interface to the remote synthesis engine
pub trait SynthEngine {
    /// Make a template known to the engine
    fn install_template(&self, template: &ModuleTemplate) -> Late<()>;

    /// Create a group for a new canvas; `parent` is the enclosing canvas' group
    fn create_group(&self, parent: Option<GroupId>) -> Late<GroupId>;

    /// Free a group; its instances must already be destroyed
    fn destroy_group(&self, group: GroupId);

    /// Start a running instance of a template inside a group
    fn create_instance(&self, template: &ModuleTemplate, group: GroupId) -> Late<InstanceId>;

    /// Stop a running instance
    fn destroy_instance(&self, instance: InstanceId);

    /// Forward a parameter value to a running instance
    fn set_param(&self, _instance: InstanceId, _param: &str, _value: f32) {}
}

#[derive(Debug, Default)]
struct LocalState {
    installed: HashSet<String>,
    rejected: HashSet<String>,
    instances: HashMap<InstanceId, String>,
    groups: HashSet<GroupId>,
    params: HashMap<(InstanceId, String), f32>,
}

/// In-process engine completing every request on the next event-loop turn
#[derive(Debug)]
pub struct LocalEngine {
    events: EventLoop,
    next_id: Cell<u32>,
    require_install: bool,
    state: Rc<RefCell<LocalState>>,
}

impl LocalEngine {
    pub fn new(events: EventLoop) -> Self {
        Self {
            events,
            next_id: Cell::new(1),
            require_install: false,
            state: Rc::new(RefCell::new(LocalState::default())),
        }
    }

    /// Refuse to instantiate templates that were not installed first
    pub fn requiring_install(mut self) -> Self {
        self.require_install = true;
        self
    }

    /// Make every request for this template (full id) fail
    pub fn reject_template(&self, full_id: impl Into<String>) {
        self.state.borrow_mut().rejected.insert(full_id.into());
    }

    /// Instances created and not destroyed yet
    pub fn live_instances(&self) -> usize {
        self.state.borrow().instances.len()
    }

    /// Groups created and not destroyed yet
    pub fn live_groups(&self) -> usize {
        self.state.borrow().groups.len()
    }

    /// Whether a template (full id) was installed
    pub fn is_installed(&self, full_id: &str) -> bool {
        self.state.borrow().installed.contains(full_id)
    }

    /// Last value sent for a parameter of an instance
    pub fn param_value(&self, instance: InstanceId, param: &str) -> Option<f32> {
        self.state
            .borrow()
            .params
            .get(&(instance, param.to_string()))
            .copied()
    }

    fn allocate(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

impl SynthEngine for LocalEngine {
    fn install_template(&self, template: &ModuleTemplate) -> Late<()> {
        let (late, relay) = Late::pending();
        let full_id = template.full_id();
        let state = Rc::clone(&self.state);
        self.events.post(move || {
            let mut s = state.borrow_mut();
            if s.rejected.contains(&full_id) {
                drop(s);
                relay.fail(Failure::TemplateInstallFailed {
                    template: full_id,
                    reason: "the engine rejected the template".into(),
                });
            } else {
                s.installed.insert(full_id);
                drop(s);
                relay.resolve(());
            }
        });
        late
    }

    fn create_group(&self, _parent: Option<GroupId>) -> Late<GroupId> {
        let (late, relay) = Late::pending();
        let group = GroupId(self.allocate());
        let state = Rc::clone(&self.state);
        self.events.post(move || {
            state.borrow_mut().groups.insert(group);
            relay.resolve(group);
        });
        late
    }

    fn destroy_group(&self, group: GroupId) {
        self.state.borrow_mut().groups.remove(&group);
    }

    fn create_instance(&self, template: &ModuleTemplate, _group: GroupId) -> Late<InstanceId> {
        let (late, relay) = Late::pending();
        let full_id = template.full_id();
        let instance = InstanceId(self.allocate());
        let require_install = self.require_install;
        let state = Rc::clone(&self.state);
        self.events.post(move || {
            let mut s = state.borrow_mut();
            let refusal = if s.rejected.contains(&full_id) {
                Some("the engine rejected the template")
            } else if require_install && !s.installed.contains(&full_id) {
                Some("the template is not installed")
            } else {
                None
            };
            match refusal {
                Some(reason) => {
                    drop(s);
                    relay.fail(Failure::creation(full_id, reason));
                }
                None => {
                    s.instances.insert(instance, full_id);
                    drop(s);
                    relay.resolve(instance);
                }
            }
        });
        late
    }

    fn destroy_instance(&self, instance: InstanceId) {
        let mut s = self.state.borrow_mut();
        s.instances.remove(&instance);
        s.params.retain(|(id, _), _| *id != instance);
    }

    fn set_param(&self, instance: InstanceId, param: &str, value: f32) {
        let mut s = self.state.borrow_mut();
        if s.instances.contains_key(&instance) {
            s.params.insert((instance, param.to_string()), value);
        }
    }
}
