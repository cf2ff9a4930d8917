//! Patch Graph
//!
//! A [`Canvas`] owns a set of module instances and two connection relations:
//! audio wires from outlets to inlets, and data wires from one parameter to
//! another. Its mutation methods are the only way to change either, and each
//! of them validates the graph invariants before touching anything:
//!
//! - an exact connection exists at most once,
//! - an inlet accepts one audio wire; a parameter accepts one data wire per
//!   [`DataMode`],
//! - no connection may close a directed cycle.
//!
//! Audio cycles are checked at module granularity (audio flows from any inlet
//! of a module to all of its outlets), data cycles at parameter granularity
//! (values propagate from one parameter to another).

use crate::engine::GroupId;
use crate::error::{Failure, GraphError};
use crate::geometry::Point;
use crate::host::Host;
use crate::late::Late;
use crate::module::{Module, ModuleId};
use crate::param::ParamController;
use crate::port::{DataMode, PortRef};
use crate::template::ModuleTemplate;
use slotmap::SlotMap;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

#[derive(Debug, Clone, Copy)]
enum ParamUpdate {
    Absolute(f32),
    Relative(f32),
}

/// A graph of modules and their connections; one level of a nested patch
pub struct Canvas {
    host: Rc<Host>,
    group: GroupId,
    modules: SlotMap<ModuleId, Module>,
    // insertion order
    order: Vec<ModuleId>,
    audio_connections: HashMap<PortRef, HashSet<PortRef>>,
    data_connections: HashMap<PortRef, HashSet<(PortRef, DataMode)>>,
}

impl Canvas {
    /// Create an empty canvas once the engine has allocated its group
    pub fn create_empty(host: &Rc<Host>, parent: Option<GroupId>) -> Late<Rc<RefCell<Canvas>>> {
        let (late, relay) = Late::pending();
        let pending_group = host.engine().create_group(parent);
        let host = Rc::clone(host);
        pending_group.on_complete(move |result| match result {
            Ok(group) => {
                tracing::debug!("canvas_create: group {:?}", group);
                relay.resolve(Rc::new(RefCell::new(Canvas {
                    host,
                    group,
                    modules: SlotMap::with_key(),
                    order: Vec::new(),
                    audio_connections: HashMap::new(),
                    data_connections: HashMap::new(),
                })));
            }
            Err(failure) => relay.fail(Failure::CanvasCreationFailed(failure.to_string())),
        });
        late
    }

    /// Instantiate a template (by `"collection/template"` id) in this canvas.
    ///
    /// The module is inserted once the engine has created the instance (and,
    /// for container templates, the interior canvas). If the canvas is gone by
    /// then, the orphaned instance is destroyed and the value fails.
    pub fn create_module(this: &Rc<RefCell<Canvas>>, template_id: &str) -> Late<ModuleId> {
        let (host, group) = {
            let canvas = this.borrow();
            (Rc::clone(&canvas.host), canvas.group)
        };
        let Some(template) = host.registry().template(template_id) else {
            return Late::failed(Failure::creation(template_id, "no such template"));
        };

        let (late, relay) = Late::pending();
        let weak = Rc::downgrade(this);
        let pending_instance = host.engine().create_instance(&template, group);
        pending_instance.on_complete(move |created| {
            let instance = match created {
                Ok(instance) => instance,
                Err(failure) => return relay.fail(failure),
            };
            let interior = if template.subpatch {
                Canvas::create_empty(&host, Some(group)).map(Some)
            } else {
                Late::ready(None)
            };
            interior.on_complete(move |interior| {
                let interior = match interior {
                    Ok(interior) => interior,
                    Err(failure) => {
                        host.engine().destroy_instance(instance);
                        return relay.fail(Failure::creation(template.full_id(), failure.to_string()));
                    }
                };
                match weak.upgrade() {
                    Some(canvas) => {
                        let id = canvas.borrow_mut().insert_module(template, instance, interior);
                        relay.resolve(id);
                    }
                    None => {
                        host.engine().destroy_instance(instance);
                        relay.fail(Failure::creation(template.full_id(), "the canvas was closed"));
                    }
                }
            });
        });
        late
    }

    fn insert_module(
        &mut self,
        template: Rc<ModuleTemplate>,
        instance: crate::engine::InstanceId,
        interior: Option<Rc<RefCell<Canvas>>>,
    ) -> ModuleId {
        let full_id = template.full_id();
        let id = self.modules.insert(Module::new(template, instance, interior));
        self.order.push(id);
        tracing::debug!("canvas_add: module {:?} ({full_id})", id);
        id
    }

    /// Remove a module together with every connection touching it.
    /// Returns false if the module was not part of this canvas.
    pub fn remove_module(&mut self, id: ModuleId) -> bool {
        let Some(module) = self.modules.remove(id) else {
            return false;
        };
        self.order.retain(|m| *m != id);

        self.audio_connections.retain(|from, tos| {
            tos.retain(|to| to.module != id);
            from.module != id && !tos.is_empty()
        });
        self.data_connections.retain(|from, tos| {
            tos.retain(|(to, _)| to.module != id);
            from.module != id && !tos.is_empty()
        });

        self.host.engine().destroy_instance(module.instance());
        tracing::debug!("canvas_remove: module {:?}", id);
        true
    }

    // =========================================================================
    // Audio connections
    // =========================================================================

    /// Connect an outlet to an inlet
    pub fn connect(&mut self, from: PortRef, to: PortRef) -> Result<(), GraphError> {
        self.validate_outlet(&from)?;
        self.validate_inlet(&to)?;

        if self.audio_connection_exists(&from, &to) {
            return Err(GraphError::DoubleConnection);
        }
        if self.audio_connections.values().any(|tos| tos.contains(&to)) {
            return Err(GraphError::MultipleConnections);
        }
        if self.module_reachable(to.module, from.module) {
            return Err(GraphError::ConnectionLoop);
        }

        tracing::debug!("canvas_connect: {:?}.{} → {:?}.{}", from.module, from.port, to.module, to.port);
        self.audio_connections.entry(from).or_default().insert(to);
        Ok(())
    }

    /// Remove an audio connection; returns false if it did not exist
    pub fn disconnect(&mut self, from: &PortRef, to: &PortRef) -> bool {
        let Some(tos) = self.audio_connections.get_mut(from) else {
            return false;
        };
        if !tos.remove(to) {
            return false;
        }
        if tos.is_empty() {
            self.audio_connections.remove(from);
        }
        tracing::debug!("canvas_disconnect: {:?}.{} → {:?}.{}", from.module, from.port, to.module, to.port);
        true
    }

    /// Whether exactly this audio edge exists
    pub fn audio_connection_exists(&self, from: &PortRef, to: &PortRef) -> bool {
        self.audio_connections
            .get(from)
            .is_some_and(|tos| tos.contains(to))
    }

    /// Whether `target` can be reached from `start` following audio wires
    fn module_reachable(&self, start: ModuleId, target: ModuleId) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(module) = queue.pop_front() {
            if module == target {
                return true;
            }
            if !visited.insert(module) {
                continue;
            }
            for (from, tos) in &self.audio_connections {
                if from.module == module {
                    queue.extend(tos.iter().map(|to| to.module));
                }
            }
        }
        false
    }

    fn validate_outlet(&self, port: &PortRef) -> Result<(), GraphError> {
        let module = self.modules.get(port.module).ok_or(GraphError::InvalidModule)?;
        if module.template().has_outlet(&port.port) {
            Ok(())
        } else {
            Err(GraphError::InvalidPort(port.port.clone()))
        }
    }

    fn validate_inlet(&self, port: &PortRef) -> Result<(), GraphError> {
        let module = self.modules.get(port.module).ok_or(GraphError::InvalidModule)?;
        if module.template().has_inlet(&port.port) {
            Ok(())
        } else {
            Err(GraphError::InvalidPort(port.port.clone()))
        }
    }

    // =========================================================================
    // Data connections
    // =========================================================================

    /// Connect one parameter to another
    pub fn connect_data(&mut self, from: PortRef, to: PortRef, mode: DataMode) -> Result<(), GraphError> {
        self.validate_param(&from)?;
        self.validate_param(&to)?;

        if self.data_connection_exists(&from, &to).is_some() {
            return Err(GraphError::DoubleConnection);
        }
        let fan_in_reached = self
            .data_connections
            .values()
            .flatten()
            .any(|(dst, m)| *dst == to && *m == mode);
        if fan_in_reached {
            return Err(GraphError::MultipleConnections);
        }
        if self.param_reachable(&to, &from) {
            return Err(GraphError::ConnectionLoop);
        }

        tracing::debug!(
            "canvas_connect_data: {:?}.{} → {:?}.{} ({:?})",
            from.module,
            from.port,
            to.module,
            to.port,
            mode
        );
        self.data_connections.entry(from).or_default().insert((to, mode));
        Ok(())
    }

    /// Remove a data connection whatever its mode; returns false if absent
    pub fn disconnect_data(&mut self, from: &PortRef, to: &PortRef) -> bool {
        let Some(mode) = self.data_connection_exists(from, to) else {
            return false;
        };
        if let Some(tos) = self.data_connections.get_mut(from) {
            tos.remove(&(to.clone(), mode));
            if tos.is_empty() {
                self.data_connections.remove(from);
            }
        }
        tracing::debug!("canvas_disconnect_data: {:?}.{} → {:?}.{}", from.module, from.port, to.module, to.port);
        true
    }

    /// Mode of the data connection between two parameters, if any
    pub fn data_connection_exists(&self, from: &PortRef, to: &PortRef) -> Option<DataMode> {
        self.data_connections
            .get(from)?
            .iter()
            .find(|(dst, _)| dst == to)
            .map(|(_, mode)| *mode)
    }

    fn param_reachable(&self, start: &PortRef, target: &PortRef) -> bool {
        let mut visited: HashSet<&PortRef> = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(port) = queue.pop_front() {
            if port == target {
                return true;
            }
            if !visited.insert(port) {
                continue;
            }
            if let Some(tos) = self.data_connections.get(port) {
                queue.extend(tos.iter().map(|(to, _)| to));
            }
        }
        false
    }

    fn validate_param(&self, port: &PortRef) -> Result<(), GraphError> {
        let module = self.modules.get(port.module).ok_or(GraphError::InvalidModule)?;
        module
            .param(&port.port)
            .map(|_| ())
            .ok_or_else(|| GraphError::InvalidPort(port.port.clone()))
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    /// Set a parameter's absolute value and propagate it along data wires
    pub fn set_param(&mut self, module: ModuleId, param: &str, value: f32) -> Result<(), GraphError> {
        self.apply_param(PortRef::new(module, param), ParamUpdate::Absolute(value))
    }

    /// Set a parameter as a fraction of its range and propagate it
    pub fn set_param_relative(&mut self, module: ModuleId, param: &str, fraction: f32) -> Result<(), GraphError> {
        self.apply_param(PortRef::new(module, param), ParamUpdate::Relative(fraction))
    }

    fn apply_param(&mut self, origin: PortRef, update: ParamUpdate) -> Result<(), GraphError> {
        let mut pending = VecDeque::from([(origin, update)]);
        while let Some((port, update)) = pending.pop_front() {
            let module = self.modules.get_mut(port.module).ok_or(GraphError::InvalidModule)?;
            let instance = module.instance();
            let controller = module
                .param_mut(&port.port)
                .ok_or_else(|| GraphError::InvalidPort(port.port.clone()))?;
            match update {
                ParamUpdate::Absolute(value) => controller.set(value),
                ParamUpdate::Relative(fraction) => controller.set_relative(fraction),
            }
            let (absolute, relative) = (controller.get(), controller.get_relative());
            self.host.engine().set_param(instance, &port.port, absolute);

            if let Some(targets) = self.data_connections.get(&port) {
                for (dst, mode) in targets {
                    let next = match mode {
                        DataMode::Relative => ParamUpdate::Relative(relative),
                        DataMode::Absolute => ParamUpdate::Absolute(absolute),
                    };
                    pending.push_back((dst.clone(), next));
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Process-wide context this canvas was created with
    pub fn host(&self) -> &Rc<Host> {
        &self.host
    }

    /// Engine group holding this canvas' instances
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Look up a module of this canvas
    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    /// Whether the module still belongs to this canvas
    pub fn contains(&self, id: ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    /// Modules in insertion order
    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.order
            .iter()
            .filter_map(|&id| self.modules.get(id).map(|m| (id, m)))
    }

    /// Remember where a module sits on the plane
    pub fn set_module_position(&mut self, id: ModuleId, position: Point) -> bool {
        match self.modules.get_mut(id) {
            Some(module) => {
                module.set_position(position);
                true
            }
            None => false,
        }
    }

    /// Controller of a module parameter, for subscribing to its signals or
    /// changing its range. Values set here are not propagated; use
    /// [`set_param`](Self::set_param) for that.
    pub fn param_mut(&mut self, module: ModuleId, param: &str) -> Option<&mut ParamController> {
        self.modules.get_mut(module)?.param_mut(param)
    }

    /// Number of modules in this canvas
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Interior canvas of a container module
    pub fn interior(&self, id: ModuleId) -> Option<Rc<RefCell<Canvas>>> {
        self.modules.get(id)?.interior().cloned()
    }

    /// Every audio edge as (outlet, inlet)
    pub fn audio_connections(&self) -> impl Iterator<Item = (&PortRef, &PortRef)> {
        self.audio_connections
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from, to)))
    }

    /// Every data edge as (source parameter, destination parameter, mode)
    pub fn data_connections(&self) -> impl Iterator<Item = (&PortRef, &PortRef, DataMode)> {
        self.data_connections
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |(to, mode)| (from, to, *mode)))
    }

    /// Number of audio edges
    pub fn audio_connection_count(&self) -> usize {
        self.audio_connections.values().map(HashSet::len).sum()
    }

    /// Number of data edges
    pub fn data_connection_count(&self) -> usize {
        self.data_connections.values().map(HashSet::len).sum()
    }
}

impl Drop for Canvas {
    fn drop(&mut self) {
        let engine = Rc::clone(self.host.engine());
        for (_, module) in self.modules.drain() {
            engine.destroy_instance(module.instance());
        }
        engine.destroy_group(self.group);
        tracing::debug!("canvas_drop: group {:?}", self.group);
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("group", &self.group)
            .field("modules", &self.modules.len())
            .field("audio_connections", &self.audio_connection_count())
            .field("data_connections", &self.data_connection_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{host, wait};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn canvas(host: &Rc<Host>) -> Rc<RefCell<Canvas>> {
        wait(host, Canvas::create_empty(host, None)).unwrap()
    }

    fn add(host: &Rc<Host>, canvas: &Rc<RefCell<Canvas>>, template: &str) -> ModuleId {
        wait(host, Canvas::create_module(canvas, template)).unwrap()
    }

    fn snapshot(canvas: &Canvas) -> (Vec<(PortRef, PortRef)>, Vec<(PortRef, PortRef, DataMode)>) {
        let mut audio: Vec<_> = canvas
            .audio_connections()
            .map(|(a, b)| (a.clone(), b.clone()))
            .collect();
        let mut data: Vec<_> = canvas
            .data_connections()
            .map(|(a, b, m)| (a.clone(), b.clone(), m))
            .collect();
        audio.sort();
        data.sort();
        (audio, data)
    }

    #[test]
    fn test_create_module() {
        let (host, engine) = host();
        let c = canvas(&host);
        let id = add(&host, &c, "test/osc");
        let canvas = c.borrow();
        assert_eq!(canvas.module_count(), 1);
        assert_eq!(canvas.module(id).map(|m| m.name()), Some("Oscillator"));
        assert_eq!(canvas.module(id).and_then(|m| m.param("freq")).map(|p| p.get()), Some(440.0));
        assert_eq!(engine.live_instances(), 1);
    }

    #[test]
    fn test_create_unknown_template_fails() {
        let (host, engine) = host();
        let c = canvas(&host);
        let result = wait(&host, Canvas::create_module(&c, "test/nothing"));
        assert!(matches!(result, Err(Failure::ModuleInstanceCreationFailed { .. })));
        assert_eq!(c.borrow().module_count(), 0);
        assert_eq!(engine.live_instances(), 0);
    }

    #[test]
    fn test_create_rejected_leaves_nothing() {
        let (host, engine) = host();
        engine.reject_template("test/osc");
        let c = canvas(&host);
        let result = wait(&host, Canvas::create_module(&c, "test/osc"));
        assert!(matches!(result, Err(Failure::ModuleInstanceCreationFailed { .. })));
        assert_eq!(c.borrow().module_count(), 0);
    }

    #[test]
    fn test_create_after_canvas_dropped() {
        let (host, engine) = host();
        let c = canvas(&host);
        let pending = Canvas::create_module(&c, "test/osc");
        drop(c);
        let result = wait(&host, pending);
        assert!(matches!(result, Err(Failure::ModuleInstanceCreationFailed { .. })));
        assert_eq!(engine.live_instances(), 0);
        assert_eq!(engine.live_groups(), 0);
    }

    #[test]
    fn test_container_owns_interior() {
        let (host, engine) = host();
        let c = canvas(&host);
        let group = add(&host, &c, "test/group");
        let interior = c.borrow().interior(group).unwrap();
        add(&host, &interior, "test/osc");
        assert_eq!(engine.live_groups(), 2);
        assert_eq!(engine.live_instances(), 2);

        drop(interior);
        assert!(c.borrow_mut().remove_module(group));
        assert_eq!(engine.live_groups(), 1);
        assert_eq!(engine.live_instances(), 0);
    }

    #[test]
    fn test_connect_and_query() {
        let (host, _) = host();
        let c = canvas(&host);
        let a = add(&host, &c, "test/osc");
        let b = add(&host, &c, "test/filter");
        let mut canvas = c.borrow_mut();

        let from = PortRef::new(a, "out");
        let to = PortRef::new(b, "in");
        assert!(!canvas.audio_connection_exists(&from, &to));
        canvas.connect(from.clone(), to.clone()).unwrap();
        assert!(canvas.audio_connection_exists(&from, &to));
        assert_eq!(canvas.audio_connection_count(), 1);
    }

    #[test]
    fn test_connect_validates_ports() {
        let (host, _) = host();
        let c = canvas(&host);
        let a = add(&host, &c, "test/osc");
        let b = add(&host, &c, "test/filter");
        let mut canvas = c.borrow_mut();

        assert_eq!(
            canvas.connect(PortRef::new(a, "fm"), PortRef::new(b, "in")),
            Err(GraphError::InvalidPort("fm".into()))
        );
        assert_eq!(
            canvas.connect(PortRef::new(a, "out"), PortRef::new(ModuleId::default(), "in")),
            Err(GraphError::InvalidModule)
        );
    }

    #[test]
    fn test_double_connection() {
        let (host, _) = host();
        let c = canvas(&host);
        let a = add(&host, &c, "test/osc");
        let b = add(&host, &c, "test/filter");
        let mut canvas = c.borrow_mut();

        canvas.connect(PortRef::new(a, "out"), PortRef::new(b, "in")).unwrap();
        let before = snapshot(&canvas);
        assert_eq!(
            canvas.connect(PortRef::new(a, "out"), PortRef::new(b, "in")),
            Err(GraphError::DoubleConnection)
        );
        assert_eq!(snapshot(&canvas), before);
    }

    #[test]
    fn test_fan_in_limit_and_fan_out() {
        let (host, _) = host();
        let c = canvas(&host);
        let a = add(&host, &c, "test/osc");
        let b = add(&host, &c, "test/osc");
        let f = add(&host, &c, "test/filter");
        let o = add(&host, &c, "test/out");
        let mut canvas = c.borrow_mut();

        canvas.connect(PortRef::new(a, "out"), PortRef::new(f, "in")).unwrap();
        assert_eq!(
            canvas.connect(PortRef::new(b, "out"), PortRef::new(f, "in")),
            Err(GraphError::MultipleConnections)
        );
        // one outlet may feed many inlets
        canvas.connect(PortRef::new(a, "out"), PortRef::new(o, "in")).unwrap();
        assert_eq!(canvas.audio_connection_count(), 2);
    }

    #[test]
    fn test_connection_loop_is_atomic() {
        let (host, _) = host();
        let c = canvas(&host);
        let a = add(&host, &c, "test/filter");
        let b = add(&host, &c, "test/filter");
        let d = add(&host, &c, "test/filter");
        let mut canvas = c.borrow_mut();

        canvas.connect(PortRef::new(a, "out"), PortRef::new(b, "in")).unwrap();
        canvas.connect(PortRef::new(b, "out"), PortRef::new(d, "in")).unwrap();
        let before = snapshot(&canvas);
        assert_eq!(
            canvas.connect(PortRef::new(d, "out"), PortRef::new(a, "in")),
            Err(GraphError::ConnectionLoop)
        );
        assert_eq!(snapshot(&canvas), before);
    }

    #[test]
    fn test_self_connection_is_a_loop() {
        let (host, _) = host();
        let c = canvas(&host);
        let a = add(&host, &c, "test/filter");
        assert_eq!(
            c.borrow_mut().connect(PortRef::new(a, "out"), PortRef::new(a, "in")),
            Err(GraphError::ConnectionLoop)
        );
    }

    #[test]
    fn test_disconnect_idempotent() {
        let (host, _) = host();
        let c = canvas(&host);
        let a = add(&host, &c, "test/osc");
        let b = add(&host, &c, "test/filter");
        let o = add(&host, &c, "test/out");
        let mut canvas = c.borrow_mut();

        canvas.connect(PortRef::new(a, "out"), PortRef::new(b, "in")).unwrap();
        canvas.connect(PortRef::new(b, "out"), PortRef::new(o, "in")).unwrap();
        let before = snapshot(&canvas);

        assert!(!canvas.disconnect(&PortRef::new(a, "out"), &PortRef::new(o, "in")));
        assert_eq!(snapshot(&canvas), before);

        assert!(canvas.disconnect(&PortRef::new(a, "out"), &PortRef::new(b, "in")));
        assert!(!canvas.disconnect(&PortRef::new(a, "out"), &PortRef::new(b, "in")));
        assert!(canvas.audio_connection_exists(&PortRef::new(b, "out"), &PortRef::new(o, "in")));
        assert_eq!(canvas.audio_connection_count(), 1);
    }

    #[test]
    fn test_remove_module_drops_connections() {
        let (host, engine) = host();
        let c = canvas(&host);
        let m1 = add(&host, &c, "test/osc");
        let m2 = add(&host, &c, "test/filter");
        let mut canvas = c.borrow_mut();

        canvas.connect(PortRef::new(m1, "out"), PortRef::new(m2, "in")).unwrap();
        canvas
            .connect_data(PortRef::new(m1, "amp"), PortRef::new(m2, "q"), DataMode::Relative)
            .unwrap();

        assert!(canvas.remove_module(m1));
        assert!(!canvas.contains(m1));
        assert!(canvas.contains(m2));
        assert_eq!(canvas.audio_connection_count(), 0);
        assert_eq!(canvas.data_connection_count(), 0);
        assert_eq!(engine.live_instances(), 1);
        assert!(!canvas.remove_module(m1));
    }

    #[test]
    fn test_data_connections() {
        let (host, _) = host();
        let c = canvas(&host);
        let a = add(&host, &c, "test/osc");
        let b = add(&host, &c, "test/filter");
        let d = add(&host, &c, "test/osc");
        let mut canvas = c.borrow_mut();

        let amp = PortRef::new(a, "amp");
        let q = PortRef::new(b, "q");
        canvas.connect_data(amp.clone(), q.clone(), DataMode::Absolute).unwrap();
        assert_eq!(canvas.data_connection_exists(&amp, &q), Some(DataMode::Absolute));

        assert_eq!(
            canvas.connect_data(amp.clone(), q.clone(), DataMode::Relative),
            Err(GraphError::DoubleConnection)
        );
        // fan-in is tracked per mode
        assert_eq!(
            canvas.connect_data(PortRef::new(d, "amp"), q.clone(), DataMode::Absolute),
            Err(GraphError::MultipleConnections)
        );
        canvas
            .connect_data(PortRef::new(d, "amp"), q.clone(), DataMode::Relative)
            .unwrap();

        assert_eq!(
            canvas.connect_data(q.clone(), amp.clone(), DataMode::Relative),
            Err(GraphError::ConnectionLoop)
        );
        // a different parameter of the same module is not a loop
        canvas
            .connect_data(q.clone(), PortRef::new(a, "freq"), DataMode::Relative)
            .unwrap();

        assert!(canvas.disconnect_data(&amp, &q));
        assert_eq!(canvas.data_connection_exists(&amp, &q), None);
        assert!(!canvas.disconnect_data(&amp, &q));
    }

    #[test]
    fn test_param_propagation() {
        let (host, engine) = host();
        let c = canvas(&host);
        let a = add(&host, &c, "test/osc");
        let b = add(&host, &c, "test/filter");
        let mut canvas = c.borrow_mut();

        canvas
            .connect_data(PortRef::new(a, "amp"), PortRef::new(b, "cutoff"), DataMode::Relative)
            .unwrap();
        canvas
            .connect_data(PortRef::new(b, "cutoff"), PortRef::new(b, "q"), DataMode::Absolute)
            .unwrap();

        canvas.set_param(a, "amp", 0.25).unwrap();
        let cutoff = canvas.module(b).and_then(|m| m.param("cutoff")).map(|p| p.get());
        assert_relative_eq!(cutoff.unwrap(), 2500.0);
        let q = canvas.module(b).and_then(|m| m.param("q")).map(|p| p.get());
        assert_relative_eq!(q.unwrap(), 2500.0);

        let instance = canvas.module(b).map(|m| m.instance()).unwrap();
        assert_eq!(engine.param_value(instance, "cutoff"), Some(2500.0));

        canvas.set_param_relative(a, "freq", 1.0).unwrap();
        assert_relative_eq!(canvas.module(a).and_then(|m| m.param("freq")).map(|p| p.get()).unwrap(), 2000.0);
        assert_eq!(canvas.set_param(a, "nope", 1.0), Err(GraphError::InvalidPort("nope".into())));
    }

    #[test]
    fn test_propagated_values_notify_subscribers() {
        let (host, _) = host();
        let c = canvas(&host);
        let a = add(&host, &c, "test/osc");
        let b = add(&host, &c, "test/filter");
        let mut canvas = c.borrow_mut();
        canvas
            .connect_data(PortRef::new(a, "amp"), PortRef::new(b, "cutoff"), DataMode::Relative)
            .unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        canvas
            .param_mut(b, "cutoff")
            .unwrap()
            .after_set
            .subscribe(move |v| sink.borrow_mut().push(*v));

        canvas.set_param(a, "amp", 0.5).unwrap();
        assert_eq!(seen.borrow().len(), 1);
        assert_relative_eq!(seen.borrow()[0], 5000.0);
        assert!(canvas.param_mut(b, "nope").is_none());
    }

    #[test]
    fn test_drop_destroys_instances() {
        let (host, engine) = host();
        let c = canvas(&host);
        add(&host, &c, "test/osc");
        add(&host, &c, "test/out");
        assert_eq!(engine.live_instances(), 2);
        drop(c);
        assert_eq!(engine.live_instances(), 0);
        assert_eq!(engine.live_groups(), 0);
    }

    #[test]
    fn test_modules_in_insertion_order() {
        let (host, _) = host();
        let c = canvas(&host);
        let ids: Vec<_> = ["test/osc", "test/filter", "test/out"]
            .iter()
            .map(|t| add(&host, &c, t))
            .collect();
        c.borrow_mut().remove_module(ids[1]);
        let third = add(&host, &c, "test/osc");
        let order: Vec<_> = c.borrow().modules().map(|(id, _)| id).collect();
        assert_eq!(order, vec![ids[0], ids[2], third]);
    }

    proptest! {
        #[test]
        fn prop_audio_graph_stays_acyclic(edges in proptest::collection::vec((0usize..5, 0usize..5), 0..20)) {
            let (host, _) = host();
            let c = canvas(&host);
            let ids: Vec<_> = (0..5).map(|_| add(&host, &c, "test/filter")).collect();
            let mut canvas = c.borrow_mut();
            for (a, b) in edges {
                let before = snapshot(&canvas);
                let result = canvas.connect(PortRef::new(ids[a], "out"), PortRef::new(ids[b], "in"));
                if result.is_err() {
                    prop_assert_eq!(snapshot(&canvas), before);
                }
            }
            // every module's inlet has at most one source, and no module reaches itself
            for &id in &ids {
                let inbound = canvas.audio_connections().filter(|(_, to)| to.module == id).count();
                prop_assert!(inbound <= 1);
                for (from, to) in canvas.audio_connections() {
                    if from.module == id {
                        prop_assert!(!canvas.module_reachable(to.module, id));
                    }
                }
            }
        }
    }
}
