//! Module Instances
//!
//! A [`Module`] is one running processing unit inside a canvas: the template
//! it was built from, its engine instance, the controllers of its parameters
//! and, for container templates, the interior canvas it owns.

use crate::engine::InstanceId;
use crate::geometry::Point;
use crate::graph::Canvas;
use crate::param::ParamController;
use crate::template::ModuleTemplate;
use std::cell::RefCell;
use std::rc::Rc;

slotmap::new_key_type! {
    /// Identifier of a module within its canvas
    pub struct ModuleId;
}

pub struct Module {
    template: Rc<ModuleTemplate>,
    instance: InstanceId,
    params: Vec<ParamController>,
    interior: Option<Rc<RefCell<Canvas>>>,
    position: Point,
}

impl Module {
    pub(crate) fn new(
        template: Rc<ModuleTemplate>,
        instance: InstanceId,
        interior: Option<Rc<RefCell<Canvas>>>,
    ) -> Self {
        let params = template
            .params
            .iter()
            .map(ParamController::from_template)
            .collect();
        Self {
            template,
            instance,
            params,
            interior,
            position: Point::ZERO,
        }
    }

    /// Template the module was instantiated from
    pub fn template(&self) -> &Rc<ModuleTemplate> {
        &self.template
    }

    /// Display name, taken from the template
    pub fn name(&self) -> &str {
        &self.template.name
    }

    /// Engine-side instance
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Controller of a parameter
    pub fn param(&self, id: &str) -> Option<&ParamController> {
        self.params.iter().find(|p| p.id == id)
    }

    pub(crate) fn param_mut(&mut self, id: &str) -> Option<&mut ParamController> {
        self.params.iter_mut().find(|p| p.id == id)
    }

    /// Controllers in template order
    pub fn params(&self) -> &[ParamController] {
        &self.params
    }

    /// Last position of the module on the canvas plane
    pub fn position(&self) -> Point {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    /// Interior canvas of a container module
    pub fn interior(&self) -> Option<&Rc<RefCell<Canvas>>> {
        self.interior.as_ref()
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("template", &self.template.full_id())
            .field("instance", &self.instance)
            .field("params", &self.params)
            .field("position", &self.position)
            .field("container", &self.interior.is_some())
            .finish()
    }
}
