//! Parameter Controllers
//!
//! Every module parameter is represented by a [`ParamController`] holding its
//! current value and the numeric range relative values are mapped onto.
//!
//! Controllers notify subscribers synchronously. Value changes fire
//! `on_set` with the new value before it is stored and `after_set` once it
//! is; range changes fire `on_range_min_set` / `on_range_max_set`.
//! Subscribers run while the owning canvas is mutably borrowed and must not
//! borrow it again.

use crate::signal::Signal;
use crate::template::ParamTemplate;

/// Current state of one module parameter
pub struct ParamController {
    pub id: String,
    current: f32,
    default: f32,
    range_min: f32,
    range_max: f32,
    pub on_set: Signal<f32>,
    pub after_set: Signal<f32>,
    pub on_range_min_set: Signal<f32>,
    pub on_range_max_set: Signal<f32>,
}

impl ParamController {
    /// Build a controller from its template, starting at the default value
    pub fn from_template(template: &ParamTemplate) -> Self {
        Self {
            id: template.id.clone(),
            current: template.default,
            default: template.default,
            range_min: template.min,
            range_max: template.max,
            on_set: Signal::new(),
            after_set: Signal::new(),
            on_range_min_set: Signal::new(),
            on_range_max_set: Signal::new(),
        }
    }

    fn store(&mut self, value: f32) {
        self.on_set.happen(&value);
        self.current = value;
        self.after_set.happen(&value);
    }

    /// Absolute value
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Set the absolute value
    pub fn set(&mut self, value: f32) {
        self.store(value);
    }

    /// Position of the value inside the range, 0 for a degenerate range
    pub fn get_relative(&self) -> f32 {
        let span = self.range_max - self.range_min;
        if span == 0.0 {
            0.0
        } else {
            (self.current - self.range_min) / span
        }
    }

    /// Set the value as a fraction of the range
    pub fn set_relative(&mut self, fraction: f32) {
        self.store(self.range_min + fraction * (self.range_max - self.range_min));
    }

    /// Return to the template default
    pub fn reset(&mut self) {
        self.store(self.default);
    }

    /// Template default value
    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Lower bound relative values map onto
    pub fn range_min(&self) -> f32 {
        self.range_min
    }

    /// Upper bound relative values map onto
    pub fn range_max(&self) -> f32 {
        self.range_max
    }

    /// Change the lower bound; the absolute value is kept
    pub fn set_range_min(&mut self, v: f32) {
        self.range_min = v;
        self.on_range_min_set.happen(&v);
    }

    /// Change the upper bound; the absolute value is kept
    pub fn set_range_max(&mut self, v: f32) {
        self.range_max = v;
        self.on_range_max_set.happen(&v);
    }
}

impl std::fmt::Debug for ParamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamController")
            .field("id", &self.id)
            .field("current", &self.current)
            .field("range", &(self.range_min..=self.range_max))
            .finish()
    }
}
