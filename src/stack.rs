//! Canvas Stack
//!
//! The navigation path through nested canvases. The first entry is the root
//! canvas the editor is attached to, the last one is the canvas currently
//! displayed. The stack is never empty.

use crate::graph::Canvas;
use std::cell::RefCell;
use std::rc::Rc;

struct Entry {
    canvas: Rc<RefCell<Canvas>>,
    name: String,
}

pub struct CanvasStack {
    // never empty
    entries: Vec<Entry>,
}

impl CanvasStack {
    /// Stack holding only `root`
    pub fn new(root: Rc<RefCell<Canvas>>, name: impl Into<String>) -> Self {
        Self {
            entries: vec![Entry {
                canvas: root,
                name: name.into(),
            }],
        }
    }

    /// Replace the whole path with a single root
    pub fn switch_top_level(&mut self, root: Rc<RefCell<Canvas>>, name: impl Into<String>) {
        self.entries.clear();
        self.entries.push(Entry {
            canvas: root,
            name: name.into(),
        });
    }

    /// Enter a nested canvas
    pub fn push(&mut self, canvas: Rc<RefCell<Canvas>>, name: impl Into<String>) {
        self.entries.push(Entry {
            canvas,
            name: name.into(),
        });
    }

    /// Leave the current canvas; does nothing at the root
    pub fn pop(&mut self) -> bool {
        if self.entries.len() > 1 {
            self.entries.pop();
            true
        } else {
            false
        }
    }

    fn top(&self) -> &Entry {
        // `entries` always holds the root
        &self.entries[self.entries.len() - 1]
    }

    /// Displayed canvas
    pub fn current(&self) -> &Rc<RefCell<Canvas>> {
        &self.top().canvas
    }

    /// Name of the displayed canvas
    pub fn current_name(&self) -> &str {
        &self.top().name
    }

    /// Bottom of the stack
    pub fn root(&self) -> &Rc<RefCell<Canvas>> {
        &self.entries[0].canvas
    }

    /// Names from the root down to the current canvas
    pub fn path(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_root(&self) -> bool {
        self.entries.len() == 1
    }
}

impl std::fmt::Debug for CanvasStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasStack")
            .field("path", &self.path())
            .finish()
    }
}
