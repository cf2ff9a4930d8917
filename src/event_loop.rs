//! Cooperative Event Loop
//!
//! A single-threaded task queue. Engine round trips, deferred completions and
//! other "later" work are posted here and run by the embedding shell between
//! input events and frames. Cloning an [`EventLoop`] yields another handle to
//! the same queue.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

/// Handle to a shared single-threaded task queue
#[derive(Clone, Default)]
pub struct EventLoop {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a task to run on a later turn
    pub fn post(&self, task: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(task));
    }

    /// Number of tasks waiting to run
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run a single task, returning false if the queue was empty
    pub fn run_once(&self) -> bool {
        let task = self.queue.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks posted meanwhile.
    /// Returns the number of tasks executed.
    pub fn run_until_idle(&self) -> usize {
        let mut executed = 0;
        while self.run_once() {
            executed += 1;
        }
        executed
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_tasks_run_in_order() {
        let events = EventLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = Rc::clone(&log);
            events.post(move || log.borrow_mut().push(i));
        }
        assert_eq!(events.pending(), 3);
        assert_eq!(events.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_tasks_posted_while_running() {
        let events = EventLoop::new();
        let count = Rc::new(Cell::new(0));
        let handle = events.clone();
        let c = Rc::clone(&count);
        events.post(move || {
            c.set(c.get() + 1);
            let c = Rc::clone(&c);
            handle.post(move || c.set(c.get() + 1));
        });
        assert_eq!(events.run_until_idle(), 2);
        assert_eq!(count.get(), 2);
        assert!(!events.run_once());
    }
}
