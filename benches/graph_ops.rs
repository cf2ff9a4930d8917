//! Patch Graph Benchmarks
//!
//! Connection validation walks the graph on every edit, so its cost grows
//! with the length of the chains a user builds. These benchmarks measure the
//! operations the editor performs per gesture on canvases of growing size:
//!
//! - refusing a wire that would close a loop (full reachability walk)
//! - adding and removing a valid wire
//! - moving a parameter at the head of a data-wire chain

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use patchcanvas::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

// ============================================================================
// Constants
// ============================================================================

const CHAIN_LENGTHS: [usize; 4] = [8, 32, 128, 512];

const COLLECTION: &str = r#"{
    "version": 1,
    "id": "bench",
    "name": "Benchmark modules",
    "modules": [
        { "id": "stage", "name": "Stage", "inlets": ["in"], "outlets": ["out"],
          "params": [ { "id": "level", "min": 0.0, "max": 1.0, "default": 0.5 } ] }
    ]
}"#;

// ============================================================================
// Helper Functions
// ============================================================================

fn resolve<T: 'static>(events: &EventLoop, late: Late<T>) -> T {
    let slot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    late.on_complete(move |r| *sink.borrow_mut() = Some(r));
    events.run_until_idle();
    let value = slot.borrow_mut().take();
    value.expect("engine did not answer").expect("engine refused")
}

/// Canvas holding `len` stages, each wired to the next by audio and data
fn create_chain(len: usize) -> (Rc<RefCell<Canvas>>, Vec<ModuleId>) {
    let events = EventLoop::new();
    let engine = Rc::new(LocalEngine::new(events.clone()));
    let mut registry = TemplateRegistry::new();
    registry
        .install(ModuleCollection::from_json(COLLECTION).unwrap())
        .unwrap();
    let host = Host::new(Config::default(), registry, engine, events.clone());

    let canvas = resolve(&events, Canvas::create_empty(&host, None));
    let modules: Vec<ModuleId> = (0..len)
        .map(|_| resolve(&events, Canvas::create_module(&canvas, "bench/stage")))
        .collect();

    {
        let mut c = canvas.borrow_mut();
        for pair in modules.windows(2) {
            c.connect(PortRef::new(pair[0], "out"), PortRef::new(pair[1], "in"))
                .unwrap();
            c.connect_data(
                PortRef::new(pair[0], "level"),
                PortRef::new(pair[1], "level"),
                DataMode::Relative,
            )
            .unwrap();
        }
    }
    (canvas, modules)
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_loop_refusal(c: &mut Criterion) {
    let mut group = c.benchmark_group("loop_refusal");

    for len in CHAIN_LENGTHS {
        let (canvas, modules) = create_chain(len);
        let tail = PortRef::new(modules[len - 1], "out");
        let head = PortRef::new(modules[0], "in");

        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                let refused = canvas
                    .borrow_mut()
                    .connect(black_box(tail.clone()), black_box(head.clone()));
                black_box(refused)
            })
        });
    }
    group.finish();
}

fn bench_connect_disconnect(c: &mut Criterion) {
    let mut group = c.benchmark_group("connect_disconnect");

    for len in CHAIN_LENGTHS {
        let (canvas, modules) = create_chain(len);
        // the head wire is re-added on every iteration
        let from = PortRef::new(modules[0], "out");
        let to = PortRef::new(modules[1], "in");
        canvas.borrow_mut().disconnect(&from, &to);

        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                let mut c = canvas.borrow_mut();
                c.connect(from.clone(), to.clone()).unwrap();
                black_box(c.disconnect(&from, &to))
            })
        });
    }
    group.finish();
}

fn bench_param_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("param_propagation");

    for len in CHAIN_LENGTHS {
        let (canvas, modules) = create_chain(len);
        let head = modules[0];
        let mut value = 0.0f32;

        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                value = (value + 0.01) % 1.0;
                canvas
                    .borrow_mut()
                    .set_param(head, "level", black_box(value))
                    .unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_loop_refusal,
    bench_connect_disconnect,
    bench_param_propagation
);
criterion_main!(benches);
