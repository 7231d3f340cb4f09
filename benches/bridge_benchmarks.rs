//! Benchmarks for the hot bridge paths.
//!
//! - Wrapper lookup for an already bound native object
//! - Bind/unbind cycles, with and without ghost capture
//! - Nearest-ancestor resolution against a wide registry
//! - Pointer text decoding
//!
//! ## Profiling with Puffin
//!
//! ```bash
//! cargo bench --features profile-with-puffin
//! ```

use std::hint::black_box;
use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use objbridge::core::parse_address;
use objbridge::prelude::*;

struct Leaf {
    class: String,
    ancestry: Vec<String>,
}

impl NativeObject for Leaf {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn is_a(&self, class_name: &str) -> bool {
        self.class == class_name || self.ancestry.iter().any(|a| a == class_name)
    }
}

fn leaf(class: &str, ancestry: &[String]) -> NativeRef {
    Rc::new(Leaf {
        class: class.to_string(),
        ancestry: ancestry.to_vec(),
    })
}

/// Turn puffin scopes on so `profiling` scopes in the bridge are recorded.
#[cfg(feature = "profile-with-puffin")]
fn enable_puffin() {
    puffin::set_scopes_on(true);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn enable_puffin() {}

/// Bridge with `width` unrelated class chains of `depth` classes each.
fn wide_bridge(width: usize, depth: usize) -> (Bridge, Vec<String>) {
    enable_puffin();
    let bridge = Bridge::new();
    let mut last_chain = Vec::new();
    for w in 0..width {
        let mut base: Option<WrapperTypeRef> = None;
        let mut chain = Vec::new();
        for d in 0..depth {
            let name = format!("vtkClass{w}_{d}");
            let mut ty = WrapperType::new(format!("vtkmodules.{name}"));
            if let Some(base) = &base {
                ty = ty.with_base(base);
            }
            let ty = ty.into_ref();
            bridge
                .add_class_to_map(ClassDescriptor::new(name.clone(), &ty))
                .unwrap();
            base = Some(ty);
            chain.push(name);
        }
        last_chain = chain;
    }
    (bridge, last_chain)
}

fn bench_find_object(c: &mut Criterion) {
    let (bridge, chain) = wide_bridge(1, 1);
    let native = leaf(&chain[0], &[]);
    bridge.get_object_from_pointer(&native).unwrap();

    c.bench_function("find_object/bound", |b| {
        b.iter(|| black_box(bridge.find_object(black_box(&native))))
    });
}

fn bench_bind_cycle(c: &mut Criterion) {
    let (bridge, chain) = wide_bridge(1, 1);
    let native = leaf(&chain[0], &[]);
    let mut group = c.benchmark_group("bind_cycle");

    group.bench_function("plain", |b| {
        b.iter(|| {
            let wrapper = bridge.get_object_from_pointer(&native).unwrap();
            bridge.remove_object_from_map(&wrapper);
        })
    });

    group.bench_function("with_ghost", |b| {
        b.iter(|| {
            let wrapper = bridge.get_object_from_pointer(&native).unwrap();
            wrapper.dict().set("tag", Value::Int(1));
            bridge.remove_object_from_map(&wrapper);
        })
    });

    group.finish();
}

fn bench_nearest_ancestor(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest_ancestor");
    for width in [10usize, 100, 500] {
        let (bridge, chain) = wide_bridge(width, 4);
        let mut counter = 0usize;
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| {
                // A fresh class name each time defeats the resolution cache.
                counter += 1;
                let native = leaf(&format!("vtkHidden{counter}"), &chain);
                let wrapper = bridge.get_object_from_pointer(&native).unwrap();
                bridge.remove_object_from_map(&wrapper);
            })
        });
    }
    group.finish();
}

fn bench_parse_address(c: &mut Criterion) {
    let mangled = objbridge::core::mangle_pointer(0x7f12_a4c0, "vtkObject");
    let mut group = c.benchmark_group("parse_address");
    for (name, text) in [
        ("mangled", mangled.as_str()),
        ("addr", "Addr=0x7f12a4c0"),
        ("bare", "0x7f12a4c0"),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), text, |b, text| {
            b.iter(|| black_box(parse_address(black_box(text))))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_find_object,
    bench_bind_cycle,
    bench_nearest_ancestor,
    bench_parse_address
);
criterion_main!(benches);
