//! Marshaling hot path benchmarks
//!
//! Measures per-call conversion cost by category, with logging disabled.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hostbridge::marshal::{
    ManagedData, ManagedObject, ManagedTypeDescriptor, ManagedValue, NativeObject, PrimitiveKind, Scalar,
};
use hostbridge::{Logger, MarshalEngine, MethodHandle};

fn bench_primitives(c: &mut Criterion) {
    let engine = MarshalEngine::new(Logger::disabled());
    let method = MethodHandle::new(1, "Get");
    let mut group = c.benchmark_group("primitive");

    let cases = [
        ("i4", PrimitiveKind::I4, "i", ManagedValue::scalar(42i32)),
        ("r8", PrimitiveKind::R8, "d", ManagedValue::scalar(1.25f64)),
        ("bool", PrimitiveKind::Boolean, "c", ManagedValue::scalar(true)),
    ];

    for (name, kind, hint, value) in cases.iter() {
        let descriptor = ManagedTypeDescriptor::primitive(*kind);
        group.bench_with_input(BenchmarkId::from_parameter(name), value, |b, value| {
            b.iter(|| {
                engine
                    .marshal_return_value(black_box(&descriptor), black_box(hint), value, false, &method)
                    .map(|m| m.into_parts())
            });
        });
    }

    group.finish();
}

fn bench_references(c: &mut Criterion) {
    let engine = MarshalEngine::new(Logger::disabled());
    let method = MethodHandle::new(2, "Get");
    let mut group = c.benchmark_group("reference");

    let string = ManagedValue::string("the quick brown fox");
    for retain in [false, true] {
        group.bench_with_input(BenchmarkId::new("string", retain), &retain, |b, &retain| {
            b.iter(|| {
                engine
                    .marshal_return_value(&ManagedTypeDescriptor::string(), "@", &string, retain, &method)
                    .map(|m| m.release())
            });
        });
    }

    let native = ManagedValue::object(ManagedObject::wrapping("Foundation.NSObject", NativeObject::new("NSObject")));
    let native_type = ManagedTypeDescriptor::native_class("Foundation.NSObject", "NSObject");
    group.bench_function("native_object", |b| {
        b.iter(|| {
            engine
                .marshal_return_value(&native_type, "@", &native, true, &method)
                .map(|m| m.release())
        });
    });

    let list = ManagedValue::object(ManagedObject::new("System.Collections.Generic.List`1"));
    let list_type = ManagedTypeDescriptor::generic(
        ManagedTypeDescriptor::managed_class("System.Collections.Generic.List`1"),
        vec![ManagedTypeDescriptor::string()],
    );
    group.bench_function("generic_proxy", |b| {
        b.iter(|| {
            engine
                .marshal_return_value(&list_type, "", &list, false, &method)
                .map(|m| m.release())
        });
    });

    group.finish();
}

fn bench_structs(c: &mut Criterion) {
    let engine = MarshalEngine::new(Logger::disabled());
    let method = MethodHandle::new(3, "Frame");
    let double = || ManagedTypeDescriptor::primitive(PrimitiveKind::R8);
    let rect = ManagedTypeDescriptor::value_type(
        "CoreGraphics.CGRect",
        vec![
            ManagedTypeDescriptor::value_type("CoreGraphics.CGPoint", vec![double(), double()]),
            ManagedTypeDescriptor::value_type("CoreGraphics.CGSize", vec![double(), double()]),
        ],
    );
    let value = ManagedValue::structure(
        (0..2)
            .map(|i| ManagedData::Struct(vec![ManagedData::Scalar(Scalar::F64(i as f64)); 2]))
            .collect(),
    );

    c.bench_function("struct/cgrect", |b| {
        b.iter(|| {
            engine
                .marshal_return_value(&rect, "{CGRect={CGPoint=dd}{CGSize=dd}}", &value, false, &method)
                .map(|m| m.into_parts())
        });
    });
}

criterion_group!(benches, bench_primitives, bench_references, bench_structs);
criterion_main!(benches);
