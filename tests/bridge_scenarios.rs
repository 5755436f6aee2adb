//! End-to-end scenarios across the bridge context

use hostbridge::entry::{StaticSymbols, SymbolSource};
use hostbridge::marshal::{
    ManagedObject, ManagedTypeDescriptor, ManagedValue, NativeObject, NativeScalar, PrimitiveKind,
};
use hostbridge::{
    Bridge, BridgeConfig, BridgeError, CachingResolver, ContextSelection, ErrorCategory, HostContext,
    InMemoryLoader, LaunchTimer, Logger, MethodHandle, Ownership, Platform,
};
use std::ffi::{c_char, c_int};
use std::sync::atomic::{AtomicUsize, Ordering};

static ENTRY_CALLS: [AtomicUsize; 5] = [
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
];

macro_rules! counting_entry {
    ($name:ident, $slot:expr) => {
        unsafe extern "C" fn $name(_argc: c_int, _argv: *mut *mut c_char) -> c_int {
            ENTRY_CALLS[$slot].fetch_add(1, Ordering::SeqCst);
            $slot as c_int + 100
        }
    };
}

counting_entry!(xamarin_main, 0);
counting_entry!(ns_extension_main, 1);
counting_entry!(watch_main, 2);
counting_entry!(tv_extension_main, 3);
counting_entry!(mac_extension_main, 4);

fn all_entries() -> StaticSymbols {
    StaticSymbols::new()
        .with("xamarin_main", xamarin_main)
        .with("NSExtensionMain", ns_extension_main)
        .with("main", watch_main)
        .with("TVExtensionMain", tv_extension_main)
        .with("xamarin_mac_extension_main", mac_extension_main)
}

unsafe extern "C" fn standalone_main(_argc: c_int, _argv: *mut *mut c_char) -> c_int {
    100
}

/// Only the standalone entry, for tests that do not count calls
fn standalone_entry() -> StaticSymbols {
    StaticSymbols::new().with("xamarin_main", standalone_main)
}

fn bridge() -> Bridge<CachingResolver<InMemoryLoader>> {
    let loader = InMemoryLoader::new()
        .with("CoreLib", b"core".to_vec())
        .with("App", b"app".to_vec());
    Bridge::new(CachingResolver::new(loader), Logger::new(1))
}

fn method() -> MethodHandle {
    MethodHandle::new(0x0600_0010, "Invoke")
}

#[test]
fn each_context_reaches_exactly_one_entry() {
    let bridge = bridge();
    let symbols = all_entries();

    for (slot, context) in HostContext::ALL.into_iter().enumerate() {
        let before: Vec<usize> = ENTRY_CALLS.iter().map(|c| c.load(Ordering::SeqCst)).collect();

        let selection = ContextSelection::exclusive([context]).unwrap();
        let status = bridge
            .launch(selection, &symbols, None, ["app"], &LaunchTimer::disabled())
            .unwrap();
        assert_eq!(status.code(), slot as i32 + 100);

        for (i, counter) in ENTRY_CALLS.iter().enumerate() {
            let delta = counter.load(Ordering::SeqCst) - before[i];
            assert_eq!(delta, usize::from(i == slot), "{context} reached entry {i}");
        }
    }
}

#[test]
fn app_and_watch_extension_together_are_rejected() {
    let err = ContextSelection::exclusive([HostContext::AppExtension, HostContext::WatchExtension]).unwrap_err();
    assert!(matches!(err, BridgeError::ConflictingHostContexts { .. }));
    assert!(err.is_fatal());

    let config = BridgeConfig::parse(
        r#"
[host]
context = "app-extension"
extension_point = "com.apple.watchkit"
platform = "watchos"
"#,
    )
    .unwrap();
    assert!(config.selection(HostContext::StandaloneApp).is_err());
}

#[test]
fn missing_entry_symbol_has_no_fallback() {
    let bridge = bridge();
    let symbols = standalone_entry();
    assert!(symbols.lookup("TVExtensionMain").is_none());

    let selection = ContextSelection::exclusive_on([HostContext::TVExtension], Platform::TvOS).unwrap();
    let err = bridge
        .launch(selection, &symbols, None, ["app"], &LaunchTimer::disabled())
        .unwrap_err();

    assert!(matches!(
        err,
        BridgeError::MissingEntrySymbol {
            context: HostContext::TVExtension,
            symbol: "TVExtensionMain",
        }
    ));
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[test]
fn primitive_conversion_is_deterministic() {
    let bridge = bridge();
    let kinds_and_values = [
        (PrimitiveKind::I4, ManagedValue::scalar(-17i32)),
        (PrimitiveKind::U8, ManagedValue::scalar(u64::MAX)),
        (PrimitiveKind::R8, ManagedValue::scalar(f64::NAN)),
        (PrimitiveKind::Boolean, ManagedValue::scalar(true)),
        (PrimitiveKind::Char, ManagedValue::char16(0x263a)),
    ];

    for (kind, value) in &kinds_and_values {
        let descriptor = ManagedTypeDescriptor::primitive(*kind);
        let a = bridge
            .marshal_return_value(&descriptor, "", value, false, &method())
            .unwrap();
        let b = bridge
            .marshal_return_value(&descriptor, "", value, false, &method())
            .unwrap();

        let (a, b) = (
            a.representation().as_scalar().unwrap(),
            b.representation().as_scalar().unwrap(),
        );
        assert_eq!(a.to_bits(), b.to_bits(), "{descriptor}");
    }
}

#[test]
fn no_value_is_native_absence() {
    let bridge = bridge();
    let result = bridge
        .marshal_return_value(
            &ManagedTypeDescriptor::primitive(PrimitiveKind::I4),
            "i",
            &ManagedValue::null(),
            true,
            &method(),
        )
        .unwrap();

    assert!(result.representation().is_absent());
    assert_eq!(result.representation().as_scalar(), None);
    assert_eq!(result.ownership(), Ownership::Copied);
}

#[test]
fn native_backed_identity_is_preserved() {
    let bridge = bridge();
    let native = NativeObject::new("UIView");
    let value = ManagedValue::object(ManagedObject::wrapping("UIKit.UIView", native));
    let descriptor = ManagedTypeDescriptor::native_class("UIKit.UIView", "UIView");

    let first = bridge
        .marshal_return_value(&descriptor, "@", &value, false, &method())
        .unwrap();
    first
        .representation()
        .as_object()
        .unwrap()
        .set_property("alpha", NativeScalar::F64(0.5));

    let second = bridge
        .marshal_return_value(&descriptor, "@", &value, false, &method())
        .unwrap();
    let observed = second.representation().as_object().unwrap();

    assert!(observed.same_object(first.representation().as_object().unwrap()));
    assert_eq!(observed.property("alpha"), Some(NativeScalar::F64(0.5)));
}

#[test]
fn generic_instantiations_are_not_interchangeable() {
    let bridge = bridge();
    let definition = ManagedTypeDescriptor::managed_class("System.Collections.Generic.List`1");
    let ints = ManagedTypeDescriptor::generic(
        definition.clone(),
        vec![ManagedTypeDescriptor::primitive(PrimitiveKind::I4)],
    );
    let strings = ManagedTypeDescriptor::generic(definition, vec![ManagedTypeDescriptor::string()]);
    let value = ManagedValue::object(ManagedObject::new("System.Collections.Generic.List`1"));

    let from_ints = bridge
        .marshal_return_value(&ints, "", &value, true, &method())
        .unwrap();
    let hint = from_ints.native_hint().unwrap().to_string();

    let err = bridge
        .marshal_return_value(&strings, &hint, &value, true, &method())
        .unwrap_err();
    assert!(matches!(err, BridgeError::HintMismatch { .. }));

    assert_eq!(from_ints.release(), Some(0));
}

#[test]
fn retained_string_survives_managed_value() {
    let bridge = bridge();
    let value = ManagedValue::string("abc");

    let result = bridge
        .marshal_return_value(&ManagedTypeDescriptor::string(), "@\"NSString\"", &value, true, &method())
        .unwrap();
    drop(value);

    assert_eq!(result.ownership(), Ownership::Retained);
    assert_eq!(result.representation().as_str(), Some("abc"));
    let _ = result.release();
}

#[test]
fn core_lib_is_loaded_once() {
    let bridge = bridge();

    let first = bridge.open_assembly("CoreLib").unwrap();
    let second = bridge.open_assembly("CoreLib").unwrap();

    assert!(first.same_unit(&second));
    assert_eq!(bridge.resolver().load_count(), 1);
}

#[test]
fn missing_assembly_is_recoverable() {
    let bridge = bridge();
    let err = bridge.open_assembly("Nope").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ResolutionMiss);

    // A missing root assembly does not stop the launch
    let selection = ContextSelection::exclusive([HostContext::StandaloneApp]).unwrap();
    let status = bridge
        .launch(selection, &standalone_entry(), Some("Nope"), ["app"], &LaunchTimer::disabled())
        .unwrap();
    assert_eq!(status.code(), 100);
}

#[test]
fn root_assembly_is_preloaded() {
    let bridge = bridge();
    let selection = ContextSelection::exclusive([HostContext::StandaloneApp]).unwrap();
    let timer = LaunchTimer::start(bridge.logger(), true);

    bridge
        .launch(selection, &standalone_entry(), Some("App"), ["app"], &timer)
        .unwrap();
    assert_eq!(bridge.resolver().cached(), 1);
}

#[test]
fn missing_entry_is_detected_before_assembly_work() {
    let bridge = bridge();
    let selection = ContextSelection::exclusive_on([HostContext::TVExtension], Platform::TvOS).unwrap();

    let err = bridge
        .launch(selection, &standalone_entry(), Some("App"), ["app"], &LaunchTimer::disabled())
        .unwrap_err();

    assert!(matches!(err, BridgeError::MissingEntrySymbol { .. }));
    assert_eq!(bridge.resolver().load_count(), 0);
    assert_eq!(bridge.resolver().cached(), 0);
}
