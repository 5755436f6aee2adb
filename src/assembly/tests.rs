//! Assembly resolver tests

use super::*;
use crate::error::ErrorCategory;
use std::sync::Mutex;

/// Loader that records every call
#[derive(Default)]
struct CountingLoader {
    inner: InMemoryLoader,
    calls: Mutex<Vec<String>>,
}

impl AssemblyLoader for CountingLoader {
    fn load(&self, name: &str) -> Option<Vec<u8>> {
        self.calls.lock().unwrap().push(name.to_string());
        self.inner.load(name)
    }
}

fn core_lib() -> InMemoryLoader {
    InMemoryLoader::new()
        .with("CoreLib", b"MZ core".to_vec())
        .with("App", b"MZ app".to_vec())
}

#[test]
fn test_same_name_same_unit() {
    let resolver = CachingResolver::new(core_lib());

    let first = resolver.open_assembly("CoreLib").unwrap();
    let second = resolver.open_assembly("CoreLib").unwrap();

    assert!(first.same_unit(&second));
    assert_eq!(first.unit_id(), second.unit_id());
    assert_eq!(resolver.load_count(), 1);
    assert_eq!(first.name(), "CoreLib");
    assert_eq!(first.image(), b"MZ core");
}

#[test]
fn test_different_names_different_units() {
    let resolver = CachingResolver::new(core_lib());

    let core = resolver.open_assembly("CoreLib").unwrap();
    let app = resolver.open_assembly("App").unwrap();

    assert!(!core.same_unit(&app));
    assert_eq!(resolver.load_count(), 2);
    assert_eq!(resolver.cached(), 2);
}

#[test]
fn test_miss_is_distinguishable_and_recoverable() {
    let resolver = CachingResolver::new(core_lib());

    let err = resolver.open_assembly("Missing").unwrap_err();
    assert!(matches!(&err, BridgeError::AssemblyNotFound(name) if name == "Missing"));
    assert_eq!(err.category(), ErrorCategory::ResolutionMiss);
    assert!(!err.is_fatal());
    assert_eq!(err.to_string(), "assembly 'Missing' not found");

    // The resolver is still usable
    assert!(resolver.open_assembly("CoreLib").is_ok());
    assert_eq!(resolver.cached(), 1);
}

#[test]
fn test_misses_are_retried() {
    let loader = CountingLoader::default();
    let resolver = CachingResolver::new(loader);

    assert!(resolver.open_assembly("Late").is_err());
    assert!(resolver.open_assembly("Late").is_err());

    assert_eq!(resolver.loader().calls.lock().unwrap().len(), 2);
    assert_eq!(resolver.load_count(), 0);
}

#[test]
fn test_concurrent_opens_load_once() {
    let loader = CountingLoader {
        inner: core_lib(),
        ..Default::default()
    };
    let resolver = Arc::new(CachingResolver::new(loader));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            std::thread::spawn(move || resolver.open_assembly("CoreLib").unwrap())
        })
        .collect();
    let units: Vec<AssemblyHandle> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(units.windows(2).all(|w| w[0].same_unit(&w[1])));
    assert_eq!(resolver.load_count(), 1);
    assert_eq!(resolver.loader().calls.lock().unwrap().len(), 1);
}

#[test]
fn test_resolver_through_arc() {
    let resolver: Arc<dyn AssemblyResolver> = Arc::new(CachingResolver::new(core_lib()));
    let a = resolver.open_assembly("App").unwrap();
    let b = resolver.open_assembly("App").unwrap();
    assert!(a.same_unit(&b));
}

#[test]
fn test_in_memory_loader() {
    let mut loader = InMemoryLoader::new();
    assert!(loader.is_empty());
    loader.register("System.Runtime", vec![1, 2, 3]);
    assert_eq!(loader.len(), 1);
    assert_eq!(loader.load("System.Runtime"), Some(vec![1, 2, 3]));
    assert_eq!(loader.load("system.runtime"), None);
}

#[test]
fn test_directory_loader_searches_roots_in_order() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    std::fs::write(second.path().join("CoreLib.dll"), b"MZ second").unwrap();
    std::fs::write(second.path().join("Tool.exe"), b"MZ tool").unwrap();

    let loader = DirectoryLoader::new([first.path(), second.path()]);
    assert_eq!(loader.load("CoreLib"), Some(b"MZ second".to_vec()));
    assert_eq!(loader.load("Tool"), Some(b"MZ tool".to_vec()));
    assert_eq!(loader.load("CoreLib.dll"), Some(b"MZ second".to_vec()));

    std::fs::write(first.path().join("CoreLib.dll"), b"MZ first").unwrap();
    assert_eq!(loader.load("CoreLib"), Some(b"MZ first".to_vec()));
}

#[test]
fn test_directory_loader_only_takes_logical_names() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(dir.path().join("Outside.dll"), b"MZ").unwrap();

    let loader = DirectoryLoader::new([&nested]);
    assert_eq!(loader.load("../Outside"), None);
    assert_eq!(loader.load(".."), None);
    assert_eq!(loader.load(""), None);
}

#[test]
fn test_directory_loader_behind_caching_resolver() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("App.dll"), b"MZ app").unwrap();

    let resolver = CachingResolver::new(DirectoryLoader::new([dir.path()]));
    let first = resolver.open_assembly("App").unwrap();
    let second = resolver.open_assembly("App").unwrap();
    assert!(first.same_unit(&second));
    assert_eq!(resolver.load_count(), 1);

    let err = resolver.open_assembly("Missing").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ResolutionMiss);
}
