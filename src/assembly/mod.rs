//! Assembly resolution
//!
//! The bridge asks for assemblies by logical name and never caches handles
//! itself. Idempotence lives in the resolver: [`CachingResolver`] loads each
//! name at most once, even under concurrent calls, and hands out shared
//! handles to the loaded unit afterwards.

use crate::error::{BridgeError, Result};
use core::fmt;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// File extensions tried after the bare name, in order
pub const ASSEMBLY_EXTENSIONS: [&str; 2] = ["dll", "exe"];

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

struct LoadedUnit {
    id: u64,
    name: String,
    image: Arc<[u8]>,
}

/// Shared handle to a loaded managed assembly
#[derive(Clone)]
pub struct AssemblyHandle(Arc<LoadedUnit>);

impl AssemblyHandle {
    /// Wrap a freshly loaded image as a new unit
    pub fn new(name: impl Into<String>, image: impl Into<Arc<[u8]>>) -> Self {
        Self(Arc::new(LoadedUnit {
            id: NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            image: image.into(),
        }))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Process-unique id of the loaded unit
    #[inline]
    pub fn unit_id(&self) -> u64 {
        self.0.id
    }

    #[inline]
    pub fn image(&self) -> &[u8] {
        &self.0.image
    }

    /// Whether both handles refer to the same loaded unit
    #[inline]
    pub fn same_unit(&self, other: &AssemblyHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for AssemblyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyHandle")
            .field("name", &self.0.name)
            .field("unit", &self.0.id)
            .field("bytes", &self.0.image.len())
            .finish()
    }
}

/// Opens assemblies by logical name
pub trait AssemblyResolver: Send + Sync {
    /// Open `name`, failing with [`BridgeError::AssemblyNotFound`] when no
    /// such assembly exists
    fn open_assembly(&self, name: &str) -> Result<AssemblyHandle>;
}

impl<R: AssemblyResolver + ?Sized> AssemblyResolver for Arc<R> {
    fn open_assembly(&self, name: &str) -> Result<AssemblyHandle> {
        (**self).open_assembly(name)
    }
}

/// Locates assembly bytes; one call per actual load
pub trait AssemblyLoader: Send + Sync {
    /// Image bytes for `name`, or `None` when it does not exist
    fn load(&self, name: &str) -> Option<Vec<u8>>;
}

/// Loader over images registered up front
#[derive(Debug, Default)]
pub struct InMemoryLoader {
    images: HashMap<String, Vec<u8>>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, image: impl Into<Vec<u8>>) {
        self.images.insert(name.into(), image.into());
    }

    pub fn with(mut self, name: impl Into<String>, image: impl Into<Vec<u8>>) -> Self {
        self.register(name, image);
        self
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl AssemblyLoader for InMemoryLoader {
    fn load(&self, name: &str) -> Option<Vec<u8>> {
        self.images.get(name).cloned()
    }
}

/// Loader over assembly files in a list of directories
///
/// Each directory is searched in order for `<name>.dll`, `<name>.exe` and
/// then `<name>` itself. Names are logical: one containing a path separator
/// is never found.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLoader {
    roots: Vec<PathBuf>,
}

impl DirectoryLoader {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn candidates<'a>(&'a self, name: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
        self.roots.iter().flat_map(move |root| {
            ASSEMBLY_EXTENSIONS
                .iter()
                .map(move |ext| root.join(format!("{}.{}", name, ext)))
                .chain(std::iter::once(root.join(name)))
        })
    }
}

fn is_logical_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn read_image(path: &Path) -> Option<Vec<u8>> {
    if !path.is_file() {
        return None;
    }
    match fs::read(path) {
        Ok(image) => Some(image),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => {
            warn!(event = "assembly_unreadable", path = %path.display(), error = %err);
            None
        }
    }
}

impl AssemblyLoader for DirectoryLoader {
    fn load(&self, name: &str) -> Option<Vec<u8>> {
        if !is_logical_name(name) {
            return None;
        }
        self.candidates(name).find_map(|path| {
            let image = read_image(&path)?;
            trace!(event = "assembly_file", name, path = %path.display());
            Some(image)
        })
    }
}

/// Resolver that loads each name once and then serves the cached unit
///
/// Misses are not cached: a later call retries the loader.
pub struct CachingResolver<L> {
    loader: L,
    loaded: DashMap<String, AssemblyHandle>,
    loads: AtomicUsize,
}

impl<L: AssemblyLoader> CachingResolver<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            loaded: DashMap::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Number of loader calls that produced a unit
    #[inline]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Number of distinct units held
    #[inline]
    pub fn cached(&self) -> usize {
        self.loaded.len()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}

impl<L: AssemblyLoader> AssemblyResolver for CachingResolver<L> {
    fn open_assembly(&self, name: &str) -> Result<AssemblyHandle> {
        if let Some(handle) = self.loaded.get(name) {
            trace!(event = "assembly_cache_hit", name);
            return Ok(handle.clone());
        }

        // The entry holds its shard locked while loading, so concurrent
        // callers for the same name wait for this load instead of repeating it.
        let entry = self.loaded.entry(name.to_string()).or_try_insert_with(|| {
            let image = self
                .loader
                .load(name)
                .ok_or_else(|| BridgeError::AssemblyNotFound(name.to_string()))?;
            self.loads.fetch_add(1, Ordering::Relaxed);
            debug!(event = "assembly_loaded", name, bytes = image.len());
            Ok::<_, BridgeError>(AssemblyHandle::new(name, image))
        })?;

        Ok(entry.value().clone())
    }
}

impl<L> fmt::Debug for CachingResolver<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingResolver")
            .field("cached", &self.loaded.len())
            .field("loads", &self.loads.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests;
