//! The schema registry and the shared type-graph cache.
//!
//! A [`Schema`] owns the registered type descriptors plus the behavioral
//! extension points (converters, subtype factories, custom codecs), and
//! memoizes built [`TypeNode`] graphs per type identity.
//!
//! ## Cache semantics
//!
//! The cache follows single-writer/many-reader, double-checked publication:
//! lookups take a read lock and return the shared `Arc`; a miss builds the
//! graph outside any lock (construction can recurse into other types), then
//! takes the write lock and publishes every node built during the pass.
//! If two callers race, the first publication wins and the loser adopts the
//! published nodes, so a type always has exactly one cached identity.
//! Nodes are immutable after publication; readers never block each other.

mod build;
mod node;

pub use node::{
    AttrSet, Binding, BindingKind, Ctor, NodeKind, SubtypeEntry, SubtypeTable, TypeNode,
};

use crate::desc::{CustomCodec, SubtypeFactory, TypeDesc, ValueConverter};
use crate::error::{BinformError, Result};
use crate::value::TypeId;
use build::GraphBuilder;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// The descriptor registry plus the process-lifetime type-graph cache.
///
/// Typically built once at startup, wrapped in an `Arc`, and shared by every
/// caller; each serialize/deserialize operation only reads it.
#[derive(Default)]
pub struct Schema {
    descs: HashMap<TypeId, TypeDesc>,
    converters: HashMap<String, Arc<dyn ValueConverter>>,
    factories: HashMap<String, Arc<dyn SubtypeFactory>>,
    codecs: HashMap<String, Arc<dyn CustomCodec>>,
    cache: RwLock<HashMap<TypeId, Arc<TypeNode>>>,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("types", &self.descs.len())
            .field("converters", &self.converters.len())
            .field("factories", &self.factories.len())
            .field("codecs", &self.codecs.len())
            .finish()
    }
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type descriptor. Re-registering an id replaces the
    /// descriptor but not any already-published graph.
    pub fn register(&mut self, desc: TypeDesc) -> &mut Self {
        self.descs.insert(desc.type_id.clone(), desc);
        self
    }

    /// Registers a named value converter.
    pub fn converter(
        &mut self,
        name: impl Into<String>,
        converter: Arc<dyn ValueConverter>,
    ) -> &mut Self {
        self.converters.insert(name.into(), converter);
        self
    }

    /// Registers a named subtype factory.
    pub fn factory(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn SubtypeFactory>,
    ) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Registers a named custom codec.
    pub fn codec(&mut self, name: impl Into<String>, codec: Arc<dyn CustomCodec>) -> &mut Self {
        self.codecs.insert(name.into(), codec);
        self
    }

    pub(crate) fn desc(&self, tid: &TypeId) -> Option<&TypeDesc> {
        self.descs.get(tid)
    }

    pub(crate) fn converter_by_name(&self, name: &str) -> Result<&Arc<dyn ValueConverter>> {
        self.converters
            .get(name)
            .ok_or_else(|| BinformError::ConverterRejected {
                name: name.to_owned(),
            })
    }

    pub(crate) fn factory_by_name(&self, name: &str) -> Option<&Arc<dyn SubtypeFactory>> {
        self.factories.get(name)
    }

    pub(crate) fn codec_by_name(&self, name: &str) -> Result<&Arc<dyn CustomCodec>> {
        self.codecs.get(name).ok_or_else(|| BinformError::UnknownType {
            type_id: format!("custom codec `{name}`"),
        })
    }

    /// Returns the cached type graph for `tid`, building and publishing it on
    /// first use.
    pub fn graph(&self, tid: &TypeId) -> Result<Arc<TypeNode>> {
        if let Some(node) = self.cached(tid) {
            return Ok(node);
        }

        let seed = match self.cache.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let mut builder = GraphBuilder::new(self, seed);
        let node = builder.build(tid)?;
        let built = builder.into_built();

        let mut guard = match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (id, fresh) in built {
            guard.entry(id).or_insert(fresh);
        }
        // First publication wins; adopt whatever is in the cache now.
        let published = guard.get(tid).map(Arc::clone).unwrap_or(node);
        debug!(type_id = %tid, "type graph published");
        Ok(published)
    }

    fn cached(&self, tid: &TypeId) -> Option<Arc<TypeNode>> {
        let guard = match self.cache.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.get(tid).map(Arc::clone)
    }

    /// True when `candidate` is `ancestor` or derives from it through base
    /// links. Used by type-anchored path resolution.
    pub(crate) fn is_same_or_derived(&self, candidate: &TypeId, ancestor: &TypeId) -> bool {
        let mut cursor = Some(candidate.clone());
        let mut hops = 0usize;
        while let Some(id) = cursor {
            if &id == ancestor {
                return true;
            }
            // Bounded in case of malformed base chains; cycles are rejected
            // at build time but this helper can run before a build.
            hops += 1;
            if hops > 64 {
                return false;
            }
            cursor = self.desc(&id).and_then(|d| d.base.clone());
        }
        false
    }
}
