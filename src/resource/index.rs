//! Root of the resource graph.

use super::conf::Conf;
use super::observer::{NoopObserver, Observer};
use super::resource::Resource;
use crate::error::{BuildError, CompileError};
use crate::schema::{ReferenceChecker, ReferenceTarget, Schema};
use crate::storage::Storer;
use log::info;
use std::fmt;
use std::sync::Arc;

/// Top-level resources, addressed by dotted paths such as `users.posts`.
///
/// The graph is built with `&mut` methods, compiled once, then shared read-only.
///
/// ```rust
/// use resource_layer::resource::{Conf, Index};
/// use resource_layer::schema::{Field, Reference, Schema, Text, id_field};
/// use resource_layer::storage::InMemoryStorage;
/// use std::sync::Arc;
///
/// let mut index = Index::new();
/// let users = Schema::new("users").field("id", id_field());
/// let posts = Schema::new("posts")
///     .field("id", id_field())
///     .field("user", Field::new(Reference::new("users")).required())
///     .field("title", Field::new(Text::default()));
///
/// index
///     .bind("users", users, Some(Arc::new(InMemoryStorage::new())), Conf::default())
///     .unwrap()
///     .bind("posts", "user", posts, Some(Arc::new(InMemoryStorage::new())), Conf::default())
///     .unwrap();
///
/// index.compile().unwrap();
/// assert_eq!(index.resource("users.posts").unwrap().path(), "users.posts");
/// ```
pub struct Index {
    resources: Vec<Resource>,
    observer: Arc<dyn Observer>,
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("resources", &self.resources)
            .finish()
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Index {
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Report every operation of every resource to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        for resource in &mut self.resources {
            resource.set_observer(observer.clone());
        }
        self.observer = observer;
        self
    }

    /// Bind a top-level resource.
    pub fn bind(
        &mut self,
        name: impl Into<String>,
        schema: Schema,
        storage: Option<Arc<dyn Storer>>,
        conf: Conf,
    ) -> Result<&mut Resource, BuildError> {
        let name = name.into();
        let i = match self
            .resources
            .binary_search_by(|r| r.name().cmp(&name))
        {
            Ok(_) => {
                return Err(BuildError::AlreadyBound {
                    name,
                    parent: "root".to_string(),
                });
            }
            Err(i) => i,
        };

        log::debug!("binding {name}");
        let resource = Resource::new(name, schema, storage, conf, self.observer.clone());
        self.resources.insert(i, resource);
        Ok(&mut self.resources[i])
    }

    /// Top-level resources, sorted by name.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Resource at a dotted path.
    pub fn resource(&self, path: &str) -> Option<&Resource> {
        let mut names = path.split('.');
        let first = names.next()?;
        let i = self
            .resources
            .binary_search_by(|r| r.name().cmp(first))
            .ok()?;
        names.try_fold(self.resources.get(i)?, |resource, name| {
            resource.sub_resource(name)
        })
    }

    pub fn resource_mut(&mut self, path: &str) -> Option<&mut Resource> {
        let mut names = path.split('.');
        let first = names.next()?;
        let i = self
            .resources
            .binary_search_by(|r| r.name().cmp(first))
            .ok()?;
        names.try_fold(self.resources.get_mut(i)?, |resource, name| {
            resource.sub_resource_mut(name)
        })
    }

    /// Compile every resource schema, resolving references against this index.
    ///
    /// Must be called once the graph is complete and before serving.
    pub fn compile(&self) -> Result<(), CompileError> {
        for resource in &self.resources {
            resource.compile(self)?;
        }
        info!("compiled {} top-level resource(s)", self.resources.len());
        Ok(())
    }
}

impl ReferenceChecker for Index {
    fn reference_target(&self, path: &str) -> Option<ReferenceTarget> {
        self.resource(path).map(Resource::reference_target)
    }
}
