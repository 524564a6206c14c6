//! Route groups.

use super::collector::{Registrar, RouteCollection};

/// A path prefix plus a nested collection of routes and groups.
///
/// The group owns its children. When the collector flattens the tree, the
/// prefix is put in front of every descendant path and the group's
/// middleware in front of every descendant's own middleware.
#[derive(Clone, Debug, Default)]
pub struct RouteGroup {
    prefix: String,
    name: Option<String>,
    collection: RouteCollection,
}

impl RouteGroup {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), ..Self::default() }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn prefix(&self) -> &str { &self.prefix }
    pub fn name(&self) -> Option<&str> { self.name.as_deref() }
    pub fn collection(&self) -> &RouteCollection { &self.collection }
}

impl Registrar for RouteGroup {
    fn collection_mut(&mut self) -> &mut RouteCollection {
        &mut self.collection
    }
}
