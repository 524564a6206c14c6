//! Dependency injection container.
//!
//! The container maps string identifiers to [`Definition`]s and caches the
//! instances of shared ones. Identifiers without a definition still resolve
//! if a type registered through [`Container::register`] answers to them:
//! its constructor parameters are resolved recursively from the container,
//! falling back to their declared default, then to absent if nullable.
//!
//! Resolved entries are type-erased ([`Instance`]). Use
//! [`get_as`](Container::get_as) to get a concrete type back, or register a
//! caster with [`expose`](Container::expose) and use
//! [`cast`](Container::cast) to view an instance through a trait object.
//!
//! All methods take `&self`, so an `Arc<Container>` can be shared with the
//! dispatcher while providers keep registering into it. A shared entry is
//! built under a lock of its own, so concurrent first resolutions run its
//! factory or constructor once.

mod cycle;
mod descriptor;

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::error::{BoxError, Error, Result};

pub use descriptor::{Arguments, Injectable, Instance, Kind, MethodDescriptor, Parameter, TypeDescriptor};

/// Builds an instance, possibly resolving other entries on the way.
pub type Factory = Arc<dyn Fn(&Container) -> Result<Instance, BoxError> + Send + Sync>;

type Caster<U> = Arc<dyn Fn(Instance) -> Option<Arc<U>> + Send + Sync>;

/// How an identifier turns into an instance.
#[derive(Clone)]
pub enum Definition {
    /// A ready value, returned as is.
    Instance(Instance),
    /// Invoked with the container on each resolution (once, when shared).
    Factory(Factory),
    /// Another identifier: a registered type to autowire, or an alias.
    Concrete(String),
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(_) => f.write_str("Instance(..)"),
            Self::Factory(_) => f.write_str("Factory(..)"),
            Self::Concrete(id) => write!(f, "Concrete({id})"),
        }
    }
}

#[derive(Clone, Debug)]
struct Binding {
    definition: Definition,
    shared: bool,
}

/// What [`Container::call_method`] calls a method on.
pub enum Target<'a> {
    Id(&'a str),
    Instance(Instance),
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(id: &'a str) -> Self { Self::Id(id) }
}

impl From<Instance> for Target<'_> {
    fn from(instance: Instance) -> Self { Self::Instance(instance) }
}

#[derive(Default)]
pub struct Container {
    bindings: RwLock<HashMap<String, Binding>>,
    resolved: RwLock<HashMap<String, Instance>>,
    types: RwLock<HashMap<String, Arc<TypeDescriptor>>>,
    by_type: RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>,
    casts: RwLock<HashMap<(TypeId, TypeId), Arc<dyn Any + Send + Sync>>>,
    building: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Defines `id`. An existing definition is replaced and any cached shared
    /// instance for `id` is dropped.
    pub fn set(&self, id: impl Into<String>, definition: Definition, shared: bool) -> &Self {
        let id = id.into();
        debug!(%id, ?definition, shared, "container definition set");
        self.resolved.write().remove(&id);
        self.bindings.write().insert(id, Binding { definition, shared });
        self
    }

    /// Stores a ready value under `id`.
    pub fn instance<T: Any + Send + Sync>(&self, id: impl Into<String>, value: T) -> &Self {
        self.set(id, Definition::Instance(Arc::new(value)), false)
    }

    /// Defines `id` by a factory.
    pub fn factory<F, T>(&self, id: impl Into<String>, shared: bool, factory: F) -> &Self
    where
        F: Fn(&Container) -> Result<T, BoxError> + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        let factory: Factory = Arc::new(move |c: &Container| factory(c).map(|v| Arc::new(v) as Instance));
        self.set(id, Definition::Factory(factory), shared)
    }

    /// Self-binding: `id` resolves through the type registered under `id`,
    /// fresh on each call.
    pub fn bind(&self, id: &str) -> &Self {
        self.bind_to(id, id, false)
    }

    /// Binds `id` to another identifier: a registered type, or any other
    /// entry (an alias).
    pub fn bind_to(&self, id: impl Into<String>, concrete: impl Into<String>, shared: bool) -> &Self {
        self.set(id, Definition::Concrete(concrete.into()), shared)
    }

    /// Registers `T` and makes its identifier shared.
    pub fn singleton<T: Injectable>(&self) -> &Self {
        self.register::<T>().bind_to(T::identifier(), T::identifier(), true)
    }

    /// Makes `T` known to the container under [`Injectable::identifier`].
    pub fn register<T: Injectable>(&self) -> &Self {
        self.describe(TypeId::of::<T>(), TypeDescriptor::of::<T>())
    }

    /// Makes an identifier known without a way to build it.
    pub fn register_abstract(&self, identifier: &'static str) -> &Self {
        let descriptor = Arc::new(TypeDescriptor::abstract_type(identifier));
        self.types.write().insert(identifier.to_owned(), descriptor);
        self
    }

    fn describe(&self, type_id: TypeId, descriptor: TypeDescriptor) -> &Self {
        let descriptor = Arc::new(descriptor);
        trace!(identifier = descriptor.identifier(), "type registered");
        self.types.write().insert(descriptor.identifier().to_owned(), Arc::clone(&descriptor));
        self.by_type.write().insert(type_id, descriptor);
        self
    }

    /// Lets instances of `T` be viewed as `U`, typically a trait object:
    ///
    /// ```rust
    /// # use std::sync::Arc;
    /// # use junction::Container;
    /// trait Greeter: Send + Sync { fn greet(&self) -> String; }
    /// struct English;
    /// impl Greeter for English { fn greet(&self) -> String { "hello".into() } }
    ///
    /// let container = Container::new();
    /// container
    ///     .instance("greeter", English)
    ///     .expose::<English, dyn Greeter>(|english| english);
    ///
    /// let instance = container.get("greeter").unwrap();
    /// let greeter = container.cast::<dyn Greeter>(&instance).unwrap();
    /// assert_eq!(greeter.greet(), "hello");
    /// ```
    pub fn expose<T, U>(&self, cast: fn(Arc<T>) -> Arc<U>) -> &Self
    where
        T: Any + Send + Sync,
        U: ?Sized + Send + Sync + 'static,
    {
        let caster: Caster<U> = Arc::new(move |instance: Instance| instance.downcast::<T>().ok().map(cast));
        self.casts.write().insert((TypeId::of::<T>(), TypeId::of::<U>()), Arc::new(caster));
        self
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// `true` if `id` has a definition or names a registered type.
    pub fn has(&self, id: &str) -> bool {
        self.bindings.read().contains_key(id) || self.types.read().contains_key(id)
    }

    /// Resolves `id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if [`has`](Container::has) is `false` for `id`,
    /// [`Error::Resolution`] if it is known but cannot be built: abstract
    /// type, unsatisfiable parameter, failing constructor or factory, or a
    /// dependency cycle.
    pub fn get(&self, id: &str) -> Result<Instance> {
        if !self.has(id) {
            return Err(Error::NotFound { id: id.to_owned() });
        }
        self.resolve_id(id)
    }

    /// Resolves `id` and downcasts it to `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>> {
        self.get(id)?
            .downcast::<T>()
            .map_err(|_| Error::resolution(id, format!("entry is not a `{}`", type_name::<T>())))
    }

    /// Resolves a registered type through its identifier.
    pub fn resolve<T: Injectable>(&self) -> Result<Arc<T>> {
        self.get_as::<T>(T::identifier())
    }

    /// Views `instance` as `U`. Works when the instance was stored as an
    /// `Arc<U>` itself, or when a caster was registered with
    /// [`expose`](Container::expose).
    pub fn cast<U: ?Sized + Send + Sync + 'static>(&self, instance: &Instance) -> Option<Arc<U>> {
        if let Some(stored) = instance.downcast_ref::<Arc<U>>() {
            return Some(Arc::clone(stored));
        }

        let key = ((**instance).type_id(), TypeId::of::<U>());
        let caster = self.casts.read().get(&key).cloned()?;
        let caster = caster.downcast_ref::<Caster<U>>()?;
        caster(Arc::clone(instance))
    }

    /// Descriptor of the registered type `instance` is an instance of.
    pub fn descriptor_of(&self, instance: &Instance) -> Option<Arc<TypeDescriptor>> {
        self.by_type.read().get(&(**instance).type_id()).cloned()
    }

    /// Calls a method declared in [`Injectable::methods`], resolving its
    /// parameters the same way constructor parameters are.
    pub fn call_method<'a>(&self, target: impl Into<Target<'a>>, method: &str) -> Result<Instance> {
        let (label, instance) = match target.into() {
            Target::Id(id) => (id.to_owned(), self.get(id)?),
            Target::Instance(instance) => (String::from("instance"), instance),
        };

        let descriptor = self
            .descriptor_of(&instance)
            .ok_or_else(|| Error::resolution(&label, "not an instance of a registered type"))?;
        let owner = format!("{}::{method}", descriptor.identifier());
        let erased = descriptor
            .method(method)
            .ok_or_else(|| Error::resolution(&owner, "method does not exist"))?;

        let args = self.arguments(&owner, &erased.parameters)?;
        trace!(method = %owner, "calling method");
        (erased.invoke)(&instance, args).map_err(|source| Error::Resolution {
            id: owner,
            reason: String::from("method call failed"),
            source: Some(source),
        })
    }

    // ── Resolution ────────────────────────────────────────────────────────────

    fn resolve_id(&self, id: &str) -> Result<Instance> {
        if let Some(hit) = self.cached(id) {
            return Ok(hit);
        }

        let binding = self.bindings.read().get(id).cloned();
        let (definition, shared) = match binding {
            Some(Binding { definition: Definition::Instance(instance), .. }) => return Ok(instance),
            Some(Binding { definition, shared }) => (Some(definition), shared),
            None => (None, false),
        };

        let _guard = cycle::enter(id)?;
        if !shared {
            return self.build(id, definition);
        }

        // Taken after the cycle check: re-entering `id` on this thread fails
        // there instead of deadlocking here.
        let lock = Arc::clone(self.building.lock().entry(id.to_owned()).or_default());
        let _building = lock.lock();
        if let Some(hit) = self.cached(id) {
            return Ok(hit);
        }

        let instance = self.build(id, definition)?;
        self.resolved.write().insert(id.to_owned(), Arc::clone(&instance));
        Ok(instance)
    }

    fn cached(&self, id: &str) -> Option<Instance> {
        let hit = self.resolved.read().get(id).cloned();
        if hit.is_some() {
            trace!(%id, "shared instance reused");
        }
        hit
    }

    fn build(&self, id: &str, definition: Option<Definition>) -> Result<Instance> {
        let concrete = match definition {
            Some(Definition::Instance(instance)) => return Ok(instance),
            Some(Definition::Factory(factory)) => {
                return factory(self).map_err(|source| Error::Resolution {
                    id: id.to_owned(),
                    reason: String::from("factory failed"),
                    source: Some(source),
                });
            }
            Some(Definition::Concrete(concrete)) => concrete,
            None => id.to_owned(),
        };

        let descriptor = self.types.read().get(&concrete).cloned();
        match descriptor {
            Some(descriptor) => self.instantiate(id, &descriptor),
            None if concrete != id && self.has(&concrete) => self.resolve_id(&concrete),
            None => Err(Error::resolution(id, format!("`{concrete}` is not resolvable"))),
        }
    }

    fn instantiate(&self, id: &str, descriptor: &TypeDescriptor) -> Result<Instance> {
        let constructor = descriptor
            .constructor()
            .ok_or_else(|| Error::resolution(id, format!("`{}` is not instantiable", descriptor.identifier())))?;

        let args = self.arguments(descriptor.identifier(), descriptor.parameters())?;
        debug!(%id, ty = descriptor.type_name(), "instantiating");
        constructor(args).map_err(|source| Error::Resolution {
            id: id.to_owned(),
            reason: String::from("constructor failed"),
            source: Some(source),
        })
    }

    fn arguments(&self, owner: &str, parameters: &[Parameter]) -> Result<Arguments> {
        let values = parameters
            .iter()
            .map(|p| self.argument(owner, p).map(|value| (p.name(), value)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Arguments::new(owner, values))
    }

    fn argument(&self, owner: &str, parameter: &Parameter) -> Result<Option<Instance>> {
        if let Kind::Service(id) = parameter.kind() {
            if self.has(id) {
                return self.get(id).map(Some);
            }
        }
        if let Some(default) = parameter.default_value() {
            return Ok(Some(Arc::clone(default)));
        }
        if parameter.is_nullable() {
            return Ok(None);
        }
        Err(Error::resolution(
            owner,
            format!("parameter `{}` can't be instantiated and has no default value", parameter.name()),
        ))
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.bindings.read().len())
            .field("resolved", &self.resolved.read().len())
            .field("types", &self.types.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Config {
        dsn: String,
    }

    impl Injectable for Config {
        fn identifier() -> &'static str { "config" }

        fn parameters() -> Vec<Parameter> {
            vec![Parameter::value("dsn").with_default(String::from("memory"))]
        }

        fn construct(mut args: Arguments) -> Result<Self, BoxError> {
            Ok(Self { dsn: args.take_value()? })
        }
    }

    struct Repository {
        config: Arc<Config>,
        cache: Option<Arc<Cache>>,
    }

    struct Cache;

    impl Injectable for Repository {
        fn identifier() -> &'static str { "repository" }

        fn parameters() -> Vec<Parameter> {
            vec![
                Parameter::service::<Config>("config"),
                Parameter::identified("cache", "cache").nullable(),
            ]
        }

        fn construct(mut args: Arguments) -> Result<Self, BoxError> {
            Ok(Self { config: args.take()?, cache: args.take_optional()? })
        }

        fn methods() -> Vec<MethodDescriptor<Self>> {
            vec![MethodDescriptor::new(
                "describe",
                vec![Parameter::value("prefix").with_default("repo")],
                |this: &Self, mut args| {
                    let prefix: &'static str = args.take_value()?;
                    Ok(format!("{prefix}:{}", this.config.dsn))
                },
            )]
        }
    }

    struct Strict;

    impl Injectable for Strict {
        fn identifier() -> &'static str { "strict" }

        fn parameters() -> Vec<Parameter> {
            vec![Parameter::value("port")]
        }

        fn construct(_args: Arguments) -> Result<Self, BoxError> {
            Ok(Self)
        }
    }

    struct Left;
    struct Right;

    impl Injectable for Left {
        fn identifier() -> &'static str { "left" }
        fn parameters() -> Vec<Parameter> { vec![Parameter::service::<Right>("right")] }
        fn construct(_args: Arguments) -> Result<Self, BoxError> { Ok(Self) }
    }

    impl Injectable for Right {
        fn identifier() -> &'static str { "right" }
        fn parameters() -> Vec<Parameter> { vec![Parameter::service::<Left>("left")] }
        fn construct(_args: Arguments) -> Result<Self, BoxError> { Ok(Self) }
    }

    #[test]
    fn autowires_registered_types() {
        let container = Container::new();
        container.register::<Config>().register::<Repository>();

        let repo = container.resolve::<Repository>().unwrap();
        assert_eq!(repo.config.dsn, "memory");
        assert!(repo.cache.is_none());
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let container = Container::new();
        assert!(!container.has("mailer"));
        assert!(matches!(container.get("mailer"), Err(Error::NotFound { ref id, .. }) if id == "mailer"));
    }

    #[test]
    fn known_but_unbuildable_ids_fail_to_resolve() {
        let container = Container::new();
        container.register::<Strict>().register_abstract("Emitter");

        let err = container.get("strict").unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        assert!(err.to_string().contains("parameter `port` can't be instantiated"));

        assert!(container.has("Emitter"));
        assert!(matches!(container.get("Emitter"), Err(Error::Resolution { .. })));
    }

    #[test]
    fn shared_entries_are_cached_and_others_are_fresh() {
        let container = Container::new();
        container.singleton::<Config>();

        let a = container.get("config").unwrap();
        let b = container.get("config").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        container.register::<Repository>();
        let r1 = container.get("repository").unwrap();
        let r2 = container.get("repository").unwrap();
        assert!(!Arc::ptr_eq(&r1, &r2));
    }

    #[test]
    fn shared_factories_run_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        let counter = Arc::clone(&calls);
        container.factory("counter", true, move |_| {
            Ok::<_, BoxError>(counter.fetch_add(1, Ordering::SeqCst))
        });

        assert_eq!(*container.get_as::<usize>("counter").unwrap(), 0);
        assert_eq!(*container.get_as::<usize>("counter").unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_resolutions_build_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        let counter = Arc::clone(&calls);
        container.factory("pool", true, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(50));
            Ok::<_, BoxError>(String::from("pool"))
        });

        let barrier = std::sync::Barrier::new(8);
        let instances: Vec<Instance> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        container.get("pool").unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    }

    #[test]
    fn deep_alias_chains_resolve() {
        let container = Container::new();
        container.instance("n100", 7u32);
        for i in 0..100 {
            container.bind_to(format!("n{i}"), format!("n{}", i + 1), false);
        }
        assert_eq!(*container.get_as::<u32>("n0").unwrap(), 7);
    }

    #[test]
    fn redefining_drops_the_cached_instance() {
        let container = Container::new();
        container.factory("greeting", true, |_| Ok::<_, BoxError>(String::from("hello")));
        assert_eq!(*container.get_as::<String>("greeting").unwrap(), "hello");

        container.instance("greeting", String::from("bonjour"));
        assert_eq!(*container.get_as::<String>("greeting").unwrap(), "bonjour");
    }

    #[test]
    fn factories_resolve_through_the_container() {
        let container = Container::new();
        container
            .instance("dsn", String::from("postgres://"))
            .factory("config", false, |c| {
                let dsn = c.get_as::<String>("dsn")?;
                Ok::<_, BoxError>(Config { dsn: dsn.to_string() })
            })
            .register::<Repository>();

        let repo = container.get_as::<Repository>("repository").unwrap();
        assert_eq!(repo.config.dsn, "postgres://");
    }

    #[test]
    fn aliases_follow_definitions() {
        let container = Container::new();
        container.instance("real", 7u32).bind_to("pointer", "real", false);
        assert_eq!(*container.get_as::<u32>("pointer").unwrap(), 7);
    }

    #[test]
    fn failing_factory_keeps_its_cause() {
        let container = Container::new();
        container.factory("broken", false, |_| Err::<(), BoxError>("boom".into()));

        let err = container.get("broken").unwrap_err();
        let cause = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(cause.as_deref(), Some("boom"));
    }

    #[test]
    fn cycles_are_reported() {
        let container = Container::new();
        container.register::<Left>().register::<Right>();

        let err = container.get("left").unwrap_err();
        assert!(err.to_string().contains("circular dependency"), "{err}");
    }

    #[test]
    fn calls_declared_methods() {
        let container = Container::new();
        container.register::<Config>().register::<Repository>();

        let out = container.call_method("repository", "describe").unwrap();
        assert_eq!(out.downcast_ref::<String>().map(String::as_str), Some("repo:memory"));

        let instance = container.get("repository").unwrap();
        assert!(container.call_method(instance, "missing").is_err());
    }

    #[test]
    fn get_as_rejects_wrong_types() {
        let container = Container::new();
        container.instance("n", 1u8);
        assert!(matches!(container.get_as::<String>("n"), Err(Error::Resolution { .. })));
    }

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    impl Named for Config {
        fn name(&self) -> &str { &self.dsn }
    }

    #[test]
    fn casts_through_exposed_traits_or_stored_arcs() {
        let container = Container::new();
        container
            .register::<Config>()
            .expose::<Config, dyn Named>(|config| config)
            .instance("boxed", Arc::new(Config { dsn: String::from("stored") }) as Arc<dyn Named>);

        let config = container.get("config").unwrap();
        assert_eq!(container.cast::<dyn Named>(&config).map(|n| n.name().to_owned()).as_deref(), Some("memory"));

        let stored = container.get("boxed").unwrap();
        assert_eq!(container.cast::<dyn Named>(&stored).map(|n| n.name().to_owned()).as_deref(), Some("stored"));

        let unrelated = container.instance("n", 1u8).get("n").unwrap();
        assert!(container.cast::<dyn Named>(&unrelated).is_none());
    }
}
