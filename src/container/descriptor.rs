//! Type descriptors: the container's replacement for runtime reflection.
//!
//! A type becomes autowirable by implementing [`Injectable`]: it names the
//! identifier it answers to, lists its constructor parameters and builds
//! itself from the resolved [`Arguments`]. The container turns that into a
//! [`TypeDescriptor`] once, at registration, and reuses it for every
//! resolution.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, Error, Result};

/// A resolved container entry.
pub type Instance = Arc<dyn Any + Send + Sync>;

// ── Parameters ────────────────────────────────────────────────────────────────

/// What a parameter expects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// A plain value (number, string, settings struct...). Never looked up in
    /// the container; only its default or nullability can satisfy it.
    Value,
    /// A service, resolved through the container by identifier.
    Service(String),
}

/// One constructor or method parameter.
#[derive(Clone)]
pub struct Parameter {
    name: &'static str,
    kind: Kind,
    default: Option<Instance>,
    nullable: bool,
}

impl Parameter {
    /// A parameter satisfied by another injectable type.
    pub fn service<T: Injectable>(name: &'static str) -> Self {
        Self::identified(name, T::identifier())
    }

    /// A parameter satisfied by whatever the container resolves for `id`.
    pub fn identified(name: &'static str, id: impl Into<String>) -> Self {
        Self { name, kind: Kind::Service(id.into()), default: None, nullable: false }
    }

    /// A plain value parameter.
    pub fn value(name: &'static str) -> Self {
        Self { name, kind: Kind::Value, default: None, nullable: false }
    }

    /// Value used when the container cannot provide one.
    pub fn with_default<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.default = Some(Arc::new(value));
        self
    }

    /// Accept an absent value as a last resort.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn name(&self) -> &'static str { self.name }
    pub fn kind(&self) -> &Kind { &self.kind }
    pub fn default_value(&self) -> Option<&Instance> { self.default.as_ref() }
    pub fn is_nullable(&self) -> bool { self.nullable }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("has_default", &self.default.is_some())
            .field("nullable", &self.nullable)
            .finish()
    }
}

// ── Arguments ─────────────────────────────────────────────────────────────────

/// Resolved arguments, consumed positionally in declaration order.
pub struct Arguments {
    owner: String,
    values: std::vec::IntoIter<(&'static str, Option<Instance>)>,
}

impl Arguments {
    pub(crate) fn new(owner: impl Into<String>, values: Vec<(&'static str, Option<Instance>)>) -> Self {
        Self { owner: owner.into(), values: values.into_iter() }
    }

    /// Next argument, which must be present and of type `T`.
    pub fn take<T: Any + Send + Sync>(&mut self) -> Result<Arc<T>> {
        let (name, value) = self.next_slot::<T>()?;
        value.ok_or_else(|| Error::resolution(&self.owner, format!("argument `{name}` is absent")))
    }

    /// Next argument; `None` if the parameter was resolved as absent.
    pub fn take_optional<T: Any + Send + Sync>(&mut self) -> Result<Option<Arc<T>>> {
        self.next_slot::<T>().map(|(_, value)| value)
    }

    /// Next argument, cloned out of its shared slot. Handy for plain values.
    pub fn take_value<T: Any + Send + Sync + Clone>(&mut self) -> Result<T> {
        self.take::<T>().map(|v| T::clone(&v))
    }

    fn next_slot<T: Any + Send + Sync>(&mut self) -> Result<(&'static str, Option<Arc<T>>)> {
        let (name, value) = self
            .values
            .next()
            .ok_or_else(|| Error::resolution(&self.owner, "more arguments taken than declared"))?;

        let typed = match value {
            Some(v) => Some(v.downcast::<T>().map_err(|_| {
                Error::resolution(&self.owner, format!("argument `{name}` is not a `{}`", type_name::<T>()))
            })?),
            None => None,
        };
        Ok((name, typed))
    }
}

// ── Injectable ────────────────────────────────────────────────────────────────

/// A type the container can build on its own.
///
/// ```rust
/// use std::sync::Arc;
/// use junction::container::{Arguments, Container, Injectable, Parameter};
/// use junction::BoxError;
///
/// struct Database { url: String }
///
/// impl Injectable for Database {
///     fn identifier() -> &'static str { "db" }
///     fn parameters() -> Vec<Parameter> {
///         vec![Parameter::value("url").with_default(String::from("sqlite::memory:"))]
///     }
///     fn construct(mut args: Arguments) -> Result<Self, BoxError> {
///         Ok(Self { url: args.take_value()? })
///     }
/// }
///
/// struct Users { db: Arc<Database> }
///
/// impl Injectable for Users {
///     fn parameters() -> Vec<Parameter> { vec![Parameter::service::<Database>("db")] }
///     fn construct(mut args: Arguments) -> Result<Self, BoxError> {
///         Ok(Self { db: args.take()? })
///     }
/// }
///
/// let container = Container::new();
/// container.register::<Database>().register::<Users>();
///
/// let users = container.resolve::<Users>().unwrap();
/// assert_eq!(users.db.url, "sqlite::memory:");
/// ```
pub trait Injectable: Any + Send + Sync + Sized {
    /// The identifier this type answers to. Defaults to the Rust type name.
    fn identifier() -> &'static str {
        type_name::<Self>()
    }

    /// Constructor parameters, in the order [`construct`](Injectable::construct)
    /// takes them.
    fn parameters() -> Vec<Parameter> {
        Vec::new()
    }

    fn construct(args: Arguments) -> Result<Self, BoxError>;

    /// Methods callable through [`Container::call_method`](super::Container::call_method).
    fn methods() -> Vec<MethodDescriptor<Self>> {
        Vec::new()
    }
}

type Invoke<T> = Arc<dyn Fn(&T, Arguments) -> Result<Instance, BoxError> + Send + Sync>;

/// A named method with injectable parameters.
pub struct MethodDescriptor<T> {
    name: &'static str,
    parameters: Vec<Parameter>,
    invoke: Invoke<T>,
}

impl<T: Injectable> MethodDescriptor<T> {
    pub fn new<F, R>(name: &'static str, parameters: Vec<Parameter>, f: F) -> Self
    where
        F: Fn(&T, Arguments) -> Result<R, BoxError> + Send + Sync + 'static,
        R: Any + Send + Sync,
    {
        let invoke: Invoke<T> =
            Arc::new(move |this: &T, args: Arguments| f(this, args).map(|r| Arc::new(r) as Instance));
        Self { name, parameters, invoke }
    }
}

// ── Erased descriptors ────────────────────────────────────────────────────────

type Constructor = Arc<dyn Fn(Arguments) -> Result<Instance, BoxError> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct ErasedMethod {
    pub(crate) parameters: Arc<[Parameter]>,
    pub(crate) invoke: Invoke<Instance>,
}

/// Everything the container knows about one type.
#[derive(Clone)]
pub struct TypeDescriptor {
    identifier: &'static str,
    type_name: &'static str,
    parameters: Arc<[Parameter]>,
    constructor: Option<Constructor>,
    methods: HashMap<&'static str, ErasedMethod>,
}

impl TypeDescriptor {
    pub fn of<T: Injectable>() -> Self {
        let methods = T::methods()
            .into_iter()
            .map(|m| {
                let inner = m.invoke;
                let invoke: Invoke<Instance> = Arc::new(move |instance: &Instance, args: Arguments| {
                    let this = instance.downcast_ref::<T>().ok_or_else(|| {
                        BoxError::from(format!("instance is not a `{}`", type_name::<T>()))
                    })?;
                    inner(this, args)
                });
                (m.name, ErasedMethod { parameters: m.parameters.into(), invoke })
            })
            .collect();

        Self {
            identifier: T::identifier(),
            type_name: type_name::<T>(),
            parameters: T::parameters().into(),
            constructor: Some(Arc::new(|args| T::construct(args).map(|v| Arc::new(v) as Instance))),
            methods,
        }
    }

    /// A known identifier with no way to build it, like an interface name.
    /// `has` reports it; `get` fails with a resolution error unless a
    /// definition binds it to something concrete.
    pub fn abstract_type(identifier: &'static str) -> Self {
        Self {
            identifier,
            type_name: identifier,
            parameters: Arc::from(Vec::new()),
            constructor: None,
            methods: HashMap::new(),
        }
    }

    pub fn identifier(&self) -> &'static str { self.identifier }
    pub fn type_name(&self) -> &'static str { self.type_name }
    pub fn parameters(&self) -> &[Parameter] { &self.parameters }
    pub fn is_instantiable(&self) -> bool { self.constructor.is_some() }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub(crate) fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    pub(crate) fn method(&self, name: &str) -> Option<&ErasedMethod> {
        self.methods.get(name)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("identifier", &self.identifier)
            .field("type_name", &self.type_name)
            .field("parameters", &self.parameters)
            .field("instantiable", &self.is_instantiable())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mailer {
        host: String,
        port: u16,
    }

    impl Injectable for Mailer {
        fn identifier() -> &'static str { "mailer" }

        fn parameters() -> Vec<Parameter> {
            vec![
                Parameter::value("host").with_default(String::from("localhost")),
                Parameter::value("port").with_default(25u16),
            ]
        }

        fn construct(mut args: Arguments) -> Result<Self, BoxError> {
            Ok(Self { host: args.take_value()?, port: args.take_value()? })
        }

        fn methods() -> Vec<MethodDescriptor<Self>> {
            vec![MethodDescriptor::new("address", Vec::new(), |this: &Self, _args| {
                Ok(format!("{}:{}", this.host, this.port))
            })]
        }
    }

    #[test]
    fn descriptor_captures_parameters_and_methods() {
        let descriptor = TypeDescriptor::of::<Mailer>();
        assert_eq!(descriptor.identifier(), "mailer");
        assert!(descriptor.is_instantiable());
        assert!(descriptor.has_method("address"));
        assert!(!descriptor.has_method("boot"));

        let names: Vec<_> = descriptor.parameters().iter().map(Parameter::name).collect();
        assert_eq!(names, ["host", "port"]);
    }

    #[test]
    fn arguments_check_types_and_arity() {
        let mut args = Arguments::new("mailer", vec![("port", Some(Arc::new(25u16) as Instance)), ("tls", None)]);

        let err = args.take::<String>().unwrap_err();
        assert!(err.to_string().contains("argument `port` is not a `alloc::string::String`"));

        assert!(args.take_optional::<bool>().unwrap().is_none());
        assert!(args.take::<bool>().is_err());
    }

    #[test]
    fn abstract_types_are_not_instantiable() {
        let descriptor = TypeDescriptor::abstract_type("Emitter");
        assert!(!descriptor.is_instantiable());
        assert!(descriptor.parameters().is_empty());
    }
}
