//! Application bootstrap through service providers.
//!
//! A provider registers definitions into the container. Providers that also
//! need to act once every provider has registered (wire routes, warm caches)
//! declare a `boot` method in their [`Injectable::methods`]; it is called
//! through [`Container::call_method`], so its parameters are injected.
//!
//! [`Injectable::methods`]: crate::container::Injectable::methods

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::container::{Container, Instance};
use crate::error::{Error, Result};
use crate::pipeline::RequestHandler;
use crate::resolver::Resolver;
use crate::routing::{Dispatcher, RouteCollector};

/// Name of the optional lifecycle method run after every provider has
/// registered.
pub const BOOT: &str = "boot";

pub trait ServiceProvider: Send + Sync + 'static {
    fn register(&self, container: &Container) -> Result<()>;
}

enum Provider {
    Ready { provider: Arc<dyn ServiceProvider>, instance: Instance },
    Service(String),
}

/// Owns the container and the ordered provider list.
pub struct Application {
    container: Arc<Container>,
    providers: Vec<Provider>,
}

impl Application {
    pub fn new(container: Arc<Container>) -> Self {
        Self { container, providers: Vec::new() }
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Adds a provider value.
    pub fn provider<P: ServiceProvider>(mut self, provider: P) -> Self {
        let provider = Arc::new(provider);
        let instance: Instance = Arc::clone(&provider) as Instance;
        self.providers.push(Provider::Ready { provider, instance });
        self
    }

    /// Adds a provider resolved from the container at boot. The resolved
    /// instance must be viewable as `dyn ServiceProvider`, either stored as
    /// an `Arc<dyn ServiceProvider>` or exposed with
    /// [`Container::expose`].
    pub fn provider_service(mut self, id: impl Into<String>) -> Self {
        self.providers.push(Provider::Service(id.into()));
        self
    }

    /// Registers every provider in order, then boots those that declare a
    /// [`BOOT`] method. A provider given by identifier is resolved right
    /// before its registration, so earlier providers may define it.
    pub fn boot(&self) -> Result<()> {
        let mut registered = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let (provider, instance) = self.materialize(provider)?;
            provider.register(&self.container)?;
            registered.push(instance);
        }
        debug!(providers = registered.len(), "providers registered");

        for instance in registered {
            let bootable = self
                .container
                .descriptor_of(&instance)
                .is_some_and(|descriptor| descriptor.has_method(BOOT));
            if bootable {
                self.container.call_method(instance, BOOT)?;
            }
        }

        info!(providers = self.providers.len(), "application booted");
        Ok(())
    }

    /// Builds the request handler for `routes`, resolving references against
    /// this application's container.
    pub fn request_handler(&self, routes: &RouteCollector) -> Result<RequestHandler> {
        let resolver = Resolver::new(Arc::clone(&self.container));
        Dispatcher::new(routes, resolver).map(RequestHandler::new)
    }

    fn materialize(&self, provider: &Provider) -> Result<(Arc<dyn ServiceProvider>, Instance)> {
        match provider {
            Provider::Ready { provider, instance } => Ok((Arc::clone(provider), Arc::clone(instance))),
            Provider::Service(id) => {
                let instance = self.container.get(id)?;
                let provider = self
                    .container
                    .cast::<dyn ServiceProvider>(&instance)
                    .ok_or_else(|| Error::invalid_reference(id.as_str(), "service is not a service provider"))?;
                Ok((provider, instance))
            }
        }
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("container", &self.container)
            .field("providers", &self.providers.len())
            .finish()
    }
}
