//! Invoked services: the asynchronous operations a state starts on entry.
//!
//! A service is anything that, given the current context, produces a future
//! resolving to `Ok(value)` or `Err(error)`. Both sides use the machine's
//! payload type because they become event payloads. The interpreter never
//! cancels a running future; it discards results that arrive after their
//! state was exited.

use crate::core::{Context, Payload};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Future returned by a service invocation.
pub type ServiceFuture<P> = BoxFuture<'static, Result<P, P>>;

/// An asynchronous operation that can be invoked by a state.
///
/// Implemented for every `Fn(&C) -> impl Future<Output = Result<P, P>>`
/// closure, so most services are plain closures.
pub trait Service<C: Context, P: Payload>: Send + Sync {
    /// Start one invocation.
    fn invoke(&self, context: &C) -> ServiceFuture<P>;
}

impl<C, P, F, Fut> Service<C, P> for F
where
    C: Context,
    P: Payload,
    F: Fn(&C) -> Fut + Send + Sync,
    Fut: Future<Output = Result<P, P>> + Send + 'static,
{
    fn invoke(&self, context: &C) -> ServiceFuture<P> {
        self(context).boxed()
    }
}

/// Services by `src` identifier, resolved when a machine is built.
pub struct ServiceRegistry<C: Context, P: Payload> {
    services: HashMap<String, Arc<dyn Service<C, P>>>,
}

impl<C: Context, P: Payload> ServiceRegistry<C, P> {
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Register `service` under `src`, replacing any previous entry.
    pub fn register<T>(mut self, src: impl Into<String>, service: T) -> Self
    where
        T: Service<C, P> + 'static,
    {
        self.services.insert(src.into(), Arc::new(service));
        self
    }

    pub fn get(&self, src: &str) -> Option<Arc<dyn Service<C, P>>> {
        self.services.get(src).cloned()
    }

    pub fn contains(&self, src: &str) -> bool {
        self.services.contains_key(src)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl<C: Context, P: Payload> Default for ServiceRegistry<C, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Context, P: Payload> fmt::Debug for ServiceRegistry<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.services.keys().collect();
        names.sort();
        f.debug_struct("ServiceRegistry")
            .field("services", &names)
            .finish()
    }
}
