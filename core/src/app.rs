//! The application contract and the adapter that normalizes its two variants.
//!
//! # Design
//! An application either takes the scope, source and sink in one call
//! (`Application`, the unified convention) or is first instantiated with the
//! scope and then run with the source and sink (`Factory` + `Instance`, the
//! two-phase convention). Which one a value follows is decided once, when the
//! client is built, by the trait it implements: `IntoContract` is implemented
//! for every `Application` under the `Unified` marker and for every `Factory`
//! under the `TwoPhase` marker. A type implementing both is ambiguous and
//! must be wrapped in `AppContract::Unified` or `AppContract::TwoPhase`
//! by hand.
//!
//! The drivers only ever see `Arc<dyn Application>`; two-phase values are
//! wrapped in an adapter that instantiates on call and forwards the source
//! and sink to the instance.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};

use crate::channel::{Receiver, Sender};
use crate::types::Scope;

/// Unified convention: one call with descriptor, source and sink.
pub trait Application: Send + Sync + 'static {
    fn call(
        &self,
        scope: Scope,
        receive: Receiver,
        send: Sender,
    ) -> BoxFuture<'static, anyhow::Result<()>>;
}

/// Two-phase convention, first phase: build an instance from the descriptor.
pub trait Factory: Send + Sync + 'static {
    fn instantiate(&self, scope: Scope) -> anyhow::Result<Box<dyn Instance>>;
}

/// Two-phase convention, second phase: run with source and sink.
pub trait Instance: Send + 'static {
    fn run(self: Box<Self>, receive: Receiver, send: Sender) -> BoxFuture<'static, anyhow::Result<()>>;
}

/// An application value after contract detection.
#[derive(Clone)]
pub enum AppContract {
    Unified(Arc<dyn Application>),
    TwoPhase(Arc<dyn Factory>),
}

impl AppContract {
    /// Detect the contract of `app`.
    pub fn detect<A, M>(app: A) -> Self
    where
        A: IntoContract<M>,
    {
        app.into_contract()
    }

    pub fn name(&self) -> &'static str {
        match self {
            AppContract::Unified(_) => "unified",
            AppContract::TwoPhase(_) => "two-phase",
        }
    }

    /// Normalize to the unified convention.
    pub fn into_application(self) -> Arc<dyn Application> {
        match self {
            AppContract::Unified(app) => app,
            AppContract::TwoPhase(factory) => Arc::new(TwoPhaseAdapter { factory }),
        }
    }
}

impl std::fmt::Debug for AppContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AppContract").field(&self.name()).finish()
    }
}

/// Marker types selecting an `IntoContract` implementation.
pub mod marker {
    #[derive(Debug)]
    pub enum Unified {}
    #[derive(Debug)]
    pub enum TwoPhase {}
    #[derive(Debug)]
    pub enum Detected {}
}

/// Conversion of an application value into an `AppContract`.
pub trait IntoContract<M> {
    fn into_contract(self) -> AppContract;
}

impl<T: Application> IntoContract<marker::Unified> for T {
    fn into_contract(self) -> AppContract {
        AppContract::Unified(Arc::new(self))
    }
}

impl<T: Factory> IntoContract<marker::TwoPhase> for T {
    fn into_contract(self) -> AppContract {
        AppContract::TwoPhase(Arc::new(self))
    }
}

impl IntoContract<marker::Detected> for AppContract {
    fn into_contract(self) -> AppContract {
        self
    }
}

struct TwoPhaseAdapter {
    factory: Arc<dyn Factory>,
}

impl Application for TwoPhaseAdapter {
    fn call(
        &self,
        scope: Scope,
        receive: Receiver,
        send: Sender,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        match self.factory.instantiate(scope) {
            Ok(instance) => instance.run(receive, send),
            Err(err) => future::ready(Err(err)).boxed(),
        }
    }
}

/// Unified application built from a closure.
pub struct AppFn<F>(F);

/// Wrap `Fn(Scope, Receiver, Sender) -> impl Future` as an `Application`.
pub fn app_fn<F, Fut>(f: F) -> AppFn<F>
where
    F: Fn(Scope, Receiver, Sender) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    AppFn(f)
}

impl<F, Fut> Application for AppFn<F>
where
    F: Fn(Scope, Receiver, Sender) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn call(
        &self,
        scope: Scope,
        receive: Receiver,
        send: Sender,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        (self.0)(scope, receive, send).boxed()
    }
}

/// Two-phase application built from a closure returning a closure.
pub struct FactoryFn<F>(F);

/// Wrap `Fn(Scope) -> FnOnce(Receiver, Sender) -> impl Future` as a `Factory`.
pub fn factory_fn<F, G, Fut>(f: F) -> FactoryFn<F>
where
    F: Fn(Scope) -> G + Send + Sync + 'static,
    G: FnOnce(Receiver, Sender) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FactoryFn(f)
}

impl<F, G, Fut> Factory for FactoryFn<F>
where
    F: Fn(Scope) -> G + Send + Sync + 'static,
    G: FnOnce(Receiver, Sender) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn instantiate(&self, scope: Scope) -> anyhow::Result<Box<dyn Instance>> {
        Ok(Box::new(InstanceFn((self.0)(scope))))
    }
}

struct InstanceFn<G>(G);

impl<G, Fut> Instance for InstanceFn<G>
where
    G: FnOnce(Receiver, Sender) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn run(self: Box<Self>, receive: Receiver, send: Sender) -> BoxFuture<'static, anyhow::Result<()>> {
        (self.0)(receive, send).boxed()
    }
}
