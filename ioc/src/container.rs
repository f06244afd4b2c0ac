//! The main `Container` struct and its associated methods.

use crate::compiler::PlanCompiler;
use crate::config::{ContainerBuilder, ContainerConfig};
use crate::core::{Instance, ServiceKey, ServiceType};
use crate::descriptor::{FactoryDescriptor, FactoryId};
use crate::error::{Error, Result};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::plan::RealizeContext;
use crate::plan_cache::PlanCache;
use crate::registry::Registry;
use crate::request::{IfUnresolved, ResolutionRequest};
use crate::reuse::{ReuseSlots, ScopeState};
use crate::scope::Scope;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// The dependency-injection container.
///
/// Holds the registrations, the compiled-plan cache and the singleton store.
/// It is thread-safe: registration and resolution take `&self`, so a
/// container can be shared by reference or through an `Arc`.
pub struct Container {
  config: ContainerConfig,
  registry: Registry,
  plans: PlanCache,
  singletons: ReuseSlots,
  metrics: Metrics,
}

impl Default for Container {
  fn default() -> Self {
    Self::with_config(ContainerConfig::default())
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("config", &self.config)
      .field("registrations", &self.registry.descriptors().len())
      .field("cached_plans", &self.plans.len())
      .field("singletons", &self.singletons.len())
      .finish()
  }
}

impl Container {
  /// Creates a new, empty `Container` with default options.
  pub fn new() -> Self {
    Self::default()
  }

  pub fn builder() -> ContainerBuilder {
    ContainerBuilder::new()
  }

  pub fn with_config(config: ContainerConfig) -> Self {
    Self {
      registry: Registry::new(config.duplicate_policy),
      plans: PlanCache::default(),
      singletons: ReuseSlots::new("container"),
      metrics: Metrics::default(),
      config,
    }
  }

  pub fn config(&self) -> &ContainerConfig {
    &self.config
  }

  // --- PRIVATE HELPERS ---

  fn invalidate_plans(&self) {
    tracing::debug!(cached = self.plans.len(), "invalidating plan cache");
    self.plans.invalidate();
    self.metrics.cache_invalidations.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn resolve_in(
    &self,
    scope: Option<&ScopeState>,
    service_type: ServiceType,
    key: Option<ServiceKey>,
    if_unresolved: IfUnresolved,
  ) -> Result<Option<Instance>> {
    self.singletons.ensure_live()?;
    if let Some(scope) = scope {
      scope.slots.ensure_live()?;
    }
    self.metrics.resolutions.fetch_add(1, Ordering::Relaxed);

    let request = ResolutionRequest::root(
      service_type,
      key,
      if_unresolved,
      self.config.max_resolution_depth,
    );
    let ctx = RealizeContext {
      singletons: &self.singletons,
      scope,
      metrics: &self.metrics,
    };
    let outcome = PlanCompiler::new(&self.registry, &self.plans, &self.metrics)
      .compile(&request)
      .and_then(|compiled| compiled.plan.realize(&ctx));

    match (outcome, if_unresolved) {
      (Ok(Some(instance)), _) => Ok(Some(instance)),
      (Ok(None), IfUnresolved::ReturnDefault) => Ok(None),
      (Ok(None), IfUnresolved::Throw) => Err(Error::NullFactoryResult {
        service: request.injection_key().to_string(),
      }),
      (Err(err), IfUnresolved::ReturnDefault) if err.is_unresolved() => {
        tracing::trace!(service = %service_type, error = %err, "resolved to default");
        Ok(None)
      }
      (Err(err), _) => Err(err),
    }
  }

  pub(crate) fn resolve_typed<T: ?Sized + Any + Send + Sync>(
    &self,
    scope: Option<&ScopeState>,
    key: Option<ServiceKey>,
    if_unresolved: IfUnresolved,
  ) -> Result<Option<Arc<T>>> {
    let Some(instance) = self.resolve_in(scope, ServiceType::of::<T>(), key, if_unresolved)? else {
      return Ok(None);
    };
    instance
      .downcast::<T>()
      .map(Some)
      .ok_or(Error::ServiceNotAssignableFromFactoryMethod {
        service: std::any::type_name::<T>(),
        implementation: instance.service_type().name(),
        method: "resolve",
      })
  }

  // --- PUBLIC API ---

  // --- Registration ---

  /// Adds a descriptor, replacing any registration under the same
  /// (service type, key) unless duplicates are rejected.
  ///
  /// Every successful registration clears the plan cache.
  pub fn register(&self, descriptor: FactoryDescriptor) -> Result<FactoryId> {
    let descriptor = self.registry.register(descriptor)?;
    tracing::debug!(
      service = %descriptor.service_type,
      key = ?descriptor.key,
      kind = ?descriptor.creation_kind,
      reuse = ?descriptor.reuse,
      id = descriptor.id.0,
      "registered factory"
    );
    self.invalidate_plans();
    Ok(descriptor.id)
  }

  /// Registers a batch of descriptors, e.g. the output of a scanner.
  /// Stops at the first failure; earlier descriptors stay registered.
  pub fn register_all(
    &self,
    descriptors: impl IntoIterator<Item = FactoryDescriptor>,
  ) -> Result<Vec<FactoryId>> {
    descriptors.into_iter().map(|d| self.register(d)).collect()
  }

  /// Removes the registration of `T` under `key`. Returns whether one existed.
  pub fn unregister<T: ?Sized + Any>(&self, key: Option<&str>) -> bool {
    let key = key.map(ServiceKey::from);
    let removed = self.registry.unregister(ServiceType::of::<T>(), key.as_ref());
    if removed.is_some() {
      tracing::debug!(service = %ServiceType::of::<T>(), key = ?key, "unregistered factory");
      self.invalidate_plans();
    }
    removed.is_some()
  }

  /// Declares that an `I` can be used wherever an `S` is requested.
  ///
  /// This is what allows a factory whose declared product is `I` to be
  /// registered as service `S`:
  ///
  /// ```
  /// use fibre_di::{Container, FactoryDescriptor};
  /// use std::sync::Arc;
  ///
  /// trait Greeter: Send + Sync { fn greet(&self) -> String; }
  /// struct English;
  /// impl Greeter for English { fn greet(&self) -> String { "Hello!".into() } }
  ///
  /// let container = Container::new();
  /// container.declare_assignable::<English, dyn Greeter>(|e| e);
  /// container
  ///   .register(FactoryDescriptor::constructor(|_| English).service::<dyn Greeter>())
  ///   .unwrap();
  ///
  /// assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "Hello!");
  /// ```
  pub fn declare_assignable<I, S>(&self, cast: impl Fn(Arc<I>) -> Arc<S> + Send + Sync + 'static)
  where
    I: ?Sized + Any + Send + Sync,
    S: ?Sized + Any + Send + Sync,
  {
    self.registry.declare_assignable(cast);
    self.invalidate_plans();
  }

  pub fn is_registered<T: ?Sized + Any>(&self, key: Option<&str>) -> bool {
    let key = key.map(ServiceKey::from);
    self.registry.contains(ServiceType::of::<T>(), key.as_ref())
  }

  /// All registered descriptors, oldest first.
  pub fn descriptors(&self) -> Vec<Arc<FactoryDescriptor>> {
    self.registry.descriptors()
  }

  // --- Resolution ---

  /// Resolves the default registration of `T`.
  pub fn resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.resolve_required(None)
  }

  /// Resolves the registration of `T` under `key`.
  pub fn resolve_keyed<T: ?Sized + Any + Send + Sync>(
    &self,
    key: impl Into<ServiceKey>,
  ) -> Result<Arc<T>> {
    self.resolve_required(Some(key.into()))
  }

  /// Resolves `T`, returning `Ok(None)` if it, or one of its dependencies,
  /// is not registered. Other failures are still errors.
  pub fn try_resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Option<Arc<T>>> {
    self.resolve_typed(None, None, IfUnresolved::ReturnDefault)
  }

  /// The general form of resolution.
  pub fn resolve_with<T: ?Sized + Any + Send + Sync>(
    &self,
    key: Option<ServiceKey>,
    if_unresolved: IfUnresolved,
  ) -> Result<Option<Arc<T>>> {
    self.resolve_typed(None, key, if_unresolved)
  }

  /// Untyped resolution by runtime service type.
  pub fn resolve_instance(
    &self,
    service_type: ServiceType,
    key: Option<ServiceKey>,
    if_unresolved: IfUnresolved,
  ) -> Result<Option<Instance>> {
    self.resolve_in(None, service_type, key, if_unresolved)
  }

  fn resolve_required<T: ?Sized + Any + Send + Sync>(&self, key: Option<ServiceKey>) -> Result<Arc<T>> {
    let key_for_error = key.clone();
    self
      .resolve_typed(None, key, IfUnresolved::Throw)?
      .ok_or_else(|| Error::NullFactoryResult {
        service: crate::core::InjectionKey::new(ServiceType::of::<T>(), key_for_error).to_string(),
      })
  }

  /// Every registered implementation of `T`, in registration order.
  ///
  /// Nothing is resolved until the sequence is iterated, and each iteration
  /// resolves again, honouring reuse policies.
  pub fn resolve_many<T: ?Sized + Any + Send + Sync>(&self) -> ResolveMany<'_, T> {
    ResolveMany::new(self, None)
  }

  /// Opens a scope named `name`. Services registered with
  /// `Reuse::ScopedTo(name)` are shared within it and disposed with it.
  pub fn open_scope(&self, name: impl Into<String>) -> Scope<'_> {
    Scope::open(self, name.into(), None)
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }

  /// Runs the disposal hooks of every singleton, newest first, and refuses
  /// further resolution. Also happens when the container is dropped.
  pub fn dispose(&self) {
    let ran = self.singletons.dispose();
    self.plans.invalidate();
    tracing::debug!(hooks = ran, "container disposed");
  }

  pub fn is_disposed(&self) -> bool {
    self.singletons.is_disposed()
  }

  // --- Shortcut registration ---

  fn add_instance_internal<T: Any + Send + Sync>(&self, name: Option<&str>, instance: T) -> Result<FactoryId> {
    let shared = Arc::new(instance);
    let descriptor = FactoryDescriptor::static_method(std::any::type_name::<T>(), move |_| shared.clone());
    self.register(with_name(descriptor.singleton(), name))
  }

  fn add_singleton_internal<T: Any + Send + Sync>(
    &self,
    name: Option<&str>,
    factory: impl Fn() -> T + Send + Sync + 'static,
  ) -> Result<FactoryId> {
    let descriptor = FactoryDescriptor::constructor(move |_| factory()).singleton();
    self.register(with_name(descriptor, name))
  }

  fn add_transient_internal<T: Any + Send + Sync>(
    &self,
    name: Option<&str>,
    factory: impl Fn() -> T + Send + Sync + 'static,
  ) -> Result<FactoryId> {
    self.register(with_name(FactoryDescriptor::constructor(move |_| factory()), name))
  }

  fn add_singleton_trait_internal<I: ?Sized + Any + Send + Sync>(
    &self,
    name: Option<&str>,
    factory: impl Fn() -> Arc<I> + Send + Sync + 'static,
  ) -> Result<FactoryId> {
    let descriptor =
      FactoryDescriptor::static_method(std::any::type_name::<I>(), move |_| factory()).singleton();
    self.register(with_name(descriptor, name))
  }

  // --- Instance Registration ---
  pub fn add_instance<T: Any + Send + Sync>(&self, instance: T) -> Result<FactoryId> {
    self.add_instance_internal(None, instance)
  }
  pub fn add_instance_with_name<T: Any + Send + Sync>(&self, name: &str, instance: T) -> Result<FactoryId> {
    self.add_instance_internal(Some(name), instance)
  }

  // --- Singleton Registration ---
  pub fn add_singleton<T: Any + Send + Sync>(
    &self,
    factory: impl Fn() -> T + Send + Sync + 'static,
  ) -> Result<FactoryId> {
    self.add_singleton_internal(None, factory)
  }
  pub fn add_singleton_with_name<T: Any + Send + Sync>(
    &self,
    name: &str,
    factory: impl Fn() -> T + Send + Sync + 'static,
  ) -> Result<FactoryId> {
    self.add_singleton_internal(Some(name), factory)
  }

  // --- Transient Registration ---
  pub fn add_transient<T: Any + Send + Sync>(
    &self,
    factory: impl Fn() -> T + Send + Sync + 'static,
  ) -> Result<FactoryId> {
    self.add_transient_internal(None, factory)
  }
  pub fn add_transient_with_name<T: Any + Send + Sync>(
    &self,
    name: &str,
    factory: impl Fn() -> T + Send + Sync + 'static,
  ) -> Result<FactoryId> {
    self.add_transient_internal(Some(name), factory)
  }

  // --- Trait Registration ---
  pub fn add_singleton_trait<I: ?Sized + Any + Send + Sync>(
    &self,
    factory: impl Fn() -> Arc<I> + Send + Sync + 'static,
  ) -> Result<FactoryId> {
    self.add_singleton_trait_internal(None, factory)
  }
  pub fn add_singleton_trait_with_name<I: ?Sized + Any + Send + Sync>(
    &self,
    name: &str,
    factory: impl Fn() -> Arc<I> + Send + Sync + 'static,
  ) -> Result<FactoryId> {
    self.add_singleton_trait_internal(Some(name), factory)
  }

  /// Resolves a service by optional name, returning `Ok(None)` when it is
  /// not registered. Every other failure is returned as an error.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self, name: Option<&str>) -> Result<Option<Arc<T>>> {
    self.resolve_with::<T>(name.map(ServiceKey::from), IfUnresolved::ReturnDefault)
  }
}

impl Drop for Container {
  fn drop(&mut self) {
    self.singletons.dispose();
  }
}

fn with_name(descriptor: FactoryDescriptor, name: Option<&str>) -> FactoryDescriptor {
  match name {
    Some(name) => descriptor.key(name),
    None => descriptor,
  }
}

/// A lazy, restartable sequence of every implementation of `T`.
///
/// Iterating takes a snapshot of the current registrations and resolves each
/// one as it is reached. Iterating again resolves again.
pub struct ResolveMany<'a, T: ?Sized> {
  container: &'a Container,
  scope: Option<&'a ScopeState>,
  _marker: PhantomData<fn() -> Arc<T>>,
}

impl<'a, T: ?Sized + Any + Send + Sync> ResolveMany<'a, T> {
  pub(crate) fn new(container: &'a Container, scope: Option<&'a ScopeState>) -> Self {
    Self {
      container,
      scope,
      _marker: PhantomData,
    }
  }

  pub fn iter(&self) -> ResolveManyIter<'a, T> {
    let keys = self
      .container
      .registry
      .lookup_many(ServiceType::of::<T>())
      .iter()
      .map(|d| d.key.clone())
      .collect::<Vec<_>>();
    ResolveManyIter {
      container: self.container,
      scope: self.scope,
      keys: keys.into_iter(),
      _marker: PhantomData,
    }
  }

  /// Resolves everything, failing on the first error.
  pub fn collect_all(&self) -> Result<Vec<Arc<T>>> {
    self.iter().collect()
  }
}

impl<'a, T: ?Sized + Any + Send + Sync> IntoIterator for &ResolveMany<'a, T> {
  type Item = Result<Arc<T>>;
  type IntoIter = ResolveManyIter<'a, T>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

pub struct ResolveManyIter<'a, T: ?Sized> {
  container: &'a Container,
  scope: Option<&'a ScopeState>,
  keys: std::vec::IntoIter<Option<ServiceKey>>,
  _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Any + Send + Sync> Iterator for ResolveManyIter<'_, T> {
  type Item = Result<Arc<T>>;

  fn next(&mut self) -> Option<Self::Item> {
    let key = self.keys.next()?;
    let resolved = self
      .container
      .resolve_typed::<T>(self.scope, key.clone(), IfUnresolved::Throw)
      .and_then(|found| {
        found.ok_or_else(|| Error::NullFactoryResult {
          service: crate::core::InjectionKey::new(ServiceType::of::<T>(), key).to_string(),
        })
      });
    Some(resolved)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    self.keys.size_hint()
  }
}
