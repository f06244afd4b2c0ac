//! Named resolution scopes.

use crate::container::{Container, ResolveMany};
use crate::core::{Instance, ServiceKey, ServiceType};
use crate::error::{Error, Result};
use crate::request::IfUnresolved;
use crate::reuse::ScopeState;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A named region of reuse inside a [`Container`].
///
/// Services registered with `Reuse::ScopedTo(name)` are created once per open
/// scope called `name` (the nearest one, when scopes are nested) and disposed
/// when that scope is disposed or dropped. Everything else resolves exactly
/// as it would on the container.
///
/// ```
/// use fibre_di::{Container, FactoryDescriptor};
/// use std::sync::Arc;
///
/// struct RequestId(u32);
///
/// let container = Container::new();
/// container
///   .register(FactoryDescriptor::constructor(|_| RequestId(7)).scoped_to("request"))
///   .unwrap();
///
/// let scope = container.open_scope("request");
/// let a = scope.resolve::<RequestId>().unwrap();
/// let b = scope.resolve::<RequestId>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
pub struct Scope<'c> {
  container: &'c Container,
  state: Arc<ScopeState>,
}

impl<'c> Scope<'c> {
  pub(crate) fn open(container: &'c Container, name: String, parent: Option<Arc<ScopeState>>) -> Self {
    tracing::debug!(scope = %name, nested = parent.is_some(), "opened scope");
    Self {
      container,
      state: Arc::new(ScopeState::new(name, parent)),
    }
  }

  pub fn name(&self) -> &str {
    &self.state.name
  }

  pub fn container(&self) -> &'c Container {
    self.container
  }

  /// Opens a scope nested in this one. Scoped services look for the nearest
  /// enclosing scope with a matching name.
  pub fn open_scope(&self, name: impl Into<String>) -> Scope<'c> {
    Scope::open(self.container, name.into(), Some(self.state.clone()))
  }

  pub fn resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.required(None)
  }

  pub fn resolve_keyed<T: ?Sized + Any + Send + Sync>(
    &self,
    key: impl Into<ServiceKey>,
  ) -> Result<Arc<T>> {
    self.required(Some(key.into()))
  }

  pub fn try_resolve<T: ?Sized + Any + Send + Sync>(&self) -> Result<Option<Arc<T>>> {
    self.resolve_with(None, IfUnresolved::ReturnDefault)
  }

  pub fn resolve_with<T: ?Sized + Any + Send + Sync>(
    &self,
    key: Option<ServiceKey>,
    if_unresolved: IfUnresolved,
  ) -> Result<Option<Arc<T>>> {
    self
      .container
      .resolve_typed(Some(self.state.as_ref()), key, if_unresolved)
  }

  pub fn resolve_instance(
    &self,
    service_type: ServiceType,
    key: Option<ServiceKey>,
    if_unresolved: IfUnresolved,
  ) -> Result<Option<Instance>> {
    self
      .container
      .resolve_in(Some(self.state.as_ref()), service_type, key, if_unresolved)
  }

  pub fn resolve_many<T: ?Sized + Any + Send + Sync>(&self) -> ResolveMany<'_, T> {
    ResolveMany::new(self.container, Some(self.state.as_ref()))
  }

  fn required<T: ?Sized + Any + Send + Sync>(&self, key: Option<ServiceKey>) -> Result<Arc<T>> {
    let service = ServiceType::of::<T>();
    let missing = key.clone();
    self
      .resolve_with::<T>(key, IfUnresolved::Throw)?
      .ok_or_else(|| Error::NullFactoryResult {
        service: crate::core::InjectionKey::new(service, missing).to_string(),
      })
  }

  pub fn is_disposed(&self) -> bool {
    self.state.slots.is_disposed()
  }

  /// Runs the disposal hooks of this scope's instances, newest first.
  /// Dropping the scope does the same.
  pub fn dispose(self) {
    // Drop does the work.
  }
}

impl Drop for Scope<'_> {
  fn drop(&mut self) {
    let ran = self.state.slots.dispose();
    tracing::debug!(scope = %self.state.name, hooks = ran, "disposed scope");
  }
}

impl fmt::Debug for Scope<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Scope")
      .field("name", &self.state.name)
      .field("instances", &self.state.slots.len())
      .field("disposed", &self.is_disposed())
      .finish()
  }
}
