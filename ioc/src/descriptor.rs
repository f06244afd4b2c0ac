//! Factory descriptors: explicit, registration-time recipes for services.
//!
//! A descriptor states how a service is produced (constructor, static method
//! or a method on another resolved object), which parameters that callable
//! takes, how those parameters are bound, and how long the result is reused.

use crate::core::{Instance, ServiceKey, ServiceType};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Identifies a registered descriptor. Assigned by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactoryId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreationKind {
  Constructor,
  StaticFactoryMethod,
  InstanceFactoryMethod,
}

/// How long a produced instance is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Reuse {
  /// A new instance for every resolution.
  #[default]
  Transient,
  /// One instance for the lifetime of the container.
  Singleton,
  /// One instance per open scope with the given name.
  ///
  /// A singleton may not depend on a scoped service, directly or through
  /// transients: it would keep the instance alive after its scope ends.
  /// Such a singleton fails with `ScopedDependencyInSingleton`.
  ScopedTo(String),
}

impl Reuse {
  pub fn scoped_to(name: impl Into<String>) -> Self {
    Reuse::ScopedTo(name.into())
  }

  pub fn is_transient(&self) -> bool {
    matches!(self, Reuse::Transient)
  }
}

/// Where an instance factory method obtains the object it is invoked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerSpec {
  pub service_type: ServiceType,
  pub key: Option<ServiceKey>,
}

/// A registration-time override for one parameter.
#[derive(Debug, Clone)]
pub enum Binding {
  /// Pass this exact value.
  Value(Instance),
  /// Resolve the parameter's declared type under this key.
  Keyed(ServiceKey),
}

impl Binding {
  pub fn value<T: Any + Send + Sync>(value: T) -> Self {
    Binding::Value(Instance::new(Arc::new(value)))
  }

  pub fn shared<T: ?Sized + Any + Send + Sync>(value: Arc<T>) -> Self {
    Binding::Value(Instance::new(value))
  }

  pub fn keyed(key: impl Into<ServiceKey>) -> Self {
    Binding::Keyed(key.into())
  }
}

/// Selects the parameter a [`Binding`] applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSelector {
  Position(usize),
  Name(String),
}

impl From<usize> for ParamSelector {
  fn from(position: usize) -> Self {
    ParamSelector::Position(position)
  }
}

impl From<&str> for ParamSelector {
  fn from(name: &str) -> Self {
    ParamSelector::Name(name.to_owned())
  }
}

/// One declared parameter of a constructor or factory method.
#[derive(Debug, Clone)]
pub struct Parameter {
  pub(crate) name: &'static str,
  pub(crate) ty: ServiceType,
  pub(crate) key: Option<ServiceKey>,
  pub(crate) default: Option<Instance>,
  pub(crate) optional: bool,
}

impl Parameter {
  /// A required parameter of type `T`, resolved from the container.
  pub fn of<T: ?Sized + Any>(name: &'static str) -> Self {
    Self {
      name,
      ty: ServiceType::of::<T>(),
      key: None,
      default: None,
      optional: false,
    }
  }

  /// Resolves the parameter under `key` instead of the default registration.
  pub fn keyed(mut self, key: impl Into<ServiceKey>) -> Self {
    self.key = Some(key.into());
    self
  }

  /// Allows the parameter to be absent when nothing is registered for it.
  pub fn optional(mut self) -> Self {
    self.optional = true;
    self
  }

  /// Value used when nothing is registered for the parameter's type.
  pub fn with_default<T: Any + Send + Sync>(mut self, value: T) -> Self {
    self.default = Some(Instance::new(Arc::new(value)));
    self
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn service_type(&self) -> ServiceType {
    self.ty
  }

  pub(crate) fn tolerates_absence(&self) -> bool {
    self.optional || self.default.is_some()
  }
}

/// The bound argument values handed to a constructor or factory method.
pub struct Arguments {
  values: Vec<Option<Instance>>,
  names: Vec<&'static str>,
}

impl Arguments {
  pub(crate) fn new(values: Vec<Option<Instance>>, names: Vec<&'static str>) -> Self {
    Self { values, names }
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// Returns the argument at `index`.
  ///
  /// # Panics
  ///
  /// Panics if the index is out of range, the argument is absent, or it is
  /// not a `T`. All three are mistakes in the descriptor's callable, since
  /// parameter types are checked before the callable runs.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self, index: usize) -> Arc<T> {
    self.try_get(index).unwrap_or_else(|| {
      panic!(
        "argument {} is not a present {}",
        index,
        std::any::type_name::<T>()
      )
    })
  }

  /// Returns the argument at `index`, or `None` if it is absent.
  pub fn try_get<T: ?Sized + Any + Send + Sync>(&self, index: usize) -> Option<Arc<T>> {
    self.values.get(index)?.as_ref()?.downcast::<T>()
  }

  pub fn by_name<T: ?Sized + Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
    let index = self.names.iter().position(|n| *n == name)?;
    self.try_get(index)
  }
}

pub(crate) type CreateFn = dyn Fn(&Arguments) -> Option<Instance> + Send + Sync;
pub(crate) type InvokeFn = dyn Fn(&Instance, &Arguments) -> Option<Instance> + Send + Sync;
pub(crate) type DisposeFn = dyn Fn(&Instance) + Send + Sync;

#[derive(Clone)]
pub(crate) enum Callable {
  Create(Arc<CreateFn>),
  Invoke(Arc<InvokeFn>),
}

/// A registered recipe for producing one service.
#[derive(Clone)]
pub struct FactoryDescriptor {
  pub(crate) id: FactoryId,
  pub(crate) service_type: ServiceType,
  pub(crate) implementation_type: ServiceType,
  pub(crate) creation_kind: CreationKind,
  pub(crate) owner: Option<OwnerSpec>,
  pub(crate) method: &'static str,
  pub(crate) parameters: Vec<Parameter>,
  pub(crate) bindings: Vec<(ParamSelector, Binding)>,
  pub(crate) reuse: Reuse,
  pub(crate) key: Option<ServiceKey>,
  pub(crate) nullable: bool,
  pub(crate) disposer: Option<Arc<DisposeFn>>,
  pub(crate) callable: Callable,
}

impl FactoryDescriptor {
  fn with_callable(
    implementation_type: ServiceType,
    creation_kind: CreationKind,
    method: &'static str,
    callable: Callable,
  ) -> Self {
    Self {
      id: FactoryId(0),
      service_type: implementation_type,
      implementation_type,
      creation_kind,
      owner: None,
      method,
      parameters: Vec::new(),
      bindings: Vec::new(),
      reuse: Reuse::Transient,
      key: None,
      nullable: false,
      disposer: None,
      callable,
    }
  }

  /// Produces `T` by calling a constructor function.
  pub fn constructor<T: Any + Send + Sync>(
    ctor: impl Fn(&Arguments) -> T + Send + Sync + 'static,
  ) -> Self {
    Self::with_callable(
      ServiceType::of::<T>(),
      CreationKind::Constructor,
      std::any::type_name::<T>(),
      Callable::Create(Arc::new(move |args: &Arguments| {
        Some(Instance::new(Arc::new(ctor(args))))
      })),
    )
  }

  /// Produces `R` by calling a free or associated function.
  pub fn static_method<R: ?Sized + Any + Send + Sync>(
    method: &'static str,
    f: impl Fn(&Arguments) -> Arc<R> + Send + Sync + 'static,
  ) -> Self {
    Self::with_callable(
      ServiceType::of::<R>(),
      CreationKind::StaticFactoryMethod,
      method,
      Callable::Create(Arc::new(move |args: &Arguments| Some(Instance::new(f(args))))),
    )
  }

  /// Like [`static_method`](Self::static_method), for a method that may produce nothing.
  pub fn static_method_nullable<R: ?Sized + Any + Send + Sync>(
    method: &'static str,
    f: impl Fn(&Arguments) -> Option<Arc<R>> + Send + Sync + 'static,
  ) -> Self {
    let mut descriptor = Self::with_callable(
      ServiceType::of::<R>(),
      CreationKind::StaticFactoryMethod,
      method,
      Callable::Create(Arc::new(move |args: &Arguments| f(args).map(Instance::new))),
    );
    descriptor.nullable = true;
    descriptor
  }

  /// Produces `R` by calling a method on a resolved `O`.
  ///
  /// The owner is resolved as the default registration of `O`; use
  /// [`owner_key`](Self::owner_key) to pick a keyed one.
  pub fn instance_method<O: ?Sized + Any + Send + Sync, R: ?Sized + Any + Send + Sync>(
    method: &'static str,
    f: impl Fn(&O, &Arguments) -> Arc<R> + Send + Sync + 'static,
  ) -> Self {
    Self::instance_method_nullable::<O, R>(method, move |owner, args| Some(f(owner, args)))
      .not_nullable()
  }

  /// Like [`instance_method`](Self::instance_method), for a method that may produce nothing.
  pub fn instance_method_nullable<O: ?Sized + Any + Send + Sync, R: ?Sized + Any + Send + Sync>(
    method: &'static str,
    f: impl Fn(&O, &Arguments) -> Option<Arc<R>> + Send + Sync + 'static,
  ) -> Self {
    let invoke = move |owner: &Instance, args: &Arguments| {
      let owner = owner.downcast::<O>()?;
      f(&owner, args).map(Instance::new)
    };
    let mut descriptor = Self::with_callable(
      ServiceType::of::<R>(),
      CreationKind::InstanceFactoryMethod,
      method,
      Callable::Invoke(Arc::new(invoke)),
    );
    descriptor.owner = Some(OwnerSpec {
      service_type: ServiceType::of::<O>(),
      key: None,
    });
    descriptor.nullable = true;
    descriptor
  }

  fn not_nullable(mut self) -> Self {
    self.nullable = false;
    self
  }

  // --- Builder ---

  /// Exposes the product as service type `S` instead of its declared type.
  ///
  /// The two types must be related through
  /// [`Container::declare_assignable`](crate::Container::declare_assignable);
  /// this is checked when the plan is compiled.
  pub fn service<S: ?Sized + Any>(mut self) -> Self {
    self.service_type = ServiceType::of::<S>();
    self
  }

  pub fn key(mut self, key: impl Into<ServiceKey>) -> Self {
    self.key = Some(key.into());
    self
  }

  pub fn reuse(mut self, reuse: Reuse) -> Self {
    self.reuse = reuse;
    self
  }

  pub fn singleton(self) -> Self {
    self.reuse(Reuse::Singleton)
  }

  pub fn scoped_to(self, scope: impl Into<String>) -> Self {
    self.reuse(Reuse::ScopedTo(scope.into()))
  }

  /// Appends the next parameter of the callable's signature.
  pub fn param(mut self, parameter: Parameter) -> Self {
    self.parameters.push(parameter);
    self
  }

  /// Fixes a parameter's argument at registration time.
  pub fn bind(mut self, selector: impl Into<ParamSelector>, binding: Binding) -> Self {
    self.bindings.push((selector.into(), binding));
    self
  }

  /// Resolves the factory owner under `key`. Ignored for other creation kinds.
  pub fn owner_key(mut self, key: impl Into<ServiceKey>) -> Self {
    if let Some(owner) = self.owner.as_mut() {
      owner.key = Some(key.into());
    }
    self
  }

  /// Runs `dispose` when the owning scope or container ends.
  ///
  /// Only reused instances are tracked; transients belong to the caller.
  pub fn dispose_with<T: ?Sized + Any + Send + Sync>(
    mut self,
    dispose: impl Fn(&T) + Send + Sync + 'static,
  ) -> Self {
    self.disposer = Some(Arc::new(move |instance: &Instance| {
      if let Some(value) = instance.downcast::<T>() {
        dispose(&value);
      }
    }));
    self
  }

  // --- Accessors ---

  pub fn id(&self) -> FactoryId {
    self.id
  }

  pub fn service_type(&self) -> ServiceType {
    self.service_type
  }

  pub fn implementation_type(&self) -> ServiceType {
    self.implementation_type
  }

  pub fn creation_kind(&self) -> CreationKind {
    self.creation_kind
  }

  pub fn service_key(&self) -> Option<&ServiceKey> {
    self.key.as_ref()
  }

  pub fn reuse_policy(&self) -> &Reuse {
    &self.reuse
  }

  pub fn owner(&self) -> Option<&OwnerSpec> {
    self.owner.as_ref()
  }

  pub fn method_name(&self) -> &'static str {
    self.method
  }

  pub fn parameters(&self) -> &[Parameter] {
    &self.parameters
  }

  /// Whether the callable is allowed to produce nothing.
  pub fn is_nullable(&self) -> bool {
    self.nullable
  }

  pub(crate) fn binding_for(&self, position: usize, name: &str) -> Option<&Binding> {
    let by_position = self.bindings.iter().find(|(selector, _)| {
      matches!(selector, ParamSelector::Position(p) if *p == position)
    });
    let by_name = || {
      self
        .bindings
        .iter()
        .find(|(selector, _)| matches!(selector, ParamSelector::Name(n) if n == name))
    };
    by_position.or_else(by_name).map(|(_, binding)| binding)
  }
}

impl fmt::Debug for FactoryDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FactoryDescriptor")
      .field("id", &self.id)
      .field("service_type", &self.service_type)
      .field("implementation_type", &self.implementation_type)
      .field("creation_kind", &self.creation_kind)
      .field("method", &self.method)
      .field("key", &self.key)
      .field("reuse", &self.reuse)
      .field("nullable", &self.nullable)
      .field("parameters", &self.parameters.len())
      .finish_non_exhaustive()
  }
}
