//! Type identity, service keys and type-erased instances.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// The runtime identity of a service type.
///
/// Works for sized types and for trait objects (`dyn Trait`). The type name
/// is carried only for diagnostics; equality and hashing use the `TypeId`.
#[derive(Clone, Copy)]
pub struct ServiceType {
  id: TypeId,
  name: &'static str,
}

impl ServiceType {
  pub fn of<T: ?Sized + Any>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: std::any::type_name::<T>(),
    }
  }

  pub fn type_id(&self) -> TypeId {
    self.id
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn is<T: ?Sized + Any>(&self) -> bool {
    self.id == TypeId::of::<T>()
  }
}

impl PartialEq for ServiceType {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for ServiceType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ServiceType({})", self.name)
  }
}

impl fmt::Display for ServiceType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

/// Discriminates several registrations of the same service type.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey(Arc<str>);

impl ServiceKey {
  pub fn new(key: impl AsRef<str>) -> Self {
    Self(Arc::from(key.as_ref()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for ServiceKey {
  fn from(key: &str) -> Self {
    Self::new(key)
  }
}

impl From<String> for ServiceKey {
  fn from(key: String) -> Self {
    Self(Arc::from(key))
  }
}

impl From<&String> for ServiceKey {
  fn from(key: &String) -> Self {
    Self::new(key)
  }
}

impl fmt::Debug for ServiceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}", &*self.0)
  }
}

impl fmt::Display for ServiceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A (service type, optional key) pair: the address of a registration.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct InjectionKey {
  pub(crate) service_type: ServiceType,
  pub(crate) key: Option<ServiceKey>,
}

impl InjectionKey {
  pub(crate) fn new(service_type: ServiceType, key: Option<ServiceKey>) -> Self {
    Self { service_type, key }
  }
}

impl fmt::Debug for InjectionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.key {
      Some(key) => write!(f, "Key({}, Name({}))", self.service_type, key),
      None => write!(f, "Key({})", self.service_type),
    }
  }
}

impl fmt::Display for InjectionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.key {
      Some(key) => write!(f, "{} (key {:?})", self.service_type, key.as_str()),
      None => write!(f, "{}", self.service_type),
    }
  }
}

/// A type-erased, shareable service value.
///
/// The payload is always an `Arc<T>` boxed as `dyn Any`, where `T` is the
/// type the instance is exposed as. Storing the `Arc<T>` rather than `T`
/// is what lets trait objects travel through the container.
#[derive(Clone)]
pub struct Instance {
  value: Arc<dyn Any + Send + Sync>,
  ty: ServiceType,
}

impl Instance {
  pub fn new<T: ?Sized + Any + Send + Sync>(value: Arc<T>) -> Self {
    Self {
      value: Arc::new(value),
      ty: ServiceType::of::<T>(),
    }
  }

  /// The type this instance is exposed as.
  pub fn service_type(&self) -> ServiceType {
    self.ty
  }

  pub fn downcast<T: ?Sized + Any + Send + Sync>(&self) -> Option<Arc<T>> {
    self.value.downcast_ref::<Arc<T>>().cloned()
  }

  /// True when both instances share the same underlying allocation.
  pub fn ptr_eq(&self, other: &Instance) -> bool {
    Arc::ptr_eq(&self.value, &other.value)
  }
}

impl fmt::Debug for Instance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Instance").field("type", &self.ty.name()).finish()
  }
}
