// ioc/tests/macros.rs

//! Tests specifically for the resolution macros.
//! This file verifies the behavior of `resolve!` and `maybe_resolve!`
//! against both a `Container` and a `Scope`.

use fibre_di::{maybe_resolve, resolve, Container, ErrorKind, FactoryDescriptor, Parameter};
use std::sync::Arc;

// --- Test Fixtures ---

struct MacroTestService {
  value: i32,
}
trait MacroTestTrait: Send + Sync {
  fn value(&self) -> i32;
}
impl MacroTestTrait for MacroTestService {
  fn value(&self) -> i32 {
    self.value
  }
}
struct UnregisteredService; // An unregistered type

fn populated_container() -> Container {
  let container = Container::new();
  container.add_singleton(|| MacroTestService { value: 42 }).unwrap();
  container
    .add_singleton_with_name("named", || MacroTestService { value: 43 })
    .unwrap();
  container
    .add_singleton_trait::<dyn MacroTestTrait>(|| Arc::new(MacroTestService { value: 44 }))
    .unwrap();
  container
    .add_singleton_trait_with_name::<dyn MacroTestTrait>("named_trait", || {
      Arc::new(MacroTestService { value: 45 })
    })
    .unwrap();
  container
}

// --- Container Macro Tests ---

#[test]
fn test_maybe_resolve() {
  let container = populated_container();

  // Success cases
  assert_eq!(maybe_resolve!(container, MacroTestService).unwrap().value, 42);
  assert_eq!(maybe_resolve!(container, MacroTestService, "named").unwrap().value, 43);
  assert_eq!(maybe_resolve!(container, trait MacroTestTrait).unwrap().value(), 44);
  assert_eq!(
    maybe_resolve!(container, trait MacroTestTrait, "named_trait")
      .unwrap()
      .value(),
    45
  );

  // Failure cases
  assert!(maybe_resolve!(container, UnregisteredService).is_none());
  assert!(maybe_resolve!(container, MacroTestService, "missing_name").is_none());
  trait MissingTrait: Send + Sync {}
  assert!(maybe_resolve!(container, trait MissingTrait).is_none());
  assert!(maybe_resolve!(container, trait MacroTestTrait, "missing_name").is_none());
}

#[test]
fn test_resolve() {
  let container = populated_container();

  assert_eq!(resolve!(container, MacroTestService).value, 42);
  assert_eq!(resolve!(container, MacroTestService, "named").value, 43);
  assert_eq!(resolve!(container, trait MacroTestTrait).value(), 44);
  assert_eq!(resolve!(container, trait MacroTestTrait, "named_trait").value(), 45);
}

#[test]
#[should_panic(expected = "Failed to resolve required service")]
fn test_resolve_panics_on_missing() {
  let container = Container::new();
  resolve!(container, UnregisteredService);
}

#[test]
#[should_panic(expected = "Failed to resolve required service with name 'missing_name'")]
fn test_resolve_panics_on_missing_name() {
  let container = populated_container();
  resolve!(container, MacroTestService, "missing_name");
}

#[test]
#[should_panic(expected = "Unable to resolve service")]
fn test_resolve_panic_carries_the_error() {
  let container = Container::new();
  resolve!(container, UnregisteredService);
}

// --- Scope Macro Tests ---

#[test]
fn test_macros_with_scope() {
  let container = populated_container();
  container
    .register(FactoryDescriptor::constructor(|_| MacroTestService { value: 7 }).key("scoped").scoped_to("request"))
    .unwrap();

  let scope = container.open_scope("request");
  let a = resolve!(scope, MacroTestService, "scoped");
  let b = maybe_resolve!(scope, MacroTestService, "scoped").unwrap();
  assert!(Arc::ptr_eq(&a, &b));
  assert_eq!(resolve!(scope, trait MacroTestTrait).value(), 44);

  // Outside any scope the scoped service is registered but cannot be held.
  let err = container
    .resolve_keyed::<MacroTestService>("scoped")
    .err()
    .unwrap();
  assert_eq!(err.kind(), ErrorKind::NoMatchingScope);
}

#[test]
#[should_panic(expected = "No open scope named 'request'")]
fn test_maybe_resolve_panics_outside_required_scope() {
  let container = Container::new();
  container
    .register(FactoryDescriptor::constructor(|_| MacroTestService { value: 7 }).scoped_to("request"))
    .unwrap();
  maybe_resolve!(container, MacroTestService);
}

#[test]
#[should_panic(expected = "Recursive dependency detected")]
fn test_maybe_resolve_panics_on_cycle() {
  struct Left(#[allow(dead_code)] Arc<Right>);
  struct Right(#[allow(dead_code)] Arc<Left>);

  let container = Container::new();
  container
    .register(FactoryDescriptor::constructor(|args| Left(args.get(0))).param(Parameter::of::<Right>("right")))
    .unwrap();
  container
    .register(FactoryDescriptor::constructor(|args| Right(args.get(0))).param(Parameter::of::<Left>("left")))
    .unwrap();

  maybe_resolve!(container, Left);
}

#[test]
#[should_panic(expected = "Failed to resolve required trait service")]
fn test_resolve_panics_on_missing_trait_in_scope() {
  let container = Container::new();
  let scope = container.open_scope("request");
  trait MissingTrait: Send + Sync {}
  resolve!(scope, trait MissingTrait);
}
