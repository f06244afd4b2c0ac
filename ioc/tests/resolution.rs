//! Plan caching, invalidation, enumeration and container options.

use fibre_di::{
  Container, DuplicatePolicy, ErrorKind, FactoryDescriptor, IfUnresolved, Parameter, ServiceKey,
  ServiceType,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// --- Test Fixtures ---

trait Plugin: Send + Sync {
  fn name(&self) -> String;
}

struct NamedPlugin(&'static str);

impl Plugin for NamedPlugin {
  fn name(&self) -> String {
    self.0.to_string()
  }
}

fn add_plugin(container: &Container, key: Option<&'static str>, name: &'static str) {
  let descriptor =
    FactoryDescriptor::static_method("plugin", move |_| Arc::new(NamedPlugin(name)) as Arc<dyn Plugin>);
  let descriptor = match key {
    Some(key) => descriptor.key(key),
    None => descriptor,
  };
  container.register(descriptor).unwrap();
}

struct Repository;
struct Handler {
  _repository: Arc<Repository>,
}

fn handler_container() -> Container {
  let container = Container::new();
  container.add_singleton(|| Repository).unwrap();
  container
    .register(
      FactoryDescriptor::constructor(|args| Handler {
        _repository: args.get(0),
      })
      .param(Parameter::of::<Repository>("repository")),
    )
    .unwrap();
  container
}

// --- Plan Cache ---

#[test]
fn test_repeated_resolution_reuses_the_compiled_plan() {
  let container = handler_container();

  container.resolve::<Handler>().unwrap();
  let after_first = container.metrics();
  container.resolve::<Handler>().unwrap();
  container.resolve::<Handler>().unwrap();
  let after_third = container.metrics();

  // Handler and its Repository dependency.
  assert_eq!(after_first.plans_compiled, 2);
  assert_eq!(after_third.plans_compiled, 2);
  assert_eq!(after_third.plan_cache_hits, after_first.plan_cache_hits + 2);
  // No registry walks once the plan is cached.
  assert_eq!(after_third.registry_lookups, after_first.registry_lookups);
  assert_eq!(after_third.resolutions, 3);
}

#[test]
fn test_registration_invalidates_cached_plans() {
  let container = handler_container();
  container.resolve::<Handler>().unwrap();
  let before = container.metrics();

  container.add_instance_with_name("unrelated", 1_u8).unwrap();
  container.resolve::<Handler>().unwrap();
  let after = container.metrics();

  assert_eq!(after.cache_invalidations, before.cache_invalidations + 1);
  assert!(after.plans_compiled > before.plans_compiled);
}

#[test]
fn test_policies_are_cached_separately() {
  let container = handler_container();

  container.resolve::<Handler>().unwrap();
  container
    .resolve_with::<Handler>(None, IfUnresolved::ReturnDefault)
    .unwrap()
    .unwrap();
  let compiled = container.metrics().plans_compiled;

  container.resolve::<Handler>().unwrap();
  container.try_resolve::<Handler>().unwrap().unwrap();
  assert_eq!(container.metrics().plans_compiled, compiled);
}

#[test]
fn test_failed_compiles_are_not_cached() {
  struct Late;
  struct NeedsLate {
    late: Arc<Late>,
  }

  let container = Container::new();
  container
    .register(
      FactoryDescriptor::constructor(|args| NeedsLate { late: args.get(0) })
        .param(Parameter::of::<Late>("late")),
    )
    .unwrap();

  let err = container.resolve::<NeedsLate>().err().unwrap();
  assert_eq!(err.kind(), ErrorKind::UnableToResolveDependency);

  container.add_instance(Late).unwrap();
  let resolved = container.resolve::<NeedsLate>().unwrap();
  assert!(Arc::ptr_eq(&resolved.late, &container.resolve::<Late>().unwrap()));
}

#[test]
fn test_replaced_singleton_is_rebuilt() {
  let builds = Arc::new(AtomicUsize::new(0));
  let container = Container::new();

  for value in [1_u32, 2] {
    let builds = builds.clone();
    container
      .add_singleton(move || {
        builds.fetch_add(1, Ordering::SeqCst);
        value
      })
      .unwrap();
    assert_eq!(*container.resolve::<u32>().unwrap(), value);
    assert_eq!(*container.resolve::<u32>().unwrap(), value);
  }

  assert_eq!(builds.load(Ordering::SeqCst), 2);
}

// --- Enumeration ---

#[test]
fn test_resolve_many_follows_registration_order() {
  let container = Container::new();
  add_plugin(&container, Some("b"), "beta");
  add_plugin(&container, None, "default");
  add_plugin(&container, Some("a"), "alpha");

  let plugins = container.resolve_many::<dyn Plugin>();
  let names: Vec<String> = plugins.iter().map(|p| p.unwrap().name()).collect();

  assert_eq!(names, vec!["beta", "default", "alpha"]);
}

#[test]
fn test_resolve_many_is_lazy_and_restartable() {
  let created = Arc::new(AtomicUsize::new(0));
  let container = Container::new();
  for key in ["one", "two"] {
    let created = created.clone();
    container
      .register(
        FactoryDescriptor::constructor(move |_| {
          created.fetch_add(1, Ordering::SeqCst);
          key
        })
        .key(key),
      )
      .unwrap();
  }

  let all = container.resolve_many::<&'static str>();
  assert_eq!(created.load(Ordering::SeqCst), 0);

  let mut iter = all.iter();
  assert_eq!(*iter.next().unwrap().unwrap(), "one");
  assert_eq!(created.load(Ordering::SeqCst), 1);

  // Iterating again resolves again: these are transients.
  let mut count = 0;
  for item in &all {
    item.unwrap();
    count += 1;
  }
  assert_eq!(count, 2);
  assert_eq!(created.load(Ordering::SeqCst), 3);
  assert_eq!(all.collect_all().unwrap().len(), 2);
}

#[test]
fn test_resolve_many_of_unregistered_type_is_empty() {
  let container = Container::new();
  assert!(container.resolve_many::<dyn Plugin>().iter().next().is_none());
}

#[test]
fn test_resolve_many_reports_item_failures() {
  struct Broken;
  let container = Container::new();
  add_plugin(&container, Some("ok"), "fine");
  container
    .register(
      FactoryDescriptor::static_method("broken_plugin", |_| Arc::new(Broken))
        .service::<dyn Plugin>()
        .key("broken"),
    )
    .unwrap();

  let results: Vec<_> = container.resolve_many::<dyn Plugin>().iter().collect();
  assert_eq!(results.len(), 2);
  assert!(results[0].is_ok());
  assert_eq!(
    results[1].as_ref().err().map(|e| e.kind()),
    Some(ErrorKind::ServiceNotAssignableFromFactoryMethod)
  );
}

// --- Options ---

#[test]
fn test_duplicate_registrations_can_be_rejected() {
  let container = Container::builder().reject_duplicates().build();
  assert_eq!(container.config().duplicate_policy, DuplicatePolicy::Reject);

  container.add_instance(1_u8).unwrap();
  let err = container.add_instance(2_u8).err().unwrap();
  assert_eq!(err.kind(), ErrorKind::DuplicateRegistration);
  assert_eq!(*container.resolve::<u8>().unwrap(), 1);

  // Same type, different key: fine.
  container.add_instance_with_name("other", 3_u8).unwrap();
}

struct Level0;
struct Level1;
struct Level2;

/// Level0 -> Level1 -> Level2, with the depth capped at one link.
fn shallow_chain_container() -> Container {
  let container = Container::builder().max_resolution_depth(1).build();
  container.add_transient(|| Level2).unwrap();
  container
    .register(FactoryDescriptor::constructor(|_| Level1).param(Parameter::of::<Level2>("next")))
    .unwrap();
  container
    .register(FactoryDescriptor::constructor(|_| Level0).param(Parameter::of::<Level1>("next")))
    .unwrap();
  container
}

#[test]
fn test_resolution_depth_is_capped() {
  let container = shallow_chain_container();

  let err = container.resolve::<Level0>().err().unwrap();
  assert_eq!(err.kind(), ErrorKind::RecursiveDependencyDetected);
  assert!(err.to_string().contains("depth limit 1"), "{}", err);
  // The shorter chain is within the limit.
  assert!(container.resolve::<Level1>().is_ok());
}

#[test]
fn test_depth_limit_counts_cached_sub_plans() {
  let container = shallow_chain_container();

  // Level1's plan is cached before Level0 reuses it.
  assert!(container.resolve::<Level1>().is_ok());
  let err = container.resolve::<Level0>().err().unwrap();
  assert_eq!(err.kind(), ErrorKind::RecursiveDependencyDetected);
  assert!(err.to_string().contains("depth limit 1 exceeded"), "{}", err);

  // Same answer again, and the cached Level1 plan is still fine on its own.
  assert!(container.resolve::<Level0>().is_err());
  assert!(container.resolve::<Level1>().is_ok());
}

#[test]
fn test_untyped_resolution() {
  let container = Container::new();
  container.add_instance_with_name("port", 8080_u16).unwrap();

  let instance = container
    .resolve_instance(
      ServiceType::of::<u16>(),
      Some(ServiceKey::from("port")),
      IfUnresolved::Throw,
    )
    .unwrap()
    .unwrap();

  assert!(instance.service_type().is::<u16>());
  assert_eq!(*instance.downcast::<u16>().unwrap(), 8080);
}

#[test]
fn test_register_all_reports_first_failure() {
  let container = Container::builder().reject_duplicates().build();
  let result = container.register_all([
    FactoryDescriptor::constructor(|_| 1_i64),
    FactoryDescriptor::constructor(|_| 2_i64),
  ]);

  assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::DuplicateRegistration));
  assert_eq!(container.descriptors().len(), 1);
}
