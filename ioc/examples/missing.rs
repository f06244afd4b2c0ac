use fibre_di::{resolve, Container, IfUnresolved};
use std::panic::{self, AssertUnwindSafe};

struct UnregisteredService;

fn main() {
  let container = Container::new();

  // --- Using the panicking `resolve!` macro ---
  println!("Attempting to resolve a service that was never registered...");
  let result = panic::catch_unwind(AssertUnwindSafe(|| {
    let _service = resolve!(container, UnregisteredService);
  }));
  assert!(result.is_err(), "resolve! should have panicked.");
  println!("Caught the expected panic from resolve!.");

  // --- Using the fallible API ---
  match container.resolve::<UnregisteredService>() {
    Ok(_) => panic!("Should not have found the service!"),
    Err(err) => println!("\nresolve() failed with {:?}: {}", err.kind(), err),
  }

  let absent = container
    .resolve_with::<UnregisteredService>(None, IfUnresolved::ReturnDefault)
    .expect("ReturnDefault does not fail for missing services");
  assert!(absent.is_none());
  println!("ReturnDefault produced no instance, as expected.");
}
