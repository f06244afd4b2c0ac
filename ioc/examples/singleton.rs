use fibre_di::{resolve, Container};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

// A simple service that gets a unique ID upon creation.
struct RequestTracker {
  id: usize,
}

fn main() {
  let container = Container::new();
  let ids = Arc::new(AtomicUsize::new(0));

  // --- Singleton Registration ---
  // This factory will only be called ONCE.
  let singleton_ids = ids.clone();
  container
    .add_singleton_with_name("singleton_tracker", move || {
      println!("Creating SINGLETON RequestTracker...");
      RequestTracker {
        id: singleton_ids.fetch_add(1, Ordering::SeqCst),
      }
    })
    .expect("registration failed");

  // --- Transient Registration ---
  // This factory will be called EVERY time the service is resolved.
  let transient_ids = ids.clone();
  container
    .add_transient_with_name("transient_tracker", move || {
      println!("Creating TRANSIENT RequestTracker...");
      RequestTracker {
        id: transient_ids.fetch_add(1, Ordering::SeqCst),
      }
    })
    .expect("registration failed");

  println!("--- Resolving Singletons ---");
  let s1 = resolve!(container, RequestTracker, "singleton_tracker");
  let s2 = resolve!(container, RequestTracker, "singleton_tracker");
  println!("Singleton 1 ID: {}, Singleton 2 ID: {}", s1.id, s2.id);
  assert_eq!(s1.id, 0);
  assert!(Arc::ptr_eq(&s1, &s2), "Singleton instances should be identical");

  println!("\n--- Resolving Transients ---");
  let t1 = resolve!(container, RequestTracker, "transient_tracker");
  let t2 = resolve!(container, RequestTracker, "transient_tracker");
  println!("Transient 1 ID: {}, Transient 2 ID: {}", t1.id, t2.id);
  assert_eq!(t1.id, 1);
  assert_eq!(t2.id, 2);
  assert!(!Arc::ptr_eq(&t1, &t2), "Transient instances should be different");

  println!("\n{}", container.metrics());
}
