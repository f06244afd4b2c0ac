//! Per-request services with scoped reuse and disposal.

use fibre_di::{Container, FactoryDescriptor, Parameter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct Transaction {
  id: u32,
}

struct OrderRepository {
  tx: Arc<Transaction>,
}

fn main() -> fibre_di::Result<()> {
  let container = Container::new();
  let next_id = AtomicU32::new(1);

  container.register(
    FactoryDescriptor::constructor(move |_| Transaction {
      id: next_id.fetch_add(1, Ordering::SeqCst),
    })
    .scoped_to("request")
    .dispose_with::<Transaction>(|tx| println!("  committing transaction {}", tx.id)),
  )?;
  container.register(
    FactoryDescriptor::constructor(|args| OrderRepository { tx: args.get(0) })
      .param(Parameter::of::<Transaction>("tx")),
  )?;

  for request in 1..=2 {
    println!("Request {}:", request);
    let scope = container.open_scope("request");
    let orders = scope.resolve::<OrderRepository>()?;
    let audit = scope.resolve::<OrderRepository>()?;
    // Two repositories, one transaction per request.
    assert!(Arc::ptr_eq(&orders.tx, &audit.tx));
    println!("  using transaction {}", orders.tx.id);
    scope.dispose();
  }

  match container.resolve::<OrderRepository>() {
    Ok(_) => unreachable!("transactions only exist inside a request scope"),
    Err(err) => println!("Outside a scope: {}", err),
  }
  Ok(())
}
