//! Services produced by factory methods instead of constructors.

use fibre_di::{Binding, Container, FactoryDescriptor, Parameter};
use std::sync::Arc;

trait Connection: Send + Sync {
  fn describe(&self) -> String;
}

struct PgConnection {
  url: String,
}

impl Connection for PgConnection {
  fn describe(&self) -> String {
    format!("postgres connection to {}", self.url)
  }
}

// A factory object that is itself a registered service.
struct ConnectionFactory {
  pool_size: u32,
}

impl ConnectionFactory {
  fn open(&self, url: &str) -> Arc<dyn Connection> {
    println!("Opening connection (pool of {})", self.pool_size);
    Arc::new(PgConnection { url: url.to_string() })
  }
}

fn main() -> fibre_di::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let container = Container::new();

  container.register(
    FactoryDescriptor::constructor(|args| ConnectionFactory {
      pool_size: *args.get::<u32>(0),
    })
    .param(Parameter::of::<u32>("pool_size").with_default(8_u32))
    .key("primary")
    .singleton(),
  )?;
  container.add_instance_with_name("primary_url", String::from("postgres://db/primary"))?;

  // The connection comes from a method on the keyed factory, and its `url`
  // parameter is bound to a keyed string at registration time.
  container.register(
    FactoryDescriptor::instance_method("ConnectionFactory::open", |factory: &ConnectionFactory, args| {
      factory.open(&args.get::<String>(0))
    })
    .owner_key("primary")
    .param(Parameter::of::<String>("url"))
    .bind("url", Binding::keyed("primary_url")),
  )?;

  let connection = container.resolve::<dyn Connection>()?;
  println!("{}", connection.describe());

  let again = container.resolve::<dyn Connection>()?;
  println!("{}", again.describe());

  println!("\n{}", container.metrics());
  Ok(())
}
