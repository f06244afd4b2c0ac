//! The container reports registrations, compiled plans and scope lifecycles
//! through `tracing`.

use fibre_di::{Container, FactoryDescriptor, Parameter};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

#[derive(Clone, Default)]
struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
  fn text(&self) -> String {
    String::from_utf8_lossy(&self.0.lock()).into_owned()
  }
}

impl io::Write for CapturedOutput {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

fn captured<R>(f: impl FnOnce() -> R) -> (R, String) {
  let output = CapturedOutput::default();
  let writer = output.clone();
  let subscriber = tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_ansi(false)
    .with_writer(move || writer.clone())
    .finish();
  let result = tracing::subscriber::with_default(subscriber, f);
  (result, output.text())
}

struct Clock;
struct Scheduler {
  _clock: Arc<Clock>,
}

#[test]
fn test_registration_and_compilation_are_logged() {
  let (_, logs) = captured(|| {
    let container = Container::new();
    container.add_singleton(|| Clock).unwrap();
    container
      .register(
        FactoryDescriptor::constructor(|args| Scheduler { _clock: args.get(0) })
          .param(Parameter::of::<Clock>("clock")),
      )
      .unwrap();
    container.resolve::<Scheduler>().unwrap();
  });

  assert!(logs.contains("registered factory"), "{}", logs);
  assert!(logs.contains("compiled plan"), "{}", logs);
  assert!(logs.contains("Scheduler"), "{}", logs);
}

#[test]
fn test_scope_lifecycle_is_logged() {
  let (_, logs) = captured(|| {
    let container = Container::new();
    let scope = container.open_scope("request");
    scope.dispose();
  });

  assert!(logs.contains("opened scope"), "{}", logs);
  assert!(logs.contains("disposed scope"), "{}", logs);
  assert!(logs.contains("request"), "{}", logs);
}
