use fibre_handoff::{telemetry, Subject};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn telemetry_counts_handoff_lifecycle() {
  telemetry::clear_telemetry();

  let subject = Subject::new();
  let mut sub = subject.subscribe();
  subject.push(1).unwrap();
  assert!(subject.push(2).is_err());
  assert!(subject.finish().is_err());
  assert_eq!(sub.pull().await, Some(Ok(1)));
  subject.finish().unwrap();

  assert_eq!(telemetry::counter("subject", "push"), 1);
  assert_eq!(telemetry::counter("subject", "claim"), 1);
  assert_eq!(telemetry::counter("subject", "feed_unconsumed"), 1);
  assert_eq!(telemetry::counter("subject", "finish_unconsumed"), 1);
  assert_eq!(telemetry::counter("subject", "finish"), 1);

  let events = telemetry::events();
  assert_eq!(events.len(), 2);
  assert_eq!(events[0].event_type, "FeedUnconsumed");
  assert_eq!(events[1].event_type, "FinishUnconsumed");
}

#[tokio::test]
#[serial]
async fn telemetry_counts_double_iteration_and_cancel() {
  telemetry::clear_telemetry();

  let subject = Subject::<u8>::new();
  let _first = subject.subscribe();
  let _second = subject.subscribe();
  subject.cancel().unwrap();

  assert_eq!(telemetry::counter("subject", "double_iteration"), 1);
  assert_eq!(telemetry::counter("subject", "cancel"), 1);

  telemetry::clear_telemetry();
  assert_eq!(telemetry::counter("subject", "cancel"), 0);
}
