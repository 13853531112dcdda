mod common;
use common::*;

use fibre_handoff::error::{FeedError, PullError};
use fibre_handoff::Subject;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn subject_async_smoke() {
  let subject = Subject::new();
  let mut sub = subject.subscribe();
  subject.push(10).unwrap();
  assert_eq!(sub.next().await, Some(Ok(10)));
}

#[tokio::test]
async fn subject_async_slow_consumer_backpressure() {
  let subject = Subject::new();
  let mut sub = subject.subscribe();

  let consumer = tokio::spawn(async move {
    let mut seen = Vec::new();
    while let Some(item) = sub.next().await {
      tokio::time::sleep(Duration::from_millis(5)).await;
      seen.push(item.unwrap());
    }
    seen
  });

  for i in 0..ITEMS_LOW {
    let delivery = subject.push(i).unwrap();
    if !delivery.is_claimed() {
      // Still sitting in the slot: the producer cannot get further ahead.
      assert!(matches!(subject.push(usize::MAX), Err(FeedError::Unconsumed(_))));
    }
    delivery.await.unwrap();
  }
  subject.finish().unwrap();

  let seen = timeout(LONG_TIMEOUT, consumer).await.expect("consumer timed out").unwrap();
  assert_eq!(seen, (0..ITEMS_LOW).collect::<Vec<_>>());
}

#[tokio::test]
async fn subject_async_second_iteration_is_rejected() {
  let subject = Subject::<u32>::new();
  let first = subject.subscribe();

  let second = tokio::spawn({
    let second = subject.subscribe();
    async move { second.collect::<Vec<_>>().await }
  });
  assert_eq!(
    timeout(SHORT_TIMEOUT, second).await.expect("second timed out").unwrap(),
    vec![Err(PullError::AlreadyIterated)]
  );

  let consumer = tokio::spawn(async move { first.collect::<Vec<_>>().await });
  subject.push(1).unwrap().await.unwrap();
  subject.finish().unwrap();
  assert_eq!(
    timeout(SHORT_TIMEOUT, consumer).await.expect("first timed out").unwrap(),
    vec![Ok(1)]
  );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn subject_async_multi_thread_order() {
  let subject = Subject::new();
  let sub = subject.subscribe();

  let consumer = tokio::spawn(async move {
    sub
      .map(|item| item.expect("unexpected pull error"))
      .collect::<Vec<_>>()
      .await
  });

  let producer = tokio::spawn(async move {
    for i in 0..ITEMS_HIGH {
      subject.push(i).unwrap().await.unwrap();
    }
    subject.finish().unwrap();
  });

  timeout(STRESS_TIMEOUT, producer).await.expect("producer timed out").unwrap();
  let seen = timeout(STRESS_TIMEOUT, consumer).await.expect("consumer timed out").unwrap();
  assert_eq!(seen, (0..ITEMS_HIGH).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subject_async_retry_after_unconsumed() {
  let subject = Subject::new();
  let mut sub = subject.subscribe();

  let consumer = tokio::spawn(async move {
    let mut total = 0usize;
    while let Some(item) = sub.pull().await {
      total += item.unwrap();
    }
    total
  });

  // Producer that ignores acknowledgements and just retries on rejection.
  let mut sent = 0usize;
  for i in 1..=ITEMS_MEDIUM {
    let mut value = i;
    loop {
      match subject.push(value) {
        Ok(_) => break,
        Err(FeedError::Unconsumed(v)) => {
          value = v;
          tokio::task::yield_now().await;
        }
        Err(e) => panic!("unexpected feed error: {}", e),
      }
    }
    sent += i;
  }
  while subject.finish().is_err() {
    tokio::task::yield_now().await;
  }

  let total = timeout(LONG_TIMEOUT, consumer).await.expect("consumer timed out").unwrap();
  assert_eq!(total, sent);
}
