// examples/subject.rs
use fibre_handoff::error::{FeedError, PullError};
use fibre_handoff::{telemetry, Subject};
use futures_util::StreamExt;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  println!("--- Subject: producer awaits each delivery, slow consumer ---");
  {
    let subject = Subject::new();
    let mut subscription = subject.subscribe();

    let consumer = tokio::spawn(async move {
      while let Some(item) = subscription.next().await {
        match item {
          Ok(value) => {
            println!("[Consumer] Received: {}", value);
            tokio::time::sleep(Duration::from_millis(20)).await;
          }
          Err(e) => {
            println!("[Consumer] Iteration error: {}", e);
            break;
          }
        }
      }
      println!("[Consumer] Sequence finished.");
    });

    for i in 0..5 {
      let msg = format!("Handoff-{}", i);
      println!("[Producer] Pushing: {}", msg);
      match subject.push(msg) {
        Ok(delivery) => {
          if delivery.await.is_err() {
            println!("[Producer] Value was discarded.");
            break;
          }
        }
        Err(e) => {
          println!("[Producer] Push failed: {}", e);
          break;
        }
      }
    }
    subject.finish().expect("nothing should be pending");
    consumer.await.unwrap();
  }

  println!("\n--- Subject: contract violations ---");
  {
    let subject = Subject::new();
    let _delivery = subject.push(1).unwrap();
    if let Err(FeedError::Unconsumed(v)) = subject.push(2) {
      println!("[Producer] Rejected {}: {}", v, FeedError::Unconsumed(v));
    }
    if let Err(e) = subject.finish() {
      println!("[Producer] {}", e);
    }

    let mut first = subject.subscribe();
    let mut second = subject.subscribe();
    if let Some(Err(PullError::AlreadyIterated)) = second.pull().await {
      println!("[Consumer] {}", PullError::AlreadyIterated);
    }
    println!("[Consumer] First subscription still receives: {:?}", first.pull().await);
  }

  println!("\n--- Subject: cancelling a waiting consumer ---");
  {
    let subject = Subject::<String>::new();
    let mut subscription = subject.subscribe();
    let consumer = tokio::spawn(async move { subscription.pull().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    subject.cancel().unwrap();
    println!("[Consumer] Woke with: {:?}", consumer.await.unwrap());
  }

  telemetry::print_telemetry_report();
}
