// tests/scoped_close.rs

mod common;
use common::*;

use fibre_flow::{consume, unbounded, use_sender, Cause, Panicked};
use std::future::pending;
use tokio::time::timeout;

#[tokio::test]
async fn normal_return_closes_without_cause() {
  let (tx, rx) = unbounded::<u32>();
  let out: Result<u32, TestFailure> = use_sender(tx, |tx| async move {
    tx.send(1).await.unwrap();
    Ok(10)
  })
  .await;

  assert_eq!(out, Ok(10));
  assert_eq!(rx.recv().await.unwrap(), 1);
  let closed = rx.recv().await.unwrap_err();
  assert!(closed.cause().is_none());
}

#[tokio::test]
async fn body_error_is_returned_and_becomes_the_cause() {
  init_tracing();
  let (tx, rx) = unbounded::<u32>();
  let out: Result<(), TestFailure> = use_sender(tx, |tx| async move {
    tx.send(1).await.unwrap();
    Err(TestFailure("disk full"))
  })
  .await;

  assert_eq!(out, Err(TestFailure("disk full")));
  // Items sent before the failure are still delivered.
  assert_eq!(rx.recv().await.unwrap(), 1);
  let closed = rx.recv().await.unwrap_err();
  assert_eq!(
    closed.cause().and_then(|c| c.downcast_ref::<TestFailure>()),
    Some(&TestFailure("disk full"))
  );
}

#[tokio::test]
async fn panic_closes_with_panicked_cause() {
  let (tx, rx) = unbounded::<u32>();
  let task = tokio::spawn(use_sender(tx, |_tx| async move {
    if true {
      panic!("producer bug");
    }
    Ok::<(), TestFailure>(())
  }));

  let joined = task.await;
  assert!(joined.unwrap_err().is_panic());

  let closed = timeout(SHORT_TIMEOUT, rx.recv()).await.unwrap().unwrap_err();
  let panicked = closed.cause().and_then(|c| c.downcast_ref::<Panicked>()).cloned();
  assert_eq!(panicked.map(|p| p.message().to_string()), Some("producer bug".to_string()));
}

#[tokio::test]
async fn cancellation_closes_with_cancelled_cause() {
  let (tx, rx) = unbounded::<u32>();
  let body = use_sender(tx, |tx| async move {
    tx.send(1).await.unwrap();
    pending::<()>().await;
    Ok::<(), TestFailure>(())
  });
  assert!(timeout(SHORT_TIMEOUT / 10, body).await.is_err());

  assert_eq!(rx.recv().await.unwrap(), 1);
  let closed = rx.recv().await.unwrap_err();
  assert!(closed.cause().is_some_and(Cause::is_cancellation));
}

#[tokio::test]
async fn explicit_close_inside_body_keeps_its_cause() {
  let (tx, rx) = unbounded::<u32>();
  let out: Result<(), TestFailure> = use_sender(tx, |tx| async move {
    tx.close_with(TestFailure("closed by body")).unwrap();
    Err(TestFailure("later failure"))
  })
  .await;
  assert!(out.is_err());

  let closed = rx.recv().await.unwrap_err();
  assert_eq!(
    closed.cause().and_then(|c| c.downcast_ref::<TestFailure>()),
    Some(&TestFailure("closed by body"))
  );
}

#[tokio::test]
async fn consume_cancels_and_discards() {
  let (tx, rx) = unbounded::<u32>();
  for i in 0..ITEMS_LOW as u32 {
    tx.send(i).await.unwrap();
  }

  let out: Result<Vec<u32>, TestFailure> = consume(rx, |rx| async move {
    let mut first = Vec::new();
    for _ in 0..3 {
      first.push(rx.recv().await.unwrap());
    }
    Ok(first)
  })
  .await;

  assert_eq!(out, Ok(vec![0, 1, 2]));
  assert!(tx.is_closed_for_send());
  assert!(tx.is_empty());
  assert!(tx.send(99).await.unwrap_err().is_closed());
}

#[tokio::test]
async fn consume_failure_reaches_the_producer() {
  let (tx, rx) = unbounded::<u32>();
  let producer = tokio::spawn(async move {
    let mut sent = 0u32;
    loop {
      match tx.send(sent).await {
        Ok(()) => sent += 1,
        Err(err) => return (sent, err.cause().cloned()),
      }
      tokio::task::yield_now().await;
    }
  });

  let out: Result<(), TestFailure> = consume(rx, |rx| async move {
    for _ in 0..5 {
      rx.recv().await.unwrap();
    }
    Err(TestFailure("consumer gave up"))
  })
  .await;
  assert!(out.is_err());

  let (sent, cause) = timeout(LONG_TIMEOUT, producer).await.unwrap().unwrap();
  assert!(sent >= 5);
  assert!(cause.is_some_and(|c| c.is::<TestFailure>()));
}
