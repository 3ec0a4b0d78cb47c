// tests/multi_scope.rs

mod common;
use common::*;

use fibre_flow::{bounded, consume_all, try_consume_all, unbounded, use_all, Receiver, Sender};
use std::cell::Cell;

fn pairs(n: usize) -> (Vec<Sender<u32>>, Vec<Receiver<u32>>) {
  (0..n).map(|_| bounded::<u32>(4)).unzip()
}

#[tokio::test]
async fn consume_all_failure_shares_one_cause() {
  let (senders, receivers) = pairs(3);
  let out: Result<(), TestFailure> = consume_all(receivers, |_| async { Err(TestFailure("bad input")) }).await;
  assert_eq!(out, Err(TestFailure("bad input")));

  let causes: Vec<_> = senders
    .iter()
    .map(|tx| tx.close_cause().flatten().expect("every sender sees the cause"))
    .collect();
  assert!(causes[1].ptr_eq(&causes[0]));
  assert!(causes[2].ptr_eq(&causes[0]));
}

#[tokio::test]
async fn consume_all_success_cancels_every_receiver() {
  let (senders, receivers) = pairs(4);
  for (i, tx) in senders.iter().enumerate() {
    tx.send(i as u32).await.unwrap();
  }

  let out: Result<u32, TestFailure> = consume_all(receivers, |rxs| async move {
    // Only the first receiver is read; the others keep their items.
    Ok(rxs[0].recv().await.unwrap())
  })
  .await;
  assert_eq!(out, Ok(0));

  for tx in &senders {
    assert!(tx.is_closed_for_send());
    assert_eq!(tx.len(), 0);
    assert!(matches!(tx.close_cause(), Some(None)));
  }
}

#[tokio::test]
async fn try_consume_all_never_pulls_past_a_failure() {
  let (senders, mut receivers) = pairs(4);
  let pulled = Cell::new(0usize);
  let sources = (0..4).map(|i| {
    pulled.set(pulled.get() + 1);
    if i == 2 {
      Err(TestFailure("open failed"))
    } else {
      Ok(receivers.remove(0))
    }
  });

  let out: Result<(), TestFailure> = try_consume_all(sources, |_| async { Ok(()) }).await;
  assert_eq!(out, Err(TestFailure("open failed")));
  assert_eq!(pulled.get(), 3);

  // The two acquired channels were closed with the acquisition error.
  for tx in &senders[..2] {
    let cause = tx.close_cause().flatten().unwrap();
    assert_eq!(cause.downcast_ref::<TestFailure>(), Some(&TestFailure("open failed")));
  }
  // The failed one and the one never pulled are untouched.
  assert!(!senders[2].is_closed_for_send());
  assert!(!senders[3].is_closed_for_send());
}

#[tokio::test]
async fn use_all_closes_present_senders_after_body() {
  let (tx_a, rx_a) = unbounded::<u32>();
  let (tx_b, rx_b) = unbounded::<u32>();

  let out: Result<(), TestFailure> = use_all(vec![None, Some(tx_a), Some(tx_b)], |senders| async move {
    for (i, tx) in senders.iter().flatten().enumerate() {
      for n in 0..ITEMS_LOW as u32 {
        tx.send(n * 10 + i as u32).await.unwrap();
      }
    }
    Ok(())
  })
  .await;
  assert!(out.is_ok());

  for (i, rx) in [rx_a, rx_b].into_iter().enumerate() {
    let mut items = Vec::new();
    while let Ok(item) = rx.recv().await {
      items.push(item);
    }
    let expected: Vec<u32> = (0..ITEMS_LOW as u32).map(|n| n * 10 + i as u32).collect();
    assert_eq!(items, expected);
  }
}
