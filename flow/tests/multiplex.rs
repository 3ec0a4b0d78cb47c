// tests/multiplex.rs

mod common;
use common::*;

use fibre_flow::{bounded, consume_all_and_select, consume_each, rendezvous, ChannelResult, Receiver};
use std::collections::HashMap;
use tokio::time::timeout;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn consume_each_preserves_per_channel_order() {
  const PRODUCERS: u32 = 4;
  let mut receivers: Vec<Receiver<(u32, u32)>> = Vec::new();
  let mut producers = Vec::new();
  for p in 0..PRODUCERS {
    let (tx, rx) = bounded(8);
    receivers.push(rx);
    producers.push(tokio::spawn(async move {
      for seq in 0..ITEMS_MEDIUM as u32 {
        tx.send((p, seq)).await.unwrap();
      }
    }));
  }

  let mut seen: HashMap<u32, Vec<u32>> = HashMap::new();
  let out: Result<(), TestFailure> = timeout(
    LONG_TIMEOUT,
    consume_each(receivers, |(p, seq)| {
      seen.entry(p).or_default().push(seq);
      async { Ok(()) }
    }),
  )
  .await
  .expect("multiplexer should finish once every producer is done");
  assert!(out.is_ok());

  for producer in producers {
    producer.await.unwrap();
  }
  assert_eq!(seen.len(), PRODUCERS as usize);
  for (_, seqs) in seen {
    assert_eq!(seqs, (0..ITEMS_MEDIUM as u32).collect::<Vec<_>>());
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn busy_channel_does_not_starve_quiet_one() {
  let (busy_tx, busy_rx) = bounded::<&'static str>(1);
  let (quiet_tx, quiet_rx) = rendezvous::<&'static str>();

  // The busy producer never stops on its own.
  let busy = tokio::spawn(async move { while busy_tx.send("busy").await.is_ok() {} });
  let quiet = tokio::spawn(async move {
    quiet_tx.send("quiet").await.unwrap();
  });

  let out: Result<(), TestFailure> = timeout(
    LONG_TIMEOUT,
    consume_all_and_select(vec![busy_rx, quiet_rx], |_, result| {
      let keep_going = !matches!(result, ChannelResult::Success("quiet"));
      async move { Ok(keep_going) }
    }),
  )
  .await
  .expect("the quiet channel must eventually win a round");
  assert!(out.is_ok());

  quiet.await.unwrap();
  // Leaving the multiplexer cancelled the busy channel.
  timeout(SHORT_TIMEOUT, busy).await.unwrap().unwrap();
}

#[tokio::test]
async fn no_receivers_finishes_immediately() {
  let out: Result<(), TestFailure> = consume_each(Vec::<Receiver<u8>>::new(), |_| async { Ok(()) }).await;
  assert!(out.is_ok());
}
