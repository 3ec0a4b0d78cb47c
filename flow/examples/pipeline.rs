// examples/pipeline.rs
use fibre_flow::{batching, debounce, unbounded, use_sender, Cause, ChannelBuilder, Scope};
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
#[error("sensor went offline after {0} readings")]
struct SensorOffline(u32);

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let scope = Scope::new();

  println!("--- Sensor -> debounce -> batching -> sink ---");
  let (readings_tx, readings_rx) = ChannelBuilder::new().bounded(8).build::<u32>();
  let (paced_tx, paced_rx) = unbounded::<u32>();
  let (batches_tx, batches_rx) = unbounded::<Vec<u32>>();

  debounce(&scope, readings_rx, paced_tx, Duration::from_millis(5));
  batching(&scope, paced_rx, batches_tx);

  let sensor = tokio::spawn(use_sender(readings_tx, |tx| async move {
    for reading in 0..12 {
      tx.send(reading).await.map_err(Cause::new)?;
    }
    // The failure becomes the close cause seen at the end of the pipeline.
    Err::<(), _>(Cause::new(SensorOffline(12)))
  }));

  loop {
    match batches_rx.recv().await {
      Ok(batch) => println!("[Sink] batch of {}: {:?}", batch.len(), batch),
      Err(closed) => {
        match closed.cause() {
          Some(cause) => println!("[Sink] upstream closed: {}", cause),
          None => println!("[Sink] upstream closed"),
        }
        break;
      }
    }
  }

  match sensor.await {
    Ok(Ok(())) => println!("[Sensor] finished"),
    Ok(Err(cause)) => println!("[Sensor] failed: {}", cause),
    Err(join_err) => println!("[Sensor] task error: {}", join_err),
  }

  match scope.join().await {
    Ok(()) => println!("--- Pipeline finished ---"),
    Err(err) => println!("--- Pipeline failed: {} ---", err),
  }
}
