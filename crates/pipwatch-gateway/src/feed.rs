//! Quote polling feed.
//!
//! The terminal bridge exposes pull-style quotes; [`TickFeed`] turns
//! them into a push stream by polling each watched symbol on a short
//! interval and forwarding only changed, valid quotes into an mpsc
//! channel. Built stopped; `start` is idempotent and `stop` joins the
//! poll task with a bounded timeout.

use crate::Gateway;
use pipwatch_core::{Symbol, Tick};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct TickFeed {
    gateway: Arc<dyn Gateway>,
    symbols: Vec<Symbol>,
    poll_interval: Duration,
    out: mpsc::Sender<Tick>,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl TickFeed {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        symbols: Vec<Symbol>,
        poll_interval: Duration,
        out: mpsc::Sender<Tick>,
    ) -> Self {
        Self {
            gateway,
            symbols,
            poll_interval,
            out,
            shutdown: None,
            handle: None,
        }
    }

    /// Spawn the poll task. Calling `start` on a running feed is a
    /// no-op.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            debug!("tick feed already running");
            return;
        }
        let (tx, rx) = watch::channel(false);
        self.shutdown = Some(tx);
        let gateway = Arc::clone(&self.gateway);
        let symbols = self.symbols.clone();
        let out = self.out.clone();
        let interval = self.poll_interval;
        self.handle = Some(tokio::spawn(poll_loop(gateway, symbols, interval, out, rx)));
        debug!(symbols = self.symbols.len(), "tick feed started");
    }

    /// Signal the poll task and wait for it, up to two seconds.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.handle.take() {
            if tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .is_err()
            {
                warn!("tick feed did not stop in time, detaching");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

async fn poll_loop(
    gateway: Arc<dyn Gateway>,
    symbols: Vec<Symbol>,
    poll_interval: Duration,
    out: mpsc::Sender<Tick>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    let mut last_seen: HashMap<Symbol, Tick> = HashMap::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                debug!("tick feed shutting down");
                return;
            }
        }

        for symbol in &symbols {
            let tick = match gateway.tick(symbol) {
                Ok(t) => t,
                Err(err) => {
                    debug!(symbol = %symbol, error = %err, "quote poll failed");
                    continue;
                }
            };
            if !tick.is_valid() {
                continue;
            }
            // Forward only on change; the bridge re-serves the same
            // quote between market updates.
            if last_seen.get(symbol) == Some(&tick) {
                continue;
            }
            last_seen.insert(symbol.clone(), tick.clone());
            if out.send(tick).await.is_err() {
                debug!("tick consumer gone, stopping feed");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimBroker;
    use chrono::Utc;
    use pipwatch_core::Price;
    use rust_decimal_macros::dec;

    fn quote(bid: &str, ask: &str) -> Tick {
        Tick::new(
            Symbol::from("EURUSD"),
            Price::new(bid.parse().unwrap()),
            Price::new(ask.parse().unwrap()),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_feed_forwards_changed_ticks_only() {
        let broker = Arc::new(SimBroker::new());
        broker.set_tick(quote("1.1000", "1.1002"));

        let (tx, mut rx) = mpsc::channel(16);
        let mut feed = TickFeed::new(
            broker.clone(),
            vec![Symbol::from("EURUSD")],
            Duration::from_millis(5),
            tx,
        );
        feed.start();
        assert!(feed.is_running());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.bid, Price::new(dec!(1.1000)));

        // Same quote again: nothing new arrives until it changes.
        broker.set_tick(quote("1.1001", "1.1003"));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.bid, Price::new(dec!(1.1001)));

        feed.stop().await;
        assert!(!feed.is_running());
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let broker = Arc::new(SimBroker::new());
        let (tx, _rx) = mpsc::channel(16);
        let mut feed = TickFeed::new(broker, vec![], Duration::from_millis(50), tx);
        feed.start();
        feed.start();
        assert!(feed.is_running());
        feed.stop().await;
    }
}
