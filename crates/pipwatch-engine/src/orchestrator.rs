//! Event orchestration: the candle loop and the tick path.
//!
//! Hybrid layout, one task per event source. The candle loop polls
//! broker history and fires the per-symbol pipeline exactly once per
//! new closed entry-timeframe bar: signal generation (which refreshes
//! the exit engine's HTF bias), candle-close profit exits, then entry
//! dispatch. Idle sleeps align to the next entry-bar close; right
//! after a boundary the fixed poll cadence covers feed latency. The
//! tick task consumes the [`TickFeed`] stream and runs protective
//! exits, n-tick confirmation and the straddle sweep on every quote.

use crate::EngineConfig;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pipwatch_core::{Candle, Symbol, Tick, Timeframe, TradeSignal, TrendLabel};
use pipwatch_exec::TradeExecutor;
use pipwatch_exit::ExitEngine;
use pipwatch_gateway::{Gateway, TickFeed};
use pipwatch_oco::StraddleManager;
use pipwatch_signal::{MtfSignalGenerator, NTickConfirm, SignalConfig};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const TICK_CHANNEL_CAPACITY: usize = 256;

/// Everything both loops share. Lives behind an `Arc` so the candle
/// and tick tasks run against the same confirmation machines and
/// baselines.
struct Pipeline {
    config: EngineConfig,
    signal_config: SignalConfig,
    gateway: Arc<dyn Gateway>,
    generator: MtfSignalGenerator,
    exits: Arc<ExitEngine>,
    executor: Arc<TradeExecutor>,
    straddles: Option<Arc<StraddleManager>>,
    confirms: Mutex<HashMap<Symbol, NTickConfirm>>,
    /// Direction held behind the pullback gate per symbol. A status
    /// ledger only: the entry itself re-routes from the fresh signal
    /// of a later bar. Cleared when alignment breaks or an entry
    /// dispatches.
    pending_entries: Mutex<HashMap<Symbol, TrendLabel>>,
    /// Close time of the newest closed entry-TF bar seen per symbol.
    /// First observation only sets the baseline, so a restart never
    /// replays the bar that was already closed when we came up.
    baselines: Mutex<HashMap<Symbol, DateTime<Utc>>>,
    points: Mutex<HashMap<Symbol, Decimal>>,
}

impl Pipeline {
    /// One pass over all symbols. Returns whether any symbol had a
    /// new closed bar.
    fn candle_pass(&self) -> bool {
        let mut did_work = false;
        for symbol in &self.config.symbols {
            match self.process_symbol(symbol) {
                Ok(worked) => did_work |= worked,
                Err(err) => {
                    debug!(symbol = %symbol, error = %err, "candle pass skipped symbol");
                }
            }
        }
        did_work
    }

    fn process_symbol(&self, symbol: &Symbol) -> Result<bool, pipwatch_gateway::GatewayError> {
        let mut by_tf: HashMap<Timeframe, Vec<Candle>> = HashMap::new();
        for tf in [
            self.signal_config.tf_bias,
            self.signal_config.tf_confirm,
            self.signal_config.tf_entry,
        ] {
            if !by_tf.contains_key(&tf) {
                let candles = self.gateway.candles(symbol, tf, self.config.history_bars)?;
                by_tf.insert(tf, candles);
            }
        }

        let closed = match last_closed(&by_tf[&self.signal_config.tf_entry]) {
            Some(c) => c.clone(),
            None => return Ok(false),
        };

        // Exactly-once trigger per new closed bar.
        {
            let mut baselines = self.baselines.lock();
            match baselines.get(symbol) {
                None => {
                    baselines.insert(symbol.clone(), closed.close_time);
                    return Ok(false);
                }
                Some(last) if closed.close_time <= *last => return Ok(false),
                Some(_) => {
                    baselines.insert(symbol.clone(), closed.close_time);
                }
            }
        }

        let signal = self.generator.generate(symbol, &by_tf);
        self.exits
            .update_bias(symbol, Some(signal.m5_confirm), Some(signal.m15_bias));

        // Candle-close exits run before entry dispatch so a reversal
        // bar closes the old position ahead of the opposite entry.
        for action in self.exits.on_candle_close(symbol, closed.close) {
            self.executor.execute_exit(&action);
        }

        self.route_entry(symbol, signal, closed.close_time);
        Ok(true)
    }

    /// Dispatch, hold for n-tick confirmation, or buffer an entry
    /// signal from a freshly closed bar.
    fn route_entry(&self, symbol: &Symbol, signal: TradeSignal, bar_time: DateTime<Utc>) {
        let aligned = signal.m15_bias != TrendLabel::Hold
            && signal.m15_bias == signal.m5_confirm
            && signal.m5_confirm == signal.m1_entry;

        if aligned && !signal.pullback_completed {
            debug!(symbol = %symbol, direction = %signal.m1_entry, "entry waiting for pullback");
            self.pending_entries
                .lock()
                .insert(symbol.clone(), signal.m1_entry);
            return;
        }
        if !aligned {
            self.pending_entries.lock().remove(symbol);
        }

        let routed = {
            let mut confirms = self.confirms.lock();
            let machine = confirms
                .entry(symbol.clone())
                .or_insert_with(|| NTickConfirm::new(self.signal_config.clone()));
            machine.on_candle_signal(signal, bar_time)
        };
        if routed.is_actionable() {
            self.pending_entries.lock().remove(symbol);
            self.executor.process_signals(&[routed]);
        }
    }

    fn handle_tick(&self, tick: &Tick) {
        for action in self.exits.on_tick(tick) {
            self.executor.execute_exit(&action);
        }

        let spread_points = self.spread_points(tick);
        let confirmed = {
            let mut confirms = self.confirms.lock();
            match confirms.get_mut(&tick.symbol) {
                Some(machine) => {
                    machine.on_tick(tick.bid, spread_points);
                    machine.take_confirmed()
                }
                None => None,
            }
        };
        if let Some(signal) = confirmed {
            self.pending_entries.lock().remove(&tick.symbol);
            self.executor.process_signals(&[signal]);
        }

        if let Some(straddles) = &self.straddles {
            straddles.on_tick();
        }
    }

    /// Idle sleep for the candle loop: to just past the next
    /// entry-bar close boundary. Right after a boundary the fixed
    /// poll interval keeps retrying until the delayed bar shows up.
    fn idle_delay(&self, epoch_secs: u64) -> Duration {
        let poll = Duration::from_millis(self.config.candle_poll_ms);
        let period = self.signal_config.tf_entry.secs();
        let to_close = self.signal_config.tf_entry.secs_to_next_close(epoch_secs);
        let into_bar = Duration::from_secs(period - to_close);
        if into_bar <= poll * 2 {
            return poll;
        }
        Duration::from_secs(to_close) + Duration::from_millis(self.config.settle_ms)
    }

    fn spread_points(&self, tick: &Tick) -> Option<Decimal> {
        let mut points = self.points.lock();
        let point = match points.get(&tick.symbol) {
            Some(p) => *p,
            None => match self.gateway.symbol_info(&tick.symbol) {
                Ok(info) => {
                    points.insert(tick.symbol.clone(), info.point);
                    info.point
                }
                Err(_) => return None,
            },
        };
        if point.is_zero() {
            return None;
        }
        Some(tick.spread() / point)
    }
}

fn last_closed(candles: &[Candle]) -> Option<&Candle> {
    candles.iter().rev().find(|c| c.is_closed)
}

/// Owns the background tasks. Built stopped; `start` is idempotent
/// and `stop` joins each task with a bounded timeout.
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    feed: Option<TickFeed>,
    shutdown: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(
        config: EngineConfig,
        signal_config: SignalConfig,
        gateway: Arc<dyn Gateway>,
        generator: MtfSignalGenerator,
        exits: Arc<ExitEngine>,
        executor: Arc<TradeExecutor>,
        straddles: Option<Arc<StraddleManager>>,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                config,
                signal_config,
                gateway,
                generator,
                exits,
                executor,
                straddles,
                confirms: Mutex::new(HashMap::new()),
                pending_entries: Mutex::new(HashMap::new()),
                baselines: Mutex::new(HashMap::new()),
                points: Mutex::new(HashMap::new()),
            }),
            feed: None,
            shutdown: None,
            handles: Vec::new(),
        }
    }

    /// Spawn the tick feed, the tick consumer and the candle loop.
    /// Calling `start` on a running orchestrator is a no-op.
    pub fn start(&mut self) {
        if self.shutdown.is_some() {
            debug!("orchestrator already running");
            return;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tick_tx, tick_rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);

        let mut feed = TickFeed::new(
            Arc::clone(&self.pipeline.gateway),
            self.pipeline.config.symbols.clone(),
            Duration::from_millis(self.pipeline.config.tick_poll_ms),
            tick_tx,
        );
        feed.start();
        self.feed = Some(feed);

        self.handles.push(tokio::spawn(candle_loop(
            Arc::clone(&self.pipeline),
            shutdown_rx.clone(),
        )));
        self.handles.push(tokio::spawn(tick_loop(
            Arc::clone(&self.pipeline),
            tick_rx,
            shutdown_rx,
        )));
        self.shutdown = Some(shutdown_tx);
        info!(
            symbols = self.pipeline.config.symbols.len(),
            "orchestrator started"
        );
    }

    /// Signal both loops and wait for them, up to two seconds each.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        if let Some(mut feed) = self.feed.take() {
            feed.stop().await;
        }
        for handle in self.handles.drain(..) {
            if tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .is_err()
            {
                warn!("orchestrator task did not stop in time, detaching");
            }
        }
        info!("orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    /// Symbols with an entry buffered behind the pullback gate.
    pub fn pending_entries(&self) -> Vec<Symbol> {
        let mut symbols: Vec<_> = self
            .pipeline
            .pending_entries
            .lock()
            .keys()
            .cloned()
            .collect();
        symbols.sort();
        symbols
    }
}

async fn candle_loop(pipeline: Arc<Pipeline>, mut shutdown: watch::Receiver<bool>) {
    let settle = Duration::from_millis(pipeline.config.settle_ms);
    let mut delay = Duration::from_millis(pipeline.config.candle_poll_ms);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                debug!("candle loop shutting down");
                return;
            }
        }
        let did_work = pipeline.candle_pass();
        delay = if did_work {
            settle
        } else {
            pipeline.idle_delay(Utc::now().timestamp().max(0) as u64)
        };
    }
}

async fn tick_loop(
    pipeline: Arc<Pipeline>,
    mut ticks: mpsc::Receiver<Tick>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let tick = tokio::select! {
            tick = ticks.recv() => match tick {
                Some(t) => t,
                None => {
                    debug!("tick feed closed, tick loop done");
                    return;
                }
            },
            _ = shutdown.changed() => {
                debug!("tick loop shutting down");
                return;
            }
        };
        pipeline.handle_tick(&tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pipwatch_core::{
        PositionSnapshot, Price, Side, SymbolInfo, Ticket, TrendLabel, Volume,
    };
    use pipwatch_exec::ExecConfig;
    use pipwatch_exit::ExitConfig;
    use pipwatch_gateway::{
        GatewayResult, MarketOrderRequest, PendingStopRequest, SimBroker,
    };
    use pipwatch_signal::TrendClassifier;
    use rust_decimal_macros::dec;

    struct Always(TrendLabel);

    impl TrendClassifier for Always {
        fn classify(&self, _candles: &[Candle]) -> TrendLabel {
            self.0
        }
    }

    fn eurusd() -> Symbol {
        Symbol::from("EURUSD")
    }

    fn candle(tf: Timeframe, close: Decimal, minute: i64) -> Candle {
        Candle {
            symbol: eurusd(),
            timeframe: tf,
            open: Price::new(close),
            high: Price::new(close),
            low: Price::new(close),
            close: Price::new(close),
            close_time: Utc.timestamp_opt(1_700_000_000 + minute * 60, 0).unwrap(),
            is_closed: true,
        }
    }

    /// Entry history whose pullback gate passes for period 3 and
    /// lookback 2: old closes under the SMA, last close back above.
    fn seed_entry_history(broker: &SimBroker) {
        for (i, close) in [dec!(1.0), dec!(1.0), dec!(1.1), dec!(1.2), dec!(1.3)]
            .into_iter()
            .enumerate()
        {
            broker.push_candle(candle(Timeframe::M1, close, i as i64));
        }
    }

    fn seed_higher_timeframes(broker: &SimBroker) {
        broker.push_candle(candle(Timeframe::M5, dec!(1.1), 0));
        broker.push_candle(candle(Timeframe::M15, dec!(1.1), 0));
    }

    fn signal_config(n_ticks: u32) -> SignalConfig {
        SignalConfig {
            pullback_period: 3,
            pullback_lookback: 2,
            n_ticks,
            ..SignalConfig::default()
        }
    }

    fn pipeline_with(gateway: Arc<dyn Gateway>, sig: SignalConfig, exit: ExitConfig) -> Pipeline {
        Pipeline {
            config: EngineConfig::default(),
            signal_config: sig.clone(),
            gateway: Arc::clone(&gateway),
            generator: MtfSignalGenerator::new(sig, Arc::new(Always(TrendLabel::Buy))),
            exits: Arc::new(ExitEngine::new(exit, Arc::clone(&gateway))),
            executor: Arc::new(TradeExecutor::new(ExecConfig::default(), gateway)),
            straddles: None,
            confirms: Mutex::new(HashMap::new()),
            pending_entries: Mutex::new(HashMap::new()),
            baselines: Mutex::new(HashMap::new()),
            points: Mutex::new(HashMap::new()),
        }
    }

    fn pipeline(broker: Arc<SimBroker>, sig: SignalConfig) -> Pipeline {
        pipeline_with(broker, sig, ExitConfig::default())
    }

    /// Gateway wrapper recording the order in which entries and
    /// closes reach the broker.
    struct OrderLog {
        inner: Arc<SimBroker>,
        events: Mutex<Vec<&'static str>>,
    }

    impl OrderLog {
        fn new(inner: Arc<SimBroker>) -> Self {
            Self {
                inner,
                events: Mutex::new(Vec::new()),
            }
        }

        fn events(&self) -> Vec<&'static str> {
            self.events.lock().clone()
        }
    }

    impl Gateway for OrderLog {
        fn positions(&self) -> GatewayResult<Vec<PositionSnapshot>> {
            self.inner.positions()
        }

        fn tick(&self, symbol: &Symbol) -> GatewayResult<Tick> {
            self.inner.tick(symbol)
        }

        fn candles(
            &self,
            symbol: &Symbol,
            timeframe: Timeframe,
            count: usize,
        ) -> GatewayResult<Vec<Candle>> {
            self.inner.candles(symbol, timeframe, count)
        }

        fn symbol_info(&self, symbol: &Symbol) -> GatewayResult<SymbolInfo> {
            self.inner.symbol_info(symbol)
        }

        fn atr(&self, symbol: &Symbol, timeframe: Timeframe) -> GatewayResult<Option<Decimal>> {
            self.inner.atr(symbol, timeframe)
        }

        fn place_pending_stop(&self, request: &PendingStopRequest) -> GatewayResult<Ticket> {
            self.inner.place_pending_stop(request)
        }

        fn place_market(&self, request: &MarketOrderRequest) -> GatewayResult<Ticket> {
            self.events.lock().push("entry");
            self.inner.place_market(request)
        }

        fn cancel_order(&self, ticket: Ticket) -> GatewayResult<()> {
            self.inner.cancel_order(ticket)
        }

        fn pending_exists(&self, ticket: Ticket) -> GatewayResult<bool> {
            self.inner.pending_exists(ticket)
        }

        fn close_position(&self, ticket: Ticket, volume: Volume) -> GatewayResult<()> {
            self.events.lock().push("close");
            self.inner.close_position(ticket, volume)
        }
    }

    fn broker_with_quote() -> Arc<SimBroker> {
        let broker = Arc::new(SimBroker::new());
        broker.set_symbol_info(eurusd(), SymbolInfo::new(dec!(0.00001), 5));
        broker.set_tick(Tick::new(
            eurusd(),
            Price::new(dec!(1.30000)),
            Price::new(dec!(1.30002)),
            Utc::now(),
        ));
        broker
    }

    #[test]
    fn test_candle_pass_fires_once_per_new_closed_bar() {
        let broker = broker_with_quote();
        seed_entry_history(&broker);
        seed_higher_timeframes(&broker);
        let pipeline = pipeline(broker.clone(), signal_config(0));

        // First observation only baselines; nothing is traded.
        assert!(!pipeline.candle_pass());
        assert!(broker.market_orders().is_empty());

        // Same closed bar again: nothing.
        assert!(!pipeline.candle_pass());
        assert!(broker.market_orders().is_empty());

        // A new closed bar triggers exactly one entry.
        broker.push_candle(candle(Timeframe::M1, dec!(1.4), 5));
        assert!(pipeline.candle_pass());
        assert_eq!(broker.market_orders().len(), 1);

        // And only that once.
        assert!(!pipeline.candle_pass());
        assert_eq!(broker.market_orders().len(), 1);
    }

    #[test]
    fn test_incomplete_pullback_buffers_entry() {
        let broker = broker_with_quote();
        // Aligned labels but the last close sits under the SMA, so
        // the pullback gate holds the entry.
        for (i, close) in [dec!(1.3), dec!(1.2), dec!(1.1), dec!(1.0), dec!(0.9)]
            .into_iter()
            .enumerate()
        {
            broker.push_candle(candle(Timeframe::M1, close, i as i64));
        }
        seed_higher_timeframes(&broker);
        let pipeline = pipeline(broker.clone(), signal_config(0));

        pipeline.candle_pass();
        broker.push_candle(candle(Timeframe::M1, dec!(0.8), 5));
        assert!(pipeline.candle_pass());

        assert!(broker.market_orders().is_empty());
        assert_eq!(
            pipeline.pending_entries.lock().get(&eurusd()),
            Some(&TrendLabel::Buy)
        );
    }

    #[test]
    fn test_candle_exit_precedes_entry_on_reversal_bar() {
        let broker = broker_with_quote();
        seed_entry_history(&broker);
        seed_higher_timeframes(&broker);
        let log = Arc::new(OrderLog::new(broker.clone()));
        let exit = ExitConfig {
            be_arming_ticks: 1,
            ..ExitConfig::default()
        };
        let pipeline = pipeline_with(log.clone(), signal_config(0), exit);

        // A short in profit, armed by a single tick.
        let ticket = broker.open_position(
            eurusd(),
            Side::Sell,
            Price::new(dec!(2.00000)),
            Volume::new(dec!(0.10)),
        );
        broker.set_profit(ticket, dec!(0.5));
        pipeline.handle_tick(&Tick::new(
            eurusd(),
            Price::new(dec!(1.30000)),
            Price::new(dec!(1.30002)),
            Utc::now(),
        ));

        pipeline.candle_pass();
        broker.push_candle(candle(Timeframe::M1, dec!(1.4), 5));
        pipeline.candle_pass();
        // The next bar closes higher: a reversal against the short.
        // Its close request must reach the broker before the bar's
        // own entry dispatch.
        broker.push_candle(candle(Timeframe::M1, dec!(1.5), 6));
        pipeline.candle_pass();

        assert_eq!(log.events(), vec!["entry", "close", "entry"]);
    }

    #[test]
    fn test_idle_delay_aligns_to_bar_close() {
        let broker = broker_with_quote();
        let pipeline = pipeline(broker, signal_config(0));

        // 30s into an M1 bar: sleep to the boundary plus the settle
        // margin.
        assert_eq!(pipeline.idle_delay(90), Duration::from_millis(30_100));
        // On or just past a boundary: hold the fixed poll cadence
        // while the broker publishes the bar.
        assert_eq!(pipeline.idle_delay(120), Duration::from_millis(1_000));
        assert_eq!(pipeline.idle_delay(121), Duration::from_millis(1_000));
    }

    #[test]
    fn test_ntick_confirmation_defers_entry_to_ticks() {
        let broker = broker_with_quote();
        seed_entry_history(&broker);
        seed_higher_timeframes(&broker);
        let pipeline = pipeline(broker.clone(), signal_config(2));

        pipeline.candle_pass();
        broker.push_candle(candle(Timeframe::M1, dec!(1.4), 5));
        assert!(pipeline.candle_pass());
        // Held pending tick confirmation.
        assert!(broker.market_orders().is_empty());

        let tick = |bid: Decimal| {
            Tick::new(
                eurusd(),
                Price::new(bid),
                Price::new(bid + dec!(0.00002)),
                Utc::now(),
            )
        };
        pipeline.handle_tick(&tick(dec!(1.40001)));
        assert!(broker.market_orders().is_empty());
        pipeline.handle_tick(&tick(dec!(1.40002)));
        assert_eq!(broker.market_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_is_bounded() {
        let broker = broker_with_quote();
        seed_entry_history(&broker);
        seed_higher_timeframes(&broker);
        let gateway: Arc<dyn Gateway> = broker;
        let sig = signal_config(0);
        let mut orchestrator = Orchestrator::new(
            EngineConfig::default(),
            sig.clone(),
            Arc::clone(&gateway),
            MtfSignalGenerator::new(sig, Arc::new(Always(TrendLabel::Buy))),
            Arc::new(ExitEngine::new(ExitConfig::default(), Arc::clone(&gateway))),
            Arc::new(TradeExecutor::new(ExecConfig::default(), gateway)),
            None,
        );

        orchestrator.start();
        orchestrator.start();
        assert!(orchestrator.is_running());

        orchestrator.stop().await;
        assert!(!orchestrator.is_running());
    }
}
