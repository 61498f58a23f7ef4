//! Application wiring.
//!
//! Builds the gateway, signal pipeline, exit engine, executor and
//! straddle manager from one [`AppConfig`] and runs the orchestrator
//! until ctrl-c. Runs against the paper gateway; a terminal bridge
//! drops in behind the same `Gateway` trait.

use crate::config::AppConfig;
use crate::error::AppResult;
use pipwatch_engine::Orchestrator;
use pipwatch_exec::TradeExecutor;
use pipwatch_exit::ExitEngine;
use pipwatch_gateway::{Gateway, SimBroker};
use pipwatch_oco::StraddleManager;
use pipwatch_signal::{MtfSignalGenerator, SmaCrossClassifier};
use std::sync::Arc;
use tracing::info;

pub struct Application {
    orchestrator: Orchestrator,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let gateway: Arc<dyn Gateway> = Arc::new(SimBroker::new());

        let generator = MtfSignalGenerator::new(
            config.signal.clone(),
            Arc::new(SmaCrossClassifier::default()),
        );
        let exits = Arc::new(ExitEngine::new(config.exit.clone(), Arc::clone(&gateway)));
        let executor = Arc::new(TradeExecutor::new(config.exec.clone(), Arc::clone(&gateway)));
        let straddles = Arc::new(StraddleManager::new(
            config.oco.clone(),
            Arc::clone(&gateway),
        ));

        let orchestrator = Orchestrator::new(
            config.engine.clone(),
            config.signal.clone(),
            gateway,
            generator,
            exits,
            executor,
            Some(straddles),
        );

        Ok(Self { orchestrator })
    }

    /// Run until ctrl-c, then shut the pipeline down cleanly.
    pub async fn run(&mut self) -> AppResult<()> {
        self.orchestrator.start();

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");

        self.orchestrator.stop().await;
        Ok(())
    }
}
