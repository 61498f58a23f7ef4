//! Straddle group bookkeeping and the per-tick liveness sweep.

use crate::OcoConfig;
use parking_lot::Mutex;
use pipwatch_core::{Side, Symbol, Ticket, Volume};
use pipwatch_gateway::{Gateway, PendingStopRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One active buy-stop/sell-stop pair. A leg goes `None` once it is
/// no longer pending at the broker.
#[derive(Debug, Clone)]
pub struct StraddleGroup {
    pub group_id: Uuid,
    pub symbol: Symbol,
    pub volume: Volume,
    pub buy_leg: Option<Ticket>,
    pub sell_leg: Option<Ticket>,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl StraddleGroup {
    fn legs(&self) -> impl Iterator<Item = Ticket> {
        self.buy_leg.into_iter().chain(self.sell_leg)
    }
}

pub struct StraddleManager {
    config: OcoConfig,
    gateway: Arc<dyn Gateway>,
    groups: Mutex<Vec<StraddleGroup>>,
}

impl StraddleManager {
    pub fn new(config: OcoConfig, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            config,
            gateway,
            groups: Mutex::new(Vec::new()),
        }
    }

    /// Place both legs around the current quote. The leg offset is
    /// the configured pip distance or the broker's minimum stop
    /// distance, whichever is larger. If the second leg fails to
    /// submit the first is cancelled best-effort and no group is
    /// created.
    pub fn place_straddle(&self, symbol: &Symbol, volume: Volume) -> Option<StraddleGroup> {
        let tick = match self.gateway.tick(symbol) {
            Ok(t) => t,
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "straddle skipped, no quote");
                return None;
            }
        };
        let info = match self.gateway.symbol_info(symbol) {
            Ok(i) => i,
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "straddle skipped, no symbol info");
                return None;
            }
        };

        let offset = info
            .pips_to_price(self.config.offset_pips)
            .max(info.min_stop_distance());
        let buy_price = info.normalize(tick.ask + offset);
        let sell_price = info.normalize(tick.bid - offset);
        let group_id = Uuid::new_v4();
        let comment = format!("straddle:{group_id}");

        let buy_leg = match self.gateway.place_pending_stop(&PendingStopRequest {
            symbol: symbol.clone(),
            side: Side::Buy,
            volume,
            price: buy_price,
            stop_loss: None,
            take_profit: None,
            comment: comment.clone(),
        }) {
            Ok(t) => t,
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "buy leg rejected, no straddle");
                return None;
            }
        };

        let sell_leg = match self.gateway.place_pending_stop(&PendingStopRequest {
            symbol: symbol.clone(),
            side: Side::Sell,
            volume,
            price: sell_price,
            stop_loss: None,
            take_profit: None,
            comment,
        }) {
            Ok(t) => t,
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "sell leg rejected, rolling back buy leg");
                if let Err(cancel_err) = self.gateway.cancel_order(buy_leg) {
                    warn!(ticket = %buy_leg, error = %cancel_err, "rollback cancel failed");
                }
                return None;
            }
        };

        let now = Instant::now();
        let group = StraddleGroup {
            group_id,
            symbol: symbol.clone(),
            volume,
            buy_leg: Some(buy_leg),
            sell_leg: Some(sell_leg),
            created_at: now,
            expires_at: now + Duration::from_secs(self.config.expiry_secs),
        };
        info!(
            group = %group_id,
            symbol = %symbol,
            buy = %buy_leg,
            sell = %sell_leg,
            buy_price = %buy_price,
            sell_price = %sell_price,
            "straddle placed"
        );
        self.groups.lock().push(group.clone());
        Some(group)
    }

    /// Reconcile every active group against the broker's pending
    /// list. Called from the tick path.
    pub fn on_tick(&self) {
        let mut groups = std::mem::take(&mut *self.groups.lock());
        let now = Instant::now();
        groups.retain_mut(|group| self.sweep_group(group, now));
        self.groups.lock().extend(groups);
    }

    /// Returns false when the group is finished and should be
    /// dropped.
    fn sweep_group(&self, group: &mut StraddleGroup, now: Instant) -> bool {
        if now >= group.expires_at {
            for leg in group.legs() {
                self.cancel_leg(group.group_id, leg);
            }
            info!(group = %group.group_id, "straddle expired, legs cancelled");
            return false;
        }

        // Refresh leg liveness; "no longer pending" means filled or
        // externally cancelled.
        for leg in [&mut group.buy_leg, &mut group.sell_leg] {
            if let Some(ticket) = *leg {
                match self.gateway.pending_exists(ticket) {
                    Ok(true) => {}
                    Ok(false) => *leg = None,
                    Err(err) => {
                        debug!(ticket = %ticket, error = %err, "pending check failed, keeping leg");
                    }
                }
            }
        }

        match (group.buy_leg, group.sell_leg) {
            (Some(_), Some(_)) => true,
            (Some(survivor), None) | (None, Some(survivor)) => {
                self.cancel_leg(group.group_id, survivor);
                info!(group = %group.group_id, cancelled = %survivor, "one leg resolved, other cancelled");
                false
            }
            (None, None) => {
                debug!(group = %group.group_id, "both legs resolved, group dropped");
                false
            }
        }
    }

    /// Cancel a whole group by id. Returns whether the group existed.
    pub fn cancel_group(&self, group_id: Uuid) -> bool {
        let group = {
            let mut groups = self.groups.lock();
            match groups.iter().position(|g| g.group_id == group_id) {
                Some(idx) => groups.swap_remove(idx),
                None => return false,
            }
        };
        for leg in group.legs() {
            self.cancel_leg(group_id, leg);
        }
        true
    }

    fn cancel_leg(&self, group_id: Uuid, ticket: Ticket) {
        if let Err(err) = self.gateway.cancel_order(ticket) {
            debug!(group = %group_id, ticket = %ticket, error = %err, "leg cancel failed");
        }
    }

    pub fn active_groups(&self) -> Vec<StraddleGroup> {
        self.groups.lock().clone()
    }
}
