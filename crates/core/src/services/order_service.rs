use log::{debug, info};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::holding::Holding;
use crate::models::order::{Order, OrderMode, OrderTicket, PlaceOrder};
use crate::services::quote_service::QuoteService;
use crate::storage::store::{TradingStore, Transaction};

/// Executes buy/sell orders against a user's holdings and cash balance.
///
/// Every order is one store transaction: the holding update, the balance
/// update and the order log entry are committed together or not at all.
/// All preconditions are checked before anything is staged.
pub struct OrderService {
    store: Arc<TradingStore>,
    quotes: Arc<QuoteService>,
}

impl OrderService {
    pub fn new(store: Arc<TradingStore>, quotes: Arc<QuoteService>) -> Self {
        Self { store, quotes }
    }

    /// Validate, price and execute an order for `user_id`.
    pub async fn place_order(&self, user_id: Uuid, request: &PlaceOrder) -> Result<Order, CoreError> {
        let ticket = request.validate()?;
        // Price is resolved outside the lock; the transaction itself never awaits.
        let price = self.quotes.current_price(&ticket.symbol).await?;

        let result = self
            .store
            .transact(|tx| Self::execute(tx, user_id, &ticket, price))
            .await;

        match &result {
            Ok(order) => info!(
                "Executed {} {} {} @ {:.2} for user {}",
                order.mode, order.qty, order.symbol, order.price, user_id
            ),
            Err(e) => debug!(
                "Rejected {} {} {} for user {}: {e}",
                ticket.mode, ticket.qty, ticket.symbol, user_id
            ),
        }
        result
    }

    fn execute(
        tx: &mut Transaction<'_>,
        user_id: Uuid,
        ticket: &OrderTicket,
        price: f64,
    ) -> Result<Order, CoreError> {
        let mut user = tx.user(user_id)?;
        let notional = ticket.qty as f64 * price;

        match ticket.mode {
            OrderMode::Buy => {
                let affordable = user.balance.is_finite() && notional <= user.balance;
                if !affordable {
                    return Err(CoreError::InsufficientFunds {
                        required: notional,
                        available: user.balance,
                    });
                }

                let holding = match tx.holding(user_id, &ticket.symbol) {
                    Some(mut h) => {
                        h.add(ticket.qty, price);
                        h
                    }
                    None => Holding::new(user_id, &ticket.symbol, ticket.qty, price),
                };
                tx.put_holding(holding);
                user.balance -= notional;
            }
            OrderMode::Sell => {
                let held = tx.holding(user_id, &ticket.symbol);
                let held_qty = held.as_ref().map_or(0, |h| h.quantity);
                let Some(mut holding) = held.filter(|h| h.quantity >= ticket.qty) else {
                    return Err(CoreError::InsufficientHoldings {
                        symbol: ticket.symbol.clone(),
                        requested: ticket.qty,
                        held: held_qty,
                    });
                };

                holding.remove(ticket.qty);
                if holding.quantity == 0 {
                    tx.remove_holding(user_id, &ticket.symbol);
                } else {
                    tx.put_holding(holding);
                }
                user.balance += notional;
            }
        }

        tx.put_user(user);
        let order = Order::executed(ticket, user_id, price);
        tx.append_order(order.clone());
        Ok(order)
    }

    /// Order history for a user, newest first.
    pub async fn orders_for(&self, user_id: Uuid) -> Vec<Order> {
        self.store.orders_for(user_id).await
    }
}
