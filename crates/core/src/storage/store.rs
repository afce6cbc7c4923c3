use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::holding::Holding;
use crate::models::order::Order;
use crate::models::user::User;

/// Key of a holding: one row per (user, uppercase symbol).
pub type HoldingKey = (Uuid, String);

/// Everything the desk persists. Serialized as a whole into snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    pub users: HashMap<Uuid, User>,
    pub holdings: HashMap<HoldingKey, Holding>,
    /// Append-only, oldest first
    pub orders: Vec<Order>,
}

/// Writes staged by a transaction, applied only on commit.
#[derive(Default)]
struct Staged {
    users: HashMap<Uuid, User>,
    /// `None` = delete
    holdings: HashMap<HoldingKey, Option<Holding>>,
    orders: Vec<Order>,
}

/// A unit of work over users, holdings and the order log.
///
/// Reads see committed state overlaid with this transaction's own writes.
/// Writes are buffered; `TradingStore::transact` applies them all if the
/// closure returns `Ok` and discards them all otherwise.
pub struct Transaction<'a> {
    state: &'a StoreState,
    staged: Staged,
}

impl<'a> Transaction<'a> {
    fn new(state: &'a StoreState) -> Self {
        Self {
            state,
            staged: Staged::default(),
        }
    }

    pub fn user(&self, id: Uuid) -> Result<User, CoreError> {
        self.staged
            .users
            .get(&id)
            .or_else(|| self.state.users.get(&id))
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("User {id}")))
    }

    pub fn put_user(&mut self, user: User) {
        self.staged.users.insert(user.id, user);
    }

    pub fn holding(&self, user_id: Uuid, symbol: &str) -> Option<Holding> {
        let key = (user_id, symbol.to_uppercase());
        match self.staged.holdings.get(&key) {
            Some(staged) => staged.clone(),
            None => self.state.holdings.get(&key).cloned(),
        }
    }

    pub fn put_holding(&mut self, holding: Holding) {
        let key = (holding.user_id, holding.symbol.to_uppercase());
        self.staged.holdings.insert(key, Some(holding));
    }

    pub fn remove_holding(&mut self, user_id: Uuid, symbol: &str) {
        self.staged
            .holdings
            .insert((user_id, symbol.to_uppercase()), None);
    }

    pub fn append_order(&mut self, order: Order) {
        self.staged.orders.push(order);
    }

    fn into_staged(self) -> Staged {
        self.staged
    }
}

impl Staged {
    fn apply(self, state: &mut StoreState) {
        state.users.extend(self.users);
        for (key, holding) in self.holdings {
            match holding {
                Some(h) => {
                    state.holdings.insert(key, h);
                }
                None => {
                    state.holdings.remove(&key);
                }
            }
        }
        state.orders.extend(self.orders);
    }
}

/// In-memory document store for users, holdings and orders.
///
/// All mutations go through the write lock, so transactions are serialized
/// and never observe each other's partial writes.
pub struct TradingStore {
    state: RwLock<StoreState>,
    /// Set by every committed mutation, cleared when a snapshot is taken.
    dirty: AtomicBool,
}

impl TradingStore {
    pub fn new() -> Self {
        Self::from_state(StoreState::default())
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
            dirty: AtomicBool::new(false),
        }
    }

    /// Run `f` as one all-or-nothing unit under the write lock.
    pub async fn transact<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, CoreError>,
    {
        let mut guard = self.state.write().await;
        let (result, staged) = {
            let mut tx = Transaction::new(&guard);
            let result = f(&mut tx);
            (result, tx.into_staged())
        };
        if result.is_ok() {
            staged.apply(&mut guard);
            self.dirty.store(true, Ordering::SeqCst);
        }
        result
    }

    /// Insert a new user, rejecting duplicate usernames or emails (case-insensitive).
    pub async fn insert_user(&self, user: User) -> Result<(), CoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.users.values().find(|u| {
            u.username.eq_ignore_ascii_case(&user.username)
                || u.email.eq_ignore_ascii_case(&user.email)
        }) {
            let field = if existing.username.eq_ignore_ascii_case(&user.username) {
                "Username"
            } else {
                "Email"
            };
            return Err(CoreError::Conflict(format!("{field} is already registered")));
        }
        state.users.insert(user.id, user);
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn user(&self, id: Uuid) -> Option<User> {
        self.state.read().await.users.get(&id).cloned()
    }

    /// Find a user by username or email (case-insensitive).
    pub async fn find_user_by_login(&self, login: &str) -> Option<User> {
        let login = login.trim();
        self.state
            .read()
            .await
            .users
            .values()
            .find(|u| u.matches_login(login))
            .cloned()
    }

    pub async fn holding(&self, user_id: Uuid, symbol: &str) -> Option<Holding> {
        self.state
            .read()
            .await
            .holdings
            .get(&(user_id, symbol.to_uppercase()))
            .cloned()
    }

    /// A user's holdings sorted by symbol.
    pub async fn holdings_for(&self, user_id: Uuid) -> Vec<Holding> {
        let state = self.state.read().await;
        let mut holdings: Vec<Holding> = state
            .holdings
            .values()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        holdings.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        holdings
    }

    /// A user's orders, newest first.
    pub async fn orders_for(&self, user_id: Uuid) -> Vec<Order> {
        let state = self.state.read().await;
        state
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Copy of the full state for persistence. Clears the dirty flag first so
    /// writes racing with the copy mark the store dirty again.
    pub async fn snapshot(&self) -> StoreState {
        self.dirty.store(false, Ordering::SeqCst);
        self.state.read().await.clone()
    }

    /// Put the dirty flag back after a failed save.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }
}

impl Default for TradingStore {
    fn default() -> Self {
        Self::new()
    }
}
