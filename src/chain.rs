//! Game-contract seam.
//!
//! The contract is external and fixed; [`GameContract`] is its surface and
//! [`MemoryContract`] a local stand-in. [`ChainClient`] is the one handle
//! front ends hold: built once, connected to a wallet, passed by reference.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::Score;
use crate::leaderboard::GameType;
use crate::prize_pool::{self, PurchaseEvent};
use crate::storage::KvStore;

/// Amounts in wei (18 decimals).
pub type Amount = u128;

pub const WEI_PER_XPL: Amount = 1_000_000_000_000_000_000;
/// 0.001 XPL.
pub const DEFAULT_GAME_PRICE: Amount = WEI_PER_XPL / 1000;
pub const FALLBACK_PRICE_DISPLAY: &str = "0.001 XPL";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("wallet not connected")]
    NotConnected,
    #[error("invalid address format: {0}")]
    InvalidAddress(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("insufficient funds: need {needed} wei, have {available} wei")]
    InsufficientFunds { needed: Amount, available: Amount },
    #[error("payment of {paid} wei is below the game price of {price} wei")]
    Underpaid { paid: Amount, price: Amount },
    #[error("unknown game {0}")]
    UnknownGame(GameId),
    #[error("game {0} belongs to another player")]
    NotOwner(GameId),
    #[error("game {0} already completed")]
    AlreadyCompleted(GameId),
    #[error("contract call failed: {0}")]
    Rejected(String),
}

/// `0x` followed by 40 hex digits. Keeps the caller's casing for display and
/// compares case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn as_str(&self) -> &str { &self.0 }

    /// Lowercased form, used in storage keys.
    pub fn key(&self) -> String { self.0.to_ascii_lowercase() }

    /// First `n` characters, including the `0x`.
    pub fn prefix(&self, n: usize) -> &str { &self.0[..n.min(self.0.len())] }

    /// `0x1234...abcd`
    pub fn short(&self) -> String {
        format!("{}...{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl FromStr for WalletAddress {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
        match hex {
            Some(h) if h.len() == 40 && h.bytes().all(|b| b.is_ascii_hexdigit()) => Ok(WalletAddress(format!("0x{h}"))),
            _ => Err(ChainError::InvalidAddress(s.to_string())),
        }
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = ChainError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl From<WalletAddress> for String {
    fn from(w: WalletAddress) -> Self { w.0 }
}

impl PartialEq for WalletAddress {
    fn eq(&self, other: &Self) -> bool { self.0.eq_ignore_ascii_case(&other.0) }
}

impl Eq for WalletAddress {}

impl Hash for WalletAddress {
    fn hash<H: Hasher>(&self, state: &mut H) { self.key().hash(state) }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Full-precision ether formatting with trailing zeros trimmed: `0.001`, `1.0`.
pub fn format_ether(amount: Amount) -> String {
    let whole = amount / WEI_PER_XPL;
    let frac = amount % WEI_PER_XPL;
    if frac == 0 {
        return format!("{whole}.0");
    }
    let digits = format!("{frac:018}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Four-decimal balance display, rounded half up: `0.0010 XPL`.
pub fn format_xpl(amount: Amount) -> String {
    const STEP: Amount = WEI_PER_XPL / 10_000;
    let units = amount.saturating_add(STEP / 2) / STEP;
    format!("{}.{:04} XPL", units / 10_000, units % 10_000)
}

/// Parse a decimal XPL amount (`"0.001"`, `"2"`, `"1.5 XPL"`) into wei.
pub fn parse_xpl(text: &str) -> Result<Amount, ChainError> {
    let invalid = || ChainError::InvalidAmount(text.to_string());
    let t = text.trim();
    let t = t.strip_suffix("XPL").map(str::trim_end).unwrap_or(t);
    let (whole, frac) = t.split_once('.').unwrap_or((t, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > 18 || !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let whole: Amount = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let frac_wei: Amount = if frac.is_empty() { 0 } else { format!("{frac:0<18}").parse().map_err(|_| invalid())? };
    whole.checked_mul(WEI_PER_XPL).and_then(|w| w.checked_add(frac_wei)).ok_or_else(invalid)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub total_games: u64,
    pub best_score: Score,
    pub total_spent: Amount,
}

/// The fixed on-chain game contract.
pub trait GameContract {
    fn game_price(&self) -> Result<Amount, ChainError>;
    /// Pay `value` and receive a fresh game id.
    fn purchase_game(&mut self, player: &WalletAddress, value: Amount) -> Result<GameId, ChainError>;
    fn complete_game(&mut self, player: &WalletAddress, game_id: GameId, score: Score, max_tile: u32) -> Result<(), ChainError>;
    fn player_stats(&self, player: &WalletAddress) -> Result<PlayerStats, ChainError>;
    fn balance(&self, player: &WalletAddress) -> Result<Amount, ChainError>;
}

#[derive(Debug, Clone)]
struct GameRecord {
    player: WalletAddress,
    completed: bool,
}

/// In-process contract with balances, per-player stats and monotonic ids.
#[derive(Debug, Clone)]
pub struct MemoryContract {
    price: Amount,
    next_id: u64,
    games: HashMap<GameId, GameRecord>,
    stats: HashMap<WalletAddress, PlayerStats>,
    balances: HashMap<WalletAddress, Amount>,
    offline: bool,
}

impl Default for MemoryContract {
    fn default() -> Self { Self::new(DEFAULT_GAME_PRICE) }
}

impl MemoryContract {
    pub fn new(price: Amount) -> Self {
        Self {
            price,
            next_id: 1,
            games: HashMap::new(),
            stats: HashMap::new(),
            balances: HashMap::new(),
            offline: false,
        }
    }

    /// Credit `amount` wei to `player`.
    pub fn fund(&mut self, player: &WalletAddress, amount: Amount) {
        *self.balances.entry(player.clone()).or_insert(0) += amount;
    }

    /// Make every call fail, as an unreachable RPC endpoint would.
    pub fn set_offline(&mut self, offline: bool) { self.offline = offline; }

    fn reachable(&self) -> Result<(), ChainError> {
        if self.offline {
            return Err(ChainError::Rejected("contract unreachable".into()));
        }
        Ok(())
    }
}

impl GameContract for MemoryContract {
    fn game_price(&self) -> Result<Amount, ChainError> {
        self.reachable()?;
        Ok(self.price)
    }

    fn purchase_game(&mut self, player: &WalletAddress, value: Amount) -> Result<GameId, ChainError> {
        self.reachable()?;
        if value < self.price {
            return Err(ChainError::Underpaid { paid: value, price: self.price });
        }
        let balance = self.balances.entry(player.clone()).or_insert(0);
        if *balance < value {
            return Err(ChainError::InsufficientFunds { needed: value, available: *balance });
        }
        *balance -= value;
        let id = GameId(self.next_id);
        self.next_id += 1;
        self.games.insert(id, GameRecord { player: player.clone(), completed: false });
        let stats = self.stats.entry(player.clone()).or_default();
        stats.total_games += 1;
        stats.total_spent += value;
        Ok(id)
    }

    fn complete_game(&mut self, player: &WalletAddress, game_id: GameId, score: Score, _max_tile: u32) -> Result<(), ChainError> {
        self.reachable()?;
        let record = self.games.get_mut(&game_id).ok_or(ChainError::UnknownGame(game_id))?;
        if record.player != *player {
            return Err(ChainError::NotOwner(game_id));
        }
        if record.completed {
            return Err(ChainError::AlreadyCompleted(game_id));
        }
        record.completed = true;
        let stats = self.stats.entry(player.clone()).or_default();
        stats.best_score = stats.best_score.max(score);
        Ok(())
    }

    fn player_stats(&self, player: &WalletAddress) -> Result<PlayerStats, ChainError> {
        self.reachable()?;
        Ok(self.stats.get(player).copied().unwrap_or_default())
    }

    fn balance(&self, player: &WalletAddress) -> Result<Amount, ChainError> {
        self.reachable()?;
        Ok(self.balances.get(player).copied().unwrap_or(0))
    }
}

/// Result of [`ChainClient::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub address: WalletAddress,
    pub balance: String,
}

/// Wallet-bound handle over a [`GameContract`].
#[derive(Debug)]
pub struct ChainClient<C> {
    contract: C,
    contract_address: Option<WalletAddress>,
    address: Option<WalletAddress>,
}

impl<C: GameContract> ChainClient<C> {
    pub fn new(contract: C, contract_address: Option<WalletAddress>) -> Self {
        Self { contract, contract_address, address: None }
    }

    pub fn contract(&self) -> &C { &self.contract }

    pub fn contract_mut(&mut self) -> &mut C { &mut self.contract }

    pub fn contract_address(&self) -> Option<&WalletAddress> { self.contract_address.as_ref() }

    pub fn connect(&mut self, address: &str) -> Result<Connection, ChainError> {
        let address: WalletAddress = address.parse()?;
        let balance = self.contract.balance(&address)?;
        info!(address = %address.short(), "wallet connected");
        self.address = Some(address.clone());
        Ok(Connection { address, balance: format_xpl(balance) })
    }

    pub fn disconnect(&mut self) { self.address = None; }

    pub fn is_connected(&self) -> bool { self.address.is_some() }

    pub fn address(&self) -> Option<&WalletAddress> { self.address.as_ref() }

    /// `0x1234...abcd`, or empty when disconnected.
    pub fn formatted_address(&self) -> String {
        self.address.as_ref().map(WalletAddress::short).unwrap_or_default()
    }

    fn connected(&self) -> Result<&WalletAddress, ChainError> {
        self.address.as_ref().ok_or(ChainError::NotConnected)
    }

    /// Look up the price, pay it, and record a purchase event in `store`.
    /// A failed event write is logged and does not undo the purchase.
    pub fn purchase_game<S: KvStore + ?Sized>(
        &mut self,
        store: &mut S,
        game_type: GameType,
        now: DateTime<Utc>,
    ) -> Result<GameId, ChainError> {
        let player = self.connected()?.clone();
        let price = self.contract.game_price()?;
        debug!(price = %format_ether(price), "purchasing game");
        let game_id = self.contract.purchase_game(&player, price)?;
        let event = PurchaseEvent { wallet_address: player.clone(), amount: price, timestamp: now, game_type };
        if let Err(e) = prize_pool::record_purchase(store, event) {
            warn!(error = %e, game_id = %game_id, "purchase event not saved");
        }
        info!(game_id = %game_id, player = %player.short(), "game purchased");
        Ok(game_id)
    }

    pub fn complete_game(&mut self, game_id: GameId, score: Score, max_tile: u32) -> Result<(), ChainError> {
        let player = self.connected()?.clone();
        self.contract.complete_game(&player, game_id, score, max_tile)?;
        info!(game_id = %game_id, score, max_tile, "game completed on chain");
        Ok(())
    }

    /// Stats for `address` (or the connected wallet); zeros when the lookup fails.
    pub fn player_stats(&self, address: Option<&WalletAddress>) -> PlayerStats {
        let target = match address.or(self.address.as_ref()) {
            Some(a) => a,
            None => {
                warn!("player stats requested without an address");
                return PlayerStats::default();
            }
        };
        match self.contract.player_stats(target) {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "player stats unavailable");
                PlayerStats::default()
            }
        }
    }

    pub fn game_price_display(&self) -> String {
        match self.contract.game_price() {
            Ok(price) => format!("{} XPL", format_ether(price)),
            Err(e) => {
                warn!(error = %e, "game price unavailable");
                FALLBACK_PRICE_DISPLAY.to_string()
            }
        }
    }

    pub fn balance_display(&self) -> Result<String, ChainError> {
        let player = self.connected()?;
        match self.contract.balance(player) {
            Ok(balance) => Ok(format_xpl(balance)),
            Err(e) => {
                warn!(error = %e, "balance unavailable");
                Ok("0 XPL".to_string())
            }
        }
    }
}
