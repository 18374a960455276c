//! Leaderboards kept as JSON lists in a [`KvStore`].
//!
//! Every entry is appended to all three window lists of its game type
//! (`leaderboard_{game}_{window}`). Views filter the window's list at read
//! time, sort by ranking score (descending, stable) and keep the top entries.
//! Quiz entries are also mirrored into the legacy `leaderboard_{window}` lists.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::chain::WalletAddress;
use crate::engine::{Score, WINNING_TILE};
use crate::quiz::{Points, QuizResults};
use crate::storage::{KvStore, KvStoreExt, StorageError};

pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
    #[serde(rename = "quiz")]
    Quiz,
    #[serde(rename = "2048")]
    Arcade,
    #[serde(rename = "xpl-quiz")]
    XplQuiz,
}

impl GameType {
    pub const ALL: [GameType; 3] = [GameType::Quiz, GameType::Arcade, GameType::XplQuiz];

    pub fn as_str(self) -> &'static str {
        match self {
            GameType::Quiz => "quiz",
            GameType::Arcade => "2048",
            GameType::XplQuiz => "xpl-quiz",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for GameType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quiz" => Ok(GameType::Quiz),
            "2048" | "arcade" => Ok(GameType::Arcade),
            "xpl-quiz" | "xpl" => Ok(GameType::XplQuiz),
            other => Err(format!("unknown game type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Global,
    Weekly,
    Daily,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Global, Window::Weekly, Window::Daily];

    pub fn as_str(self) -> &'static str {
        match self {
            Window::Global => "global",
            Window::Weekly => "weekly",
            Window::Daily => "daily",
        }
    }

    /// Whether an entry stamped `at` belongs in this window as seen at `now`.
    ///
    /// Weekly starts at Monday 00:00 UTC; daily compares calendar dates in `local`.
    pub fn includes(self, at: DateTime<Utc>, now: DateTime<Utc>, local: FixedOffset) -> bool {
        match self {
            Window::Global => true,
            Window::Weekly => at >= week_start(now),
            Window::Daily => at.with_timezone(&local).date_naive() == now.with_timezone(&local).date_naive(),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "global" | "all" => Ok(Window::Global),
            "weekly" | "week" => Ok(Window::Weekly),
            "daily" | "day" | "today" => Ok(Window::Daily),
            other => Err(format!("unknown window: {other}")),
        }
    }
}

/// Most recent Monday 00:00 UTC at or before `now`.
pub fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    Utc.from_utc_datetime(&monday.and_time(NaiveTime::default()))
}

pub fn list_key(game: GameType, window: Window) -> String {
    format!("leaderboard_{}_{}", game.as_str(), window.as_str())
}

pub fn legacy_key(window: Window) -> String {
    format!("leaderboard_{}", window.as_str())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizEntry {
    pub nickname: String,
    pub points: Points,
    pub streak: u32,
    pub questions_answered: u32,
    pub correct_answers: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<WalletAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games_played: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcadeEntry {
    pub nickname: String,
    pub score: Score,
    pub max_tile: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<WalletAddress>,
    #[serde(default = "one")]
    pub games_played: u32,
    #[serde(default)]
    pub times_reached_2048: u32,
}

fn one() -> u32 { 1 }

/// A row on one of the boards, tagged by `gameType` in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gameType")]
pub enum LeaderboardEntry {
    #[serde(rename = "quiz")]
    Quiz(QuizEntry),
    #[serde(rename = "xpl-quiz")]
    XplQuiz(QuizEntry),
    #[serde(rename = "2048")]
    Arcade(ArcadeEntry),
}

impl LeaderboardEntry {
    pub fn game_type(&self) -> GameType {
        match self {
            LeaderboardEntry::Quiz(_) => GameType::Quiz,
            LeaderboardEntry::XplQuiz(_) => GameType::XplQuiz,
            LeaderboardEntry::Arcade(_) => GameType::Arcade,
        }
    }

    /// Points in tenths for quizzes, score for 2048.
    pub fn ranking_score(&self) -> u64 {
        match self {
            LeaderboardEntry::Quiz(e) | LeaderboardEntry::XplQuiz(e) => u64::from(e.points.tenths()),
            LeaderboardEntry::Arcade(e) => e.score,
        }
    }

    pub fn nickname(&self) -> &str {
        match self {
            LeaderboardEntry::Quiz(e) | LeaderboardEntry::XplQuiz(e) => &e.nickname,
            LeaderboardEntry::Arcade(e) => &e.nickname,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LeaderboardEntry::Quiz(e) | LeaderboardEntry::XplQuiz(e) => e.timestamp,
            LeaderboardEntry::Arcade(e) => e.timestamp,
        }
    }

    pub fn wallet_address(&self) -> Option<&WalletAddress> {
        match self {
            LeaderboardEntry::Quiz(e) | LeaderboardEntry::XplQuiz(e) => e.wallet_address.as_ref(),
            LeaderboardEntry::Arcade(e) => e.wallet_address.as_ref(),
        }
    }

    fn belongs_to(&self, wallet: &WalletAddress) -> bool {
        self.wallet_address() == Some(wallet)
    }

    /// Ranking score rendered for display: `2.1` for quizzes, `4096` for 2048.
    pub fn display_score(&self) -> String {
        match self {
            LeaderboardEntry::Quiz(e) | LeaderboardEntry::XplQuiz(e) => e.points.to_string(),
            LeaderboardEntry::Arcade(e) => e.score.to_string(),
        }
    }
}

/// Sort descending by ranking score (ties keep insertion order) and keep `limit`.
pub fn rank(mut entries: Vec<LeaderboardEntry>, limit: usize) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| b.ranking_score().cmp(&a.ranking_score()));
    entries.truncate(limit);
    entries
}

/// Leaderboard policy: how many rows a view shows and which clock the daily window uses.
#[derive(Debug, Clone, Copy)]
pub struct Leaderboard {
    pub limit: usize,
    pub local_offset: FixedOffset,
}

impl Default for Leaderboard {
    fn default() -> Self {
        Self { limit: DEFAULT_LIMIT, local_offset: Utc.fix() }
    }
}

impl Leaderboard {
    pub fn new(limit: usize, local_offset: FixedOffset) -> Self { Self { limit, local_offset } }

    /// Raw list stored under `key`. Rows written without a `gameType` tag are
    /// read as `game`.
    pub fn load_list<S: KvStore + ?Sized>(store: &S, key: &str, game: GameType) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let rows: Vec<Value> = store.get_list(key)?;
        rows.into_iter()
            .map(|mut row| {
                if let Value::Object(map) = &mut row {
                    map.entry("gameType").or_insert_with(|| Value::String(game.as_str().to_string()));
                }
                serde_json::from_value(row).map_err(StorageError::from)
            })
            .collect()
    }

    /// Append `entry` to every window list of its game type.
    pub fn add<S: KvStore + ?Sized>(&self, store: &mut S, entry: LeaderboardEntry) -> Result<(), StorageError> {
        let game = entry.game_type();
        for window in Window::ALL {
            let key = list_key(game, window);
            let mut list = Self::load_list(store, &key, game)?;
            list.push(entry.clone());
            store.set_json(&key, &list)?;
            if game == GameType::Quiz {
                let key = legacy_key(window);
                let mut legacy = Self::load_list(store, &key, game)?;
                legacy.push(entry.clone());
                store.set_json(&key, &legacy)?;
            }
        }
        debug!(game = %game, nickname = entry.nickname(), score = entry.ranking_score(), "leaderboard entry added");
        Ok(())
    }

    /// Ranked rows of `game` in `window` as seen at `now`.
    pub fn view<S: KvStore + ?Sized>(
        &self,
        store: &S,
        game: GameType,
        window: Window,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let list = Self::load_list(store, &list_key(game, window), game)?;
        let filtered = list
            .into_iter()
            .filter(|e| window.includes(e.timestamp(), now, self.local_offset))
            .collect();
        Ok(rank(filtered, self.limit))
    }

    /// Legacy quiz view (`leaderboard_{window}`).
    pub fn legacy_view<S: KvStore + ?Sized>(
        &self,
        store: &S,
        window: Window,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let list = Self::load_list(store, &legacy_key(window), GameType::Quiz)?;
        let filtered = list
            .into_iter()
            .filter(|e| window.includes(e.timestamp(), now, self.local_offset))
            .collect();
        Ok(rank(filtered, self.limit))
    }

    /// Replace the wallet's row in every window list where it appears.
    fn replace_wallet_rows<S: KvStore + ?Sized>(
        store: &mut S,
        game: GameType,
        wallet: &WalletAddress,
        updated: &LeaderboardEntry,
    ) -> Result<(), StorageError> {
        for window in Window::ALL {
            let key = list_key(game, window);
            let mut list = Self::load_list(store, &key, game)?;
            if let Some(row) = list.iter_mut().find(|e| e.belongs_to(wallet)) {
                *row = updated.clone();
                store.set_json(&key, &list)?;
            }
        }
        Ok(())
    }

    fn find_global<S: KvStore + ?Sized>(
        store: &S,
        game: GameType,
        wallet: &WalletAddress,
    ) -> Result<Option<LeaderboardEntry>, StorageError> {
        let list = Self::load_list(store, &list_key(game, Window::Global), game)?;
        Ok(list.into_iter().find(|e| e.belongs_to(wallet)))
    }

    /// Record a finished 2048 game for `wallet`.
    ///
    /// A wallet already on the global board keeps one row: best score, games
    /// played and 2048 count accumulate and the timestamp is refreshed in every
    /// window list holding that wallet. Otherwise a new row is appended.
    pub fn record_arcade_result<S: KvStore + ?Sized>(
        &self,
        store: &mut S,
        wallet: &WalletAddress,
        score: Score,
        max_tile: u32,
        now: DateTime<Utc>,
    ) -> Result<LeaderboardEntry, StorageError> {
        let reached = u32::from(max_tile >= WINNING_TILE);
        match Self::find_global(store, GameType::Arcade, wallet)? {
            Some(LeaderboardEntry::Arcade(mut entry)) => {
                entry.score = entry.score.max(score);
                entry.games_played += 1;
                entry.times_reached_2048 += reached;
                entry.timestamp = now;
                entry.date = now.date_naive();
                let updated = LeaderboardEntry::Arcade(entry);
                Self::replace_wallet_rows(store, GameType::Arcade, wallet, &updated)?;
                debug!(wallet = %wallet, score, "2048 entry merged");
                Ok(updated)
            }
            _ => {
                let entry = LeaderboardEntry::Arcade(ArcadeEntry {
                    nickname: format!("Player {}", wallet.prefix(6)),
                    score,
                    max_tile,
                    timestamp: now,
                    date: now.date_naive(),
                    wallet_address: Some(wallet.clone()),
                    games_played: 1,
                    times_reached_2048: reached,
                });
                self.add(store, entry.clone())?;
                Ok(entry)
            }
        }
    }

    /// Record quiz results. Paid quizzes played with a wallet accumulate into
    /// that wallet's existing row; every other result is appended as is.
    pub fn record_quiz_result<S: KvStore + ?Sized>(
        &self,
        store: &mut S,
        results: &QuizResults,
        wallet: Option<&WalletAddress>,
        now: DateTime<Utc>,
    ) -> Result<LeaderboardEntry, StorageError> {
        if let (GameType::XplQuiz, Some(wallet)) = (results.game_type, wallet) {
            if let Some(LeaderboardEntry::XplQuiz(mut entry)) = Self::find_global(store, GameType::XplQuiz, wallet)? {
                entry.points += results.points;
                entry.games_played = Some(entry.games_played.unwrap_or(0) + 1);
                entry.timestamp = now;
                entry.date = now.date_naive();
                let updated = LeaderboardEntry::XplQuiz(entry);
                Self::replace_wallet_rows(store, GameType::XplQuiz, wallet, &updated)?;
                debug!(wallet = %wallet, points = %results.points, "xpl-quiz entry merged");
                return Ok(updated);
            }
        }
        let quiz_entry = results.to_entry(now, wallet.cloned());
        let entry = match results.game_type {
            GameType::XplQuiz => LeaderboardEntry::XplQuiz(quiz_entry),
            _ => LeaderboardEntry::Quiz(quiz_entry),
        };
        self.add(store, entry.clone())?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn quiz(nickname: &str, tenths: u32, ts: DateTime<Utc>) -> LeaderboardEntry {
        LeaderboardEntry::Quiz(QuizEntry {
            nickname: nickname.into(),
            points: Points::from_tenths(tenths),
            streak: 0,
            questions_answered: 5,
            correct_answers: 3,
            timestamp: ts,
            date: ts.date_naive(),
            wallet_address: None,
            games_played: None,
        })
    }

    fn wallet(hex: &str) -> WalletAddress { hex.parse().unwrap() }

    #[test]
    fn week_starts_on_monday_utc() {
        assert_eq!(week_start(at("2026-10-18T12:00:00Z")), at("2026-10-12T00:00:00Z"));
        assert_eq!(week_start(at("2026-10-12T00:00:00Z")), at("2026-10-12T00:00:00Z"));
        assert_eq!(week_start(at("2026-10-19T23:59:59Z")), at("2026-10-19T00:00:00Z"));
    }

    #[test]
    fn weekly_view_filters_by_monday() {
        let now = at("2026-10-18T12:00:00Z");
        let board = Leaderboard::default();
        let mut store = MemoryStore::new();
        board.add(&mut store, quiz("old", 50, now - Duration::days(8))).unwrap();
        board.add(&mut store, quiz("recent", 10, now - Duration::days(2))).unwrap();

        let weekly = board.view(&store, GameType::Quiz, Window::Weekly, now).unwrap();
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].nickname(), "recent");
        let global = board.view(&store, GameType::Quiz, Window::Global, now).unwrap();
        assert_eq!(global.iter().map(|e| e.nickname()).collect::<Vec<_>>(), ["old", "recent"]);
    }

    #[test]
    fn daily_uses_local_offset() {
        let now = at("2026-10-18T23:30:00Z");
        let plus_two = Leaderboard::new(10, FixedOffset::east_opt(2 * 3600).unwrap());
        // 23:30 UTC is already the 19th at UTC+2; 20:00 UTC is still the 18th there.
        assert!(!Window::Daily.includes(at("2026-10-18T20:00:00Z"), now, plus_two.local_offset));
        assert!(Window::Daily.includes(at("2026-10-18T22:30:00Z"), now, plus_two.local_offset));
        assert!(Window::Daily.includes(at("2026-10-18T20:00:00Z"), now, Leaderboard::default().local_offset));
    }

    #[test]
    fn ranks_descending_stable_top_ten() {
        let now = at("2026-10-18T12:00:00Z");
        let board = Leaderboard::default();
        let mut store = MemoryStore::new();
        for i in 0..12u32 {
            board.add(&mut store, quiz(&format!("p{i}"), i % 4 * 10, now)).unwrap();
        }
        let view = board.view(&store, GameType::Quiz, Window::Daily, now).unwrap();
        assert_eq!(view.len(), 10);
        let names: Vec<_> = view.iter().map(|e| e.nickname()).collect();
        assert_eq!(&names[..3], ["p3", "p7", "p11"]);
        assert!(view.windows(2).all(|w| w[0].ranking_score() >= w[1].ranking_score()));
    }

    #[test]
    fn quiz_entries_mirror_to_legacy_lists() {
        let now = at("2026-10-18T12:00:00Z");
        let board = Leaderboard::default();
        let mut store = MemoryStore::new();
        board.add(&mut store, quiz("ada", 10, now)).unwrap();
        for window in Window::ALL {
            assert_eq!(Leaderboard::load_list(&store, &list_key(GameType::Quiz, window), GameType::Quiz).unwrap().len(), 1);
            assert_eq!(board.legacy_view(&store, window, now).unwrap().len(), 1);
        }
        assert_eq!(store.get(&legacy_key(Window::Global)).unwrap().map(|s| s.contains("\"gameType\":\"quiz\"")), Some(true));
    }

    #[test]
    fn untagged_legacy_rows_are_readable() {
        let mut store = MemoryStore::new();
        store
            .set(
                "leaderboard_global",
                r#"[{"nickname":"old","points":2.1,"streak":6,"questionsAnswered":8,"correctAnswers":7,"timestamp":1760000000000,"date":"2025-10-09"}]"#.into(),
            )
            .unwrap();
        let rows = Leaderboard::load_list(&store, "leaderboard_global", GameType::Quiz).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ranking_score(), 21);
    }

    #[test]
    fn arcade_wallet_merges_in_place() {
        let board = Leaderboard::default();
        let mut store = MemoryStore::new();
        let w = wallet("0xAbCdEf0123456789abcdef0123456789ABCDEF01");
        let t0 = at("2026-10-18T10:00:00Z");
        let first = board.record_arcade_result(&mut store, &w, 1200, 128, t0).unwrap();
        assert_eq!(first.nickname(), "Player 0xAbCd");

        let t1 = at("2026-10-18T11:00:00Z");
        let lower = wallet("0xabcdef0123456789abcdef0123456789abcdef01");
        board.record_arcade_result(&mut store, &lower, 900, 2048, t1).unwrap();

        for window in Window::ALL {
            let rows = board.view(&store, GameType::Arcade, window, t1).unwrap();
            assert_eq!(rows.len(), 1);
            match &rows[0] {
                LeaderboardEntry::Arcade(e) => {
                    assert_eq!(e.score, 1200);
                    assert_eq!(e.games_played, 2);
                    assert_eq!(e.times_reached_2048, 1);
                    assert_eq!(e.timestamp, t1);
                }
                other => panic!("unexpected entry {other:?}"),
            }
        }
    }

    #[test]
    fn arcade_entry_json_shape() {
        let t = at("2026-10-18T10:00:00Z");
        let entry = LeaderboardEntry::Arcade(ArcadeEntry {
            nickname: "p".into(),
            score: 10,
            max_tile: 8,
            timestamp: t,
            date: t.date_naive(),
            wallet_address: None,
            games_played: 1,
            times_reached_2048: 0,
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["gameType"], "2048");
        assert_eq!(json["maxTile"], 8);
        assert_eq!(json["timesReached2048"], 0);
        assert_eq!(json["timestamp"], t.timestamp_millis());
        assert_eq!(json["date"], "2026-10-18");
    }

    #[test]
    fn paid_quiz_accumulates_per_wallet() {
        let board = Leaderboard::default();
        let mut store = MemoryStore::new();
        let w = wallet("0x1234567890abcdef1234567890abcdef12345678");
        let now = at("2026-10-18T10:00:00Z");
        let results = QuizResults {
            nickname: "bob".into(),
            points: Points::from_tenths(21),
            streak: 6,
            questions_answered: 20,
            correct_answers: 15,
            game_type: GameType::XplQuiz,
        };
        board.record_quiz_result(&mut store, &results, Some(&w), now).unwrap();
        let merged = board.record_quiz_result(&mut store, &results, Some(&w), now).unwrap();
        match merged {
            LeaderboardEntry::XplQuiz(e) => {
                assert_eq!(e.points, Points::from_tenths(42));
                assert_eq!(e.games_played, Some(2));
            }
            other => panic!("unexpected entry {other:?}"),
        }
        assert_eq!(board.view(&store, GameType::XplQuiz, Window::Global, now).unwrap().len(), 1);
        assert!(store.get(&legacy_key(Window::Global)).unwrap().is_none());
    }

    #[test]
    fn free_quiz_results_are_never_merged() {
        let board = Leaderboard::default();
        let mut store = MemoryStore::new();
        let w = wallet("0x1234567890abcdef1234567890abcdef12345678");
        let now = at("2026-10-18T10:00:00Z");
        let results = QuizResults {
            nickname: "ada".into(),
            points: Points::from_tenths(10),
            streak: 3,
            questions_answered: 3,
            correct_answers: 3,
            game_type: GameType::Quiz,
        };
        board.record_quiz_result(&mut store, &results, Some(&w), now).unwrap();
        board.record_quiz_result(&mut store, &results, None, now).unwrap();
        assert_eq!(board.view(&store, GameType::Quiz, Window::Global, now).unwrap().len(), 2);
    }

    #[test]
    fn parse_names() {
        assert_eq!("2048".parse::<GameType>().unwrap(), GameType::Arcade);
        assert_eq!("XPL-QUIZ".parse::<GameType>().unwrap(), GameType::XplQuiz);
        assert_eq!("week".parse::<Window>().unwrap(), Window::Weekly);
        assert!("monthly".parse::<Window>().is_err());
        assert_eq!(list_key(GameType::XplQuiz, Window::Daily), "leaderboard_xpl-quiz_daily");
    }
}
