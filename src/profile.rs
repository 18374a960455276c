//! Per-wallet profiles: LHP points, login streak, achievements, the daily spin
//! wheel and the once-a-day quiz question.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::WalletAddress;
use crate::leaderboard::{list_key, GameType, Leaderboard, Window};
use crate::quiz::{Question, QUESTIONS};
use crate::storage::{KvStore, KvStoreExt, StorageError};

pub const PROFILE_KEY_PREFIX: &str = "userProfile_";
pub const SPIN_COOLDOWN_SECS: i64 = 24 * 60 * 60;
/// LHP for a correct daily quiz answer.
pub const DAILY_QUIZ_REWARD: u64 = 10;

#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("daily quiz already answered on {0}")]
    AlreadyAnswered(NaiveDate),
}

#[derive(thiserror::Error, Debug)]
pub enum SpinError {
    #[error("spin available in {remaining_secs} seconds")]
    CoolingDown { remaining_secs: i64 },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// One wheel segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinReward {
    pub id: u8,
    pub points: u64,
    /// Chance in percent; all segments sum to 100.
    pub weight: u32,
}

pub const WHEEL: [SpinReward; 6] = [
    SpinReward { id: 1, points: 10, weight: 30 },
    SpinReward { id: 2, points: 25, weight: 25 },
    SpinReward { id: 3, points: 50, weight: 20 },
    SpinReward { id: 4, points: 100, weight: 15 },
    SpinReward { id: 5, points: 200, weight: 8 },
    SpinReward { id: 6, points: 500, weight: 2 },
];

impl SpinReward {
    pub fn label(&self) -> String { format!("{} LHP", self.points) }
}

/// Weighted draw over [`WHEEL`].
pub fn draw_reward<R: Rng + ?Sized>(rng: &mut R) -> SpinReward {
    let total: u32 = WHEEL.iter().map(|r| r.weight).sum();
    let roll = rng.gen_range(1..=total);
    let mut cumulative = 0;
    for reward in WHEEL {
        cumulative += reward.weight;
        if roll <= cumulative {
            return reward;
        }
    }
    WHEEL[0]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub unlocked: bool,
    pub progress: u64,
    pub max_progress: u64,
}

fn achievement(id: &str, name: &str, description: &str, icon: &str, max_progress: u64) -> Achievement {
    Achievement {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        icon: icon.into(),
        unlocked: false,
        progress: 0,
        max_progress,
    }
}

pub fn default_achievements() -> Vec<Achievement> {
    let mut rookie = achievement("plasma-rookie", "Plasma Rookie", "Complete your first quiz or game", "🌟", 1);
    rookie.unlocked = true;
    rookie.progress = 1;
    vec![
        rookie,
        achievement("plasma-voyager", "Plasma Voyager", "Complete 10 quizzes or games", "🚀", 10),
        achievement("plasma-master", "Plasma Master", "Complete 50 quizzes or games", "👑", 50),
        achievement("streak-champion", "Streak Champion", "Maintain a 7-day login streak", "🔥", 7),
        achievement("lhp-collector", "LHP Collector", "Earn 1000 Plasma LHP points", "💎", 1000),
        achievement("quiz-expert", "Quiz Expert", "Answer 100 quiz questions correctly", "🧠", 100),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub wallet_address: WalletAddress,
    pub lhp_points: u64,
    pub total_games: u64,
    pub current_streak: u32,
    pub total_days: u32,
    pub achievements: Vec<Achievement>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_spin_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_quiz_answer: Option<NaiveDate>,
    #[serde(default)]
    pub correct_answers: u64,
}

impl UserProfile {
    pub fn new(wallet_address: WalletAddress) -> Self {
        Self {
            wallet_address,
            lhp_points: 0,
            total_games: 0,
            current_streak: 0,
            total_days: 0,
            achievements: default_achievements(),
            last_spin_time: None,
            last_quiz_answer: None,
            correct_answers: 0,
        }
    }

    /// Recompute progress and unlock state from the counters.
    pub fn refresh_achievements(&mut self) {
        for a in &mut self.achievements {
            let value = match a.id.as_str() {
                "plasma-voyager" | "plasma-master" => self.total_games,
                "streak-champion" => u64::from(self.current_streak),
                "lhp-collector" => self.lhp_points,
                "quiz-expert" => self.correct_answers,
                _ => continue,
            };
            a.progress = value.min(a.max_progress);
            a.unlocked = value >= a.max_progress;
        }
    }

    pub fn unlocked_count(&self) -> usize { self.achievements.iter().filter(|a| a.unlocked).count() }

    pub fn add_lhp(&mut self, points: u64) {
        self.lhp_points += points;
        self.refresh_achievements();
    }

    /// Count one finished quiz or game.
    pub fn record_game(&mut self, correct_answers: u32) {
        self.total_games += 1;
        self.correct_answers += u64::from(correct_answers);
        self.refresh_achievements();
    }

    /// Seconds until the wheel can be spun again, 0 when it can.
    pub fn spin_remaining(&self, now: DateTime<Utc>, cooldown: Duration) -> i64 {
        match self.last_spin_time {
            Some(last) => (last + cooldown - now).num_seconds().max(0),
            None => 0,
        }
    }

    /// Spin the wheel: adds the reward, stamps the spin time and extends the
    /// daily streak.
    pub fn spin<R: Rng + ?Sized>(&mut self, rng: &mut R, now: DateTime<Utc>, cooldown: Duration) -> Result<SpinReward, SpinError> {
        let remaining_secs = self.spin_remaining(now, cooldown);
        if remaining_secs > 0 {
            return Err(SpinError::CoolingDown { remaining_secs });
        }
        let reward = draw_reward(rng);
        self.lhp_points += reward.points;
        self.last_spin_time = Some(now);
        self.current_streak += 1;
        self.total_days += 1;
        self.refresh_achievements();
        debug!(wallet = %self.wallet_address.short(), points = reward.points, streak = self.current_streak, "wheel spun");
        Ok(reward)
    }

    pub fn answered_daily_quiz(&self, today: NaiveDate) -> bool { self.last_quiz_answer == Some(today) }

    /// Answer today's question; a correct answer earns [`DAILY_QUIZ_REWARD`].
    pub fn answer_daily_quiz(&mut self, correct: bool, today: NaiveDate) -> Result<u64, ProfileError> {
        if self.answered_daily_quiz(today) {
            return Err(ProfileError::AlreadyAnswered(today));
        }
        self.last_quiz_answer = Some(today);
        let awarded = if correct { DAILY_QUIZ_REWARD } else { 0 };
        self.lhp_points += awarded;
        self.refresh_achievements();
        Ok(awarded)
    }

    /// Seconds until the next daily question, counted to the next local midnight.
    pub fn daily_quiz_remaining(&self, now: DateTime<Utc>, local: FixedOffset) -> i64 {
        let Some(answered) = self.last_quiz_answer else { return 0 };
        let Some(next_day) = answered.succ_opt() else { return 0 };
        match local.from_local_datetime(&next_day.and_time(NaiveTime::default())).single() {
            Some(midnight) => (midnight.with_timezone(&Utc) - now).num_seconds().max(0),
            None => 0,
        }
    }
}

/// `HH:MM:SS`; hours are not wrapped at 24.
pub fn format_countdown(seconds: i64) -> String {
    let s = seconds.max(0);
    format!("{:02}:{:02}:{:02}", s / 3600, s % 3600 / 60, s % 60)
}

/// Question of the day, stable for a given date.
pub fn daily_question(date: NaiveDate) -> &'static Question {
    let index = date.num_days_from_ce().rem_euclid(QUESTIONS.len() as i32) as usize;
    &QUESTIONS[index]
}

pub fn profile_key(wallet: &WalletAddress) -> String {
    format!("{PROFILE_KEY_PREFIX}{}", wallet.key())
}

pub fn load_profile<S: KvStore + ?Sized>(store: &S, wallet: &WalletAddress) -> Result<Option<UserProfile>, StorageError> {
    store.get_json(&profile_key(wallet))
}

pub fn save_profile<S: KvStore + ?Sized>(store: &mut S, profile: &UserProfile) -> Result<(), StorageError> {
    store.set_json(&profile_key(&profile.wallet_address), profile)
}

/// Existing profile, or a new one seeded with the wallet's rows on the global
/// quiz and 2048 boards. New profiles are saved immediately.
pub fn load_or_create<S: KvStore + ?Sized>(store: &mut S, wallet: &WalletAddress) -> Result<UserProfile, StorageError> {
    if let Some(profile) = load_profile(store, wallet)? {
        return Ok(profile);
    }
    let mut profile = UserProfile::new(wallet.clone());
    let mut games = 0;
    for game in [GameType::Quiz, GameType::Arcade] {
        let rows = Leaderboard::load_list(store, &list_key(game, Window::Global), game)?;
        games += rows.iter().filter(|e| e.wallet_address() == Some(wallet)).count() as u64;
    }
    profile.total_games = games;
    profile.refresh_achievements();
    save_profile(store, &profile)?;
    debug!(wallet = %wallet.short(), games, "profile created");
    Ok(profile)
}
