//! Quiz sessions and streak scoring.
//!
//! Points are only awarded when a streak crosses a multiple of three; each
//! award is worth `1 + (groups - 1) * 0.1` where `groups = streak / 3`. A miss
//! resets the streak but never takes points away.
//!
//! ```
//! use plasma_learn_hub::quiz::{QuizSession, Points};
//! let mut session = QuizSession::new("ada");
//! for id in 1..=3 {
//!     session.answer(id, true);
//! }
//! assert_eq!(session.total_points, Points::from_tenths(10));
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Add, AddAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::chain::WalletAddress;
use crate::leaderboard::{GameType, QuizEntry};
use crate::storage::{KvStore, KvStoreExt, StorageError};

pub mod questions;

pub use questions::{next_question, Question, QuizOption, QUESTIONS};

/// How many recently asked question ids a session remembers.
pub const RECENT_CAPACITY: usize = 10;
/// Questions in a paid quiz round.
pub const PAID_QUIZ_LENGTH: u32 = 20;

pub const CURRENT_SESSION_KEY: &str = "currentSession";
pub const LAST_RESULTS_KEY: &str = "lastGameResults";

/// Quiz points with one decimal place, stored as tenths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Points(u32);

impl Points {
    pub const ZERO: Points = Points(0);

    pub const fn from_tenths(tenths: u32) -> Self { Points(tenths) }

    pub fn tenths(self) -> u32 { self.0 }

    pub fn as_f64(self) -> f64 { self.0 as f64 / 10.0 }
}

impl Add for Points {
    type Output = Points;
    fn add(self, rhs: Points) -> Points { Points(self.0 + rhs.0) }
}

impl AddAssign for Points {
    fn add_assign(&mut self, rhs: Points) { self.0 += rhs.0; }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl Serialize for Points {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Points {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        let tenths = (value * 10.0).round();
        if !(0.0..=u32::MAX as f64).contains(&tenths) {
            return Err(serde::de::Error::custom(format!("points out of range: {value}")));
        }
        Ok(Points(tenths as u32))
    }
}

/// True when `new_streak` completes a group of three that `old_streak` had not.
pub fn should_award_points(old_streak: u32, new_streak: u32) -> bool {
    new_streak / 3 > old_streak / 3
}

/// Award for reaching `streak`: `1 + (streak/3 - 1) * 0.1`, zero below three.
pub fn calculate_streak_points(streak: u32) -> Points {
    if streak < 3 {
        return Points::ZERO;
    }
    Points(10 + (streak / 3 - 1))
}

pub fn streak_award(old_streak: u32, new_streak: u32) -> Option<Points> {
    should_award_points(old_streak, new_streak).then(|| calculate_streak_points(new_streak))
}

/// Display multiplier for the current streak.
pub fn multiplier_for(streak: u32) -> f64 {
    (10 + streak / 3) as f64 / 10.0
}

/// Last [`RECENT_CAPACITY`] question ids, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u32>", into = "Vec<u32>")]
pub struct RecentQuestions(VecDeque<u32>);

impl RecentQuestions {
    pub fn push(&mut self, id: u32) {
        if self.0.len() == RECENT_CAPACITY {
            self.0.pop_front();
        }
        self.0.push_back(id);
    }

    pub fn contains(&self, id: u32) -> bool { self.0.contains(&id) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn to_vec(&self) -> Vec<u32> { self.0.iter().copied().collect() }
}

impl From<Vec<u32>> for RecentQuestions {
    fn from(ids: Vec<u32>) -> Self {
        let mut recent = RecentQuestions::default();
        for id in ids {
            recent.push(id);
        }
        recent
    }
}

impl From<RecentQuestions> for Vec<u32> {
    fn from(recent: RecentQuestions) -> Self { recent.0.into() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// Points added by this answer, if it completed a streak group.
    pub awarded: Option<Points>,
    pub streak: u32,
    /// The session reached its question limit.
    pub finished: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSession {
    pub nickname: String,
    #[serde(default = "default_game_type")]
    pub game_type: GameType,
    pub current_streak: u32,
    pub current_multiplier: f64,
    pub total_points: Points,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub recent_questions: RecentQuestions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_limit: Option<u32>,
}

fn default_game_type() -> GameType { GameType::Quiz }

impl QuizSession {
    /// Free, open-ended quiz.
    pub fn new(nickname: &str) -> Self {
        Self {
            nickname: nickname.to_string(),
            game_type: GameType::Quiz,
            current_streak: 0,
            current_multiplier: multiplier_for(0),
            total_points: Points::ZERO,
            questions_answered: 0,
            correct_answers: 0,
            recent_questions: RecentQuestions::default(),
            question_limit: None,
        }
    }

    /// Paid XPL quiz: a fixed round of [`PAID_QUIZ_LENGTH`] questions.
    pub fn paid(nickname: &str) -> Self {
        Self { game_type: GameType::XplQuiz, question_limit: Some(PAID_QUIZ_LENGTH), ..Self::new(nickname) }
    }

    pub fn is_finished(&self) -> bool {
        self.question_limit.is_some_and(|limit| self.questions_answered >= limit)
    }

    /// Record an answer to `question_id`. The round limit is not enforced here;
    /// callers check [`is_finished`](Self::is_finished) first.
    pub fn answer(&mut self, question_id: u32, correct: bool) -> AnswerOutcome {
        self.questions_answered += 1;
        let mut awarded = None;
        if correct {
            self.correct_answers += 1;
            let old_streak = self.current_streak;
            self.current_streak += 1;
            awarded = streak_award(old_streak, self.current_streak);
            if let Some(points) = awarded {
                self.total_points += points;
            }
        } else {
            self.current_streak = 0;
        }
        self.current_multiplier = multiplier_for(self.current_streak);
        self.recent_questions.push(question_id);
        AnswerOutcome { correct, awarded, streak: self.current_streak, finished: self.is_finished() }
    }

    pub fn results(&self) -> QuizResults {
        QuizResults {
            nickname: self.nickname.clone(),
            points: self.total_points,
            streak: self.current_streak,
            questions_answered: self.questions_answered,
            correct_answers: self.correct_answers,
            game_type: self.game_type,
        }
    }
}

/// Summary of a finished quiz, shown once by the results view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResults {
    pub nickname: String,
    pub points: Points,
    pub streak: u32,
    pub questions_answered: u32,
    pub correct_answers: u32,
    #[serde(default = "default_game_type")]
    pub game_type: GameType,
}

impl QuizResults {
    pub fn to_entry(&self, now: DateTime<Utc>, wallet_address: Option<WalletAddress>) -> QuizEntry {
        QuizEntry {
            nickname: self.nickname.clone(),
            points: self.points,
            streak: self.streak,
            questions_answered: self.questions_answered,
            correct_answers: self.correct_answers,
            timestamp: now,
            date: now.date_naive(),
            games_played: wallet_address.as_ref().map(|_| 1),
            wallet_address,
        }
    }

    /// Accuracy in percent, 0 when nothing was answered.
    pub fn accuracy(&self) -> u32 {
        if self.questions_answered == 0 {
            return 0;
        }
        self.correct_answers * 100 / self.questions_answered
    }
}

/// Headline for the results view.
pub fn score_message(points: Points) -> &'static str {
    match points.tenths() {
        t if t >= 100 => "Stablecoin Master!",
        t if t >= 50 => "DeFi Expert!",
        t if t >= 20 => "Crypto Enthusiast!",
        t if t >= 10 => "Getting Started!",
        _ => "Keep Learning!",
    }
}

pub fn load_session<S: KvStore + ?Sized>(store: &S) -> Result<Option<QuizSession>, StorageError> {
    store.get_json(CURRENT_SESSION_KEY)
}

pub fn save_session<S: KvStore + ?Sized>(store: &mut S, session: &QuizSession) -> Result<(), StorageError> {
    store.set_json(CURRENT_SESSION_KEY, session)
}

pub fn clear_session<S: KvStore + ?Sized>(store: &mut S) -> Result<(), StorageError> {
    store.delete(CURRENT_SESSION_KEY)
}

pub fn save_last_results<S: KvStore + ?Sized>(store: &mut S, results: &QuizResults) -> Result<(), StorageError> {
    store.set_json(LAST_RESULTS_KEY, results)
}

/// Read and remove the last results; a second call returns `None`.
pub fn take_last_results<S: KvStore + ?Sized>(store: &mut S) -> Result<Option<QuizResults>, StorageError> {
    let results = store.get_json(LAST_RESULTS_KEY)?;
    if results.is_some() {
        store.delete(LAST_RESULTS_KEY)?;
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn three_correct_award_one_point() {
        let mut s = QuizSession::new("ada");
        assert_eq!(s.answer(1, true).awarded, None);
        assert_eq!(s.answer(2, true).awarded, None);
        let third = s.answer(3, true);
        assert_eq!(third.awarded, Some(Points::from_tenths(10)));
        assert_eq!(s.total_points.to_string(), "1.0");
    }

    #[test]
    fn six_in_a_row_adds_one_point_one() {
        let mut s = QuizSession::new("ada");
        for id in 1..=5 {
            s.answer(id, true);
        }
        let sixth = s.answer(6, true);
        assert_eq!(sixth.awarded, Some(Points::from_tenths(11)));
        assert_eq!(s.total_points, Points::from_tenths(21));
        assert_eq!(s.current_multiplier, 1.2);
    }

    #[test]
    fn miss_resets_streak_but_keeps_points() {
        let mut s = QuizSession::new("ada");
        for id in 1..=5 {
            s.answer(id, true);
        }
        let before = s.total_points;
        let miss = s.answer(6, false);
        assert_eq!(miss.streak, 0);
        assert_eq!(miss.awarded, None);
        assert_eq!(s.total_points, before);
        assert_eq!(s.current_multiplier, 1.0);
        assert_eq!(s.questions_answered, 6);
        assert_eq!(s.correct_answers, 5);
    }

    #[test]
    fn points_never_decrease() {
        let mut s = QuizSession::new("ada");
        let pattern = [true, true, true, false, true, true, true, true, true, true, false, true];
        let mut last = Points::ZERO;
        for (i, &correct) in pattern.iter().cycle().take(120).enumerate() {
            s.answer(i as u32, correct);
            assert!(s.total_points >= last);
            last = s.total_points;
        }
    }

    #[test]
    fn streak_formula() {
        assert_eq!(calculate_streak_points(0), Points::ZERO);
        assert_eq!(calculate_streak_points(2), Points::ZERO);
        assert_eq!(calculate_streak_points(3), Points::from_tenths(10));
        assert_eq!(calculate_streak_points(5), Points::from_tenths(10));
        assert_eq!(calculate_streak_points(9), Points::from_tenths(12));
        assert_eq!(calculate_streak_points(30), Points::from_tenths(19));
        assert!(should_award_points(2, 3));
        assert!(!should_award_points(3, 4));
        assert!(!should_award_points(5, 0));
        assert_eq!(streak_award(8, 9), Some(Points::from_tenths(12)));
    }

    #[test]
    fn recent_questions_keep_last_ten() {
        let mut s = QuizSession::new("ada");
        for id in 1..=15 {
            s.answer(id, id % 2 == 0);
        }
        assert_eq!(s.recent_questions.to_vec(), (6..=15).collect::<Vec<_>>());
        let restored: RecentQuestions = serde_json::from_str("[1,2,3,4,5,6,7,8,9,10,11,12]").unwrap();
        assert_eq!(restored.len(), RECENT_CAPACITY);
        assert!(!restored.contains(1));
        assert!(restored.contains(12));
    }

    #[test]
    fn paid_quiz_finishes_after_limit() {
        let mut s = QuizSession::paid("bob");
        for id in 1..PAID_QUIZ_LENGTH {
            assert!(!s.answer(id, true).finished);
        }
        assert!(s.answer(PAID_QUIZ_LENGTH, true).finished);
        assert_eq!(s.results().game_type, GameType::XplQuiz);
    }

    #[test]
    fn session_json_shape() {
        let mut s = QuizSession::new("ada");
        s.answer(4, true);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["nickname"], "ada");
        assert_eq!(json["currentStreak"], 1);
        assert_eq!(json["totalPoints"], 0.0);
        assert_eq!(json["recentQuestions"], serde_json::json!([4]));
        assert_eq!(json["gameType"], "quiz");
        assert!(json.get("questionLimit").is_none());
        let back: QuizSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn points_parse_from_decimal_json() {
        let p: Points = serde_json::from_str("2.1").unwrap();
        assert_eq!(p, Points::from_tenths(21));
        assert!(serde_json::from_str::<Points>("-1.0").is_err());
        assert_eq!(serde_json::to_string(&Points::from_tenths(33)).unwrap(), "3.3");
    }

    #[test]
    fn last_results_are_consumed_once() {
        let mut store = MemoryStore::new();
        let mut s = QuizSession::new("ada");
        s.answer(1, true);
        save_session(&mut store, &s).unwrap();
        assert_eq!(load_session(&store).unwrap(), Some(s.clone()));
        save_last_results(&mut store, &s.results()).unwrap();
        clear_session(&mut store).unwrap();
        assert_eq!(load_session(&store).unwrap(), None);
        assert_eq!(take_last_results(&mut store).unwrap(), Some(s.results()));
        assert_eq!(take_last_results(&mut store).unwrap(), None);
    }

    #[test]
    fn score_messages() {
        assert_eq!(score_message(Points::ZERO), "Keep Learning!");
        assert_eq!(score_message(Points::from_tenths(10)), "Getting Started!");
        assert_eq!(score_message(Points::from_tenths(52)), "DeFi Expert!");
        assert_eq!(score_message(Points::from_tenths(100)), "Stablecoin Master!");
    }
}
