//! Application facade shared by every front end.
//!
//! [`Hub`] owns the store, the chain client and the in-progress 2048 game and
//! quiz. Persistence failures after an action succeeded in memory are logged
//! and reported through [`Saved::saved`] instead of failing the action.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::chain::{ChainClient, ChainError, Connection, GameContract, GameId, WalletAddress};
use crate::engine::Direction;
use crate::game::{Game, Turn};
use crate::leaderboard::{GameType, Leaderboard, LeaderboardEntry, Window};
use crate::prize_pool::{self, PrizePool, PrizePoolCache};
use crate::profile::{self, ProfileError, SpinError, SpinReward, UserProfile};
use crate::quiz::{self, questions, AnswerOutcome, Question, QuizResults, QuizSession};
use crate::storage::{KvStore, StorageError};

#[derive(thiserror::Error, Debug)]
pub enum HubError {
    #[error("connect a wallet first")]
    NotConnected,
    #[error("no quiz in progress")]
    NoActiveQuiz,
    #[error("quiz round already finished")]
    QuizFinished,
    #[error("unknown question {0}")]
    UnknownQuestion(u32),
    #[error("no 2048 game in progress")]
    NoActiveGame,
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Spin(#[from] SpinError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// A value produced in memory plus whether it reached the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Saved<T> {
    pub value: T,
    pub saved: bool,
}

/// Result of ending a 2048 game.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcadeCompletion {
    pub score: u64,
    pub max_tile: u32,
    /// Leaderboard row written for the connected wallet.
    pub entry: Option<LeaderboardEntry>,
    pub saved: bool,
    /// Contract error, if reporting the game on chain failed.
    pub chain_error: Option<ChainError>,
}

fn log_unsaved<T>(result: Result<T, StorageError>, what: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(error = %e, "{what} not saved");
            None
        }
    }
}

pub struct Hub<S, C> {
    store: S,
    chain: ChainClient<C>,
    leaderboard: Leaderboard,
    spin_cooldown: Duration,
    game: Game,
    /// A started game not yet recorded.
    arcade_open: bool,
    quiz: Option<QuizSession>,
    prize_cache: PrizePoolCache,
}

impl<S: KvStore, C: GameContract> Hub<S, C> {
    /// Wire up a hub, restoring the best score and any unfinished quiz.
    /// Unreadable saved state is logged and skipped.
    pub fn new(store: S, chain: ChainClient<C>, leaderboard: Leaderboard, spin_cooldown: Duration) -> Self {
        let game = Game::load(&store).unwrap_or_else(|e| {
            warn!(error = %e, "best score unreadable, starting from 0");
            Game::new(0)
        });
        let quiz = quiz::load_session(&store).unwrap_or_else(|e| {
            warn!(error = %e, "saved quiz session unreadable, discarding");
            None
        });
        Self { store, chain, leaderboard, spin_cooldown, game, arcade_open: false, quiz, prize_cache: PrizePoolCache::default() }
    }

    pub fn store(&self) -> &S { &self.store }

    pub fn store_mut(&mut self) -> &mut S { &mut self.store }

    pub fn into_store(self) -> S { self.store }

    pub fn chain(&self) -> &ChainClient<C> { &self.chain }

    pub fn chain_mut(&mut self) -> &mut ChainClient<C> { &mut self.chain }

    pub fn game(&self) -> &Game { &self.game }

    pub fn quiz(&self) -> Option<&QuizSession> { self.quiz.as_ref() }

    pub fn leaderboard_policy(&self) -> &Leaderboard { &self.leaderboard }

    pub fn connect_wallet(&mut self, address: &str) -> Result<Connection, HubError> {
        let connection = self.chain.connect(address)?;
        if let Err(e) = profile::load_or_create(&mut self.store, &connection.address) {
            warn!(error = %e, "profile not saved");
        }
        Ok(connection)
    }

    fn wallet(&self) -> Result<WalletAddress, HubError> {
        self.chain.address().cloned().ok_or(HubError::NotConnected)
    }

    // 2048

    /// Buy a game on chain and start it.
    pub fn purchase_arcade<R: Rng + ?Sized>(&mut self, rng: &mut R, now: DateTime<Utc>) -> Result<GameId, HubError> {
        let game_id = self.chain.purchase_game(&mut self.store, GameType::Arcade, now)?;
        self.game.start(Some(game_id), rng);
        self.arcade_open = true;
        Ok(game_id)
    }

    /// Start an unpaid practice game.
    pub fn start_practice<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.game.start(None, rng);
        self.arcade_open = true;
    }

    /// Apply a move; a new best score is written through immediately.
    pub fn play_arcade<R: Rng + ?Sized>(&mut self, direction: Direction, rng: &mut R) -> Saved<Turn> {
        let turn = self.game.play(direction, rng);
        let saved = match turn {
            Turn::Moved { new_best: true, .. } => log_unsaved(self.game.persist_best(&mut self.store), "best score").is_some(),
            _ => true,
        };
        Saved { value: turn, saved }
    }

    /// End the current game. A purchased game played with a connected wallet
    /// is recorded locally, then reported to the contract; a contract failure
    /// never undoes the local record. Practice games are never recorded.
    pub fn complete_arcade(&mut self, now: DateTime<Utc>) -> Result<ArcadeCompletion, HubError> {
        if !self.arcade_open {
            return Err(HubError::NoActiveGame);
        }
        self.arcade_open = false;
        self.game.end();
        let score = self.game.score();
        let max_tile = self.game.max_tile();
        let mut completion = ArcadeCompletion { score, max_tile, entry: None, saved: true, chain_error: None };

        let (Some(game_id), Some(wallet)) = (self.game.game_id(), self.chain.address().cloned()) else {
            debug!(score, "practice game ended, not recorded");
            return Ok(completion);
        };
        let recorded = self.leaderboard.record_arcade_result(&mut self.store, &wallet, score, max_tile, now);
        completion.entry = log_unsaved(recorded, "2048 result");
        completion.saved = completion.entry.is_some();
        completion.saved &= self.update_profile(&wallet, |p| p.record_game(0));

        if let Err(e) = self.chain.complete_game(game_id, score, max_tile) {
            warn!(error = %e, game_id = %game_id, "chain completion failed, local save kept");
            completion.chain_error = Some(e);
        }
        info!(score, max_tile, saved = completion.saved, "2048 game completed");
        Ok(completion)
    }

    fn update_profile(&mut self, wallet: &WalletAddress, update: impl FnOnce(&mut UserProfile)) -> bool {
        let result = profile::load_or_create(&mut self.store, wallet).and_then(|mut p| {
            update(&mut p);
            profile::save_profile(&mut self.store, &p)
        });
        log_unsaved(result, "profile update").is_some()
    }

    // Quiz

    pub fn start_quiz(&mut self, nickname: &str) -> Saved<()> {
        self.begin_quiz(QuizSession::new(nickname))
    }

    /// Buy a paid quiz round on chain and start it.
    pub fn start_paid_quiz(&mut self, nickname: &str, now: DateTime<Utc>) -> Result<Saved<GameId>, HubError> {
        let game_id = self.chain.purchase_game(&mut self.store, GameType::XplQuiz, now)?;
        let Saved { saved, .. } = self.begin_quiz(QuizSession::paid(nickname));
        Ok(Saved { value: game_id, saved })
    }

    fn begin_quiz(&mut self, session: QuizSession) -> Saved<()> {
        let saved = log_unsaved(quiz::save_session(&mut self.store, &session), "quiz session").is_some();
        debug!(nickname = %session.nickname, game_type = %session.game_type, "quiz started");
        self.quiz = Some(session);
        Saved { value: (), saved }
    }

    /// Next question, avoiding the session's recent ones.
    pub fn next_question<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&'static Question, HubError> {
        let session = self.quiz.as_ref().ok_or(HubError::NoActiveQuiz)?;
        Ok(questions::next_question(&session.recent_questions.to_vec(), rng))
    }

    pub fn answer_quiz(&mut self, question_id: u32, option_id: &str) -> Result<Saved<AnswerOutcome>, HubError> {
        let question = questions::find(question_id).ok_or(HubError::UnknownQuestion(question_id))?;
        let session = self.quiz.as_mut().ok_or(HubError::NoActiveQuiz)?;
        if session.is_finished() {
            return Err(HubError::QuizFinished);
        }
        let outcome = session.answer(question_id, question.is_correct(option_id));
        let saved = log_unsaved(quiz::save_session(&mut self.store, session), "quiz answer").is_some();
        Ok(Saved { value: outcome, saved })
    }

    /// Finish the quiz: leaderboard row, profile progress, cleared session and
    /// a one-shot results summary.
    pub fn end_quiz(&mut self, now: DateTime<Utc>) -> Result<Saved<QuizResults>, HubError> {
        let session = self.quiz.take().ok_or(HubError::NoActiveQuiz)?;
        let results = session.results();
        let wallet = match results.game_type {
            GameType::XplQuiz => self.chain.address().cloned(),
            _ => None,
        };
        let mut saved = log_unsaved(
            self.leaderboard.record_quiz_result(&mut self.store, &results, wallet.as_ref(), now),
            "quiz result",
        )
        .is_some();
        if let Some(address) = self.chain.address().cloned() {
            saved &= self.update_profile(&address, |p| p.record_game(results.correct_answers));
        }
        saved &= log_unsaved(quiz::clear_session(&mut self.store), "quiz session clear").is_some();
        saved &= log_unsaved(quiz::save_last_results(&mut self.store, &results), "quiz results").is_some();
        info!(nickname = %results.nickname, points = %results.points, saved, "quiz finished");
        Ok(Saved { value: results, saved })
    }

    pub fn take_last_results(&mut self) -> Result<Option<QuizResults>, HubError> {
        Ok(quiz::take_last_results(&mut self.store)?)
    }

    // Leaderboards

    pub fn leaderboard(&self, game: GameType, window: Window, now: DateTime<Utc>) -> Result<Vec<LeaderboardEntry>, HubError> {
        Ok(self.leaderboard.view(&self.store, game, window, now)?)
    }

    // Profile

    pub fn profile(&mut self) -> Result<UserProfile, HubError> {
        let wallet = self.wallet()?;
        Ok(profile::load_or_create(&mut self.store, &wallet)?)
    }

    pub fn spin_wheel<R: Rng + ?Sized>(&mut self, rng: &mut R, now: DateTime<Utc>) -> Result<Saved<SpinReward>, HubError> {
        let mut p = self.profile()?;
        let reward = p.spin(rng, now, self.spin_cooldown)?;
        let saved = log_unsaved(profile::save_profile(&mut self.store, &p), "spin reward").is_some();
        Ok(Saved { value: reward, saved })
    }

    /// Seconds until the next spin; 0 when available.
    pub fn spin_remaining(&mut self, now: DateTime<Utc>) -> Result<i64, HubError> {
        Ok(self.profile()?.spin_remaining(now, self.spin_cooldown))
    }

    pub fn daily_question(&self, now: DateTime<Utc>) -> &'static Question {
        profile::daily_question(now.with_timezone(&self.leaderboard.local_offset).date_naive())
    }

    /// Answer today's question; returns the LHP awarded.
    pub fn answer_daily_quiz(&mut self, option_id: &str, now: DateTime<Utc>) -> Result<Saved<u64>, HubError> {
        let today = now.with_timezone(&self.leaderboard.local_offset).date_naive();
        let question = profile::daily_question(today);
        let mut p = self.profile()?;
        let awarded = p.answer_daily_quiz(question.is_correct(option_id), today)?;
        let saved = log_unsaved(profile::save_profile(&mut self.store, &p), "daily quiz").is_some();
        Ok(Saved { value: awarded, saved })
    }

    // Prize pool

    /// Weekly pool from recorded purchases, cached for five minutes.
    pub fn prize_pool(&mut self, now: DateTime<Utc>) -> Result<PrizePool, HubError> {
        let price = self.chain.contract().game_price().unwrap_or_else(|e| {
            warn!(error = %e, "game price unavailable, using default");
            crate::chain::DEFAULT_GAME_PRICE
        });
        let store = &self.store;
        let pool = self.prize_cache.get_or_compute(now, || {
            let events = prize_pool::load_purchases(store)?;
            Ok(prize_pool::estimate(&events, price, now))
        })?;
        Ok(pool.clone())
    }

    pub fn refresh_prize_pool(&mut self) { self.prize_cache.reset(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MemoryContract, WEI_PER_XPL};
    use crate::storage::MemoryStore;
    use rand::{rngs::StdRng, SeedableRng};

    const ALICE: &str = "0x1234567890abcdef1234567890abcdef12345678";

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn hub_with(store: MemoryStore) -> Hub<MemoryStore, MemoryContract> {
        let mut contract = MemoryContract::default();
        contract.fund(&ALICE.parse().unwrap(), WEI_PER_XPL);
        Hub::new(store, ChainClient::new(contract, None), Leaderboard::default(), Duration::hours(24))
    }

    fn play_out(hub: &mut Hub<MemoryStore, MemoryContract>, rng: &mut StdRng) {
        let mut i = 0;
        while hub.game().is_active() && i < 10_000 {
            hub.play_arcade(Direction::ALL[i % 4], rng);
            i += 1;
        }
    }

    #[test]
    fn purchased_game_lands_on_leaderboard_and_chain() {
        let mut rng = StdRng::seed_from_u64(8);
        let now = at("2026-10-18T12:00:00Z");
        let mut hub = hub_with(MemoryStore::new());
        assert!(matches!(hub.purchase_arcade(&mut rng, now), Err(HubError::Chain(ChainError::NotConnected))));

        hub.connect_wallet(ALICE).unwrap();
        let id = hub.purchase_arcade(&mut rng, now).unwrap();
        play_out(&mut hub, &mut rng);
        let done = hub.complete_arcade(now).unwrap();
        assert!(done.saved);
        assert_eq!(done.chain_error, None);
        assert_eq!(hub.chain().player_stats(None).best_score, done.score);

        let rows = hub.leaderboard(GameType::Arcade, Window::Daily, now).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ranking_score(), done.score);
        assert_eq!(hub.profile().unwrap().total_games, 1);
        assert_eq!(hub.game().game_id(), Some(id));
        assert!(matches!(hub.complete_arcade(now), Err(HubError::NoActiveGame)));
    }

    #[test]
    fn practice_game_is_not_recorded() {
        let mut rng = StdRng::seed_from_u64(14);
        let now = at("2026-10-18T12:00:00Z");
        let mut hub = hub_with(MemoryStore::new());
        hub.connect_wallet(ALICE).unwrap();
        hub.start_practice(&mut rng);
        for i in 0..30 {
            hub.play_arcade(Direction::ALL[i % 4], &mut rng);
        }
        let done = hub.complete_arcade(now).unwrap();
        assert_eq!(done.entry, None);
        assert!(done.saved);
        assert_eq!(done.chain_error, None);
        for window in Window::ALL {
            assert!(hub.leaderboard(GameType::Arcade, window, now).unwrap().is_empty());
        }
        assert_eq!(hub.profile().unwrap().total_games, 0);
        assert_eq!(hub.chain().player_stats(None).total_games, 0);
    }

    #[test]
    fn chain_failure_keeps_local_record() {
        let mut rng = StdRng::seed_from_u64(9);
        let now = at("2026-10-18T12:00:00Z");
        let mut hub = hub_with(MemoryStore::new());
        hub.connect_wallet(ALICE).unwrap();
        hub.purchase_arcade(&mut rng, now).unwrap();
        hub.play_arcade(Direction::Left, &mut rng);
        hub.chain_mut().contract_mut().set_offline(true);
        let done = hub.complete_arcade(now).unwrap();
        assert!(done.saved);
        assert!(done.chain_error.is_some());
        assert_eq!(hub.leaderboard(GameType::Arcade, Window::Global, now).unwrap().len(), 1);
    }

    #[test]
    fn best_score_write_failure_is_reported_not_fatal() {
        let mut rng = StdRng::seed_from_u64(10);
        let mut hub = Hub::new(
            MemoryStore::with_quota(0),
            ChainClient::new(MemoryContract::default(), None),
            Leaderboard::default(),
            Duration::hours(24),
        );
        hub.start_practice(&mut rng);
        let mut saw_unsaved = false;
        for i in 0..50 {
            let Saved { value, saved } = hub.play_arcade(Direction::ALL[i % 4], &mut rng);
            if let Turn::Moved { new_best: true, .. } = value {
                saw_unsaved |= !saved;
            }
        }
        assert!(saw_unsaved);
        assert!(hub.game().score() > 0);
    }

    #[test]
    fn quiz_flow_persists_and_consumes_results() {
        let mut rng = StdRng::seed_from_u64(11);
        let now = at("2026-10-18T12:00:00Z");
        let mut hub = hub_with(MemoryStore::new());
        assert!(matches!(hub.answer_quiz(1, "usdt"), Err(HubError::NoActiveQuiz)));
        assert!(hub.start_quiz("ada").saved);
        for _ in 0..3 {
            let q = hub.next_question(&mut rng).unwrap();
            hub.answer_quiz(q.id, q.correct_answer).unwrap();
        }
        assert!(matches!(hub.answer_quiz(999, "x"), Err(HubError::UnknownQuestion(999))));

        // A restarted hub picks the session back up.
        let mut hub = hub_with(hub.into_store());
        assert_eq!(hub.quiz().map(|q| q.current_streak), Some(3));

        let results = hub.end_quiz(now).unwrap();
        assert!(results.saved);
        assert_eq!(results.value.points.to_string(), "1.0");
        assert!(hub.quiz().is_none());
        assert_eq!(hub.take_last_results().unwrap(), Some(results.value));
        assert_eq!(hub.take_last_results().unwrap(), None);
        assert_eq!(hub.leaderboard(GameType::Quiz, Window::Global, now).unwrap().len(), 1);
    }

    #[test]
    fn paid_quiz_requires_purchase() {
        let now = at("2026-10-18T12:00:00Z");
        let mut hub = hub_with(MemoryStore::new());
        assert!(hub.start_paid_quiz("bob", now).is_err());
        hub.connect_wallet(ALICE).unwrap();
        hub.start_paid_quiz("bob", now).unwrap();
        assert_eq!(hub.quiz().and_then(|q| q.question_limit), Some(quiz::PAID_QUIZ_LENGTH));
        hub.end_quiz(now).unwrap();
        let rows = hub.leaderboard(GameType::XplQuiz, Window::Global, now).unwrap();
        assert_eq!(rows[0].wallet_address().map(|w| w.as_str()), Some(ALICE));
    }

    #[test]
    fn paid_quiz_stops_at_round_length() {
        let mut rng = StdRng::seed_from_u64(15);
        let now = at("2026-10-18T12:00:00Z");
        let mut hub = hub_with(MemoryStore::new());
        hub.connect_wallet(ALICE).unwrap();
        hub.start_paid_quiz("bob", now).unwrap();
        for n in 1..=quiz::PAID_QUIZ_LENGTH {
            let q = hub.next_question(&mut rng).unwrap();
            let outcome = hub.answer_quiz(q.id, q.correct_answer).unwrap().value;
            assert_eq!(outcome.finished, n == quiz::PAID_QUIZ_LENGTH);
        }
        let q = hub.next_question(&mut rng).unwrap();
        assert!(matches!(hub.answer_quiz(q.id, q.correct_answer), Err(HubError::QuizFinished)));

        let results = hub.end_quiz(now).unwrap().value;
        assert_eq!(results.questions_answered, quiz::PAID_QUIZ_LENGTH);
        // Awards at streaks 3, 6, .., 18: 1.0 + 1.1 + .. + 1.5
        assert_eq!(results.points.to_string(), "7.5");
        let rows = hub.leaderboard(GameType::XplQuiz, Window::Global, now).unwrap();
        assert_eq!(rows[0].ranking_score(), 75);
    }

    #[test]
    fn spin_and_daily_quiz_need_wallet() {
        let mut rng = StdRng::seed_from_u64(12);
        let now = at("2026-10-18T12:00:00Z");
        let mut hub = hub_with(MemoryStore::new());
        assert!(matches!(hub.spin_wheel(&mut rng, now), Err(HubError::NotConnected)));
        hub.connect_wallet(ALICE).unwrap();
        let reward = hub.spin_wheel(&mut rng, now).unwrap().value;
        assert!(matches!(hub.spin_wheel(&mut rng, now), Err(HubError::Spin(SpinError::CoolingDown { .. }))));
        assert_eq!(hub.spin_remaining(now + Duration::hours(1)).unwrap(), 23 * 3600);

        let q = hub.daily_question(now);
        assert_eq!(hub.answer_daily_quiz(q.correct_answer, now).unwrap().value, profile::DAILY_QUIZ_REWARD);
        assert!(matches!(hub.answer_daily_quiz(q.correct_answer, now), Err(HubError::Profile(_))));
        assert_eq!(hub.profile().unwrap().lhp_points, reward.points + profile::DAILY_QUIZ_REWARD);
    }

    #[test]
    fn prize_pool_uses_recorded_purchases() {
        let mut rng = StdRng::seed_from_u64(13);
        let now = at("2026-10-18T12:00:00Z");
        let mut hub = hub_with(MemoryStore::new());
        hub.connect_wallet(ALICE).unwrap();
        assert_eq!(hub.prize_pool(now).unwrap().participants, 0);
        hub.purchase_arcade(&mut rng, now).unwrap();
        // Cached for five minutes.
        assert_eq!(hub.prize_pool(now).unwrap().participants, 0);
        hub.refresh_prize_pool();
        assert_eq!(hub.prize_pool(now).unwrap().participants, 1);
    }
}
