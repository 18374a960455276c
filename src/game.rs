//! 2048 session driver on top of [`crate::engine`].
//!
//! A [`Game`] owns one [`GameSession`]: it starts boards, applies moves,
//! spawns tiles, latches the win flag and tracks the best score. Persisting
//! the best score is explicit through [`Game::persist_best`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chain::GameId;
use crate::engine::{Board, Direction, Score, Spawn, WINNING_TILE};
use crate::storage::{KvStore, KvStoreExt, StorageError};

pub const BEST_SCORE_KEY: &str = "2048-best-score";

/// Serializable snapshot of a game in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub board: Board,
    pub score: Score,
    pub best_score: Score,
    pub max_tile: u32,
    pub game_id: Option<GameId>,
    pub is_active: bool,
    pub is_over: bool,
    pub has_won: bool,
}

/// What a call to [`Game::play`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// The game is not running or the move changed nothing.
    Ignored,
    Moved {
        score_delta: Score,
        spawned: Option<Spawn>,
        /// A 2048 tile appeared for the first time this game.
        just_won: bool,
        game_over: bool,
        /// The score passed the stored best.
        new_best: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Game {
    session: GameSession,
}

impl Game {
    /// Idle game with no board yet.
    pub fn new(best_score: Score) -> Self {
        Self {
            session: GameSession {
                board: Board::EMPTY,
                score: 0,
                best_score,
                max_tile: 0,
                game_id: None,
                is_active: false,
                is_over: false,
                has_won: false,
            },
        }
    }

    /// Idle game with the best score read from `store` (missing means 0).
    pub fn load<S: KvStore + ?Sized>(store: &S) -> Result<Self, StorageError> {
        let best = store.get_json::<Score>(BEST_SCORE_KEY)?.unwrap_or(0);
        Ok(Self::new(best))
    }

    pub fn from_session(session: GameSession) -> Self { Self { session } }

    pub fn session(&self) -> &GameSession { &self.session }

    pub fn board(&self) -> Board { self.session.board }

    pub fn score(&self) -> Score { self.session.score }

    pub fn best_score(&self) -> Score { self.session.best_score }

    pub fn max_tile(&self) -> u32 { self.session.max_tile }

    pub fn game_id(&self) -> Option<GameId> { self.session.game_id }

    pub fn is_active(&self) -> bool { self.session.is_active }

    pub fn is_over(&self) -> bool { self.session.is_over }

    pub fn has_won(&self) -> bool { self.session.has_won }

    /// New board with two tiles; keeps the best score.
    pub fn start<R: Rng + ?Sized>(&mut self, game_id: Option<GameId>, rng: &mut R) {
        let board = Board::initialize(rng);
        self.session = GameSession {
            board,
            score: 0,
            best_score: self.session.best_score,
            max_tile: board.max_tile(),
            game_id,
            is_active: true,
            is_over: false,
            has_won: false,
        };
        debug!(game_id = ?game_id, "2048 game started");
    }

    pub fn play<R: Rng + ?Sized>(&mut self, direction: Direction, rng: &mut R) -> Turn {
        let s = &mut self.session;
        if !s.is_active || s.is_over {
            return Turn::Ignored;
        }
        let outcome = s.board.apply_move(direction);
        if !outcome.moved {
            return Turn::Ignored;
        }
        let (board, spawned) = outcome.board.spawn_tile(rng);
        s.board = board;
        s.score += outcome.score_delta;
        s.max_tile = board.max_tile();

        let new_best = s.score > s.best_score;
        if new_best {
            s.best_score = s.score;
        }
        let just_won = !s.has_won && board.contains_tile(WINNING_TILE);
        s.has_won |= just_won;
        s.is_over = board.is_terminal();
        s.is_active = !s.is_over;
        if s.is_over {
            debug!(score = s.score, max_tile = s.max_tile, "2048 game over");
        }
        Turn::Moved { score_delta: outcome.score_delta, spawned, just_won, game_over: s.is_over, new_best }
    }

    pub fn persist_best<S: KvStore + ?Sized>(&self, store: &mut S) -> Result<(), StorageError> {
        store.set_json(BEST_SCORE_KEY, &self.session.best_score)
    }

    pub fn end(&mut self) {
        self.session.is_active = false;
        self.session.is_over = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use rand::{rngs::StdRng, SeedableRng};

    fn running(rows: [[u32; 4]; 4], score: Score, best: Score) -> Game {
        let board = Board::from_rows(rows).unwrap();
        Game::from_session(GameSession {
            board,
            score,
            best_score: best,
            max_tile: board.max_tile(),
            game_id: Some(GameId(1)),
            is_active: true,
            is_over: false,
            has_won: false,
        })
    }

    #[test]
    fn start_places_two_tiles() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut game = Game::new(300);
        assert_eq!(game.play(Direction::Left, &mut rng), Turn::Ignored);
        game.start(Some(GameId(9)), &mut rng);
        assert_eq!(game.board().count_empty(), 14);
        assert_eq!(game.score(), 0);
        assert_eq!(game.best_score(), 300);
        assert_eq!(game.game_id(), Some(GameId(9)));
        assert!(game.is_active() && !game.is_over() && !game.has_won());
        assert!(game.max_tile() == 2 || game.max_tile() == 4);
    }

    #[test]
    fn unchanged_board_is_ignored() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut game = running([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]], 0, 0);
        let before = *game.session();
        assert_eq!(game.play(Direction::Left, &mut rng), Turn::Ignored);
        assert_eq!(game.play(Direction::Up, &mut rng), Turn::Ignored);
        assert_eq!(*game.session(), before);
    }

    #[test]
    fn move_spawns_and_scores() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut game = running([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]], 10, 12);
        let before = game.board().tile_sum();
        match game.play(Direction::Left, &mut rng) {
            Turn::Moved { score_delta, spawned: Some(spawn), just_won, game_over, new_best } => {
                assert_eq!(score_delta, 4);
                assert_eq!(game.board().tile_sum(), before + spawn.value as u64);
                assert!(!just_won && !game_over);
                assert!(new_best);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(game.score(), 14);
        assert_eq!(game.best_score(), 14);
        assert_eq!(game.max_tile(), 4);
    }

    #[test]
    fn win_latches_without_ending() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = running([[1024, 1024, 0, 0], [0; 4], [0; 4], [0; 4]], 0, 0);
        match game.play(Direction::Left, &mut rng) {
            Turn::Moved { just_won, game_over, .. } => assert!(just_won && !game_over),
            other => panic!("unexpected {other:?}"),
        }
        assert!(game.has_won() && game.is_active());
        assert_eq!(game.max_tile(), 2048);
        // The flag stays set but is only reported once.
        match game.play(Direction::Right, &mut rng) {
            Turn::Moved { just_won, .. } => assert!(!just_won),
            other => panic!("unexpected {other:?}"),
        }
        assert!(game.has_won());
    }

    #[test]
    fn last_move_ends_the_game() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut game = running([[2, 4, 2, 4], [4, 2, 4, 2], [32, 4, 2, 4], [8, 16, 8, 0]], 100, 500);
        match game.play(Direction::Right, &mut rng) {
            Turn::Moved { game_over, new_best, .. } => assert!(game_over && !new_best),
            other => panic!("unexpected {other:?}"),
        }
        assert!(game.is_over() && !game.is_active());
        assert_eq!(game.play(Direction::Left, &mut rng), Turn::Ignored);
    }

    #[test]
    fn end_stops_play() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut game = Game::new(0);
        game.start(None, &mut rng);
        game.end();
        assert!(game.is_over() && !game.is_active());
        for dir in Direction::ALL {
            assert_eq!(game.play(dir, &mut rng), Turn::Ignored);
        }
    }

    #[test]
    fn best_score_round_trips_through_store() {
        let mut store = MemoryStore::new();
        assert_eq!(Game::load(&store).unwrap().best_score(), 0);
        let game = running([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]], 4096, 4096);
        game.persist_best(&mut store).unwrap();
        assert_eq!(store.get(BEST_SCORE_KEY).unwrap().as_deref(), Some("4096"));
        assert_eq!(Game::load(&store).unwrap().best_score(), 4096);
    }

    #[test]
    fn session_serializes_camel_case() {
        let game = running([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]], 8, 16);
        let json = serde_json::to_value(game.session()).unwrap();
        assert_eq!(json["bestScore"], 16);
        assert_eq!(json["gameId"], 1);
        assert_eq!(json["board"][0][0], 2);
        let back: GameSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, *game.session());
    }
}
