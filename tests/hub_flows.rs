use chrono::{DateTime, Duration, Utc};
use plasma_learn_hub::chain::{ChainClient, MemoryContract, WalletAddress, DEFAULT_GAME_PRICE, WEI_PER_XPL};
use plasma_learn_hub::engine::Direction;
use plasma_learn_hub::leaderboard::{GameType, Leaderboard, LeaderboardEntry, Window};
use plasma_learn_hub::quiz::questions;
use plasma_learn_hub::storage::{FileStore, KvStore, Namespaced};
use plasma_learn_hub::Hub;
use rand::{rngs::StdRng, SeedableRng};
use tempfile::TempDir;

const WALLET: &str = "0xAbCdEf0123456789abcdef0123456789ABCDEF01";

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn open_hub<S: KvStore>(store: S) -> Hub<S, MemoryContract> {
    let mut contract = MemoryContract::default();
    contract.fund(&WALLET.parse::<WalletAddress>().unwrap(), WEI_PER_XPL);
    Hub::new(store, ChainClient::new(contract, None), Leaderboard::default(), Duration::hours(24))
}

#[test]
fn results_survive_reopening_the_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hub.plh");
    let now = at("2026-10-18T12:00:00Z");
    let mut rng = StdRng::seed_from_u64(21);

    let (score, best) = {
        let mut hub = open_hub(Namespaced::new(FileStore::open(&path).unwrap(), "plasma"));
        hub.connect_wallet(WALLET).unwrap();
        hub.purchase_arcade(&mut rng, now).unwrap();
        for i in 0..200 {
            hub.play_arcade(Direction::ALL[i % 4], &mut rng);
        }
        let done = hub.complete_arcade(now).unwrap();
        assert!(done.saved);

        hub.start_quiz("ada");
        for _ in 0..3 {
            let q = hub.next_question(&mut rng).unwrap();
            hub.answer_quiz(q.id, q.correct_answer).unwrap();
        }
        hub.end_quiz(now).unwrap();
        (done.score, hub.game().best_score())
    };

    let mut hub = open_hub(Namespaced::new(FileStore::open(&path).unwrap(), "plasma"));
    assert_eq!(hub.game().best_score(), best);
    let arcade = hub.leaderboard(GameType::Arcade, Window::Weekly, now).unwrap();
    assert_eq!(arcade[0].ranking_score(), score);
    let quiz = hub.leaderboard(GameType::Quiz, Window::Global, now).unwrap();
    assert_eq!(quiz[0].nickname(), "ada");
    assert!(hub.take_last_results().unwrap().is_some());

    hub.connect_wallet(WALLET).unwrap();
    // One 2048 game plus one quiz.
    assert_eq!(hub.profile().unwrap().total_games, 2);
    assert_eq!(hub.prize_pool(now).unwrap().participants, 1);

    // A week later the row drops out of the weekly window.
    let later = now + Duration::days(8);
    assert!(hub.leaderboard(GameType::Arcade, Window::Weekly, later).unwrap().is_empty());
    assert_eq!(hub.leaderboard(GameType::Arcade, Window::Global, later).unwrap().len(), 1);
}

#[test]
fn repeat_wallet_games_merge_into_one_row() {
    let now = at("2026-10-18T12:00:00Z");
    let mut rng = StdRng::seed_from_u64(22);
    let mut hub = open_hub(plasma_learn_hub::storage::MemoryStore::new());
    // Same wallet, different casing.
    hub.connect_wallet(&WALLET.to_ascii_lowercase()).unwrap();
    let mut scores = Vec::new();
    for _ in 0..2 {
        hub.purchase_arcade(&mut rng, now).unwrap();
        for i in 0..40 {
            hub.play_arcade(Direction::ALL[i % 4], &mut rng);
        }
        scores.push(hub.complete_arcade(now).unwrap().score);
    }
    let rows = hub.leaderboard(GameType::Arcade, Window::Global, now).unwrap();
    assert_eq!(rows.len(), 1);
    match &rows[0] {
        LeaderboardEntry::Arcade(e) => {
            assert_eq!(e.games_played, 2);
            assert_eq!(e.score, scores.iter().copied().max().unwrap());
        }
        other => panic!("unexpected {other:?}"),
    }
    let stats = hub.chain().player_stats(None);
    assert_eq!(stats.total_games, 2);
    assert_eq!(stats.total_spent, 2 * DEFAULT_GAME_PRICE);
}

#[test]
fn question_bank_is_consistent() {
    let stats = questions::stats();
    assert_eq!(stats.total_questions, questions::QUESTIONS.len());
    let all: Vec<_> = questions::QUESTIONS.iter().collect();
    assert!(questions::ids_unique(&all));
    for q in questions::QUESTIONS.iter() {
        assert!(q.option(q.correct_answer).is_some(), "question {} has no matching option", q.id);
    }
}
