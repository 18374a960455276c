//! plasma-learn-hub: 2048, stablecoin quizzes and weekly leaderboards
//!
//! This crate provides:
//! - A compact `Board` type with table-driven moves (`engine` module) and a session driver (`game`)
//! - Quiz streak scoring and a built-in question bank (`quiz`)
//! - Leaderboards, user profiles and prize pool estimates over a key-value store
//! - A game contract seam with an in-memory implementation (`chain`)
//! - `Hub`, which ties all of the above together for front ends
//!
//! Quick start:
//! ```
//! use plasma_learn_hub::engine::{Board, Direction};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::initialize(&mut rng);
//! let out = b0.apply_move(Direction::Left);
//! assert_eq!(out.board.tile_sum(), b0.tile_sum());
//! ```
//!
//! Board methods take an explicit RNG; `engine::new_board` and
//! `engine::spawn_random_tile` use the thread RNG instead.
pub mod chain;
pub mod config;
pub mod engine;
pub mod game;
pub mod hub;
pub mod leaderboard;
pub mod prize_pool;
pub mod profile;
pub mod quiz;
pub mod storage;

pub use hub::{Hub, HubError, Saved};
