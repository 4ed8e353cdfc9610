pub mod display;
pub mod error;
pub mod game;
pub mod games;
pub mod mcts;
pub mod zobrist;
