// Azul for 2 to 4 seats, each seat driven by a CPU strategy. `Board` is what a
// strategy sees, `Game` owns the bag and drives rounds until some player
// completes a wall row.
mod board;
mod cpu;
mod engine;
mod logic;
mod model;

pub use cpu::Strategy;
pub use engine::{Game, GameConfig};
pub use model::{GameMode, SourceId, Tile};
