use anyhow::Result;

pub mod azul;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

// A game state for sequential games with n players. This is played in many
// rounds where players take plys in sequence.
pub trait GameState {
    // Tell if a round is over. A round might be over but the game might not be.
    fn is_round_over(&self) -> bool;

    // Tell if the game is over. Also see `is_round_over`.
    fn is_game_over(&self) -> bool;
}
