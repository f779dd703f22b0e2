use thiserror::Error;

use crate::games::azul::{SourceId, Tile};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AzulError {
    #[error("No valid moves available")]
    NoLegalMoves,
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
    #[error("Illegal move by P{player}: {color:?} from {from:?} into line {line:?}")]
    IllegalMove {
        player: usize,
        from: SourceId,
        color: Tile,
        line: Option<usize>,
    },
    #[error("Number of players ({0}) outside the bound [2, 4]")]
    InvalidPlayerCount(usize),
    #[error("Game did not finish within {0} rounds")]
    RoundLimitExceeded(usize),
}
