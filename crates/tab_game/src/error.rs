//! Errors raised by session transitions.

/// A rejected game action.
///
/// Every variant is a state conflict: the session is left untouched when
/// one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum GameError {
    /// The actor is not seated in this session.
    #[display("{} is not a player in this game", _0)]
    NotAPlayer(String),

    /// Both seats are already taken by other players.
    #[display("Game already has two players")]
    SessionFull,

    /// The session has only one player.
    #[display("Waiting for opponent")]
    WaitingForOpponent,

    /// The session has ended.
    #[display("Game is already over")]
    GameOver,

    /// Someone else holds the turn.
    #[display("Not your turn")]
    NotYourTurn,

    /// The dice were already thrown this turn.
    #[display("Already rolled")]
    AlreadyRolled,

    /// A cell was selected before the dice were thrown.
    #[display("Roll the dice first")]
    NotRolled,

    /// The roll left no legal move; only `pass` is accepted.
    #[display("No moves, must pass")]
    MustPass,

    /// The cell index lies outside the board.
    #[display("Cell {} is outside the board", _0)]
    CellOutOfRange(usize),

    /// The selected cell does not hold one of the actor's pieces.
    #[display("Invalid piece")]
    InvalidPiece,

    /// The selected piece has no legal destination for this roll.
    #[display("Piece cannot move")]
    PieceCannotMove,
}

impl std::error::Error for GameError {}
