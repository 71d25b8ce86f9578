use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, MoveList, Position};

/// Terminal states the evaluator and driver care about.
///
/// Threefold and fifty-move are claimable draws under FIDE rules, but the
/// engine treats them as final the way the original search does: a position
/// that can be claimed drawn scores zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    InPlay,
    Checkmate,
    Stalemate,
    DrawThreefold,
    DrawFiftyMove,
    DrawInsufficient,
}

impl GameStatus {
    pub fn is_draw(self) -> bool {
        matches!(
            self,
            GameStatus::Stalemate
                | GameStatus::DrawThreefold
                | GameStatus::DrawFiftyMove
                | GameStatus::DrawInsufficient
        )
    }
}

/// A position plus the Zobrist history of the line that reached it.
///
/// `shakmaty` supplies legality, attacks, and hashing; what it does not track
/// is repetition, so `Game` keeps the key of every position on the current
/// line and answers threefold queries from that. Search uses `push`/`pop`
/// like make/unmake; the UCI layer replays `position` commands through the
/// same interface so game history and search history share one stack.
#[derive(Clone)]
pub struct Game {
    current: Chess,
    undo: Vec<Chess>,
    keys: Vec<u64>,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    pub fn new() -> Self {
        let current = Chess::default();
        let key = zobrist_key(&current);
        Self {
            current,
            undo: Vec::new(),
            keys: vec![key],
        }
    }

    pub fn from_fen(fen: &str) -> Option<Self> {
        let setup: Fen = fen.parse().ok()?;
        let current: Chess = setup.into_position(CastlingMode::Standard).ok()?;
        let key = zobrist_key(&current);
        Some(Self {
            current,
            undo: Vec::new(),
            keys: vec![key],
        })
    }

    pub fn pos(&self) -> &Chess {
        &self.current
    }

    pub fn turn(&self) -> Color {
        self.current.turn()
    }

    /// Zobrist key of the current position (Polyglot-compatible).
    pub fn key(&self) -> u64 {
        self.keys.last().copied().unwrap_or(0)
    }

    pub fn piece_count(&self) -> usize {
        self.current.board().occupied().count()
    }

    pub fn legal_moves(&self) -> MoveList {
        self.current.legal_moves()
    }

    pub fn capture_moves(&self) -> MoveList {
        self.current.capture_moves()
    }

    pub fn is_irreversible(&self, m: &Move) -> bool {
        self.current.is_irreversible(m)
    }

    pub fn push(&mut self, m: &Move) {
        self.undo.push(self.current.clone());
        self.current.play_unchecked(m);
        self.keys.push(zobrist_key(&self.current));
    }

    pub fn pop(&mut self) {
        if let Some(prev) = self.undo.pop() {
            self.current = prev;
            self.keys.pop();
        }
    }

    /// Pass the move to the opponent. Returns false (and leaves the game
    /// untouched) when the resulting position would be illegal, which only
    /// happens with the mover in check; null-move pruning never asks for a
    /// null in that case.
    pub fn push_null(&mut self) -> bool {
        match self.current.clone().swap_turn() {
            Ok(next) => {
                self.undo.push(self.current.clone());
                self.current = next;
                self.keys.push(zobrist_key(&self.current));
                true
            }
            Err(_) => false,
        }
    }

    /// Parse and apply a UCI move such as `e2e4` or `e7e8q`.
    pub fn push_uci(&mut self, s: &str) -> bool {
        let uci: UciMove = match s.parse() {
            Ok(u) => u,
            Err(_) => return false,
        };
        match uci.to_move(&self.current) {
            Ok(m) => {
                self.push(&m);
                true
            }
            Err(_) => false,
        }
    }

    /// How many times the current position has occurred on this line,
    /// including the current occurrence.
    pub fn repetitions(&self) -> usize {
        let key = self.key();
        self.keys.iter().filter(|&&k| k == key).count()
    }

    pub fn status(&self) -> GameStatus {
        if self.current.is_checkmate() {
            return GameStatus::Checkmate;
        }
        if self.current.is_stalemate() {
            return GameStatus::Stalemate;
        }
        if self.current.is_insufficient_material() {
            return GameStatus::DrawInsufficient;
        }
        if self.current.halfmoves() >= 100 {
            return GameStatus::DrawFiftyMove;
        }
        if self.repetitions() >= 3 {
            return GameStatus::DrawThreefold;
        }
        GameStatus::InPlay
    }

    pub fn fen(&self) -> String {
        Fen::from_position(self.current.clone(), EnPassantMode::Legal).to_string()
    }
}

pub fn zobrist_key(pos: &Chess) -> u64 {
    pos.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0
}

/// UCI notation for a move, e.g. `e2e4` or `e7e8q`.
pub fn uci_string(m: &Move) -> String {
    m.to_uci(CastlingMode::Standard).to_string()
}

/// Side index for the history table: white = 0, black = 1.
pub fn side_index(color: Color) -> usize {
    if color.is_white() { 0 } else { 1 }
}
