//! Top-level move selection: opening book, then endgame tablebase, then
//! iterative-deepening search, plus the table lifecycle around each
//! decision.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use shakmaty::Move;
use tracing::{debug, info, warn};

use crate::book::PolyglotBook;
use crate::eval::MATE_SCORE;
use crate::eval::pawns::PawnCache;
use crate::position::{Game, GameStatus};
use crate::search::context::SearchContext;
use crate::search::tt::{DEFAULT_TT_MB, TranspositionTable};
use crate::search::{SearchClock, SearchLimits, SearchReport, Searcher};
use crate::tablebase::{self, EndgameOracle, SyzygyOracle, TbHandle};

#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub own_book: bool,
    pub book_path: PathBuf,
    pub tablebase: bool,
    pub tablebase_path: PathBuf,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            own_book: false,
            book_path: PathBuf::from("book.bin"),
            tablebase: false,
            tablebase_path: PathBuf::from("tablebases"),
        }
    }
}

enum BookState {
    Unloaded,
    Ready(PolyglotBook),
    /// A load failed once; the feature stays off for this process.
    Disabled,
}

pub struct Engine {
    pub options: EngineOptions,
    tt: TranspositionTable,
    ctx: SearchContext,
    pawn_cache: PawnCache,
    book: BookState,
    tb: Option<TbHandle>,
    tb_disabled: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            options: EngineOptions::default(),
            tt: TranspositionTable::new(DEFAULT_TT_MB),
            ctx: SearchContext::new(),
            pawn_cache: PawnCache::new(),
            book: BookState::Unloaded,
            tb: None,
            tb_disabled: false,
        }
    }

    /// Forget everything tied to the previous game, including the pawn
    /// cache (which otherwise persists across searches).
    pub fn new_game(&mut self) {
        self.tt.clear();
        self.ctx.clear();
        self.pawn_cache.clear();
    }

    /// Apply a UCI `setoption`. Returns false for unknown option names.
    pub fn set_option(&mut self, name: &str, value: &str) -> bool {
        match name.to_ascii_lowercase().as_str() {
            "openingbook" => {
                self.options.own_book = value.eq_ignore_ascii_case("true");
                true
            }
            "tablebase" => {
                self.options.tablebase = value.eq_ignore_ascii_case("true");
                true
            }
            "openingbookpath" => {
                self.options.book_path = PathBuf::from(value);
                if !matches!(self.book, BookState::Disabled) {
                    self.book = BookState::Unloaded;
                }
                true
            }
            "tablebasepath" => {
                self.options.tablebase_path = PathBuf::from(value);
                if !self.tb_disabled {
                    self.tb = None;
                }
                true
            }
            _ => false,
        }
    }

    /// Attach a custom endgame oracle (tests use this to stand in for real
    /// tablebase files).
    pub fn set_oracle(&mut self, oracle: Box<dyn EndgameOracle>) {
        self.tb = Some(TbHandle::new(oracle));
        self.tb_disabled = false;
    }

    fn book_move(&mut self, game: &Game) -> Option<Move> {
        if !self.options.own_book {
            return None;
        }
        if matches!(self.book, BookState::Unloaded) {
            self.book = match PolyglotBook::load(&self.options.book_path) {
                Ok(book) => {
                    info!(
                        entries = book.len(),
                        path = %self.options.book_path.display(),
                        "opening book loaded"
                    );
                    BookState::Ready(book)
                }
                Err(err) => {
                    warn!("opening book unavailable, disabling: {err}");
                    BookState::Disabled
                }
            };
        }
        match &self.book {
            BookState::Ready(book) => book.probe(game.pos()),
            _ => None,
        }
    }

    fn tablebase_handle(&mut self) -> Option<&TbHandle> {
        if !self.options.tablebase || self.tb_disabled {
            return None;
        }
        if self.tb.is_none() {
            match SyzygyOracle::open(&self.options.tablebase_path) {
                Ok(oracle) => self.tb = Some(TbHandle::new(Box::new(oracle))),
                Err(err) => {
                    warn!("tablebases unavailable, disabling: {err}");
                    self.tb_disabled = true;
                    return None;
                }
            }
        }
        if !self.tb.as_ref().is_some_and(|h| h.available()) {
            self.tb_disabled = true;
            return None;
        }
        self.tb.as_ref()
    }

    /// Score every root move through the oracle and keep the maximiser.
    /// Returns `None` when any probe fails, leaving the decision to search.
    fn tablebase_move(&mut self, game: &mut Game) -> Option<(Move, i32)> {
        let handle = self.tablebase_handle()?;
        let mut best: Option<(Move, i32)> = None;

        for m in game.legal_moves() {
            game.push(&m);
            let score = match game.status() {
                GameStatus::Checkmate => MATE_SCORE + 1,
                s if s.is_draw() => 0,
                _ => match handle.probe(game.pos()) {
                    Some(distance) => tablebase::child_score(distance),
                    None => {
                        game.pop();
                        return None;
                    }
                },
            };
            game.pop();

            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                best = Some((m.clone(), score));
            }
        }
        best
    }

    /// Pick a move for the current position under the given limits: book
    /// first, tablebase next, search otherwise. Book and tablebase decisions
    /// report zero nodes.
    pub fn choose_move(
        &mut self,
        game: &mut Game,
        limits: &SearchLimits,
        stop: Arc<AtomicBool>,
    ) -> SearchReport {
        if let Some(m) = self.book_move(game) {
            debug!("book move");
            let report = SearchReport {
                best_move: Some(m),
                score: 0,
                depth: 0,
                nodes: 0,
            };
            self.after_move(game, &report);
            return report;
        }

        if game.piece_count() <= tablebase::PIECE_LIMIT {
            if let Some((m, score)) = self.tablebase_move(game) {
                debug!(score, "tablebase move");
                let report = SearchReport {
                    best_move: Some(m),
                    score,
                    depth: 0,
                    nodes: 0,
                };
                self.after_move(game, &report);
                return report;
            }
        }

        // Make sure the oracle is opened before the search borrows it for
        // leaf probes.
        let _ = self.tablebase_handle();
        let use_oracle = self.options.tablebase && !self.tb_disabled;
        let oracle = if use_oracle {
            self.tb.as_ref().filter(|h| h.available())
        } else {
            None
        };

        let clock = SearchClock::new(stop, limits);
        let mut searcher = Searcher {
            tt: &mut self.tt,
            ctx: &mut self.ctx,
            pawn_cache: &mut self.pawn_cache,
            oracle,
            clock,
            nodes: 0,
        };
        let report = searcher.iterate(game, limits.depth);
        self.after_move(game, &report);
        report
    }

    /// Table lifecycle after a top-level decision: an irreversible move
    /// invalidates every stored line (different repetition counts), and the
    /// per-search heuristics never outlive the decision.
    fn after_move(&mut self, game: &Game, report: &SearchReport) {
        if let Some(m) = &report.best_move {
            if game.is_irreversible(m) {
                self.tt.clear();
            }
        }
        self.ctx.clear();
    }
}
