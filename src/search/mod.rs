//! Negamax alpha-beta search with a transposition table, quiescence,
//! null-move pruning, late-move reduction, and iterative deepening.

pub mod context;
pub mod ordering;
pub mod tt;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

use shakmaty::{Move, Position};
use tracing::debug;

use crate::eval::pawns::PawnCache;
use crate::eval::{evaluate, INF};
use crate::position::{uci_string, Game, GameStatus};
use crate::tablebase::TbHandle;
use context::{SearchContext, MAX_DEPTH};
use tt::{Bound, Probe, TranspositionTable};

const NULL_MOVE_REDUCTION: i32 = 2;
/// At or below this many pieces zugzwang is too likely for a null move.
const NULL_MOVE_PIECE_FLOOR: usize = 14;
const LMR_MOVE_THRESHOLD: usize = 4;
const LMR_DEPTH_THRESHOLD: i32 = 5;

#[derive(Clone, Debug)]
pub struct SearchLimits {
    pub depth: i32,
    pub movetime: Option<Duration>,
    pub nodes: Option<u64>,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            depth: MAX_DEPTH,
            movetime: None,
            nodes: None,
        }
    }
}

/// Cooperative stop condition, polled at the entry of every search node.
/// The flag is level-triggered: once set, in-flight recursion unwinds with
/// neutral values and the deepener keeps the last completed depth.
pub struct SearchClock {
    stop: Arc<AtomicBool>,
    started: Instant,
    deadline: Option<Instant>,
    node_limit: Option<u64>,
}

impl SearchClock {
    pub fn new(stop: Arc<AtomicBool>, limits: &SearchLimits) -> Self {
        let started = Instant::now();
        Self {
            stop,
            started,
            deadline: limits.movetime.map(|budget| started + budget),
            node_limit: limits.nodes,
        }
    }

    pub fn triggered(&self, nodes: u64) -> bool {
        if self.stop.load(AtomicOrdering::Relaxed) {
            return true;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        if let Some(limit) = self.node_limit {
            if nodes >= limit {
                return true;
            }
        }
        false
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[derive(Clone, Debug)]
pub struct SearchReport {
    pub best_move: Option<Move>,
    pub score: i32,
    pub depth: i32,
    pub nodes: u64,
}

/// One search invocation: borrows the engine's persistent tables and owns
/// the node counter and clock.
pub struct Searcher<'a> {
    pub tt: &'a mut TranspositionTable,
    pub ctx: &'a mut SearchContext,
    pub pawn_cache: &'a mut PawnCache,
    pub oracle: Option<&'a TbHandle>,
    pub clock: SearchClock,
    pub nodes: u64,
}

impl Searcher<'_> {
    fn stopped(&self) -> bool {
        self.clock.triggered(self.nodes)
    }

    /// Captures-only extension of the search. Fail-hard within the window:
    /// returns beta on a cutoff and alpha otherwise.
    pub fn qsearch(&mut self, game: &mut Game, mut alpha: i32, beta: i32) -> i32 {
        if self.stopped() {
            return 0;
        }
        self.nodes += 1;

        let stand_pat = evaluate(game, self.pawn_cache, self.oracle);
        if stand_pat >= beta {
            return beta;
        }
        alpha = alpha.max(stand_pat);

        let captures = ordering::sort_moves(
            game.pos(),
            game.capture_moves(),
            None,
            &[None, None],
            self.ctx,
        );
        for m in captures {
            game.push(&m);
            let score = -self.qsearch(game, -beta, -alpha);
            game.pop();

            if self.stopped() {
                return 0;
            }
            if score >= beta {
                return beta;
            }
            alpha = alpha.max(score);
        }
        alpha
    }

    /// Fail-soft negamax. Returns the best move (if any was established) and
    /// the node value for the side to move under the given window.
    pub fn negamax(
        &mut self,
        game: &mut Game,
        depth: i32,
        mut alpha: i32,
        mut beta: i32,
        allow_null: bool,
    ) -> (Option<Move>, i32) {
        if self.stopped() {
            return (None, 0);
        }
        self.nodes += 1;

        let key = game.key();
        let original_alpha = alpha;
        let mut tt_move = None;

        match self.tt.probe(key, depth, &mut alpha, &mut beta) {
            Probe::Cutoff { best_move, score } => return (best_move, score),
            Probe::Seed(m) => tt_move = m,
            Probe::Miss => {}
        }

        if depth <= 0 || game.status() != GameStatus::InPlay {
            let score = self.qsearch(game, alpha, beta);
            let bound = if score <= original_alpha {
                Bound::Upper
            } else if score >= beta {
                Bound::Lower
            } else {
                Bound::Exact
            };
            self.tt.store(key, depth, None, score, bound);
            return (None, score);
        }

        let in_check = game.pos().is_check();

        if allow_null
            && !in_check
            && game.piece_count() > NULL_MOVE_PIECE_FLOOR
            && game.push_null()
        {
            let (_, reply) = self.negamax(
                game,
                depth - 1 - NULL_MOVE_REDUCTION,
                -beta,
                -beta + 1,
                false,
            );
            let score = -reply;
            game.pop();
            if score >= beta && !self.stopped() {
                return (None, score);
            }
        }

        let moves = ordering::sort_moves(
            game.pos(),
            game.legal_moves(),
            tt_move.as_ref(),
            self.ctx.killers_at(depth),
            self.ctx,
        );

        let mut best_move: Option<Move> = None;
        let mut best_score = -INF;
        let mut moves_searched = 0usize;

        for m in moves {
            game.push(&m);

            // Late-move reduction: quiet moves ranked far down the list get
            // one ply less, unless anything tactical is going on or this
            // node has already failed high.
            let mut reduction = 0;
            if moves_searched >= LMR_MOVE_THRESHOLD
                && depth >= LMR_DEPTH_THRESHOLD
                && best_score < beta
                && !in_check
                && !m.is_capture()
                && !m.is_promotion()
                && !game.pos().is_check()
            {
                reduction = 1;
            }

            let (_, reply) = self.negamax(game, depth - 1 - reduction, -beta, -alpha, true);
            let mut score = -reply;

            // A reduced move that beats alpha deserves a full-depth look.
            if reduction > 0 && score > alpha && !self.stopped() {
                let (_, reply) = self.negamax(game, depth - 1, -beta, -alpha, true);
                score = -reply;
            }

            game.pop();
            moves_searched += 1;

            if self.stopped() {
                return (None, 0);
            }

            if score > best_score {
                best_score = score;
                best_move = Some(m.clone());
            }
            alpha = alpha.max(best_score);

            if best_score >= beta {
                if !m.is_capture() {
                    self.ctx.update_history(game.turn(), &m, depth);
                    self.ctx.update_killer(depth, m.clone());
                }
                break;
            }
        }

        let bound = if best_score <= original_alpha {
            Bound::Upper
        } else if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.tt.store(key, depth, best_move.clone(), best_score, bound);
        (best_move, best_score)
    }

    /// Iterative deepening driver. Emits a UCI `info` line after every
    /// completed depth; an interrupted depth is discarded in favour of the
    /// previous one. Falls back to the first legal move when not even depth
    /// one finished.
    pub fn iterate(&mut self, game: &mut Game, max_depth: i32) -> SearchReport {
        let max_depth = max_depth.clamp(1, MAX_DEPTH);
        let mut completed: Option<(Move, i32, i32)> = None;

        for depth in 1..=max_depth {
            if self.stopped() {
                break;
            }
            let (mv, score) = self.negamax(game, depth, -INF, INF, true);
            if self.stopped() {
                break;
            }
            match mv {
                Some(m) => {
                    self.emit_info(depth, score, &m);
                    completed = Some((m, score, depth));
                }
                // No move at the root: the game is over, nothing to deepen.
                None => break,
            }
        }

        let (best_move, score, depth) = match completed {
            Some((m, s, d)) => (Some(m), s, d),
            None => (game.legal_moves().first().cloned(), 0, 0),
        };
        if let Some(m) = &best_move {
            self.emit_info(depth.max(1), score, m);
        }
        debug!(depth, score, nodes = self.nodes, "search finished");

        SearchReport {
            best_move,
            score,
            depth,
            nodes: self.nodes,
        }
    }

    fn emit_info(&self, depth: i32, score: i32, pv: &Move) {
        let millis = self.clock.elapsed().as_millis().max(1);
        let nps = (self.nodes as u128 * 1000 / millis) as u64;
        println!(
            "info depth {} score cp {} nodes {} nps {} time {} pv {}",
            depth,
            score,
            self.nodes,
            nps,
            millis,
            uci_string(pv)
        );
    }
}
