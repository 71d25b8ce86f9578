//! Static evaluation in centipawns, always from the side to move's
//! perspective: positive means the player about to move stands better.

pub mod pawns;
pub mod pesto;

use once_cell::sync::Lazy;
use shakmaty::{attacks, Bitboard, CastlingSide, Color, Piece, Position, Role, Square};

use crate::position::{side_index, Game, GameStatus};
use crate::tablebase::{self, TbHandle};
use pawns::PawnCache;
use pesto::{
    EG_TABLES, KING_THREAT_TABLE, MATERIAL, MG_TABLES, OUTPOST, PHASE, QUEEN_PINNED,
    ROOK_OPEN_FILE, ROOK_SEMIOPEN_FILE, ROOK_TRAPPED, ROOK_TRAPPED_NO_CASTLE, TOTAL_PHASE,
};

pub const MATE_SCORE: i32 = 99_999;
pub const INF: i32 = 100_000;

const MATERIAL_WEIGHT: i32 = 10;

const ROLES: [Role; 6] = [
    Role::Pawn,
    Role::Knight,
    Role::Bishop,
    Role::Rook,
    Role::Queen,
    Role::King,
];

const FILE_A: u64 = 0x0101_0101_0101_0101;

/// King zone per `[side][king square]`: the files around the king crossed
/// with the king's rank, one rank behind it, and two ranks ahead of it
/// (ahead meaning toward the opponent of `side`).
static KING_ZONE: Lazy<[[u64; 64]; 2]> = Lazy::new(|| {
    let mut zones = [[0u64; 64]; 2];
    for (side, zone_row) in zones.iter_mut().enumerate() {
        for (sq, zone) in zone_row.iter_mut().enumerate() {
            let rank = (sq / 8) as i32;
            let file = (sq % 8) as i32;
            let forward: i32 = if side == 0 { 1 } else { -1 };

            let mut ranks = 0u64;
            for dr in [0, forward, 2 * forward, -forward] {
                let r = rank + dr;
                if (0..8).contains(&r) {
                    ranks |= 0xFFu64 << (r * 8);
                }
            }

            let mut files = FILE_A << file;
            if file > 0 {
                files |= FILE_A << (file - 1);
            }
            if file < 7 {
                files |= FILE_A << (file + 1);
            }

            *zone = ranks & files;
        }
    }
    zones
});

fn role_index(role: Role) -> usize {
    match role {
        Role::Pawn => 0,
        Role::Knight => 1,
        Role::Bishop => 2,
        Role::Rook => 3,
        Role::Queen => 4,
        Role::King => 5,
    }
}

/// A piece on rank 4-6 (from its own side) defended by a friendly pawn.
fn is_outpost(color: Color, sq: Square, my_pawns: Bitboard) -> bool {
    let rank = sq.rank() as usize;
    let rel_rank = if color.is_white() { rank } else { 7 - rank };
    (3..=5).contains(&rel_rank) && (attacks::pawn_attacks(!color, sq) & my_pawns).any()
}

/// Static score of the current position for the side to move.
///
/// Decided games short-circuit (`-MATE_SCORE` when mated, `0` for any draw);
/// with an endgame oracle attached, positions of five or fewer pieces come
/// straight from the tablebase. Everything else is the weighted sum of
/// material, tapered piece-square tables, mobility, and the piece-specific
/// terms, plus one so a computed zero never reads as a draw score.
pub fn evaluate(game: &Game, cache: &mut PawnCache, oracle: Option<&TbHandle>) -> i32 {
    match game.status() {
        GameStatus::Checkmate => return -MATE_SCORE,
        s if s.is_draw() => return 0,
        _ => {}
    }

    if let Some(tb) = oracle {
        if game.piece_count() <= tablebase::PIECE_LIMIT {
            if let Some(distance) = tb.probe(game.pos()) {
                return tablebase::leaf_score(distance);
            }
        }
    }

    let pos = game.pos();
    let board = pos.board();
    let us = pos.turn();
    let occupied = board.occupied();

    let mut material = 0;
    let mut psqt_mg = 0;
    let mut psqt_eg = 0;
    let mut phase = 0;
    let mut mobility = 0;
    let mut specific_mg = 0;
    let mut specific_eg = 0;
    let mut threat = 0;

    let white_pawns = (board.pawns() & board.white()).0;
    let black_pawns = (board.pawns() & board.black()).0;
    let (pawn_mg, pawn_eg) = match cache.probe(white_pawns, black_pawns) {
        Some(cached) => cached,
        None => {
            let computed = pawns::pawn_terms(board);
            cache.store(white_pawns, black_pawns, computed.0, computed.1);
            computed
        }
    };

    for color in [Color::White, Color::Black] {
        let sign = if color == us { 1 } else { -1 };
        let my_pawns = board.pawns() & board.by_color(color);
        let their_pawns = board.pawns() & board.by_color(!color);
        let king_file = board.king_of(color).map(|k| k.file() as i32);
        let zone = board
            .king_of(!color)
            .map(|k| Bitboard(KING_ZONE[side_index(!color)][k as usize]))
            .unwrap_or(Bitboard::EMPTY);
        let mut attack_units: i32 = 0;

        for role in ROLES {
            let idx = role_index(role);
            for sq in board.by_piece(Piece { color, role }) {
                material += MATERIAL[idx] * sign;

                let table_sq = if color.is_white() {
                    sq as usize ^ 56
                } else {
                    sq as usize
                };
                psqt_mg += MG_TABLES[idx][table_sq] * sign;
                psqt_eg += EG_TABLES[idx][table_sq] * sign;
                phase += PHASE[idx];

                match role {
                    Role::Knight => {
                        if is_outpost(color, sq, my_pawns) {
                            specific_mg += OUTPOST.0 * sign;
                            specific_eg += OUTPOST.1 * sign;
                        }
                        let reach = attacks::knight_attacks(sq);
                        attack_units += 2 * (reach & zone).count() as i32;
                        mobility += (reach & !occupied).count() as i32 * sign;
                    }
                    Role::Bishop => {
                        if is_outpost(color, sq, my_pawns) {
                            specific_mg += OUTPOST.0 * sign;
                            specific_eg += OUTPOST.1 * sign;
                        }
                        let reach = attacks::bishop_attacks(sq, occupied);
                        attack_units += 2 * (reach & zone).count() as i32;
                        mobility += (reach & !occupied).count() as i32 * sign;
                    }
                    Role::Rook => {
                        let file_bb = Bitboard(FILE_A << (sq.file() as usize));
                        if (file_bb & my_pawns).is_empty() {
                            let bonus = if (file_bb & their_pawns).is_empty() {
                                ROOK_OPEN_FILE
                            } else {
                                ROOK_SEMIOPEN_FILE
                            };
                            specific_mg += bonus.0 * sign;
                            specific_eg += bonus.1 * sign;
                        }

                        if let Some(kf) = king_file {
                            let rf = sq.file() as i32;
                            let trapped_side = if kf <= 3 && rf < kf {
                                Some(CastlingSide::QueenSide)
                            } else if kf >= 4 && rf > kf {
                                Some(CastlingSide::KingSide)
                            } else {
                                None
                            };
                            if let Some(side) = trapped_side {
                                let penalty = if pos.castles().has(color, side) {
                                    ROOK_TRAPPED
                                } else {
                                    ROOK_TRAPPED_NO_CASTLE
                                };
                                specific_mg += penalty.0 * sign;
                                specific_eg += penalty.1 * sign;
                            }
                        }

                        let reach = attacks::rook_attacks(sq, occupied);
                        attack_units += 3 * (reach & zone).count() as i32;
                        mobility += (reach & !occupied).count() as i32 * sign;
                    }
                    Role::Queen => {
                        let mut slider_reach = Bitboard::EMPTY;
                        for b in board.bishops() & board.by_color(!color) {
                            slider_reach |= attacks::bishop_attacks(b, occupied);
                        }
                        for r in board.rooks() & board.by_color(!color) {
                            slider_reach |= attacks::rook_attacks(r, occupied);
                        }
                        for q in board.queens() & board.by_color(!color) {
                            slider_reach |= attacks::queen_attacks(q, occupied);
                        }

                        let reach = attacks::queen_attacks(sq, occupied);
                        if (reach & slider_reach).any() {
                            specific_mg += QUEEN_PINNED.0 * sign;
                            specific_eg += QUEEN_PINNED.1 * sign;
                        }
                        attack_units += 5 * (reach & zone).count() as i32;
                        mobility += (reach & !occupied).count() as i32 * sign;
                    }
                    _ => {}
                }
            }
        }

        let units = attack_units.clamp(0, KING_THREAT_TABLE.len() as i32 - 1);
        threat += KING_THREAT_TABLE[units as usize] * sign;
    }

    let stm_sign = if us.is_white() { 1 } else { -1 };
    specific_mg += pawn_mg * stm_sign;
    specific_eg += pawn_eg * stm_sign;

    let mg_phase = phase.min(TOTAL_PHASE);
    let eg_phase = TOTAL_PHASE - mg_phase;
    let psqt = (psqt_mg * mg_phase + psqt_eg * eg_phase) / TOTAL_PHASE;
    let piece_specific =
        (specific_mg * mg_phase + specific_eg * eg_phase) / TOTAL_PHASE + threat;

    MATERIAL_WEIGHT * material + psqt + mobility + piece_specific + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_fen(fen: &str) -> i32 {
        let game = Game::from_fen(fen).expect("valid FEN");
        let mut cache = PawnCache::new();
        evaluate(&game, &mut cache, None)
    }

    #[test]
    fn startpos_is_balanced() {
        // Symmetric position: every term cancels and only the
        // draw-disambiguation constant remains.
        assert_eq!(
            eval_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            1
        );
        assert_eq!(
            eval_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1"),
            1
        );
    }

    #[test]
    fn perspective_flip_negates_the_raw_score() {
        // Same board, other side to move: raw terms change sign while the +1
        // stays, so the two scores must sum to exactly 2.
        let white_view = eval_fen("4k3/8/8/8/8/8/PPP5/4K2R w - - 0 1");
        let black_view = eval_fen("4k3/8/8/8/8/8/PPP5/4K2R b - - 0 1");
        assert_eq!(white_view + black_view, 2);
        assert!(white_view > 0, "side up a rook and pawns must be ahead");
    }

    #[test]
    fn checkmate_scores_against_the_mated_side() {
        // Back-rank mate, black to move and mated.
        assert_eq!(eval_fen("R5k1/5ppp/8/8/8/8/8/4K3 b - - 0 1"), -MATE_SCORE);
    }

    #[test]
    fn stalemate_is_a_draw() {
        assert_eq!(eval_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1"), 0);
    }

    #[test]
    fn insufficient_material_is_a_draw() {
        assert_eq!(eval_fen("8/8/4k3/8/8/2K5/8/8 w - - 0 1"), 0);
    }

    #[test]
    fn rook_on_open_file_outranks_closed_rook() {
        // Identical material; only the white rook's file differs (e-file is
        // open, a-file is blocked by its own pawn).
        let open = eval_fen("6k1/8/8/8/8/8/P7/4R1K1 w - - 0 1");
        let closed = eval_fen("6k1/8/8/8/8/8/P7/R5K1 w - - 0 1");
        assert!(open > closed, "open file {open} should beat closed {closed}");
    }

    #[test]
    fn supported_knight_on_outpost_earns_bonus() {
        let outpost = eval_fen("4k3/8/8/3N4/2P5/8/8/4K3 w - - 0 1");
        let no_support = eval_fen("4k3/8/8/3N4/8/2P5/8/4K3 w - - 0 1");
        assert!(outpost > no_support);
    }
}
