use arrayvec::ArrayVec;
use shakmaty::{Chess, Move, MoveList, Position, Role};

use crate::search::context::SearchContext;

const TT_MOVE_SCORE: i32 = 600;
const KILLER_SCORE: i32 = 500;
const QUIET_SCORE: i32 = -1000;

fn role_number(role: Role) -> i32 {
    match role {
        Role::Pawn => 1,
        Role::Knight => 2,
        Role::Bishop => 3,
        Role::Rook => 4,
        Role::Queen => 5,
        Role::King => 6,
    }
}

/// Rank a candidate move for alpha-beta; higher rates are searched first.
/// The first matching rule wins: table move, killer, history counter,
/// MVV-LVA capture, promotion, then everything else.
pub fn rate(
    pos: &Chess,
    m: &Move,
    tt_move: Option<&Move>,
    killers: &[Option<Move>; 2],
    ctx: &SearchContext,
) -> i32 {
    if tt_move == Some(m) {
        return TT_MOVE_SCORE;
    }

    if killers.iter().any(|k| k.as_ref() == Some(m)) {
        return KILLER_SCORE;
    }

    let history = ctx.history_score(pos.turn(), m);
    if history != 0 {
        return (history / 100).clamp(1, KILLER_SCORE - 1);
    }

    if m.is_capture() {
        if m.is_en_passant() {
            return 0;
        }
        let victim = m.capture().map(role_number).unwrap_or(0);
        let attacker = role_number(m.role());
        return 100 * (victim - attacker);
    }

    if m.is_promotion() {
        return 0;
    }

    QUIET_SCORE
}

/// Sort a move list best-first. Rates are computed once per move.
pub fn sort_moves(
    pos: &Chess,
    moves: MoveList,
    tt_move: Option<&Move>,
    killers: &[Option<Move>; 2],
    ctx: &SearchContext,
) -> MoveList {
    let mut scored: ArrayVec<(i32, Move), 256> = moves
        .into_iter()
        .map(|m| (rate(pos, &m, tt_move, killers, ctx), m))
        .collect();
    scored.sort_by_key(|(score, _)| -score);

    let mut out = MoveList::new();
    for (_, m) in scored {
        out.push(m);
    }
    out
}
