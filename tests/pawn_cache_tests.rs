use outpost::eval::evaluate;
use outpost::eval::pawns::{PawnCache, pawn_terms};
use outpost::position::Game;
use shakmaty::Position;

#[test]
fn cache_roundtrip() {
    let mut cache = PawnCache::new();
    assert_eq!(cache.probe(0xABCD, 0x1234), None);

    cache.store(0xABCD, 0x1234, 17, -4);
    assert_eq!(cache.probe(0xABCD, 0x1234), Some((17, -4)));

    // Different key pair misses even if one half matches.
    assert_eq!(cache.probe(0xABCD, 0x9999), None);

    cache.clear();
    assert_eq!(cache.probe(0xABCD, 0x1234), None);
}

#[test]
fn same_structure_overwrites_in_place() {
    let mut cache = PawnCache::new();
    cache.store(1, 2, 10, 10);
    cache.store(1, 2, -5, 3);
    assert_eq!(cache.probe(1, 2), Some((-5, 3)));
}

#[test]
fn evaluation_is_idempotent_across_cache_hits() {
    let game =
        Game::from_fen("rnbqkbnr/pp3ppp/4p3/2pp4/3P4/4PN2/PPP2PPP/RNBQKB1R w KQkq - 0 4")
            .expect("valid FEN");
    let mut cache = PawnCache::new();

    let cold = evaluate(&game, &mut cache, None);
    let warm = evaluate(&game, &mut cache, None);
    assert_eq!(cold, warm, "a cache hit must reproduce the cold score");
}

#[test]
fn pawn_terms_are_white_relative_and_mirror_antisymmetric() {
    let game = Game::from_fen("4k3/pp6/8/8/8/8/5PPP/4K3 w - - 0 1").expect("valid FEN");
    let mirrored = Game::from_fen("4k3/5ppp/8/8/8/8/PP6/4K3 b - - 0 1").expect("valid FEN");

    let (mg, eg) = pawn_terms(game.pos().board());
    let (mirror_mg, mirror_eg) = pawn_terms(mirrored.pos().board());
    assert_eq!(
        (mg, eg),
        (-mirror_mg, -mirror_eg),
        "flipping the board flips the sign of the white-relative pawn score"
    );
}

#[test]
fn pawn_terms_do_not_depend_on_side_to_move() {
    let white = Game::from_fen("4k3/pp6/8/8/8/8/5PPP/4K3 w - - 0 1").expect("valid FEN");
    let black = Game::from_fen("4k3/pp6/8/8/8/8/5PPP/4K3 b - - 0 1").expect("valid FEN");
    assert_eq!(
        pawn_terms(white.pos().board()),
        pawn_terms(black.pos().board())
    );
}
