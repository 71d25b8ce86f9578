use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use outpost::book::PolyglotBook;
use outpost::engine::Engine;
use outpost::position::{Game, uci_string};
use outpost::search::SearchLimits;

/// Polyglot key of the starting position.
const STARTPOS_KEY: u64 = 0x463b_9618_1691_fc9c;

/// `e2e4` in Polyglot move encoding: from rank 1 file e, to rank 3 file e.
const E2E4: u16 = (1 << 9) | (4 << 6) | (3 << 3) | 4;

fn entry(key: u64, raw_move: u16, weight: u16) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    bytes[0..8].copy_from_slice(&key.to_be_bytes());
    bytes[8..10].copy_from_slice(&raw_move.to_be_bytes());
    bytes[10..12].copy_from_slice(&weight.to_be_bytes());
    bytes
}

fn write_book(name: &str, entries: &[[u8; 16]]) -> PathBuf {
    let path = std::env::temp_dir().join(name);
    let bytes: Vec<u8> = entries.iter().flatten().copied().collect();
    fs::write(&path, bytes).expect("write temp book");
    path
}

#[test]
fn probe_returns_the_stored_move() {
    let path = write_book(
        "outpost_probe_test.bin",
        &[entry(STARTPOS_KEY, E2E4, 100)],
    );
    let book = PolyglotBook::load(&path).expect("book loads");
    assert_eq!(book.len(), 1);

    let game = Game::new();
    let m = book.probe(game.pos()).expect("startpos entry");
    assert_eq!(uci_string(&m), "e2e4");
}

#[test]
fn positions_without_entries_miss() {
    let path = write_book(
        "outpost_miss_test.bin",
        &[entry(STARTPOS_KEY, E2E4, 100)],
    );
    let book = PolyglotBook::load(&path).expect("book loads");

    let mut game = Game::new();
    assert!(game.push_uci("e2e4"));
    assert!(book.probe(game.pos()).is_none());
}

#[test]
fn undecodable_entries_are_skipped() {
    // h7h8 is no legal white move from the start position.
    let bogus: u16 = (6 << 9) | (7 << 6) | (7 << 3) | 7;
    let path = write_book(
        "outpost_bogus_test.bin",
        &[entry(STARTPOS_KEY, bogus, 100)],
    );
    let book = PolyglotBook::load(&path).expect("book loads");
    assert!(book.probe(Game::new().pos()).is_none());
}

#[test]
fn engine_plays_the_book_move_without_searching() {
    let path = write_book(
        "outpost_engine_book_test.bin",
        &[entry(STARTPOS_KEY, E2E4, 100)],
    );

    let mut engine = Engine::new();
    assert!(engine.set_option("openingbook", "true"));
    assert!(engine.set_option("openingbookpath", path.to_str().expect("utf-8 path")));

    let mut game = Game::new();
    let report = engine.choose_move(
        &mut game,
        &SearchLimits::default(),
        Arc::new(AtomicBool::new(false)),
    );

    assert_eq!(report.best_move.as_ref().map(uci_string).as_deref(), Some("e2e4"));
    assert_eq!(report.nodes, 0, "book hits must not touch the search");
}

#[test]
fn missing_book_disables_the_feature_and_searches() {
    let mut engine = Engine::new();
    assert!(engine.set_option("openingbook", "true"));
    assert!(engine.set_option("openingbookpath", "/nonexistent/outpost.bin"));

    let limits = SearchLimits {
        depth: 2,
        ..SearchLimits::default()
    };
    let mut game = Game::new();
    for _ in 0..2 {
        let report = engine.choose_move(&mut game, &limits, Arc::new(AtomicBool::new(false)));
        assert!(report.best_move.is_some());
        assert!(report.nodes > 0, "with no book the engine must search");
    }
}

#[test]
fn unknown_options_are_rejected() {
    let mut engine = Engine::new();
    assert!(!engine.set_option("multipv", "2"));
    assert!(engine.set_option("tablebase", "true"));
}
