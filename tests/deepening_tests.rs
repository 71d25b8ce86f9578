use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use outpost::engine::Engine;
use outpost::eval::INF;
use outpost::position::{Game, uci_string};
use outpost::search::{SearchClock, SearchLimits};

#[test]
fn completes_exactly_the_requested_depth() {
    let mut engine = Engine::new();
    let mut game = Game::new();
    let limits = SearchLimits {
        depth: 3,
        ..SearchLimits::default()
    };

    let report = engine.choose_move(&mut game, &limits, Arc::new(AtomicBool::new(false)));
    assert_eq!(report.depth, 3);
    assert!(report.nodes > 0);
    assert!(report.score.abs() < INF);

    let best = report.best_move.as_ref().map(uci_string).expect("a move");
    let legal: Vec<String> = game.legal_moves().iter().map(uci_string).collect();
    assert!(legal.contains(&best));
}

#[test]
fn preset_stop_flag_falls_back_to_a_legal_move() {
    let mut engine = Engine::new();
    let mut game = Game::new();
    let stop = Arc::new(AtomicBool::new(true));

    let report = engine.choose_move(&mut game, &SearchLimits::default(), stop);
    assert_eq!(report.depth, 0, "no depth can complete under a preset stop");

    let best = report.best_move.as_ref().map(uci_string).expect("fallback move");
    let legal: Vec<String> = game.legal_moves().iter().map(uci_string).collect();
    assert!(legal.contains(&best), "the fallback must still be legal");
}

#[test]
fn node_budget_interrupts_the_search() {
    let mut engine = Engine::new();
    let mut game = Game::new();
    let limits = SearchLimits {
        depth: 32,
        nodes: Some(200),
        ..SearchLimits::default()
    };

    let report = engine.choose_move(&mut game, &limits, Arc::new(AtomicBool::new(false)));
    assert!(
        report.nodes <= 2000,
        "the node budget must bite long before depth 32, counted {}",
        report.nodes
    );
    assert!(report.best_move.is_some());
}

#[test]
fn elapsed_movetime_trips_the_clock() {
    let stop = Arc::new(AtomicBool::new(false));
    let limits = SearchLimits {
        movetime: Some(Duration::from_millis(0)),
        ..SearchLimits::default()
    };
    let clock = SearchClock::new(Arc::clone(&stop), &limits);
    assert!(clock.triggered(0), "a zero budget expires immediately");

    let unlimited = SearchLimits::default();
    let clock = SearchClock::new(Arc::clone(&stop), &unlimited);
    assert!(!clock.triggered(0));
    stop.store(true, Ordering::Relaxed);
    assert!(clock.triggered(0), "the stop flag is level-triggered");
}

#[test]
fn terminal_positions_yield_no_move() {
    let mut engine = Engine::new();
    let mut game = Game::from_fen("R5k1/5ppp/8/8/8/8/8/4K3 b - - 0 1").expect("valid FEN");
    let report = engine.choose_move(
        &mut game,
        &SearchLimits {
            depth: 2,
            ..SearchLimits::default()
        },
        Arc::new(AtomicBool::new(false)),
    );
    assert!(report.best_move.is_none(), "checkmate leaves nothing to play");
}
