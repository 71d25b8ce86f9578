use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use shakmaty::Position;

use outpost::engine::Engine;
use outpost::logger;
use outpost::position::{Game, uci_string};
use outpost::search::SearchLimits;
use outpost::search::context::MAX_DEPTH;

fn main() -> anyhow::Result<()> {
    logger::init_logging("logs/outpost.log", "outpost=info");

    let engine = Arc::new(Mutex::new(Engine::new()));
    let stop = Arc::new(AtomicBool::new(false));
    let mut game = Game::new();
    let mut worker: Option<JoinHandle<()>> = None;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "uci" => handle_uci(),
            "isready" => println!("readyok"),
            "setoption" => {
                halt_search(&mut worker, &stop);
                handle_setoption(&parts, &engine);
            }
            "ucinewgame" => {
                halt_search(&mut worker, &stop);
                game = Game::new();
                lock(&engine).new_game();
            }
            "position" => {
                halt_search(&mut worker, &stop);
                if let Some(new_game) = handle_position(&parts) {
                    game = new_game;
                }
            }
            "go" => {
                halt_search(&mut worker, &stop);
                let limits = parse_go(&parts, &game);
                let engine = Arc::clone(&engine);
                let stop_flag = Arc::clone(&stop);
                let mut search_game = game.clone();
                worker = Some(std::thread::spawn(move || {
                    let report = lock(&engine).choose_move(&mut search_game, &limits, stop_flag);
                    match report.best_move {
                        Some(m) => println!("bestmove {}", uci_string(&m)),
                        None => println!("bestmove 0000"),
                    }
                }));
            }
            "stop" => stop.store(true, Ordering::Relaxed),
            "fen" => println!("{}", game.fen()),
            "d" | "display" => println!("{:?}", game.pos().board()),
            "quit" => break,
            _ => println!("info string unknown command: {line}"),
        }
    }

    halt_search(&mut worker, &stop);
    Ok(())
}

fn lock(engine: &Arc<Mutex<Engine>>) -> std::sync::MutexGuard<'_, Engine> {
    match engine.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Stop the running search (if any) and wait for its `bestmove`.
fn halt_search(worker: &mut Option<JoinHandle<()>>, stop: &Arc<AtomicBool>) {
    if let Some(handle) = worker.take() {
        stop.store(true, Ordering::Relaxed);
        let _ = handle.join();
    }
    stop.store(false, Ordering::Relaxed);
}

fn handle_uci() {
    println!("id name Outpost {}", env!("CARGO_PKG_VERSION"));
    println!("id author the Outpost developers");
    println!();
    println!("option name openingbook type check default false");
    println!("option name tablebase type check default false");
    println!("option name openingbookpath type string default book.bin");
    println!("option name tablebasepath type string default tablebases");
    println!("uciok");
}

fn handle_setoption(parts: &[&str], engine: &Arc<Mutex<Engine>>) {
    let name_idx = parts.iter().position(|&p| p == "name");
    let value_idx = parts.iter().position(|&p| p == "value");
    let (name, value) = match (name_idx, value_idx) {
        (Some(n), Some(v)) if n + 1 < v && v + 1 <= parts.len() => {
            (parts[n + 1..v].join(" "), parts[v + 1..].join(" "))
        }
        _ => {
            println!("info string malformed setoption: {}", parts.join(" "));
            return;
        }
    };
    if !lock(engine).set_option(&name, &value) {
        println!("info string unknown option: {name}");
    }
}

fn handle_position(parts: &[&str]) -> Option<Game> {
    let mut game = match parts.get(1) {
        Some(&"startpos") => Game::new(),
        Some(&"fen") => {
            let fen_end = parts
                .iter()
                .position(|&p| p == "moves")
                .unwrap_or(parts.len());
            let fen = parts.get(2..fen_end)?.join(" ");
            match Game::from_fen(&fen) {
                Some(g) => g,
                None => {
                    println!("info string invalid fen: {fen}");
                    return None;
                }
            }
        }
        _ => {
            println!("info string invalid position command");
            return None;
        }
    };

    if let Some(moves_idx) = parts.iter().position(|&p| p == "moves") {
        for move_str in &parts[moves_idx + 1..] {
            if !game.push_uci(move_str) {
                println!("info string invalid move: {move_str}");
                return None;
            }
        }
    }

    Some(game)
}

fn parse_go(parts: &[&str], game: &Game) -> SearchLimits {
    let mut limits = SearchLimits::default();
    let mut wtime: Option<u64> = None;
    let mut btime: Option<u64> = None;
    let mut winc: u64 = 0;
    let mut binc: u64 = 0;
    let mut movestogo: Option<u64> = None;

    let mut i = 1;
    while i < parts.len() {
        let arg = |offset: usize| parts.get(i + offset).copied().unwrap_or("");
        match parts[i] {
            "depth" => {
                limits.depth = arg(1).parse().unwrap_or(MAX_DEPTH);
                i += 2;
            }
            "movetime" => {
                limits.movetime = arg(1).parse().ok().map(Duration::from_millis);
                i += 2;
            }
            "nodes" => {
                limits.nodes = arg(1).parse().ok();
                i += 2;
            }
            "wtime" => {
                wtime = arg(1).parse().ok();
                i += 2;
            }
            "btime" => {
                btime = arg(1).parse().ok();
                i += 2;
            }
            "winc" => {
                winc = arg(1).parse().unwrap_or(0);
                i += 2;
            }
            "binc" => {
                binc = arg(1).parse().unwrap_or(0);
                i += 2;
            }
            "movestogo" => {
                movestogo = arg(1).parse().ok();
                i += 2;
            }
            "infinite" => {
                limits = SearchLimits::default();
                i += 1;
            }
            _ => i += 1,
        }
    }

    if limits.movetime.is_none() {
        let (my_time, my_inc) = if game.turn().is_white() {
            (wtime, winc)
        } else {
            (btime, binc)
        };
        if let Some(remaining) = my_time {
            limits.movetime = Some(Duration::from_millis(allocate_time(
                remaining, my_inc, movestogo,
            )));
        }
    }

    limits
}

/// Turn a clock into a budget for one move: spend about 1/40th of the
/// remaining time plus most of the increment, keep a safety reserve, and
/// never sink more than a fifth of the clock into a single move.
fn allocate_time(remaining_ms: u64, increment_ms: u64, movestogo: Option<u64>) -> u64 {
    let reserve = (remaining_ms * 15 / 100).min(500);
    let usable = remaining_ms.saturating_sub(reserve);

    let alloc = match movestogo {
        Some(mtg) => usable / mtg.max(2) + increment_ms * 3 / 4,
        None => usable / 40 + increment_ms * 3 / 4,
    };

    alloc.min(usable / 5).max(10).min(usable.max(10))
}
