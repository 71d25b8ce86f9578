//! Endgame tablebase adapter.
//!
//! The search treats the tablebase as an opaque oracle: give it a position
//! with few pieces, get back a signed distance (positive when the side to
//! move is winning, zero for a draw). The production backend reads Syzygy
//! tables via `shakmaty-syzygy` and reports DTZ as that distance; tests plug
//! in their own oracles. Any I/O failure demotes the feature for the rest of
//! the process, so nothing in the search path ever sees an error.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use shakmaty::Chess;
use shakmaty_syzygy::Tablebase;
use tracing::warn;

use crate::eval::MATE_SCORE;

/// Positions with at most this many pieces are oracle territory.
pub const PIECE_LIMIT: usize = 5;

pub trait EndgameOracle: Send + Sync {
    /// Signed distance for the side to move: positive = winning, negative =
    /// losing, zero = drawn.
    fn mate_distance(&self, pos: &Chess) -> io::Result<i32>;
}

pub struct SyzygyOracle {
    tables: Tablebase<Chess>,
}

impl SyzygyOracle {
    pub fn open(dir: &Path) -> io::Result<Self> {
        let mut tables = Tablebase::new();
        let found = tables.add_directory(dir)?;
        if found == 0 {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no tablebase files in {}", dir.display()),
            ));
        }
        Ok(Self { tables })
    }
}

impl EndgameOracle for SyzygyOracle {
    fn mate_distance(&self, pos: &Chess) -> io::Result<i32> {
        let dtz = self.tables.probe_dtz(pos).map_err(io::Error::other)?;
        Ok(dtz.ignore_rounding().0)
    }
}

/// Wraps an oracle with the demote-on-error policy. After the first failed
/// probe the handle answers `None` forever and the driver falls back to
/// plain search.
pub struct TbHandle {
    oracle: Box<dyn EndgameOracle>,
    available: AtomicBool,
}

impl TbHandle {
    pub fn new(oracle: Box<dyn EndgameOracle>) -> Self {
        Self {
            oracle,
            available: AtomicBool::new(true),
        }
    }

    pub fn available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    pub fn probe(&self, pos: &Chess) -> Option<i32> {
        if !self.available() {
            return None;
        }
        match self.oracle.mate_distance(pos) {
            Ok(distance) => Some(distance),
            Err(err) => {
                warn!("tablebase probe failed, disabling tablebases: {err}");
                self.available.store(false, Ordering::Relaxed);
                None
            }
        }
    }
}

/// Score of a probed leaf for the side to move: wins shrink toward
/// `MATE_SCORE` as the distance grows, losses mirror that, draws are zero.
pub fn leaf_score(distance: i32) -> i32 {
    match distance.signum() {
        1 => MATE_SCORE - distance,
        -1 => -MATE_SCORE - distance,
        _ => 0,
    }
}

/// Score of a child position (opponent to move) from the root player's
/// point of view. A losing child mover means the root player wins; shorter
/// wins score higher, longer losses score higher.
pub fn child_score(distance: i32) -> i32 {
    match distance.signum() {
        -1 => MATE_SCORE + distance,
        1 => -MATE_SCORE + distance,
        _ => 0,
    }
}
