//! Polyglot opening book reader.
//!
//! A book is a flat array of 16-byte big-endian records sorted by position
//! key: 8 bytes key, 2 bytes move, 2 bytes weight, 4 bytes learn data (which
//! this engine ignores). The position key uses the Polyglot Zobrist scheme,
//! which is exactly what `shakmaty`'s hasher produces.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use rand::Rng;
use shakmaty::{Chess, File as BoardFile, Move, Position, Rank, Role, Square};

use crate::position::zobrist_key;

#[derive(Clone, Copy)]
struct BookEntry {
    key: u64,
    raw_move: u16,
    weight: u16,
}

pub struct PolyglotBook {
    entries: Vec<BookEntry>,
}

impl PolyglotBook {
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;

        let mut entries = Vec::with_capacity(buffer.len() / 16);
        for chunk in buffer.chunks_exact(16) {
            entries.push(BookEntry {
                key: u64::from_be_bytes(chunk[0..8].try_into().unwrap()),
                raw_move: u16::from_be_bytes(chunk[8..10].try_into().unwrap()),
                weight: u16::from_be_bytes(chunk[10..12].try_into().unwrap()),
            });
        }

        Ok(Self { entries })
    }

    /// Pick a book move for the position, weighted by entry popularity.
    /// Returns `None` when the position has no entry (or only undecodable
    /// ones).
    pub fn probe(&self, pos: &Chess) -> Option<Move> {
        let hash = zobrist_key(pos);
        let start = self.entries.partition_point(|e| e.key < hash);
        let group: Vec<BookEntry> = self.entries[start..]
            .iter()
            .take_while(|e| e.key == hash)
            .copied()
            .collect();
        if group.is_empty() {
            return None;
        }

        let total: u32 = group.iter().map(|e| e.weight as u32).sum();
        if total == 0 {
            // All weights zero: take the first entry that decodes.
            return group.iter().find_map(|e| decode_move(e.raw_move, pos));
        }

        let mut pick = rand::rng().random_range(0..total);
        for entry in &group {
            let weight = entry.weight as u32;
            if pick < weight {
                return decode_move(entry.raw_move, pos);
            }
            pick -= weight;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decode the Polyglot move encoding against the current legal moves.
/// Castling is encoded king-to-rook, which is how `shakmaty` represents
/// castle moves too, so everything reduces to a lookup.
fn decode_move(raw: u16, pos: &Chess) -> Option<Move> {
    let to_file = (raw & 0x7) as u32;
    let to_rank = ((raw >> 3) & 0x7) as u32;
    let from_file = ((raw >> 6) & 0x7) as u32;
    let from_rank = ((raw >> 9) & 0x7) as u32;
    let promotion = match (raw >> 12) & 0x7 {
        0 => None,
        1 => Some(Role::Knight),
        2 => Some(Role::Bishop),
        3 => Some(Role::Rook),
        4 => Some(Role::Queen),
        _ => return None,
    };

    let from = Square::from_coords(BoardFile::new(from_file), Rank::new(from_rank));
    let to = Square::from_coords(BoardFile::new(to_file), Rank::new(to_rank));

    pos.legal_moves().into_iter().find(|m| match m {
        Move::Castle { king, rook } => *king == from && *rook == to,
        Move::Normal {
            from: f,
            to: t,
            promotion: p,
            ..
        } => *f == from && *t == to && *p == promotion,
        Move::EnPassant { from: f, to: t } => promotion.is_none() && *f == from && *t == to,
        _ => false,
    })
}
