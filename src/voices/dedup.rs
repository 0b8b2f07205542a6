// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::HashSet;

use crate::bank::{BankId, SampleTableId};

/// Packs a bank and sample into one key.
pub fn dedup_key(bank_id: BankId, sample_table_id: SampleTableId) -> u32 {
    (u32::from(bank_id) << 16) | u32::from(sample_table_id)
}

/// The set of (bank, sample) pairs triggered since the last clear.
#[derive(Debug, Default)]
pub struct DedupGate {
    claimed: HashSet<u32>,
}

impl DedupGate {
    pub fn new() -> DedupGate {
        DedupGate::default()
    }

    /// Records the key. Returns false if it was already claimed this tick.
    pub fn try_claim(&mut self, key: u32) -> bool {
        self.claimed.insert(key)
    }

    pub fn contains(&self, key: u32) -> bool {
        self.claimed.contains(&key)
    }

    pub fn clear(&mut self) {
        self.claimed.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}
