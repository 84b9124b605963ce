//! The three pure passes over one entry's candidate set: validity gate, scorer, screener,
//! then a stable sort by score.

use crate::gate::{is_valid, GateConfig};
use crate::knowledge::KnowledgeBase;
use crate::score::{rank, score};
use crate::screen::screen;
use imgsync_core::{Candidate, DatasetEntry};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Ranking {
    /// Nothing survived the validity gate.
    NoValid,
    /// Valid candidates existed but the screener vetoed all of them.
    OnlySuspicious { rejected: usize },
    /// Best first. Never empty.
    Ranked(Vec<Candidate>),
}

impl Ranking {
    pub fn candidates(&self) -> &[Candidate] {
        match self {
            Ranking::Ranked(v) => v,
            _ => &[],
        }
    }
}

/// Scores are computed against each candidate's own originating query.
pub fn rank_candidates(
    kb: &KnowledgeBase,
    entry: &DatasetEntry,
    candidates: Vec<Candidate>,
    gate: &GateConfig,
) -> Ranking {
    let mut valid: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| is_valid(c, gate))
        .collect();
    if valid.is_empty() {
        return Ranking::NoValid;
    }
    for c in &mut valid {
        c.score = score(kb, c, entry, &c.query);
    }

    let total = valid.len();
    let mut kept: Vec<Candidate> = Vec::with_capacity(total);
    for c in valid {
        match screen(kb, entry, &c) {
            Some(reason) => debug!(
                entry = %entry.id,
                provider = %c.provider,
                url = %c.image_url,
                reason = reason.as_str(),
                "candidate screened out"
            ),
            None => kept.push(c),
        }
    }
    if kept.is_empty() {
        return Ranking::OnlySuspicious { rejected: total };
    }
    rank(&mut kept);
    Ranking::Ranked(kept)
}
