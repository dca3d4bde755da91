//! Deduplication - skip incoming records that already exist under another source
//!
//! Import-style units compare each candidate against the records already in
//! the store, trying matchers in order of decreasing confidence:
//!
//! | Matcher           | Level     | Rule                                              |
//! |-------------------|-----------|---------------------------------------------------|
//! | `IdentifierMatch` | HighId    | a donor/project identifier is shared              |
//! | `ExactName`       | HighName  | normalized names equal (and donors, when both set) |
//! | `FuzzyNameAmount` | Medium    | similarity >= `fuzzy_high` and amounts within tolerance |
//! | `FuzzyName`       | Low       | similarity >= `fuzzy_low`                          |
//!
//! The matcher list, thresholds and confidence floor are per-unit settings.
//! Matching is conservative: a missed duplicate is preferred over wrongly
//! dropping a distinct record, so the default floor is `Low`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;

/// Confidence that a candidate duplicates an existing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchLevel {
    None = 0,
    Low = 1,
    Medium = 2,
    HighName = 3,
    HighId = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    IdentifierMatch,
    ExactName,
    FuzzyNameAmount,
    FuzzyName,
}

impl Matcher {
    pub const DEFAULT_ORDER: [Matcher; 4] = [
        Matcher::IdentifierMatch,
        Matcher::ExactName,
        Matcher::FuzzyNameAmount,
        Matcher::FuzzyName,
    ];
}

/// Unit-specific matching configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_matchers")]
    pub matchers: Vec<Matcher>,

    #[serde(default = "default_fuzzy_high")]
    pub fuzzy_high: f64,

    #[serde(default = "default_fuzzy_low")]
    pub fuzzy_low: f64,

    /// Relative tolerance for amount comparison (0.15 = 15%)
    #[serde(default = "default_amount_tolerance")]
    pub amount_tolerance: f64,

    /// Matches at or above this level are skipped
    #[serde(default = "default_floor")]
    pub confidence_floor: MatchLevel,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            matchers: default_matchers(),
            fuzzy_high: default_fuzzy_high(),
            fuzzy_low: default_fuzzy_low(),
            amount_tolerance: default_amount_tolerance(),
            confidence_floor: default_floor(),
        }
    }
}

fn default_matchers() -> Vec<Matcher> {
    Matcher::DEFAULT_ORDER.to_vec()
}

fn default_fuzzy_high() -> f64 {
    0.85
}

fn default_fuzzy_low() -> f64 {
    0.80
}

fn default_amount_tolerance() -> f64 {
    0.15
}

fn default_floor() -> MatchLevel {
    MatchLevel::Low
}

/// Comparable view of a record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupRecord {
    /// Record id for existing records, any label for candidates
    pub key: String,
    pub name: String,
    pub donor: Option<String>,
    pub identifiers: Vec<String>,
    pub amount: Option<f64>,
}

impl DedupRecord {
    /// Build from a stored entity
    ///
    /// Uses the primary name, `attributes.donor`, `attributes.donor_project_id`,
    /// external identifier values and `attributes.total_commitment`.
    pub fn from_entity(entity: &Entity) -> Self {
        let attrs = &entity.data.attributes;
        let mut identifiers: Vec<String> = entity
            .data
            .identifiers
            .iter()
            .map(|i| i.value.clone())
            .collect();
        if let Some(id) = attrs.get("donor_project_id").and_then(|v| v.as_str()) {
            identifiers.push(id.to_string());
        }

        Self {
            key: entity.id.clone(),
            name: entity.display_name().to_string(),
            donor: attrs
                .get("donor")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            identifiers,
            amount: attrs.get("total_commitment").and_then(|v| v.as_f64()),
        }
    }
}

/// Outcome of matching one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub level: MatchLevel,
    /// Key of the matched existing record
    pub matched: Option<String>,
    pub similarity: f64,
    pub reason: String,
    pub skip: bool,
}

pub struct Deduplicator {
    config: DedupConfig,
    existing: Vec<DedupRecord>,
    normalized: Vec<String>,
    by_name: HashMap<String, Vec<usize>>,
    by_identifier: HashMap<String, usize>,
}

impl Deduplicator {
    pub fn new(existing: Vec<DedupRecord>, config: DedupConfig) -> Self {
        let normalized: Vec<String> = existing.iter().map(|r| normalize_name(&r.name)).collect();

        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, name) in normalized.iter().enumerate() {
            if !name.is_empty() {
                by_name.entry(name.clone()).or_default().push(i);
            }
        }

        let mut by_identifier = HashMap::new();
        for (i, record) in existing.iter().enumerate() {
            for id in &record.identifiers {
                by_identifier.entry(id.to_uppercase()).or_insert(i);
            }
        }

        Self {
            config,
            existing,
            normalized,
            by_name,
            by_identifier,
        }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Match a candidate against the existing records
    pub fn find_match(&self, candidate: &DedupRecord) -> MatchResult {
        let name = normalize_name(&candidate.name);
        // computed on first use, shared by both fuzzy matchers
        let mut fuzzy: Option<Option<(usize, f64)>> = None;

        for matcher in &self.config.matchers {
            let hit = match matcher {
                Matcher::IdentifierMatch => candidate
                    .identifiers
                    .iter()
                    .find_map(|id| self.by_identifier.get(&id.to_uppercase()))
                    .map(|&i| (i, 1.0, MatchLevel::HighId, "identifier match".to_string())),
                Matcher::ExactName => self
                    .by_name
                    .get(&name)
                    .and_then(|idxs| {
                        idxs.iter()
                            .copied()
                            .find(|&i| donors_agree(&candidate.donor, &self.existing[i].donor))
                    })
                    .map(|i| (i, 1.0, MatchLevel::HighName, "exact name match".to_string())),
                Matcher::FuzzyNameAmount => (*fuzzy.get_or_insert_with(|| self.best_fuzzy(&name)))
                    .filter(|&(i, score)| {
                        score >= self.config.fuzzy_high
                            && amounts_similar(
                                candidate.amount.unwrap_or(0.0),
                                self.existing[i].amount.unwrap_or(0.0),
                                self.config.amount_tolerance,
                            )
                    })
                    .map(|(i, score)| {
                        (i, score, MatchLevel::Medium, format!("fuzzy name ({:.1}%) + similar amount", score * 100.0))
                    }),
                Matcher::FuzzyName => (*fuzzy.get_or_insert_with(|| self.best_fuzzy(&name)))
                    .filter(|&(_, score)| score >= self.config.fuzzy_low)
                    .map(|(i, score)| {
                        (i, score, MatchLevel::Low, format!("fuzzy name only ({:.1}%)", score * 100.0))
                    }),
            };

            if let Some((i, similarity, level, reason)) = hit {
                return MatchResult {
                    level,
                    matched: Some(self.existing[i].key.clone()),
                    similarity,
                    reason,
                    skip: level >= self.config.confidence_floor,
                };
            }
        }

        MatchResult {
            level: MatchLevel::None,
            matched: None,
            similarity: fuzzy.flatten().map_or(0.0, |(_, s)| s),
            reason: "no match".to_string(),
            skip: false,
        }
    }

    /// Whether the candidate should be skipped as a duplicate
    pub fn should_skip(&self, candidate: &DedupRecord) -> bool {
        self.find_match(candidate).skip
    }

    /// Closest existing record by normalized name, if any can be compared
    fn best_fuzzy(&self, name: &str) -> Option<(usize, f64)> {
        if name.is_empty() {
            return None;
        }
        let mut best: Option<(usize, f64)> = None;
        for (i, existing) in self.normalized.iter().enumerate() {
            if existing.is_empty() {
                continue;
            }
            let score = strsim::normalized_levenshtein(name, existing);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((i, score));
            }
        }
        best
    }
}

const COUNTRY_PREFIXES: [&str; 7] = ["nepal:", "nepal -", "nepal-", "np:", "np -", "np-", "nepal "];

/// Lowercase, collapse whitespace, strip country prefixes, drop punctuation
pub fn normalize_name(name: &str) -> String {
    let mut name = name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    for prefix in COUNTRY_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest.trim().to_string();
            break;
        }
    }

    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect()
}

/// Amounts within `tolerance` of each other (both zero counts as similar)
pub fn amounts_similar(a: f64, b: f64, tolerance: f64) -> bool {
    if a == 0.0 && b == 0.0 {
        return true;
    }
    if a == 0.0 || b == 0.0 {
        return false;
    }
    let ratio = a.min(b) / a.max(b);
    ratio >= 1.0 - tolerance
}

fn donors_agree(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => true,
    }
}
