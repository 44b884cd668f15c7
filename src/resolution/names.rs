//! Free-text name → catalog id.

use crate::catalog::CatalogRecord;
use serde::Serialize;

/// Upper bound on the near-miss names returned with [`Resolution::NotFound`].
pub const MAX_CANDIDATES: usize = 10;

/// How ties between exact and substring matches are broken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Single pass in catalog order; the first record whose name equals or
    /// contains the target wins.
    #[default]
    FirstMatch,
    /// Exact matches anywhere in the catalog beat substring matches.
    PreferExact,
}

impl MatchPolicy {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "prefer-exact" | "exact" | "prefer_exact" => Self::PreferExact,
            _ => Self::FirstMatch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Found { id: String },
    NotFound { candidates: Vec<String> },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NameResolver {
    policy: MatchPolicy,
}

impl NameResolver {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    /// Match `target` against `fields` of each record (fields probed in the
    /// given order), case-insensitively.
    ///
    /// The returned id always belongs to one of `records`. Records without an
    /// id never match.
    pub fn resolve(&self, records: &[CatalogRecord], target: &str, fields: &[&str]) -> Resolution {
        let target = target.trim().to_lowercase();
        if target.is_empty() {
            return not_found(records);
        }

        let candidates = || records.iter().filter(|record| !record.id.is_empty());

        let found = match self.policy {
            MatchPolicy::FirstMatch => candidates().find(|record| {
                probe(record, fields)
                    .iter()
                    .any(|name| *name == target || name.contains(&target))
            }),
            MatchPolicy::PreferExact => candidates()
                .find(|record| probe(record, fields).iter().any(|name| *name == target))
                .or_else(|| {
                    candidates().find(|record| {
                        probe(record, fields).iter().any(|name| name.contains(&target))
                    })
                }),
        };

        match found {
            Some(record) => Resolution::Found {
                id: record.id.clone(),
            },
            None => not_found(records),
        }
    }
}

/// Lowercased values of `fields` present on `record`, in probe order.
fn probe(record: &CatalogRecord, fields: &[&str]) -> Vec<String> {
    fields
        .iter()
        .filter_map(|field| record.field(field))
        .map(str::to_lowercase)
        .collect()
}

fn not_found(records: &[CatalogRecord]) -> Resolution {
    Resolution::NotFound {
        candidates: records
            .iter()
            .filter(|record| !record.name.is_empty())
            .take(MAX_CANDIDATES)
            .map(|record| record.name.clone())
            .collect(),
    }
}
