//! Fast-path parsing of "details of X of company Y" questions.
//!
//! Two strategies accept different phrasings and are kept separate:
//!
//! - [`ParseStrategy::KeywordAnchor`]: anchored on "vehicle detail(s)" or
//!   "equipment detail(s)" anywhere in the text. Stop-words are dropped and the
//!   remaining words after the entity keyword are split: last word is the
//!   company, the rest is the entity name. A multi-word company name is
//!   therefore misparsed ("mini truck of dhl express" gives entity
//!   "mini truck dhl", company "express").
//! - [`ParseStrategy::TemplateAnchor`]: requires the literal prefix
//!   "show <type> details of ", then splits on the first of " of ", " from ",
//!   " in ".

use crate::catalog::AssetKind;
use regex::Regex;
use std::sync::LazyLock;

static STOP_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(details?|of|from|in|the|company)\b").expect("stop-word pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));
static VEHICLE_TAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"vehicle\s+(.+)").expect("vehicle pattern"));
static EQUIPMENT_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"equipment\s+(.+)").expect("equipment pattern"));

const TEMPLATE_SEPARATORS: [&str; 3] = [" of ", " from ", " in "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    KeywordAnchor,
    TemplateAnchor,
}

/// Structured hints pulled out of a details question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailQuery {
    pub entity_type: AssetKind,
    pub entity_name: Option<String>,
    pub company_name: Option<String>,
}

impl DetailQuery {
    /// Both names present: enough for a three-hop lookup.
    pub fn is_complete(&self) -> bool {
        self.entity_name.is_some() && self.company_name.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryParser {
    strategy: ParseStrategy,
}

impl QueryParser {
    pub fn new(strategy: ParseStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ParseStrategy {
        self.strategy
    }

    /// `None` when the text carries no anchor for this strategy.
    pub fn parse(&self, text: &str) -> Option<DetailQuery> {
        match self.strategy {
            ParseStrategy::KeywordAnchor => parse_detail_query(text),
            ParseStrategy::TemplateAnchor => [AssetKind::Vehicle, AssetKind::Equipment]
                .into_iter()
                .find_map(|kind| extract_entity_details(text, kind)),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Keyword-anchor strategy.
pub fn parse_detail_query(text: &str) -> Option<DetailQuery> {
    let lower = text.to_lowercase();
    let (entity_type, tail) = if lower.contains("vehicle detail") {
        (AssetKind::Vehicle, &*VEHICLE_TAIL)
    } else if lower.contains("equipment detail") {
        (AssetKind::Equipment, &*EQUIPMENT_TAIL)
    } else {
        return None;
    };

    let cleaned = STOP_WORDS.replace_all(&lower, " ");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");
    let remaining = tail
        .captures(cleaned.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let words: Vec<&str> = remaining.split_whitespace().collect();
    let (entity_name, company_name) = match words.as_slice() {
        [] => (None, None),
        [single] => (Some(single.to_string()), None),
        [entity @ .., company] => (Some(entity.join(" ")), Some(company.to_string())),
    };

    Some(DetailQuery {
        entity_type,
        entity_name,
        company_name,
    })
}

/// Template-anchor strategy for one entity type.
pub fn extract_entity_details(text: &str, entity_type: AssetKind) -> Option<DetailQuery> {
    let lower = text.to_lowercase();
    let prefix = format!("show {} details of ", entity_type.as_str());
    if !lower.contains(&prefix) {
        return None;
    }

    let remaining = lower.replace(&prefix, "");
    let remaining = remaining.trim();

    // Every later occurrence of the separator folds into the company name.
    let split = TEMPLATE_SEPARATORS.iter().find_map(|separator| {
        let mut parts = remaining.split(separator);
        let entity = parts.next()?;
        let company: Vec<&str> = parts.collect();
        (!company.is_empty()).then(|| (entity, company.join(" ")))
    });

    let (entity_name, company_name) = match split {
        Some((entity, company)) => (
            non_empty(entity),
            non_empty(&company.replace("company", "")),
        ),
        None => (None, None),
    };

    Some(DetailQuery {
        entity_type,
        entity_name,
        company_name,
    })
}
