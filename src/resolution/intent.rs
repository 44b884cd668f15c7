//! Canonical intents and the selector-backed resolver that produces them.

use crate::error::{AppError, Result};
use crate::resolution::parser::DetailQuery;
use crate::upstream::FunctionSelector;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Where an intent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSource {
    /// Built locally from the utterance by the keyword parser.
    FastPath,
    /// Returned by the function selector.
    Selector,
}

/// What the user wants done: a backend function and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub function_name: String,
    pub parameters: Map<String, Value>,
    pub source: IntentSource,
}

impl Intent {
    pub fn new(function_name: impl Into<String>, parameters: Map<String, Value>, source: IntentSource) -> Self {
        Self {
            function_name: function_name.into(),
            parameters,
            source,
        }
    }

    /// Compound details intent from a parsed question.
    pub fn from_detail_query(query: &DetailQuery) -> Self {
        let mut parameters = Map::new();
        if let Some(entity) = &query.entity_name {
            parameters.insert("entity_name".into(), Value::from(entity.as_str()));
        }
        if let Some(company) = &query.company_name {
            parameters.insert("company_name".into(), Value::from(company.as_str()));
        }
        Self::new(query.entity_type.details_function(), parameters, IntentSource::FastPath)
    }

    /// Non-empty string value of a parameter. Numbers are rendered as text.
    pub fn param(&self, key: &str) -> Option<String> {
        param_str(&self.parameters, key)
    }

    /// First present parameter among `keys`.
    pub fn first_param(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.param(key))
    }

    /// Unwrap wrapper functions some selector corpora expose into the
    /// operation they stand for:
    ///
    /// - `call_user_function {function_name, arg}`
    /// - `handle_company_asset_query {company_type, company_name?, asset_name?}`
    pub fn canonicalize(self) -> Result<Self> {
        match self.function_name.as_str() {
            "call_user_function" => self.unwrap_user_function(),
            "handle_company_asset_query" => self.unwrap_company_asset_query(),
            _ => Ok(self),
        }
    }

    fn unwrap_user_function(self) -> Result<Self> {
        let inner = self.param("function_name").ok_or(AppError::NoMatchIntent)?;
        let arg = self.parameters.get("arg").cloned().filter(|v| !v.is_null());

        let arg_key = match inner.as_str() {
            "get_booking_list" => Some("status"),
            "get_usr_favourite_list" => Some("type"),
            "company_cat_list" => Some("cat_search"),
            _ => None,
        };

        let mut parameters = Map::new();
        if let (Some(key), Some(arg)) = (arg_key, arg) {
            parameters.insert(key.to_string(), arg);
        }
        Ok(Self::new(inner, parameters, self.source))
    }

    fn unwrap_company_asset_query(self) -> Result<Self> {
        let company_type = self.param("company_type").unwrap_or_default();
        let is_rental = match company_type.as_str() {
            "get_renter_companies" | "renter" | "rental" => true,
            "get_delivery_companies" | "delivery" => false,
            other => {
                return Err(AppError::ValidationError(format!(
                    "Invalid company_type '{}'. Use 'get_delivery_companies' or 'get_renter_companies'.",
                    other
                )))
            }
        };
        let company = self.param("company_name");
        let asset = self.param("asset_name");

        let mut parameters = Map::new();
        let function_name = match (company, asset) {
            (None, _) => {
                if is_rental {
                    "get_renter_companies"
                } else {
                    "get_delivery_companies"
                }
            }
            (Some(company), None) => {
                parameters.insert("company_name".into(), Value::from(company));
                if is_rental {
                    "get_equipment_list"
                } else {
                    "get_vehicle_list"
                }
            }
            (Some(company), Some(asset)) => {
                parameters.insert("company_name".into(), Value::from(company));
                parameters.insert("entity_name".into(), Value::from(asset));
                if is_rental {
                    "get_equipment_details"
                } else {
                    "get_vehicle_details"
                }
            }
        };
        Ok(Self::new(function_name, parameters, self.source))
    }
}

pub(crate) fn param_str(parameters: &Map<String, Value>, key: &str) -> Option<String> {
    match parameters.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Turns an utterance into an [`Intent`] through the function selector.
///
/// The selector is prompted for strict JSON but is not trusted to produce it.
/// A malformed reply is a [`AppError::ParseError`]; there is no retry, since a
/// generative service is not guaranteed to converge.
pub struct IntentResolver {
    selector: Arc<dyn FunctionSelector>,
    corpus: Arc<str>,
}

impl IntentResolver {
    pub fn new(selector: Arc<dyn FunctionSelector>, corpus: impl Into<Arc<str>>) -> Self {
        Self {
            selector,
            corpus: corpus.into(),
        }
    }

    pub async fn resolve(&self, text: &str) -> Result<Intent> {
        let raw = self
            .selector
            .select_function(text, &self.corpus)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "Function selector failed");
                AppError::NoMatchIntent
            })?;

        let intent = parse_selector_reply(&raw)?.canonicalize()?;
        let parameters = Value::Object(intent.parameters.clone());
        tracing::debug!(
            function = %intent.function_name,
            %parameters,
            "Intent resolved"
        );
        Ok(intent)
    }
}

/// Validate a selector reply: a JSON object with a non-empty
/// `function_name` and an optional object `parameters`. `code` is ignored.
pub fn parse_selector_reply(raw: &str) -> Result<Intent> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::NoMatchIntent);
    }

    let parse_error = || AppError::ParseError {
        raw: raw.to_string(),
    };
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse selector JSON");
        parse_error()
    })?;
    let object = value.as_object().ok_or_else(parse_error)?;

    let function_name = match object.get("function_name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Some(Value::String(_)) | Some(Value::Null) | None => return Err(AppError::NoMatchIntent),
        Some(_) => return Err(parse_error()),
    };

    let parameters = match object.get("parameters") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => Map::new(),
        Some(_) => return Err(parse_error()),
    };

    Ok(Intent::new(function_name, parameters, IntentSource::Selector))
}
