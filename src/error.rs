use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure of a call to an external collaborator (marketplace API or model service).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// HTTP 451. Usually a geographic or compliance block on the backend side.
    #[error("upstream unavailable for legal reasons (451)")]
    LegallyUnavailable,

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("upstream response could not be decoded: {0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::LegallyUnavailable => Some(451),
            UpstreamError::Status(code) => Some(*code),
            _ => None,
        }
    }
}

pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Company '{name}' not found. Available companies: {}", .candidates.join(", "))]
    NotFoundCompany { name: String, candidates: Vec<String> },

    #[error(
        "{} '{name}' not found in company '{company_name}'. Available {entity_type}s: {}",
        capitalize(.entity_type),
        .candidates.join(", ")
    )]
    NotFoundEntity {
        entity_type: String,
        name: String,
        company_name: String,
        candidates: Vec<String>,
    },

    #[error("No matching function retrieved from the model.")]
    NoMatchIntent,

    #[error("Failed to parse model response.")]
    ParseError { raw: String },

    #[error("Unsupported function: {name}")]
    UnknownFunction { name: String },

    #[error("Marketplace API unavailable (status {status_code})")]
    UpstreamUnavailable { status_code: u16 },

    #[error("No data returned for {0}")]
    NoData(String),

    #[error("Error generating response: {reason}")]
    SummarizationFailure { reason: String },

    #[error("Invalid input: {0}")]
    ValidationError(String),
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFoundCompany { .. }
            | AppError::NotFoundEntity { .. }
            | AppError::NoMatchIntent
            | AppError::NoData(_) => StatusCode::NOT_FOUND,
            AppError::ParseError { .. }
            | AppError::UnknownFunction { .. }
            | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamUnavailable { status_code: 451 } => {
                StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS
            }
            AppError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            AppError::SummarizationFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts a failed data fetch into the pipeline's error. Only 451 is
    /// surfaced as such; every other failure reads as "no data".
    pub fn from_fetch(err: UpstreamError, what: &str) -> Self {
        tracing::warn!(error = %err, what, "Marketplace fetch failed");
        let status = err
            .status_code()
            .map(|code| code.to_string())
            .unwrap_or_else(|| "none".to_string());
        metrics::counter!("upstream_errors_total", "status" => status).increment(1);

        match err {
            UpstreamError::LegallyUnavailable => AppError::UpstreamUnavailable { status_code: 451 },
            _ => AppError::NoData(what.to_string()),
        }
    }

    fn candidates(&self) -> &[String] {
        match self {
            AppError::NotFoundCompany { candidates, .. }
            | AppError::NotFoundEntity { candidates, .. } => candidates,
            _ => &[],
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    candidates: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        match &self {
            AppError::SummarizationFailure { reason } => {
                tracing::error!(error = %reason, "Summarization failed");
            }
            AppError::ParseError { raw } => {
                tracing::warn!(raw = %raw, "Unparseable selector reply");
            }
            AppError::UpstreamUnavailable { status_code } => {
                tracing::warn!(status_code, "Upstream unavailable");
            }
            _ => {
                tracing::info!(status = status.as_u16(), error = %message, "Query rejected");
            }
        }

        let body = Json(ErrorResponse {
            error: message,
            code: status.as_u16(),
            candidates: self.candidates().to_vec(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_company_message_lists_candidates() {
        let err = AppError::NotFoundCompany {
            name: "acme".into(),
            candidates: vec!["DHL Express".into(), "Aramex".into()],
        };
        assert_eq!(
            err.to_string(),
            "Company 'acme' not found. Available companies: DHL Express, Aramex"
        );
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_not_found_entity_message_capitalizes_type() {
        let err = AppError::NotFoundEntity {
            entity_type: "vehicle".into(),
            name: "bus".into(),
            company_name: "dhl".into(),
            candidates: vec!["Mini Truck".into()],
        };
        assert_eq!(
            err.to_string(),
            "Vehicle 'bus' not found in company 'dhl'. Available vehicles: Mini Truck"
        );
    }

    #[test]
    fn test_parse_error_and_no_match_have_distinct_statuses() {
        let parse = AppError::ParseError { raw: "nope".into() };
        assert_eq!(parse.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NoMatchIntent.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_fetch_451_is_distinguishable() {
        let err = AppError::from_fetch(UpstreamError::LegallyUnavailable, "vehicle list");
        assert!(matches!(err, AppError::UpstreamUnavailable { status_code: 451 }));
        assert_eq!(err.status(), StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS);

        let err = AppError::from_fetch(UpstreamError::Status(500), "vehicle list");
        assert!(matches!(err, AppError::NoData(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
