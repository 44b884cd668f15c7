//! Dispatch of a canonical intent to the backend.
//!
//! Routing precedence:
//! 1. favourites listing, called directly;
//! 2. list-by-company with a company name: company → id → asset list;
//! 3. details by id: one fetch;
//! 4. details of X of company Y: company → id → asset list → asset id → details;
//! 5. anything else through the [`Registry`].

use crate::catalog::compact::compact;
use crate::catalog::{AssetKind, Catalog, CatalogCache, CompanyKind, COMPANY_NAME_FIELDS};
use crate::error::{AppError, Result, UpstreamError};
use crate::resolution::{Intent, NameResolver, ParseStrategy, QueryParser, Resolution};
use crate::upstream::MarketplaceApi;
use serde_json::Value;
use std::sync::Arc;

use super::registry::Registry;

/// Parameter names accepted as a company reference on list operations. Both
/// are matched by name against the company catalog.
const COMPANY_PARAMS: &[&str] = &["company_name", "company_id", "company"];

/// Route chosen for an intent, before any backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Favourites,
    CompanyAssets {
        kind: AssetKind,
        company: String,
    },
    AssetById {
        kind: AssetKind,
        asset_id: String,
    },
    CompoundDetails {
        kind: AssetKind,
        entity: String,
        company: String,
    },
    Registry,
}

impl Route {
    /// Pick the route for `intent`. `query` is the original utterance, parsed
    /// with the template strategy when a details intent carries no names.
    pub fn plan(intent: &Intent, query: &str) -> Result<Self> {
        let name = intent.function_name.as_str();

        if name == "get_usr_favourite_list" {
            return Ok(Route::Favourites);
        }

        if let Some(kind) = AssetKind::from_list_function(name) {
            if let Some(company) = intent.first_param(COMPANY_PARAMS) {
                return Ok(Route::CompanyAssets { kind, company });
            }
            return Ok(Route::Registry);
        }

        if let Some(kind) = AssetKind::from_details_function(name) {
            let id_key = match kind {
                AssetKind::Vehicle => "vehicle_id",
                AssetKind::Equipment => "equipment_id",
            };
            if let Some(asset_id) = intent.first_param(&[id_key, "id"]) {
                return Ok(Route::AssetById { kind, asset_id });
            }

            let entity = intent.param("entity_name");
            let company = intent.param("company_name");
            let (entity, company) = match (entity, company) {
                (Some(entity), Some(company)) => (Some(entity), Some(company)),
                _ => QueryParser::new(ParseStrategy::TemplateAnchor)
                    .parse(query)
                    .filter(|parsed| parsed.entity_type == kind)
                    .map(|parsed| (parsed.entity_name, parsed.company_name))
                    .unwrap_or_default(),
            };
            return match (entity, company) {
                (Some(entity), Some(company)) => Ok(Route::CompoundDetails {
                    kind,
                    entity,
                    company,
                }),
                _ => Err(AppError::ValidationError(
                    "Please specify both the entity name and company name in your query".into(),
                )),
            };
        }

        Ok(Route::Registry)
    }
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub function_called: String,
    pub payload: Value,
    /// Id the request resolved to (company for lists, asset for details).
    pub entity_id: Option<String>,
}

pub struct DispatchRouter {
    api: Arc<dyn MarketplaceApi>,
    catalogs: Arc<CatalogCache>,
    names: NameResolver,
    registry: Registry,
    compact_payloads: bool,
}

impl DispatchRouter {
    pub fn new(api: Arc<dyn MarketplaceApi>, catalogs: Arc<CatalogCache>, names: NameResolver) -> Self {
        Self {
            api,
            catalogs,
            names,
            registry: Registry::default(),
            compact_payloads: true,
        }
    }

    #[must_use]
    pub fn with_compaction(mut self, enabled: bool) -> Self {
        self.compact_payloads = enabled;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn dispatch(&self, intent: &Intent, query: &str) -> Result<Dispatched> {
        let route = Route::plan(intent, query)?;
        tracing::debug!(function = %intent.function_name, ?route, "Dispatching intent");

        let (function_called, payload, entity_id) = match route {
            Route::Favourites | Route::Registry => {
                let call = self.registry.bind(&intent.function_name, &intent.parameters)?;
                let payload = call
                    .execute(self.api.as_ref())
                    .await
                    .map_err(|e| AppError::from_fetch(e, &intent.function_name))?;
                (intent.function_name.clone(), payload, None)
            }
            Route::CompanyAssets { kind, company } => {
                let company_id = self.resolve_company(kind.company_kind(), &company).await?;
                let payload = self.fetch_assets(kind, &company_id).await?;
                (kind.list_function().to_string(), payload, Some(company_id))
            }
            Route::AssetById { kind, asset_id } => {
                let payload = self.fetch_details(kind, &asset_id).await?;
                (kind.details_function().to_string(), payload, Some(asset_id))
            }
            Route::CompoundDetails {
                kind,
                entity,
                company,
            } => {
                let company_id = self.resolve_company(kind.company_kind(), &company).await?;
                let assets = self.fetch_assets(kind, &company_id).await?;
                let catalog = Catalog::assets_from_envelope(&assets, kind);

                let asset_id = match self.names.resolve(&catalog.records, &entity, kind.name_fields()) {
                    Resolution::Found { id } => id,
                    Resolution::NotFound { candidates } => {
                        return Err(AppError::NotFoundEntity {
                            entity_type: kind.as_str().to_string(),
                            name: entity,
                            company_name: company,
                            candidates,
                        })
                    }
                };
                tracing::debug!(kind = kind.as_str(), %entity, %asset_id, "Asset resolved");

                let payload = self.fetch_details(kind, &asset_id).await?;
                (kind.details_function().to_string(), payload, Some(asset_id))
            }
        };

        let payload = if self.compact_payloads {
            compact(&function_called, &payload)
        } else {
            payload
        };

        Ok(Dispatched {
            function_called,
            payload,
            entity_id,
        })
    }

    /// Company name → id against the cached full catalog. When that catalog
    /// is only a first page, a backend search narrows it before giving up.
    /// Candidates always come from the full catalog.
    pub async fn resolve_company(&self, kind: CompanyKind, name: &str) -> Result<String> {
        let slot = self.catalogs.all(kind).await;
        if let Some(err @ UpstreamError::LegallyUnavailable) = slot.failure() {
            return Err(AppError::from_fetch(err.clone(), "company catalog"));
        }

        let candidates = match self.names.resolve(slot.records(), name, COMPANY_NAME_FIELDS) {
            Resolution::Found { id } => {
                tracing::debug!(kind = kind.label(), name, %id, "Company resolved");
                return Ok(id);
            }
            Resolution::NotFound { candidates } => candidates,
        };

        if slot.is_truncated() {
            let narrowed = self.catalogs.search(kind, name).await;
            if let Resolution::Found { id } =
                self.names.resolve(narrowed.records(), name, COMPANY_NAME_FIELDS)
            {
                tracing::debug!(kind = kind.label(), name, %id, "Company resolved by search");
                return Ok(id);
            }
        }

        Err(AppError::NotFoundCompany {
            name: name.to_string(),
            candidates,
        })
    }

    async fn fetch_assets(&self, kind: AssetKind, company_id: &str) -> Result<Value> {
        self.api
            .list_assets(kind, company_id)
            .await
            .map_err(|e| AppError::from_fetch(e, kind.list_function()))
    }

    async fn fetch_details(&self, kind: AssetKind, asset_id: &str) -> Result<Value> {
        self.api
            .asset_details(kind, asset_id)
            .await
            .map_err(|e| AppError::from_fetch(e, kind.details_function()))
    }
}
