//! Known backend operations and their parameter schemas.
//!
//! An intent's function name is looked up here; unknown names fail closed
//! with [`AppError::UnknownFunction`]. Parameters are checked against the
//! operation's schema and bound into a typed [`BackendCall`].

use crate::catalog::{AssetKind, CatalogQuery, CompanyKind};
use crate::error::{AppError, Result, UpstreamResult};
use crate::resolution::intent::param_str;
use crate::upstream::{MarketplaceApi, PaymentFilter};
use serde_json::{Map, Value};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
}

impl ParamKind {
    fn as_str(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

const fn opt(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: false,
    }
}

const fn req(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: true,
    }
}

use ParamKind::{Integer, String as Text};

/// A registered operation: name, corpus description, schema, and binder.
pub struct Operation {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    bind: fn(&Args<'_>) -> BackendCall,
}

/// A validated backend call, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Companies(CatalogQuery),
    AssetList { kind: AssetKind, company_id: String },
    AssetDetails { kind: AssetKind, asset_id: String },
    Favourites {
        favourite_type: Option<String>,
        page: u32,
        per_page: u32,
    },
    Bookings {
        status: Option<String>,
        page: u32,
        per_page: u32,
    },
    Categories { cat_search: Option<String> },
    Payments(PaymentFilter),
    Profile,
}

impl BackendCall {
    pub async fn execute(&self, api: &dyn MarketplaceApi) -> UpstreamResult<Value> {
        match self {
            BackendCall::Companies(query) => api.list_companies(query).await,
            BackendCall::AssetList { kind, company_id } => api.list_assets(*kind, company_id).await,
            BackendCall::AssetDetails { kind, asset_id } => api.asset_details(*kind, asset_id).await,
            BackendCall::Favourites {
                favourite_type,
                page,
                per_page,
            } => {
                api.list_user_favourites(favourite_type.as_deref(), *page, *per_page)
                    .await
            }
            BackendCall::Bookings {
                status,
                page,
                per_page,
            } => api.list_user_bookings(status.as_deref(), *page, *per_page).await,
            BackendCall::Categories { cat_search } => api.company_categories(cat_search.as_deref()).await,
            BackendCall::Payments(filter) => api.list_payments(filter).await,
            BackendCall::Profile => api.user_profile().await,
        }
    }
}

/// Parameters after schema validation.
pub struct Args<'a> {
    params: &'a Map<String, Value>,
}

impl Args<'_> {
    fn text(&self, name: &str) -> Option<String> {
        param_str(self.params, name)
    }

    /// Present required strings were checked by [`Registry::bind`].
    fn required(&self, name: &str) -> String {
        self.text(name).unwrap_or_default()
    }

    fn integer(&self, name: &str, default: u32) -> u32 {
        self.text(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

/// Backend spelling of a booking status; anything else means "all".
pub fn normalize_booking_status(status: Option<&str>) -> Option<String> {
    match status?.trim().to_lowercase().as_str() {
        "completed" | "complete" => Some("Completed".to_string()),
        "cancelled" | "canceled" => Some("Cancelled".to_string()),
        _ => None,
    }
}

fn companies(kind: CompanyKind, default_per_page: u32, args: &Args<'_>) -> BackendCall {
    BackendCall::Companies(CatalogQuery {
        kind,
        search: args.text("search"),
        page: args.integer("page", 1),
        per_page: args.integer("per_page", default_per_page),
    })
}

static OPERATIONS: &[Operation] = &[
    Operation {
        name: "get_delivery_companies",
        description: "List delivery companies (they own vehicles). Optional name search.",
        params: &[opt("page", Integer), opt("per_page", Integer), opt("search", Text)],
        bind: |args| companies(CompanyKind::Delivery, 10, args),
    },
    Operation {
        name: "get_renter_companies",
        description: "List rental companies (they own equipment). Optional name search.",
        params: &[opt("page", Integer), opt("per_page", Integer), opt("search", Text)],
        bind: |args| companies(CompanyKind::Rental, 15, args),
    },
    Operation {
        name: "get_vehicle_list",
        description: "List the vehicles of a delivery company. company_id may be the company name.",
        params: &[req("company_id", Text)],
        bind: |args| BackendCall::AssetList {
            kind: AssetKind::Vehicle,
            company_id: args.required("company_id"),
        },
    },
    Operation {
        name: "get_equipment_list",
        description: "List the equipment of a rental company. company_id may be the company name.",
        params: &[req("company_id", Text)],
        bind: |args| BackendCall::AssetList {
            kind: AssetKind::Equipment,
            company_id: args.required("company_id"),
        },
    },
    Operation {
        name: "get_vehicle_details",
        description: "Details of one vehicle by id, or by entity_name and company_name.",
        params: &[req("vehicle_id", Text)],
        bind: |args| BackendCall::AssetDetails {
            kind: AssetKind::Vehicle,
            asset_id: args.required("vehicle_id"),
        },
    },
    Operation {
        name: "get_equipment_details",
        description: "Details of one equipment item by id, or by entity_name and company_name.",
        params: &[req("equipment_id", Text)],
        bind: |args| BackendCall::AssetDetails {
            kind: AssetKind::Equipment,
            asset_id: args.required("equipment_id"),
        },
    },
    Operation {
        name: "get_booking_list",
        description: "The user's bookings. status: completed, cancelled, or omitted for all.",
        params: &[opt("status", Text), opt("page", Integer), opt("per_page", Integer)],
        bind: |args| BackendCall::Bookings {
            status: normalize_booking_status(args.text("status").as_deref()),
            page: args.integer("page", 1),
            per_page: args.integer("per_page", 100),
        },
    },
    Operation {
        name: "get_usr_favourite_list",
        description: "The user's favourites. type: company, equipment or vehicle.",
        params: &[opt("type", Text), opt("page", Integer), opt("per_page", Integer)],
        bind: |args| BackendCall::Favourites {
            favourite_type: Some(args.text("type").unwrap_or_else(|| "company".to_string())),
            page: args.integer("page", 1),
            per_page: args.integer("per_page", 100),
        },
    },
    Operation {
        name: "company_cat_list",
        description: "Rental companies offering an equipment category, e.g. Excavators.",
        params: &[opt("cat_search", Text)],
        bind: |args| BackendCall::Categories {
            cat_search: args.text("cat_search"),
        },
    },
    Operation {
        name: "get_payment_list",
        description: "The user's payments, optionally between start_date and end_date (YYYY-MM-DD).",
        params: &[
            opt("start_date", Text),
            opt("end_date", Text),
            opt("search", Text),
            opt("page", Integer),
            opt("per_page", Integer),
        ],
        bind: |args| {
            BackendCall::Payments(PaymentFilter {
                start_date: args.text("start_date"),
                end_date: args.text("end_date"),
                search: args.text("search"),
                page: args.integer("page", 1),
                per_page: args.integer("per_page", 10),
            })
        },
    },
    Operation {
        name: "get_user_profile_details",
        description: "The signed-in user's profile.",
        params: &[],
        bind: |_| BackendCall::Profile,
    },
];

/// Name-indexed table of backend operations.
#[derive(Clone, Copy)]
pub struct Registry {
    operations: &'static [Operation],
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            operations: OPERATIONS,
        }
    }
}

impl Registry {
    pub fn lookup(&self, name: &str) -> Option<&'static Operation> {
        let operations: &'static [Operation] = self.operations;
        operations.iter().find(|op| op.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        let operations: &'static [Operation] = self.operations;
        operations.iter().map(|op| op.name)
    }

    /// Validate `params` against the schema of `name` and bind a call.
    /// Parameters the schema doesn't declare are ignored.
    pub fn bind(&self, name: &str, params: &Map<String, Value>) -> Result<BackendCall> {
        let op = self.lookup(name).ok_or_else(|| AppError::UnknownFunction {
            name: name.to_string(),
        })?;

        for spec in op.params {
            let value = param_str(params, spec.name);
            match (value, spec.kind) {
                (None, _) if spec.required => {
                    return Err(AppError::ValidationError(format!(
                        "{} requires parameter '{}'",
                        op.name, spec.name
                    )))
                }
                (Some(v), ParamKind::Integer) if v.parse::<u32>().is_err() => {
                    return Err(AppError::ValidationError(format!(
                        "parameter '{}' of {} must be a non-negative integer, got '{}'",
                        spec.name, op.name, v
                    )))
                }
                _ => {}
            }
        }

        Ok((op.bind)(&Args { params }))
    }

    /// Function corpus handed to the selector: one entry per operation.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for op in self.operations {
            let params: Vec<String> = op
                .params
                .iter()
                .map(|p| {
                    let marker = if p.required { "" } else { "?" };
                    format!("{}{}: {}", p.name, marker, p.kind.as_str())
                })
                .collect();
            let _ = writeln!(out, "{}({})", op.name, params.join(", "));
            let _ = writeln!(out, "    {}", op.description);
        }
        out
    }
}
