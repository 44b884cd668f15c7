//! Catalog records and the keys that identify a fetched catalog.

use serde::Serialize;
use serde_json::{Map, Value};

/// Company category on the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyKind {
    /// Delivery companies own vehicles.
    Delivery,
    /// Rental (renter) companies own equipment.
    Rental,
}

impl CompanyKind {
    /// Value of the backend's `role` query parameter.
    pub fn role(self) -> &'static str {
        match self {
            CompanyKind::Delivery => "delivery",
            CompanyKind::Rental => "renter",
        }
    }

    /// Label used in logs and metrics.
    pub fn label(self) -> &'static str {
        match self {
            CompanyKind::Delivery => "delivery",
            CompanyKind::Rental => "rental",
        }
    }
}

/// Asset owned by a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Vehicle,
    Equipment,
}

impl AssetKind {
    pub fn company_kind(self) -> CompanyKind {
        match self {
            AssetKind::Vehicle => CompanyKind::Delivery,
            AssetKind::Equipment => CompanyKind::Rental,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Vehicle => "vehicle",
            AssetKind::Equipment => "equipment",
        }
    }

    /// Key of the nested object holding the asset inside a list item.
    pub fn details_key(self) -> &'static str {
        match self {
            AssetKind::Vehicle => "vehicleDetails",
            AssetKind::Equipment => "equipmentDetails",
        }
    }

    /// Fields probed, in priority order, when matching an asset by name.
    pub fn name_fields(self) -> &'static [&'static str] {
        match self {
            AssetKind::Vehicle => &["sizeType", "vehicleName", "name", "title"],
            AssetKind::Equipment => &["equipmentName", "name", "title", "type"],
        }
    }

    pub fn list_function(self) -> &'static str {
        match self {
            AssetKind::Vehicle => "get_vehicle_list",
            AssetKind::Equipment => "get_equipment_list",
        }
    }

    pub fn details_function(self) -> &'static str {
        match self {
            AssetKind::Vehicle => "get_vehicle_details",
            AssetKind::Equipment => "get_equipment_details",
        }
    }

    pub fn from_list_function(name: &str) -> Option<Self> {
        match name {
            "get_vehicle_list" => Some(AssetKind::Vehicle),
            "get_equipment_list" => Some(AssetKind::Equipment),
            _ => None,
        }
    }

    pub fn from_details_function(name: &str) -> Option<Self> {
        match name {
            "get_vehicle_details" => Some(AssetKind::Vehicle),
            "get_equipment_details" => Some(AssetKind::Equipment),
            _ => None,
        }
    }
}

/// Field list used to match company records.
pub const COMPANY_NAME_FIELDS: &[&str] = &["name"];

/// One company, vehicle, or equipment entry as returned by the backend.
///
/// `id` is the identity. `name` is only a display/matching aid and is not
/// assumed to be unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRecord {
    pub id: String,
    pub name: String,
    pub raw_attributes: Map<String, Value>,
}

impl CatalogRecord {
    /// Build a record from a company list item (`_id`, `name`).
    pub fn from_company(item: &Value) -> Option<Self> {
        let attrs = item.as_object()?;
        let id = attrs.get("_id").and_then(Value::as_str)?;
        Some(Self {
            id: id.to_string(),
            name: str_field(attrs, "name").unwrap_or_default().to_string(),
            raw_attributes: attrs.clone(),
        })
    }

    /// Build a record from an asset list item. The asset lives under
    /// `vehicleDetails` / `equipmentDetails`; its display name is the first
    /// non-empty field of [`AssetKind::name_fields`].
    pub fn from_asset(item: &Value, kind: AssetKind) -> Option<Self> {
        let details = item.get(kind.details_key())?.as_object()?;
        let id = details.get("_id").and_then(Value::as_str)?;
        let name = kind
            .name_fields()
            .iter()
            .find_map(|field| str_field(details, field).filter(|v| !v.is_empty()))
            .unwrap_or_default();
        Some(Self {
            id: id.to_string(),
            name: name.to_string(),
            raw_attributes: details.clone(),
        })
    }

    /// String value of a raw attribute, if present.
    pub fn field(&self, key: &str) -> Option<&str> {
        str_field(&self.raw_attributes, key)
    }
}

fn str_field<'a>(attrs: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    attrs.get(key).and_then(Value::as_str)
}

/// Ordered records plus the backend's total count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    pub records: Vec<CatalogRecord>,
    pub total_count: u64,
}

impl Catalog {
    /// Items of a `{data: {itemList, totalCount}}` envelope, or an empty slice.
    pub fn items(envelope: &Value) -> &[Value] {
        envelope
            .pointer("/data/itemList")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn total(envelope: &Value, fallback: usize) -> u64 {
        envelope
            .pointer("/data/totalCount")
            .and_then(Value::as_u64)
            .unwrap_or(fallback as u64)
    }

    /// Parse a company listing envelope. Items without an `_id` are dropped.
    pub fn companies_from_envelope(envelope: &Value) -> Self {
        let items = Self::items(envelope);
        Self {
            records: items.iter().filter_map(CatalogRecord::from_company).collect(),
            total_count: Self::total(envelope, items.len()),
        }
    }

    /// Parse an asset listing envelope for the given asset kind.
    pub fn assets_from_envelope(envelope: &Value, kind: AssetKind) -> Self {
        let items = Self::items(envelope);
        Self {
            records: items
                .iter()
                .filter_map(|item| CatalogRecord::from_asset(item, kind))
                .collect(),
            total_count: Self::total(envelope, items.len()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when the backend reported more records than this page holds.
    pub fn is_truncated(&self) -> bool {
        self.total_count > self.records.len() as u64
    }
}

/// The request that produced a catalog. Cached catalogs are keyed by the
/// full query so a catalog is never reused for a different search term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogQuery {
    pub kind: CompanyKind,
    pub search: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl CatalogQuery {
    /// Page 1 of every company of `kind`, at least `per_page` (≥100) records.
    pub fn all(kind: CompanyKind, per_page: u32) -> Self {
        Self {
            kind,
            search: None,
            page: 1,
            per_page: per_page.max(super::MIN_CATALOG_PAGE_SIZE),
        }
    }

    /// Same as [`CatalogQuery::all`] narrowed by a backend search term.
    /// The term is lowercased and trimmed so equivalent searches share a key.
    pub fn search(kind: CompanyKind, term: &str, per_page: u32) -> Self {
        let term = term.trim().to_lowercase();
        Self {
            search: (!term.is_empty()).then_some(term),
            ..Self::all(kind, per_page)
        }
    }
}
