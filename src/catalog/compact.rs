//! Payload compaction.
//!
//! Backend envelopes carry images, audit fields and nested metadata that only
//! inflate the summarization prompt. These helpers keep the fields a narrative
//! answer needs. Shapes that don't match pass through unchanged.

use crate::catalog::types::{AssetKind, Catalog};
use serde_json::{json, Map, Value};

const COMPANY_KEYS: &[&str] = &[
    "_id",
    "uniqueId",
    "name",
    "company_rating",
    "city",
    "role",
    "totalAvailable_Equipments_quantity",
    "company_description",
    "address",
];

const BOOKING_KEYS: &[&str] = &[
    "_id",
    "orderId",
    "bookingStatus",
    "transport_cost",
    "totalAmount",
    "paidAmount",
    "remaining_amount",
];

/// Compact the payload returned for `function_name`.
pub fn compact(function_name: &str, payload: &Value) -> Value {
    match function_name {
        "get_delivery_companies" | "get_renter_companies" => companies(payload),
        "get_vehicle_list" => asset_list(AssetKind::Vehicle, payload),
        "get_equipment_list" => asset_list(AssetKind::Equipment, payload),
        "get_vehicle_details" => vehicle_details(payload),
        "get_equipment_details" => equipment_details(payload),
        "get_booking_list" => bookings(payload),
        "get_usr_favourite_list" => favourites(payload),
        _ => None,
    }
    .unwrap_or_else(|| payload.clone())
}

fn pick(source: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|key| source.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect()
}

fn get<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(&Value::Null)
}

fn companies(payload: &Value) -> Option<Value> {
    payload.pointer("/data/itemList")?;
    let items: Vec<Value> = Catalog::items(payload)
        .iter()
        .filter_map(Value::as_object)
        .map(|item| Value::Object(pick(item, COMPANY_KEYS)))
        .collect();
    Some(json!({
        "totalCount": payload.pointer("/data/totalCount").cloned().unwrap_or(json!(items.len())),
        "items": items,
    }))
}

fn asset_list(kind: AssetKind, payload: &Value) -> Option<Value> {
    payload.pointer("/data/itemList")?;
    let company = payload.pointer("/data/companyDetails").unwrap_or(&Value::Null);
    let company_id = get(company, "_id");
    let company_name = get(company, "name");

    let assets: Vec<Value> = Catalog::items(payload)
        .iter()
        .map(|item| {
            let asset = get(item, kind.details_key());
            match kind {
                AssetKind::Equipment => json!({
                    "company_id": company_id,
                    "company_name": company_name,
                    "equipment_id": get(asset, "_id"),
                    "equipment_name": get(asset, "equipmentName"),
                    "address": get(item, "address"),
                    "city": get(item, "city"),
                    "price_per_day": get(asset, "equipmentPrice_perDay"),
                    "available_quantity": get(asset, "available_equipments"),
                }),
                AssetKind::Vehicle => json!({
                    "company_id": company_id,
                    "company_name": company_name,
                    "vehicle_id": get(asset, "_id"),
                    "vehicle_name": get(asset, "sizeType"),
                    "address": get(item, "address"),
                    "city": get(item, "city"),
                    "price_per_day_inside_city": get(asset, "priceInside_city_perDay"),
                    "price_per_km_outside_city": get(asset, "priceInoutSide_city_perKm"),
                    "is_price_breaking": get(asset, "isPriceBreaking"),
                    "available_quantity": get(asset, "available_trucks"),
                }),
            }
        })
        .collect();

    Some(json!({
        "company": {"company_id": company_id, "company_name": company_name},
        "assets": assets,
        "totalCount": payload.pointer("/data/totalCount").cloned().unwrap_or(json!(assets.len())),
    }))
}

fn address_part<'a>(address: &'a Value, key: &str, fallback: &'a Value) -> &'a Value {
    match address.get(key) {
        Some(Value::Null) | None => fallback,
        Some(value) => value,
    }
}

fn vehicle_details(payload: &Value) -> Option<Value> {
    let vehicle = payload.get("data").filter(|v| v.is_object())?;
    let address = get(vehicle, "address_details");
    let empty = json!("");
    let unspecified = json!("Not specified");

    Some(json!({
        "id": get(vehicle, "_id"),
        "uniqueId": get(vehicle, "uniqueId"),
        "type": get(vehicle, "type"),
        "sizeType": get(vehicle, "sizeType"),
        "loadingCapacity": get(vehicle, "loadingCapacity"),
        "price": {
            "insideCityPerDay": vehicle.get("priceInside_city_perDay").cloned().unwrap_or(json!(0)),
            "outsideCityPerKm": vehicle.get("priceInoutSide_city_perKm").cloned().unwrap_or(json!(0)),
        },
        "location": address_part(address, "address", &unspecified),
        "city": address_part(address, "city", &empty),
        "state": address_part(address, "state", &empty),
        "country": address_part(address, "country", &empty),
        "isPriceBreaking": vehicle.get("isPriceBreaking").cloned().unwrap_or(json!(false)),
        "availableTrucks": vehicle.get("available_trucks").cloned().unwrap_or(json!(0)),
        "totalTrucks": vehicle.get("total_trucks").cloned().unwrap_or(json!(0)),
    }))
}

fn equipment_details(payload: &Value) -> Option<Value> {
    let equipment = payload.get("data").filter(|v| v.is_object())?;
    let address = get(equipment, "equipmentAddress");
    let empty = json!("");
    let unspecified = json!("Not specified");
    let instalments = |key: &str| {
        equipment
            .pointer(&format!("/{}/enable_instalments", key))
            .cloned()
            .unwrap_or(json!(false))
    };

    Some(json!({
        "id": get(equipment, "_id"),
        "uniqueId": get(equipment, "uniqueId"),
        "name": get(equipment, "equipmentName"),
        "price": {
            "perDay": get(equipment, "equipmentPrice_perDay"),
            "oneWeek": get(equipment, "equipmentPrice_1_week"),
            "oneMonth": get(equipment, "equipmentPrice_1_month"),
        },
        "location": address_part(address, "address", &unspecified),
        "city": address_part(address, "city", &empty),
        "state": address_part(address, "state", &empty),
        "country": address_part(address, "country", &empty),
        "isDeliveryIncluded": equipment.get("isDeliveryInclude").cloned().unwrap_or(json!(false)),
        "isPriceBreaking": equipment.get("isPriceBreaking").cloned().unwrap_or(json!(false)),
        "taxPercent": equipment.get("tax").cloned().unwrap_or(json!(0)),
        "availableQuantity": equipment.get("available_equipments").cloned().unwrap_or(json!(0)),
        "isInstallmentAvailable": {
            "oneWeek": instalments("price_1_week_with_instalment"),
            "oneMonth": instalments("price_1_month_with_instalment"),
        },
    }))
}

fn bookings(payload: &Value) -> Option<Value> {
    payload.pointer("/data/itemList")?;
    let bookings: Vec<Value> = Catalog::items(payload)
        .iter()
        .filter_map(Value::as_object)
        .map(|item| Value::Object(pick(item, BOOKING_KEYS)))
        .collect();
    Some(json!({
        "totalCount": payload.pointer("/data/totalCount").cloned().unwrap_or(json!(bookings.len())),
        "bookings": bookings,
    }))
}

/// Favourites come back in one of three shapes depending on the requested
/// type: company entries, equipment entries, or vehicle entries. Company and
/// equipment entries are reduced; vehicles are kept whole.
fn favourites(payload: &Value) -> Option<Value> {
    payload.pointer("/data/itemList")?;
    let items: Vec<Value> = Catalog::items(payload)
        .iter()
        .map(|item| {
            if let Some(company) = item.get("companyDetails").filter(|c| c.is_object()) {
                json!({
                    "company_id": get(company, "_id"),
                    "company_name": get(company, "name"),
                    "address": get(company, "address"),
                    "city": get(company, "city"),
                    "country": get(company, "country"),
                    "description": get(company, "company_description"),
                    "rating": get(company, "company_rating"),
                    "min_equipment_price": get(company, "minEquipmentPrice"),
                    "available_equipments": get(company, "available_equipments"),
                    "is_verified": get(company, "isVerified"),
                })
            } else if let Some(equipment) = item.get("equipmentDetails").filter(|e| e.is_object()) {
                let address = get(equipment, "equipmentAddress");
                json!({
                    "_id": get(item, "_id"),
                    "equipmentId": get(item, "equipmentId"),
                    "companyId": get(item, "companyId"),
                    "equipmentDetails": {
                        "equipmentName": get(equipment, "equipmentName"),
                        "equipmentPrice_perDay": get(equipment, "equipmentPrice_perDay"),
                        "equipmentAddress": {
                            "address": get(address, "address"),
                            "city": get(address, "city"),
                        },
                    },
                })
            } else {
                item.clone()
            }
        })
        .collect();
    Some(json!({
        "totalCount": payload.pointer("/data/totalCount").cloned().unwrap_or(json!(items.len())),
        "items": items,
    }))
}
