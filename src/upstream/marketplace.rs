use crate::catalog::{AssetKind, CatalogQuery};
use crate::error::{UpstreamError, UpstreamResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

const COMPANY_LIST: &str = "/api/v1/user/home/renter_deliveryList";
const VEHICLE_LIST: &str = "/api/v1/user/home/vehilceList";
const EQUIPMENT_LIST: &str = "/api/v1/user/home/equipmentList";
const VEHICLE_DETAILS: &str = "/api/v1/user/home/vehicleDetails";
const EQUIPMENT_DETAILS: &str = "/api/v1/user/home/equipmentDetails";
const COMPANY_CATEGORIES: &str = "/api/v1/user/home/renterCompanyData";
const FAVOURITE_LIST: &str = "/api/v1/user/favourite/fav_list";
const BOOKING_LIST: &str = "/api/v1/user/booking/bookingList";
const PAYMENT_LIST: &str = "/api/v1/common/payment/paymentList";
const USER_PROFILE: &str = "/api/v1/user/profile/details";

/// Page size the backend's category endpoint is always queried with.
const CATEGORY_PAGE_SIZE: u32 = 18;

/// Filters for the payment history listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentFilter {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub search: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

/// Marketplace backend. Every call returns the raw JSON envelope
/// (`{data: {itemList, totalCount}}` for listings, `{data: {...}}` for details).
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    async fn list_companies(&self, query: &CatalogQuery) -> UpstreamResult<Value>;

    async fn list_assets(&self, kind: AssetKind, company_id: &str) -> UpstreamResult<Value>;

    async fn asset_details(&self, kind: AssetKind, asset_id: &str) -> UpstreamResult<Value>;

    async fn list_user_favourites(
        &self,
        favourite_type: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> UpstreamResult<Value>;

    async fn list_user_bookings(
        &self,
        status: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> UpstreamResult<Value>;

    async fn company_categories(&self, cat_search: Option<&str>) -> UpstreamResult<Value>;

    async fn list_payments(&self, filter: &PaymentFilter) -> UpstreamResult<Value>;

    async fn user_profile(&self) -> UpstreamResult<Value>;
}

#[derive(Debug, Clone, Copy)]
enum Token {
    Guest,
    User,
}

/// `reqwest` client for the marketplace REST API.
///
/// Catalog and asset endpoints use the guest token; bookings, favourites,
/// payments and profile use the user token. Tokens are sent verbatim in the
/// `Authorization` header, which is what the backend expects.
pub struct HttpMarketplace {
    client: Client,
    base_url: String,
    guest_token: String,
    user_token: String,
}

impl HttpMarketplace {
    pub fn new(base_url: &str, guest_token: String, user_token: String) -> UpstreamResult<Self> {
        let client = Client::builder()
            .default_headers(common_headers())
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            guest_token,
            user_token,
        })
    }

    fn url(&self, path: &str, id: Option<&str>) -> UpstreamResult<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| UpstreamError::Transport(format!("invalid url: {}", e)))?;
        if let Some(id) = id {
            url.path_segments_mut()
                .map_err(|_| UpstreamError::Transport("base url cannot hold a path".into()))?
                .push(id);
        }
        Ok(url)
    }

    async fn get(&self, url: Url, params: &[(&str, String)], token: Token) -> UpstreamResult<Value> {
        let token = match token {
            Token::Guest => &self.guest_token,
            Token::User => &self.user_token,
        };

        let mut request = self.client.get(url.clone()).query(params);
        if !token.is_empty() {
            request = request.header(AUTHORIZATION, token.as_str());
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Marketplace request failed");
            UpstreamError::Transport(e.to_string())
        })?;

        let status = response.status();
        tracing::debug!(url = %url, status = status.as_u16(), "Marketplace response");

        if status == StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS {
            tracing::warn!(url = %url, "Marketplace returned 451, unavailable for legal reasons");
            return Err(UpstreamError::LegallyUnavailable);
        }
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

fn common_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(HeaderName::from_static("devicetype"), HeaderValue::from_static("web"));
    headers.insert(HeaderName::from_static("language"), HeaderValue::from_static("en"));
    headers.insert(HeaderName::from_static("timezone"), HeaderValue::from_static("Asia/Riyadh"));
    headers
}

fn paging(page: u32, per_page: u32) -> Vec<(&'static str, String)> {
    vec![("page", page.to_string()), ("perPage", per_page.to_string())]
}

fn push_opt(params: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        params.push((key, value.to_string()));
    }
}

#[async_trait]
impl MarketplaceApi for HttpMarketplace {
    async fn list_companies(&self, query: &CatalogQuery) -> UpstreamResult<Value> {
        let mut params = vec![("role", query.kind.role().to_string())];
        params.extend(paging(query.page, query.per_page));
        push_opt(&mut params, "search", query.search.as_deref());
        self.get(self.url(COMPANY_LIST, None)?, &params, Token::Guest).await
    }

    async fn list_assets(&self, kind: AssetKind, company_id: &str) -> UpstreamResult<Value> {
        let path = match kind {
            AssetKind::Vehicle => VEHICLE_LIST,
            AssetKind::Equipment => EQUIPMENT_LIST,
        };
        self.get(self.url(path, Some(company_id))?, &[], Token::Guest).await
    }

    async fn asset_details(&self, kind: AssetKind, asset_id: &str) -> UpstreamResult<Value> {
        let path = match kind {
            AssetKind::Vehicle => VEHICLE_DETAILS,
            AssetKind::Equipment => EQUIPMENT_DETAILS,
        };
        self.get(self.url(path, Some(asset_id))?, &[], Token::Guest).await
    }

    async fn list_user_favourites(
        &self,
        favourite_type: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> UpstreamResult<Value> {
        let mut params = paging(page, per_page);
        push_opt(&mut params, "type", favourite_type);
        self.get(self.url(FAVOURITE_LIST, None)?, &params, Token::User).await
    }

    async fn list_user_bookings(
        &self,
        status: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> UpstreamResult<Value> {
        let mut params = paging(page, per_page);
        // The backend treats an empty status as "all bookings".
        params.push(("status", status.unwrap_or_default().to_string()));
        self.get(self.url(BOOKING_LIST, None)?, &params, Token::User).await
    }

    async fn company_categories(&self, cat_search: Option<&str>) -> UpstreamResult<Value> {
        let mut params = vec![("role", "renter".to_string())];
        params.extend(paging(1, CATEGORY_PAGE_SIZE));
        push_opt(&mut params, "catSearch", cat_search);
        self.get(self.url(COMPANY_CATEGORIES, None)?, &params, Token::User).await
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> UpstreamResult<Value> {
        let mut params = vec![("role", "user".to_string())];
        params.extend(paging(filter.page, filter.per_page));
        push_opt(&mut params, "search", filter.search.as_deref());
        push_opt(&mut params, "startDate", filter.start_date.as_deref());
        push_opt(&mut params, "endDate", filter.end_date.as_deref());
        self.get(self.url(PAYMENT_LIST, None)?, &params, Token::User).await
    }

    async fn user_profile(&self) -> UpstreamResult<Value> {
        self.get(self.url(USER_PROFILE, None)?, &[], Token::User).await
    }
}
