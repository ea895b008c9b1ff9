//! API client for the storefront REST backend.
//!
//! Every read that is safe to cache goes through [`ApiClient::cached_get`],
//! which serves fresh cache hits without touching the network and falls
//! back to a stale copy when a refresh fails. Every mutation invalidates
//! the cache domains it makes unreliable before returning.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cache::{CacheDomain, CacheStore};
use crate::config::Config;
use crate::models::{
    list_from_value, normalize_remote_cart, Address, AddressInput, CartItem, Order, Product,
    ProfileUpdate, UserProfile, Variant,
};

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the storefront backend.
/// Shared via `Arc`; the token slot is interior-mutable so the session
/// layer can swap credentials without exclusive access to the client.
pub struct ApiClient {
    client: Client,
    base: String,
    token: RwLock<Option<String>>,
    cache: Arc<CacheStore>,
}

impl ApiClient {
    /// Create a new API client against the configured base URL.
    pub fn new(config: &Config, cache: Arc<CacheStore>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base: config.api_base.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
            cache,
        })
    }

    /// Set or clear the bearer token for authenticated requests.
    pub fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn has_token(&self) -> bool {
        self.read_token().is_some()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    fn read_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    // ===== Request plumbing =====

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = self.read_token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        Self::parse_response(response).await
    }

    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, None).await
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    async fn put_json(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    async fn patch_json(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    async fn delete_json(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::DELETE, path, None).await
    }

    /// Login is the one form-encoded endpoint (OAuth2 password flow).
    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<Value, ApiError> {
        let response = self.client.post(self.url(path)).form(form).send().await?;
        Self::parse_response(response).await
    }

    /// Normalize a response: 2xx returns the parsed payload, anything else
    /// becomes `ApiError::Status` carrying the status and parsed body.
    async fn parse_response(response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);
        let text = response.text().await?;

        let body = if text.is_empty() {
            Value::Null
        } else if is_json {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn from_value<T: DeserializeOwned>(payload: Value) -> Result<T, ApiError> {
        serde_json::from_value(payload).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Cache-through GET. Fresh hits skip the network entirely. On a cache
    /// miss or stale hit the endpoint is fetched and the parsed result
    /// cached under the domain's default TTL; if the fetch fails and a
    /// stale copy exists, the stale copy is served instead of the error.
    async fn cached_get<T, F>(
        &self,
        domain: CacheDomain,
        key: &str,
        path: &str,
        parse: F,
    ) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Value) -> Result<T, ApiError>,
    {
        if let Some(hit) = self.cache.get::<T>(domain, key) {
            if !hit.is_stale {
                debug!(domain = %domain, key, "Cache hit");
                return Ok(hit.value);
            }
        }

        match self.get_json(path).await {
            Ok(payload) => {
                let value = parse(payload)?;
                self.cache.set(domain, key, &value, domain.default_ttl());
                Ok(value)
            }
            Err(e) => {
                if let Some(stale) = self.cache.get::<T>(domain, key) {
                    warn!(domain = %domain, key, error = %e, "Refresh failed, serving stale entry");
                    return Ok(stale.value);
                }
                Err(e)
            }
        }
    }

    // ===== Accounts =====

    /// Authenticate and return the bearer token. The token is not installed
    /// on the client; the session layer decides when to do that.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let payload = self
            .post_form(
                "/accounts/login",
                &[("username", email), ("password", password)],
            )
            .await?;
        payload
            .get("access_token")
            .or_else(|| payload.get("token"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::InvalidResponse("login response missing access token".to_string())
            })
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.post_json("/accounts/logout", json!({})).await?;
        Ok(())
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<Value, ApiError> {
        self.post_json(
            "/accounts/register",
            json!({
                "email": email,
                "password": password,
                "password_confirm": password_confirm,
            }),
        )
        .await
    }

    /// Confirm a new registration with the emailed OTP.
    pub async fn verify_registration(&self, email: &str, otp: &str) -> Result<Value, ApiError> {
        self.patch_json(
            "/accounts/register/verify",
            json!({ "email": email, "otp": otp }),
        )
        .await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<Value, ApiError> {
        self.post_json("/accounts/reset-password", json!({ "email": email }))
            .await
    }

    pub async fn confirm_password_reset(
        &self,
        email: &str,
        otp: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<Value, ApiError> {
        self.patch_json(
            "/accounts/reset-password/verify",
            json!({
                "email": email,
                "otp": otp,
                "password": password,
                "password_confirm": password_confirm,
            }),
        )
        .await
    }

    /// Ask the backend to resend an OTP. `code_type` distinguishes the flow
    /// the code belongs to ("registration" or "reset_password").
    pub async fn resend_otp(&self, email: &str, code_type: &str) -> Result<Value, ApiError> {
        self.post_json(
            "/accounts/otp",
            json!({ "email": email, "code_type": code_type }),
        )
        .await
    }

    /// The signed-in profile, served from the user cache when fresh.
    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        self.cached_get(CacheDomain::User, "me", "/accounts/me", Self::from_value)
            .await
    }

    /// Force-refresh the signed-in profile, replacing the cached copy.
    pub async fn current_user_fresh(&self) -> Result<UserProfile, ApiError> {
        let payload = self.get_json("/accounts/me").await?;
        let profile: UserProfile = Self::from_value(payload)?;
        self.cache.set(
            CacheDomain::User,
            "me",
            &profile,
            CacheDomain::User.default_ttl(),
        );
        Ok(profile)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        let body = serde_json::to_value(update)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let payload = self.put_json("/accounts/me", body).await?;
        self.cache.invalidate(CacheDomain::User);
        Self::from_value(payload)
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<Value, ApiError> {
        self.patch_json(
            "/accounts/me/password",
            json!({
                "current_password": current_password,
                "password": password,
                "password_confirm": password_confirm,
            }),
        )
        .await
    }

    pub async fn request_email_change(&self, email: &str) -> Result<Value, ApiError> {
        self.post_json("/accounts/me/email", json!({ "email": email }))
            .await
    }

    pub async fn verify_email_change(&self, otp: &str) -> Result<Value, ApiError> {
        let payload = self
            .patch_json("/accounts/me/email/verify", json!({ "otp": otp }))
            .await?;
        // The cached profile now carries the old address.
        self.cache.invalidate(CacheDomain::User);
        Ok(payload)
    }

    // ===== Products =====

    pub async fn products(&self) -> Result<Vec<Product>, ApiError> {
        self.cached_get(CacheDomain::Products, "all", "/products/", |payload| {
            Ok(list_from_value(payload, &["products", "items", "data"]))
        })
        .await
    }

    pub async fn product(&self, product_id: i64) -> Result<Product, ApiError> {
        self.cached_get(
            CacheDomain::Products,
            &format!("product:{product_id}"),
            &format!("/products/{product_id}"),
            Self::from_value,
        )
        .await
    }

    pub async fn product_variants(&self, product_id: i64) -> Result<Vec<Variant>, ApiError> {
        self.cached_get(
            CacheDomain::Products,
            &format!("variants:{product_id}"),
            &format!("/products/{product_id}/variants"),
            |payload| Ok(list_from_value(payload, &["variants", "data"])),
        )
        .await
    }

    /// Fetch a product straight from the backend, bypassing the cache.
    /// Used for price/stock verification before a cart add, where a cached
    /// answer would defeat the point.
    pub async fn product_fresh(&self, product_id: i64) -> Result<Product, ApiError> {
        let payload = self.get_json(&format!("/products/{product_id}")).await?;
        Self::from_value(payload)
    }

    /// Admin-only catalog insert. The payload is passed through as-is;
    /// the backend validates the shape.
    pub async fn create_product(&self, payload: Value) -> Result<Product, ApiError> {
        let response = self.post_json("/products/", payload).await?;
        self.cache.invalidate(CacheDomain::Products);
        Self::from_value(response)
    }

    /// Admin-only catalog update.
    pub async fn update_product(
        &self,
        product_id: i64,
        payload: Value,
    ) -> Result<Product, ApiError> {
        let response = self
            .put_json(&format!("/products/{product_id}"), payload)
            .await?;
        self.cache.invalidate(CacheDomain::Products);
        Self::from_value(response)
    }

    /// Admin-only catalog delete.
    pub async fn delete_product(&self, product_id: i64) -> Result<(), ApiError> {
        self.delete_json(&format!("/products/{product_id}")).await?;
        self.cache.invalidate(CacheDomain::Products);
        Ok(())
    }

    // ===== Cart =====

    /// Fetch the authoritative server cart, normalized to cart lines.
    /// Never cached: the cart engine holds this state itself, and a
    /// cached read here would hand it an outdated cart after a mutation.
    /// The `Cart` domain exists for invalidation semantics only.
    pub async fn fetch_cart(&self) -> Result<Vec<CartItem>, ApiError> {
        let payload = self.get_json("/cart/").await?;
        Ok(normalize_remote_cart(payload))
    }

    pub async fn add_to_cart(
        &self,
        product_id: i64,
        variant_id: Option<i64>,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let mut body = json!({ "product_id": product_id, "quantity": quantity });
        if let Some(variant_id) = variant_id {
            body["variant_id"] = json!(variant_id);
        }
        self.post_json("/cart/add", body).await?;
        self.cache.invalidate(CacheDomain::Cart);
        Ok(())
    }

    pub async fn update_cart_item(&self, item_id: i64, quantity: u32) -> Result<(), ApiError> {
        self.put_json(
            &format!("/cart/item/{item_id}"),
            json!({ "quantity": quantity }),
        )
        .await?;
        self.cache.invalidate(CacheDomain::Cart);
        Ok(())
    }

    pub async fn delete_cart_item(&self, item_id: i64) -> Result<(), ApiError> {
        self.delete_json(&format!("/cart/item/{item_id}")).await?;
        self.cache.invalidate(CacheDomain::Cart);
        Ok(())
    }

    /// Convert the server cart into an order shipped to `address_id`.
    /// Invalidates cart, orders, and products: stock changed server-side.
    pub async fn checkout(&self, address_id: i64) -> Result<Order, ApiError> {
        let payload = self
            .post_json(&format!("/cart/checkout?address_id={address_id}"), json!({}))
            .await?;
        self.cache.invalidate(CacheDomain::Cart);
        self.cache.invalidate(CacheDomain::Orders);
        self.cache.invalidate(CacheDomain::Products);

        // The order may arrive bare or wrapped under an "order" key.
        match serde_json::from_value::<Order>(payload.clone()) {
            Ok(order) => Ok(order),
            Err(_) => match payload.get("order") {
                Some(inner) => Self::from_value(inner.clone()),
                None => Err(ApiError::InvalidResponse(
                    "checkout response missing order".to_string(),
                )),
            },
        }
    }

    // ===== Orders =====

    pub async fn orders(&self) -> Result<Vec<Order>, ApiError> {
        self.cached_get(CacheDomain::Orders, "mine", "/orders/", |payload| {
            Ok(list_from_value(payload, &["orders", "data"]))
        })
        .await
    }

    pub async fn order(&self, order_id: i64) -> Result<Order, ApiError> {
        self.cached_get(
            CacheDomain::Orders,
            &format!("order:{order_id}"),
            &format!("/orders/{order_id}"),
            Self::from_value,
        )
        .await
    }

    /// Admin-only listing of every order in the system.
    pub async fn all_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.cached_get(
            CacheDomain::Orders,
            "admin",
            "/orders/admin/allorders",
            |payload| Ok(list_from_value(payload, &["orders", "data"])),
        )
        .await
    }

    /// Admin-only status transition for one order.
    pub async fn set_order_status(&self, order_id: i64, status: &str) -> Result<(), ApiError> {
        self.patch_json(
            &format!("/orders/{order_id}/status"),
            json!({ "status": status }),
        )
        .await?;
        self.cache.invalidate(CacheDomain::Orders);
        Ok(())
    }

    // ===== Addresses =====

    pub async fn addresses(&self) -> Result<Vec<Address>, ApiError> {
        self.cached_get(CacheDomain::Addresses, "all", "/addresses/", |payload| {
            Ok(list_from_value(payload, &["addresses", "data"]))
        })
        .await
    }

    pub async fn address(&self, address_id: i64) -> Result<Address, ApiError> {
        self.cached_get(
            CacheDomain::Addresses,
            &format!("address:{address_id}"),
            &format!("/addresses/{address_id}"),
            Self::from_value,
        )
        .await
    }

    pub async fn create_address(&self, input: &AddressInput) -> Result<Address, ApiError> {
        let body = serde_json::to_value(input)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let payload = self.post_json("/addresses/", body).await?;
        self.cache.invalidate(CacheDomain::Addresses);
        Self::from_value(payload)
    }

    pub async fn update_address(
        &self,
        address_id: i64,
        input: &AddressInput,
    ) -> Result<Address, ApiError> {
        let body = serde_json::to_value(input)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let payload = self.put_json(&format!("/addresses/{address_id}"), body).await?;
        self.cache.invalidate(CacheDomain::Addresses);
        Self::from_value(payload)
    }

    pub async fn delete_address(&self, address_id: i64) -> Result<(), ApiError> {
        self.delete_json(&format!("/addresses/{address_id}")).await?;
        self.cache.invalidate(CacheDomain::Addresses);
        Ok(())
    }

    // ===== Payments =====

    /// Kick off payment for an order. The provider payload is passed
    /// through untouched; processing is backend-owned.
    pub async fn create_payment(&self, order_id: i64) -> Result<Value, ApiError> {
        self.post_json(&format!("/payments/create/{order_id}"), json!({}))
            .await
    }
}
