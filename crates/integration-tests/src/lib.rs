//! Integration tests for the hardware storefront client.
//!
//! The tests start an in-process mock of the backend API on an ephemeral
//! port and drive the public library API against it over real HTTP. The mock
//! counts every hit per route so tests can assert how many requests were
//! actually sent.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p hardware-storefront-integration-tests
//! ```
//!
//! # Test Files
//!
//! - `api_client` - rate limiting and 401 recovery
//! - `auth` - sign-in, registration, sign-out
//! - `cart` - cart state manager
//! - `catalog` - products, categories, orders, payments

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use hardware_storefront::{
    ApiClient, AuthManager, AuthStatus, CartManager, Credentials, HeadlessNavigator, MemoryStore,
    SessionStore, StorefrontConfig,
};

/// Password the mock accepts for every account.
pub const PASSWORD: &str = "correct-horse";
/// Email used by [`Harness::sign_in`].
pub const EMAIL: &str = "pat@hardware.example";

// =============================================================================
// Mock backend
// =============================================================================

/// Shared state of the mock backend.
#[derive(Debug, Default)]
pub struct BackendState {
    hits: Mutex<HashMap<&'static str, usize>>,
    access_token: Mutex<String>,
    refresh_token: Mutex<String>,
    generation: AtomicUsize,
    refresh_allowed: AtomicBool,
    refresh_delay_ms: AtomicU64,
    cart_delay_ms: AtomicU64,
    cart_envelope: AtomicBool,
    cart: Mutex<Vec<Value>>,
    next_item: AtomicUsize,
}

impl BackendState {
    fn new() -> Self {
        let state = Self::default();
        *lock(&state.refresh_token) = "refresh-1".to_string();
        state.refresh_allowed.store(true, Ordering::SeqCst);
        state
    }

    fn hit(&self, route: &'static str) {
        *lock(&self.hits).entry(route).or_insert(0) += 1;
    }

    /// Number of requests `route` (e.g. `"GET /cart"`) has received.
    pub fn hits(&self, route: &str) -> usize {
        lock(&self.hits).get(route).copied().unwrap_or(0)
    }

    /// Total requests across all routes.
    pub fn total_hits(&self) -> usize {
        lock(&self.hits).values().sum()
    }

    /// Invalidate the access token the client holds, as if it had expired.
    pub fn expire_access_token(&self) {
        self.rotate_access();
    }

    /// Make the refresh endpoint accept or reject every request.
    pub fn set_refresh_allowed(&self, allowed: bool) {
        self.refresh_allowed.store(allowed, Ordering::SeqCst);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.refresh_delay_ms
            .store(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    pub fn set_cart_delay(&self, delay: Duration) {
        self.cart_delay_ms
            .store(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), Ordering::SeqCst);
    }

    /// Serve `GET /cart` as `{"items": [...]}` instead of a bare list.
    pub fn use_cart_envelope(&self, envelope: bool) {
        self.cart_envelope.store(envelope, Ordering::SeqCst);
    }

    /// Put a line into the server-side cart; returns its ID.
    pub fn seed_cart(&self, product_id: &str, quantity: u64) -> String {
        let item = self.new_item(product_id, quantity);
        let id = item["id"].as_str().unwrap_or_default().to_string();
        lock(&self.cart).push(item);
        id
    }

    /// Server-side quantity of a cart line.
    pub fn cart_quantity(&self, item_id: &str) -> Option<u64> {
        lock(&self.cart)
            .iter()
            .find(|item| item["id"] == item_id)
            .and_then(|item| item["quantity"].as_u64())
    }

    pub fn cart_len(&self) -> usize {
        lock(&self.cart).len()
    }

    fn rotate_access(&self) -> String {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("access-{generation}");
        *lock(&self.access_token) = token.clone();
        token
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = lock(&self.access_token).clone();
        cookie(headers, "access_token").is_some_and(|token| !token.is_empty() && token == expected)
    }

    fn new_item(&self, product_id: &str, quantity: u64) -> Value {
        let n = self.next_item.fetch_add(1, Ordering::SeqCst) + 1;
        json!({
            "id": format!("item-{n}"),
            "userId": "u1",
            "productId": product_id,
            "quantity": quantity,
            "product": product(product_id).unwrap_or(Value::Null),
        })
    }

    /// Session cookies for a fresh access token.
    fn issue_session(&self) -> HeaderMap {
        let access = self.rotate_access();
        let refresh = lock(&self.refresh_token).clone();
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, header(&format!("access_token={access}; Path=/; HttpOnly")));
        headers.append(SET_COOKIE, header(&format!("refresh_token={refresh}; Path=/; HttpOnly")));
        headers
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn header(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).expect("valid header value")
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

fn user(email: &str) -> Value {
    json!({ "id": "u1", "email": email, "name": "Pat Doe" })
}

/// The mock catalog: a hammer at 100 and a tape measure at 50.
fn products() -> Vec<Value> {
    vec![
        json!({
            "id": "p1",
            "name": " Claw Hammer ",
            "slug": "claw-hammer",
            "price": "100.00",
            "stock": 10,
            "images": ["https://cdn.hardware.example/hammer.jpg", ""],
            "categoryId": "c1",
        }),
        json!({
            "id": "p2",
            "name": "Tape Measure",
            "slug": "tape-measure",
            "price": 50,
            "stock": 5,
            "images": [],
            "categoryId": "c1",
        }),
    ]
}

fn product(id: &str) -> Option<Value> {
    products().into_iter().find(|p| p["id"] == id)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" }))).into_response()
}

async fn fallback() -> Response {
    not_found()
}

async fn sleep_ms(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

type Shared = State<Arc<BackendState>>;

async fn login(State(s): Shared, Json(body): Json<Value>) -> Response {
    s.hit("POST /auth/login");
    if body["password"] != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
            .into_response();
    }
    let email = body["email"].as_str().unwrap_or_default();
    (s.issue_session(), Json(json!({ "user": user(email) }))).into_response()
}

async fn register(State(s): Shared, Json(body): Json<Value>) -> Response {
    s.hit("POST /auth/register");
    let email = body["email"].as_str().unwrap_or_default();
    let access = s.rotate_access();
    let refresh = lock(&s.refresh_token).clone();
    // Registration hands tokens back in the body rather than as cookies.
    (
        StatusCode::CREATED,
        Json(json!({
            "user": user(email),
            "accessToken": access,
            "refreshToken": refresh,
        })),
    )
        .into_response()
}

async fn refresh(State(s): Shared, headers: HeaderMap) -> Response {
    s.hit("POST /auth/refresh");
    sleep_ms(s.refresh_delay_ms.load(Ordering::SeqCst)).await;

    let expected = lock(&s.refresh_token).clone();
    let presented = cookie(&headers, "refresh_token");
    if !s.refresh_allowed.load(Ordering::SeqCst) || presented.as_deref() != Some(expected.as_str())
    {
        return unauthorized();
    }
    let access = s.rotate_access();
    Json(json!({ "accessToken": access })).into_response()
}

async fn logout(State(s): Shared) -> Response {
    s.hit("POST /auth/logout");
    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        header("access_token=deleted; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT"),
    );
    headers.append(SET_COOKIE, header("refresh_token=; Path=/; Max-Age=0"));
    (StatusCode::NO_CONTENT, headers).into_response()
}

async fn profile(State(s): Shared, headers: HeaderMap) -> Response {
    s.hit("GET /auth/profile");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    Json(user(EMAIL)).into_response()
}

async fn update_profile(State(s): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    s.hit("PUT /users/profile");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    let mut updated = user(EMAIL);
    for field in ["name", "phone", "address"] {
        if let Some(value) = body.get(field) {
            updated[field] = value.clone();
        }
    }
    Json(json!({ "data": updated })).into_response()
}

async fn change_password(State(s): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    s.hit("PUT /users/password");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    if body["currentPassword"] != PASSWORD {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Current password is incorrect" })),
        )
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn get_cart(State(s): Shared, headers: HeaderMap) -> Response {
    s.hit("GET /cart");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    sleep_ms(s.cart_delay_ms.load(Ordering::SeqCst)).await;

    let items = Value::Array(lock(&s.cart).clone());
    if s.cart_envelope.load(Ordering::SeqCst) {
        Json(json!({ "items": items, "count": 0 })).into_response()
    } else {
        Json(items).into_response()
    }
}

async fn add_to_cart(State(s): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    s.hit("POST /cart");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    let product_id = body["productId"].as_str().unwrap_or_default();
    if product(product_id).is_none() {
        return not_found();
    }
    let quantity = body["quantity"].as_u64().unwrap_or(1);
    let item = s.new_item(product_id, quantity);
    lock(&s.cart).push(item.clone());
    (StatusCode::CREATED, Json(item)).into_response()
}

async fn update_cart_item(
    State(s): Shared,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    s.hit("PUT /cart/{id}");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    let mut cart = lock(&s.cart);
    let Some(item) = cart.iter_mut().find(|item| item["id"] == id.as_str()) else {
        return not_found();
    };
    item["quantity"] = body["quantity"].clone();
    Json(item.clone()).into_response()
}

async fn remove_cart_item(State(s): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    s.hit("DELETE /cart/{id}");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    let mut cart = lock(&s.cart);
    let before = cart.len();
    cart.retain(|item| item["id"] != id.as_str());
    if cart.len() == before {
        return not_found();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn clear_cart(State(s): Shared, headers: HeaderMap) -> Response {
    s.hit("DELETE /cart");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    lock(&s.cart).clear();
    StatusCode::NO_CONTENT.into_response()
}

async fn list_products(State(s): Shared, Query(params): Query<HashMap<String, String>>) -> Response {
    s.hit("GET /products");
    let search = params.get("search").map(|s| s.to_lowercase());
    let items: Vec<Value> = products()
        .into_iter()
        .filter(|p| {
            search.as_deref().is_none_or(|needle| {
                p["name"]
                    .as_str()
                    .is_some_and(|name| name.to_lowercase().contains(needle))
            })
        })
        .collect();
    let page: u32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    Json(json!({ "products": items, "total": items.len(), "page": page })).into_response()
}

async fn show_product(State(s): Shared, Path(id): Path<String>) -> Response {
    s.hit("GET /products/{id}");
    product(&id).map_or_else(not_found, |p| Json(p).into_response())
}

async fn show_product_by_slug(State(s): Shared, Path(slug): Path<String>) -> Response {
    s.hit("GET /products/slug/{slug}");
    products()
        .into_iter()
        .find(|p| p["slug"] == slug.as_str())
        .map_or_else(not_found, |p| Json(p).into_response())
}

async fn list_categories(State(s): Shared) -> Response {
    s.hit("GET /categories");
    Json(json!([
        { "id": "c1", "name": "Hand Tools", "slug": "hand-tools" },
        { "id": "c2", "name": "Power Tools", "slug": "power-tools", "parentId": null },
    ]))
    .into_response()
}

fn order_json(id: &str, address: &str, total: &str) -> Value {
    json!({
        "id": id,
        "status": "PENDING",
        "paymentStatus": "PENDING",
        "items": [],
        "totalAmount": total,
        "shippingAddress": address,
        "createdAt": "2026-03-01T12:00:00Z",
    })
}

async fn create_order(State(s): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    s.hit("POST /orders");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    let address = body["shippingAddress"].as_str().unwrap_or_default();
    (
        StatusCode::CREATED,
        Json(json!({ "data": order_json("ord-1", address, "250.00") })),
    )
        .into_response()
}

async fn list_orders(State(s): Shared, headers: HeaderMap) -> Response {
    s.hit("GET /orders");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "data": [order_json("ord-1", "1 Main St", "250.00")] })).into_response()
}

async fn show_order(State(s): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    s.hit("GET /orders/{id}");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    if id != "ord-1" {
        return not_found();
    }
    Json(json!({ "data": order_json(&id, "1 Main St", "250.00") })).into_response()
}

async fn initiate_payment(State(s): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    s.hit("POST /payments/initiate");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    let redirect = (body["method"] == "card").then_some("https://pay.hardware.example/session/pay-1");
    Json(json!({ "paymentId": "pay-1", "status": "PENDING", "redirectUrl": redirect }))
        .into_response()
}

async fn payment_status(State(s): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    s.hit("GET /payments/{id}/status");
    if !s.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "id": id, "orderId": "ord-1", "status": "COMPLETED", "amount": "250.00" }))
        .into_response()
}

/// A running mock backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
}

impl MockBackend {
    /// Start the mock on an ephemeral localhost port.
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::new());
        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/refresh", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/auth/profile", get(profile))
            .route("/users/profile", put(update_profile))
            .route("/users/password", put(change_password))
            .route("/cart", get(get_cart).post(add_to_cart).delete(clear_cart))
            .route("/cart/{id}", put(update_cart_item).delete(remove_cart_item))
            .route("/products", get(list_products))
            .route("/products/{id}", get(show_product))
            .route("/products/slug/{slug}", get(show_product_by_slug))
            .route("/categories", get(list_categories))
            .route("/orders", get(list_orders).post(create_order))
            .route("/orders/{id}", get(show_order))
            .route("/payments/initiate", post(initiate_payment))
            .route("/payments/{id}/status", get(payment_status))
            .fallback(fallback)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Mock backend has no address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock backend failed");
        });

        Self { addr, state }
    }

    /// Client configuration pointing at this backend.
    pub fn config(&self) -> StorefrontConfig {
        let url = url::Url::parse(&format!("http://{}", self.addr)).expect("valid mock URL");
        StorefrontConfig::new(url)
    }
}

// =============================================================================
// Client harness
// =============================================================================

/// A fully wired client: session, HTTP client and both state managers.
pub struct Harness {
    pub backend: MockBackend,
    pub storage: Arc<MemoryStore>,
    pub session: Arc<SessionStore>,
    pub navigator: Arc<HeadlessNavigator>,
    pub api: ApiClient,
    pub auth: AuthManager,
    pub cart: CartManager,
}

impl Harness {
    /// Start a backend and a client with default settings.
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start a backend and a client whose config is adjusted by `configure`.
    pub async fn start_with(configure: impl FnOnce(&mut StorefrontConfig)) -> Self {
        let backend = MockBackend::start().await;
        let mut config = backend.config();
        configure(&mut config);

        let storage = Arc::new(MemoryStore::new());
        let session = Arc::new(SessionStore::restore(storage.clone()));
        let navigator = Arc::new(HeadlessNavigator::at("/"));
        let api = ApiClient::new(&config, Arc::clone(&session), navigator.clone())
            .expect("Failed to build API client");

        Self {
            backend,
            storage,
            session,
            navigator,
            auth: AuthManager::new(api.clone()),
            cart: CartManager::new(api.clone()),
            api,
        }
    }

    pub fn state(&self) -> &BackendState {
        &self.backend.state
    }

    /// Sign in with the mock's accepted credentials.
    pub async fn sign_in(&self) {
        self.auth
            .login(&Credentials::new(EMAIL, PASSWORD))
            .await
            .expect("Sign-in against mock failed");
        assert!(matches!(self.auth.status(), AuthStatus::Authenticated(_)));
    }
}
