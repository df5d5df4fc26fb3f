//! In-process fake of the bikeshop REST backend.
//!
//! [`FakeBackend::start`] binds an axum server on an ephemeral port and
//! records every request it receives, so tests can assert both the state a
//! client ends up in and exactly which calls it made to get there.
//!
//! Seed data:
//! - user 42 `minh` / `pedal-power`
//! - products 3 (Trek FX 3, city), 7 (Giant Escape 3, city), 12 (Giant TCR, road),
//!   15 (Giant Talon, mountain)
//!
//! # Example
//!
//! ```rust,ignore
//! let backend = FakeBackend::start().await;
//! let state = backend.client_state(tempdir.path());
//! state.resolve_session().await?;
//! assert!(backend.requests().iter().all(|r| !r.is_user_scoped()));
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Body;
use axum::extract::{Path as UrlPath, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

use bikeshop_storefront::{ClientState, StorefrontConfig};

/// Credentials of the seeded user.
pub const USERNAME: &str = "minh";
pub const PASSWORD: &str = "pedal-power";
pub const USER_ID: i64 = 42;

const AUTH_COOKIE: &str = "authToken";

/// One request as seen by the fake backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    /// Whether this hit a user-scoped cart or wishlist endpoint.
    #[must_use]
    pub fn is_user_scoped(&self) -> bool {
        self.path.starts_with("/api/cart/") || self.path.starts_with("/api/wishlist/")
    }

    /// `"METHOD /path"`, handy for asserting call sequences.
    #[must_use]
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Debug, Clone)]
struct FakeUser {
    id: i64,
    username: String,
    password: String,
}

#[derive(Debug, Clone)]
struct FakeProduct {
    name: String,
    price: f64,
    category: String,
    brand: String,
    stock: i64,
}

#[derive(Debug, Clone)]
struct FakeLine {
    id: i64,
    user_id: i64,
    product_id: i64,
    quantity: i64,
}

#[derive(Debug, Default)]
struct FakeState {
    requests: Vec<RecordedRequest>,
    failing: HashSet<String>,
    users: Vec<FakeUser>,
    sessions: HashSet<String>,
    products: BTreeMap<i64, FakeProduct>,
    cart: Vec<FakeLine>,
    wishlist: Vec<FakeLine>,
    next_id: i64,
}

impl FakeState {
    fn session_user(&self, headers: &HeaderMap) -> Option<&FakeUser> {
        let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
        let token = cookies
            .split(';')
            .map(str::trim)
            .find_map(|pair| pair.strip_prefix(&format!("{AUTH_COOKIE}=")))?;
        if !self.sessions.contains(token) {
            return None;
        }
        self.users.iter().find(|u| token_for(u.id) == token)
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn items(&self, lines: &[FakeLine], user_id: i64, with_quantity: bool) -> Vec<Value> {
        lines
            .iter()
            .filter(|line| line.user_id == user_id)
            .filter_map(|line| {
                let product = self.products.get(&line.product_id)?;
                let mut item = json!({
                    "id": line.id,
                    "productId": line.product_id,
                    "productName": product.name,
                    "price": product.price,
                });
                if with_quantity {
                    item["quantity"] = json!(line.quantity);
                }
                Some(item)
            })
            .collect()
    }
}

type Shared = Arc<Mutex<FakeState>>;

fn lock(state: &Shared) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn token_for(user_id: i64) -> String {
    format!("token-{user_id}")
}

fn user_json(user: &FakeUser) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "fullName": "Nguyen Van Minh",
        "email": format!("{}@bikeshop.vn", user.username),
        "phoneNumber": "0901234567",
        "dob": "15-03-1995",
        "role": "USER",
        // The backend serializes its entity, hash included
        "password": "$2a$10$abcdefghijklmnopqrstuv",
    })
}

fn product_json(id: i64, product: &FakeProduct) -> Value {
    json!({
        "id": id,
        "name": product.name,
        "description": format!("{} by {}", product.name, product.brand),
        "price": product.price,
        "imageUrls": [format!("/images/{id}.jpg")],
        "category": product.category,
        "brand": product.brand,
        "color": ["Black", "Blue"],
        "quantity": product.stock,
    })
}

/// A running fake backend. The server stops when this is dropped.
pub struct FakeBackend {
    url: Url,
    state: Shared,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind on `127.0.0.1:0` and start serving seeded data.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));
        {
            let mut seed = lock(&state);
            seed.next_id = 1000;
            seed.users.push(FakeUser {
                id: USER_ID,
                username: USERNAME.to_string(),
                password: PASSWORD.to_string(),
            });
            for (id, name, price, category, brand) in [
                (3, "Trek FX 3", 12_990_000.0, "city", "Trek"),
                (7, "Giant Escape 3", 1_000_000.0, "city", "Giant"),
                (12, "Giant TCR Advanced", 45_500_000.0, "road", "Giant"),
                (15, "Giant Talon 29", 9_800_000.0, "mountain", "Giant"),
            ] {
                seed.products.insert(
                    id,
                    FakeProduct {
                        name: name.to_string(),
                        price,
                        category: category.to_string(),
                        brand: brand.to_string(),
                        stock: 4,
                    },
                );
            }
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Listener has no address");
        let url = Url::parse(&format!("http://{addr}")).expect("Valid listener URL");

        let app = router(state.clone());
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { url, state, server }
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Client configuration pointing at this backend with storage in `dir`.
    ///
    /// # Panics
    ///
    /// Panics if the generated configuration is rejected.
    #[must_use]
    pub fn config(&self, dir: &Path) -> StorefrontConfig {
        let vars: HashMap<&str, String> = HashMap::from([
            ("BIKESHOP_API_URL", self.url.to_string()),
            ("BIKESHOP_STORAGE_DIR", dir.display().to_string()),
        ]);
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
            .expect("Fake backend config is valid")
    }

    /// A fresh client over file storage in `dir`.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    #[must_use]
    pub fn client_state(&self, dir: &Path) -> ClientState {
        ClientState::new(self.config(dir)).expect("Client state builds")
    }

    /// Add or replace a catalog product in the `kids` category.
    pub fn add_product(&self, id: i64, name: &str, price: f64) {
        lock(&self.state).products.insert(
            id,
            FakeProduct {
                name: name.to_string(),
                price,
                category: "kids".to_string(),
                brand: "Bikeshop".to_string(),
                stock: 1,
            },
        );
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    pub fn clear_requests(&self) {
        lock(&self.state).requests.clear();
    }

    /// Answer 500 to every request on `path` from now on.
    pub fn fail_path(&self, path: &str) {
        lock(&self.state).failing.insert(path.to_string());
    }

    /// Server-side cart of `user_id` as `(product_id, quantity)` pairs.
    #[must_use]
    pub fn cart_of(&self, user_id: i64) -> Vec<(i64, i64)> {
        lock(&self.state)
            .cart
            .iter()
            .filter(|line| line.user_id == user_id)
            .map(|line| (line.product_id, line.quantity))
            .collect()
    }

    /// Server-side wishlist of `user_id` as product ids.
    #[must_use]
    pub fn wishlist_of(&self, user_id: i64) -> Vec<i64> {
        lock(&self.state)
            .wishlist
            .iter()
            .filter(|line| line.user_id == user_id)
            .map(|line| line.product_id)
            .collect()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/users/me", get(me))
        .route("/api/users/login", post(login))
        .route("/api/users/logout", post(logout))
        .route("/api/cart/add", post(add_cart_line))
        .route("/api/cart/delete/{line_id}", delete(delete_cart_line))
        .route("/api/cart/update/{line_id}", put(update_cart_line))
        .route("/api/cart/clear/{user_id}", delete(clear_cart))
        .route("/api/cart/{user_id}", get(fetch_cart))
        .route("/api/wishlist/add", post(add_wishlist_entry))
        .route("/api/wishlist/delete/{entry_id}", delete(delete_wishlist_entry))
        .route("/api/wishlist/{user_id}", get(fetch_wishlist))
        .route("/api/all-products", get(list_products))
        .route("/api/all-products/filter", get(filter_products))
        .route("/api/all-products/category/{category}", get(products_by_category))
        .route("/api/all-products/search", get(search_products))
        .route("/api/all-products/{product_id}", get(get_product))
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

/// Log the request, then fail it if its path was marked failing.
async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, 1024 * 1024)
        .await
        .unwrap_or_default();
    let path = parts.uri.path().to_string();

    let failing = {
        let mut guard = lock(&state);
        guard.requests.push(RecordedRequest {
            method: parts.method.to_string(),
            path: path.clone(),
            query: parts.uri.query().map(str::to_string),
            body: serde_json::from_slice(&bytes).ok(),
        });
        guard.failing.contains(&path)
    };
    if failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, "injected failure").into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

// =============================================================================
// Users
// =============================================================================

async fn me(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let guard = lock(&state);
    guard.session_user(&headers).map_or_else(
        || StatusCode::UNAUTHORIZED.into_response(),
        |user| Json(user_json(user)).into_response(),
    )
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn login(State(state): State<Shared>, Json(body): Json<LoginBody>) -> Response {
    let mut guard = lock(&state);
    let Some(user) = guard
        .users
        .iter()
        .find(|u| u.username == body.username && u.password == body.password)
        .cloned()
    else {
        return (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response();
    };

    let token = token_for(user.id);
    guard.sessions.insert(token.clone());
    (
        [(header::SET_COOKIE, format!("{AUTH_COOKIE}={token}; Path=/; HttpOnly"))],
        Json(user_json(&user)),
    )
        .into_response()
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut guard = lock(&state);
    if let Some(id) = guard.session_user(&headers).map(|u| u.id) {
        guard.sessions.remove(&token_for(id));
    }
    (
        [(header::SET_COOKIE, format!("{AUTH_COOKIE}=; Path=/; Max-Age=0"))],
        StatusCode::OK,
    )
        .into_response()
}

// =============================================================================
// Cart
// =============================================================================

fn field(body: &Value, name: &str) -> Option<i64> {
    body.get(name).and_then(Value::as_i64)
}

async fn fetch_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(user_id): UrlPath<i64>,
) -> Response {
    let guard = lock(&state);
    if guard.session_user(&headers).map(|u| u.id) != Some(user_id) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let items = guard.items(&guard.cart, user_id, true);
    Json(json!({ "items": items })).into_response()
}

async fn add_cart_line(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = lock(&state);
    let (Some(user_id), Some(product_id), Some(quantity)) = (
        field(&body, "userId"),
        field(&body, "productId"),
        field(&body, "quantity"),
    ) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if guard.session_user(&headers).map(|u| u.id) != Some(user_id) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !guard.products.contains_key(&product_id) {
        return StatusCode::NOT_FOUND.into_response();
    }

    if let Some(line) = guard
        .cart
        .iter_mut()
        .find(|l| l.user_id == user_id && l.product_id == product_id)
    {
        line.quantity += quantity;
    } else {
        let id = guard.next_id();
        guard.cart.push(FakeLine {
            id,
            user_id,
            product_id,
            quantity,
        });
    }
    StatusCode::OK.into_response()
}

async fn delete_cart_line(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(line_id): UrlPath<i64>,
) -> Response {
    let mut guard = lock(&state);
    let Some(user_id) = guard.session_user(&headers).map(|u| u.id) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let before = guard.cart.len();
    guard
        .cart
        .retain(|l| !(l.id == line_id && l.user_id == user_id));
    if guard.cart.len() == before {
        return StatusCode::NOT_FOUND.into_response();
    }
    StatusCode::OK.into_response()
}

async fn update_cart_line(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(line_id): UrlPath<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut guard = lock(&state);
    let Some(user_id) = guard.session_user(&headers).map(|u| u.id) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(quantity) = params
        .get("quantity")
        .and_then(|q| q.parse::<i64>().ok())
        .filter(|q| *q > 0)
    else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    match guard
        .cart
        .iter_mut()
        .find(|l| l.id == line_id && l.user_id == user_id)
    {
        Some(line) => {
            line.quantity = quantity;
            StatusCode::OK.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn clear_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(user_id): UrlPath<i64>,
) -> Response {
    let mut guard = lock(&state);
    if guard.session_user(&headers).map(|u| u.id) != Some(user_id) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    guard.cart.retain(|l| l.user_id != user_id);
    StatusCode::OK.into_response()
}

// =============================================================================
// Wishlist
// =============================================================================

async fn fetch_wishlist(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(user_id): UrlPath<i64>,
) -> Response {
    let guard = lock(&state);
    let Some(user) = guard.session_user(&headers).filter(|u| u.id == user_id) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let user_name = user.username.clone();
    let items = guard.items(&guard.wishlist, user_id, false);
    Json(json!({ "userName": user_name, "items": items })).into_response()
}

async fn add_wishlist_entry(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = lock(&state);
    let (Some(user_id), Some(product_id)) = (field(&body, "userId"), field(&body, "productId"))
    else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if guard.session_user(&headers).map(|u| u.id) != Some(user_id) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !guard.products.contains_key(&product_id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let exists = guard
        .wishlist
        .iter()
        .any(|l| l.user_id == user_id && l.product_id == product_id);
    if !exists {
        let id = guard.next_id();
        guard.wishlist.push(FakeLine {
            id,
            user_id,
            product_id,
            quantity: 1,
        });
    }
    StatusCode::OK.into_response()
}

async fn delete_wishlist_entry(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(entry_id): UrlPath<i64>,
) -> Response {
    let mut guard = lock(&state);
    let Some(user_id) = guard.session_user(&headers).map(|u| u.id) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    guard
        .wishlist
        .retain(|l| !(l.id == entry_id && l.user_id == user_id));
    StatusCode::OK.into_response()
}

// =============================================================================
// Catalog
// =============================================================================

async fn get_product(State(state): State<Shared>, UrlPath(product_id): UrlPath<i64>) -> Response {
    let guard = lock(&state);
    guard.products.get(&product_id).map_or_else(
        || StatusCode::NOT_FOUND.into_response(),
        |product| Json(product_json(product_id, product)).into_response(),
    )
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default)]
    page: usize,
    #[serde(default = "default_size")]
    size: usize,
}

const fn default_size() -> usize {
    9
}

/// Spring-style page of `matches`.
fn page_of(matches: Vec<Value>, params: &PageParams) -> Response {
    let size = params.size.max(1);
    let total_pages = matches.len().div_ceil(size);
    let content: Vec<Value> = matches
        .into_iter()
        .skip(params.page * size)
        .take(size)
        .collect();

    Json(json!({
        "content": content,
        "totalPages": total_pages,
        "number": params.page,
    }))
    .into_response()
}

fn matching(state: &FakeState, keep: impl Fn(&FakeProduct) -> bool) -> Vec<Value> {
    state
        .products
        .iter()
        .filter(|(_, p)| keep(p))
        .map(|(id, p)| product_json(*id, p))
        .collect()
}

async fn list_products(State(state): State<Shared>, Query(params): Query<PageParams>) -> Response {
    let guard = lock(&state);
    page_of(matching(&guard, |_| true), &params)
}

async fn products_by_category(
    State(state): State<Shared>,
    UrlPath(category): UrlPath<String>,
    Query(params): Query<PageParams>,
) -> Response {
    let guard = lock(&state);
    page_of(
        matching(&guard, |p| p.category.eq_ignore_ascii_case(&category)),
        &params,
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterParams {
    category: Option<String>,
    brand: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
}

async fn filter_products(
    State(state): State<Shared>,
    Query(filter): Query<FilterParams>,
    Query(params): Query<PageParams>,
) -> Response {
    let guard = lock(&state);
    let matches = matching(&guard, |p| {
        filter
            .category
            .as_ref()
            .is_none_or(|c| p.category.eq_ignore_ascii_case(c))
            && filter
                .brand
                .as_ref()
                .is_none_or(|b| p.brand.eq_ignore_ascii_case(b))
            && filter.min_price.is_none_or(|min| p.price >= min)
            && filter.max_price.is_none_or(|max| p.price <= max)
    });
    page_of(matches, &params)
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    keyword: String,
}

async fn search_products(
    State(state): State<Shared>,
    Query(search): Query<SearchParams>,
    Query(params): Query<PageParams>,
) -> Response {
    let guard = lock(&state);
    let keyword = search.keyword.to_lowercase();
    page_of(
        matching(&guard, |p| p.name.to_lowercase().contains(&keyword)),
        &params,
    )
}
