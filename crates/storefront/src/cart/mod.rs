//! Cart state manager.
//!
//! Holds the signed-in customer's cart lines and keeps them in step with the
//! backend and with the authentication status.
//!
//! # Behavior
//!
//! - `fetch` loads the cart. It is skipped while unmounted, while another
//!   fetch is in flight, and while authentication is still resolving; it
//!   clears locally (no request) when nobody is signed in.
//! - `add` refetches after success. `update_quantity` and `remove` apply
//!   the change locally once the backend accepts it.
//! - `sync` refetches only on a sign-in/sign-out edge, or when signed in
//!   with an empty cart. `watch_auth` runs `sync` on every status change.
//! - After `unmount`, completions of in-flight calls write nothing.

mod error;
mod notify;

pub use error::CartError;
pub use notify::{Notice, NoticeLevel, Notifier, TracingNotifier};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use hardware_storefront_core::{CartItemId, ProductId, Quantity};

use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::error::add_breadcrumb;
use crate::models::CartItem;
use crate::models::cart::{self, AddToCartRequest, UpdateQuantityRequest};
use crate::storage::keys;

/// Snapshot of the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    pub items: Vec<CartItem>,
    pub loading: bool,
    /// Last fetch failure, cleared by the next fetch.
    pub error: Option<String>,
}

impl CartState {
    /// Σ unit price × quantity.
    #[must_use]
    pub fn total_amount(&self) -> Decimal {
        cart::total_amount(&self.items)
    }

    /// Σ quantity.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        cart::total_items(&self.items)
    }

    #[must_use]
    pub fn item(&self, id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Why a fetch did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Unmounted,
    InFlight,
    AuthPending,
}

/// Result of [`CartManager::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The cart was loaded with this many lines.
    Loaded(usize),
    /// Nobody is signed in; local items were cleared without a request.
    Cleared,
    Skipped(SkipReason),
    /// The request failed; see [`CartState::error`].
    Failed,
}

/// Cart state manager. Clones share state.
#[derive(Clone)]
pub struct CartManager {
    inner: Arc<CartInner>,
}

struct CartInner {
    api: ApiClient,
    state: watch::Sender<CartState>,
    mounted: watch::Sender<bool>,
    fetching: AtomicBool,
    /// Authenticated flag as of the last `sync`.
    last_authenticated: Mutex<Option<bool>>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager")
            .field("items", &self.inner.state.borrow().items.len())
            .field("mounted", &self.is_mounted())
            .finish_non_exhaustive()
    }
}

impl CartManager {
    /// A mounted manager that logs notices.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self::with_notifier(api, Arc::new(TracingNotifier))
    }

    #[must_use]
    pub fn with_notifier(api: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(CartState::default());
        let (mounted, _) = watch::channel(true);
        Self {
            inner: Arc::new(CartInner {
                api,
                state,
                mounted,
                fetching: AtomicBool::new(false),
                last_authenticated: Mutex::new(None),
                notifier,
            }),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Receive every future state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.inner.state.borrow().items.clone()
    }

    #[must_use]
    pub fn total_amount(&self) -> Decimal {
        self.inner.state.borrow().total_amount()
    }

    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.inner.state.borrow().total_items()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        *self.inner.mounted.borrow()
    }

    /// Whether a fetch is currently running.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.inner.fetching.load(Ordering::Acquire)
    }

    /// Tear the manager down. In-flight calls still complete but write
    /// nothing, and the auth watcher stops.
    pub fn unmount(&self) {
        self.inner.mounted.send_replace(false);
        debug!("Cart manager unmounted");
    }

    /// Load the cart from the backend.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> FetchOutcome {
        if !self.is_mounted() {
            return FetchOutcome::Skipped(SkipReason::Unmounted);
        }
        let status = self.inner.api.session().status();
        if !status.is_resolved() {
            debug!("Authentication pending, cart fetch deferred");
            return FetchOutcome::Skipped(SkipReason::AuthPending);
        }
        let Some(_guard) = FetchGuard::acquire(&self.inner.fetching) else {
            debug!("Cart fetch already in flight");
            return FetchOutcome::Skipped(SkipReason::InFlight);
        };

        let Some(owner) = status.user().map(|user| user.id.clone()) else {
            self.discard();
            return FetchOutcome::Cleared;
        };

        self.write(|state| {
            state.loading = true;
            state.error = None;
        });

        let result = match self.inner.api.send(ApiRequest::get("/cart")).await {
            Ok(response) => response.json_list::<CartItem>("cart"),
            Err(e) => Err(e),
        };

        // A sign-out or account switch while the request ran means this
        // response belongs to a session that no longer exists. The watcher's
        // own fetch was skipped because this one held the guard.
        let signed_in = self.inner.api.session().status();
        if signed_in.user().map(|user| &user.id) != Some(&owner) {
            debug!("Session changed during cart fetch, discarding response");
            self.discard();
            return FetchOutcome::Cleared;
        }

        match result {
            Ok(items) => {
                let count = items.len();
                self.write(|state| {
                    state.items = items;
                    state.loading = false;
                });
                FetchOutcome::Loaded(count)
            }
            Err(e) => {
                let message = if e.is_unauthorized() {
                    debug!(error = %e, "Cart fetch unauthorized");
                    None
                } else {
                    warn!(error = %e, "Cart fetch failed");
                    Some(e.to_string())
                };
                self.write(|state| {
                    state.loading = false;
                    if message.is_some() {
                        state.error = message;
                    }
                });
                FetchOutcome::Failed
            }
        }
    }

    /// Add `quantity` units of a product, then reload the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` without a request when nobody
    /// is signed in, `CartError::Api` if the backend refuses.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add(&self, product_id: &ProductId, quantity: Quantity) -> Result<(), CartError> {
        self.require_authenticated()?;
        let request = ApiRequest::post("/cart").json(&AddToCartRequest {
            product_id,
            quantity,
        })?;

        match self.inner.api.send(request).await {
            Ok(_) => {
                add_breadcrumb(
                    "cart",
                    "Added to cart",
                    Some(&[("product_id", product_id.as_str())]),
                );
                self.inner.notifier.notify(Notice::success("Added to cart"));
                self.fetch().await;
                Ok(())
            }
            Err(e) => Err(self.report(e, "Could not add item to cart")),
        }
    }

    /// Set a line's quantity. On success the local line is updated without
    /// a reload.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidQuantity` for `quantity < 1` (nothing sent)
    /// - `CartError::ExceedsStock` when the product snapshot has fewer units
    ///   (nothing sent)
    /// - `CartError::NotAuthenticated` without a session (nothing sent)
    /// - `CartError::Api` if the backend refuses
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn update_quantity(&self, item_id: &CartItemId, quantity: i64) -> Result<(), CartError> {
        let quantity = Quantity::new(quantity)?;
        self.require_authenticated()?;
        self.check_stock(item_id, quantity)?;

        let request = ApiRequest::put(item_path(item_id))
            .json(&UpdateQuantityRequest { quantity })?;
        match self.inner.api.send(request).await {
            Ok(_) => {
                self.write(|state| {
                    if let Some(item) = state.items.iter_mut().find(|item| &item.id == item_id) {
                        item.quantity = quantity;
                    }
                });
                Ok(())
            }
            Err(e) => Err(self.report(e, "Could not update quantity")),
        }
    }

    /// Remove a line. A 404 means the backend already agrees and counts as
    /// success; removing a line that is not held locally changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` without a session (nothing sent),
    /// `CartError::Api` if the backend refuses.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove(&self, item_id: &CartItemId) -> Result<(), CartError> {
        self.require_authenticated()?;

        match self.inner.api.send(ApiRequest::delete(item_path(item_id))).await {
            Ok(_) | Err(ApiError::NotFound(_)) => {
                self.write(|state| state.items.retain(|item| &item.id != item_id));
                add_breadcrumb("cart", "Removed from cart", Some(&[("item_id", item_id.as_str())]));
                Ok(())
            }
            Err(e) => Err(self.report(e, "Could not remove item")),
        }
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotAuthenticated` without a session (nothing sent),
    /// `CartError::Api` if the backend refuses.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CartError> {
        self.require_authenticated()?;

        match self.inner.api.send(ApiRequest::delete("/cart")).await {
            Ok(_) | Err(ApiError::NotFound(_)) => {
                self.write(|state| state.items.clear());
                Ok(())
            }
            Err(e) => Err(self.report(e, "Could not clear cart")),
        }
    }

    /// React to the current authentication status.
    ///
    /// Refetches on a sign-in or sign-out edge, or when signed in with an
    /// empty cart. Returns `None` when nothing was attempted.
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Option<FetchOutcome> {
        let status = self.inner.api.session().status();
        if !status.is_resolved() {
            return None;
        }
        let authenticated = status.is_authenticated();
        let previous = *self
            .inner
            .last_authenticated
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let edge = previous != Some(authenticated);
        let empty = self.inner.state.borrow().is_empty();
        if !edge && !(authenticated && empty) {
            return None;
        }

        let outcome = self.fetch().await;
        // A skipped fetch leaves the edge pending for the next status change.
        if !matches!(outcome, FetchOutcome::Skipped(_)) {
            self.inner
                .last_authenticated
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .replace(authenticated);
        }
        Some(outcome)
    }

    /// Run [`sync`](Self::sync) now and on every authentication status
    /// change until unmounted.
    #[must_use = "the watcher stops when the handle's task is aborted"]
    pub fn watch_auth(&self) -> JoinHandle<()> {
        let manager = self.clone();
        let mut status = self.inner.api.session().subscribe();
        let mut mounted = self.inner.mounted.subscribe();

        tokio::spawn(async move {
            status.borrow_and_update();
            manager.sync().await;

            loop {
                tokio::select! {
                    changed = status.changed() => {
                        if changed.is_err() || !manager.is_mounted() {
                            break;
                        }
                        manager.sync().await;
                    }
                    () = async {
                        let _ = mounted.wait_for(|mounted| !*mounted).await;
                    } => break,
                }
            }
            debug!("Cart auth watcher stopped");
        })
    }

    fn require_authenticated(&self) -> Result<(), CartError> {
        if self.inner.api.session().status().is_authenticated() {
            Ok(())
        } else {
            Err(CartError::NotAuthenticated)
        }
    }

    fn check_stock(&self, item_id: &CartItemId, quantity: Quantity) -> Result<(), CartError> {
        let state = self.inner.state.borrow();
        let Some(item) = state.item(item_id) else {
            return Ok(());
        };
        // Zero means the snapshot carries no stock figure; the backend decides.
        let available = item.product.stock;
        if available > 0 && i64::from(quantity.get()) > available {
            return Err(CartError::ExceedsStock {
                requested: quantity.get(),
                available,
            });
        }
        Ok(())
    }

    /// Notify the user of a failed mutation unless the client already dealt
    /// with it as an authorization failure.
    fn report(&self, error: ApiError, message: &str) -> CartError {
        if error.is_unauthorized() {
            debug!(error = %error, "Cart request unauthorized");
        } else {
            warn!(error = %error, "{message}");
            self.inner.notifier.notify(Notice::error(message));
        }
        CartError::Api(error)
    }

    /// Drop every line, as after a sign-out.
    fn discard(&self) {
        self.write(|state| {
            state.items.clear();
            state.loading = false;
            state.error = None;
        });
    }

    /// Apply `update` if still mounted, then mirror the unit count into
    /// storage.
    fn write(&self, update: impl FnOnce(&mut CartState)) -> bool {
        if !self.is_mounted() {
            debug!("Cart manager unmounted, dropping state update");
            return false;
        }
        self.inner.state.send_modify(update);

        let count = self.total_items();
        let storage = self.inner.api.session().storage();
        if count == 0 {
            storage.remove(keys::CART_COUNT);
        } else {
            storage.set(keys::CART_COUNT, &count.to_string());
        }
        true
    }
}

fn item_path(item_id: &CartItemId) -> String {
    format!("/cart/{}", urlencoding::encode(item_id.as_str()))
}

/// Holds the fetching flag; lowered on drop.
struct FetchGuard<'a>(&'a AtomicBool);

impl<'a> FetchGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;
    use crate::api::HeadlessNavigator;
    use crate::config::StorefrontConfig;
    use crate::models::{Product, User};
    use crate::session::{AuthStatus, SessionStore};
    use crate::storage::MemoryStore;
    use hardware_storefront_core::{Email, UserId};

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn offline_cart() -> CartManager {
        let config = StorefrontConfig::new(Url::parse("http://127.0.0.1:9").unwrap());
        let session = Arc::new(SessionStore::restore(Arc::new(MemoryStore::new())));
        let api = ApiClient::new(&config, session, Arc::new(HeadlessNavigator::at("/"))).unwrap();
        CartManager::new(api)
    }

    fn sign_in(cart: &CartManager) {
        cart.inner.api.session().establish(User {
            id: UserId::new("u1"),
            email: Email::parse("pat@hardware.example").unwrap(),
            name: "Pat".to_string(),
            phone: None,
            address: None,
        });
    }

    fn item(id: &str, price: Decimal, quantity: i64, stock: i64) -> CartItem {
        CartItem {
            id: CartItemId::new(id),
            user_id: UserId::new("u1"),
            product_id: ProductId::new(format!("p-{id}")),
            quantity: Quantity::new(quantity).unwrap(),
            product: Product {
                id: ProductId::new(format!("p-{id}")),
                name: format!("Product {id}"),
                slug: id.to_string(),
                description: None,
                price,
                stock,
                images: Vec::new(),
                category_id: None,
                brand: None,
            },
        }
    }

    #[test]
    fn test_totals() {
        let state = CartState {
            items: vec![
                item("a", dec(100), 2, 10),
                item("b", dec(50), 1, 10),
            ],
            ..CartState::default()
        };
        assert_eq!(state.total_amount(), dec(250));
        assert_eq!(state.total_items(), 3);
        assert_eq!(CartState::default().total_amount(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_fetch_clears_locally_when_signed_out() {
        let cart = offline_cart();
        cart.inner.state.send_modify(|s| s.items.push(item("a", dec(5), 1, 1)));

        assert_eq!(cart.fetch().await, FetchOutcome::Cleared);
        assert!(cart.state().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_waits_for_auth_resolution() {
        let cart = offline_cart();
        cart.inner.api.session().set_status(AuthStatus::Authenticating);
        assert_eq!(
            cart.fetch().await,
            FetchOutcome::Skipped(SkipReason::AuthPending)
        );
        assert_eq!(cart.sync().await, None);
    }

    #[tokio::test]
    async fn test_fetch_is_not_reentrant() {
        let cart = offline_cart();
        let _held = FetchGuard::acquire(&cart.inner.fetching).unwrap();
        assert_eq!(cart.fetch().await, FetchOutcome::Skipped(SkipReason::InFlight));
    }

    #[tokio::test]
    async fn test_unmounted_manager_writes_nothing() {
        let cart = offline_cart();
        cart.inner.state.send_modify(|s| s.items.push(item("a", dec(5), 1, 1)));
        cart.unmount();

        assert_eq!(cart.fetch().await, FetchOutcome::Skipped(SkipReason::Unmounted));
        assert!(!cart.write(|s| s.items.clear()));
        assert_eq!(cart.state().items.len(), 1);
    }

    #[tokio::test]
    async fn test_add_requires_sign_in() {
        let cart = offline_cart();
        let before = cart.state();
        let err = cart
            .add(&ProductId::new("p1"), Quantity::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::NotAuthenticated));
        assert_eq!(cart.state(), before);
    }

    #[tokio::test]
    async fn test_update_quantity_validates_before_sending() {
        let cart = offline_cart();
        sign_in(&cart);
        cart.inner.state.send_modify(|s| s.items.push(item("abc", dec(5), 1, 4)));

        assert!(matches!(
            cart.update_quantity(&CartItemId::new("abc"), 0).await,
            Err(CartError::InvalidQuantity(_))
        ));
        assert!(matches!(
            cart.update_quantity(&CartItemId::new("abc"), 5).await,
            Err(CartError::ExceedsStock {
                requested: 5,
                available: 4
            })
        ));
        assert_eq!(cart.state().items[0].quantity.get(), 1);
    }

    #[tokio::test]
    async fn test_sync_fetches_only_on_edges() {
        let cart = offline_cart();
        // First observation of signed-out is an edge: local clear, no request.
        assert_eq!(cart.sync().await, Some(FetchOutcome::Cleared));
        assert_eq!(cart.sync().await, None);
    }

    #[tokio::test]
    async fn test_skipped_sync_keeps_edge_pending() {
        let cart = offline_cart();
        cart.inner.fetching.store(true, Ordering::Release);
        assert_eq!(
            cart.sync().await,
            Some(FetchOutcome::Skipped(SkipReason::InFlight))
        );

        cart.inner.fetching.store(false, Ordering::Release);
        assert_eq!(cart.sync().await, Some(FetchOutcome::Cleared));
        assert_eq!(cart.sync().await, None);
    }

    #[test]
    fn test_item_path_encodes_id() {
        assert_eq!(item_path(&CartItemId::new("a b/c")), "/cart/a%20b%2Fc");
    }
}
