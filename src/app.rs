//! Composition root wiring the client together.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::api::ApiClient;
use crate::auth::SessionManager;
use crate::cache::CacheStore;
use crate::cart::CartEngine;
use crate::config::Config;
use crate::storage::LocalStore;

/// The assembled storefront client: one shared cache, one API client, one
/// session manager, and one cart engine, all reachable from here.
pub struct Storefront {
    pub config: Config,
    pub api: Arc<ApiClient>,
    pub session: Arc<SessionManager>,
    pub cart: Arc<CartEngine>,
}

impl Storefront {
    /// Assemble the client from configuration. Nothing touches the
    /// network yet; call [`Storefront::startup`] for that.
    pub fn new(config: Config) -> Result<Self> {
        let data_dir = config.data_dir().context("Failed to resolve data directory")?;
        let store = Arc::new(LocalStore::new(data_dir));
        let cache = Arc::new(CacheStore::new());
        let api = Arc::new(
            ApiClient::new(&config, cache).context("Failed to build API client")?,
        );
        let session = Arc::new(SessionManager::new(Arc::clone(&api), Arc::clone(&store)));
        let cart = Arc::new(CartEngine::new(
            Arc::clone(&api),
            Arc::clone(&session),
            store,
        ));

        Ok(Self {
            config,
            api,
            session,
            cart,
        })
    }

    /// Restore a persisted session and, when one exists, pull the server
    /// cart. Cart refresh failure is not fatal at startup; the local cart
    /// keeps working.
    pub async fn startup(&self) {
        if self.session.restore().await {
            if let Err(e) = self.cart.refresh().await {
                warn!(error = %e, "Cart refresh failed at startup");
            }
        }
    }

    /// Sign in and adopt the server cart. The server cart wins over any
    /// anonymous lines accumulated before signing in; the profile lands
    /// on the session manager once its fetch resolves.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        self.session.login(email, password).await?;
        if let Err(e) = self.cart.refresh().await {
            warn!(error = %e, "Cart refresh failed after login");
        }
        Ok(())
    }

    /// Sign out: the session manager drops the token and all caches, then
    /// the local cart is emptied so nothing of the account lingers.
    pub async fn logout(&self) {
        self.session.logout().await;
        self.cart.clear_local();
    }
}
