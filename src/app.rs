use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::authz::{AuthzMode, GrantStore, PermissionResolver};
use crate::category::{CategorySource, CategoryTree};
use crate::clock::{Clock, SystemClock};
use crate::codes::{CodeRegistry, CodeSource};
use crate::db::SqliteStore;
use crate::errors::AppError;
use crate::events::{init_event_bus, publish_tree_changed, start_cache_listener, EventBus, TreeChanged, TreeKind};
use crate::jwt::JwtConfig;
use crate::menu::{MenuSource, MenuVisibilityEngine};
use crate::models::category::Category;
use crate::models::menu::Menu;
use crate::routes::{admin, authz, categories, codes, health, menus};
use crate::tree::{TreeCache, TreeNode};

pub type MenuEngine = MenuVisibilityEngine<dyn GrantStore, dyn MenuSource>;

/// How the menu and category indexes are cached between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub max_age: Option<Duration>,
}

impl CacheSettings {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            max_age: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_age: None,
        }
    }

    /// `MENU_CACHE` (`off`|`false`|`0` disables) and `TREE_CACHE_MAX_AGE_SECS`.
    pub fn from_env() -> Self {
        let enabled = !matches!(
            std::env::var("MENU_CACHE").unwrap_or_default().trim().to_lowercase().as_str(),
            "off" | "false" | "0"
        );
        let max_age = std::env::var("TREE_CACHE_MAX_AGE_SECS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        Self { enabled, max_age }
    }

    fn build<N: TreeNode>(&self) -> TreeCache<N> {
        let cache = TreeCache::new(self.enabled);
        match self.max_age {
            Some(max_age) => cache.with_max_age(max_age),
            None => cache,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub authz_mode: AuthzMode,
    pub clock: Arc<dyn Clock>,
    pub resolver: PermissionResolver<dyn GrantStore>,
    pub menus: Arc<MenuEngine>,
    pub categories: Arc<CategoryTree<dyn CategorySource>>,
    pub codes: Arc<CodeRegistry<dyn CodeSource>>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, authz_mode: AuthzMode, cache: CacheSettings) -> Self {
        let store = Arc::new(SqliteStore::new(pool.clone()));
        let grants: Arc<dyn GrantStore> = store.clone();
        let menu_source: Arc<dyn MenuSource> = store.clone();
        let category_source: Arc<dyn CategorySource> = store.clone();
        let code_source: Arc<dyn CodeSource> = store;

        let resolver = PermissionResolver::new(grants);
        let menu_cache = Arc::new(cache.build::<Menu>());
        let category_cache = Arc::new(cache.build::<Category>());
        let (event_bus, _) = init_event_bus();

        Self {
            pool,
            jwt: Arc::new(jwt),
            authz_mode,
            clock: Arc::new(SystemClock),
            menus: Arc::new(MenuVisibilityEngine::new(resolver.clone(), menu_source, menu_cache)),
            resolver,
            categories: Arc::new(CategoryTree::new(category_source, category_cache)),
            codes: Arc::new(CodeRegistry::new(code_source)),
            event_bus,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Subscribes the tree caches to change events on the bus.
    pub fn spawn_cache_listener(&self) {
        let rx = self.event_bus.subscribe();
        tokio::spawn(start_cache_listener(
            rx,
            Arc::clone(self.menus.cache()),
            Arc::clone(self.categories.cache()),
        ));
    }

    /// Drops the cached index of `change.kind` now and announces the change to
    /// every other subscriber on the bus.
    pub async fn invalidate_tree(&self, actor_id: Option<Uuid>, change: TreeChanged) {
        match change.kind {
            TreeKind::Menu => self.menus.cache().invalidate().await,
            TreeKind::Category => self.categories.cache().invalidate().await,
        }
        publish_tree_changed(&self.event_bus, actor_id, change.kind, change.action, change.node_id);
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let cache = CacheSettings::from_env();
    let state = AppState::new(pool, jwt_config, AuthzMode::from_env(), cache);
    state.spawn_cache_listener();

    tracing::info!(
        authz_mode = ?state.authz_mode,
        cache_trees = cache.enabled,
        cache_max_age = ?cache.max_age,
        "application state ready"
    );
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let authz_routes = Router::new()
        .route("/programs/:program_id", get(authz::resolve_program))
        .route("/effective", get(authz::effective_authorities));

    let menu_routes = Router::new()
        .route("/visible", get(menus::visible_menus))
        .route("/favorites", get(menus::visible_favorites));

    let category_routes = Router::new()
        .route("/", get(categories::active_tree))
        .route("/:id", get(categories::active_subtree))
        .route("/:id/path", get(categories::path));

    let code_routes = Router::new()
        .route("/", get(codes::active_groups))
        .route("/:group_code", get(codes::active_codes))
        .route("/:group_code/:code", get(codes::resolve_code));

    let admin_routes = Router::new().route("/trees/invalidate", post(admin::invalidate_tree));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/admin", admin_routes)
        .nest("/authz", authz_routes)
        .nest("/menus", menu_routes)
        .nest("/categories", category_routes)
        .nest("/codes", code_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
