// src/routes.rs

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{HeaderName, Method, header},
    middleware,
    routing::{MethodRouter, get, post, put},
};
use tower_governor::{
    GovernorLayer,
    governor::GovernorConfigBuilder,
    key_extractor::{KeyExtractor, PeerIpKeyExtractor, SmartIpKeyExtractor},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::{Config, SubmitRateLimit},
    handlers::{admin, api, auth, public},
    state::AppState,
    utils::{
        api_token::{API_TOKEN_HEADER, api_token_middleware},
        jwt::admin_middleware,
    },
};

/// Assembles the main application router.
///
/// * `/surveys` - respondent pages (address-based identity).
/// * `/api` - JSON API behind the static API token.
/// * `/admin` - login plus token-protected administration.
///
/// The router needs `ConnectInfo<SocketAddr>`, so serve it with
/// `into_make_service_with_connect_info`.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(API_TOKEN_HEADER),
        ]);

    let config = &state.config;

    let public_routes = Router::new()
        .route("/", get(public::index))
        .route(
            "/{id}",
            get(public::show_survey).merge(rate_limited(post(public::submit_form), config)),
        );

    let api_routes = Router::new()
        .route("/surveys", get(api::list_surveys))
        .route("/surveys/{id}", get(api::get_survey))
        .route(
            "/surveys/{id}/responses",
            rate_limited(post(api::submit_response), config),
        )
        .route("/surveys/{id}/results", get(api::survey_results))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_token_middleware,
        ));

    let admin_routes = Router::new()
        .route("/me", get(admin::whoami))
        .route(
            "/surveys",
            get(admin::list_surveys).post(admin::create_survey),
        )
        .route(
            "/surveys/{id}",
            get(admin::get_survey)
                .put(admin::update_survey)
                .delete(admin::delete_survey),
        )
        .route(
            "/surveys/{id}/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route("/surveys/{id}/results", get(admin::survey_results))
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        .route("/questions/{id}/options", post(admin::create_option))
        .route(
            "/options/{id}",
            put(admin::update_option).delete(admin::delete_option),
        )
        .layer(middleware::from_fn_with_state(state.clone(), admin_middleware));

    let admin = Router::new()
        .route("/login", post(auth::login))
        .merge(admin_routes);

    Router::new()
        .nest("/surveys", public_routes)
        .nest("/api", api_routes)
        .nest("/admin", admin)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// How often rate-limit state of quiet clients is dropped.
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Wraps a submission route in the configured per-client rate limit.
///
/// Clients are keyed by socket peer, or by forwarded address when
/// `TRUST_FORWARDED_FOR` is set.
fn rate_limited(route: MethodRouter<AppState>, config: &Config) -> MethodRouter<AppState> {
    let Some(limit) = config.submit_rate_limit else {
        return route;
    };

    if config.trust_forwarded_for {
        with_governor(route, SmartIpKeyExtractor, limit)
    } else {
        with_governor(route, PeerIpKeyExtractor, limit)
    }
}

fn with_governor<K>(
    route: MethodRouter<AppState>,
    key_extractor: K,
    limit: SubmitRateLimit,
) -> MethodRouter<AppState>
where
    K: KeyExtractor + Send + Sync + 'static,
    K::Key: Send + Sync + 'static,
{
    let Some(governor_conf) = GovernorConfigBuilder::default()
        .key_extractor(key_extractor)
        .per_second(limit.replenish_seconds)
        .burst_size(limit.burst)
        .finish()
    else {
        tracing::warn!("Invalid submission rate limit {:?}; not applied", limit);
        return route;
    };

    let governor_conf = Arc::new(governor_conf);
    let limiter = governor_conf.limiter().clone();
    std::thread::spawn(move || {
        loop {
            std::thread::sleep(LIMITER_CLEANUP_INTERVAL);
            limiter.retain_recent();
        }
    });

    route.layer(GovernorLayer::new(governor_conf))
}
