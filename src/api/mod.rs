use anyhow::Context;
use axum::{
    Router,
    extract::{
        Json, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::core::{
    AllocationStrategy, DEFAULT_INFLATION_RATE, FinancialProfile, ProjectionError,
    ProjectionResult, WealthPoint, project_breakdown, project_from_breakdown, wealth_path,
};
use crate::recommend::{
    RecommendationDetails, RecommendationProvider, RecommendationRequest,
    build_recommendation_provider,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

const DEFAULT_CURRENT_AGE: u32 = 30;
const DEFAULT_RETIREMENT_AGE: u32 = 50;
const DEFAULT_CURRENT_WEALTH: f64 = 50_000.0;
const DEFAULT_MONTHLY_EXPENSES: f64 = 3_000.0;

/// Body of `POST /api/calculate` (or the query string of `GET`). Missing
/// profile fields take the dashboard's initial slider values.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalculatePayload {
    pub current_age: Option<u32>,
    pub retirement_age: Option<u32>,
    pub current_wealth: Option<f64>,
    pub monthly_expenses: Option<f64>,
    pub inflation_rate: Option<f64>,
    pub allocation_strategy: Option<AllocationStrategy>,
    pub recommendations: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ApiOptions {
    allocation_strategy: AllocationStrategy,
    include_recommendations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ApiRequest {
    profile: FinancialProfile,
    options: ApiOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateResponse {
    #[serde(flatten)]
    pub projection: ProjectionResult,
    pub wealth_projection: Vec<WealthPoint>,
    #[serde(flatten)]
    pub recommendation: Option<RecommendationDetails>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    recommender: Arc<dyn RecommendationProvider>,
}

impl AppState {
    pub fn new(config: AppConfig, recommender: Arc<dyn RecommendationProvider>) -> Self {
        Self {
            config: Arc::new(config),
            recommender,
        }
    }

    /// Builds the recommendation provider the config asks for.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let recommender = build_recommendation_provider(
            &config.recommendations,
            &config.assumptions.wealth_tax,
        )?;
        Ok(Self::new(config, recommender))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/calculate",
            get(calculate_get_handler).post(calculate_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(state: AppState) -> anyhow::Result<()> {
    let server = &state.config().server;
    let addr: SocketAddr = format!("{}:{}", server.bind, server.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", server.bind, server.port))?;
    let port = server.port;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(
        %addr,
        recommender = state.recommender.name(),
        "FIRE HTTP API listening"
    );
    info!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, router(state))
        .await
        .context("HTTP server terminated")
}

/// Runs the projection and, when requested, attaches a recommendation.
/// Recommendation failures never surface here; providers fall back.
pub async fn calculate(
    state: &AppState,
    payload: CalculatePayload,
) -> Result<CalculateResponse, ProjectionError> {
    let request = api_request_from_payload(payload, state.config());
    let assumptions = &state.config().assumptions;

    let breakdown = project_breakdown(&request.profile, assumptions)?;
    let mut projection = project_from_breakdown(&breakdown, request.options.allocation_strategy);
    let wealth_projection = wealth_path(&breakdown, projection.monthly_savings as f64);

    let mut recommendation = None;
    if request.options.include_recommendations {
        let recommendation_request = RecommendationRequest {
            profile: request.profile,
            projection,
            as_of_year: chrono::Local::now().year(),
        };
        match state.recommender.recommend(&recommendation_request).await {
            Ok(found) => {
                projection.allocation = found.allocation;
                recommendation = Some(found.details);
            }
            Err(e) => warn!(
                provider = state.recommender.name(),
                error = %format!("{e:#}"),
                "Recommendation unavailable; returning projection only"
            ),
        }
    }

    Ok(CalculateResponse {
        projection,
        wealth_projection,
        recommendation,
    })
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn calculate_get_handler(
    State(state): State<AppState>,
    payload: Result<Query<CalculatePayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => calculate_handler_impl(state, payload).await,
        Err(rejection) => rejected_payload(&rejection.body_text()),
    }
}

async fn calculate_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<CalculatePayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => calculate_handler_impl(state, payload).await,
        Err(rejection) => rejected_payload(&rejection.body_text()),
    }
}

fn rejected_payload(reason: &str) -> Response {
    warn!(error = %reason, "Rejected malformed calculation payload");
    error_response(
        StatusCode::BAD_REQUEST,
        &format!("Invalid API payload: {reason}"),
    )
}

async fn calculate_handler_impl(state: AppState, payload: CalculatePayload) -> Response {
    match calculate(&state, payload).await {
        Ok(response) => {
            info!(
                target_nest_egg = response.projection.target_nest_egg,
                monthly_savings = response.projection.monthly_savings,
                with_recommendation = response.recommendation.is_some(),
                "Calculated projection"
            );
            json_response(StatusCode::OK, response)
        }
        Err(e) => {
            warn!(error = %e, "Rejected calculation request");
            error_response(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str, config: &AppConfig) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<CalculatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    Ok(api_request_from_payload(payload, config))
}

/// Fills absent fields from the dashboard defaults and the config. Domain
/// checks happen once, inside the projection.
fn api_request_from_payload(payload: CalculatePayload, config: &AppConfig) -> ApiRequest {
    let profile = FinancialProfile {
        current_age: payload.current_age.unwrap_or(DEFAULT_CURRENT_AGE),
        retirement_age: payload.retirement_age.unwrap_or(DEFAULT_RETIREMENT_AGE),
        current_wealth: payload.current_wealth.unwrap_or(DEFAULT_CURRENT_WEALTH),
        monthly_expenses: payload.monthly_expenses.unwrap_or(DEFAULT_MONTHLY_EXPENSES),
        inflation_rate: payload.inflation_rate.unwrap_or(DEFAULT_INFLATION_RATE),
    };

    let options = ApiOptions {
        allocation_strategy: payload
            .allocation_strategy
            .unwrap_or(config.allocation_strategy),
        include_recommendations: payload
            .recommendations
            .unwrap_or(config.recommendations.include_by_default),
    };
    ApiRequest { profile, options }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FIXED_ALLOCATION, WealthTaxRules, age_bucketed_allocation};
    use crate::recommend::StaticRecommendationProvider;

    fn static_state(config: AppConfig) -> AppState {
        AppState::new(
            config,
            Arc::new(StaticRecommendationProvider::new(&WealthTaxRules::default())),
        )
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "currentAge": 31,
          "retirementAge": 55,
          "currentWealth": 120000,
          "monthlyExpenses": 4200,
          "inflationRate": 0.025,
          "allocationStrategy": "age-bucketed",
          "recommendations": true
        }"#;
        let request = api_request_from_json(json, &AppConfig::default()).expect("json parses");

        assert_eq!(request.profile.current_age, 31);
        assert_eq!(request.profile.retirement_age, 55);
        assert_eq!(request.profile.current_wealth, 120_000.0);
        assert_eq!(request.profile.monthly_expenses, 4_200.0);
        assert_eq!(request.profile.inflation_rate, 0.025);
        assert_eq!(
            request.options.allocation_strategy,
            AllocationStrategy::AgeBucketed
        );
        assert!(request.options.include_recommendations);
    }

    #[test]
    fn api_request_defaults_match_dashboard() {
        let request = api_request_from_json("{}", &AppConfig::default()).expect("json parses");
        assert_eq!(
            request.profile,
            FinancialProfile {
                current_age: 30,
                retirement_age: 50,
                current_wealth: 50_000.0,
                monthly_expenses: 3_000.0,
                inflation_rate: 0.02,
            }
        );
        assert_eq!(request.options.allocation_strategy, AllocationStrategy::Fixed);
        assert!(!request.options.include_recommendations);
    }

    #[test]
    fn api_request_options_fall_back_to_config() {
        let mut config = AppConfig::default();
        config.allocation_strategy = AllocationStrategy::AgeBucketed;
        config.recommendations.include_by_default = true;

        let request = api_request_from_json("{}", &config).expect("json parses");
        assert_eq!(
            request.options.allocation_strategy,
            AllocationStrategy::AgeBucketed
        );
        assert!(request.options.include_recommendations);

        let request =
            api_request_from_json(r#"{"recommendations": false}"#, &config).expect("parses");
        assert!(!request.options.include_recommendations);
    }

    #[tokio::test]
    async fn calculate_rejects_retirement_before_current_age() {
        let state = static_state(AppConfig::default());
        let payload = CalculatePayload {
            current_age: Some(40),
            retirement_age: Some(35),
            ..CalculatePayload::default()
        };
        let err = calculate(&state, payload).await.expect_err("must reject");
        assert!(err.to_string().contains("retirementAge"));
    }

    #[tokio::test]
    async fn calculate_rejects_overflowing_projection() {
        let state = static_state(AppConfig::default());
        let payload = CalculatePayload {
            current_age: Some(20),
            retirement_age: Some(120),
            inflation_rate: Some(10.0),
            ..CalculatePayload::default()
        };
        let err = calculate(&state, payload).await.expect_err("must reject");
        assert!(matches!(err, ProjectionError::AmountOutOfRange { .. }));
    }

    #[test]
    fn api_request_rejects_negative_ages_at_parse_time() {
        let err = api_request_from_json(r#"{"currentAge": -3}"#, &AppConfig::default())
            .expect_err("must reject");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[tokio::test]
    async fn calculate_response_serialization_contains_expected_fields() {
        let state = static_state(AppConfig::default());
        let response = calculate(&state, CalculatePayload::default())
            .await
            .expect("valid defaults");
        let json = serde_json::to_value(&response).expect("response should serialize");

        for key in [
            "monthlyNeed",
            "targetNestEgg",
            "gapToFill",
            "monthlySavings",
            "estimatedBox3Tax",
            "allocation",
            "wealthProjection",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("personalizedStrategy").is_none());
        assert_eq!(json["monthlyNeed"], 4_458);
        assert_eq!(json["allocation"]["realEstate"], 5);
        assert_eq!(
            json["wealthProjection"].as_array().expect("array").len(),
            21
        );
        assert_eq!(response.projection.allocation, FIXED_ALLOCATION);
    }

    #[tokio::test]
    async fn calculate_with_recommendations_uses_recommended_allocation() {
        let state = static_state(AppConfig::default());
        let payload = CalculatePayload {
            current_age: Some(28),
            recommendations: Some(true),
            ..CalculatePayload::default()
        };
        let response = calculate(&state, payload).await.expect("valid");
        let json = serde_json::to_value(&response).expect("serializes");

        assert_eq!(response.projection.allocation, age_bucketed_allocation(28));
        for key in [
            "allocationRationale",
            "personalizedStrategy",
            "dutchProducts",
            "wealthJourney",
            "taxOptimization",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        let raw = serde_json::to_string(&response).expect("serializes");
        assert_eq!(raw.matches("\"allocation\":").count(), 1);
    }

    #[tokio::test]
    async fn calculate_is_idempotent() {
        let state = static_state(AppConfig::default());
        let first = calculate(&state, CalculatePayload::default()).await.expect("valid");
        let second = calculate(&state, CalculatePayload::default()).await.expect("valid");
        assert_eq!(first.projection, second.projection);
        assert_eq!(first.wealth_projection, second.wealth_projection);
    }

    #[tokio::test]
    async fn calculate_honours_configured_assumptions() {
        let mut config = AppConfig::default();
        config.assumptions.withdrawal_rate = 0.04;
        let state = static_state(config);

        let response = calculate(&state, CalculatePayload::default()).await.expect("valid");
        let default_state = static_state(AppConfig::default());
        let default_response = calculate(&default_state, CalculatePayload::default())
            .await
            .expect("valid");
        assert!(response.projection.target_nest_egg < default_response.projection.target_nest_egg);
    }
}
