use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use acera_core::analysis::aggregator::Aggregator;
use acera_core::analysis::persona::Persona;
use acera_core::analysis::MarketSnapshot;
use acera_core::config::ConfiguredServices;
use acera_core::domain::analysis::{ConsensusReport, DataQuality};
use acera_core::domain::market::{CompanyProfile, Quote};
use acera_core::domain::news::{NewsItem, SentimentBreakdown};
use acera_core::domain::normalize_symbol;
use acera_core::news::{self, ComprehensiveNews};
use acera_core::report::{RenderedReport, ReportBuilder, ReportFormat};

use crate::error::ApiError;

const STOCK_NEWS_LIMIT: (usize, usize) = (20, 50);
const SECTOR_NEWS_LIMIT: (usize, usize) = (15, 30);
const EARNINGS_NEWS_LIMIT: (usize, usize) = (20, 50);
const MARKET_NEWS_LIMIT: (usize, usize) = (15, 30);
const DEFAULT_REPORT_TYPE: &str = "pdf";

#[derive(Clone)]
pub struct AppState {
    pub reports: ReportBuilder,
    pub services: ConfiguredServices,
}

impl AppState {
    fn aggregator(&self) -> &Aggregator {
        self.reports.aggregator()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/health", get(health))
        .route("/stocks/:symbol", get(get_stock))
        .route("/quote/:symbol", get(get_quote))
        .route("/news/stock/:symbol", get(get_stock_news))
        .route("/news/sector/:sector", get(get_sector_news))
        .route("/news/earnings", get(get_earnings_news))
        .route("/news/market", get(get_market_news))
        .route("/news/comprehensive/:symbol", get(get_comprehensive_news))
        .route("/ai-analyst/analysts", get(list_analysts))
        .route("/ai-analyst/analysis/quick/:symbol", get(quick_analysis))
        .route("/ai-analyst/reports/generate", post(generate_report))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn parse_symbol(raw: &str) -> Result<String, ApiError> {
    let symbol = normalize_symbol(raw);
    if symbol.is_empty() {
        return Err(ApiError::bad_request("symbol is required"));
    }
    Ok(symbol)
}

fn resolve_limit(requested: Option<usize>, (default, max): (usize, usize)) -> Result<usize, ApiError> {
    match requested {
        None => Ok(default),
        Some(limit) if (1..=max).contains(&limit) => Ok(limit),
        Some(limit) => Err(ApiError::bad_request(format!(
            "limit must be between 1 and {max}, got {limit}"
        ))),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    services: ConfiguredServices,
    timestamp: DateTime<Utc>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        services: state.services,
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Serialize)]
struct StockResponse {
    symbol: String,
    quote: Quote,
    profile: CompanyProfile,
    data_quality: DataQuality,
}

async fn get_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<StockResponse>, ApiError> {
    let symbol = parse_symbol(&symbol)?;
    let market = state.aggregator().market();
    let (quote, profile) = tokio::join!(
        market.get_quote(&symbol),
        market.get_company_overview(&symbol)
    );

    Ok(Json(StockResponse {
        data_quality: DataQuality::from_liveness(&[
            quote.source.is_live(),
            profile.source.is_live(),
        ]),
        symbol,
        quote,
        profile,
    }))
}

async fn get_quote(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Quote>, ApiError> {
    let symbol = parse_symbol(&symbol)?;
    Ok(Json(state.aggregator().market().get_quote(&symbol).await))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EarningsQuery {
    symbol: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ComprehensiveQuery {
    #[serde(default = "enabled")]
    include_sector: bool,
    #[serde(default = "enabled")]
    include_earnings: bool,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct NewsResponse {
    subject: Option<String>,
    count: usize,
    sentiment: SentimentBreakdown,
    news: Vec<NewsItem>,
}

impl NewsResponse {
    fn new(subject: Option<String>, news: Vec<NewsItem>) -> Self {
        Self {
            subject,
            count: news.len(),
            sentiment: SentimentBreakdown::from_items(&news),
            news,
        }
    }
}

async fn get_stock_news(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<NewsResponse>, ApiError> {
    let Query(query) = query?;
    let symbol = parse_symbol(&symbol)?;
    let limit = resolve_limit(query.limit, STOCK_NEWS_LIMIT)?;
    let news = state.aggregator().news().get_stock_news(&symbol, limit).await;
    Ok(Json(NewsResponse::new(Some(symbol), news)))
}

async fn get_sector_news(
    State(state): State<AppState>,
    Path(sector): Path<String>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<NewsResponse>, ApiError> {
    let Query(query) = query?;
    let sector = sector.trim().to_string();
    if sector.is_empty() {
        return Err(ApiError::bad_request("sector is required"));
    }
    let limit = resolve_limit(query.limit, SECTOR_NEWS_LIMIT)?;
    let news = state.aggregator().news().get_sector_news(&sector, limit).await;
    Ok(Json(NewsResponse::new(Some(sector), news)))
}

async fn get_earnings_news(
    State(state): State<AppState>,
    query: Result<Query<EarningsQuery>, QueryRejection>,
) -> Result<Json<NewsResponse>, ApiError> {
    let Query(query) = query?;
    let symbol = match query.symbol.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_symbol(raw)?),
        _ => None,
    };
    let limit = resolve_limit(query.limit, EARNINGS_NEWS_LIMIT)?;
    let news = state
        .aggregator()
        .news()
        .get_earnings_news(symbol.as_deref(), limit)
        .await;
    Ok(Json(NewsResponse::new(symbol, news)))
}

async fn get_market_news(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<NewsResponse>, ApiError> {
    let Query(query) = query?;
    let limit = resolve_limit(query.limit, MARKET_NEWS_LIMIT)?;
    let news = state.aggregator().news().get_market_news(limit).await;
    Ok(Json(NewsResponse::new(None, news)))
}

async fn get_comprehensive_news(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    query: Result<Query<ComprehensiveQuery>, QueryRejection>,
) -> Result<Json<ComprehensiveNews>, ApiError> {
    let Query(query) = query?;
    let symbol = parse_symbol(&symbol)?;
    let aggregator = state.aggregator();
    let feed = news::comprehensive(
        aggregator.market().as_ref(),
        aggregator.news().as_ref(),
        &symbol,
        query.include_sector,
        query.include_earnings,
    )
    .await;
    Ok(Json(feed))
}

async fn list_analysts(State(state): State<AppState>) -> Json<Vec<Persona>> {
    Json(state.aggregator().personas().cloned().collect())
}

#[derive(Debug, Serialize)]
struct QuickAnalysisResponse {
    #[serde(flatten)]
    market: MarketSnapshot,
    consensus: ConsensusReport,
    data_quality: DataQuality,
}

async fn quick_analysis(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<QuickAnalysisResponse>, ApiError> {
    let symbol = parse_symbol(&symbol)?;
    let aggregator = state.aggregator();
    let snapshot = aggregator.fetch_snapshot(&symbol).await;
    let consensus = aggregator.aggregate_snapshot(&snapshot).await;

    Ok(Json(QuickAnalysisResponse {
        data_quality: snapshot.data_quality(),
        market: snapshot,
        consensus,
    }))
}

#[derive(Debug, Deserialize)]
struct GenerateReportRequest {
    #[serde(default)]
    symbol: String,
    #[serde(rename = "type")]
    report_type: Option<String>,
}

async fn generate_report(
    State(state): State<AppState>,
    request: Result<Json<GenerateReportRequest>, JsonRejection>,
) -> Result<Json<RenderedReport>, ApiError> {
    let Json(request) = request?;
    let symbol = parse_symbol(&request.symbol)?;
    let format: ReportFormat = request
        .report_type
        .as_deref()
        .unwrap_or(DEFAULT_REPORT_TYPE)
        .parse()
        .map_err(|err: acera_core::report::UnknownReportFormat| ApiError::bad_request(err.to_string()))?;

    let rendered = state.reports.generate(&symbol, format).await?;
    Ok(Json(rendered))
}
