use askama::Template;
use askama_axum::IntoResponse as AskamaIntoResponse;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse as AxumIntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod argument_parsing;
mod clean_url;
mod error;
mod shared_queries;
mod stats;
mod store;

use argument_parsing::Args;
use clean_url::clean_url;
use error::StatsError;
use stats::{DEFAULT_RANKING_LIMIT, MemoryConsumer, ResponsePoint, SlowUrl};
use store::{LogStore, NewLogRecord};

#[derive(Template)]
#[template(path = "index.html")]
struct DashboardPage {
    request_count: i64,
    access_span_secs: i64,
    requests_per_second: f64,
    average_time_per_request: f64,
    optimal_requests_per_second: f64,
    current_capacity_percent: f64,
    slowest_urls: Vec<SlowUrl>,
    memory_hogs: Vec<MemoryConsumer>,
}

#[derive(Template)]
#[template(path = "url_detail.html")]
struct UrlDetailPage {
    url: String,
    pretty_url: String,
    hits: i64,
    total_render_time: f64,
    series: Vec<ResponsePoint>,
}

#[derive(Deserialize)]
struct UrlQuery {
    url: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let store = LogStore::from_args(args).await;
    // carry out migrations
    store.migrate_db().await;

    // build our application with a route
    let app = Router::new()
        .route("/", get(dashboard))
        .route("/url-details", get(url_detail))
        .route("/logs", post(create_log))
        .route("/styles.css", get(styles))
        .layer(TraceLayer::new_for_http())
        .with_state(store);

    // run it
    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000")
        .await
        .expect("failed to bind 127.0.0.1:3000");
    tracing::info!(
        "listening on {}",
        listener.local_addr().expect("listener has no local address")
    );
    axum::serve(listener, app).await.expect("server failed");
}

async fn styles() -> impl AxumIntoResponse {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/css")
        .body(include_str!("../templates/styles.css").to_owned())
        .unwrap()
}

#[axum::debug_handler]
async fn dashboard(State(store): State<LogStore>) -> Result<impl AskamaIntoResponse, StatsError> {
    Ok(DashboardPage {
        request_count: stats::count_requests(&store).await?,
        access_span_secs: stats::total_access_span(&store).await?,
        requests_per_second: stats::requests_per_second(&store).await?,
        average_time_per_request: stats::average_time_per_request(&store).await?,
        optimal_requests_per_second: stats::optimal_requests_per_second(&store).await?,
        current_capacity_percent: stats::current_capacity_percent(&store).await?,
        slowest_urls: stats::top_slowest_urls(&store, DEFAULT_RANKING_LIMIT).await?,
        memory_hogs: stats::top_memory_consumers(&store, DEFAULT_RANKING_LIMIT).await?,
    })
}

#[axum::debug_handler]
async fn url_detail(
    State(store): State<LogStore>,
    Query(query): Query<UrlQuery>,
) -> Result<impl AskamaIntoResponse, StatsError> {
    let pretty_url = clean_url(&query.url)?;
    Ok(UrlDetailPage {
        pretty_url,
        hits: stats::hit_count(&store, &query.url).await?,
        total_render_time: stats::total_render_time(&store, &query.url).await?,
        series: stats::response_time_series(&store, &query.url).await?,
        url: query.url,
    })
}

async fn create_log(
    State(store): State<LogStore>,
    Json(record): Json<NewLogRecord>,
) -> Result<impl AxumIntoResponse, StatsError> {
    store.insert(&record).await?;
    Ok(StatusCode::CREATED)
}
