//! API сервер: обучение и предсказание цены квартир

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use flat_price::{
    load_metrics, run_cross_validation, run_evaluation, run_training, ApartmentInput, Config,
    EvaluationInput, Frame, PriceError, PriceEstimate,
};

/// Путь к конфигурации по умолчанию; перекрывается FLAT_PRICE_CONFIG
const CONFIG_PATH: &str = "config/params.yml";

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

type ApiResult = Result<Json<Value>, (StatusCode, String)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("FLAT_PRICE_CONFIG").unwrap_or_else(|_| CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path))?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState {
        config: Arc::new(config),
    };

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/train", post(train))
        .route("/train_top_params", post(train_top_params))
        .route("/cross_training", post(cross_training))
        .route("/predict", post(predict))
        .route("/predict_input", post(predict_input))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn error_status(error: &PriceError) -> StatusCode {
    match error {
        PriceError::Schema(_)
        | PriceError::SchemaMismatch { .. }
        | PriceError::Csv(_)
        | PriceError::InvalidHyperparameters(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Пайплайны синхронные и долгие: выполняются в blocking-пуле
async fn blocking<T, F>(task: F) -> Result<T, (StatusCode, String)>
where
    T: Send + 'static,
    F: FnOnce() -> flat_price::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::error!("Request failed: {}", e);
            Err((error_status(&e), e.to_string()))
        }
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, format!("Task failed: {}", e))),
    }
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Flat price API (Rust)",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn train(State(state): State<AppState>) -> ApiResult {
    train_with(state, false).await
}

async fn train_top_params(State(state): State<AppState>) -> ApiResult {
    train_with(state, true).await
}

async fn train_with(state: AppState, top_params: bool) -> ApiResult {
    tracing::info!("Train request, top_params = {}", top_params);
    let metrics = blocking(move || {
        run_training(&state.config, top_params)?;
        load_metrics(&state.config, false)
    })
    .await?;
    Ok(Json(json!({ "metrics": metrics })))
}

async fn cross_training(State(state): State<AppState>) -> ApiResult {
    tracing::info!("Cross-validation request");
    let (overfit, metrics) = blocking(move || {
        let overfit = run_cross_validation(&state.config)?;
        Ok((overfit, load_metrics(&state.config, true)?))
    })
    .await?;
    Ok(Json(json!({ "metrics": metrics, "overfit": overfit })))
}

/// Тело запроса - CSV с сырыми объявлениями
async fn predict(State(state): State<AppState>, body: String) -> ApiResult {
    let predictions = blocking(move || {
        let frame = Frame::read_csv(body.as_bytes())?;
        tracing::info!("Predict request: {} rows", frame.n_rows());
        run_evaluation(&state.config, EvaluationInput::Frame(frame), false)
    })
    .await?;
    let head: Vec<f64> = predictions.into_iter().take(5).collect();
    Ok(Json(json!({ "prediction": head })))
}

async fn predict_input(
    State(state): State<AppState>,
    Json(apartment): Json<ApartmentInput>,
) -> ApiResult {
    tracing::info!("Predict input request: {}", apartment.address);
    let total_area = apartment.total_area;
    let predictions = blocking(move || {
        let frame = apartment.to_frame()?;
        run_evaluation(&state.config, EvaluationInput::Frame(frame), true)
    })
    .await?;

    let price_per_m2 = predictions
        .first()
        .copied()
        .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "empty prediction".to_string()))?;
    let estimate = PriceEstimate::new(price_per_m2, total_area);
    Ok(Json(json!(estimate)))
}
