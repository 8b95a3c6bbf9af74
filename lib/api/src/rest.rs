use actix_cors::Cors;
use actix_web::{error, web, App, HttpResponse, HttpServer, Result as ActixResult};
use moldrec_core::{compose_query, DesignRecord, RecommendConfig, Recommendation};
use moldrec_storage::StorageManager;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Where the HTTP service listens and how it ranks.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub recommend: RecommendConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            recommend: RecommendConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct RecommendRequest {
    #[serde(default, deserialize_with = "lenient_text")]
    product_type: String,
    #[serde(default, deserialize_with = "lenient_text")]
    product_name: String,
    #[serde(default)]
    top_n: Option<usize>,
}

#[derive(Serialize)]
struct RecommendItem<'a> {
    #[serde(rename = "제번")]
    code: &'a str,
    #[serde(rename = "고객사")]
    customer: Option<&'a str>,
    #[serde(rename = "제품종류")]
    category: &'a str,
    #[serde(rename = "품명")]
    part_name: &'a str,
    #[serde(rename = "유사도")]
    similarity: f64,
    #[serde(rename = "제품")]
    product: Option<&'a str>,
}

impl<'a> From<&'a Recommendation> for RecommendItem<'a> {
    fn from(r: &'a Recommendation) -> Self {
        Self {
            code: &r.record.code,
            customer: r.record.customer.as_deref(),
            category: &r.record.category,
            part_name: &r.record.part_name,
            similarity: r.similarity,
            product: r.record.product.as_deref(),
        }
    }
}

// Spreadsheet-fed clients send numbers for some cells.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_text).unwrap_or_default())
}

/// Build a record from an upload body, stringifying scalar cells.
fn record_from_body(body: serde_json::Map<String, Value>) -> serde_json::Result<DesignRecord> {
    let fields = body
        .into_iter()
        .map(|(k, v)| {
            let v = value_text(&v).map(Value::String).unwrap_or(Value::Null);
            (k, v)
        })
        .collect();
    serde_json::from_value(Value::Object(fields))
}

fn error_body(message: impl std::fmt::Display) -> Value {
    serde_json::json!({ "error": message.to_string() })
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest().json(error_body(&err));
        error::InternalError::from_response(err, response).into()
    })
}

pub struct RestApi;

impl RestApi {
    /// Register every route. State (`Arc<StorageManager>` and
    /// `RecommendConfig`) is expected on the enclosing `App`.
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.app_data(json_config())
            .route("/", web::get().to(home))
            .route("/api/recommend", web::post().to(recommend))
            .route("/api/upload", web::post().to(upload))
            .route("/api/refresh", web::post().to(refresh))
            .route("/api/debug", web::get().to(debug_info));
    }

    pub async fn start(storage: Arc<StorageManager>, config: ServiceConfig) -> std::io::Result<()> {
        let storage = web::Data::new(storage);
        let recommend = web::Data::new(config.recommend.clone());

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(storage.clone())
                .app_data(recommend.clone())
                .configure(Self::configure)
        })
        .bind((config.host.as_str(), config.port))?
        .run()
        .await
    }
}

async fn home(storage: web::Data<Arc<StorageManager>>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "running",
        "records": storage.snapshot().len(),
    })))
}

async fn recommend(
    storage: web::Data<Arc<StorageManager>>,
    config: web::Data<RecommendConfig>,
    req: web::Json<RecommendRequest>,
) -> ActixResult<HttpResponse> {
    let query = compose_query(&req.product_type, &req.product_name);
    let top_n = config.resolve_top_n(req.top_n);

    let results = storage.recommend(&query, top_n);
    tracing::debug!(query = %query, top_n, hits = results.len(), "Recommend");

    let items: Vec<RecommendItem<'_>> = results.iter().map(RecommendItem::from).collect();
    Ok(HttpResponse::Ok().json(items))
}

async fn upload(
    storage: web::Data<Arc<StorageManager>>,
    body: web::Json<serde_json::Map<String, Value>>,
) -> ActixResult<HttpResponse> {
    let record = match record_from_body(body.into_inner()) {
        Ok(r) => r,
        Err(e) => return Ok(HttpResponse::BadRequest().json(error_body(e))),
    };

    let ticket = match storage.append_and_refresh(&record) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "Upload failed");
            return Ok(HttpResponse::InternalServerError().json(error_body(e)));
        }
    };

    let github = match storage.sync_to_github(&record.code).await {
        None => Value::Null,
        Some(Ok(outcome)) => serde_json::to_value(outcome).unwrap_or(Value::Null),
        Some(Err(e)) => error_body(e),
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": format!("Record {} appended, refresh queued", record.code),
        "ticket": ticket,
        "github": github,
    })))
}

async fn refresh(storage: web::Data<Arc<StorageManager>>) -> ActixResult<HttpResponse> {
    match storage.refresh() {
        Ok(ticket) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "status": "queued",
            "ticket": ticket,
        }))),
        Err(e) => Ok(HttpResponse::InternalServerError().json(error_body(e))),
    }
}

async fn debug_info(storage: web::Data<Arc<StorageManager>>) -> ActixResult<HttpResponse> {
    let snapshot = storage.snapshot();
    let last_row: Vec<&DesignRecord> = snapshot.table().last().into_iter().collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "rows_in_memory": snapshot.len(),
        "generation": snapshot.generation(),
        "built_at": snapshot.built_at().to_rfc3339(),
        "vocabulary_size": snapshot.model().vocabulary_size(),
        "last_row": last_row,
        "source": storage.source_description(),
        "refresh": storage.refresh_stats(),
    })))
}
