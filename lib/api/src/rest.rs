use crate::error::ApiError;
use crate::state::ServingContext;
use crate::upload::{parse_csv, read_file_field};
use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{error, middleware, web, App, HttpResponse, HttpServer};
use bloomdiet_core::{PredictionResult, Record};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Deserialize)]
struct PredictOneRequest {
    #[serde(default)]
    data: Record,
}

#[derive(Deserialize)]
struct PredictManyRequest {
    records: Vec<Record>,
}

#[derive(Serialize)]
struct BatchResponse {
    count: usize,
    results: Vec<PredictionResult>,
}

/// Size limits for request bodies.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_json_bytes: usize,
    pub max_upload_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_json_bytes: 2 * 1024 * 1024,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub limits: UploadLimits,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: None,
            limits: UploadLimits::default(),
        }
    }
}

pub struct RestApi;

impl RestApi {
    pub async fn start(state: Arc<ServingContext>, config: RestConfig) -> std::io::Result<()> {
        let limits = config.limits;
        let mut server = HttpServer::new(move || {
            let state = state.clone();
            App::new()
                .wrap(cors())
                .wrap(default_headers())
                .configure(move |cfg| configure(cfg, state, limits))
        });

        if let Some(workers) = config.workers {
            server = server.workers(workers);
        }

        info!("Binding HTTP API to {}:{}", config.host, config.port);
        server.bind((config.host.as_str(), config.port))?.run().await
    }
}

/// Any origin, method and header.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}

/// Headers added to every response, preflights included.
pub fn default_headers() -> middleware::DefaultHeaders {
    middleware::DefaultHeaders::new().add(("Access-Control-Allow-Private-Network", "true"))
}

/// Register the serving context and every route, both at the root and
/// under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig, state: Arc<ServingContext>, limits: UploadLimits) {
    cfg.app_data(web::Data::new(state))
        .app_data(web::Data::new(limits))
        .app_data(json_config(limits.max_json_bytes))
        .configure(routes)
        .service(web::scope("/api").configure(routes));
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/schema", web::get().to(schema))
        .route("/predict-one", web::post().to(predict_one))
        .route("/predict", web::post().to(predict_many))
        .route("/predict-csv", web::post().to(predict_csv));
}

fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            let message = ApiError::MalformedPayload(err.to_string()).to_string();
            error::InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(serde_json::json!({ "error": message })),
            )
            .into()
        })
}

async fn health(state: web::Data<Arc<ServingContext>>) -> HttpResponse {
    let classes = state.predictor().classes();
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "classes": classes,
        "n_classes": classes.len(),
        "model_sha256": state.model_sha256(),
        "labels_sha256": state.labels_sha256(),
        "loaded_at": state.loaded_at().to_rfc3339(),
    }))
}

async fn schema(state: web::Data<Arc<ServingContext>>) -> HttpResponse {
    HttpResponse::Ok().json(state.predictor().schema_info())
}

async fn predict_one(
    state: web::Data<Arc<ServingContext>>,
    req: web::Json<PredictOneRequest>,
) -> Result<HttpResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let record = req.into_inner().data;
    debug!(%request_id, fields = record.len(), "predict-one request");

    let ctx = state.get_ref().clone();
    let result = web::block(move || ctx.predictor().predict_one(record))
        .await?
        .map_err(|e| rejected(request_id, e))?;

    debug!(%request_id, prediction = %result.prediction, "predict-one done");
    Ok(HttpResponse::Ok().json(result))
}

async fn predict_many(
    state: web::Data<Arc<ServingContext>>,
    req: web::Json<PredictManyRequest>,
) -> Result<HttpResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let records = req.into_inner().records;
    debug!(%request_id, records = records.len(), "batch request");

    run_batch(state.get_ref().clone(), request_id, records).await
}

async fn predict_csv(
    state: web::Data<Arc<ServingContext>>,
    limits: web::Data<UploadLimits>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let content = read_file_field(payload, limits.max_upload_bytes)
        .await
        .map_err(|e| rejected(request_id, e))?;
    let records = parse_csv(&content).map_err(|e| rejected(request_id, e))?;
    debug!(%request_id, bytes = content.len(), records = records.len(), "csv batch request");

    run_batch(state.get_ref().clone(), request_id, records).await
}

async fn run_batch(
    ctx: Arc<ServingContext>,
    request_id: Uuid,
    records: Vec<Record>,
) -> Result<HttpResponse, ApiError> {
    let results = web::block(move || ctx.predictor().predict_batch(records))
        .await?
        .map_err(|e| rejected(request_id, e))?;

    Ok(HttpResponse::Ok().json(BatchResponse {
        count: results.len(),
        results,
    }))
}

fn rejected(request_id: Uuid, err: impl Into<ApiError>) -> ApiError {
    let err = err.into();
    warn!(%request_id, error = %err, "request rejected");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{
        http::{Method, StatusCode},
        test,
    };
    use bloomdiet_core::{FittedPipeline, LabelCodec, NormalizationPolicy, Predictor, RandomForestPipeline};
    use chrono::Utc;

    fn context() -> Arc<ServingContext> {
        let artifact = serde_json::from_value(serde_json::json!({
            "feature_names_in": ["gender", "age", "height_cm", "weight_kg", "bmi"],
            "preprocessor": {
                "categorical": [{"column": "gender", "categories": ["Female", "Male"]}],
                "numeric": [
                    {"column": "age", "mean": 40.0, "scale": 10.0},
                    {"column": "height_cm", "mean": 170.0, "scale": 10.0},
                    {"column": "weight_kg", "mean": 70.0, "scale": 10.0},
                    {"column": "bmi", "mean": 24.0, "scale": 4.0}
                ]
            },
            "forest": {"n_classes": 2, "trees": [{"nodes": [
                {"split": {"feature": 5, "threshold": 0.5, "left": 1, "right": 2}},
                {"leaf": {"value": [0.9, 0.1]}},
                {"leaf": {"value": [0.2, 0.8]}}
            ]}]}
        }))
        .unwrap();
        let pipeline: Arc<dyn FittedPipeline> = Arc::new(RandomForestPipeline::new(artifact).unwrap());
        let codec = Arc::new(LabelCodec::new(vec!["Balanced".into(), "Low_Carb".into()]).unwrap());
        let predictor = Predictor::new(pipeline, codec, NormalizationPolicy::default()).unwrap();
        Arc::new(ServingContext::new(predictor, "abc", "def", Utc::now()))
    }

    macro_rules! app {
        () => {
            app!(UploadLimits::default())
        };
        ($limits:expr) => {
            test::init_service(
                App::new()
                    .wrap(cors())
                    .wrap(default_headers())
                    .configure(|cfg| configure(cfg, context(), $limits)),
            )
            .await
        };
    }

    fn csv_upload(uri: &str, csv: &str) -> test::TestRequest {
        let boundary = "bloomdiet-test";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"rows.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
            b = boundary,
            csv = csv
        );
        test::TestRequest::post()
            .uri(uri)
            .insert_header(("content-type", format!("multipart/form-data; boundary={}", boundary)))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn test_predict_one_ok() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/predict-one")
            .set_json(serde_json::json!({"data": {
                "gender": "Male", "age": 30, "height_cm": 170, "weight_kg": 95
            }}))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        // bmi 32.87 scales above the split
        assert_eq!(body["prediction"], "Low_Carb");
        assert_eq!(body["probabilities"]["Low_Carb"], 0.8);
    }

    #[actix_web::test]
    async fn test_predict_one_missing_fields() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/api/predict-one")
            .set_json(serde_json::json!({"data": {"gender": "Male", "age": 30}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "missing required fields: height_cm, weight_kg");
    }

    #[actix_web::test]
    async fn test_malformed_json_is_client_error() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/predict")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"records\": 5}")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Malformed payload"));
    }

    #[actix_web::test]
    async fn test_health_and_schema() {
        let app = app!();
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["n_classes"], 2);
        assert_eq!(body["model_sha256"], "abc");
        assert_eq!(body["labels_sha256"], "def");

        let req = test::TestRequest::get().uri("/api/schema").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["cat_cols"], serde_json::json!(["gender"]));
        assert_eq!(body["classes"], serde_json::json!(["Balanced", "Low_Carb"]));
    }

    #[actix_web::test]
    async fn test_private_network_header_on_every_response() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/health")
            .insert_header(("Origin", "https://app.example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("access-control-allow-private-network").unwrap(), "true");
        assert!(resp.headers().contains_key("access-control-allow-origin"));

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/predict-one")
            .insert_header(("Origin", "https://app.example.com"))
            .insert_header(("Access-Control-Request-Method", "POST"))
            .insert_header(("Access-Control-Request-Headers", "content-type"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(resp.headers().get("access-control-allow-private-network").unwrap(), "true");
        assert!(resp.headers().contains_key("access-control-allow-origin"));

        // error responses carry it too
        let req = test::TestRequest::post()
            .uri("/predict-one")
            .set_json(serde_json::json!({"data": {}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(resp.headers().get("access-control-allow-private-network").unwrap(), "true");
    }

    #[actix_web::test]
    async fn test_csv_upload_over_limit() {
        let app = app!(UploadLimits {
            max_upload_bytes: 64,
            ..UploadLimits::default()
        });
        let mut csv = String::from("gender,age,height_cm,weight_kg\n");
        for age in 20..40 {
            csv.push_str(&format!("Male,{},170,95\n", age));
        }

        let resp = test::call_service(&app, csv_upload("/predict-csv", &csv).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Upload error: file exceeds the 64 byte limit");
    }

    #[actix_web::test]
    async fn test_csv_upload_within_limit() {
        let app = app!();
        let csv = "gender,age,height_cm,weight_kg\nMale,30,170,95\nFemale,41,162,58\n";

        let body: serde_json::Value =
            test::call_and_read_body_json(&app, csv_upload("/api/predict-csv", csv).to_request()).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["results"][0]["prediction"], "Low_Carb");
        assert_eq!(body["results"][1]["prediction"], "Balanced");
    }

    #[actix_web::test]
    async fn test_malformed_csv_is_client_error() {
        let app = app!();
        let csv = "gender,age,height_cm,weight_kg\nMale,30,170,70,EXTRA,MORE\n";

        let resp = test::call_service(&app, csv_upload("/predict-csv", csv).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Upload error: record 0: expected 4 fields, saw 6");
    }
}
