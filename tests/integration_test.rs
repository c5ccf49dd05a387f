// Integration tests for BloomDiet
use actix_web::{http::StatusCode, test, App};
use bloomdiet::prelude::*;
use bloomdiet_api::{configure, UploadLimits};
use bloomdiet_core::{LabelCodecArtifact, PipelineArtifact};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

fn models_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models")
}

fn sample_store() -> ArtifactStore {
    let dir = models_dir();
    ArtifactStore::new(
        dir.join("diet_recommendation_rf_model.json"),
        dir.join("label_encoder.json"),
    )
}

fn sample_context() -> Arc<ServingContext> {
    let artifacts = sample_store().load().unwrap();
    Arc::new(ServingContext::from_artifacts(artifacts, NormalizationPolicy::default()).unwrap())
}

fn sample_predictor() -> Predictor {
    let artifacts = sample_store().load().unwrap();
    Predictor::new(artifacts.pipeline(), artifacts.codec.clone(), NormalizationPolicy::default()).unwrap()
}

fn record(value: Value) -> Record {
    Record::from_json(value).unwrap()
}

fn healthy_adult() -> Value {
    json!({
        "gender": "Male",
        "age": 30,
        "height_cm": 170,
        "weight_kg": 70,
        "disease": "None",
        "allergies": "None",
        "exercise_hours": 2
    })
}

macro_rules! app {
    ($ctx:expr) => {
        test::init_service(App::new().configure(|cfg| configure(cfg, $ctx, UploadLimits::default()))).await
    };
}

#[core::prelude::v1::test]
fn test_sample_artifacts_load() {
    let artifacts = sample_store().load().unwrap();
    assert_eq!(artifacts.pipeline.n_trees(), 4);
    assert_eq!(artifacts.pipeline.n_features(), 14);
    assert_eq!(artifacts.codec.classes(), ["Balanced", "Low_Carb", "Low_Sodium"]);
    assert_eq!(artifacts.model_sha256.len(), 64);
    assert_eq!(artifacts.labels_sha256.len(), 64);
}

#[core::prelude::v1::test]
fn test_known_record_probabilities() {
    let predictor = sample_predictor();
    let result = predictor.predict_one(record(healthy_adult())).unwrap();

    assert_eq!(result.prediction, "Balanced");
    assert!((result.probabilities.get("Balanced").unwrap() - 0.675).abs() < 1e-9);
    assert!((result.probabilities.get("Low_Carb").unwrap() - 0.1875).abs() < 1e-9);
    assert!((result.probabilities.get("Low_Sodium").unwrap() - 0.1375).abs() < 1e-9);
}

#[core::prelude::v1::test]
fn test_random_records_yield_valid_distributions() {
    let predictor = sample_predictor();
    let mut rng = StdRng::seed_from_u64(7);
    let genders = ["Male", "Female", "Other"];
    let diseases = ["None", "Diabetes", "Hypertension", "Obesity", "Asthma"];

    for _ in 0..200 {
        let rec = record(json!({
            "gender": genders[rng.random_range(0..genders.len())],
            "age": rng.random_range(18..90),
            "height_cm": rng.random_range(140.0..205.0),
            "weight_kg": rng.random_range(40.0..140.0),
            "disease": diseases[rng.random_range(0..diseases.len())],
            "exercise_hours": rng.random_range(0.0..6.0)
        }));
        let result = predictor.predict_one(rec).unwrap();

        assert!(predictor.classes().contains(&result.prediction));
        assert!((result.probabilities.total() - 1.0).abs() < 1e-6);
        assert!(result.probabilities.iter().all(|(_, p)| (0.0..=1.0).contains(&p)));
        let keys: Vec<&str> = result.probabilities.labels().collect();
        assert_eq!(keys, predictor.classes());
    }
}

#[core::prelude::v1::test]
fn test_non_numeric_value_is_filled() {
    let predictor = sample_predictor();
    let mut body = healthy_adult();
    body["exercise_hours"] = json!("lots");

    let result = predictor.predict_one(record(body)).unwrap();
    assert!((result.probabilities.total() - 1.0).abs() < 1e-6);
}

#[core::prelude::v1::test]
fn test_saved_artifacts_round_trip_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let source = sample_store();
    let model: PipelineArtifact = serde_json::from_slice(&std::fs::read(source.model_path()).unwrap()).unwrap();
    let labels: LabelCodecArtifact = serde_json::from_slice(&std::fs::read(source.labels_path()).unwrap()).unwrap();

    let copy = ArtifactStore::new(dir.path().join("model.bin"), dir.path().join("labels.json.gz"));
    copy.save(&model, &labels).unwrap();
    let loaded = copy.load().unwrap();
    let predictor = Predictor::new(loaded.pipeline(), loaded.codec.clone(), NormalizationPolicy::default()).unwrap();

    let expected = sample_predictor().predict_one(record(healthy_adult())).unwrap();
    assert_eq!(predictor.predict_one(record(healthy_adult())).unwrap(), expected);
}

#[actix_web::test]
async fn test_predict_one_reports_missing_fields() {
    let app = app!(sample_context());
    let req = test::TestRequest::post()
        .uri("/predict-one")
        .set_json(json!({"data": {"gender": "Female", "age": 0, "height_cm": 160}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "missing required fields: age, weight_kg");
}

#[actix_web::test]
async fn test_predict_one_without_data_is_rejected() {
    let app = app!(sample_context());
    let req = test::TestRequest::post().uri("/predict-one").set_json(json!({})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn test_batch_keeps_order_and_count() {
    let app = app!(sample_context());
    let mut diabetic = healthy_adult();
    diabetic["disease"] = json!("Diabetes");

    let req = test::TestRequest::post()
        .uri("/api/predict")
        .set_json(json!({"records": [healthy_adult(), diabetic, healthy_adult()]}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["count"], 3);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0], results[2]);
    assert_ne!(results[0], results[1]);
    assert_eq!(results[0]["prediction"], "Balanced");
}

#[actix_web::test]
async fn test_batch_failure_names_the_record() {
    let app = app!(sample_context());
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({"records": [healthy_adult(), {"gender": "Male"}]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().starts_with("record 1:"));
}

#[actix_web::test]
async fn test_empty_batch() {
    let app = app!(sample_context());
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({"records": []}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"count": 0, "results": []}));
}

#[actix_web::test]
async fn test_schema_matches_probability_keys() {
    let app = app!(sample_context());
    let req = test::TestRequest::get().uri("/schema").to_request();
    let schema: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(schema["cat_cols"], json!(["gender", "disease", "allergies"]));
    assert_eq!(schema["expected_columns"].as_array().unwrap().len(), 8);

    let req = test::TestRequest::post()
        .uri("/predict-one")
        .set_json(json!({"data": healthy_adult()}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let keys: Vec<&String> = body["probabilities"].as_object().unwrap().keys().collect();
    let classes: Vec<&str> = schema["classes"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
    assert_eq!(keys.len(), classes.len());
    for class in classes {
        assert!(body["probabilities"].get(class).is_some());
    }
}

#[actix_web::test]
async fn test_csv_upload() {
    let app = app!(sample_context());
    let boundary = "bloomdiet-boundary";
    let csv = "gender,age,height_cm,weight_kg,disease,allergies,exercise_hours\n\
               Male,30,170,70,None,None,2\n\
               Female,52,158,81,Hypertension,Peanuts,0\n";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nignored\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"people.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
        b = boundary,
        csv = csv
    );

    let req = test::TestRequest::post()
        .uri("/predict-csv")
        .insert_header(("content-type", format!("multipart/form-data; boundary={}", boundary)))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"][0]["prediction"], "Balanced");
}

#[actix_web::test]
async fn test_csv_upload_without_file_field() {
    let app = app!(sample_context());
    let boundary = "xyz";
    let body = "--xyz\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nhello\r\n--xyz--\r\n";

    let req = test::TestRequest::post()
        .uri("/predict-csv")
        .insert_header(("content-type", format!("multipart/form-data; boundary={}", boundary)))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_unknown_schema_passes_records_through() {
    let mut model: PipelineArtifact =
        serde_json::from_slice(&std::fs::read(sample_store().model_path()).unwrap()).unwrap();
    model.feature_names_in = None;

    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path().join("model.json"), dir.path().join("labels.json"));
    let labels = LabelCodecArtifact {
        classes: vec!["Balanced".into(), "Low_Carb".into(), "Low_Sodium".into()],
    };
    store.save(&model, &labels).unwrap();
    let ctx = Arc::new(ServingContext::from_artifacts(store.load().unwrap(), NormalizationPolicy::default()).unwrap());
    let app = app!(ctx);

    // no reindexing, so absent columns reach the pipeline
    let req = test::TestRequest::post()
        .uri("/predict-one")
        .set_json(json!({"data": {"gender": "Male", "age": 30, "height_cm": 170, "weight_kg": 70}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("disease"));

    let req = test::TestRequest::post()
        .uri("/predict-one")
        .set_json(json!({"data": healthy_adult()}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["prediction"], "Balanced");
}
