use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ml::{ModelMetadata, ServingModel};
use crate::models::{FeatureTable, FeatureVector};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

fn resident_model(state: &AppState) -> Result<&Arc<ServingModel>> {
    state
        .model
        .as_ref()
        .ok_or_else(|| AppError::ArtifactMissing("no model resident".to_string()))
}

/// Readiness check: healthy only with a model loaded
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    resident_model(&state)?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Liveness check: the process is up and serving
pub async fn liveness(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "alive".to_string(),
        service: state.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Predict failure risk for one vehicle
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<VehicleTelemetryRequest>,
) -> Result<Json<PredictionResponse>> {
    let features = request.validated_features()?;
    let model = resident_model(&state)?;

    let batch = FeatureTable::from_vectors(&[features]);
    let scored = model.predict(&batch)?;
    let prediction = scored
        .predictions
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("empty prediction batch".to_string()))?;

    info!(
        vehicle_id = %request.vehicle_id,
        predicted_risk = %prediction.predicted_risk,
        confidence = prediction.confidence_score,
        "Prediction served"
    );

    Ok(Json(PredictionResponse {
        vehicle_id: request.vehicle_id,
        predicted_risk: prediction.predicted_risk,
        confidence_score: prediction.confidence_score,
        status: "success".to_string(),
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VehicleTelemetryRequest {
    #[validate(length(min = 1))]
    pub vehicle_id: String,
    #[validate(range(min = -50.0, max = 200.0))]
    pub engine_temp: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub brake_health: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub battery_health: f64,
    #[validate(range(min = 0.0))]
    pub vibration_level: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub oil_level: f64,
}

impl VehicleTelemetryRequest {
    pub fn new(vehicle_id: impl Into<String>, features: FeatureVector) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            engine_temp: features.engine_temp,
            brake_health: features.brake_health,
            battery_health: features.battery_health,
            vibration_level: features.vibration_level,
            oil_level: features.oil_level,
        }
    }

    /// Check the field ranges, then hand back the model inputs
    pub fn validated_features(&self) -> Result<FeatureVector> {
        self.validate()?;
        Ok(self.features())
    }

    pub fn features(&self) -> FeatureVector {
        FeatureVector::new(
            self.engine_temp,
            self.brake_health,
            self.battery_health,
            self.vibration_level,
            self.oil_level,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub vehicle_id: String,
    pub predicted_risk: String,
    pub confidence_score: f64,
    pub status: String,
}

/// Metadata of the resident model
pub async fn model_info(State(state): State<AppState>) -> Result<Json<ModelMetadata>> {
    let model = resident_model(&state)?;
    Ok(Json(model.metadata().clone()))
}
