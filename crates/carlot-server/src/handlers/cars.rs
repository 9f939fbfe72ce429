//! Car handlers

use crate::extractors::Bind;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use carlot_types::{Car, CarListing};
use tracing::{error, info};

pub async fn list(State(state): State<AppState>) -> Result<Json<CarListing>, StatusCode> {
    match state.catalog.list().await {
        Ok(listing) => Ok(Json(listing)),
        Err(e) => {
            error!("Failed to list cars: {:#}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    Bind(car): Bind<Car>,
) -> (StatusCode, Json<Car>) {
    info!("Car submitted: name={}, year={}", car.name, car.year);

    (StatusCode::CREATED, Json(state.catalog.submit(car)))
}
