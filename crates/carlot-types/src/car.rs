//! Car types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored car record
///
/// Missing fields bind to their zero values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Car {
    /// Assigned by the storage layer
    pub id: i64,
    pub name: String,
    pub year: i64,
}

impl Car {
    pub fn from_new(id: i64, car: NewCar) -> Self {
        Self {
            id,
            name: car.name,
            year: car.year,
        }
    }
}

/// A car that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCar {
    pub name: String,
    pub year: i64,
}

impl NewCar {
    pub fn new(name: impl Into<String>, year: i64) -> Self {
        Self {
            name: name.into(),
            year,
        }
    }
}

impl From<Car> for NewCar {
    fn from(car: Car) -> Self {
        Self {
            name: car.name,
            year: car.year,
        }
    }
}

/// Body of `GET /api/cars`
///
/// `Array` is a plain JSON array. `Keyed` is a JSON object keyed by the car id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CarListing {
    Array(Vec<Car>),
    Keyed(BTreeMap<String, Car>),
}

impl CarListing {
    pub fn keyed(cars: Vec<Car>) -> Self {
        CarListing::Keyed(cars.into_iter().map(|c| (c.id.to_string(), c)).collect())
    }
}
