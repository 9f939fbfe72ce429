//! Car catalog service

use crate::storage::{CarStore, ListingShape};
use anyhow::Result;
use carlot_types::{Car, CarListing, NewCar};
use std::sync::Arc;
use tracing::info;

/// Id stamped on every car echoed back by `POST /api/cars`
pub const SUBMITTED_CAR_ID: i64 = 3;

/// Rows written on every startup, in insertion order
pub fn seed_cars() -> Vec<NewCar> {
    vec![
        NewCar::new("ヤリス", 2020),
        NewCar::new("キャストスタイル", 2020),
        NewCar::new("フィット", 2019),
    ]
}

pub struct CarCatalog {
    store: Arc<dyn CarStore>,
}

impl CarCatalog {
    pub fn new(store: Arc<dyn CarStore>) -> Self {
        Self { store }
    }

    /// Drop whatever is stored and write the seed rows.
    pub async fn seed(&self) -> Result<Vec<Car>> {
        let cars = self.store.reset(&seed_cars()).await?;
        info!("Seeded {} cars", cars.len());
        Ok(cars)
    }

    pub async fn list(&self) -> Result<CarListing> {
        let cars = self.store.list().await?;

        Ok(match self.store.listing_shape() {
            ListingShape::Array => CarListing::Array(cars),
            ListingShape::Keyed => CarListing::keyed(cars),
        })
    }

    /// Echo a submitted car with the fixed id. Nothing is persisted.
    pub fn submit(&self, car: Car) -> Car {
        Car::from_new(SUBMITTED_CAR_ID, car.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, MemoryStore};

    #[tokio::test]
    async fn test_seed_then_list_array() {
        let db = Database::in_memory().await.unwrap();
        let catalog = CarCatalog::new(Arc::new(db));

        catalog.seed().await.unwrap();
        match catalog.list().await.unwrap() {
            CarListing::Array(cars) => {
                assert_eq!(cars.len(), 3);
                assert_eq!(cars[0].name, "ヤリス");
                assert_eq!(cars[2].year, 2019);
            }
            other => panic!("expected array listing, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_memory_store_lists_keyed() {
        let catalog = CarCatalog::new(Arc::new(MemoryStore::new()));

        catalog.seed().await.unwrap();
        match catalog.list().await.unwrap() {
            CarListing::Keyed(cars) => {
                assert_eq!(cars.len(), 3);
                assert_eq!(cars["2"].name, "キャストスタイル");
            }
            other => panic!("expected keyed listing, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_does_not_store() {
        let catalog = CarCatalog::new(Arc::new(MemoryStore::new()));
        catalog.seed().await.unwrap();

        let car = catalog.submit(Car {
            id: 99,
            name: "Prius".to_string(),
            year: 2015,
        });

        assert_eq!(car.id, SUBMITTED_CAR_ID);
        assert_eq!(car.name, "Prius");
        assert!(matches!(
            catalog.list().await.unwrap(),
            CarListing::Keyed(ref cars) if cars.len() == 3
        ));
    }
}
