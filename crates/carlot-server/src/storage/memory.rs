//! In-memory car store using DashMap (no database)

use super::{CarStore, ListingShape};
use anyhow::Result;
use async_trait::async_trait;
use carlot_types::{Car, NewCar};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

pub struct MemoryStore {
    cars: DashMap<i64, Car>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            cars: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    fn put(&self, car: &NewCar) -> Car {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let car = Car::from_new(id, car.clone());
        self.cars.insert(id, car.clone());
        car
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CarStore for MemoryStore {
    async fn reset(&self, seed: &[NewCar]) -> Result<Vec<Car>> {
        self.cars.clear();
        self.next_id.store(1, Ordering::SeqCst);

        Ok(seed.iter().map(|car| self.put(car)).collect())
    }

    async fn list(&self) -> Result<Vec<Car>> {
        let mut cars: Vec<Car> = self.cars.iter().map(|entry| entry.value().clone()).collect();
        cars.sort_by_key(|c| c.id);
        Ok(cars)
    }

    fn listing_shape(&self) -> ListingShape {
        ListingShape::Keyed
    }
}
