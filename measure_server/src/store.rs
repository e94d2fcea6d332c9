//! Persistence of measurement records.
//!
//! Records live in the hosted `measurements` table, reached through its REST
//! interface. [`MemoryStore`] keeps the same semantics in process.
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Local;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::measure::BodyMeasurements;

/// Format of the `timestamp` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Name of the hosted table.
pub const TABLE: &str = "measurements";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("request to measurement table failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("measurement table answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid measurement: {0}")]
    Invalid(String),
}

/// A stored measurement row.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Measurement {
    pub id: i64,
    pub timestamp: String,
    pub height: f32,
    pub shoulder_width: f32,
    pub chest_circumference: f32,
    pub waist_circumference: f32,
}

/// A measurement that has not been stored yet.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct NewMeasurement {
    /// Filled in with the current local time on insert if missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub height: f32,
    pub shoulder_width: f32,
    pub chest_circumference: f32,
    pub waist_circumference: f32,
}

impl NewMeasurement {
    /// Stamp the given values with the current local time.
    pub fn now(height: f32, body: &BodyMeasurements) -> Self {
        Self {
            timestamp: Some(now_timestamp()),
            height,
            shoulder_width: body.shoulder_width,
            chest_circumference: body.chest_circumference,
            waist_circumference: body.waist_circumference,
        }
    }

    /// Check the values and fill in a missing timestamp.
    pub fn validated(mut self) -> Result<Self, StoreError> {
        let values = [
            ("height", self.height),
            ("shoulder_width", self.shoulder_width),
            ("chest_circumference", self.chest_circumference),
            ("waist_circumference", self.waist_circumference),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(StoreError::Invalid(format!("{name} is {value}")));
            }
        }
        if self.timestamp.is_none() {
            self.timestamp = Some(now_timestamp());
        }
        Ok(self)
    }
}

pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// All records, newest first.
    async fn all(&self) -> Result<Vec<Measurement>, StoreError>;

    /// The newest record.
    async fn latest(&self) -> Result<Option<Measurement>, StoreError>;

    /// Insert a record and return it as stored.
    async fn insert(&self, measurement: NewMeasurement)
        -> Result<Option<Measurement>, StoreError>;

    /// Delete a record, returning whether it existed.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
}

/// Client of the hosted measurement table.
pub struct PostgrestStore {
    client: Client,
    table_url: String,
    api_key: String,
}

impl PostgrestStore {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self::with_client(Client::new(), base_url, api_key)
    }

    pub fn with_client(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            table_url: format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), TABLE),
            api_key: api_key.to_owned(),
        }
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, &self.table_url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    async fn rows(resp: reqwest::Response) -> Result<Vec<Measurement>, StoreError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl MeasurementStore for PostgrestStore {
    async fn all(&self) -> Result<Vec<Measurement>, StoreError> {
        let resp = self
            .request(reqwest::Method::GET)
            .query(&[("select", "*"), ("order", "timestamp.desc")])
            .send()
            .await?;
        Self::rows(resp).await
    }

    async fn latest(&self) -> Result<Option<Measurement>, StoreError> {
        let resp = self
            .request(reqwest::Method::GET)
            .query(&[("select", "*"), ("order", "timestamp.desc"), ("limit", "1")])
            .send()
            .await?;
        Ok(Self::rows(resp).await?.into_iter().next())
    }

    async fn insert(
        &self,
        measurement: NewMeasurement,
    ) -> Result<Option<Measurement>, StoreError> {
        let measurement = measurement.validated()?;
        let resp = self
            .request(reqwest::Method::POST)
            .header("Prefer", "return=representation")
            .json(&measurement)
            .send()
            .await?;
        let inserted = Self::rows(resp).await?.into_iter().next();
        if let Some(row) = &inserted {
            log::info!("Stored measurement {} from {}", row.id, row.timestamp);
        }
        Ok(inserted)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let resp = self
            .request(reqwest::Method::DELETE)
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        Ok(!Self::rows(resp).await?.is_empty())
    }
}

/// In-process measurement table.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<(i64, Vec<Measurement>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(rows: &[Measurement]) -> Vec<Measurement> {
        let mut rows = rows.to_vec();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        rows
    }
}

#[async_trait]
impl MeasurementStore for MemoryStore {
    async fn all(&self) -> Result<Vec<Measurement>, StoreError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(Self::sorted(&rows.1))
    }

    async fn latest(&self) -> Result<Option<Measurement>, StoreError> {
        Ok(self.all().await?.into_iter().next())
    }

    async fn insert(
        &self,
        measurement: NewMeasurement,
    ) -> Result<Option<Measurement>, StoreError> {
        let measurement = measurement.validated()?;
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.0 += 1;
        let row = Measurement {
            id: rows.0,
            timestamp: measurement.timestamp.unwrap_or_else(now_timestamp),
            height: measurement.height,
            shoulder_width: measurement.shoulder_width,
            chest_circumference: measurement.chest_circumference,
            waist_circumference: measurement.waist_circumference,
        };
        rows.1.push(row.clone());
        Ok(Some(row))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let before = rows.1.len();
        rows.1.retain(|row| row.id != id);
        Ok(rows.1.len() < before)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(timestamp: &str, height: f32) -> NewMeasurement {
        NewMeasurement {
            timestamp: Some(timestamp.into()),
            height,
            shoulder_width: 45.2,
            chest_circumference: 95.5,
            waist_circumference: 82.3,
        }
    }

    #[tokio::test]
    async fn round_trip_keeps_values() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let inserted = store
            .insert(record("2024-05-01 10:00:00", 175.0))
            .await?
            .expect("row");

        let latest = store.latest().await?.expect("latest");
        assert_eq!(latest, inserted);
        assert_eq!(latest.timestamp, "2024-05-01 10:00:00");
        assert_eq!(latest.height, 175.0);
        assert_eq!(latest.shoulder_width, 45.2);
        assert_eq!(latest.chest_circumference, 95.5);
        assert_eq!(latest.waist_circumference, 82.3);

        Ok(())
    }

    #[tokio::test]
    async fn newest_first() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.insert(record("2024-05-01 10:00:00", 170.0)).await?;
        store.insert(record("2024-06-01 10:00:00", 171.0)).await?;
        store.insert(record("2024-05-15 10:00:00", 172.0)).await?;

        let heights: Vec<_> = store.all().await?.iter().map(|m| m.height).collect();
        assert_eq!(heights, vec![171.0, 172.0, 170.0]);

        Ok(())
    }

    #[tokio::test]
    async fn delete_by_id() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let row = store
            .insert(record("2024-05-01 10:00:00", 170.0))
            .await?
            .expect("row");

        assert!(store.delete(row.id).await?);
        assert!(!store.delete(row.id).await?);
        assert_eq!(store.latest().await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn missing_timestamp_is_filled_in() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let mut new = record("", 170.0);
        new.timestamp = None;

        let row = store.insert(new).await?.expect("row");
        assert_eq!(row.timestamp.len(), TIMESTAMP_FORMAT.len() + 2);

        Ok(())
    }

    #[tokio::test]
    async fn negative_values_are_rejected() {
        let store = MemoryStore::new();
        let result = store.insert(record("2024-05-01 10:00:00", -1.0)).await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
    }
}
