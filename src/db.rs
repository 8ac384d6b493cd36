use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::TryStreamExt;
use mongodb::{bson, bson::doc, bson::oid::ObjectId, bson::Bson, bson::Document, Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Plant, PlantSource};
use crate::store::KeyValueStore;

const LOCAL_PLANTS_KEY: &str = "local_plants";
const PLANTS_COLLECTION: &str = "plants";

/// A user's saved plants, newest first.
#[async_trait]
pub trait PlantCollection: Send + Sync {
    async fn list(&self) -> Result<Vec<Plant>>;
    async fn get(&self, id: &str) -> Result<Option<Plant>>;
    async fn add(&self, plant: Plant) -> Result<ObjectId>;
    async fn remove(&self, id: &str) -> Result<bool>;
    async fn mark_watered(&self, id: &str, when: DateTime<Utc>) -> Result<bool>;
    async fn set_interval(&self, id: &str, days: u32) -> Result<bool>;
    async fn set_reminder(&self, id: &str, reminder_id: Option<String>) -> Result<bool>;
}

fn parse_id(id: &str) -> Result<ObjectId> {
    match ObjectId::parse_str(id) {
        Ok(oid) => Ok(oid),
        Err(e) => {
            eprintln!("Error: ID inválido '{}': {}", id, e);
            Err(e.into())
        }
    }
}

/// How a [`Plant`] is laid out in MongoDB. Timestamps are BSON datetimes
/// so the server sorts them chronologically.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlantDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub name: String,
    pub species: Option<String>,
    pub image_uri: Option<String>,
    pub watering_guidance: Option<String>,
    pub watering_interval_days: Option<u32>,
    pub last_watered_at: Option<bson::DateTime>,
    pub source: PlantSource,
    #[serde(default)]
    pub reminder_id: Option<String>,
    pub created_at: bson::DateTime,
}

impl PlantDocument {
    fn owned_by(plant: Plant, user_id: &str) -> Self {
        PlantDocument {
            id: plant.id,
            user_id: user_id.to_string(),
            name: plant.name,
            species: plant.species,
            image_uri: plant.image_uri,
            watering_guidance: plant.watering_guidance,
            watering_interval_days: plant.watering_interval_days,
            last_watered_at: plant.last_watered_at.map(bson::DateTime::from_chrono),
            source: plant.source,
            reminder_id: plant.reminder_id,
            created_at: bson::DateTime::from_chrono(plant.created_at),
        }
    }
}

impl From<PlantDocument> for Plant {
    fn from(doc: PlantDocument) -> Self {
        Plant {
            id: doc.id,
            user_id: Some(doc.user_id),
            name: doc.name,
            species: doc.species,
            image_uri: doc.image_uri,
            watering_guidance: doc.watering_guidance,
            watering_interval_days: doc.watering_interval_days,
            last_watered_at: doc.last_watered_at.map(|d| d.to_chrono()),
            source: doc.source,
            reminder_id: doc.reminder_id,
            created_at: doc.created_at.to_chrono(),
        }
    }
}

fn user_filter(user_id: &str) -> Document {
    doc! { "user_id": user_id }
}

fn owned_filter(oid: ObjectId, user_id: &str) -> Document {
    doc! { "_id": oid, "user_id": user_id }
}

fn newest_first() -> Document {
    doc! { "created_at": -1 }
}

fn set_update(field: &str, value: Bson) -> Document {
    doc! { "$set": { field: value } }
}

/// Plants stored in MongoDB, scoped to one user.
pub struct MongoPlants {
    collection: Collection<PlantDocument>,
    user_id: String,
}

impl MongoPlants {
    pub fn new(db: &Database, user_id: String) -> Self {
        Self { collection: db.collection(PLANTS_COLLECTION), user_id }
    }

    async fn set_field(&self, id: &str, field: &str, value: Bson) -> Result<bool> {
        let oid = parse_id(id)?;
        let result = match self
            .collection
            .update_one(owned_filter(oid, &self.user_id), set_update(field, value))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Error al actualizar planta: {}", e);
                return Err(e.into());
            }
        };
        debug!(id, field, matched = result.matched_count, "plant updated");
        Ok(result.matched_count > 0)
    }
}

#[async_trait]
impl PlantCollection for MongoPlants {
    async fn list(&self) -> Result<Vec<Plant>> {
        let cursor = match self
            .collection
            .find(user_filter(&self.user_id))
            .sort(newest_first())
            .await
        {
            Ok(cursor) => cursor,
            Err(e) => {
                eprintln!("Error al buscar plantas: {}", e);
                return Err(e.into());
            }
        };
        let docs: Vec<PlantDocument> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(Plant::from).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Plant>> {
        let oid = parse_id(id)?;
        let found = self.collection.find_one(owned_filter(oid, &self.user_id)).await?;
        Ok(found.map(Plant::from))
    }

    async fn add(&self, mut plant: Plant) -> Result<ObjectId> {
        plant.id = None;
        let result = self
            .collection
            .insert_one(PlantDocument::owned_by(plant, &self.user_id))
            .await?;
        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow!("MongoDB no devolvió un ObjectId"))
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let oid = parse_id(id)?;
        let result = match self.collection.delete_one(owned_filter(oid, &self.user_id)).await {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Error al remover planta: {}", e);
                return Err(e.into());
            }
        };
        Ok(result.deleted_count > 0)
    }

    async fn mark_watered(&self, id: &str, when: DateTime<Utc>) -> Result<bool> {
        self.set_field(id, "last_watered_at", Bson::DateTime(bson::DateTime::from_chrono(when)))
            .await
    }

    async fn set_interval(&self, id: &str, days: u32) -> Result<bool> {
        self.set_field(id, "watering_interval_days", bson::to_bson(&days)?).await
    }

    async fn set_reminder(&self, id: &str, reminder_id: Option<String>) -> Result<bool> {
        self.set_field(id, "reminder_id", bson::to_bson(&reminder_id)?).await
    }
}

/// Plants kept in the local store when nobody is signed in.
pub struct LocalPlants {
    store: Arc<dyn KeyValueStore>,
}

impl LocalPlants {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn load(&self) -> Result<Vec<Plant>> {
        match self.store.get(LOCAL_PLANTS_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(vec![]),
        }
    }

    fn save(&self, plants: &[Plant]) -> Result<()> {
        if plants.is_empty() {
            self.store.remove(LOCAL_PLANTS_KEY)?;
        } else {
            self.store.set(LOCAL_PLANTS_KEY, &serde_json::to_string(plants)?)?;
        }
        Ok(())
    }

    fn update(&self, id: &str, apply: impl FnOnce(&mut Plant)) -> Result<bool> {
        let oid = parse_id(id)?;
        let mut plants = self.load()?;
        let Some(plant) = plants.iter_mut().find(|p| p.id == Some(oid)) else {
            return Ok(false);
        };
        apply(plant);
        self.save(&plants)?;
        Ok(true)
    }
}

#[async_trait]
impl PlantCollection for LocalPlants {
    async fn list(&self) -> Result<Vec<Plant>> {
        let mut plants = self.load()?;
        plants.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(plants)
    }

    async fn get(&self, id: &str) -> Result<Option<Plant>> {
        let oid = parse_id(id)?;
        Ok(self.load()?.into_iter().find(|p| p.id == Some(oid)))
    }

    async fn add(&self, mut plant: Plant) -> Result<ObjectId> {
        let oid = ObjectId::new();
        plant.id = Some(oid);
        plant.user_id = None;
        let mut plants = self.load()?;
        plants.push(plant);
        self.save(&plants)?;
        Ok(oid)
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let oid = parse_id(id)?;
        let mut plants = self.load()?;
        let before = plants.len();
        plants.retain(|p| p.id != Some(oid));
        if plants.len() == before {
            return Ok(false);
        }
        self.save(&plants)?;
        Ok(true)
    }

    async fn mark_watered(&self, id: &str, when: DateTime<Utc>) -> Result<bool> {
        self.update(id, |p| p.last_watered_at = Some(when))
    }

    async fn set_interval(&self, id: &str, days: u32) -> Result<bool> {
        self.update(id, |p| p.watering_interval_days = Some(days))
    }

    async fn set_reminder(&self, id: &str, reminder_id: Option<String>) -> Result<bool> {
        self.update(id, |p| p.reminder_id = reminder_id)
    }
}
