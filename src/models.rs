use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

use crate::schedule::{infer_interval_days, Named, Waterable};

/// Planta tal como la devuelve cualquier proveedor, ya normalizada.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PlantSearchResult {
    pub id: String,
    pub common_name: Option<String>,
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub other_names: Vec<String>,
    pub watering: Option<String>,
    #[serde(default)]
    pub sunlight: Vec<String>,
    pub care_level: Option<String>,
    pub description: Option<String>,
    pub toxicity: Option<String>,
    pub growth_rate: Option<String>,
    pub cycle: Option<String>,
    pub humidity: Option<String>,
    pub image_url: Option<String>,
    pub family: Option<String>,
    pub origin: Option<String>,
    pub uses: Option<String>,
    pub soil: Option<String>,
    pub propagation: Option<String>,
}

impl PlantSearchResult {
    /// Interval suggested by the provider's watering text. Only meant for
    /// fresh results; saved plants keep whatever they were saved with.
    pub fn suggested_interval_days(&self) -> Option<u32> {
        infer_interval_days(self.watering.as_deref())
    }
}

impl Named for PlantSearchResult {
    fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    fn scientific_name(&self) -> Option<&str> {
        self.scientific_name.as_deref()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlantSource {
    Api,
    Manual,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Plant {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub name: String,
    pub species: Option<String>,
    pub image_uri: Option<String>,
    pub watering_guidance: Option<String>,
    pub watering_interval_days: Option<u32>,
    pub last_watered_at: Option<DateTime<Utc>>,
    pub source: PlantSource,
    #[serde(default)]
    pub reminder_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Plant {
    /// Builds the record saved from a search result. This is the only
    /// place where the watering interval gets inferred.
    pub fn from_search(result: &PlantSearchResult, image_uri: Option<String>) -> Self {
        Plant {
            id: None,
            user_id: None,
            name: result.display_name().to_string(),
            species: result.scientific_name.clone(),
            image_uri: image_uri.or_else(|| result.image_url.clone()),
            watering_guidance: result.watering.clone(),
            watering_interval_days: result.suggested_interval_days(),
            last_watered_at: None,
            source: PlantSource::Api,
            reminder_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn manual(name: String, species: Option<String>, interval_days: Option<u32>) -> Self {
        Plant {
            id: None,
            user_id: None,
            name,
            species,
            image_uri: None,
            watering_guidance: None,
            watering_interval_days: interval_days.filter(|d| *d > 0),
            last_watered_at: None,
            source: PlantSource::Manual,
            reminder_id: None,
            created_at: Utc::now(),
        }
    }
}

impl Waterable for Plant {
    fn watering_interval_days(&self) -> Option<u32> {
        self.watering_interval_days
    }

    fn last_watered_at(&self) -> Option<DateTime<Utc>> {
        self.last_watered_at
    }
}

impl Named for Plant {
    fn common_name(&self) -> Option<&str> {
        Some(self.name.as_str()).filter(|n| !n.is_empty())
    }

    fn scientific_name(&self) -> Option<&str> {
        self.species.as_deref()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
}
