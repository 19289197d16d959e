use chrono::Datelike;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{flexible, to_rfc3339, OwnerSummary, ServiceResponse};
use crate::utils::AppError;

pub const CARS_COLLECTION: &str = "cars";

const FIRST_CAR_YEAR: i32 = 1886;
const MAX_DESCRIPTION_LEN: usize = 1000;

/// Car document stored in the `cars` collection.
///
/// Services are not embedded: they are looked up by their `car` reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub brand: String,
    pub model: String,
    pub year: i32,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub mileage: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub owner: ObjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<BsonDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<BsonDateTime>,
}

/// Create/update payload. `owner` is deliberately absent: it is set from the
/// authenticated user on create and can never be changed by an update.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct CarInput {
    #[serde(default, deserialize_with = "flexible::option_string")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "flexible::option_string")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "flexible::option_i32")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "flexible::option_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "flexible::option_string")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "flexible::option_f64")]
    pub mileage: Option<f64>,
    #[serde(default, deserialize_with = "flexible::option_string")]
    pub description: Option<String>,
    /// Image URL when no file is uploaded.
    #[serde(default, deserialize_with = "flexible::option_string")]
    pub image: Option<String>,
}

impl CarInput {
    /// Builds the input from multipart text fields.
    pub fn from_form(fields: HashMap<String, String>) -> Result<Self, AppError> {
        let value = serde_json::to_value(fields)
            .map_err(|e| AppError::Internal(format!("Failed to read form fields: {}", e)))?;
        serde_json::from_value(value).map_err(|e| AppError::validation(e.to_string()))
    }

    fn validate(&self) -> Result<(), AppError> {
        if let Some(year) = self.year {
            let max_year = chrono::Utc::now().year() + 1;
            if !(FIRST_CAR_YEAR..=max_year).contains(&year) {
                return Err(AppError::validation(format!(
                    "Year must be between {} and {}",
                    FIRST_CAR_YEAR, max_year
                )));
            }
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(AppError::validation("Price cannot be negative"));
            }
        }
        if let Some(mileage) = self.mileage {
            if !mileage.is_finite() || mileage < 0.0 {
                return Err(AppError::validation("Mileage cannot be negative"));
            }
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(AppError::validation(format!(
                    "Description cannot be more than {} characters",
                    MAX_DESCRIPTION_LEN
                )));
            }
        }
        Ok(())
    }

    /// Checks everything a new car needs, without consuming the input.
    pub fn ensure_creatable(&self) -> Result<(), AppError> {
        self.validate()?;

        if self.brand.is_none() {
            return Err(AppError::validation("Please provide the car brand"));
        }
        if self.model.is_none() {
            return Err(AppError::validation("Please provide the car model"));
        }
        if self.year.is_none() {
            return Err(AppError::validation("Please provide the car year"));
        }
        Ok(())
    }

    pub fn into_new_car(self, owner: ObjectId) -> Result<Car, AppError> {
        self.ensure_creatable()?;

        let (brand, model, year) = match (self.brand, self.model, self.year) {
            (Some(brand), Some(model), Some(year)) => (brand, model, year),
            _ => return Err(AppError::validation("Please provide the car brand, model and year")),
        };

        let now = BsonDateTime::now();
        Ok(Car {
            id: None,
            brand,
            model,
            year,
            price: self.price,
            color: self.color,
            mileage: self.mileage,
            description: self.description,
            image: self.image,
            owner,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    /// `$set` document containing only the provided fields.
    pub fn into_update_doc(self) -> Result<Document, AppError> {
        self.validate()?;

        let mut set = Document::new();
        if let Some(brand) = self.brand {
            set.insert("brand", brand);
        }
        if let Some(model) = self.model {
            set.insert("model", model);
        }
        if let Some(year) = self.year {
            set.insert("year", year);
        }
        if let Some(price) = self.price {
            set.insert("price", price);
        }
        if let Some(color) = self.color {
            set.insert("color", color);
        }
        if let Some(mileage) = self.mileage {
            set.insert("mileage", mileage);
        }
        if let Some(description) = self.description {
            set.insert("description", description);
        }
        if let Some(image) = self.image {
            set.insert("image", image);
        }
        set.insert("updatedAt", BsonDateTime::now());

        Ok(doc! { "$set": set })
    }
}

/// Owner as returned to clients: populated when the user still exists.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum OwnerField {
    Populated(OwnerSummary),
    Id(String),
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CarResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price: Option<f64>,
    pub color: Option<String>,
    pub mileage: Option<f64>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub owner: OwnerField,
    pub services: Vec<ServiceResponse>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl CarResponse {
    pub fn new(car: Car, owner: Option<OwnerSummary>, services: Vec<ServiceResponse>) -> Self {
        let owner = match owner {
            Some(summary) => OwnerField::Populated(summary),
            None => OwnerField::Id(car.owner.to_hex()),
        };

        CarResponse {
            id: car.id.map(|id| id.to_hex()).unwrap_or_default(),
            brand: car.brand,
            model: car.model,
            year: car.year,
            price: car.price,
            color: car.color,
            mileage: car.mileage,
            description: car.description,
            image: car.image,
            owner,
            services,
            created_at: car.created_at.map(to_rfc3339),
            updated_at: car.updated_at.map(to_rfc3339),
        }
    }
}

/// Summary embedded in service responses.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CarSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl CarSummary {
    pub fn from_car(car: &Car, include_owner: bool) -> Self {
        CarSummary {
            id: car.id.map(|id| id.to_hex()).unwrap_or_default(),
            brand: car.brand.clone(),
            model: car.model.clone(),
            year: car.year,
            owner: include_owner.then(|| car.owner.to_hex()),
        }
    }
}
