use crate::{
    database::MongoDB,
    middleware::AuthUser,
    models::{
        parse_date, Car, CarSummary, ServiceInput, ServiceRecord, ServiceResponse, CARS_COLLECTION,
        SERVICES_COLLECTION,
    },
    razorpay::PaymentGateway,
    services::{car_service, payment_service},
    utils::{access, AppError},
};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, to_bson, DateTime as BsonDateTime, Document};
use std::collections::HashMap;

const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_PROVIDER_LEN: usize = 100;

fn service_not_found() -> AppError {
    AppError::not_found("Service not found")
}

fn parse_optional_date(value: Option<&str>, field: &str) -> Result<Option<BsonDateTime>, AppError> {
    match value {
        None => Ok(None),
        Some(raw) => parse_date(raw)
            .map(Some)
            .ok_or_else(|| AppError::validation(format!("Invalid {}: {}", field, raw))),
    }
}

fn validate(input: &ServiceInput) -> Result<(), AppError> {
    if let Some(description) = &input.description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(AppError::validation(format!(
                "Description cannot be more than {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
    }
    if let Some(cost) = input.cost {
        if !cost.is_finite() || cost < 0.0 {
            return Err(AppError::validation("Cost cannot be negative"));
        }
    }
    if let Some(provider) = &input.service_provider {
        if provider.chars().count() > MAX_PROVIDER_LEN {
            return Err(AppError::validation(format!(
                "Service provider cannot be more than {} characters",
                MAX_PROVIDER_LEN
            )));
        }
    }
    Ok(())
}

async fn find_service(db: &MongoDB, id: &str) -> Result<ServiceRecord, AppError> {
    let service_id = ObjectId::parse_str(id.trim()).map_err(|_| service_not_found())?;
    db.collection::<ServiceRecord>(SERVICES_COLLECTION)
        .find_one(doc! { "_id": service_id })
        .await?
        .ok_or_else(service_not_found)
}

/// The car a service belongs to, used for the ownership check.
async fn owning_car(db: &MongoDB, record: &ServiceRecord) -> Result<Car, AppError> {
    db.collection::<Car>(CARS_COLLECTION)
        .find_one(doc! { "_id": record.car })
        .await?
        .ok_or_else(|| AppError::not_found("Car not found"))
}

async fn find_services(db: &MongoDB, filter: Document) -> Result<Vec<ServiceRecord>, AppError> {
    let records = db
        .collection::<ServiceRecord>(SERVICES_COLLECTION)
        .find(filter)
        .sort(doc! { "date": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(records)
}

pub async fn create_service(
    db: &MongoDB,
    gateway: &PaymentGateway,
    requester: &AuthUser,
    input: ServiceInput,
) -> Result<ServiceResponse, AppError> {
    let car_id = input
        .car
        .as_deref()
        .ok_or_else(|| AppError::validation("Please provide the car for this service"))?;
    let car = car_service::find_car(db, car_id).await?;
    access::ensure_can_modify(requester, &car.owner, "add service to this car")?;

    validate(&input)?;
    let description = input
        .description
        .clone()
        .ok_or_else(|| AppError::validation("Please provide a service description"))?;
    let cost = input
        .cost
        .ok_or_else(|| AppError::validation("Please provide the service cost"))?;

    let date = parse_optional_date(input.date.as_deref(), "date")?.unwrap_or_else(BsonDateTime::now);
    let next_service_date = parse_optional_date(input.next_service_date.as_deref(), "nextServiceDate")?;

    let payment_details = payment_service::resolve_payment_details(
        gateway,
        input.payment_details.as_ref(),
        Some(cost),
        None,
    )?
    .unwrap_or_default();

    let now = BsonDateTime::now();
    let mut record = ServiceRecord {
        id: None,
        car: car.id.ok_or_else(|| AppError::not_found("Car not found"))?,
        date,
        description,
        cost,
        service_type: input.service_type.unwrap_or_default(),
        next_service_date,
        service_provider: input.service_provider,
        payment_details,
        created_at: Some(now),
        updated_at: Some(now),
    };

    let result = db
        .collection::<ServiceRecord>(SERVICES_COLLECTION)
        .insert_one(&record)
        .await?;
    record.id = result.inserted_id.as_object_id();

    log::info!(
        "🔧 Service added to car {} by {} (payment {})",
        record.car,
        requester.email,
        record.payment_details.status.as_str()
    );

    Ok(ServiceResponse::new(record, Some(CarSummary::from_car(&car, false))))
}

pub async fn list_for_car(db: &MongoDB, car_id: &str) -> Result<Vec<ServiceResponse>, AppError> {
    let car = car_service::find_car(db, car_id).await?;
    let car_id = car.id.ok_or_else(|| AppError::not_found("Car not found"))?;

    let records = find_services(db, doc! { "car": car_id }).await?;
    Ok(records
        .into_iter()
        .map(|record| ServiceResponse::new(record, None))
        .collect())
}

/// Every service in the system with its car summary. Admin only.
pub async fn list_all(db: &MongoDB, requester: &AuthUser) -> Result<Vec<ServiceResponse>, AppError> {
    requester.require_admin()?;

    let records = find_services(db, doc! {}).await?;

    let mut car_ids: Vec<ObjectId> = records.iter().map(|r| r.car).collect();
    car_ids.sort();
    car_ids.dedup();

    let cars: Vec<Car> = db
        .collection::<Car>(CARS_COLLECTION)
        .find(doc! { "_id": { "$in": car_ids } })
        .await?
        .try_collect()
        .await?;
    let cars: HashMap<ObjectId, CarSummary> = cars
        .iter()
        .filter_map(|car| car.id.map(|id| (id, CarSummary::from_car(car, true))))
        .collect();

    Ok(records
        .into_iter()
        .map(|record| {
            let car = cars.get(&record.car).cloned();
            ServiceResponse::new(record, car)
        })
        .collect())
}

/// A service together with its car, once the requester may change it.
pub struct ModifiableService {
    record: ServiceRecord,
    car: Car,
}

pub async fn find_modifiable_service(
    db: &MongoDB,
    requester: &AuthUser,
    id: &str,
    action: &str,
) -> Result<ModifiableService, AppError> {
    let record = find_service(db, id).await?;
    let car = owning_car(db, &record).await?;
    access::ensure_can_modify(requester, &car.owner, action)?;
    Ok(ModifiableService { record, car })
}

pub async fn apply_service_update(
    db: &MongoDB,
    gateway: &PaymentGateway,
    requester: &AuthUser,
    target: ModifiableService,
    input: ServiceInput,
) -> Result<ServiceResponse, AppError> {
    let ModifiableService { record: existing, car } = target;

    validate(&input)?;

    let mut set = Document::new();
    if let Some(date) = parse_optional_date(input.date.as_deref(), "date")? {
        set.insert("date", date);
    }
    if let Some(description) = &input.description {
        set.insert("description", description.clone());
    }
    if let Some(cost) = input.cost {
        set.insert("cost", cost);
    }
    if let Some(service_type) = input.service_type {
        set.insert("serviceType", service_type.as_str());
    }
    if let Some(next) = parse_optional_date(input.next_service_date.as_deref(), "nextServiceDate")? {
        set.insert("nextServiceDate", next);
    }
    if let Some(provider) = &input.service_provider {
        set.insert("serviceProvider", provider.clone());
    }

    let payment_details = payment_service::resolve_payment_details(
        gateway,
        input.payment_details.as_ref(),
        input.cost.or(Some(existing.cost)),
        Some(&existing.payment_details),
    )?;
    if let Some(details) = payment_details {
        let details = to_bson(&details)
            .map_err(|e| AppError::Internal(format!("Failed to encode payment details: {}", e)))?;
        set.insert("paymentDetails", details);
    }

    set.insert("updatedAt", BsonDateTime::now());

    let service_id = existing.id.ok_or_else(service_not_found)?;
    let collection = db.collection::<ServiceRecord>(SERVICES_COLLECTION);
    collection
        .update_one(doc! { "_id": service_id }, doc! { "$set": set })
        .await?;

    let updated = collection
        .find_one(doc! { "_id": service_id })
        .await?
        .ok_or_else(service_not_found)?;

    log::info!("✏️  Service {} updated by {}", service_id, requester.email);

    Ok(ServiceResponse::new(updated, Some(CarSummary::from_car(&car, false))))
}

pub async fn delete_service(db: &MongoDB, requester: &AuthUser, id: &str) -> Result<(), AppError> {
    let ModifiableService { record: existing, .. } =
        find_modifiable_service(db, requester, id, "delete this service").await?;

    let service_id = existing.id.ok_or_else(service_not_found)?;
    db.collection::<ServiceRecord>(SERVICES_COLLECTION)
        .delete_one(doc! { "_id": service_id })
        .await?;

    log::info!("🗑️  Service {} deleted by {}", service_id, requester.email);

    Ok(())
}
