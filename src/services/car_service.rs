use crate::{
    database::MongoDB,
    middleware::AuthUser,
    models::{
        Car, CarInput, CarResponse, OwnerSummary, ServiceRecord, ServiceResponse, User,
        CARS_COLLECTION, SERVICES_COLLECTION, USERS_COLLECTION,
    },
    utils::{access, AppError},
};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use std::collections::HashMap;

fn car_not_found() -> AppError {
    AppError::not_found("Car not found")
}

/// Malformed ids are reported as a missing car.
pub fn parse_car_id(id: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(id.trim()).map_err(|_| car_not_found())
}

pub async fn find_car(db: &MongoDB, id: &str) -> Result<Car, AppError> {
    let car_id = parse_car_id(id)?;
    db.collection::<Car>(CARS_COLLECTION)
        .find_one(doc! { "_id": car_id })
        .await?
        .ok_or_else(car_not_found)
}

async fn find_cars(db: &MongoDB, filter: Document) -> Result<Vec<Car>, AppError> {
    let cars = db
        .collection::<Car>(CARS_COLLECTION)
        .find(filter)
        .sort(doc! { "createdAt": -1 })
        .await?
        .try_collect()
        .await?;
    Ok(cars)
}

/// Services grouped by car, newest service date first.
async fn services_by_car(
    db: &MongoDB,
    car_ids: &[ObjectId],
) -> Result<HashMap<ObjectId, Vec<ServiceResponse>>, AppError> {
    if car_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let records: Vec<ServiceRecord> = db
        .collection::<ServiceRecord>(SERVICES_COLLECTION)
        .find(doc! { "car": { "$in": car_ids.to_vec() } })
        .sort(doc! { "date": -1 })
        .await?
        .try_collect()
        .await?;

    let mut grouped: HashMap<ObjectId, Vec<ServiceResponse>> = HashMap::new();
    for record in records {
        grouped
            .entry(record.car)
            .or_default()
            .push(ServiceResponse::new(record, None));
    }
    Ok(grouped)
}

async fn owners_by_id(
    db: &MongoDB,
    owner_ids: Vec<ObjectId>,
) -> Result<HashMap<ObjectId, OwnerSummary>, AppError> {
    if owner_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let users: Vec<User> = db
        .collection::<User>(USERS_COLLECTION)
        .find(doc! { "_id": { "$in": owner_ids } })
        .await?
        .try_collect()
        .await?;

    Ok(users
        .iter()
        .filter_map(|user| user.id.map(|id| (id, OwnerSummary::from(user))))
        .collect())
}

/// Attaches owner summaries and service history to each car.
async fn populate(db: &MongoDB, cars: Vec<Car>) -> Result<Vec<CarResponse>, AppError> {
    let car_ids: Vec<ObjectId> = cars.iter().filter_map(|car| car.id).collect();

    let mut owner_ids: Vec<ObjectId> = cars.iter().map(|car| car.owner).collect();
    owner_ids.sort();
    owner_ids.dedup();

    let mut services = services_by_car(db, &car_ids).await?;
    let owners = owners_by_id(db, owner_ids).await?;

    Ok(cars
        .into_iter()
        .map(|car| {
            let owner = owners.get(&car.owner).cloned();
            let history = car
                .id
                .and_then(|id| services.remove(&id))
                .unwrap_or_default();
            CarResponse::new(car, owner, history)
        })
        .collect())
}

async fn populate_one(db: &MongoDB, car: Car) -> Result<CarResponse, AppError> {
    populate(db, vec![car])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("Car disappeared while loading".into()))
}

pub async fn list_cars(db: &MongoDB) -> Result<Vec<CarResponse>, AppError> {
    let cars = find_cars(db, doc! {}).await?;
    populate(db, cars).await
}

pub async fn my_cars(db: &MongoDB, requester: &AuthUser) -> Result<Vec<CarResponse>, AppError> {
    let cars = find_cars(db, doc! { "owner": requester.id }).await?;
    populate(db, cars).await
}

pub async fn get_car(db: &MongoDB, id: &str) -> Result<CarResponse, AppError> {
    let car = find_car(db, id).await?;
    populate_one(db, car).await
}

pub async fn create_car(
    db: &MongoDB,
    requester: &AuthUser,
    input: CarInput,
) -> Result<CarResponse, AppError> {
    let mut car = input.into_new_car(requester.id)?;

    let result = db
        .collection::<Car>(CARS_COLLECTION)
        .insert_one(&car)
        .await?;
    car.id = result.inserted_id.as_object_id();

    log::info!(
        "🚗 Car created: {} {} ({}) by {}",
        car.brand,
        car.model,
        car.year,
        requester.email
    );

    populate_one(db, car).await
}

/// Loads the car and checks that the requester may change it.
pub async fn find_modifiable_car(
    db: &MongoDB,
    requester: &AuthUser,
    id: &str,
    action: &str,
) -> Result<Car, AppError> {
    let car = find_car(db, id).await?;
    access::ensure_can_modify(requester, &car.owner, action)?;
    Ok(car)
}

/// Writes `input` onto a car that already passed the ownership check.
pub async fn apply_car_update(
    db: &MongoDB,
    requester: &AuthUser,
    car: Car,
    input: CarInput,
) -> Result<CarResponse, AppError> {
    let update = input.into_update_doc()?;
    let car_id = car.id.ok_or_else(car_not_found)?;

    let collection = db.collection::<Car>(CARS_COLLECTION);
    collection.update_one(doc! { "_id": car_id }, update).await?;

    let updated = collection
        .find_one(doc! { "_id": car_id })
        .await?
        .ok_or_else(car_not_found)?;

    log::info!("✏️  Car {} updated by {}", car_id, requester.email);

    populate_one(db, updated).await
}

/// Deletes the car and every service recorded against it.
pub async fn delete_car(db: &MongoDB, requester: &AuthUser, id: &str) -> Result<(), AppError> {
    let car = find_modifiable_car(db, requester, id, "delete this car").await?;

    let car_id = car.id.ok_or_else(car_not_found)?;

    let removed = db
        .collection::<ServiceRecord>(SERVICES_COLLECTION)
        .delete_many(doc! { "car": car_id })
        .await?;

    db.collection::<Car>(CARS_COLLECTION)
        .delete_one(doc! { "_id": car_id })
        .await?;

    log::info!(
        "🗑️  Car {} deleted by {} ({} services removed)",
        car_id,
        requester.email,
        removed.deleted_count
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_malformed_id_is_not_found() {
        for id in ["", "123", "not-an-object-id", "zzzzzzzzzzzzzzzzzzzzzzzz"] {
            let err = parse_car_id(id).unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)));
            assert_eq!(err.to_string(), "Car not found");
        }

        let id = ObjectId::new();
        assert_eq!(parse_car_id(&id.to_hex()).unwrap(), id);
    }

    async fn test_db() -> MongoDB {
        let uri = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017/car_management_test".to_string());
        MongoDB::new(&uri).await.unwrap()
    }

    fn requester(role: Role) -> AuthUser {
        AuthUser {
            id: ObjectId::new(),
            email: "owner@example.com".into(),
            name: "Owner".into(),
            role,
        }
    }

    fn nexon() -> CarInput {
        CarInput {
            brand: Some("Tata".into()),
            model: Some("Nexon".into()),
            year: Some(2022),
            price: Some(14000.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    #[ignore] // Requires a running MongoDB
    async fn test_car_lifecycle_and_ownership() {
        let db = test_db().await;
        let owner = requester(Role::User);
        let stranger = requester(Role::User);
        let admin = requester(Role::Admin);

        let created = create_car(&db, &owner, nexon()).await.unwrap();
        assert!(created.services.is_empty());

        let err = find_modifiable_car(&db, &stranger, &created.id, "update this car")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Not authorized to update this car");

        let update = CarInput {
            color: Some("Blue".into()),
            ..Default::default()
        };
        let target = find_modifiable_car(&db, &admin, &created.id, "update this car")
            .await
            .unwrap();
        let updated = apply_car_update(&db, &admin, target, update).await.unwrap();
        assert_eq!(updated.color.as_deref(), Some("Blue"));
        assert_eq!(updated.brand, "Tata");

        let mine = my_cars(&db, &owner).await.unwrap();
        assert_eq!(mine.len(), 1);

        let err = delete_car(&db, &stranger, &created.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        delete_car(&db, &owner, &created.id).await.unwrap();
        let err = get_car(&db, &created.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
