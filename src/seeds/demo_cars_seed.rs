use crate::database::MongoDB;
use crate::models::{Car, Role, User, CARS_COLLECTION, USERS_COLLECTION};
use bcrypt::{hash, DEFAULT_COST};
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime};

const SEED_EMAIL: &str = "seeduser@example.com";
const SEED_PASSWORD: &str = "password123";

struct DemoCar {
    brand: &'static str,
    model: &'static str,
    year: i32,
    price: f64,
    color: &'static str,
    mileage: f64,
    description: &'static str,
    image: &'static str,
}

const DEMO_CARS: [DemoCar; 5] = [
    DemoCar {
        brand: "Hyundai",
        model: "i20",
        year: 2021,
        price: 9000.0,
        color: "White",
        mileage: 24000.0,
        description: "Compact hatchback in great condition.",
        image: "https://images.unsplash.com/photo-1590431252400-9f3b9e2d1f8a?q=80&w=1200&auto=format&fit=crop",
    },
    DemoCar {
        brand: "Maruti Suzuki",
        model: "Swift",
        year: 2020,
        price: 8000.0,
        color: "Red",
        mileage: 30000.0,
        description: "Reliable daily driver with good mileage.",
        image: "https://images.unsplash.com/photo-1549921296-3a6b6a53c9b3?q=80&w=1200&auto=format&fit=crop",
    },
    DemoCar {
        brand: "Tata",
        model: "Nexon",
        year: 2022,
        price: 14000.0,
        color: "Blue",
        mileage: 15000.0,
        description: "Compact SUV with modern safety features.",
        image: "https://images.unsplash.com/photo-1549923746-c502d488b3ea?q=80&w=1200&auto=format&fit=crop",
    },
    DemoCar {
        brand: "Honda",
        model: "City",
        year: 2019,
        price: 11000.0,
        color: "Silver",
        mileage: 42000.0,
        description: "Spacious sedan, smooth ride, single owner.",
        image: "https://images.unsplash.com/photo-1525609004556-c46c7d6cf023?q=80&w=1200&auto=format&fit=crop",
    },
    DemoCar {
        brand: "Toyota",
        model: "Corolla",
        year: 2018,
        price: 10500.0,
        color: "Grey",
        mileage: 50000.0,
        description: "Well-maintained, service history available.",
        image: "https://images.unsplash.com/photo-1511919884226-fd3cad34687c?q=80&w=1200&auto=format&fit=crop",
    },
];

impl DemoCar {
    fn to_car(&self, owner: ObjectId) -> Car {
        let now = BsonDateTime::now();
        Car {
            id: None,
            brand: self.brand.to_string(),
            model: self.model.to_string(),
            year: self.year,
            price: Some(self.price),
            color: Some(self.color.to_string()),
            mileage: Some(self.mileage),
            description: Some(self.description.to_string()),
            image: Some(self.image.to_string()),
            owner,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

/// First existing user, or a freshly created seed user.
async fn ensure_owner(db: &MongoDB) -> Result<ObjectId, String> {
    let users = db.collection::<User>(USERS_COLLECTION);

    if let Some(id) = users
        .find_one(doc! {})
        .await
        .map_err(|e| e.to_string())?
        .and_then(|user| user.id)
    {
        return Ok(id);
    }

    let now = BsonDateTime::now();
    let seed_user = User {
        id: None,
        name: "Seed User".into(),
        email: SEED_EMAIL.into(),
        password: hash(SEED_PASSWORD, DEFAULT_COST).map_err(|e| e.to_string())?,
        role: Role::User,
        created_at: Some(now),
        updated_at: Some(now),
    };

    let result = users.insert_one(&seed_user).await.map_err(|e| e.to_string())?;
    log::info!("   👤 Created seed user {}", SEED_EMAIL);

    result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| "Seed user insert returned no id".to_string())
}

/// Inserts the demo cars whose brand and model are not in the collection yet.
pub async fn seed_demo_cars(db: &MongoDB) {
    log::info!("🌱 Demo cars: checking seed data...");

    let owner = match ensure_owner(db).await {
        Ok(owner) => owner,
        Err(e) => {
            log::error!("   ❌ Failed to prepare seed owner: {}", e);
            return;
        }
    };

    let cars = db.collection::<Car>(CARS_COLLECTION);
    let mut missing = Vec::new();

    for demo in DEMO_CARS.iter() {
        let exists = cars
            .count_documents(doc! { "brand": demo.brand, "model": demo.model })
            .await
            .unwrap_or(0);
        if exists == 0 {
            missing.push(demo.to_car(owner));
        }
    }

    if missing.is_empty() {
        log::info!("   ✅ Demo cars already present, skipping seed");
        return;
    }

    match cars.insert_many(&missing).await {
        Ok(result) => log::info!("   ✅ Inserted {} demo cars", result.inserted_ids.len()),
        Err(e) => log::error!("   ❌ Failed to seed demo cars: {}", e),
    }
}
