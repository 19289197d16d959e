use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use std::error::Error;

use crate::models::{CARS_COLLECTION, SERVICES_COLLECTION, USERS_COLLECTION};

const DEFAULT_DATABASE: &str = "car_management";

/// Database named in the connection string path, or the default.
fn database_name(options: &ClientOptions) -> String {
    options
        .default_database
        .clone()
        .unwrap_or_else(|| DEFAULT_DATABASE.to_string())
}

#[derive(Clone)]
pub struct MongoDB {
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str) -> Result<Self, Box<dyn Error>> {
        let mut client_options = ClientOptions::parse(uri).await?;

        // Connection pool
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(5);
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        let db_name = database_name(&client_options);
        let client = Client::with_options(client_options)?;
        let db = client.database(&db_name);

        // Test connection
        db.list_collection_names().await?;

        let mongodb = Self { db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Handle that has not talked to the server yet: no ping, no indexes.
    #[cfg(test)]
    pub async fn lazy(uri: &str) -> Result<Self, Box<dyn Error>> {
        let client_options = ClientOptions::parse(uri).await?;
        let db_name = database_name(&client_options);
        let client = Client::with_options(client_options)?;
        Ok(Self {
            db: client.database(&db_name),
        })
    }

    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error>> {
        log::info!("🔧 Creating database indexes...");

        let users = self.collection::<Document>(USERS_COLLECTION);
        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        match users.create_index(unique_email).await {
            Ok(_) => log::info!("   ✅ Index created: users(email) unique"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        let cars = self.collection::<Document>(CARS_COLLECTION);
        for keys in [doc! { "owner": 1 }, doc! { "createdAt": -1 }] {
            let label = format!("cars({})", keys.keys().cloned().collect::<Vec<_>>().join(", "));
            match cars.create_index(IndexModel::builder().keys(keys).build()).await {
                Ok(_) => log::info!("   ✅ Index created: {}", label),
                Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
            }
        }

        // Services are always listed per car, newest first
        let services = self.collection::<Document>(SERVICES_COLLECTION);
        let by_car_and_date = IndexModel::builder()
            .keys(doc! { "car": 1, "date": -1 })
            .build();
        match services.create_index(by_car_and_date).await {
            Ok(_) => log::info!("   ✅ Index created: services(car, date)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    /// Check if the connection is healthy
    pub async fn health_check(&self) -> Result<bool, mongodb::error::Error> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_name_comes_from_uri_path() {
        let cases = [
            ("mongodb://localhost", "car_management"),
            ("mongodb://localhost:27017", "car_management"),
            ("mongodb://localhost:27017/", "car_management"),
            ("mongodb://localhost/garage", "garage"),
            ("mongodb://user:pw@db1:27017,db2:27017/garage?replicaSet=rs0", "garage"),
            ("mongodb://localhost/?retryWrites=true", "car_management"),
        ];

        for (uri, expected) in cases {
            let options = ClientOptions::parse(uri).await.unwrap();
            assert_eq!(database_name(&options), expected, "{}", uri);
        }
    }
}
