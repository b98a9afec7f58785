pub mod error;
pub mod models;
pub mod notifier;
pub mod schema;
pub mod store;

use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl, SimpleAsyncConnection as _};
pub use error::DatabaseError;
use hostel_occupancy_ledger::model::{RoomId, RoomType, StudentId};
use hostel_occupancy_ledger::Role;
pub use notifier::DatabaseNotifier;
pub use store::PostgresStore;

use crate::models::{NewRoom, NewUser};
use crate::schema::{rooms, users};

pub type Pool = diesel_async::pooled_connection::deadpool::Pool<AsyncPgConnection>;

const SCHEMA: &str = include_str!("../migrations/00000000000001_create_occupancy/up.sql");

// https://github.com/tokio-rs/axum/tree/main/examples/diesel-async-postgres

pub fn get_database_connection(database_url: &str) -> Result<Pool, DatabaseError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Ok(Pool::builder(config).build()?)
}

pub fn get_database_connection_from_env() -> Result<Pool, DatabaseError> {
    let database_url = std::env::var("DATABASE_URL")?;
    get_database_connection(&database_url)
}

/// Creates the tables if they do not exist yet.
pub async fn run_migrations(pool: &Pool) -> Result<(), DatabaseError> {
    let mut connection = pool.get().await?;
    let connection: &mut AsyncPgConnection = &mut connection;
    connection.batch_execute(SCHEMA).await?;
    Ok(())
}

pub async fn create_user(pool: &Pool, name: &str, role: Role) -> Result<StudentId, DatabaseError> {
    let mut connection = pool.get().await?;
    let connection: &mut AsyncPgConnection = &mut connection;
    let id = diesel::insert_into(users::table)
        .values(NewUser {
            name,
            role: role.as_str(),
        })
        .returning(users::id)
        .get_result::<i32>(connection)
        .await?;
    Ok(StudentId(id))
}

pub async fn create_room(
    pool: &Pool,
    number: &str,
    room_type: RoomType,
    capacity: u32,
    price: f64,
) -> Result<RoomId, DatabaseError> {
    let mut connection = pool.get().await?;
    let connection: &mut AsyncPgConnection = &mut connection;
    let capacity = i32::try_from(capacity).map_err(|_| DatabaseError::OutOfRange {
        column: "rooms.capacity",
        value: capacity.into(),
    })?;
    let id = diesel::insert_into(rooms::table)
        .values(NewRoom {
            number,
            room_type: room_type.as_str(),
            capacity,
            price,
        })
        .returning(rooms::id)
        .get_result::<i32>(connection)
        .await?;
    Ok(RoomId(id))
}

/// The rooms of a fresh install. Existing room numbers are left alone.
pub async fn seed_rooms(pool: &Pool) -> Result<(), DatabaseError> {
    let mut connection = pool.get().await?;
    let connection: &mut AsyncPgConnection = &mut connection;
    let blocks = [
        ('A', 101..=105, RoomType::TwoSharing, 2, 5000.0),
        ('B', 201..=205, RoomType::ThreeSharing, 3, 3500.0),
    ];
    for (block, numbers, room_type, capacity, price) in blocks {
        for number in numbers {
            let number = format!("{block}-{number}");
            diesel::insert_into(rooms::table)
                .values(NewRoom {
                    number: &number,
                    room_type: room_type.as_str(),
                    capacity,
                    price,
                })
                .on_conflict(rooms::number)
                .do_nothing()
                .execute(connection)
                .await?;
        }
    }
    Ok(())
}
