use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Executor, Pool, Postgres, Row, Transaction,
};
use uuid::Uuid;

use super::{Store, StoreTx};
use crate::entities::{Booking, BookingStatus, Car, Member, Review, Trip, TripStatus};
use crate::error::{unexpected_error, Error};

type Database = Postgres;

const TRIP_COLUMNS: &str = "id, driver_id, car_id, origin, destination, start_time, duration_min, total_seats, available_seats, price, status, avg_rating";

const BOOKING_COLUMNS: &str = "id, trip_id, passenger_id, status, created_at";

pub struct PgStore {
    pool: Pool<Database>,
}

pub struct PgTx {
    tx: Transaction<'static, Database>,
}

impl PgStore {
    #[tracing::instrument(name = "PgStore::new", skip(db_uri))]
    pub async fn new(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        // TODO: move this to sqlx migrations once the schema settles
        pool.execute("CREATE TABLE IF NOT EXISTS members (id UUID PRIMARY KEY, name VARCHAR NOT NULL, phone VARCHAR NOT NULL UNIQUE)")
            .await?;
        pool.execute("CREATE TABLE IF NOT EXISTS cars (id UUID PRIMARY KEY, owner_id UUID NOT NULL REFERENCES members(id), brand VARCHAR NOT NULL, model VARCHAR NOT NULL, seats INT4 NOT NULL CHECK (seats > 0))")
            .await?;

        pool.execute(
            "
            CREATE TABLE IF NOT EXISTS trips (
                id UUID PRIMARY KEY,
                driver_id UUID NOT NULL REFERENCES members(id),
                car_id UUID NOT NULL REFERENCES cars(id),
                origin VARCHAR NOT NULL,
                destination VARCHAR NOT NULL,
                start_time TIMESTAMPTZ NOT NULL,
                duration_min INT4 NOT NULL CHECK (duration_min BETWEEN 0 AND 10080),
                total_seats INT4 NOT NULL CHECK (total_seats > 0),
                available_seats INT4 NOT NULL,
                price INT8 NOT NULL CHECK (price >= 0),
                status VARCHAR NOT NULL,
                avg_rating FLOAT8 NOT NULL DEFAULT 0,
                CONSTRAINT trips_seat_inventory CHECK (available_seats BETWEEN 0 AND total_seats),
                CONSTRAINT trips_avg_rating CHECK (avg_rating BETWEEN 0 AND 5)
            )
            ",
        )
        .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS trips_status_start_time ON trips (status, start_time)")
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS bookings (id UUID PRIMARY KEY, trip_id UUID NOT NULL REFERENCES trips(id), passenger_id UUID NOT NULL REFERENCES members(id), status VARCHAR NOT NULL, created_at TIMESTAMPTZ NOT NULL)")
            .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS bookings_trip_status ON bookings (trip_id, status)")
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS reviews (id UUID PRIMARY KEY, author_id UUID NOT NULL REFERENCES members(id), trip_id UUID NOT NULL REFERENCES trips(id), text TEXT NOT NULL, rating INT2 NOT NULL CHECK (rating BETWEEN 1 AND 5), created_at TIMESTAMPTZ NOT NULL, CONSTRAINT reviews_one_per_author UNIQUE (trip_id, author_id))")
            .await?;

        Ok(Self { pool })
    }

    pub async fn insert_member(&self, member: &Member) -> Result<(), Error> {
        sqlx::query("INSERT INTO members (id, name, phone) VALUES ($1, $2, $3)")
            .bind(&member.id)
            .bind(&member.name)
            .bind(&member.phone)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn insert_car(&self, car: &Car) -> Result<(), Error> {
        sqlx::query("INSERT INTO cars (id, owner_id, brand, model, seats) VALUES ($1, $2, $3, $4, $5)")
            .bind(&car.id)
            .bind(&car.owner_id)
            .bind(&car.brand)
            .bind(&car.model)
            .bind(car.seats)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn trip_from_row(row: &PgRow) -> Result<Trip, Error> {
    let status: String = row.try_get("status")?;

    Ok(Trip {
        id: row.try_get("id")?,
        driver_id: row.try_get("driver_id")?,
        car_id: row.try_get("car_id")?,
        origin: row.try_get("origin")?,
        destination: row.try_get("destination")?,
        start_time: row.try_get("start_time")?,
        duration_min: row.try_get("duration_min")?,
        total_seats: row.try_get("total_seats")?,
        available_seats: row.try_get("available_seats")?,
        price: row.try_get("price")?,
        status: TripStatus::from_name(&status).map_err(|_| unexpected_error())?,
        avg_rating: row.try_get("avg_rating")?,
    })
}

fn booking_from_row(row: &PgRow) -> Result<Booking, Error> {
    let status: String = row.try_get("status")?;

    Ok(Booking {
        id: row.try_get("id")?,
        trip_id: row.try_get("trip_id")?,
        passenger_id: row.try_get("passenger_id")?,
        status: BookingStatus::from_name(&status).map_err(|_| unexpected_error())?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<Self::Tx, Error> {
        let tx = self.pool.begin().await?;

        Ok(PgTx { tx })
    }

    #[tracing::instrument(skip(self))]
    async fn find_trip(&self, id: Uuid) -> Result<Option<Trip>, Error> {
        let query = format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS);

        sqlx::query(&query)
            .bind(&id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| trip_from_row(&row))
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, Error> {
        let query = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);

        sqlx::query(&query)
            .bind(&id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| booking_from_row(&row))
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn advance_statuses_due_by(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        // both predicates read the pre-statement status, so a trip whose
        // whole window elapsed lands in completed within a single tick
        let query = "
            UPDATE trips
            SET
                status = CASE
                    WHEN start_time + make_interval(mins => duration_min) <= $1 THEN 'completed'
                    ELSE 'in_progress'
                END
            WHERE
                (status = 'scheduled' AND start_time <= $1)
                OR (
                    status = 'in_progress'
                    AND start_time + make_interval(mins => duration_min) <= $1
                )
        ";

        let result = sqlx::query(query).bind(now).execute(&self.pool).await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn find_member(&mut self, id: Uuid) -> Result<Option<Member>, Error> {
        let maybe_row = sqlx::query("SELECT id, name, phone FROM members WHERE id = $1")
            .bind(&id)
            .fetch_optional(&mut self.tx)
            .await?;

        match maybe_row {
            Some(row) => Ok(Some(Member {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                phone: row.try_get("phone")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_car(&mut self, id: Uuid) -> Result<Option<Car>, Error> {
        let maybe_row =
            sqlx::query("SELECT id, owner_id, brand, model, seats FROM cars WHERE id = $1")
                .bind(&id)
                .fetch_optional(&mut self.tx)
                .await?;

        match maybe_row {
            Some(row) => Ok(Some(Car {
                id: row.try_get("id")?,
                owner_id: row.try_get("owner_id")?,
                brand: row.try_get("brand")?,
                model: row.try_get("model")?,
                seats: row.try_get("seats")?,
            })),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn insert_trip(&mut self, trip: &Trip) -> Result<(), Error> {
        let query = format!(
            "INSERT INTO trips ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            TRIP_COLUMNS
        );

        sqlx::query(&query)
            .bind(&trip.id)
            .bind(&trip.driver_id)
            .bind(&trip.car_id)
            .bind(&trip.origin)
            .bind(&trip.destination)
            .bind(trip.start_time)
            .bind(trip.duration_min)
            .bind(trip.total_seats)
            .bind(trip.available_seats)
            .bind(trip.price)
            .bind(trip.status.name())
            .bind(trip.avg_rating)
            .execute(&mut self.tx)
            .await?;

        Ok(())
    }

    async fn find_trip(&mut self, id: Uuid) -> Result<Option<Trip>, Error> {
        let query = format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS);

        sqlx::query(&query)
            .bind(&id)
            .fetch_optional(&mut self.tx)
            .await?
            .map(|row| trip_from_row(&row))
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_trip_for_update(&mut self, id: Uuid) -> Result<Option<Trip>, Error> {
        let query = format!("SELECT {} FROM trips WHERE id = $1 FOR UPDATE", TRIP_COLUMNS);

        sqlx::query(&query)
            .bind(&id)
            .fetch_optional(&mut self.tx)
            .await?
            .map(|row| trip_from_row(&row))
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn decrement_seat_if_available(&mut self, trip_id: Uuid) -> Result<bool, Error> {
        let result = sqlx::query(
            "UPDATE trips SET available_seats = available_seats - 1 WHERE id = $1 AND status = 'scheduled' AND available_seats > 0",
        )
        .bind(&trip_id)
        .execute(&mut self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self))]
    async fn increment_seat(&mut self, trip_id: Uuid) -> Result<bool, Error> {
        let result = sqlx::query(
            "UPDATE trips SET available_seats = available_seats + 1 WHERE id = $1 AND available_seats < total_seats",
        )
        .bind(&trip_id)
        .execute(&mut self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self))]
    async fn update_average_rating(&mut self, trip_id: Uuid, value: f64) -> Result<(), Error> {
        sqlx::query("UPDATE trips SET avg_rating = $2 WHERE id = $1")
            .bind(&trip_id)
            .bind(value)
            .execute(&mut self.tx)
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_trip_if_scheduled(&mut self, trip_id: Uuid) -> Result<bool, Error> {
        let result = sqlx::query(
            "UPDATE trips SET status = 'cancelled', available_seats = total_seats WHERE id = $1 AND status = 'scheduled'",
        )
        .bind(&trip_id)
        .execute(&mut self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self))]
    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), Error> {
        let query = format!(
            "INSERT INTO bookings ({}) VALUES ($1, $2, $3, $4, $5)",
            BOOKING_COLUMNS
        );

        sqlx::query(&query)
            .bind(&booking.id)
            .bind(&booking.trip_id)
            .bind(&booking.passenger_id)
            .bind(booking.status.name())
            .bind(booking.created_at)
            .execute(&mut self.tx)
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_booking_for_update(&mut self, id: Uuid) -> Result<Option<Booking>, Error> {
        let query = format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        );

        sqlx::query(&query)
            .bind(&id)
            .fetch_optional(&mut self.tx)
            .await?
            .map(|row| booking_from_row(&row))
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn update_booking_status(&mut self, booking: &Booking) -> Result<(), Error> {
        sqlx::query("UPDATE bookings SET status = $2 WHERE id = $1")
            .bind(&booking.id)
            .bind(booking.status.name())
            .execute(&mut self.tx)
            .await?;

        Ok(())
    }

    async fn find_bookings_by_trip(
        &mut self,
        trip_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, Error> {
        let query = format!(
            "SELECT {} FROM bookings WHERE trip_id = $1 AND ($2::VARCHAR IS NULL OR status = $2) ORDER BY created_at ASC",
            BOOKING_COLUMNS
        );

        let mut rows = sqlx::query(&query)
            .bind(&trip_id)
            .bind(status.map(|s| s.name()))
            .fetch(&mut self.tx);

        let mut bookings = Vec::new();
        while let Some(row) = rows.try_next().await? {
            bookings.push(booking_from_row(&row)?);
        }

        Ok(bookings)
    }

    async fn has_confirmed_booking(
        &mut self,
        trip_id: Uuid,
        passenger_id: Uuid,
    ) -> Result<bool, Error> {
        let present: bool = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM bookings WHERE trip_id = $1 AND passenger_id = $2 AND status = 'confirmed') AS present",
        )
        .bind(&trip_id)
        .bind(&passenger_id)
        .fetch_one(&mut self.tx)
        .await?
        .try_get("present")?;

        Ok(present)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_active_bookings(&mut self, trip_id: Uuid) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'cancelled' WHERE trip_id = $1 AND status IN ('pending', 'confirmed')",
        )
        .bind(&trip_id)
        .execute(&mut self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self))]
    async fn insert_review(&mut self, review: &Review) -> Result<bool, Error> {
        let result = sqlx::query(
            "INSERT INTO reviews (id, author_id, trip_id, text, rating, created_at) VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (trip_id, author_id) DO NOTHING",
        )
        .bind(&review.id)
        .bind(&review.author_id)
        .bind(&review.trip_id)
        .bind(&review.text)
        .bind(review.rating)
        .bind(review.created_at)
        .execute(&mut self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn review_exists(&mut self, trip_id: Uuid, author_id: Uuid) -> Result<bool, Error> {
        let present: bool = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE trip_id = $1 AND author_id = $2) AS present",
        )
        .bind(&trip_id)
        .bind(&author_id)
        .fetch_one(&mut self.tx)
        .await?
        .try_get("present")?;

        Ok(present)
    }

    async fn average_rating_by_trip(&mut self, trip_id: Uuid) -> Result<Option<f64>, Error> {
        let avg_rating: Option<f64> =
            sqlx::query("SELECT AVG(rating)::FLOAT8 AS avg_rating FROM reviews WHERE trip_id = $1")
                .bind(&trip_id)
                .fetch_one(&mut self.tx)
                .await?
                .try_get("avg_rating")?;

        Ok(avg_rating)
    }

    async fn commit(self) -> Result<(), Error> {
        self.tx.commit().await?;

        Ok(())
    }
}

#[tokio::test]
#[ignore = "needs a running postgres reachable through DATABASE_URL"]
async fn advance_statuses_against_postgres() {
    use crate::entities::NewTrip;
    use chrono::Duration;

    let db_uri = std::env::var("DATABASE_URL").unwrap();
    let store = PgStore::new(&db_uri, 5).await.unwrap();

    let driver = Member::new("Driver".into(), Uuid::new_v4().to_string());
    let car = Car::new(driver.id, "Lada".into(), "Vesta".into(), 4);
    store.insert_member(&driver).await.unwrap();
    store.insert_car(&car).await.unwrap();

    let now = Utc::now();
    let trip = Trip::new(
        driver.id,
        NewTrip {
            car_id: car.id,
            origin: "Grozny".into(),
            destination: "Gudermes".into(),
            start_time: now - Duration::seconds(1),
            duration_min: 0,
            seats: 3,
            price: 400,
        },
    )
    .unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.insert_trip(&trip).await.unwrap();
    tx.commit().await.unwrap();

    store.advance_statuses_due_by(now).await.unwrap();
    store.advance_statuses_due_by(now).await.unwrap();

    let trip = store.find_trip(trip.id).await.unwrap().unwrap();
    assert_eq!(trip.status, TripStatus::Completed);
    assert_eq!(trip.available_seats, 3);
}
