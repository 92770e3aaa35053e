use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db::Store;
use crate::error::Error;

/// Periodically moves trips through `scheduled -> in_progress -> completed`
/// as their time windows elapse.
pub struct TripStatusWorker<S: Store> {
    store: Arc<S>,
    tick: Duration,
}

impl<S: Store> TripStatusWorker<S> {
    pub fn new(store: Arc<S>, tick: Duration) -> Self {
        Self { store, tick }
    }

    /// Runs a single tick against `now`.
    #[tracing::instrument(skip(self))]
    pub async fn advance(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let advanced = self.store.advance_statuses_due_by(now).await?;

        if advanced > 0 {
            tracing::info!("advanced {} trips", advanced);
        } else {
            tracing::debug!("no trips due");
        }

        Ok(advanced)
    }

    /// Ticks until `shutdown` flips to `true` or its sender goes away. A
    /// failed tick is logged and retried on the next one. A tick that is
    /// already running finishes before the loop exits.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("trip status worker started, ticking every {:?}", self.tick);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Utc::now();

                    if let Err(err) = self.advance(now).await {
                        tracing::error!(%now, "trip status tick failed: {}", err);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("trip status worker stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::entities::{NewTrip, Trip, TripStatus};
    use uuid::Uuid;

    fn trip(start_time: DateTime<Utc>, duration_min: i32) -> Trip {
        Trip::new(
            Uuid::new_v4(),
            NewTrip {
                car_id: Uuid::new_v4(),
                origin: "Gudermes".into(),
                destination: "Kizlyar".into(),
                start_time,
                duration_min,
                seats: 2,
                price: 400,
            },
        )
        .unwrap()
    }

    async fn status_of(store: &MemoryStore, id: Uuid) -> TripStatus {
        store.find_trip(id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn elapsed_trip_completes_in_one_tick() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let elapsed = trip(now - chrono::Duration::seconds(1), 0);
        store.put_trip(elapsed.clone()).await.unwrap();

        let worker = TripStatusWorker::new(store.clone(), Duration::from_secs(30));

        assert_eq!(worker.advance(now).await.unwrap(), 1);
        assert_eq!(status_of(&store, elapsed.id).await, TripStatus::Completed);

        assert_eq!(worker.advance(now).await.unwrap(), 0);
        assert_eq!(status_of(&store, elapsed.id).await, TripStatus::Completed);
    }

    #[tokio::test]
    async fn departed_trip_goes_in_progress() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let running = trip(now - chrono::Duration::minutes(10), 60);
        let upcoming = trip(now + chrono::Duration::minutes(10), 60);
        store.put_trip(running.clone()).await.unwrap();
        store.put_trip(upcoming.clone()).await.unwrap();

        let worker = TripStatusWorker::new(store.clone(), Duration::from_secs(30));
        worker.advance(now).await.unwrap();

        assert_eq!(status_of(&store, running.id).await, TripStatus::InProgress);
        assert_eq!(status_of(&store, upcoming.id).await, TripStatus::Scheduled);
    }

    #[tokio::test]
    async fn worker_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = watch::channel(false);

        let handle = TripStatusWorker::new(store, Duration::from_secs(3600)).spawn(rx);
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn worker_outlives_a_failing_store() {
        let store = Arc::new(MemoryStore::new());
        let elapsed = trip(Utc::now() - chrono::Duration::minutes(5), 1);
        store.put_trip(elapsed.clone()).await.unwrap();
        store.set_unavailable(true);

        let (tx, rx) = watch::channel(false);
        let handle = TripStatusWorker::new(store.clone(), Duration::from_millis(10)).spawn(rx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        store.set_unavailable(false);

        tokio::time::timeout(Duration::from_secs(2), async {
            while status_of(&store, elapsed.id).await != TripStatus::Completed {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("trip was never completed");

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn trip_ending_past_the_calendar_does_not_stop_the_worker() {
        let store = Arc::new(MemoryStore::new());

        let mut endless = trip(Utc::now(), 60);
        endless.start_time = DateTime::<Utc>::MAX_UTC - chrono::Duration::days(1);
        endless.duration_min = i32::MAX;
        store.put_trip(endless.clone()).await.unwrap();

        let elapsed = trip(Utc::now() - chrono::Duration::minutes(5), 1);
        store.put_trip(elapsed.clone()).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = TripStatusWorker::new(store.clone(), Duration::from_millis(10)).spawn(rx);

        tokio::time::timeout(Duration::from_secs(2), async {
            while status_of(&store, elapsed.id).await != TripStatus::Completed {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("trip was never completed");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert_eq!(status_of(&store, endless.id).await, TripStatus::Scheduled);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
