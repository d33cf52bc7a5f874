use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::room::RoomStore;

/// Periodically retires empty rooms older than `max_age`.
/// `every` must be non-zero.
pub(crate) fn spawn_sweeper(rooms: RoomStore, every: Duration, max_age: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = rooms.sweep_inactive(max_age).await;
            if removed > 0 {
                info!("Cleaned up {} inactive room(s)", removed);
            } else {
                debug!("Sweep found no inactive rooms");
            }
        }
    })
}
