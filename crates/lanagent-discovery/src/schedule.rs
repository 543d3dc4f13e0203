//! Fixed-interval scan scheduling

use lanagent_core::{ScanCache, ScanResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::error::DiscoveryError;

/// Run `scan` now and then every `period`, publishing results into `cache`
///
/// Ticks are measured from the start of the previous scan. A scan that runs
/// past one or more ticks causes those ticks to be dropped, so scans never
/// overlap or queue up. A failed scan leaves the cache untouched.
///
/// Shutdown is only observed between scans: an in-flight scan always
/// completes. Dropping the sender counts as shutdown.
pub async fn run_periodic<F, Fut>(
    mut scan: F,
    cache: Arc<ScanCache>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ScanResult, DiscoveryError>>,
{
    let mut deadline = Instant::now();

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        tokio::select! {
            _ = sleep_until(deadline) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let started = Instant::now();
        debug!("Starting network scan");
        match scan().await {
            Ok(result) => {
                info!(
                    devices = result.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Scan complete"
                );
                cache.update(result).await;
            }
            Err(e) => {
                warn!(error = %e, "Scan failed, keeping previous results");
            }
        }

        let now = Instant::now();
        deadline = next_deadline(started, period, now);
        let skipped = skipped_ticks(started, period, deadline);
        if skipped > 0 {
            warn!(skipped, "Scan overran its interval, skipping ticks");
        }
    }

    info!("Scan loop stopped");
}

/// First tick after `now` on the grid `started + k * period`, k >= 1
fn next_deadline(started: Instant, period: Duration, now: Instant) -> Instant {
    let mut deadline = started + period;
    if period.is_zero() {
        return deadline.max(now);
    }
    while deadline <= now {
        deadline += period;
    }
    deadline
}

fn skipped_ticks(started: Instant, period: Duration, deadline: Instant) -> u64 {
    if period.is_zero() {
        return 0;
    }
    let ticks = (deadline - started).as_nanos() / period.as_nanos();
    ticks.saturating_sub(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanagent_core::Device;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn one_device(last_octet: u8) -> ScanResult {
        ScanResult::new(vec![Device {
            ip: Ipv4Addr::new(192, 168, 1, last_octet),
            mac: "AA:BB:CC:DD:EE:FF".to_string(),
        }])
    }

    #[test]
    fn test_next_deadline_on_time() {
        let start = Instant::now();
        let period = Duration::from_secs(60);
        let deadline = next_deadline(start, period, start + Duration::from_secs(5));
        assert_eq!(deadline, start + period);
        assert_eq!(skipped_ticks(start, period, deadline), 0);
    }

    #[test]
    fn test_next_deadline_skips_missed_ticks() {
        let start = Instant::now();
        let period = Duration::from_secs(60);
        let deadline = next_deadline(start, period, start + Duration::from_secs(150));
        assert_eq!(deadline, start + Duration::from_secs(180));
        assert_eq!(skipped_ticks(start, period, deadline), 2);

        let exact = next_deadline(start, period, start + period);
        assert_eq!(exact, start + Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scans_immediately_then_every_period() {
        let cache = Arc::new(ScanCache::new());
        let (tx, rx) = watch::channel(false);
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let handle = tokio::spawn(run_periodic(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, DiscoveryError>(one_device(n as u8 + 1)) }
            },
            cache.clone(),
            Duration::from_secs(60),
            rx,
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(cache.read().await.devices[0].ip, Ipv4Addr::new(192, 168, 1, 1));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(cache.read().await.devices[0].ip, Ipv4Addr::new(192, 168, 1, 3));

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_skips_instead_of_queueing() {
        let cache = Arc::new(ScanCache::new());
        let (tx, rx) = watch::channel(false);
        let origin = Instant::now();
        let starts = Arc::new(Mutex::new(Vec::new()));

        let recorded = starts.clone();
        let handle = tokio::spawn(run_periodic(
            move || {
                recorded.lock().unwrap().push(origin.elapsed().as_secs());
                async {
                    tokio::time::sleep(Duration::from_secs(150)).await;
                    Ok::<_, DiscoveryError>(ScanResult::empty())
                }
            },
            cache,
            Duration::from_secs(60),
            rx,
        ));

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(*starts.lock().unwrap(), vec![0, 180]);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_scan_keeps_previous_result() {
        let cache = Arc::new(ScanCache::new());
        let (tx, rx) = watch::channel(false);
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        let handle = tokio::spawn(run_periodic(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(one_device(42))
                    } else {
                        Err(DiscoveryError::NoInterface)
                    }
                }
            },
            cache.clone(),
            Duration::from_secs(10),
            rx,
        ));

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
        let snapshot = cache.read().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.devices[0].ip, Ipv4Addr::new(192, 168, 1, 42));

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_scan() {
        let cache = Arc::new(ScanCache::new());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_periodic(
            || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, DiscoveryError>(one_device(7))
            },
            cache.clone(),
            Duration::from_secs(60),
            rx,
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        // The scan that was running at shutdown still published its result
        assert_eq!(cache.read().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_stops_loop() {
        let cache = Arc::new(ScanCache::new());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_periodic(
            || async { Ok::<_, DiscoveryError>(ScanResult::empty()) },
            cache,
            Duration::from_secs(60),
            rx,
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(tx);
        handle.await.unwrap();
    }
}
