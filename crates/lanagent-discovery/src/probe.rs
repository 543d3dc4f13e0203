//! ICMP sweep that warms the kernel neighbor table

use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, trace};

/// Default per-host echo timeout
pub const PROBE_TIMEOUT_MS: u64 = 1000;

/// Default ceiling on concurrently running pings
pub const PROBE_CONCURRENCY: usize = 50;

/// Best-effort pinger used only for its side effect on the neighbor table
#[derive(Debug, Clone)]
pub struct NeighborProbe {
    timeout: Duration,
    concurrency: usize,
    program: String,
}

impl Default for NeighborProbe {
    fn default() -> Self {
        Self::new(Duration::from_millis(PROBE_TIMEOUT_MS), PROBE_CONCURRENCY)
    }
}

impl NeighborProbe {
    pub fn new(timeout: Duration, concurrency: usize) -> Self {
        Self {
            timeout,
            concurrency: concurrency.max(1),
            program: "ping".to_string(),
        }
    }

    /// Send one echo request to every address
    ///
    /// Replies are not inspected and failures are ignored per host. At most
    /// `concurrency` pings are in flight; every one has finished when this
    /// returns.
    pub async fn probe(&self, hosts: &[Ipv4Addr]) {
        if hosts.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for &host in hosts {
            // Acquire before spawning so large subnets never queue thousands of tasks
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let program = self.program.clone();
            let timeout = self.timeout;
            tasks.spawn(async move {
                let _permit = permit;
                ping_once(&program, host, timeout).await;
            });

            while tasks.try_join_next().is_some() {}
        }

        while tasks.join_next().await.is_some() {}

        debug!(
            hosts = hosts.len(),
            concurrency = self.concurrency,
            "Probe sweep finished"
        );
    }
}

async fn ping_once(program: &str, host: Ipv4Addr, timeout: Duration) {
    let mut command = Command::new(program);
    command
        .args(ping_args(std::env::consts::OS, host, timeout))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    // ping enforces its own timeout; the outer bound covers a wedged process
    let bound = timeout + Duration::from_secs(1);
    match tokio::time::timeout(bound, command.status()).await {
        Ok(Ok(status)) => trace!(ip = %host, success = status.success(), "Probe finished"),
        Ok(Err(e)) => trace!(ip = %host, error = %e, "Probe could not run"),
        Err(_) => trace!(ip = %host, "Probe timed out"),
    }
}

/// Arguments for a single echo request on the given OS
fn ping_args(os: &str, host: Ipv4Addr, timeout: Duration) -> Vec<String> {
    let secs = timeout.as_secs().max(1).to_string();
    let mut args = vec!["-c".to_string(), "1".to_string()];
    if os == "macos" {
        args.extend(["-t".to_string(), secs]);
    } else {
        args.extend(["-W".to_string(), secs]);
    }
    args.push(host.to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_ping_args_linux() {
        let args = ping_args("linux", Ipv4Addr::new(192, 168, 1, 5), Duration::from_millis(1000));
        assert_eq!(args, vec!["-c", "1", "-W", "1", "192.168.1.5"]);
    }

    #[test]
    fn test_ping_args_macos() {
        let args = ping_args("macos", Ipv4Addr::new(192, 168, 1, 5), Duration::from_millis(300));
        assert_eq!(args, vec!["-c", "1", "-t", "1", "192.168.1.5"]);
    }

    #[test]
    fn test_concurrency_floor() {
        let probe = NeighborProbe::new(Duration::from_millis(100), 0);
        assert_eq!(probe.concurrency, 1);
    }

    #[tokio::test]
    async fn test_probe_empty() {
        NeighborProbe::default().probe(&[]).await;
    }

    #[tokio::test]
    async fn test_probe_ignores_spawn_failures() {
        let probe = NeighborProbe {
            timeout: Duration::from_millis(100),
            concurrency: 8,
            program: "lanagent-no-such-ping".to_string(),
        };
        let hosts: Vec<Ipv4Addr> = (1..=40).map(|i| Ipv4Addr::new(192, 0, 2, i)).collect();

        let started = Instant::now();
        probe.probe(&hosts).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_probe_waits_for_all_workers() {
        // `sh <args>` fails quickly on every host; each worker still runs to completion
        let probe = NeighborProbe {
            timeout: Duration::from_millis(100),
            concurrency: 4,
            program: "sh".to_string(),
        };
        let hosts: Vec<Ipv4Addr> = (1..=10).map(|i| Ipv4Addr::new(198, 51, 100, i)).collect();
        probe.probe(&hosts).await;
    }
}
