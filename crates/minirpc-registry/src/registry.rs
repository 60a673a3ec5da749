use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Servers that miss heartbeats for this long are dropped by default.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// In-memory list of servers kept alive by heartbeats.
///
/// Expiry is lazy: stale entries are evicted when the list is read.
///
/// # Example
///
/// ```
/// use minirpc_registry::Registry;
/// use std::time::Duration;
///
/// let registry = Registry::new(Duration::from_secs(60));
/// registry.put_server("tcp@127.0.0.1:9001");
/// registry.put_server("tcp@127.0.0.1:9000");
/// assert_eq!(
///     registry.alive_servers(),
///     vec!["tcp@127.0.0.1:9000", "tcp@127.0.0.1:9001"]
/// );
/// ```
#[derive(Debug)]
pub struct Registry {
    ttl: Duration,
    servers: Mutex<HashMap<String, Instant>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl Registry {
    /// Creates a registry. A zero `ttl` keeps servers forever.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            servers: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Adds a server or refreshes its heartbeat.
    pub fn put_server(&self, addr: &str) {
        self.servers().insert(addr.to_string(), Instant::now());
    }

    /// Sorted addresses of servers heard from within the TTL.
    pub fn alive_servers(&self) -> Vec<String> {
        let mut servers = self.servers();
        if !self.ttl.is_zero() {
            let ttl = self.ttl;
            servers.retain(|addr, last| {
                let alive = last.elapsed() <= ttl;
                if !alive {
                    tracing::info!("rpc registry: {} expired", addr);
                }
                alive
            });
        }
        let mut alive: Vec<String> = servers.keys().cloned().collect();
        alive.sort();
        alive
    }

    fn servers(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.servers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_list_sorted() {
        let registry = Registry::default();
        registry.put_server("tcp@b");
        registry.put_server("tcp@a");
        registry.put_server("tcp@b");
        assert_eq!(registry.alive_servers(), vec!["tcp@a", "tcp@b"]);
        assert_eq!(registry.ttl(), DEFAULT_TTL);
    }

    #[test]
    fn test_expired_servers_are_evicted() {
        let registry = Registry::new(Duration::from_millis(50));
        registry.put_server("tcp@old");
        std::thread::sleep(Duration::from_millis(80));
        registry.put_server("tcp@new");

        assert_eq!(registry.alive_servers(), vec!["tcp@new"]);
        assert_eq!(registry.servers().len(), 1);
    }

    #[test]
    fn test_heartbeat_refreshes_entry() {
        let registry = Registry::new(Duration::from_millis(100));
        registry.put_server("tcp@a");
        std::thread::sleep(Duration::from_millis(60));
        registry.put_server("tcp@a");
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(registry.alive_servers(), vec!["tcp@a"]);
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let registry = Registry::new(Duration::ZERO);
        registry.put_server("tcp@a");
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(registry.alive_servers(), vec!["tcp@a"]);
    }
}
