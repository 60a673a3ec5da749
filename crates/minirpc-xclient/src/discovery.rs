use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use minirpc_common::{Result, RpcError};

/// How a server is picked for each call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectMode {
    /// Uniformly at random
    #[default]
    Random,
    /// Cyclically, starting from a random position
    RoundRobin,
}

impl fmt::Display for SelectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectMode::Random => f.write_str("random"),
            SelectMode::RoundRobin => f.write_str("round-robin"),
        }
    }
}

impl FromStr for SelectMode {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(SelectMode::Random),
            "round-robin" | "roundrobin" => Ok(SelectMode::RoundRobin),
            other => Err(RpcError::Discovery(format!("not supported select mode {}", other))),
        }
    }
}

/// Source of server addresses for [`XClient`](crate::XClient).
///
/// Addresses use the `protocol@addr` form understood by
/// [`xdial`](minirpc_client::xdial).
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Reloads the server list from its source, if there is one.
    async fn refresh(&self) -> Result<()>;

    /// Replaces the server list.
    async fn update(&self, servers: Vec<String>) -> Result<()>;

    /// Picks one server.
    async fn get(&self, mode: SelectMode) -> Result<String>;

    /// Returns every known server.
    async fn get_all(&self) -> Result<Vec<String>>;
}

/// Discovery over a list maintained by hand.
pub struct MultiServerDiscovery {
    servers: RwLock<Vec<String>>,
    index: AtomicUsize,
    rng: Mutex<StdRng>,
}

impl MultiServerDiscovery {
    pub fn new(servers: Vec<String>) -> Self {
        let mut rng = StdRng::from_os_rng();
        let index = rng.random_range(0..i32::MAX as usize);
        Self {
            servers: RwLock::new(servers),
            index: AtomicUsize::new(index),
            rng: Mutex::new(rng),
        }
    }

    pub(crate) fn set_servers(&self, servers: Vec<String>) {
        let mut guard = self.servers.write().unwrap_or_else(|e| e.into_inner());
        *guard = servers;
    }

    pub(crate) fn select(&self, mode: SelectMode) -> Result<String> {
        let servers = self.servers.read().unwrap_or_else(|e| e.into_inner());
        let n = servers.len();
        if n == 0 {
            return Err(RpcError::Discovery("no available servers".into()));
        }

        let i = match mode {
            SelectMode::Random => self
                .rng
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .random_range(0..n),
            // Recomputed modulo the current length, since the list may shrink.
            SelectMode::RoundRobin => self.index.fetch_add(1, Ordering::Relaxed) % n,
        };
        Ok(servers[i].clone())
    }

    pub(crate) fn all(&self) -> Vec<String> {
        self.servers.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Discovery for MultiServerDiscovery {
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    async fn update(&self, servers: Vec<String>) -> Result<()> {
        self.set_servers(servers);
        Ok(())
    }

    async fn get(&self, mode: SelectMode) -> Result<String> {
        self.select(mode)
    }

    async fn get_all(&self) -> Result<Vec<String>> {
        Ok(self.all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn servers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("tcp@127.0.0.1:{}", 9000 + i)).collect()
    }

    #[tokio::test]
    async fn test_empty_list() {
        let d = MultiServerDiscovery::new(Vec::new());
        let err = d.get(SelectMode::Random).await.unwrap_err();
        assert_eq!(err.to_string(), "rpc discovery: no available servers");
        assert!(d.get(SelectMode::RoundRobin).await.is_err());
        assert!(d.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_round_robin_is_cyclic_and_even() {
        let d = MultiServerDiscovery::new(servers(3));
        let mut picks = Vec::new();
        for _ in 0..30 {
            picks.push(d.get(SelectMode::RoundRobin).await.unwrap());
        }

        // Every window of three consecutive picks covers all servers.
        for window in picks.windows(3) {
            let mut w = window.to_vec();
            w.sort();
            w.dedup();
            assert_eq!(w.len(), 3);
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for p in picks {
            *counts.entry(p).or_default() += 1;
        }
        assert!(counts.values().all(|&c| c == 10));
    }

    #[tokio::test]
    async fn test_random_reaches_every_server() {
        let d = MultiServerDiscovery::new(servers(4));
        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..4000 {
            *counts.entry(d.get(SelectMode::Random).await.unwrap()).or_default() += 1;
        }
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&c| c > 700 && c < 1300), "{:?}", counts);
    }

    #[tokio::test]
    async fn test_update_replaces_list() {
        let d = MultiServerDiscovery::new(servers(3));
        d.update(vec!["tcp@only".to_string()]).await.unwrap();
        assert_eq!(d.get_all().await.unwrap(), vec!["tcp@only".to_string()]);
        for _ in 0..5 {
            assert_eq!(d.get(SelectMode::RoundRobin).await.unwrap(), "tcp@only");
        }
    }

    #[test]
    fn test_select_mode_parse() {
        assert_eq!("random".parse::<SelectMode>().unwrap(), SelectMode::Random);
        assert_eq!(
            "round-robin".parse::<SelectMode>().unwrap(),
            SelectMode::RoundRobin
        );
        assert!("fastest".parse::<SelectMode>().is_err());
    }
}
