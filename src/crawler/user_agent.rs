//! User-agent rotation strategies
//!
//! Every outbound request asks a [`UserAgentStrategy`] for the identity to
//! send. Production runs draw randomly from a pool; tests plug in a
//! [`FixedSequence`] so the order is known in advance.

use crate::config::UserAgentConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Browser identities used when the configuration supplies no pool
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.4; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// Supplies the user agent for each outbound request
pub trait UserAgentStrategy: Send + Sync {
    /// Returns the identity for the next request
    fn next(&self) -> String;
}

/// Picks a pool entry uniformly at random for every request
pub struct RandomPool {
    pool: Vec<String>,
    rng: Mutex<StdRng>,
}

impl RandomPool {
    /// Creates a random pool
    ///
    /// An empty `pool` falls back to [`DEFAULT_USER_AGENTS`]. With a `seed`
    /// the sequence of picks is reproducible.
    pub fn new(pool: Vec<String>, seed: Option<u64>) -> Self {
        let pool = if pool.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
        } else {
            pool
        };

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            pool,
            rng: Mutex::new(rng),
        }
    }

    /// Number of identities in the pool
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

impl UserAgentStrategy for RandomPool {
    fn next(&self) -> String {
        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            rng.gen_range(0..self.pool.len())
        };
        self.pool[index].clone()
    }
}

/// Cycles through a fixed list in order
pub struct FixedSequence {
    agents: Vec<String>,
    cursor: AtomicUsize,
}

impl FixedSequence {
    /// Creates a cycling sequence; an empty list yields empty identities
    pub fn new<I, S>(agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            agents: agents.into_iter().map(Into::into).collect(),
            cursor: AtomicUsize::new(0),
        }
    }
}

impl UserAgentStrategy for FixedSequence {
    fn next(&self) -> String {
        if self.agents.is_empty() {
            return String::new();
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        self.agents[index].clone()
    }
}

/// Builds the production strategy from configuration
pub fn from_config(config: &UserAgentConfig) -> Arc<dyn UserAgentStrategy> {
    Arc::new(RandomPool::new(config.pool.clone(), config.seed))
}
