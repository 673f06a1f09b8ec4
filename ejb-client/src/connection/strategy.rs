//! Connection-selection strategies.
//!
//! A strategy turns a cluster view into a finite, lazily produced sequence of
//! candidate locations. Every connect attempt asks for a fresh sequence.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use ejb_core::{ClusterMetaData, EjbError, Result};
use rand::Rng;
use url::Url;

/// Lazily produced candidate locations.
pub type Candidates = Box<dyn Iterator<Item = Url> + Send>;

/// Name of the default strategy.
pub const STICKY: &str = "sticky";

const BUILTIN_NAMES: [&str; 7] = [
    "sticky",
    "sticky+random",
    "sticky+round-robin",
    "random",
    "round-robin",
    "roundrobin",
    "round",
];

/// Returns true if `name` is a built-in strategy name.
pub fn is_known_strategy(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name.to_ascii_lowercase().as_str())
}

/// Orders the members of a cluster for one connect attempt.
pub trait ConnectionStrategy: Send + Sync {
    /// Returns the strategy's registered name.
    fn name(&self) -> &str;

    /// Returns a fresh candidate sequence for the cluster.
    fn candidates(&self, cluster: &ClusterMetaData) -> Candidates;
}

impl fmt::Debug for dyn ConnectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionStrategy({})", self.name())
    }
}

/// Draws members uniformly without replacement.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomStrategy;

impl RandomStrategy {
    /// Creates a random strategy.
    pub fn new() -> Self {
        Self
    }
}

struct RandomCandidates {
    pool: Vec<Url>,
}

impl Iterator for RandomCandidates {
    type Item = Url;

    fn next(&mut self) -> Option<Url> {
        if self.pool.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..self.pool.len());
        Some(self.pool.swap_remove(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pool.len(), Some(self.pool.len()))
    }
}

impl ConnectionStrategy for RandomStrategy {
    fn name(&self) -> &str {
        "random"
    }

    fn candidates(&self, cluster: &ClusterMetaData) -> Candidates {
        Box::new(RandomCandidates {
            pool: cluster.locations().to_vec(),
        })
    }
}

/// Rotates through members using the cluster's shared cursor.
///
/// Each `next()` advances the cursor, so concurrent attempts against the same
/// cluster fan out across members. A single sequence still yields every
/// member exactly once.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobinStrategy;

impl RoundRobinStrategy {
    /// Creates a round-robin strategy.
    pub fn new() -> Self {
        Self
    }
}

struct RoundRobinCandidates {
    cluster: ClusterMetaData,
    seen: HashSet<usize>,
}

impl Iterator for RoundRobinCandidates {
    type Item = Url;

    fn next(&mut self) -> Option<Url> {
        let members = self.cluster.locations();
        let n = members.len();
        if self.seen.len() >= n {
            return None;
        }
        for _ in 0..n {
            let index = self.cluster.cursor().fetch_add(1, Ordering::Relaxed) % n;
            if self.seen.insert(index) {
                return Some(members[index].clone());
            }
        }
        // Concurrent callers kept landing on seen slots.
        let index = (0..n).find(|i| !self.seen.contains(i))?;
        self.seen.insert(index);
        Some(members[index].clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.cluster.locations().len() - self.seen.len();
        (left, Some(left))
    }
}

impl ConnectionStrategy for RoundRobinStrategy {
    fn name(&self) -> &str {
        "round-robin"
    }

    fn candidates(&self, cluster: &ClusterMetaData) -> Candidates {
        Box::new(RoundRobinCandidates {
            cluster: cluster.clone(),
            seen: HashSet::new(),
        })
    }
}

/// Tries the last successful location first, then a secondary strategy.
pub struct StickyStrategy {
    name: String,
    secondary: Arc<dyn ConnectionStrategy>,
}

impl StickyStrategy {
    /// Creates a sticky strategy with a round-robin secondary.
    pub fn new() -> Self {
        Self::with_secondary(STICKY, Arc::new(RoundRobinStrategy::new()))
    }

    /// Creates a sticky strategy over an explicit secondary.
    pub fn with_secondary(name: impl Into<String>, secondary: Arc<dyn ConnectionStrategy>) -> Self {
        Self {
            name: name.into(),
            secondary,
        }
    }
}

impl Default for StickyStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StickyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StickyStrategy")
            .field("name", &self.name)
            .field("secondary", &self.secondary.name())
            .finish()
    }
}

impl ConnectionStrategy for StickyStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(&self, cluster: &ClusterMetaData) -> Candidates {
        let rest = self.secondary.candidates(cluster);
        match cluster.last_location() {
            Some(last) => {
                let skip = last.clone();
                Box::new(std::iter::once(last).chain(rest.filter(move |u| *u != skip)))
            }
            None => rest,
        }
    }
}

/// Strategies addressable by name.
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: Arc<DashMap<String, Arc<dyn ConnectionStrategy>>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    /// Creates a registry holding the built-in strategies.
    pub fn new() -> Self {
        let strategies: DashMap<String, Arc<dyn ConnectionStrategy>> = DashMap::new();
        let round_robin: Arc<dyn ConnectionStrategy> = Arc::new(RoundRobinStrategy::new());
        let random: Arc<dyn ConnectionStrategy> = Arc::new(RandomStrategy::new());

        strategies.insert("sticky".into(), Arc::new(StickyStrategy::new()));
        strategies.insert(
            "sticky+random".into(),
            Arc::new(StickyStrategy::with_secondary("sticky+random", Arc::clone(&random))),
        );
        strategies.insert(
            "sticky+round-robin".into(),
            Arc::new(StickyStrategy::with_secondary(
                "sticky+round-robin",
                Arc::clone(&round_robin),
            )),
        );
        strategies.insert("random".into(), random);
        for alias in ["round-robin", "roundrobin", "round"] {
            strategies.insert(alias.into(), Arc::clone(&round_robin));
        }

        Self {
            strategies: Arc::new(strategies),
        }
    }

    /// Registers a custom strategy under a name.
    pub fn register(&self, name: impl Into<String>, strategy: Arc<dyn ConnectionStrategy>) {
        self.strategies
            .insert(name.into().to_ascii_lowercase(), strategy);
    }

    /// Looks up a strategy by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn ConnectionStrategy>> {
        self.strategies
            .get(&name.to_ascii_lowercase())
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| {
                EjbError::Configuration(format!("unknown connection strategy '{}'", name))
            })
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.strategies.iter().map(|e| e.key().clone()).collect();
        names.sort();
        f.debug_struct("StrategyRegistry").field("names", &names).finish()
    }
}
