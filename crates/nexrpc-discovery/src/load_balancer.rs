use nexrpc_common::Endpoint;
use nexrpc_common::RpcError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;

/// Picks one endpoint among the candidates advertising a service.
///
/// Implementations may keep mutable selection state, so `select` takes
/// `&mut self`; a directory shared between threads must serialize access.
pub trait LoadBalancer: Send {
    /// Selects an endpoint, or `None` if `endpoints` is empty.
    fn select<'a>(&mut self, endpoints: &'a [Endpoint]) -> Option<&'a Endpoint>;
}

/// Uniformly random selection.
pub struct RandomLoadBalancer {
    rng: StdRng,
}

impl RandomLoadBalancer {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a balancer with a reproducible selection sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomLoadBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadBalancer for RandomLoadBalancer {
    fn select<'a>(&mut self, endpoints: &'a [Endpoint]) -> Option<&'a Endpoint> {
        if endpoints.is_empty() {
            return None;
        }
        endpoints.get(self.rng.gen_range(0..endpoints.len()))
    }
}

/// Round-robin selection over whatever list the directory currently returns.
///
/// The cursor survives list changes: if the list shrank below the cursor,
/// the cursor is first reduced modulo the new length.
#[derive(Debug, Default)]
pub struct RoundRobinLoadBalancer {
    index: usize,
}

impl RoundRobinLoadBalancer {
    pub fn new() -> Self {
        Self { index: 0 }
    }
}

impl LoadBalancer for RoundRobinLoadBalancer {
    fn select<'a>(&mut self, endpoints: &'a [Endpoint]) -> Option<&'a Endpoint> {
        if endpoints.is_empty() {
            return None;
        }
        if self.index >= endpoints.len() {
            self.index %= endpoints.len();
        }

        let endpoint = &endpoints[self.index];
        self.index += 1;
        Some(endpoint)
    }
}

/// Built-in load-balancing policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBalancePolicy {
    #[default]
    Random,
    RoundRobin,
}

impl LoadBalancePolicy {
    /// Creates a fresh balancer implementing this policy.
    pub fn build(&self) -> Box<dyn LoadBalancer> {
        match self {
            LoadBalancePolicy::Random => Box::new(RandomLoadBalancer::new()),
            LoadBalancePolicy::RoundRobin => Box::new(RoundRobinLoadBalancer::new()),
        }
    }
}

impl fmt::Display for LoadBalancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadBalancePolicy::Random => f.write_str("random"),
            LoadBalancePolicy::RoundRobin => f.write_str("round-robin"),
        }
    }
}

impl FromStr for LoadBalancePolicy {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(LoadBalancePolicy::Random),
            "round-robin" | "roundrobin" | "rr" => Ok(LoadBalancePolicy::RoundRobin),
            other => Err(RpcError::InvalidRequest(format!(
                "Unknown load balancer '{}'",
                other
            ))),
        }
    }
}
