use std::str::FromStr;

use serde::Serialize;

use crate::error::Error;

/// Exploration node variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Uct2,
    Rave,
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "UCT-2" => Ok(NodeKind::Uct2),
            "RAVE" => Ok(NodeKind::Rave),
            other => Err(Error::Config(format!(
                "invalid node string: {other} received"
            ))),
        }
    }
}

/// Simulation policy variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PolicyKind {
    Random,
    Mast,
}

impl FromStr for PolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "random" => Ok(PolicyKind::Random),
            "MAST" => Ok(PolicyKind::Mast),
            other => Err(Error::Config(format!(
                "invalid policy string: {other} received"
            ))),
        }
    }
}

/// Scheduler variant; `Stop` is the canonical choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SchedulerKind {
    Even,
    Stop,
}

impl FromStr for SchedulerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "even" => Ok(SchedulerKind::Even),
            "stop" => Ok(SchedulerKind::Stop),
            other => Err(Error::Config(format!(
                "invalid scheduler string: {other} received"
            ))),
        }
    }
}

/// Engine configuration. Everything has a sensible default; use the
/// builder methods to deviate.
#[derive(Clone, Debug, Serialize)]
pub struct Options {
    pub node: NodeKind,
    pub policy: PolicyKind,
    pub scheduler: SchedulerKind,
    /// Recycling table instead of the two-slot table.
    pub recycling: bool,
    /// Node budget of the recycling table.
    pub budget: usize,
    /// Transposition table size exponent.
    pub hash_code_size: u32,
    /// MAST softmax temperature.
    pub temp: f64,
    /// MAST moving-average retention.
    pub w: f64,
    /// Random rollouts seeding the MAST table before the first search.
    pub mast_warmup: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            node: NodeKind::Uct2,
            policy: PolicyKind::Random,
            scheduler: SchedulerKind::Stop,
            recycling: false,
            budget: 50_000,
            hash_code_size: 20,
            temp: 5.0,
            w: 0.98,
            mast_warmup: 0,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, node: NodeKind) -> Self {
        self.node = node;
        self
    }

    pub fn policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn scheduler(mut self, scheduler: SchedulerKind) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn recycling(mut self, recycling: bool) -> Self {
        self.recycling = recycling;
        self
    }

    pub fn budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    pub fn hash_code_size(mut self, hash_code_size: u32) -> Self {
        self.hash_code_size = hash_code_size;
        self
    }

    pub fn temp(mut self, temp: f64) -> Self {
        self.temp = temp;
        self
    }

    pub fn w(mut self, w: f64) -> Self {
        self.w = w;
        self
    }

    pub fn mast_warmup(mut self, mast_warmup: usize) -> Self {
        self.mast_warmup = mast_warmup;
        self
    }
}
