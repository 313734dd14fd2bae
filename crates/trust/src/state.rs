use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authority::Tier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub positive: bool,
    pub value: f64,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustState {
    pub trust_score: f64,
    pub signals: Vec<Signal>,
    pub allowed_tiers: Vec<Tier>,
    pub last_updated: DateTime<Utc>,
}

impl Default for TrustState {
    fn default() -> Self {
        Self {
            trust_score: 0.5,
            signals: Vec::new(),
            allowed_tiers: vec![Tier::Autonomous, Tier::Propose],
            last_updated: Utc::now(),
        }
    }
}
