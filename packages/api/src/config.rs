use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Features {
    pub premium: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanInterval {
    Month,
    Year,
}

/// A catalog plan a subscription (and a coupon restriction) can point at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    /// Price in the smallest currency unit.
    pub price: i64,
    pub currency: String,
    pub interval: PlanInterval,
    pub trial_days: u32,
    pub product_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub environment: Environment,
    pub frontend_url: String,
    pub features: Features,
    /// Plan catalog keyed by upper-cased plan id.
    pub plans: HashMap<String, Plan>,
}

impl PlatformConfig {
    pub fn plan(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.get(&plan_id.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = include_str!("../../../woofadaar.config.json");

    #[test]
    fn embedded_config_parses() {
        let config: PlatformConfig =
            serde_json::from_str(CONFIG).expect("embedded config must parse");
        assert!(config.plans.contains_key("BASIC"));
        assert!(config.plan("premium").is_some());
    }

    #[test]
    fn plan_lookup_is_case_insensitive() {
        let config: PlatformConfig = serde_json::from_str(CONFIG).unwrap();
        let plan = config.plan("basic").expect("basic plan");
        assert_eq!(plan.interval, PlanInterval::Month);
        assert!(plan.price > 0);
    }
}
