use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub referral: ReferralConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub cron_schedule: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralConfig {
    /// Commission rates in percent, indexed by upline level (level 1 first).
    pub level_rates: Vec<Decimal>,
    pub max_depth: usize,
}

impl ReferralConfig {
    /// Commission rate for a 1-based upline level, `None` past the
    /// configured depth.
    #[must_use]
    pub fn rate_for_level(&self, level: usize) -> Option<Decimal> {
        if level == 0 || level > self.max_depth {
            return None;
        }
        self.level_rates.get(level - 1).copied()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/coinvault".to_string(),
                max_connections: 10,
            },
            scheduler: SchedulerConfig {
                enabled: true,
                // Once a day at midnight UTC.
                cron_schedule: "0 0 0 * * *".to_string(),
            },
            referral: ReferralConfig::default(),
        }
    }
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            level_rates: vec![
                Decimal::from(10),
                Decimal::from(5),
                Decimal::from(2),
            ],
            max_depth: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_rates() {
        let config = ReferralConfig::default();
        assert_eq!(config.rate_for_level(1), Some(dec!(10)));
        assert_eq!(config.rate_for_level(2), Some(dec!(5)));
        assert_eq!(config.rate_for_level(3), Some(dec!(2)));
    }

    #[test]
    fn test_rates_outside_depth_are_none() {
        let config = ReferralConfig::default();
        assert_eq!(config.rate_for_level(0), None);
        assert_eq!(config.rate_for_level(4), None);
    }

    #[test]
    fn test_depth_caps_configured_rates() {
        let config = ReferralConfig {
            level_rates: vec![dec!(10), dec!(5), dec!(2), dec!(1)],
            max_depth: 3,
        };
        assert_eq!(config.rate_for_level(3), Some(dec!(2)));
        assert_eq!(config.rate_for_level(4), None);
    }
}
