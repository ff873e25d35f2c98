use std::time::Duration;

use crate::constants::DEFAULT_MAINTENANCE_INTERVAL;

use super::error::{MaintenanceError, MaintenanceResult};

#[derive(Debug, Clone)]
/// Background maintenance settings.
pub struct MaintenanceConfig {
    /// Time between runs. The first run happens one interval after start.
    pub interval: Duration,
    /// If false, [`MaintenanceScheduler::start`](super::MaintenanceScheduler::start) is a no-op.
    pub enabled: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_MAINTENANCE_INTERVAL,
            enabled: true,
        }
    }
}

impl MaintenanceConfig {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self) -> MaintenanceResult<()> {
        if self.enabled && self.interval.is_zero() {
            return Err(MaintenanceError::Config {
                reason: "maintenance interval must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
