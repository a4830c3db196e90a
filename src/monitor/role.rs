//! Monitor state for the built-in bot roles

use super::{Monitor, MonitorContext};
use crate::error::BotResult;
use crate::role::{DisplayColor, Role};

use async_trait::async_trait;
use tracing::trace;

/// Monitor for one [`Role`], named and colored after it
pub struct RoleMonitor {
    role: Role,
}

impl RoleMonitor {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

#[async_trait]
impl Monitor for RoleMonitor {
    fn name(&self) -> &str {
        self.role.name()
    }

    fn color(&self) -> DisplayColor {
        self.role.color()
    }

    async fn handle_events(&mut self, _ctx: &MonitorContext, height: u64) -> BotResult<()> {
        trace!("{} handling events at height {}", self.role, height);
        Ok(())
    }

    async fn handle_block(&mut self, _ctx: &MonitorContext, height: u64) -> BotResult<()> {
        trace!("{} handling block {}", self.role, height);
        Ok(())
    }
}
