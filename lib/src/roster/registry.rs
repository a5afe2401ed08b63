use std::fmt::Debug;
use std::sync::Arc;

use crate::config::RosterConfig;
use crate::error::{Error, Result};
use crate::identity::{Identified, Identifier};
use crate::roster::Roster;

/// Maps roster identities to rosters so that entries can refer to other
/// rosters by identifier.
///
/// Clones share the same map. Each test or session gets its own registry;
/// nothing is global.
#[derive(Clone, Default)]
pub struct RosterRegistry {
    config: RosterConfig,
    rosters: Arc<scc::HashMap<Identifier, Roster>>,
}

impl Debug for RosterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosterRegistry")
            .field("config", &self.config)
            .field("rosters", &self.rosters.len())
            .finish()
    }
}

impl RosterRegistry {
    pub fn new(config: RosterConfig) -> Self {
        Self {
            config,
            rosters: Arc::new(scc::HashMap::new()),
        }
    }

    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    /// Registers `roster` under its identity. A roster that was registered
    /// first under the same identity stays in place, and `false` is returned.
    pub async fn register(&self, roster: &Roster) -> bool {
        match self
            .rosters
            .insert_async(roster.identifier(), roster.clone())
            .await
        {
            Ok(()) => {
                log::info!("RosterRegistry: registered {roster}");
                true
            }
            Err(_) => {
                log::debug!("RosterRegistry: {roster} was already registered");
                false
            }
        }
    }

    pub async fn lookup(&self, entity: &impl Identified) -> Result<Roster> {
        let identifier = entity.identifier();
        self.rosters
            .get_async(&identifier)
            .await
            .map(|entry| entry.get().clone())
            .ok_or(Error::UnknownRoster(identifier))
    }

    pub async fn contains(&self, entity: &impl Identified) -> bool {
        self.rosters.contains_async(&entity.identifier()).await
    }

    pub fn len(&self) -> usize {
        self.rosters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rosters.is_empty()
    }
}
