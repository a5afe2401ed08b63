use roster::{Identity, Policy, Roster, RosterRegistry};

use crate::chatlog::ChatLog;

/// A user roster with a single agent that has advertised its share.
pub struct Party {
    pub agent: Identity,
    pub user: Roster,
}

pub async fn fake_party(registry: &RosterRegistry) -> Party {
    let agent = Identity::generate();
    let user = Roster::bootstrap(registry, &agent, Policy::ADMIN)
        .await
        .expect("bootstrapping a user roster works");

    Party { agent, user }
}

/// A group roster administered by the first party, with everyone else
/// added as a regular user.
pub async fn fake_group(registry: &RosterRegistry, parties: &[&Party]) -> Roster {
    let (owner, others) = parties.split_first().expect("at least one party");
    let group = Roster::bootstrap_group(registry, &owner.user, Policy::ADMIN)
        .await
        .expect("group creation works");

    for party in others {
        group
            .change_roster(&owner.agent, &owner.user, &party.user, Policy::USER)
            .await
            .expect("the owner can add users");
    }

    group
}

pub async fn open_chat(registry: &RosterRegistry, group: &Roster, party: &Party) -> ChatLog {
    ChatLog::new(registry, group, &party.user, &party.agent)
        .await
        .expect("party is a member of the group")
}
