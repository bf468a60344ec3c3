//! The roster as the engine sees it: profiles built once from config.
//!
//! Profiles get their ids here and keep them for the whole run. Ids are
//! UUID v5 names derived from the show name, the entry's position and its
//! name, so the same config yields the same ids (and the same fallback
//! choices) on every run. Creation times are staggered in config order so
//! the roster's stable ordering matches the order agents are listed in the
//! file.

use chrono::{DateTime, TimeDelta, Utc};
use ringside_core::config::{RosterEntry, ShowConfig};
use ringside_core::roster::AgentProfile;
use ringside_types::{AgentId, Role};
use tracing::info;
use uuid::Uuid;

/// Build one profile per roster entry. An empty roster gets one demo agent
/// per role.
pub fn roster_profiles(config: &ShowConfig) -> Vec<AgentProfile> {
    let base = Utc::now();
    if config.roster.is_empty() {
        info!(agents = Role::ORDER.len(), "Roster empty, seeding demo card");
        return demo_entries()
            .iter()
            .zip(0_i64..)
            .map(|(entry, n)| profile(&config.show.name, entry, base, n))
            .collect();
    }
    config
        .roster
        .iter()
        .zip(0_i64..)
        .map(|(entry, n)| profile(&config.show.name, entry, base, n))
        .collect()
}

/// Stable id for the `n`th roster entry of `show`.
fn agent_id(show: &str, n: i64, name: &str) -> AgentId {
    let key = format!("ringside/{show}/{n}/{name}");
    AgentId::from(Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()))
}

fn profile(show: &str, entry: &RosterEntry, base: DateTime<Utc>, n: i64) -> AgentProfile {
    let created_at = base
        .checked_add_signed(TimeDelta::milliseconds(n))
        .unwrap_or(base);
    AgentProfile {
        id: agent_id(show, n, &entry.name),
        gimmick: entry.gimmick.clone(),
        persona: entry.persona.clone(),
        model: entry.model.clone(),
        created_at,
        ..AgentProfile::new(entry.name.clone(), entry.role.clone())
    }
}

fn entry(name: &str, role: Role, gimmick: &str) -> RosterEntry {
    RosterEntry {
        name: name.to_owned(),
        role: role.as_str().to_owned(),
        gimmick: Some(gimmick.to_owned()),
        persona: None,
        model: None,
    }
}

fn demo_entries() -> Vec<RosterEntry> {
    vec![
        entry("The Chairman", Role::Promoter, "Books the card with an iron fist"),
        entry("Rex Ruckus", Role::Participant, "Brawling fan favourite"),
        entry("Mara Vex", Role::Participant, "Cunning technical heel"),
        entry("Earl Hebner", Role::Referee, "Strict but slow to count"),
        entry("The Faithful", Role::Crowd, "A loud sold-out arena"),
        entry("Jim Ross", Role::Announcer, "Veteran play-by-play voice"),
        entry("The Manager", Role::Backstage, "Lurks near the entrance ramp"),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ringside_core::decision::StubDecisionClient;
    use ringside_core::engine::Engine;
    use ringside_core::roster::{InMemoryDirectory, Roster};
    use ringside_core::sink::NullSink;

    use super::*;

    #[test]
    fn empty_roster_seeds_every_role() {
        let profiles = roster_profiles(&ShowConfig::default());
        let roster = Roster::load(&InMemoryDirectory::new(profiles)).unwrap();
        for role in Role::ORDER {
            assert!(!roster.agents(role).is_empty(), "no {role} seeded");
        }
    }

    #[test]
    fn config_order_is_roster_order() {
        let config = ShowConfig {
            roster: vec![
                entry("Zed", Role::Participant, "last alphabetically"),
                entry("Abe", Role::Participant, "first alphabetically"),
            ],
            ..ShowConfig::default()
        };
        let roster = Roster::load(&InMemoryDirectory::new(roster_profiles(&config))).unwrap();
        let names: Vec<&str> = roster
            .agents(Role::Participant)
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["Zed", "Abe"]);
    }

    #[test]
    fn ids_are_stable_across_runs() {
        let first: Vec<AgentId> = roster_profiles(&ShowConfig::default())
            .iter()
            .map(|p| p.id)
            .collect();
        let second: Vec<AgentId> = roster_profiles(&ShowConfig::default())
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(first, second);
    }

    async fn fallback_actions(config: &ShowConfig) -> Vec<String> {
        let mut engine = Engine::new(
            config,
            StubDecisionClient::new(),
            Box::new(InMemoryDirectory::new(roster_profiles(config))),
            Box::new(NullSink),
        )
        .unwrap();
        engine
            .run_ticks(4)
            .await
            .unwrap()
            .iter()
            .flat_map(|r| r.applied_actions.iter().map(|a| a.action.clone()))
            .collect()
    }

    #[tokio::test]
    async fn reruns_make_the_same_fallback_choices() {
        let config = ShowConfig::default();
        let first = fallback_actions(&config).await;
        assert!(!first.is_empty());
        assert_eq!(first, fallback_actions(&config).await);
    }

    #[test]
    fn repeated_names_get_distinct_ids() {
        let config = ShowConfig {
            roster: vec![
                entry("Jobber", Role::Participant, "one"),
                entry("Jobber", Role::Participant, "two"),
            ],
            ..ShowConfig::default()
        };
        let profiles = roster_profiles(&config);
        let ids: Vec<AgentId> = profiles.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids.first(), ids.get(1));
        assert!(Roster::load(&InMemoryDirectory::new(profiles)).is_ok());
    }

    #[test]
    fn entry_details_carry_over() {
        let config = ShowConfig {
            roster: vec![RosterEntry {
                model: Some("gpt-4o".to_owned()),
                persona: Some("never smiles".to_owned()),
                ..entry("Kane", Role::Participant, "Big red machine")
            }],
            ..ShowConfig::default()
        };
        let profile = roster_profiles(&config).into_iter().next().unwrap();
        assert_eq!(profile.gimmick.as_deref(), Some("Big red machine"));
        assert_eq!(profile.persona.as_deref(), Some("never smiles"));
        assert_eq!(profile.model.as_deref(), Some("gpt-4o"));
    }
}
