//! Agents and the directory they come from.
//!
//! Agent storage is somebody else's job; the core only reads profiles
//! through [`AgentDirectory`]. Profiles carry their role as a string, so
//! [`Roster::build`] is where an unknown role becomes a fatal error. The
//! roster orders agents by creation time, tie-broken by id.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use ringside_types::{AgentId, Role, UnknownRole};

/// The agent directory could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("agent directory unavailable: {message}")]
pub struct DirectoryError {
    /// What went wrong.
    pub message: String,
}

/// Errors building a roster from directory profiles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    /// The directory failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// A profile names a role outside the closed set.
    #[error("agent {agent_id} ({name}): {source}")]
    UnknownRole {
        /// The offending agent.
        agent_id: AgentId,
        /// Its name.
        name: String,
        /// The parse failure.
        source: UnknownRole,
    },

    /// Two profiles share an id.
    #[error("agent {agent_id} is listed twice")]
    DuplicateAgent {
        /// The repeated id.
        agent_id: AgentId,
    },
}

/// An agent as stored by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    /// Stable identifier.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Role name, unchecked.
    pub role: String,
    /// Wrestling gimmick.
    pub gimmick: Option<String>,
    /// Free-form persona hints.
    pub persona: Option<String>,
    /// Per-agent model override for the decision service.
    pub model: Option<String>,
    /// When the agent was created.
    pub created_at: DateTime<Utc>,
}

impl AgentProfile {
    /// A profile with just a name and role, created now.
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            role: role.into(),
            gimmick: None,
            persona: None,
            model: None,
            created_at: Utc::now(),
        }
    }

    /// Set the gimmick.
    #[must_use]
    pub fn with_gimmick(mut self, gimmick: impl Into<String>) -> Self {
        self.gimmick = Some(gimmick.into());
        self
    }

    /// Set the persona hints.
    #[must_use]
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }
}

/// A validated, read-only agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    /// Stable identifier.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// The role it plays.
    pub role: Role,
    /// Wrestling gimmick.
    pub gimmick: Option<String>,
    /// Free-form persona hints.
    pub persona: Option<String>,
    /// Per-agent model override.
    pub model: Option<String>,
    /// When the agent was created.
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Gimmick and persona joined into the hint passed to the decision
    /// service.
    pub fn persona_hint(&self) -> String {
        match (&self.gimmick, &self.persona) {
            (Some(g), Some(p)) => format!("{g}. {p}"),
            (Some(g), None) => g.clone(),
            (None, Some(p)) => p.clone(),
            (None, None) => String::new(),
        }
    }
}

impl TryFrom<AgentProfile> for Agent {
    type Error = RosterError;

    fn try_from(profile: AgentProfile) -> Result<Self, Self::Error> {
        let role = profile
            .role
            .parse::<Role>()
            .map_err(|source| RosterError::UnknownRole {
                agent_id: profile.id,
                name: profile.name.clone(),
                source,
            })?;
        Ok(Self {
            id: profile.id,
            name: profile.name,
            role,
            gimmick: profile.gimmick,
            persona: profile.persona,
            model: profile.model,
            created_at: profile.created_at,
        })
    }
}

/// Read access to the agents taking part in the show.
pub trait AgentDirectory {
    /// Every agent, in any order.
    fn list_agents(&self) -> Result<Vec<AgentProfile>, DirectoryError>;
}

/// A directory backed by a vector. Used by tests and the binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    profiles: Vec<AgentProfile>,
}

impl InMemoryDirectory {
    /// Create a directory over the given profiles.
    pub const fn new(profiles: Vec<AgentProfile>) -> Self {
        Self { profiles }
    }

    /// Add a profile.
    pub fn push(&mut self, profile: AgentProfile) {
        self.profiles.push(profile);
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl AgentDirectory for InMemoryDirectory {
    fn list_agents(&self) -> Result<Vec<AgentProfile>, DirectoryError> {
        Ok(self.profiles.clone())
    }
}

/// Agents grouped by role, each group in stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    by_role: BTreeMap<Role, Vec<Agent>>,
}

impl Roster {
    /// Validate profiles and group them by role.
    pub fn build(profiles: Vec<AgentProfile>) -> Result<Self, RosterError> {
        let mut seen = BTreeSet::new();
        let mut agents = Vec::with_capacity(profiles.len());
        for profile in profiles {
            if !seen.insert(profile.id) {
                return Err(RosterError::DuplicateAgent {
                    agent_id: profile.id,
                });
            }
            agents.push(Agent::try_from(profile)?);
        }
        agents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut by_role: BTreeMap<Role, Vec<Agent>> = BTreeMap::new();
        for agent in agents {
            by_role.entry(agent.role).or_default().push(agent);
        }
        Ok(Self { by_role })
    }

    /// Read the directory and build a roster from it.
    pub fn load(directory: &dyn AgentDirectory) -> Result<Self, RosterError> {
        Self::build(directory.list_agents()?)
    }

    /// Agents of one role, in stable order.
    pub fn agents(&self, role: Role) -> &[Agent] {
        self.by_role.get(&role).map_or(&[], Vec::as_slice)
    }

    /// Total number of agents.
    pub fn len(&self) -> usize {
        self.by_role.values().map(Vec::len).sum()
    }

    /// Whether there are no agents at all.
    pub fn is_empty(&self) -> bool {
        self.by_role.is_empty()
    }

    /// The opponent for the participant at `index`: the next participant,
    /// wrapping around. Solo participants have none.
    pub fn opponent_of(&self, index: usize) -> Option<AgentId> {
        let participants = self.agents(Role::Participant);
        if participants.len() < 2 {
            return None;
        }
        let next = index.checked_add(1)?.checked_rem(participants.len())?;
        participants.get(next).map(|a| a.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn at(profile: AgentProfile, seconds: i64) -> AgentProfile {
        AgentProfile {
            created_at: DateTime::<Utc>::UNIX_EPOCH
                .checked_add_signed(TimeDelta::seconds(seconds))
                .unwrap(),
            ..profile
        }
    }

    #[test]
    fn agents_are_ordered_by_creation_then_id() {
        let late = at(AgentProfile::new("Late", "crowd"), 20);
        let early = at(AgentProfile::new("Early", "crowd"), 10);
        let tie_a = at(AgentProfile::new("TieA", "crowd"), 15);
        let tie_b = at(AgentProfile::new("TieB", "crowd"), 15);
        let (low, high) = if tie_a.id < tie_b.id {
            (tie_a.name.clone(), tie_b.name.clone())
        } else {
            (tie_b.name.clone(), tie_a.name.clone())
        };

        let roster = Roster::build(vec![late, tie_b, early, tie_a]).unwrap();
        let names: Vec<&str> = roster
            .agents(Role::Crowd)
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["Early", low.as_str(), high.as_str(), "Late"]);
    }

    #[test]
    fn unknown_role_is_an_error() {
        let err = Roster::build(vec![AgentProfile::new("Manager", "manager")]).unwrap_err();
        assert!(matches!(err, RosterError::UnknownRole { .. }));
    }

    #[test]
    fn duplicate_ids_are_an_error() {
        let profile = AgentProfile::new("Rex", "participant");
        let err = Roster::build(vec![profile.clone(), profile]).unwrap_err();
        assert!(matches!(err, RosterError::DuplicateAgent { .. }));
    }

    #[test]
    fn missing_role_has_no_agents() {
        let roster = Roster::build(vec![AgentProfile::new("Rex", "participant")]).unwrap();
        assert!(roster.agents(Role::Referee).is_empty());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn opponent_is_the_next_participant() {
        let a = at(AgentProfile::new("A", "participant"), 1);
        let b = at(AgentProfile::new("B", "participant"), 2);
        let (a_id, b_id) = (a.id, b.id);
        let roster = Roster::build(vec![b, a]).unwrap();
        assert_eq!(roster.opponent_of(0), Some(b_id));
        assert_eq!(roster.opponent_of(1), Some(a_id));
    }

    #[test]
    fn solo_participant_has_no_opponent() {
        let roster = Roster::build(vec![AgentProfile::new("A", "participant")]).unwrap();
        assert_eq!(roster.opponent_of(0), None);
    }

    #[test]
    fn persona_hint_joins_gimmick_and_persona() {
        let profile = AgentProfile::new("Rex", "participant")
            .with_gimmick("The Iron Bull")
            .with_persona("Cocky heel");
        let agent = Agent::try_from(profile).unwrap();
        assert_eq!(agent.persona_hint(), "The Iron Bull. Cocky heel");
    }

    #[test]
    fn in_memory_directory_lists_profiles() {
        let mut dir = InMemoryDirectory::default();
        dir.push(AgentProfile::new("Rex", "participant"));
        let roster = Roster::load(&dir).unwrap();
        assert_eq!(roster.agents(Role::Participant).len(), 1);
    }
}
