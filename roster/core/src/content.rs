//! Content Source - Live Participant Lists
//!
//! A list column shows the host's live participants, filtered for the viewer
//! and ordered by one of a small family of sort rules. The host is asked once
//! per tick for a [`ParticipantSnapshot`]; every session renders from the
//! same snapshot.
//!
//! # Sort Rules
//!
//! | rule              | weight                          | order      |
//! |-------------------|---------------------------------|------------|
//! | `none`            | -                               | host order |
//! | `distance`        | distance to the viewer          | ascending  |
//! | `number_variable` | host variable parsed as number  | descending |
//! | `group_weight`    | weight of the highest group     | descending |
//! | `string_variable` | always 0                        | host order |
//!
//! Sorting is stable, so equal weights keep the host's order.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::addressing::ParticipantId;
use crate::config::definitions::GroupDef;
use crate::error::RosterError;
use crate::groups::resolve_highest;
use crate::host::{Participant, RosterHost};

/// How a list column orders its participants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortRule {
    /// Keep the host's order
    #[default]
    None,
    /// Nearest to the viewer first
    Distance,
    /// Largest numeric variable first
    NumberVariable,
    /// Heaviest group first
    GroupWeight,
    /// Placeholder rule with no ordering of its own
    StringVariable,
}

impl SortRule {
    /// Whether the rule needs a host variable name
    #[must_use]
    pub fn needs_variable(self) -> bool {
        matches!(self, Self::NumberVariable | Self::StringVariable)
    }
}

/// Everyone online at the start of a tick
#[derive(Debug, Clone, Default)]
pub struct ParticipantSnapshot {
    participants: Vec<Participant>,
    by_id: HashMap<ParticipantId, usize>,
    by_name: HashMap<String, usize>,
}

impl ParticipantSnapshot {
    /// Ask the host for its current participants
    #[must_use]
    pub fn capture(host: &dyn RosterHost) -> Self {
        Self::from_participants(host.participants())
    }

    /// Build a snapshot from an explicit list
    #[must_use]
    pub fn from_participants(participants: Vec<Participant>) -> Self {
        let mut by_id = HashMap::with_capacity(participants.len());
        let mut by_name = HashMap::with_capacity(participants.len());
        for (index, participant) in participants.iter().enumerate() {
            by_id.insert(participant.id, index);
            by_name.entry(participant.name.to_lowercase()).or_insert(index);
        }
        Self {
            participants,
            by_id,
            by_name,
        }
    }

    /// Participant by identity
    #[must_use]
    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.by_id.get(id).map(|&index| &self.participants[index])
    }

    /// Participant by name, ignoring case
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Participant> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&index| &self.participants[index])
    }

    /// All participants in host order
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    /// Number of participants
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether nobody is online
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

/// Filter and ordering for one list column
#[derive(Debug, Clone, Copy)]
pub struct ListQuery<'a> {
    /// Sort rule
    pub sort: SortRule,
    /// Host variable the rule reads, if it needs one
    pub sort_variable: Option<&'a str>,
    /// Permission a participant must hold to be listed; empty lists everyone
    pub permission: &'a str,
}

/// Highest-weight group a participant belongs to
#[must_use]
pub fn highest_group<'a>(
    host: &dyn RosterHost,
    participant: &ParticipantId,
    groups: &'a [GroupDef],
) -> Option<&'a GroupDef> {
    resolve_highest(groups, |permission| host.has_permission(participant, permission))
}

/// Participants `viewer` should see in a list, in display order
#[must_use]
pub fn list_participants<'s>(
    host: &dyn RosterHost,
    snapshot: &'s ParticipantSnapshot,
    viewer: &ParticipantId,
    query: &ListQuery<'_>,
    groups: &[GroupDef],
) -> Vec<&'s Participant> {
    let listed = snapshot.iter().filter(|p| {
        host.can_see(viewer, &p.id)
            && (query.permission.is_empty() || host.has_permission(&p.id, query.permission))
    });

    let origin = snapshot.get(viewer).and_then(|p| p.location.as_ref());
    let mut weighted: Vec<(&Participant, f64)> = match query.sort {
        SortRule::None | SortRule::StringVariable => return listed.collect(),
        SortRule::Distance => listed
            .map(|p| {
                let distance = match (origin, p.location.as_ref()) {
                    (Some(from), Some(to)) => from.distance(to),
                    _ => f64::INFINITY,
                };
                (p, distance)
            })
            .collect(),
        SortRule::NumberVariable => listed
            .map(|p| (p, number_weight(host, p, query.sort_variable)))
            .collect(),
        SortRule::GroupWeight => listed
            .map(|p| {
                let weight = highest_group(host, &p.id, groups).map_or(0, |g| g.weight);
                (p, f64::from(weight))
            })
            .collect(),
    };

    let ascending = query.sort == SortRule::Distance;
    weighted.sort_by(|a, b| {
        let order: Ordering = a.1.total_cmp(&b.1);
        if ascending {
            order
        } else {
            order.reverse()
        }
    });
    weighted.into_iter().map(|(p, _)| p).collect()
}

fn number_weight(host: &dyn RosterHost, participant: &Participant, variable: Option<&str>) -> f64 {
    let Some(variable) = variable else {
        return 0.0;
    };
    let value = host.variable(&participant.id, variable).unwrap_or_default();
    match value.trim().parse::<f64>() {
        Ok(weight) if weight.is_finite() => weight,
        _ => {
            let error = RosterError::UnknownSortRule {
                variable: variable.to_string(),
                value,
            };
            tracing::debug!(participant = %participant.id, %error, "Sort weight defaulted to 0");
            0.0
        }
    }
}
