//! Phase and group based access control
//!
//! Every navigable capability of the toolkit is identified by a [`RouteId`].
//! Whether a participant may use it depends only on the current workshop
//! [`Phase`] and the participant's [`GroupNumber`]. The decision is a pure,
//! total lookup: anything the table does not grant is denied.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Workshop stage, set by the facilitator and read by every page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Evidence collection: everyone logs journeys
    #[default]
    #[serde(rename = "1")]
    EvidenceCollection,
    /// Groups 3 and 4 curate categories
    #[serde(rename = "2_categories")]
    Categories,
    /// Groups 1 and 2 build the storyboard
    #[serde(rename = "2_story")]
    Storyboard,
    /// Public contribution to OSM / Wheelmap
    #[serde(rename = "3")]
    PublicContribution,
}

impl Phase {
    /// All phases in workshop order
    pub const ALL: [Phase; 4] = [
        Phase::EvidenceCollection,
        Phase::Categories,
        Phase::Storyboard,
        Phase::PublicContribution,
    ];

    /// Wire form used by the workshop-state endpoint and the database
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::EvidenceCollection => "1",
            Phase::Categories => "2_categories",
            Phase::Storyboard => "2_story",
            Phase::PublicContribution => "3",
        }
    }

    /// Banner text shown at the top of every page
    pub fn banner_label(self) -> String {
        PhaseLabels::default().label(self).to_uppercase()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Invalid phase: {}", s)))
    }
}

/// Human-readable phase names used in banners and denial tooltips
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseLabels {
    labels: [String; 4],
}

impl PhaseLabels {
    pub fn new(
        evidence_collection: impl Into<String>,
        categories: impl Into<String>,
        storyboard: impl Into<String>,
        public_contribution: impl Into<String>,
    ) -> Self {
        Self {
            labels: [
                evidence_collection.into(),
                categories.into(),
                storyboard.into(),
                public_contribution.into(),
            ],
        }
    }

    pub fn label(&self, phase: Phase) -> &str {
        let idx = match phase {
            Phase::EvidenceCollection => 0,
            Phase::Categories => 1,
            Phase::Storyboard => 2,
            Phase::PublicContribution => 3,
        };
        &self.labels[idx]
    }
}

impl Default for PhaseLabels {
    fn default() -> Self {
        Self::new(
            "Phase 1: Evidence Collection",
            "Phase 2: Categories & Governance",
            "Phase 2: Storyboard & Public Expression",
            "Phase 3: Public Contribution",
        )
    }
}

/// Cohort identifier in 1..=4
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GroupNumber(u8);

impl GroupNumber {
    pub fn new(n: u8) -> Option<Self> {
        (1..=4).contains(&n).then_some(Self(n))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Groups 1 and 2 own the storyboard, map and Wheelmap work
    fn is_story_group(self) -> bool {
        matches!(self.0, 1 | 2)
    }

    /// Groups 3 and 4 own categories and OSM work
    fn is_category_group(self) -> bool {
        matches!(self.0, 3 | 4)
    }
}

impl TryFrom<u8> for GroupNumber {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        GroupNumber::new(n).ok_or_else(|| format!("group number out of range: {}", n))
    }
}

impl From<GroupNumber> for u8 {
    fn from(g: GroupNumber) -> u8 {
        g.0
    }
}

impl fmt::Display for GroupNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse a display label such as `"Group 3"` into a group number
///
/// The `Group` prefix is optional and case-insensitive. The first integer
/// after it is used, trailing text is ignored. Returns `None` for anything
/// that does not yield a number in 1..=4.
pub fn parse_group_number(label: &str) -> Option<GroupNumber> {
    let rest = match label.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("group") => &label[5..],
        _ => label,
    };
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('+').unwrap_or(rest);
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let n: u8 = digits.parse().ok()?;
    GroupNumber::new(n)
}

/// Navigable capability of the toolkit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteId {
    Home,
    Start,
    Wizard,
    Feed,
    Category,
    Storyboard,
    Osm,
    Wheelmap,
    Map,
    Export,
    Phase0links,
    Journey,
}

impl RouteId {
    pub const ALL: [RouteId; 12] = [
        RouteId::Home,
        RouteId::Start,
        RouteId::Wizard,
        RouteId::Feed,
        RouteId::Category,
        RouteId::Storyboard,
        RouteId::Osm,
        RouteId::Wheelmap,
        RouteId::Map,
        RouteId::Export,
        RouteId::Phase0links,
        RouteId::Journey,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RouteId::Home => "home",
            RouteId::Start => "start",
            RouteId::Wizard => "wizard",
            RouteId::Feed => "feed",
            RouteId::Category => "category",
            RouteId::Storyboard => "storyboard",
            RouteId::Osm => "osm",
            RouteId::Wheelmap => "wheelmap",
            RouteId::Map => "map",
            RouteId::Export => "export",
            RouteId::Phase0links => "phase0links",
            RouteId::Journey => "journey",
        }
    }

    /// Landing page query a denied caller is sent to
    pub fn denial_redirect(self) -> &'static str {
        match self {
            RouteId::Export => "/?exportDenied=1",
            _ => "/?accessDenied=1",
        }
    }

    /// Phase in which the route opens up, if it is phase-bound
    fn home_phase(self) -> Option<Phase> {
        match self {
            RouteId::Wizard => Some(Phase::EvidenceCollection),
            RouteId::Category | RouteId::Export => Some(Phase::Categories),
            RouteId::Storyboard | RouteId::Map => Some(Phase::Storyboard),
            RouteId::Osm | RouteId::Wheelmap => Some(Phase::PublicContribution),
            _ => None,
        }
    }

    /// Groups the route is reserved for, if it is group-bound
    fn home_groups(self) -> Option<&'static str> {
        match self {
            RouteId::Category | RouteId::Osm => Some("Groups 3 & 4"),
            RouteId::Storyboard | RouteId::Wheelmap | RouteId::Map => Some("Groups 1 & 2"),
            _ => None,
        }
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RouteId::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown route: {}", s)))
    }
}

/// Permission level for a (phase, group, route) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    /// Submit, edit and use tools
    #[serde(rename = "full")]
    Full,
    /// View only
    #[serde(rename = "readonly")]
    ReadOnly,
    /// Redirect away
    #[serde(rename = "none")]
    Denied,
}

impl AccessMode {
    pub fn can_view(self) -> bool {
        !matches!(self, AccessMode::Denied)
    }

    pub fn can_write(self) -> bool {
        matches!(self, AccessMode::Full)
    }
}

/// Decide how the caller may use `route` in `phase`
pub fn route_access(phase: Phase, group: Option<GroupNumber>, route: RouteId) -> AccessMode {
    use AccessMode::{Denied, Full, ReadOnly};

    let story = group.is_some_and(GroupNumber::is_story_group);
    let category = group.is_some_and(GroupNumber::is_category_group);

    match (phase, route) {
        (_, RouteId::Home | RouteId::Start | RouteId::Feed | RouteId::Journey) => Full,

        (Phase::EvidenceCollection, RouteId::Wizard) => Full,
        (Phase::EvidenceCollection, _) => Denied,

        (_, RouteId::Export) => Full,

        (Phase::Categories, RouteId::Category) if category => Full,
        (Phase::Categories, RouteId::Category) if story => ReadOnly,

        (Phase::Storyboard, RouteId::Storyboard) if story => Full,
        (Phase::Storyboard, RouteId::Storyboard) if category => ReadOnly,
        (Phase::Storyboard, RouteId::Category) if group.is_some() => ReadOnly,
        (Phase::Storyboard, RouteId::Map) if story => Full,

        (Phase::PublicContribution, RouteId::Storyboard) => ReadOnly,
        (Phase::PublicContribution, RouteId::Osm) if category => Full,
        (Phase::PublicContribution, RouteId::Wheelmap | RouteId::Map) if story => Full,

        _ => Denied,
    }
}

/// Explain why a navigation link is disabled
///
/// Returns an empty string when the caller has any access to the route.
pub fn nav_tooltip(
    route: RouteId,
    phase: Phase,
    group: Option<GroupNumber>,
    labels: &PhaseLabels,
) -> String {
    if route_access(phase, group, route).can_view() {
        return String::new();
    }

    match (route.home_phase(), route.home_groups()) {
        (Some(p), _) if p != phase => format!("Available in {}", labels.label(p)),
        (_, Some(groups)) => format!("Available for {}", groups),
        _ => "This module becomes available in a later phase.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(n: u8) -> Option<GroupNumber> {
        GroupNumber::new(n)
    }

    fn all_groups() -> Vec<Option<GroupNumber>> {
        vec![None, g(1), g(2), g(3), g(4)]
    }

    #[test]
    fn test_category_locked_in_evidence_phase() {
        assert_eq!(
            route_access(Phase::EvidenceCollection, None, RouteId::Category),
            AccessMode::Denied
        );
    }

    #[test]
    fn test_category_phase_group_split() {
        assert_eq!(route_access(Phase::Categories, g(3), RouteId::Category), AccessMode::Full);
        assert_eq!(route_access(Phase::Categories, g(4), RouteId::Category), AccessMode::Full);
        assert_eq!(route_access(Phase::Categories, g(1), RouteId::Category), AccessMode::ReadOnly);
        assert_eq!(route_access(Phase::Categories, None, RouteId::Category), AccessMode::Denied);
    }

    #[test]
    fn test_evidence_phase_table() {
        for group in all_groups() {
            for route in RouteId::ALL {
                let expected = match route {
                    RouteId::Home
                    | RouteId::Start
                    | RouteId::Feed
                    | RouteId::Wizard
                    | RouteId::Journey => AccessMode::Full,
                    _ => AccessMode::Denied,
                };
                assert_eq!(
                    route_access(Phase::EvidenceCollection, group, route),
                    expected,
                    "route {} group {:?}",
                    route,
                    group
                );
            }
        }
    }

    #[test]
    fn test_categories_phase_locks_story_tools() {
        for group in all_groups() {
            for route in [RouteId::Storyboard, RouteId::Map, RouteId::Osm, RouteId::Wheelmap, RouteId::Wizard] {
                assert_eq!(route_access(Phase::Categories, group, route), AccessMode::Denied);
            }
            assert_eq!(route_access(Phase::Categories, group, RouteId::Export), AccessMode::Full);
        }
    }

    #[test]
    fn test_story_phase_swaps_roles() {
        assert_eq!(route_access(Phase::Storyboard, g(1), RouteId::Storyboard), AccessMode::Full);
        assert_eq!(route_access(Phase::Storyboard, g(2), RouteId::Storyboard), AccessMode::Full);
        assert_eq!(route_access(Phase::Storyboard, g(3), RouteId::Storyboard), AccessMode::ReadOnly);
        assert_eq!(route_access(Phase::Storyboard, None, RouteId::Storyboard), AccessMode::Denied);

        assert_eq!(route_access(Phase::Storyboard, g(1), RouteId::Category), AccessMode::ReadOnly);
        assert_eq!(route_access(Phase::Storyboard, g(4), RouteId::Category), AccessMode::ReadOnly);
        assert_eq!(route_access(Phase::Storyboard, None, RouteId::Category), AccessMode::Denied);

        assert_eq!(route_access(Phase::Storyboard, g(2), RouteId::Map), AccessMode::Full);
        assert_eq!(route_access(Phase::Storyboard, g(3), RouteId::Map), AccessMode::Denied);
        assert_eq!(route_access(Phase::Storyboard, g(1), RouteId::Wheelmap), AccessMode::Denied);
    }

    #[test]
    fn test_public_contribution_phase() {
        for group in all_groups() {
            assert_eq!(
                route_access(Phase::PublicContribution, group, RouteId::Storyboard),
                AccessMode::ReadOnly
            );
            assert_eq!(
                route_access(Phase::PublicContribution, group, RouteId::Category),
                AccessMode::Denied
            );
            assert_eq!(
                route_access(Phase::PublicContribution, group, RouteId::Wizard),
                AccessMode::Denied
            );
        }
        assert_eq!(route_access(Phase::PublicContribution, g(3), RouteId::Osm), AccessMode::Full);
        assert_eq!(route_access(Phase::PublicContribution, g(1), RouteId::Osm), AccessMode::Denied);
        assert_eq!(route_access(Phase::PublicContribution, g(1), RouteId::Wheelmap), AccessMode::Full);
        assert_eq!(route_access(Phase::PublicContribution, g(2), RouteId::Map), AccessMode::Full);
        assert_eq!(route_access(Phase::PublicContribution, g(4), RouteId::Map), AccessMode::Denied);
        assert_eq!(route_access(Phase::PublicContribution, None, RouteId::Wheelmap), AccessMode::Denied);
    }

    #[test]
    fn test_phase0links_never_granted() {
        for phase in Phase::ALL {
            for group in all_groups() {
                assert_eq!(route_access(phase, group, RouteId::Phase0links), AccessMode::Denied);
            }
        }
    }

    #[test]
    fn test_route_access_is_deterministic() {
        for phase in Phase::ALL {
            for group in all_groups() {
                for route in RouteId::ALL {
                    assert_eq!(
                        route_access(phase, group, route),
                        route_access(phase, group, route)
                    );
                }
            }
        }
    }

    #[test]
    fn test_tooltip_empty_when_accessible() {
        let labels = PhaseLabels::default();
        assert_eq!(nav_tooltip(RouteId::Feed, Phase::Categories, None, &labels), "");
        assert_eq!(nav_tooltip(RouteId::Category, Phase::Categories, g(1), &labels), "");
    }

    #[test]
    fn test_tooltip_points_to_home_phase() {
        let labels = PhaseLabels::default();
        assert_eq!(
            nav_tooltip(RouteId::Category, Phase::EvidenceCollection, g(3), &labels),
            "Available in Phase 2: Categories & Governance"
        );
        assert_eq!(
            nav_tooltip(RouteId::Wizard, Phase::PublicContribution, g(1), &labels),
            "Available in Phase 1: Evidence Collection"
        );
    }

    #[test]
    fn test_tooltip_points_to_groups_in_home_phase() {
        let labels = PhaseLabels::default();
        assert_eq!(
            nav_tooltip(RouteId::Osm, Phase::PublicContribution, g(1), &labels),
            "Available for Groups 3 & 4"
        );
        assert_eq!(
            nav_tooltip(RouteId::Category, Phase::Categories, None, &labels),
            "Available for Groups 3 & 4"
        );
    }

    #[test]
    fn test_tooltip_fallback() {
        let labels = PhaseLabels::default();
        assert_eq!(
            nav_tooltip(RouteId::Phase0links, Phase::Categories, g(2), &labels),
            "This module becomes available in a later phase."
        );
    }

    #[test]
    fn test_tooltip_uses_supplied_labels() {
        let labels = PhaseLabels::new("One", "Two A", "Two B", "Three");
        assert_eq!(
            nav_tooltip(RouteId::Storyboard, Phase::Categories, g(1), &labels),
            "Available in Two B"
        );
    }

    #[test]
    fn test_parse_group_number() {
        assert_eq!(parse_group_number("Group 3"), g(3));
        assert_eq!(parse_group_number("group4"), g(4));
        assert_eq!(parse_group_number("GROUP   1 (mapping)"), g(1));
        assert_eq!(parse_group_number("2"), g(2));
        assert_eq!(parse_group_number("Group 5"), None);
        assert_eq!(parse_group_number("Group 0"), None);
        assert_eq!(parse_group_number("Table 2"), None);
        assert_eq!(parse_group_number("Groups 2"), None);
        assert_eq!(parse_group_number(""), None);
        assert_eq!(parse_group_number("Group 99999999999999999999"), None);
    }

    #[test]
    fn test_phase_wire_round_trip() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
        assert!("0".parse::<Phase>().is_err());
        assert!("2".parse::<Phase>().is_err());
        let json = serde_json::to_string(&Phase::Storyboard).unwrap();
        assert_eq!(json, "\"2_story\"");
    }

    #[test]
    fn test_access_mode_wire_form() {
        assert_eq!(serde_json::to_string(&AccessMode::Denied).unwrap(), "\"none\"");
        assert_eq!(serde_json::to_string(&AccessMode::ReadOnly).unwrap(), "\"readonly\"");
    }

    #[test]
    fn test_banner_label() {
        assert_eq!(
            Phase::PublicContribution.banner_label(),
            "PHASE 3: PUBLIC CONTRIBUTION"
        );
    }
}
