//! Cluster model
//!
//! Value types shared by the resolver, the scheduler and the executor:
//! - `Color`: one of the two deployment groups
//! - `Cluster` / `ClusterGroup`: observed hostnames and deployed version
//! - `ClusterState` / `ClusterGroupState`: node counts and version, used for planning
//! - `Step`: one point on the migration path
//!
//! Every per-color container is a [`ColorMap`], so both colors are always
//! present. A missing color is unrepresentable rather than "zero".

use crate::error::ModelError;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// Deployment group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// First group in canonical order
    Blue,
    /// Second group in canonical order
    Green,
}

impl Color {
    /// Both valid colors, canonical order
    pub const ALL: [Color; 2] = [Color::Blue, Color::Green];

    /// The complement color
    #[inline]
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Color::Blue => Color::Green,
            Color::Green => Color::Blue,
        }
    }

    /// Lowercase name, as used in serialized records
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::Green => "green",
        }
    }

    /// Capitalized name, as used in human output and terraform variables
    #[inline]
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Color::Blue => "Blue",
            Color::Green => "Green",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blue" => Ok(Color::Blue),
            "green" => Ok(Color::Green),
            _ => Err(ModelError::UnknownColor(s.to_string())),
        }
    }
}

/// One value per color
///
/// Serializes as an object keyed by color name: `{"blue": .., "green": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ColorMap<T> {
    /// Value for [`Color::Blue`]
    pub blue: T,
    /// Value for [`Color::Green`]
    pub green: T,
}

impl<T> ColorMap<T> {
    /// Create from both values
    #[inline]
    #[must_use]
    pub fn new(blue: T, green: T) -> Self {
        Self { blue, green }
    }

    /// Build each slot from its color
    pub fn from_fn(mut f: impl FnMut(Color) -> T) -> Self {
        Self {
            blue: f(Color::Blue),
            green: f(Color::Green),
        }
    }

    /// Iterate in canonical color order
    pub fn iter(&self) -> impl Iterator<Item = (Color, &T)> {
        Color::ALL.into_iter().map(move |color| (color, &self[color]))
    }

    /// Map each slot to a new value
    pub fn map<U>(&self, mut f: impl FnMut(Color, &T) -> U) -> ColorMap<U> {
        ColorMap::from_fn(|color| f(color, &self[color]))
    }
}

impl<T> Index<Color> for ColorMap<T> {
    type Output = T;

    fn index(&self, color: Color) -> &T {
        match color {
            Color::Blue => &self.blue,
            Color::Green => &self.green,
        }
    }
}

impl<T> IndexMut<Color> for ColorMap<T> {
    fn index_mut(&mut self, color: Color) -> &mut T {
        match color {
            Color::Blue => &mut self.blue,
            Color::Green => &mut self.green,
        }
    }
}

/// Node count per color; one point on the migration path
///
/// A step is the equivalent of the arguments to a single apply
/// (`-var versionBlueCount=10 -var versionGreenCount=5`).
pub type Step = ColorMap<usize>;

impl ColorMap<usize> {
    /// Total nodes across both colors
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.blue + self.green
    }
}

impl fmt::Display for ColorMap<usize> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blue:{} Green:{}", self.blue, self.green)
    }
}

/// Observed group: provisioned hostnames plus deployed version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterGroup {
    /// Hostnames in provisioning order
    pub hosts: Vec<String>,
    /// Version deployed to this group
    pub version: Version,
}

impl ClusterGroup {
    /// Create a group
    #[must_use]
    pub fn new(hosts: Vec<String>, version: Version) -> Self {
        Self { hosts, version }
    }
}

impl Default for ClusterGroup {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            version: zero_version(),
        }
    }
}

/// Observed cluster: hostnames and version per color
pub type Cluster = ColorMap<ClusterGroup>;

impl ColorMap<ClusterGroup> {
    /// Planning view of the observed cluster
    #[must_use]
    pub fn as_cluster_state(&self) -> ClusterState {
        self.map(|_, group| ClusterGroupState {
            count: group.hosts.len(),
            version: group.version.clone(),
        })
    }

    /// Locate a host: its color and its index within the group
    #[must_use]
    pub fn find_host(&self, hostname: &str) -> Option<(Color, usize)> {
        let hostname = hostname.trim();
        self.iter().find_map(|(color, group)| {
            group
                .hosts
                .iter()
                .position(|host| host == hostname)
                .map(|index| (color, index))
        })
    }
}

/// Planning group: node count plus version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterGroupState {
    /// Number of nodes
    pub count: usize,
    /// Version of the nodes
    pub version: Version,
}

impl ClusterGroupState {
    /// Create a group state
    #[must_use]
    pub fn new(count: usize, version: Version) -> Self {
        Self { count, version }
    }
}

impl Default for ClusterGroupState {
    fn default() -> Self {
        Self {
            count: 0,
            version: zero_version(),
        }
    }
}

/// Planning cluster: count and version per color
pub type ClusterState = ColorMap<ClusterGroupState>;

impl ColorMap<ClusterGroupState> {
    /// True if both groups have zero nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().all(|(_, group)| group.count == 0)
    }

    /// True if at most one group has nodes
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.iter().filter(|(_, group)| group.count != 0).count() <= 1
    }

    /// The single color with nodes, or [`Color::Blue`] when the cluster is empty
    ///
    /// # Errors
    /// `ModelError::NotCleanState` if both colors have nodes
    pub fn group(&self) -> Result<Color, ModelError> {
        if !self.is_clean() {
            return Err(ModelError::NotCleanState(self.to_string()));
        }
        Ok(self
            .iter()
            .find(|(_, group)| group.count != 0)
            .map_or(Color::Blue, |(color, _)| color))
    }

    /// Same node count in every color (versions ignored)
    #[must_use]
    pub fn equal_node_count(&self, other: &ClusterState) -> bool {
        self.as_step() == other.as_step()
    }

    /// Node counts match the step
    #[must_use]
    pub fn equal_step(&self, step: &Step) -> bool {
        self.as_step() == *step
    }

    /// Copy with `delta` nodes added to (or removed from) one color
    #[must_use]
    pub fn add_nodes(&self, color: Color, delta: isize) -> ClusterState {
        let mut next = self.clone();
        next[color].count = next[color].count.saturating_add_signed(delta);
        next
    }

    /// Node counts only
    #[must_use]
    pub fn as_step(&self) -> Step {
        self.map(|_, group| group.count)
    }
}

impl fmt::Display for ColorMap<ClusterGroupState> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Blue@{}:{} Green@{}:{}",
            self.blue.version, self.blue.count, self.green.version, self.green.count
        )
    }
}

/// `0.0.0`, the version of a group that was never deployed
#[inline]
#[must_use]
pub fn zero_version() -> Version {
    Version::new(0, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(blue: usize, green: usize) -> ClusterState {
        ClusterState::new(
            ClusterGroupState::new(blue, zero_version()),
            ClusterGroupState::new(green, zero_version()),
        )
    }

    #[test]
    fn color_other_is_complement() {
        assert_eq!(Color::Blue.other(), Color::Green);
        assert_eq!(Color::Green.other(), Color::Blue);
    }

    #[test]
    fn color_parse_is_case_insensitive() {
        assert_eq!("Green".parse::<Color>().unwrap(), Color::Green);
        assert_eq!(" blue ".parse::<Color>().unwrap(), Color::Blue);
        assert!(matches!("red".parse::<Color>(), Err(ModelError::UnknownColor(_))));
    }

    #[test]
    fn group_of_clean_states() {
        assert_eq!(state(0, 0).group().unwrap(), Color::Blue);
        assert_eq!(state(3, 0).group().unwrap(), Color::Blue);
        assert_eq!(state(0, 3).group().unwrap(), Color::Green);
    }

    #[test]
    fn group_of_mixed_state_fails() {
        let mixed = state(1, 3);
        assert!(!mixed.is_clean());
        assert!(matches!(mixed.group(), Err(ModelError::NotCleanState(_))));
    }

    #[test]
    fn add_nodes_saturates_at_zero() {
        let next = state(2, 0).add_nodes(Color::Blue, -5);
        assert_eq!(next.blue.count, 0);
        let next = state(2, 0).add_nodes(Color::Green, 4);
        assert_eq!(next.as_step(), Step::new(2, 4));
    }

    #[test]
    fn cluster_as_state_counts_hosts() {
        let mut cluster = Cluster::default();
        cluster.green = ClusterGroup::new(
            vec!["a.example.com".into(), "b.example.com".into()],
            Version::new(0, 1, 0),
        );
        let cs = cluster.as_cluster_state();
        assert_eq!(cs.green.count, 2);
        assert_eq!(cs.green.version, Version::new(0, 1, 0));
        assert_eq!(cs.blue, ClusterGroupState::default());
    }

    #[test]
    fn find_host_reports_color_and_index() {
        let mut cluster = Cluster::default();
        cluster.blue.hosts = vec!["x".into(), "y".into()];
        assert_eq!(cluster.find_host(" y\n"), Some((Color::Blue, 1)));
        assert_eq!(cluster.find_host("z"), None);
    }

    #[test]
    fn step_serializes_keyed_by_color() {
        let json = serde_json::to_string(&Step::new(1, 2)).unwrap();
        assert_eq!(json, r#"{"blue":1,"green":2}"#);
        assert!(serde_json::from_str::<Step>(r#"{"blue":1}"#).is_err());
    }

    #[test]
    fn display_formats() {
        assert_eq!(Step::new(4, 0).to_string(), "Blue:4 Green:0");
        assert_eq!(state(0, 2).to_string(), "Blue@0.0.0:0 Green@0.0.0:2");
    }
}
