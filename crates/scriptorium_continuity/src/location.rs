//! Location graph with directed, costed transitions.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, VecDeque};
use std::cmp::Reverse;

/// A directed transition between two locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
pub struct Transition {
    from: String,
    to: String,
    /// Narrative time units needed to travel
    cost: u32,
}

/// Known locations and the transitions between them.
///
/// Transitions keep insertion order; path search breaks ties by it.
///
/// # Examples
///
/// ```
/// use scriptorium_continuity::LocationGraph;
///
/// let mut graph = LocationGraph::default();
/// graph.add_transition("Harbor", "Market", 1);
/// graph.add_transition("Market", "Tower", 2);
///
/// assert_eq!(graph.find_path("Harbor", "Tower"), vec!["Harbor", "Market", "Tower"]);
/// assert_eq!(graph.travel_cost("Harbor", "Tower"), Some(3));
/// assert!(graph.find_path("Tower", "Harbor").is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters)]
pub struct LocationGraph {
    locations: BTreeSet<String>,
    transitions: Vec<Transition>,
}

impl LocationGraph {
    /// True when no locations are known.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Whether the location is known.
    pub fn contains(&self, location: &str) -> bool {
        self.locations.contains(location)
    }

    /// Add a location; returns false if it was already known.
    pub fn add_location(&mut self, location: impl Into<String>) -> bool {
        self.locations.insert(location.into())
    }

    /// Add a transition, registering both endpoints.
    ///
    /// A repeated `from→to` pair keeps the cheaper cost.
    pub fn add_transition(&mut self, from: impl Into<String>, to: impl Into<String>, cost: u32) {
        let from = from.into();
        let to = to.into();
        self.locations.insert(from.clone());
        self.locations.insert(to.clone());
        if let Some(existing) = self
            .transitions
            .iter_mut()
            .find(|t| t.from == from && t.to == to)
        {
            existing.cost = existing.cost.min(cost);
            return;
        }
        self.transitions.push(Transition { from, to, cost });
    }

    /// Outgoing transitions in insertion order.
    pub fn neighbors<'a>(&'a self, from: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| t.from == from)
    }

    /// Fewest-hop path from `from` to `to`, both ends included.
    ///
    /// Empty when either end is unknown or `to` is unreachable. A path from a
    /// known location to itself is that single location.
    pub fn find_path(&self, from: &str, to: &str) -> Vec<String> {
        if !self.contains(from) || !self.contains(to) {
            return Vec::new();
        }
        if from == to {
            return vec![from.to_string()];
        }

        let mut previous: BTreeMap<&str, &str> = BTreeMap::new();
        let mut visited: BTreeSet<&str> = BTreeSet::from([from]);
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            for transition in self.neighbors(current) {
                let next = transition.to.as_str();
                if !visited.insert(next) {
                    continue;
                }
                previous.insert(next, current);
                if next == to {
                    let mut path = vec![to.to_string()];
                    let mut cursor = to;
                    while let Some(prev) = previous.get(cursor) {
                        path.push(prev.to_string());
                        cursor = *prev;
                    }
                    path.reverse();
                    return path;
                }
                queue.push_back(next);
            }
        }
        Vec::new()
    }

    /// Cheapest total travel cost from `from` to `to`, if reachable.
    pub fn travel_cost(&self, from: &str, to: &str) -> Option<u32> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        let mut best: BTreeMap<&str, u32> = BTreeMap::from([(from, 0)]);
        let mut heap = BinaryHeap::from([Reverse((0u32, from))]);

        while let Some(Reverse((cost, current))) = heap.pop() {
            if current == to {
                return Some(cost);
            }
            if best.get(current).is_some_and(|b| cost > *b) {
                continue;
            }
            for transition in self.neighbors(current) {
                let next_cost = cost.saturating_add(transition.cost);
                let next = transition.to.as_str();
                if best.get(next).is_none_or(|b| next_cost < *b) {
                    best.insert(next, next_cost);
                    heap.push(Reverse((next_cost, next)));
                }
            }
        }
        None
    }

    /// Whether a move between two locations fits in `elapsed` time units.
    ///
    /// An empty graph permits every move. Staying put is always valid. A
    /// destination the graph does not know is rejected.
    pub fn permits(&self, from: &str, to: &str, elapsed: u32) -> bool {
        if self.is_empty() || from == to {
            return true;
        }
        self.travel_cost(from, to).is_some_and(|cost| cost <= elapsed)
    }
}
