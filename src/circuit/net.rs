//! Net identity and terminal connectivity resolution.
//!
//! Connections are processed strictly in source order against a
//! monotonically increasing net-id counter. Ground is always net 0; the
//! first allocated net is 1. Nets are reused only through an explicit net
//! name or a plain node name already seen in an earlier connection — two
//! named nets joined only indirectly (never co-listed in one `Connect`)
//! keep distinct ids. That is load-bearing for downstream consumers and
//! must not be "fixed" into a transitive union.

use std::collections::HashMap;
use std::fmt;

use crate::dsl::ast::{Connection, Endpoint};

/// A unique identifier for a net. Net 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetId(pub usize);

impl NetId {
    /// The ground net (always id 0).
    pub const GROUND: NetId = NetId(0);

    /// Check if this is the ground net.
    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resolved net: id, optional name, ground flag. Owned by one
/// [`NetResolver`] run and never shared across compilations.
#[derive(Debug, Clone)]
pub struct NetlistNode {
    pub id: NetId,
    pub name: Option<String>,
    pub is_ground: bool,
}

/// Resolves connection endpoints into net identities and terminal
/// bindings. All counters and tables live on the instance, so concurrent
/// compilations never observe each other.
#[derive(Debug)]
pub struct NetResolver {
    next_id: usize,
    by_name: HashMap<String, NetId>,
    terminals: HashMap<(String, String), NetId>,
    nodes: Vec<NetlistNode>,
}

impl NetResolver {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            by_name: HashMap::new(),
            terminals: HashMap::new(),
            nodes: vec![NetlistNode {
                id: NetId::GROUND,
                name: Some("0".to_string()),
                is_ground: true,
            }],
        }
    }

    /// Process all connections in source order.
    pub fn resolve(&mut self, connections: &[Connection]) {
        for conn in connections {
            self.resolve_connection(conn);
        }
    }

    fn resolve_connection(&mut self, conn: &Connection) {
        let grounded = conn.endpoints.iter().any(|ep| match ep {
            Endpoint::Node { name, is_ground } => *is_ground || Endpoint::is_ground_name(name),
            Endpoint::Terminal { .. } => false,
        });

        let net = if grounded {
            NetId::GROUND
        } else {
            self.find_or_allocate(conn)
        };

        // Terminal bindings are last-write-wins: a later connection
        // re-binding the same (component, terminal) pair overwrites.
        for ep in &conn.endpoints {
            if let Endpoint::Terminal { component, terminal } = ep {
                self.terminals
                    .insert((component.clone(), terminal.clone()), net);
            }
        }
    }

    fn find_or_allocate(&mut self, conn: &Connection) -> NetId {
        let plain_names: Vec<&String> = conn
            .endpoints
            .iter()
            .filter_map(|ep| match ep {
                Endpoint::Node { name, .. } => Some(name),
                Endpoint::Terminal { .. } => None,
            })
            .collect();

        // Explicit net name first, then the first already-known plain
        // node name in endpoint order.
        let existing = conn
            .net
            .as_ref()
            .and_then(|name| self.by_name.get(name).copied())
            .or_else(|| {
                plain_names
                    .iter()
                    .find_map(|name| self.by_name.get(*name).copied())
            });

        let net = existing.unwrap_or_else(|| {
            let id = NetId(self.next_id);
            self.next_id += 1;
            self.nodes.push(NetlistNode {
                id,
                name: conn
                    .net
                    .clone()
                    .or_else(|| plain_names.first().map(|n| (*n).clone())),
                is_ground: false,
            });
            id
        });

        if let Some(name) = &conn.net {
            self.by_name.insert(name.clone(), net);
        }
        for name in plain_names {
            self.by_name.insert(name.clone(), net);
        }
        net
    }

    /// The net bound to a `(component, terminal)` pair, if any.
    pub fn terminal_net(&self, component: &str, terminal: &str) -> Option<NetId> {
        self.terminals
            .get(&(component.to_string(), terminal.to_string()))
            .copied()
    }

    /// The net registered under a node or net name, if any.
    pub fn named_net(&self, name: &str) -> Option<NetId> {
        self.by_name.get(name).copied()
    }

    /// All nets allocated so far, ground first.
    pub fn nodes(&self) -> &[NetlistNode] {
        &self.nodes
    }

    /// True if the component has at least one bound terminal.
    pub fn has_bindings(&self, component: &str) -> bool {
        self.terminals.keys().any(|(comp, _)| comp == component)
    }
}

impl Default for NetResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;

    fn resolve(source: &str) -> NetResolver {
        let program = parse(source).unwrap();
        let mut resolver = NetResolver::new();
        resolver.resolve(&program.connections);
        resolver
    }

    #[test]
    fn test_two_distinct_nets_without_ground() {
        let resolver = resolve(
            "Connect(V1.positive, R1.positive);
             Connect(R1.negative, V1.negative);",
        );
        assert_eq!(resolver.terminal_net("V1", "positive"), Some(NetId(1)));
        assert_eq!(resolver.terminal_net("R1", "positive"), Some(NetId(1)));
        assert_eq!(resolver.terminal_net("R1", "negative"), Some(NetId(2)));
        assert_eq!(resolver.terminal_net("V1", "negative"), Some(NetId(2)));
    }

    #[test]
    fn test_ground_forces_net_zero() {
        let resolver = resolve(
            "Connect(V1.positive, R1.positive);
             Connect(R1.negative, ground);
             Connect(V1.negative, GND);",
        );
        assert_eq!(resolver.terminal_net("R1", "negative"), Some(NetId::GROUND));
        assert_eq!(resolver.terminal_net("V1", "negative"), Some(NetId::GROUND));
        assert_eq!(resolver.terminal_net("V1", "positive"), Some(NetId(1)));
    }

    #[test]
    fn test_zero_spelling_is_ground() {
        let resolver = resolve("Connect(R1.negative, 0);");
        assert_eq!(resolver.terminal_net("R1", "negative"), Some(NetId::GROUND));
    }

    #[test]
    fn test_net_ids_are_monotonic() {
        let resolver = resolve(
            "Connect(A.positive, n1);
             Connect(B.positive, n2);
             Connect(C.positive, n3);",
        );
        assert_eq!(resolver.named_net("n1"), Some(NetId(1)));
        assert_eq!(resolver.named_net("n2"), Some(NetId(2)));
        assert_eq!(resolver.named_net("n3"), Some(NetId(3)));
    }

    #[test]
    fn test_node_name_reuse() {
        let resolver = resolve(
            "Connect(A.positive, mid);
             Connect(B.negative, mid);",
        );
        assert_eq!(resolver.terminal_net("A", "positive"), Some(NetId(1)));
        assert_eq!(resolver.terminal_net("B", "negative"), Some(NetId(1)));
    }

    #[test]
    fn test_explicit_net_name_reuse() {
        let resolver = resolve(
            "Connect(A.positive, B.positive) as vdd;
             Connect(C.positive, D.positive) as vdd;",
        );
        assert_eq!(resolver.terminal_net("A", "positive"), Some(NetId(1)));
        assert_eq!(resolver.terminal_net("C", "positive"), Some(NetId(1)));
    }

    #[test]
    fn test_terminal_last_write_wins() {
        let resolver = resolve(
            "Connect(R1.positive, n1);
             Connect(R1.positive, n2);",
        );
        assert_eq!(resolver.terminal_net("R1", "positive"), Some(NetId(2)));
    }

    #[test]
    fn test_indirect_named_nets_stay_distinct() {
        // n1 and n2 are joined only through R1's terminals, never
        // co-listed in one Connect: they keep distinct ids.
        let resolver = resolve(
            "Connect(R1.positive, n1);
             Connect(R1.positive, n2);",
        );
        assert_eq!(resolver.named_net("n1"), Some(NetId(1)));
        assert_eq!(resolver.named_net("n2"), Some(NetId(2)));
    }

    #[test]
    fn test_ground_case_insensitive() {
        for spelling in ["ground", "GROUND", "Gnd", "gnd"] {
            let source = format!("Connect(R1.negative, {});", spelling);
            let resolver = resolve(&source);
            assert_eq!(
                resolver.terminal_net("R1", "negative"),
                Some(NetId::GROUND),
                "spelling {}",
                spelling
            );
        }
    }
}
