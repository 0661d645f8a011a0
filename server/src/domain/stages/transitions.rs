//! Pipeline transition graph
//!
//! The graph is data, not code: an embedded JSON default, optionally
//! replaced by a file at startup. Statuses with an empty allowed list are
//! terminal. Nothing in the transition logic hard-codes status names.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, bail};

/// Default graph shipped with the binary
const DEFAULT_TRANSITIONS: &str = r#"{
    "new":               ["qualified", "lost"],
    "qualified":         ["contacted", "lost"],
    "contacted":         ["meeting_scheduled", "proposal_sent", "lost"],
    "meeting_scheduled": ["proposal_sent", "negotiation", "lost"],
    "proposal_sent":     ["negotiation", "won", "lost"],
    "negotiation":       ["won", "lost"],
    "won":               [],
    "lost":              []
}"#;

/// Allowed-next lookup for pipeline statuses
#[derive(Debug, Clone)]
pub struct TransitionGraph {
    edges: HashMap<String, Vec<String>>,
}

impl TransitionGraph {
    /// Load the graph: the embedded default, or the file at `path`
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).with_context(|| {
                    format!("failed to read transitions file: {}", path.display())
                })?;
                let graph = Self::from_json(&raw)
                    .with_context(|| format!("invalid transitions file: {}", path.display()))?;
                tracing::info!(path = %path.display(), "Loaded pipeline transitions from file");
                Ok(graph)
            }
            None => Self::from_json(DEFAULT_TRANSITIONS),
        }
    }

    /// Parse and validate a `{status: [targets...]}` JSON object
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let edges: HashMap<String, Vec<String>> =
            serde_json::from_str(raw).context("transitions must be a map of status to targets")?;

        if edges.is_empty() {
            bail!("transition graph has no statuses");
        }
        // Every target must itself be a known status
        for (from, targets) in &edges {
            for to in targets {
                if !edges.contains_key(to) {
                    bail!("transition '{from}' -> '{to}' targets an unknown status");
                }
                if to == from {
                    bail!("status '{from}' transitions to itself");
                }
            }
        }

        Ok(Self { edges })
    }

    /// Statuses reachable from `status`; empty for terminal or unknown
    pub fn allowed_next(&self, status: &str) -> &[String] {
        self.edges.get(status).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_allowed(&self, from: &str, to: &str) -> bool {
        self.allowed_next(from).iter().any(|t| t == to)
    }

    pub fn is_known(&self, status: &str) -> bool {
        self.edges.contains_key(status)
    }

    /// Known status with no outgoing transitions
    pub fn is_terminal(&self, status: &str) -> bool {
        self.is_known(status) && self.allowed_next(status).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> TransitionGraph {
        TransitionGraph::load(None).unwrap()
    }

    #[test]
    fn test_default_graph_edges() {
        let g = graph();
        assert_eq!(g.allowed_next("new"), &["qualified", "lost"]);
        assert_eq!(
            g.allowed_next("contacted"),
            &["meeting_scheduled", "proposal_sent", "lost"]
        );
        assert!(g.is_allowed("negotiation", "won"));
        assert!(!g.is_allowed("new", "negotiation"));
    }

    #[test]
    fn test_terminal_statuses() {
        let g = graph();
        assert!(g.is_terminal("won"));
        assert!(g.is_terminal("lost"));
        assert!(!g.is_terminal("new"));
        assert!(g.allowed_next("won").is_empty());
        // Unknown statuses are not terminal, just unknown
        assert!(!g.is_terminal("archived"));
    }

    #[test]
    fn test_rejects_unknown_target() {
        let err = TransitionGraph::from_json(r#"{"new": ["archived"]}"#).unwrap_err();
        assert!(err.to_string().contains("unknown status"));
    }

    #[test]
    fn test_rejects_self_loop() {
        let err = TransitionGraph::from_json(r#"{"new": ["new"]}"#).unwrap_err();
        assert!(err.to_string().contains("itself"));
    }

    #[test]
    fn test_rejects_empty_graph() {
        assert!(TransitionGraph::from_json("{}").is_err());
    }
}
