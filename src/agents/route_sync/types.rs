//! Routing Replication Types
//!
//! Containers, resource nodes and the bindings replicated onto them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::str::FromStr;

use crate::agents::error::{ReplicationError, Result};
use crate::agents::identity::AccountScope;

/// HTTP verb bound to a resource node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Any,
}

impl HttpVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Head => "HEAD",
            HttpVerb::Options => "OPTIONS",
            HttpVerb::Any => "ANY",
        }
    }

    /// Verb segment used in execute-api source ARNs
    pub fn arn_segment(&self) -> &'static str {
        match self {
            HttpVerb::Any => "*",
            other => other.as_str(),
        }
    }
}

impl std::fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = ReplicationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpVerb::Get),
            "POST" => Ok(HttpVerb::Post),
            "PUT" => Ok(HttpVerb::Put),
            "DELETE" => Ok(HttpVerb::Delete),
            "PATCH" => Ok(HttpVerb::Patch),
            "HEAD" => Ok(HttpVerb::Head),
            "OPTIONS" => Ok(HttpVerb::Options),
            "ANY" => Ok(HttpVerb::Any),
            other => Err(ReplicationError::MalformedTree(format!(
                "unsupported HTTP verb: {}",
                other
            ))),
        }
    }
}

/// A routing container (REST API) in one account scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingContainer {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub scope: AccountScope,
    pub region: String,
}

/// What is currently registered for one verb on a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodState {
    /// Backend target of the method's integration, if one is attached
    pub integration_uri: Option<String>,
}

/// One path segment in a container's hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: String,
    /// Weak reference: resolved by id lookup only
    pub parent_id: Option<String>,
    /// `None` only for the root
    pub path_part: Option<String>,
    pub path: String,
    pub methods: BTreeMap<HttpVerb, MethodState>,
}

impl ResourceNode {
    pub fn is_root(&self) -> bool {
        self.path == "/"
    }
}

/// Flat node set of one container, with parent-first traversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTree {
    pub container_id: String,
    pub nodes: Vec<ResourceNode>,
}

impl ResourceTree {
    pub fn new(container_id: impl Into<String>, nodes: Vec<ResourceNode>) -> Self {
        Self {
            container_id: container_id.into(),
            nodes,
        }
    }

    pub fn node(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The single root node, looked up by path "/"
    pub fn root(&self) -> Result<&ResourceNode> {
        let mut roots = self.nodes.iter().filter(|n| n.is_root());
        let root = roots.next().ok_or_else(|| {
            ReplicationError::MalformedTree(format!(
                "container {} has no root resource",
                self.container_id
            ))
        })?;
        if roots.next().is_some() {
            return Err(ReplicationError::MalformedTree(format!(
                "container {} has more than one root resource",
                self.container_id
            )));
        }
        Ok(root)
    }

    /// Breadth-first order from the root; a parent always precedes its children
    pub fn traversal_order(&self) -> Result<Vec<&ResourceNode>> {
        let root = self.root()?;

        let mut children: HashMap<&str, Vec<&ResourceNode>> = HashMap::new();
        for node in self.nodes.iter().filter(|n| !n.is_root()) {
            let parent = node.parent_id.as_deref().ok_or_else(|| {
                ReplicationError::MalformedTree(format!("resource {} has no parent", node.path))
            })?;
            children.entry(parent).or_default().push(node);
        }
        for siblings in children.values_mut() {
            siblings.sort_by(|a, b| a.path_part.cmp(&b.path_part));
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([root]);

        while let Some(node) = queue.pop_front() {
            if !seen.insert(node.id.as_str()) {
                continue;
            }
            order.push(node);
            if let Some(kids) = children.get(node.id.as_str()) {
                queue.extend(kids.iter().copied());
            }
        }

        if order.len() != self.nodes.len() {
            let orphans: Vec<&str> = self
                .nodes
                .iter()
                .filter(|n| !seen.contains(n.id.as_str()))
                .map(|n| n.path.as_str())
                .collect();
            return Err(ReplicationError::MalformedTree(format!(
                "resources not reachable from root: {}",
                orphans.join(", ")
            )));
        }

        Ok(order)
    }

    /// Number of (node, verb) pairs in the tree
    pub fn method_count(&self) -> usize {
        self.nodes.iter().map(|n| n.methods.len()).sum()
    }
}

/// A verb registered on a destination node, with its proxy integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodBinding {
    pub resource_id: String,
    pub path: String,
    pub verb: HttpVerb,
    /// Always `NONE`; source authorization is not preserved
    pub authorization: String,
    /// Destination function invocation URI
    pub integration_uri: String,
}

/// Grant letting the routing service invoke the destination function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationPermission {
    pub function_name: String,
    pub statement_id: String,
    pub principal: String,
    pub action: String,
    /// `arn:aws:execute-api:<region>:<account>:<container>/*/<verb>/*`
    pub source_arn: String,
}

/// Outcome of a permission grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantOutcome {
    Granted,
    /// The registry refused with a conflict, carrying its raw message.
    /// Either the statement id exists or the function is mid-update.
    Conflict(String),
}

/// A deployed snapshot of a container's tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub container_id: String,
    pub stage: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Summary of a routing replication run
#[derive(Debug, Clone, Serialize)]
pub struct RouteSyncReport {
    pub source_container_id: String,
    pub destination_container_id: String,
    pub container_created: bool,
    pub nodes_created: Vec<String>,
    pub nodes_reused: usize,
    pub methods_created: usize,
    pub integrations_put: usize,
    pub permissions_granted: usize,
    pub permissions_reused: usize,
    pub pairs_skipped: usize,
    pub deployment: Deployment,
}

/// What a run produced
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplicationOutcome {
    /// No routing container is bound to the source function
    NoTrigger { function_name: String },
    Replicated(RouteSyncReport),
}

impl ReplicationOutcome {
    /// Format the outcome for display
    pub fn display(&self) -> String {
        match self {
            ReplicationOutcome::NoTrigger { function_name } => {
                format!("No API trigger present for {}", function_name)
            }
            ReplicationOutcome::Replicated(r) => format!(
                "API replicated:\n  Source API: {}\n  Destination API: {}{}\n  Resources created: {} (reused {})\n  Methods created: {}\n  Integrations: {}\n  Permissions granted: {} (reused {})\n  Skipped (already complete): {}\n  Deployment: {} -> stage {}",
                r.source_container_id,
                r.destination_container_id,
                if r.container_created { " (created)" } else { "" },
                r.nodes_created.len(),
                r.nodes_reused,
                r.methods_created,
                r.integrations_put,
                r.permissions_granted,
                r.permissions_reused,
                r.pairs_skipped,
                r.deployment.id,
                r.deployment.stage,
            ),
        }
    }
}
