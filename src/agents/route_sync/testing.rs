//! In-memory collaborators for routing replication tests.
//!
//! State is partitioned by the account of the credential context each call
//! carries, so tests can assert which scope performed which call.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use super::providers::{PermissionRegistry, RoutingService};
use super::types::{
    Deployment, GrantOutcome, HttpVerb, InvocationPermission, MethodBinding, MethodState,
    ResourceNode, RoutingContainer,
};
use crate::agents::error::{ReplicationError, Result};
use crate::agents::identity::{AccountScope, CredentialContext};

pub fn source_ctx() -> CredentialContext {
    CredentialContext::unauthenticated(AccountScope::Source, "111122223333", "us-east-1")
}

pub fn destination_ctx() -> CredentialContext {
    CredentialContext::unauthenticated(AccountScope::Destination, "444455556666", "eu-west-1")
}

const MUTATIONS: &[&str] = &[
    "CreateRestApi",
    "CreateResource",
    "PutMethod",
    "PutIntegration",
    "CreateDeployment",
];

#[derive(Debug, Clone)]
pub struct Call {
    pub account: String,
    pub operation: &'static str,
    /// Destination resource id for method/integration calls
    pub resource_id: Option<String>,
}

struct Api {
    account: String,
    container: RoutingContainer,
    nodes: Vec<ResourceNode>,
    /// (parent id, node id) for every node created through the trait
    created: Vec<(String, String)>,
    deployments: Vec<Deployment>,
}

#[derive(Default)]
struct State {
    apis: Vec<Api>,
    calls: Vec<Call>,
    backend_verbs: Vec<String>,
    next_id: u64,
    fail_create_node_on: Option<String>,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    fn record(&mut self, ctx: &CredentialContext, operation: &'static str, resource_id: Option<&str>) {
        self.calls.push(Call {
            account: ctx.account_id().to_string(),
            operation,
            resource_id: resource_id.map(str::to_string),
        });
    }

    fn api_mut(&mut self, ctx: &CredentialContext, id: &str) -> Result<&mut Api> {
        self.apis
            .iter_mut()
            .find(|a| a.account == ctx.account_id() && a.container.id == id)
            .ok_or_else(|| ReplicationError::lookup("routing container", id))
    }

    fn api(&self, ctx: &CredentialContext, id: &str) -> Option<&Api> {
        self.apis
            .iter()
            .find(|a| a.account == ctx.account_id() && a.container.id == id)
    }
}

/// Account-scoped fake of the routing container service
#[derive(Default)]
pub struct InMemoryRoutingService {
    state: Mutex<State>,
}

impl InMemoryRoutingService {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_container(
        state: &mut State,
        ctx: &CredentialContext,
        name: &str,
        description: Option<&str>,
    ) -> RoutingContainer {
        let id = state.id("api");
        let root_id = state.id("root");
        let container = RoutingContainer {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            scope: ctx.scope(),
            region: ctx.region().to_string(),
        };
        state.apis.push(Api {
            account: ctx.account_id().to_string(),
            container: container.clone(),
            nodes: vec![ResourceNode {
                id: root_id,
                parent_id: None,
                path_part: None,
                path: "/".to_string(),
                methods: BTreeMap::new(),
            }],
            created: Vec::new(),
            deployments: Vec::new(),
        });
        container
    }

    fn insert_node(
        state: &mut State,
        ctx: &CredentialContext,
        container_id: &str,
        parent_id: &str,
        path_part: &str,
    ) -> Result<ResourceNode> {
        let id = state.id("res");
        let api = state.api_mut(ctx, container_id)?;
        let parent = api
            .nodes
            .iter()
            .find(|n| n.id == parent_id)
            .ok_or_else(|| ReplicationError::remote("CreateResource", format!("NotFoundException: Invalid Resource identifier specified: {}", parent_id)))?;
        if api
            .nodes
            .iter()
            .any(|n| n.parent_id.as_deref() == Some(parent_id) && n.path_part.as_deref() == Some(path_part))
        {
            return Err(ReplicationError::remote(
                "CreateResource",
                "ConflictException: Another resource with the same parent already has this name",
            ));
        }
        let path = if parent.is_root() {
            format!("/{}", path_part)
        } else {
            format!("{}/{}", parent.path, path_part)
        };
        let node = ResourceNode {
            id,
            parent_id: Some(parent_id.to_string()),
            path_part: Some(path_part.to_string()),
            path,
            methods: BTreeMap::new(),
        };
        api.nodes.push(node.clone());
        Ok(node)
    }

    /// Create a container with its root node, bypassing call recording
    pub fn seed_container(&self, ctx: &CredentialContext, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        Self::insert_container(&mut state, ctx, name, None).id
    }

    /// Create a node under `parent` ("/" for the root) with verbs bound but not integrated
    pub fn seed_node(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
        parent: &str,
        path_part: &str,
        verbs: &[HttpVerb],
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let parent_id = if parent == "/" {
            let api = state.api(ctx, container_id).unwrap();
            api.nodes.iter().find(|n| n.is_root()).unwrap().id.clone()
        } else {
            parent.to_string()
        };
        let node = Self::insert_node(&mut state, ctx, container_id, &parent_id, path_part).unwrap();
        let api = state.api_mut(ctx, container_id).unwrap();
        let stored = api.nodes.iter_mut().find(|n| n.id == node.id).unwrap();
        for verb in verbs {
            stored.methods.insert(*verb, MethodState::default());
        }
        node.id
    }

    pub fn fail_create_node_on(&self, path_part: &str) {
        self.state.lock().unwrap().fail_create_node_on = Some(path_part.to_string());
    }

    pub fn calls_in(&self, account: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.iter().filter(|c| c.account == account).count()
    }

    pub fn mutating_calls_in(&self, account: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .calls
            .iter()
            .filter(|c| c.account == account && MUTATIONS.contains(&c.operation))
            .count()
    }

    pub fn container_named(&self, ctx: &CredentialContext, name: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .apis
            .iter()
            .find(|a| a.account == ctx.account_id() && a.container.name == name)
            .map(|a| a.container.id.clone())
    }

    /// Sorted full paths of every node
    pub fn node_paths(&self, ctx: &CredentialContext, container_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut paths: Vec<String> = state
            .api(ctx, container_id)
            .map(|a| a.nodes.iter().map(|n| n.path.clone()).collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    /// (parent path, path segment) pairs, comparable across containers
    pub fn shape(&self, ctx: &CredentialContext, container_id: &str) -> BTreeSet<(String, String)> {
        let state = self.state.lock().unwrap();
        let Some(api) = state.api(ctx, container_id) else {
            return BTreeSet::new();
        };
        api.nodes
            .iter()
            .filter_map(|n| {
                let parent = api.nodes.iter().find(|p| Some(&p.id) == n.parent_id.as_ref())?;
                Some((parent.path.clone(), n.path_part.clone()?))
            })
            .collect()
    }

    /// Every node created through the trait had its parent in place beforehand
    pub fn creation_order_is_parent_first(&self, ctx: &CredentialContext, container_id: &str) -> bool {
        let state = self.state.lock().unwrap();
        let Some(api) = state.api(ctx, container_id) else {
            return false;
        };
        let created: HashSet<&str> = api.created.iter().map(|(_, id)| id.as_str()).collect();
        let mut present: HashSet<&str> = api
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !created.contains(id))
            .collect();
        for (parent, id) in &api.created {
            if !present.contains(parent.as_str()) {
                return false;
            }
            present.insert(id.as_str());
        }
        true
    }

    pub fn methods_on(&self, ctx: &CredentialContext, container_id: &str, node_id: &str) -> Vec<HttpVerb> {
        let state = self.state.lock().unwrap();
        state
            .api(ctx, container_id)
            .and_then(|a| a.nodes.iter().find(|n| n.id == node_id))
            .map(|n| n.methods.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn integration_uris(&self, ctx: &CredentialContext, container_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .api(ctx, container_id)
            .map(|a| {
                a.nodes
                    .iter()
                    .flat_map(|n| n.methods.values())
                    .filter_map(|m| m.integration_uri.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Backend verbs passed with every integration, in call order
    pub fn backend_verbs(&self) -> Vec<String> {
        self.state.lock().unwrap().backend_verbs.clone()
    }

    /// Method and integration calls that targeted the node at `path`
    pub fn method_calls_for_path(&self, ctx: &CredentialContext, container_id: &str, path: &str) -> usize {
        let state = self.state.lock().unwrap();
        let Some(node_id) = state
            .api(ctx, container_id)
            .and_then(|a| a.nodes.iter().find(|n| n.path == path))
            .map(|n| n.id.clone())
        else {
            return 0;
        };
        state
            .calls
            .iter()
            .filter(|c| c.account == ctx.account_id() && c.resource_id.as_deref() == Some(node_id.as_str()))
            .count()
    }

    pub fn deployments(&self, ctx: &CredentialContext, container_id: &str) -> Vec<Deployment> {
        let state = self.state.lock().unwrap();
        state
            .api(ctx, container_id)
            .map(|a| a.deployments.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoutingService for InMemoryRoutingService {
    async fn find_containers(&self, ctx: &CredentialContext, name: &str) -> Result<Vec<RoutingContainer>> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "GetRestApis", None);
        Ok(state
            .apis
            .iter()
            .filter(|a| a.account == ctx.account_id() && a.container.name == name)
            .map(|a| a.container.clone())
            .collect())
    }

    async fn create_container(
        &self,
        ctx: &CredentialContext,
        name: &str,
        description: Option<&str>,
    ) -> Result<RoutingContainer> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "CreateRestApi", None);
        Ok(Self::insert_container(&mut state, ctx, name, description))
    }

    async fn list_nodes(&self, ctx: &CredentialContext, container_id: &str) -> Result<Vec<ResourceNode>> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "GetResources", None);
        state
            .api(ctx, container_id)
            .map(|a| a.nodes.clone())
            .ok_or_else(|| ReplicationError::lookup("routing container", container_id))
    }

    async fn create_node(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
        parent_id: &str,
        path_part: &str,
    ) -> Result<ResourceNode> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "CreateResource", None);
        if state.fail_create_node_on.as_deref() == Some(path_part) {
            return Err(ReplicationError::remote(
                "CreateResource",
                "TooManyRequestsException: Too Many Requests",
            ));
        }
        let node = Self::insert_node(&mut state, ctx, container_id, parent_id, path_part)?;
        state
            .api_mut(ctx, container_id)?
            .created
            .push((parent_id.to_string(), node.id.clone()));
        Ok(node)
    }

    async fn put_method(&self, ctx: &CredentialContext, container_id: &str, binding: &MethodBinding) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "PutMethod", Some(binding.resource_id.as_str()));
        let api = state.api_mut(ctx, container_id)?;
        let node = api
            .nodes
            .iter_mut()
            .find(|n| n.id == binding.resource_id)
            .ok_or_else(|| ReplicationError::remote("PutMethod", "NotFoundException: Invalid Resource identifier specified"))?;
        if node.methods.contains_key(&binding.verb) {
            return Err(ReplicationError::remote("PutMethod", "ConflictException: Method already exists for this resource"));
        }
        node.methods.insert(binding.verb, MethodState::default());
        Ok(())
    }

    async fn put_integration(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
        binding: &MethodBinding,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "PutIntegration", Some(binding.resource_id.as_str()));
        state
            .backend_verbs
            .push(crate::agents::config::BACKEND_INVOCATION_VERB.to_string());
        let api = state.api_mut(ctx, container_id)?;
        let method = api
            .nodes
            .iter_mut()
            .find(|n| n.id == binding.resource_id)
            .and_then(|n| n.methods.get_mut(&binding.verb))
            .ok_or_else(|| ReplicationError::remote("PutIntegration", "NotFoundException: Invalid Method identifier specified"))?;
        method.integration_uri = Some(binding.integration_uri.clone());
        Ok(())
    }

    async fn create_deployment(&self, ctx: &CredentialContext, container_id: &str, stage: &str) -> Result<Deployment> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "CreateDeployment", None);
        let id = state.id("dep");
        let deployment = Deployment {
            id,
            container_id: container_id.to_string(),
            stage: stage.to_string(),
            created_at: chrono::Utc::now(),
        };
        state.api_mut(ctx, container_id)?.deployments.push(deployment.clone());
        Ok(deployment)
    }
}

#[derive(Default)]
struct Grants {
    recorded: Vec<(String, InvocationPermission)>,
    fail_after: Option<usize>,
    conflict_always: bool,
}

/// Permission registry fake; statement ids collide per (account, function)
#[derive(Default)]
pub struct RecordingPermissions {
    grants: Mutex<Grants>,
}

impl RecordingPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every grant once `n` have been recorded
    pub fn fail_after(&self, n: usize) {
        self.grants.lock().unwrap().fail_after = Some(n);
    }

    pub fn recover(&self) {
        self.grants.lock().unwrap().fail_after = None;
    }

    /// Answer every grant with a conflict, as a function mid-update does
    pub fn conflict_always(&self) {
        self.grants.lock().unwrap().conflict_always = true;
    }

    pub fn grants(&self) -> Vec<InvocationPermission> {
        let grants = self.grants.lock().unwrap();
        grants.recorded.iter().map(|(_, g)| g.clone()).collect()
    }

    pub fn grant_accounts(&self) -> Vec<String> {
        let grants = self.grants.lock().unwrap();
        grants.recorded.iter().map(|(a, _)| a.clone()).collect()
    }
}

#[async_trait]
impl PermissionRegistry for RecordingPermissions {
    async fn add_permission(&self, ctx: &CredentialContext, grant: &InvocationPermission) -> Result<GrantOutcome> {
        let mut grants = self.grants.lock().unwrap();
        if grants.fail_after.is_some_and(|n| grants.recorded.len() >= n) {
            return Err(ReplicationError::remote(
                "AddPermission",
                "PolicyLengthExceededException: The final policy size is bigger than the limit",
            ));
        }
        if grants.conflict_always {
            return Ok(GrantOutcome::Conflict(
                "ResourceConflictException: An update is in progress for resource".to_string(),
            ));
        }
        let exists = grants.recorded.iter().any(|(account, g)| {
            account == ctx.account_id()
                && g.function_name == grant.function_name
                && g.statement_id == grant.statement_id
        });
        if exists {
            return Ok(GrantOutcome::Conflict(
                "ResourceConflictException: The statement id provided already exists".to_string(),
            ));
        }
        grants
            .recorded
            .push((ctx.account_id().to_string(), grant.clone()));
        Ok(GrantOutcome::Granted)
    }
}
