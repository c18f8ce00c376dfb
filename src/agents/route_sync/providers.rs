//! Remote Collaborator Traits
//!
//! Narrow interfaces onto the routing container service and the function
//! permission registry. Every call takes the credential context it runs under.

use async_trait::async_trait;

use super::types::{
    Deployment, GrantOutcome, InvocationPermission, MethodBinding, ResourceNode,
    RoutingContainer,
};
use crate::agents::error::Result;
use crate::agents::identity::CredentialContext;

/// Routing container service (REST APIs, resources, methods, deployments)
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Containers whose name equals `name`
    async fn find_containers(
        &self,
        ctx: &CredentialContext,
        name: &str,
    ) -> Result<Vec<RoutingContainer>>;

    async fn create_container(
        &self,
        ctx: &CredentialContext,
        name: &str,
        description: Option<&str>,
    ) -> Result<RoutingContainer>;

    /// Every node of the container with its bound verbs.
    /// Fails with a lookup error if the container does not resolve.
    async fn list_nodes(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
    ) -> Result<Vec<ResourceNode>>;

    async fn create_node(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
        parent_id: &str,
        path_part: &str,
    ) -> Result<ResourceNode>;

    async fn put_method(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
        binding: &MethodBinding,
    ) -> Result<()>;

    /// Attach (or overwrite) the proxy integration of a method
    async fn put_integration(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
        binding: &MethodBinding,
    ) -> Result<()>;

    async fn create_deployment(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
        stage: &str,
    ) -> Result<Deployment>;
}

/// Function permission registry
#[async_trait]
pub trait PermissionRegistry: Send + Sync {
    /// Attach a statement; conflict replies surface as `GrantOutcome::Conflict`
    async fn add_permission(
        &self,
        ctx: &CredentialContext,
        grant: &InvocationPermission,
    ) -> Result<GrantOutcome>;
}
