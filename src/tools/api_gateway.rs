//! API Gateway Tool
//!
//! REST API, resource, method and deployment calls against API Gateway.
//! A client is built per call from the context's SDK configuration, so the
//! caller decides which account every request lands in.

use async_trait::async_trait;
use aws_sdk_apigateway::error::DisplayErrorContext;
use aws_sdk_apigateway::types::{EndpointConfiguration, EndpointType, IntegrationType};
use aws_sdk_apigateway::Client;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::agents::config::BACKEND_INVOCATION_VERB;
use crate::agents::error::{ReplicationError, Result};
use crate::agents::identity::CredentialContext;
use crate::agents::route_sync::{
    Deployment, HttpVerb, MethodBinding, MethodState, ResourceNode, RoutingContainer,
    RoutingService,
};

/// Largest page API Gateway serves
const PAGE_LIMIT: i32 = 500;

#[derive(Debug, Default, Clone)]
pub struct ApiGatewayTool;

impl ApiGatewayTool {
    pub fn new() -> Self {
        Self
    }

    fn client(ctx: &CredentialContext) -> Client {
        Client::new(ctx.sdk_config())
    }
}

#[async_trait]
impl RoutingService for ApiGatewayTool {
    async fn find_containers(
        &self,
        ctx: &CredentialContext,
        name: &str,
    ) -> Result<Vec<RoutingContainer>> {
        let client = Self::client(ctx);
        let mut found = Vec::new();
        let mut position: Option<String> = None;

        loop {
            let page = client
                .get_rest_apis()
                .limit(PAGE_LIMIT)
                .set_position(position.take())
                .send()
                .await
                .map_err(|e| ReplicationError::remote("GetRestApis", DisplayErrorContext(&e).to_string()))?;

            for api in page.items() {
                if api.name() != Some(name) {
                    continue;
                }
                let Some(id) = api.id() else {
                    warn!(name = %name, "REST API without id skipped");
                    continue;
                };
                found.push(RoutingContainer {
                    id: id.to_string(),
                    name: name.to_string(),
                    description: api.description().map(str::to_string),
                    scope: ctx.scope(),
                    region: ctx.region().to_string(),
                });
            }

            match page.position() {
                Some(next) if !next.is_empty() => position = Some(next.to_string()),
                _ => break,
            }
        }

        debug!(scope = %ctx.scope(), name = %name, count = found.len(), "Listed REST APIs");
        Ok(found)
    }

    async fn create_container(
        &self,
        ctx: &CredentialContext,
        name: &str,
        description: Option<&str>,
    ) -> Result<RoutingContainer> {
        let output = Self::client(ctx)
            .create_rest_api()
            .name(name)
            .set_description(description.map(str::to_string))
            .endpoint_configuration(
                EndpointConfiguration::builder()
                    .types(EndpointType::Regional)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| ReplicationError::remote("CreateRestApi", DisplayErrorContext(&e).to_string()))?;

        let id = output
            .id()
            .ok_or_else(|| ReplicationError::remote("CreateRestApi", "response carried no id"))?;

        Ok(RoutingContainer {
            id: id.to_string(),
            name: name.to_string(),
            description: output.description().map(str::to_string),
            scope: ctx.scope(),
            region: ctx.region().to_string(),
        })
    }

    async fn list_nodes(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
    ) -> Result<Vec<ResourceNode>> {
        let client = Self::client(ctx);
        let mut nodes = Vec::new();
        let mut position: Option<String> = None;

        loop {
            let page = client
                .get_resources()
                .rest_api_id(container_id)
                .embed("methods")
                .limit(PAGE_LIMIT)
                .set_position(position.take())
                .send()
                .await
                .map_err(|e| {
                    let not_found = e
                        .as_service_error()
                        .map(|se| se.is_not_found_exception())
                        .unwrap_or(false);
                    if not_found {
                        ReplicationError::lookup("REST API", container_id)
                    } else {
                        ReplicationError::remote("GetResources", DisplayErrorContext(&e).to_string())
                    }
                })?;

            for resource in page.items() {
                let (Some(id), Some(path)) = (resource.id(), resource.path()) else {
                    return Err(ReplicationError::MalformedTree(format!(
                        "resource without id or path in {}",
                        container_id
                    )));
                };

                let mut methods = BTreeMap::new();
                if let Some(bound) = resource.resource_methods() {
                    for (verb, method) in bound {
                        let verb: HttpVerb = verb.parse()?;
                        let integration_uri = method
                            .method_integration()
                            .and_then(|i| i.uri())
                            .map(str::to_string);
                        methods.insert(verb, MethodState { integration_uri });
                    }
                }

                nodes.push(ResourceNode {
                    id: id.to_string(),
                    parent_id: resource.parent_id().map(str::to_string),
                    path_part: resource.path_part().map(str::to_string),
                    path: path.to_string(),
                    methods,
                });
            }

            match page.position() {
                Some(next) if !next.is_empty() => position = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(nodes)
    }

    async fn create_node(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
        parent_id: &str,
        path_part: &str,
    ) -> Result<ResourceNode> {
        let output = Self::client(ctx)
            .create_resource()
            .rest_api_id(container_id)
            .parent_id(parent_id)
            .path_part(path_part)
            .send()
            .await
            .map_err(|e| ReplicationError::remote("CreateResource", DisplayErrorContext(&e).to_string()))?;

        let (Some(id), Some(path)) = (output.id(), output.path()) else {
            return Err(ReplicationError::remote(
                "CreateResource",
                format!("response for {} carried no id or path", path_part),
            ));
        };

        Ok(ResourceNode {
            id: id.to_string(),
            parent_id: Some(parent_id.to_string()),
            path_part: Some(path_part.to_string()),
            path: path.to_string(),
            methods: BTreeMap::new(),
        })
    }

    async fn put_method(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
        binding: &MethodBinding,
    ) -> Result<()> {
        Self::client(ctx)
            .put_method()
            .rest_api_id(container_id)
            .resource_id(&binding.resource_id)
            .http_method(binding.verb.as_str())
            .authorization_type(&binding.authorization)
            .send()
            .await
            .map_err(|e| ReplicationError::remote("PutMethod", DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn put_integration(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
        binding: &MethodBinding,
    ) -> Result<()> {
        Self::client(ctx)
            .put_integration()
            .rest_api_id(container_id)
            .resource_id(&binding.resource_id)
            .http_method(binding.verb.as_str())
            .r#type(IntegrationType::AwsProxy)
            .integration_http_method(BACKEND_INVOCATION_VERB)
            .uri(&binding.integration_uri)
            .send()
            .await
            .map_err(|e| ReplicationError::remote("PutIntegration", DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn create_deployment(
        &self,
        ctx: &CredentialContext,
        container_id: &str,
        stage: &str,
    ) -> Result<Deployment> {
        let output = Self::client(ctx)
            .create_deployment()
            .rest_api_id(container_id)
            .stage_name(stage)
            .send()
            .await
            .map_err(|e| ReplicationError::remote("CreateDeployment", DisplayErrorContext(&e).to_string()))?;

        let id = output
            .id()
            .ok_or_else(|| ReplicationError::remote("CreateDeployment", "response carried no id"))?;

        let created_at = output
            .created_date()
            .and_then(|d| DateTime::<Utc>::from_timestamp(d.secs(), d.subsec_nanos()))
            .unwrap_or_else(Utc::now);

        Ok(Deployment {
            id: id.to_string(),
            container_id: container_id.to_string(),
            stage: stage.to_string(),
            created_at,
        })
    }
}
