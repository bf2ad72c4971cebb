//! The Supabase provider: configuration and dispatch to resource handlers.
//!
//! The provider block accepts an `endpoint` and an `access_token`. Both fall
//! back to environment variables, and the endpoint finally falls back to the
//! public Management API. Every resource and data source call after
//! `configure` shares one [`ManagementClient`].

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::client::{ManagementClient, DEFAULT_ENDPOINT};
use crate::error::ProviderError;
use crate::function_body::{function_body_schema, read_function_body, FUNCTION_BODY_DATA_SOURCE};
use crate::function_resource::{function_schema, FunctionResource, FUNCTION_RESOURCE};
use crate::plan::plan_resource;
use crate::schema::{has_errors, Attribute, Diagnostic, ProviderSchema, Schema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation::validate;

/// Environment variable holding the Management API access token.
pub const ACCESS_TOKEN_ENV: &str = "SUPABASE_ACCESS_TOKEN";

/// Environment variable overriding the Management API endpoint.
pub const ENDPOINT_ENV: &str = "SUPABASE_API_ENDPOINT";

/// Looks up an environment variable.
pub type EnvLookup = fn(&str) -> Option<String>;

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// The provider block as written by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    /// Management API endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Management API access token.
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Provider configuration after environment fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Management API endpoint.
    pub endpoint: String,
    /// Management API access token.
    pub access_token: String,
}

impl ProviderConfig {
    /// Parse the provider block. A null block is an empty configuration.
    pub fn from_value(config: Value) -> Result<Self, ProviderError> {
        if config.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(config)?)
    }

    /// Fill unset fields from the environment.
    ///
    /// Empty strings count as unset. A missing access token is reported as
    /// an error diagnostic on `access_token`.
    pub fn resolve(self, env: EnvLookup) -> Result<ResolvedConfig, Vec<Diagnostic>> {
        let endpoint = non_empty(self.endpoint)
            .or_else(|| non_empty(env(ENDPOINT_ENV)))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let Some(access_token) = non_empty(self.access_token).or_else(|| non_empty(env(ACCESS_TOKEN_ENV)))
        else {
            return Err(vec![Diagnostic::error("Missing Supabase API Access Token")
                .with_detail(format!(
                    "The provider cannot create the Supabase Management API client because \
                     no access token was configured. Set the access_token attribute or the \
                     {} environment variable.",
                    ACCESS_TOKEN_ENV
                ))
                .with_attribute("access_token")]);
        };

        Ok(ResolvedConfig {
            endpoint,
            access_token,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Schema of the provider block.
pub fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_description("Supabase Management API connection")
        .with_attribute(
            "endpoint",
            Attribute::optional_string().with_description(format!(
                "Management API endpoint. Falls back to {} and then {}.",
                ENDPOINT_ENV, DEFAULT_ENDPOINT
            )),
        )
        .with_attribute(
            "access_token",
            Attribute::optional_string()
                .sensitive()
                .with_description(format!(
                    "Management API access token. Falls back to {}.",
                    ACCESS_TOKEN_ENV
                )),
        )
}

/// Provider for Supabase Edge Functions.
pub struct SupabaseProvider {
    client: RwLock<Option<ManagementClient>>,
    env: EnvLookup,
}

impl Default for SupabaseProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SupabaseProvider {
    /// Create an unconfigured provider reading fallbacks from the process environment.
    pub fn new() -> Self {
        Self::with_env(process_env)
    }

    /// Create an unconfigured provider with a custom environment lookup.
    pub fn with_env(env: EnvLookup) -> Self {
        Self {
            client: RwLock::new(None),
            env,
        }
    }

    async fn client(&self) -> Result<ManagementClient, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "provider has not been configured; call Configure first".to_string(),
            )
        })
    }

    fn resource_schema(&self, resource_type: &str) -> Result<Schema, ProviderError> {
        match resource_type {
            FUNCTION_RESOURCE => Ok(function_schema()),
            other => Err(unknown_resource(other)),
        }
    }

    fn data_source_schema(&self, data_source_type: &str) -> Result<Schema, ProviderError> {
        match data_source_type {
            FUNCTION_BODY_DATA_SOURCE => Ok(function_body_schema()),
            other => Err(ProviderError::UnknownResource(format!(
                "unknown data source type: {}",
                other
            ))),
        }
    }
}

fn unknown_resource(resource_type: &str) -> ProviderError {
    ProviderError::UnknownResource(format!("unknown resource type: {}", resource_type))
}

fn endpoint_diagnostic(err: ProviderError) -> Diagnostic {
    Diagnostic::error("Invalid Supabase API Endpoint")
        .with_detail(err.message())
        .with_attribute("endpoint")
}

#[async_trait::async_trait]
impl ProviderService for SupabaseProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(provider_config_schema())
            .with_resource(FUNCTION_RESOURCE, function_schema())
            .with_data_source(FUNCTION_BODY_DATA_SOURCE, function_body_schema())
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: vec![FUNCTION_RESOURCE.to_string()],
            data_sources: vec![FUNCTION_BODY_DATA_SOURCE.to_string()],
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&provider_config_schema(), &config);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let parsed = ProviderConfig::from_value(config)?;
        if let Some(endpoint) = non_empty(parsed.endpoint) {
            if let Err(err) = ManagementClient::new(&endpoint, String::new()) {
                diagnostics.push(endpoint_diagnostic(err));
            }
        }
        Ok(diagnostics)
    }

    #[instrument(skip_all, name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validate(&provider_config_schema(), &config);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let resolved = match ProviderConfig::from_value(config)?.resolve(self.env) {
            Ok(resolved) => resolved,
            Err(diagnostics) => return Ok(diagnostics),
        };

        let client = match ManagementClient::new(&resolved.endpoint, resolved.access_token) {
            Ok(client) => client,
            Err(err) => return Ok(vec![endpoint_diagnostic(err)]),
        };

        info!(endpoint = %client.endpoint(), "configured Supabase client");
        *self.client.write().await = Some(client);
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        debug!("releasing Supabase client");
        self.client.write().await.take();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.resource_schema(resource_type)?;
        Ok(validate(&schema, &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.resource_schema(resource_type)?;
        Ok(plan_resource(&schema, prior_state.as_ref(), &proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.resource_schema(resource_type)?;
        let client = self.client().await?;
        FunctionResource::new(&client).create(planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.resource_schema(resource_type)?;
        let client = self.client().await?;
        FunctionResource::new(&client).read(current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.resource_schema(resource_type)?;
        let client = self.client().await?;
        FunctionResource::new(&client)
            .update(prior_state, planned_state)
            .await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.resource_schema(resource_type)?;
        let client = self.client().await?;
        FunctionResource::new(&client).delete(current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.resource_schema(resource_type)?;
        let client = self.client().await?;
        FunctionResource::new(&client).import(id).await
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.data_source_schema(data_source_type)?;
        Ok(validate(&schema, &config))
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        self.data_source_schema(data_source_type)?;
        let client = self.client().await?;
        read_function_body(&client, config).await
    }
}
