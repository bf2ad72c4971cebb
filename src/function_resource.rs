//! The `supabase_function` resource.
//!
//! Create and update both go through the deploy endpoint, which bundles the
//! uploaded sources server-side. Read reconciles state with the API and
//! drops the resource when the function is gone. Delete tolerates a
//! function that was already removed.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::bundle::{build_deploy_form, FunctionDeployMetadata};
use crate::client::{DeployFunctionResponse, FunctionSlugResponse, ManagementClient};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema, StringValidator};
use crate::types::ImportedResource;

/// Resource type name.
pub const FUNCTION_RESOURCE: &str = "supabase_function";

const SLUG_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9_-]*$";

/// State of a `supabase_function` resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionResourceModel {
    /// Project reference ID.
    pub project_ref: String,
    /// Function slug.
    pub slug: String,
    /// Entrypoint relative to `source_dir`.
    #[serde(default)]
    pub entrypoint_path: Option<String>,
    /// Local directory holding the function sources.
    #[serde(default)]
    pub source_dir: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Whether invocations require a valid JWT.
    #[serde(default)]
    pub verify_jwt: Option<bool>,
    /// Import map relative to `source_dir`.
    #[serde(default)]
    pub import_map_path: Option<String>,
    /// Function UUID.
    #[serde(default)]
    pub id: Option<String>,
    /// Deployment status.
    #[serde(default)]
    pub status: Option<String>,
    /// Deployment version.
    #[serde(default)]
    pub version: Option<i64>,
    /// Creation time (unix seconds).
    #[serde(default)]
    pub created_at: Option<i64>,
    /// Last update time (unix seconds).
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl FunctionResourceModel {
    fn from_state(state: Value) -> Result<Self, ProviderError> {
        Ok(serde_json::from_value(state)?)
    }

    fn into_state(self) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(self)?)
    }

    fn deploy_metadata(&self) -> Result<FunctionDeployMetadata, ProviderError> {
        let entrypoint_path = self.entrypoint_path.as_deref().ok_or_else(|| {
            ProviderError::Validation("entrypoint_path must be set to deploy".to_string())
        })?;

        Ok(FunctionDeployMetadata::new(entrypoint_path)
            .with_name(self.name.clone())
            .with_verify_jwt(self.verify_jwt)
            .with_import_map_path(self.import_map_path.as_deref()))
    }

    fn apply_deploy(&mut self, result: DeployFunctionResponse) {
        self.id = Some(result.id);
        self.slug = result.slug;
        self.name = Some(result.name);
        self.status = Some(result.status.to_string());
        self.version = Some(result.version);

        if result.created_at.is_some() {
            self.created_at = result.created_at;
        }
        if result.updated_at.is_some() {
            self.updated_at = result.updated_at;
        }
        if result.verify_jwt.is_some() {
            self.verify_jwt = result.verify_jwt;
        }
    }

    fn apply_read(&mut self, result: FunctionSlugResponse) {
        self.id = Some(result.id);
        self.slug = result.slug;
        self.name = Some(result.name);
        self.status = Some(result.status.to_string());
        self.version = Some(result.version);
        self.created_at = Some(result.created_at);
        self.updated_at = Some(result.updated_at);

        if result.verify_jwt.is_some() {
            self.verify_jwt = result.verify_jwt;
        }
    }
}

/// Schema of the `supabase_function` resource.
pub fn function_schema() -> Schema {
    Schema::v0()
        .with_description("Edge Function resource")
        .with_attribute(
            "project_ref",
            Attribute::required_string()
                .with_description("Project reference ID")
                .with_force_new(),
        )
        .with_attribute(
            "slug",
            Attribute::required_string()
                .with_description(
                    "Function slug (must start with a letter and contain only letters, \
                     numbers, underscores, and hyphens)",
                )
                .with_force_new()
                .with_validator(StringValidator::pattern(
                    SLUG_PATTERN,
                    "must start with a letter and contain only letters, numbers, \
                     underscores, and hyphens",
                )),
        )
        .with_attribute(
            "entrypoint_path",
            Attribute::required_string().with_description(
                "Path to the entrypoint file relative to source_dir (e.g., index.ts)",
            ),
        )
        .with_attribute(
            "source_dir",
            Attribute::required_string()
                .with_description("Directory containing function source files"),
        )
        .with_attribute(
            "name",
            Attribute::optional_string()
                .computed()
                .with_description("Function name (defaults to slug if not specified)")
                .with_use_state_for_unknown(),
        )
        .with_attribute(
            "verify_jwt",
            Attribute::optional_bool()
                .computed()
                .with_description("Whether to verify JWT tokens (default: true)")
                .with_default(json!(true)),
        )
        .with_attribute(
            "import_map_path",
            Attribute::optional_string()
                .with_description("Path to the import map file relative to source_dir"),
        )
        .with_attribute(
            "id",
            Attribute::computed_string()
                .with_description("Function identifier (UUID)")
                .with_use_state_for_unknown(),
        )
        .with_attribute(
            "status",
            Attribute::computed_string()
                .with_description("Function status (ACTIVE, REMOVED, THROTTLED)"),
        )
        .with_attribute(
            "version",
            Attribute::computed_int64().with_description("Function deployment version"),
        )
        .with_attribute(
            "created_at",
            Attribute::computed_int64()
                .with_description("Unix timestamp when function was created")
                .with_use_state_for_unknown(),
        )
        .with_attribute(
            "updated_at",
            Attribute::computed_int64()
                .with_description("Unix timestamp when function was last updated"),
        )
}

/// CRUD handler for `supabase_function`, bound to a configured client.
pub struct FunctionResource<'a> {
    client: &'a ManagementClient,
}

impl<'a> FunctionResource<'a> {
    /// Bind the resource to a client.
    pub fn new(client: &'a ManagementClient) -> Self {
        Self { client }
    }

    /// Deploy a new function from the planned state.
    #[instrument(skip_all, name = "function.create")]
    pub async fn create(&self, planned_state: Value) -> Result<Value, ProviderError> {
        let mut model = FunctionResourceModel::from_state(planned_state)?;
        self.deploy(&mut model).await?;
        info!(slug = %model.slug, version = ?model.version, "created edge function");
        model.into_state()
    }

    /// Refresh state from the API. Returns null when the function no longer exists.
    #[instrument(skip_all, name = "function.read")]
    pub async fn read(&self, current_state: Value) -> Result<Value, ProviderError> {
        let mut model = FunctionResourceModel::from_state(current_state)?;

        match self
            .client
            .get_function(&model.project_ref, &model.slug)
            .await?
        {
            Some(result) => {
                model.apply_read(result);
                debug!(slug = %model.slug, "read edge function");
                model.into_state()
            },
            None => {
                warn!(
                    project_ref = %model.project_ref,
                    slug = %model.slug,
                    "edge function not found, removing from state"
                );
                Ok(Value::Null)
            },
        }
    }

    /// Redeploy the function with the planned state.
    #[instrument(skip_all, name = "function.update")]
    pub async fn update(&self, prior_state: Value, planned_state: Value) -> Result<Value, ProviderError> {
        let prior = FunctionResourceModel::from_state(prior_state)?;
        let mut model = FunctionResourceModel::from_state(planned_state)?;
        if model.id.is_none() {
            model.id = prior.id;
        }
        self.deploy(&mut model).await?;
        info!(slug = %model.slug, version = ?model.version, "updated edge function");
        model.into_state()
    }

    /// Delete the function. A function that is already gone is not an error.
    #[instrument(skip_all, name = "function.delete")]
    pub async fn delete(&self, current_state: Value) -> Result<(), ProviderError> {
        let model = FunctionResourceModel::from_state(current_state)?;
        let existed = self
            .client
            .delete_function(&model.project_ref, &model.slug)
            .await?;
        if existed {
            info!(slug = %model.slug, "deleted edge function");
        } else {
            debug!(slug = %model.slug, "edge function already deleted");
        }
        Ok(())
    }

    /// Import an existing function by `<project_ref>/<slug>`.
    #[instrument(skip(self), name = "function.import")]
    pub async fn import(&self, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        let (project_ref, slug) = parse_import_id(id)?;

        let result = self
            .client
            .get_function(project_ref, slug)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "function {:?} not found in project {:?}",
                    slug, project_ref
                ))
            })?;

        let mut model = FunctionResourceModel {
            project_ref: project_ref.to_string(),
            ..Default::default()
        };
        model.apply_read(result);
        Ok(vec![ImportedResource::new(
            FUNCTION_RESOURCE,
            model.into_state()?,
        )])
    }

    async fn deploy(&self, model: &mut FunctionResourceModel) -> Result<(), ProviderError> {
        let metadata = model.deploy_metadata()?;
        let source_dir = model.source_dir.as_deref().ok_or_else(|| {
            ProviderError::Validation("source_dir must be set to deploy".to_string())
        })?;

        let form = build_deploy_form(&metadata, Path::new(source_dir)).await?;
        let result = self
            .client
            .deploy_function(&model.project_ref, &model.slug, form)
            .await?;
        model.apply_deploy(result);
        Ok(())
    }
}

fn parse_import_id(id: &str) -> Result<(&str, &str), ProviderError> {
    match id.split_once('/') {
        Some((project_ref, slug))
            if !project_ref.is_empty() && !slug.is_empty() && !slug.contains('/') =>
        {
            Ok((project_ref, slug))
        },
        _ => Err(ProviderError::InvalidRequest(format!(
            "expected import id in the form <project_ref>/<slug>, got {:?}",
            id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FunctionStatus;
    use crate::validation::validate;

    fn config() -> Value {
        json!({
            "project_ref": "mayuaycdtijbctgqbycg",
            "slug": "hello-world",
            "entrypoint_path": "index.ts",
            "source_dir": "/tmp/functions/hello-world"
        })
    }

    #[test]
    fn test_schema_validates_slug() {
        let schema = function_schema();
        assert!(validate(&schema, &config()).is_empty());

        let mut bad = config();
        bad["slug"] = json!("1-hello");
        let diagnostics = validate(&schema, &bad);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("slug"));

        let mut bad = config();
        bad["slug"] = json!("hello world");
        assert_eq!(validate(&schema, &bad).len(), 1);
    }

    #[test]
    fn test_schema_flags() {
        let schema = function_schema();
        assert!(schema.attribute("project_ref").unwrap().force_new);
        assert!(schema.attribute("slug").unwrap().force_new);
        assert!(!schema.attribute("entrypoint_path").unwrap().force_new);
        assert_eq!(
            schema.attribute("verify_jwt").unwrap().default,
            Some(json!(true))
        );
        assert!(schema.attribute("id").unwrap().flags.is_computed_only());
        assert!(schema.attribute("created_at").unwrap().use_state_for_unknown);
        assert!(!schema.attribute("updated_at").unwrap().use_state_for_unknown);
    }

    #[test]
    fn test_model_round_trips_nulls() {
        let model = FunctionResourceModel::from_state(config()).unwrap();
        assert_eq!(model.entrypoint_path.as_deref(), Some("index.ts"));
        assert!(model.id.is_none());

        let state = model.into_state().unwrap();
        assert_eq!(state["id"], Value::Null);
        assert_eq!(state["slug"], "hello-world");
    }

    #[test]
    fn test_deploy_metadata_only_sets_present_fields() {
        let model = FunctionResourceModel::from_state(config()).unwrap();
        let metadata = model.deploy_metadata().unwrap();
        assert_eq!(metadata, FunctionDeployMetadata::new("index.ts"));

        let model = FunctionResourceModel {
            entrypoint_path: None,
            ..model
        };
        assert!(matches!(
            model.deploy_metadata(),
            Err(ProviderError::Validation(_))
        ));
    }

    #[test]
    fn test_apply_deploy_keeps_missing_timestamps() {
        let mut model = FunctionResourceModel {
            created_at: Some(100),
            updated_at: Some(100),
            verify_jwt: Some(false),
            ..Default::default()
        };
        model.apply_deploy(DeployFunctionResponse {
            id: "func-uuid-1234".to_string(),
            slug: "hello-world".to_string(),
            name: "hello-world".to_string(),
            status: FunctionStatus::Active,
            version: 2,
            created_at: None,
            updated_at: Some(200),
            verify_jwt: None,
        });

        assert_eq!(model.id.as_deref(), Some("func-uuid-1234"));
        assert_eq!(model.status.as_deref(), Some("ACTIVE"));
        assert_eq!(model.created_at, Some(100));
        assert_eq!(model.updated_at, Some(200));
        assert_eq!(model.verify_jwt, Some(false));
    }

    #[test]
    fn test_parse_import_id() {
        assert_eq!(
            parse_import_id("abc/hello-world").unwrap(),
            ("abc", "hello-world")
        );
        assert!(parse_import_id("abc").is_err());
        assert!(parse_import_id("/hello").is_err());
        assert!(parse_import_id("abc/").is_err());
        assert!(parse_import_id("abc/hello/world").is_err());
    }
}
