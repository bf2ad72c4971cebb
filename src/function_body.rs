//! The `supabase_function_body` data source.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::client::ManagementClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Data source type name.
pub const FUNCTION_BODY_DATA_SOURCE: &str = "supabase_function_body";

/// State of a `supabase_function_body` data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionBodyModel {
    /// Project reference ID.
    pub project_ref: String,
    /// Function slug.
    pub slug: String,
    /// Deployed source body.
    #[serde(default)]
    pub body: Option<String>,
}

/// Schema of the `supabase_function_body` data source.
pub fn function_body_schema() -> Schema {
    Schema::v0()
        .with_description("Fetches the source body of a deployed Edge Function")
        .with_attribute(
            "project_ref",
            Attribute::required_string().with_description("Project reference ID"),
        )
        .with_attribute(
            "slug",
            Attribute::required_string().with_description("Function slug"),
        )
        .with_attribute(
            "body",
            Attribute::computed_string().with_description("Function source body"),
        )
}

/// Read the body of the function named in `config`.
#[instrument(skip_all, name = "function_body.read")]
pub async fn read_function_body(
    client: &ManagementClient,
    config: Value,
) -> Result<Value, ProviderError> {
    let mut model: FunctionBodyModel = serde_json::from_value(config)?;

    let bytes = client
        .get_function_body(&model.project_ref, &model.slug)
        .await?;
    debug!(slug = %model.slug, bytes = bytes.len(), "read function body");

    model.body = Some(String::from_utf8_lossy(&bytes).into_owned());
    Ok(serde_json::to_value(model)?)
}
