//! Static resource bindings from a TOML file
//!
//! ```toml
//! [resources.uploads]
//! type = "pulumi_aws.s3.bucket.Bucket"
//! attributes = { bucket = "uploads-1a2b" }
//! ```

use crate::codegen::{AttrValue, Bindings, ResourceHandle};
use crate::error::{DeplumiError, DeplumiResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BindingsFile {
    #[serde(default)]
    resources: BTreeMap<String, StaticResource>,
}

/// A resource whose attributes are already known
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticResource {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

#[async_trait]
impl ResourceHandle for StaticResource {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    async fn attribute(&self, name: &str) -> DeplumiResult<AttrValue> {
        self.attributes
            .get(name)
            .cloned()
            .ok_or_else(|| DeplumiError::AttributeUnavailable {
                name: self.type_name.clone(),
                attribute: name.to_string(),
                reason: "not set in bindings file".to_string(),
            })
    }
}

/// Parse bindings from TOML text
pub fn parse(path: &Path, content: &str) -> DeplumiResult<Bindings> {
    let file: BindingsFile = toml::from_str(content).map_err(|e| DeplumiError::BindingsInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(file
        .resources
        .into_iter()
        .map(|(name, resource)| (name, Arc::new(resource) as Arc<dyn ResourceHandle>))
        .collect())
}

/// Load bindings from a TOML file
pub async fn load(path: &Path) -> DeplumiResult<Bindings> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DeplumiError::PathNotFound(path.to_path_buf())
        } else {
            DeplumiError::io(format!("reading bindings {}", path.display()), e)
        }
    })?;

    let bindings = parse(path, &content)?;
    debug!("Loaded {} binding(s) from {}", bindings.len(), path.display());
    Ok(bindings)
}
