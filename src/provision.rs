//! Provisioning interface
//!
//! Infrastructure is declared through the `Provisioner` trait; deplumi never
//! talks to a cloud API itself. Implementations map these declarations onto
//! whatever engine manages the stack.

use crate::error::DeplumiResult;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

/// A bucket to hold built archives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSpec {
    pub name: String,
    pub region: String,
    pub versioned: bool,
}

impl BucketSpec {
    /// The shared archive bucket for a region
    pub fn artifact_bucket(region: &str) -> Self {
        Self {
            name: format!("lambda-bucket-{}", region),
            region: region.to_string(),
            versioned: true,
        }
    }
}

/// A declared bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketHandle {
    pub name: String,
    pub region: String,
}

/// An object uploaded from a local file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectSpec {
    pub name: String,
    pub bucket: BucketHandle,
    pub source: PathBuf,
    /// Hex SHA-256 of `source`, for skipping unchanged uploads
    pub sha256: String,
}

/// A declared object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectHandle {
    pub bucket: String,
    pub key: String,
    pub version: Option<String>,
}

/// Requested access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    /// Read and write data, but not manage the resource
    ReadWrite,
}

/// One resource a permission request covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    /// Logical name from the bindings
    pub name: String,
    pub type_name: String,
    pub access: Access,
}

/// A role granting a package access to its bound resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionRequest {
    pub name: String,
    pub grants: Vec<Grant>,
}

/// A declared role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleHandle {
    pub name: String,
}

/// Declares infrastructure on behalf of a package
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn declare_bucket(&self, spec: &BucketSpec) -> DeplumiResult<BucketHandle>;

    async fn declare_object(&self, spec: &ObjectSpec) -> DeplumiResult<ObjectHandle>;

    async fn declare_permission(&self, request: &PermissionRequest) -> DeplumiResult<RoleHandle>;
}
