//! Accessor module generation
//!
//! Turns a map of logical names to live resource handles into a small Python
//! module (`__res__.py`) embedded in the bundle. Inside the deployed function,
//! `__res__.<name>` lazily builds a boto3 client for that resource and caches
//! it for the life of the process.
//!
//! Generation happens in two phases:
//! 1. `AccessorModule::resolve` awaits every attribute of every handle
//!    concurrently (handles may still be waiting on provisioning).
//! 2. `AccessorModule::render` is a pure function of the resolved values.

pub mod python;
pub mod resources;

pub use resources::{AttrValue, ResourceKind};

use crate::error::{DeplumiError, DeplumiResult};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A live handle to an externally provisioned resource
#[async_trait]
pub trait ResourceHandle: fmt::Debug + Send + Sync {
    /// Fully-qualified type name, e.g. `pulumi_aws.s3.bucket.Bucket`
    fn type_name(&self) -> &str;

    /// Resolve one attribute; may wait until provisioning produces it
    async fn attribute(&self, name: &str) -> DeplumiResult<AttrValue>;
}

/// Logical name -> resource handle
pub type Bindings = BTreeMap<String, Arc<dyn ResourceHandle>>;

/// Everything needed to rebuild one resource's client at runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    /// Logical name the bundled code looks up
    pub name: String,
    pub kind: ResourceKind,
    /// Attribute values, in `kind.attributes()` order
    pub values: Vec<AttrValue>,
}

impl ResourceBinding {
    /// Python expression that constructs the client,
    /// e.g. `(lambda bucket: boto3.resource('s3').Bucket(bucket))('my-bucket')`
    pub fn client_expression(&self) -> String {
        let args = self
            .values
            .iter()
            .map(python::value_literal)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", python::constructor(self), args)
    }
}

/// Result of looking up a logical name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found(&'a ResourceBinding),
    NotFound(&'a str),
}

impl fmt::Display for Lookup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(binding) => write!(f, "{}", binding.client_expression()),
            Self::NotFound(name) => write!(f, "{} is not a defined resource", name),
        }
    }
}

/// Resolved accessor bindings, ready to render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessorModule {
    bindings: BTreeMap<String, ResourceBinding>,
}

impl AccessorModule {
    /// Resolve every handle's attributes.
    ///
    /// Resource kinds are checked before anything is awaited, so an unknown
    /// type fails fast instead of after a long provisioning wait.
    pub async fn resolve(bindings: &Bindings) -> DeplumiResult<Self> {
        let mut kinds = Vec::with_capacity(bindings.len());
        for (name, handle) in bindings {
            let kind: ResourceKind =
                handle
                    .type_name()
                    .parse()
                    .map_err(|type_name| DeplumiError::UnknownResourceType {
                        name: name.clone(),
                        type_name,
                    })?;
            kinds.push((name, handle, kind));
        }

        let resolved = try_join_all(kinds.into_iter().map(|(name, handle, kind)| async move {
            let values = try_join_all(
                kind.attributes()
                    .iter()
                    .map(|attr| handle.attribute(attr)),
            )
            .await?;
            debug!("Resolved {} ({}) with {} attribute(s)", name, kind, values.len());
            Ok::<_, DeplumiError>(ResourceBinding {
                name: name.clone(),
                kind,
                values,
            })
        }))
        .await?;

        Ok(Self {
            bindings: resolved
                .into_iter()
                .map(|binding| (binding.name.clone(), binding))
                .collect(),
        })
    }

    /// Look up a logical name the way the generated module does
    pub fn lookup<'a>(&'a self, name: &'a str) -> Lookup<'a> {
        match self.bindings.get(name) {
            Some(binding) => Lookup::Found(binding),
            None => Lookup::NotFound(name),
        }
    }

    /// Emit the Python module source
    pub fn render(&self) -> DeplumiResult<String> {
        let bindings: Vec<&ResourceBinding> = self.bindings.values().collect();
        python::render_module(&bindings)
    }
}

/// Resolve and render the accessor module for `bindings`
pub async fn generate(bindings: &Bindings) -> DeplumiResult<String> {
    AccessorModule::resolve(bindings).await?.render()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Handle whose attributes become available after a delay
    #[derive(Debug)]
    pub(crate) struct PendingHandle {
        pub type_name: String,
        pub attrs: HashMap<String, AttrValue>,
        pub delay: Duration,
        pub resolved: AtomicUsize,
    }

    impl PendingHandle {
        pub fn bucket(name: &str) -> Arc<Self> {
            Arc::new(Self {
                type_name: ResourceKind::S3Bucket.type_name().to_string(),
                attrs: HashMap::from([("bucket".to_string(), AttrValue::from(name))]),
                delay: Duration::from_millis(10),
                resolved: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ResourceHandle for PendingHandle {
        fn type_name(&self) -> &str {
            &self.type_name
        }

        async fn attribute(&self, name: &str) -> DeplumiResult<AttrValue> {
            tokio::time::sleep(self.delay).await;
            self.resolved.fetch_add(1, Ordering::SeqCst);
            self.attrs
                .get(name)
                .cloned()
                .ok_or_else(|| DeplumiError::AttributeUnavailable {
                    name: self.type_name.clone(),
                    attribute: name.to_string(),
                    reason: "no such attribute".to_string(),
                })
        }
    }

    #[tokio::test]
    async fn lookup_found_and_missing() {
        let mut bindings: Bindings = BTreeMap::new();
        bindings.insert("bucket".to_string(), PendingHandle::bucket("my-bucket"));

        let module = AccessorModule::resolve(&bindings).await.unwrap();

        match module.lookup("bucket") {
            Lookup::Found(binding) => {
                assert_eq!(binding.kind, ResourceKind::S3Bucket);
                assert_eq!(binding.values, vec![AttrValue::from("my-bucket")]);
                assert_eq!(
                    binding.client_expression(),
                    "(lambda bucket: boto3.resource('s3').Bucket(bucket))('my-bucket')"
                );
            }
            other => panic!("unexpected lookup result: {other}"),
        }

        let missing = module.lookup("missing");
        assert_eq!(missing, Lookup::NotFound("missing"));
        assert_eq!(missing.to_string(), "missing is not a defined resource");
    }

    #[tokio::test]
    async fn generate_emits_one_record_per_binding() {
        let mut bindings: Bindings = BTreeMap::new();
        bindings.insert("uploads".to_string(), PendingHandle::bucket("uploads-1a2b"));
        bindings.insert("assets".to_string(), PendingHandle::bucket("assets-3c4d"));

        let source = generate(&bindings).await.unwrap();

        let assets = source.find("'assets':").unwrap();
        let uploads = source.find("'uploads':").unwrap();
        assert!(assets < uploads, "records are sorted by name");
        assert!(source.contains("('uploads-1a2b',)"));
        assert!(source.contains("('assets-3c4d',)"));
    }

    #[tokio::test]
    async fn empty_bindings_render_empty_table() {
        let source = generate(&Bindings::new()).await.unwrap();
        assert!(source.contains("_resources = {\n}\n"));
    }

    #[tokio::test]
    async fn unknown_type_fails_before_resolving() {
        let known = PendingHandle::bucket("my-bucket");
        let unknown = Arc::new(PendingHandle {
            type_name: "pulumi_aws.ec2.vpc.Vpc".to_string(),
            attrs: HashMap::new(),
            delay: Duration::ZERO,
            resolved: AtomicUsize::new(0),
        });
        let mut bindings: Bindings = BTreeMap::new();
        bindings.insert("a".to_string(), known.clone());
        bindings.insert("vpc".to_string(), unknown);

        let err = generate(&bindings).await.unwrap_err();
        match err {
            DeplumiError::UnknownResourceType { name, type_name } => {
                assert_eq!(name, "vpc");
                assert_eq!(type_name, "pulumi_aws.ec2.vpc.Vpc");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(known.resolved.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn attributes_resolve_concurrently() {
        let mut bindings: Bindings = BTreeMap::new();
        for i in 0..10 {
            let handle = Arc::new(PendingHandle {
                type_name: ResourceKind::S3Bucket.type_name().to_string(),
                attrs: HashMap::from([("bucket".to_string(), AttrValue::from(format!("b{}", i)))]),
                delay: Duration::from_millis(100),
                resolved: AtomicUsize::new(0),
            });
            bindings.insert(format!("r{}", i), handle);
        }

        let started = std::time::Instant::now();
        AccessorModule::resolve(&bindings).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test]
    async fn attribute_failure_propagates() {
        let handle = Arc::new(PendingHandle {
            type_name: ResourceKind::SnsTopic.type_name().to_string(),
            attrs: HashMap::new(),
            delay: Duration::ZERO,
            resolved: AtomicUsize::new(0),
        });
        let mut bindings: Bindings = BTreeMap::new();
        bindings.insert("events".to_string(), handle);

        let err = generate(&bindings).await.unwrap_err();
        assert!(matches!(err, DeplumiError::AttributeUnavailable { .. }));
    }
}
