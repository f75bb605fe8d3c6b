//! Resource kinds the accessor module knows how to reconstruct
//!
//! Each kind pairs a provisioning type name with the attributes to read off
//! the live handle and the boto3 expression that rebuilds a client from them.
//! The attribute names are the parameter names of that expression.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// S3 bucket
    S3Bucket,
    /// DynamoDB table
    DynamoDbTable,
    /// SQS queue
    SqsQueue,
    /// SNS topic
    SnsTopic,
}

impl ResourceKind {
    /// All kinds, in registry order
    pub const ALL: &'static [Self] = &[
        Self::S3Bucket,
        Self::DynamoDbTable,
        Self::SqsQueue,
        Self::SnsTopic,
    ];

    /// Fully-qualified type name of the provisioning handle
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::S3Bucket => "pulumi_aws.s3.bucket.Bucket",
            Self::DynamoDbTable => "pulumi_aws.dynamodb.table.Table",
            Self::SqsQueue => "pulumi_aws.sqs.queue.Queue",
            Self::SnsTopic => "pulumi_aws.sns.topic.Topic",
        }
    }

    /// Attributes to resolve, in the order the expression takes them
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            Self::S3Bucket => &["bucket"],
            Self::DynamoDbTable => &["name"],
            Self::SqsQueue => &["url"],
            Self::SnsTopic => &["arn"],
        }
    }

    /// Python expression building the client from the attributes
    pub fn expression(&self) -> &'static str {
        match self {
            Self::S3Bucket => "boto3.resource('s3').Bucket(bucket)",
            Self::DynamoDbTable => "boto3.resource('dynamodb').Table(name)",
            Self::SqsQueue => "boto3.resource('sqs').Queue(url)",
            Self::SnsTopic => "boto3.resource('sns').Topic(arn)",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.type_name() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A resolved attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
