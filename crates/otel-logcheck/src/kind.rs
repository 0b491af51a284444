//! Log kind classification.
//!
//! Three log shapes are validated differently. [`LogKind::classify`] decides
//! which one an expectation describes; the result drives both filter
//! construction and how the retrieved record is flattened.

use crate::expectation::{
    ExpectedAttributeSet, BODY_PREFIX, LOCAL_OPERATION_ATTR, OPERATION, REMOTE_OPERATION,
    REMOTE_OPERATION_ATTR, REMOTE_RESOURCE_IDENTIFIER, REMOTE_RESOURCE_TYPE, REMOTE_SERVICE,
    REMOTE_SERVICE_ATTR, SEVERITY_NUMBER, SEVERITY_TEXT,
};
use crate::flatten::FlattenMode;

/// Remote service and operation of a dependency call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePair {
    /// Remote service name.
    pub service: String,
    /// Remote operation name.
    pub operation: String,
}

/// Remote resource of a dependency call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourcePair {
    /// Resource type, e.g. `AWS::S3::Bucket`.
    pub resource_type: String,
    /// Resource identifier.
    pub identifier: String,
}

/// Selector for service-level, dependency-call and runtime-metric logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ClassicSelector {
    /// `None` for runtime metrics.
    pub operation: Option<String>,
    /// `None` for service-level logs.
    pub remote: Option<RemotePair>,
    /// Resource targeted by a dependency call.
    pub resource: Option<ResourcePair>,
}

/// Selector for span logs carrying explicit local operation attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpanSelector {
    /// Local operation.
    pub local_operation: String,
    /// Remote service, if any.
    pub remote_service: Option<String>,
    /// Remote operation, if any.
    pub remote_operation: Option<String>,
}

/// The shape of log an expectation describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogKind {
    /// Structured OTLP log record with its payload under `body`.
    OtlpBody,
    /// Span with `aws.local.operation` attributes.
    Span(SpanSelector),
    /// Service, dependency or runtime-metric log.
    Classic(ClassicSelector),
}

impl LogKind {
    /// Classifies an expected attribute set. Pure; first matching rule wins.
    #[must_use]
    pub fn classify(expected: &ExpectedAttributeSet) -> Self {
        if expected.contains_key(SEVERITY_NUMBER)
            && expected.contains_key(SEVERITY_TEXT)
            && expected.has_key_prefix(BODY_PREFIX)
        {
            return Self::OtlpBody;
        }

        if let Some(local_operation) = expected.literal(LOCAL_OPERATION_ATTR) {
            return Self::Span(SpanSelector {
                local_operation,
                remote_service: expected.literal(REMOTE_SERVICE_ATTR),
                remote_operation: expected.literal(REMOTE_OPERATION_ATTR),
            });
        }

        let remote = match (
            expected.literal(REMOTE_SERVICE),
            expected.literal(REMOTE_OPERATION),
        ) {
            (Some(service), Some(operation)) => Some(RemotePair { service, operation }),
            _ => None,
        };
        let resource = match (
            expected.literal(REMOTE_RESOURCE_TYPE),
            expected.literal(REMOTE_RESOURCE_IDENTIFIER),
        ) {
            (Some(resource_type), Some(identifier)) => Some(ResourcePair {
                resource_type,
                identifier,
            }),
            _ => None,
        };

        Self::Classic(ClassicSelector {
            operation: expected.literal(OPERATION),
            remote,
            resource,
        })
    }

    /// How the retrieved record is flattened before matching.
    #[must_use]
    pub const fn flatten_mode(&self) -> FlattenMode {
        match self {
            Self::OtlpBody => FlattenMode::KeepArrays,
            Self::Span(_) | Self::Classic(_) => FlattenMode::Exploded,
        }
    }

    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OtlpBody => "otlp-body",
            Self::Span(_) => "span",
            Self::Classic(_) => "classic",
        }
    }
}
