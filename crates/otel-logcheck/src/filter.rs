//! Log-store filter expressions.
//!
//! A [`FilterExpression`] is a conjunction of [`Clause`]s rendered in the
//! store's JSON filter syntax:
//!
//! ```text
//! { ($.Service = "orders") && ($.RemoteService NOT EXISTS) && ($.RemoteResourceType = %Bucket%) }
//! ```
//!
//! [`FilterBuilder`] produces the candidate expressions for a [`LogKind`].
//! Expressions can also be parsed back and evaluated against a JSON
//! document, which is how the local stores answer queries.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::ValidationError;
use crate::flatten::stringify;
use crate::kind::{ClassicSelector, LogKind, SpanSelector};
use crate::path::FieldPath;
use crate::types::ValidationContext;

/// Body of the custom log line emitted by the sample applications.
pub const CUSTOM_LOG_BODY: &str = "This is a custom log for validation testing";

/// One condition of a filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Clause {
    /// `(path = "value")`
    Equals {
        /// Attribute path.
        path: FieldPath,
        /// Exact value.
        value: String,
    },
    /// `(path = %value%)`
    Contains {
        /// Attribute path.
        path: FieldPath,
        /// Substring to look for.
        value: String,
    },
    /// `(path NOT EXISTS)`
    NotExists {
        /// Attribute path.
        path: FieldPath,
    },
}

impl Clause {
    /// Equality clause.
    #[must_use]
    pub fn equals(path: FieldPath, value: impl Into<String>) -> Self {
        Self::Equals {
            path,
            value: value.into(),
        }
    }

    /// Substring clause.
    #[must_use]
    pub fn contains(path: FieldPath, value: impl Into<String>) -> Self {
        Self::Contains {
            path,
            value: value.into(),
        }
    }

    /// Absence clause.
    #[must_use]
    pub const fn not_exists(path: FieldPath) -> Self {
        Self::NotExists { path }
    }

    /// Equality when a value is given, absence otherwise.
    #[must_use]
    pub fn equals_or_absent(path: FieldPath, value: Option<&str>) -> Self {
        match value {
            Some(value) => Self::equals(path, value),
            None => Self::not_exists(path),
        }
    }

    /// Returns the attribute path.
    #[must_use]
    pub const fn path(&self) -> &FieldPath {
        match self {
            Self::Equals { path, .. } | Self::Contains { path, .. } | Self::NotExists { path } => {
                path
            }
        }
    }

    /// Evaluates the clause against a JSON document.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Self::Equals { path, value } => path
                .lookup(document)
                .is_some_and(|actual| stringify(actual) == *value),
            Self::Contains { path, value } => path
                .lookup(document)
                .is_some_and(|actual| stringify(actual).contains(value.as_str())),
            Self::NotExists { path } => path.lookup(document).is_none(),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals { path, value } => {
                write!(f, "({path} = \"")?;
                for c in value.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str("\")")
            }
            Self::Contains { path, value } => write!(f, "({path} = %{value}%)"),
            Self::NotExists { path } => write!(f, "({path} NOT EXISTS)"),
        }
    }
}

/// A conjunction of clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterExpression {
    clauses: Vec<Clause>,
}

impl FilterExpression {
    /// Creates an empty expression, which matches every JSON document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a clause.
    #[must_use]
    pub fn and(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    /// Returns the clauses in order.
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Returns true if every clause holds for the document.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        self.clauses.iter().all(|clause| clause.matches(document))
    }

    /// Parses the rendered form.
    ///
    /// Accepts quoted (`"v"`), substring (`%v%`) and bare (`v`) operands.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidFilter`] on malformed input.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        Parser::new(input).parse()
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{ ")?;
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" && ")?;
            }
            write!(f, "{clause}")?;
        }
        f.write_str(" }")
    }
}

impl FromStr for FilterExpression {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Builds candidate filter expressions for a log kind.
#[derive(Debug, Clone, Copy)]
pub struct FilterBuilder<'a> {
    service_name: &'a str,
    trace_id: Option<&'a str>,
}

impl<'a> FilterBuilder<'a> {
    /// Creates a builder scoped to the context's service and trace.
    #[must_use]
    pub fn new(context: &'a ValidationContext) -> Self {
        Self {
            service_name: &context.service_name,
            trace_id: context.trace_id.as_deref(),
        }
    }

    /// Returns the expressions to try, in order.
    ///
    /// OTLP body logs have two candidates (custom log, then GenAI message
    /// exchange); every other kind has exactly one.
    #[must_use]
    pub fn build(&self, kind: &LogKind) -> Vec<FilterExpression> {
        match kind {
            LogKind::OtlpBody => vec![self.custom_log(), self.genai_exchange()],
            LogKind::Span(selector) => vec![self.span(selector)],
            LogKind::Classic(selector) => vec![self.classic(selector)],
        }
    }

    fn classic(&self, selector: &ClassicSelector) -> FilterExpression {
        let mut filter =
            FilterExpression::new().and(Clause::equals(attr("Service"), self.service_name));

        // Dependency fields only ever appear together.
        filter = match &selector.remote {
            Some(remote) => filter
                .and(Clause::equals(attr("RemoteService"), &remote.service))
                .and(Clause::equals(attr("RemoteOperation"), &remote.operation)),
            None => filter
                .and(Clause::not_exists(attr("RemoteService")))
                .and(Clause::not_exists(attr("RemoteOperation"))),
        };

        filter = match &selector.resource {
            Some(resource) => filter
                .and(Clause::contains(attr("RemoteResourceType"), &resource.resource_type))
                .and(Clause::contains(attr("RemoteResourceIdentifier"), &resource.identifier)),
            None => filter
                .and(Clause::not_exists(attr("RemoteResourceType")))
                .and(Clause::not_exists(attr("RemoteResourceIdentifier"))),
        };

        // Runtime metrics carry no operation.
        filter.and(Clause::equals_or_absent(
            attr("Operation"),
            selector.operation.as_deref(),
        ))
    }

    fn span(&self, selector: &SpanSelector) -> FilterExpression {
        FilterExpression::new()
            .and(Clause::equals(span_attr("aws.local.service"), self.service_name))
            .and(Clause::equals(
                span_attr("aws.local.operation"),
                &selector.local_operation,
            ))
            .and(Clause::equals_or_absent(
                span_attr("aws.remote.service"),
                selector.remote_service.as_deref(),
            ))
            .and(Clause::equals_or_absent(
                span_attr("aws.remote.operation"),
                selector.remote_operation.as_deref(),
            ))
    }

    fn resource_service(&self) -> Clause {
        Clause::equals(
            FieldPath::root()
                .key("resource")
                .key("attributes")
                .key("service.name"),
            self.service_name,
        )
    }

    fn custom_log(&self) -> FilterExpression {
        FilterExpression::new()
            .and(self.resource_service())
            .and(Clause::equals(attr("body"), CUSTOM_LOG_BODY))
    }

    fn genai_exchange(&self) -> FilterExpression {
        let filter = FilterExpression::new()
            .and(self.resource_service())
            .and(Clause::equals(message(OUTPUT, 0).key("role"), "assistant"))
            .and(Clause::equals(message(INPUT, 0).key("role"), "user"))
            .and(Clause::not_exists(message(OUTPUT, 1)))
            .and(Clause::not_exists(message(INPUT, 1)));

        match self.trace_id {
            Some(trace_id) => filter.and(Clause::equals(attr("traceId"), trace_id)),
            None => filter,
        }
    }
}

const INPUT: &str = "input";
const OUTPUT: &str = "output";

fn attr(name: &str) -> FieldPath {
    FieldPath::root().key(name)
}

fn span_attr(name: &str) -> FieldPath {
    FieldPath::root().key("attributes").key(name)
}

fn message(direction: &str, index: usize) -> FieldPath {
    FieldPath::root()
        .key("body")
        .key(direction)
        .key("messages")
        .index(index)
}

struct Parser<'s> {
    input: &'s str,
    chars: Vec<char>,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(input: &'s str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: &str) -> ValidationError {
        ValidationError::InvalidFilter(format!("{reason} at {} in {:?}", self.pos, self.input))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: &str) -> bool {
        let end = self.pos + expected.chars().count();
        if end <= self.chars.len() && self.chars[self.pos..end].iter().copied().eq(expected.chars()) {
            self.pos = end;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &str) -> Result<(), ValidationError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {expected:?}")))
        }
    }

    fn parse(mut self) -> Result<FilterExpression, ValidationError> {
        let mut filter = FilterExpression::new();
        self.skip_ws();
        self.expect("{")?;
        self.skip_ws();

        if !self.eat("}") {
            loop {
                self.skip_ws();
                filter = filter.and(self.clause()?);
                self.skip_ws();
                if self.eat("}") {
                    break;
                }
                self.expect("&&")?;
            }
        }

        self.skip_ws();
        if self.pos < self.chars.len() {
            return Err(self.error("trailing input"));
        }
        Ok(filter)
    }

    fn clause(&mut self) -> Result<Clause, ValidationError> {
        self.expect("(")?;
        self.skip_ws();
        let path = self.path()?;
        self.skip_ws();

        if self.eat("NOT EXISTS") {
            self.skip_ws();
            self.expect(")")?;
            return Ok(Clause::not_exists(path));
        }

        self.expect("=")?;
        self.skip_ws();
        let clause = match self.peek() {
            Some('"') => Clause::equals(path, self.quoted()?),
            Some('%') => {
                self.pos += 1;
                let value = self.take_until('%')?;
                self.pos += 1;
                Clause::contains(path, value)
            }
            Some(_) => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ')' && !c.is_whitespace()) {
                    self.pos += 1;
                }
                if start == self.pos {
                    return Err(self.error("expected value"));
                }
                Clause::equals(path, self.chars[start..self.pos].iter().collect::<String>())
            }
            None => return Err(self.error("expected value")),
        };

        self.skip_ws();
        self.expect(")")?;
        Ok(clause)
    }

    fn path(&mut self) -> Result<FieldPath, ValidationError> {
        let start = self.pos;
        let mut in_quote = false;
        while let Some(c) = self.peek() {
            match c {
                '\\' if in_quote => self.pos += 1,
                '\'' => in_quote = !in_quote,
                c if !in_quote && (c.is_whitespace() || c == '=' || c == ')') => break,
                _ => {}
            }
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos.min(self.chars.len())].iter().collect();
        FieldPath::parse_query(&raw).map_err(|e| ValidationError::InvalidFilter(e.to_string()))
    }

    fn quoted(&mut self) -> Result<String, ValidationError> {
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                Some('\\') => {
                    let escaped = self
                        .chars
                        .get(self.pos + 1)
                        .copied()
                        .ok_or_else(|| self.error("dangling escape"))?;
                    value.push(escaped);
                    self.pos += 2;
                }
                Some('"') => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn take_until(&mut self, end: char) -> Result<String, ValidationError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != end) {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(self.error(&format!("expected {end:?}")));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{RemotePair, ResourcePair};
    use proptest::prelude::*;
    use serde_json::json;
    use test_case::test_case;

    fn context() -> ValidationContext {
        ValidationContext::new("orders", "/aws/application-signals/data")
    }

    fn classic(selector: ClassicSelector) -> String {
        let ctx = context();
        let filters = FilterBuilder::new(&ctx).build(&LogKind::Classic(selector));
        assert_eq!(filters.len(), 1);
        filters[0].to_string()
    }

    #[test]
    fn service_level_log_asserts_no_dependency_fields() {
        let filter = classic(ClassicSelector {
            operation: Some("GET /items".to_string()),
            ..ClassicSelector::default()
        });

        assert_eq!(
            filter,
            "{ ($.Service = \"orders\") && ($.RemoteService NOT EXISTS) && \
             ($.RemoteOperation NOT EXISTS) && ($.RemoteResourceType NOT EXISTS) && \
             ($.RemoteResourceIdentifier NOT EXISTS) && ($.Operation = \"GET /items\") }"
        );
    }

    #[test]
    fn dependency_call_requires_both_remote_fields() {
        let filter = classic(ClassicSelector {
            operation: Some("GET /items".to_string()),
            remote: Some(RemotePair {
                service: "payments".to_string(),
                operation: "POST /charge".to_string(),
            }),
            resource: None,
        });

        assert!(filter.contains("($.RemoteService = \"payments\")"));
        assert!(filter.contains("($.RemoteOperation = \"POST /charge\")"));
        assert!(!filter.contains("RemoteService NOT EXISTS"));
    }

    #[test]
    fn resource_pair_uses_substring_clauses() {
        let filter = classic(ClassicSelector {
            operation: Some("PutObject".to_string()),
            remote: Some(RemotePair {
                service: "AWS::S3".to_string(),
                operation: "PutObject".to_string(),
            }),
            resource: Some(ResourcePair {
                resource_type: "AWS::S3::Bucket".to_string(),
                identifier: "my-bucket".to_string(),
            }),
        });

        assert!(filter.contains("($.RemoteResourceType = %AWS::S3::Bucket%)"));
        assert!(filter.contains("($.RemoteResourceIdentifier = %my-bucket%)"));
    }

    #[test]
    fn runtime_metric_asserts_operation_absent() {
        let filter = classic(ClassicSelector::default());
        assert!(filter.contains("($.Operation NOT EXISTS)"));
    }

    #[test]
    fn span_filter_uses_attribute_paths() {
        let ctx = context();
        let filters = FilterBuilder::new(&ctx).build(&LogKind::Span(SpanSelector {
            local_operation: "GET /items".to_string(),
            remote_service: None,
            remote_operation: Some("POST /charge".to_string()),
        }));

        assert_eq!(
            filters[0].to_string(),
            "{ ($.attributes.['aws.local.service'] = \"orders\") && \
             ($.attributes.['aws.local.operation'] = \"GET /items\") && \
             ($.attributes.['aws.remote.service'] NOT EXISTS) && \
             ($.attributes.['aws.remote.operation'] = \"POST /charge\") }"
        );
    }

    #[test]
    fn otlp_body_has_custom_then_genai_candidates() {
        let ctx = context();
        let filters = FilterBuilder::new(&ctx).build(&LogKind::OtlpBody);
        assert_eq!(filters.len(), 2);

        assert_eq!(
            filters[0].to_string(),
            "{ ($.resource.attributes.['service.name'] = \"orders\") && \
             ($.body = \"This is a custom log for validation testing\") }"
        );
        assert_eq!(
            filters[1].to_string(),
            "{ ($.resource.attributes.['service.name'] = \"orders\") && \
             ($.body.output.messages[0].role = \"assistant\") && \
             ($.body.input.messages[0].role = \"user\") && \
             ($.body.output.messages[1] NOT EXISTS) && \
             ($.body.input.messages[1] NOT EXISTS) }"
        );
    }

    #[test]
    fn trace_id_only_scopes_genai_candidate() {
        let ctx = context().with_trace_id("1-5759e988-bd862e3fe1be46a994272793");
        let filters = FilterBuilder::new(&ctx).build(&LogKind::OtlpBody);

        assert!(!filters[0].to_string().contains("traceId"));
        assert!(filters[1]
            .to_string()
            .ends_with("($.traceId = \"1-5759e988-bd862e3fe1be46a994272793\") }"));
    }

    #[test]
    fn quotes_in_values_are_escaped() {
        let clause = Clause::equals(attr("Operation"), r#"say "hi""#);
        assert_eq!(clause.to_string(), r#"($.Operation = "say \"hi\"")"#);
    }

    #[test]
    fn parse_renders_back() {
        let ctx = context().with_trace_id("t-1");
        let builder = FilterBuilder::new(&ctx);
        for kind in [
            LogKind::OtlpBody,
            LogKind::Classic(ClassicSelector::default()),
            LogKind::Span(SpanSelector {
                local_operation: "GET \"quoted\"".to_string(),
                remote_service: Some("payments".to_string()),
                remote_operation: None,
            }),
        ] {
            for filter in builder.build(&kind) {
                let text = filter.to_string();
                let parsed = FilterExpression::parse(&text).map_err(|e| e.to_string());
                assert_eq!(parsed, Ok(filter));
            }
        }
    }

    #[test]
    fn parse_accepts_bare_values() {
        let parsed = "{ ($.Service = orders) && ($.Operation NOT EXISTS) }".parse::<FilterExpression>();
        assert_eq!(
            parsed.map_err(|e| e.to_string()),
            Ok(FilterExpression::new()
                .and(Clause::equals(attr("Service"), "orders"))
                .and(Clause::not_exists(attr("Operation"))))
        );
    }

    #[test]
    fn parse_empty_expression() {
        assert_eq!(
            FilterExpression::parse("{ }").map_err(|e| e.to_string()),
            Ok(FilterExpression::new())
        );
    }

    #[test_case("" ; "empty input")]
    #[test_case("($.a = \"b\")" ; "missing braces")]
    #[test_case("{ ($.a = \"b\") " ; "unclosed brace")]
    #[test_case("{ ($.a = \"b) }" ; "unterminated string")]
    #[test_case("{ ($.a = \"b\") ($.c NOT EXISTS) }" ; "missing conjunction")]
    #[test_case("{ (a = \"b\") }" ; "path without root")]
    #[test_case("{ ($.a = %b) }" ; "unterminated substring")]
    #[test_case("{ ($.a = ) }" ; "missing value")]
    fn parse_rejects_malformed(input: &str) {
        assert!(matches!(
            FilterExpression::parse(input),
            Err(ValidationError::InvalidFilter(_))
        ));
    }

    #[test]
    fn evaluates_against_documents() {
        let ctx = context();
        let filter = &FilterBuilder::new(&ctx).build(&LogKind::Classic(ClassicSelector {
            operation: Some("GET /items".to_string()),
            remote: Some(RemotePair {
                service: "payments".to_string(),
                operation: "POST /charge".to_string(),
            }),
            resource: None,
        }))[0];

        let full = json!({
            "Service": "orders",
            "Operation": "GET /items",
            "RemoteService": "payments",
            "RemoteOperation": "POST /charge"
        });
        assert!(filter.matches(&full));

        let missing_remote_service = json!({
            "Service": "orders",
            "Operation": "GET /items",
            "RemoteOperation": "POST /charge"
        });
        assert!(!filter.matches(&missing_remote_service));
    }

    #[test]
    fn half_dependency_record_never_matches_service_filter() {
        let filter = classic(ClassicSelector {
            operation: Some("GET /items".to_string()),
            ..ClassicSelector::default()
        })
        .parse::<FilterExpression>()
        .map_err(|e| e.to_string());

        let half = json!({"Service": "orders", "Operation": "GET /items", "RemoteService": "payments"});
        assert_eq!(filter.map(|f| f.matches(&half)), Ok(false));
    }

    #[test]
    fn genai_filter_matches_single_exchange_only() {
        let ctx = context();
        let filters = FilterBuilder::new(&ctx).build(&LogKind::OtlpBody);
        let genai = &filters[1];

        let single = json!({
            "resource": {"attributes": {"service.name": "orders"}},
            "body": {
                "input": {"messages": [{"role": "user", "content": "hi"}]},
                "output": {"messages": [{"role": "assistant", "content": "hello"}]}
            }
        });
        assert!(genai.matches(&single));
        assert!(!filters[0].matches(&single));

        let multi = json!({
            "resource": {"attributes": {"service.name": "orders"}},
            "body": {
                "input": {"messages": [{"role": "user"}, {"role": "user"}]},
                "output": {"messages": [{"role": "assistant"}]}
            }
        });
        assert!(!genai.matches(&multi));
    }

    #[test]
    fn substring_and_numeric_values() {
        let doc = json!({"RemoteResourceType": "AWS::S3::Bucket", "severityNumber": 9});
        assert!(Clause::contains(attr("RemoteResourceType"), "S3").matches(&doc));
        assert!(!Clause::contains(attr("RemoteResourceType"), "SQS").matches(&doc));
        assert!(Clause::equals(attr("severityNumber"), "9").matches(&doc));
    }

    proptest! {
        #[test]
        fn builder_is_deterministic(
            service in "[a-z][a-z0-9-]{0,12}",
            operation in proptest::option::of("[A-Z]{3,6} /[a-z]{0,8}"),
            remote in proptest::option::of(("[a-z]{1,8}", "[A-Za-z /]{1,10}")),
        ) {
            let ctx = ValidationContext::new(service, "group");
            let selector = ClassicSelector {
                operation,
                remote: remote.map(|(service, operation)| RemotePair { service, operation }),
                resource: None,
            };
            let kind = LogKind::Classic(selector);

            let first: Vec<String> = FilterBuilder::new(&ctx).build(&kind).iter().map(ToString::to_string).collect();
            let second: Vec<String> = FilterBuilder::new(&ctx).build(&kind).iter().map(ToString::to_string).collect();
            prop_assert_eq!(first, second);
        }
    }
}
