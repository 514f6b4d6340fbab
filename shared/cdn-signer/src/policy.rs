use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::encoding::cdn_base64;
use crate::error::{SigningError, SigningResult};

/// Source address restriction in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    addr: IpAddr,
    prefix: u8,
}

impl IpRange {
    /// Network address of the range
    #[must_use]
    pub const fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Prefix length in bits
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }
}

impl FromStr for IpRange {
    type Err = SigningError;

    /// Parses `addr/prefix`; a bare address covers exactly that host.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let addr: IpAddr = addr
            .parse()
            .map_err(|e| SigningError::InvalidInput(format!("invalid source IP {s:?}: {e}")))?;
        let max_prefix = if addr.is_ipv4() { 32 } else { 128 };

        let prefix = match prefix {
            Some(p) => p
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= max_prefix)
                .ok_or_else(|| {
                    SigningError::InvalidInput(format!("invalid prefix length in {s:?}"))
                })?,
            None => max_prefix,
        };

        Ok(Self { addr, prefix })
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// Conditions attached to a single statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Access is denied at and after this instant
    pub not_after: DateTime<Utc>,
    /// Access is denied before this instant; `None` means valid immediately
    pub not_before: Option<DateTime<Utc>>,
    /// Only requests from this range are accepted; `None` means any address
    pub source_ip: Option<IpRange>,
}

/// A resource pattern and the conditions under which it may be accessed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Resource URL, optionally ending in a `*` wildcard
    pub resource: String,
    /// Access conditions
    pub condition: Condition,
}

impl Statement {
    /// Statement restricted only by expiry
    pub fn new(resource: impl Into<String>, not_after: DateTime<Utc>) -> Self {
        Self {
            resource: resource.into(),
            condition: Condition {
                not_after,
                not_before: None,
                source_ip: None,
            },
        }
    }

    /// Creates a builder for statements with optional conditions
    #[must_use]
    pub fn builder() -> StatementBuilder {
        StatementBuilder::default()
    }

    fn has_wildcard(&self) -> bool {
        self.resource.contains('*')
    }
}

/// Builder for [`Statement`]
#[derive(Debug, Default, Clone)]
pub struct StatementBuilder {
    resource: Option<String>,
    not_after: Option<DateTime<Utc>>,
    not_before: Option<DateTime<Utc>>,
    source_ip: Option<IpRange>,
}

impl StatementBuilder {
    /// Sets the resource URL or wildcard pattern
    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Sets the required expiry
    #[must_use]
    pub const fn not_after(mut self, time: DateTime<Utc>) -> Self {
        self.not_after = Some(time);
        self
    }

    /// Sets the optional start of validity
    #[must_use]
    pub const fn not_before(mut self, time: DateTime<Utc>) -> Self {
        self.not_before = Some(time);
        self
    }

    /// Restricts access to a source address range
    #[must_use]
    pub const fn source_ip(mut self, range: IpRange) -> Self {
        self.source_ip = Some(range);
        self
    }

    /// Builds the statement
    ///
    /// # Errors
    ///
    /// Returns `SigningError::InvalidPolicy` if the resource or expiry is missing, or if the
    /// start of validity is not before the expiry.
    pub fn build(self) -> SigningResult<Statement> {
        let resource = self
            .resource
            .filter(|r| !r.is_empty())
            .ok_or_else(|| SigningError::InvalidPolicy("resource is required".to_string()))?;
        let not_after = self
            .not_after
            .ok_or_else(|| SigningError::InvalidPolicy("expiry is required".to_string()))?;

        if let Some(not_before) = self.not_before {
            if not_before.timestamp() >= not_after.timestamp() {
                return Err(SigningError::InvalidPolicy(
                    "not_before must be earlier than not_after".to_string(),
                ));
            }
        }

        Ok(Statement {
            resource,
            condition: Condition {
                not_after,
                not_before: self.not_before,
                source_ip: self.source_ip,
            },
        })
    }
}

/// Ordered set of statements that a signature grants access to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    statements: Vec<Statement>,
}

impl AccessPolicy {
    /// Single-resource policy constrained only by expiry.
    ///
    /// No check is made against the current time: an expiry in the past still builds and
    /// signs, the edge is what rejects it.
    pub fn for_resource(resource: impl Into<String>, not_after: DateTime<Utc>) -> Self {
        Self {
            statements: vec![Statement::new(resource, not_after)],
        }
    }

    /// Policy with one statement per resource
    ///
    /// # Errors
    ///
    /// Returns `SigningError::InvalidPolicy` when `statements` is empty.
    pub fn new(statements: Vec<Statement>) -> SigningResult<Self> {
        if statements.is_empty() {
            return Err(SigningError::InvalidPolicy(
                "policy needs at least one statement".to_string(),
            ));
        }
        Ok(Self { statements })
    }

    /// Statements in signing order
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Latest expiry across all statements
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.statements
            .iter()
            .map(|s| s.condition.not_after)
            .max()
            .unwrap_or_default()
    }

    /// Whether the policy fits the canned form.
    ///
    /// A canned policy is never transmitted, the edge rebuilds it from the requested URL and the
    /// expiry, so it only applies to one exact resource constrained by expiry alone.
    #[must_use]
    pub fn is_canned(&self) -> bool {
        match self.statements.as_slice() {
            [statement] => {
                statement.condition.not_before.is_none()
                    && statement.condition.source_ip.is_none()
                    && !statement.has_wildcard()
            }
            _ => false,
        }
    }

    /// Canonical JSON: compact, fixed field order, whole epoch seconds.
    ///
    /// The signature covers exactly these bytes.
    #[must_use]
    pub fn to_json(&self) -> String {
        let ip_ranges: Vec<Option<String>> = self
            .statements
            .iter()
            .map(|s| s.condition.source_ip.map(|ip| ip.to_string()))
            .collect();

        let document = PolicyDocument {
            statement: self
                .statements
                .iter()
                .zip(&ip_ranges)
                .map(|(s, ip)| StatementDocument {
                    resource: &s.resource,
                    condition: ConditionDocument {
                        date_less_than: EpochTime::from(s.condition.not_after),
                        date_greater_than: s.condition.not_before.map(EpochTime::from),
                        ip_address: ip.as_deref().map(|source_ip| SourceIp { source_ip }),
                    },
                })
                .collect(),
        };

        // Serializing plain structs of strings and integers cannot fail
        serde_json::to_string(&document).unwrap_or_default()
    }

    /// Canonical JSON in the CDN's base64 variant, as carried by the `Policy` parameter
    #[must_use]
    pub fn to_encoded(&self) -> String {
        cdn_base64(self.to_json().as_bytes())
    }
}

#[derive(Serialize)]
struct PolicyDocument<'a> {
    #[serde(rename = "Statement")]
    statement: Vec<StatementDocument<'a>>,
}

#[derive(Serialize)]
struct StatementDocument<'a> {
    #[serde(rename = "Resource")]
    resource: &'a str,
    #[serde(rename = "Condition")]
    condition: ConditionDocument<'a>,
}

#[derive(Serialize)]
struct ConditionDocument<'a> {
    #[serde(rename = "DateLessThan")]
    date_less_than: EpochTime,
    #[serde(rename = "DateGreaterThan", skip_serializing_if = "Option::is_none")]
    date_greater_than: Option<EpochTime>,
    #[serde(rename = "IpAddress", skip_serializing_if = "Option::is_none")]
    ip_address: Option<SourceIp<'a>>,
}

#[derive(Serialize)]
struct EpochTime {
    #[serde(rename = "AWS:EpochTime")]
    epoch: i64,
}

impl From<DateTime<Utc>> for EpochTime {
    fn from(time: DateTime<Utc>) -> Self {
        Self {
            epoch: time.timestamp(),
        }
    }
}

#[derive(Serialize)]
struct SourceIp<'a> {
    #[serde(rename = "AWS:SourceIp")]
    source_ip: &'a str,
}
