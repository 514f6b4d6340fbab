//! Process configuration, read once from the environment at startup

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use aws_config::{retry::RetryConfig, BehaviorVersion};
use aws_sdk_s3::config::{Credentials, Region, RequestChecksumCalculation};
use cdn_signer::{CookieOptions, IpRange};
use thiserror::Error;
use url::Url;

use super::Environment;

/// Attempt ceiling for storage calls, including the first attempt
pub const MAX_ATTEMPTS: u32 = 3;

const DEFAULT_UPLOAD_FROM: &str = "hello.txt";
const DEFAULT_OBJECT_KEY: &str = "mysubpath/hello.txt";
const DEFAULT_OBJECT_KEY_WILDCARD: &str = "mysubpath/*";
const DEFAULT_SIGNED_TTL_SECS: u64 = 60 * 60;
const DEFAULT_PORT: u16 = 80;
const DEFAULT_COOKIE_DOMAIN: &str = "localhost";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    /// A variable is set to an unusable value
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Value as read
        value: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Object storage connection settings
#[derive(Clone)]
pub struct StorageConfig {
    /// Region of the bucket
    pub region: String,
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Destination bucket
    pub bucket: String,
    /// Endpoint override, enables path-style addressing
    pub endpoint_url: Option<String>,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("bucket", &self.bucket)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

/// CDN signing settings
#[derive(Debug, Clone)]
pub struct CdnConfig {
    /// Distribution domain, e.g. `d111111abcdef8.cloudfront.net`
    pub domain: String,
    /// `https://{domain}/`, validated at load
    pub base_url: Url,
    /// Public key-pair id registered with the distribution
    pub key_pair_id: String,
    /// PEM private key file
    pub private_key_path: PathBuf,
}

/// What to upload and where
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Local file to upload
    pub source_path: PathBuf,
    /// Destination object key
    pub object_key: String,
}

/// Validity window and optional restrictions for signed artifacts
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Key pattern the cookies grant access to
    pub wildcard_key: String,
    /// Lifetime of the signed URL and cookies
    pub ttl: Duration,
    /// Source IP restriction for the cookie policy
    pub source_ip: Option<IpRange>,
    /// Delay before the cookie policy becomes valid
    pub not_before_delay: Option<Duration>,
}

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment stage
    pub environment: Environment,
    /// Object storage settings
    pub storage: StorageConfig,
    /// CDN settings
    pub cdn: CdnConfig,
    /// Upload source and destination
    pub upload: UploadConfig,
    /// Signing policy settings
    pub policy: PolicyConfig,
    /// Attributes of the issued cookies
    pub cookies: CookieOptions,
    /// Probe the CDN with the signed cookies after signing
    pub verify_with_cookies: bool,
    /// Serve the signed cookies on `GET /auth` once the pipeline completes
    pub serve_cookies: bool,
    /// Port of the cookie server
    pub port: u16,
}

impl Config {
    /// Reads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if a required variable is unset and
    /// `ConfigError::Invalid` if a variable cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if a required variable is unset and
    /// `ConfigError::Invalid` if a variable cannot be parsed
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let environment = Environment::parse(vars.get("APP_ENV").as_deref())?;

        let storage = StorageConfig {
            region: vars.required("S3_REGION")?,
            access_key_id: vars.required("S3_ACCESS_KEY")?,
            secret_access_key: vars.required("S3_SECRET_KEY")?,
            bucket: vars.required("S3_BUCKET")?,
            endpoint_url: vars.get("S3_ENDPOINT_URL"),
        };

        let domain = vars.required("CF_DOMAIN")?;
        let base_url = cdn_base_url(&domain)?;
        let cdn = CdnConfig {
            domain,
            base_url,
            key_pair_id: vars.required("CF_PUBLIC_KEY_ID")?,
            private_key_path: PathBuf::from(vars.required("CF_PRIKEY_PATH")?),
        };

        let upload = UploadConfig {
            source_path: PathBuf::from(
                vars.get("UPLOAD_FROM")
                    .unwrap_or_else(|| DEFAULT_UPLOAD_FROM.to_string()),
            ),
            object_key: vars
                .get("OBJECT_KEY")
                .unwrap_or_else(|| DEFAULT_OBJECT_KEY.to_string()),
        };

        let policy = PolicyConfig {
            wildcard_key: vars
                .get("OBJECT_KEY_WILDCARD")
                .unwrap_or_else(|| DEFAULT_OBJECT_KEY_WILDCARD.to_string()),
            ttl: Duration::from_secs(
                vars.parse("SIGNED_URL_TTL_SECS")?
                    .unwrap_or(DEFAULT_SIGNED_TTL_SECS),
            ),
            source_ip: vars.parse("POLICY_SOURCE_IP")?,
            not_before_delay: vars
                .parse::<u64>("POLICY_NOT_BEFORE_SECS")?
                .map(Duration::from_secs),
        };

        if let Some(delay) = policy.not_before_delay {
            if delay >= policy.ttl {
                return Err(ConfigError::Invalid {
                    var: "POLICY_NOT_BEFORE_SECS",
                    value: delay.as_secs().to_string(),
                    reason: "must be shorter than SIGNED_URL_TTL_SECS".to_string(),
                });
            }
        }

        let cookies = CookieOptions {
            // Set but blank means host-only cookies
            domain: match vars.raw("COOKIE_DOMAIN") {
                None => Some(DEFAULT_COOKIE_DOMAIN.to_string()),
                Some(domain) if domain.is_empty() => None,
                Some(domain) => Some(domain),
            },
            path: vars.get("COOKIE_PATH").unwrap_or_else(|| "/".to_string()),
            secure: vars.flag("COOKIE_SECURE")?.unwrap_or(false),
        };

        Ok(Self {
            environment,
            storage,
            cdn,
            upload,
            policy,
            cookies,
            verify_with_cookies: vars.flag("VERIFY_WITH_COOKIES")?.unwrap_or(true),
            serve_cookies: vars.flag("SERVE_COOKIES")?.unwrap_or(true),
            port: vars.parse("PORT")?.unwrap_or(DEFAULT_PORT),
        })
    }

    /// `https://{domain}/{key}` for a key or key pattern.
    ///
    /// Each `/`-separated segment of the key is percent-encoded, so the signed resource matches
    /// the URL a client actually requests. A trailing `*` stays literal.
    #[must_use]
    pub fn cdn_url(&self, key: &str) -> String {
        let mut url = self.cdn.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(key.trim_start_matches('/').split('/'));
        }
        url.into()
    }

    /// S3 client configuration with static credentials and the fixed retry ceiling
    #[must_use]
    pub fn s3_client_config(&self) -> aws_sdk_s3::Config {
        let credentials = Credentials::new(
            &self.storage.access_key_id,
            &self.storage.secret_access_key,
            None,
            None,
            "environment",
        );

        let retry_config = RetryConfig::standard()
            .with_max_attempts(MAX_ATTEMPTS)
            .with_initial_backoff(Duration::from_millis(50));

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.storage.region.clone()))
            .credentials_provider(credentials)
            .retry_config(retry_config);

        // Endpoint overrides point at S3-compatible stand-ins that expect path-style
        // addressing and plain (non aws-chunked) bodies
        if let Some(endpoint_url) = &self.storage.endpoint_url {
            builder = builder
                .endpoint_url(endpoint_url)
                .force_path_style(true)
                .request_checksum_calculation(RequestChecksumCalculation::WhenRequired);
        }

        builder.build()
    }
}

fn cdn_base_url(domain: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: "CF_DOMAIN",
        value: domain.to_string(),
        reason,
    };

    let url = Url::parse(&format!("https://{}/", domain.trim_end_matches('/')))
        .map_err(|e| invalid(e.to_string()))?;
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("expected a bare host name".to_string()));
    }
    Ok(url)
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, name: &str) -> Option<String> {
        (self.0)(name).map(|v| v.trim().to_string())
    }

    fn get(&self, name: &str) -> Option<String> {
        self.raw(name).filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn parse<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(name)
            .map(|value| {
                value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                    var: name,
                    reason: e.to_string(),
                    value,
                })
            })
            .transpose()
    }

    fn flag(&self, name: &'static str) -> Result<Option<bool>, ConfigError> {
        self.get(name)
            .map(|value| match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    var: name,
                    value,
                    reason: "expected a boolean".to_string(),
                }),
            })
            .transpose()
    }
}
