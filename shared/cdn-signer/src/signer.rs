use std::fmt;

use chrono::{DateTime, Utc};
use url::{form_urlencoded, Url};

use crate::cookies::{CookieOptions, SignedCookie, SignedCookieSet};
use crate::encoding::cdn_base64;
use crate::error::{SigningError, SigningResult};
use crate::key::PrivateKey;
use crate::policy::AccessPolicy;
use crate::{COOKIE_EXPIRES, COOKIE_KEY_PAIR_ID, COOKIE_POLICY, COOKIE_SIGNATURE};

/// A resource URL carrying its own access proof
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    /// Complete URL including signature parameters
    pub url: String,
    /// Instant after which the edge rejects the URL
    pub expires_at: DateTime<Utc>,
}

impl fmt::Display for SignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Signs URLs and cookies with one private key and its public key-pair id
#[derive(Debug, Clone)]
pub struct CdnSigner {
    key_pair_id: String,
    private_key: PrivateKey,
}

impl CdnSigner {
    /// Creates a signer
    pub fn new(key_pair_id: impl Into<String>, private_key: PrivateKey) -> Self {
        Self {
            key_pair_id: key_pair_id.into(),
            private_key,
        }
    }

    /// Public id the edge uses to look up the verification key
    #[must_use]
    pub fn key_pair_id(&self) -> &str {
        &self.key_pair_id
    }

    /// Signs a single resource URL that expires at `expires_at` (canned policy).
    ///
    /// # Errors
    ///
    /// Returns `SigningError::MalformedUrl` if the URL is not absolute http(s), or
    /// `SigningError::SigningFailure` if the key rejects the policy.
    pub fn sign_url(
        &self,
        resource_url: &str,
        expires_at: DateTime<Utc>,
    ) -> SigningResult<SignedUrl> {
        let policy = AccessPolicy::for_resource(resource_url, expires_at);
        self.sign_url_with_policy(resource_url, &policy)
    }

    /// Signs a resource URL with an arbitrary policy.
    ///
    /// Uses the canned form (`Expires`) when the policy allows it and the custom form
    /// (`Policy`) otherwise. Exactly three query parameters are appended.
    ///
    /// # Errors
    ///
    /// Returns `SigningError::MalformedUrl` if the URL is not absolute http(s), or
    /// `SigningError::SigningFailure` if the key rejects the policy.
    pub fn sign_url_with_policy(
        &self,
        resource_url: &str,
        policy: &AccessPolicy,
    ) -> SigningResult<SignedUrl> {
        let parsed = validate_resource_url(resource_url)?;
        let signature = self.signature_for(policy)?;

        let (policy_param, policy_value) = if policy.is_canned() {
            ("Expires", policy.expires_at().timestamp().to_string())
        } else {
            ("Policy", policy.to_encoded())
        };

        let separator = if parsed.query().is_some() { '&' } else { '?' };
        let key_pair_id: String = form_urlencoded::byte_serialize(self.key_pair_id.as_bytes()).collect();
        let url = format!(
            "{resource_url}{separator}{policy_param}={policy_value}&Signature={signature}&Key-Pair-Id={key_pair_id}"
        );

        tracing::debug!(
            form = if policy.is_canned() { "canned" } else { "custom" },
            "signed resource URL"
        );

        Ok(SignedUrl {
            url,
            expires_at: policy.expires_at(),
        })
    }

    /// Signs a policy into the three authentication cookies.
    ///
    /// Canned policies yield `Expires`, `Signature` and `Key-Pair-Id` cookies; custom policies
    /// yield `Policy`, `Signature` and `Key-Pair-Id`. No check is made that the policy is
    /// still valid.
    ///
    /// # Errors
    ///
    /// Returns `SigningError::SigningFailure` if the key rejects the policy.
    pub fn sign_cookies(
        &self,
        policy: &AccessPolicy,
        options: &CookieOptions,
    ) -> SigningResult<SignedCookieSet> {
        let signature = self.signature_for(policy)?;
        let expires_at = policy.expires_at();

        let first = if policy.is_canned() {
            (COOKIE_EXPIRES, expires_at.timestamp().to_string())
        } else {
            (COOKIE_POLICY, policy.to_encoded())
        };

        let cookies = [
            first,
            (COOKIE_SIGNATURE, signature),
            (COOKIE_KEY_PAIR_ID, self.key_pair_id.clone()),
        ]
        .into_iter()
        .map(|(name, value)| SignedCookie {
            name,
            value,
            domain: options.domain.clone(),
            path: options.path.clone(),
            secure: options.secure,
            http_only: true,
            expires_at,
        })
        .collect();

        Ok(SignedCookieSet::new(cookies))
    }

    fn signature_for(&self, policy: &AccessPolicy) -> SigningResult<String> {
        let signature = self.private_key.sign(policy.to_json().as_bytes())?;
        Ok(cdn_base64(&signature))
    }
}

fn validate_resource_url(resource_url: &str) -> SigningResult<Url> {
    // The edge compares the policy resource with the requested URL byte for byte
    if let Some(c) = resource_url.chars().find(|c| !c.is_ascii_graphic()) {
        return Err(SigningError::MalformedUrl {
            url: resource_url.to_string(),
            reason: format!("{c:?} must be percent-encoded"),
        });
    }

    let parsed = Url::parse(resource_url).map_err(|e| SigningError::MalformedUrl {
        url: resource_url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(parsed),
        scheme => Err(SigningError::MalformedUrl {
            url: resource_url.to_string(),
            reason: format!("unsupported scheme {scheme:?} or missing host"),
        }),
    }
}
