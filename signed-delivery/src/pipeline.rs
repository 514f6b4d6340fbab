//! Upload, sign and verify, run once per process
//!
//! Each stage sits behind a narrow interface ([`ObjectUploader`], [`AccessProbe`]) so the
//! same sequence serves every deployment variant and can run against stand-ins in tests.
//! Any stage failure ends the run; there is no partial success.

use std::path::PathBuf;
use std::time::Duration;

use cdn_signer::{
    AccessPolicy, CdnSigner, PrivateKey, SignedCookieSet, SignedUrl, SigningError, Statement,
};
use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tracing::{info, instrument};

use crate::{
    object_storage::{ObjectLocation, ObjectUploader, StorageError, UploadRequest, UploadSource},
    probe::{AccessProbe, ProbeError, ProbeResponse},
    types::Config,
};

/// A failed pipeline stage
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Source file could not be opened, nothing was uploaded
    #[error("Unable to open file {path:?}")]
    OpenSource {
        /// Configured source path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: StorageError,
    },

    /// Upload failed after the retry ceiling
    #[error("Unable to upload {path:?} to {bucket:?}")]
    Upload {
        /// Source path
        path: PathBuf,
        /// Destination bucket
        bucket: String,
        /// Underlying error
        #[source]
        source: StorageError,
    },

    /// Private key could not be read or parsed
    #[error("Error loading private key")]
    KeyLoad(#[source] SigningError),

    /// Resource URL could not be signed
    #[error("Failed to sign url")]
    SignUrl(#[source] SigningError),

    /// Cookie policy could not be built or signed
    #[error("Failed to create signed cookies")]
    SignCookies(#[source] SigningError),

    /// Probe request failed
    #[error("Failed to access with signed cookies")]
    Probe(#[source] ProbeError),
}

/// Artifacts of a successful run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Where the object was stored
    pub location: ObjectLocation,
    /// Signed URL for the uploaded object
    pub signed_url: SignedUrl,
    /// Signed cookies for the wildcard resource
    pub cookies: SignedCookieSet,
    /// Probe result, when verification is enabled
    pub probe: Option<ProbeResponse>,
}

/// upload → build policy → sign → optional verify
pub struct Pipeline<'a> {
    config: &'a Config,
    uploader: &'a dyn ObjectUploader,
    probe: &'a dyn AccessProbe,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline over the given stages
    #[must_use]
    pub fn new(
        config: &'a Config,
        uploader: &'a dyn ObjectUploader,
        probe: &'a dyn AccessProbe,
    ) -> Self {
        Self {
            config,
            uploader,
            probe,
        }
    }

    /// Runs every stage, taking validity windows from the current time
    ///
    /// # Errors
    ///
    /// Returns the first stage failure
    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        self.run_at(Utc::now()).await
    }

    /// Runs every stage with validity windows anchored at `now`
    ///
    /// # Errors
    ///
    /// Returns the first stage failure
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<PipelineReport, PipelineError> {
        let location = self.upload().await?;

        let signer = self.load_signer().await?;

        let expires_at = offset(now, self.config.policy.ttl);
        let resource_url = self.config.cdn_url(&self.config.upload.object_key);
        let signed_url = signer
            .sign_url(&resource_url, expires_at)
            .map_err(PipelineError::SignUrl)?;
        info!(url = %signed_url, "Got signed URL");

        let policy = self.cookie_policy(now).map_err(PipelineError::SignCookies)?;
        let cookies = signer
            .sign_cookies(&policy, &self.config.cookies)
            .map_err(PipelineError::SignCookies)?;
        info!(cookies = cookies.len(), expires_at = %policy.expires_at(), "Created signed cookies");

        let probe = if self.config.verify_with_cookies {
            let response = self
                .probe
                .fetch(&resource_url, &cookies)
                .await
                .map_err(PipelineError::Probe)?;
            info!(status = response.status, content = %response.body, "Accessed with signed cookies");
            Some(response)
        } else {
            None
        };

        Ok(PipelineReport {
            location,
            signed_url,
            cookies,
            probe,
        })
    }

    #[instrument(skip(self), fields(path = %self.config.upload.source_path.display()))]
    async fn upload(&self) -> Result<ObjectLocation, PipelineError> {
        let path = &self.config.upload.source_path;

        let source = UploadSource::open(path)
            .await
            .map_err(|source| PipelineError::OpenSource {
                path: path.clone(),
                source,
            })?;

        let request = UploadRequest {
            bucket: self.config.storage.bucket.clone(),
            key: self.config.upload.object_key.clone(),
            expires: None,
        };

        let location = self
            .uploader
            .upload(&request, source)
            .await
            .map_err(|source| PipelineError::Upload {
                path: path.clone(),
                bucket: request.bucket.clone(),
                source,
            })?;

        info!(
            "Successfully uploaded {} to {}",
            path.display(),
            self.config.storage.bucket
        );
        Ok(location)
    }

    async fn load_signer(&self) -> Result<CdnSigner, PipelineError> {
        let key = PrivateKey::from_pem_file(&self.config.cdn.private_key_path)
            .await
            .map_err(PipelineError::KeyLoad)?;
        Ok(CdnSigner::new(self.config.cdn.key_pair_id.clone(), key))
    }

    /// Wildcard policy for the cookies, with the configured optional conditions
    fn cookie_policy(&self, now: DateTime<Utc>) -> Result<AccessPolicy, SigningError> {
        let policy = &self.config.policy;
        let resource = self.config.cdn_url(&policy.wildcard_key);
        let not_after = offset(now, policy.ttl);

        if policy.source_ip.is_none() && policy.not_before_delay.is_none() {
            return Ok(AccessPolicy::for_resource(resource, not_after));
        }

        let mut statement = Statement::builder().resource(resource).not_after(not_after);
        if let Some(range) = policy.source_ip {
            statement = statement.source_ip(range);
        }
        if let Some(delay) = policy.not_before_delay {
            statement = statement.not_before(offset(now, delay));
        }

        AccessPolicy::new(vec![statement.build()?])
    }
}

/// `now + delay`, saturating at the latest representable instant
fn offset(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
