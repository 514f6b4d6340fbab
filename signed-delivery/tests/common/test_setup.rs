use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use cdn_signer::{CdnSigner, PrivateKey};
use signed_delivery::types::Config;
use tempfile::TempDir;

use super::{MockS3, BUCKET, CDN_DOMAIN, KEY_PAIR_ID, TEST_RSA_KEY_PEM};

/// Temp files plus a mock S3 endpoint, wired into a [`Config`]
pub struct TestContext {
    pub dir: TempDir,
    pub s3: MockS3,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_s3(MockS3::start().await)
    }

    pub fn with_s3(s3: MockS3) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("hello.txt"), "hello\n").expect("Failed to write source");
        std::fs::write(dir.path().join("private_key.pem"), TEST_RSA_KEY_PEM)
            .expect("Failed to write key");
        Self { dir, s3 }
    }

    pub fn source_path(&self) -> PathBuf {
        self.dir.path().join("hello.txt")
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.path().join("private_key.pem")
    }

    /// Writes `contents` to `name` inside the temp dir
    pub fn write_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write file");
        path
    }

    /// Variables for a complete configuration against the mock endpoint
    pub fn env_vars(&self) -> HashMap<String, String> {
        HashMap::from([
            ("S3_REGION".to_string(), "us-east-1".to_string()),
            ("S3_ACCESS_KEY".to_string(), "AKIDEXAMPLE".to_string()),
            ("S3_SECRET_KEY".to_string(), "secret".to_string()),
            ("S3_BUCKET".to_string(), BUCKET.to_string()),
            ("S3_ENDPOINT_URL".to_string(), self.s3.endpoint.clone()),
            ("CF_DOMAIN".to_string(), CDN_DOMAIN.to_string()),
            ("CF_PUBLIC_KEY_ID".to_string(), KEY_PAIR_ID.to_string()),
            ("CF_PRIKEY_PATH".to_string(), path_string(&self.key_path())),
            ("UPLOAD_FROM".to_string(), path_string(&self.source_path())),
        ])
    }

    pub fn config(&self) -> Config {
        self.config_with(&[])
    }

    pub fn config_with(&self, overrides: &[(&str, &str)]) -> Config {
        let mut vars = self.env_vars();
        for (name, value) in overrides {
            vars.insert((*name).to_string(), (*value).to_string());
        }
        Config::from_lookup(|name| vars.get(name).cloned()).expect("valid test config")
    }

    pub fn s3_client(&self) -> Arc<S3Client> {
        Arc::new(S3Client::from_conf(self.config().s3_client_config()))
    }
}

pub fn test_signer() -> CdnSigner {
    let key = PrivateKey::from_pem(TEST_RSA_KEY_PEM.as_bytes()).expect("valid test key");
    CdnSigner::new(KEY_PAIR_ID, key)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
