use async_trait::async_trait;
use http::HeaderValue;
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::manifest::OciDescriptor;
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{Client, Reference, RegistryOperation};
use std::sync::Arc;
use tracing::{debug, info};

use super::{parse_reference, RawManifest, Registry};
use crate::auth::{DefaultKeychain, Keychain};
use crate::constants::media_type::ACCEPTED_MANIFESTS;
use crate::digest::Digest;
use crate::error::{IndexError, Result};
use crate::manifest::Descriptor;

/// Registry client speaking the distribution API
pub struct RemoteRegistry {
    client: Client,
    insecure_client: Client,
    keychain: Arc<dyn Keychain>,
}

impl RemoteRegistry {
    pub fn new(keychain: Arc<dyn Keychain>, insecure_registries: Vec<String>) -> Self {
        let protocol = if insecure_registries.is_empty() {
            ClientProtocol::Https
        } else {
            ClientProtocol::HttpsExcept(insecure_registries.clone())
        };
        let client = Client::new(ClientConfig {
            protocol,
            ..Default::default()
        });
        let insecure_client = Client::new(ClientConfig {
            protocol: ClientProtocol::HttpsExcept(insecure_registries),
            accept_invalid_certificates: true,
            ..Default::default()
        });

        Self {
            client,
            insecure_client,
            keychain,
        }
    }

    fn client(&self, insecure: bool) -> &Client {
        if insecure {
            &self.insecure_client
        } else {
            &self.client
        }
    }

    async fn authenticate(
        &self,
        reference: &Reference,
        operation: RegistryOperation,
        insecure: bool,
    ) -> Result<RegistryAuth> {
        let auth = self
            .keychain
            .resolve(reference.registry())?
            .authorization()?
            .to_registry_auth();

        self.client(insecure)
            .auth(reference, &auth, operation)
            .await
            .map_err(|e| IndexError::Auth(format!("{}: {}", reference, e)))?;
        Ok(auth)
    }
}

impl Default for RemoteRegistry {
    fn default() -> Self {
        Self::new(Arc::new(DefaultKeychain::new()), Vec::new())
    }
}

#[async_trait]
impl Registry for RemoteRegistry {
    // the client's HEAD only reports the digest, so callers needing the
    // media type get the manifest fetched and summarized
    async fn head(&self, reference: &str, insecure: bool) -> Result<Descriptor> {
        let raw = self.fetch_manifest(reference, insecure).await?;
        Ok(raw.descriptor())
    }

    async fn digest(&self, reference: &str, insecure: bool) -> Result<Digest> {
        let parsed = parse_reference(reference)?;
        let auth = self
            .authenticate(&parsed, RegistryOperation::Pull, insecure)
            .await?;

        debug!("Resolving digest of {}", parsed);
        let digest = self
            .client(insecure)
            .fetch_manifest_digest(&parsed, &auth)
            .await
            .map_err(|e| IndexError::registry(reference, e))?;
        digest.parse()
    }

    async fn fetch_manifest(&self, reference: &str, insecure: bool) -> Result<RawManifest> {
        let parsed = parse_reference(reference)?;
        let auth = self
            .authenticate(&parsed, RegistryOperation::Pull, insecure)
            .await?;

        debug!("Fetching manifest {}", parsed);
        let (data, _) = self
            .client(insecure)
            .pull_manifest_raw(&parsed, &auth, ACCEPTED_MANIFESTS)
            .await
            .map_err(|e| IndexError::registry(reference, e))?;

        RawManifest::new(data.to_vec(), None)
    }

    async fn fetch_blob(
        &self,
        reference: &str,
        digest: &Digest,
        insecure: bool,
    ) -> Result<Vec<u8>> {
        let parsed = parse_reference(reference)?;
        self.authenticate(&parsed, RegistryOperation::Pull, insecure)
            .await?;

        debug!("Fetching blob {} from {}", digest, parsed.repository());
        let descriptor = OciDescriptor {
            media_type: String::new(),
            digest: digest.to_string(),
            size: 0,
            urls: None,
            annotations: None,
        };
        let mut data = Vec::new();
        self.client(insecure)
            .pull_blob(&parsed, &descriptor, &mut data)
            .await
            .map_err(|e| IndexError::registry(reference, e))?;
        Ok(data)
    }

    async fn write_manifest(
        &self,
        reference: &str,
        data: &[u8],
        media_type: &str,
        insecure: bool,
    ) -> Result<Digest> {
        let parsed = parse_reference(reference)?;
        self.authenticate(&parsed, RegistryOperation::Push, insecure)
            .await?;

        let content_type =
            HeaderValue::from_str(media_type).map_err(|e| IndexError::registry(reference, e))?;
        let url = self
            .client(insecure)
            .push_manifest_raw(&parsed, data.to_vec(), content_type)
            .await
            .map_err(|e| IndexError::registry(reference, e))?;

        info!("Pushed manifest to {}", url);
        Ok(Digest::sha256_of(data))
    }
}
