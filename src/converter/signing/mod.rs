//! Signing material resolution.
//!
//! Keystores live in the workspace keystore directory as `<name>.jks` next to a
//! JSON descriptor `<name>.json` holding the alias and passwords. The resolver
//! matches them to artifacts by base name, generating a new pair on demand when
//! the job allows it.

mod identity;

use crate::converter::{
    error::{Context, Error, ErrorExt, Result},
    settings::{SigningPreference, ToolPaths},
    tools::{self, ExternalTool, commands},
    utils::fs::remove_file,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

/// RSA key size for generated keystores.
pub const KEY_SIZE: u32 = 2048;

/// Password length for generated keystores.
const PASSWORD_LEN: usize = 16;

/// Keystore reference and credentials for one artifact.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningMaterial {
    /// Artifact base name the keystore was matched to.
    pub artifact: String,
    /// Keystore file.
    pub keystore: PathBuf,
    /// Key alias inside the keystore.
    pub alias: String,
    /// Keystore password.
    pub store_password: String,
    /// Key password (equal to the store password for generated PKCS12 stores).
    pub key_password: String,
}

impl fmt::Debug for SigningMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningMaterial")
            .field("artifact", &self.artifact)
            .field("keystore", &self.keystore)
            .field("alias", &self.alias)
            .field("store_password", &"<redacted>")
            .field("key_password", &"<redacted>")
            .finish()
    }
}

/// On-disk credential descriptor stored next to each keystore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreDescriptor {
    /// Keystore path at generation time.
    pub keystore_file: String,
    /// Keystore password.
    pub store_password: String,
    /// Key alias.
    pub key_alias: String,
    /// Key password.
    pub key_password: String,
    /// Certificate subject.
    #[serde(default)]
    pub dname: Option<String>,
    /// Certificate validity in days.
    #[serde(default)]
    pub validity_days: Option<u32>,
    /// RFC 3339 creation time.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Matches artifacts to keystores, generating new ones when allowed.
///
/// Results are cached per artifact name for the lifetime of the resolver, so
/// every step of a job that signs the same artifact uses the same key, and
/// concurrent requests for one name generate at most one keystore.
pub struct SigningResolver {
    keystore_dir: PathBuf,
    preference: SigningPreference,
    validity_days: u32,
    tools: ToolPaths,
    runner: Arc<dyn ExternalTool>,
    timeout: Duration,
    cache: Mutex<HashMap<String, Arc<OnceCell<Arc<SigningMaterial>>>>>,
}

impl fmt::Debug for SigningResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningResolver")
            .field("keystore_dir", &self.keystore_dir)
            .field("preference", &self.preference)
            .field("validity_days", &self.validity_days)
            .finish_non_exhaustive()
    }
}

impl SigningResolver {
    /// Creates a resolver over `keystore_dir`.
    pub fn new(
        keystore_dir: PathBuf,
        preference: SigningPreference,
        validity_days: u32,
        tools: ToolPaths,
        runner: Arc<dyn ExternalTool>,
        timeout: Duration,
    ) -> Self {
        Self {
            keystore_dir,
            preference,
            validity_days,
            tools,
            runner,
            timeout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Keystore path matched to `artifact`.
    pub fn keystore_path(&self, artifact: &str) -> PathBuf {
        self.keystore_dir.join(format!("{artifact}.jks"))
    }

    /// Descriptor path matched to `artifact`.
    pub fn descriptor_path(&self, artifact: &str) -> PathBuf {
        self.keystore_dir.join(format!("{artifact}.json"))
    }

    /// Resolves signing material for `artifact`.
    ///
    /// Returns `Ok(None)` when signing is skipped for this job.
    ///
    /// # Errors
    ///
    /// [`Error::MissingSigningMaterial`] when no keystore matches and
    /// auto-generation is disabled, or when a keystore exists without its
    /// descriptor (it is never overwritten).
    pub async fn resolve(
        &self,
        artifact: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<SigningMaterial>>> {
        if self.preference == SigningPreference::Skip {
            return Ok(None);
        }

        let cell = {
            let mut cache = self
                .cache
                .lock()
                .map_err(|_| Error::GenericError("signing cache lock poisoned".into()))?;
            cache.entry(artifact.to_string()).or_default().clone()
        };

        let material = cell
            .get_or_try_init(|| self.load_or_generate(artifact, cancel))
            .await?;
        Ok(Some(material.clone()))
    }

    async fn load_or_generate(
        &self,
        artifact: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<SigningMaterial>> {
        let keystore = self.keystore_path(artifact);
        let descriptor = self.descriptor_path(artifact);
        let has_keystore = tokio::fs::try_exists(&keystore).await.unwrap_or(false);
        let has_descriptor = tokio::fs::try_exists(&descriptor).await.unwrap_or(false);

        if has_keystore && has_descriptor {
            let material = load_descriptor(artifact, &keystore, &descriptor).await?;
            log::info!(
                "Reusing keystore {} (alias {})",
                keystore.display(),
                material.alias
            );
            return Ok(Arc::new(material));
        }

        if has_keystore || self.preference != SigningPreference::AutoGenerate {
            if has_keystore {
                log::warn!(
                    "Keystore {} has no descriptor {}; refusing to overwrite it",
                    keystore.display(),
                    descriptor.display()
                );
            }
            return Err(Error::MissingSigningMaterial {
                artifact: artifact.to_string(),
                keystore,
            });
        }

        self.generate(artifact, &keystore, &descriptor, cancel)
            .await
            .map(Arc::new)
    }

    async fn generate(
        &self,
        artifact: &str,
        keystore: &Path,
        descriptor_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<SigningMaterial> {
        tokio::fs::create_dir_all(&self.keystore_dir)
            .await
            .fs_context("creating keystore directory", &self.keystore_dir)?;

        let password = identity::password(PASSWORD_LEN);
        let alias = identity::alias();
        let dname = identity::distinguished_name();

        // Build under a temporary name and rename, so a failed or cancelled
        // keytool run never leaves a half-written `<name>.jks` behind.
        let staging = self
            .keystore_dir
            .join(format!(".{artifact}-{}.jks", uuid::Uuid::new_v4().simple()));
        let invocation = commands::keytool_genkeypair(
            &self.tools,
            &staging,
            &alias,
            &password,
            &dname,
            KEY_SIZE,
            self.validity_days,
        )?;

        if let Err(e) = tools::run(self.runner.as_ref(), &invocation, self.timeout, cancel).await {
            let _ = remove_file(&staging).await;
            return Err(e).with_context(|| format!("generating keystore for {artifact}"));
        }

        let descriptor = KeystoreDescriptor {
            keystore_file: keystore.display().to_string(),
            store_password: password.clone(),
            key_alias: alias.clone(),
            key_password: password.clone(),
            dname: Some(dname.clone()),
            validity_days: Some(self.validity_days),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        let json = serde_json::to_string_pretty(&descriptor)?;
        let descriptor_staging = staging.with_extension("json");
        tokio::fs::write(&descriptor_staging, json)
            .await
            .fs_context("writing keystore descriptor", &descriptor_staging)?;

        tokio::fs::rename(&staging, keystore)
            .await
            .fs_context("installing keystore", keystore)?;
        tokio::fs::rename(&descriptor_staging, descriptor_path)
            .await
            .fs_context("installing keystore descriptor", descriptor_path)?;

        log::info!("Generated keystore {} (alias {})", keystore.display(), alias);
        log::debug!("Keystore subject: {}", dname);

        Ok(SigningMaterial {
            artifact: artifact.to_string(),
            keystore: keystore.to_path_buf(),
            alias,
            store_password: password.clone(),
            key_password: password,
        })
    }
}

async fn load_descriptor(
    artifact: &str,
    keystore: &Path,
    descriptor_path: &Path,
) -> Result<SigningMaterial> {
    let raw = tokio::fs::read_to_string(descriptor_path)
        .await
        .fs_context("reading keystore descriptor", descriptor_path)?;
    let descriptor: KeystoreDescriptor = serde_json::from_str(&raw)
        .map_err(Error::from)
        .with_context(|| format!("parsing {}", descriptor_path.display()))?;

    Ok(SigningMaterial {
        artifact: artifact.to_string(),
        keystore: keystore.to_path_buf(),
        alias: descriptor.key_alias,
        store_password: descriptor.store_password,
        key_password: descriptor.key_password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{
        settings::Tool,
        tools::{Invocation, ToolOutput},
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes every declared output and counts calls.
    #[derive(Default)]
    struct TouchOutputs {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ExternalTool for TouchOutputs {
        async fn invoke(
            &self,
            invocation: &Invocation,
            _timeout: Duration,
            _cancel: &CancellationToken,
        ) -> Result<ToolOutput> {
            assert_eq!(invocation.tool, Tool::Keytool);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            for out in &invocation.outputs {
                tokio::fs::write(out, b"keystore").await?;
            }
            Ok(ToolOutput::default())
        }
    }

    fn resolver(
        dir: &Path,
        preference: SigningPreference,
        runner: Arc<TouchOutputs>,
    ) -> SigningResolver {
        let tools = ToolPaths {
            keytool: Some("keytool".into()),
            ..Default::default()
        };
        SigningResolver::new(
            dir.to_path_buf(),
            preference,
            10_000,
            tools,
            runner,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn generates_once_and_persists_descriptor() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(TouchOutputs::default());
        let resolver = resolver(tmp.path(), SigningPreference::AutoGenerate, runner.clone());
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(resolver.resolve("app", &cancel), resolver.resolve("app", &cancel));
        let (a, b) = (a.unwrap().unwrap(), b.unwrap().unwrap());
        assert_eq!(a, b);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);

        let raw = std::fs::read_to_string(tmp.path().join("app.json")).unwrap();
        let descriptor: KeystoreDescriptor = serde_json::from_str(&raw).unwrap();
        assert_eq!(descriptor.key_alias, a.alias);
        assert_eq!(descriptor.validity_days, Some(10_000));
        assert!(tmp.path().join("app.jks").is_file());
    }

    #[tokio::test]
    async fn existing_keystore_is_reused_without_regeneration() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(TouchOutputs::default());
        let first = resolver(tmp.path(), SigningPreference::AutoGenerate, runner.clone())
            .resolve("app", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        // A fresh resolver simulates a second job over the same keystore directory
        let second = resolver(tmp.path(), SigningPreference::AutoGenerate, runner.clone())
            .resolve("app", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.alias, second.alias);
        assert_eq!(first.store_password, second.store_password);
    }

    #[tokio::test]
    async fn matched_only_fails_without_keystore() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(TouchOutputs::default());
        let err = resolver(tmp.path(), SigningPreference::UseMatchedKeystore, runner.clone())
            .resolve("app", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingSigningMaterial { .. }));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn orphan_keystore_is_never_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("app.jks"), b"user key").unwrap();
        let runner = Arc::new(TouchOutputs::default());
        let err = resolver(tmp.path(), SigningPreference::AutoGenerate, runner.clone())
            .resolve("app", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingSigningMaterial { .. }));
        assert_eq!(std::fs::read(tmp.path().join("app.jks")).unwrap(), b"user key");
    }

    #[tokio::test]
    async fn reads_descriptors_with_extra_fields() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("legacy.jks"), b"ks").unwrap();
        std::fs::write(
            tmp.path().join("legacy.json"),
            r#"{
              "keystore_file": "C:\\old\\place\\legacy.jks",
              "store_password": "pw",
              "key_alias": "key_55555",
              "key_password": "pw",
              "dname_info": {"cn": "Mia Lee"}
            }"#,
        )
        .unwrap();
        let material = resolver(
            tmp.path(),
            SigningPreference::UseMatchedKeystore,
            Arc::new(TouchOutputs::default()),
        )
        .resolve("legacy", &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
        assert_eq!(material.alias, "key_55555");
        assert_eq!(material.keystore, tmp.path().join("legacy.jks"));
        assert!(!format!("{material:?}").contains("pw\""));
    }

    #[tokio::test]
    async fn skip_returns_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let got = resolver(tmp.path(), SigningPreference::Skip, Arc::new(TouchOutputs::default()))
            .resolve("app", &CancellationToken::new())
            .await
            .unwrap();
        assert!(got.is_none());
    }
}
