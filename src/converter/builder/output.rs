//! Output naming under the job's collision policy.

use crate::converter::{
    error::{Error, Result},
    settings::CollisionPolicy,
};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Mutex,
};

/// Hands out output paths, never the same one twice within a job.
#[derive(Debug)]
pub struct OutputAllocator {
    policy: CollisionPolicy,
    reserved: Mutex<HashSet<PathBuf>>,
}

impl OutputAllocator {
    /// Creates an allocator applying `policy` to files that already exist.
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            reserved: Mutex::new(HashSet::new()),
        }
    }

    /// Reserves the path for `file_name` in `dir`.
    ///
    /// Names taken earlier in the same job are never reused, whatever the
    /// policy: under `rename` and `overwrite` the next `-N` suffix is picked,
    /// under `fail` the file fails.
    ///
    /// # Errors
    ///
    /// [`Error::OutputCollision`] under [`CollisionPolicy::Fail`].
    pub fn reserve(&self, dir: &Path, file_name: &str) -> Result<PathBuf> {
        let mut reserved = self
            .reserved
            .lock()
            .map_err(|_| Error::GenericError("output reservation lock poisoned".into()))?;

        let wanted = dir.join(file_name);
        let on_disk = wanted.exists();
        let taken = reserved.contains(&wanted);

        let chosen = match self.policy {
            CollisionPolicy::Fail if on_disk || taken => {
                return Err(Error::OutputCollision(wanted));
            }
            CollisionPolicy::Overwrite if !taken => {
                if on_disk {
                    log::warn!("Overwriting existing {}", wanted.display());
                }
                wanted
            }
            _ if !on_disk && !taken => wanted,
            _ => {
                let (stem, ext) = split_name(file_name);
                (1..)
                    .map(|n| dir.join(format!("{stem}-{n}{ext}")))
                    .find(|candidate| !reserved.contains(candidate) && !candidate.exists())
                    .ok_or_else(|| Error::OutputCollision(wanted.clone()))?
            }
        };

        reserved.insert(chosen.clone());
        Ok(chosen)
    }
}

/// `app.tar.aab` -> (`app.tar`, `.aab`); names without a dot keep an empty extension.
fn split_name(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => file_name.split_at(dot),
        _ => (file_name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_skips_existing_and_reserved() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("app.aab"), b"old").unwrap();
        let alloc = OutputAllocator::new(CollisionPolicy::Rename);

        assert_eq!(alloc.reserve(tmp.path(), "app.aab").unwrap(), tmp.path().join("app-1.aab"));
        assert_eq!(alloc.reserve(tmp.path(), "app.aab").unwrap(), tmp.path().join("app-2.aab"));
        assert_eq!(alloc.reserve(tmp.path(), "new.aab").unwrap(), tmp.path().join("new.aab"));
    }

    #[test]
    fn overwrite_replaces_files_from_earlier_runs_only() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("app_universal.apks"), b"old").unwrap();
        let alloc = OutputAllocator::new(CollisionPolicy::Overwrite);

        assert_eq!(
            alloc.reserve(tmp.path(), "app_universal.apks").unwrap(),
            tmp.path().join("app_universal.apks")
        );
        assert_eq!(
            alloc.reserve(tmp.path(), "app_universal.apks").unwrap(),
            tmp.path().join("app_universal-1.apks")
        );
    }

    #[test]
    fn fail_policy_reports_collision() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("app.apk"), b"old").unwrap();
        let alloc = OutputAllocator::new(CollisionPolicy::Fail);

        let err = alloc.reserve(tmp.path(), "app.apk").unwrap_err();
        assert!(matches!(err, Error::OutputCollision(p) if p == tmp.path().join("app.apk")));
        alloc.reserve(tmp.path(), "other.apk").unwrap();
        assert!(alloc.reserve(tmp.path(), "other.apk").is_err());
    }

    #[test]
    fn split_name_handles_dotless_and_hidden() {
        assert_eq!(split_name("app.aab"), ("app", ".aab"));
        assert_eq!(split_name("README"), ("README", ""));
        assert_eq!(split_name(".hidden"), (".hidden", ""));
    }
}
