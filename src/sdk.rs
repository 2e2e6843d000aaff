// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! SDK tree acquisition and configuration.
//!
//! The __SDK tree__ is the directory structure that the pipeline populates.
//! It starts out as the contents of a prebuilt archive that is downloaded
//! once, and is then filled in incrementally with artifacts built from
//! source repositories.
//!
//! # SDK Tree Layout
//!
//! Only two subpaths of the SDK tree matter to the pipeline: `lib/`, which
//! receives the core library archive, and `components/project/`, which
//! receives the application package. Everything else comes straight from the
//! prebuilt archive and is never touched.
//!
//! # Idempotency
//!
//! Nothing in here checks whether work has already been done. The archive is
//! only downloaded when the caller sees that it is missing, and the SDK tree
//! is only extracted when the caller sees that it is missing. The one
//! exception is `local.properties`, which is regenerated on every run.

pub mod download;
pub mod extract;
pub mod properties;

use std::path::{Path, PathBuf};

/// Directory structure populated by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkTree {
    root: PathBuf,
}

impl SdkTree {
    /// Construct new SDK tree rooted at target directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of SDK tree.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Check if SDK tree has been extracted.
    ///
    /// Extraction only moves the tree into place once it is complete, so an
    /// existing root means a finished extraction.
    pub fn is_present(&self) -> bool {
        self.root.is_dir()
    }

    /// Resolve install location of an artifact inside SDK tree.
    pub fn install_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn install_path_is_relative_to_root() {
        let tree = SdkTree::new("./cheese-sdk");
        assert_eq!(
            tree.install_path("components/project/js.apk"),
            PathBuf::from("./cheese-sdk/components/project/js.apk")
        );
    }

    #[test]
    fn missing_root_is_not_present() -> anyhow::Result<()> {
        let scratch = tempfile::tempdir()?;
        assert!(SdkTree::new(scratch.path()).is_present());
        assert!(!SdkTree::new(scratch.path().join("sdk")).is_present());

        Ok(())
    }
}
