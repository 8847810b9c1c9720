// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::log::LogColorize;
use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn create_dir_all<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    if path.exists() {
        Ok(())
    } else {
        std::fs::create_dir_all(path)
            .with_context(|| anyhow!("Failed to create directory {}", path.log_color_highlight()))
    }
}

pub fn read_to_string<P: AsRef<Path>>(path: P) -> anyhow::Result<String> {
    let path = path.as_ref();
    fs_extra::file::read_to_string(path).with_context(|| {
        anyhow!(
            "Failed to read to string, file: {}",
            path.log_color_highlight()
        )
    })
}

// Creates all missing parent directories if necessary and writes str to path.
pub fn write_str<P: AsRef<Path>, S: AsRef<str>>(path: P, str: S) -> anyhow::Result<()> {
    let path = PathExtra(path);
    let str = str.as_ref();

    let context = || anyhow!("Failed to write string to {}", path.as_path().log_color_highlight());

    let target_parent = path.parent().with_context(context)?;
    create_dir_all(target_parent).with_context(context)?;
    std::fs::write(&path, str.as_bytes()).with_context(context)
}

pub fn remove<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    if path.exists() {
        if path.is_dir() {
            std::fs::remove_dir_all(path).with_context(|| {
                anyhow!("Failed to delete directory {}", path.log_color_highlight())
            })?;
        } else {
            std::fs::remove_file(path)
                .with_context(|| anyhow!("Failed to delete file {}", path.log_color_highlight()))?;
        }
    }
    Ok(())
}

pub fn has_str_content<P: AsRef<Path>, S: AsRef<str>>(path: P, str: S) -> anyhow::Result<bool> {
    let path = path.as_ref();
    let str = str.as_ref();

    let content = read_to_string(path)
        .with_context(|| anyhow!("Failed to read as string: {}", path.log_color_highlight()))?;

    Ok(content == str)
}

pub struct PathExtra<P: AsRef<Path>>(P);

impl<P: AsRef<Path>> PathExtra<P> {
    pub fn new(path: P) -> Self {
        Self(path)
    }

    pub fn parent(&self) -> anyhow::Result<&Path> {
        let path = self.0.as_ref();
        path.parent().ok_or_else(|| {
            anyhow!(
                "Failed to get parent dir for path: {}",
                path.log_color_highlight()
            )
        })
    }

    pub fn file_name_to_string(&self) -> anyhow::Result<String> {
        let path = self.0.as_ref();
        path.file_name()
            .ok_or_else(|| {
                anyhow!(
                    "Failed to get file name for path: {}",
                    path.log_color_highlight(),
                )
            })?
            .to_os_string()
            .into_string()
            .map_err(|_| {
                anyhow!(
                    "Failed to convert filename for path: {}",
                    path.log_color_highlight()
                )
            })
    }

    pub fn as_path(&self) -> &Path {
        self.0.as_ref()
    }

    pub fn display(&self) -> std::path::Display<'_> {
        self.as_path().display()
    }
}

impl<P: AsRef<Path>> AsRef<Path> for PathExtra<P> {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

/// Collects output files in a temporary directory and publishes them to the
/// real output root only once the whole run has succeeded.
///
/// A failed run therefore never partially overwrites a previously published
/// output tree. Publishing skips files whose target already has identical
/// content, which keeps repeated runs byte-stable on disk and leaves
/// modification times of unchanged files alone. Only staged paths are ever
/// written; files the generator does not own are not touched.
pub struct StagedOutput {
    staging: TempDir,
    output_root: PathBuf,
    files: Vec<PathBuf>,
}

#[derive(Copy, Clone, PartialEq)]
pub enum PublishAction {
    Create,
    Overwrite,
    SkipSameContent,
}

impl StagedOutput {
    pub fn new(output_root: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            staging: TempDir::new().context("Failed to create staging directory")?,
            output_root: output_root.to_path_buf(),
            files: Vec::new(),
        })
    }

    /// Writes a file into the staging area. `relative` must not escape the
    /// output root.
    pub fn stage_file(&mut self, relative: &Path, content: &str) -> anyhow::Result<()> {
        if relative.is_absolute() || relative.components().any(|c| c.as_os_str() == "..") {
            return Err(anyhow!(
                "Refusing to stage file outside the output root: {}",
                relative.log_color_highlight()
            ));
        }
        write_str(self.staging.path().join(relative), content)?;
        self.files.push(relative.to_path_buf());
        Ok(())
    }

    pub fn staged_files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Copies every staged file to the output root, returning the performed
    /// action per file in staging order.
    pub fn publish(self) -> anyhow::Result<Vec<(PathBuf, PublishAction)>> {
        let mut actions = Vec::with_capacity(self.files.len());

        for relative in &self.files {
            let source = self.staging.path().join(relative);
            let target = self.output_root.join(relative);

            let content = read_to_string(&source)?;
            let action = if !target.exists() {
                PublishAction::Create
            } else if has_str_content(&target, &content)? {
                PublishAction::SkipSameContent
            } else {
                PublishAction::Overwrite
            };

            if action != PublishAction::SkipSameContent {
                write_str(&target, &content).with_context(|| {
                    anyhow!("Failed to publish {}", target.log_color_highlight())
                })?;
            }

            actions.push((relative.clone(), action));
        }

        Ok(actions)
    }
}
