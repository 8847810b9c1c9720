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

pub mod naming;
pub mod routing;
pub mod rust;

use crate::fs::StagedOutput;
use crate::log::LogColorize;
use crate::model::SchemaSet;
use anyhow::Context;
use indexmap::IndexSet;
use log::info;
use routing::Plan;
use rust::{GeneratedFile, RustEmitter};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Generates the SDK source tree for a schema directory.
///
/// The run is load-then-emit: every schema file (shared types included) is in
/// memory and validated before the first root is rendered, and all rendered
/// files are staged before anything is published. A failing run therefore
/// leaves a previously generated output tree fully intact.
pub struct Generator {
    schema_dir: PathBuf,
    output_root: PathBuf,
}

impl Generator {
    pub fn new(schema_dir: &Path, output_root: &Path) -> Self {
        Self {
            schema_dir: schema_dir.to_path_buf(),
            output_root: output_root.to_path_buf(),
        }
    }

    pub fn run(&self) -> anyhow::Result<Vec<GeneratedFile>> {
        let set = SchemaSet::load(&self.schema_dir)?;
        info!(
            "loaded {} task configs, {} resource specs and {} shared types from {}",
            set.configs.len(),
            set.resource_specs.len(),
            set.shared_types.len(),
            self.schema_dir.log_color_highlight()
        );

        let plan = Plan::build(&set)?;
        let files = RustEmitter::new(&set, &plan).emit_all()?;

        // The import graph of the emitted files must be acyclic; resource
        // packages only ever reach other domains through the shared types
        // package.
        routing::check_acyclic(&import_edges(&files))?;

        let mut staged = StagedOutput::new(&self.output_root)?;
        for file in &files {
            staged.stage_file(&file.path, &file.content)?;
        }
        let published = staged
            .publish()
            .context("Failed to publish generated sources")?;

        info!(
            "generated {} files under {}",
            published.len(),
            self.output_root.log_color_highlight()
        );
        for (path, _) in &published {
            info!("  -> {}", path.log_color_highlight());
        }

        Ok(files)
    }
}

fn import_edges(files: &[GeneratedFile]) -> BTreeMap<String, IndexSet<String>> {
    let mut edges: BTreeMap<String, IndexSet<String>> = BTreeMap::new();
    for file in files {
        let entry = edges.entry(file.package.clone()).or_default();
        for import in &file.imports {
            if *import != file.package {
                entry.insert(import.clone());
            }
        }
    }
    edges
}
