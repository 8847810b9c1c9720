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

pub mod loader;
pub mod session;

use crate::codegen::routing;
use crate::error::CodegenError;
use crate::fs::StagedOutput;
use crate::log::LogColorize;
use crate::model::Schema;
use crate::ExtractArgs;
use anyhow::Context;
use indexmap::IndexMap;
use loader::ProtoSource;
use log::info;
use session::ExtractionSession;
use std::path::{Path, PathBuf};

/// Extracts JSON schemas from the proto sources described by `args`.
///
/// Roots land directly in the schema output dir, shared types under its
/// `types/` subdirectory. Output is staged and published all-or-nothing: a
/// failing extraction leaves a previously published schema tree untouched.
pub fn extract(args: &ExtractArgs) -> anyhow::Result<()> {
    let source = ProtoSource::load(
        &args.proto_dir,
        &args.include_dir,
        args.stub_dir.as_deref(),
    )?;
    let session = ExtractionSession::run(&source, &args.message_suffix)?;

    if session.roots().is_empty() {
        return Err(CodegenError::parse(
            args.proto_dir.display().to_string(),
            format!(
                "no message with the {} suffix found",
                args.message_suffix.log_color_highlight()
            ),
        )
        .into());
    }

    let mut staged = StagedOutput::new(&args.schema_out_dir)?;

    for (file, schema) in root_schema_files(session.roots(), &args.message_suffix)? {
        staged.stage_file(&file, &schema_json(schema)?)?;
    }
    for (file, schema) in shared_type_files(session.shared_types())? {
        staged.stage_file(&file, &schema_json(schema)?)?;
    }

    let published = staged
        .publish()
        .context("Failed to publish extracted schemas")?;

    info!(
        "extracted {} root schemas and {} shared types to {}",
        session.roots().len(),
        session.shared_types().len(),
        args.schema_out_dir.log_color_highlight()
    );
    for (path, _) in published {
        info!("  -> {}", path.log_color_highlight());
    }

    Ok(())
}

/// Output file per root schema: the lowercased message name with the root
/// suffix stripped. Two roots claiming the same file is an author-level
/// collision and aborts the run.
fn root_schema_files<'a>(
    roots: &'a IndexMap<String, Schema>,
    message_suffix: &str,
) -> Result<Vec<(PathBuf, &'a Schema)>, CodegenError> {
    let mut claimed: IndexMap<PathBuf, &str> = IndexMap::new();
    let mut files = Vec::with_capacity(roots.len());

    for (proto_type, schema) in roots {
        let base = schema
            .name
            .strip_suffix(message_suffix)
            .filter(|base| !base.is_empty())
            .unwrap_or(&schema.name);
        let file = PathBuf::from(format!("{}.json", base.to_lowercase()));

        if let Some(previous) = claimed.insert(file.clone(), proto_type.as_str()) {
            return Err(CodegenError::naming(
                file.display().to_string(),
                format!("both {previous} and {proto_type} map to the same schema file"),
            ));
        }
        files.push((file, schema));
    }

    Ok(files)
}

/// Output file per shared type under `types/`: the lowercased type name.
/// Distinct proto types sharing a simple name are disambiguated with their
/// subdomain (or domain) so no schema is silently overwritten.
fn shared_type_files(
    shared_types: &IndexMap<String, Schema>,
) -> Result<Vec<(PathBuf, &Schema)>, CodegenError> {
    let mut count_by_name: IndexMap<String, usize> = IndexMap::new();
    for schema in shared_types.values() {
        *count_by_name.entry(schema.name.to_lowercase()).or_default() += 1;
    }

    let mut claimed: IndexMap<PathBuf, &str> = IndexMap::new();
    let mut files = Vec::with_capacity(shared_types.len());

    for (proto_type, schema) in shared_types {
        let base = schema.name.to_lowercase();
        let file_name = if count_by_name[&base] == 1 {
            format!("{base}.json")
        } else {
            let domain = routing::domain_of(&schema.proto_type).unwrap_or_default();
            let qualifier = routing::subdomain_of(&schema.proto_file, domain)
                .unwrap_or_else(|| domain.to_string());
            format!("{qualifier}_{base}.json")
        };
        let file = Path::new("types").join(file_name);

        if let Some(previous) = claimed.insert(file.clone(), proto_type.as_str()) {
            return Err(CodegenError::naming(
                file.display().to_string(),
                format!("both {previous} and {proto_type} map to the same schema file"),
            ));
        }
        files.push((file, schema));
    }

    Ok(files)
}

fn schema_json(schema: &Schema) -> Result<String, CodegenError> {
    let json = serde_json::to_string_pretty(schema).map_err(|err| {
        CodegenError::schema(Path::new(&schema.proto_file), err.to_string())
    })?;
    Ok(format!("{json}\n"))
}
