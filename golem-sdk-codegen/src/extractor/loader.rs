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

use crate::error::CodegenError;
use indexmap::IndexSet;
use prost_reflect::prost_types::{DescriptorProto, FileDescriptorProto};
use prost_reflect::{DescriptorPool, ExtensionDescriptor, FileDescriptor};
use protox::Compiler;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Fully qualified name of the validation rules extension on field options.
const VALIDATE_FIELD_EXTENSION: &str = "buf.validate.field";
/// Simple name of the expression-capability marker on field options.
const IS_EXPRESSION_EXTENSION: &str = "is_expression";
const FIELD_OPTIONS_TYPE: &str = "google.protobuf.FieldOptions";

/// Compiled proto descriptors plus the side information the extractor needs:
/// which files are extraction targets (as opposed to transitively imported
/// dependencies and stubs) and the leading comments per message/field.
///
/// Unresolvable third-party imports (typically option-validation protos) are
/// satisfied by pointing `stub_dir` at minimal stand-in definitions; only
/// descriptor resolvability matters, the semantic content of a stub does not.
pub struct ProtoSource {
    pool: DescriptorPool,
    target_files: IndexSet<String>,
    comments: HashMap<String, String>,
    validate_extension: Option<ExtensionDescriptor>,
    expression_extension: Option<ExtensionDescriptor>,
}

impl ProtoSource {
    pub fn load(
        proto_dir: &Path,
        include_dirs: &[PathBuf],
        stub_dir: Option<&Path>,
    ) -> Result<Self, CodegenError> {
        let proto_files = find_proto_files(proto_dir)?;
        if proto_files.is_empty() {
            return Err(CodegenError::parse(
                proto_dir.display().to_string(),
                "no .proto files found",
            ));
        }

        // Stubs come first so that a caller-supplied stand-in wins over any
        // (possibly partial) copy reachable through the include dirs.
        let mut includes: Vec<PathBuf> = Vec::new();
        if let Some(stub_dir) = stub_dir {
            includes.push(stub_dir.to_path_buf());
        }
        includes.extend(include_dirs.iter().cloned());
        if !include_dirs.iter().any(|dir| proto_dir.starts_with(dir)) {
            includes.push(proto_dir.to_path_buf());
        }

        let target_files: IndexSet<String> = proto_files
            .iter()
            .map(|file| include_relative_name(file, &includes))
            .collect();

        let mut compiler = Compiler::new(&includes).map_err(|err| {
            CodegenError::parse(proto_dir.display().to_string(), err.to_string())
        })?;
        compiler.include_source_info(true);
        compiler.include_imports(true);
        // protox error messages carry the offending file and position.
        compiler.open_files(&proto_files).map_err(|err| {
            CodegenError::parse(proto_dir.display().to_string(), err.to_string())
        })?;

        // Going through the encoded form keeps custom options (extensions on
        // field options) readable from the pool.
        let encoded = compiler.encode_file_descriptor_set();
        let pool = DescriptorPool::decode(encoded.as_slice()).map_err(|err| {
            CodegenError::parse(proto_dir.display().to_string(), err.to_string())
        })?;

        let mut comments = HashMap::new();
        for file in pool.files() {
            index_comments(file.file_descriptor_proto(), &mut comments);
        }

        // Option extensions are resolved best-effort: when the (stubbed)
        // descriptors are present in the pool the flags become readable,
        // otherwise they are simply absent.
        let validate_extension = pool.get_extension_by_name(VALIDATE_FIELD_EXTENSION);
        let expression_extension = pool.all_extensions().find(|ext| {
            ext.name() == IS_EXPRESSION_EXTENSION
                && ext.containing_message().full_name() == FIELD_OPTIONS_TYPE
        });

        Ok(Self {
            pool,
            target_files,
            comments,
            validate_extension,
            expression_extension,
        })
    }

    /// The `buf.validate.field` rules extension, when resolvable.
    pub fn validate_extension(&self) -> Option<&ExtensionDescriptor> {
        self.validate_extension.as_ref()
    }

    /// The `is_expression` field option marker, when resolvable.
    pub fn expression_extension(&self) -> Option<&ExtensionDescriptor> {
        self.expression_extension.as_ref()
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// The compiled files that were discovered under the proto dir, in
    /// discovery order. Imported dependencies are not included; only target
    /// files are scanned for generation roots.
    pub fn target_files(&self) -> impl Iterator<Item = FileDescriptor> + '_ {
        self.pool
            .files()
            .filter(|file| self.target_files.contains(file.name()))
    }

    /// Leading comment of a message or field, by fully qualified name.
    pub fn leading_comment(&self, full_name: &str) -> &str {
        self.comments
            .get(full_name)
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn find_proto_files(dir: &Path) -> Result<Vec<PathBuf>, CodegenError> {
    if !dir.is_dir() {
        return Err(CodegenError::parse(
            dir.display().to_string(),
            "proto directory does not exist",
        ));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "proto")
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    Ok(files)
}

/// The include-relative name a file gets inside the descriptor pool.
fn include_relative_name(file: &Path, includes: &[PathBuf]) -> String {
    for include in includes {
        if let Ok(relative) = file.strip_prefix(include) {
            return path_to_proto_name(relative);
        }
    }
    path_to_proto_name(file)
}

fn path_to_proto_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Indexes leading comments from proto source info by fully qualified
/// message/field name. Descriptor paths follow the `SourceCodeInfo` encoding:
/// `[4, m]` is the m-th top-level message, `[4, m, 2, f]` its f-th field and
/// `[4, m, 3, n]` its n-th nested message.
fn index_comments(file: &FileDescriptorProto, comments: &mut HashMap<String, String>) {
    let Some(source_info) = file.source_code_info.as_ref() else {
        return;
    };

    let mut by_path: HashMap<&[i32], &str> = HashMap::new();
    for location in &source_info.location {
        if let Some(leading) = location.leading_comments.as_deref() {
            by_path.insert(location.path.as_slice(), leading);
        }
    }

    let package = file.package.clone().unwrap_or_default();
    for (index, message) in file.message_type.iter().enumerate() {
        index_message_comments(
            &package,
            message,
            vec![4, index as i32],
            &by_path,
            comments,
        );
    }
}

fn index_message_comments(
    prefix: &str,
    message: &DescriptorProto,
    path: Vec<i32>,
    by_path: &HashMap<&[i32], &str>,
    comments: &mut HashMap<String, String>,
) {
    let full_name = if prefix.is_empty() {
        message.name.clone().unwrap_or_default()
    } else {
        format!("{}.{}", prefix, message.name.as_deref().unwrap_or_default())
    };

    if let Some(comment) = by_path.get(path.as_slice()) {
        comments.insert(full_name.clone(), comment.trim().to_string());
    }

    for (index, field) in message.field.iter().enumerate() {
        let mut field_path = path.clone();
        field_path.extend([2, index as i32]);
        if let Some(comment) = by_path.get(field_path.as_slice()) {
            comments.insert(
                format!("{}.{}", full_name, field.name.as_deref().unwrap_or_default()),
                comment.trim().to_string(),
            );
        }
    }

    for (index, nested) in message.nested_type.iter().enumerate() {
        let mut nested_path = path.clone();
        nested_path.extend([3, index as i32]);
        index_message_comments(&full_name, nested, nested_path, by_path, comments);
    }
}
