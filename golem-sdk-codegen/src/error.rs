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

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error taxonomy of the code generation pipeline.
///
/// Every variant identifies the implicated input file (and field, where one
/// exists) so that failures point at the proto or schema to fix, never at
/// generator internals. All failures are fatal; nothing is retried and no
/// partial output is published.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// Malformed or unresolvable proto input. Extraction aborts without
    /// publishing any schema file.
    #[error("failed to parse proto input in {file}: {message}")]
    Parse { file: String, message: String },

    /// Structurally invalid schema JSON, or a schema whose type references
    /// cannot be resolved. Generation aborts before any file is written.
    #[error("invalid schema {}{}: {message}", file.display(), field_suffix(field))]
    SchemaValidation {
        file: PathBuf,
        field: Option<String>,
        message: String,
    },

    /// An identifier collision that remains ambiguous after deterministic
    /// prefixing. Requires schema-author intervention.
    #[error("naming collision in {scope}: {message}")]
    NamingCollision { scope: String, message: String },

    /// Filesystem failure, surfaced with the offending path.
    #[error("{message}: {}", path.display())]
    Io { path: PathBuf, message: String },
}

impl CodegenError {
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn schema(file: &Path, message: impl Into<String>) -> Self {
        Self::SchemaValidation {
            file: file.to_path_buf(),
            field: None,
            message: message.into(),
        }
    }

    pub fn schema_field(file: &Path, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaValidation {
            file: file.to_path_buf(),
            field: Some(field.into()),
            message: message.into(),
        }
    }

    pub fn naming(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NamingCollision {
            scope: scope.into(),
            message: message.into(),
        }
    }

    pub fn io(path: &Path, message: impl Into<String>) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(field) => format!(" (field {field})"),
        None => String::new(),
    }
}
