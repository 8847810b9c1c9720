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
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Type of a single schema field.
///
/// A closed tagged union: the `kind` discriminant selects the payload. `Struct`
/// is the opaque dynamic-value container (wire-level `google.protobuf.Struct`),
/// as opposed to `Message`, which names a concretely typed shared type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeSpec {
    String,
    Int32,
    Int64,
    Bool,
    Float,
    Double,
    Bytes,
    #[serde(rename_all = "camelCase")]
    Map {
        key_type: Box<TypeSpec>,
        value_type: Box<TypeSpec>,
    },
    #[serde(rename_all = "camelCase")]
    Array { element_type: Box<TypeSpec> },
    #[serde(rename_all = "camelCase")]
    Message {
        message_type: String,
        owning_proto_file: String,
    },
    Struct,
}

impl TypeSpec {
    pub fn is_message(&self) -> bool {
        matches!(self, TypeSpec::Message { .. })
    }

    /// The message reference carried by this spec, looking through arrays and
    /// map values.
    pub fn message_reference(&self) -> Option<(&str, &str)> {
        match self {
            TypeSpec::Message {
                message_type,
                owning_proto_file,
            } => Some((message_type, owning_proto_file)),
            TypeSpec::Array { element_type } => element_type.message_reference(),
            TypeSpec::Map { value_type, .. } => value_type.message_reference(),
            _ => None,
        }
    }
}

/// Validation rules attached to a field. Only the `required` flag and a string
/// enum list are extracted; richer constraints are not part of the IR.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,
    pub json_name: String,
    pub proto_field_name: String,
    #[serde(rename = "type")]
    pub typ: TypeSpec,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_expression: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

/// One extracted proto message: a workflow task config, an SDK resource spec,
/// or a shared type; all three share this shape. Task configs carry a `kind`
/// discriminant; shared types are distinguished by their placement under a
/// `types/` directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub proto_type: String,
    pub proto_file: String,
    pub fields: Vec<FieldSchema>,
}

impl Schema {
    /// The schema name with the generation-root suffix stripped
    /// (`AgentSpec` -> `Agent`, `HttpCallTaskConfig` -> `HttpCall`).
    pub fn base_name(&self) -> &str {
        for suffix in ["TaskConfig", "Config", "Spec"] {
            if let Some(stripped) = self.name.strip_suffix(suffix) {
                if !stripped.is_empty() {
                    return stripped;
                }
            }
        }
        &self.name
    }
}

/// All loaded schemas, partitioned and deduplicated by `protoType`.
///
/// Iteration order is the (sorted) load order, so downstream emission is
/// deterministic regardless of filesystem quirks.
#[derive(Debug, Default)]
pub struct SchemaSet {
    pub configs: IndexMap<String, Schema>,
    pub resource_specs: IndexMap<String, Schema>,
    pub shared_types: IndexMap<String, Schema>,
    sources: IndexMap<String, PathBuf>,
}

impl SchemaSet {
    /// Loads every schema JSON file under `schema_dir`, including nested
    /// domain subdirectories. Files under a `types/` directory are shared
    /// types; other files carrying a `kind` are task configs; the rest are
    /// resource specs.
    ///
    /// All shared types are registered before any reference resolution
    /// happens, so roots never observe a partially loaded set.
    pub fn load(schema_dir: &Path) -> Result<Self, CodegenError> {
        let mut set = SchemaSet::default();

        let mut files: Vec<PathBuf> = WalkDir::new(schema_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "json")
            })
            .map(|entry| entry.into_path())
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CodegenError::schema(
                schema_dir,
                "no schema files found".to_string(),
            ));
        }

        for file in files {
            let schema = load_schema_file(&file)?;
            let shared = file
                .strip_prefix(schema_dir)
                .unwrap_or(&file)
                .components()
                .any(|c| c.as_os_str() == "types");

            set.insert(schema, shared, &file)?;
        }

        set.resolve_references()?;
        Ok(set)
    }

    fn insert(&mut self, schema: Schema, shared: bool, file: &Path) -> Result<(), CodegenError> {
        let proto_type = schema.proto_type.clone();
        if shared {
            // The same shared type may be discovered by several extraction
            // runs; the first loaded copy wins.
            self.shared_types.entry(proto_type.clone()).or_insert(schema);
        } else if schema.kind.is_some() {
            if self.configs.insert(proto_type.clone(), schema).is_some() {
                return Err(CodegenError::schema(
                    file,
                    format!("duplicate task config schema for {proto_type}"),
                ));
            }
        } else if self
            .resource_specs
            .insert(proto_type.clone(), schema)
            .is_some()
        {
            return Err(CodegenError::schema(
                file,
                format!("duplicate resource spec schema for {proto_type}"),
            ));
        }
        self.sources.entry(proto_type).or_insert(file.to_path_buf());
        Ok(())
    }

    /// The schema file a proto type was loaded from, for error reporting.
    pub fn source_of(&self, proto_type: &str) -> PathBuf {
        self.sources
            .get(proto_type)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(proto_type))
    }

    pub fn roots(&self) -> impl Iterator<Item = &Schema> {
        self.configs.values().chain(self.resource_specs.values())
    }

    /// Resolves a message reference (simple name plus owning proto file) to a
    /// registered shared type.
    pub fn shared_type(&self, message_type: &str, owning_proto_file: &str) -> Option<&Schema> {
        self.shared_types
            .values()
            .find(|t| t.name == message_type && t.proto_file == owning_proto_file)
            .or_else(|| {
                // Fall back to a unique match by name for hand-maintained
                // schema sets that do not repeat the file path.
                let mut by_name = self.shared_types.values().filter(|t| t.name == message_type);
                match (by_name.next(), by_name.next()) {
                    (Some(only), None) => Some(only),
                    _ => None,
                }
            })
    }

    /// Every message-typed field (including array elements and map values)
    /// must resolve to a registered shared type.
    fn resolve_references(&self) -> Result<(), CodegenError> {
        let all = self
            .roots()
            .chain(self.shared_types.values())
            .map(|schema| (schema.proto_type.clone(), schema));

        for (proto_type, schema) in all {
            for field in &schema.fields {
                if let Some((message_type, owning_proto_file)) = field.typ.message_reference() {
                    if self.shared_type(message_type, owning_proto_file).is_none() {
                        return Err(CodegenError::schema_field(
                            &self.source_of(&proto_type),
                            &field.name,
                            format!(
                                "unresolvable type reference {message_type} (from {owning_proto_file})"
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn load_schema_file(file: &Path) -> Result<Schema, CodegenError> {
    let content = std::fs::read_to_string(file)
        .map_err(|err| CodegenError::io(file, format!("failed to read schema file ({err})")))?;

    let schema: Schema = serde_json::from_str(&content)
        .map_err(|err| CodegenError::schema(file, err.to_string()))?;

    validate_schema(&schema, file)?;
    Ok(schema)
}

fn validate_schema(schema: &Schema, file: &Path) -> Result<(), CodegenError> {
    if schema.name.is_empty() {
        return Err(CodegenError::schema(file, "missing schema name"));
    }
    if schema.proto_type.is_empty() || !schema.proto_type.contains('.') {
        return Err(CodegenError::schema(
            file,
            format!("protoType of {} must be fully qualified", schema.name),
        ));
    }
    for field in &schema.fields {
        if field.name.is_empty() || field.json_name.is_empty() {
            return Err(CodegenError::schema_field(
                file,
                field.proto_field_name.clone(),
                "field is missing name or jsonName",
            ));
        }
    }
    Ok(())
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;

    #[test]
    fn type_spec_round_trips_through_tagged_json() {
        let spec = TypeSpec::Map {
            key_type: Box::new(TypeSpec::String),
            value_type: Box::new(TypeSpec::Array {
                element_type: Box::new(TypeSpec::Message {
                    message_type: "SkillReference".to_string(),
                    owning_proto_file: "apis/golem/agentic/agent/v1/spec.proto".to_string(),
                }),
            }),
        };

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "map");
        assert_eq!(json["keyType"]["kind"], "string");
        assert_eq!(json["valueType"]["elementType"]["kind"], "message");
        assert_eq!(
            json["valueType"]["elementType"]["messageType"],
            "SkillReference"
        );

        let back: TypeSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn base_name_strips_generation_suffixes() {
        let mut schema = Schema {
            name: "HttpCallTaskConfig".to_string(),
            kind: Some("HTTP_CALL".to_string()),
            description: String::new(),
            proto_type: "golem.agentic.workflow.v1.tasks.HttpCallTaskConfig".to_string(),
            proto_file: "apis/golem/agentic/workflow/v1/tasks/http_call.proto".to_string(),
            fields: vec![],
        };
        assert_eq!(schema.base_name(), "HttpCall");

        schema.name = "AgentSpec".to_string();
        assert_eq!(schema.base_name(), "Agent");

        schema.name = "Spec".to_string();
        assert_eq!(schema.base_name(), "Spec");
    }
}
