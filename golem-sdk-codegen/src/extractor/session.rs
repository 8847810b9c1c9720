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
use crate::extractor::loader::ProtoSource;
use crate::model::schema::Validation;
use crate::model::{FieldSchema, Schema, TypeSpec};
use heck::{ToShoutySnakeCase, ToUpperCamelCase};
use indexmap::{IndexMap, IndexSet};
use log::debug;
use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor};

const STRUCT_WELL_KNOWN_TYPE: &str = "google.protobuf.Struct";
const WELL_KNOWN_PREFIX: &str = "google.protobuf";

/// One extraction run over a compiled proto source.
///
/// Roots are the top-level messages whose name ends with the configured
/// suffix; every message type referenced from a root (directly, through an
/// array element or through a map value) is captured exactly once as a shared
/// type. The visited set is owned by the session, keeping extraction
/// reentrant and terminating on proto-level reference cycles.
pub struct ExtractionSession<'a> {
    source: &'a ProtoSource,
    message_suffix: &'a str,
    roots: IndexMap<String, Schema>,
    shared_types: IndexMap<String, Schema>,
    visited: IndexSet<String>,
}

impl<'a> ExtractionSession<'a> {
    pub fn run(
        source: &'a ProtoSource,
        message_suffix: &'a str,
    ) -> Result<ExtractionSession<'a>, CodegenError> {
        let mut session = ExtractionSession {
            source,
            message_suffix,
            roots: IndexMap::new(),
            shared_types: IndexMap::new(),
            visited: IndexSet::new(),
        };

        for file in source.target_files() {
            for message in file.messages() {
                if message.name().ends_with(message_suffix) {
                    debug!("extracting root message {}", message.full_name());
                    let schema = session.message_schema(&message, true)?;
                    session.roots.insert(message.full_name().to_string(), schema);
                }
            }
        }

        Ok(session)
    }

    pub fn roots(&self) -> &IndexMap<String, Schema> {
        &self.roots
    }

    pub fn shared_types(&self) -> &IndexMap<String, Schema> {
        &self.shared_types
    }

    fn message_schema(
        &mut self,
        message: &MessageDescriptor,
        is_root: bool,
    ) -> Result<Schema, CodegenError> {
        let kind = (is_root && self.message_suffix == "TaskConfig")
            .then(|| task_kind(message.name(), self.message_suffix));

        let mut fields = Vec::new();
        // The raw descriptor lists fields in declaration order, which the
        // schema must mirror.
        for field_proto in &message.descriptor_proto().field {
            let name = field_proto.name.as_deref().unwrap_or_default();
            let field = message.get_field_by_name(name).ok_or_else(|| {
                CodegenError::parse(
                    message.parent_file().name().to_string(),
                    format!("field {name} not found in {}", message.full_name()),
                )
            })?;
            fields.push(self.field_schema(message, &field)?);
        }

        Ok(Schema {
            name: message.name().to_string(),
            kind,
            description: self
                .source
                .leading_comment(message.full_name())
                .to_string(),
            proto_type: message.full_name().to_string(),
            proto_file: message.parent_file().name().to_string(),
            fields,
        })
    }

    fn field_schema(
        &mut self,
        message: &MessageDescriptor,
        field: &FieldDescriptor,
    ) -> Result<FieldSchema, CodegenError> {
        let typ = self.type_spec(field)?;
        let options = field_options(self.source, field);

        let description = self
            .source
            .leading_comment(&format!("{}.{}", message.full_name(), field.name()))
            .to_string();

        let validation = options.validation();

        Ok(FieldSchema {
            name: field.name().to_upper_camel_case(),
            json_name: field.json_name().to_string(),
            proto_field_name: field.name().to_string(),
            typ,
            description,
            required: options.required,
            is_expression: options.is_expression,
            validation,
        })
    }

    fn type_spec(&mut self, field: &FieldDescriptor) -> Result<TypeSpec, CodegenError> {
        // Maps are also "repeated" at the descriptor level, so they are
        // handled first.
        if field.is_map() {
            let Kind::Message(entry) = field.kind() else {
                return Err(CodegenError::parse(
                    field.parent_message().parent_file().name().to_string(),
                    format!("map field {} has no entry message", field.name()),
                ));
            };
            let key = entry.map_entry_key_field();
            let value = entry.map_entry_value_field();
            return Ok(TypeSpec::Map {
                key_type: Box::new(self.scalar_spec(&key)?),
                value_type: Box::new(self.scalar_spec(&value)?),
            });
        }

        if field.is_list() {
            return Ok(TypeSpec::Array {
                element_type: Box::new(self.scalar_spec(field)?),
            });
        }

        self.scalar_spec(field)
    }

    fn scalar_spec(&mut self, field: &FieldDescriptor) -> Result<TypeSpec, CodegenError> {
        let spec = match field.kind() {
            Kind::String => TypeSpec::String,
            Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => TypeSpec::Int32,
            Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => TypeSpec::Int64,
            // Unsigned widths widen to int64 so that values survive.
            Kind::Uint32 | Kind::Fixed32 | Kind::Uint64 | Kind::Fixed64 => TypeSpec::Int64,
            Kind::Bool => TypeSpec::Bool,
            Kind::Float => TypeSpec::Float,
            Kind::Double => TypeSpec::Double,
            Kind::Bytes => TypeSpec::Bytes,
            // Enums are carried as their string names.
            Kind::Enum(_) => TypeSpec::String,
            Kind::Message(message) => {
                if message.full_name() == STRUCT_WELL_KNOWN_TYPE {
                    TypeSpec::Struct
                } else {
                    self.register_shared_type(&message)?;
                    TypeSpec::Message {
                        message_type: message.name().to_string(),
                        owning_proto_file: message.parent_file().name().to_string(),
                    }
                }
            }
        };
        Ok(spec)
    }

    /// Captures a referenced message type once, keyed by its fully qualified
    /// proto type, and recurses into its own fields. The visited entry is
    /// recorded before recursion, which bounds reference cycles.
    fn register_shared_type(&mut self, message: &MessageDescriptor) -> Result<(), CodegenError> {
        let proto_type = message.full_name().to_string();
        if proto_type.starts_with(WELL_KNOWN_PREFIX) || message.is_map_entry() {
            return Ok(());
        }
        if !self.visited.insert(proto_type.clone()) {
            return Ok(());
        }

        debug!("found shared type {proto_type}");
        let schema = self.message_schema(message, false)?;
        self.shared_types.insert(proto_type, schema);
        Ok(())
    }
}

/// Task kind discriminant derived from the message name:
/// `SetTaskConfig` -> `SET`, `HttpCallTaskConfig` -> `HTTP_CALL`.
fn task_kind(message_name: &str, suffix: &str) -> String {
    message_name
        .strip_suffix(suffix)
        .unwrap_or(message_name)
        .to_shouty_snake_case()
}

#[derive(Debug, Default)]
struct FieldOptions {
    required: bool,
    is_expression: bool,
    enum_values: Vec<String>,
}

impl FieldOptions {
    fn validation(&self) -> Option<Validation> {
        (self.required || !self.enum_values.is_empty()).then(|| Validation {
            required: self.required,
            enum_values: self.enum_values.clone(),
        })
    }
}

/// Best-effort read of field option extensions.
///
/// Only a boolean `required` flag, a string `in` enum list and the
/// `is_expression` marker are understood, and only when the extension
/// descriptors themselves are resolvable (for third-party options this is
/// what the stub dir provides). Richer numeric and string constraints carried
/// in extension wire data are not decoded.
fn field_options(source: &ProtoSource, field: &FieldDescriptor) -> FieldOptions {
    let mut result = FieldOptions::default();
    let options = field.options();

    if let Some(ext) = source.validate_extension() {
        if options.has_extension(ext) {
            let rules = options.get_extension(ext);
            if let prost_reflect::Value::Message(rules) = rules.as_ref() {
                if let Some(required) = rules.get_field_by_name("required") {
                    result.required = required.as_bool().unwrap_or(false);
                }
                let string_rules = rules
                    .get_field_by_name("string")
                    .and_then(|rules| rules.as_message().cloned());
                if let Some(string_rules) = string_rules {
                    if let Some(list) = string_rules
                        .get_field_by_name("in")
                        .and_then(|list| list.as_list().map(<[prost_reflect::Value]>::to_vec))
                    {
                        result.enum_values = list
                            .iter()
                            .filter_map(|value| value.as_str().map(str::to_string))
                            .collect();
                    }
                }
            }
        }
    }

    if let Some(ext) = source.expression_extension() {
        if options.has_extension(ext) {
            result.is_expression = options.get_extension(ext).as_bool().unwrap_or(false);
        }
    }

    result
}
