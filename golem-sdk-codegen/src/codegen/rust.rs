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

use crate::codegen::naming;
use crate::codegen::routing::{self, Plan, HELPERS_PACKAGE, TYPES_PACKAGE};
use crate::error::CodegenError;
use crate::model::{FieldSchema, Schema, SchemaSet, TypeSpec};
use indexmap::IndexSet;
use itertools::Itertools;
use proc_macro2::{Ident, Span, TokenStream};
use quote::{format_ident, quote};
use std::path::{Path, PathBuf};

pub const GENERATED_HEADER: &str = "// Code generated by golem-sdk-codegen. DO NOT EDIT.";

/// One generated output file, together with the package-level import edges it
/// introduces (used for the static no-cycle check).
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
    pub package: String,
    pub imports: IndexSet<String>,
}

/// Emits the full generated source tree for a schema set.
pub struct RustEmitter<'a> {
    set: &'a SchemaSet,
    plan: &'a Plan,
}

/// Where the file being emitted lives, which decides how shared types are
/// referenced from it.
#[derive(Debug, Clone, PartialEq)]
enum Scope {
    /// A shared-types file; same-domain types are siblings, other domains are
    /// sibling modules of the `types` package.
    Types { domain: String },
    /// A resource or workflow package file; shared types are reached through
    /// the per-domain `types` package only.
    Package,
}

impl<'a> RustEmitter<'a> {
    pub fn new(set: &'a SchemaSet, plan: &'a Plan) -> Self {
        Self { set, plan }
    }

    pub fn emit_all(&self) -> Result<Vec<GeneratedFile>, CodegenError> {
        let mut files = Vec::new();

        for (proto_type, root_plan) in &self.plan.roots {
            let schema = self
                .set
                .configs
                .get(proto_type)
                .or_else(|| self.set.resource_specs.get(proto_type))
                .expect("planned root must be loaded");
            files.push(self.emit_root(schema, root_plan)?);
        }

        let domains = self.plan.domains();
        for domain in &domains {
            files.push(self.emit_types_file(domain)?);
        }

        files.push(emit_helpers());
        let mod_files = self.emit_mod_files(&files);
        files.extend(mod_files);

        Ok(files)
    }

    // ------------------------------------------------------------------
    // Root schemas (task configs and resource specs)
    // ------------------------------------------------------------------

    fn emit_root(
        &self,
        schema: &Schema,
        root_plan: &routing::RootPlan,
    ) -> Result<GeneratedFile, CodegenError> {
        let mut file = FileEmitter::new(self.set, self.plan, Scope::Package, schema);

        let struct_tokens = file.struct_def(schema, &root_plan.struct_name)?;
        let is_config = schema.kind.is_some();

        let conversions = if is_config {
            let kind_tokens = file.kind_impl(schema, &root_plan.struct_name);
            let to_wire = file.to_wire_method(schema)?;
            let from_wire = file.from_wire_method(schema, &root_plan.struct_name)?;
            let struct_ident = ident(&root_plan.struct_name);
            quote! {
                impl #struct_ident {
                    #kind_tokens
                    #to_wire
                    #from_wire
                }
            }
        } else {
            let to_proto = file.to_proto_method(schema)?;
            let from_proto = file.from_proto_method(schema)?;
            let struct_ident = ident(&root_plan.struct_name);
            quote! {
                impl #struct_ident {
                    #to_proto
                    #from_proto
                }
            }
        };

        let args = file.args_struct(schema, root_plan)?;

        let tokens = quote! {
            use super::super::helpers;

            #struct_tokens
            #conversions
            #args
        };

        let header = format!(
            "{GENERATED_HEADER}\n// Source: {} ({})\n\n",
            schema.proto_type, schema.proto_file
        );

        let mut imports = file.imports;
        imports.insert(HELPERS_PACKAGE.to_string());

        Ok(GeneratedFile {
            path: root_plan.file.clone(),
            content: render(&header, tokens, &root_plan.file)?,
            package: root_plan.package.clone(),
            imports,
        })
    }

    // ------------------------------------------------------------------
    // Shared types, one file per domain
    // ------------------------------------------------------------------

    fn emit_types_file(&self, domain: &str) -> Result<GeneratedFile, CodegenError> {
        let schemas: Vec<(&Schema, &routing::SharedPlan)> = self
            .plan
            .shared
            .iter()
            .filter(|(_, shared)| shared.domain == domain)
            .map(|(proto_type, shared)| {
                (
                    self.set
                        .shared_types
                        .get(proto_type)
                        .expect("planned shared type must be loaded"),
                    shared,
                )
            })
            .collect();

        let mut imports = IndexSet::new();
        imports.insert(HELPERS_PACKAGE.to_string());

        let mut items = Vec::new();
        for (schema, shared) in &schemas {
            let mut file = FileEmitter::new(
                self.set,
                self.plan,
                Scope::Types {
                    domain: domain.to_string(),
                },
                schema,
            );

            let struct_tokens = file.struct_def(schema, &shared.rust_name)?;
            let to_value = file.to_wire_method(schema)?;
            let from_value = file.from_wire_method(schema, &shared.rust_name)?;
            let to_proto = file.to_proto_method(schema)?;
            let from_proto = file.from_proto_method(schema)?;
            let struct_ident = ident(&shared.rust_name);

            items.push(quote! {
                #struct_tokens

                impl #struct_ident {
                    #to_value
                    #from_value
                    #to_proto
                    #from_proto
                }
            });
            imports.extend(file.imports);
        }

        let tokens = quote! {
            use super::super::helpers;

            #(#items)*
        };

        let path = Path::new(TYPES_PACKAGE).join(format!("{domain}.rs"));
        let header = format!(
            "{GENERATED_HEADER}\n// Shared types of the {domain} domain.\n\n"
        );

        Ok(GeneratedFile {
            path: path.clone(),
            content: render(&header, tokens, &path)?,
            package: TYPES_PACKAGE.to_string(),
            imports,
        })
    }

    // ------------------------------------------------------------------
    // Module files
    // ------------------------------------------------------------------

    fn emit_mod_files(&self, files: &[GeneratedFile]) -> Vec<GeneratedFile> {
        let mut mod_files = Vec::new();

        // One mod.rs per package directory, listing its generated modules.
        let mut by_dir: Vec<(PathBuf, Vec<String>)> = files
            .iter()
            .filter_map(|file| {
                let dir = file.path.parent()?.to_path_buf();
                let stem = file.path.file_stem()?.to_string_lossy().to_string();
                Some((dir, stem))
            })
            .into_group_map()
            .into_iter()
            .collect();
        by_dir.sort();

        for (dir, stems) in by_dir {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let package = dir.to_string_lossy().to_string();
            mod_files.push(GeneratedFile {
                path: dir.join("mod.rs"),
                content: mod_file_content(stems),
                package,
                imports: IndexSet::new(),
            });
        }

        // The root module ties packages, shared types and helpers together.
        let mut root_modules: Vec<String> = self.plan.packages();
        root_modules.push(HELPERS_PACKAGE.to_string());
        if !self.plan.shared.is_empty() {
            root_modules.push(TYPES_PACKAGE.to_string());
        }
        mod_files.push(GeneratedFile {
            path: PathBuf::from("mod.rs"),
            content: mod_file_content(root_modules),
            package: String::new(),
            imports: IndexSet::new(),
        });

        mod_files
    }
}

fn mod_file_content(modules: Vec<String>) -> String {
    let lines = modules
        .into_iter()
        .unique()
        .sorted()
        .map(|module| format!("pub mod {module};"))
        .join("\n");
    format!("{GENERATED_HEADER}\n\n{lines}\n")
}

// ----------------------------------------------------------------------
// Per-file emission
// ----------------------------------------------------------------------

struct FileEmitter<'a> {
    set: &'a SchemaSet,
    plan: &'a Plan,
    scope: Scope,
    schema_file: PathBuf,
    imports: IndexSet<String>,
}

impl<'a> FileEmitter<'a> {
    fn new(set: &'a SchemaSet, plan: &'a Plan, scope: Scope, schema: &Schema) -> Self {
        Self {
            set,
            plan,
            scope,
            schema_file: set.source_of(&schema.proto_type),
            imports: IndexSet::new(),
        }
    }

    // -- struct definition ---------------------------------------------

    fn struct_def(&mut self, schema: &Schema, struct_name: &str) -> Result<TokenStream, CodegenError> {
        let struct_ident = ident(struct_name);
        let doc = doc_attr(&schema.description);

        let mut fields = Vec::new();
        for field in &schema.fields {
            let field_ident = naming::field_ident(&field.name);
            let field_type = self.field_type(field)?;
            let field_doc = doc_attr(&field.description);
            let json_name = &field.json_name;
            let serde_extra = if field.typ.is_message() {
                quote! { #[serde(skip_serializing_if = "Option::is_none")] }
            } else {
                quote! {}
            };
            fields.push(quote! {
                #field_doc
                #[serde(rename = #json_name, default)]
                #serde_extra
                pub #field_ident: #field_type
            });
        }

        Ok(quote! {
            #doc
            #[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
            pub struct #struct_ident {
                #(#fields,)*
            }
        })
    }

    /// Storage type of a field in the generated struct.
    fn field_type(&mut self, field: &FieldSchema) -> Result<TokenStream, CodegenError> {
        match &field.typ {
            TypeSpec::Message { .. } => {
                let path = self.message_path(field)?;
                Ok(quote! { Option<Box<#path>> })
            }
            TypeSpec::Map {
                key_type,
                value_type,
            } if field.is_expression && matches!(value_type.as_ref(), TypeSpec::String) => {
                // Expression-capable maps hold dynamic values until wire
                // conversion.
                let key = self.rust_type(key_type, field)?;
                Ok(quote! { std::collections::HashMap<#key, serde_json::Value> })
            }
            other => self.rust_type(other, field),
        }
    }

    fn rust_type(&mut self, spec: &TypeSpec, field: &FieldSchema) -> Result<TokenStream, CodegenError> {
        let tokens = match spec {
            TypeSpec::String => quote! { String },
            TypeSpec::Int32 => quote! { i32 },
            TypeSpec::Int64 => quote! { i64 },
            TypeSpec::Bool => quote! { bool },
            TypeSpec::Float => quote! { f32 },
            TypeSpec::Double => quote! { f64 },
            TypeSpec::Bytes => quote! { Vec<u8> },
            TypeSpec::Struct => quote! { serde_json::Map<String, serde_json::Value> },
            TypeSpec::Array { element_type } => {
                let element = self.rust_type(element_type, field)?;
                quote! { Vec<#element> }
            }
            TypeSpec::Map {
                key_type,
                value_type,
            } => {
                let key = self.rust_type(key_type, field)?;
                let value = self.rust_type(value_type, field)?;
                quote! { std::collections::HashMap<#key, #value> }
            }
            TypeSpec::Message { .. } => self.message_path_of(spec, field)?,
        };
        Ok(tokens)
    }

    /// Reference to the generated shared type behind a message spec, valid in
    /// the current scope.
    fn message_path(&mut self, field: &FieldSchema) -> Result<TokenStream, CodegenError> {
        self.message_path_of(&field.typ, field)
    }

    fn message_path_of(
        &mut self,
        spec: &TypeSpec,
        field: &FieldSchema,
    ) -> Result<TokenStream, CodegenError> {
        let Some((message_type, owning_proto_file)) = spec.message_reference() else {
            return Err(CodegenError::schema_field(
                &self.schema_file,
                &field.name,
                "expected a message type",
            ));
        };

        let shared = self
            .set
            .shared_type(message_type, owning_proto_file)
            .ok_or_else(|| {
                CodegenError::schema_field(
                    &self.schema_file,
                    &field.name,
                    format!("unresolvable type reference {message_type}"),
                )
            })?;
        let shared_plan = self.plan.shared.get(&shared.proto_type).ok_or_else(|| {
            CodegenError::schema_field(
                &self.schema_file,
                &field.name,
                format!("shared type {message_type} was not planned"),
            )
        })?;

        let type_ident = ident(&shared_plan.rust_name);
        let domain_ident = ident(&shared_plan.domain);
        let tokens = match &self.scope {
            Scope::Types { domain } if *domain == shared_plan.domain => quote! { #type_ident },
            Scope::Types { .. } => quote! { super::#domain_ident::#type_ident },
            Scope::Package => {
                self.imports.insert(TYPES_PACKAGE.to_string());
                quote! { super::super::types::#domain_ident::#type_ident }
            }
        };
        Ok(tokens)
    }

    // -- task kind ------------------------------------------------------

    fn kind_impl(&self, schema: &Schema, struct_name: &str) -> TokenStream {
        let kind = schema.kind.clone().unwrap_or_default();
        let doc = format!(" Task kind discriminant of {struct_name}.");
        quote! {
            #[doc = #doc]
            pub const KIND: &'static str = #kind;

            pub fn kind(&self) -> &'static str {
                Self::KIND
            }
        }
    }

    // -- opaque struct wire conversions --------------------------------

    fn to_wire_method(&mut self, schema: &Schema) -> Result<TokenStream, CodegenError> {
        let mut statements = Vec::new();
        for field in &schema.fields {
            statements.push(self.to_wire_field(field)?);
        }

        let (method, doc) = match self.scope {
            Scope::Package => (
                format_ident!("to_wire"),
                " Encodes this configuration as an opaque wire-level struct payload.",
            ),
            Scope::Types { .. } => (
                format_ident!("to_value"),
                " Encodes this type as a wire-level struct payload.",
            ),
        };

        Ok(quote! {
            #[doc = #doc]
            pub fn #method(&self) -> prost_types::Struct {
                let mut fields = std::collections::BTreeMap::new();
                #(#statements)*
                prost_types::Struct { fields }
            }
        })
    }

    fn to_wire_field(&mut self, field: &FieldSchema) -> Result<TokenStream, CodegenError> {
        let field_ident = naming::field_ident(&field.name);
        let json_name = &field.json_name;

        if field.typ.is_message() {
            // Message fields are optional boxes; encode only when present.
            return Ok(quote! {
                if let Some(value) = &self.#field_ident {
                    fields.insert(#json_name.to_string(), helpers::struct_value(value.to_value()));
                }
            });
        }

        let value_expr = self.value_expr(field, &field.typ, quote! { self.#field_ident }, false)?;
        if field.required {
            Ok(quote! {
                fields.insert(#json_name.to_string(), #value_expr);
            })
        } else {
            let present = presence_check(&field.typ, quote! { self.#field_ident });
            Ok(quote! {
                if #present {
                    fields.insert(#json_name.to_string(), #value_expr);
                }
            })
        }
    }

    /// Expression producing a `prost_types::Value` for `access`. `is_ref`
    /// marks accesses that are references produced by iteration.
    fn value_expr(
        &mut self,
        field: &FieldSchema,
        spec: &TypeSpec,
        access: TokenStream,
        is_ref: bool,
    ) -> Result<TokenStream, CodegenError> {
        let tokens = match spec {
            TypeSpec::String => quote! { helpers::string_value(#access.clone()) },
            TypeSpec::Int32 | TypeSpec::Int64 | TypeSpec::Float | TypeSpec::Double => {
                let value = deref(access, is_ref);
                quote! { helpers::number_value(#value as f64) }
            }
            TypeSpec::Bool => {
                let value = deref(access, is_ref);
                quote! { helpers::bool_value(#value) }
            }
            TypeSpec::Bytes => quote! { helpers::string_value(helpers::encode_bytes(&#access)) },
            TypeSpec::Struct => {
                quote! { helpers::struct_value(helpers::json_map_to_struct(&#access)) }
            }
            TypeSpec::Message { .. } => quote! { helpers::struct_value(#access.to_value()) },
            TypeSpec::Array { element_type } => {
                let item_expr = self.value_expr(field, element_type, quote! { item }, true)?;
                quote! {
                    helpers::list_value(#access.iter().map(|item| #item_expr).collect())
                }
            }
            TypeSpec::Map {
                key_type,
                value_type,
            } => {
                let key_expr = map_key_to_string(key_type);
                let entry_expr = if field.is_expression
                    && matches!(value_type.as_ref(), TypeSpec::String)
                {
                    quote! { helpers::json_to_value(value) }
                } else {
                    self.value_expr(field, value_type, quote! { value }, true)?
                };
                quote! {
                    helpers::struct_value(prost_types::Struct {
                        fields: #access
                            .iter()
                            .map(|(key, value)| (#key_expr, #entry_expr))
                            .collect(),
                    })
                }
            }
        };
        Ok(tokens)
    }

    fn from_wire_method(
        &mut self,
        schema: &Schema,
        struct_name: &str,
    ) -> Result<TokenStream, CodegenError> {
        let mut statements = Vec::new();
        for field in &schema.fields {
            statements.push(self.from_wire_field(struct_name, field)?);
        }

        let (method, doc) = match self.scope {
            Scope::Package => (
                format_ident!("from_wire"),
                " Decodes a configuration from its opaque wire-level struct payload.",
            ),
            Scope::Types { .. } => (
                format_ident!("from_value"),
                " Decodes this type from a wire-level struct payload.",
            ),
        };

        Ok(quote! {
            #[doc = #doc]
            pub fn #method(wire: &prost_types::Struct) -> Result<Self, helpers::WireError> {
                let mut result = Self::default();
                #(#statements)*
                Ok(result)
            }
        })
    }

    fn from_wire_field(
        &mut self,
        struct_name: &str,
        field: &FieldSchema,
    ) -> Result<TokenStream, CodegenError> {
        let field_ident = naming::field_ident(&field.name);
        let json_name = &field.json_name;
        let read_expr = self.read_expr(field, &field.typ, quote! { value })?;

        if field.required {
            Ok(quote! {
                match wire.fields.get(#json_name) {
                    Some(value) => {
                        result.#field_ident = #read_expr;
                    }
                    None => {
                        return Err(helpers::WireError::missing(#struct_name, #json_name));
                    }
                }
            })
        } else {
            Ok(quote! {
                if let Some(value) = wire.fields.get(#json_name) {
                    result.#field_ident = #read_expr;
                }
            })
        }
    }

    /// Expression decoding `access` (a `&prost_types::Value`) into the field's
    /// storage type. May contain `?`, so it is only valid inside the
    /// generated `from_wire`/`from_value` bodies.
    fn read_expr(
        &mut self,
        field: &FieldSchema,
        spec: &TypeSpec,
        access: TokenStream,
    ) -> Result<TokenStream, CodegenError> {
        let tokens = match spec {
            TypeSpec::String => quote! { helpers::as_string(#access).unwrap_or_default() },
            TypeSpec::Int32 => {
                quote! { helpers::as_number(#access).unwrap_or_default() as i32 }
            }
            TypeSpec::Int64 => {
                quote! { helpers::as_number(#access).unwrap_or_default() as i64 }
            }
            TypeSpec::Float => {
                quote! { helpers::as_number(#access).unwrap_or_default() as f32 }
            }
            TypeSpec::Double => quote! { helpers::as_number(#access).unwrap_or_default() },
            TypeSpec::Bool => quote! { helpers::as_bool(#access).unwrap_or_default() },
            TypeSpec::Bytes => {
                quote! { helpers::decode_bytes(&helpers::as_string(#access).unwrap_or_default()) }
            }
            TypeSpec::Struct => {
                quote! { helpers::as_struct(#access).map(helpers::struct_to_json_map).unwrap_or_default() }
            }
            TypeSpec::Message { .. } => {
                let path = self.message_path_of(spec, field)?;
                quote! {
                    match helpers::as_struct(#access) {
                        Some(nested) => Some(Box::new(#path::from_value(nested)?)),
                        None => None,
                    }
                }
            }
            TypeSpec::Array { element_type } => {
                let push = match element_type.as_ref() {
                    TypeSpec::Message { .. } => {
                        let path = self.message_path_of(element_type, field)?;
                        quote! {
                            if let Some(nested) = helpers::as_struct(item) {
                                items.push(#path::from_value(nested)?);
                            }
                        }
                    }
                    other => {
                        let item_expr = self.read_expr(field, other, quote! { item })?;
                        quote! { items.push(#item_expr); }
                    }
                };
                quote! {
                    {
                        let mut items = Vec::new();
                        for item in helpers::as_list(#access).unwrap_or_default() {
                            #push
                        }
                        items
                    }
                }
            }
            TypeSpec::Map {
                key_type,
                value_type,
            } => {
                let key_expr = map_key_from_string(key_type);
                let insert = if field.is_expression
                    && matches!(value_type.as_ref(), TypeSpec::String)
                {
                    quote! { entries.insert(#key_expr, helpers::value_to_json(entry)); }
                } else {
                    match value_type.as_ref() {
                        TypeSpec::Message { .. } => {
                            let path = self.message_path_of(value_type, field)?;
                            quote! {
                                if let Some(nested) = helpers::as_struct(entry) {
                                    entries.insert(#key_expr, #path::from_value(nested)?);
                                }
                            }
                        }
                        other => {
                            let entry_expr = self.read_expr(field, other, quote! { entry })?;
                            quote! { entries.insert(#key_expr, #entry_expr); }
                        }
                    }
                };
                quote! {
                    {
                        let mut entries = std::collections::HashMap::new();
                        if let Some(nested) = helpers::as_struct(#access) {
                            for (key, entry) in &nested.fields {
                                #insert
                            }
                        }
                        entries
                    }
                }
            }
        };
        Ok(tokens)
    }

    // -- typed proto conversions ---------------------------------------

    /// Path of the prost-generated message type for a schema.
    fn proto_path(&self, schema: &Schema) -> TokenStream {
        let segments = routing::proto_module_segments(&schema.proto_type)
            .into_iter()
            .map(|segment| ident(&segment))
            .collect::<Vec<_>>();
        let name = ident(&schema.name);
        quote! { golem_api_grpc::proto::#(#segments::)*#name }
    }

    fn to_proto_method(&mut self, schema: &Schema) -> Result<TokenStream, CodegenError> {
        let proto_path = self.proto_path(schema);

        let mut assignments = Vec::new();
        for field in &schema.fields {
            let proto_ident = naming::field_ident(&field.proto_field_name);
            let value = self.to_proto_expr(field)?;
            assignments.push(quote! { #proto_ident: #value });
        }

        let doc = format!(
            " Builds the typed wire message `{}` from this value.",
            schema.proto_type
        );
        Ok(quote! {
            #[doc = #doc]
            pub fn to_proto(&self) -> #proto_path {
                #proto_path {
                    #(#assignments,)*
                    ..Default::default()
                }
            }
        })
    }

    fn to_proto_expr(&mut self, field: &FieldSchema) -> Result<TokenStream, CodegenError> {
        let field_ident = naming::field_ident(&field.name);
        let access = quote! { self.#field_ident };

        let tokens = match &field.typ {
            TypeSpec::String | TypeSpec::Bytes => quote! { #access.clone() },
            TypeSpec::Int32
            | TypeSpec::Int64
            | TypeSpec::Float
            | TypeSpec::Double
            | TypeSpec::Bool => quote! { #access },
            TypeSpec::Struct => quote! {
                if #access.is_empty() {
                    None
                } else {
                    Some(helpers::json_map_to_struct(&#access))
                }
            },
            TypeSpec::Message { .. } => {
                quote! { #access.as_ref().map(|value| value.to_proto()) }
            }
            TypeSpec::Array { element_type } => match element_type.as_ref() {
                TypeSpec::Message { .. } => {
                    quote! { #access.iter().map(|item| item.to_proto()).collect() }
                }
                _ => quote! { #access.clone() },
            },
            TypeSpec::Map { value_type, .. } => {
                if field.is_expression && matches!(value_type.as_ref(), TypeSpec::String) {
                    quote! {
                        #access
                            .iter()
                            .map(|(key, value)| (key.clone(), helpers::json_value_to_string(value)))
                            .collect()
                    }
                } else if matches!(value_type.as_ref(), TypeSpec::Message { .. }) {
                    quote! {
                        #access
                            .iter()
                            .map(|(key, value)| (key.clone(), value.to_proto()))
                            .collect()
                    }
                } else {
                    quote! { #access.clone() }
                }
            }
        };
        Ok(tokens)
    }

    fn from_proto_method(&mut self, schema: &Schema) -> Result<TokenStream, CodegenError> {
        let proto_path = self.proto_path(schema);

        let mut assignments = Vec::new();
        for field in &schema.fields {
            let field_ident = naming::field_ident(&field.name);
            let value = self.from_proto_expr(field)?;
            assignments.push(quote! { #field_ident: #value });
        }

        let doc = format!(
            " Rebuilds this value from the typed wire message `{}`.",
            schema.proto_type
        );
        Ok(quote! {
            #[doc = #doc]
            pub fn from_proto(proto: #proto_path) -> Self {
                Self {
                    #(#assignments,)*
                }
            }
        })
    }

    fn from_proto_expr(&mut self, field: &FieldSchema) -> Result<TokenStream, CodegenError> {
        let proto_ident = naming::field_ident(&field.proto_field_name);
        let access = quote! { proto.#proto_ident };

        let tokens = match &field.typ {
            TypeSpec::String
            | TypeSpec::Bytes
            | TypeSpec::Int32
            | TypeSpec::Int64
            | TypeSpec::Float
            | TypeSpec::Double
            | TypeSpec::Bool => quote! { #access },
            TypeSpec::Struct => {
                quote! { #access.map(|value| helpers::struct_to_json_map(&value)).unwrap_or_default() }
            }
            TypeSpec::Message { .. } => {
                let path = self.message_path(field)?;
                quote! { #access.map(|value| Box::new(#path::from_proto(value))) }
            }
            TypeSpec::Array { element_type } => match element_type.as_ref() {
                TypeSpec::Message { .. } => {
                    let path = self.message_path_of(element_type, field)?;
                    quote! { #access.into_iter().map(#path::from_proto).collect() }
                }
                _ => quote! { #access },
            },
            TypeSpec::Map { value_type, .. } => {
                if field.is_expression && matches!(value_type.as_ref(), TypeSpec::String) {
                    quote! {
                        #access
                            .into_iter()
                            .map(|(key, value)| (key, serde_json::Value::String(value)))
                            .collect()
                    }
                } else if matches!(value_type.as_ref(), TypeSpec::Message { .. }) {
                    let path = self.message_path_of(value_type, field)?;
                    quote! {
                        #access
                            .into_iter()
                            .map(|(key, value)| (key, #path::from_proto(value)))
                            .collect()
                    }
                } else {
                    quote! { #access }
                }
            }
        };
        Ok(tokens)
    }

    // -- Args struct ----------------------------------------------------

    fn args_struct(
        &mut self,
        schema: &Schema,
        root_plan: &routing::RootPlan,
    ) -> Result<TokenStream, CodegenError> {
        let args_ident = ident(&root_plan.args_name);
        let resource = root_plan
            .args_name
            .strip_suffix("Args")
            .unwrap_or(&root_plan.args_name)
            .to_string();

        let mut doc_lines = vec![format!(
            " {} contains the configuration arguments for creating a {}.",
            root_plan.args_name, resource
        )];
        let description = naming::sanitize_description(&schema.description);
        if !description.is_empty() {
            doc_lines.push(String::new());
            doc_lines.push(format!(" {description}"));
        }
        let docs = doc_lines.iter().map(|line| quote! { #[doc = #line] });

        let mut fields = Vec::new();
        for field in &schema.fields {
            let field_ident = naming::field_ident(&field.name);
            let field_doc = doc_attr(&field.description);
            let json_name = &field.json_name;
            let (field_type, optional) = self.args_field_type(field)?;
            let serde_extra = if optional {
                quote! { #[serde(skip_serializing_if = "Option::is_none")] }
            } else {
                quote! {}
            };
            fields.push(quote! {
                #field_doc
                #[serde(rename = #json_name, default)]
                #serde_extra
                pub #field_ident: #field_type
            });
        }

        let accessors = self.args_accessors(schema)?;

        Ok(quote! {
            #(#docs)*
            #[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
            pub struct #args_ident {
                #(#fields,)*
            }

            impl #args_ident {
                #(#accessors)*
            }
        })
    }

    /// Args fields stay plain and conventionally typed: required scalars are
    /// bare, optional scalars are `Option`, containers and message references
    /// keep their storage type.
    fn args_field_type(&mut self, field: &FieldSchema) -> Result<(TokenStream, bool), CodegenError> {
        match &field.typ {
            TypeSpec::String
            | TypeSpec::Int32
            | TypeSpec::Int64
            | TypeSpec::Bool
            | TypeSpec::Float
            | TypeSpec::Double
            | TypeSpec::Bytes => {
                let base = self.rust_type(&field.typ, field)?;
                if field.required {
                    Ok((base, false))
                } else {
                    Ok((quote! { Option<#base> }, true))
                }
            }
            _ => {
                let base = self.field_type(field)?;
                Ok((base, field.typ.is_message()))
            }
        }
    }

    /// Builder-style accessors: a singular/plural pair for arrays and maps,
    /// plus coercing setters for expression-capable string inputs. A field
    /// whose name is already singular gets exactly one accessor.
    fn args_accessors(&mut self, schema: &Schema) -> Result<Vec<TokenStream>, CodegenError> {
        let field_names: IndexSet<String> = schema
            .fields
            .iter()
            .map(|field| naming::snake_name(&field.name))
            .collect();

        let mut taken: IndexSet<String> = field_names.clone();
        let mut accessors = Vec::new();

        for field in &schema.fields {
            let plural_name = naming::snake_name(&field.name);
            let singular_name = naming::singularize(&plural_name);
            let field_ident = naming::field_ident(&field.name);

            match &field.typ {
                TypeSpec::Array { element_type } => {
                    let element = self.rust_type(element_type, field)?;
                    let plural_ident = naming::snake_ident(&plural_name);
                    let bulk_doc = format!(" Sets {plural_name}, extending any existing entries.");
                    // The plural accessor reuses the field name, which is
                    // already reserved for it.
                    accessors.push(quote! {
                        #[doc = #bulk_doc]
                        pub fn #plural_ident(mut self, values: Vec<#element>) -> Self {
                            self.#field_ident.extend(values);
                            self
                        }
                    });

                    if singular_name != plural_name && taken.insert(singular_name.clone()) {
                        let singular_ident = naming::snake_ident(&singular_name);
                        let single_doc = format!(" Appends one entry to {plural_name}.");
                        accessors.push(quote! {
                            #[doc = #single_doc]
                            pub fn #singular_ident(mut self, value: #element) -> Self {
                                self.#field_ident.push(value);
                                self
                            }
                        });
                    }
                }
                TypeSpec::Map {
                    key_type,
                    value_type,
                } => {
                    let expression =
                        field.is_expression && matches!(value_type.as_ref(), TypeSpec::String);
                    let key = self.rust_type(key_type, field)?;
                    let value = if expression {
                        quote! { serde_json::Value }
                    } else {
                        self.rust_type(value_type, field)?
                    };

                    let plural_ident = naming::snake_ident(&plural_name);
                    let bulk_doc = format!(" Sets {plural_name}, extending any existing entries.");
                    accessors.push(quote! {
                        #[doc = #bulk_doc]
                        pub fn #plural_ident(
                            mut self,
                            entries: std::collections::HashMap<#key, #value>,
                        ) -> Self {
                            self.#field_ident.extend(entries);
                            self
                        }
                    });

                    if singular_name != plural_name && taken.insert(singular_name.clone()) {
                        let singular_ident = naming::snake_ident(&singular_name);
                        let single_doc = format!(" Adds one entry to {plural_name}.");
                        let setter = if expression {
                            quote! {
                                #[doc = #single_doc]
                                pub fn #singular_ident(
                                    mut self,
                                    key: impl Into<#key>,
                                    value: impl helpers::CoerceToString,
                                ) -> Self {
                                    self.#field_ident.insert(
                                        key.into(),
                                        serde_json::Value::String(value.coerce_to_string()),
                                    );
                                    self
                                }
                            }
                        } else {
                            quote! {
                                #[doc = #single_doc]
                                pub fn #singular_ident(
                                    mut self,
                                    key: impl Into<#key>,
                                    value: #value,
                                ) -> Self {
                                    self.#field_ident.insert(key.into(), value);
                                    self
                                }
                            }
                        };
                        accessors.push(setter);
                    }
                }
                TypeSpec::String if naming::needs_coercion(&field.typ, field.is_expression) => {
                    let setter_ident = naming::snake_ident(&plural_name);
                    let doc = format!(
                        " Sets {plural_name} from a literal or an expression reference."
                    );
                    let assignment = if field.required {
                        quote! { self.#field_ident = value.coerce_to_string(); }
                    } else {
                        quote! { self.#field_ident = Some(value.coerce_to_string()); }
                    };
                    accessors.push(quote! {
                        #[doc = #doc]
                        pub fn #setter_ident(mut self, value: impl helpers::CoerceToString) -> Self {
                            #assignment
                            self
                        }
                    });
                }
                _ => {}
            }
        }

        Ok(accessors)
    }
}

// ----------------------------------------------------------------------
// Helpers module (generated support code)
// ----------------------------------------------------------------------

fn emit_helpers() -> GeneratedFile {
    let content = format!("{GENERATED_HEADER}\n\n{HELPERS_SOURCE}");
    GeneratedFile {
        path: PathBuf::from("helpers.rs"),
        content,
        package: HELPERS_PACKAGE.to_string(),
        imports: IndexSet::new(),
    }
}

const HELPERS_SOURCE: &str = r##"//! Support code shared by the generated wire conversions.

use base64::Engine as _;

/// Error produced when decoding a wire-level struct payload back into a
/// typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct WireError {
    pub type_name: &'static str,
    pub field: &'static str,
    pub message: String,
}

impl WireError {
    pub fn missing(type_name: &'static str, field: &'static str) -> Self {
        Self {
            type_name,
            field,
            message: "required field is missing".to_string(),
        }
    }

    pub fn invalid(
        type_name: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_name,
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}: {}", self.type_name, self.field, self.message)
    }
}

impl std::error::Error for WireError {}

/// Accepted by accessors of expression-capable string inputs: literal values
/// and expression references both normalize to a string at assignment time.
/// Expression reference types implement this by rendering their expression
/// text.
pub trait CoerceToString {
    fn coerce_to_string(self) -> String;
}

impl CoerceToString for String {
    fn coerce_to_string(self) -> String {
        self
    }
}

impl CoerceToString for &String {
    fn coerce_to_string(self) -> String {
        self.clone()
    }
}

impl CoerceToString for &str {
    fn coerce_to_string(self) -> String {
        self.to_string()
    }
}

impl CoerceToString for i32 {
    fn coerce_to_string(self) -> String {
        self.to_string()
    }
}

impl CoerceToString for i64 {
    fn coerce_to_string(self) -> String {
        self.to_string()
    }
}

impl CoerceToString for f64 {
    fn coerce_to_string(self) -> String {
        self.to_string()
    }
}

impl CoerceToString for bool {
    fn coerce_to_string(self) -> String {
        self.to_string()
    }
}

pub fn string_value(value: String) -> prost_types::Value {
    prost_types::Value {
        kind: Some(prost_types::value::Kind::StringValue(value)),
    }
}

pub fn number_value(value: f64) -> prost_types::Value {
    prost_types::Value {
        kind: Some(prost_types::value::Kind::NumberValue(value)),
    }
}

pub fn bool_value(value: bool) -> prost_types::Value {
    prost_types::Value {
        kind: Some(prost_types::value::Kind::BoolValue(value)),
    }
}

pub fn struct_value(value: prost_types::Struct) -> prost_types::Value {
    prost_types::Value {
        kind: Some(prost_types::value::Kind::StructValue(value)),
    }
}

pub fn list_value(values: Vec<prost_types::Value>) -> prost_types::Value {
    prost_types::Value {
        kind: Some(prost_types::value::Kind::ListValue(prost_types::ListValue {
            values,
        })),
    }
}

pub fn null_value() -> prost_types::Value {
    prost_types::Value {
        kind: Some(prost_types::value::Kind::NullValue(0)),
    }
}

pub fn as_string(value: &prost_types::Value) -> Option<String> {
    match &value.kind {
        Some(prost_types::value::Kind::StringValue(value)) => Some(value.clone()),
        _ => None,
    }
}

pub fn as_number(value: &prost_types::Value) -> Option<f64> {
    match &value.kind {
        Some(prost_types::value::Kind::NumberValue(value)) => Some(*value),
        _ => None,
    }
}

pub fn as_bool(value: &prost_types::Value) -> Option<bool> {
    match &value.kind {
        Some(prost_types::value::Kind::BoolValue(value)) => Some(*value),
        _ => None,
    }
}

pub fn as_struct(value: &prost_types::Value) -> Option<&prost_types::Struct> {
    match &value.kind {
        Some(prost_types::value::Kind::StructValue(value)) => Some(value),
        _ => None,
    }
}

pub fn as_list(value: &prost_types::Value) -> Option<&[prost_types::Value]> {
    match &value.kind {
        Some(prost_types::value::Kind::ListValue(value)) => Some(&value.values),
        _ => None,
    }
}

pub fn encode_bytes(value: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(value)
}

pub fn decode_bytes(value: &str) -> Vec<u8> {
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .unwrap_or_default()
}

pub fn json_to_value(value: &serde_json::Value) -> prost_types::Value {
    match value {
        serde_json::Value::Null => null_value(),
        serde_json::Value::Bool(value) => bool_value(*value),
        serde_json::Value::Number(value) => number_value(value.as_f64().unwrap_or_default()),
        serde_json::Value::String(value) => string_value(value.clone()),
        serde_json::Value::Array(items) => list_value(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => struct_value(json_map_to_struct(map)),
    }
}

pub fn value_to_json(value: &prost_types::Value) -> serde_json::Value {
    match &value.kind {
        None | Some(prost_types::value::Kind::NullValue(_)) => serde_json::Value::Null,
        Some(prost_types::value::Kind::NumberValue(value)) => serde_json::Number::from_f64(*value)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(prost_types::value::Kind::StringValue(value)) => {
            serde_json::Value::String(value.clone())
        }
        Some(prost_types::value::Kind::BoolValue(value)) => serde_json::Value::Bool(*value),
        Some(prost_types::value::Kind::StructValue(value)) => {
            serde_json::Value::Object(struct_to_json_map(value))
        }
        Some(prost_types::value::Kind::ListValue(value)) => {
            serde_json::Value::Array(value.values.iter().map(value_to_json).collect())
        }
    }
}

pub fn json_map_to_struct(
    map: &serde_json::Map<String, serde_json::Value>,
) -> prost_types::Struct {
    prost_types::Struct {
        fields: map
            .iter()
            .map(|(key, value)| (key.clone(), json_to_value(value)))
            .collect(),
    }
}

pub fn struct_to_json_map(
    value: &prost_types::Struct,
) -> serde_json::Map<String, serde_json::Value> {
    value
        .fields
        .iter()
        .map(|(key, value)| (key.clone(), value_to_json(value)))
        .collect()
}

pub fn json_value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}
"##;

// ----------------------------------------------------------------------
// Shared emission utilities
// ----------------------------------------------------------------------

fn ident(name: &str) -> Ident {
    Ident::new(name, Span::call_site())
}

fn doc_attr(description: &str) -> TokenStream {
    let sanitized = naming::sanitize_description(description);
    if sanitized.is_empty() {
        quote! {}
    } else {
        let line = format!(" {sanitized}");
        quote! { #[doc = #line] }
    }
}

fn deref(access: TokenStream, is_ref: bool) -> TokenStream {
    if is_ref {
        quote! { (*#access) }
    } else {
        access
    }
}

/// Condition under which an optional field is included in the wire payload.
fn presence_check(spec: &TypeSpec, access: TokenStream) -> TokenStream {
    match spec {
        TypeSpec::String | TypeSpec::Bytes | TypeSpec::Struct => {
            quote! { !#access.is_empty() }
        }
        TypeSpec::Array { .. } | TypeSpec::Map { .. } => quote! { !#access.is_empty() },
        TypeSpec::Int32 | TypeSpec::Int64 => quote! { #access != 0 },
        TypeSpec::Float | TypeSpec::Double => quote! { #access != 0.0 },
        TypeSpec::Bool => quote! { #access },
        TypeSpec::Message { .. } => quote! { #access.is_some() },
    }
}

fn map_key_to_string(key_type: &TypeSpec) -> TokenStream {
    match key_type {
        TypeSpec::String => quote! { key.clone() },
        _ => quote! { key.to_string() },
    }
}

fn map_key_from_string(key_type: &TypeSpec) -> TokenStream {
    match key_type {
        TypeSpec::String => quote! { key.clone() },
        _ => quote! { key.parse().unwrap_or_default() },
    }
}

/// Renders a token stream as a formatted source file under the generated
/// header. The token stream must parse as a full file; anything else is an
/// internal emission bug surfaced as an error rather than written out.
fn render(header: &str, tokens: TokenStream, path: &Path) -> Result<String, CodegenError> {
    let file: syn::File = syn::parse2(tokens).map_err(|err| {
        CodegenError::schema(
            path,
            format!("generated code failed to parse: {err}"),
        )
    })?;
    Ok(format!("{header}{}", prettyplease::unparse(&file)))
}
