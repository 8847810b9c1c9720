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

//! Tests for SDK source generation from extracted schemas.

use test_r::test;

use assert2::assert;
use golem_sdk_codegen::error::CodegenError;
use golem_sdk_codegen::{ExtractArgs, GenerateArgs};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

test_r::enable!();

#[test]
fn end_to_end_generation_routes_schemas_by_namespace() {
    let (_schemas, out) = extract_and_generate();

    // One file per root, one shared types file per domain, module files and
    // helpers tie the tree together.
    assert!(out.path().join("mod.rs").exists());
    assert!(out.path().join("helpers.rs").exists());
    assert!(out.path().join("types/mod.rs").exists());
    assert!(out.path().join("types/agentic.rs").exists());
    assert!(out.path().join("workflow/http_call_task_config.rs").exists());
    assert!(out.path().join("workflow/set_task_config.rs").exists());
    assert!(out.path().join("agent/agent_spec.rs").exists());
    assert!(out.path().join("skill/skill_spec.rs").exists());

    let root_mod = read(out.path(), "mod.rs");
    for module in ["agent", "helpers", "skill", "types", "workflow"] {
        assert!(root_mod.contains(&format!("pub mod {module};")));
    }

    let types_mod = read(out.path(), "types/mod.rs");
    assert!(types_mod.contains("pub mod agentic;"));
}

#[test]
fn task_configs_get_kind_and_opaque_wire_conversions() {
    let (_schemas, out) = extract_and_generate();

    let http_call = read(out.path(), "workflow/http_call_task_config.rs");
    assert!(http_call.contains("// Code generated by golem-sdk-codegen. DO NOT EDIT."));
    assert!(http_call.contains("pub struct HttpCallTaskConfig"));
    assert!(http_call.contains("pub const KIND: &'static str = \"HTTP_CALL\";"));
    assert!(contains_code(
        &http_call,
        "pub fn to_wire(&self) -> prost_types::Struct"
    ));
    assert!(contains_code(
        &http_call,
        "pub fn from_wire(wire: &prost_types::Struct) -> Result<Self, helpers::WireError>"
    ));

    // Required fields fail decoding when missing; optional ones do not.
    assert!(contains_code(
        &http_call,
        "helpers::WireError::missing(\"HttpCallTaskConfig\", \"method\""
    ));
    assert!(!contains_code(
        &http_call,
        "helpers::WireError::missing(\"HttpCallTaskConfig\", \"headers\""
    ));

    // Every field the encoder writes is read back by the decoder.
    for key in ["method", "uri", "headers"] {
        assert!(contains_code(&http_call, &format!("fields.insert(\"{key}\"")));
        assert!(contains_code(&http_call, &format!("wire.fields.get(\"{key}\"")));
    }

    // The map field produces a singular/plural accessor pair on the Args
    // struct.
    assert!(http_call.contains("pub struct HttpCallArgs"));
    assert!(http_call.contains("pub fn header("));
    assert!(http_call.contains("pub fn headers("));
}

#[test]
fn resource_specs_get_typed_proto_conversions_and_args() {
    let (_schemas, out) = extract_and_generate();

    let agent = read(out.path(), "agent/agent_spec.rs");
    assert!(agent.contains("pub struct AgentSpec"));
    assert!(agent.contains("pub struct AgentArgs"));

    // Typed conversions construct the prost message derived from the proto
    // namespace.
    assert!(contains_code(
        &agent,
        "pub fn to_proto(&self) -> golem_api_grpc::proto::golem::agentic::agent::v1::AgentSpec"
    ));
    assert!(agent.contains("pub fn from_proto("));

    // Array field: singular/plural accessor pair.
    assert!(agent.contains("pub fn skill("));
    assert!(agent.contains("pub fn skills("));

    // A field that is already singular gets exactly one accessor.
    assert!(agent.matches("pub fn env(").count() == 1);
    assert!(!agent.contains("pub fn envs("));

    // Expression capable string fields take coercible input.
    assert!(contains_code(
        &agent,
        "pub fn instructions(mut self, value: impl helpers::CoerceToString)"
    ));

    // Message references stay strongly typed, routed through the shared
    // types package.
    assert!(agent.contains("super::super::types::agentic::"));
}

#[test]
fn shared_type_name_collisions_are_prefixed_deterministically() {
    let (_schemas, out) = extract_and_generate();

    let types = read(out.path(), "types/agentic.rs");
    // Both the agent and the skill domain declare a `Reference` type; the
    // generated identifiers are prefixed with their subdomain, and neither is
    // dropped.
    assert!(types.contains("pub struct AgentReference"));
    assert!(types.contains("pub struct SkillReference"));
    assert!(types.contains("pub struct McpServer"));

    // Shared types carry both conversion forms.
    assert!(types.contains("pub fn to_value(&self) -> prost_types::Struct"));
    assert!(types.contains("pub fn from_value("));
    assert!(types.contains("pub fn to_proto("));
    assert!(types.contains("pub fn from_proto("));
}

#[test]
fn descriptions_are_collapsed_to_single_line_doc_comments() {
    let (_schemas, out) = extract_and_generate();

    let agent = read(out.path(), "agent/agent_spec.rs");
    assert!(agent
        .contains("Human readable description of what the agent does, spanning multiple comment lines."));
}

#[test]
fn generated_import_graph_is_acyclic() {
    let (_schemas, out) = extract_and_generate();

    // Resource packages reference shared types only through the types
    // package; types reference no resource package. With the helpers module
    // as the only other edge, the graph is acyclic by construction. Verify
    // the emitted sources against sibling-package references anyway.
    let types = read(out.path(), "types/agentic.rs");
    for package in ["agent", "skill", "workflow"] {
        assert!(!types.contains(&format!("super::super::{package}")));
    }

    let agent = read(out.path(), "agent/agent_spec.rs");
    assert!(!agent.contains("super::super::skill"));
    assert!(!agent.contains("super::super::workflow"));
}

#[test]
fn generation_is_idempotent() {
    let (schemas, out) = extract_and_generate();

    let before = tree_contents(out.path());
    golem_sdk_codegen::generate(GenerateArgs {
        schema_dir: schemas.path().to_path_buf(),
        output_root: out.path().to_path_buf(),
    })
    .unwrap();
    let after = tree_contents(out.path());

    assert!(before == after);
}

#[test]
fn structurally_invalid_schema_aborts_before_any_output() {
    let schemas = TempDir::new().unwrap();
    write(
        schemas.path(),
        "tasks/broken.json",
        r#"{ "name": "BrokenTaskConfig", "kind": "BROKEN" }"#,
    );

    let out = TempDir::new().unwrap();
    let err = golem_sdk_codegen::generate(GenerateArgs {
        schema_dir: schemas.path().to_path_buf(),
        output_root: out.path().to_path_buf(),
    })
    .unwrap_err();

    let err = err.downcast_ref::<CodegenError>().unwrap();
    assert!(matches!(err, CodegenError::SchemaValidation { .. }));
    assert!(std::fs::read_dir(out.path()).unwrap().next().is_none());
}

#[test]
fn unresolvable_type_reference_identifies_schema_and_field() {
    let schemas = TempDir::new().unwrap();
    write(
        schemas.path(),
        "agent/agent.json",
        r#"{
  "name": "AgentSpec",
  "protoType": "golem.agentic.agent.v1.AgentSpec",
  "protoFile": "golem/agentic/agent/v1/spec.proto",
  "fields": [
    {
      "name": "Skills",
      "jsonName": "skills",
      "protoFieldName": "skills",
      "type": {
        "kind": "array",
        "elementType": {
          "kind": "message",
          "messageType": "MissingReference",
          "owningProtoFile": "golem/agentic/agent/v1/spec.proto"
        }
      }
    }
  ]
}"#,
    );

    let out = TempDir::new().unwrap();
    let err = golem_sdk_codegen::generate(GenerateArgs {
        schema_dir: schemas.path().to_path_buf(),
        output_root: out.path().to_path_buf(),
    })
    .unwrap_err();

    let message = format!("{err}");
    assert!(message.contains("agent.json"));
    assert!(message.contains("Skills"));
    assert!(message.contains("MissingReference"));
}

#[test]
fn collision_unresolved_by_prefixing_is_fatal() {
    let schemas = TempDir::new().unwrap();
    // Two resource specs with the same name routed into the same package;
    // prefixing with the shared base name cannot tell them apart.
    write(
        schemas.path(),
        "agent/tool_v1.json",
        &tool_spec_json("golem.agentic.agent.v1.ToolSpec", "golem/agentic/agent/v1/tool.proto"),
    );
    write(
        schemas.path(),
        "agent/tool_v2.json",
        &tool_spec_json("golem.agentic.agent.v2.ToolSpec", "golem/agentic/agent/v2/tool.proto"),
    );

    let out = TempDir::new().unwrap();
    let err = golem_sdk_codegen::generate(GenerateArgs {
        schema_dir: schemas.path().to_path_buf(),
        output_root: out.path().to_path_buf(),
    })
    .unwrap_err();

    let err = err.downcast_ref::<CodegenError>().unwrap();
    assert!(matches!(err, CodegenError::NamingCollision { .. }));
}

fn tool_spec_json(proto_type: &str, proto_file: &str) -> String {
    format!(
        r#"{{
  "name": "ToolSpec",
  "protoType": "{proto_type}",
  "protoFile": "{proto_file}",
  "fields": [
    {{
      "name": "Name",
      "jsonName": "name",
      "protoFieldName": "name",
      "type": {{ "kind": "string" }},
      "required": true
    }}
  ]
}}"#
    )
}

/// Extracts the fixture protos (tasks, agent, skill) into one schema tree and
/// generates the SDK sources from it.
fn extract_and_generate() -> (TempDir, TempDir) {
    let schemas = TempDir::new().unwrap();

    for (proto_dir, schema_subdir, suffix) in [
        ("golem/agentic/workflow/v1/tasks", "tasks", "TaskConfig"),
        ("golem/agentic/agent", "agent", "Spec"),
        ("golem/agentic/skill", "skill", "Spec"),
    ] {
        golem_sdk_codegen::extract(ExtractArgs {
            proto_dir: apis_dir().join(proto_dir),
            schema_out_dir: schemas.path().join(schema_subdir),
            include_dir: vec![apis_dir()],
            stub_dir: Some(stub_dir()),
            message_suffix: suffix.to_string(),
        })
        .unwrap();
    }

    let out = TempDir::new().unwrap();
    golem_sdk_codegen::generate(GenerateArgs {
        schema_dir: schemas.path().to_path_buf(),
        output_root: out.path().to_path_buf(),
    })
    .unwrap();

    (schemas, out)
}

/// Compares generated code ignoring layout: the formatter is free to wrap
/// long signatures, so whitespace and the commas it inserts are not
/// significant.
fn contains_code(content: &str, pattern: &str) -> bool {
    fn normalized(code: &str) -> String {
        code.chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .collect()
    }
    normalized(content).contains(&normalized(pattern))
}

fn read(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative)).unwrap()
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn tree_contents(root: &Path) -> BTreeMap<PathBuf, String> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let path = entry.path().strip_prefix(root).unwrap().to_path_buf();
            let content = std::fs::read_to_string(entry.path()).unwrap();
            (path, content)
        })
        .collect()
}

fn apis_dir() -> PathBuf {
    Path::new("test-data").join("proto").join("apis")
}

fn stub_dir() -> PathBuf {
    Path::new("test-data").join("proto").join("stubs")
}
