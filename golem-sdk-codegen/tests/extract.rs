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

//! Tests for schema extraction from proto sources.

use test_r::test;

use assert2::assert;
use golem_sdk_codegen::error::CodegenError;
use golem_sdk_codegen::model::{Schema, TypeSpec};
use golem_sdk_codegen::ExtractArgs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

test_r::enable!();

#[test]
fn http_call_task_config_is_extracted_with_fields_in_declaration_order() {
    let out = extract_ok(tasks_proto_dir(), Some(stub_dir()), "TaskConfig");

    let schema = load_schema(&out.path().join("http_call.json"));

    assert!(schema.name == "HttpCallTaskConfig");
    assert!(schema.kind == Some("HTTP_CALL".to_string()));
    assert!(schema.proto_type == "golem.agentic.workflow.v1.tasks.HttpCallTaskConfig");
    assert!(schema.proto_file == "golem/agentic/workflow/v1/tasks/http_call.proto");

    let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
    assert!(names == vec!["Method", "Uri", "Headers"]);

    assert!(schema.fields[0].typ == TypeSpec::String);
    assert!(schema.fields[0].required);
    assert!(schema.fields[0].json_name == "method");
    assert!(schema.fields[0].proto_field_name == "method");
    assert!(schema.fields[1].required);
    assert!(
        schema.fields[2].typ
            == TypeSpec::Map {
                key_type: Box::new(TypeSpec::String),
                value_type: Box::new(TypeSpec::String),
            }
    );
    assert!(!schema.fields[2].required);
}

#[test]
fn task_kind_is_derived_from_the_message_name() {
    let out = extract_ok(tasks_proto_dir(), Some(stub_dir()), "TaskConfig");

    let schema = load_schema(&out.path().join("set.json"));
    assert!(schema.name == "SetTaskConfig");
    assert!(schema.kind == Some("SET".to_string()));

    // The values map is marked expression capable through a field option.
    assert!(schema.fields[0].is_expression);
}

#[test]
fn unresolvable_third_party_import_fails_without_a_stub() {
    let out = TempDir::new().unwrap();
    let result = golem_sdk_codegen::extract(ExtractArgs {
        proto_dir: tasks_proto_dir(),
        schema_out_dir: out.path().to_path_buf(),
        include_dir: vec![apis_dir()],
        stub_dir: None,
        message_suffix: "TaskConfig".to_string(),
    });

    let err = result.unwrap_err();
    let err = err.downcast_ref::<CodegenError>().unwrap();
    assert!(matches!(err, CodegenError::Parse { .. }));

    // Nothing may be published on failure.
    assert!(std::fs::read_dir(out.path()).unwrap().next().is_none());
}

#[test]
fn minimal_stub_makes_the_dependent_file_extractable() {
    let out = extract_ok(tasks_proto_dir(), Some(stub_dir()), "TaskConfig");
    assert!(out.path().join("http_call.json").exists());
    assert!(out.path().join("set.json").exists());
}

#[test]
fn referenced_message_types_become_shared_type_schemas() {
    let out = extract_ok(agent_proto_dir(), Some(stub_dir()), "Spec");

    let agent = load_schema(&out.path().join("agent.json"));
    assert!(agent.name == "AgentSpec");
    assert!(agent.kind.is_none());

    // Multi-line leading comments are preserved verbatim in the IR; they are
    // collapsed only when embedded into generated code.
    assert!(agent.fields[1].description.contains("spanning"));

    // The expression capable field carries its marker.
    let instructions = &agent.fields[2];
    assert!(instructions.name == "Instructions");
    assert!(instructions.is_expression);

    // String enum constraints are captured in the validation block.
    let visibility = agent.fields.last().unwrap();
    assert!(visibility.name == "Visibility");
    let validation = visibility.validation.as_ref().unwrap();
    assert!(validation.enum_values == vec!["public".to_string(), "private".to_string()]);

    // google.protobuf.Struct maps to the opaque struct kind.
    let metadata = &agent.fields[6];
    assert!(metadata.typ == TypeSpec::Struct);

    // Referenced messages are captured as shared types, exactly once, and the
    // self-referencing McpServer terminates via the visited set.
    let reference = load_schema(&out.path().join("types/reference.json"));
    assert!(reference.proto_type == "golem.agentic.agent.v1.Reference");

    let mcp_server = load_schema(&out.path().join("types/mcpserver.json"));
    assert!(mcp_server.proto_type == "golem.agentic.agent.v1.McpServer");
    assert!(
        mcp_server.fields[1].typ
            == TypeSpec::Message {
                message_type: "McpServer".to_string(),
                owning_proto_file: "golem/agentic/agent/v1/spec.proto".to_string(),
            }
    );
}

#[test]
fn extraction_is_deterministic_across_runs() {
    let first = extract_ok(agent_proto_dir(), Some(stub_dir()), "Spec");
    let second = extract_ok(agent_proto_dir(), Some(stub_dir()), "Spec");

    for file in ["agent.json", "types/reference.json", "types/mcpserver.json"] {
        let a = std::fs::read_to_string(first.path().join(file)).unwrap();
        let b = std::fs::read_to_string(second.path().join(file)).unwrap();
        assert!(a == b, "extraction output differs for {file}");
    }
}

fn extract_ok(proto_dir: PathBuf, stub_dir: Option<PathBuf>, suffix: &str) -> TempDir {
    let out = TempDir::new().unwrap();
    golem_sdk_codegen::extract(ExtractArgs {
        proto_dir,
        schema_out_dir: out.path().to_path_buf(),
        include_dir: vec![apis_dir()],
        stub_dir,
        message_suffix: suffix.to_string(),
    })
    .unwrap();
    out
}

fn load_schema(path: &Path) -> Schema {
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn apis_dir() -> PathBuf {
    Path::new("test-data").join("proto").join("apis")
}

fn stub_dir() -> PathBuf {
    Path::new("test-data").join("proto").join("stubs")
}

fn tasks_proto_dir() -> PathBuf {
    apis_dir().join("golem/agentic/workflow/v1/tasks")
}

fn agent_proto_dir() -> PathBuf {
    apis_dir().join("golem/agentic/agent")
}
