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
use crate::error::CodegenError;
use crate::model::{Schema, SchemaSet};
use heck::{ToSnakeCase, ToUpperCamelCase};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Name of the shared-types package every domain module may import.
pub const TYPES_PACKAGE: &str = "types";
/// Name of the helpers package holding wire conversion support code.
pub const HELPERS_PACKAGE: &str = "helpers";

/// Where a root schema is emitted and under which identifiers.
#[derive(Debug, Clone)]
pub struct RootPlan {
    pub package: String,
    pub file: PathBuf,
    pub struct_name: String,
    pub args_name: String,
}

/// Where a shared type is emitted and under which identifier.
#[derive(Debug, Clone)]
pub struct SharedPlan {
    pub domain: String,
    pub rust_name: String,
}

/// The fully resolved emission plan: output routing and collision-free
/// identifiers for every schema. Routing is derived only from proto
/// namespaces and file paths, so new domains need no generator changes.
#[derive(Debug, Default)]
pub struct Plan {
    pub roots: IndexMap<String, RootPlan>,
    pub shared: IndexMap<String, SharedPlan>,
}

impl Plan {
    pub fn build(set: &SchemaSet) -> Result<Plan, CodegenError> {
        let mut plan = Plan::default();

        // Package per root, from namespace data only.
        let mut packages: IndexMap<String, Vec<&Schema>> = IndexMap::new();
        for schema in set.roots() {
            let package = package_of(schema, set)?;
            if package == TYPES_PACKAGE || package == HELPERS_PACKAGE {
                return Err(CodegenError::schema(
                    &set.source_of(&schema.proto_type),
                    format!("subdomain {package} collides with a reserved generated package"),
                ));
            }
            packages.entry(package).or_default().push(schema);
        }

        let mut claimed_files: IndexMap<PathBuf, String> = IndexMap::new();
        for (package, schemas) in &packages {
            let proposals: Vec<(String, String)> = schemas
                .iter()
                .map(|schema| (schema.base_name().to_string(), schema.name.clone()))
                .collect();
            let resolved = naming::disambiguate(&format!("package {package}"), &proposals)?;

            for schema in schemas {
                let struct_name = resolved
                    [&(schema.base_name().to_string(), schema.name.clone())]
                    .clone();
                let args_name = format!(
                    "{}Args",
                    struct_name
                        .strip_suffix("TaskConfig")
                        .or_else(|| struct_name.strip_suffix("Config"))
                        .or_else(|| struct_name.strip_suffix("Spec"))
                        .filter(|base| !base.is_empty())
                        .unwrap_or(&struct_name)
                );
                let file =
                    PathBuf::from(package).join(format!("{}.rs", schema.name.to_snake_case()));

                if let Some(previous) =
                    claimed_files.insert(file.clone(), schema.proto_type.clone())
                {
                    return Err(CodegenError::schema(
                        &set.source_of(&schema.proto_type),
                        format!(
                            "output path {} collides with the one generated for {previous}",
                            file.display()
                        ),
                    ));
                }

                plan.roots.insert(
                    schema.proto_type.clone(),
                    RootPlan {
                        package: package.clone(),
                        file,
                        struct_name,
                        args_name,
                    },
                );
            }
        }

        // Shared types are grouped into one file per top-level domain; names
        // colliding within a domain are prefixed with their subdomain.
        let mut by_domain: IndexMap<String, Vec<&Schema>> = IndexMap::new();
        for schema in set.shared_types.values() {
            let domain = domain_of(&schema.proto_type).ok_or_else(|| {
                CodegenError::schema(
                    &set.source_of(&schema.proto_type),
                    format!("protoType {} has no domain segment", schema.proto_type),
                )
            })?;
            by_domain.entry(domain.to_string()).or_default().push(schema);
        }

        for (domain, schemas) in &by_domain {
            let proposals: Vec<(String, String)> = schemas
                .iter()
                .map(|schema| {
                    let owner = subdomain_of(&schema.proto_file, domain)
                        .unwrap_or_else(|| domain.clone())
                        .to_upper_camel_case();
                    (owner, schema.name.clone())
                })
                .collect();
            let resolved = naming::disambiguate(&format!("types/{domain}"), &proposals)?;

            for (schema, proposal) in schemas.iter().zip(&proposals) {
                plan.shared.insert(
                    schema.proto_type.clone(),
                    SharedPlan {
                        domain: domain.clone(),
                        rust_name: resolved[proposal].clone(),
                    },
                );
            }
        }

        Ok(plan)
    }

    /// Domains that own at least one shared type, in deterministic order.
    pub fn domains(&self) -> Vec<String> {
        self.shared
            .values()
            .map(|shared| shared.domain.clone())
            .unique()
            .sorted()
            .collect()
    }

    /// Packages hosting at least one root schema, in deterministic order.
    pub fn packages(&self) -> Vec<String> {
        self.roots
            .values()
            .map(|root| root.package.clone())
            .unique()
            .sorted()
            .collect()
    }
}

/// Domain of a fully qualified proto type: the namespace segment following
/// the org root (`golem.agentic.agent.v1.AgentSpec` -> `agentic`).
pub fn domain_of(proto_type: &str) -> Option<&str> {
    let parts: Vec<&str> = proto_type.split('.').collect();
    // org root, domain, ..., type name
    if parts.len() >= 3 {
        Some(parts[1])
    } else {
        None
    }
}

/// Subdomain from the proto file path: the path segment following the domain
/// segment (`apis/golem/agentic/agent/v1/spec.proto` -> `agent`). Files that
/// sit directly in a versioned domain root have no subdomain.
pub fn subdomain_of(proto_file: &str, domain: &str) -> Option<String> {
    let segments: Vec<&str> = proto_file.split('/').collect();
    let position = segments.iter().position(|segment| *segment == domain)?;
    let candidate = segments.get(position + 1)?;
    if candidate.ends_with(".proto") || is_version_segment(candidate) {
        return None;
    }
    Some((*candidate).to_string())
}

fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Output package of a root schema, from its proto namespace and file path.
fn package_of(schema: &Schema, set: &SchemaSet) -> Result<String, CodegenError> {
    let domain = domain_of(&schema.proto_type).ok_or_else(|| {
        CodegenError::schema(
            &set.source_of(&schema.proto_type),
            format!("protoType {} has no domain segment", schema.proto_type),
        )
    })?;
    Ok(subdomain_of(&schema.proto_file, domain).unwrap_or_else(|| domain.to_string()))
}

/// Module path of the prost-generated message for a proto type, relative to
/// the proto root of the generated API crate
/// (`golem.agentic.agent.v1.AgentSpec` -> `golem::agentic::agent::v1`).
pub fn proto_module_segments(proto_type: &str) -> Vec<String> {
    let parts: Vec<&str> = proto_type.split('.').collect();
    parts[..parts.len().saturating_sub(1)]
        .iter()
        .map(|segment| segment.to_snake_case())
        .collect()
}

/// Verifies that the emitted package import graph is acyclic. By
/// construction resource packages only import `types` and `helpers`, and
/// `types` only imports `helpers`, so a cycle here means a routing bug, but
/// the invariant is load-bearing enough to check rather than assume.
pub fn check_acyclic(edges: &BTreeMap<String, IndexSet<String>>) -> Result<(), CodegenError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit(
        node: &str,
        edges: &BTreeMap<String, IndexSet<String>>,
        marks: &mut BTreeMap<String, Mark>,
        stack: &mut Vec<String>,
    ) -> Result<(), CodegenError> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                stack.push(node.to_string());
                return Err(CodegenError::naming(
                    "generated import graph".to_string(),
                    format!("import cycle between generated packages: {}", stack.join(" -> ")),
                ));
            }
            None => {}
        }

        marks.insert(node.to_string(), Mark::Visiting);
        stack.push(node.to_string());
        if let Some(targets) = edges.get(node) {
            for target in targets {
                visit(target, edges, marks, stack)?;
            }
        }
        stack.pop();
        marks.insert(node.to_string(), Mark::Done);
        Ok(())
    }

    let mut marks = BTreeMap::new();
    for node in edges.keys() {
        visit(node, edges, &mut marks, &mut Vec::new())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;
    use assert2::assert;

    #[test]
    fn domain_and_subdomain_come_from_namespace_data() {
        assert!(domain_of("golem.agentic.agent.v1.AgentSpec") == Some("agentic"));
        assert!(domain_of("golem.commons.apiresource.ApiResourceReference") == Some("commons"));
        assert!(domain_of("golem.Thing") == None);

        assert!(
            subdomain_of("apis/golem/agentic/agent/v1/spec.proto", "agentic")
                == Some("agent".to_string())
        );
        assert!(
            subdomain_of("apis/golem/agentic/workflow/v1/tasks/http_call.proto", "agentic")
                == Some("workflow".to_string())
        );
        assert!(subdomain_of("apis/golem/commons/v1/io.proto", "commons") == None);
        assert!(subdomain_of("elsewhere/unrelated.proto", "agentic") == None);
    }

    #[test]
    fn proto_module_segments_drop_the_type_name() {
        assert!(
            proto_module_segments("golem.agentic.agent.v1.AgentSpec")
                == vec!["golem", "agentic", "agent", "v1"]
        );
    }

    #[test]
    fn cycle_detection_rejects_mutual_imports() {
        let mut edges: BTreeMap<String, IndexSet<String>> = BTreeMap::new();
        edges
            .entry("agent".to_string())
            .or_default()
            .insert("types".to_string());
        edges
            .entry("types".to_string())
            .or_default()
            .insert("helpers".to_string());
        assert!(check_acyclic(&edges).is_ok());

        edges
            .entry("types".to_string())
            .or_default()
            .insert("agent".to_string());
        assert!(check_acyclic(&edges).is_err());
    }
}
