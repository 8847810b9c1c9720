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
use crate::model::TypeSpec;
use heck::ToUpperCamelCase;
use indexmap::IndexMap;

/// Singular form of a plural word, used to derive single-item accessor names
/// from plural field names (`skills` -> `skill`, `entries` -> `entry`).
/// Rule-based with a small irregular table; a word with no applicable rule is
/// returned unchanged, since it may already be singular.
pub fn singularize(word: &str) -> String {
    let irregulars: [(&str, &str); 4] = [
        ("children", "child"),
        ("people", "person"),
        ("men", "man"),
        ("women", "woman"),
    ];
    if let Some((_, singular)) = irregulars
        .iter()
        .find(|(plural, _)| *plural == word.to_lowercase())
    {
        return match_case(word, singular);
    }

    if let Some(stem) = word.strip_suffix("ies") {
        // "entries" -> "entry"
        return format!("{stem}y");
    }
    if let Some(stem) = word.strip_suffix("ses") {
        // "addresses" -> "address"
        return format!("{stem}s");
    }
    if word.ends_with('s') && !word.ends_with("ss") {
        // "headers" -> "header", but not "address" -> "addres"
        return word[..word.len() - 1].to_string();
    }

    word.to_string()
}

/// Plural form of a singular word (`skill` -> `skills`, `entry` -> `entries`).
pub fn pluralize(word: &str) -> String {
    let irregulars: [(&str, &str); 4] = [
        ("child", "children"),
        ("person", "people"),
        ("man", "men"),
        ("woman", "women"),
    ];
    if let Some((_, plural)) = irregulars
        .iter()
        .find(|(singular, _)| *singular == word.to_lowercase())
    {
        return match_case(word, plural);
    }

    if let Some(stem) = word.strip_suffix('y') {
        // "entry" -> "entries" when preceded by a consonant
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) && !stem.is_empty() {
            return format!("{stem}ies");
        }
    }
    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        // "address" -> "addresses"
        return format!("{word}es");
    }

    format!("{word}s")
}

/// Whether a generated accessor for this field should accept a broader
/// dynamic input and normalize it to a string at assignment time.
///
/// True only for string fields and string-valued maps that are explicitly
/// marked expression-capable; message and array-of-message fields stay
/// strongly typed.
pub fn needs_coercion(typ: &TypeSpec, is_expression: bool) -> bool {
    if !is_expression {
        return false;
    }
    match typ {
        TypeSpec::String => true,
        TypeSpec::Map { value_type, .. } => matches!(value_type.as_ref(), TypeSpec::String),
        _ => false,
    }
}

/// Collapses a free-text description into one whitespace-normalized line so
/// it can be embedded into a generated comment regardless of source content.
pub fn sanitize_description(description: &str) -> String {
    description.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Assigns a unique identifier to every `(owner base name, identifier)`
/// proposal within one namespace.
///
/// Unique identifiers are kept verbatim. Colliding identifiers are prefixed
/// with their owner's base name (`Description` owned by `Agent` and
/// `InlineSubAgent` becomes `AgentDescription` / `InlineSubAgentDescription`);
/// neither party is dropped. A collision that the prefix does not resolve is
/// an error that requires schema-author intervention.
pub fn disambiguate(
    scope: &str,
    proposals: &[(String, String)],
) -> Result<IndexMap<(String, String), String>, CodegenError> {
    let mut count_by_ident: IndexMap<&str, usize> = IndexMap::new();
    for (_, ident) in proposals {
        *count_by_ident.entry(ident.as_str()).or_default() += 1;
    }

    let mut resolved: IndexMap<(String, String), String> = IndexMap::new();
    let mut taken: IndexMap<String, (String, String)> = IndexMap::new();

    for (owner, ident) in proposals {
        let unique = if count_by_ident[ident.as_str()] == 1 {
            ident.clone()
        } else {
            format!("{}{}", owner.to_upper_camel_case(), ident)
        };

        if let Some(previous) = taken.insert(unique.clone(), (owner.clone(), ident.clone())) {
            return Err(CodegenError::naming(
                scope.to_string(),
                format!(
                    "identifier {unique} is claimed by both {}.{} and {owner}.{ident} even after prefixing",
                    previous.0, previous.1
                ),
            ));
        }
        resolved.insert((owner.clone(), ident.clone()), unique);
    }

    Ok(resolved)
}

/// Keeps the case style of the word being replaced: an irregular replacement
/// for a capitalized word stays capitalized.
fn match_case(original: &str, replacement: &str) -> String {
    if original.chars().next().is_some_and(|c| c.is_uppercase()) {
        replacement.to_upper_camel_case()
    } else {
        replacement.to_string()
    }
}

/// Plain snake_case form of a schema field name.
pub fn snake_name(name: &str) -> String {
    use heck::ToSnakeCase;
    name.to_snake_case()
}

/// An identifier from an already snake_cased name, escaping names that
/// collide with keywords.
pub fn snake_ident(snake: &str) -> proc_macro2::Ident {
    if is_rust_keyword(snake) {
        proc_macro2::Ident::new_raw(snake, proc_macro2::Span::call_site())
    } else {
        proc_macro2::Ident::new(snake, proc_macro2::Span::call_site())
    }
}

/// A snake_case field identifier, escaping names that collide with keywords.
pub fn field_ident(name: &str) -> proc_macro2::Ident {
    snake_ident(&snake_name(name))
}

fn is_rust_keyword(word: &str) -> bool {
    matches!(
        word,
        "as" | "async"
            | "await"
            | "box"
            | "break"
            | "const"
            | "continue"
            | "crate"
            | "dyn"
            | "else"
            | "enum"
            | "extern"
            | "false"
            | "fn"
            | "for"
            | "if"
            | "impl"
            | "in"
            | "let"
            | "loop"
            | "match"
            | "mod"
            | "move"
            | "mut"
            | "pub"
            | "ref"
            | "return"
            | "static"
            | "struct"
            | "trait"
            | "true"
            | "type"
            | "unsafe"
            | "use"
            | "where"
            | "while"
    )
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;
    use assert2::assert;

    #[test]
    fn singular_plural_symmetry() {
        assert!(singularize("skills") == "skill");
        assert!(pluralize("skill") == "skills");
        assert!(singularize("headers") == "header");
        assert!(pluralize("header") == "headers");
        assert!(singularize("entries") == "entry");
        assert!(pluralize("entry") == "entries");
        assert!(singularize("addresses") == "address");
        assert!(pluralize("address") == "addresses");
        assert!(singularize("children") == "child");
        assert!(pluralize("child") == "children");
    }

    #[test]
    fn already_singular_words_stay_put() {
        assert!(singularize("env") == "env");
        assert!(singularize("address") == "address");
    }

    #[test]
    fn coercion_is_limited_to_expression_capable_strings() {
        assert!(needs_coercion(&TypeSpec::String, true));
        assert!(!needs_coercion(&TypeSpec::String, false));
        assert!(needs_coercion(
            &TypeSpec::Map {
                key_type: Box::new(TypeSpec::String),
                value_type: Box::new(TypeSpec::String),
            },
            true
        ));
        assert!(!needs_coercion(
            &TypeSpec::Map {
                key_type: Box::new(TypeSpec::String),
                value_type: Box::new(TypeSpec::Message {
                    message_type: "SkillReference".to_string(),
                    owning_proto_file: "a.proto".to_string(),
                }),
            },
            true
        ));
        assert!(!needs_coercion(
            &TypeSpec::Array {
                element_type: Box::new(TypeSpec::String)
            },
            true
        ));
    }

    #[test]
    fn descriptions_collapse_to_one_line() {
        let description = "Multi line\ndescription with\r\n  embedded   runs\tof whitespace";
        assert!(
            sanitize_description(description)
                == "Multi line description with embedded runs of whitespace"
        );
    }

    #[test]
    fn colliding_identifiers_get_deterministic_prefixes() {
        let proposals = vec![
            ("Agent".to_string(), "Description".to_string()),
            ("InlineSubAgent".to_string(), "Description".to_string()),
            ("Agent".to_string(), "Name".to_string()),
        ];

        let resolved = disambiguate("package agent", &proposals).unwrap();

        assert!(
            resolved[&("Agent".to_string(), "Description".to_string())] == "AgentDescription"
        );
        assert!(
            resolved[&("InlineSubAgent".to_string(), "Description".to_string())]
                == "InlineSubAgentDescription"
        );
        // Unique identifiers are left alone.
        assert!(resolved[&("Agent".to_string(), "Name".to_string())] == "Name");
    }

    #[test]
    fn unresolvable_collision_is_an_error() {
        let proposals = vec![
            ("Agent".to_string(), "Description".to_string()),
            ("Agent".to_string(), "Description".to_string()),
        ];
        let result = disambiguate("package agent", &proposals);
        assert!(result.is_err());
    }
}
