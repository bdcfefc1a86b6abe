//! Turning a raw frame fetch into a [`FrameFetchResult`]

use connect_core::snippet::{has_component_code, strip_wrappers};
use connect_core::{ChildComponent, FetchResult, FrameFetchResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+.*?from\s+['"][^'"]+['"]"#).expect("Invalid regex pattern")
});

/// Children declared in a node-keyed Code Connect mapping.
/// Entries whose cleaned snippet is not component code are dropped.
pub fn extract_children(mapping: Option<&Value>) -> Vec<ChildComponent> {
    let Some(entries) = mapping.and_then(Value::as_object) else {
        return Vec::new();
    };

    entries
        .iter()
        .map(|(node_id, data)| {
            let snippet = data
                .get("snippet")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let imports = data
                .get("snippetImports")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            ChildComponent {
                node_id: node_id.clone(),
                component_name: data
                    .get("componentName")
                    .and_then(Value::as_str)
                    .filter(|name| !name.is_empty())
                    .unwrap_or("Unknown")
                    .to_string(),
                published_code: strip_wrappers(&snippet),
                snippet,
                imports,
            }
        })
        .filter(|child| has_component_code(&child.published_code))
        .collect()
}

/// Import statements found in `code`, first occurrence order, without duplicates
pub fn extract_imports(code: Option<&str>) -> Vec<String> {
    let Some(code) = code else {
        return Vec::new();
    };

    let mut imports: Vec<String> = Vec::new();
    for found in IMPORT_REGEX.find_iter(code) {
        let statement = found.as_str();
        if !imports.iter().any(|existing| existing == statement) {
            imports.push(statement.to_string());
        }
    }
    imports
}

pub fn process_frame(fetched: &FetchResult) -> FrameFetchResult {
    FrameFetchResult {
        frame_node_id: fetched.node_id.clone(),
        frame_code: fetched.code.clone(),
        children: extract_children(fetched.mapping.as_ref()),
        imports: extract_imports(fetched.code.as_deref()),
        timestamp: fetched.timestamp,
        source: fetched.source.clone(),
        published: fetched.published,
        error: fetched.error.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connect_core::NodeId;
    use serde_json::json;

    #[test]
    fn test_extract_children_filters_non_code() {
        let mapping = json!({
            "12:65": {
                "componentName": "Button",
                "snippet": "<CodeConnectSnippet name=\"Button\"><Button>Go</Button></CodeConnectSnippet>",
                "snippetImports": ["import { Button } from \"@/components/ui/button\""]
            },
            "12:99": {
                "componentName": "Spacer",
                "snippet": "<CodeConnectSnippet></CodeConnectSnippet>"
            },
            "12:100": {
                "snippet": "// just a comment"
            }
        });

        let children = extract_children(Some(&mapping));
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].node_id, "12:65");
        assert_eq!(children[0].component_name, "Button");
        assert_eq!(children[0].published_code, "<Button>Go</Button>");
        assert_eq!(children[0].imports.len(), 1);
    }

    #[test]
    fn test_children_keep_bridge_order() {
        let mapping: Value = serde_json::from_str(
            r#"{
                "12:65": {"componentName": "Button", "snippet": "<Button />"},
                "12:100": {"componentName": "Input", "snippet": "<Input />"}
            }"#,
        )
        .unwrap();

        let order: Vec<String> = extract_children(Some(&mapping))
            .into_iter()
            .map(|child| child.node_id)
            .collect();
        assert_eq!(order, vec!["12:65".to_string(), "12:100".to_string()]);
    }

    #[test]
    fn test_unknown_component_name() {
        let mapping = json!({"1:1": {"snippet": "return <div />"}});
        let children = extract_children(Some(&mapping));
        assert_eq!(children[0].component_name, "Unknown");
        assert!(children[0].imports.is_empty());
    }

    #[test]
    fn test_extract_children_from_non_object() {
        assert!(extract_children(None).is_empty());
        assert!(extract_children(Some(&json!(null))).is_empty());
        assert!(extract_children(Some(&json!(["x"]))).is_empty());
    }

    #[test]
    fn test_extract_imports_dedupes() {
        let code = r#"import { Button } from "@/components/ui/button"
import { Input } from '@/components/ui/input'
import { Button } from "@/components/ui/button"

export default function Frame() { return <Button /> }"#;

        let imports = extract_imports(Some(code));
        assert_eq!(
            imports,
            vec![
                r#"import { Button } from "@/components/ui/button""#.to_string(),
                "import { Input } from '@/components/ui/input'".to_string(),
            ]
        );
        assert!(extract_imports(None).is_empty());
    }

    #[test]
    fn test_process_frame_carries_status() {
        let mut fetched = FetchResult::new(NodeId::parse("22:1167").unwrap());
        fetched.code = Some("import React from 'react'\n<div />".to_string());
        fetched.error = Some("partial".to_string());
        fetched.refresh_published();

        let frame = process_frame(&fetched);
        assert_eq!(frame.frame_node_id.as_str(), "22:1167");
        assert_eq!(frame.imports, vec!["import React from 'react'".to_string()]);
        assert!(frame.children.is_empty());
        assert!(frame.published);
        assert_eq!(frame.error.as_deref(), Some("partial"));
        assert_eq!(frame.timestamp, fetched.timestamp);
    }
}
