//! Renders a preview React component from a frame's published child snippets

use connect_core::{ChildComponent, FrameFetchResult};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutStyle {
    /// Framed page with a heading and per-component wrappers
    #[default]
    Detailed,
    /// Each component in a bordered card under its name
    Simple,
}

pub fn generate_layout(frame: &FrameFetchResult, style: LayoutStyle) -> String {
    let children: Vec<&ChildComponent> = frame
        .children
        .iter()
        .filter(|child| !child.published_code.trim().is_empty())
        .collect();

    if children.is_empty() {
        return empty_layout(style);
    }

    let mut imports: Vec<&str> = Vec::new();
    for import in &frame.imports {
        if !imports.contains(&import.as_str()) {
            imports.push(import);
        }
    }

    let mut body = String::new();
    for child in &children {
        match style {
            LayoutStyle::Detailed => {
                let _ = write!(
                    body,
                    "\n        {{/* {name} - {id} */}}\n        <div key=\"{id}\" className=\"component-{class} mb-4\">\n          {code}\n        </div>\n",
                    name = child.component_name,
                    id = child.node_id,
                    class = child.component_name.to_lowercase(),
                    code = child.published_code,
                );
            }
            LayoutStyle::Simple => {
                let _ = write!(
                    body,
                    "\n          {{/* {name} */}}\n          <div key=\"{id}\" className=\"mb-4 p-4 border rounded\">\n            <h3 className=\"text-sm font-medium text-gray-700 mb-2\">{name}</h3>\n            {code}\n          </div>\n",
                    name = child.component_name,
                    id = child.node_id,
                    code = child.published_code,
                );
            }
        }
    }

    let header = imports.join("\n");
    match style {
        LayoutStyle::Detailed => format!(
            r#"{header}

export default function LayoutTest() {{
  return (
    <div className="frame-layout bg-white p-8 rounded-lg border">
      <div className="mb-6">
        <h1 className="text-2xl font-bold text-gray-900">Frame Layout Test</h1>
        <p className="text-gray-600">Rendering {count} components with Code Connect code</p>
      </div>

      <div className="space-y-6">{body}      </div>
    </div>
  )
}}
"#,
            count = children.len(),
        ),
        LayoutStyle::Simple => format!(
            r#"{header}

export default function LayoutTest() {{
  return (
    <div className="p-8 bg-gray-50 min-h-screen">
      <div className="max-w-4xl mx-auto">
        <h1 className="text-2xl font-bold mb-6">Frame Layout Test</h1>
        <div className="space-y-4">{body}        </div>
      </div>
    </div>
  )
}}
"#
        ),
    }
}

fn empty_layout(style: LayoutStyle) -> String {
    let (class, message) = match style {
        LayoutStyle::Detailed => (
            "frame-layout",
            "No components with Code Connect React code available in this frame.",
        ),
        LayoutStyle::Simple => ("p-8", "No components with Code Connect React code available."),
    };
    format!(
        r#"export default function LayoutTest() {{
  return (
    <div className="{class}">
      <p>{message}</p>
    </div>
  )
}}
"#
    )
}
