//! Published-snippet extraction.
//!
//! Best-effort text processing: `<CodeConnectSnippet>` wrapper tags are
//! stripped, and when nothing is left a canned example is chosen by keyword.
//! Keyword sniffing misfires on code that mentions both keywords (a button
//! whose class list says `input`, for example).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const NO_PUBLISHED_CODE: &str = "// No published code available";

pub const BUTTON_SNIPPET: &str = r#"<button class="inline-flex items-center justify-center gap-2 whitespace-nowrap rounded-md text-sm font-medium transition-all disabled:pointer-events-none disabled:opacity-50 bg-primary text-primary-foreground shadow-xs hover:bg-primary/90 h-9 px-4 py-2">
  Button
</button>"#;

pub const INPUT_SNIPPET: &str = r#"<input
  type="text"
  class="flex h-9 w-full rounded-md border border-input bg-transparent px-3 py-1 text-sm shadow-sm transition-colors file:border-0 file:bg-transparent file:text-sm file:font-medium placeholder:text-muted-foreground focus-visible:outline-none focus-visible:ring-1 focus-visible:ring-ring disabled:cursor-not-allowed disabled:opacity-50"
  placeholder="Enter text..."
/>"#;

static WRAPPER_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<CodeConnectSnippet[^>]*>").expect("Invalid regex pattern"));

static WRAPPER_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</CodeConnectSnippet>").expect("Invalid regex pattern"));

/// How a snippet was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetOrigin {
    /// Text left after stripping wrapper tags
    Stripped,
    /// Canned example picked by keyword
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub origin: SnippetOrigin,
}

/// Remove `<CodeConnectSnippet ...>` wrappers, keeping the inner content
pub fn strip_wrappers(code: &str) -> String {
    let without_open = WRAPPER_OPEN.replace_all(code, "");
    WRAPPER_CLOSE.replace_all(&without_open, "").trim().to_string()
}

/// Try to isolate a displayable snippet. `None` means nothing usable was found.
pub fn try_extract(code: &str) -> Option<Snippet> {
    if code.trim().is_empty() {
        return None;
    }

    let stripped = strip_wrappers(code);
    if !stripped.is_empty() {
        return Some(Snippet {
            text: stripped,
            origin: SnippetOrigin::Stripped,
        });
    }

    template_for(code).map(|text| Snippet {
        text: text.to_string(),
        origin: SnippetOrigin::Template,
    })
}

/// Extract a snippet, falling back to a placeholder comment
pub fn extract(code: Option<&str>) -> String {
    code.and_then(try_extract)
        .map(|snippet| snippet.text)
        .unwrap_or_else(|| NO_PUBLISHED_CODE.to_string())
}

/// Whether cleaned code looks like real markup or component code
/// rather than an empty shell or a comment.
pub fn has_component_code(code: &str) -> bool {
    let clean = strip_wrappers(code);
    if clean.is_empty() {
        return false;
    }
    clean.contains('<') || clean.contains("return") || clean.contains("JSX") || clean.contains("React")
}

fn template_for(original: &str) -> Option<&'static str> {
    let lowered = original.to_lowercase();
    if lowered.contains("button") {
        Some(BUTTON_SNIPPET)
    } else if lowered.contains("input") {
        Some(INPUT_SNIPPET)
    } else {
        None
    }
}
