//! Pulls one component payload out of a model response.
//!
//! ```text
//! <thinking>why this is worth building</thinking>
//! <artifact identifier="clock" type="application/react" title="Clock">
//! export default () => <div>12:00</div>;
//! </artifact>
//! ```
//!
//! Nothing here fails: missing markers leave the fields empty.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static ARTIFACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<artifact(?:\s+([^>]*))?>(.*?)</artifact>").expect("artifact pattern")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("attribute pattern")
});

static THINKING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<thinking>(.*?)</thinking>").expect("thinking pattern"));

/// A fenced block some models wrap the payload in anyway.
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A```[\w+-]*[ \t]*\r?\n(.*?)\r?\n?```\z").expect("fence pattern")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub identifier: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// The component source; empty when the response has no artifact.
    pub content: String,
    pub thinking: Option<String>,
}

impl Artifact {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

pub fn extract(response: &str) -> Artifact {
    let thinking = THINKING
        .captures(response)
        .map(|captures| captures[1].trim().to_string())
        .filter(|text| !text.is_empty());
    let mut artifact = Artifact {
        thinking,
        ..Artifact::default()
    };

    let Some(captures) = ARTIFACT.captures(response) else {
        log::info!(target: "artifex::extract", "response has no artifact markers");
        return artifact;
    };
    let attributes = captures.get(1).map_or("", |attributes| attributes.as_str());
    for attribute in ATTRIBUTE.captures_iter(attributes) {
        let value = attribute
            .get(2)
            .or_else(|| attribute.get(3))
            .map(|value| value.as_str().to_string());
        match &attribute[1] {
            "identifier" => artifact.identifier = value,
            "title" => artifact.title = value,
            "type" => artifact.kind = value,
            other => log::debug!(target: "artifex::extract", "ignoring artifact attribute {other}"),
        }
    }
    artifact.content = unfence(captures[2].trim()).to_string();
    artifact
}

fn unfence(payload: &str) -> &str {
    match FENCE.captures(payload).and_then(|captures| captures.get(1)) {
        Some(inner) => inner.as_str(),
        None => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_response() {
        let artifact = extract(
            "Sure.\n<thinking>\n  A clock is a good fit.\n</thinking>\n\
             <artifact identifier=\"analog-clock\" type='application/react' title=\"Analog Clock\">\n\
             export default () => <div>12:00</div>;\n</artifact>\nEnjoy!",
        );
        assert_eq!(
            artifact,
            Artifact {
                identifier: Some("analog-clock".into()),
                title: Some("Analog Clock".into()),
                kind: Some("application/react".into()),
                content: "export default () => <div>12:00</div>;".into(),
                thinking: Some("A clock is a good fit.".into()),
            }
        );
    }

    #[test]
    fn missing_markers_give_defaults() {
        assert_eq!(extract("just prose"), Artifact::default());
        assert!(extract("<artifact>unterminated").is_empty());
    }

    #[test]
    fn bare_marker_without_attributes() {
        let artifact = extract("<artifact>\nconst x = 1;\n</artifact>");
        assert_eq!(artifact.content, "const x = 1;");
        assert_eq!(artifact.identifier, None);
        assert_eq!(artifact.thinking, None);
    }

    #[test]
    fn fenced_payloads_are_unwrapped() {
        let artifact = extract("<artifact title=\"x\">\n```jsx\nexport default () => null;\n```\n</artifact>");
        assert_eq!(artifact.content, "export default () => null;");
    }

    #[test]
    fn first_artifact_wins() {
        let artifact = extract("<artifact identifier=\"a\">one</artifact><artifact identifier=\"b\">two</artifact>");
        assert_eq!(artifact.identifier.as_deref(), Some("a"));
        assert_eq!(artifact.content, "one");
    }

    #[test]
    fn specification_blocks_are_not_artifacts() {
        let artifact = extract("/* <artifact-specification>\nA clock\n</artifact-specification> */");
        assert!(artifact.is_empty());
    }

    #[test]
    fn serializes_kind_as_type() {
        let json = serde_json::to_value(extract("<artifact type=\"text\">t</artifact>")).unwrap();
        assert_eq!(json["type"], "text");
    }
}
