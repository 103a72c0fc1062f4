use std::fmt;

use serde::{Deserialize, Serialize};

/// One line of a client view: a depot path and the client path it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mapping {
    pub depot_path: String,
    pub client_path: String,
}

impl Mapping {
    pub fn new(depot_path: impl Into<String>, client_path: impl Into<String>) -> Self {
        Self {
            depot_path: depot_path.into(),
            client_path: client_path.into(),
        }
    }

    /// Splits a view line into its two paths. Double quotes group a path that
    /// contains whitespace. Returns `None` unless exactly two tokens are found.
    pub fn parse_line(line: &str) -> Option<Self> {
        let tokens = tokenize(line)?;
        match <[String; 2]>::try_from(tokens) {
            Ok([depot_path, client_path]) => Some(Self {
                depot_path,
                client_path,
            }),
            Err(_) => None,
        }
    }

    /// Rewrites the client path from the `//{from}/` namespace to `//{to}/`.
    /// Paths outside the `from` namespace are returned unchanged.
    #[must_use]
    pub fn rebased(&self, from: &str, to: &str) -> Self {
        Self {
            depot_path: self.depot_path.clone(),
            client_path: rebase_client_path(&self.client_path, from, to),
        }
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            quote_path(&self.depot_path),
            quote_path(&self.client_path)
        )
    }
}

/// Returns the `//{name}/` prefix that anchors a client's namespace.
#[must_use]
pub fn client_namespace(name: &str) -> String {
    format!("//{name}/")
}

#[must_use]
pub fn rebase_client_path(path: &str, from: &str, to: &str) -> String {
    match path.strip_prefix(&client_namespace(from)) {
        Some(rest) => format!("{}{rest}", client_namespace(to)),
        None => path.to_string(),
    }
}

fn quote_path(path: &str) -> String {
    if path.contains(char::is_whitespace) {
        format!("\"{path}\"")
    } else {
        path.to_string()
    }
}

fn tokenize(line: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.trim().chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut token = String::new();
        if c == '"' {
            chars.next();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                token.push(c);
            }
            if !closed {
                return None;
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }

    Some(tokens)
}

/// A client workspace definition as stored on the server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientSpec {
    pub name: String,
    pub owner: String,
    pub host: String,
    pub root: String,
    pub description: String,
    pub options: String,
    pub submit_options: String,
    pub line_end: String,
    pub view: Vec<Mapping>,
}

impl ClientSpec {
    /// The template's view rebased onto the namespace of `name`.
    #[must_use]
    pub fn view_for(&self, name: &str) -> Vec<Mapping> {
        self.view
            .iter()
            .map(|m| m.rebased(&self.name, name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let m = Mapping::parse_line("//depot/foo/... //T/foo/...").unwrap();
        assert_eq!(m.depot_path, "//depot/foo/...");
        assert_eq!(m.client_path, "//T/foo/...");
    }

    #[test]
    fn test_parse_line_exclusion_and_extra_whitespace() {
        let m = Mapping::parse_line("  -//depot/foo/bin/...\t //T/foo/bin/...  ").unwrap();
        assert_eq!(m.depot_path, "-//depot/foo/bin/...");
        assert_eq!(m.client_path, "//T/foo/bin/...");
    }

    #[test]
    fn test_parse_line_quoted() {
        let m = Mapping::parse_line("\"//depot/my project/...\" \"//T/my project/...\"").unwrap();
        assert_eq!(m.depot_path, "//depot/my project/...");
        assert_eq!(m.client_path, "//T/my project/...");
        assert_eq!(
            m.to_string(),
            "\"//depot/my project/...\" \"//T/my project/...\""
        );
    }

    #[test]
    fn test_parse_line_wrong_token_count() {
        assert!(Mapping::parse_line("//depot/foo/...").is_none());
        assert!(Mapping::parse_line("//depot/a //T/a //T/b").is_none());
        assert!(Mapping::parse_line("").is_none());
        assert!(Mapping::parse_line("\"//depot/unterminated //T/a").is_none());
    }

    #[test]
    fn test_rebase_round_trip() {
        let m = Mapping::new("//depot/foo", "//templateName/bar");
        let rebased = m.rebased("templateName", "machine_host1");
        assert_eq!(rebased.client_path, "//machine_host1/bar");
        assert_eq!(rebased.rebased("machine_host1", "templateName"), m);
    }

    #[test]
    fn test_rebase_is_anchored() {
        // Only the leading namespace is rewritten, never a later segment.
        let m = Mapping::new("//depot/T/x", "//T/T/x");
        assert_eq!(m.rebased("T", "U").client_path, "//U/T/x");

        // A client whose name merely starts with the template name is left alone.
        let m = Mapping::new("//depot/x", "//T2/x");
        assert_eq!(m.rebased("T", "U").client_path, "//T2/x");
    }

    #[test]
    fn test_view_for() {
        let spec = ClientSpec {
            name: "T".into(),
            view: vec![
                Mapping::new("//depot/a/...", "//T/a/..."),
                Mapping::new("//depot/b/...", "//T/b/..."),
            ],
            ..Default::default()
        };
        let view = spec.view_for("T_runner_1");
        assert_eq!(view[0].client_path, "//T_runner_1/a/...");
        assert_eq!(view[1].client_path, "//T_runner_1/b/...");
    }
}
