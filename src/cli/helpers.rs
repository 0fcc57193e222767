//! Shared helper functions for CLI commands

use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Config;
use crate::core::identity::EntityId;
use crate::core::project::Project;
use crate::store::Store;

/// Open the project (explicit --project path or discovery) and its store
pub fn open_store(global: &GlobalOpts) -> Result<(Project, Store)> {
    let project = match &global.project {
        Some(path) => Project::open(path).map_err(|e| miette::miette!("{}", e))?,
        None => Project::discover().map_err(|e| miette::miette!("{}", e))?,
    };
    let store = Store::open(project.clone());
    Ok((project, store))
}

/// The actor id to stamp on writes
pub fn actor() -> String {
    Config::load().actor_or_default()
}

/// Parse an entity id argument
pub fn parse_id(raw: &str) -> Result<EntityId> {
    raw.parse().map_err(|e| miette::miette!("{}", e))
}

/// Resolve the effective output format, substituting the context default
/// for `auto`
pub fn effective_format(global: &GlobalOpts, auto: OutputFormat) -> OutputFormat {
    match global.format {
        OutputFormat::Auto => auto,
        other => other,
    }
}

/// Print a single document as YAML or JSON
pub fn print_doc<T: Serialize>(doc: &T, global: &GlobalOpts) -> Result<()> {
    match effective_format(global, OutputFormat::Yaml) {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(doc).into_diagnostic()?
            );
        }
        _ => {
            print!("{}", serde_yml::to_string(doc).into_diagnostic()?);
        }
    }
    Ok(())
}

/// Parse an attribute value argument. Values are JSON ("3", "[\"a\",\"b\"]",
/// "\"text\""); anything that fails to parse as JSON is taken as a bare
/// string.
pub fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

/// Split "code=value" arguments as used by `item new --attr`
pub fn parse_assignment(raw: &str) -> Result<(String, serde_json::Value)> {
    match raw.split_once('=') {
        Some((code, value)) if !code.is_empty() => {
            Ok((code.to_string(), parse_value(value)))
        }
        _ => Err(miette::miette!(
            "expected 'code=value', got '{raw}'"
        )),
    }
}

/// Format an EntityId for display, truncating if too long
pub fn format_short_id(id: &EntityId) -> String {
    let s = id.to_string();
    if s.len() > 16 {
        format!("{}...", &s[..13])
    } else {
        s
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityPrefix;

    #[test]
    fn test_format_short_id() {
        let id = EntityId::new(EntityPrefix::Item);
        let formatted = format_short_id(&id);
        assert!(formatted.len() <= 16);
        assert!(formatted.ends_with("..."));
    }

    #[test]
    fn test_parse_value_json_or_bare_string() {
        assert_eq!(parse_value("3"), serde_json::json!(3));
        assert_eq!(parse_value("[\"a\"]"), serde_json::json!(["a"]));
        assert_eq!(parse_value("woven cotton"), serde_json::json!("woven cotton"));
    }

    #[test]
    fn test_parse_assignment() {
        let (code, value) = parse_assignment("price=12.5").unwrap();
        assert_eq!(code, "price");
        assert_eq!(value, serde_json::json!(12.5));
        assert!(parse_assignment("no-equals").is_err());
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
    }
}
