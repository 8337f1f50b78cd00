//! Output formatting for CLI commands.

use serde::Serialize;

use crate::cli::args::{JitenArgs, OutputFormat};
use crate::dictionary::{BuildSummary, Entry, IndexInfo};
use crate::error::Result;

/// Result structure for a dictionary build.
#[derive(Debug, Serialize)]
pub struct BuildResult {
    pub directory: String,
    pub name: String,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub summary: BuildSummary,
}

/// One matching entry.
#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub id: u32,
    pub entry: Entry,
}

/// Result structure for search operations.
#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub duration_ms: u64,
}

/// Header and checksum state of one dictionary file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: String,
    pub magic: String,
    pub version: u8,
    pub size_bytes: u64,
    pub checksum_ok: bool,
}

/// Result structure for dictionary inspection.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    pub name: String,
    pub files: Vec<FileReport>,
    /// Temporary files left behind by an interrupted build.
    pub leftover_files: Vec<String>,
    pub alphabet_size: usize,
    pub indexes: Vec<IndexInfo>,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &JitenArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &JitenArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    // Convert to JSON value for easier manipulation
    let value = serde_json::to_value(result)?;
    let obj = value.as_object();

    if let Some(hits) = obj.and_then(|o| o.get("hits")).and_then(|h| h.as_array()) {
        output_search_results_human(hits);
    } else if let Some(obj) = obj.filter(|o| o.contains_key("files")) {
        output_inspect_human(obj);
    } else {
        output_generic_human(&value);
    }
    Ok(())
}

/// Output search hits in human format.
fn output_search_results_human(hits: &[serde_json::Value]) {
    if hits.is_empty() {
        println!("No entries found.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        let id = hit.get("id").and_then(|id| id.as_u64()).unwrap_or(0);
        println!("{}. [{id}]", i + 1);
        if let Some(entry) = hit.get("entry") {
            for (label, key) in [
                ("headword", "headwords"),
                ("reading", "readings"),
                ("meaning", "meanings"),
            ] {
                let values = entry
                    .get(key)
                    .and_then(|v| v.as_array())
                    .map(|values| values.iter().map(format_value).collect::<Vec<_>>())
                    .unwrap_or_default();
                if !values.is_empty() {
                    println!("   {label}: {}", values.join("; "));
                }
            }
        }
    }
}

/// Output inspection results in human format.
fn output_inspect_human(obj: &serde_json::Map<String, serde_json::Value>) {
    if let Some(name) = obj.get("name") {
        println!("Dictionary: {}", format_value(name));
    }
    if let Some(files) = obj.get("files").and_then(|f| f.as_array()) {
        println!("Files:");
        for file in files {
            let size = file.get("size_bytes").and_then(|s| s.as_u64()).unwrap_or(0);
            let ok = file.get("checksum_ok").and_then(|c| c.as_bool()).unwrap_or(false);
            println!(
                "  {} ({} v{}): {}, checksum {}",
                file.get("file").map(format_value).unwrap_or_default(),
                file.get("magic").map(format_value).unwrap_or_default(),
                file.get("version").map(format_value).unwrap_or_default(),
                format_bytes(size),
                if ok { "ok" } else { "MISMATCH" }
            );
        }
    }
    if let Some(leftover) = obj.get("leftover_files").and_then(|l| l.as_array()) {
        if !leftover.is_empty() {
            let names: Vec<String> = leftover.iter().map(format_value).collect();
            println!("Leftover temporary files: {}", names.join(", "));
        }
    }
    if let Some(size) = obj.get("alphabet_size") {
        println!("Compressor alphabet: {} symbols", format_value(size));
    }
    if let Some(indexes) = obj.get("indexes").and_then(|i| i.as_array()) {
        println!("Indexes:");
        for index in indexes {
            println!(
                "  {}: {} with {} keys",
                index.get("field").map(format_value).unwrap_or_default(),
                index.get("backend").map(format_value).unwrap_or_default(),
                index.get("key_count").map(format_value).unwrap_or_default()
            );
        }
    }
}

/// Output generic data in human format.
fn output_generic_human(value: &serde_json::Value) {
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in obj {
                let formatted_val = format_value(val);
                println!("{key}: {formatted_val}");
            }
        }
        _ => {
            let formatted_value = format_value(value);
            println!("{formatted_value}");
        }
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &JitenArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for display.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        serde_json::Value::Object(_) => "[object]".to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}

/// Format bytes into human-readable format.
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS[unit_index];
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}
