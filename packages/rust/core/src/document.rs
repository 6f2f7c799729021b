//! PBIR document access: reading, writing, and the structural lookups shared
//! by the extractor and the patcher.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use tracing::debug;

use pbirkit_shared::{PbirError, Result};

/// Byte-order mark some editors prepend to UTF-8 files.
const BOM: char = '\u{feff}';

/// Suffix of the folder holding a report definition.
const REPORT_SUFFIX: &str = ".Report";

/// Query-filter aliases in scope: `From[].Name` → `From[].Entity`.
pub type AliasScope = HashMap<String, String>;

/// A parsed PBIR document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Where the document was read from.
    pub path: PathBuf,
    /// Parsed JSON content, object keys in file order.
    pub value: Value,
    /// Whether the file ended with a newline.
    pub trailing_newline: bool,
}

/// Read and parse a JSON document.
pub fn read_document(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path).map_err(|e| PbirError::io(path, e))?;
    let text = content.strip_prefix(BOM).unwrap_or(&content);

    let value: Value = serde_json::from_str(text)
        .map_err(|e| PbirError::parse(format!("{}: {e}", path.display())))?;

    Ok(Document {
        path: path.to_path_buf(),
        value,
        trailing_newline: text.ends_with('\n'),
    })
}

/// Pretty-print a document with the given indent width.
pub fn render_document(doc: &Document, indent: usize) -> Result<Vec<u8>> {
    let indent = vec![b' '; indent];
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&indent));
    doc.value
        .serialize(&mut serializer)
        .map_err(|e| PbirError::parse(format!("{}: {e}", doc.path.display())))?;

    if doc.trailing_newline {
        out.push(b'\n');
    }
    Ok(out)
}

/// Rewrite a document in place.
pub fn write_document(doc: &Document, indent: usize) -> Result<()> {
    let bytes = render_document(doc, indent)?;
    std::fs::write(&doc.path, bytes).map_err(|e| PbirError::io(&doc.path, e))?;
    debug!(path = %doc.path.display(), "document rewritten");
    Ok(())
}

// ---------------------------------------------------------------------------
// Field lookups
// ---------------------------------------------------------------------------

/// Resolve the table a `Column` / `Measure` node points at.
///
/// Direct references carry `Expression.SourceRef.Entity`; references inside a
/// query filter carry `Expression.SourceRef.Source`, an alias declared in the
/// filter's `From` list.
pub fn field_source_entity<'a>(field: &'a Value, aliases: &'a AliasScope) -> Option<&'a str> {
    let source_ref = field.pointer("/Expression/SourceRef")?;

    if let Some(entity) = source_ref.get("Entity").and_then(Value::as_str) {
        return Some(entity);
    }

    let alias = source_ref.get("Source").and_then(Value::as_str)?;
    aliases.get(alias).map(String::as_str)
}

/// Resolve the table of a `HierarchyLevel` node. The hierarchy's source is
/// either a plain `SourceRef` or a `PropertyVariationSource` wrapping one.
pub fn hierarchy_source_entity<'a>(level: &'a Value, aliases: &'a AliasScope) -> Option<&'a str> {
    let hierarchy = level.pointer("/Expression/Hierarchy")?;
    let source = match hierarchy.pointer("/Expression/PropertyVariationSource") {
        Some(variation) => variation,
        None => hierarchy,
    };
    field_source_entity(source, aliases)
}

/// Build the alias scope of a query filter (an object with `From` and
/// `Where`), layered over the enclosing scope. Returns `None` for any other
/// object.
pub fn alias_scope(filter: &Value, outer: &AliasScope) -> Option<AliasScope> {
    let from = filter.get("From")?.as_array()?;
    filter.get("Where")?;

    let mut scope = outer.clone();
    for source in from {
        let name = source.get("Name").and_then(Value::as_str);
        let entity = source.get("Entity").and_then(Value::as_str);
        if let (Some(name), Some(entity)) = (name, entity) {
            scope.insert(name.to_string(), entity.to_string());
        }
    }
    Some(scope)
}

// ---------------------------------------------------------------------------
// Report / page names
// ---------------------------------------------------------------------------

/// Name of the report a document belongs to: the nearest `<Name>.Report`
/// folder, without its suffix.
pub fn report_name(path: &Path) -> Option<String> {
    path.components()
        .rev()
        .filter_map(|c| c.as_os_str().to_str())
        .find_map(|c| c.strip_suffix(REPORT_SUFFIX))
        .map(str::to_string)
}

/// Resolves page display names, caching each `page.json` it reads.
#[derive(Debug)]
pub struct PageResolver {
    na_value: String,
    cache: HashMap<PathBuf, String>,
}

impl PageResolver {
    /// Create a resolver that answers `na_value` for unresolvable pages.
    pub fn new(na_value: impl Into<String>) -> Self {
        Self {
            na_value: na_value.into(),
            cache: HashMap::new(),
        }
    }

    /// Display name of the page `doc` (read from `path`) belongs to.
    ///
    /// Bookmarks name their page in `explorationState.activeSection`; every
    /// other document lives below `pages/<pageId>/`.
    pub fn resolve(&mut self, path: &Path, doc: &Value) -> String {
        let Some(page_json) = page_json_path(path, doc) else {
            return self.na_value.clone();
        };

        if let Some(name) = self.cache.get(&page_json) {
            return name.clone();
        }

        let name = read_display_name(&page_json).unwrap_or_else(|| self.na_value.clone());
        self.cache.insert(page_json, name.clone());
        name
    }
}

fn page_json_path(path: &Path, doc: &Value) -> Option<PathBuf> {
    let parent = path.parent()?;

    if parent.file_name().is_some_and(|name| name == "bookmarks") {
        let section = doc
            .pointer("/explorationState/activeSection")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())?;
        let definition = parent.parent()?;
        return Some(definition.join("pages").join(section).join("page.json"));
    }

    // The page id is the directory right below the innermost `pages` folder;
    // `pages/pages.json` itself belongs to no page.
    let components: Vec<_> = path.components().map(|c| c.as_os_str()).collect();
    let dirs = components.get(..components.len().saturating_sub(2))?;
    let idx = dirs.iter().rposition(|c| *c == "pages")?;
    let section = components.get(idx + 1)?;

    let mut page_json: PathBuf = components.iter().take(idx + 1).collect();
    page_json.push(section);
    page_json.push("page.json");
    Some(page_json)
}

fn read_display_name(page_json: &Path) -> Option<String> {
    let doc = read_document(page_json).ok()?;
    doc.value
        .get("displayName")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn read_tolerates_bom_and_tracks_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write(&path, "\u{feff}{\"a\": 1}\n");

        let doc = read_document(&path).unwrap();
        assert_eq!(doc.value, json!({"a": 1}));
        assert!(doc.trailing_newline);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        write(&path, "{\"visual\": ");

        let err = read_document(&path).unwrap_err();
        assert!(matches!(err, PbirError::Parse { .. }));
    }

    #[test]
    fn render_preserves_key_order_and_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let original = "{\n  \"zeta\": 1,\n  \"alpha\": [\n    true\n  ]\n}";
        write(&path, original);

        let doc = read_document(&path).unwrap();
        let rendered = render_document(&doc, 2).unwrap();
        assert_eq!(String::from_utf8(rendered).unwrap(), original);

        let four = String::from_utf8(render_document(&doc, 4).unwrap()).unwrap();
        assert!(four.contains("\n    \"zeta\": 1"));
    }

    #[test]
    fn entity_resolved_directly_or_through_alias() {
        let direct = json!({"Expression": {"SourceRef": {"Entity": "Sales"}}, "Property": "Amount"});
        let aliased = json!({"Expression": {"SourceRef": {"Source": "s"}}, "Property": "Amount"});
        let missing = json!({"Property": "Amount"});

        let filter = json!({
            "From": [{"Name": "s", "Entity": "Sales", "Type": 0}],
            "Where": []
        });
        let scope = alias_scope(&filter, &AliasScope::new()).unwrap();

        assert_eq!(field_source_entity(&direct, &AliasScope::new()), Some("Sales"));
        assert_eq!(field_source_entity(&aliased, &scope), Some("Sales"));
        assert_eq!(field_source_entity(&aliased, &AliasScope::new()), None);
        assert_eq!(field_source_entity(&missing, &scope), None);
    }

    #[test]
    fn hierarchy_entity_direct_or_through_variation() {
        let direct = json!({"Expression": {"Hierarchy": {
            "Expression": {"SourceRef": {"Entity": "Date"}}, "Hierarchy": "Date Hierarchy"
        }}, "Level": "Year"});
        let variation = json!({"Expression": {"Hierarchy": {
            "Expression": {"PropertyVariationSource": {
                "Expression": {"SourceRef": {"Entity": "Orders"}}, "Name": "Variation", "Property": "OrderDate"
            }},
            "Hierarchy": "Date Hierarchy"
        }}, "Level": "Month"});

        assert_eq!(hierarchy_source_entity(&direct, &AliasScope::new()), Some("Date"));
        assert_eq!(hierarchy_source_entity(&variation, &AliasScope::new()), Some("Orders"));
        assert_eq!(hierarchy_source_entity(&json!({"Level": "Year"}), &AliasScope::new()), None);
    }

    #[test]
    fn alias_scope_requires_from_and_where() {
        let no_where = json!({"From": [{"Name": "s", "Entity": "Sales"}]});
        assert!(alias_scope(&no_where, &AliasScope::new()).is_none());
        assert!(alias_scope(&json!("text"), &AliasScope::new()).is_none());
    }

    #[test]
    fn report_name_from_nearest_report_folder() {
        let path = Path::new("/work/Finance.Report/definition/pages/p1/page.json");
        assert_eq!(report_name(path).as_deref(), Some("Finance"));
        assert_eq!(report_name(Path::new("/work/definition/report.json")), None);
    }

    #[test]
    fn page_names_for_visuals_and_bookmarks() {
        let dir = tempfile::tempdir().unwrap();
        let definition = dir.path().join("Demo.Report").join("definition");
        write(
            &definition.join("pages/s1/page.json"),
            r#"{"name": "s1", "displayName": "Summary"}"#,
        );

        let visual = definition.join("pages/s1/visuals/v1/visual.json");
        let bookmark = definition.join("bookmarks/b1.bookmark.json");
        let pages_meta = definition.join("pages/pages.json");

        let mut resolver = PageResolver::new("NA");
        assert_eq!(resolver.resolve(&visual, &json!({})), "Summary");
        assert_eq!(
            resolver.resolve(&bookmark, &json!({"explorationState": {"activeSection": "s1"}})),
            "Summary"
        );
        assert_eq!(resolver.resolve(&bookmark, &json!({})), "NA");
        assert_eq!(resolver.resolve(&pages_meta, &json!({})), "NA");
        assert_eq!(
            resolver.resolve(&definition.join("pages/missing/page.json"), &json!({})),
            "NA"
        );
    }
}
