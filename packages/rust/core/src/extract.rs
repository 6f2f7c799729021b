//! Field extraction from a single PBIR document.
//!
//! The extractor walks the JSON tree and collects two kinds of items:
//! references to a table column or measure (`Column` / `Measure` nodes, and
//! `HierarchyLevel` nodes, reported as their level), and
//! report-level measure definitions (`entities[].measures[]`). The usage
//! context of a reference is the innermost enclosing visual, page binding,
//! filter configuration, or bookmark state.

use serde_json::Value;

use crate::document::{AliasScope, alias_scope, field_source_entity, hierarchy_source_entity};

/// A single item extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedField {
    /// A visual, filter, or bookmark referencing `table[column]`.
    Reference {
        table: String,
        column: String,
        used_in: Option<String>,
    },
    /// A measure defined in the report's extensions.
    Definition {
        table: String,
        measure: String,
        expression: Option<String>,
        used_in: Option<String>,
    },
}

/// Extract every field reference and measure definition from `doc`.
pub fn extract_fields(doc: &Value) -> Vec<ExtractedField> {
    let mut extractor = Extractor { out: Vec::new() };
    extractor.walk(doc, None, &AliasScope::new());
    extractor.out
}

struct Extractor {
    out: Vec<ExtractedField>,
}

impl Extractor {
    fn walk<'v>(&mut self, value: &'v Value, context: Option<&'v str>, aliases: &AliasScope) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    match key.as_str() {
                        "visual" => {
                            let ctx = child
                                .get("visualType")
                                .and_then(Value::as_str)
                                .unwrap_or("visual");
                            self.walk(child, Some(ctx), aliases);
                        }
                        "pageBinding" => {
                            let ctx = child
                                .get("type")
                                .and_then(Value::as_str)
                                .unwrap_or("Drillthrough");
                            self.walk(child, Some(ctx), aliases);
                        }
                        "filterConfig" => self.walk(child, Some("Filters"), aliases),
                        "explorationState" => self.walk(child, Some("Bookmarks"), aliases),
                        "entities" => self.definitions(child, context, aliases),
                        "Column" | "Measure" if child.is_object() => {
                            let table = field_source_entity(child, aliases);
                            let column = child.get("Property").and_then(Value::as_str);
                            self.reference(table, column, context);
                        }
                        "HierarchyLevel" if child.is_object() => {
                            let table = hierarchy_source_entity(child, aliases);
                            let level = child.get("Level").and_then(Value::as_str);
                            self.reference(table, level, context);
                        }
                        "filter" => match alias_scope(child, aliases) {
                            Some(scope) => self.walk(child, context, &scope),
                            None => self.walk(child, context, aliases),
                        },
                        _ => self.walk(child, context, aliases),
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.walk(item, context, aliases);
                }
            }
            _ => {}
        }
    }

    fn reference(&mut self, table: Option<&str>, column: Option<&str>, context: Option<&str>) {
        // Incomplete references are not rows.
        if let (Some(table), Some(column)) = (table, column) {
            self.out.push(ExtractedField::Reference {
                table: table.to_string(),
                column: column.to_string(),
                used_in: context.map(str::to_string),
            });
        }
    }

    fn definitions<'v>(&mut self, entities: &'v Value, context: Option<&'v str>, aliases: &AliasScope) {
        let Some(entities) = entities.as_array() else {
            self.walk(entities, context, aliases);
            return;
        };

        for entity in entities {
            let Some(table) = entity.get("name").and_then(Value::as_str) else {
                continue;
            };
            let measures = entity
                .get("measures")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for measure in measures {
                let Some(name) = measure.get("name").and_then(Value::as_str) else {
                    continue;
                };
                self.out.push(ExtractedField::Definition {
                    table: table.to_string(),
                    measure: name.to_string(),
                    expression: measure
                        .get("expression")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    used_in: context.map(str::to_string),
                });
            }
        }
    }
}
