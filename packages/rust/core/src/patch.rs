//! In-place renaming of table and column references in a parsed document.
//!
//! Two passes run over each document. The entity pass renames tables
//! (`Entity` values, `entities[].name`, and table references in DAX
//! `expression` strings). The property pass then renames columns and
//! measures, keyed by the already-renamed table, including the names of
//! measures defined in `entities[].measures[]` and the bare `[Measure]`
//! references to them in sibling measure expressions.

use std::collections::HashMap;

use serde_json::Value;

use crate::dax;
use crate::document::{AliasScope, alias_scope, field_source_entity, hierarchy_source_entity};
use crate::mapping::{MatchLog, RenameMap};

/// What a patch changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    /// At least one table reference was renamed.
    pub entities_changed: bool,
    /// At least one column or measure reference was renamed.
    pub properties_changed: bool,
}

impl PatchOutcome {
    /// Whether the document needs rewriting.
    pub fn changed(&self) -> bool {
        self.entities_changed || self.properties_changed
    }
}

/// Apply `renames` to `doc`, recording every watched identifier in `log`.
pub fn patch_document(doc: &mut Value, renames: &RenameMap, log: &mut MatchLog) -> PatchOutcome {
    let mut patcher = Patcher {
        renames,
        log,
        outcome: PatchOutcome::default(),
    };
    patcher.rename_entities(doc);
    patcher.rename_properties(doc, &AliasScope::new());
    patcher.outcome
}

struct Patcher<'a> {
    renames: &'a RenameMap,
    log: &'a mut MatchLog,
    outcome: PatchOutcome,
}

impl Patcher<'_> {
    // --- entity pass ---

    fn rename_entities(&mut self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    match key.as_str() {
                        "Entity" if child.is_string() => self.rename_entity(child),
                        "entities" if child.is_array() => {
                            if let Value::Array(items) = child {
                                for item in items {
                                    if let Some(name) = item.get_mut("name") {
                                        self.rename_entity(name);
                                    }
                                    self.rename_entities(item);
                                }
                            }
                        }
                        "expression" if child.is_string() => self.rewrite_tables(child),
                        _ => self.rename_entities(child),
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.rename_entities(item);
                }
            }
            _ => {}
        }
    }

    fn rename_entity(&mut self, value: &mut Value) {
        let renames = self.renames;
        let Value::String(name) = value else {
            return;
        };

        if renames.watches_table(name) {
            self.log.table(name);
        }
        if let Some(new) = renames.tables.get(name.as_str()) {
            if *new != *name {
                *name = new.clone();
                self.outcome.entities_changed = true;
            }
        }
    }

    fn rewrite_tables(&mut self, value: &mut Value) {
        let renames = self.renames;
        let Value::String(expr) = value else {
            return;
        };

        for token in dax::table_tokens(expr) {
            if let Some(watched) = renames.watched_table(&token) {
                self.log.table(watched);
            }
        }

        let rewritten = dax::rename_tables(expr, &renames.tables);
        if rewritten != *expr {
            *expr = rewritten;
            self.outcome.entities_changed = true;
        }
    }

    // --- property pass ---

    fn rename_properties(&mut self, value: &mut Value, aliases: &AliasScope) {
        match value {
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    match key.as_str() {
                        "Column" | "Measure" if child.is_object() => {
                            self.rename_field(child, aliases);
                        }
                        "HierarchyLevel" if child.is_object() => {
                            self.rename_level(child, aliases);
                        }
                        "expression" if child.is_string() => self.rewrite_columns(child),
                        "entities" if child.is_array() => {
                            if let Value::Array(items) = child {
                                let mut measures = HashMap::new();
                                for item in items.iter_mut() {
                                    measures.extend(self.rename_measure_definitions(item));
                                }
                                for item in items.iter_mut() {
                                    if !measures.is_empty() {
                                        self.rewrite_measure_references(item, &measures);
                                    }
                                    self.rename_properties(item, aliases);
                                }
                            }
                        }
                        "filter" => match alias_scope(child, aliases) {
                            Some(scope) => self.rename_properties(child, &scope),
                            None => self.rename_properties(child, aliases),
                        },
                        _ => self.rename_properties(child, aliases),
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.rename_properties(item, aliases);
                }
            }
            _ => {}
        }
    }

    fn rename_field(&mut self, field: &mut Value, aliases: &AliasScope) {
        let Some(entity) = field_source_entity(field, aliases).map(str::to_string) else {
            return;
        };
        if let Some(Value::String(property)) = field.get_mut("Property") {
            self.rename_column(entity, property);
        }
    }

    fn rename_level(&mut self, level: &mut Value, aliases: &AliasScope) {
        let Some(entity) = hierarchy_source_entity(level, aliases).map(str::to_string) else {
            return;
        };
        if let Some(Value::String(name)) = level.get_mut("Level") {
            self.rename_column(entity, name);
        }
    }

    /// Rename the report-level measures of an entity. Returns `old → new`
    /// for every measure whose name changed.
    fn rename_measure_definitions(&mut self, entity: &mut Value) -> HashMap<String, String> {
        let mut renamed = HashMap::new();
        let Some(table) = entity.get("name").and_then(Value::as_str).map(str::to_string) else {
            return renamed;
        };
        let Some(Value::Array(measures)) = entity.get_mut("measures") else {
            return renamed;
        };

        for measure in measures {
            if let Some(Value::String(name)) = measure.get_mut("name") {
                let old = name.clone();
                self.rename_column(table.clone(), name);
                if *name != old {
                    renamed.insert(old, name.clone());
                }
            }
        }
        renamed
    }

    /// Point bare `[Measure]` references in measure expressions at renamed
    /// measures.
    fn rewrite_measure_references(&mut self, entity: &mut Value, measures: &HashMap<String, String>) {
        let Some(Value::Array(items)) = entity.get_mut("measures") else {
            return;
        };

        for measure in items {
            if let Some(Value::String(expr)) = measure.get_mut("expression") {
                let rewritten = dax::rename_measures(expr, measures);
                if rewritten != *expr {
                    *expr = rewritten;
                    self.outcome.properties_changed = true;
                }
            }
        }
    }

    fn rename_column(&mut self, table: String, column: &mut String) {
        let renames = self.renames;
        let key = (table, column.clone());
        if let Some(new) = renames.columns.get(&key) {
            self.log.column(&key.0, &key.1);
            if *new != *column {
                *column = new.clone();
                self.outcome.properties_changed = true;
            }
        }
    }

    fn rewrite_columns(&mut self, value: &mut Value) {
        let renames = self.renames;
        let Value::String(expr) = value else {
            return;
        };

        for (table, column) in dax::column_references(expr) {
            if let Some(((table, column), _)) = dax::find_column(&renames.columns, &table, &column) {
                self.log.column(table, column);
            }
        }

        let rewritten = dax::rename_columns(expr, &renames.columns);
        if rewritten != *expr {
            *expr = rewritten;
            self.outcome.properties_changed = true;
        }
    }
}
