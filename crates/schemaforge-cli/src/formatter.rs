//! Output formatters for compiled schemas.

use clap::ValueEnum;
use comfy_table::Table;
use serde::Serialize;

use schemaforge_core::compile::{
    DocumentFieldType, DocumentSchema, GraphSchema, JoinSpec, RelationalSchema, SchemaArtifact,
};
use schemaforge_core::DefaultValue;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format a compiled artifact.
    fn format_artifact(&self, artifact: &SchemaArtifact) -> String;

    /// Format the list of declared classes.
    fn format_classes(&self, classes: &[String]) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_artifact(&self, artifact: &SchemaArtifact) -> String {
        match artifact {
            SchemaArtifact::Document(schema) => format_document(schema),
            SchemaArtifact::Graph(schema) => format_graph(schema),
            SchemaArtifact::Relational(schema) => format_relational(schema),
        }
    }

    fn format_classes(&self, classes: &[String]) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Class"]);
        for class in classes {
            table.add_row(vec![class]);
        }
        table.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_artifact(&self, artifact: &SchemaArtifact) -> String {
        artifact
            .to_json()
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }

    fn format_classes(&self, classes: &[String]) -> String {
        serde_json::to_string_pretty(classes).unwrap_or_else(|_| "[]".to_string())
    }
}

fn format_document(schema: &DocumentSchema) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Field", "Type", "Required", "Unique", "Default", "Enum"]);
    document_rows(&mut table, schema, "");

    let mut output = format!("Document schema: {}\n{}", schema.name, table);
    push_constraints(&mut output, schema.unique_constraints.iter().map(|c| (&c.name, &c.fields)));
    output
}

fn document_rows(table: &mut Table, schema: &DocumentSchema, prefix: &str) {
    for field in &schema.fields {
        let path = format!("{}{}", prefix, field.name);
        table.add_row(vec![
            path.clone(),
            field.field_type.type_name(),
            yes_no(field.required),
            yes_no(field.unique),
            default_text(field.default.as_ref()),
            enum_text(field.enum_values.as_ref()),
        ]);

        let nested = match &field.field_type {
            DocumentFieldType::Nested(nested) => Some(nested.as_ref()),
            DocumentFieldType::Array(element) => match element.as_ref() {
                DocumentFieldType::Nested(nested) => Some(nested.as_ref()),
                _ => None,
            },
            _ => None,
        };
        if let Some(nested) = nested {
            document_rows(table, nested, &format!("{}.", path));
        }
    }
}

fn format_graph(schema: &GraphSchema) -> String {
    let mut sections = Vec::new();
    for node in &schema.nodes {
        let mut table = Table::new();
        table.set_header(vec!["Property", "Type", "Required", "Unique", "Default", "Enum"]);
        for property in &node.properties {
            table.add_row(vec![
                property.name.clone(),
                property.property_type.tag(),
                yes_no(property.required),
                yes_no(property.unique),
                default_text(property.default.as_ref()),
                enum_text(property.enum_values.as_ref()),
            ]);
        }
        let mut section = format!("Node :{}\n{}", node.label, table);
        push_constraints(&mut section, node.unique_constraints.iter().map(|c| (&c.name, &c.fields)));
        sections.push(section);
    }

    if !schema.relationships.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Source", "Type", "Target", "Direction", "Cardinality", "Edge Properties"]);
        for rel in &schema.relationships {
            table.add_row(vec![
                rel.source_label.clone(),
                rel.rel_type.clone(),
                rel.target_label.clone(),
                label(&rel.direction),
                label(&rel.cardinality),
                rel.edge_properties.join(", "),
            ]);
        }
        sections.push(format!("Relationships\n{}", table));
    }
    sections.join("\n\n")
}

fn format_relational(schema: &RelationalSchema) -> String {
    let mut columns = Table::new();
    columns.set_header(vec!["Column", "Type", "Nullable", "Unique", "Primary", "Default", "Enum"]);
    for column in &schema.columns {
        columns.add_row(vec![
            column.name.clone(),
            column.column_type.sql_type(),
            yes_no(column.nullable),
            yes_no(column.unique),
            yes_no(column.primary),
            default_text(column.default.as_ref()),
            enum_text(column.enum_values.as_ref()),
        ]);
    }
    let mut output = format!("Table {} ({})\n{}", schema.name, schema.class, columns);
    push_constraints(&mut output, schema.unique_constraints.iter().map(|c| (&c.name, &c.fields)));

    if !schema.relations.is_empty() {
        let mut relations = Table::new();
        relations.set_header(vec!["Property", "Kind", "Target", "Owner", "Join"]);
        for relation in &schema.relations {
            relations.add_row(vec![
                relation.property.clone(),
                label(&relation.kind),
                relation.target_table.clone(),
                yes_no(relation.owner),
                join_text(relation.join.as_ref()),
            ]);
        }
        output.push_str(&format!("\n\nRelations\n{}", relations));
    }
    output
}

fn push_constraints<'a>(
    output: &mut String,
    constraints: impl Iterator<Item = (&'a String, &'a Vec<String>)>,
) {
    for (name, fields) in constraints {
        output.push_str(&format!("\nunique {} ({})", name, fields.join(", ")));
    }
}

fn join_text(join: Option<&JoinSpec>) -> String {
    match join {
        Some(JoinSpec::Columns(columns)) => columns
            .iter()
            .map(|c| format!("{} -> {}", c.name, c.referenced_column))
            .collect::<Vec<_>>()
            .join(", "),
        Some(JoinSpec::Table(table)) => format!(
            "{}({}, {})",
            table.name.as_deref().unwrap_or("?"),
            table.join_column.as_deref().unwrap_or("?"),
            table.inverse_join_column.as_deref().unwrap_or("?")
        ),
        None => String::new(),
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "" }.to_string()
}

fn default_text(default: Option<&DefaultValue>) -> String {
    default.map(label).unwrap_or_default()
}

fn enum_text(values: Option<&schemaforge_core::EnumValues>) -> String {
    values
        .map(|v| {
            v.values()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .unwrap_or_default()
}

/// Serialized name of a unit-like enum, falling back to its JSON text.
fn label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaforge_core::{ClassDecl, PropertyOptions, Registry, RelationshipOptions, SchemaCompiler};

    fn registry() -> Registry {
        let registry = Registry::new();
        registry.register_entity(ClassDecl::entity("User")).unwrap();
        registry.register_entity(ClassDecl::entity("Order")).unwrap();
        registry
            .register_property("User", "email", PropertyOptions::string().unique())
            .unwrap();
        registry
            .register_relationship(
                "Order",
                "buyer",
                RelationshipOptions::new("PLACED_BY", "User")
                    .with_cardinality(schemaforge_core::Cardinality::ManyToOne),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_table_document() {
        let registry = registry();
        let schema = SchemaCompiler::new(&registry).compile_document("User").unwrap();
        let output = TableFormatter.format_artifact(&SchemaArtifact::Document(schema));
        assert!(output.contains("_id"));
        assert!(output.contains("User_email_unique"));
    }

    #[test]
    fn test_table_relational_lists_relations() {
        let registry = registry();
        let schema = SchemaCompiler::new(&registry).compile_relational("Order").unwrap();
        let output = TableFormatter.format_artifact(&SchemaArtifact::Relational(schema));
        assert!(output.contains("many-to-one"));
        assert!(output.contains("buyer_id -> id"));
    }

    #[test]
    fn test_json_graph() {
        let registry = registry();
        let schema = SchemaCompiler::new(&registry).compile_graph("Order").unwrap();
        let output = JsonFormatter.format_artifact(&SchemaArtifact::Graph(schema));
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["relationships"][0]["type"], "PLACED_BY");
    }

    #[test]
    fn test_default_labels() {
        assert_eq!(default_text(Some(&DefaultValue::AutoUuid)), "auto_uuid");
        assert_eq!(yes_no(false), "");
    }
}
