//! Entity definitions: tables, fields and field references.
//!
//! An [`Entity`] is built once through [`EntityBuilder`] and shared as
//! `Arc<Entity>`. It never changes after construction; deriving a child entity
//! with [`Entity::extend`] copies the field definitions into a new owner.

use crate::error::{OrmError, OrmResult};
use crate::ident::{self, Ident};
use heck::ToSnakeCase;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The logical type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Json,
    Date,
    DateTime,
    Uuid,
    Binary,
    Any,
}

impl FieldType {
    /// The PostgreSQL type used to cast untyped parameters, if any.
    pub fn sql_type(&self) -> Option<&'static str> {
        match self {
            FieldType::Text => Some("text"),
            FieldType::Integer => Some("bigint"),
            FieldType::Decimal => Some("numeric"),
            FieldType::Boolean => Some("boolean"),
            FieldType::Json => Some("jsonb"),
            FieldType::Date => Some("date"),
            FieldType::DateTime => Some("timestamptz"),
            FieldType::Uuid => Some("uuid"),
            FieldType::Binary => Some("bytea"),
            FieldType::Any => None,
        }
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" | "string" => Ok(FieldType::Text),
            "integer" => Ok(FieldType::Integer),
            "decimal" | "number" => Ok(FieldType::Decimal),
            "boolean" => Ok(FieldType::Boolean),
            "json" | "jsonb" => Ok(FieldType::Json),
            "date" => Ok(FieldType::Date),
            "dateTime" => Ok(FieldType::DateTime),
            "uuid" => Ok(FieldType::Uuid),
            "binary" => Ok(FieldType::Binary),
            "any" => Ok(FieldType::Any),
            other => Err(format!("invalid type `{other}`")),
        }
    }
}

/// How a field name maps to a column name when no column is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingStrategy {
    /// Column equals the field name.
    #[default]
    Identity,
    /// `firstName` becomes `first_name`.
    SnakeCase,
}

impl NamingStrategy {
    fn column_for(&self, name: &str) -> String {
        match self {
            NamingStrategy::Identity => name.to_string(),
            NamingStrategy::SnakeCase => name.to_snake_case(),
        }
    }
}

impl FromStr for NamingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(NamingStrategy::Identity),
            "snake_case" | "snakeCase" => Ok(NamingStrategy::SnakeCase),
            other => Err(format!("unknown naming strategy `{other}`")),
        }
    }
}

/// A field definition before it is attached to an entity.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    column: Option<String>,
    field_type: FieldType,
    primary: bool,
    unique: bool,
    required: bool,
    references: Option<(String, String)>,
}

impl Field {
    /// Create a field with a name and type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            column: None,
            field_type,
            primary: false,
            unique: false,
            required: false,
            references: None,
        }
    }

    /// Override the column name.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Mark as (part of) the primary key.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Declare that this field references `entity.field`.
    pub fn references(mut self, entity: impl Into<String>, field: impl Into<String>) -> Self {
        self.references = Some((entity.into(), field.into()));
        self
    }
}

/// A field attached to its owning entity, with the column resolved.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub column: Ident,
    pub field_type: FieldType,
    pub primary: bool,
    pub unique: bool,
    pub required: bool,
    /// `(entity, field)` this field points at.
    pub references: Option<(String, String)>,
}

/// An immutable entity schema: name, table, schema and ordered fields.
#[derive(Debug)]
pub struct Entity {
    name: String,
    table: Option<Ident>,
    schema: Option<Ident>,
    naming: NamingStrategy,
    fields: Vec<FieldDef>,
}

impl Entity {
    /// Start building an entity.
    pub fn builder(name: impl Into<String>) -> EntityBuilder {
        EntityBuilder::new(name)
    }

    /// Start a child entity that inherits table, schema, naming and fields.
    ///
    /// The inherited fields belong to the child once it is built.
    pub fn extend(&self, name: impl Into<String>) -> EntityBuilder {
        let mut builder = EntityBuilder::new(name);
        builder.table = self.table.as_ref().map(|t| t.as_str().to_string());
        builder.schema = self.schema.as_ref().map(|s| s.as_str().to_string());
        builder.naming = self.naming;
        builder.fields = self
            .fields
            .iter()
            .map(|f| Field {
                name: f.name.clone(),
                column: Some(f.column.as_str().to_string()),
                field_type: f.field_type,
                primary: f.primary,
                unique: f.unique,
                required: f.required,
                references: f.references.clone(),
            })
            .collect();
        builder
    }

    /// The entity name used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The table, if configured.
    pub fn table(&self) -> Option<&Ident> {
        self.table.as_ref()
    }

    /// The table, or a configuration error naming this entity.
    pub fn require_table(&self) -> OrmResult<&Ident> {
        self.table
            .as_ref()
            .ok_or_else(|| OrmError::MissingTable(self.name.clone()))
    }

    /// The schema, if configured.
    pub fn schema(&self) -> Option<&Ident> {
        self.schema.as_ref()
    }

    /// All fields in definition order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Field names in definition order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Look up a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field by name, failing with an unknown-field error.
    pub fn field(&self, name: &str) -> OrmResult<&FieldDef> {
        self.get_field(name)
            .ok_or_else(|| OrmError::unknown_field(&self.name, name))
    }

    /// Whether the entity defines a field with this name.
    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// Primary-key fields in definition order.
    pub fn primary_fields(&self) -> Vec<&FieldDef> {
        self.fields.iter().filter(|f| f.primary).collect()
    }

    /// `schema.table` or bare `table`.
    pub fn qualified_table(&self) -> OrmResult<String> {
        let table = self.require_table()?;
        Ok(match &self.schema {
            Some(schema) => ident::qualified(schema, table),
            None => table.to_sql(),
        })
    }

    /// A reference to one of this entity's fields.
    pub fn field_ref(self: &Arc<Self>, name: &str) -> OrmResult<FieldRef> {
        self.field(name)?;
        Ok(FieldRef {
            entity: Arc::clone(self),
            name: name.to_string(),
        })
    }
}

/// Builder for [`Entity`].
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    name: String,
    table: Option<String>,
    schema: Option<String>,
    naming: NamingStrategy,
    fields: Vec<Field>,
}

impl EntityBuilder {
    /// Create a builder for an entity with no table and no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            schema: None,
            naming: NamingStrategy::default(),
            fields: Vec::new(),
        }
    }

    /// Set the table name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set the schema name.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the naming strategy for fields without an explicit column.
    pub fn naming(mut self, naming: NamingStrategy) -> Self {
        self.naming = naming;
        self
    }

    /// Add a field, replacing any inherited field with the same name.
    pub fn field(mut self, field: Field) -> Self {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    /// Validate names and build the shared entity.
    pub fn build(self) -> OrmResult<Arc<Entity>> {
        if self.name.is_empty() {
            return Err(OrmError::validation("entity name cannot be empty"));
        }
        let table = self
            .table
            .map(Ident::new)
            .transpose()
            .map_err(|e| OrmError::Validation(format!("{}: table: {e}", self.name)))?;
        let schema = self
            .schema
            .map(Ident::new)
            .transpose()
            .map_err(|e| OrmError::Validation(format!("{}: schema: {e}", self.name)))?;

        let mut fields: Vec<FieldDef> = Vec::with_capacity(self.fields.len());
        for field in self.fields {
            if field.name.is_empty() {
                return Err(OrmError::invalid_field(&self.name, "", "empty field name"));
            }
            let column = field
                .column
                .clone()
                .unwrap_or_else(|| self.naming.column_for(&field.name));
            let column = Ident::new(column)
                .map_err(|e| OrmError::invalid_field(&self.name, &field.name, e.to_string()))?;
            fields.push(FieldDef {
                name: field.name,
                column,
                field_type: field.field_type,
                primary: field.primary,
                unique: field.unique,
                required: field.required,
                references: field.references,
            });
        }

        Ok(Arc::new(Entity {
            name: self.name,
            table,
            schema,
            naming: self.naming,
            fields,
        }))
    }
}

/// A typed pointer to one field of one entity.
#[derive(Clone)]
pub struct FieldRef {
    entity: Arc<Entity>,
    name: String,
}

impl FieldRef {
    /// The owning entity.
    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field definition, resolved through the owning entity.
    pub fn def(&self) -> OrmResult<&FieldDef> {
        self.entity.field(&self.name)
    }
}

impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldRef({}.{})", self.entity.name(), self.name)
    }
}

impl PartialEq for FieldRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entity, &other.entity) && self.name == other.name
    }
}
