//! TOML schema configuration.
//!
//! ```toml
//! [defaults]
//! batch_size = 500
//! debug = false
//!
//! [[entities]]
//! name = "User"
//! table = "users"
//! naming = "snake_case"
//!
//! [[entities.fields]]
//! name = "id"
//! type = "integer"
//! primary = true
//!
//! [[entities.fields]]
//! name = "imageId"
//! type = "integer"
//! references = "Image.id"
//! ```
//!
//! Entities are built in file order; an entity may only extend one declared
//! above it.

use crate::entity::{Entity, EntityBuilder, Field, FieldType, NamingStrategy};
use crate::error::{OrmError, OrmResult};
use crate::options::QueryOptions;
use crate::query::Query;
use crate::registry::Registry;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    /// Query option defaults, by option name (`batch_size` or `batchSize`).
    #[serde(default)]
    pub defaults: Map<String, Value>,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityConfig {
    pub name: String,
    pub table: Option<String>,
    pub schema: Option<String>,
    pub naming: Option<String>,
    /// Name of an entity declared earlier whose table and fields are inherited.
    pub extends: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    pub column: Option<String>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub required: bool,
    /// `"Entity.field"`
    pub references: Option<String>,
}

/// Entities and option defaults built from a [`SchemaConfig`].
#[derive(Debug, Clone)]
pub struct Schema {
    pub registry: Registry,
    pub defaults: Arc<QueryOptions>,
}

impl Schema {
    /// A query on the named entity with the configured defaults.
    pub fn query(&self, entity: &str) -> OrmResult<Query> {
        let entity = self.registry.entity(entity)?;
        Ok(Query::new(entity).with_defaults(Arc::clone(&self.defaults)))
    }
}

impl SchemaConfig {
    /// Parse a TOML document.
    pub fn from_toml(raw: &str) -> OrmResult<Self> {
        toml::from_str(raw).map_err(|e| OrmError::Config(format!("invalid schema: {e}")))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OrmError::Config(format!("failed to read schema {}: {e}", path.display()))
        })?;
        Self::from_toml(&raw)
    }

    /// Build every entity, check references and resolve the defaults.
    pub fn build(&self) -> OrmResult<Schema> {
        let mut registry = Registry::new();
        for entity in &self.entities {
            let built = entity.builder(&registry)?.build()?;
            registry.register(built)?;
        }
        registry.check_references()?;

        let mut defaults = QueryOptions::new();
        defaults.set_options(self.defaults.clone())?;

        tracing::debug!(
            target: "sqlweave.config",
            entities = registry.len(),
            defaults = ?defaults.set_names(),
            "schema built"
        );

        Ok(Schema {
            registry,
            defaults: Arc::new(defaults),
        })
    }
}

impl EntityConfig {
    fn builder(&self, registry: &Registry) -> OrmResult<EntityBuilder> {
        let mut builder = match &self.extends {
            Some(parent) => registry
                .get(parent)
                .ok_or_else(|| {
                    OrmError::Config(format!(
                        "{}: extends unknown entity `{parent}`",
                        self.name
                    ))
                })?
                .extend(&self.name),
            None => Entity::builder(&self.name),
        };
        if let Some(table) = &self.table {
            builder = builder.table(table);
        }
        if let Some(schema) = &self.schema {
            builder = builder.schema(schema);
        }
        if let Some(naming) = &self.naming {
            let naming: NamingStrategy = naming
                .parse()
                .map_err(|e: String| OrmError::Config(format!("{}: {e}", self.name)))?;
            builder = builder.naming(naming);
        }
        for field in &self.fields {
            builder = builder.field(field.to_field(&self.name)?);
        }
        Ok(builder)
    }
}

impl FieldConfig {
    fn to_field(&self, entity: &str) -> OrmResult<Field> {
        let field_type: FieldType = self
            .field_type
            .as_deref()
            .ok_or_else(|| OrmError::invalid_field(entity, &self.name, "missing type"))?
            .parse()
            .map_err(|e: String| OrmError::invalid_field(entity, &self.name, e))?;

        let mut field = Field::new(&self.name, field_type);
        if let Some(column) = &self.column {
            field = field.column(column);
        }
        if self.primary {
            field = field.primary();
        }
        if self.unique {
            field = field.unique();
        }
        if self.required {
            field = field.required();
        }
        if let Some(target) = &self.references {
            let (target_entity, target_field) = target.split_once('.').ok_or_else(|| {
                OrmError::invalid_field(
                    entity,
                    &self.name,
                    format!("references `{target}` is not `Entity.field`"),
                )
            })?;
            field = field.references(target_entity, target_field);
        }
        Ok(field)
    }
}
