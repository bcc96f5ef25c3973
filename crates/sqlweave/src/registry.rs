use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of entity schemas.
///
/// Entities are registered once and never mutated; lookups hand out shared
/// `Arc<Entity>` handles.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entities: HashMap<String, Arc<Entity>>,
    order: Vec<String>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity. Names must be unique.
    pub fn register(&mut self, entity: Arc<Entity>) -> OrmResult<Arc<Entity>> {
        let name = entity.name().to_string();
        if self.entities.contains_key(&name) {
            return Err(OrmError::Config(format!(
                "entity `{name}` is already registered"
            )));
        }
        self.order.push(name.clone());
        self.entities.insert(name, Arc::clone(&entity));
        Ok(entity)
    }

    /// Get an entity by name.
    pub fn get(&self, name: &str) -> Option<&Arc<Entity>> {
        self.entities.get(name)
    }

    /// Get an entity by name, failing with a configuration error.
    pub fn entity(&self, name: &str) -> OrmResult<&Arc<Entity>> {
        self.get(name)
            .ok_or_else(|| OrmError::Config(format!("unknown entity `{name}`")))
    }

    /// Registered entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.order.iter().filter_map(|name| self.entities.get(name))
    }

    /// Get the number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Check that every `references` target names a registered entity and field.
    pub fn check_references(&self) -> OrmResult<()> {
        for entity in self.entities() {
            for field in entity.fields() {
                let Some((target, target_field)) = &field.references else {
                    continue;
                };
                let target = self.get(target).ok_or_else(|| {
                    OrmError::invalid_field(
                        entity.name(),
                        &field.name,
                        format!("references unknown entity `{target}`"),
                    )
                })?;
                if !target.has_field(target_field) {
                    return Err(OrmError::invalid_field(
                        entity.name(),
                        &field.name,
                        format!(
                            "references unknown field `{}.{target_field}`",
                            target.name()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Field pairs `(from field, to field)` linking `from` to `to` through
/// `references` metadata, looking in both directions.
pub fn reference_pairs(from: &Entity, to: &Entity) -> Vec<(String, String)> {
    let forward: Vec<(String, String)> = from
        .fields()
        .iter()
        .filter_map(|f| match &f.references {
            Some((entity, field)) if entity == to.name() => Some((f.name.clone(), field.clone())),
            _ => None,
        })
        .collect();
    if !forward.is_empty() {
        return forward;
    }
    to.fields()
        .iter()
        .filter_map(|f| match &f.references {
            Some((entity, field)) if entity == from.name() => Some((field.clone(), f.name.clone())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Field, FieldType};

    fn entities() -> (Arc<Entity>, Arc<Entity>) {
        let user = Entity::builder("User")
            .table("user")
            .field(Field::new("id", FieldType::Integer).primary())
            .build()
            .unwrap();
        let image = Entity::builder("Image")
            .table("image")
            .field(Field::new("id", FieldType::Integer).primary())
            .field(Field::new("userId", FieldType::Integer).references("User", "id"))
            .build()
            .unwrap();
        (user, image)
    }

    #[test]
    fn rejects_duplicate_names() {
        let (user, _) = entities();
        let mut registry = Registry::new();
        registry.register(Arc::clone(&user)).unwrap();
        assert!(registry.register(user).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reference_pairs_work_in_both_directions() {
        let (user, image) = entities();
        assert_eq!(
            reference_pairs(&image, &user),
            vec![("userId".to_string(), "id".to_string())]
        );
        assert_eq!(
            reference_pairs(&user, &image),
            vec![("id".to_string(), "userId".to_string())]
        );
    }

    #[test]
    fn check_references_reports_missing_target() {
        let (_, image) = entities();
        let mut registry = Registry::new();
        registry.register(image).unwrap();
        let err = registry.check_references().unwrap_err();
        assert!(err.to_string().starts_with("Image: invalid field `userId`"));
    }
}
