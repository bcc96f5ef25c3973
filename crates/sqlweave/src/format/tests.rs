use super::*;
use crate::client::RawRow;
use crate::entity::{Entity, Field, FieldType};
use crate::expr::Condition;
use crate::options::OrderBy;
use crate::query::{Join, query};
use crate::raw::Raw;
use crate::row::{self, Record};
use crate::sql::Statement;
use serde_json::{Value, json};
use std::sync::Arc;

fn user() -> Arc<Entity> {
    Entity::builder("User")
        .table("user")
        .field(Field::new("id", FieldType::Integer).primary())
        .field(Field::new("name", FieldType::Text))
        .field(Field::new("imageId", FieldType::Integer).references("Image", "id"))
        .build()
        .unwrap()
}

fn image() -> Arc<Entity> {
    Entity::builder("Image")
        .table("image")
        .field(Field::new("id", FieldType::Integer).primary())
        .field(Field::new("path", FieldType::Text))
        .build()
        .unwrap()
}

fn record(value: Value) -> Record {
    value.as_object().unwrap().clone()
}

fn select(query: &Query) -> Statement {
    SqlFormatter::new(query).unwrap().format_select().unwrap()
}

// ── columns ──────────────────────────────────────────────────────────────

#[test]
fn columns_and_aliases_line_up() {
    let q = query(&user()).fields(["id", "name"]);
    let (columns, aliases) = SqlFormatter::new(&q).unwrap().format_columns().unwrap();
    assert_eq!(columns.text(), "user.id, user.name");
    assert_eq!(aliases, vec!["id", "name"]);

    let row = RawRow::Positional(vec![json!(1), json!("foo")]);
    let unzipped = row::unzip(row, &aliases).unwrap();
    assert_eq!(Value::Object(unzipped), json!({"id": 1, "name": "foo"}));
}

#[test]
fn every_field_is_selected_by_default() {
    let q = query(&user());
    let (columns, aliases) = SqlFormatter::new(&q).unwrap().format_columns().unwrap();
    assert_eq!(columns.text(), "user.id, user.name, user.imageId");
    assert_eq!(aliases, vec!["id", "name", "imageId"]);
}

#[test]
fn aliased_columns() {
    let image = image();
    let q = query(&user()).fields([
        Column::field("id"),
        Column::aliased("userName", "name"),
        Column::aliased("total", Raw::new("count(*)")),
        Column::aliased("path", query(&image).fields(["path"]).limit(1)),
    ]);
    let statement = select(&q);
    assert_eq!(
        statement.sql,
        "SELECT user.id, user.name AS userName, count(*) AS total, \
         (SELECT image.path FROM image LIMIT 1) AS path FROM user"
    );
    assert_eq!(statement.aliases, vec!["id", "userName", "total", "path"]);
}

#[test]
fn non_plain_identifiers_are_quoted() {
    let entity = Entity::builder("Account")
        .table("Account Book")
        .field(Field::new("owner", FieldType::Text).column("owner name"))
        .build()
        .unwrap();
    let statement = select(&query(&entity));
    assert_eq!(
        statement.sql,
        "SELECT \"Account Book\".\"owner name\" FROM \"Account Book\""
    );
}

// ── select ───────────────────────────────────────────────────────────────

#[test]
fn select_with_every_clause() {
    let q = query(&user())
        .distinct()
        .fields(["id"])
        .and_where(Condition::equal_to("id", 1))
        .group_by(["id"])
        .and_having(Raw::with_values("count(*) > ?", vec![json!(1)]))
        .order_by(OrderBy::desc("name"))
        .limit(10)
        .offset(5);
    let statement = select(&q);
    assert_eq!(
        statement.sql,
        "SELECT DISTINCT user.id FROM user WHERE user.id = ? GROUP BY user.id \
         HAVING count(*) > ? ORDER BY user.name DESC LIMIT 10 OFFSET 5"
    );
    assert_eq!(statement.values, vec![json!(1), json!(1)]);
    assert_eq!(statement.aliases, vec!["id"]);
}

#[test]
fn where_items_are_anded() {
    let q = query(&user())
        .fields(["id"])
        .and_where(Condition::equal_to("id", 1))
        .and_where(Condition::equal_to("name", "foo"));
    let statement = select(&q);
    assert_eq!(
        statement.sql,
        "SELECT user.id FROM user WHERE (user.id = ? AND user.name = ?)"
    );
    assert_eq!(statement.values, vec![json!(1), json!("foo")]);
}

#[test]
fn first_forces_limit_one() {
    let q = query(&user()).fields(["id"]).limit(10).first();
    assert_eq!(select(&q).sql, "SELECT user.id FROM user LIMIT 1");
}

#[test]
fn schema_qualifies_the_table() {
    let entity = Entity::builder("Log")
        .table("log")
        .schema("audit")
        .field(Field::new("id", FieldType::Integer))
        .build()
        .unwrap();
    let statement = select(&query(&entity));
    assert_eq!(statement.sql, "SELECT log.id FROM audit.log");
}

#[test]
fn alias_qualifies_every_column() {
    let q = query(&user())
        .alias("u")
        .and_where(Condition::equal_to("id", 1))
        .order_by("name");
    assert_eq!(
        select(&q).sql,
        "SELECT u.id, u.name, u.imageId FROM user AS u WHERE u.id = ? ORDER BY u.name ASC"
    );
}

#[test]
fn locking_clauses() {
    let q = query(&user()).fields(["id"]).for_update().of(["user"]).no_wait();
    assert_eq!(
        select(&q).sql,
        "SELECT user.id FROM user FOR UPDATE OF user NOWAIT"
    );

    let q = query(&user()).fields(["id"]).for_share().skip_locked();
    assert_eq!(
        select(&q).sql,
        "SELECT user.id FROM user FOR SHARE SKIP LOCKED"
    );

    // modifiers alone do nothing
    let q = query(&user()).fields(["id"]).skip_locked().no_wait();
    assert_eq!(select(&q).sql, "SELECT user.id FROM user");
}

#[test]
fn defaults_apply_under_query_options() {
    let mut defaults = QueryOptions::new();
    defaults.limit(50).fields(["id"]);
    let defaults = Arc::new(defaults);

    let q = query(&user()).with_defaults(Arc::clone(&defaults));
    assert_eq!(select(&q).sql, "SELECT user.id FROM user LIMIT 50");

    let q = query(&user()).with_defaults(defaults).limit(5);
    assert_eq!(select(&q).sql, "SELECT user.id FROM user LIMIT 5");
}

#[test]
fn count_keeps_only_the_filter() {
    let q = query(&user())
        .and_where(Condition::equal_to("id", 1))
        .order_by("name")
        .limit(5);
    let statement = SqlFormatter::new(&q).unwrap().format_count().unwrap();
    assert_eq!(
        statement.sql,
        "SELECT COUNT(*) AS count FROM user WHERE user.id = ?"
    );
    assert_eq!(statement.aliases, vec!["count"]);
}

// ── joins ────────────────────────────────────────────────────────────────

#[test]
fn join_on_references() {
    let q = query(&user()).fields(["id"]).left_join(
        query(&image())
            .fields(["path"])
            .and_where(Condition::like("path", "%.png")),
    );
    let statement = select(&q);
    assert_eq!(
        statement.sql,
        "SELECT user.id, image.path AS \"image.path\" FROM user \
         LEFT JOIN image ON image.id = user.imageId AND image.path LIKE ?"
    );
    assert_eq!(statement.values, vec![json!("%.png")]);
    assert_eq!(statement.aliases, vec!["id", "image.path"]);

    let row = RawRow::Positional(vec![json!(1), json!("a.png")]);
    let unzipped = row::unzip(row, &statement.aliases).unwrap();
    assert_eq!(
        Value::Object(unzipped),
        json!({"id": 1, "image": {"path": "a.png"}})
    );
}

#[test]
fn join_with_alias_and_explicit_pairs() {
    let q = query(&user())
        .fields(["id"])
        .join(Join::inner(query(&image())).alias("img").on("imageId", "id"));
    let statement = select(&q);
    assert_eq!(
        statement.sql,
        "SELECT user.id, img.id AS \"img.id\", img.path AS \"img.path\" FROM user \
         INNER JOIN image AS img ON img.id = user.imageId"
    );
    assert_eq!(statement.aliases, vec!["id", "img.id", "img.path"]);
}

#[test]
fn joined_queries_carry_their_defaults() {
    use crate::options::QueryOptions;

    let mut defaults = QueryOptions::new();
    defaults
        .fields(["path"])
        .and_where(Condition::is_not_null("path"));
    let images = query(&image()).with_defaults(Arc::new(defaults));

    let sub = select(&images);
    assert_eq!(
        sub.sql,
        "SELECT image.path FROM image WHERE image.path IS NOT NULL"
    );

    let q = query(&user()).fields(["id"]).left_join(images);
    let statement = select(&q);
    assert_eq!(
        statement.sql,
        "SELECT user.id, image.path AS \"image.path\" FROM user \
         LEFT JOIN image ON image.id = user.imageId AND image.path IS NOT NULL"
    );
    assert_eq!(statement.aliases, vec!["id", "image.path"]);
}

#[test]
fn join_values_precede_where_values() {
    let q = query(&user())
        .fields(["id"])
        .and_where(Condition::equal_to("name", "foo"))
        .left_join(query(&image()).fields(["id"]).and_where(Condition::equal_to("path", "p")));
    let statement = select(&q);
    assert_eq!(statement.values, vec![json!("p"), json!("foo")]);
    assert!(statement.validate().is_ok());
}

#[test]
fn join_without_reference_fails() {
    let tag = Entity::builder("Tag")
        .table("tag")
        .field(Field::new("id", FieldType::Integer))
        .build()
        .unwrap();
    let q = query(&user()).left_join(query(&tag));
    let err = SqlFormatter::new(&q).unwrap().format_select().unwrap_err();
    assert_eq!(
        err.to_string(),
        "Configuration error: User: no reference to join `Tag` on"
    );
}

// ── insert ───────────────────────────────────────────────────────────────

#[test]
fn insert_returns_selected_fields() {
    let q = query(&user()).fields(["id"]);
    let statement = SqlFormatter::new(&q)
        .unwrap()
        .format_insert(&[record(json!({"id": 1, "name": "foo"}))])
        .unwrap();
    assert_eq!(
        statement.sql,
        "INSERT INTO user (id, name) VALUES (?, ?) RETURNING user.id"
    );
    assert_eq!(statement.values, vec![json!(1), json!("foo")]);
    assert_eq!(statement.aliases, vec!["id"]);
}

#[test]
fn insert_ignores_unknown_keys_and_keeps_row_order() {
    let q = query(&user()).fields(["id"]);
    let rows = [
        record(json!({"name": "a", "extra": true, "id": 1})),
        record(json!({"name": "b", "extra": false, "id": 2})),
    ];
    let statement = SqlFormatter::new(&q).unwrap().format_insert(&rows).unwrap();
    assert_eq!(
        statement.sql,
        "INSERT INTO user (name, id) VALUES (?, ?), (?, ?) RETURNING user.id"
    );
    assert_eq!(
        statement.values,
        vec![json!("a"), json!(1), json!("b"), json!(2)]
    );
}

#[test]
fn insert_rows_missing_a_column_fail_validation() {
    let q = query(&user()).fields(["id"]);
    let rows = [
        record(json!({"id": 1, "name": "a"})),
        record(json!({"id": 2})),
    ];
    let statement = SqlFormatter::new(&q).unwrap().format_insert(&rows).unwrap();
    assert_eq!(statement.placeholder_count(), 4);
    assert_eq!(statement.values.len(), 3);
    assert!(statement.validate().is_err());
}

#[test]
fn insert_from_sources() {
    let q = query(&user()).fields(["id"]);
    let formatter = SqlFormatter::new(&q).unwrap();

    let raw = Raw::with_values("VALUES (?, ?)", vec![json!(1), json!("foo")]);
    let statement = formatter.format_insert_from(&raw.into()).unwrap();
    assert_eq!(
        statement.sql,
        "INSERT INTO user VALUES (?, ?) RETURNING user.id"
    );
    assert_eq!(statement.values, vec![json!(1), json!("foo")]);

    let source = query(&image())
        .fields(["id"])
        .and_where(Condition::equal_to("path", "a.png"));
    let statement = formatter.format_insert_from(&source.into()).unwrap();
    assert_eq!(
        statement.sql,
        "INSERT INTO user SELECT image.id FROM image WHERE image.path = ? RETURNING user.id"
    );
    assert_eq!(statement.values, vec![json!("a.png")]);
}

#[test]
fn inserts_are_split_into_batches() {
    let q = query(&user()).fields(["id"]).batch_size(2);
    let rows: Vec<Record> = (1..=5)
        .map(|i| record(json!({"id": i, "name": format!("u{i}")})))
        .collect();
    let statements = SqlFormatter::new(&q).unwrap().format_inserts(&rows).unwrap();
    assert_eq!(statements.len(), 3);
    assert_eq!(statements[0].values.len(), 4);
    assert_eq!(statements[2].values, vec![json!(5), json!("u5")]);
    for statement in &statements {
        assert!(statement.validate().is_ok());
    }
}

#[test]
fn batches_without_size_or_rows() {
    let q = query(&user());
    let formatter = SqlFormatter::new(&q).unwrap();
    assert!(formatter.format_inserts(&[]).unwrap().is_empty());
    assert_eq!(formatter.batches(&[1, 2, 3]).unwrap(), vec![&[1, 2, 3][..]]);
    assert!(formatter.format_insert(&[]).is_err());
}

#[test]
fn zero_batch_size_is_rejected() {
    let q = query(&user()).batch_size(0);
    let err = SqlFormatter::new(&q).unwrap().batches(&[1]).unwrap_err();
    assert!(matches!(err, OrmError::InvalidOption { ref option, .. } if option == "batchSize"));
}

// ── update ───────────────────────────────────────────────────────────────

#[test]
fn update_defaults_to_the_primary_key() {
    let q = query(&user()).fields(["id"]);
    let statement = SqlFormatter::new(&q)
        .unwrap()
        .format_update(&record(json!({"id": 1, "name": "bar"})))
        .unwrap();
    assert_eq!(
        statement.sql,
        "UPDATE user SET name = ? WHERE user.id = ? RETURNING user.id"
    );
    assert_eq!(statement.values, vec![json!("bar"), json!(1)]);
}

#[test]
fn update_uses_the_where_option() {
    let q = query(&user())
        .alias("u")
        .fields(["id"])
        .and_where(Condition::equal_to("name", "foo"));
    let statement = SqlFormatter::new(&q)
        .unwrap()
        .format_update(&record(json!({"id": 9, "name": "bar"})))
        .unwrap();
    assert_eq!(
        statement.sql,
        "UPDATE user AS u SET name = ? WHERE u.name = ? RETURNING u.id"
    );
    assert_eq!(statement.values, vec![json!("bar"), json!("foo")]);
}

#[test]
fn update_without_key_or_filter_has_no_where() {
    let q = query(&user()).fields(["id"]);
    let statement = SqlFormatter::new(&q)
        .unwrap()
        .format_update(&record(json!({"name": "bar"})))
        .unwrap();
    assert_eq!(statement.sql, "UPDATE user SET name = ? RETURNING user.id");
}

#[test]
fn update_needs_a_non_key_field() {
    let q = query(&user());
    let err = SqlFormatter::new(&q)
        .unwrap()
        .format_update(&record(json!({"id": 1, "unknown": 2})))
        .unwrap_err();
    assert_eq!(err.to_string(), "Validation error: User: no fields to update");
}

#[test]
fn batch_update_joins_a_values_list() {
    let q = query(&user()).fields(["id"]);
    let rows = [
        record(json!({"id": 1, "name": "a"})),
        record(json!({"id": 2, "name": "b"})),
    ];
    let statements = SqlFormatter::new(&q).unwrap().format_update_many(&rows).unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0].sql,
        "UPDATE user SET name = v.name FROM (VALUES (?::bigint, ?::text), (?::bigint, ?::text)) \
         AS v(id, name) WHERE user.id = v.id RETURNING user.id"
    );
    assert_eq!(
        statements[0].values,
        vec![json!(1), json!("a"), json!(2), json!("b")]
    );
    assert!(statements[0].validate().is_ok());
}

#[test]
fn batch_update_adds_the_where_option() {
    let q = query(&user())
        .fields(["id"])
        .batch_size(1)
        .and_where(Condition::is_not_null("name"));
    let rows = [
        record(json!({"id": 1, "name": "a"})),
        record(json!({"id": 2, "name": "b"})),
    ];
    let statements = SqlFormatter::new(&q).unwrap().format_update_many(&rows).unwrap();
    assert_eq!(statements.len(), 2);
    assert!(
        statements[1]
            .sql
            .ends_with("WHERE user.id = v.id AND user.name IS NOT NULL RETURNING user.id")
    );
    assert_eq!(statements[1].values, vec![json!(2), json!("b")]);
}

#[test]
fn batch_update_requires_the_primary_key() {
    let q = query(&user());
    let err = SqlFormatter::new(&q)
        .unwrap()
        .format_update_many(&[record(json!({"name": "a"}))])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Validation error: User: batch update records must carry `id`"
    );
}

// ── delete ───────────────────────────────────────────────────────────────

#[test]
fn delete_returns_rows() {
    let q = query(&user())
        .alias("u")
        .fields(["id"])
        .and_where(Condition::equal_to("id", 1));
    let statement = SqlFormatter::new(&q).unwrap().format_delete().unwrap();
    assert_eq!(
        statement.sql,
        "DELETE FROM user AS u WHERE u.id = ? RETURNING u.id"
    );
    assert_eq!(statement.values, vec![json!(1)]);
    assert_eq!(statement.aliases, vec!["id"]);
}

#[test]
fn formatting_is_deterministic() {
    let q = query(&user())
        .and_where(Condition::is_in("id", vec![1, 2]))
        .left_join(query(&image()));
    assert_eq!(select(&q), select(&q));
}
