//! CRUD Operations - Create, Read, Update, Delete operations for entities
//!
//! Statements use `:column` placeholders (`:set_column`/`:key_column` for
//! UPDATE and DELETE) and run in their own transaction.
//! Successful writes refresh the context's saved-object tracker; `update`
//! only writes columns that changed since the last tracked state.

use async_trait::async_trait;
use tracing::debug;

use super::core_trait::{Entity, FieldMeta, IdGeneration};
use super::descriptor::{descriptor_of, EntityDescriptor};
use crate::backends::{DatabaseValue, SqlDialect};
use crate::database::OrmContext;
use crate::error::{DatabaseError, OrmError, OrmResult};
use crate::query::condition::column;
use crate::query::QueryBuilder;
use crate::sql::NamedArg;

/// Persistence operations available on every entity
#[async_trait]
pub trait CrudOperations: Entity {
    /// INSERT this entity, scanning database-generated keys back into it
    async fn insert(&mut self, ctx: &OrmContext) -> OrmResult<()>;

    /// UPDATE the columns that changed since the entity was last saved or
    /// loaded; no statement runs when nothing changed
    async fn update(&mut self, ctx: &OrmContext) -> OrmResult<()>;

    /// `update` for entities already saved in this context, `insert` otherwise
    async fn save(&mut self, ctx: &OrmContext) -> OrmResult<()>;

    /// DELETE by primary key
    async fn delete(&self, ctx: &OrmContext) -> OrmResult<u64>;

    /// Load one entity by its single-column primary key
    async fn find_by_id<V>(ctx: &OrmContext, id: V) -> OrmResult<Self>
    where
        V: Into<DatabaseValue> + Send;
}

#[async_trait]
impl<E: Entity> CrudOperations for E {
    async fn insert(&mut self, ctx: &OrmContext) -> OrmResult<()> {
        let descriptor = descriptor_of::<E>()?;
        let dialect = ctx.dialect();

        let mut entity = self.clone();
        entity.pre_insert()?;
        assign_application_id(&descriptor, &mut entity)?;

        let generated = generated_keys(&descriptor, &entity);
        let columns: Vec<&FieldMeta> = descriptor
            .fields()
            .iter()
            .filter(|field| field.is_writable())
            .filter(|field| !generated.iter().any(|g| g.column == field.column))
            .collect();

        let args: Vec<NamedArg> = columns
            .iter()
            .map(|field| {
                let value = entity.field_value(field.name).unwrap_or(DatabaseValue::Null);
                NamedArg::new(field.column, value)
            })
            .collect();

        let mut sql = insert_sql(descriptor.table(), &columns, dialect);
        let returning = !generated.is_empty() && dialect.supports_returning();
        if returning {
            let names: Vec<&str> = generated.iter().map(|field| field.column).collect();
            sql.push_str(&format!(" RETURNING {}", names.join(", ")));
        }
        debug!(table = %descriptor.table(), columns = columns.len(), generated = generated.len(), "inserting entity");

        let mut entity = ctx
            .transaction(move |tx| {
                Box::pin(async move {
                    if returning {
                        let row = tx
                            .fetch_optional(&sql, &args)
                            .await?
                            .ok_or_else(|| DatabaseError::no_rows("INSERT ... RETURNING returned no row"))?;
                        for (index, field) in generated.iter().enumerate() {
                            entity.set_field(field.name, row.get_by_index(index)?)?;
                        }
                    } else {
                        tx.execute(&sql, &args).await?;
                        if let (Some(field), SqlDialect::MySQL) = (generated.first(), tx.dialect()) {
                            let row = tx
                                .fetch_optional("SELECT LAST_INSERT_ID()", &[])
                                .await?
                                .ok_or_else(|| DatabaseError::no_rows("LAST_INSERT_ID() returned no row"))?;
                            entity.set_field(field.name, row.get_by_index(0)?)?;
                        }
                    }
                    Ok::<_, OrmError>(entity)
                })
            })
            .await?;

        entity.post_insert()?;
        ctx.tracker().record(&descriptor, &entity);
        *self = entity;
        Ok(())
    }

    async fn update(&mut self, ctx: &OrmContext) -> OrmResult<()> {
        let descriptor = descriptor_of::<E>()?;
        let keys = descriptor
            .key_values(&*self)
            .ok_or(OrmError::MissingPrimaryKey)?;

        let current = descriptor.snapshot(&*self);
        let previous = ctx.tracker().snapshot(&descriptor, &*self);

        let changed: Vec<&FieldMeta> = descriptor
            .fields()
            .iter()
            .filter(|field| field.is_writable() && !field.primary_key)
            .filter(|field| match &previous {
                Some(previous) => previous.get(field.column) != current.get(field.column),
                None => true,
            })
            .collect();

        if changed.is_empty() {
            debug!(table = %descriptor.table(), "update skipped, nothing changed");
            return Ok(());
        }

        let assignments: Vec<String> = changed
            .iter()
            .map(|field| format!("{} = :set_{}", field.column, field.column))
            .collect();
        let mut args: Vec<NamedArg> = changed
            .iter()
            .map(|field| {
                let value = current.get(field.column).cloned().unwrap_or(DatabaseValue::Null);
                NamedArg::new(format!("set_{}", field.column), value)
            })
            .collect();
        let (key_clause, key_args) = key_condition(&keys);
        args.extend(key_args);

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            descriptor.table(),
            assignments.join(", "),
            key_clause
        );
        debug!(table = %descriptor.table(), columns = changed.len(), "updating entity");

        ctx.transaction(move |tx| Box::pin(async move { tx.execute(&sql, &args).await }))
            .await?;

        ctx.tracker().record(&descriptor, &*self);
        Ok(())
    }

    async fn save(&mut self, ctx: &OrmContext) -> OrmResult<()> {
        let descriptor = descriptor_of::<E>()?;
        if ctx.tracker().is_saved(&descriptor, &*self) {
            self.update(ctx).await
        } else {
            self.insert(ctx).await
        }
    }

    async fn delete(&self, ctx: &OrmContext) -> OrmResult<u64> {
        let descriptor = descriptor_of::<E>()?;
        let keys = descriptor.key_values(self).ok_or(OrmError::MissingPrimaryKey)?;
        let (key_clause, args) = key_condition(&keys);
        let sql = format!("DELETE FROM {} WHERE {}", descriptor.table(), key_clause);

        let affected = ctx
            .transaction(move |tx| Box::pin(async move { tx.execute(&sql, &args).await }))
            .await?;

        ctx.tracker().forget(&descriptor, self);
        Ok(affected)
    }

    async fn find_by_id<V>(ctx: &OrmContext, id: V) -> OrmResult<Self>
    where
        V: Into<DatabaseValue> + Send,
    {
        let descriptor = descriptor_of::<E>()?;
        let mut keys = descriptor.primary_keys();
        let key = match (keys.next(), keys.next()) {
            (Some(key), None) => key.column,
            _ => {
                return Err(OrmError::Metadata(format!(
                    "'{}' needs exactly one primary key column for lookup by id",
                    descriptor.type_name()
                )))
            }
        };

        QueryBuilder::new()
            .join::<E>()
            .where_eq(column::<E>(key), id.into())
            .first::<E>(ctx)
            .await?
            .ok_or_else(|| {
                DatabaseError::no_rows(format!("No '{}' with {} found", descriptor.type_name(), key)).into()
            })
    }
}

/// Fill a NULL key from `Entity::generate_id` for application-generated ids
fn assign_application_id<E: Entity>(descriptor: &EntityDescriptor, entity: &mut E) -> OrmResult<()> {
    if descriptor.id_generation() != IdGeneration::Application {
        return Ok(());
    }
    let missing: Vec<&'static str> = descriptor
        .primary_keys()
        .filter(|field| entity.field_value(field.name).map_or(true, |v| v.is_null()))
        .map(|field| field.name)
        .collect();
    for name in missing {
        let id = entity.generate_id().ok_or(OrmError::MissingPrimaryKey)?;
        entity.set_field(name, id)?;
    }
    Ok(())
}

/// Key fields the database fills in: NULL keys of `IdGeneration::Database` entities
fn generated_keys<E: Entity>(descriptor: &EntityDescriptor, entity: &E) -> Vec<FieldMeta> {
    if descriptor.id_generation() != IdGeneration::Database {
        return Vec::new();
    }
    descriptor
        .primary_keys()
        .filter(|field| entity.field_value(field.name).map_or(true, |v| v.is_null()))
        .cloned()
        .collect()
}

fn insert_sql(table: &str, columns: &[&FieldMeta], dialect: SqlDialect) -> String {
    if columns.is_empty() {
        return match dialect {
            SqlDialect::MySQL => format!("INSERT INTO {} () VALUES ()", table),
            _ => format!("INSERT INTO {} DEFAULT VALUES", table),
        };
    }
    let names: Vec<&str> = columns.iter().map(|field| field.column).collect();
    let placeholders: Vec<String> = names.iter().map(|name| format!(":{}", name)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        placeholders.join(", ")
    )
}

/// `k1 = :key_k1 AND k2 = :key_k2` with its bind values
fn key_condition(keys: &[(&'static str, DatabaseValue)]) -> (String, Vec<NamedArg>) {
    let clause = keys
        .iter()
        .map(|(column, _)| format!("{} = :key_{}", column, column))
        .collect::<Vec<_>>()
        .join(" AND ");
    let args = keys
        .iter()
        .map(|(column, value)| NamedArg::new(format!("key_{}", column), value.clone()))
        .collect();
    (clause, args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_shapes() {
        let title = FieldMeta::named("title");
        let body = FieldMeta::named("body");
        assert_eq!(
            insert_sql("posts", &[&title, &body], SqlDialect::PostgreSQL),
            "INSERT INTO posts (title, body) VALUES (:title, :body)"
        );
        assert_eq!(
            insert_sql("posts", &[], SqlDialect::PostgreSQL),
            "INSERT INTO posts DEFAULT VALUES"
        );
        assert_eq!(
            insert_sql("posts", &[], SqlDialect::MySQL),
            "INSERT INTO posts () VALUES ()"
        );
    }

    #[test]
    fn test_key_condition() {
        let (clause, args) = key_condition(&[
            ("tenant_id", DatabaseValue::Int32(1)),
            ("id", DatabaseValue::Int64(9)),
        ]);
        assert_eq!(clause, "tenant_id = :key_tenant_id AND id = :key_id");
        assert_eq!(args[1], NamedArg::new("key_id", 9i64));
    }
}
