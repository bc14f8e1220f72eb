//! # Query Engine
//!
//! The façade callers use: every request is validated against the schema
//! registry (pure, no I/O) before the repository port is touched. Reads
//! compose filters with ordering, windows and distinct; writes fill create
//! defaults, keep the JSON tri-state intact, and route status changes
//! through the lifecycle planner.

use crate::aggregate::{
    validate_aggregate, validate_group_by, AggregateRow, AggregateSpec, GroupBySpec, GroupRow,
};
use crate::config::EngineConfig;
use crate::error::{DataError, Result};
use crate::filter::{
    validate::check_operand_type, validate_filter, CompareOp, FieldValue, Filter, LogicalKind,
};
use crate::pagination::{CursorRequest, PageInfo, PageRequest, Paginated};
use crate::repository::{
    IsolationLevel, OrderBy, Repository, RepositoryOps, RepositoryTx, Row, Window, WindowMode,
    WriteOp,
};
use crate::schema::{FieldType, SchemaRegistry};
use crate::state_machine::plan_transition;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct QueryEngine<R: Repository> {
    schema: Arc<SchemaRegistry>,
    repo: R,
    config: EngineConfig,
}

impl<R: Repository> QueryEngine<R> {
    pub fn new(schema: Arc<SchemaRegistry>, repo: R, config: EngineConfig) -> Self {
        Self {
            schema,
            repo,
            config,
        }
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    // -- reads --------------------------------------------------------------

    pub async fn find_many(
        &self,
        entity: &str,
        filter: Option<Filter>,
        order_by: Vec<OrderBy>,
        window: Window,
    ) -> Result<Vec<Row>> {
        self.validate_read(entity, filter.as_ref(), &order_by, &window)?;
        let stream = self
            .repo
            .execute_read(entity, filter.as_ref(), &order_by, &window)
            .await?;
        stream.try_collect().await
    }

    /// Option-returning unique lookup. The filter must be a conjunction of
    /// equality tests covering a unique key.
    pub async fn find_unique(&self, entity: &str, filter: Filter) -> Result<Option<Row>> {
        validate_filter(&self.schema, entity, &filter)?;
        self.ensure_unique_filter(entity, &filter)?;
        let window = Window::offset(Some(1), 0);
        let stream = self
            .repo
            .execute_read(entity, Some(&filter), &[], &window)
            .await?;
        let rows: Vec<Row> = stream.try_collect().await?;
        Ok(rows.into_iter().next())
    }

    /// Unique lookup that treats zero rows as an error, distinct from an
    /// empty plain read.
    pub async fn find_unique_or_throw(&self, entity: &str, filter: Filter) -> Result<Row> {
        self.find_unique(entity, filter)
            .await?
            .ok_or_else(|| DataError::NotFound {
                entity: entity.to_string(),
            })
    }

    /// Offset pagination: a windowed read plus a separate total count.
    /// The two reads may observe different snapshots unless the caller
    /// wraps them in a transaction.
    pub async fn paginate(
        &self,
        entity: &str,
        filter: Option<Filter>,
        order_by: Vec<OrderBy>,
        request: PageRequest,
    ) -> Result<Paginated<Row>> {
        let page = request.page.unwrap_or(1).max(1);
        let limit = self.config.clamp_limit(request.limit);
        let info_probe = PageInfo::compute(page, limit, 0);
        let window = Window::offset(Some(u64::from(limit)), info_probe.offset());
        self.validate_read(entity, filter.as_ref(), &order_by, &window)?;

        let total = self.repo.execute_count(entity, filter.as_ref()).await?;
        let stream = self
            .repo
            .execute_read(entity, filter.as_ref(), &order_by, &window)
            .await?;
        let items: Vec<Row> = stream.try_collect().await?;
        debug!(entity, page, limit, total, "paginated read");

        Ok(Paginated {
            items,
            pagination: PageInfo::compute(page, limit, total),
        })
    }

    /// Cursor pagination. Requires a caller-supplied stable ordering and a
    /// single-field unique key as the cursor; returns a plain ordered
    /// sequence (no total count).
    pub async fn cursor_page(
        &self,
        entity: &str,
        filter: Option<Filter>,
        order_by: Vec<OrderBy>,
        request: CursorRequest,
    ) -> Result<Vec<Row>> {
        if order_by.is_empty() {
            return Err(DataError::filter(
                entity,
                &request.cursor.field,
                "cursor pagination requires an explicit orderBy",
            ));
        }
        let is_unique = self
            .schema
            .unique_keys(entity)?
            .iter()
            .any(|k| k.fields.len() == 1 && k.fields[0] == request.cursor.field);
        if !is_unique {
            return Err(DataError::filter(
                entity,
                &request.cursor.field,
                "cursor field must be a single-field unique key",
            ));
        }
        let window = Window::cursor(request.cursor, request.take, request.skip);
        self.validate_read(entity, filter.as_ref(), &order_by, &window)?;
        let stream = self
            .repo
            .execute_read(entity, filter.as_ref(), &order_by, &window)
            .await?;
        stream.try_collect().await
    }

    pub async fn count(&self, entity: &str, filter: Option<Filter>) -> Result<u64> {
        if let Some(f) = &filter {
            validate_filter(&self.schema, entity, f)?;
        } else {
            self.schema.entity(entity)?;
        }
        self.repo.execute_count(entity, filter.as_ref()).await
    }

    pub async fn aggregate(
        &self,
        entity: &str,
        filter: Option<Filter>,
        spec: AggregateSpec,
    ) -> Result<AggregateRow> {
        if let Some(f) = &filter {
            validate_filter(&self.schema, entity, f)?;
        }
        validate_aggregate(&self.schema, entity, &spec)?;
        self.repo
            .execute_aggregate(entity, filter.as_ref(), &spec)
            .await
    }

    pub async fn group_by(
        &self,
        entity: &str,
        filter: Option<Filter>,
        spec: GroupBySpec,
    ) -> Result<Vec<GroupRow>> {
        if let Some(f) = &filter {
            validate_filter(&self.schema, entity, f)?;
        }
        validate_group_by(&self.schema, entity, &spec)?;
        self.repo
            .execute_group_by(entity, filter.as_ref(), &spec)
            .await
    }

    // -- writes -------------------------------------------------------------

    pub async fn create(&self, entity: &str, data: Row) -> Result<Row> {
        let data = self.complete_create_payload(entity, data)?;
        let result = self
            .repo
            .execute_write(entity, WriteOp::Create { data })
            .await?;
        result.into_row().ok_or_else(|| {
            DataError::Transaction("backend returned no row for create".to_string())
        })
    }

    /// All-or-nothing batch insert; `skip_duplicates` drops unique-key
    /// violations instead of failing the batch.
    pub async fn create_many(
        &self,
        entity: &str,
        data: Vec<Row>,
        skip_duplicates: bool,
    ) -> Result<u64> {
        let data = data
            .into_iter()
            .map(|row| self.complete_create_payload(entity, row))
            .collect::<Result<Vec<_>>>()?;
        let result = self
            .repo
            .execute_write(
                entity,
                WriteOp::CreateMany {
                    data,
                    skip_duplicates,
                },
            )
            .await?;
        Ok(result.count())
    }

    /// Update the single row a unique filter identifies, returning it.
    pub async fn update(&self, entity: &str, filter: Filter, data: Row) -> Result<Row> {
        validate_filter(&self.schema, entity, &filter)?;
        self.ensure_unique_filter(entity, &filter)?;
        let data = self.complete_update_payload(entity, data)?;

        // The update may rewrite the very field the filter keys on.
        let refreshed = substitute_filter_values(&filter, &data);
        let result = self
            .repo
            .execute_write(entity, WriteOp::Update { filter, data })
            .await?;
        if result.count() == 0 {
            return Err(DataError::NotFound {
                entity: entity.to_string(),
            });
        }
        self.find_unique_or_throw(entity, refreshed).await
    }

    pub async fn update_many(&self, entity: &str, filter: Filter, data: Row) -> Result<u64> {
        validate_filter(&self.schema, entity, &filter)?;
        let data = self.complete_update_payload(entity, data)?;
        let result = self
            .repo
            .execute_write(entity, WriteOp::Update { filter, data })
            .await?;
        Ok(result.count())
    }

    /// Update-or-create keyed by a unique filter, atomic in the backend.
    pub async fn upsert(
        &self,
        entity: &str,
        unique: Filter,
        create: Row,
        update: Row,
    ) -> Result<Row> {
        validate_filter(&self.schema, entity, &unique)?;
        self.ensure_unique_filter(entity, &unique)?;
        let create = self.complete_create_payload(entity, create)?;
        let update = self.complete_update_payload(entity, update)?;
        let result = self
            .repo
            .execute_write(
                entity,
                WriteOp::Upsert {
                    unique,
                    create,
                    update,
                },
            )
            .await?;
        result.into_row().ok_or_else(|| {
            DataError::Transaction("backend returned no row for upsert".to_string())
        })
    }

    /// Delete the single row a unique filter identifies, returning it.
    pub async fn delete(&self, entity: &str, filter: Filter) -> Result<Row> {
        validate_filter(&self.schema, entity, &filter)?;
        self.ensure_unique_filter(entity, &filter)?;
        let row = self.find_unique_or_throw(entity, filter.clone()).await?;
        self.repo
            .execute_write(entity, WriteOp::Delete { filter })
            .await?;
        Ok(row)
    }

    pub async fn delete_many(&self, entity: &str, filter: Filter) -> Result<u64> {
        validate_filter(&self.schema, entity, &filter)?;
        let result = self
            .repo
            .execute_write(entity, WriteOp::Delete { filter })
            .await?;
        Ok(result.count())
    }

    /// Move one row through its lifecycle. Derived timestamps are stamped
    /// exactly once, idempotent re-entry writes nothing, and illegal
    /// transitions fail before the repository is touched. `extra` carries
    /// transition-scoped writes (a gate's score, an execution's output).
    pub async fn transition_status(
        &self,
        entity: &str,
        filter: Filter,
        target: &str,
        extra: Row,
    ) -> Result<Row> {
        validate_filter(&self.schema, entity, &filter)?;
        self.ensure_unique_filter(entity, &filter)?;
        let extra = self.complete_update_payload(entity, extra)?;
        let row = self.find_unique_or_throw(entity, filter.clone()).await?;

        let plan = plan_transition(entity, &row, target, extra, Utc::now())?;
        if plan.is_noop() {
            debug!(entity, target, "transition was an idempotent re-entry");
            return Ok(row);
        }
        let mut data = plan.changes;
        self.touch_updated_at(entity, &mut data);
        let result = self
            .repo
            .execute_write(entity, WriteOp::Update { filter: filter.clone(), data })
            .await?;
        if result.count() == 0 {
            return Err(DataError::NotFound {
                entity: entity.to_string(),
            });
        }
        debug!(entity, target, "status transition applied");
        self.find_unique_or_throw(entity, filter).await
    }

    /// Run `body` inside one backend transaction, committing on success and
    /// rolling back on error.
    pub async fn with_transaction<T, F>(&self, isolation: IsolationLevel, body: F) -> Result<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a R::Tx) -> BoxFuture<'a, Result<T>> + Send,
    {
        let tx = self.repo.begin(isolation).await?;
        match body(&tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }

    pub fn default_isolation(&self) -> IsolationLevel {
        self.config.default_isolation
    }

    // -- validation helpers -------------------------------------------------

    fn validate_read(
        &self,
        entity: &str,
        filter: Option<&Filter>,
        order_by: &[OrderBy],
        window: &Window,
    ) -> Result<()> {
        self.schema.entity(entity)?;
        if let Some(f) = filter {
            validate_filter(&self.schema, entity, f)?;
        }
        for order in order_by {
            self.schema.field_type(entity, &order.field)?;
        }
        for field in &window.distinct {
            self.schema.field_type(entity, field)?;
        }
        if let Some(WindowMode::Cursor { cursor, .. }) = &window.mode {
            self.schema.field_type(entity, &cursor.field)?;
        }
        Ok(())
    }

    /// A unique filter is a conjunction of equality tests whose fields
    /// cover at least one unique key.
    fn ensure_unique_filter(&self, entity: &str, filter: &Filter) -> Result<()> {
        let mut fields = Vec::new();
        collect_eq_fields(filter, &mut fields).map_err(|reason| {
            DataError::filter(entity, "<unique filter>", reason)
        })?;
        let covered = self
            .schema
            .unique_keys(entity)?
            .iter()
            .any(|key| key.fields.iter().all(|f| fields.contains(f)));
        if covered {
            Ok(())
        } else {
            Err(DataError::filter(
                entity,
                "<unique filter>",
                "filter does not cover a unique key",
            ))
        }
    }

    fn validate_payload(&self, entity: &str, data: &Row) -> Result<()> {
        for (field, value) in data {
            let scalar = self.schema.field_type(entity, field)?;
            match value {
                FieldValue::Null => {
                    if !scalar.nullable {
                        return Err(DataError::filter(
                            entity,
                            field,
                            "field is not nullable",
                        ));
                    }
                }
                FieldValue::List(_) => {
                    return Err(DataError::filter(
                        entity,
                        field,
                        "lists are filter operands, not stored values",
                    ));
                }
                other => check_operand_type(entity, scalar, other)?,
            }
        }
        Ok(())
    }

    /// Fill generated columns and declared defaults, then require every
    /// remaining non-nullable field. Nullable fields left absent become
    /// relational NULL; JSON tri-state is preserved because an absent key
    /// in an *update* payload never reaches this path.
    fn complete_create_payload(&self, entity: &str, mut data: Row) -> Result<Row> {
        self.validate_payload(entity, &data)?;
        let def = self.schema.entity(entity)?;
        let now = Utc::now();
        for scalar in &def.scalars {
            if data.contains_key(&scalar.name) {
                continue;
            }
            let generated = match scalar.name.as_str() {
                "id" if scalar.field_type == FieldType::Uuid => {
                    Some(FieldValue::Uuid(Uuid::new_v4()))
                }
                "created_at" | "updated_at" => Some(FieldValue::DateTime(now)),
                _ => scalar.default.clone(),
            };
            match generated {
                Some(value) => {
                    data.insert(scalar.name.clone(), value);
                }
                None if scalar.nullable => {
                    data.insert(scalar.name.clone(), FieldValue::Null);
                }
                None => {
                    return Err(DataError::filter(
                        entity,
                        &scalar.name,
                        "required field missing from create payload",
                    ));
                }
            }
        }
        Ok(data)
    }

    fn complete_update_payload(&self, entity: &str, mut data: Row) -> Result<Row> {
        self.validate_payload(entity, &data)?;
        self.touch_updated_at(entity, &mut data);
        Ok(data)
    }

    fn touch_updated_at(&self, entity: &str, data: &mut Row) {
        if data.is_empty() {
            return;
        }
        let has_column = self
            .schema
            .entity(entity)
            .map(|def| def.scalar("updated_at").is_some())
            .unwrap_or(false);
        if has_column && !data.contains_key("updated_at") {
            data.insert(
                "updated_at".to_string(),
                FieldValue::DateTime(Utc::now()),
            );
        }
    }
}

/// Flatten a unique filter into its equality fields, rejecting anything
/// that is not a conjunction of `eq` comparisons.
fn collect_eq_fields(filter: &Filter, out: &mut Vec<String>) -> std::result::Result<(), String> {
    match filter {
        Filter::Compare {
            field,
            op: CompareOp::Eq,
            ..
        } => {
            out.push(field.clone());
            Ok(())
        }
        Filter::Logical {
            kind: LogicalKind::And,
            children,
        } => {
            for child in children {
                collect_eq_fields(child, out)?;
            }
            Ok(())
        }
        _ => Err("unique filters must be conjunctions of equality tests".to_string()),
    }
}

/// Rebuild a unique filter after an update that may have rewritten one of
/// its key fields.
fn substitute_filter_values(filter: &Filter, data: &Row) -> Filter {
    match filter {
        Filter::Compare {
            field,
            op: CompareOp::Eq,
            value,
            mode,
        } => {
            let value = data.get(field).cloned().unwrap_or_else(|| value.clone());
            Filter::Compare {
                field: field.clone(),
                op: CompareOp::Eq,
                value,
                mode: *mode,
            }
        }
        Filter::Logical { kind, children } => Filter::Logical {
            kind: *kind,
            children: children
                .iter()
                .map(|c| substitute_filter_values(c, data))
                .collect(),
        },
        other => other.clone(),
    }
}
