//! In-memory reference implementation of the repository port.
//!
//! Backs the test suite and documents the exact evaluation semantics a SQL
//! backend must reproduce: relation quantifiers (vacuous `every`), the
//! three-way JSON null sentinel, case modes, distinct, both window modes,
//! and atomic uniqueness checks. Transactions are snapshot-based and
//! serialized through one async mutex, which satisfies every isolation
//! level the port names.

use super::{
    IsolationLevel, OrderBy, Repository, RepositoryOps, RepositoryTx, Row, RowStream, SortOrder,
    Window, WindowMode, WriteOp, WriteResult,
};
use crate::aggregate::{AggregateRow, AggregateSpec, GroupBySpec, GroupRow};
use crate::error::{DataError, Result};
use crate::filter::{CaseMode, CompareOp, FieldValue, Filter, JsonNullFilter, JsonPredicate, LogicalKind, RelationMode};
use crate::schema::{ForeignKey, SchemaRegistry};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

pub(crate) type Tables = BTreeMap<String, Vec<Row>>;

pub struct InMemoryRepository {
    schema: Arc<SchemaRegistry>,
    tables: Arc<RwLock<Tables>>,
    write_gate: Arc<AsyncMutex<()>>,
}

impl InMemoryRepository {
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self {
            schema,
            tables: Arc::new(RwLock::new(Tables::new())),
            write_gate: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Current contents of one table, for assertions in tests.
    pub fn table(&self, entity: &str) -> Vec<Row> {
        self.tables.read().get(entity).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl RepositoryOps for InMemoryRepository {
    async fn execute_read(
        &self,
        entity: &str,
        filter: Option<&Filter>,
        order_by: &[OrderBy],
        window: &Window,
    ) -> Result<RowStream> {
        let tables = self.tables.read().clone();
        let rows = read_rows(&self.schema, &tables, entity, filter, order_by, window)?;
        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }

    async fn execute_count(&self, entity: &str, filter: Option<&Filter>) -> Result<u64> {
        let tables = self.tables.read().clone();
        count_rows(&self.schema, &tables, entity, filter)
    }

    async fn execute_aggregate(
        &self,
        entity: &str,
        filter: Option<&Filter>,
        spec: &AggregateSpec,
    ) -> Result<AggregateRow> {
        let tables = self.tables.read().clone();
        let rows = filtered(&self.schema, &tables, entity, filter)?;
        Ok(aggregate_rows(&rows, spec))
    }

    async fn execute_group_by(
        &self,
        entity: &str,
        filter: Option<&Filter>,
        spec: &GroupBySpec,
    ) -> Result<Vec<GroupRow>> {
        let tables = self.tables.read().clone();
        let rows = filtered(&self.schema, &tables, entity, filter)?;
        group_rows(&self.schema, &tables, entity, rows, spec)
    }

    async fn execute_write(&self, entity: &str, op: WriteOp) -> Result<WriteResult> {
        let _gate = self.write_gate.lock().await;
        let mut tables = self.tables.write();
        let result = apply_write(&self.schema, &mut tables, entity, op)?;
        debug!(entity, affected = result.count(), "write applied");
        Ok(result)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    type Tx = MemoryTransaction;

    async fn begin(&self, isolation: IsolationLevel) -> Result<Self::Tx> {
        let gate = Arc::clone(&self.write_gate).lock_owned().await;
        let working = self.tables.read().clone();
        debug!(%isolation, "transaction started");
        Ok(MemoryTransaction {
            schema: Arc::clone(&self.schema),
            shared: Arc::clone(&self.tables),
            working: Mutex::new(working),
            _gate: gate,
        })
    }
}

/// Snapshot transaction: all operations hit a private copy of the tables,
/// published on commit and discarded on rollback or drop.
pub struct MemoryTransaction {
    schema: Arc<SchemaRegistry>,
    shared: Arc<RwLock<Tables>>,
    working: Mutex<Tables>,
    _gate: OwnedMutexGuard<()>,
}

#[async_trait]
impl RepositoryOps for MemoryTransaction {
    async fn execute_read(
        &self,
        entity: &str,
        filter: Option<&Filter>,
        order_by: &[OrderBy],
        window: &Window,
    ) -> Result<RowStream> {
        let tables = self.working.lock().clone();
        let rows = read_rows(&self.schema, &tables, entity, filter, order_by, window)?;
        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }

    async fn execute_count(&self, entity: &str, filter: Option<&Filter>) -> Result<u64> {
        let tables = self.working.lock().clone();
        count_rows(&self.schema, &tables, entity, filter)
    }

    async fn execute_aggregate(
        &self,
        entity: &str,
        filter: Option<&Filter>,
        spec: &AggregateSpec,
    ) -> Result<AggregateRow> {
        let tables = self.working.lock().clone();
        let rows = filtered(&self.schema, &tables, entity, filter)?;
        Ok(aggregate_rows(&rows, spec))
    }

    async fn execute_group_by(
        &self,
        entity: &str,
        filter: Option<&Filter>,
        spec: &GroupBySpec,
    ) -> Result<Vec<GroupRow>> {
        let tables = self.working.lock().clone();
        let rows = filtered(&self.schema, &tables, entity, filter)?;
        group_rows(&self.schema, &tables, entity, rows, spec)
    }

    async fn execute_write(&self, entity: &str, op: WriteOp) -> Result<WriteResult> {
        let mut tables = self.working.lock();
        apply_write(&self.schema, &mut tables, entity, op)
    }
}

#[async_trait]
impl RepositoryTx for MemoryTransaction {
    async fn commit(self) -> Result<()> {
        *self.shared.write() = self.working.into_inner();
        debug!("transaction committed");
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        debug!("transaction rolled back");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filter evaluation

/// Evaluate a filter against one row in its entity context.
pub(crate) fn matches(
    schema: &SchemaRegistry,
    tables: &Tables,
    entity: &str,
    row: &Row,
    filter: &Filter,
) -> Result<bool> {
    match filter {
        Filter::Compare {
            field,
            op,
            value,
            mode,
        } => Ok(eval_compare(row, field, *op, value, *mode)),
        Filter::Logical { kind, children } => match kind {
            LogicalKind::And => {
                for child in children {
                    if !matches(schema, tables, entity, row, child)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            LogicalKind::Or => {
                for child in children {
                    if matches(schema, tables, entity, row, child)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            LogicalKind::Not => {
                for child in children {
                    if !matches(schema, tables, entity, row, child)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        },
        Filter::Json {
            field,
            path,
            predicate,
        } => Ok(eval_json(row, field, path, predicate)),
        Filter::Relation { field, mode } => eval_relation(schema, tables, entity, row, field, mode),
    }
}

fn cell_eq(cell: &FieldValue, operand: &FieldValue, mode: CaseMode) -> bool {
    if mode == CaseMode::Insensitive {
        if let (FieldValue::String(a), FieldValue::String(b)) = (cell, operand) {
            return a.eq_ignore_ascii_case(b);
        }
    }
    cell.loose_eq(operand)
}

fn eval_compare(row: &Row, field: &str, op: CompareOp, value: &FieldValue, mode: CaseMode) -> bool {
    let cell = row.get(field).unwrap_or(&FieldValue::Null);
    match op {
        CompareOp::Eq => {
            if value.is_null() {
                cell.is_null()
            } else {
                cell_eq(cell, value, mode)
            }
        }
        CompareOp::Ne => {
            if value.is_null() {
                !cell.is_null()
            } else {
                !cell.is_null() && !cell_eq(cell, value, mode)
            }
        }
        CompareOp::Lt => matches_order(cell, value, |o| o == Ordering::Less),
        CompareOp::Lte => matches_order(cell, value, |o| o != Ordering::Greater),
        CompareOp::Gt => matches_order(cell, value, |o| o == Ordering::Greater),
        CompareOp::Gte => matches_order(cell, value, |o| o != Ordering::Less),
        CompareOp::In => match value {
            FieldValue::List(items) => items.iter().any(|item| cell_eq(cell, item, mode)),
            _ => false,
        },
        CompareOp::NotIn => match value {
            FieldValue::List(items) => {
                !cell.is_null() && !items.iter().any(|item| cell_eq(cell, item, mode))
            }
            _ => false,
        },
        CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
            let (FieldValue::String(haystack), FieldValue::String(needle)) = (cell, value) else {
                return false;
            };
            let (haystack, needle) = if mode == CaseMode::Insensitive {
                (haystack.to_lowercase(), needle.to_lowercase())
            } else {
                (haystack.clone(), needle.clone())
            };
            match op {
                CompareOp::Contains => haystack.contains(&needle),
                CompareOp::StartsWith => haystack.starts_with(&needle),
                _ => haystack.ends_with(&needle),
            }
        }
    }
}

fn matches_order(cell: &FieldValue, value: &FieldValue, pred: impl Fn(Ordering) -> bool) -> bool {
    cell.compare(value).map(pred).unwrap_or(false)
}

fn resolve_path<'a>(doc: &'a serde_json::Value, path: &[String]) -> Option<&'a serde_json::Value> {
    let mut current = doc;
    for segment in path {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn json_cmp(a: &serde_json::Value, b: &serde_json::Value) -> Option<Ordering> {
    match (a, b) {
        (serde_json::Value::Number(x), serde_json::Value::Number(y)) => {
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (serde_json::Value::String(x), serde_json::Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn eval_json(row: &Row, field: &str, path: &[String], predicate: &JsonPredicate) -> bool {
    let cell = row.get(field).unwrap_or(&FieldValue::Null);

    // Relational NULL: only the DbNull/AnyNull sentinels can match.
    let doc = match cell {
        FieldValue::Null => {
            return matches!(
                predicate,
                JsonPredicate::Null(JsonNullFilter::DbNull | JsonNullFilter::AnyNull)
            );
        }
        FieldValue::Json(doc) => doc,
        _ => return false,
    };

    let Some(resolved) = resolve_path(doc, path) else {
        return false;
    };

    match predicate {
        JsonPredicate::Null(which) => match which {
            JsonNullFilter::DbNull => false,
            JsonNullFilter::JsonNull | JsonNullFilter::AnyNull => resolved.is_null(),
        },
        JsonPredicate::Equals(v) => resolved == v,
        JsonPredicate::Not(v) => !resolved.is_null() && resolved != v,
        JsonPredicate::Lt(v) => json_cmp(resolved, v).map(|o| o == Ordering::Less).unwrap_or(false),
        JsonPredicate::Lte(v) => json_cmp(resolved, v).map(|o| o != Ordering::Greater).unwrap_or(false),
        JsonPredicate::Gt(v) => json_cmp(resolved, v).map(|o| o == Ordering::Greater).unwrap_or(false),
        JsonPredicate::Gte(v) => json_cmp(resolved, v).map(|o| o != Ordering::Less).unwrap_or(false),
        JsonPredicate::ArrayContains(v) => match resolved {
            serde_json::Value::Array(items) => match v {
                serde_json::Value::Array(wanted) => wanted.iter().all(|w| items.contains(w)),
                single => items.contains(single),
            },
            _ => false,
        },
        JsonPredicate::ArrayStartsWith(v) => matches!(resolved, serde_json::Value::Array(items) if items.first() == Some(v)),
        JsonPredicate::ArrayEndsWith(v) => matches!(resolved, serde_json::Value::Array(items) if items.last() == Some(v)),
        JsonPredicate::StringContains(s) => matches!(resolved, serde_json::Value::String(v) if v.contains(s)),
        JsonPredicate::StringStartsWith(s) => matches!(resolved, serde_json::Value::String(v) if v.starts_with(s)),
        JsonPredicate::StringEndsWith(s) => matches!(resolved, serde_json::Value::String(v) if v.ends_with(s)),
    }
}

fn eval_relation(
    schema: &SchemaRegistry,
    tables: &Tables,
    entity: &str,
    row: &Row,
    field: &str,
    mode: &RelationMode,
) -> Result<bool> {
    let relation = schema.relation(entity, field)?;
    let empty = Vec::new();
    let target_rows = tables.get(&relation.target).unwrap_or(&empty);

    let related: Vec<&Row> = match &relation.foreign_key {
        ForeignKey::Remote(fk) => {
            let id = row.get("id").cloned().unwrap_or(FieldValue::Null);
            if id.is_null() {
                Vec::new()
            } else {
                target_rows
                    .iter()
                    .filter(|r| r.get(fk).map(|v| v.loose_eq(&id)).unwrap_or(false))
                    .collect()
            }
        }
        ForeignKey::Local(fk_column) => {
            let fk = row.get(fk_column).cloned().unwrap_or(FieldValue::Null);
            if fk.is_null() {
                Vec::new()
            } else {
                target_rows
                    .iter()
                    .filter(|r| r.get("id").map(|v| v.loose_eq(&fk)).unwrap_or(false))
                    .collect()
            }
        }
    };

    let nested = mode.nested();
    let mut any = false;
    let mut all = true;
    for related_row in &related {
        if matches(schema, tables, &relation.target, related_row, nested)? {
            any = true;
        } else {
            all = false;
        }
    }

    Ok(match mode {
        RelationMode::Some(_) | RelationMode::Is(_) => any,
        // Vacuously true over an empty collection.
        RelationMode::Every(_) => all,
        // `none` negates `some`; `isNot` also matches an absent relation.
        RelationMode::None(_) | RelationMode::IsNot(_) => !any,
    })
}

// ---------------------------------------------------------------------------
// Reads

fn filtered(
    schema: &SchemaRegistry,
    tables: &Tables,
    entity: &str,
    filter: Option<&Filter>,
) -> Result<Vec<Row>> {
    schema.entity(entity)?;
    let empty = Vec::new();
    let rows = tables.get(entity).unwrap_or(&empty);
    let mut out = Vec::new();
    for row in rows {
        let keep = match filter {
            Some(f) => matches(schema, tables, entity, row, f)?,
            None => true,
        };
        if keep {
            out.push(row.clone());
        }
    }
    Ok(out)
}

fn cmp_cells(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    let a = a.unwrap_or(&FieldValue::Null);
    let b = b.unwrap_or(&FieldValue::Null);
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

pub(crate) fn sort_rows(rows: &mut [Row], order_by: &[OrderBy]) {
    rows.sort_by(|a, b| {
        for order in order_by {
            let ord = cmp_cells(a.get(&order.field), b.get(&order.field));
            let ord = match order.direction {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn distinct_rows(rows: Vec<Row>, fields: &[String]) -> Vec<Row> {
    if fields.is_empty() {
        return rows;
    }
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        let key: Vec<&FieldValue> = fields
            .iter()
            .map(|f| row.get(f).unwrap_or(&FieldValue::Null))
            .collect();
        let token = serde_json::to_string(&key).unwrap_or_default();
        if seen.insert(token) {
            out.push(row);
        }
    }
    out
}

fn apply_window(rows: Vec<Row>, window: &Window) -> Vec<Row> {
    let rows = distinct_rows(rows, &window.distinct);
    match &window.mode {
        None => rows,
        Some(WindowMode::Offset { limit, offset }) => {
            let skipped = rows.into_iter().skip(*offset as usize);
            match limit {
                Some(limit) => skipped.take(*limit as usize).collect(),
                None => skipped.collect(),
            }
        }
        Some(WindowMode::Cursor { cursor, take, skip }) => {
            let Some(position) = rows
                .iter()
                .position(|r| r.get(&cursor.field).map(|v| v.loose_eq(&cursor.value)).unwrap_or(false))
            else {
                return Vec::new();
            };
            if *take == 0 {
                return Vec::new();
            }
            if *take > 0 {
                let start = position + *skip as usize;
                rows.into_iter().skip(start).take(*take as usize).collect()
            } else {
                // Backward walk: the window ends at the cursor (minus skip)
                // and rows come back in query order.
                let Some(end) = position.checked_sub(*skip as usize) else {
                    return Vec::new();
                };
                let count = take.unsigned_abs() as usize;
                let start = (end + 1).saturating_sub(count);
                rows[start..=end].to_vec()
            }
        }
    }
}

fn read_rows(
    schema: &SchemaRegistry,
    tables: &Tables,
    entity: &str,
    filter: Option<&Filter>,
    order_by: &[OrderBy],
    window: &Window,
) -> Result<Vec<Row>> {
    let mut rows = filtered(schema, tables, entity, filter)?;
    sort_rows(&mut rows, order_by);
    Ok(apply_window(rows, window))
}

fn count_rows(
    schema: &SchemaRegistry,
    tables: &Tables,
    entity: &str,
    filter: Option<&Filter>,
) -> Result<u64> {
    Ok(filtered(schema, tables, entity, filter)?.len() as u64)
}

// ---------------------------------------------------------------------------
// Aggregates

fn numeric_values(rows: &[Row], field: &str) -> (Vec<f64>, bool) {
    let mut values = Vec::new();
    let mut all_int = true;
    for row in rows {
        match row.get(field) {
            Some(FieldValue::Int(i)) => values.push(*i as f64),
            Some(FieldValue::Float(f)) => {
                all_int = false;
                values.push(*f);
            }
            _ => {}
        }
    }
    (values, all_int)
}

pub(crate) fn aggregate_rows(rows: &[Row], spec: &AggregateSpec) -> AggregateRow {
    let mut out = AggregateRow::default();

    if let Some(count) = &spec.count {
        if count.all {
            out.count_all = Some(rows.len() as u64);
        }
        for field in &count.fields {
            let n = rows
                .iter()
                .filter(|r| r.get(field).map(|v| !v.is_null()).unwrap_or(false))
                .count() as u64;
            out.count.insert(field.clone(), n);
        }
    }

    for field in &spec.avg {
        let (values, _) = numeric_values(rows, field);
        let avg = if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        };
        out.avg.insert(field.clone(), avg);
    }

    for field in &spec.sum {
        let (values, all_int) = numeric_values(rows, field);
        let sum = if values.is_empty() {
            None
        } else {
            let total: f64 = values.iter().sum();
            Some(if all_int {
                FieldValue::Int(total as i64)
            } else {
                FieldValue::Float(total)
            })
        };
        out.sum.insert(field.clone(), sum);
    }

    for field in &spec.min {
        out.min.insert(field.clone(), extremum(rows, field, Ordering::Less));
    }
    for field in &spec.max {
        out.max.insert(field.clone(), extremum(rows, field, Ordering::Greater));
    }

    out
}

fn extremum(rows: &[Row], field: &str, keep: Ordering) -> Option<FieldValue> {
    let mut best: Option<&FieldValue> = None;
    for row in rows {
        let Some(value) = row.get(field).filter(|v| !v.is_null()) else {
            continue;
        };
        best = match best {
            None => Some(value),
            Some(current) => {
                if value.compare(current) == Some(keep) {
                    Some(value)
                } else {
                    Some(current)
                }
            }
        };
    }
    best.cloned()
}

fn group_rows(
    schema: &SchemaRegistry,
    tables: &Tables,
    entity: &str,
    rows: Vec<Row>,
    spec: &GroupBySpec,
) -> Result<Vec<GroupRow>> {
    let mut groups: Vec<(BTreeMap<String, FieldValue>, Vec<Row>)> = Vec::new();
    for row in rows {
        let keys: BTreeMap<String, FieldValue> = spec
            .by
            .iter()
            .map(|f| (f.clone(), row.get(f).cloned().unwrap_or(FieldValue::Null)))
            .collect();
        match groups.iter_mut().find(|(k, _)| *k == keys) {
            Some((_, members)) => members.push(row),
            None => groups.push((keys, vec![row])),
        }
    }

    if let Some(having) = &spec.having {
        let mut kept = Vec::new();
        for (keys, members) in groups {
            // Membership validation guarantees `having` only touches the
            // grouping fields, so the key map doubles as the row.
            if matches(schema, tables, entity, &keys, having)? {
                kept.push((keys, members));
            }
        }
        groups = kept;
    }

    if !spec.order_by.is_empty() {
        groups.sort_by(|(a, _), (b, _)| {
            for order in &spec.order_by {
                let ord = cmp_cells(a.get(&order.field), b.get(&order.field));
                let ord = match order.direction {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    if let Some(skip) = spec.skip {
        groups = groups.into_iter().skip(skip as usize).collect();
    }
    if let Some(take) = spec.take {
        groups = if take >= 0 {
            groups.into_iter().take(take as usize).collect()
        } else {
            let keep = take.unsigned_abs() as usize;
            let drop = groups.len().saturating_sub(keep);
            groups.into_iter().skip(drop).collect()
        };
    }

    Ok(groups
        .into_iter()
        .map(|(keys, members)| GroupRow {
            keys,
            aggregates: aggregate_rows(&members, &spec.aggregates),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Writes

fn unique_conflict(
    schema: &SchemaRegistry,
    entity: &str,
    existing: &[Row],
    candidate: &Row,
    ignore_index: Option<usize>,
) -> Result<Option<Vec<String>>> {
    for key in schema.unique_keys(entity)? {
        let values: Option<Vec<&FieldValue>> = key
            .fields
            .iter()
            .map(|f| candidate.get(f).filter(|v| !v.is_null()))
            .collect();
        // Null key components never conflict, SQL-style.
        let Some(values) = values else { continue };
        let hit = existing.iter().enumerate().any(|(i, row)| {
            Some(i) != ignore_index
                && key
                    .fields
                    .iter()
                    .zip(&values)
                    .all(|(f, v)| row.get(f).map(|rv| rv.loose_eq(v)).unwrap_or(false))
        });
        if hit {
            return Ok(Some(key.fields.clone()));
        }
    }
    Ok(None)
}

fn match_indices(
    schema: &SchemaRegistry,
    tables: &Tables,
    entity: &str,
    filter: &Filter,
) -> Result<Vec<usize>> {
    let empty = Vec::new();
    let rows = tables.get(entity).unwrap_or(&empty);
    let mut indices = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        if matches(schema, tables, entity, row, filter)? {
            indices.push(i);
        }
    }
    Ok(indices)
}

pub(crate) fn apply_write(
    schema: &SchemaRegistry,
    tables: &mut Tables,
    entity: &str,
    op: WriteOp,
) -> Result<WriteResult> {
    schema.entity(entity)?;
    match op {
        WriteOp::Create { data } => {
            let rows = tables.entry(entity.to_string()).or_default();
            if let Some(fields) = unique_conflict(schema, entity, rows, &data, None)? {
                return Err(DataError::UniquenessViolation {
                    entity: entity.to_string(),
                    fields,
                });
            }
            rows.push(data.clone());
            Ok(WriteResult::Row(data))
        }
        WriteOp::CreateMany {
            data,
            skip_duplicates,
        } => {
            // All-or-nothing: build the result set aside and only publish
            // it once every row has been accepted.
            let mut working = tables.get(entity).cloned().unwrap_or_default();
            let mut inserted = 0u64;
            for row in data {
                match unique_conflict(schema, entity, &working, &row, None)? {
                    Some(fields) => {
                        if skip_duplicates {
                            continue;
                        }
                        return Err(DataError::UniquenessViolation {
                            entity: entity.to_string(),
                            fields,
                        });
                    }
                    None => {
                        working.push(row);
                        inserted += 1;
                    }
                }
            }
            tables.insert(entity.to_string(), working);
            Ok(WriteResult::Count(inserted))
        }
        WriteOp::Update { filter, data } => {
            let snapshot = tables.clone();
            let indices = match_indices(schema, &snapshot, entity, &filter)?;
            let mut updated = tables.get(entity).cloned().unwrap_or_default();
            for &i in &indices {
                let mut candidate = updated[i].clone();
                for (field, value) in &data {
                    candidate.insert(field.clone(), value.clone());
                }
                if let Some(fields) =
                    unique_conflict(schema, entity, &updated, &candidate, Some(i))?
                {
                    return Err(DataError::UniquenessViolation {
                        entity: entity.to_string(),
                        fields,
                    });
                }
                updated[i] = candidate;
            }
            tables.insert(entity.to_string(), updated);
            Ok(WriteResult::Count(indices.len() as u64))
        }
        WriteOp::Upsert {
            unique,
            create,
            update,
        } => {
            let snapshot = tables.clone();
            let indices = match_indices(schema, &snapshot, entity, &unique)?;
            match indices.first() {
                Some(&i) => {
                    let mut updated = tables.get(entity).cloned().unwrap_or_default();
                    let mut candidate = updated[i].clone();
                    for (field, value) in &update {
                        candidate.insert(field.clone(), value.clone());
                    }
                    if let Some(fields) =
                        unique_conflict(schema, entity, &updated, &candidate, Some(i))?
                    {
                        return Err(DataError::UniquenessViolation {
                            entity: entity.to_string(),
                            fields,
                        });
                    }
                    updated[i] = candidate.clone();
                    tables.insert(entity.to_string(), updated);
                    Ok(WriteResult::Row(candidate))
                }
                None => apply_write(schema, tables, entity, WriteOp::Create { data: create }),
            }
        }
        WriteOp::Delete { filter } => {
            let snapshot = tables.clone();
            let indices = match_indices(schema, &snapshot, entity, &filter)?;
            let to_remove: HashSet<usize> = indices.iter().copied().collect();
            let rows = tables.entry(entity.to_string()).or_default();
            let mut i = 0usize;
            rows.retain(|_| {
                let keep = !to_remove.contains(&i);
                i += 1;
                keep
            });
            Ok(WriteResult::Count(to_remove.len() as u64))
        }
    }
}
