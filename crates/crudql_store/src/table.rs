use crudql_runtime::datasource::{Filter, Record};
use serde_json::Value;

/// Rows of one entity, in insertion order.
#[derive(Debug, Default)]
pub(crate) struct Table {
    rows: Vec<Record>,
    last_id: i64,
}

impl Table {
    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// The id the next autoincrement insert receives.
    pub(crate) fn peek_id(&self) -> i64 {
        self.last_id + 1
    }

    pub(crate) fn insert(&mut self, row: Record, id_column: Option<&str>) {
        if let Some(id) = id_column.and_then(|c| row.get(c)).and_then(Value::as_i64) {
            self.last_id = self.last_id.max(id);
        }
        self.rows.push(row);
    }

    pub(crate) fn replace(&mut self, position: usize, row: Record) {
        self.rows[position] = row;
    }

    pub(crate) fn remove(&mut self, position: usize) -> Record {
        self.rows.remove(position)
    }

    pub(crate) fn position(&self, filter: &Filter) -> Option<usize> {
        self.rows.iter().position(|row| filter.matches(row))
    }

    pub(crate) fn find(&self, filter: &Filter) -> Option<&Record> {
        self.rows.iter().find(|row| filter.matches(row))
    }

    pub(crate) fn filter<'a>(
        &'a self,
        filter: &'a Filter,
    ) -> impl Iterator<Item = &'a Record> + 'a {
        self.rows.iter().filter(move |row| filter.matches(row))
    }

    /// First row whose `column` equals `value`, ignoring the row at `skip`.
    pub(crate) fn position_where(
        &self,
        column: &str,
        value: &Value,
        skip: Option<usize>,
    ) -> Option<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .find(|(_, row)| row.get(column) == Some(value))
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[test]
    fn test_autoincrement_follows_explicit_ids() {
        let mut table = Table::default();
        assert_eq!(table.peek_id(), 1);
        table.insert(row(json!({"id": 5})), Some("id"));
        assert_eq!(table.peek_id(), 6);
        table.insert(row(json!({"id": 2})), Some("id"));
        assert_eq!(table.peek_id(), 6);
    }

    #[test]
    fn test_position_where_skips() {
        let mut table = Table::default();
        table.insert(row(json!({"email": "a"})), None);
        table.insert(row(json!({"email": "b"})), None);
        assert_eq!(table.position_where("email", &json!("b"), None), Some(1));
        assert_eq!(table.position_where("email", &json!("b"), Some(1)), None);
    }
}
