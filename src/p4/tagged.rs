use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One tagged record as printed by `p4 -ztag -Mj`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn require(&self, record: &str, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| Error::MalformedRecord {
            record: record.to_string(),
            field: key.to_string(),
        })
    }

    /// Values of `{prefix}0`, `{prefix}1`, ... ordered by numeric suffix.
    pub fn indexed(&self, prefix: &str) -> Vec<&str> {
        let mut entries: Vec<(u32, &str)> = self
            .0
            .iter()
            .filter_map(|(key, value)| {
                let index = key.strip_prefix(prefix)?.parse::<u32>().ok()?;
                Some((index, value.as_str()))
            })
            .collect();
        entries.sort_by_key(|(index, _)| *index);
        entries.into_iter().map(|(_, value)| value).collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Decodes `-Mj` output. Error messages embedded in the stream fail the
/// whole command; informational messages are dropped.
pub fn parse_tagged(command: &str, stdout: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let object: Map<String, Value> = serde_json::from_str(line)?;

        match object.get("code").and_then(Value::as_str) {
            Some("error") => {
                let data = object
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                return Err(Error::CommandFailed {
                    command: command.to_string(),
                    exit_code: 1,
                    output: data,
                });
            }
            Some("info") | Some("text") => continue,
            _ => {}
        }

        let record: Record = object
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                Value::Number(n) => Some((key, n.to_string())),
                Value::Bool(b) => Some((key, b.to_string())),
                _ => None,
            })
            .collect();
        records.push(record);
    }

    Ok(records)
}
