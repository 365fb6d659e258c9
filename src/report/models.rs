use crate::stats::AttributeTable;

/// Health level attached to every status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Ok,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// The status of one monitored entity as handed to the reporting sink.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StatusReport {
    pub name: String,
    pub hardware_id: String,
    pub level: Severity,
    pub message: String,
    pub values: Vec<KeyValue>,
}

impl StatusReport {
    pub fn new(name: impl Into<String>, hardware_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hardware_id: hardware_id.into(),
            level: Severity::Ok,
            message: String::new(),
            values: Vec::new(),
        }
    }

    /// Sets the level and the human-readable summary.
    pub fn summary(&mut self, level: Severity, message: impl Into<String>) -> &mut Self {
        self.level = level;
        self.message = message.into();
        self
    }

    /// Appends every attribute of `table`, in key order.
    pub fn add_all(&mut self, table: &AttributeTable) -> &mut Self {
        self.values
            .extend(table.iter().map(|(key, value)| KeyValue {
                key: key.clone(),
                value: value.clone(),
            }));
        self
    }

    /// Looks up a value by key.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }
}
