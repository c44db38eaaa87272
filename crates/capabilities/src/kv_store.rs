use async_trait::async_trait;
use chrono::Utc;
use conductor_core::{Error, Result};
use serde_json::{json, Value};

use crate::{CallContext, Capability, CapabilitySchema};

/// Persistent key-value store backed by sqlite in the data directory.
/// Actions: set, get, delete, list (default: list).
pub struct KvStoreCapability;

#[async_trait]
impl Capability for KvStoreCapability {
    fn schema(&self) -> CapabilitySchema {
        CapabilitySchema {
            name: "kv_store",
            description: "Persistent key-value storage. Actions: 'set' (key, value), 'get' (key), 'delete' (key), 'list' (optional prefix). Defaults to 'list'.",
            default_timeout_ms: 3_000,
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["set", "get", "delete", "list"]
                    },
                    "key": { "type": "string" },
                    "value": { "description": "Any JSON value (for 'set')" },
                    "prefix": { "type": "string", "description": "Key prefix filter (for 'list')" }
                }
            }),
        }
    }

    fn validate(&self, input: &Value) -> Result<()> {
        let action = input.get("action").and_then(|v| v.as_str()).unwrap_or("list");
        if !["set", "get", "delete", "list"].contains(&action) {
            return Err(Error::Validation(format!("unknown action: {}", action)));
        }
        if ["set", "get", "delete"].contains(&action)
            && input.get("key").and_then(|v| v.as_str()).is_none()
        {
            return Err(Error::Validation(format!("'key' is required for {}", action)));
        }
        if action == "set" && input.get("value").is_none() {
            return Err(Error::Validation("'value' is required for set".into()));
        }
        Ok(())
    }

    async fn call(&self, ctx: CallContext, input: Value) -> Result<Value> {
        let db_path = ctx.data_dir.join("kv.sqlite");
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = rusqlite::Connection::open(&db_path)
            .map_err(|e| Error::Storage(format!("failed to open kv database: {}", e)))?;
        init_schema(&db)?;

        let action = input.get("action").and_then(|v| v.as_str()).unwrap_or("list");
        match action {
            "set" => action_set(&db, &input),
            "get" => action_get(&db, &input),
            "delete" => action_delete(&db, &input),
            "list" => action_list(&db, &input),
            _ => Err(Error::Capability(format!("unknown action: {}", action))),
        }
    }
}

fn init_schema(db: &rusqlite::Connection) -> Result<()> {
    db.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );",
    )
    .map_err(|e| Error::Storage(format!("failed to init kv schema: {}", e)))?;
    Ok(())
}

fn action_set(db: &rusqlite::Connection, input: &Value) -> Result<Value> {
    let key = required_key(input)?;
    let value = input.get("value").cloned().unwrap_or(Value::Null);
    let serialized = serde_json::to_string(&value)?;
    db.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
        rusqlite::params![key, serialized, Utc::now().timestamp_millis()],
    )
    .map_err(|e| Error::Storage(format!("set failed: {}", e)))?;
    Ok(json!({"action": "set", "key": key, "stored": true}))
}

fn action_get(db: &rusqlite::Connection, input: &Value) -> Result<Value> {
    let key = required_key(input)?;
    let row: Option<(String, i64)> = db
        .query_row(
            "SELECT value, updated_at FROM kv WHERE key = ?1",
            rusqlite::params![key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(Error::Storage(format!("get failed: {}", other))),
        })?;

    match row {
        Some((serialized, updated_at)) => {
            let value: Value = serde_json::from_str(&serialized)?;
            Ok(json!({"action": "get", "key": key, "found": true, "value": value, "updated_at_ms": updated_at}))
        }
        None => Ok(json!({"action": "get", "key": key, "found": false})),
    }
}

fn action_delete(db: &rusqlite::Connection, input: &Value) -> Result<Value> {
    let key = required_key(input)?;
    let affected = db
        .execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])
        .map_err(|e| Error::Storage(format!("delete failed: {}", e)))?;
    Ok(json!({"action": "delete", "key": key, "deleted": affected > 0}))
}

fn action_list(db: &rusqlite::Connection, input: &Value) -> Result<Value> {
    let prefix = input.get("prefix").and_then(|v| v.as_str()).unwrap_or("");
    let pattern = format!("{}%", prefix);
    let mut stmt = db
        .prepare("SELECT key, value, updated_at FROM kv WHERE key LIKE ?1 ORDER BY key LIMIT 100")
        .map_err(|e| Error::Storage(format!("list failed: {}", e)))?;
    let rows = stmt
        .query_map(rusqlite::params![pattern], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .map_err(|e| Error::Storage(format!("list failed: {}", e)))?;

    let mut entries = Vec::new();
    for row in rows {
        let (key, serialized, updated_at) =
            row.map_err(|e| Error::Storage(format!("list row failed: {}", e)))?;
        let value: Value = serde_json::from_str(&serialized).unwrap_or(Value::Null);
        entries.push(json!({"key": key, "value": value, "updated_at_ms": updated_at}));
    }
    Ok(json!({"action": "list", "count": entries.len(), "entries": entries}))
}

fn required_key(input: &Value) -> Result<String> {
    input
        .get("key")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Validation("'key' is required".into()))
}
