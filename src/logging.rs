use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{error::ErrorKind, model::ClientId, AppError};

pub const LOG_TARGET: &str = "clientdesk";

/// Installs the global subscriber: JSON lines to stderr, plus a daily rolling
/// file when `log_dir` is set. Keep the returned guard alive to flush the file.
pub fn init_logging(filter: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let _ = tracing_log::LogTracer::init();

    let console_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "clientdesk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_target(true)
                .with_ansi(false)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(writer)
                .with_filter(EnvFilter::new(filter));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init();
    guard
}

fn context_to_json(context: &HashMap<String, String>) -> Option<Value> {
    if context.is_empty() {
        None
    } else {
        let mut map = Map::with_capacity(context.len());
        for (key, value) in context {
            map.insert(key.clone(), Value::String(value.clone()));
        }
        Some(Value::Object(map))
    }
}

fn wrap_details(value: Value) -> Value {
    if value.is_object() {
        value
    } else {
        json!({ "value": value })
    }
}

fn error_details(err: &AppError) -> Value {
    let mut map = Map::new();
    map.insert("code".into(), Value::String(err.code().to_string()));
    map.insert("message".into(), Value::String(err.message().to_string()));
    if let Some(context) = context_to_json(err.context()) {
        map.insert("context".into(), context);
    }
    if let Some(cause) = err.cause() {
        map.insert("cause".into(), Value::String(cause.to_string()));
    }
    if let Some(crash) = err.crash_id() {
        map.insert("crash_id".into(), Value::String(crash.to_string()));
    }
    Value::Object(map)
}

/// Structured enter/exit logging for one synchronizer load or mutation.
pub struct OpScope {
    cmd: &'static str,
    client_id: Option<ClientId>,
    actor_id: Option<String>,
    start: Instant,
}

impl OpScope {
    pub fn new(cmd: &'static str, client_id: Option<ClientId>, actor_id: Option<&str>) -> Self {
        let scope = Self {
            cmd,
            client_id,
            actor_id: actor_id.map(str::to_owned),
            start: Instant::now(),
        };
        debug!(
            target: LOG_TARGET,
            area = "clients",
            cmd = scope.cmd,
            client_id = scope.client_id,
            actor_id = scope.actor_id.as_deref(),
            details = %json!({ "stage": "enter" })
        );
        scope
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn success(&self, client_id: Option<ClientId>, details: Value) {
        info!(
            target: LOG_TARGET,
            area = "clients",
            cmd = self.cmd,
            client_id = client_id.or(self.client_id),
            actor_id = self.actor_id.as_deref(),
            duration_ms = self.elapsed_ms(),
            details = %wrap_details(details)
        );
    }

    pub fn warn(&self, details: Value) {
        warn!(
            target: LOG_TARGET,
            area = "clients",
            cmd = self.cmd,
            client_id = self.client_id,
            actor_id = self.actor_id.as_deref(),
            duration_ms = self.elapsed_ms(),
            details = %wrap_details(details)
        );
    }

    /// Side effect failed after the write went through.
    pub fn sink_failed(&self, client_id: ClientId, err: &AppError) {
        warn!(
            target: LOG_TARGET,
            area = "clients",
            cmd = self.cmd,
            client_id = client_id,
            actor_id = self.actor_id.as_deref(),
            duration_ms = self.elapsed_ms(),
            details = %error_details(err)
        );
    }

    pub fn fail(&self, err: &AppError) {
        if err.kind() == ErrorKind::Validation {
            self.warn(error_details(err));
            return;
        }

        error!(
            target: LOG_TARGET,
            area = "clients",
            cmd = self.cmd,
            client_id = self.client_id,
            actor_id = self.actor_id.as_deref(),
            duration_ms = self.elapsed_ms(),
            details = %error_details(err)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_object_details_are_wrapped() {
        assert_eq!(wrap_details(json!(3)), json!({ "value": 3 }));
        assert_eq!(wrap_details(json!({ "rows": 3 })), json!({ "rows": 3 }));
    }

    #[test]
    fn error_details_carry_code_context_and_cause() {
        let err = AppError::persist("clients_insert", AppError::new("Sqlite/5", "locked"));
        let details = error_details(&err);
        assert_eq!(details["code"], "STORE/PERSIST");
        assert_eq!(details["context"]["operation"], "clients_insert");
        assert_eq!(details["cause"], "[Sqlite/5] locked");
    }
}
