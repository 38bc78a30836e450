use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::{
    error::{CrashId, RUNTIME_PANIC},
    logging::LOG_TARGET,
    AppError, AppResult,
};

fn panic_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn app_error_from_panic(payload: Box<dyn Any + Send>, operation: &'static str) -> AppError {
    let message = panic_payload(payload.as_ref());
    let crash_id = CrashId::new();
    tracing::error!(
        target: LOG_TARGET,
        event = "panic_caught",
        operation,
        crash_id = %crash_id,
        message = message.as_str()
    );

    let mut error = AppError::new(RUNTIME_PANIC, message).with_context("operation", operation);
    error.set_crash_id(crash_id);
    error
}

/// Awaits a store or sink call, turning a panic inside it into an error so the
/// screen returns to an idle state instead of unwinding.
pub async fn fenced<T, Fut>(operation: &'static str, fut: Fut) -> AppResult<T>
where
    Fut: Future<Output = AppResult<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(app_error_from_panic(payload, operation)),
    }
}
