//! Call counting and argument/result history.

use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::store::Store;

/// Output recorded for a call that found nothing.
pub const NIL_OUTPUT: &str = "(nil)";

/// Prefix of the output recorded for a call that failed.
pub const ERROR_OUTPUT_PREFIX: &str = "!error: ";

/// Store keys holding one operation's instrumentation data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryKeys {
  pub counter: String,
  pub inputs: String,
  pub outputs: String,
}

impl HistoryKeys {
  pub fn for_operation(operation: &str) -> Self {
    Self {
      counter: operation.to_string(),
      inputs: format!("{}:inputs", operation),
      outputs: format!("{}:outputs", operation),
    }
  }
}

/// One recorded call: the argument tuple and what the call returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
  pub args: String,
  pub output: String,
}

impl CallRecord {
  pub fn render(&self, operation: &str) -> String {
    format!("{}(*{}) -> {}", operation, self.args, self.output)
  }
}

/// Wraps a call body with counting and history side effects.
///
/// For every call, in order: append the arguments to `{op}:inputs`, increment
/// `{op}`, run the body, append the rendered result to `{op}:outputs`. A
/// failing body still gets an output entry so the two lists stay parallel.
pub struct Recorder<S: Store + ?Sized> {
  store: Arc<S>,
}

impl<S: Store + ?Sized> Recorder<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  pub fn record<R, F, O>(&self, operation: &str, args: &str, body: F, render: O) -> Result<R>
  where
    F: FnOnce() -> Result<R>,
    O: FnOnce(&R) -> String,
  {
    let keys = HistoryKeys::for_operation(operation);

    self.store.append_to_list(&keys.inputs, args.as_bytes())?;
    self.store.increment(&keys.counter)?;

    match body() {
      Ok(result) => {
        self
          .store
          .append_to_list(&keys.outputs, render(&result).as_bytes())?;
        Ok(result)
      }
      Err(e) => {
        let output = if e.is_not_found() {
          NIL_OUTPUT.to_string()
        } else {
          format!("{}{}", ERROR_OUTPUT_PREFIX, e)
        };

        if let Err(marker_err) = self.store.append_to_list(&keys.outputs, output.as_bytes()) {
          warn!(operation, error = %marker_err, "failed to record output of failed call");
        }
        Err(e)
      }
    }
  }
}

impl<S: Store + ?Sized> Clone for Recorder<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}
