//! Instrumented store/retrieve cache.
//!
//! Every `store` and `get` call is:
//! - counted under the operation name (`store`, `get`)
//! - recorded in `{op}:inputs` / `{op}:outputs` history lists
//!
//! [`replay`] renders that history back in call order.

mod history;
mod instrumented;
mod key;
mod report;

pub use history::{CallRecord, HistoryKeys, Recorder, ERROR_OUTPUT_PREFIX, NIL_OUTPUT};
pub use instrumented::{InstrumentedCache, GET_OPERATION, STORE_OPERATION};
pub use key::CacheKey;
pub use report::{replay, Replay};
