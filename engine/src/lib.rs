mod app;
mod errors;
mod events;
mod executor;
mod notify;
mod query;

pub use app::{AppError, AppHash, Application, QueryRequest, QueryResponse};
pub use errors::{EngineError, EngineResult};
pub use events::EventCollector;
pub use executor::{Executor, ExecutorState};
pub use notify::CommitNotifier;
pub use query::QueryClient;
