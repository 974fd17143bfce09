//! Labjob app: coordinator runtime, presenters, query builder and configuration.
mod config;
mod coordinator;
mod effects;
mod interrupt;
mod presenter;
mod query;

pub use config::{ClientConfig, ConfigError, DEFAULT_CONFIG_FILE};
pub use coordinator::{Coordinator, CoordinatorHandle, CoordinatorSettings};
pub use interrupt::{InterruptAction, InterruptPolicy};
pub use presenter::{
    format_view, ErrorPresenter, ProgressPresenter, TerminalErrorPresenter,
    TerminalProgressPresenter,
};
pub use query::{parse_param, NormaliseQuery, QueryError};
