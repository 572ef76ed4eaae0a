pub mod docker;
pub mod executor;
pub mod mysql;

pub use docker::RunContext;
pub use executor::{CommandExecutor, CommandSpec, ExecutionError, ProcessExecutor};
pub use mysql::{MysqlConnection, SeedError};
