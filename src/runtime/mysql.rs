//! `mysql` client boundary
//!
//! Streams schema or seed SQL scripts into a query node through the stock
//! command-line client. The password travels in `MYSQL_PWD` so it never
//! appears on the argument vector.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use super::executor::{CommandExecutor, CommandSpec, ExecutionError};

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("failed to read SQL script {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SQL script {path} failed: {source}")]
    Execution {
        path: String,
        #[source]
        source: ExecutionError,
    },
}

/// Connection parameters for one query node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqlConnection {
    pub user: String,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

/// Generate `mysql` client arguments
pub fn generate_client_args(conn: &MysqlConnection) -> Vec<String> {
    vec![
        "-u".to_string(),
        conn.user.clone(),
        "-h".to_string(),
        conn.host.clone(),
        "-P".to_string(),
        conn.port.to_string(),
    ]
}

/// Build the client command with `script` piped to stdin
pub fn client_command(conn: &MysqlConnection, script: impl Into<Vec<u8>>) -> CommandSpec {
    let mut cmd = CommandSpec::new("mysql")
        .with_args(generate_client_args(conn))
        .with_stdin(script);
    if let Some(password) = &conn.password {
        cmd = cmd.with_env("MYSQL_PWD", password.clone());
    }
    cmd
}

/// Run the SQL file at `path` against `conn`, returning the client's stdout
pub async fn run_script<E: CommandExecutor + ?Sized>(
    executor: &E,
    conn: &MysqlConnection,
    path: &Path,
) -> Result<String, SeedError> {
    let script = tokio::fs::read(path).await.map_err(|source| SeedError::Read {
        path: path.display().to_string(),
        source,
    })?;

    info!(
        "Streaming {} ({} bytes) into {}:{}",
        path.display(),
        script.len(),
        conn.host,
        conn.port
    );

    executor
        .execute(&client_command(conn, script))
        .await
        .map_err(|source| SeedError::Execution {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::executor::mock::RecordingExecutor;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn conn() -> MysqlConnection {
        MysqlConnection {
            user: "loyalty".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3307,
            password: Some("password".to_string()),
        }
    }

    #[test]
    fn test_generate_client_args() {
        assert_eq!(
            generate_client_args(&conn()),
            vec!["-u", "loyalty", "-h", "127.0.0.1", "-P", "3307"]
        );
    }

    #[test]
    fn test_client_command_keeps_password_off_argv() {
        let cmd = client_command(&conn(), "SELECT 1;");
        assert!(!cmd.args.iter().any(|a| a.contains("password")));
        assert_eq!(
            cmd.env,
            vec![("MYSQL_PWD".to_string(), "password".to_string())]
        );
        assert_eq!(cmd.stdin.as_deref(), Some("SELECT 1;".as_bytes()));
    }

    #[tokio::test]
    async fn test_run_script_pipes_file_contents() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"CREATE TABLE t (id INT);").unwrap();

        let executor = RecordingExecutor::new();
        run_script(&executor, &conn(), file.path()).await.unwrap();

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "mysql");
        assert_eq!(
            calls[0].stdin.as_deref(),
            Some("CREATE TABLE t (id INT);".as_bytes())
        );
    }

    #[tokio::test]
    async fn test_run_script_missing_file() {
        let executor = RecordingExecutor::new();
        let err = run_script(&executor, &conn(), Path::new("/nonexistent/seed.sql"))
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::Read { .. }));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_script_reports_client_failure() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"BROKEN;").unwrap();

        let executor = RecordingExecutor::new().fail_on("mysql", 1, "ERROR 1064 (42000)");
        let err = run_script(&executor, &conn(), file.path()).await.unwrap_err();
        match err {
            SeedError::Execution { source, .. } => {
                assert_eq!(source.exit_code(), Some(1));
            }
            other => panic!("Expected execution error, got {:?}", other),
        }
    }
}
