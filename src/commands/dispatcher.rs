//! Command Dispatcher
//!
//! Routes each input line to the first command that recognizes it. The
//! keywords are all distinct, so first-match and exact-match give the same
//! result; a line nobody recognizes gets [`UNKNOWN_COMMAND`] and touches no
//! backend.

use crate::backend::Backend;
use crate::commands::handler::{Command, Response};
use crate::commands::UNKNOWN_COMMAND;
use crate::manager::{DatabaseManager, DbError};
use tracing::debug;

/// Owns the ordered command set and the database manager they share.
pub struct Dispatcher<B: Backend> {
    commands: Vec<Command>,
    manager: DatabaseManager<B>,
}

impl<B: Backend> Dispatcher<B> {
    /// Creates a dispatcher with every command in [`Command::ALL`].
    pub fn new(manager: DatabaseManager<B>) -> Self {
        Self::with_commands(manager, Command::ALL.to_vec())
    }

    /// Creates a dispatcher with an explicit command order.
    pub fn with_commands(manager: DatabaseManager<B>, commands: Vec<Command>) -> Self {
        Self { commands, manager }
    }

    pub fn manager(&self) -> &DatabaseManager<B> {
        &self.manager
    }

    /// The command that would handle `line`, if any.
    pub fn find(&self, line: &str) -> Option<Command> {
        self.commands.iter().copied().find(|c| c.recognize(line))
    }

    /// Handles one line and returns exactly one reply.
    pub async fn dispatch(&mut self, line: &str) -> Response {
        match self.find(line) {
            Some(command) => command.execute(line, &mut self.manager).await,
            None => {
                debug!(line, "Unrecognized command");
                Response::line(UNKNOWN_COMMAND)
            }
        }
    }

    /// Closes the connection, if any, at the end of a session.
    pub async fn shutdown(&mut self) -> Result<(), DbError> {
        self.manager.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::commands::{INCORRECT_FORMAT, PROMPT};

    fn create_dispatcher() -> (Dispatcher<MemoryBackend>, MemoryBackend) {
        let backend = MemoryBackend::new()
            .with_user("postgres", "secret")
            .with_database("shop");
        let manager = DatabaseManager::new(backend.clone());
        (Dispatcher::new(manager), backend)
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (mut dispatcher, backend) = create_dispatcher();
        dispatcher.dispatch("connect|shop|postgres|secret").await;

        for line in ["select|orders", "DROP|orders", "", "|orders", "dropx"] {
            let response = dispatcher.dispatch(line).await;
            assert_eq!(response.lines(), [UNKNOWN_COMMAND]);
        }
        assert_eq!(backend.stats().statements_executed(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_session_flow() {
        let (mut dispatcher, _backend) = create_dispatcher();

        let response = dispatcher.dispatch("tables").await;
        assert_eq!(
            response.lines(),
            ["You are not connected to database.", PROMPT]
        );

        dispatcher.dispatch("connect|shop|postgres|secret").await;
        assert!(dispatcher.manager().is_connected());

        let response = dispatcher.dispatch("create|orders|id|int").await;
        assert_eq!(
            response.lines(),
            ["Table orders was created. Enter next command or help:"]
        );

        let response = dispatcher.dispatch("drop|orders").await;
        assert_eq!(
            response.lines(),
            ["Table orders was dropped. Enter next command or help:"]
        );

        let response = dispatcher.dispatch("drop").await;
        assert_eq!(response.lines(), [INCORRECT_FORMAT]);

        let response = dispatcher.dispatch("exit").await;
        assert!(response.is_exit());
        assert!(!dispatcher.manager().is_connected());
    }

    #[tokio::test]
    async fn test_restricted_command_set() {
        let backend = MemoryBackend::new();
        let manager = DatabaseManager::new(backend);
        let mut dispatcher =
            Dispatcher::with_commands(manager, vec![Command::Help, Command::Exit]);

        assert_eq!(dispatcher.find("help"), Some(Command::Help));
        assert_eq!(dispatcher.find("tables"), None);

        let response = dispatcher.dispatch("tables").await;
        assert_eq!(response.lines(), [UNKNOWN_COMMAND]);
    }

    #[tokio::test]
    async fn test_shutdown_closes_connection() {
        let (mut dispatcher, backend) = create_dispatcher();
        dispatcher.dispatch("connect|shop|postgres|secret").await;
        assert_eq!(backend.stats().live_connections(), 1);

        dispatcher.shutdown().await.unwrap();
        assert_eq!(backend.stats().live_connections(), 0);
    }
}
