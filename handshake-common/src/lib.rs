//! Shared building blocks of the handshake sync agent.
//!
//! The daemon owns the engine; this crate owns everything the engine and its
//! tests agree on: repository identifiers, the service document model, the
//! error catalog, configuration, logging setup and the git transport seam.

pub mod config;
pub mod errors;
pub mod identifier;
pub mod logging;
pub mod testing;
pub mod transport;
pub mod types;

pub use config::{ConfigErrors, FailureMode, HandshakeConfig, LogFormat};
pub use errors::{ErrorCategory, ErrorCode, ErrorEntry, HandshakeError};
pub use identifier::RepoIdentifier;
pub use logging::{LogConfig, LoggingGuards, init_logging};
pub use transport::{
    GitOperation, GitTransport, MockCommit, MockGitTransport, TransportCall, TransportError,
};
pub use types::{
    ActualState, CONTRACT_FILE, ConfigTriplet, ContractDocument, DependencyRef,
    DesiredDependency, HandshakeDetail, INTERFACE_FILE, InterfaceDocument, SERVICE_FILE,
    ServiceDocument,
};
