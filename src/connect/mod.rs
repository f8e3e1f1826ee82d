//! Connections to the Gerrit server: the persistent SSH session used by the
//! event pipeline and the REST client for the HTTP API.

pub mod rest;
pub mod ssh;

pub use rest::RestClient;
pub use ssh::{CommandRunner, SshConfig, SshTransport, StreamTransport};
