//! Local control protocol
//!
//! UI collaborators and the `ctl` subcommand talk to the running app with
//! length-prefixed JSON over a Unix domain socket.

mod messages;
#[cfg(unix)]
mod socket;

pub use messages::{ControlRequest, ControlResponse, ProfileSummary};
#[cfg(unix)]
pub use socket::{ControlClient, ControlServer, default_socket_path};
