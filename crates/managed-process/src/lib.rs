//! # managed-process
//!
//! **Purpose**: Reusable ownership of a single child process for tools that
//! repeatedly shell out to external executables.
//!
//! ## Features
//!
//! - **Pluggable Executables**: `Executable` maps domain arguments to a command line
//! - **Respawn Cleanup**: spawning again detaches, terminates and resets the previous child
//! - **Output Capture**: stdout/stderr accumulated chunk by chunk in `OutputBuffer`s
//! - **Streaming Input**: byte buffers or async readers forwarded to stdin in order
//! - **Failure Policy**: stderr output, exit status, or both decide `wait`'s outcome
//! - **Signal Delivery**: forced termination or arbitrary Unix signals via `kill`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use managed_process::{Executable, ManagedProcess};
//!
//! struct Grep;
//!
//! impl Executable for Grep {
//!     type Args = &'static str;
//!
//!     fn program(&self) -> &str {
//!         "grep"
//!     }
//!
//!     fn arguments(&self, pattern: Self::Args) -> Vec<String> {
//!         vec!["-n".to_string(), pattern.to_string()]
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut grep = ManagedProcess::new(Grep);
//! grep.spawn("needle").await?;
//! grep.write("hay\nneedle\n");
//! grep.wait().await?;
//! println!("{}", grep.stdout());
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod executable;
pub mod input;
pub mod process;

mod handle;

pub use buffer::OutputBuffer;
pub use config::{FailurePolicy, ProcessConfig};
pub use error::{ProcessError, Result};
pub use executable::{Executable, Program};
pub use input::{InputStream, ProcessInput, WriteOptions};
pub use process::{ManagedProcess, ProcessState};
