//! Execution layer: stack process lifecycle
//!
//! This module launches the stack binary as a detached background child and
//! manages its lifecycle: non-blocking reaping, signal delivery, and the
//! terminate-then-force-kill shutdown path.

pub mod process;

pub use process::{BinaryLauncher, ChildHandle, Launcher, StackExit, StackProcess};
