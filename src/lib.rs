//! Host runtime for WAPP packages: single-file sandboxed pixel applications.
//!
//! A package bundles a JSON metadata header with a WebAssembly guest module.
//! The host parses the container, instantiates the guest under a restricted
//! capability surface (clock, randomness, stdio, and one `publish_frame`
//! import), and drives it through a synchronous per-frame cycle: queued
//! input, `update`, frame presentation.

pub mod error;
pub mod frame;
pub mod input;
pub mod package;

mod capability;
mod guest;
mod session;

pub use capability::{add_to_linker, StoreState, IMPORT_MODULE};
pub use error::{LoadError, PackageError, PresentError, SessionError};
pub use frame::{Frame, FrameBridge, FrameDescriptor, GuestMemory};
pub use guest::GuestInstance;
pub use input::{key_code, InputEvent, InputTranslator, PointerButton, SurfaceEvent, SurfaceScale};
pub use package::{Metadata, Package, HEADER_LEN, MAGIC, VERSION};
pub use session::{Session, SessionConfig, SessionState, TickOutcome};

pub use wasmtime;
