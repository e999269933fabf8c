//! Capability surface: everything the guest can reach.
//!
//! The guest gets a minimal system-call set (clock, randomness, stdio
//! diagnostics) and exactly one application import, `wapp::publish_frame`.
//! No filesystem, network, environment, or process capability is ever
//! linked.

use wasmtime::{Caller, Linker};
use wasmtime_wasi::preview1::{self, WasiP1Ctx};
use wasmtime_wasi::WasiCtxBuilder;

use crate::frame::FrameDescriptor;

/// Import module name for the application interface.
pub const IMPORT_MODULE: &str = "wapp";

/// Per-instance store state: the WASI context plus the frame descriptor the
/// guest publishes into.
pub struct StoreState {
    wasi: WasiP1Ctx,
    frame: FrameDescriptor,
}

impl StoreState {
    pub fn new() -> Self {
        // Clock and randomness are on by default; stdout/stderr are the
        // only inherited handles. No preopened dirs, no env, no args.
        let wasi = WasiCtxBuilder::new()
            .inherit_stdout()
            .inherit_stderr()
            .build_p1();
        Self {
            wasi,
            frame: FrameDescriptor::default(),
        }
    }

    /// The descriptor most recently published by the guest.
    pub fn frame(&self) -> FrameDescriptor {
        self.frame
    }

    pub(crate) fn frame_mut(&mut self) -> &mut FrameDescriptor {
        &mut self.frame
    }
}

impl Default for StoreState {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the full capability surface into `linker`.
///
/// This is the guest's entire reachable host API: restricted WASI preview1
/// plus `wapp::publish_frame(width, height, pointer)`.
pub fn add_to_linker(linker: &mut Linker<StoreState>) -> Result<(), wasmtime::Error> {
    preview1::add_to_linker_sync(linker, |state: &mut StoreState| &mut state.wasi)?;

    // publish_frame records the descriptor exactly as given, zero sizes
    // included; validity is checked at present time, which keeps this call
    // allocation-free and trap-free.
    linker.func_wrap(
        IMPORT_MODULE,
        "publish_frame",
        |mut caller: Caller<'_, StoreState>, width: i32, height: i32, pointer: i32| {
            caller
                .data_mut()
                .frame_mut()
                .record(width as u32, height as u32, pointer as u32);
        },
    )?;

    Ok(())
}
