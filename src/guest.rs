//! A single sandboxed guest instance.
//!
//! Compiles and instantiates the package payload under the capability
//! surface, resolves the export set once, and wraps every guest call so the
//! frame descriptor is invalidated afterwards (any call may grow, and
//! therefore relocate, the guest memory).

use tracing::debug;
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store, TypedFunc, WasmParams};

use crate::capability::{self, StoreState};
use crate::error::{LoadError, PresentError, SessionError};
use crate::frame::{Frame, FrameBridge};
use crate::input::InputEvent;

/// Entry points the guest chose to export, resolved once at instantiation.
///
/// Only `update` is mandatory. A guest ignores an event kind by simply not
/// exporting the handler; absence is decided here, never probed per call.
struct GuestExports {
    update: TypedFunc<f64, ()>,
    on_resize: Option<TypedFunc<(i32, i32), ()>>,
    on_pointer_move: Option<TypedFunc<(i32, i32), ()>>,
    on_pointer_down: Option<TypedFunc<(i32, i32, i32), ()>>,
    on_pointer_up: Option<TypedFunc<(i32, i32, i32), ()>>,
    on_key_down: Option<TypedFunc<i32, ()>>,
    on_key_up: Option<TypedFunc<i32, ()>>,
}

impl GuestExports {
    fn resolve(instance: &Instance, store: &mut Store<StoreState>) -> Result<Self, LoadError> {
        let update = instance
            .get_typed_func::<f64, ()>(&mut *store, "update")
            .map_err(|_| LoadError::MissingExport("update"))?;
        Ok(Self {
            update,
            on_resize: instance
                .get_typed_func::<(i32, i32), ()>(&mut *store, "on_resize")
                .ok(),
            on_pointer_move: instance
                .get_typed_func::<(i32, i32), ()>(&mut *store, "on_pointer_move")
                .ok(),
            on_pointer_down: instance
                .get_typed_func::<(i32, i32, i32), ()>(&mut *store, "on_pointer_down")
                .ok(),
            on_pointer_up: instance
                .get_typed_func::<(i32, i32, i32), ()>(&mut *store, "on_pointer_up")
                .ok(),
            on_key_down: instance
                .get_typed_func::<i32, ()>(&mut *store, "on_key_down")
                .ok(),
            on_key_up: instance
                .get_typed_func::<i32, ()>(&mut *store, "on_key_up")
                .ok(),
        })
    }
}

/// An instantiated, sandboxed guest module.
///
/// Owns its store, its exported memory handle, and its resolved entry
/// points. Exactly one instance is alive per session.
pub struct GuestInstance {
    store: Store<StoreState>,
    memory: Memory,
    exports: GuestExports,
}

impl GuestInstance {
    /// Compile `payload`, link the capability surface, and instantiate.
    ///
    /// A payload that needs an import outside the surface fails here,
    /// before any entry point is called.
    pub fn instantiate(engine: &Engine, payload: &[u8]) -> Result<Self, LoadError> {
        let module = Module::new(engine, payload)?;

        let mut linker: Linker<StoreState> = Linker::new(engine);
        capability::add_to_linker(&mut linker)?;

        let mut store = Store::new(engine, StoreState::new());
        let instance = linker.instantiate(&mut store, &module)?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or(LoadError::MissingExport("memory"))?;

        let exports = GuestExports::resolve(&instance, &mut store)?;

        debug!(
            on_resize = exports.on_resize.is_some(),
            on_pointer_move = exports.on_pointer_move.is_some(),
            on_pointer_down = exports.on_pointer_down.is_some(),
            on_pointer_up = exports.on_pointer_up.is_some(),
            on_key_down = exports.on_key_down.is_some(),
            on_key_up = exports.on_key_up.is_some(),
            "guest instantiated"
        );

        Ok(Self {
            store,
            memory,
            exports,
        })
    }

    /// Call the guest's `update` entry point.
    pub fn update(&mut self, delta: f64) -> Result<(), SessionError> {
        let result = self.exports.update.call(&mut self.store, delta);
        self.store.data_mut().frame_mut().invalidate();
        result.map_err(|reason| SessionError::Trap {
            entry_point: "update",
            reason,
        })
    }

    /// Notify the guest that the presentation surface changed size.
    pub fn resize(&mut self, width: i32, height: i32) -> Result<(), SessionError> {
        self.call_optional("on_resize", self.exports.on_resize.clone(), (width, height))
    }

    /// Forward one input event to the matching guest handler.
    ///
    /// Guests that do not export a handler never see that event kind; the
    /// event is dropped without error.
    pub fn dispatch(&mut self, event: InputEvent) -> Result<(), SessionError> {
        match event {
            InputEvent::PointerMove { x, y } => {
                self.call_optional("on_pointer_move", self.exports.on_pointer_move.clone(), (x, y))
            }
            InputEvent::PointerDown { x, y, button } => self.call_optional(
                "on_pointer_down",
                self.exports.on_pointer_down.clone(),
                (x, y, button),
            ),
            InputEvent::PointerUp { x, y, button } => {
                self.call_optional("on_pointer_up", self.exports.on_pointer_up.clone(), (x, y, button))
            }
            InputEvent::KeyDown { code } => {
                self.call_optional("on_key_down", self.exports.on_key_down.clone(), code)
            }
            InputEvent::KeyUp { code } => {
                self.call_optional("on_key_up", self.exports.on_key_up.clone(), code)
            }
        }
    }

    fn call_optional<P: WasmParams>(
        &mut self,
        entry_point: &'static str,
        func: Option<TypedFunc<P, ()>>,
        params: P,
    ) -> Result<(), SessionError> {
        let Some(func) = func else { return Ok(()) };
        let result = func.call(&mut self.store, params);
        self.store.data_mut().frame_mut().invalidate();
        result.map_err(|reason| SessionError::Trap {
            entry_point,
            reason,
        })
    }

    /// Snapshot the currently published frame through `bridge`.
    ///
    /// The memory view is re-acquired here, after all guest calls of the
    /// tick have finished; it is never cached across ticks.
    pub fn present<'b>(
        &mut self,
        bridge: &'b mut FrameBridge,
    ) -> Result<Option<&'b Frame>, PresentError> {
        let descriptor = self.store.data().frame();
        let data = self.memory.data(&self.store);
        bridge.present(&data, &descriptor)
    }
}
