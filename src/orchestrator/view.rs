use crate::backend::Backend;
use crate::pipeline::{PipelineController, Tool};
use crate::session::{SessionEntry, SessionStore};
use crate::settings::Settings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The part of a tool's state kept in its session entry. Output is recomputed on restore.
#[derive(Serialize, Deserialize)]
#[serde(bound = "", default)]
pub struct ToolSession<T: Tool> {
    pub input: T::Input,
    pub mode: T::Mode,
    pub params: T::Params,
}

impl<T: Tool> Default for ToolSession<T> {
    fn default() -> Self {
        Self {
            input: T::Input::default(),
            mode: T::Mode::default(),
            params: T::Params::default(),
        }
    }
}

impl<T: Tool> Clone for ToolSession<T> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            mode: self.mode,
            params: self.params.clone(),
        }
    }
}

impl<T: Tool> std::fmt::Debug for ToolSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSession")
            .field("input", &self.input)
            .field("mode", &self.mode)
            .field("params", &self.params)
            .finish()
    }
}

/// A mounted tool page: session entry plus pipeline controller.
///
/// Every edit is written to the session first and then forwarded to the controller.
pub struct ToolView<T: Tool> {
    controller: PipelineController<T>,
    session: SessionEntry<ToolSession<T>>,
}

impl<T: Tool> ToolView<T> {
    /// Mount the tool: open its session entry (persisted iff `settings.system.cachable`)
    /// and evaluate the restored state once.
    pub fn open(store: &SessionStore, backend: Arc<dyn Backend>, settings: &Settings) -> Self {
        let session = store.open(T::ROUTE, ToolSession::<T>::default(), settings.system.cachable);
        let restored = session.read();
        tracing::info!(
            route = T::ROUTE,
            persisted = session.is_persisted(),
            "tool view opened"
        );
        let controller =
            PipelineController::with_state(backend, restored.input, restored.mode, restored.params);
        Self {
            controller,
            session,
        }
    }

    pub fn controller(&self) -> &PipelineController<T> {
        &self.controller
    }

    pub fn session(&self) -> &SessionEntry<ToolSession<T>> {
        &self.session
    }

    pub fn set_input(&self, input: T::Input) {
        self.session.update(|s| s.input = input.clone());
        self.controller.set_input(input);
    }

    pub fn set_mode(&self, mode: T::Mode) {
        self.session.update(|s| {
            if s.mode != mode {
                s.mode = mode;
                s.input = T::Input::default();
            }
        });
        self.controller.set_mode(mode);
    }

    pub fn set_params(&self, params: T::Params) {
        self.session.update(|s| s.params = params.clone());
        self.controller.set_params(params);
    }

    /// Apply a fallible edit to input and params. Nothing changes if `f` fails.
    pub fn edit(
        &self,
        f: impl FnOnce(&mut T::Input, &mut T::Params) -> Result<()>,
    ) -> Result<()> {
        let mut next = self.session.read();
        f(&mut next.input, &mut next.params)?;
        self.session.write(next.clone());
        self.controller.edit(move |input, params| {
            *input = next.input;
            *params = next.params;
        });
        Ok(())
    }

    pub fn refresh(&self) {
        self.controller.refresh();
    }
}
