use crate::model::Request;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Bounds shared by every piece of tool state that is snapshotted and persisted.
pub trait ToolValue: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> ToolValue for T where T: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Declares the shapes of one tool and how its state maps onto a backend operation.
///
/// Implementors are marker types; all state lives in the associated types.
pub trait Tool: Send + Sync + 'static {
    /// Request payload edited by the user. Reset to `Default` when the mode changes.
    type Input: ToolValue + Default + PartialEq;
    type Mode: ToolValue + Copy + Default + PartialEq;
    /// Configuration that survives mode switches (variant selectors, flags).
    type Params: ToolValue + Default + PartialEq;
    type Output: ToolValue + PartialEq;

    /// Route identifier owning this tool's session entry.
    const ROUTE: &'static str;

    /// Cheap local precondition; `false` short-circuits to `Output::Empty`.
    fn should_invoke(input: &Self::Input, params: &Self::Params) -> bool;

    fn request(input: &Self::Input, mode: Self::Mode, params: &Self::Params) -> Request;
}
