//! View / Controller / Model state synchronization
//!
//! Control flow for a locally-originated edit:
//!
//! ```text
//! user input ─▶ View ─▶ Controller::change ─▶ change handler ─▶ Model write
//!                                                                   │
//!   View::reconcile ◀─ negotiated ◀─ origin ◀───── broadcast ◀──────┘
//!   View::render    ◀─ forced     ◀─ every other subscriber
//! ```

pub mod controller;
pub mod effects;
pub mod model;
pub mod payload;
pub mod schema;
pub mod transaction;
pub mod view;
pub mod widget;

pub use controller::{ChangeHandler, Controller, RawDataHandler, ViewUpdate};
pub use effects::{Effects, ModelRequest};
pub use model::{Delivery, DeliveryResult, Model, WidgetId};
pub use payload::Payload;
pub use schema::{PartialState, StateSchema, StateSnapshot};
pub use transaction::Transaction;
pub use view::{Reconcile, Renderer, View};
pub use widget::{Applied, Widget};
