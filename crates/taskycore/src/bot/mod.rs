//! Transport-neutral bot machinery: events, routing, conversations,
//! the app registry and presentation helpers.

pub mod application;
pub mod context;
pub mod conversation;
pub mod event;
pub mod format;
pub mod keyboard;
pub mod pagination;
pub mod registry;
pub mod router;
pub mod session;

pub use application::Application;
pub use context::{CallbackArgs, HandlerContext, Services};
pub use conversation::{Flow, Step, Transition};
pub use event::{Delivery, EventKind, InboundEvent, OutboundMessage, Reply, Sender, SessionKey, TextFormat};
pub use keyboard::{Button, Keyboard};
pub use registry::{AppMeta, AppRegistry, BotApp, Catalog, Registration};
pub use router::{Router, RouterBuilder};
pub use session::{FlowFields, Session, SessionStore};
