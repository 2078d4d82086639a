//! Multi-turn conversation flows.
//!
//! A [`Flow`] is declared once by an app and compiled into the router. Each
//! state accepts one event shape; its handler gets the fields collected so
//! far and answers with a [`Transition`] saying where the conversation goes.

use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use crate::bot::context::HandlerContext;
use crate::bot::event::Reply;
use crate::bot::router::{handler, Handler};
use crate::bot::session::FlowFields;
use crate::core::error::AppResult;

/// Sentinel command accepted by skippable text states
pub const SKIP_COMMAND: &str = "skip";

/// Fallback command that ends any flow
pub const CANCEL_COMMAND: &str = "cancel";

pub type StepFuture = BoxFuture<'static, AppResult<Transition>>;
pub type StepHandler = Arc<dyn Fn(HandlerContext, FlowFields) -> StepFuture + Send + Sync>;

/// Wraps an async step function into a [`StepHandler`].
pub fn step<F, Fut>(f: F) -> StepHandler
where
    F: Fn(HandlerContext, FlowFields) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<Transition>> + Send + 'static,
{
    Arc::new(move |ctx: HandlerContext, fields: FlowFields| -> StepFuture { Box::pin(f(ctx, fields)) })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move to the named state of the same flow
    Next(&'static str),
    /// Remain in the current state (invalid input, re-prompted)
    Stay,
    /// Conversation finished; the session is destroyed
    Done,
}

/// Outcome of one conversation turn.
#[derive(Debug)]
pub struct Transition {
    pub step: Step,
    pub fields: FlowFields,
    pub reply: Reply,
}

impl Transition {
    pub fn next(state: &'static str, fields: FlowFields, reply: Reply) -> Self {
        Self {
            step: Step::Next(state),
            fields,
            reply,
        }
    }

    pub fn stay(fields: FlowFields, reply: Reply) -> Self {
        Self {
            step: Step::Stay,
            fields,
            reply,
        }
    }

    pub fn done(reply: Reply) -> Self {
        Self {
            step: Step::Done,
            fields: FlowFields::new(),
            reply,
        }
    }
}

/// Event shape a state accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepts {
    /// Free text; with `skippable`, also the `/skip` sentinel
    Text { skippable: bool },
    /// Callback tokens matching the regex
    Callback(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Command(String),
    Callback(String),
}

pub struct StateDef {
    pub tag: &'static str,
    pub accepts: Accepts,
    /// Sent again when the user answers with something this state can't take
    pub prompt: String,
    pub handler: StepHandler,
}

pub struct EntryDef {
    pub trigger: Trigger,
    pub handler: StepHandler,
}

pub struct FallbackDef {
    pub trigger: Trigger,
    pub handler: Handler,
}

/// Declarative description of one conversation.
pub struct Flow {
    pub id: &'static str,
    pub entries: Vec<EntryDef>,
    pub states: Vec<StateDef>,
    pub fallbacks: Vec<FallbackDef>,
}

impl Flow {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            entries: Vec::new(),
            states: Vec::new(),
            fallbacks: Vec::new(),
        }
    }

    pub fn entry_command<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(HandlerContext, FlowFields) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Transition>> + Send + 'static,
    {
        self.entries.push(EntryDef {
            trigger: Trigger::Command(name.to_string()),
            handler: step(f),
        });
        self
    }

    pub fn entry_callback<F, Fut>(mut self, pattern: &str, f: F) -> Self
    where
        F: Fn(HandlerContext, FlowFields) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Transition>> + Send + 'static,
    {
        self.entries.push(EntryDef {
            trigger: Trigger::Callback(pattern.to_string()),
            handler: step(f),
        });
        self
    }

    pub fn text_state<F, Fut>(self, tag: &'static str, prompt: &str, f: F) -> Self
    where
        F: Fn(HandlerContext, FlowFields) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Transition>> + Send + 'static,
    {
        self.state(tag, Accepts::Text { skippable: false }, prompt, f)
    }

    /// Text state that also takes `/skip`, stored as an empty value
    pub fn skippable_text_state<F, Fut>(self, tag: &'static str, prompt: &str, f: F) -> Self
    where
        F: Fn(HandlerContext, FlowFields) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Transition>> + Send + 'static,
    {
        self.state(tag, Accepts::Text { skippable: true }, prompt, f)
    }

    pub fn callback_state<F, Fut>(self, tag: &'static str, pattern: &str, prompt: &str, f: F) -> Self
    where
        F: Fn(HandlerContext, FlowFields) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Transition>> + Send + 'static,
    {
        self.state(tag, Accepts::Callback(pattern.to_string()), prompt, f)
    }

    fn state<F, Fut>(mut self, tag: &'static str, accepts: Accepts, prompt: &str, f: F) -> Self
    where
        F: Fn(HandlerContext, FlowFields) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Transition>> + Send + 'static,
    {
        self.states.push(StateDef {
            tag,
            accepts,
            prompt: prompt.to_string(),
            handler: step(f),
        });
        self
    }

    pub fn fallback_command<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Reply>> + Send + 'static,
    {
        self.fallbacks.push(FallbackDef {
            trigger: Trigger::Command(name.to_string()),
            handler: handler(f),
        });
        self
    }

    pub fn fallback_callback<F, Fut>(mut self, pattern: &str, f: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Reply>> + Send + 'static,
    {
        self.fallbacks.push(FallbackDef {
            trigger: Trigger::Callback(pattern.to_string()),
            handler: handler(f),
        });
        self
    }
}

/// Input of a text state: the typed text verbatim, or empty for `/skip`.
///
/// Returns `None` when the event carries neither, which the router never
/// lets through to a text state.
pub fn text_input(ctx: &HandlerContext) -> Option<String> {
    if ctx.is_skip() {
        return Some(String::new());
    }
    ctx.text().map(str::to_string)
}
