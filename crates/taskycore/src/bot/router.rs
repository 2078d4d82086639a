//! Command and callback routing.
//!
//! Selection order for one event:
//! 1. an open conversation for (chat, user): its fallbacks, then the
//!    current state's handler when the event has the accepted shape;
//! 2. the command table, or the ordered callback patterns (first match);
//! 3. nothing; the caller still acknowledges callbacks.

use futures_util::future::BoxFuture;
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::bot::context::{HandlerContext, Services};
use crate::bot::conversation::{Accepts, Flow, Step, StepHandler, Trigger, SKIP_COMMAND};
use crate::bot::event::{EventKind, InboundEvent, OutboundMessage, Reply};
use crate::bot::keyboard::Keyboard;
use crate::bot::session::{FlowFields, Session, SessionStore};
use crate::core::error::{AppError, AppResult};

pub type HandlerFuture = BoxFuture<'static, AppResult<Reply>>;
pub type Handler = Arc<dyn Fn(HandlerContext) -> HandlerFuture + Send + Sync>;

/// Wraps an async handler function into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<Reply>> + Send + 'static,
{
    Arc::new(move |ctx: HandlerContext| -> HandlerFuture { Box::pin(f(ctx)) })
}

#[derive(Clone)]
enum Target {
    Handler(Handler),
    /// Starts a conversation
    Entry { flow_id: &'static str, handler: StepHandler },
}

#[derive(Clone)]
struct CallbackRoute {
    pattern: Regex,
    target: Target,
}

enum CompiledTrigger {
    Command(String),
    Callback(Regex),
}

impl CompiledTrigger {
    fn compile(trigger: Trigger) -> AppResult<Self> {
        Ok(match trigger {
            Trigger::Command(name) => CompiledTrigger::Command(name),
            Trigger::Callback(pattern) => CompiledTrigger::Callback(Regex::new(&pattern)?),
        })
    }

    fn matches(&self, event: &InboundEvent) -> bool {
        match (self, &event.kind) {
            (CompiledTrigger::Command(expected), EventKind::Command { name, .. }) => expected == name,
            (CompiledTrigger::Callback(pattern), EventKind::Callback { token }) => pattern.is_match(token),
            _ => false,
        }
    }
}

enum CompiledAccepts {
    Text { skippable: bool },
    Callback(Regex),
}

struct CompiledState {
    tag: &'static str,
    accepts: CompiledAccepts,
    prompt: String,
    handler: StepHandler,
}

impl CompiledState {
    fn accepts(&self, event: &InboundEvent) -> bool {
        match (&self.accepts, &event.kind) {
            (CompiledAccepts::Text { .. }, EventKind::Text { .. }) => true,
            (CompiledAccepts::Text { skippable }, EventKind::Command { name, .. }) => {
                *skippable && name == SKIP_COMMAND
            }
            (CompiledAccepts::Callback(pattern), EventKind::Callback { token }) => pattern.is_match(token),
            _ => false,
        }
    }

    /// The prompt again, with the state's buttons when it was offered any
    fn reprompt(&self, choices: Option<&Keyboard>) -> Reply {
        let hint = match (&self.accepts, choices) {
            (CompiledAccepts::Callback(_), Some(_)) => "Pick one of the buttons below, or send /cancel to stop.",
            _ => "Send /cancel to stop.",
        };
        let message = OutboundMessage::html(format!("{}\n\n<i>{}</i>", self.prompt, hint));
        match choices {
            Some(keyboard) => Reply::message(message.with_keyboard(keyboard.clone())),
            None => Reply::message(message),
        }
    }
}

struct CompiledFlow {
    id: &'static str,
    states: Vec<CompiledState>,
    fallbacks: Vec<(CompiledTrigger, Handler)>,
}

impl CompiledFlow {
    fn state(&self, tag: &str) -> Option<&CompiledState> {
        self.states.iter().find(|s| s.tag == tag)
    }

    fn fallback_for(&self, event: &InboundEvent) -> Option<&Handler> {
        self.fallbacks
            .iter()
            .find(|(trigger, _)| trigger.matches(event))
            .map(|(_, handler)| handler)
    }
}

/// Collects the routes of one or more apps before the router is frozen.
#[derive(Default)]
pub struct RouterBuilder {
    commands: Vec<(String, Target)>,
    callbacks: Vec<CallbackRoute>,
    flows: Vec<CompiledFlow>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `/name`. Names are unique across the whole router.
    pub fn command<F, Fut>(&mut self, name: &str, f: F) -> AppResult<()>
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Reply>> + Send + 'static,
    {
        self.add_command(name, Target::Handler(handler(f)))
    }

    /// Registers a callback pattern; earlier registrations win on overlap.
    pub fn callback<F, Fut>(&mut self, pattern: &str, f: F) -> AppResult<()>
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Reply>> + Send + 'static,
    {
        self.add_callback(pattern, Target::Handler(handler(f)))
    }

    /// Compiles `flow` and files its entry points into the command and callback tables.
    pub fn flow(&mut self, flow: Flow) -> AppResult<()> {
        if self.flows.iter().any(|f| f.id == flow.id) {
            return Err(AppError::Registration(format!("flow '{}' registered twice", flow.id)));
        }
        if flow.states.is_empty() {
            return Err(AppError::Registration(format!("flow '{}' has no states", flow.id)));
        }

        let mut states = Vec::with_capacity(flow.states.len());
        for state in flow.states {
            if states.iter().any(|s: &CompiledState| s.tag == state.tag) {
                return Err(AppError::Registration(format!(
                    "flow '{}' declares state '{}' twice",
                    flow.id, state.tag
                )));
            }
            let accepts = match state.accepts {
                Accepts::Text { skippable } => CompiledAccepts::Text { skippable },
                Accepts::Callback(pattern) => CompiledAccepts::Callback(Regex::new(&pattern)?),
            };
            states.push(CompiledState {
                tag: state.tag,
                accepts,
                prompt: state.prompt,
                handler: state.handler,
            });
        }

        let fallbacks = flow
            .fallbacks
            .into_iter()
            .map(|fb| Ok((CompiledTrigger::compile(fb.trigger)?, fb.handler)))
            .collect::<AppResult<Vec<_>>>()?;

        for entry in flow.entries {
            let target = Target::Entry {
                flow_id: flow.id,
                handler: entry.handler,
            };
            match entry.trigger {
                Trigger::Command(name) => self.add_command(&name, target)?,
                Trigger::Callback(pattern) => self.add_callback(&pattern, target)?,
            }
        }

        self.flows.push(CompiledFlow {
            id: flow.id,
            states,
            fallbacks,
        });
        Ok(())
    }

    fn add_command(&mut self, name: &str, target: Target) -> AppResult<()> {
        let name = name.trim_start_matches('/').to_lowercase();
        if self.commands.iter().any(|(existing, _)| *existing == name) {
            return Err(AppError::Registration(format!("command /{} registered twice", name)));
        }
        self.commands.push((name, target));
        Ok(())
    }

    fn add_callback(&mut self, pattern: &str, target: Target) -> AppResult<()> {
        self.callbacks.push(CallbackRoute {
            pattern: Regex::new(pattern)?,
            target,
        });
        Ok(())
    }

    /// Appends everything `other` registered, all or nothing.
    pub fn merge(&mut self, other: RouterBuilder) -> AppResult<()> {
        for (name, _) in &other.commands {
            if self.commands.iter().any(|(existing, _)| existing == name) {
                return Err(AppError::Registration(format!("command /{} registered twice", name)));
            }
        }
        for flow in &other.flows {
            if self.flows.iter().any(|f| f.id == flow.id) {
                return Err(AppError::Registration(format!("flow '{}' registered twice", flow.id)));
            }
        }

        self.commands.extend(other.commands);
        self.callbacks.extend(other.callbacks);
        self.flows.extend(other.flows);
        Ok(())
    }

    pub fn build(self) -> Router {
        Router {
            commands: self.commands.into_iter().collect(),
            callbacks: self.callbacks,
            flows: self.flows.into_iter().map(|f| (f.id, f)).collect(),
        }
    }
}

/// Frozen routing tables.
pub struct Router {
    commands: HashMap<String, Target>,
    callbacks: Vec<CallbackRoute>,
    flows: HashMap<&'static str, CompiledFlow>,
}

impl Router {
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Pattern of the callback route `token` resolves to outside a conversation
    pub fn callback_pattern(&self, token: &str) -> Option<&str> {
        self.callbacks
            .iter()
            .find(|route| route.pattern.is_match(token))
            .map(|route| route.pattern.as_str())
    }

    pub fn flow_ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = self.flows.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Routes one event. `Ok(None)` means no handler matched.
    ///
    /// The (chat, user) slot stays locked until the handler finishes, so
    /// events of one conversation never interleave.
    pub async fn dispatch(
        &self,
        services: &Services,
        sessions: &SessionStore,
        event: InboundEvent,
    ) -> AppResult<Option<Reply>> {
        let key = event.session_key();
        let slot = sessions.slot(key);
        let mut guard = slot.lock().await;

        if guard.session.as_ref().is_some_and(|s| s.is_expired(sessions.idle_timeout())) {
            if let Some(expired) = guard.session.take() {
                log::info!(
                    "Session expired: chat={} user={} flow={} state={}",
                    key.chat_id,
                    key.user_id,
                    expired.flow_id,
                    expired.state
                );
            }
        }

        if let Some(mut session) = guard.session.take() {
            match self.flows.get(session.flow_id) {
                None => log::warn!("Dropping session of unknown flow '{}'", session.flow_id),
                Some(flow) => {
                    if let Some(fallback) = flow.fallback_for(&event) {
                        log::info!(
                            "Flow {} left at state {} by {} (user {})",
                            flow.id,
                            session.state,
                            event.describe(),
                            key.user_id
                        );
                        return fallback(HandlerContext::new(services.clone(), event)).await.map(Some);
                    }

                    match flow.state(session.state) {
                        Some(state) if state.accepts(&event) => {
                            log::debug!("Flow {} state {} <- {}", flow.id, state.tag, event.describe());
                            let ctx = HandlerContext::new(services.clone(), event);
                            return match (state.handler)(ctx, session.fields.clone()).await {
                                Ok(transition) => {
                                    let choices = transition.reply.keyboard().cloned();
                                    guard.session = advance(flow, session, transition.step, transition.fields, choices);
                                    Ok(Some(transition.reply))
                                }
                                Err(err) => {
                                    // keep the conversation where it was
                                    guard.session = Some(session);
                                    Err(err)
                                }
                            };
                        }
                        Some(state) if reprompts(&event) => {
                            session.touch();
                            let reply = state.reprompt(session.choices.as_ref());
                            guard.session = Some(session);
                            return Ok(Some(reply));
                        }
                        Some(_) => guard.session = Some(session),
                        None => log::warn!("Dropping session in unknown state {}/{}", flow.id, session.state),
                    }
                }
            }
        }

        let target = match &event.kind {
            EventKind::Command { name, .. } => self.commands.get(name.as_str()),
            EventKind::Callback { token } => self
                .callbacks
                .iter()
                .find(|route| route.pattern.is_match(token))
                .map(|route| &route.target),
            EventKind::Text { .. } => None,
        };
        let Some(target) = target else {
            log::debug!("No handler for {} (user {})", event.describe(), key.user_id);
            return Ok(None);
        };

        match target {
            Target::Handler(handler) => handler(HandlerContext::new(services.clone(), event)).await.map(Some),
            Target::Entry { flow_id, handler } => {
                let flow_id = *flow_id;
                let ctx = HandlerContext::new(services.clone(), event);
                let transition = handler(ctx, FlowFields::new()).await?;
                if let Step::Next(state) = transition.step {
                    match self.flows.get(flow_id).and_then(|f| f.state(state)) {
                        Some(_) => {
                            let mut session = Session::new(flow_id, state, transition.fields);
                            session.choices = transition.reply.keyboard().cloned();
                            let previous = guard.session.replace(session);
                            if let Some(previous) = previous {
                                log::info!(
                                    "Flow {} replaces open flow {} for user {}",
                                    flow_id,
                                    previous.flow_id,
                                    key.user_id
                                );
                            }
                            log::debug!("Flow {} started at {} for user {}", flow_id, state, key.user_id);
                        }
                        None => log::error!("Flow {} entry moved to unknown state {}", flow_id, state),
                    }
                }
                Ok(Some(transition.reply))
            }
        }
    }
}

/// Free text (and a stray `/skip`) that a state can't take gets its prompt again.
fn reprompts(event: &InboundEvent) -> bool {
    match &event.kind {
        EventKind::Text { .. } => true,
        EventKind::Command { name, .. } => name == SKIP_COMMAND,
        EventKind::Callback { .. } => false,
    }
}

fn advance(
    flow: &CompiledFlow,
    mut session: Session,
    step: Step,
    fields: FlowFields,
    choices: Option<Keyboard>,
) -> Option<Session> {
    match step {
        Step::Next(tag) => match flow.state(tag) {
            Some(state) => {
                session.state = state.tag;
                session.fields = fields;
                session.choices = choices;
                session.touch();
                Some(session)
            }
            None => {
                log::error!("Flow {} moved to unknown state {}, ending conversation", flow.id, tag);
                None
            }
        },
        Step::Stay => {
            session.fields = fields;
            session.touch();
            Some(session)
        }
        Step::Done => {
            log::debug!("Flow {} finished", flow.id);
            None
        }
    }
}
