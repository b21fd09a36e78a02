use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use serde_json::{Value, json};

use crate::config::{BackdropMode, BodyContent, DialogConfig, SurfaceVariant};
use crate::error::Result;
use crate::fragment::{Fragment, FragmentContext, FragmentEmitter};
use crate::handle::{CommandQueue, DataPayload, DialogHandle, HandleCommand};
use crate::host::{HostPage, Mount, SharedPage, WindowAccessor, same_route};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::EngineMetrics;
use crate::surface::{ChromeContext, ModalSurface, OverlaySurface, SurfaceKind};
use crate::timer::TimerQueue;

use super::audit::{DialogAudit, DialogAuditEvent, DialogAuditStage, NullDialogAudit};
use super::stack::{NAV_REOPEN_GRACE, SCROLL_LOCK_CLASS, StackRegistry};

/// Delay between marking a surface open and resolving its stacking; a
/// zero-length hop so the push is observable before counting.
pub const SETTLE_DELAY: Duration = Duration::ZERO;
/// Class marking a root node as an open surface.
pub const OPEN_MARKER_CLASS: &str = "scrim-open";

const LOG_TARGET: &str = "scrim::engine";

/// Shared services every surface of one environment uses: the window
/// indirection, the stack registry, and the optional observability trio.
#[derive(Clone)]
pub struct DialogEnv {
    pub window: WindowAccessor,
    pub stack: StackRegistry,
    pub logger: Option<Logger>,
    pub metrics: Option<Arc<Mutex<EngineMetrics>>>,
    pub audit: Arc<dyn DialogAudit>,
}

impl DialogEnv {
    pub fn new(window: WindowAccessor) -> Self {
        Self {
            window,
            stack: StackRegistry::new(),
            logger: None,
            metrics: None,
            audit: Arc::new(NullDialogAudit),
        }
    }

    /// Environment with no window behind it; opens become no-ops.
    pub fn headless() -> Self {
        Self::new(WindowAccessor::detached())
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Mutex<EngineMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn DialogAudit>) -> Self {
        self.audit = audit;
        self
    }

    pub(crate) fn log(
        &self,
        level: LogLevel,
        target: &str,
        message: &str,
        fields: impl IntoIterator<Item = (String, Value)>,
    ) {
        if let Some(logger) = self.logger.as_ref() {
            let _ = logger.log_event(event_with_fields(level, target, message, fields));
        }
    }

    pub(crate) fn record_metric(&self, record: impl FnOnce(&mut EngineMetrics)) {
        if let Some(metrics) = self.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                record(&mut guard);
            }
        }
    }
}

/// Lifecycle states of a surface. `Closed` is terminal and reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogPhase {
    Closed,
    Opening,
    Open,
    Closing,
}

/// What asked a surface to dismiss; carried into logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissTrigger {
    Escape,
    BackdropClick,
    CloseButton,
    Programmatic,
    Navigation,
}

impl DismissTrigger {
    fn as_str(self) -> &'static str {
        match self {
            Self::Escape => "escape",
            Self::BackdropClick => "backdrop_click",
            Self::CloseButton => "close_button",
            Self::Programmatic => "programmatic",
            Self::Navigation => "navigation",
        }
    }
}

enum CoreTask {
    Settle,
    ChromeDelay,
    RetryOpen,
}

struct InjectedFragment {
    fragment: Box<dyn Fragment>,
    context: FragmentContext,
    emitter: FragmentEmitter,
}

/// Shared lifecycle engine behind every surface.
///
/// Composes a [`SurfaceKind`] strategy with the open/close state
/// machine, the stacking/backdrop bookkeeping, scroll lock, dismissal
/// routing, the navigation guard, and dynamic content injection. A core
/// owned by a manager defers dismissals into the manager's command
/// queue; a declarative core closes itself directly.
pub struct DialogCore {
    id: String,
    env: DialogEnv,
    config: DialogConfig,
    chrome: Box<dyn SurfaceKind>,
    phase: DialogPhase,
    is_closing: bool,
    managed_externally: bool,
    dismiss_queue: Option<CommandQueue>,
    close_listener: Option<Box<dyn FnMut(Option<Value>) + Send>>,
    saved_scroll: f64,
    open_count_at_settle: usize,
    route_origin: Option<String>,
    injected: Option<InjectedFragment>,
    tasks: TimerQueue<CoreTask>,
    pending_open: bool,
}

impl DialogCore {
    pub fn new(id: impl Into<String>, config: DialogConfig, env: DialogEnv) -> Self {
        let chrome = build_chrome(&config.variant);
        env.audit.record(
            DialogAuditEvent::new(DialogAuditStage::SurfaceConstructed)
                .detail("kind", json!(chrome.kind_name())),
        );
        Self {
            id: id.into(),
            env,
            config,
            chrome,
            phase: DialogPhase::Closed,
            is_closing: false,
            managed_externally: false,
            dismiss_queue: None,
            close_listener: None,
            saved_scroll: 0.0,
            open_count_at_settle: 0,
            route_origin: None,
            injected: None,
            tasks: TimerQueue::new(),
            pending_open: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> DialogPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        matches!(self.phase, DialogPhase::Open)
    }

    pub fn config(&self) -> &DialogConfig {
        &self.config
    }

    pub fn has_injected_fragment(&self) -> bool {
        self.injected.is_some()
    }

    /// Whether enter-transition styling may run (overlays gate this on a
    /// short post-open delay).
    pub fn transition_done(&self) -> bool {
        self.chrome.transition_done()
    }

    /// Mark this core as owned by a manager: the manager attaches and
    /// detaches the root node, and dismiss triggers are deferred into
    /// `dismiss_queue` instead of closing inline.
    pub fn set_managed(&mut self, dismiss_queue: CommandQueue) {
        self.managed_externally = true;
        self.dismiss_queue = Some(dismiss_queue);
    }

    /// Observer for declarative closes; managed instances report through
    /// their result slot instead.
    pub fn set_close_listener(&mut self, listener: impl FnMut(Option<Value>) + Send + 'static) {
        self.close_listener = Some(Box::new(listener));
    }

    /// Manager-side pre-open step: attach the root node hidden and run
    /// one synchronous render pass so injected content has a container
    /// to land in.
    pub fn prepare_attached(&mut self) {
        let Some(page) = self.env.window.document().cloned() else {
            return;
        };
        self.attach_root(&page);
        page.set_style(&self.id, "visibility", Some("hidden"));
        self.render_chrome(&page);
    }

    /// Declarative open flag; `true` starts the open transition.
    pub fn set_open(&mut self, open: bool, now: Instant) {
        if open {
            self.open(now);
        } else {
            self.close(None, false, now);
        }
    }

    /// Run the open algorithm. No-ops without a resolvable window, when
    /// a transition is already in flight, and defers while the
    /// post-navigation grace window runs.
    pub fn open(&mut self, now: Instant) {
        if self.phase != DialogPhase::Closed || self.is_closing {
            return;
        }
        let Some(page) = self.env.window.document().cloned() else {
            self.log(LogLevel::Debug, "open_skipped_no_window", Vec::new());
            return;
        };
        if let Some(deadline) = self.env.stack.reopen_deadline(now) {
            if !self.pending_open {
                self.pending_open = true;
                self.tasks.schedule(now, deadline - now, CoreTask::RetryOpen);
                self.log(
                    LogLevel::Debug,
                    "open_deferred_by_grace",
                    vec![json_kv(
                        "delay_ms",
                        json!((deadline - now).as_millis() as u64),
                    )],
                );
            }
            return;
        }
        self.pending_open = false;
        self.phase = DialogPhase::Opening;
        self.saved_scroll = page.scroll_offset();
        if !self.managed_externally {
            self.attach_root(&page);
        }
        self.route_origin = Some(page.location());
        // The body container must exist before a fragment renders into
        // it; the managed path attaches it in `prepare_attached`.
        self.render_chrome(&page);

        if self.injected.is_none()
            && self.config.is_fragment_body()
            && !self.managed_externally
        {
            if let Err(err) = self.inject_body_content(None) {
                self.log(
                    LogLevel::Warn,
                    "fragment_injection_failed",
                    vec![json_kv("error", json!(err.to_string()))],
                );
            }
            // Rerun chrome so fragment-declared templates take precedence.
            self.render_chrome(&page);
        }

        page.add_body_class(SCROLL_LOCK_CLASS);
        page.set_style(&self.id, "visibility", None);
        page.add_class(&self.id, OPEN_MARKER_CLASS);
        self.env.stack.push(&self.id);
        self.tasks.schedule(now, SETTLE_DELAY, CoreTask::Settle);

        self.env.record_metric(EngineMetrics::record_open);
        self.env.audit.record(
            DialogAuditEvent::new(DialogAuditStage::OpenRequested)
                .detail("surface", json!(self.id.clone())),
        );
        self.log(LogLevel::Debug, "open_started", Vec::new());
    }

    fn settle(&mut self, now: Instant) {
        if self.phase != DialogPhase::Opening {
            return;
        }
        let Some(page) = self.env.window.document().cloned() else {
            return;
        };
        let n = self.env.stack.len();
        self.open_count_at_settle = n;
        if let Some(z) = StackRegistry::surface_z(n) {
            page.set_style(&self.id, "z-index", Some(&z.to_string()));
        }
        self.env.stack.sync_backdrop(page.as_ref());
        self.phase = DialogPhase::Open;

        let cx = ChromeContext {
            window: &self.env.window,
            surface_node: &self.id,
        };
        if let Some(delay) = self.chrome.on_open(&cx) {
            self.tasks.schedule(now, delay, CoreTask::ChromeDelay);
        }

        self.env.audit.record(
            DialogAuditEvent::new(DialogAuditStage::SurfaceOpened)
                .detail("surface", json!(self.id.clone()))
                .detail("stack_depth", json!(n)),
        );
        self.log(
            LogLevel::Info,
            "surface_opened",
            vec![json_kv("stack_depth", json!(n))],
        );
    }

    /// Run the close algorithm. Idempotent: the first caller wins, any
    /// racing trigger is a silent no-op.
    pub fn close(&mut self, result: Option<Value>, forced: bool, now: Instant) {
        if self.is_closing {
            return;
        }
        if self.phase == DialogPhase::Closed {
            if self.pending_open {
                self.pending_open = false;
                self.tasks = TimerQueue::new();
            }
            return;
        }
        self.is_closing = true;
        self.phase = DialogPhase::Closing;
        self.tasks = TimerQueue::new();

        let page = self.env.window.document().cloned();
        if let Some(page) = page.as_ref() {
            // Last-surface check uses the count captured at this
            // surface's own settle, not a fresh count. Closing the
            // earlier member of a concurrent stack unlocks scroll early;
            // that timing is part of the observable contract.
            if self.open_count_at_settle <= 1 {
                page.remove_body_class(SCROLL_LOCK_CLASS);
                if page.scroll_offset() != self.saved_scroll {
                    page.scroll_to(self.saved_scroll);
                }
            }

            let cx = ChromeContext {
                window: &self.env.window,
                surface_node: &self.id,
            };
            self.chrome.on_close(&cx);
        }

        self.env.stack.remove(&self.id);

        if let Some(page) = page.as_ref() {
            page.remove_class(&self.id, OPEN_MARKER_CLASS);
            if !self.managed_externally {
                if let Some(listener) = self.close_listener.as_mut() {
                    listener(result.clone());
                }
                page.remove_node(&self.id);
            }
            self.env.stack.sync_backdrop(page.as_ref());
        }

        self.destroy_fragment();

        self.phase = DialogPhase::Closed;
        self.is_closing = false;
        self.route_origin = None;

        self.env.record_metric(|metrics| {
            metrics.record_close();
            if forced {
                metrics.record_forced_close();
            }
        });
        self.env.audit.record(
            DialogAuditEvent::new(DialogAuditStage::SurfaceClosed)
                .detail("surface", json!(self.id.clone()))
                .detail("forced", json!(forced)),
        );
        self.log(
            LogLevel::Info,
            "surface_closed",
            vec![json_kv("forced", json!(forced))],
        );
    }

    /// Escape handling. Every open surface receives the event; only the
    /// topmost member of the stack acts on it.
    pub fn handle_key(&mut self, key: &KeyEvent, now: Instant) {
        if self.phase != DialogPhase::Open {
            return;
        }
        if key.code != KeyCode::Esc || key.kind != KeyEventKind::Press {
            return;
        }
        if !self.env.stack.is_topmost(&self.id) {
            return;
        }
        self.dismiss(DismissTrigger::Escape, now);
    }

    /// Click landed on the backdrop. Ignored under a `Static` backdrop
    /// and by every surface that is not topmost.
    pub fn handle_backdrop_click(&mut self, now: Instant) {
        if self.phase != DialogPhase::Open {
            return;
        }
        if self.config.backdrop != BackdropMode::Dismissible {
            return;
        }
        if !self.env.stack.is_topmost(&self.id) {
            return;
        }
        self.dismiss(DismissTrigger::BackdropClick, now);
    }

    /// The surface's own close button.
    pub fn handle_close_button(&mut self, now: Instant) {
        if self.phase != DialogPhase::Open || !self.config.show_close_button {
            return;
        }
        self.dismiss(DismissTrigger::CloseButton, now);
    }

    /// Programmatic cancel (declarative callers).
    pub fn request_close(&mut self, now: Instant) {
        if self.phase != DialogPhase::Open && self.phase != DialogPhase::Opening {
            return;
        }
        self.dismiss(DismissTrigger::Programmatic, now);
    }

    fn dismiss(&mut self, trigger: DismissTrigger, now: Instant) {
        self.env.record_metric(EngineMetrics::record_dismissal);
        self.env.audit.record(
            DialogAuditEvent::new(DialogAuditStage::DismissRequested)
                .detail("surface", json!(self.id.clone()))
                .detail("trigger", json!(trigger.as_str())),
        );
        self.log(
            LogLevel::Debug,
            "dismiss_requested",
            vec![json_kv("trigger", json!(trigger.as_str()))],
        );
        match self.dismiss_queue.clone() {
            Some(queue) => queue.push(HandleCommand::Close {
                result: None,
                forced: false,
            }),
            None => self.close(None, false, now),
        }
    }

    /// Navigation-start notification from the host. A destination whose
    /// origin+path differs from the one recorded at open force-closes
    /// the surface (bypassing any confirmation guard) and arms the
    /// shared reopen grace window.
    pub fn on_external_navigation(&mut self, destination: &str, now: Instant) {
        if !matches!(self.phase, DialogPhase::Opening | DialogPhase::Open) {
            return;
        }
        let Some(origin) = self.route_origin.clone() else {
            return;
        };
        if same_route(&origin, destination) {
            return;
        }
        self.env.stack.block_reopen_until(now + NAV_REOPEN_GRACE);
        self.env.audit.record(
            DialogAuditEvent::new(DialogAuditStage::NavigationForcedClose)
                .detail("surface", json!(self.id.clone()))
                .detail("destination", json!(destination)),
        );
        self.log(
            LogLevel::Info,
            "navigation_forced_close",
            vec![json_kv("destination", json!(destination))],
        );
        match self.dismiss_queue.clone() {
            Some(queue) => queue.push(HandleCommand::Close {
                result: None,
                forced: true,
            }),
            None => self.close(None, true, now),
        }
    }

    /// Create and mount the configured body fragment, copy the data
    /// payload onto its declared fields, hand it the dialog handle if it
    /// wants one, and wire the configured event handlers it exposes.
    pub fn inject_body_content(&mut self, handle: Option<DialogHandle>) -> Result<()> {
        if self.injected.is_some() {
            return Ok(());
        }
        let Some(BodyContent::Fragment(factory)) = self.config.body.as_ref() else {
            return Ok(());
        };
        let mut fragment = factory();
        let emitter = FragmentEmitter::new();
        let context = FragmentContext::new(
            self.env.window.clone(),
            format!("{}-body", self.id),
            emitter.clone(),
        );
        fragment.mount(&context)?;

        for (key, value) in self.config.data.iter() {
            if !fragment.set_field(key, value) {
                self.env.log(
                    LogLevel::Debug,
                    LOG_TARGET,
                    "payload_key_skipped",
                    vec![json_kv("key", json!(key.clone()))],
                );
            }
        }

        if fragment.wants_handle() {
            if let Some(handle) = handle {
                fragment.accept_handle(handle);
            }
        }

        let exposed = fragment.event_names();
        for (name, handler) in self.config.event_handlers.drain(..) {
            if exposed.contains(&name.as_str()) {
                emitter.wire(name, handler);
            } else {
                self.env.log(
                    LogLevel::Warn,
                    LOG_TARGET,
                    "event_handler_unmatched",
                    vec![json_kv("event", json!(name))],
                );
            }
        }

        fragment.render(&context)?;

        self.injected = Some(InjectedFragment {
            fragment,
            context,
            emitter,
        });
        self.env.record_metric(EngineMetrics::record_fragment_created);
        self.env.audit.record(
            DialogAuditEvent::new(DialogAuditStage::FragmentInjected)
                .detail("surface", json!(self.id.clone())),
        );
        Ok(())
    }

    /// Wire the close-causing fragment event into the dismiss queue so
    /// injected content can close its own dialog.
    pub fn wire_close_event(&mut self) {
        let Some(queue) = self.dismiss_queue.clone() else {
            return;
        };
        let Some(injected) = self.injected.as_ref() else {
            return;
        };
        let name = self.config.close_event.clone();
        if !injected.fragment.event_names().contains(&name.as_str()) {
            self.log(
                LogLevel::Warn,
                "close_event_not_exposed",
                vec![json_kv("event", json!(name))],
            );
            return;
        }
        injected.emitter.wire(
            name,
            Box::new(move |payload| {
                let result = if payload.is_null() { None } else { Some(payload) };
                queue.push(HandleCommand::Close {
                    result,
                    forced: false,
                });
            }),
        );
    }

    /// Copy an updated payload onto the live fragment without
    /// recreating it. No-op when nothing was injected.
    pub fn apply_content_data(&mut self, partial: &DataPayload) {
        let Some(injected) = self.injected.as_mut() else {
            return;
        };
        for (key, value) in partial.iter() {
            if !injected.fragment.set_field(key, value) {
                self.env.log(
                    LogLevel::Debug,
                    LOG_TARGET,
                    "payload_key_skipped",
                    vec![json_kv("key", json!(key.clone()))],
                );
            }
        }
        let _ = injected.fragment.render(&injected.context);
        self.env.record_metric(EngineMetrics::record_data_update);
    }

    /// Drive the core's internal delays: the stacking settle hop, the
    /// strategy's timed hook, and a grace-deferred open retry.
    pub fn pump_at(&mut self, now: Instant) {
        for task in self.tasks.drain_due(now) {
            match task {
                CoreTask::Settle => self.settle(now),
                CoreTask::ChromeDelay => self.chrome.on_delay_elapsed(),
                CoreTask::RetryOpen => {
                    self.pending_open = false;
                    self.open(now);
                }
            }
        }
    }

    /// Earliest pending internal deadline, for hosts sizing their poll
    /// timeout.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.next_deadline()
    }

    fn attach_root(&self, page: &SharedPage) {
        page.attach_node(&self.id, Mount::Body);
        page.add_class(&self.id, "scrim-surface");
        for class in self.chrome.classes() {
            page.add_class(&self.id, &class);
        }
        if let Some(custom) = self.config.custom_class.as_ref() {
            page.add_class(&self.id, custom);
        }
    }

    /// Header template resolution: the injected fragment's own template
    /// wins over the config template, which wins over the static
    /// call-site template. Exactly one source is used.
    fn resolved_header(&self) -> Option<String> {
        if let Some(injected) = self.injected.as_ref() {
            if let Some(template) = injected.fragment.header_template() {
                return Some(template);
            }
        }
        self.config
            .header
            .clone()
            .or_else(|| self.config.static_header.clone())
    }

    fn resolved_footer(&self) -> Option<String> {
        if let Some(injected) = self.injected.as_ref() {
            if let Some(template) = injected.fragment.footer_template() {
                return Some(template);
            }
        }
        self.config
            .footer
            .clone()
            .or_else(|| self.config.static_footer.clone())
    }

    fn render_chrome(&self, page: &SharedPage) {
        let header_id = format!("{}-header", self.id);
        let body_id = format!("{}-body", self.id);
        let footer_id = format!("{}-footer", self.id);
        let close_id = format!("{}-close", self.id);

        let header_content = self.resolved_header();
        let show_header =
            self.config.show_header && (header_content.is_some() || self.config.show_close_button);
        if show_header {
            page.attach_node(&header_id, Mount::Within(self.id.clone()));
            page.add_class(&header_id, "scrim-header");
            page.set_content(&header_id, header_content.as_deref().unwrap_or_default());
            if self.config.show_close_button {
                page.attach_node(&close_id, Mount::Within(header_id.clone()));
                page.add_class(&close_id, "scrim-close-button");
                page.set_content(&close_id, "\u{00d7}");
            } else {
                page.remove_node(&close_id);
            }
        } else {
            page.remove_node(&header_id);
        }

        page.attach_node(&body_id, Mount::Within(self.id.clone()));
        page.add_class(&body_id, "scrim-body");
        if let Some(BodyContent::Template(template)) = self.config.body.as_ref() {
            page.set_content(&body_id, template);
        }

        if self.config.show_footer {
            let footer_content = self.resolved_footer().unwrap_or_else(|| {
                format!(
                    "[ {} ] [ {} ]",
                    self.config.labels.confirm, self.config.labels.dismiss
                )
            });
            page.attach_node(&footer_id, Mount::Within(self.id.clone()));
            page.add_class(&footer_id, "scrim-footer");
            page.set_content(&footer_id, &footer_content);
        } else {
            page.remove_node(&footer_id);
        }
    }

    fn destroy_fragment(&mut self) {
        if let Some(mut injected) = self.injected.take() {
            injected.fragment.unmount(&injected.context);
            injected.emitter.clear();
            self.env
                .record_metric(EngineMetrics::record_fragment_destroyed);
            self.env.audit.record(
                DialogAuditEvent::new(DialogAuditStage::FragmentDestroyed)
                    .detail("surface", json!(self.id.clone())),
            );
        }
    }

    fn log(&self, level: LogLevel, message: &str, mut fields: Vec<(String, Value)>) {
        fields.push(json_kv("surface", json!(self.id.clone())));
        self.env.log(level, LOG_TARGET, message, fields);
    }
}

fn build_chrome(variant: &SurfaceVariant) -> Box<dyn SurfaceKind> {
    match variant {
        SurfaceVariant::Modal { size } => Box::new(ModalSurface::new(*size)),
        SurfaceVariant::Overlay {
            direction,
            width,
            height,
        } => Box::new(OverlaySurface::new(*direction, width.clone(), height.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModalSize, OverlayDirection};
    use crate::fragment::testing::NoteFragment;
    use crate::host::{HostPage, MemoryPage};
    use crate::surface::OVERLAY_ENTER_DELAY;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_env() -> (DialogEnv, Arc<MemoryPage>) {
        let page = Arc::new(MemoryPage::with_location("https://app.example/orders"));
        let env = DialogEnv::new(WindowAccessor::attached(page.clone()));
        (env, page)
    }

    fn escape() -> KeyEvent {
        use crossterm::event::KeyModifiers;
        KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)
    }

    fn open_core(id: &str, config: DialogConfig, env: &DialogEnv, now: Instant) -> DialogCore {
        let mut core = DialogCore::new(id, config, env.clone());
        core.open(now);
        core.pump_at(now);
        core
    }

    #[test]
    fn open_settles_into_open_state() {
        let (env, page) = test_env();
        let now = Instant::now();
        let mut core = DialogCore::new("s1", DialogConfig::modal(ModalSize::Md), env.clone());
        assert_eq!(core.phase(), DialogPhase::Closed);

        core.open(now);
        assert_eq!(core.phase(), DialogPhase::Opening);
        assert!(page.has_class("s1", OPEN_MARKER_CLASS));
        assert!(page.has_body_class(SCROLL_LOCK_CLASS));

        core.pump_at(now);
        assert_eq!(core.phase(), DialogPhase::Open);
        assert!(page.has_node(super::super::stack::BACKDROP_NODE));
        // Single surface carries no inline z-index.
        assert!(page.style("s1", "z-index").is_none());
    }

    #[test]
    fn open_without_window_is_a_noop() {
        let env = DialogEnv::headless();
        let now = Instant::now();
        let mut core = DialogCore::new("s1", DialogConfig::default(), env);
        core.open(now);
        core.pump_at(now);
        assert_eq!(core.phase(), DialogPhase::Closed);
    }

    #[test]
    fn duplicate_close_fires_listener_once() {
        let (env, page) = test_env();
        let now = Instant::now();
        let mut core = open_core("s1", DialogConfig::default(), &env, now);

        let closes = Arc::new(AtomicUsize::new(0));
        let closes_clone = Arc::clone(&closes);
        core.set_close_listener(move |_| {
            closes_clone.fetch_add(1, Ordering::SeqCst);
        });

        core.close(None, false, now);
        core.close(None, false, now);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(core.phase(), DialogPhase::Closed);
        assert!(!page.has_node("s1"));
        assert!(!page.has_node(super::super::stack::BACKDROP_NODE));
        assert!(!page.has_body_class(SCROLL_LOCK_CLASS));
    }

    #[test]
    fn escape_only_reaches_the_topmost_surface() {
        let (env, _page) = test_env();
        let now = Instant::now();
        let mut lower = open_core("s1", DialogConfig::default(), &env, now);
        let mut upper = open_core("s2", DialogConfig::default(), &env, now);

        lower.handle_key(&escape(), now);
        assert_eq!(lower.phase(), DialogPhase::Open);

        upper.handle_key(&escape(), now);
        assert_eq!(upper.phase(), DialogPhase::Closed);

        // With the stack popped, the remaining surface is now topmost.
        lower.handle_key(&escape(), now);
        assert_eq!(lower.phase(), DialogPhase::Closed);
    }

    #[test]
    fn static_backdrop_ignores_outside_clicks() {
        let (env, _page) = test_env();
        let now = Instant::now();
        let mut core = open_core(
            "s1",
            DialogConfig::default().backdrop(BackdropMode::Static),
            &env,
            now,
        );
        core.handle_backdrop_click(now);
        assert_eq!(core.phase(), DialogPhase::Open);
    }

    #[test]
    fn dismissible_backdrop_closes_once() {
        let (env, _page) = test_env();
        let now = Instant::now();
        let mut core = open_core(
            "s1",
            DialogConfig::default().backdrop(BackdropMode::Dismissible),
            &env,
            now,
        );
        let closes = Arc::new(AtomicUsize::new(0));
        let closes_clone = Arc::clone(&closes);
        core.set_close_listener(move |result| {
            assert!(result.is_none());
            closes_clone.fetch_add(1, Ordering::SeqCst);
        });

        core.handle_backdrop_click(now);
        core.handle_backdrop_click(now);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(core.phase(), DialogPhase::Closed);
    }

    #[test]
    fn fragment_header_beats_config_header() {
        let (env, page) = test_env();
        let now = Instant::now();
        let config = DialogConfig::modal(ModalSize::Md)
            .header("Config Header")
            .static_header("Static Header")
            .body_fragment(Arc::new(|| {
                Box::new(NoteFragment::with_header("Fragment Header"))
            }));
        let _core = open_core("s1", config, &env, now);

        assert_eq!(
            page.content("s1-header").as_deref(),
            Some("Fragment Header")
        );
    }

    #[test]
    fn config_header_beats_static_header() {
        let (env, page) = test_env();
        let now = Instant::now();
        let config = DialogConfig::modal(ModalSize::Md)
            .header("Config Header")
            .static_header("Static Header");
        let _core = open_core("s1", config, &env, now);

        assert_eq!(page.content("s1-header").as_deref(), Some("Config Header"));
    }

    #[test]
    fn payload_copies_onto_declared_fields_only() {
        let (env, page) = test_env();
        let now = Instant::now();
        let config = DialogConfig::modal(ModalSize::Md)
            .data_entry("title", json!("Draft"))
            .data_entry("count", json!(3))
            .data_entry("unknown", json!("skipped"))
            .body_fragment(Arc::new(|| Box::new(NoteFragment::new())));
        let core = open_core("s1", config, &env, now);

        assert!(core.has_injected_fragment());
        assert_eq!(
            page.content("s1-body").as_deref(),
            Some("note title=Draft count=3")
        );
    }

    #[test]
    fn apply_content_data_updates_live_fragment() {
        let (env, page) = test_env();
        let now = Instant::now();
        let config = DialogConfig::modal(ModalSize::Md)
            .data_entry("count", json!(1))
            .body_fragment(Arc::new(|| Box::new(NoteFragment::new())));
        let mut core = open_core("s1", config, &env, now);

        let mut partial = DataPayload::new();
        partial.insert("count".to_string(), json!(5));
        core.apply_content_data(&partial);

        assert_eq!(
            page.content("s1-body").as_deref(),
            Some("note title= count=5")
        );
        assert!(core.has_injected_fragment());
    }

    #[test]
    fn scroll_unlock_uses_count_captured_at_open() {
        let (env, page) = test_env();
        let now = Instant::now();
        page.scroll_to(80.0);
        let mut first = open_core("s1", DialogConfig::default(), &env, now);
        let _second = open_core("s2", DialogConfig::default(), &env, now);

        // Closing the earlier surface of the pair unlocks scroll even
        // though another surface is still open: its captured count was 1.
        first.close(None, false, now);
        assert!(!page.has_body_class(SCROLL_LOCK_CLASS));
    }

    #[test]
    fn drifted_scroll_is_restored_on_last_close() {
        let (env, page) = test_env();
        let now = Instant::now();
        page.scroll_to(200.0);
        let mut core = open_core("s1", DialogConfig::default(), &env, now);
        page.drift_scroll(0.0);

        core.close(None, false, now);
        assert_eq!(page.scroll_offset(), 200.0);
    }

    #[test]
    fn navigation_to_other_route_forces_close_and_arms_grace() {
        let (env, _page) = test_env();
        let now = Instant::now();
        let mut core = open_core("s1", DialogConfig::default(), &env, now);

        // Same origin+path: nothing happens.
        core.on_external_navigation("https://app.example/orders?page=2", now);
        assert_eq!(core.phase(), DialogPhase::Open);

        core.on_external_navigation("https://app.example/invoices", now);
        assert_eq!(core.phase(), DialogPhase::Closed);

        // A reopen inside the grace window is deferred until it elapses.
        let mut next = DialogCore::new("s2", DialogConfig::default(), env.clone());
        next.open(now);
        assert_eq!(next.phase(), DialogPhase::Closed);

        let later = now + NAV_REOPEN_GRACE + Duration::from_millis(1);
        next.pump_at(later);
        next.pump_at(later);
        assert_eq!(next.phase(), DialogPhase::Open);
    }

    #[test]
    fn overlay_transition_gates_on_enter_delay() {
        let (env, page) = test_env();
        let now = Instant::now();
        let config = DialogConfig::overlay(OverlayDirection::Right, "475px");
        let mut core = open_core("s1", config, &env, now);

        assert!(page.has_style_rule("s1"));
        assert!(!core.transition_done());
        core.pump_at(now + OVERLAY_ENTER_DELAY);
        assert!(core.transition_done());

        core.close(None, false, now);
        assert!(!page.has_style_rule("s1"));
    }

    #[test]
    fn stacked_surfaces_get_rising_z_indexes() {
        let (env, page) = test_env();
        let now = Instant::now();
        let _a = open_core("a", DialogConfig::default(), &env, now);
        let _b = open_core("b", DialogConfig::default(), &env, now);
        let _c = open_core("c", DialogConfig::default(), &env, now);

        assert!(page.style("a", "z-index").is_none());
        assert_eq!(page.style("b", "z-index").as_deref(), Some("1063"));
        assert_eq!(page.style("c", "z-index").as_deref(), Some("1064"));
        assert_eq!(
            page.style(super::super::stack::BACKDROP_NODE, "z-index")
                .as_deref(),
            Some("1063")
        );
    }
}
