//! The dispatcher and its validation pipeline.
//!
//! `on_command` runs these stages in order and stops at the first failure:
//! 1. Resolve the command by primary name (falling back if unknown)
//! 2. Check the sender kind
//! 3. Check the permission
//! 4. Check the cooldown
//! 5. Check the argument count
//! 6. Invoke the handler
//!
//! The host is always told the command was handled. Rejections go to a
//! [`RejectionNotifier`] and handler failures to an [`ErrorReporter`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::provider::{Declarations, HandlerProvider, RegistrationReport};
use super::{
    AllowedSender, Clock, CommandDescriptor, CommandHandler, CommandRegistry, CommandSender,
    Completer, CompletionDescriptor, CompletionRegistry, CooldownCheck, CooldownTracker,
    HandlerBinding, HandlerFailure, Invocation, MonotonicClock, Rejection, RegistrationError,
};
use crate::bridge::{HostBridge, HostCommandEntry};
use crate::config::Settings;

/// Catch-all run when no command matches. Returns whether it handled the
/// invocation.
pub type Fallback = Box<dyn Fn(&Invocation) -> bool + Send + Sync>;

/// Receives pipeline rejections so the sender can be told about them.
pub trait RejectionNotifier: Send + Sync {
    /// `descriptor` is `None` for unknown commands.
    fn notify(
        &self,
        invocation: &Invocation,
        descriptor: Option<&CommandDescriptor>,
        rejection: &Rejection,
    );
}

/// Receives handler and completer failures.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, invocation: &Invocation, failure: &HandlerFailure);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl RejectionNotifier for LogNotifier {
    fn notify(
        &self,
        invocation: &Invocation,
        _descriptor: Option<&CommandDescriptor>,
        rejection: &Rejection,
    ) {
        debug!(
            sender = %invocation.sender().id(),
            command = invocation.command(),
            reason = rejection.kind(),
            "{}",
            rejection
        );
    }
}

/// Reporter that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, invocation: &Invocation, failure: &HandlerFailure) {
        if failure.is_completed() {
            warn!(command = invocation.command(), "{}", failure);
        } else {
            error!(
                sender = %invocation.sender().id(),
                command = invocation.command(),
                "{}",
                failure
            );
        }
    }
}

/// What a single dispatch did.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The handler ran and returned `Ok`.
    Invoked,
    /// The handler ran but failed or panicked.
    Failed(HandlerFailure),
    /// A validation stage stopped the pipeline.
    Rejected(Rejection),
    /// No command matched; `handled` is the fallback's verdict.
    Fallback { handled: bool },
}

impl DispatchOutcome {
    pub fn is_invoked(&self) -> bool {
        matches!(self, DispatchOutcome::Invoked)
    }

    /// The rejection, if the pipeline stopped early.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            DispatchOutcome::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    settings: Settings,
    clock: Option<Arc<dyn Clock>>,
    notifier: Arc<dyn RejectionNotifier>,
    reporter: Arc<dyn ErrorReporter>,
    fallback: Option<Fallback>,
}

impl DispatcherBuilder {
    fn new() -> Self {
        Self {
            settings: Settings::default(),
            clock: None,
            notifier: Arc::new(LogNotifier),
            reporter: Arc::new(LogReporter),
            fallback: None,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Use a custom time source for cooldowns.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn RejectionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&Invocation) -> bool + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn build(self) -> Dispatcher {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()) as Arc<dyn Clock>);
        let cooldown = &self.settings.cooldown;
        let cooldowns = CooldownTracker::with_limits(
            clock,
            Duration::from_secs(cooldown.sweep_interval_secs),
            cooldown.max_tracked_senders,
        );
        let slow_handler_threshold = match self.settings.dispatch.slow_handler_warn_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Dispatcher {
            commands: CommandRegistry::new(),
            completions: CompletionRegistry::new(),
            cooldowns,
            fallback: self.fallback,
            notifier: self.notifier,
            reporter: self.reporter,
            slow_handler_threshold,
            notify_unknown_command: self.settings.dispatch.notify_unknown_command,
        }
    }
}

/// Resolves invocations to handlers and runs the validation pipeline.
///
/// Registration needs `&mut self` and happens once at startup. Dispatch only
/// needs `&self`, so a built dispatcher can be shared behind an `Arc`.
pub struct Dispatcher {
    commands: CommandRegistry,
    completions: CompletionRegistry,
    cooldowns: CooldownTracker,
    fallback: Option<Fallback>,
    notifier: Arc<dyn RejectionNotifier>,
    reporter: Arc<dyn ErrorReporter>,
    slow_handler_threshold: Option<Duration>,
    notify_unknown_command: bool,
}

impl Dispatcher {
    /// Create a dispatcher with default settings and logging collaborators.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Replace the catch-all run for unknown commands.
    pub fn set_fallback<F>(&mut self, fallback: F)
    where
        F: Fn(&Invocation) -> bool + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(fallback));
    }

    /// Register every command and completer a provider declares.
    ///
    /// Invalid entries are logged and skipped; the rest still register. Each
    /// registered command is also handed to `bridge` so the host routes it
    /// back here. A command the host refuses stays registered with the
    /// engine and is listed as a failure.
    pub fn register_handlers<P: HandlerProvider>(
        &mut self,
        provider: Arc<P>,
        bridge: &mut dyn HostBridge,
    ) -> RegistrationReport {
        let owner = provider.provider_name();
        let mut report = RegistrationReport::new(owner.clone());

        let mut decl = Declarations::new();
        provider.declare(&mut decl);
        debug!(owner = %owner, entries = decl.len(), "Registering handlers");

        for (descriptor, handler) in decl.bind_commands(&provider) {
            match self.register_command(descriptor, handler, &owner, bridge) {
                Ok(name) => report.commands.push(name),
                Err(err) => {
                    error!(owner = %owner, "Failed to register command: {}", err);
                    if let RegistrationError::Bridge { name, .. } = &err {
                        report.commands.push(name.clone());
                    }
                    report.failures.push(err);
                }
            }
        }

        for (descriptor, completer) in decl.bind_completers(&provider) {
            match self.register_completer(descriptor, completer, &owner) {
                Ok(name) => report.completers.push(name),
                Err(err) => {
                    error!(owner = %owner, "Failed to register completer: {}", err);
                    report.failures.push(err);
                }
            }
        }

        info!(
            owner = %owner,
            commands = report.commands.len(),
            completers = report.completers.len(),
            failures = report.failures.len(),
            "Registered handlers"
        );
        report
    }

    /// Register one command with the engine and the host.
    ///
    /// # Errors
    ///
    /// Returns the descriptor's validation error, in which case nothing was
    /// registered, or `RegistrationError::Bridge` when only the host refused
    /// the entry.
    pub fn register_command(
        &mut self,
        descriptor: CommandDescriptor,
        handler: CommandHandler,
        owner: &str,
        bridge: &mut dyn HostBridge,
    ) -> Result<String, RegistrationError> {
        let descriptor = descriptor.normalized();
        let entry = HostCommandEntry::from(&descriptor);
        let name = descriptor.name.clone();

        self.commands.register(descriptor, handler, owner)?;

        bridge
            .register_command(entry)
            .map_err(|e| RegistrationError::Bridge {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        Ok(name)
    }

    /// Register one completer.
    pub fn register_completer(
        &mut self,
        descriptor: CompletionDescriptor,
        completer: Completer,
        owner: &str,
    ) -> Result<String, RegistrationError> {
        let descriptor = descriptor.normalized();
        let name = descriptor.name.clone();
        self.completions.register(descriptor, completer, owner)?;
        Ok(name)
    }

    /// Host callback for a command line. Always reports the command as
    /// handled.
    pub fn on_command(
        &self,
        sender: Arc<dyn CommandSender>,
        command: &str,
        label: &str,
        args: Vec<String>,
    ) -> bool {
        let invocation = Invocation::new(sender, command.to_lowercase(), label, args);
        let outcome = self.dispatch(&invocation);
        debug!(command = invocation.command(), outcome = ?outcome, "Dispatched");
        true
    }

    /// Run the pipeline for an invocation and report what happened.
    pub fn dispatch(&self, invocation: &Invocation) -> DispatchOutcome {
        let Some(binding) = self.commands.lookup(invocation.command()) else {
            return self.run_fallback(invocation);
        };

        if let Err(rejection) = self.validate(&binding, invocation) {
            self.notifier
                .notify(invocation, Some(binding.descriptor()), &rejection);
            return DispatchOutcome::Rejected(rejection);
        }

        self.invoke(&binding, invocation)
    }

    /// Host callback for tab completion.
    ///
    /// The label as typed is looked up first, then the resolved command
    /// name. Returns no suggestions when nothing matches, when the sender
    /// lacks the completer's permission, or when the completer fails.
    pub fn on_tab_complete(
        &self,
        sender: Arc<dyn CommandSender>,
        command: &str,
        label: &str,
        args: Vec<String>,
    ) -> Vec<String> {
        let Some(binding) = self
            .completions
            .lookup(label)
            .or_else(|| self.completions.lookup(command))
        else {
            return Vec::new();
        };

        let descriptor = binding.descriptor();
        if descriptor.requires_permission() && !sender.has_permission(&descriptor.permission) {
            return Vec::new();
        }

        let invocation = Invocation::new(sender, command.to_lowercase(), label, args);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| binding.complete(&invocation)));
        match outcome {
            Ok(Ok(suggestions)) => suggestions,
            Ok(Err(err)) => {
                self.reporter
                    .report(&invocation, &HandlerFailure::Failed(err));
                Vec::new()
            }
            Err(payload) => {
                self.reporter
                    .report(&invocation, &HandlerFailure::from_panic(payload));
                Vec::new()
            }
        }
    }

    /// Stages 2 to 5.
    fn validate(&self, binding: &HandlerBinding, invocation: &Invocation) -> Result<(), Rejection> {
        let descriptor = binding.descriptor();

        let sender_ok = match descriptor.allowed_sender {
            AllowedSender::All => true,
            AllowedSender::Console => invocation.is_console(),
            AllowedSender::Player => invocation.is_player(),
        };
        if !sender_ok {
            return Err(Rejection::WrongSenderKind {
                required: descriptor.allowed_sender,
            });
        }

        if descriptor.requires_permission() && !invocation.has_permission(&descriptor.permission) {
            return Err(Rejection::MissingPermission {
                permission: descriptor.permission.clone(),
            });
        }

        let sender_id = invocation.sender().id();
        if let CooldownCheck::Cooling { remaining_seconds } =
            self.cooldowns
                .check(&sender_id, &descriptor.name, descriptor.cooldown_seconds)
        {
            return Err(Rejection::OnCooldown { remaining_seconds });
        }

        let given = invocation.arguments().len();
        if given < descriptor.min_args {
            return Err(Rejection::TooFewArgs {
                min: descriptor.min_args,
                given,
            });
        }
        if let Some(max) = descriptor.max_args {
            if given > max {
                return Err(Rejection::TooManyArgs { max, given });
            }
        }

        Ok(())
    }

    /// Stage 6. Handler errors and panics never escape.
    fn invoke(&self, binding: &HandlerBinding, invocation: &Invocation) -> DispatchOutcome {
        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| binding.invoke(invocation)));
        let elapsed = started.elapsed();

        if let Some(threshold) = self.slow_handler_threshold {
            if elapsed > threshold {
                self.reporter
                    .report(invocation, &HandlerFailure::Slow { elapsed, threshold });
            }
        }

        let failure = match result {
            Ok(Ok(())) => return DispatchOutcome::Invoked,
            Ok(Err(err)) => HandlerFailure::Failed(err),
            Err(payload) => HandlerFailure::from_panic(payload),
        };
        self.reporter.report(invocation, &failure);
        DispatchOutcome::Failed(failure)
    }

    fn run_fallback(&self, invocation: &Invocation) -> DispatchOutcome {
        let handled = match &self.fallback {
            Some(fallback) => {
                match panic::catch_unwind(AssertUnwindSafe(|| fallback(invocation))) {
                    Ok(handled) => handled,
                    Err(payload) => {
                        self.reporter
                            .report(invocation, &HandlerFailure::from_panic(payload));
                        true
                    }
                }
            }
            None => false,
        };

        if !handled && self.notify_unknown_command {
            let rejection = Rejection::UnknownCommand {
                name: invocation.command().to_string(),
            };
            self.notifier.notify(invocation, None, &rejection);
        }

        DispatchOutcome::Fallback { handled }
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn completions(&self) -> &CompletionRegistry {
        &self.completions
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::CommandTable;
    use crate::commands::{ManualClock, SenderKind, StaticSender};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        rejections: Mutex<Vec<Rejection>>,
    }

    impl RejectionNotifier for RecordingNotifier {
        fn notify(&self, _inv: &Invocation, _desc: Option<&CommandDescriptor>, rejection: &Rejection) {
            self.rejections.lock().unwrap().push(rejection.clone());
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        failures: Mutex<Vec<String>>,
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, _inv: &Invocation, failure: &HandlerFailure) {
            self.failures.lock().unwrap().push(failure.to_string());
        }
    }

    #[derive(Default)]
    struct Server {
        spawned: AtomicUsize,
        kicked: AtomicUsize,
        stopped: AtomicUsize,
        healed: AtomicUsize,
        teleported: AtomicUsize,
    }

    impl Server {
        fn spawn(&self, _inv: &Invocation) -> anyhow::Result<()> {
            self.spawned.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn kick(&self, _inv: &Invocation) -> anyhow::Result<()> {
            self.kicked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self, _inv: &Invocation) -> anyhow::Result<()> {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn heal(&self, _inv: &Invocation) -> anyhow::Result<()> {
            self.healed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn teleport(&self, _inv: &Invocation) -> anyhow::Result<()> {
            self.teleported.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn broken(&self, _inv: &Invocation) -> anyhow::Result<()> {
            anyhow::bail!("world not loaded")
        }

        fn explode(&self, _inv: &Invocation) -> anyhow::Result<()> {
            panic!("creeper");
        }

        fn gamemodes(&self, inv: &Invocation) -> anyhow::Result<Vec<String>> {
            let typed = inv.argument(0).unwrap_or_default();
            Ok(["adventure", "creative", "spectator", "survival"]
                .iter()
                .filter(|m| m.starts_with(typed))
                .map(|m| m.to_string())
                .collect())
        }

        fn failing_completer(&self, _inv: &Invocation) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("lookup failed")
        }
    }

    impl HandlerProvider for Server {
        fn provider_name(&self) -> String {
            "Server".to_string()
        }

        fn declare(&self, decl: &mut Declarations<Self>) {
            decl.command(
                CommandDescriptor::new("spawn").cooldown(10).aliases(["s"]),
                Self::spawn,
            )
            .command(
                CommandDescriptor::new("kick").permission("admin.x"),
                Self::kick,
            )
            .command(
                CommandDescriptor::new("stop").allowed_sender(AllowedSender::Console),
                Self::stop,
            )
            .command(
                CommandDescriptor::new("heal").allowed_sender(AllowedSender::Player),
                Self::heal,
            )
            .command(
                CommandDescriptor::new("tp").min_args(2).max_args(3),
                Self::teleport,
            )
            .command(CommandDescriptor::new("broken"), Self::broken)
            .command(CommandDescriptor::new("explode"), Self::explode)
            .completer(
                CompletionDescriptor::new("gamemode").aliases(["gm"]),
                Self::gamemodes,
            )
            .completer(
                CompletionDescriptor::new("ban").permission("admin.ban"),
                Self::gamemodes,
            )
            .completer(CompletionDescriptor::new("flaky"), Self::failing_completer);
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        server: Arc<Server>,
        table: CommandTable,
        clock: ManualClock,
        notifier: Arc<RecordingNotifier>,
        reporter: Arc<RecordingReporter>,
        fallback_hits: Arc<AtomicUsize>,
    }

    impl Harness {
        fn rejections(&self) -> Vec<Rejection> {
            self.notifier.rejections.lock().unwrap().clone()
        }

        fn failures(&self) -> Vec<String> {
            self.reporter.failures.lock().unwrap().clone()
        }
    }

    fn harness() -> Harness {
        let clock = ManualClock::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let reporter = Arc::new(RecordingReporter::default());
        let fallback_hits = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&fallback_hits);

        let mut dispatcher = Dispatcher::builder()
            .clock(Arc::new(clock.clone()))
            .notifier(notifier.clone())
            .reporter(reporter.clone())
            .fallback(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                true
            })
            .build();

        let server = Arc::new(Server::default());
        let mut table = CommandTable::new();
        let report = dispatcher.register_handlers(Arc::clone(&server), &mut table);
        assert!(report.is_complete(), "{:?}", report.failures);

        Harness {
            dispatcher,
            server,
            table,
            clock,
            notifier,
            reporter,
            fallback_hits,
        }
    }

    fn player() -> Arc<dyn CommandSender> {
        Arc::new(StaticSender::player("Steve"))
    }

    fn admin() -> Arc<dyn CommandSender> {
        Arc::new(StaticSender::player("Alex").with_permissions(["admin.x", "admin.ban"]))
    }

    fn console() -> Arc<dyn CommandSender> {
        Arc::new(StaticSender::console())
    }

    fn args(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("arg{}", i)).collect()
    }

    #[test]
    fn test_register_handlers_report() {
        let h = harness();

        assert_eq!(h.dispatcher.commands().len(), 7);
        assert_eq!(h.dispatcher.completions().len(), 3);
        assert!(h.table.resolve("s").is_some());
        assert!(h.table.resolve("tp").is_some());
    }

    #[test]
    fn test_on_command_always_handled() {
        let h = harness();

        assert!(h.dispatcher.on_command(player(), "spawn", "spawn", vec![]));
        assert!(h.dispatcher.on_command(player(), "stop", "stop", vec![]));
        assert!(h.dispatcher.on_command(player(), "nothing", "nothing", vec![]));
        assert!(h.dispatcher.on_command(player(), "broken", "broken", vec![]));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let h = harness();
        h.dispatcher.on_command(player(), "SPAWN", "SPAWN", vec![]);
        assert_eq!(h.server.spawned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_console_only_rejects_player() {
        let h = harness();

        h.dispatcher.on_command(player(), "stop", "stop", vec![]);
        assert_eq!(h.server.stopped.load(Ordering::SeqCst), 0);
        assert_eq!(
            h.rejections(),
            vec![Rejection::WrongSenderKind {
                required: AllowedSender::Console
            }]
        );

        h.dispatcher.on_command(console(), "stop", "stop", vec![]);
        assert_eq!(h.server.stopped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_player_only_rejects_console() {
        let h = harness();

        h.dispatcher.on_command(console(), "heal", "heal", vec![]);
        assert_eq!(h.server.healed.load(Ordering::SeqCst), 0);

        h.dispatcher.on_command(player(), "heal", "heal", vec![]);
        assert_eq!(h.server.healed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_other_senders_fail_both_restrictions() {
        struct CommandBlock;
        impl CommandSender for CommandBlock {
            fn id(&self) -> crate::commands::SenderId {
                crate::commands::SenderId::new("block:0,64,0")
            }
            fn name(&self) -> &str {
                "@"
            }
            fn kind(&self) -> SenderKind {
                SenderKind::Other
            }
            fn has_permission(&self, _permission: &str) -> bool {
                true
            }
        }

        let h = harness();
        let block: Arc<dyn CommandSender> = Arc::new(CommandBlock);
        h.dispatcher.on_command(block.clone(), "heal", "heal", vec![]);
        h.dispatcher.on_command(block.clone(), "stop", "stop", vec![]);
        h.dispatcher.on_command(block, "kick", "kick", vec![]);

        assert_eq!(h.server.healed.load(Ordering::SeqCst), 0);
        assert_eq!(h.server.stopped.load(Ordering::SeqCst), 0);
        assert_eq!(h.server.kicked.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_permission_never_invokes() {
        let h = harness();

        h.dispatcher.on_command(player(), "kick", "kick", vec![]);
        assert_eq!(h.server.kicked.load(Ordering::SeqCst), 0);
        assert_eq!(
            h.rejections(),
            vec![Rejection::MissingPermission {
                permission: "admin.x".to_string()
            }]
        );

        h.dispatcher.on_command(admin(), "kick", "kick", vec![]);
        assert_eq!(h.server.kicked.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cooldown_pipeline() {
        let h = harness();

        h.clock.set_millis(0);
        assert!(h.dispatcher.dispatch(&invocation(player(), "spawn", 0)).is_invoked());

        h.clock.set_millis(5_000);
        let outcome = h.dispatcher.dispatch(&invocation(player(), "spawn", 0));
        assert_eq!(
            outcome.rejection(),
            Some(&Rejection::OnCooldown {
                remaining_seconds: 5
            })
        );

        h.clock.set_millis(11_000);
        assert!(h.dispatcher.dispatch(&invocation(player(), "spawn", 0)).is_invoked());
        assert_eq!(h.server.spawned.load(Ordering::SeqCst), 2);

        h.clock.set_millis(12_000);
        assert!(h.dispatcher.dispatch(&invocation(player(), "spawn", 0)).rejection().is_some());
    }

    #[test]
    fn test_cooldown_is_per_sender() {
        let h = harness();
        h.clock.set_millis(0);

        assert!(h.dispatcher.dispatch(&invocation(player(), "spawn", 0)).is_invoked());
        assert!(h.dispatcher.dispatch(&invocation(admin(), "spawn", 0)).is_invoked());
    }

    #[test]
    fn test_arg_bounds() {
        let h = harness();

        for (count, accepted) in [(0, false), (1, false), (2, true), (3, true), (4, false)] {
            let outcome = h.dispatcher.dispatch(&invocation(player(), "tp", count));
            assert_eq!(outcome.is_invoked(), accepted, "{} args", count);
        }
        assert_eq!(h.server.teleported.load(Ordering::SeqCst), 2);
        assert_eq!(
            h.rejections(),
            vec![
                Rejection::TooFewArgs { min: 2, given: 0 },
                Rejection::TooFewArgs { min: 2, given: 1 },
                Rejection::TooManyArgs { max: 3, given: 4 },
            ]
        );
    }

    #[test]
    fn test_unknown_command_runs_fallback_once() {
        let h = harness();

        let outcome = h.dispatcher.dispatch(&invocation(player(), "warp", 1));
        assert!(matches!(outcome, DispatchOutcome::Fallback { handled: true }));
        assert_eq!(h.fallback_hits.load(Ordering::SeqCst), 1);
        assert_eq!(h.server.spawned.load(Ordering::SeqCst), 0);
        assert!(h.rejections().is_empty());
    }

    #[test]
    fn test_unhandled_fallback_notifies_unknown_command() {
        let mut h = harness();
        h.dispatcher.set_fallback(|_| false);

        h.dispatcher.on_command(player(), "warp", "warp", vec![]);
        assert_eq!(
            h.rejections(),
            vec![Rejection::UnknownCommand {
                name: "warp".to_string()
            }]
        );
    }

    #[test]
    fn test_no_fallback_configured() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::builder().notifier(notifier.clone()).build();

        let outcome = dispatcher.dispatch(&invocation(player(), "warp", 0));
        assert!(matches!(outcome, DispatchOutcome::Fallback { handled: false }));
        assert_eq!(notifier.rejections.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_command_notification_can_be_disabled() {
        let mut settings = Settings::default();
        settings.dispatch.notify_unknown_command = false;
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::builder()
            .settings(settings)
            .notifier(notifier.clone())
            .build();

        dispatcher.on_command(player(), "warp", "warp", vec![]);
        assert!(notifier.rejections.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handler_error_reported() {
        let h = harness();

        let outcome = h.dispatcher.dispatch(&invocation(player(), "broken", 0));
        assert!(matches!(outcome, DispatchOutcome::Failed(HandlerFailure::Failed(_))));
        let failures = h.failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("world not loaded"));
    }

    #[test]
    fn test_handler_panic_contained() {
        let h = harness();

        assert!(h.dispatcher.on_command(player(), "explode", "explode", vec![]));
        let failures = h.failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("creeper"));
    }

    #[test]
    fn test_slow_handler_reported() {
        let mut settings = Settings::default();
        settings.dispatch.slow_handler_warn_ms = 1;
        let reporter = Arc::new(RecordingReporter::default());
        let mut dispatcher = Dispatcher::builder()
            .settings(settings)
            .reporter(reporter.clone())
            .build();

        dispatcher
            .register_command(
                CommandDescriptor::new("lag"),
                Arc::new(|_: &Invocation| -> anyhow::Result<()> {
                    std::thread::sleep(Duration::from_millis(20));
                    Ok(())
                }),
                "test",
                &mut CommandTable::new(),
            )
            .unwrap();

        let outcome = dispatcher.dispatch(&invocation(player(), "lag", 0));
        assert!(outcome.is_invoked());
        let failures = reporter.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("threshold"));
    }

    #[test]
    fn test_reregistration_latest_wins() {
        let mut dispatcher = Dispatcher::new();
        let mut table = CommandTable::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        for counter in [&first, &second] {
            let counter = Arc::clone(counter);
            dispatcher
                .register_command(
                    CommandDescriptor::new("spawn"),
                    Arc::new(move |_: &Invocation| -> anyhow::Result<()> {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                    "test",
                    &mut table,
                )
                .unwrap();
        }

        dispatcher.on_command(player(), "spawn", "spawn", vec![]);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_partial_registration() {
        struct Mixed;
        impl Mixed {
            fn ok(&self, _inv: &Invocation) -> anyhow::Result<()> {
                Ok(())
            }
            fn none(&self, _inv: &Invocation) -> anyhow::Result<Vec<String>> {
                Ok(Vec::new())
            }
        }
        impl HandlerProvider for Mixed {
            fn declare(&self, decl: &mut Declarations<Self>) {
                decl.command(CommandDescriptor::new("good"), Self::ok)
                    .command(CommandDescriptor::new("bad name"), Self::ok)
                    .command(CommandDescriptor::new("worse").min_args(2).max_args(1), Self::ok)
                    .command(CommandDescriptor::new("fine"), Self::ok)
                    .completer(CompletionDescriptor::new(""), Self::none)
                    .completer(CompletionDescriptor::new("fine"), Self::none);
            }
        }

        let mut dispatcher = Dispatcher::new();
        let mut table = CommandTable::new();
        let report = dispatcher.register_handlers(Arc::new(Mixed), &mut table);

        assert_eq!(report.commands, vec!["good", "fine"]);
        assert_eq!(report.completers, vec!["fine"]);
        assert_eq!(report.failures.len(), 3);
        assert!(dispatcher.commands().lookup("good").is_some());
        assert!(dispatcher.commands().lookup("fine").is_some());
        assert!(table.resolve("good").is_some());
        assert!(table.resolve("worse").is_none());
    }

    #[test]
    fn test_host_refusal_keeps_engine_registration() {
        struct One;
        impl One {
            fn ok(&self, _inv: &Invocation) -> anyhow::Result<()> {
                Ok(())
            }
        }
        impl HandlerProvider for One {
            fn declare(&self, decl: &mut Declarations<Self>) {
                decl.command(CommandDescriptor::new("stop"), Self::ok)
                    .command(CommandDescriptor::new("spawn"), Self::ok);
            }
        }

        let mut dispatcher = Dispatcher::new();
        let mut table = CommandTable::with_reserved(["stop"]);
        let report = dispatcher.register_handlers(Arc::new(One), &mut table);

        assert_eq!(report.commands, vec!["stop", "spawn"]);
        assert!(matches!(
            report.failures.as_slice(),
            [RegistrationError::Bridge { name, .. }] if name == "stop"
        ));
        assert!(dispatcher.commands().lookup("stop").is_some());
        assert!(table.resolve("stop").is_none());
    }

    #[test]
    fn test_tab_complete_by_alias() {
        let h = harness();

        let result =
            h.dispatcher
                .on_tab_complete(player(), "gm", "gm", vec!["s".to_string()]);
        assert_eq!(result, vec!["spectator", "survival"]);
    }

    #[test]
    fn test_tab_complete_unmatched_is_empty() {
        let h = harness();
        assert!(h
            .dispatcher
            .on_tab_complete(player(), "warp", "warp", vec![])
            .is_empty());
    }

    #[test]
    fn test_tab_complete_permission() {
        let h = harness();

        assert!(h.dispatcher.on_tab_complete(player(), "ban", "ban", vec![]).is_empty());
        assert_eq!(
            h.dispatcher.on_tab_complete(admin(), "ban", "ban", vec![]).len(),
            4
        );
    }

    #[test]
    fn test_tab_complete_failure_is_empty_and_reported() {
        let h = harness();

        assert!(h
            .dispatcher
            .on_tab_complete(player(), "flaky", "flaky", vec![])
            .is_empty());
        assert_eq!(h.failures().len(), 1);
    }

    #[test]
    fn test_rejection_order_sender_before_permission() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut dispatcher = Dispatcher::builder().notifier(notifier.clone()).build();

        dispatcher
            .register_command(
                CommandDescriptor::new("op")
                    .permission("admin.op")
                    .allowed_sender(AllowedSender::Console),
                Arc::new(|_: &Invocation| -> anyhow::Result<()> { Ok(()) }),
                "test",
                &mut CommandTable::new(),
            )
            .unwrap();

        dispatcher.on_command(player(), "op", "op", vec![]);
        assert_eq!(
            notifier.rejections.lock().unwrap().as_slice(),
            &[Rejection::WrongSenderKind {
                required: AllowedSender::Console
            }]
        );
    }

    #[test]
    fn test_tab_complete_prefers_typed_label() {
        let mut dispatcher = Dispatcher::new();
        for name in ["teleport", "tp"] {
            let suggestion = format!("from-{}", name);
            dispatcher
                .register_completer(
                    CompletionDescriptor::new(name),
                    Arc::new(move |_: &Invocation| -> anyhow::Result<Vec<String>> {
                        Ok(vec![suggestion.clone()])
                    }),
                    "test",
                )
                .unwrap();
        }

        assert_eq!(
            dispatcher.on_tab_complete(player(), "teleport", "tp", vec![]),
            vec!["from-tp"]
        );
        assert_eq!(
            dispatcher.on_tab_complete(player(), "teleport", "tele", vec![]),
            vec!["from-teleport"]
        );
    }

    #[test]
    fn test_deserialized_descriptor_dispatches_case_insensitively() {
        let desc: CommandDescriptor = toml::from_str(
            r#"
name = "Spawn"
permission = ""
aliases = ["S"]
usage = ""
description = ""
min_args = 0
cooldown_seconds = -1
allowed_sender = "all"
"#,
        )
        .unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let mut dispatcher = Dispatcher::new();
        let mut table = CommandTable::new();

        let name = dispatcher
            .register_command(
                desc,
                Arc::new(move |_: &Invocation| -> anyhow::Result<()> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
                "test",
                &mut table,
            )
            .unwrap();

        assert_eq!(name, "spawn");
        dispatcher.on_command(player(), "Spawn", "Spawn", vec![]);
        dispatcher.on_command(player(), "spawn", "s", vec![]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(table.resolve("S").unwrap().name, "spawn");
    }

    #[test]
    fn test_cooldown_stage_order() {
        let clock = ManualClock::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let mut dispatcher = Dispatcher::builder()
            .clock(Arc::new(clock.clone()))
            .notifier(notifier.clone())
            .build();
        dispatcher
            .register_command(
                CommandDescriptor::new("home")
                    .permission("essentials.home")
                    .allowed_sender(AllowedSender::Player)
                    .cooldown(30)
                    .min_args(1),
                Arc::new(|_: &Invocation| -> anyhow::Result<()> { Ok(()) }),
                "test",
                &mut CommandTable::new(),
            )
            .unwrap();
        let notch: Arc<dyn CommandSender> =
            Arc::new(StaticSender::player("Notch").with_permissions(["essentials.home"]));
        let cooldowns = dispatcher.cooldowns();
        clock.set_millis(0);

        // Earlier stages leave the cooldown alone.
        dispatcher.dispatch(&invocation(console(), "home", 1));
        dispatcher.dispatch(&invocation(player(), "home", 1));
        assert_eq!(cooldowns.remaining(&console().id(), "home"), None);
        assert_eq!(cooldowns.remaining(&player().id(), "home"), None);

        // The argument check runs after the cooldown has been stamped.
        let outcome = dispatcher.dispatch(&invocation(Arc::clone(&notch), "home", 0));
        assert_eq!(
            outcome.rejection(),
            Some(&Rejection::TooFewArgs { min: 1, given: 0 })
        );
        assert_eq!(cooldowns.remaining(&notch.id(), "home"), Some(30));

        clock.set_millis(1_000);
        let outcome = dispatcher.dispatch(&invocation(notch, "home", 1));
        assert_eq!(
            outcome.rejection(),
            Some(&Rejection::OnCooldown {
                remaining_seconds: 29
            })
        );

        assert_eq!(
            notifier
                .rejections
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.kind())
                .collect::<Vec<_>>(),
            vec![
                "wrong_sender_kind",
                "missing_permission",
                "too_few_args",
                "on_cooldown"
            ]
        );
    }

    fn invocation(sender: Arc<dyn CommandSender>, command: &str, n: usize) -> Invocation {
        Invocation::new(sender, command, command, args(n))
    }
}
