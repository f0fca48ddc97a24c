//! Sample plugin commands served by the console host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Context};
use commandeer::commands::{
    AllowedSender, CommandDescriptor, CompletionDescriptor, Declarations, HandlerProvider,
    Invocation,
};

const GAME_MODES: [&str; 4] = ["adventure", "creative", "spectator", "survival"];

/// Built-in server commands.
#[derive(Default)]
pub struct ServerCommands {
    spawned: AtomicU64,
    kicked: Mutex<Vec<String>>,
}

impl ServerCommands {
    pub fn new() -> Self {
        Self::default()
    }

    fn ping(&self, inv: &Invocation) -> anyhow::Result<()> {
        println!("Pong, {}!", inv.sender().name());
        Ok(())
    }

    fn say(&self, inv: &Invocation) -> anyhow::Result<()> {
        println!("[{}] {}", inv.sender().name(), inv.arguments().join(" "));
        Ok(())
    }

    fn spawn(&self, inv: &Invocation) -> anyhow::Result<()> {
        let count = self.spawned.fetch_add(1, Ordering::Relaxed) + 1;
        println!("Spawned a mob next to {} ({} so far)", inv.sender().name(), count);
        Ok(())
    }

    fn kick(&self, inv: &Invocation) -> anyhow::Result<()> {
        let target = inv.argument(0).context("missing player name")?;
        let reason = inv.argument(1).unwrap_or("no reason given");

        let mut kicked = self
            .kicked
            .lock()
            .map_err(|_| anyhow::anyhow!("kick list lock poisoned"))?;
        if kicked.iter().any(|k| k.eq_ignore_ascii_case(target)) {
            bail!("{} was already kicked", target);
        }
        kicked.push(target.to_string());
        println!("Kicked {} ({})", target, reason);
        Ok(())
    }

    fn gamemode(&self, inv: &Invocation) -> anyhow::Result<()> {
        let mode = inv.argument(0).unwrap_or("survival").to_lowercase();
        if !GAME_MODES.contains(&mode.as_str()) {
            bail!("unknown game mode '{}'", mode);
        }
        println!("{} is now in {} mode", inv.sender().name(), mode);
        Ok(())
    }

    fn stop(&self, _inv: &Invocation) -> anyhow::Result<()> {
        println!("Stopping the server...");
        Ok(())
    }

    fn complete_gamemode(&self, inv: &Invocation) -> anyhow::Result<Vec<String>> {
        let typed = inv.argument(0).unwrap_or("").to_lowercase();
        Ok(GAME_MODES
            .iter()
            .filter(|m| m.starts_with(&typed))
            .map(|m| m.to_string())
            .collect())
    }
}

impl HandlerProvider for ServerCommands {
    fn provider_name(&self) -> String {
        "ServerCommands".to_string()
    }

    fn declare(&self, decl: &mut Declarations<Self>) {
        decl.command(
            CommandDescriptor::new("ping").description("Check that the server answers"),
            Self::ping,
        )
        .command(
            CommandDescriptor::new("say")
                .permission("server.say")
                .usage("/say <message>")
                .description("Broadcast a message")
                .min_args(1),
            Self::say,
        )
        .command(
            CommandDescriptor::new("spawn")
                .aliases(["summon"])
                .usage("/spawn")
                .description("Spawn a mob next to you")
                .cooldown(10)
                .allowed_sender(AllowedSender::Player),
            Self::spawn,
        )
        .command(
            CommandDescriptor::new("kick")
                .permission("server.kick")
                .usage("/kick <player> [reason]")
                .description("Remove a player from the server")
                .min_args(1)
                .max_args(2),
            Self::kick,
        )
        .command(
            CommandDescriptor::new("gamemode")
                .aliases(["gm"])
                .permission("server.gamemode")
                .usage("/gamemode [mode]")
                .description("Change your game mode")
                .max_args(1)
                .allowed_sender(AllowedSender::Player),
            Self::gamemode,
        )
        .command(
            CommandDescriptor::new("stop")
                .usage("/stop")
                .description("Stop the server")
                .max_args(0)
                .allowed_sender(AllowedSender::Console),
            Self::stop,
        )
        .completer(
            CompletionDescriptor::new("gamemode")
                .aliases(["gm"])
                .permission("server.gamemode"),
            Self::complete_gamemode,
        );
    }
}
