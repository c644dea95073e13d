//! Slot command handlers.

use anyhow::Result;
use devhub_runtime::teardown_daemon;

use crate::bootstrap::CliContext;
use crate::commands::SlotCommand;

pub async fn execute(ctx: &CliContext, command: SlotCommand) -> Result<()> {
    match command {
        SlotCommand::List => list(ctx),
        SlotCommand::Show { name } => show(ctx, &name),
        SlotCommand::Clear { name, kill } => clear(ctx, &name, kill).await,
    }
}

fn list(ctx: &CliContext) -> Result<()> {
    let slots = ctx.registry.list()?;
    if slots.is_empty() {
        println!("No slots recorded under {}", ctx.registry.root().display());
        return Ok(());
    }

    println!("{:<20} {:>8} {:>6}  {}", "NAME", "PID", "PORT", "ALIVE");
    for slot in slots {
        println!(
            "{:<20} {:>8} {:>6}  {}",
            slot.name,
            slot.pid,
            slot.port,
            if devhub_runtime::pid_exists(slot.pid) { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn show(ctx: &CliContext, name: &str) -> Result<()> {
    match ctx.registry.load(name)? {
        Some(slot) => println!("{}", serde_json::to_string_pretty(&slot)?),
        None => println!("No slot recorded for '{name}'"),
    }
    Ok(())
}

async fn clear(ctx: &CliContext, name: &str, kill: bool) -> Result<()> {
    if kill {
        match teardown_daemon(&ctx.supervisor, &ctx.registry, name, ctx.settings.stop_grace()).await? {
            Some(slot) => println!("Stopped pid {} and cleared '{name}'", slot.pid),
            None => println!("No slot recorded for '{name}'"),
        }
    } else {
        ctx.registry.clear(name)?;
        println!("Cleared '{name}'");
    }
    Ok(())
}
