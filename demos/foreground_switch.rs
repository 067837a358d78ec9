//! # Example: foreground_switch
//!
//! Walks through the single-foreground rules: preemption, the navigation stack,
//! conflicts, and home.
//!
//! ## Flow
//! ```text
//! launch(multimeter)      foreground = multimeter
//! launch(pwm)             multimeter suspended (BACKGROUND_CAPABLE), nav = [multimeter]
//! launch(serial_debug)    Conflict: pwm is active
//! back()                  pwm stopped, multimeter resumed
//! home()                  multimeter suspended, launcher started
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example foreground_switch
//! ```

use std::sync::Arc;

use rtam::{AppDescriptor, AppError, AppFlags, Config, Hooks, Orchestrator, Registry};

fn noisy(name: &'static str) -> Hooks {
    Hooks::new()
        .on_start(move || async move {
            println!("  {name}: start");
            Ok::<_, AppError>(rtam::Started::Running)
        })
        .on_stop(move || async move {
            println!("  {name}: stop");
            Ok::<_, AppError>(())
        })
        .on_suspend(move || async move {
            println!("  {name}: suspend");
            Ok::<_, AppError>(())
        })
        .on_resume(move || async move {
            println!("  {name}: resume");
            Ok::<_, AppError>(())
        })
}

async fn show(rtam: &Arc<Orchestrator>, step: &str) {
    println!(
        "{step}\n  foreground={:?} nav={:?}",
        rtam.foreground().await,
        rtam.navigation().await
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let registry = Registry::from_descriptors([
        AppDescriptor::builder("gui")
            .flags(AppFlags::AUTO_START | AppFlags::SERVICE)
            .build(),
        AppDescriptor::builder("launcher")
            .requires(["gui"])
            .lifecycle(noisy("launcher").arc())
            .build(),
        AppDescriptor::builder("multimeter")
            .flags(AppFlags::BACKGROUND_CAPABLE)
            .requires(["gui"])
            .lifecycle(noisy("multimeter").arc())
            .build(),
        AppDescriptor::builder("pwm")
            .requires(["gui"])
            .conflicts_with(["serial_debug"])
            .lifecycle(noisy("pwm").arc())
            .build(),
        AppDescriptor::builder("serial_debug")
            .requires(["gui"])
            .lifecycle(noisy("serial_debug").arc())
            .build(),
    ])?;

    let rtam = Orchestrator::builder(registry)
        .with_config(Config::default())
        .build();
    rtam.initialize().await;

    rtam.launch("multimeter").await?;
    show(&rtam, "launch(multimeter)").await;

    rtam.launch("pwm").await?;
    show(&rtam, "launch(pwm)").await;

    if let Err(err) = rtam.launch("serial_debug").await {
        println!("launch(serial_debug)\n  refused: {err}");
    }

    rtam.back().await?;
    show(&rtam, "back()").await;

    rtam.home().await?;
    show(&rtam, "home()").await;

    println!("\n{}", rtam.ps().await);
    rtam.shutdown().await?;
    Ok(())
}
