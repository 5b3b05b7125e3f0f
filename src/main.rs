//! Keyboard Debounce - suppress double-typed key presses
//!
//! Grabs the keyboards, drops presses that bounce, forwards the rest.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keyboard_debounce::{
    cli::{self, Action, RunSettings},
    keyboard::{self, keymap},
    report::SessionReport,
    session::Session,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let parsed = match cli::parse_args(std::env::args_os()) {
        Ok(parsed) => parsed,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    match parsed.into_action()? {
        Action::ListKeys => {
            list_keys();
            Ok(())
        }
        Action::WriteConfig { path, config } => {
            config
                .save_to(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote configuration to {}", path.display());
            Ok(())
        }
        Action::Run(settings) => run(settings),
    }
}

fn list_keys() {
    for (code, name) in keymap::all_keys() {
        println!("{:>4}  {}", code.as_u16(), name);
    }
    println!();
    println!("Aliases:");
    for (alias, code) in keymap::ALIASES {
        println!("  {:<8} -> {}", alias, keyboard::KeyCode(*code));
    }
    println!();
    println!("Any other scancode can be given as #<code>, e.g. #240");
}

fn run(settings: RunSettings) -> Result<()> {
    let mut interceptor = keyboard::open_interceptor().context("opening keyboard input")?;

    println!("Keyboard Debounce v{}", env!("CARGO_PKG_VERSION"));
    for line in settings.policy.summary_lines() {
        println!("  {}", line);
    }
    println!("Listening on {}", interceptor.describe());

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("installing Ctrl-C handler")?;
    }

    let mut session = Session::new(settings.policy).with_drop_output(settings.print_drops);
    let result = interceptor.run(&running, &mut |event| session.process_event(event));

    println!("\nKeyboard Debounce session complete.");
    println!("Total events processed: {}", session.total_events());
    println!("Presses suppressed: {}", session.total_dropped());
    println!("Session duration: {}", session.elapsed_formatted());

    if let Some(path) = &settings.report {
        SessionReport::new(&session)
            .export_json(path)
            .with_context(|| format!("writing report to {}", path.display()))?;
        log::info!("Report written to {}", path.display());
    }

    result.context("keyboard input failed")?;
    Ok(())
}
