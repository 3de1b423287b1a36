use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, path::PathBuf};

use crate::config::ConfigState;
use crate::{pipeline, replay};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("run") => {
            let device: Option<String> = pargs.opt_value_from_str("--device")?;
            pipeline::run(device)
        }

        Some("replay") => {
            let path: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: tablectl replay <trace.json>"))?;
            replay::run_trace(&path)
        }

        Some("list") => {
            let state = ConfigState::load_or_install_default()?;
            for name in state.list_profiles() {
                if name == state.active_name {
                    println!("* {name}");
                } else {
                    println!("  {name}");
                }
            }
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: tablectl use <profile_name>"))?;
            let mut state = ConfigState::load_or_install_default()?;
            state.set_active(&name)?;
            println!("active profile: {name}");
            Ok(())
        }

        Some("doctor") => {
            let state = ConfigState::load_or_install_default()?;
            println!(
                "{}",
                serde_json::to_string_pretty(&state.doctor_report()).unwrap_or_default()
            );
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        r#"tablectl — multi-touch gesture engine for a shared surface

USAGE:
  tablectl help [command]        Show general or command-specific help
  tablectl run [--device PATH]   Run the engine against live touch input
  tablectl replay <trace.json>   Replay a recorded contact trace
  tablectl list                  List profiles
  tablectl use <name>            Switch active profile
  tablectl doctor                Diagnose permissions/devices

TIPS:
  - Profiles: ~/.config/tablectl/profiles
  - Active profile pointer: ~/.config/tablectl/active
  - RUST_LOG=debug shows per-frame gesture claims
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: tablectl run [--device PATH]\nRuns the engine; auto-discovers multitouch devices unless --device is given."
        ),
        "replay" => println!(
            "usage: tablectl replay <trace.json>\nReplays a trace (targets + contact batches) and prints the final target states."
        ),
        "list" => {
            println!("usage: tablectl list\nLists available profiles; marks active with '*'.")
        }
        "use" => {
            println!("usage: tablectl use <name>\nSwitches active profile to <name>.")
        }
        "doctor" => println!(
            "usage: tablectl doctor\nChecks permissions and lists detected multitouch devices."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}
