use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use infra_model::NodeDescriptor;
use infra_node::{AssetPaths, Node};

/// Default root under which per-node workspaces and vendor emulation
/// assets live, matching the original's `/etc/infrasim` / `~/.infrasim`
/// split between system-wide defaults and per-user overrides.
const DEFAULT_WORKSPACE_ROOT: &str = "/var/lib/infrasim/nodes";
/// Matches the original's `/usr/local/etc/infrasim/<type>/` vendor asset
/// layout (spec.md §4.6's last-resort SMBIOS resolution tier).
const DEFAULT_ASSET_ROOT: &str = "/usr/local/etc/infrasim";

#[derive(Parser)]
#[command(name = "infrasim-node", version, about = "Manage simulated server nodes")]
#[command(propagate_version = true)]
struct Cli {
    /// Directory under which node workspaces are materialized.
    #[arg(long, global = true, default_value = DEFAULT_WORKSPACE_ROOT)]
    workspace_root: PathBuf,

    /// Directory holding per-vendor-type emulation assets.
    #[arg(long, global = true, default_value = DEFAULT_ASSET_ROOT)]
    asset_root: PathBuf,

    #[arg(long, global = true, default_value = "qemu-system-x86_64")]
    vmm_binary: String,

    #[arg(long, global = true, default_value = "ipmi_sim")]
    bmc_binary: String,

    #[arg(long, global = true, default_value = "socat")]
    relay_binary: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Materialize a node's workspace (config, scripts, default disk images)
    /// from a YAML descriptor without starting it.
    Create {
        /// Path to the node's YAML descriptor.
        config: PathBuf,
    },
    /// Create (if needed) and start a node's tasks in priority order.
    Start {
        config: PathBuf,
    },
    /// Stop a node's tasks in reverse priority order.
    Stop {
        config: PathBuf,
    },
    /// Print the running/stopped state of each of a node's tasks.
    Status {
        config: PathBuf,
    },
    /// Stop a node and remove its workspace directory.
    Destroy {
        config: PathBuf,
    },
}

fn load_node(cli: &Cli, config: &PathBuf) -> Result<Node> {
    let text = fs::read_to_string(config)
        .with_context(|| format!("reading node descriptor {}", config.display()))?;
    let descriptor = NodeDescriptor::from_yaml(&text)
        .with_context(|| format!("parsing node descriptor {}", config.display()))?;

    let type_dir = cli.asset_root.join(&descriptor.node_type);
    let default_emu = type_dir.join(format!("{}.emu", descriptor.node_type));
    let default_lancontrol = type_dir.join("lancontrol");
    let default_smbios = type_dir.join(format!("{}_smbios.bin", descriptor.node_type));
    let assets = AssetPaths::new(
        cli.vmm_binary.clone(),
        cli.bmc_binary.clone(),
        cli.relay_binary.clone(),
        default_emu,
        default_lancontrol,
        default_smbios,
    );

    Node::from_descriptor(&descriptor, &cli.workspace_root, &assets)
        .context("building node from descriptor")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Create { config } => {
            let node = load_node(&cli, config)?;
            node.materialize_workspace()?;
            println!("workspace ready at {}", node.workspace().display());
        }
        Commands::Start { config } => {
            let node = load_node(&cli, config)?;
            node.materialize_workspace()?;
            node.start()?;
            println!("node {} started", node.name());
        }
        Commands::Stop { config } => {
            let node = load_node(&cli, config)?;
            node.stop()?;
            println!("node {} stopped", node.name());
        }
        Commands::Status { config } => {
            let node = load_node(&cli, config)?;
            for (task, status) in node.status()? {
                match status {
                    infra_task::TaskStatus::Running(pid) => println!("{task}: running (pid {pid})"),
                    infra_task::TaskStatus::Stopped => println!("{task}: stopped"),
                }
            }
        }
        Commands::Destroy { config } => {
            let node = load_node(&cli, config)?;
            node.stop()?;
            node.terminate_workspace()?;
            println!("node {} destroyed", node.name());
        }
    }

    Ok(())
}
