use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use venvkit_core::config::{ExistingEnvPolicy, SettingsOverrides};
use venvkit_env::Shell;

/// venvkit - create a Python virtual environment and install a requirements file into it
#[derive(Parser, Debug)]
#[command(name = "venvkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file (default: ./venvkit.yaml when present)
    #[arg(long, global = true, value_name = "FILE", env = "VENVKIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the environment lives and what goes into it.
#[derive(Args, Debug, Clone, Default)]
pub struct EnvArgs {
    /// Directory that holds the environment (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Environment directory name inside the base directory (default: venv)
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Requirements file (default: requirements.txt)
    #[arg(short = 'r', long, value_name = "FILE")]
    pub requirements: Option<PathBuf>,

    /// Interpreter used to create the environment (path or name on PATH)
    #[arg(long, value_name = "PYTHON")]
    pub python: Option<PathBuf>,
}

impl EnvArgs {
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            base_dir: self.base_dir.clone(),
            python: self.python.clone(),
            requirements: self.requirements.clone(),
            env_name: self.name.clone(),
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create (or reuse) the environment, upgrade pip and install requirements
    Provision {
        #[command(flatten)]
        env: EnvArgs,

        /// Delete an existing environment and create it again
        #[arg(long)]
        recreate: bool,

        /// Check installed packages against the requirements file afterwards
        #[arg(long)]
        verify: bool,

        /// Print the commands that would run without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show environment location, state and last provisioning record
    Show {
        #[command(flatten)]
        env: EnvArgs,
    },

    /// Print shell commands that activate the environment
    Activate {
        #[command(flatten)]
        env: EnvArgs,

        /// Shell dialect
        #[arg(long, value_enum, default_value_t = ShellKind::default_for_platform())]
        shell: ShellKind,
    },

    /// Remove the environment directory
    Clean {
        #[command(flatten)]
        env: EnvArgs,

        /// Only show what would be removed
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
}

impl Commands {
    /// Settings layer contributed by the command line.
    pub fn overrides(&self) -> SettingsOverrides {
        match self {
            Commands::Provision {
                env,
                recreate,
                verify,
                ..
            } => SettingsOverrides {
                on_existing: recreate.then_some(ExistingEnvPolicy::Recreate),
                verify: verify.then_some(true),
                ..env.overrides()
            },
            Commands::Show { env } | Commands::Activate { env, .. } | Commands::Clean { env, .. } => {
                env.overrides()
            }
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Posix,
    Powershell,
}

impl ShellKind {
    fn default_for_platform() -> Self {
        if cfg!(windows) {
            ShellKind::Powershell
        } else {
            ShellKind::Posix
        }
    }
}

impl From<ShellKind> for Shell {
    fn from(kind: ShellKind) -> Self {
        match kind {
            ShellKind::Posix => Shell::Posix,
            ShellKind::Powershell => Shell::PowerShell,
        }
    }
}
