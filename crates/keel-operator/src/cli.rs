use std::path::PathBuf;

use clap::{Parser, Subcommand};

use keel_common::KEEL_SYSTEM_NAMESPACE;

/// Default name of the KeelCluster resource
pub const DEFAULT_CLUSTER_NAME: &str = "keel-cluster";

/// Keel - operator for the platform components of a Keel installation
#[derive(Parser, Debug)]
#[command(name = "keel-operator", version, about, long_about = None)]
pub struct Cli {
    /// Namespace holding the KeelCluster and KeelComponent resources
    #[arg(long, env = "KEEL_NAMESPACE", default_value = KEEL_SYSTEM_NAMESPACE, global = true)]
    pub namespace: String,

    /// Name of the KeelCluster resource
    #[arg(long, env = "KEEL_CLUSTER_NAME", default_value = DEFAULT_CLUSTER_NAME, global = true)]
    pub cluster_name: String,

    /// Path to a kubeconfig file; in-cluster config is used when unset
    #[arg(long, env = "KUBECONFIG", global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Subcommand to run; `controller` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Operator subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the component controller (default mode)
    ///
    /// Installs the Keel CRDs, then watches KeelComponent resources in the
    /// configured namespace and converges their workload objects.
    Controller,

    /// Print the CRD manifests as YAML and exit
    Crd,

    /// Print component statuses as JSON and exit
    Status {
        /// Only the priority (init) components
        #[arg(long)]
        init: bool,

        /// A single component instead of a listing
        #[arg(long, conflicts_with = "init")]
        name: Option<String>,
    },
}

impl Cli {
    /// The selected subcommand, `controller` when none was given
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Controller)
    }
}
