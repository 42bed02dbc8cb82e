//! Command-line surface.
//!
//! kubectl flags are unknown to us and must reach kubectl untouched, so the
//! raw arguments are split first: the plugin's own flags go to clap, the
//! rest is handed to kubectl verbatim.

use std::{ffi::OsString, path::PathBuf};

use {
    anyhow::{Context, Result},
    clap::Parser,
    kube_envsubst_config::clean_names,
};

const BIN_NAME: &str = "kubectl-envsubst";

/// Prefix shared by every plugin-specific long flag.
const PLUGIN_FLAG_PREFIX: &str = "--envsubst-";

/// Plugin flags that take a value (`--flag value` or `--flag=value`).
const VALUE_FLAGS: &[&str] = &[
    "-f",
    "--filename",
    "--envsubst-allowed-vars",
    "--envsubst-allowed-prefixes",
    "--envsubst-config",
    "--envsubst-env-file",
    "--envsubst-kubectl",
    "--envsubst-timeout",
    "--envsubst-log-level",
];

/// Plugin flags without a value that do not carry the `--envsubst-` prefix.
const SWITCH_FLAGS: &[&str] = &["-R", "--recursive", "-h", "--help", "--version"];

const EXAMPLES: &str = "\
Examples:
  # substitute variables whose names start with one of the prefixes
  kubectl envsubst apply -f manifests/ --envsubst-allowed-prefixes=CI_,APP_

  # substitute well-defined variables
  kubectl envsubst apply -f manifests/ --envsubst-allowed-vars=CI_PROJECT_NAME,CI_COMMIT_REF_NAME,APP_IMAGE

  # mixed mode, check both full match and prefix match
  kubectl envsubst apply -f manifests/ --envsubst-allowed-prefixes=CI_,APP_ --envsubst-allowed-vars=HOME,USER

  # other kubectl flags are passed through
  kubectl envsubst apply -f deploy.yaml --dry-run=client -oyaml --envsubst-allowed-prefixes=APP_

  # render only, without kubectl
  cat deploy.yaml | kubectl envsubst --envsubst-print -f - --envsubst-allowed-prefixes=APP_";

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = BIN_NAME,
    version,
    about = "Expands environment variables in manifests, before applying them",
    after_help = EXAMPLES
)]
pub struct Cli {
    /// Manifest file, directory, glob, URL, or `-` for stdin. Repeatable.
    #[arg(short = 'f', long = "filename", value_name = "PATH")]
    pub filenames: Vec<String>,

    /// Descend into subdirectories of directory inputs.
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Comma-separated variable names allowed for expansion.
    #[arg(
        long = "envsubst-allowed-vars",
        env = "ENVSUBST_ALLOWED_VARS",
        value_delimiter = ',',
        value_name = "NAMES"
    )]
    pub allowed_vars: Vec<String>,

    /// Comma-separated name prefixes allowed for expansion.
    #[arg(
        long = "envsubst-allowed-prefixes",
        env = "ENVSUBST_ALLOWED_PREFIXES",
        value_delimiter = ',',
        value_name = "PREFIXES"
    )]
    pub allowed_prefixes: Vec<String>,

    /// Fail when an allowed variable is undefined (the default).
    #[arg(long = "envsubst-strict", conflicts_with = "no_strict")]
    pub strict: bool,

    /// Leave undefined allowed variables in place instead of failing.
    #[arg(long = "envsubst-no-strict")]
    pub no_strict: bool,

    /// Config file (toml, yaml, json). Defaults to `./.kube-envsubst.*`.
    #[arg(long = "envsubst-config", env = "ENVSUBST_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Dotenv file whose variables take precedence over the process environment.
    #[arg(long = "envsubst-env-file", value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Apply all sources as one stream instead of one kubectl call per source.
    #[arg(long = "envsubst-join")]
    pub join: bool,

    /// Print the substituted manifests instead of running kubectl.
    #[arg(long = "envsubst-print")]
    pub print: bool,

    /// kubectl executable.
    #[arg(
        long = "envsubst-kubectl",
        env = "ENVSUBST_KUBECTL",
        default_value = "kubectl",
        value_name = "PROGRAM"
    )]
    pub kubectl: String,

    /// Kill kubectl after this many seconds.
    #[arg(long = "envsubst-timeout", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "envsubst-log-level", default_value = "warn")]
    pub log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long = "envsubst-json-logs", default_value_t = false)]
    pub json_logs: bool,

    /// Arguments passed through to kubectl, filled in by [`parse_args`].
    #[arg(skip)]
    pub kubectl_args: Vec<String>,
}

impl Cli {
    /// Strict override from the command line, if any.
    pub fn strict_override(&self) -> Option<bool> {
        if self.no_strict {
            Some(false)
        } else if self.strict {
            Some(true)
        } else {
            None
        }
    }

    pub fn is_apply(&self) -> bool {
        self.kubectl_args.first().is_some_and(|a| a == "apply")
    }
}

/// Raw arguments partitioned into plugin flags and kubectl pass-through.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SplitArgs {
    pub plugin: Vec<String>,
    pub passthrough: Vec<String>,
}

fn flag_name(arg: &str) -> &str {
    arg.split_once('=').map_or(arg, |(name, _)| name)
}

/// Partition raw arguments (without the program name).
///
/// Everything after a literal `--` is passed through.
pub fn split_args<I: IntoIterator<Item = String>>(args: I) -> SplitArgs {
    let mut split = SplitArgs::default();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        if arg == "--" {
            split.passthrough.extend(iter.by_ref());
            break;
        }
        let name = flag_name(&arg);
        if VALUE_FLAGS.contains(&name) {
            let inline = arg.contains('=');
            split.plugin.push(arg);
            if !inline && let Some(value) = iter.next() {
                split.plugin.push(value);
            }
        } else if SWITCH_FLAGS.contains(&name) || name.starts_with(PLUGIN_FLAG_PREFIX) {
            split.plugin.push(arg);
        } else {
            split.passthrough.push(arg);
        }
    }
    split
}

/// Parse raw arguments (without the program name) into a [`Cli`].
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Cli, clap::Error> {
    let split = split_args(args);
    let argv = std::iter::once(OsString::from(BIN_NAME))
        .chain(split.plugin.into_iter().map(OsString::from));
    let mut cli = Cli::try_parse_from(argv)?;
    cli.kubectl_args = split.passthrough;
    Ok(cli)
}

/// Trim list entries and drop blanks. A list given with only blank entries
/// is rejected.
pub fn clean_list(flag: &str, values: &[String]) -> Result<Vec<String>> {
    clean_names(values).with_context(|| format!("empty list value for {flag}"))
}
