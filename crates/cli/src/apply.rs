//! The apply pipeline: resolve, read, substitute, then hand to kubectl.
//!
//! Every unit is read and substituted before kubectl runs even once, so an
//! undefined variable in the last file prevents applying the first.

use std::time::Duration;

use {
    anyhow::{Context, Result, bail},
    clap::CommandFactory,
    tracing::{debug, info, warn},
};

use {
    kube_envsubst_config::{
        EnvSource, Envsubst, EnvsubstConfig, LayeredEnv, ProcessEnv, discover_and_load,
        load_env_file,
    },
    kube_envsubst_tools::{
        ExecOpts, Source, exec_with_stdin, find_program, join_documents, read_source,
        resolve_sources,
    },
};

use crate::args::{Cli, clean_list};

/// One manifest stream ready for kubectl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Human-readable origin, for logs and errors.
    pub label: String,
    pub content: String,
}

/// Merge the config file with command-line overrides.
pub fn effective_config(cli: &Cli) -> Result<EnvsubstConfig> {
    let file = discover_and_load(cli.config.as_deref())?;
    let allowed_vars = clean_list("--envsubst-allowed-vars", &cli.allowed_vars)?;
    let allowed_prefixes = clean_list("--envsubst-allowed-prefixes", &cli.allowed_prefixes)?;
    Ok(file.merge_with(allowed_vars, allowed_prefixes, cli.strict_override()))
}

/// The environment variables are read from: the process environment, with an
/// env file layered on top when one is given.
pub fn environment(cli: &Cli) -> Result<Box<dyn EnvSource>> {
    match cli.env_file {
        Some(ref path) => {
            let overlay = load_env_file(path)?;
            Ok(Box::new(LayeredEnv::new(overlay, ProcessEnv)))
        },
        None => Ok(Box::new(ProcessEnv)),
    }
}

/// Read every source. With `join`, all sources form a single unit.
pub async fn read_units(
    client: &reqwest::Client,
    sources: &[Source],
    join: bool,
) -> Result<Vec<Unit>> {
    let mut units = Vec::with_capacity(sources.len());
    for source in sources {
        let data = read_source(client, source).await?;
        let content = String::from_utf8(data)
            .with_context(|| format!("{source} is not valid UTF-8"))?;
        units.push(Unit {
            label: source.to_string(),
            content,
        });
    }

    if join && units.len() > 1 {
        let label = units
            .iter()
            .map(|u| u.label.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let docs: Vec<&str> = units.iter().map(|u| u.content.as_str()).collect();
        let content = String::from_utf8(join_documents(&docs))
            .context("joined manifests are not valid UTF-8")?;
        return Ok(vec![Unit { label, content }]);
    }
    Ok(units)
}

/// Substitute every unit. Fails on the first unit with undefined variables,
/// before anything is applied.
pub fn substitute_units(
    engine: &Envsubst,
    env: &dyn EnvSource,
    units: Vec<Unit>,
) -> Result<Vec<Unit>> {
    units
        .into_iter()
        .map(|unit| {
            let content = engine
                .substitute_with(env, &unit.content)
                .with_context(|| format!("substitution failed for {}", unit.label))?;
            Ok(Unit {
                label: unit.label,
                content,
            })
        })
        .collect()
}

/// Feed one unit to `kubectl <args> -f -`, echoing kubectl's output.
async fn apply_unit(kubectl: &str, args: &[String], unit: Unit, opts: &ExecOpts) -> Result<()> {
    info!(source = %unit.label, "applying");
    let result = exec_with_stdin(kubectl, args, unit.content.into_bytes(), opts).await?;
    if !result.success() {
        eprintln!("{}", result.stderr.trim());
        bail!(
            "{kubectl} failed for {} with exit code {}",
            unit.label,
            result.exit_code
        );
    }
    let stdout = result.stdout.trim();
    if !stdout.is_empty() {
        println!("{stdout}");
    }
    Ok(())
}

/// Arguments for kubectl: the pass-through arguments, reading from stdin.
pub fn kubectl_args(passthrough: &[String]) -> Vec<String> {
    let mut args = passthrough.to_vec();
    args.push("-f".to_string());
    args.push("-".to_string());
    args
}

pub async fn run(cli: Cli) -> Result<()> {
    if !cli.print && !cli.is_apply() {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    let config = effective_config(&cli)?;
    let engine = Envsubst::new(config.allow_list(), config.is_strict());
    if engine.allow_list().is_empty() {
        warn!("no allowed variables or prefixes configured, nothing will be substituted");
    }

    let env = environment(&cli)?;
    debug!(
        strict = engine.is_strict(),
        covered = ?engine.covered_vars(env.as_ref()),
        "allow-listed variables defined in the environment"
    );

    let sources = resolve_sources(&cli.filenames, cli.recursive)?;
    if sources.is_empty() {
        bail!("no manifests given, use -f/--filename");
    }

    let client = reqwest::Client::new();
    let units = read_units(&client, &sources, cli.join).await?;
    let units = substitute_units(&engine, env.as_ref(), units)?;

    if cli.print {
        let docs: Vec<&str> = units.iter().map(|u| u.content.as_str()).collect();
        let rendered = String::from_utf8(join_documents(&docs))
            .context("rendered manifests are not valid UTF-8")?;
        println!("{}", rendered.trim_end_matches('\n'));
        return Ok(());
    }

    let kubectl = find_program(&cli.kubectl)?;
    let kubectl = kubectl.to_string_lossy();
    let args = kubectl_args(&cli.kubectl_args);
    let opts = ExecOpts {
        timeout: cli.timeout.map(Duration::from_secs),
    };
    for unit in units {
        apply_unit(&kubectl, &args, unit, &opts).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::args::parse_args,
        kube_envsubst_config::{AllowList, MapEnv},
        serial_test::serial,
        std::path::Path,
    };

    fn file_sources(dir: &Path, files: &[(&str, &str)]) -> Vec<Source> {
        files
            .iter()
            .map(|(name, body)| {
                let path = dir.join(name);
                std::fs::write(&path, body).unwrap();
                Source::File(path)
            })
            .collect()
    }

    #[tokio::test]
    async fn one_unit_per_source() {
        let dir = tempfile::tempdir().unwrap();
        let sources = file_sources(dir.path(), &[("a.yaml", "a: 1"), ("b.yaml", "b: 2")]);
        let units = read_units(&reqwest::Client::new(), &sources, false)
            .await
            .unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].content, "a: 1");
        assert_eq!(units[1].content, "b: 2");
    }

    #[tokio::test]
    async fn join_makes_a_single_unit() {
        let dir = tempfile::tempdir().unwrap();
        let sources = file_sources(dir.path(), &[("a.yaml", "a: 1"), ("b.yaml", "b: 2")]);
        let units = read_units(&reqwest::Client::new(), &sources, true)
            .await
            .unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].content, "a: 1\n---\nb: 2");
        assert!(units[0].label.contains("a.yaml") && units[0].label.contains("b.yaml"));
    }

    #[tokio::test]
    async fn join_single_source_has_no_separator() {
        let dir = tempfile::tempdir().unwrap();
        let sources = file_sources(dir.path(), &[("a.yaml", "a: 1")]);
        let units = read_units(&reqwest::Client::new(), &sources, true)
            .await
            .unwrap();
        assert_eq!(units[0].content, "a: 1");
    }

    #[tokio::test]
    async fn invalid_utf8_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bin.yaml");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let err = read_units(&reqwest::Client::new(), &[Source::File(path)], false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[test]
    fn undefined_variable_in_any_unit_fails_everything() {
        let engine = Envsubst::new(AllowList::new(Vec::new(), vec!["APP_".into()]), true);
        let env = MapEnv::new().with("APP_NAME", "web");
        let units = vec![
            Unit {
                label: "first.yaml".into(),
                content: "name: $APP_NAME".into(),
            },
            Unit {
                label: "second.yaml".into(),
                content: "image: $APP_IMAGE".into(),
            },
        ];
        let err = substitute_units(&engine, &env, units).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("second.yaml"));
        assert!(message.contains("undefined variables: [APP_IMAGE]"));
    }

    #[test]
    fn kubectl_reads_from_stdin() {
        let args = kubectl_args(&["apply".to_string(), "--dry-run=client".to_string()]);
        assert_eq!(args, vec!["apply", "--dry-run=client", "-f", "-"]);
    }

    #[test]
    #[serial]
    fn config_file_is_merged_with_flags() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("cfg.yaml");
        std::fs::write(
            &config,
            "allowedVars: [HOME]\nallowedPrefixes: [APP_]\nstrict: false\n",
        )
        .unwrap();

        let cli = parse_args(vec![
            "apply".to_string(),
            format!("--envsubst-config={}", config.display()),
            "--envsubst-allowed-prefixes=CI_".to_string(),
        ])
        .unwrap();
        let cfg = effective_config(&cli).unwrap();
        assert_eq!(cfg.allowed_vars, vec!["HOME"]);
        assert_eq!(cfg.allowed_prefixes, vec!["CI_"]);
        assert!(!cfg.is_strict());
    }

    #[test]
    #[serial]
    fn blank_config_prefix_does_not_cover_everything() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("cfg.yaml");
        std::fs::write(&config, "allowedPrefixes: [\"\", \" APP_\"]\n").unwrap();

        let cli = parse_args(vec![
            "apply".to_string(),
            format!("--envsubst-config={}", config.display()),
        ])
        .unwrap();
        let cfg = effective_config(&cli).unwrap();
        assert_eq!(cfg.allowed_prefixes, vec!["APP_"]);

        let engine = Envsubst::new(cfg.allow_list(), cfg.is_strict());
        let env = MapEnv::new().with("host", "evil").with("APP_NAME", "web");
        let out = engine
            .substitute_with(&env, "proxy $host name $APP_NAME $remote_addr")
            .unwrap();
        assert_eq!(out, "proxy $host name web $remote_addr");
    }

    #[test]
    #[serial]
    fn all_blank_config_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("cfg.json");
        std::fs::write(&config, r#"{"allowedPrefixes": ["", "  "]}"#).unwrap();

        let cli = parse_args(vec![
            "apply".to_string(),
            format!("--envsubst-config={}", config.display()),
        ])
        .unwrap();
        let err = effective_config(&cli).unwrap_err();
        assert!(err.to_string().contains("allowedPrefixes"));
    }

    #[test]
    #[serial]
    fn env_file_overlays_process_env() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        std::fs::write(&env_file, "KUBE_ENVSUBST_TEST_ONLY=from-file\n").unwrap();

        let cli = parse_args(vec![
            "apply".to_string(),
            format!("--envsubst-env-file={}", env_file.display()),
        ])
        .unwrap();
        let env = environment(&cli).unwrap();
        assert_eq!(
            env.lookup("KUBE_ENVSUBST_TEST_ONLY").as_deref(),
            Some("from-file")
        );
        assert!(env.lookup("PATH").is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn applies_each_unit_through_kubectl() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let captured = root.join("captured.log");

        // Stand-in for kubectl: records its arguments and stdin.
        let fake = root.join("fake-kubectl");
        std::fs::write(
            &fake,
            format!(
                "#!/bin/sh\necho \"args: $*\" >> '{log}'\ncat >> '{log}'\necho '---end' >> '{log}'\necho applied\n",
                log = captured.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let manifests = root.join("manifests");
        std::fs::create_dir(&manifests).unwrap();
        std::fs::write(manifests.join("a.yaml"), "name: $APP_NAME\nhost: $host\n").unwrap();
        std::fs::write(manifests.join("b.yaml"), "image: ${APP_IMAGE}\n").unwrap();

        let env_file = root.join(".env");
        std::fs::write(&env_file, "APP_NAME=web\nAPP_IMAGE=nginx\nhost=evil\n").unwrap();

        let cli = parse_args(vec![
            "apply".to_string(),
            "-f".to_string(),
            manifests.display().to_string(),
            "--dry-run=client".to_string(),
            "--envsubst-allowed-prefixes=APP_".to_string(),
            format!("--envsubst-env-file={}", env_file.display()),
            format!("--envsubst-kubectl={}", fake.display()),
            format!("--envsubst-config={}", root.join("absent-is-error.yaml").display()),
        ])
        .unwrap();
        // An explicit config path must exist.
        assert!(run(cli.clone()).await.is_err());

        let config = root.join("cfg.json");
        std::fs::write(&config, "{}").unwrap();
        let cli = Cli {
            config: Some(config),
            ..cli
        };
        run(cli).await.unwrap();

        let log = std::fs::read_to_string(&captured).unwrap();
        assert_eq!(
            log,
            "args: apply --dry-run=client -f -\nname: web\nhost: $host\n---end\n\
             args: apply --dry-run=client -f -\nimage: nginx\n---end\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial]
    async fn strict_failure_applies_nothing() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let marker = root.join("called");

        let fake = root.join("fake-kubectl");
        std::fs::write(
            &fake,
            format!("#!/bin/sh\ncat > /dev/null\ntouch '{}'\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        std::fs::write(root.join("a.yaml"), "ok: plain\n").unwrap();
        std::fs::write(root.join("b.yaml"), "missing: $APP_UNDEFINED_XYZ\n").unwrap();
        let config = root.join("cfg.json");
        std::fs::write(&config, "{}").unwrap();

        let cli = parse_args(vec![
            "apply".to_string(),
            "-f".to_string(),
            root.display().to_string(),
            "--envsubst-allowed-prefixes=APP_UNDEFINED_".to_string(),
            format!("--envsubst-config={}", config.display()),
            format!("--envsubst-kubectl={}", fake.display()),
        ])
        .unwrap();

        let err = run(cli).await.unwrap_err();
        assert!(format!("{err:#}").contains("APP_UNDEFINED_XYZ"));
        assert!(!marker.exists());
    }
}
