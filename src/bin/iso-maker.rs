use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use iso_maker::artifact::iso_utils::{
    check_iso_md5, implant_iso_md5, read_iso_label, write_sha256_sidecar,
};
use iso_maker::preflight::{check_host_tools, check_required_tools};
use iso_maker::{CommandRunner, IsoMakerConfig, Pipeline, RemoteExecutor};
use tracing_subscriber::EnvFilter;

fn usage() -> &'static str {
    "Usage:\n  iso-maker label <iso>\n  iso-maker implant <iso>\n  iso-maker verify <iso>\n  iso-maker checksum <iso>\n  iso-maker check-tools [--ssh <user@host>]\n  iso-maker customize <config.toml>\n\nTool commands accept --ssh <user@host> to run on a remote host."
}

fn main() -> Result<()> {
    init_logging();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let runner = take_runner(&mut args)?;

    match args.as_slice() {
        [cmd, iso] if cmd == "label" => {
            let label = read_iso_label(&runner, Path::new(iso))
                .with_context(|| format!("reading label of '{iso}'"))?;
            println!("{label}");
            Ok(())
        }
        [cmd, iso] if cmd == "implant" => implant_iso_md5(&runner, Path::new(iso))
            .with_context(|| format!("implanting checksum into '{iso}'")),
        [cmd, iso] if cmd == "verify" => {
            check_iso_md5(&runner, Path::new(iso))
                .with_context(|| format!("verifying implanted checksum of '{iso}'"))?;
            println!("[verify] {iso}: OK");
            Ok(())
        }
        [cmd, iso] if cmd == "checksum" => {
            let sidecar = write_sha256_sidecar(Path::new(iso))
                .with_context(|| format!("hashing '{iso}'"))?;
            println!("[checksum] wrote {}", sidecar.display());
            Ok(())
        }
        [cmd] if cmd == "check-tools" => {
            check_host_tools(&runner)?;
            println!("[check-tools] all required tools found");
            Ok(())
        }
        [cmd, config] if cmd == "customize" => customize(Path::new(config)),
        _ => bail!(usage()),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Strip `--ssh <destination>` from `args` and build the matching runner.
fn take_runner(args: &mut Vec<String>) -> Result<CommandRunner> {
    let Some(pos) = args.iter().position(|a| a == "--ssh") else {
        return Ok(CommandRunner::local());
    };
    if pos + 1 >= args.len() {
        bail!("--ssh requires a destination (user@host)");
    }
    let destination = args.remove(pos + 1);
    args.remove(pos);
    Ok(CommandRunner::remote(SshExecutor::connect(&destination)))
}

fn customize(config_path: &Path) -> Result<()> {
    let config = IsoMakerConfig::load(config_path)
        .with_context(|| format!("loading config '{}'", config_path.display()))?;

    let runner = config.runner(SshExecutor::connect);
    check_required_tools(&runner, &config.required_tools())?;

    let packer = config.packer().context("building packer")?;
    let pipeline = Pipeline::new(
        config.os().clone(),
        runner,
        Box::new(packer),
        config.pipeline_options().clone(),
    );

    let images = pipeline
        .customize(&config.strategy())
        .with_context(|| format!("customizing '{}'", config.os().name()))?;

    for image in &images {
        println!("[customize:{}] {}", config.os().name(), image.display());
    }
    Ok(())
}

/// Runs command lines on a remote host through the OpenSSH client.
struct SshExecutor {
    destination: String,
}

impl SshExecutor {
    fn connect(destination: &str) -> Arc<dyn RemoteExecutor> {
        Arc::new(Self {
            destination: destination.to_string(),
        })
    }
}

impl RemoteExecutor for SshExecutor {
    fn execute(&self, command_line: &str) -> Result<String> {
        let output = Command::new("ssh")
            .args(["-o", "BatchMode=yes"])
            .arg(&self.destination)
            .arg("--")
            .arg(command_line)
            .output()
            .context("spawning ssh")?;

        if !output.status.success() {
            bail!(
                "{} on {}: {}",
                output.status,
                self.destination,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn name(&self) -> &str {
        &self.destination
    }
}
