use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use proxy_synth_rs::format::{FormatTag, classify};
use proxy_synth_rs::model::Snapshot;
use proxy_synth_rs::synth::{SynthesisOptions, render};
use proxy_synth_rs::wireguard::PeerProfileOptions;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "proxy-synth")]
#[command(about = "Render subscription links and client configs from a subscriber snapshot", long_about = None)]
struct Args {
    /// JSON snapshot with the subscriber and their endpoint assignments
    #[arg(short, long)]
    input: PathBuf,

    /// Client User-Agent used to pick the output format
    #[arg(short, long)]
    user_agent: Option<String>,

    /// Force an output format (v2ray, clash, singbox, wireguard, mieru)
    #[arg(short, long)]
    format: Option<FormatTag>,

    /// Write the rendered body here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Comma-separated DNS servers for WireGuard profiles
    #[arg(long, env = "WG_DNS_SERVERS", default_value = "")]
    wg_dns: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Reading snapshot from: {}", args.input.display());
    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let (subscriber, assignments) = Snapshot::from_json(&content)?.into_model();
    info!("Loaded {} assignments for {}", assignments.len(), subscriber.email);

    let format = args
        .format
        .unwrap_or_else(|| classify(args.user_agent.as_deref()));
    info!("Rendering format: {}", format);

    let options = SynthesisOptions {
        wireguard: PeerProfileOptions::with_dns_list(&args.wg_dns),
    };
    let rendered = render(format, &subscriber, &assignments, &options)?;

    info!(
        "Rendered {} bytes ({}, .{})",
        rendered.body.len(),
        rendered.content_type,
        rendered.file_extension
    );

    match args.output {
        Some(path) => {
            std::fs::write(&path, &rendered.body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.body.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}
