mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use cf_av::{Extractor, ToolRegistry, YtDlp};
use cf_core::config::Config;
use cf_core::VideoUrl;
use clap::Parser;
use cli::{Cli, Commands};

/// Load the config file (explicit or searched) and apply env overrides.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let mut config = Config::load_or_default(config_path)?;
    config.apply_process_env();
    Ok(config)
}

async fn start_server(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting clipforge");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    cf_server::start(config).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clipforge=trace,cf_server=trace,cf_av=trace,cf_core=debug,tower_http=debug".to_string()
        } else {
            "clipforge=info,cf_server=info,cf_av=info,cf_core=info,tower_http=info".to_string()
        }
    });

    // Logs go to stderr so `info --json` output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Info { url, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(show_info(&url, json, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("clipforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn show_info(url: &str, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let url = VideoUrl::parse(url, &config.extractor.allowed_hosts)?;

    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    let extractor = YtDlp::new(tools, &config);
    let info = extractor.fetch_info(&url).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Title: {}", info.title);
    if let Some(secs) = info.duration {
        println!(
            "Duration: {:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
    }

    let muxed: Vec<_> = info.muxed_formats().collect();
    println!("\nFormats with audio and video: {}", muxed.len());
    for format in muxed {
        print!(
            "  [{}] {} {}",
            format.itag,
            format.quality.as_deref().unwrap_or("?"),
            format.mime_type
        );
        if let Some(len) = format.content_length {
            print!(" ({:.1} MiB)", len as f64 / (1024.0 * 1024.0));
        }
        println!();
    }

    let other = info.formats.len() - info.formats.iter().filter(|f| f.is_muxed()).count();
    if other > 0 {
        println!("\n{other} audio-only or video-only formats not listed");
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install yt-dlp and ffmpeg to enable all features.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  CORS origins: {}", config.server.cors_origins.join(", "));
    match config.server.max_concurrent_downloads {
        Some(n) => println!("  Max concurrent downloads: {n}"),
        None => println!("  Max concurrent downloads: unlimited"),
    }
    println!("  Allowed hosts: {}", config.extractor.allowed_hosts.join(", "));
    println!("  Clip mode: {:?}", config.transcode.clip_mode);

    let warnings = config.validate();
    for warning in &warnings {
        println!("  ⚠ {warning}");
    }

    Ok(())
}
