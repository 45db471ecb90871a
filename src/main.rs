use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "word-lookup-rust",
    version,
    about = "Look up translations, phonetics and pronunciation audio for words"
)]
struct Cli {
    /// Words to look up. Without words the HTTP server is started.
    words: Vec<String>,

    /// Address to bind the server to (overrides settings and HOST)
    #[arg(long = "host")]
    host: Option<String>,

    /// Port to bind the server to (overrides settings and PORT)
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    word_lookup_rust::logging::init(cli.verbose)?;
    word_lookup_rust::run(word_lookup_rust::Config {
        words: cli.words,
        host: cli.host,
        port: cli.port,
        settings_path: cli.read_settings,
    })
    .await
}
