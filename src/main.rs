//! WordWeave 命令行入口
//!
//! ```bash
//! # 处理文件，结果写到标准输出
//! wordweave page.html
//!
//! # 从标准输入读取，离线运行，并输出外语词元数据
//! cat page.html | wordweave - --offline --metadata words.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tokio::io::AsyncReadExt;
use tracing::{info, Level};

use wordweave::env::{self, EnvVar};
use wordweave::lexicon::ProficiencyLevel;
use wordweave::translation::{import_json_file, ConfigManager, TranslationResult};
use wordweave::weave::SelectionStrategy;
use wordweave::{EngineParts, LexicalEngine};

#[derive(Parser, Debug)]
#[command(name = "wordweave")]
#[command(version)]
#[command(about = "Weave foreign-language words into HTML for vocabulary learning")]
#[command(long_about = None)]
struct Cli {
    /// Input HTML file, or `-` for stdin
    #[arg(required_unless_present_any = ["env_docs", "write_config"])]
    input: Option<String>,

    /// Write rewritten markup here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write `{foreignWords, stats}` JSON here
    #[arg(short, long)]
    metadata: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source language code
    #[arg(long)]
    source: Option<String>,

    /// Target language code
    #[arg(long)]
    target: Option<String>,

    /// Replacement density, (0, 1]
    #[arg(long)]
    density: Option<f64>,

    /// Minimum estimated word gap between replacements
    #[arg(long)]
    spacing: Option<usize>,

    /// Highest proficiency level to replace: beginner, intermediate, advanced
    #[arg(long)]
    max_level: Option<ProficiencyLevel>,

    /// Selection strategy: random, frequency, distributed
    #[arg(long)]
    strategy: Option<SelectionStrategy>,

    /// Seed for reproducible selection
    #[arg(long)]
    seed: Option<u64>,

    /// JSON dictionary used to seed the word store
    #[arg(long)]
    dictionary: Option<PathBuf>,

    /// Directory of `{lang}.txt` frequency lists
    #[arg(long)]
    frequency_dir: Option<PathBuf>,

    /// Do not contact translation providers or download frequency lists
    #[arg(long)]
    offline: bool,

    /// Disable the built-in dictionary fallback
    #[arg(long)]
    no_bundled: bool,

    /// Resolve the N most frequent words before processing
    #[arg(long, value_name = "N")]
    pre_cache: Option<usize>,

    /// Print supported environment variables and exit
    #[arg(long)]
    env_docs: bool,

    /// Write an example configuration file and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.env_docs {
        print!("{}", env::generate_env_docs());
        return ExitCode::SUCCESS;
    }

    init_logging(cli.verbose);

    if let Some(path) = &cli.write_config {
        return match ConfigManager::generate_example_config(path) {
            Ok(()) => {
                eprintln!("Wrote example configuration to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => env::core::LogLevel::get()
            .ok()
            .and_then(|value| value.parse::<Level>().ok())
            .unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let no_color = env::core::NoColor::get().unwrap_or(false);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> TranslationResult<()> {
    // 1. 加载配置，命令行参数优先
    let mut config = ConfigManager::load(cli.config.as_deref())?.into_config();
    if let Some(source) = cli.source {
        config.source_lang = source;
    }
    if let Some(target) = cli.target {
        config.target_lang = target;
    }
    if let Some(density) = cli.density {
        config.learning.density = density;
    }
    if let Some(spacing) = cli.spacing {
        config.learning.min_word_spacing = spacing;
    }
    if let Some(level) = cli.max_level {
        config.learning.max_proficiency = level;
    }
    if let Some(strategy) = cli.strategy {
        config.learning.strategy = strategy;
    }
    if cli.seed.is_some() {
        config.learning.seed = cli.seed;
    }
    if let Some(dir) = cli.frequency_dir {
        config.frequency.local_dir = Some(dir.display().to_string());
    }
    if cli.no_bundled {
        config.learning.bundled_fallback = false;
    }
    config.validate()?;

    // 2. 组装引擎
    let parts = EngineParts::from_config(&config, cli.offline)?;
    if let Some(path) = &cli.dictionary {
        import_json_file(parts.store.as_ref(), path).await?;
    }
    let engine = LexicalEngine::new(config, parts);

    if let Some(count) = cli.pre_cache {
        let report = engine.pre_cache_words(count).await;
        info!(
            "预缓存完成: {}/{} 个词，{} 个失败",
            report.resolved, report.requested, report.failed
        );
    }

    // 3. 读取输入
    let input = cli.input.as_deref().unwrap_or("-");
    let markup = if input == "-" {
        let mut buffer = String::new();
        tokio::io::stdin().read_to_string(&mut buffer).await?;
        buffer
    } else {
        tokio::fs::read_to_string(input).await?
    };

    // 4. 处理并输出
    let output = engine.process_content(&markup).await;

    match &cli.output {
        Some(path) => tokio::fs::write(path, &output.content).await?,
        None => print!("{}", output.content),
    }

    if let Some(path) = &cli.metadata {
        let metadata = serde_json::json!({
            "foreignWords": output.foreign_words,
            "stats": output.stats,
        });
        tokio::fs::write(path, serde_json::to_string_pretty(&metadata)?).await?;
    }

    Ok(())
}
