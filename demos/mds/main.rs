use clap::{Parser, Subcommand};
use demos::load_option;
use fanout_rpc::MdsClient;
use log::error;

#[derive(Debug, Parser)]
#[clap(name = "mds", about = "query a metadata service cluster")]
struct Args {
    /// toml 配置文件
    #[clap(short, long, default_value = "./mds.toml")]
    config: String,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 列出所有物理池
    PhysicalPools,
    /// 列出物理池下的逻辑池
    LogicalPools { physical_pool_id: u32 },
    /// 查询文件大小 (GiB)
    FileSize { file_name: String },
}

#[tokio::main]
async fn main() {
    // handle 需要存活到进程退出
    let _logger = flexi_logger::Logger::try_with_env_or_str("info")
        .and_then(|logger| logger.start())
        .map_err(|e| eprintln!("init logger failed: {}", e))
        .ok();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> fanout_rpc::Result<()> {
    let opt = load_option(&args.config).await?;
    let client = MdsClient::connect(opt).await?;

    match args.command {
        Command::PhysicalPools => {
            for pool in client.list_physical_pool().await? {
                println!("{}\t{}", pool.id, pool.name);
            }
        }
        Command::LogicalPools { physical_pool_id } => {
            for pool in client.list_logical_pool(physical_pool_id).await? {
                println!(
                    "{}\t{}\t{:?}\t{:?}",
                    pool.id, pool.name, pool.kind, pool.allocate_status
                );
            }
        }
        Command::FileSize { file_name } => {
            println!("{}", client.get_file_size(&file_name).await?);
        }
    }
    Ok(())
}
