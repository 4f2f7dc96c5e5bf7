use anyhow::Result;
use ayaya_engine::{cli, runtime};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = cli::parse()?;
    runtime::execute(args)?;
    Ok(())
}
