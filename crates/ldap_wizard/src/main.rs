use clap::Parser;
use color_eyre::Result;

use ldap_wizard::cli::Cli;
use ldap_wizard::config::Config;
use ldap_wizard::{errors, logging};

#[tokio::main]
pub async fn main() -> Result<()> {
    errors::init()?;
    let args = Cli::parse();
    let config = Config::new()?;
    logging::init(config.config.log_filter.as_deref())?;

    args.run(config).await?;
    Ok(())
}
