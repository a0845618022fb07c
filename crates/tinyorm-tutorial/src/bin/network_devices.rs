//! Network devices, their vendors, and the reverse accessor from vendor to device.

use clap::Parser;
use tinyorm::Session;
use tinyorm_tutorial::cli::{EngineArgs, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "network-devices")]
#[command(version, about = "Link devices to vendors and ask vendors about their devices")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.engine.echo);

    let conn = cli.engine.connect("sqlite://")?;
    tinyorm_tutorial::create_schema(&conn)?;

    let mut session = Session::new(conn);
    tinyorm_tutorial::walkthrough::network_devices(&mut session, &mut std::io::stdout().lock())
}
