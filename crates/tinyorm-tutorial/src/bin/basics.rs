//! Session lifecycle and the query builder on the `contact` table.

use clap::Parser;
use tinyorm::Session;
use tinyorm_tutorial::cli::{EngineArgs, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "basics")]
#[command(version, about = "Create, update, query and delete contacts")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.engine.echo);

    let conn = cli.engine.connect("sqlite:///db.sqlite3")?;
    tinyorm_tutorial::create_schema(&conn)?;

    let mut session = Session::new(conn);
    tinyorm_tutorial::walkthrough::basics(&mut session, &mut std::io::stdout().lock())
}
