use clap::Parser;

/// Pick the backend holding the request log table: Postgres via a
/// connection string, or the local Sqlite file (the default).
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Postgres connection string for the log database
    #[arg(short, long, env, default_value = None)]
    pub(crate) pg: Option<String>,

    /// Use the local Sqlite log database
    #[arg(short, long, env, default_value_t = true)]
    pub(crate) sqlite: bool,
}
