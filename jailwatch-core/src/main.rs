use clap::Parser;

fn main() -> anyhow::Result<()> {
  let cli = jailwatch_core::console::Cli::parse();
  jailwatch_core::run_cli(cli)
}
