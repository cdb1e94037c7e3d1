use clap::Parser;
use wordtrack::relay::Args as RelayArgs;

fn main() -> anyhow::Result<()> {
    let args = RelayArgs::parse();
    wordtrack::relay::run_main(args)
}
