fn main() -> anyhow::Result<()> {
    jolt::cli::run_cli()
}
