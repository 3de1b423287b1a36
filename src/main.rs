fn main() -> anyhow::Result<()> {
    tablectl::logging::init();
    tablectl::cli::run()
}
