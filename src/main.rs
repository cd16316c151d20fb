fn main() -> anyhow::Result<()> {
    chatkit_formatters::cli::run()
}
