fn main() -> anyhow::Result<()> {
    astrolabe_lib::run()
}
