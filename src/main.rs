fn main() -> anyhow::Result<()> {
    shiftdb::run()?;
    Ok(())
}
