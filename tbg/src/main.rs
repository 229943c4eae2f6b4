use color_eyre::eyre::Result;
use tbg::app::TbgApplication;

fn main() -> Result<()> {
    color_eyre::install()?;
    TbgApplication::from_cli()?.run()
}
