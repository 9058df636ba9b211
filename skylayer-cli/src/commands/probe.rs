//! `probe` command: load a survey and print what its manifest says.

use clap::Args;
use skylayer::coord::TilePos;
use skylayer::survey::TileFormat;

use super::common::{load_config, Session};
use crate::error::CliError;

/// Arguments of `skylayer probe`.
#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Survey root URL (http(s), file:// or a local path)
    pub url: String,

    /// Also print every manifest property
    #[arg(long)]
    pub properties: bool,
}

pub fn run(args: ProbeArgs) -> Result<(), CliError> {
    let config = load_config();
    let mut session = Session::open(&args.url, &config)?;
    session.wait_ready()?;

    let survey = &session.survey;
    println!("Survey: {}", survey.url());
    println!("  Label:        {}", survey.label().unwrap_or("-"));
    println!("  Format:       {}", survey.format());
    println!(
        "  Orders:       {}..{}",
        survey.order_min(),
        if survey.order() == 0 {
            "?".to_string()
        } else {
            survey.order().to_string()
        }
    );
    println!(
        "  Tile width:   {}",
        match survey.tile_width() {
            0 => "unknown".to_string(),
            w => format!("{} px", w),
        }
    );
    if survey.release_date() != 0.0 {
        println!("  Release date: MJD {:.5}", survey.release_date());
    }

    match survey.mosaic() {
        Some(mosaic) => println!(
            "  Mosaic:       {}x{} px, {} columns",
            mosaic.width(),
            mosaic.height(),
            survey.mosaic_columns()
        ),
        None if survey.format() == TileFormat::Eph => println!("  Mosaic:       n/a"),
        None => println!("  Mosaic:       unavailable"),
    }
    println!(
        "  First tile:   {}",
        survey.tile_url(TilePos::new(survey.order_min(), 0))
    );

    if args.properties {
        println!();
        for (key, value) in &survey.properties().values {
            println!("  {} = {}", key, value);
        }
    }
    Ok(())
}
